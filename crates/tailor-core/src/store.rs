//! The `PersonalizationStore` trait and supporting query/result types.
//!
//! The trait is implemented by storage backends (e.g.
//! `tailor-store-sqlite`). Higher layers (`tailor-pipeline`, `tailor-api`)
//! depend on this abstraction, not on any concrete backend.

use std::{collections::BTreeMap, future::Future};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
  intent::VisitorIntent,
  judgment::GeneratedVariation,
  persona::{OrgSettings, PersonaVariationEntry},
  record::{NewRegistration, PersonalizationRecord, RecordKey, TriggerSource},
};

// ─── Commit input ────────────────────────────────────────────────────────────

/// Everything needed to upsert a successful pipeline result. Carries the
/// full page context so the write stays a true upsert even when no prior
/// registration row exists.
#[derive(Debug, Clone)]
pub struct CommitInput {
  pub key:                    RecordKey,
  pub page_url:               String,
  pub page_schema:            serde_json::Value,
  pub intent:                 VisitorIntent,
  pub generated:              GeneratedVariation,
  pub cache_duration_seconds: u32,
  pub trigger_source:         TriggerSource,
  pub visitor_journey_id:     Option<String>,
}

// ─── Analytics types ─────────────────────────────────────────────────────────

/// Optional date-range filter on `created_at`.
#[derive(Debug, Clone, Default)]
pub struct AnalyticsRange {
  pub start: Option<DateTime<Utc>>,
  pub end:   Option<DateTime<Utc>>,
}

/// Rollup for one `intent.visitor_segment` value.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SegmentStat {
  pub visitor_segment:    String,
  pub count:              u64,
  pub average_confidence: Option<f64>,
}

/// One entry in the top-applied list.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct TopApplied {
  pub id:              Uuid,
  pub page_url:        String,
  pub times_applied:   i64,
  pub visitor_segment: Option<String>,
}

/// Read-only rollups over an organization's records. Pure aggregation,
/// no write side effects.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct AnalyticsSummary {
  pub total:               u64,
  pub generated:           u64,
  pub applied:             u64,
  pub failed:              u64,
  pub total_times_applied: i64,
  pub average_confidence:  Option<f64>,
  pub segments:            Vec<SegmentStat>,
  pub top_applied:         Vec<TopApplied>,
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over a Tailor persistence backend.
///
/// The `(visitor_id, page_url_hash, organization_id)` triple identifies at
/// most one live record; `register`, `commit`, and `mark_failed` are all
/// upserts on it. The backend must provide atomic upsert-on-key and atomic
/// increment-and-set for the cache-hit bookkeeping; no other synchronization
/// is assumed.
pub trait PersonalizationStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Record lifecycle ──────────────────────────────────────────────────

  /// Idempotently upsert a page schema registration. Updates the schema and
  /// URL on an existing record; sets `status = Pending` and a 24h expiry
  /// only when the row is first created — re-registering an
  /// already-generated record must not reset its status or expiry.
  fn register(
    &self,
    input: NewRegistration,
  ) -> impl Future<Output = Result<PersonalizationRecord, Self::Error>> + Send + '_;

  /// Cache lookup. Returns `Some` iff a servable record exists for the
  /// triple (`status ∈ {Generated, Applied}` and `expires_at > now`). On a
  /// hit, atomically increments `times_applied`, stamps `last_applied_at`,
  /// and sets `status = Applied`; the returned record is the pre-increment
  /// snapshot. A miss is `None`, never an error.
  fn cached(
    &self,
    visitor_id: &str,
    page_url: &str,
    organization_id: &str,
  ) -> impl Future<Output = Result<Option<PersonalizationRecord>, Self::Error>> + Send;

  /// Upsert a successful pipeline result: `status = Generated`,
  /// `expires_at = now + cache_duration_seconds`, `error_message` cleared.
  fn commit(
    &self,
    input: CommitInput,
  ) -> impl Future<Output = Result<PersonalizationRecord, Self::Error>> + Send + '_;

  /// Record a pipeline failure. Sets `status = Failed` only when the key
  /// holds no still-servable variation; a failed refresh of a valid cache
  /// entry records the message but leaves the entry servable.
  fn mark_failed(
    &self,
    key: &RecordKey,
    message: &str,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send;

  // ── Point reads and deletes ───────────────────────────────────────────

  /// Fetch a record by id. Returns `None` if not found.
  fn get(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<PersonalizationRecord>, Self::Error>> + Send + '_;

  /// Delete a record by id. Returns `false` if nothing was deleted.
  fn delete(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// Garbage-collect records with `expires_at < now`, optionally scoped to
  /// one organization. Returns the number of rows deleted.
  fn purge_expired(
    &self,
    organization_id: Option<&str>,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send;

  // ── Analytics ─────────────────────────────────────────────────────────

  fn analytics(
    &self,
    organization_id: &str,
    range: &AnalyticsRange,
  ) -> impl Future<Output = Result<AnalyticsSummary, Self::Error>> + Send;

  // ── Organization settings ─────────────────────────────────────────────

  fn organization(
    &self,
    organization_id: &str,
  ) -> impl Future<Output = Result<Option<OrgSettings>, Self::Error>> + Send;

  /// Persist the shared page schema used by later pre-generation runs.
  fn store_page_schema(
    &self,
    organization_id: &str,
    page_schema: &serde_json::Value,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send;

  /// Persist the brand/reference content quoted into prompts.
  fn store_reference_content(
    &self,
    organization_id: &str,
    content: &str,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send;

  /// Persist a merged persona variation map plus the schema it was
  /// generated against and the batch timestamp.
  fn save_persona_variations(
    &self,
    organization_id: &str,
    variations: &BTreeMap<String, PersonaVariationEntry>,
    page_schema: &serde_json::Value,
    generated_at: DateTime<Utc>,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send;
}
