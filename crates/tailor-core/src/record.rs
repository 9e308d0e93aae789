//! PersonalizationRecord — the unit of work and the cache entry.
//!
//! Exactly one live record exists per `(visitor_id, page_url_hash,
//! organization_id)`; every write is an upsert on that key. Expiry is a
//! read-side predicate on `expires_at`, not a stored transition — the store
//! never writes [`RecordStatus::Expired`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  hash::page_url_hash,
  intent::VisitorIntent,
  judgment::{GeneratedVariation, JudgeVerdict},
  variation::Variation,
};

/// TTL applied when a schema is first registered, before any generation.
pub const REGISTRATION_TTL_SECONDS: u32 = 86_400;

/// TTL applied on commit when the generator recommended none.
pub const DEFAULT_CACHE_SECONDS: u32 = 43_200;

/// Where a generation request originated. Provenance only, never validated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TriggerSource {
  Behavior,
  Chat,
  Manual,
  #[default]
  Api,
}

/// Lifecycle state of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordStatus {
  Pending,
  Generated,
  Applied,
  Expired,
  Failed,
}

/// The compound cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordKey {
  pub visitor_id:      String,
  pub page_url_hash:   String,
  pub organization_id: String,
}

impl RecordKey {
  /// Derive the key for a visitor/page/organization triple.
  pub fn derive(visitor_id: &str, page_url: &str, organization_id: &str) -> Self {
    Self {
      visitor_id:      visitor_id.to_owned(),
      page_url_hash:   page_url_hash(page_url),
      organization_id: organization_id.to_owned(),
    }
  }
}

/// Judge-loop metadata persisted alongside a committed variation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JudgeSummary {
  pub judge_turns:           u32,
  pub verdict:               JudgeVerdict,
  pub brand_alignment_score: Option<f64>,
  pub text_quality_score:    Option<f64>,
}

impl From<&GeneratedVariation> for JudgeSummary {
  fn from(g: &GeneratedVariation) -> Self {
    Self {
      judge_turns:           g.judge_turns,
      verdict:               g.verdict,
      brand_alignment_score: g.brand_alignment_score,
      text_quality_score:    g.text_quality_score,
    }
  }
}

/// A personalization record: one visitor, one page, one organization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonalizationRecord {
  pub id:                     Uuid,
  pub visitor_id:             String,
  pub organization_id:        String,
  pub page_url:               String,
  pub page_url_hash:          String,
  /// Structural description of the page, stored verbatim.
  pub page_schema:            serde_json::Value,
  pub intent:                 Option<VisitorIntent>,
  pub variation:              Option<Variation>,
  pub judge:                  Option<JudgeSummary>,
  pub cache_duration_seconds: u32,
  pub expires_at:             DateTime<Utc>,
  pub times_applied:          i64,
  pub last_applied_at:        Option<DateTime<Utc>>,
  pub status:                 RecordStatus,
  /// Set only by a failed pipeline run.
  pub error_message:          Option<String>,
  pub trigger_source:         TriggerSource,
  pub visitor_journey_id:     Option<String>,
  pub created_at:             DateTime<Utc>,
  pub updated_at:             DateTime<Utc>,
}

impl PersonalizationRecord {
  /// The cache-hit predicate: a generated or applied record that has not
  /// yet expired.
  pub fn is_servable(&self, now: DateTime<Utc>) -> bool {
    matches!(self.status, RecordStatus::Generated | RecordStatus::Applied)
      && self.expires_at > now
  }

  /// The status visible to clients, with expiry applied read-side.
  pub fn effective_status(&self, now: DateTime<Utc>) -> RecordStatus {
    match self.status {
      RecordStatus::Generated | RecordStatus::Applied if self.expires_at <= now => {
        RecordStatus::Expired
      }
      other => other,
    }
  }

  pub fn key(&self) -> RecordKey {
    RecordKey {
      visitor_id:      self.visitor_id.clone(),
      page_url_hash:   self.page_url_hash.clone(),
      organization_id: self.organization_id.clone(),
    }
  }
}

/// Input to [`crate::store::PersonalizationStore::register`].
#[derive(Debug, Clone)]
pub struct NewRegistration {
  pub visitor_id:         String,
  pub page_url:           String,
  pub organization_id:    String,
  pub page_schema:        serde_json::Value,
  pub trigger_source:     TriggerSource,
  pub visitor_journey_id: Option<String>,
}

#[cfg(test)]
mod tests {
  use chrono::Duration;

  use super::*;

  fn record(status: RecordStatus, expires_in: i64) -> PersonalizationRecord {
    let now = Utc::now();
    PersonalizationRecord {
      id:                     Uuid::new_v4(),
      visitor_id:             "v1".into(),
      organization_id:        "org1".into(),
      page_url:               "/pricing".into(),
      page_url_hash:          page_url_hash("/pricing"),
      page_schema:            serde_json::json!({}),
      intent:                 None,
      variation:              None,
      judge:                  None,
      cache_duration_seconds: DEFAULT_CACHE_SECONDS,
      expires_at:             now + Duration::seconds(expires_in),
      times_applied:          0,
      last_applied_at:        None,
      status,
      error_message:          None,
      trigger_source:         TriggerSource::default(),
      visitor_journey_id:     None,
      created_at:             now,
      updated_at:             now,
    }
  }

  #[test]
  fn servable_requires_live_status_and_future_expiry() {
    let now = Utc::now();
    assert!(record(RecordStatus::Generated, 60).is_servable(now));
    assert!(record(RecordStatus::Applied, 60).is_servable(now));
    assert!(!record(RecordStatus::Pending, 60).is_servable(now));
    assert!(!record(RecordStatus::Failed, 60).is_servable(now));
    assert!(!record(RecordStatus::Generated, -60).is_servable(now));
  }

  #[test]
  fn effective_status_expires_live_records_only() {
    let now = Utc::now();
    assert_eq!(
      record(RecordStatus::Generated, -60).effective_status(now),
      RecordStatus::Expired
    );
    assert_eq!(
      record(RecordStatus::Applied, -60).effective_status(now),
      RecordStatus::Expired
    );
    // A stale failed or pending record keeps its stored status.
    assert_eq!(
      record(RecordStatus::Failed, -60).effective_status(now),
      RecordStatus::Failed
    );
    assert_eq!(
      record(RecordStatus::Pending, -60).effective_status(now),
      RecordStatus::Pending
    );
  }

  #[test]
  fn key_derivation_uses_url_hash() {
    let key = RecordKey::derive("v1", "/pricing", "org1");
    assert_eq!(key.page_url_hash, "4dikp");
    assert_eq!(key, record(RecordStatus::Pending, 60).key());
  }
}
