//! Encoding and decoding helpers between Rust domain types and the
//! plain-text representations stored in SQLite columns.
//!
//! All timestamps are stored as RFC 3339 strings. Structured fields
//! (intent, variation, judge summary, persona maps) are stored as compact
//! JSON. UUIDs are stored as hyphenated lowercase strings.

use chrono::{DateTime, Utc};
use tailor_core::record::{PersonalizationRecord, RecordStatus, TriggerSource};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ─────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── RecordStatus ────────────────────────────────────────────────────────────

pub fn encode_status(s: RecordStatus) -> &'static str {
  match s {
    RecordStatus::Pending => "pending",
    RecordStatus::Generated => "generated",
    RecordStatus::Applied => "applied",
    RecordStatus::Expired => "expired",
    RecordStatus::Failed => "failed",
  }
}

pub fn decode_status(s: &str) -> Result<RecordStatus> {
  match s {
    "pending" => Ok(RecordStatus::Pending),
    "generated" => Ok(RecordStatus::Generated),
    "applied" => Ok(RecordStatus::Applied),
    "expired" => Ok(RecordStatus::Expired),
    "failed" => Ok(RecordStatus::Failed),
    other => Err(Error::UnknownStatus(other.to_owned())),
  }
}

// ─── TriggerSource ───────────────────────────────────────────────────────────

pub fn encode_trigger_source(t: TriggerSource) -> &'static str {
  match t {
    TriggerSource::Behavior => "behavior",
    TriggerSource::Chat => "chat",
    TriggerSource::Manual => "manual",
    TriggerSource::Api => "api",
  }
}

pub fn decode_trigger_source(s: &str) -> Result<TriggerSource> {
  match s {
    "behavior" => Ok(TriggerSource::Behavior),
    "chat" => Ok(TriggerSource::Chat),
    "manual" => Ok(TriggerSource::Manual),
    "api" => Ok(TriggerSource::Api),
    other => Err(Error::UnknownTriggerSource(other.to_owned())),
  }
}

// ─── Row mapping ─────────────────────────────────────────────────────────────

/// Column list shared by every `SELECT` over `personalizations`; must stay
/// in sync with [`RawRecord::from_row`].
pub const RECORD_COLUMNS: &str = "id, visitor_id, organization_id, page_url, page_url_hash, \
   page_schema, intent, variation, judge, cache_duration_seconds, expires_at, \
   times_applied, last_applied_at, status, error_message, trigger_source, \
   visitor_journey_id, created_at, updated_at";

/// A `personalizations` row as read from SQLite, before decoding.
pub struct RawRecord {
  pub id:                     String,
  pub visitor_id:             String,
  pub organization_id:        String,
  pub page_url:               String,
  pub page_url_hash:          String,
  pub page_schema:            String,
  pub intent:                 Option<String>,
  pub variation:              Option<String>,
  pub judge:                  Option<String>,
  pub cache_duration_seconds: i64,
  pub expires_at:             String,
  pub times_applied:          i64,
  pub last_applied_at:        Option<String>,
  pub status:                 String,
  pub error_message:          Option<String>,
  pub trigger_source:         String,
  pub visitor_journey_id:     Option<String>,
  pub created_at:             String,
  pub updated_at:             String,
}

impl RawRecord {
  /// Map a row selected with [`RECORD_COLUMNS`].
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:                     row.get(0)?,
      visitor_id:             row.get(1)?,
      organization_id:        row.get(2)?,
      page_url:               row.get(3)?,
      page_url_hash:          row.get(4)?,
      page_schema:            row.get(5)?,
      intent:                 row.get(6)?,
      variation:              row.get(7)?,
      judge:                  row.get(8)?,
      cache_duration_seconds: row.get(9)?,
      expires_at:             row.get(10)?,
      times_applied:          row.get(11)?,
      last_applied_at:        row.get(12)?,
      status:                 row.get(13)?,
      error_message:          row.get(14)?,
      trigger_source:         row.get(15)?,
      visitor_journey_id:     row.get(16)?,
      created_at:             row.get(17)?,
      updated_at:             row.get(18)?,
    })
  }

  pub fn into_record(self) -> Result<PersonalizationRecord> {
    Ok(PersonalizationRecord {
      id:                     decode_uuid(&self.id)?,
      visitor_id:             self.visitor_id,
      organization_id:        self.organization_id,
      page_url:               self.page_url,
      page_url_hash:          self.page_url_hash,
      page_schema:            serde_json::from_str(&self.page_schema)?,
      intent:                 self.intent.as_deref().map(serde_json::from_str).transpose()?,
      variation:              self.variation.as_deref().map(serde_json::from_str).transpose()?,
      judge:                  self.judge.as_deref().map(serde_json::from_str).transpose()?,
      cache_duration_seconds: self.cache_duration_seconds as u32,
      expires_at:             decode_dt(&self.expires_at)?,
      times_applied:          self.times_applied,
      last_applied_at:        self.last_applied_at.as_deref().map(decode_dt).transpose()?,
      status:                 decode_status(&self.status)?,
      error_message:          self.error_message,
      trigger_source:         decode_trigger_source(&self.trigger_source)?,
      visitor_journey_id:     self.visitor_journey_id,
      created_at:             decode_dt(&self.created_at)?,
      updated_at:             decode_dt(&self.updated_at)?,
    })
  }
}
