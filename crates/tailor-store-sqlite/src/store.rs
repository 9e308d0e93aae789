//! [`SqliteStore`] — the SQLite implementation of [`PersonalizationStore`].

use std::{collections::BTreeMap, path::Path};

use chrono::{DateTime, Duration, Utc};
use rusqlite::OptionalExtension as _;
use uuid::Uuid;

use tailor_core::{
  persona::{OrgSettings, PersonaVariationEntry},
  record::{
    JudgeSummary, NewRegistration, PersonalizationRecord, REGISTRATION_TTL_SECONDS, RecordKey,
    RecordStatus,
  },
  store::{
    AnalyticsRange, AnalyticsSummary, CommitInput, PersonalizationStore, SegmentStat, TopApplied,
  },
};

use crate::{
  encode::{
    RECORD_COLUMNS, RawRecord, decode_dt, decode_uuid, encode_dt, encode_status,
    encode_trigger_source, encode_uuid,
  },
  schema::SCHEMA,
  Error, Result,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Tailor personalization store backed by a single SQLite file.
///
/// Cloning is cheap — the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store — useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

}

// ─── PersonalizationStore impl ───────────────────────────────────────────────

impl PersonalizationStore for SqliteStore {
  type Error = Error;

  // ── Record lifecycle ──────────────────────────────────────────────────────

  async fn register(&self, input: NewRegistration) -> Result<PersonalizationRecord> {
    let key = RecordKey::derive(&input.visitor_id, &input.page_url, &input.organization_id);
    let now = Utc::now();

    let id_str = encode_uuid(Uuid::new_v4());
    let now_str = encode_dt(now);
    let expires_str =
      encode_dt(now + Duration::seconds(i64::from(REGISTRATION_TTL_SECONDS)));
    let schema_str = serde_json::to_string(&input.page_schema)?;
    let trigger_str = encode_trigger_source(input.trigger_source).to_owned();

    let status_str = encode_status(RecordStatus::Pending).to_owned();
    let visitor = key.visitor_id.clone();
    let hash = key.page_url_hash.clone();
    let org = key.organization_id.clone();
    let page_url = input.page_url.clone();
    let journey = input.visitor_journey_id.clone();

    let raw = self
      .conn
      .call(move |conn| {
        // Status and expiry apply on insert only: re-registering an
        // already-generated record must not reset either.
        conn.execute(
          "INSERT INTO personalizations (
             id, visitor_id, organization_id, page_url, page_url_hash,
             page_schema, expires_at, status, trigger_source,
             visitor_journey_id, created_at, updated_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?11)
           ON CONFLICT(visitor_id, page_url_hash, organization_id) DO UPDATE SET
             page_url    = excluded.page_url,
             page_schema = excluded.page_schema,
             updated_at  = excluded.updated_at",
          rusqlite::params![
            id_str, visitor, org, page_url, hash, schema_str, expires_str, status_str,
            trigger_str, journey, now_str,
          ],
        )?;
        let raw = conn.query_row(
          &format!(
            "SELECT {RECORD_COLUMNS} FROM personalizations
             WHERE visitor_id = ?1 AND page_url_hash = ?2 AND organization_id = ?3"
          ),
          rusqlite::params![visitor, hash, org],
          RawRecord::from_row,
        )?;
        Ok(raw)
      })
      .await?;

    raw.into_record()
  }

  async fn cached(
    &self,
    visitor_id: &str,
    page_url: &str,
    organization_id: &str,
  ) -> Result<Option<PersonalizationRecord>> {
    let key = RecordKey::derive(visitor_id, page_url, organization_id);
    let now_str = encode_dt(Utc::now());

    let visitor = key.visitor_id;
    let hash = key.page_url_hash;
    let org = key.organization_id;

    let raw = self
      .conn
      .call(move |conn| {
        let raw = conn
          .query_row(
            &format!(
              "SELECT {RECORD_COLUMNS} FROM personalizations
               WHERE visitor_id = ?1 AND page_url_hash = ?2 AND organization_id = ?3
                 AND status IN ('generated', 'applied')
                 AND expires_at > ?4"
            ),
            rusqlite::params![visitor, hash, org, now_str],
            RawRecord::from_row,
          )
          .optional()?;

        // Hit bookkeeping happens on the same connection, so callers see
        // the pre-increment snapshot while the stored row advances.
        if let Some(ref r) = raw {
          conn.execute(
            "UPDATE personalizations
             SET times_applied = times_applied + 1,
                 last_applied_at = ?1,
                 status = 'applied',
                 updated_at = ?1
             WHERE id = ?2",
            rusqlite::params![now_str, r.id],
          )?;
        }
        Ok(raw)
      })
      .await?;

    raw.map(RawRecord::into_record).transpose()
  }

  async fn commit(&self, input: CommitInput) -> Result<PersonalizationRecord> {
    let now = Utc::now();
    let expires = now + Duration::seconds(i64::from(input.cache_duration_seconds));

    let id_str = encode_uuid(Uuid::new_v4());
    let now_str = encode_dt(now);
    let expires_str = encode_dt(expires);
    let schema_str = serde_json::to_string(&input.page_schema)?;
    let intent_str = serde_json::to_string(&input.intent)?;
    let variation_str = serde_json::to_string(&input.generated.variation)?;
    let judge_str = serde_json::to_string(&JudgeSummary::from(&input.generated))?;
    let trigger_str = encode_trigger_source(input.trigger_source).to_owned();
    let cache_secs = i64::from(input.cache_duration_seconds);

    let status_str = encode_status(RecordStatus::Generated).to_owned();
    let visitor = input.key.visitor_id.clone();
    let hash = input.key.page_url_hash.clone();
    let org = input.key.organization_id.clone();
    let page_url = input.page_url.clone();
    let journey = input.visitor_journey_id.clone();

    let raw = self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO personalizations (
             id, visitor_id, organization_id, page_url, page_url_hash,
             page_schema, intent, variation, judge, cache_duration_seconds,
             expires_at, status, error_message, trigger_source,
             visitor_journey_id, created_at, updated_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12,
                     NULL, ?13, ?14, ?15, ?15)
           ON CONFLICT(visitor_id, page_url_hash, organization_id) DO UPDATE SET
             page_url               = excluded.page_url,
             page_schema            = excluded.page_schema,
             intent                 = excluded.intent,
             variation              = excluded.variation,
             judge                  = excluded.judge,
             cache_duration_seconds = excluded.cache_duration_seconds,
             expires_at             = excluded.expires_at,
             status                 = excluded.status,
             error_message          = NULL,
             updated_at             = excluded.updated_at",
          rusqlite::params![
            id_str, visitor, org, page_url, hash, schema_str, intent_str, variation_str,
            judge_str, cache_secs, expires_str, status_str, trigger_str, journey, now_str,
          ],
        )?;
        let raw = conn.query_row(
          &format!(
            "SELECT {RECORD_COLUMNS} FROM personalizations
             WHERE visitor_id = ?1 AND page_url_hash = ?2 AND organization_id = ?3"
          ),
          rusqlite::params![visitor, hash, org],
          RawRecord::from_row,
        )?;
        Ok(raw)
      })
      .await?;

    raw.into_record()
  }

  async fn mark_failed(&self, key: &RecordKey, message: &str) -> Result<()> {
    let now_str = encode_dt(Utc::now());
    let id_str = encode_uuid(Uuid::new_v4());

    let visitor = key.visitor_id.clone();
    let hash = key.page_url_hash.clone();
    let org = key.organization_id.clone();
    let message = message.to_owned();

    self
      .conn
      .call(move |conn| {
        // A failed refresh never evicts a still-servable cache entry: the
        // message is recorded, but status only flips to failed when the
        // key holds nothing servable.
        conn.execute(
          "INSERT INTO personalizations (
             id, visitor_id, organization_id, page_url_hash, expires_at,
             status, error_message, created_at, updated_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, 'failed', ?6, ?5, ?5)
           ON CONFLICT(visitor_id, page_url_hash, organization_id) DO UPDATE SET
             error_message = excluded.error_message,
             status = CASE
               WHEN personalizations.status IN ('generated', 'applied')
                    AND personalizations.expires_at > ?5
               THEN personalizations.status
               ELSE 'failed'
             END,
             updated_at = excluded.updated_at",
          rusqlite::params![id_str, visitor, org, hash, now_str, message],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  // ── Point reads and deletes ───────────────────────────────────────────────

  async fn get(&self, id: Uuid) -> Result<Option<PersonalizationRecord>> {
    let id_str = encode_uuid(id);

    let raw = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {RECORD_COLUMNS} FROM personalizations WHERE id = ?1"),
              rusqlite::params![id_str],
              RawRecord::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawRecord::into_record).transpose()
  }

  async fn delete(&self, id: Uuid) -> Result<bool> {
    let id_str = encode_uuid(id);

    let affected = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "DELETE FROM personalizations WHERE id = ?1",
          rusqlite::params![id_str],
        )?)
      })
      .await?;
    Ok(affected > 0)
  }

  async fn purge_expired(&self, organization_id: Option<&str>) -> Result<u64> {
    let now_str = encode_dt(Utc::now());
    let org = organization_id.map(str::to_owned);

    let affected = self
      .conn
      .call(move |conn| {
        let n = if let Some(org) = org {
          conn.execute(
            "DELETE FROM personalizations WHERE expires_at < ?1 AND organization_id = ?2",
            rusqlite::params![now_str, org],
          )?
        } else {
          conn.execute(
            "DELETE FROM personalizations WHERE expires_at < ?1",
            rusqlite::params![now_str],
          )?
        };
        Ok(n)
      })
      .await?;
    Ok(affected as u64)
  }

  // ── Analytics ─────────────────────────────────────────────────────────────

  async fn analytics(
    &self,
    organization_id: &str,
    range: &AnalyticsRange,
  ) -> Result<AnalyticsSummary> {
    let org = organization_id.to_owned();
    let start_str = range.start.map(encode_dt);
    let end_str = range.end.map(encode_dt);

    struct Row {
      id:            String,
      page_url:      String,
      times_applied: i64,
      status:        String,
      intent:        Option<String>,
      variation:     Option<String>,
    }

    let rows = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT id, page_url, times_applied, status, intent, variation
           FROM personalizations
           WHERE organization_id = ?1
             AND created_at >= COALESCE(?2, created_at)
             AND created_at <= COALESCE(?3, created_at)",
        )?;
        let rows = stmt
          .query_map(
            rusqlite::params![org, start_str.as_deref(), end_str.as_deref()],
            |row| {
              Ok(Row {
                id:            row.get(0)?,
                page_url:      row.get(1)?,
                times_applied: row.get(2)?,
                status:        row.get(3)?,
                intent:        row.get(4)?,
                variation:     row.get(5)?,
              })
            },
          )?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    // Aggregation is tolerant of malformed JSON: analytics degrade to
    // neutral values rather than failing the call.
    let mut summary = AnalyticsSummary { total: rows.len() as u64, ..Default::default() };
    let mut confidence_sum = 0.0_f64;
    let mut confidence_count = 0_u64;
    let mut segments: BTreeMap<String, (u64, f64, u64)> = BTreeMap::new();
    let mut top: Vec<TopApplied> = Vec::new();

    for row in &rows {
      match row.status.as_str() {
        "generated" => summary.generated += 1,
        "applied" => summary.applied += 1,
        "failed" => summary.failed += 1,
        _ => {}
      }
      summary.total_times_applied += row.times_applied;

      let confidence = row
        .variation
        .as_deref()
        .and_then(|v| serde_json::from_str::<serde_json::Value>(v).ok())
        .and_then(|v| v.get("confidence").and_then(serde_json::Value::as_f64));
      if let Some(c) = confidence {
        confidence_sum += c;
        confidence_count += 1;
      }

      let segment = row
        .intent
        .as_deref()
        .and_then(|v| serde_json::from_str::<serde_json::Value>(v).ok())
        .and_then(|v| {
          v.get("visitor_segment")
            .and_then(serde_json::Value::as_str)
            .map(str::to_owned)
        });
      if let Some(ref seg) = segment {
        let entry = segments.entry(seg.clone()).or_insert((0, 0.0, 0));
        entry.0 += 1;
        if let Some(c) = confidence {
          entry.1 += c;
          entry.2 += 1;
        }
      }

      top.push(TopApplied {
        id:              decode_uuid(&row.id)?,
        page_url:        row.page_url.clone(),
        times_applied:   row.times_applied,
        visitor_segment: segment,
      });
    }

    summary.average_confidence = (confidence_count > 0)
      .then(|| confidence_sum / confidence_count as f64);
    summary.segments = segments
      .into_iter()
      .map(|(visitor_segment, (count, sum, n))| SegmentStat {
        visitor_segment,
        count,
        average_confidence: (n > 0).then(|| sum / n as f64),
      })
      .collect();

    top.sort_by(|a, b| b.times_applied.cmp(&a.times_applied));
    top.truncate(10);
    summary.top_applied = top;

    Ok(summary)
  }

  // ── Organization settings ─────────────────────────────────────────────────

  async fn organization(&self, organization_id: &str) -> Result<Option<OrgSettings>> {
    let org = organization_id.to_owned();

    let raw: Option<(String, Option<String>, Option<String>, String, Option<String>)> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT organization_id, page_schema, reference_content,
                      persona_variations, last_generated_at
               FROM organizations WHERE organization_id = ?1",
              rusqlite::params![org],
              |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
              },
            )
            .optional()?,
        )
      })
      .await?;

    let Some((organization_id, schema, content, variations, last_generated)) = raw else {
      return Ok(None);
    };

    Ok(Some(OrgSettings {
      organization_id,
      page_schema: schema.as_deref().map(serde_json::from_str).transpose()?,
      reference_content: content,
      persona_variations: serde_json::from_str(&variations)?,
      last_generated_at: last_generated.as_deref().map(decode_dt).transpose()?,
    }))
  }

  async fn store_page_schema(
    &self,
    organization_id: &str,
    page_schema: &serde_json::Value,
  ) -> Result<()> {
    let org = organization_id.to_owned();
    let schema_str = serde_json::to_string(page_schema)?;

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO organizations (organization_id, page_schema) VALUES (?1, ?2)
           ON CONFLICT(organization_id) DO UPDATE SET page_schema = excluded.page_schema",
          rusqlite::params![org, schema_str],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn store_reference_content(&self, organization_id: &str, content: &str) -> Result<()> {
    let org = organization_id.to_owned();
    let content = content.to_owned();

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO organizations (organization_id, reference_content) VALUES (?1, ?2)
           ON CONFLICT(organization_id) DO UPDATE SET
             reference_content = excluded.reference_content",
          rusqlite::params![org, content],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn save_persona_variations(
    &self,
    organization_id: &str,
    variations: &BTreeMap<String, PersonaVariationEntry>,
    page_schema: &serde_json::Value,
    generated_at: DateTime<Utc>,
  ) -> Result<()> {
    let org = organization_id.to_owned();
    let variations_str = serde_json::to_string(variations)?;
    let schema_str = serde_json::to_string(page_schema)?;
    let at_str = encode_dt(generated_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO organizations (
             organization_id, page_schema, persona_variations, last_generated_at
           ) VALUES (?1, ?2, ?3, ?4)
           ON CONFLICT(organization_id) DO UPDATE SET
             page_schema        = excluded.page_schema,
             persona_variations = excluded.persona_variations,
             last_generated_at  = excluded.last_generated_at",
          rusqlite::params![org, schema_str, variations_str, at_str],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}
