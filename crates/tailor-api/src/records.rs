//! Handlers for `/personalizations` endpoints.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `GET`    | `/personalizations/cached` | `?visitor_id=&page_url=&organization_id=` |
//! | `POST`   | `/personalizations/schema` | Register a page schema (upsert) |
//! | `POST`   | `/personalizations/generate` | Full pipeline run, synchronous |
//! | `GET`    | `/personalizations/:id` | 404 if not found |
//! | `DELETE` | `/personalizations/:id` | 404 if not found |
//! | `POST`   | `/personalizations/cleanup` | Optional `?organization_id=` |

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tailor_core::{
  ports::{IntentExtractor, QualityJudge, VariationGenerator},
  record::{NewRegistration, PersonalizationRecord, TriggerSource},
  store::PersonalizationStore,
  variation::Variation,
};
use tailor_pipeline::GenerateRequest;
use tracing::warn;
use uuid::Uuid;

use crate::{AppState, error::ApiError};

fn require(field: &str, value: &str) -> Result<(), ApiError> {
  if value.trim().is_empty() {
    return Err(ApiError::BadRequest(format!("{field} must not be empty")));
  }
  Ok(())
}

// ─── Cache lookup ─────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CachedParams {
  pub visitor_id:      String,
  pub page_url:        String,
  pub organization_id: String,
}

/// Intent fields worth exposing on the serve path; the full intent stays
/// server-side.
#[derive(Debug, Serialize)]
pub struct IntentSummary {
  pub visitor_segment: String,
  pub urgency_level:   String,
}

#[derive(Debug, Serialize)]
pub struct CachedResponse {
  pub cached:             bool,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub personalization_id: Option<Uuid>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub variation:          Option<Variation>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub intent:             Option<IntentSummary>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub expires_at:         Option<DateTime<Utc>>,
}

impl CachedResponse {
  fn miss() -> Self {
    Self {
      cached:             false,
      personalization_id: None,
      variation:          None,
      intent:             None,
      expires_at:         None,
    }
  }

  fn hit(record: PersonalizationRecord) -> Self {
    Self {
      cached:             true,
      personalization_id: Some(record.id),
      intent:             record.intent.map(|i| IntentSummary {
        visitor_segment: i.visitor_segment,
        urgency_level:   i.urgency_level,
      }),
      variation:          record.variation,
      expires_at:         Some(record.expires_at),
    }
  }
}

/// `GET /personalizations/cached` — a miss is a 200 with `cached: false`,
/// never a 404.
pub async fn cached<S, I, G, J>(
  State(state): State<AppState<S, I, G, J>>,
  Query(params): Query<CachedParams>,
) -> Result<Json<CachedResponse>, ApiError>
where
  S: PersonalizationStore + 'static,
  S::Error: std::error::Error + Send + Sync + 'static,
  I: IntentExtractor + 'static,
  G: VariationGenerator + 'static,
  J: QualityJudge + 'static,
{
  require("visitor_id", &params.visitor_id)?;
  require("page_url", &params.page_url)?;
  require("organization_id", &params.organization_id)?;

  let hit = state
    .store
    .cached(&params.visitor_id, &params.page_url, &params.organization_id)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?;

  Ok(Json(match hit {
    Some(record) => CachedResponse::hit(record),
    None => CachedResponse::miss(),
  }))
}

// ─── Registration and generation ──────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct RegisterBody {
  pub visitor_id:         String,
  pub page_url:           String,
  pub organization_id:    String,
  pub page_schema:        Value,
  #[serde(default)]
  pub trigger_source:     TriggerSource,
  #[serde(default)]
  pub visitor_journey_id: Option<String>,
}

/// `POST /personalizations/schema` — idempotent upsert of a page schema.
pub async fn register<S, I, G, J>(
  State(state): State<AppState<S, I, G, J>>,
  Json(body): Json<RegisterBody>,
) -> Result<Json<PersonalizationRecord>, ApiError>
where
  S: PersonalizationStore + 'static,
  S::Error: std::error::Error + Send + Sync + 'static,
  I: IntentExtractor + 'static,
  G: VariationGenerator + 'static,
  J: QualityJudge + 'static,
{
  require("visitor_id", &body.visitor_id)?;
  require("page_url", &body.page_url)?;
  require("organization_id", &body.organization_id)?;

  let record = state
    .store
    .register(NewRegistration {
      visitor_id:         body.visitor_id,
      page_url:           body.page_url,
      organization_id:    body.organization_id,
      page_schema:        body.page_schema,
      trigger_source:     body.trigger_source,
      visitor_journey_id: body.visitor_journey_id,
    })
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?;
  Ok(Json(record))
}

/// `POST /personalizations/generate` — run the full pipeline and return the
/// committed record.
pub async fn generate<S, I, G, J>(
  State(state): State<AppState<S, I, G, J>>,
  Json(body): Json<RegisterBody>,
) -> Result<Json<PersonalizationRecord>, ApiError>
where
  S: PersonalizationStore + 'static,
  S::Error: std::error::Error + Send + Sync + 'static,
  I: IntentExtractor + 'static,
  G: VariationGenerator + 'static,
  J: QualityJudge + 'static,
{
  require("visitor_id", &body.visitor_id)?;
  require("page_url", &body.page_url)?;
  require("organization_id", &body.organization_id)?;

  let record = state
    .engine
    .generate(GenerateRequest {
      visitor_id:         body.visitor_id,
      page_url:           body.page_url,
      organization_id:    body.organization_id,
      page_schema:        body.page_schema,
      trigger_source:     body.trigger_source,
      visitor_journey_id: body.visitor_journey_id,
    })
    .await?;
  Ok(Json(record))
}

// ─── Point reads, deletes, cleanup ────────────────────────────────────────────

/// `GET /personalizations/:id` — expiry is applied read-side, so a stale
/// generated record reports `expired`.
pub async fn get_one<S, I, G, J>(
  State(state): State<AppState<S, I, G, J>>,
  Path(id): Path<Uuid>,
) -> Result<Json<PersonalizationRecord>, ApiError>
where
  S: PersonalizationStore + 'static,
  S::Error: std::error::Error + Send + Sync + 'static,
  I: IntentExtractor + 'static,
  G: VariationGenerator + 'static,
  J: QualityJudge + 'static,
{
  let mut record = state
    .store
    .get(id)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?
    .ok_or_else(|| ApiError::NotFound(format!("personalization {id} not found")))?;
  record.status = record.effective_status(Utc::now());
  Ok(Json(record))
}

/// `DELETE /personalizations/:id`
pub async fn delete_one<S, I, G, J>(
  State(state): State<AppState<S, I, G, J>>,
  Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError>
where
  S: PersonalizationStore + 'static,
  S::Error: std::error::Error + Send + Sync + 'static,
  I: IntentExtractor + 'static,
  G: VariationGenerator + 'static,
  J: QualityJudge + 'static,
{
  let deleted = state
    .store
    .delete(id)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?;
  if !deleted {
    return Err(ApiError::NotFound(format!("personalization {id} not found")));
  }
  Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct CleanupParams {
  pub organization_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CleanupResponse {
  pub deleted_count: u64,
}

/// `POST /personalizations/cleanup[?organization_id=<org>]`
///
/// Garbage collection is best-effort: a store failure degrades to a zero
/// count rather than erroring the transport.
pub async fn cleanup<S, I, G, J>(
  State(state): State<AppState<S, I, G, J>>,
  Query(params): Query<CleanupParams>,
) -> Json<CleanupResponse>
where
  S: PersonalizationStore + 'static,
  S::Error: std::error::Error + Send + Sync + 'static,
  I: IntentExtractor + 'static,
  G: VariationGenerator + 'static,
  J: QualityJudge + 'static,
{
  let deleted_count = match state
    .store
    .purge_expired(params.organization_id.as_deref())
    .await
  {
    Ok(n) => n,
    Err(e) => {
      warn!(error = %e, "cleanup sweep failed; reporting zero deletions");
      0
    }
  };
  Json(CleanupResponse { deleted_count })
}
