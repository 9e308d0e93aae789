//! Handlers for `/organizations/:org` persona and settings endpoints.

use std::collections::BTreeMap;

use axum::{
  Json,
  extract::{Path, State},
  response::IntoResponse,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tailor_core::{
  persona::{PersonaBatchReport, PersonaSpec, PersonaVariationEntry},
  ports::{IntentExtractor, QualityJudge, VariationGenerator},
  store::PersonalizationStore,
};

use crate::{AppState, error::ApiError};

// ─── Persona map ──────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct PersonaMapResponse {
  pub variations:        BTreeMap<String, PersonaVariationEntry>,
  pub last_generated_at: Option<DateTime<Utc>>,
}

/// `GET /organizations/:org/personas` — an organization with no stored
/// settings gets an empty map, not a 404.
pub async fn list<S, I, G, J>(
  State(state): State<AppState<S, I, G, J>>,
  Path(org): Path<String>,
) -> Result<Json<PersonaMapResponse>, ApiError>
where
  S: PersonalizationStore + 'static,
  S::Error: std::error::Error + Send + Sync + 'static,
  I: IntentExtractor + 'static,
  G: VariationGenerator + 'static,
  J: QualityJudge + 'static,
{
  let settings = state
    .store
    .organization(&org)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?;

  Ok(Json(match settings {
    Some(s) => PersonaMapResponse {
      variations:        s.persona_variations,
      last_generated_at: s.last_generated_at,
    },
    None => PersonaMapResponse { variations: BTreeMap::new(), last_generated_at: None },
  }))
}

// ─── Batch generation ─────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct GenerateBatchBody {
  pub personas:    Vec<PersonaSpec>,
  /// Falls back to the organization's stored schema when absent.
  #[serde(default)]
  pub page_schema: Option<Value>,
}

/// `POST /organizations/:org/personas/generate`
pub async fn generate_batch<S, I, G, J>(
  State(state): State<AppState<S, I, G, J>>,
  Path(org): Path<String>,
  Json(body): Json<GenerateBatchBody>,
) -> Result<Json<PersonaBatchReport>, ApiError>
where
  S: PersonalizationStore + 'static,
  S::Error: std::error::Error + Send + Sync + 'static,
  I: IntentExtractor + 'static,
  G: VariationGenerator + 'static,
  J: QualityJudge + 'static,
{
  if body.personas.is_empty() {
    return Err(ApiError::BadRequest("personas must not be empty".to_owned()));
  }
  for persona in &body.personas {
    if persona.key.trim().is_empty() {
      return Err(ApiError::BadRequest("persona key must not be empty".to_owned()));
    }
  }

  let report = state
    .engine
    .pregenerate(&org, &body.personas, body.page_schema)
    .await?;
  Ok(Json(report))
}

// ─── Organization settings ────────────────────────────────────────────────────

/// `PUT /organizations/:org/schema` — body is the schema document itself.
pub async fn put_schema<S, I, G, J>(
  State(state): State<AppState<S, I, G, J>>,
  Path(org): Path<String>,
  Json(schema): Json<Value>,
) -> Result<impl IntoResponse, ApiError>
where
  S: PersonalizationStore + 'static,
  S::Error: std::error::Error + Send + Sync + 'static,
  I: IntentExtractor + 'static,
  G: VariationGenerator + 'static,
  J: QualityJudge + 'static,
{
  if schema.is_null() {
    return Err(ApiError::BadRequest("page schema must not be null".to_owned()));
  }
  state
    .store
    .store_page_schema(&org, &schema)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?;
  Ok(Json(serde_json::json!({ "ok": true })))
}

#[derive(Debug, Deserialize)]
pub struct PutContentBody {
  pub content: String,
}

/// `PUT /organizations/:org/content` — the reference content quoted into
/// generation prompts.
pub async fn put_content<S, I, G, J>(
  State(state): State<AppState<S, I, G, J>>,
  Path(org): Path<String>,
  Json(body): Json<PutContentBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: PersonalizationStore + 'static,
  S::Error: std::error::Error + Send + Sync + 'static,
  I: IntentExtractor + 'static,
  G: VariationGenerator + 'static,
  J: QualityJudge + 'static,
{
  state
    .store
    .store_reference_content(&org, &body.content)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?;
  Ok(Json(serde_json::json!({ "ok": true })))
}
