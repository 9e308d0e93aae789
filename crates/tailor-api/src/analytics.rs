//! Handler for `/organizations/:org/analytics`.

use axum::{
  Json,
  extract::{Path, Query, State},
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tailor_core::{
  ports::{IntentExtractor, QualityJudge, VariationGenerator},
  store::{AnalyticsRange, AnalyticsSummary, PersonalizationStore},
};
use tracing::warn;

use crate::{AppState, error::ApiError};

#[derive(Debug, Deserialize)]
pub struct AnalyticsParams {
  pub start: Option<DateTime<Utc>>,
  pub end:   Option<DateTime<Utc>>,
}

/// `GET /organizations/:org/analytics[?start=<rfc3339>&end=<rfc3339>]`
///
/// Reporting is best-effort: a store failure degrades to an empty summary
/// rather than erroring the transport.
pub async fn summary<S, I, G, J>(
  State(state): State<AppState<S, I, G, J>>,
  Path(org): Path<String>,
  Query(params): Query<AnalyticsParams>,
) -> Result<Json<AnalyticsSummary>, ApiError>
where
  S: PersonalizationStore + 'static,
  S::Error: std::error::Error + Send + Sync + 'static,
  I: IntentExtractor + 'static,
  G: VariationGenerator + 'static,
  J: QualityJudge + 'static,
{
  if let (Some(start), Some(end)) = (params.start, params.end)
    && start > end
  {
    return Err(ApiError::BadRequest("start must not be after end".to_owned()));
  }

  let summary = match state
    .store
    .analytics(&org, &AnalyticsRange { start: params.start, end: params.end })
    .await
  {
    Ok(summary) => summary,
    Err(e) => {
      warn!(organization = %org, error = %e, "analytics query failed; returning empty summary");
      AnalyticsSummary::default()
    }
  };
  Ok(Json(summary))
}
