//! HTTP client for the inference service, implementing all three
//! capability ports against its JSON endpoints.

use std::time::Duration;

use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use tailor_core::{
  CapabilityError,
  intent::{VisitorIntent, VisitorJourney},
  judgment::Judgment,
  ports::{IntentExtractor, QualityJudge, VariationGenerator},
  variation::Variation,
};

use crate::config::InferenceConfig;

/// Cloning is cheap — `reqwest::Client` is reference-counted, so one client
/// can back all three ports on the engine.
#[derive(Clone)]
pub struct InferenceClient {
  base_url: String,
  api_key:  String,
  client:   reqwest::Client,
}

impl InferenceClient {
  pub fn new(config: &InferenceConfig) -> Result<Self, CapabilityError> {
    let client = reqwest::Client::builder()
      .timeout(Duration::from_secs(config.request_timeout_seconds))
      .build()
      .map_err(|e| CapabilityError::new(format!("failed to build inference client: {e}")))?;
    Ok(Self {
      base_url: config.base_url.trim_end_matches('/').to_owned(),
      api_key:  config.api_key.clone(),
      client,
    })
  }

  async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T, CapabilityError>
  where
    B: Serialize,
    T: DeserializeOwned,
  {
    let url = format!("{}{path}", self.base_url);
    let response = self
      .client
      .post(&url)
      .bearer_auth(&self.api_key)
      .json(body)
      .send()
      .await
      .map_err(|e| CapabilityError::new(format!("request to {path} failed: {e}")))?;

    let status = response.status();
    if !status.is_success() {
      let text = response
        .text()
        .await
        .unwrap_or_else(|_| "<body unavailable>".to_owned());
      return Err(CapabilityError::new(format!("{path} returned {status}: {text}")));
    }

    response
      .json()
      .await
      .map_err(|e| CapabilityError::new(format!("failed to decode {path} response: {e}")))
  }
}

#[derive(Serialize)]
struct VariationRequest<'a> {
  prompt:           &'a str,
  page_schema:      &'a Value,
  visitor_id:       &'a str,
  #[serde(skip_serializing_if = "Option::is_none")]
  original_content: Option<&'a str>,
}

#[derive(Serialize)]
struct JudgmentRequest<'a> {
  variation:        &'a Variation,
  page_schema:      &'a Value,
  #[serde(skip_serializing_if = "Option::is_none")]
  original_content: Option<&'a str>,
}

impl IntentExtractor for InferenceClient {
  async fn extract(&self, journey: &VisitorJourney) -> Result<VisitorIntent, CapabilityError> {
    self.post_json("/v1/intent", journey).await
  }
}

impl VariationGenerator for InferenceClient {
  async fn generate(
    &self,
    prompt: &str,
    page_schema: &Value,
    visitor_id: &str,
    original_content: Option<&str>,
  ) -> Result<Variation, CapabilityError> {
    self
      .post_json("/v1/variations", &VariationRequest {
        prompt,
        page_schema,
        visitor_id,
        original_content,
      })
      .await
  }
}

impl QualityJudge for InferenceClient {
  async fn evaluate(
    &self,
    variation: &Variation,
    original_content: Option<&str>,
    page_schema: &Value,
  ) -> Result<Judgment, CapabilityError> {
    self
      .post_json("/v1/judgments", &JudgmentRequest {
        variation,
        page_schema,
        original_content,
      })
      .await
  }
}
