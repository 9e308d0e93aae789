//! Capability ports — the external generation/evaluation boundary.
//!
//! These three traits are consumed by the orchestration layer, never
//! implemented by it. Any implementation satisfies a port as long as it
//! returns the contracted shapes: a remote inference service, a rule-based
//! heuristic, or a human review queue all qualify. The orchestration logic
//! must not assume anything about how a port is implemented.
//!
//! All methods return `Send` futures so the traits can be used in
//! multi-threaded async runtimes (e.g. tokio with `axum`).

use std::future::Future;

use crate::{
  error::CapabilityError,
  intent::{VisitorIntent, VisitorJourney},
  judgment::Judgment,
  variation::Variation,
};

/// Derives an intent from a visitor's journey.
///
/// A failure here aborts the pipeline run; the port itself is not retried.
pub trait IntentExtractor: Send + Sync {
  fn extract(
    &self,
    journey: &VisitorJourney,
  ) -> impl Future<Output = Result<VisitorIntent, CapabilityError>> + Send;
}

/// Produces a candidate variation from a prompt and a page schema.
///
/// Non-deterministic from the caller's point of view: identical inputs may
/// yield different outputs, which is why the judge loop exists.
pub trait VariationGenerator: Send + Sync {
  fn generate(
    &self,
    prompt: &str,
    page_schema: &serde_json::Value,
    visitor_id: &str,
    original_content: Option<&str>,
  ) -> impl Future<Output = Result<Variation, CapabilityError>> + Send;
}

/// Scores a candidate against the original content and page schema.
///
/// Expected to be cheap relative to generation — it is called up to
/// `max_turns` times per pipeline run.
pub trait QualityJudge: Send + Sync {
  fn evaluate(
    &self,
    variation: &Variation,
    original_content: Option<&str>,
    page_schema: &serde_json::Value,
  ) -> impl Future<Output = Result<Judgment, CapabilityError>> + Send;
}
