//! Visitor intent — the behavioral read produced once per generation run.
//!
//! The extractor is an external capability; these shapes are the contract it
//! must return, not a model of how it reasons. Segment, urgency, and buyer
//! stage are free-form strings on purpose — the upstream capability is not
//! guaranteed to stick to a closed vocabulary.

use serde::{Deserialize, Serialize};

/// The intent derived from a visitor's behavioral signals.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisitorIntent {
  pub primary_intent:         String,
  #[serde(default)]
  pub interest_signals:       Vec<String>,
  pub visitor_segment:        String,
  pub urgency_level:          String,
  pub buyer_stage:            String,
  /// The base generation instruction for this visitor; the orchestration
  /// loop enriches it with schema, reference content, and retry feedback.
  pub personalization_prompt: String,
  #[serde(default)]
  pub recommended_actions:    Vec<String>,
}

/// Provenance handed to the intent extractor. Not validated here — the
/// extractor decides what it can resolve from these identifiers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisitorJourney {
  pub visitor_id:      String,
  pub organization_id: String,
  pub journey_id:      Option<String>,
}
