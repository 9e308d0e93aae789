//! Persona pre-generation types.
//!
//! Persona variations are visitor-agnostic: matched by UTM/persona key at
//! serve time instead of per-visitor behavioral inference. They live as a
//! map-valued field on the organization's settings row, not as
//! personalization records.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::variation::Variation;

/// Reserved key for the passthrough entry every stored map carries.
pub const DEFAULT_PERSONA_KEY: &str = "default";

/// A named, keyword-tagged visitor archetype submitted for pre-generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonaSpec {
  pub key:      String,
  #[serde(default)]
  pub keywords: Vec<String>,
  pub prompt:   String,
}

/// One long-lived entry in an organization's persona variation map.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonaVariationEntry {
  pub key:                 String,
  #[serde(default)]
  pub keywords:            Vec<String>,
  pub variation:           Variation,
  pub confidence:          f64,
  pub generated_at:        DateTime<Utc>,
  /// Hash of the reference content the batch was generated against; lets
  /// callers detect stale entries after a content change.
  pub source_content_hash: String,
}

impl PersonaVariationEntry {
  /// The reserved `default` entry: no edits, full confidence.
  pub fn passthrough(generated_at: DateTime<Utc>, source_content_hash: String) -> Self {
    Self {
      key: DEFAULT_PERSONA_KEY.to_owned(),
      keywords: Vec::new(),
      variation: Variation::passthrough(),
      confidence: 1.0,
      generated_at,
      source_content_hash,
    }
  }
}

/// Per-organization configuration consumed by the pipelines.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrgSettings {
  pub organization_id:    String,
  /// Shared page schema for pre-generation, stored ahead of batch runs.
  pub page_schema:        Option<serde_json::Value>,
  /// Brand/reference material quoted (truncated) into prompts and hashed
  /// into `source_content_hash`.
  pub reference_content:  Option<String>,
  #[serde(default)]
  pub persona_variations: BTreeMap<String, PersonaVariationEntry>,
  pub last_generated_at:  Option<DateTime<Utc>>,
}

/// A per-persona failure inside a batch run. Informational, never fatal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonaError {
  pub key:     String,
  pub message: String,
}

/// Result of one persona batch run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonaBatchReport {
  pub variations:   BTreeMap<String, PersonaVariationEntry>,
  pub generated_at: DateTime<Utc>,
  pub errors:       Vec<PersonaError>,
}
