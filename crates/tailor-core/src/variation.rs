//! Variation — a generated set of selector-addressed page edits.
//!
//! Every entry targets a CSS selector inside the caller-supplied page schema.
//! Arrays are native Rust types here; the store serialises them as JSON
//! columns, never as string-encoded strings.

use serde::{Deserialize, Serialize};

/// What a layout change does to its target element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayoutAction {
  Reorder,
  Hide,
  Show,
  Emphasize,
}

/// A structural edit to the page layout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayoutChange {
  pub selector: String,
  pub action:   LayoutAction,
  /// Action-specific argument, e.g. a target position for `reorder`.
  pub value:    Option<String>,
}

/// A text replacement for one element.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentVariation {
  pub selector:         String,
  pub original_content: Option<String>,
  pub new_content:      String,
}

/// A call-to-action rewrite.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CtaVariation {
  pub selector:   String,
  pub new_text:   String,
  pub new_target: Option<String>,
}

/// A styling nudge; either a class to add or an inline style to apply.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StyleEmphasis {
  pub selector:     String,
  pub css_class:    Option<String>,
  pub inline_style: Option<String>,
}

/// A complete generated variation for one page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Variation {
  pub variation_id:           String,
  /// Generator self-reported certainty, 0.0 ..= 1.0.
  pub confidence:             f64,
  #[serde(default)]
  pub layout_changes:         Vec<LayoutChange>,
  #[serde(default)]
  pub content_variations:     Vec<ContentVariation>,
  #[serde(default)]
  pub cta_variations:         Vec<CtaVariation>,
  #[serde(default)]
  pub style_emphasis:         Vec<StyleEmphasis>,
  pub reasoning:              String,
  /// Generator-recommended TTL for the committed record, in seconds.
  pub cache_duration_seconds: Option<u32>,
}

impl Variation {
  /// The no-op variation used for the reserved `default` persona entry:
  /// serve the page unmodified, with full confidence.
  pub fn passthrough() -> Self {
    Self {
      variation_id:           "default".to_owned(),
      confidence:             1.0,
      layout_changes:         Vec::new(),
      content_variations:     Vec::new(),
      cta_variations:         Vec::new(),
      style_emphasis:         Vec::new(),
      reasoning:              "serve the page unmodified".to_owned(),
      cache_duration_seconds: None,
    }
  }

  /// True when the variation edits nothing.
  pub fn is_empty(&self) -> bool {
    self.layout_changes.is_empty()
      && self.content_variations.is_empty()
      && self.cta_variations.is_empty()
      && self.style_emphasis.is_empty()
  }
}
