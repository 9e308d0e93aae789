//! Quality judgments and the outcome of a pipeline run.
//!
//! A [`Judgment`] is ephemeral — it steers the refine loop and is never
//! persisted standalone. What survives a run is a [`GeneratedVariation`]:
//! the chosen candidate plus the judge metadata that explains how it won.

use serde::{Deserialize, Serialize};

use crate::variation::Variation;

/// The judge's verdict on a single candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JudgeScore {
  Pass,
  NeedsImprovement,
  Fail,
}

/// One evaluation of one candidate against the original content and schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Judgment {
  pub score:                 JudgeScore,
  pub feedback:              String,
  #[serde(default)]
  pub issues:                Vec<String>,
  /// Alignment with the organization's reference content, 0.0 ..= 1.0.
  pub brand_alignment_score: f64,
  /// Prose quality of the generated text, 0.0 ..= 1.0.
  pub text_quality_score:    f64,
  pub reasoning:             String,
}

/// How a pipeline run ended: an explicit judge pass, or the turn budget
/// exhausted with the best-confidence candidate returned as fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JudgeVerdict {
  Pass,
  MaxTurnsReached,
}

/// The final product of a refine-loop run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedVariation {
  pub variation:             Variation,
  /// Index of the turn that produced `variation` (1-based), or the full
  /// budget when the verdict is `MaxTurnsReached`.
  pub judge_turns:           u32,
  pub verdict:               JudgeVerdict,
  /// Scores from the passing judgment; `None` on the fallback path.
  pub brand_alignment_score: Option<f64>,
  pub text_quality_score:    Option<f64>,
}
