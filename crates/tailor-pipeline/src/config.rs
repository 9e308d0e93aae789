//! Pipeline tuning knobs.

use std::time::Duration;

use tailor_core::record::DEFAULT_CACHE_SECONDS;

/// Score substituted for both judge dimensions when a judge outage is
/// treated as a pass under [`JudgeErrorPolicy::FailOpen`].
pub const NEUTRAL_JUDGE_SCORE: f64 = 0.7;

/// What to do when the judge call itself errors, as opposed to returning a
/// failing judgment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JudgeErrorPolicy {
  /// Treat the candidate as passing with neutral scores. Matches the
  /// upstream behavior; a judge outage rubber-stamps candidates instead of
  /// blocking generation.
  #[default]
  FailOpen,
  /// Treat the turn as failed. A judge outage can exhaust the loop, ending
  /// in the best-of-N fallback rather than a synthetic pass.
  Strict,
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
  /// Generate/judge pairs attempted before the best-of-N fallback.
  pub max_turns:             u32,
  pub judge_error_policy:    JudgeErrorPolicy,
  /// TTL applied on commit when the generator recommended none.
  pub default_cache_seconds: u32,
  /// Character budget for the reference-content excerpt in prompts.
  pub content_excerpt_chars: usize,
  pub intent_timeout:        Duration,
  pub generation_timeout:    Duration,
  pub judge_timeout:         Duration,
}

impl Default for PipelineConfig {
  fn default() -> Self {
    Self {
      max_turns:             3,
      judge_error_policy:    JudgeErrorPolicy::default(),
      default_cache_seconds: DEFAULT_CACHE_SECONDS,
      content_excerpt_chars: 6000,
      intent_timeout:        Duration::from_secs(30),
      generation_timeout:    Duration::from_secs(120),
      judge_timeout:         Duration::from_secs(30),
    }
  }
}
