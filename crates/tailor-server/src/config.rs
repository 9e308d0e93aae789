//! Server configuration, loaded from `config.toml` plus `TAILOR_*`
//! environment overrides.

use std::{
  path::{Path, PathBuf},
  time::Duration,
};

use anyhow::Context as _;
use serde::Deserialize;
use tailor_pipeline::{JudgeErrorPolicy, PipelineConfig};

/// Load the file at `path` (if present) with `TAILOR_*` environment
/// overrides on top. `TAILOR_INFERENCE__API_KEY` reaches nested fields.
pub fn load(path: &Path) -> anyhow::Result<ServerConfig> {
  let settings = ::config::Config::builder()
    .add_source(::config::File::from(path.to_path_buf()).required(false))
    .add_source(::config::Environment::with_prefix("TAILOR").separator("__"))
    .build()
    .context("failed to read config file")?;
  settings
    .try_deserialize()
    .context("failed to deserialise ServerConfig")
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
  pub host:       String,
  pub port:       u16,
  pub store_path: PathBuf,
  pub inference:  InferenceConfig,
  #[serde(default)]
  pub pipeline:   PipelineSettings,
}

/// Where the generation/judgment service lives.
#[derive(Debug, Clone, Deserialize)]
pub struct InferenceConfig {
  pub base_url:                String,
  pub api_key:                 String,
  #[serde(default = "default_request_timeout")]
  pub request_timeout_seconds: u64,
}

fn default_request_timeout() -> u64 {
  120
}

/// Pipeline knobs as they appear in the config file. Durations are plain
/// second counts there; [`PipelineSettings::to_pipeline_config`] converts.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
  pub max_turns:                  u32,
  pub judge_fail_open:            bool,
  pub default_cache_seconds:      u32,
  pub content_excerpt_chars:      usize,
  pub intent_timeout_seconds:     u64,
  pub generation_timeout_seconds: u64,
  pub judge_timeout_seconds:      u64,
}

impl Default for PipelineSettings {
  fn default() -> Self {
    let defaults = PipelineConfig::default();
    Self {
      max_turns:                  defaults.max_turns,
      judge_fail_open:            true,
      default_cache_seconds:      defaults.default_cache_seconds,
      content_excerpt_chars:      defaults.content_excerpt_chars,
      intent_timeout_seconds:     defaults.intent_timeout.as_secs(),
      generation_timeout_seconds: defaults.generation_timeout.as_secs(),
      judge_timeout_seconds:      defaults.judge_timeout.as_secs(),
    }
  }
}

impl PipelineSettings {
  pub fn to_pipeline_config(&self) -> PipelineConfig {
    PipelineConfig {
      max_turns:             self.max_turns,
      judge_error_policy:    if self.judge_fail_open {
        JudgeErrorPolicy::FailOpen
      } else {
        JudgeErrorPolicy::Strict
      },
      default_cache_seconds: self.default_cache_seconds,
      content_excerpt_chars: self.content_excerpt_chars,
      intent_timeout:        Duration::from_secs(self.intent_timeout_seconds),
      generation_timeout:    Duration::from_secs(self.generation_timeout_seconds),
      judge_timeout:         Duration::from_secs(self.judge_timeout_seconds),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn settings_default_matches_pipeline_defaults() {
    let config = PipelineSettings::default().to_pipeline_config();
    let defaults = PipelineConfig::default();
    assert_eq!(config.max_turns, defaults.max_turns);
    assert_eq!(config.judge_error_policy, JudgeErrorPolicy::FailOpen);
    assert_eq!(config.default_cache_seconds, defaults.default_cache_seconds);
    assert_eq!(config.generation_timeout, defaults.generation_timeout);
  }

  #[test]
  fn strict_policy_comes_from_judge_fail_open() {
    let settings = PipelineSettings { judge_fail_open: false, ..Default::default() };
    assert_eq!(
      settings.to_pipeline_config().judge_error_policy,
      JudgeErrorPolicy::Strict
    );
  }
}
