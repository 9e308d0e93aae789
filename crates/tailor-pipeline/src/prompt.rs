//! Prompt assembly for the generation port.
//!
//! The rendered text is configuration, not logic: a base instruction, the
//! page schema, the visitor, an optional reference-content excerpt, and —
//! on retries — one feedback block per prior `needs_improvement` turn.

use serde_json::Value;

/// Feedback retained from one `needs_improvement` judgment. `fail`
/// judgments never enter the history.
#[derive(Debug, Clone)]
pub struct TurnFeedback {
  pub turn:                  u32,
  pub feedback:              String,
  pub issues:                Vec<String>,
  pub brand_alignment_score: f64,
  pub text_quality_score:    f64,
}

/// Render the full prompt for one generation turn.
pub fn build_prompt(
  base_instruction: &str,
  page_schema: &Value,
  visitor_id: &str,
  original_content: Option<&str>,
  history: &[TurnFeedback],
  excerpt_chars: usize,
) -> String {
  let mut out = String::new();

  out.push_str(base_instruction);
  out.push_str("\n\n## Page schema\n");
  out.push_str(
    &serde_json::to_string_pretty(page_schema).unwrap_or_else(|_| page_schema.to_string()),
  );
  out.push_str("\n\n## Visitor\n");
  out.push_str(visitor_id);

  if let Some(content) = original_content {
    out.push_str("\n\n## Reference content (excerpt)\n");
    out.push_str(truncate_chars(content, excerpt_chars));
  }

  for entry in history {
    out.push_str(&format!(
      "\n\n## Feedback from attempt {} (brand {:.2}, text {:.2})\n{}",
      entry.turn, entry.brand_alignment_score, entry.text_quality_score, entry.feedback,
    ));
    for issue in &entry.issues {
      out.push_str("\n- ");
      out.push_str(issue);
    }
  }

  if !history.is_empty() {
    out.push_str("\n\nRevise the variation to address every issue listed above.");
  }

  out
}

/// Truncate to at most `limit` characters, on a character boundary.
fn truncate_chars(s: &str, limit: usize) -> &str {
  match s.char_indices().nth(limit) {
    Some((idx, _)) => &s[..idx],
    None => s,
  }
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;

  fn feedback(turn: u32, text: &str, issues: &[&str]) -> TurnFeedback {
    TurnFeedback {
      turn,
      feedback: text.to_owned(),
      issues: issues.iter().map(|s| (*s).to_owned()).collect(),
      brand_alignment_score: 0.55,
      text_quality_score: 0.6,
    }
  }

  #[test]
  fn includes_schema_visitor_and_instruction() {
    let prompt = build_prompt(
      "Rewrite the hero for this visitor.",
      &json!({"sections": [{"selector": "#hero"}]}),
      "visitor-9",
      None,
      &[],
      6000,
    );
    assert!(prompt.starts_with("Rewrite the hero for this visitor."));
    assert!(prompt.contains("#hero"));
    assert!(prompt.contains("visitor-9"));
    assert!(!prompt.contains("Revise the variation"));
  }

  #[test]
  fn excerpt_is_truncated_to_budget() {
    let content = "c".repeat(7000);
    let prompt = build_prompt("base", &json!({}), "v", Some(&content), &[], 6000);
    assert!(prompt.contains(&"c".repeat(6000)));
    assert!(!prompt.contains(&"c".repeat(6001)));
  }

  #[test]
  fn history_renders_scores_issues_and_revise_instruction() {
    let history = vec![
      feedback(1, "headline drifts off-brand", &["tone too casual", "CTA vague"]),
      feedback(2, "better, tighten the CTA", &["CTA still vague"]),
    ];
    let prompt = build_prompt("base", &json!({}), "v", None, &history, 6000);
    assert!(prompt.contains("Feedback from attempt 1 (brand 0.55, text 0.60)"));
    assert!(prompt.contains("headline drifts off-brand"));
    assert!(prompt.contains("- tone too casual"));
    assert!(prompt.contains("Feedback from attempt 2"));
    assert!(prompt.contains("Revise the variation to address every issue listed above."));
  }

  #[test]
  fn truncation_respects_multibyte_boundaries() {
    let content = "héllo wörld".repeat(10);
    // Must not panic on a non-ASCII boundary.
    let prompt = build_prompt("base", &json!({}), "v", Some(&content), &[], 5);
    assert!(prompt.contains("héllo"));
  }
}
