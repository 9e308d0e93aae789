//! Integration tests for `SqliteStore` against an in-memory database.

use std::collections::BTreeMap;

use chrono::Utc;
use serde_json::json;
use uuid::Uuid;

use tailor_core::{
  intent::VisitorIntent,
  judgment::{GeneratedVariation, JudgeVerdict},
  persona::PersonaVariationEntry,
  record::{NewRegistration, RecordKey, RecordStatus, TriggerSource},
  store::{AnalyticsRange, CommitInput, PersonalizationStore},
  variation::Variation,
};

use crate::SqliteStore;

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

fn page_schema() -> serde_json::Value {
  json!({"sections": [{"selector": "#hero", "elements": ["h1", "p"]}]})
}

fn registration(visitor: &str, url: &str, org: &str) -> NewRegistration {
  NewRegistration {
    visitor_id:         visitor.to_owned(),
    page_url:           url.to_owned(),
    organization_id:    org.to_owned(),
    page_schema:        page_schema(),
    trigger_source:     TriggerSource::Behavior,
    visitor_journey_id: Some("journey-1".to_owned()),
  }
}

fn intent(segment: &str) -> VisitorIntent {
  VisitorIntent {
    primary_intent:         "evaluate pricing".to_owned(),
    interest_signals:       vec!["pricing".to_owned()],
    visitor_segment:        segment.to_owned(),
    urgency_level:          "high".to_owned(),
    buyer_stage:            "decision".to_owned(),
    personalization_prompt: "Emphasise value for money.".to_owned(),
    recommended_actions:    vec![],
  }
}

fn variation(confidence: f64) -> Variation {
  Variation {
    variation_id: Uuid::new_v4().to_string(),
    confidence,
    layout_changes: vec![],
    content_variations: vec![],
    cta_variations: vec![],
    style_emphasis: vec![],
    reasoning: "test".to_owned(),
    cache_duration_seconds: None,
  }
}

fn commit_input(visitor: &str, url: &str, org: &str, confidence: f64, secs: u32) -> CommitInput {
  commit_input_with_segment(visitor, url, org, confidence, secs, "developer")
}

fn commit_input_with_segment(
  visitor: &str,
  url: &str,
  org: &str,
  confidence: f64,
  secs: u32,
  segment: &str,
) -> CommitInput {
  CommitInput {
    key:                    RecordKey::derive(visitor, url, org),
    page_url:               url.to_owned(),
    page_schema:            page_schema(),
    intent:                 intent(segment),
    generated:              GeneratedVariation {
      variation:             variation(confidence),
      judge_turns:           1,
      verdict:               JudgeVerdict::Pass,
      brand_alignment_score: Some(0.9),
      text_quality_score:    Some(0.85),
    },
    cache_duration_seconds: secs,
    trigger_source:         TriggerSource::Behavior,
    visitor_journey_id:     None,
  }
}

// ─── Registration ────────────────────────────────────────────────────────────

#[tokio::test]
async fn register_creates_pending_with_day_expiry() {
  let s = store().await;
  let before = Utc::now();
  let record = s.register(registration("v1", "/pricing", "org1")).await.unwrap();

  assert_eq!(record.status, RecordStatus::Pending);
  assert_eq!(record.page_url_hash, "4dikp");
  assert_eq!(record.times_applied, 0);
  let ttl = (record.expires_at - before).num_seconds();
  assert!((86_300..=86_500).contains(&ttl), "ttl was {ttl}");
}

#[tokio::test]
async fn register_twice_keeps_one_record() {
  let s = store().await;
  let first = s.register(registration("v1", "/pricing", "org1")).await.unwrap();
  let second = s.register(registration("v1", "/pricing", "org1")).await.unwrap();

  assert_eq!(first.id, second.id);
  assert_eq!(second.status, RecordStatus::Pending);
}

#[tokio::test]
async fn reregistration_does_not_reset_generated_status_or_expiry() {
  let s = store().await;
  s.register(registration("v1", "/pricing", "org1")).await.unwrap();
  let committed = s
    .commit(commit_input("v1", "/pricing", "org1", 0.8, 3600))
    .await
    .unwrap();

  let mut again = registration("v1", "/pricing", "org1");
  again.page_schema = json!({"sections": []});
  let reregistered = s.register(again).await.unwrap();

  assert_eq!(reregistered.id, committed.id);
  assert_eq!(reregistered.status, RecordStatus::Generated);
  assert_eq!(reregistered.expires_at, committed.expires_at);
  // The schema itself is refreshed.
  assert_eq!(reregistered.page_schema, json!({"sections": []}));
}

// ─── Cache lookup ────────────────────────────────────────────────────────────

#[tokio::test]
async fn cached_misses_when_no_record_exists() {
  let s = store().await;
  let hit = s.cached("v1", "/pricing", "org1").await.unwrap();
  assert!(hit.is_none());
}

#[tokio::test]
async fn cached_misses_on_pending_record() {
  let s = store().await;
  s.register(registration("v1", "/pricing", "org1")).await.unwrap();
  assert!(s.cached("v1", "/pricing", "org1").await.unwrap().is_none());
}

#[tokio::test]
async fn cached_misses_on_expired_record() {
  let s = store().await;
  // TTL of zero expires the entry at commit time.
  s.commit(commit_input("v1", "/pricing", "org1", 0.8, 0)).await.unwrap();
  assert!(s.cached("v1", "/pricing", "org1").await.unwrap().is_none());
}

#[tokio::test]
async fn cached_hit_returns_pre_increment_snapshot() {
  let s = store().await;
  let committed = s
    .commit(commit_input("v1", "/pricing", "org1", 0.8, 3600))
    .await
    .unwrap();

  let hit = s.cached("v1", "/pricing", "org1").await.unwrap().unwrap();
  assert_eq!(hit.id, committed.id);
  assert_eq!(hit.status, RecordStatus::Generated);
  assert_eq!(hit.times_applied, 0);

  // The stored row advanced behind the snapshot.
  let stored = s.get(committed.id).await.unwrap().unwrap();
  assert_eq!(stored.status, RecordStatus::Applied);
  assert_eq!(stored.times_applied, 1);
  assert!(stored.last_applied_at.is_some());
}

#[tokio::test]
async fn cached_hits_increment_monotonically() {
  let s = store().await;
  let committed = s
    .commit(commit_input("v1", "/pricing", "org1", 0.8, 3600))
    .await
    .unwrap();

  s.cached("v1", "/pricing", "org1").await.unwrap().unwrap();
  let second = s.cached("v1", "/pricing", "org1").await.unwrap().unwrap();
  assert_eq!(second.times_applied, 1);
  assert_eq!(second.status, RecordStatus::Applied);

  let stored = s.get(committed.id).await.unwrap().unwrap();
  assert_eq!(stored.times_applied, 2);
}

// ─── Commit and failure ──────────────────────────────────────────────────────

#[tokio::test]
async fn commit_sets_ttl_and_clears_error() {
  let s = store().await;
  let key = RecordKey::derive("v1", "/pricing", "org1");
  s.register(registration("v1", "/pricing", "org1")).await.unwrap();
  s.mark_failed(&key, "generator unreachable").await.unwrap();

  let before = Utc::now();
  let committed = s
    .commit(commit_input("v1", "/pricing", "org1", 0.85, 43_200))
    .await
    .unwrap();

  assert_eq!(committed.status, RecordStatus::Generated);
  assert_eq!(committed.error_message, None);
  assert_eq!(committed.cache_duration_seconds, 43_200);
  let ttl = (committed.expires_at - before).num_seconds();
  assert!((43_100..=43_300).contains(&ttl), "ttl was {ttl}");
  assert_eq!(
    committed.judge.as_ref().map(|j| j.judge_turns),
    Some(1)
  );
  assert_eq!(
    committed.intent.as_ref().map(|i| i.visitor_segment.as_str()),
    Some("developer")
  );
}

#[tokio::test]
async fn mark_failed_flips_non_servable_record() {
  let s = store().await;
  let key = RecordKey::derive("v1", "/pricing", "org1");
  let registered = s.register(registration("v1", "/pricing", "org1")).await.unwrap();

  s.mark_failed(&key, "intent extraction timed out").await.unwrap();

  let stored = s.get(registered.id).await.unwrap().unwrap();
  assert_eq!(stored.status, RecordStatus::Failed);
  assert_eq!(
    stored.error_message.as_deref(),
    Some("intent extraction timed out")
  );
}

#[tokio::test]
async fn mark_failed_preserves_servable_cache_entry() {
  let s = store().await;
  let key = RecordKey::derive("v1", "/pricing", "org1");
  let committed = s
    .commit(commit_input("v1", "/pricing", "org1", 0.8, 3600))
    .await
    .unwrap();

  // A failed background refresh must not evict the valid entry.
  s.mark_failed(&key, "refresh failed").await.unwrap();

  let stored = s.get(committed.id).await.unwrap().unwrap();
  assert_eq!(stored.status, RecordStatus::Generated);
  assert_eq!(stored.error_message.as_deref(), Some("refresh failed"));
  assert!(s.cached("v1", "/pricing", "org1").await.unwrap().is_some());
}

#[tokio::test]
async fn mark_failed_upserts_when_no_record_exists() {
  let s = store().await;
  let key = RecordKey::derive("v1", "/new-page", "org1");
  s.mark_failed(&key, "boom").await.unwrap();

  // The failed row holds the key; a later registration reuses it.
  let record = s.register(registration("v1", "/new-page", "org1")).await.unwrap();
  assert_eq!(record.status, RecordStatus::Failed);
  assert_eq!(record.error_message.as_deref(), Some("boom"));
}

// ─── Point reads, deletes, garbage collection ────────────────────────────────

#[tokio::test]
async fn get_missing_returns_none() {
  let s = store().await;
  assert!(s.get(Uuid::new_v4()).await.unwrap().is_none());
}

#[tokio::test]
async fn delete_removes_record() {
  let s = store().await;
  let record = s.register(registration("v1", "/pricing", "org1")).await.unwrap();

  assert!(s.delete(record.id).await.unwrap());
  assert!(s.get(record.id).await.unwrap().is_none());
  assert!(!s.delete(record.id).await.unwrap());
}

#[tokio::test]
async fn purge_expired_deletes_only_stale_rows() {
  let s = store().await;
  s.commit(commit_input("v1", "/a", "org1", 0.8, 0)).await.unwrap();
  s.commit(commit_input("v2", "/b", "org1", 0.8, 3600)).await.unwrap();

  let deleted = s.purge_expired(None).await.unwrap();
  assert_eq!(deleted, 1);
  assert!(s.cached("v2", "/b", "org1").await.unwrap().is_some());
}

#[tokio::test]
async fn purge_expired_respects_organization_scope() {
  let s = store().await;
  s.commit(commit_input("v1", "/a", "org1", 0.8, 0)).await.unwrap();
  s.commit(commit_input("v1", "/a", "org2", 0.8, 0)).await.unwrap();

  let deleted = s.purge_expired(Some("org1")).await.unwrap();
  assert_eq!(deleted, 1);

  // The other organization's stale row is untouched until a global sweep.
  let deleted = s.purge_expired(None).await.unwrap();
  assert_eq!(deleted, 1);
}

// ─── Analytics ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn analytics_rolls_up_counts_confidence_and_segments() {
  let s = store().await;
  s.commit(commit_input_with_segment("v1", "/a", "org1", 0.8, 3600, "developer"))
    .await
    .unwrap();
  s.commit(commit_input_with_segment("v2", "/b", "org1", 0.6, 3600, "developer"))
    .await
    .unwrap();
  s.commit(commit_input_with_segment("v3", "/c", "org1", 0.9, 3600, "executive"))
    .await
    .unwrap();
  s.register(registration("v4", "/d", "org1")).await.unwrap();
  s.mark_failed(&RecordKey::derive("v4", "/d", "org1"), "boom").await.unwrap();

  // Two hits for v1, one for v3.
  s.cached("v1", "/a", "org1").await.unwrap().unwrap();
  s.cached("v1", "/a", "org1").await.unwrap().unwrap();
  s.cached("v3", "/c", "org1").await.unwrap().unwrap();

  let summary = s.analytics("org1", &AnalyticsRange::default()).await.unwrap();
  assert_eq!(summary.total, 4);
  assert_eq!(summary.applied, 2);
  assert_eq!(summary.generated, 1);
  assert_eq!(summary.failed, 1);
  assert_eq!(summary.total_times_applied, 3);

  let avg = summary.average_confidence.unwrap();
  assert!((avg - (0.8 + 0.6 + 0.9) / 3.0).abs() < 1e-9);

  let developer = summary
    .segments
    .iter()
    .find(|seg| seg.visitor_segment == "developer")
    .unwrap();
  assert_eq!(developer.count, 2);

  assert_eq!(summary.top_applied[0].page_url, "/a");
  assert_eq!(summary.top_applied[0].times_applied, 2);
}

#[tokio::test]
async fn analytics_scopes_to_organization() {
  let s = store().await;
  s.commit(commit_input("v1", "/a", "org1", 0.8, 3600)).await.unwrap();
  s.commit(commit_input("v1", "/a", "org2", 0.9, 3600)).await.unwrap();

  let summary = s.analytics("org1", &AnalyticsRange::default()).await.unwrap();
  assert_eq!(summary.total, 1);
}

#[tokio::test]
async fn analytics_for_empty_organization_is_neutral() {
  let s = store().await;
  let summary = s.analytics("nobody", &AnalyticsRange::default()).await.unwrap();
  assert_eq!(summary.total, 0);
  assert!(summary.average_confidence.is_none());
  assert!(summary.segments.is_empty());
  assert!(summary.top_applied.is_empty());
}

// ─── Organization settings ───────────────────────────────────────────────────

#[tokio::test]
async fn organization_missing_returns_none() {
  let s = store().await;
  assert!(s.organization("nobody").await.unwrap().is_none());
}

#[tokio::test]
async fn organization_settings_roundtrip() {
  let s = store().await;
  s.store_page_schema("org1", &page_schema()).await.unwrap();
  s.store_reference_content("org1", "We build developer tools.").await.unwrap();

  let mut map = BTreeMap::new();
  let generated_at = Utc::now();
  map.insert(
    "developer".to_owned(),
    PersonaVariationEntry {
      key:                 "developer".to_owned(),
      keywords:            vec!["api".to_owned()],
      variation:           variation(0.7),
      confidence:          0.7,
      generated_at,
      source_content_hash: "abc".to_owned(),
    },
  );
  s.save_persona_variations("org1", &map, &page_schema(), generated_at)
    .await
    .unwrap();

  let settings = s.organization("org1").await.unwrap().unwrap();
  assert_eq!(settings.organization_id, "org1");
  assert_eq!(settings.page_schema, Some(page_schema()));
  assert_eq!(
    settings.reference_content.as_deref(),
    Some("We build developer tools.")
  );
  assert_eq!(settings.persona_variations.len(), 1);
  assert_eq!(settings.persona_variations["developer"].confidence, 0.7);
  assert!(settings.last_generated_at.is_some());
}

#[tokio::test]
async fn store_page_schema_preserves_other_settings() {
  let s = store().await;
  s.store_reference_content("org1", "content").await.unwrap();
  s.store_page_schema("org1", &page_schema()).await.unwrap();

  let settings = s.organization("org1").await.unwrap().unwrap();
  assert_eq!(settings.reference_content.as_deref(), Some("content"));
  assert_eq!(settings.page_schema, Some(page_schema()));
}
