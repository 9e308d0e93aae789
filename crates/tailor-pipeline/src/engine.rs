//! The orchestration engine: judge/refine loop, full generation runs, and
//! the persona batch pipeline.

use std::{collections::BTreeMap, future::Future, sync::Arc, time::Duration};

use chrono::Utc;
use serde_json::Value;
use tracing::{debug, info, warn};

use tailor_core::{
  CapabilityError,
  hash::content_hash,
  intent::VisitorJourney,
  judgment::{GeneratedVariation, JudgeScore, JudgeVerdict, Judgment},
  persona::{
    DEFAULT_PERSONA_KEY, PersonaBatchReport, PersonaError, PersonaSpec, PersonaVariationEntry,
  },
  ports::{IntentExtractor, QualityJudge, VariationGenerator},
  record::{NewRegistration, PersonalizationRecord, RecordKey, TriggerSource},
  store::{CommitInput, PersonalizationStore},
  variation::Variation,
};

use crate::{
  config::{JudgeErrorPolicy, NEUTRAL_JUDGE_SCORE, PipelineConfig},
  error::{Error, Result},
  prompt::{TurnFeedback, build_prompt},
};

// ─── Request ─────────────────────────────────────────────────────────────────

/// Input to a full generation run.
#[derive(Debug, Clone)]
pub struct GenerateRequest {
  pub visitor_id:         String,
  pub page_url:           String,
  pub organization_id:    String,
  pub page_schema:        Value,
  pub trigger_source:     TriggerSource,
  pub visitor_journey_id: Option<String>,
}

// ─── Engine ──────────────────────────────────────────────────────────────────

/// Drives the generate→judge→refine loop and the persona batch pipeline
/// over a store and the three capability ports.
pub struct Engine<S, I, G, J> {
  store:     Arc<S>,
  intent:    I,
  generator: G,
  judge:     J,
  config:    PipelineConfig,
}

impl<S, I, G, J> Engine<S, I, G, J>
where
  S: PersonalizationStore,
  I: IntentExtractor,
  G: VariationGenerator,
  J: QualityJudge,
{
  pub fn new(store: Arc<S>, intent: I, generator: G, judge: J, config: PipelineConfig) -> Self {
    Self { store, intent, generator, judge, config }
  }

  pub fn config(&self) -> &PipelineConfig {
    &self.config
  }

  // ── Full generation run ───────────────────────────────────────────────

  /// Register the schema, run the pipeline, and commit the result. On any
  /// pipeline failure the record is marked failed *and* the error is
  /// returned — both effects, so callers see the 500 while the failure is
  /// persisted for later inspection.
  pub async fn generate(&self, request: GenerateRequest) -> Result<PersonalizationRecord> {
    let key = RecordKey::derive(
      &request.visitor_id,
      &request.page_url,
      &request.organization_id,
    );

    self
      .store
      .register(NewRegistration {
        visitor_id:         request.visitor_id.clone(),
        page_url:           request.page_url.clone(),
        organization_id:    request.organization_id.clone(),
        page_schema:        request.page_schema.clone(),
        trigger_source:     request.trigger_source,
        visitor_journey_id: request.visitor_journey_id.clone(),
      })
      .await
      .map_err(Error::store)?;

    match self.run(&request, &key).await {
      Ok(record) => Ok(record),
      Err(e) => {
        if let Err(store_err) = self.store.mark_failed(&key, &e.to_string()).await {
          warn!(error = %store_err, "failed to persist pipeline failure");
        }
        Err(e)
      }
    }
  }

  async fn run(&self, request: &GenerateRequest, key: &RecordKey) -> Result<PersonalizationRecord> {
    let journey = VisitorJourney {
      visitor_id:      request.visitor_id.clone(),
      organization_id: request.organization_id.clone(),
      journey_id:      request.visitor_journey_id.clone(),
    };

    let intent = with_timeout(
      self.config.intent_timeout,
      self.intent.extract(&journey),
      "intent extraction",
    )
    .await?;
    debug!(
      visitor = %request.visitor_id,
      segment = %intent.visitor_segment,
      "intent extracted"
    );

    let reference = self
      .store
      .organization(&request.organization_id)
      .await
      .map_err(Error::store)?
      .and_then(|settings| settings.reference_content);

    let generated = self
      .refine(
        &intent.personalization_prompt,
        &request.page_schema,
        &request.visitor_id,
        reference.as_deref(),
      )
      .await?;

    let cache_duration_seconds = generated
      .variation
      .cache_duration_seconds
      .unwrap_or(self.config.default_cache_seconds);

    let record = self
      .store
      .commit(CommitInput {
        key:                key.clone(),
        page_url:           request.page_url.clone(),
        page_schema:        request.page_schema.clone(),
        intent,
        generated,
        cache_duration_seconds,
        trigger_source:     request.trigger_source,
        visitor_journey_id: request.visitor_journey_id.clone(),
      })
      .await
      .map_err(Error::store)?;

    info!(
      visitor = %request.visitor_id,
      organization = %request.organization_id,
      page = %request.page_url,
      ttl = cache_duration_seconds,
      "personalization committed"
    );
    Ok(record)
  }

  // ── Judge/refine loop ─────────────────────────────────────────────────

  /// Up to `max_turns` generate→judge pairs. Returns on the first passing
  /// candidate; otherwise falls back to the highest-confidence candidate
  /// seen across all turns. Confidence, not judge opinion, breaks the tie
  /// on the fallback path.
  pub async fn refine(
    &self,
    base_prompt: &str,
    page_schema: &Value,
    visitor_id: &str,
    original_content: Option<&str>,
  ) -> Result<GeneratedVariation> {
    let mut history: Vec<TurnFeedback> = Vec::new();
    let mut best: Option<Variation> = None;
    let mut best_confidence = 0.0_f64;

    for turn in 1..=self.config.max_turns {
      let prompt = build_prompt(
        base_prompt,
        page_schema,
        visitor_id,
        original_content,
        &history,
        self.config.content_excerpt_chars,
      );

      // A failed turn never aborts the run; the budget does.
      let candidate = match with_timeout(
        self.config.generation_timeout,
        self.generator.generate(&prompt, page_schema, visitor_id, original_content),
        "variation generation",
      )
      .await
      {
        Ok(v) => v,
        Err(e) => {
          warn!(turn, error = %e, "generation turn failed; continuing");
          continue;
        }
      };

      // Any candidate beats no candidate, even at zero confidence — the
      // fallback must prefer a real variation over an error.
      if best.is_none() || candidate.confidence > best_confidence {
        best_confidence = candidate.confidence;
        best = Some(candidate.clone());
      }

      let judgment = match with_timeout(
        self.config.judge_timeout,
        self.judge.evaluate(&candidate, original_content, page_schema),
        "quality judgment",
      )
      .await
      {
        Ok(j) => j,
        Err(e) => match self.config.judge_error_policy {
          JudgeErrorPolicy::FailOpen => {
            warn!(turn, error = %e, "judge unavailable; passing candidate with neutral scores");
            Judgment {
              score:                 JudgeScore::Pass,
              feedback:              String::new(),
              issues:                Vec::new(),
              brand_alignment_score: NEUTRAL_JUDGE_SCORE,
              text_quality_score:    NEUTRAL_JUDGE_SCORE,
              reasoning:             "judge unavailable".to_owned(),
            }
          }
          JudgeErrorPolicy::Strict => {
            warn!(turn, error = %e, "judge unavailable; treating turn as failed");
            continue;
          }
        },
      };

      match judgment.score {
        JudgeScore::Pass => {
          debug!(turn, confidence = candidate.confidence, "candidate passed");
          return Ok(GeneratedVariation {
            variation:             candidate,
            judge_turns:           turn,
            verdict:               JudgeVerdict::Pass,
            brand_alignment_score: Some(judgment.brand_alignment_score),
            text_quality_score:    Some(judgment.text_quality_score),
          });
        }
        // A failed attempt is low-salvage: its feedback is discarded and
        // the next turn starts from a clean prompt.
        JudgeScore::Fail => {
          debug!(turn, "candidate failed outright; retrying without feedback");
        }
        JudgeScore::NeedsImprovement => {
          debug!(turn, issues = judgment.issues.len(), "accumulating feedback");
          history.push(TurnFeedback {
            turn,
            feedback: judgment.feedback,
            issues: judgment.issues,
            brand_alignment_score: judgment.brand_alignment_score,
            text_quality_score: judgment.text_quality_score,
          });
        }
      }
    }

    match best {
      Some(variation) => {
        info!(
          confidence = best_confidence,
          turns = self.config.max_turns,
          "turn budget exhausted; returning best candidate"
        );
        Ok(GeneratedVariation {
          variation,
          judge_turns: self.config.max_turns,
          verdict: JudgeVerdict::MaxTurnsReached,
          brand_alignment_score: None,
          text_quality_score: None,
        })
      }
      None => Err(Error::Capability(CapabilityError::new(
        "no variation produced within the turn budget",
      ))),
    }
  }

  // ── Persona batch pipeline ────────────────────────────────────────────

  /// Run single-shot generation (no judge loop) once per persona against a
  /// shared schema and merge the results into the organization's long-lived
  /// variation map. Per-persona failures are collected, not fatal.
  pub async fn pregenerate(
    &self,
    organization_id: &str,
    personas: &[PersonaSpec],
    page_schema: Option<Value>,
  ) -> Result<PersonaBatchReport> {
    let settings = self
      .store
      .organization(organization_id)
      .await
      .map_err(Error::store)?;

    let schema = page_schema
      .or_else(|| settings.as_ref().and_then(|s| s.page_schema.clone()))
      .ok_or_else(|| Error::MissingPageSchema(organization_id.to_owned()))?;

    let reference = settings
      .as_ref()
      .and_then(|s| s.reference_content.clone());
    let source_content_hash = content_hash(reference.as_deref().unwrap_or(""));
    let existing = settings.map(|s| s.persona_variations).unwrap_or_default();

    let generated_at = Utc::now();
    let mut fresh: BTreeMap<String, PersonaVariationEntry> = BTreeMap::new();
    let mut errors: Vec<PersonaError> = Vec::new();

    // Sequential on purpose: bounds load on the shared generation capability.
    for persona in personas {
      let visitor_id = format!("pre-gen-{}", persona.key);
      match with_timeout(
        self.config.generation_timeout,
        self
          .generator
          .generate(&persona.prompt, &schema, &visitor_id, reference.as_deref()),
        "persona generation",
      )
      .await
      {
        Ok(variation) => {
          let confidence = variation.confidence;
          fresh.insert(persona.key.clone(), PersonaVariationEntry {
            key: persona.key.clone(),
            keywords: persona.keywords.clone(),
            variation,
            confidence,
            generated_at,
            source_content_hash: source_content_hash.clone(),
          });
        }
        Err(e) => {
          warn!(persona = %persona.key, error = %e, "persona generation failed; continuing");
          errors.push(PersonaError {
            key:     persona.key.clone(),
            message: e.to_string(),
          });
        }
      }
    }

    // Merge: keys only in the old map survive; new entries win collisions.
    // The reserved default entry is injected only when the pre-existing map
    // lacks one.
    let mut merged = existing;
    if !merged.contains_key(DEFAULT_PERSONA_KEY) {
      merged.insert(
        DEFAULT_PERSONA_KEY.to_owned(),
        PersonaVariationEntry::passthrough(generated_at, source_content_hash),
      );
    }
    merged.extend(fresh);

    self
      .store
      .save_persona_variations(organization_id, &merged, &schema, generated_at)
      .await
      .map_err(Error::store)?;

    info!(
      organization = organization_id,
      personas = personas.len(),
      errors = errors.len(),
      "persona batch complete"
    );
    Ok(PersonaBatchReport { variations: merged, generated_at, errors })
  }
}

// ─── Timeout helper ──────────────────────────────────────────────────────────

/// Wrap a port call in a deadline so an unresponsive capability cannot hold
/// the loop open indefinitely.
async fn with_timeout<T>(
  limit: Duration,
  fut: impl Future<Output = Result<T, CapabilityError>>,
  what: &str,
) -> Result<T, CapabilityError> {
  match tokio::time::timeout(limit, fut).await {
    Ok(result) => result,
    Err(_) => Err(CapabilityError::new(format!(
      "{what} timed out after {}s",
      limit.as_secs()
    ))),
  }
}
