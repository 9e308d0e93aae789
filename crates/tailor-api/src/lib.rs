//! JSON REST API for Tailor.
//!
//! Exposes an axum [`Router`] backed by any
//! [`tailor_core::store::PersonalizationStore`] plus a pipeline
//! [`Engine`] for the generation endpoints. Auth, TLS, and transport
//! concerns are the caller's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", tailor_api::api_router(state))
//! ```

pub mod analytics;
pub mod error;
pub mod personas;
pub mod records;

use std::sync::Arc;

use axum::{
  Router,
  routing::{get, post, put},
};
use tailor_core::{
  ports::{IntentExtractor, QualityJudge, VariationGenerator},
  store::PersonalizationStore,
};
use tailor_pipeline::Engine;

pub use error::ApiError;

/// Shared handler state: the store for reads and direct writes, the engine
/// for anything that runs the pipeline.
pub struct AppState<S, I, G, J> {
  pub store:  Arc<S>,
  pub engine: Arc<Engine<S, I, G, J>>,
}

// Derived Clone would demand Clone on every type parameter.
impl<S, I, G, J> Clone for AppState<S, I, G, J> {
  fn clone(&self) -> Self {
    Self {
      store:  Arc::clone(&self.store),
      engine: Arc::clone(&self.engine),
    }
  }
}

/// Build a fully-materialised API router for `state`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S, I, G, J>(state: AppState<S, I, G, J>) -> Router<()>
where
  S: PersonalizationStore + 'static,
  S::Error: std::error::Error + Send + Sync + 'static,
  I: IntentExtractor + 'static,
  G: VariationGenerator + 'static,
  J: QualityJudge + 'static,
{
  Router::new()
    // Personalization records
    .route("/personalizations/cached", get(records::cached::<S, I, G, J>))
    .route("/personalizations/schema", post(records::register::<S, I, G, J>))
    .route("/personalizations/generate", post(records::generate::<S, I, G, J>))
    .route(
      "/personalizations/{id}",
      get(records::get_one::<S, I, G, J>).delete(records::delete_one::<S, I, G, J>),
    )
    .route("/personalizations/cleanup", post(records::cleanup::<S, I, G, J>))
    // Organization personas and settings
    .route("/organizations/{org}/personas", get(personas::list::<S, I, G, J>))
    .route(
      "/organizations/{org}/personas/generate",
      post(personas::generate_batch::<S, I, G, J>),
    )
    .route("/organizations/{org}/schema", put(personas::put_schema::<S, I, G, J>))
    .route("/organizations/{org}/content", put(personas::put_content::<S, I, G, J>))
    // Analytics
    .route("/organizations/{org}/analytics", get(analytics::summary::<S, I, G, J>))
    .with_state(state)
}
