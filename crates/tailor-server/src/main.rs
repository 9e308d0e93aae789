//! tailor server binary.
//!
//! Reads `config.toml` (or the path specified with `--config`), opens an
//! in-process SQLite store, connects the inference client, and serves the
//! personalization API over HTTP under `/api`.

mod config;
mod inference;

use std::{
  path::{Path, PathBuf},
  sync::Arc,
};

use anyhow::Context as _;
use axum::Router;
use clap::Parser;
use tailor_api::{AppState, api_router};
use tailor_pipeline::Engine;
use tailor_store_sqlite::SqliteStore;
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use crate::{config::ServerConfig, inference::InferenceClient};

#[derive(Parser)]
#[command(author, version, about = "Tailor personalization server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  // Initialise tracing.
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  // Load configuration.
  let settings = config::load(&cli.config)?;

  // Expand `~` in store path.
  let store_path = expand_tilde(&settings.store_path);

  // Open SQLite store.
  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;
  let store = Arc::new(store);

  // One client backs all three capability ports.
  let client = InferenceClient::new(&settings.inference)
    .context("failed to build inference client")?;
  let engine = Arc::new(Engine::new(
    store.clone(),
    client.clone(),
    client.clone(),
    client,
    settings.pipeline.to_pipeline_config(),
  ));

  let app = Router::new().nest("/api", api_router(AppState { store, engine }));
  let address = format!("{}:{}", settings.host, settings.port);

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app).await.context("server error")?;

  Ok(())
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
