//! Orchestration for Tailor: the generate→judge→refine loop and the
//! persona batch pipeline.
//!
//! This crate owns the control flow around the capability ports — retry
//! budgets, best-candidate tracking, feedback accumulation, timeouts — and
//! nothing about how the ports are implemented.

pub mod config;
pub mod engine;
pub mod error;
pub mod prompt;

pub use config::{JudgeErrorPolicy, PipelineConfig};
pub use engine::{Engine, GenerateRequest};
pub use error::{Error, Result};
