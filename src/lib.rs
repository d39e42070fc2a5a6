//! Video generation proxy library
//!
//! Modules:
//! - `api`: Axum HTTP handlers, wire types and router setup used by the binary.
//! - `task`: Task records, the shared registry and optional retention.
//! - `orchestrator`: Per-task pipeline and the background dispatcher.
//! - `provider`: Video generation backends (LTX, Runway, mock) and job polling.
//! - `enhancer`: Language-model prompt enhancement with `{{placeholder}}` templates.
//! - `artifact`: Persists generated videos under the static directory.
//! - `config`: Env-driven configuration loader.
//! - `error`: Common error type and alias.
//!
//! Re-exports are provided for common types: `Config`, `AppError`,
//! `Orchestrator`, `Dispatcher` and `AppState`.
pub mod api;
pub mod artifact;
pub mod config;
pub mod enhancer;
pub mod error;
pub mod orchestrator;
pub mod provider;
pub mod task;

pub use api::routes::AppState;
pub use config::Config;
pub use error::{AppError, AppResult};
pub use orchestrator::{Dispatcher, Orchestrator};
