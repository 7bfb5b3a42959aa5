//! Application wiring
//!
//! Builds the shared state once per run and drives the upload pipelines.

pub mod runner;
pub mod state;

pub use runner::{App, SourceTarget};
pub use state::AppState;
