//! Core of the DRT backend.
//!
//! This crate ties the workspace together: [`AppState`] owns the chain
//! access, mesh router and integration clients, the handlers implement
//! every HTTP operation on top of it, the monitors run the background
//! polling loops and [`api::router`] assembles the axum application.

pub mod api;
pub mod error;
pub mod handlers;
pub mod monitors;
pub mod state;

pub use drt_dex as dex;
pub use error::ApiError;
pub use monitors::{spawn_monitors, MonitorSet};
pub use state::AppState;

use thiserror::Error;

/// Errors raised while assembling the application.
#[derive(Debug, Error)]
pub enum CoreError {
	#[error("Configuration error: {0}")]
	Config(String),
}
