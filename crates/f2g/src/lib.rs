//! Fitbit-to-Garmin activity conversion: the fetch-cache-align-encode
//! pipeline plus the TCX and FIT encoders it feeds.

pub mod auth_browser;
pub mod cli;
pub mod commands;
pub mod encoder;
pub mod error;
pub mod fit;
pub mod intraday;
pub mod sport;
pub mod tcx;

pub use error::{PipelineError, PipelineResult};
