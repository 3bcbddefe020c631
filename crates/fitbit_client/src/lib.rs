//! Fitbit Web API client: OAuth2 (PKCE) token handling, retry-tolerant
//! fetching of activity logs and intraday series, and the on-disk cache
//! store used to make whole conversion runs resumable.

use async_trait::async_trait;
use chrono::NaiveDate;
use secrecy::SecretString;
use serde::Deserialize;
use thiserror::Error;

pub mod cache;
pub mod config;
pub mod http_client;
pub mod oauth;
pub mod retry;
pub mod throttle;
pub mod token;

pub use cache::{CacheStore, FsCacheStore};
pub use retry::RetryPolicy;
pub use token::{AuthToken, AuthorizeFlow, TokenStore};

#[derive(Debug, Error)]
pub enum FitbitError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("http status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("authorization error: {0}")]
    Auth(String),
    #[error("malformed payload: {0}")]
    Decode(String),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("operation cancelled")]
    Cancelled,
}

impl FitbitError {
    /// Whether a failed call may be retried with the same arguments.
    ///
    /// Timeouts, connection failures and server-classified statuses are
    /// transient; everything else (bad payloads, auth exchange failures,
    /// local io) aborts the run.
    pub fn is_transient(&self) -> bool {
        match self {
            FitbitError::Http(e) => e.is_timeout() || e.is_connect(),
            FitbitError::Status { status, .. } => {
                *status >= 500 || *status == 408 || *status == 429
            }
            _ => false,
        }
    }
}

/// One activity log entry, parsed out of the verbatim-cached JSON.
///
/// Unknown fields survive in the cache because the raw `serde_json::Value`
/// is what gets written to disk; this struct is only the typed view the
/// pipeline works with.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    pub log_id: i64,
    #[serde(default = "default_activity_name")]
    pub activity_name: String,
    pub start_time: String,
    /// Total duration in milliseconds.
    pub duration: u64,
    /// Distance in kilometers, when the source reported one.
    #[serde(default)]
    pub distance: Option<f64>,
    #[serde(default)]
    pub steps: Option<u64>,
    #[serde(default)]
    pub elevation_gain: Option<f64>,
    #[serde(default)]
    pub calories: u32,
    #[serde(default)]
    pub heart_rate_link: Option<String>,
    #[serde(default)]
    pub calories_link: Option<String>,
    #[serde(default)]
    pub log_type: String,
    #[serde(default)]
    pub source: ActivitySource,
}

fn default_activity_name() -> String {
    "Workout".to_string()
}

#[derive(Clone, Debug, Deserialize)]
pub struct ActivitySource {
    pub name: String,
}

impl Default for ActivitySource {
    fn default() -> Self {
        Self {
            name: "Fitbit".to_string(),
        }
    }
}

impl Activity {
    pub fn from_value(value: &serde_json::Value) -> Result<Self, FitbitError> {
        serde_json::from_value(value.clone())
            .map_err(|e| FitbitError::Decode(format!("activity log entry: {e}")))
    }
}

#[async_trait]
pub trait FitbitClient: Send + Sync + 'static {
    /// Fetch the activity log list for an inclusive date range, following
    /// pagination until a page is empty or past `end`.
    ///
    /// Entries are returned as raw JSON values so they can be cached
    /// verbatim, one object per line.
    async fn get_activity_log_list(
        &self,
        bearer: &SecretString,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<serde_json::Value>, FitbitError>;

    /// Download the source's own TCX export for one activity. Only its
    /// line count matters to the pipeline (the skip heuristic).
    async fn get_activity_track(
        &self,
        bearer: &SecretString,
        log_id: i64,
    ) -> Result<Vec<u8>, FitbitError>;

    /// Fetch an intraday time series (heart rate) from a URL embedded in
    /// the activity payload.
    async fn get_intraday(
        &self,
        bearer: &SecretString,
        url: &str,
    ) -> Result<Vec<u8>, FitbitError>;

    /// Fetch the per-minute calorie series. Degrades instead of failing:
    /// a non-success response yields `None`, and a 400 first retries the
    /// truncated `…1min.json` fallback URL.
    async fn get_calories(
        &self,
        bearer: &SecretString,
        url: &str,
    ) -> Result<Option<Vec<u8>>, FitbitError>;

    /// Exchange an authorization code for a token (PKCE flow).
    async fn exchange_code(
        &self,
        code: &str,
        pkce: &oauth::PkceCodes,
    ) -> Result<AuthToken, FitbitError>;

    /// Refresh an expired token.
    async fn refresh_token(&self, refresh_token: &str) -> Result<AuthToken, FitbitError>;

    /// The authorization URL the operator must open to grant access.
    fn authorize_url(&self, pkce: &oauth::PkceCodes) -> String;
}
