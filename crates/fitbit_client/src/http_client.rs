//! HTTP client implementation for the Fitbit Web API.
//!
//! This module provides a reqwest-based implementation of the
//! [`FitbitClient`](crate::FitbitClient) trait. Every call passes through
//! a shared throttle so a whole conversion run stays under the upstream
//! rate budget.

use crate::config::Config;
use crate::oauth::{self, PkceCodes};
use crate::throttle::Throttle;
use crate::token::AuthToken;
use crate::{FitbitClient, FitbitError};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Client for the Fitbit Web API using reqwest.
#[derive(Clone, Debug)]
pub struct ReqwestFitbitClient {
    config: Config,
    client: reqwest::Client,
    throttle: Arc<Throttle>,
}

#[derive(Deserialize)]
struct ActivityLogPage {
    #[serde(default)]
    activities: Vec<serde_json::Value>,
    #[serde(default)]
    pagination: Option<Pagination>,
}

#[derive(Deserialize)]
struct Pagination {
    #[serde(default)]
    next: Option<String>,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    expires_in: u64,
}

impl ReqwestFitbitClient {
    pub fn new(config: Config) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("reqwest client build should not fail");
        Self {
            config,
            client,
            throttle: Arc::new(Throttle::default()),
        }
    }

    /// Override the default 150-per-hour throttle, mainly for tests.
    pub fn with_throttle(mut self, throttle: Throttle) -> Self {
        self.throttle = Arc::new(throttle);
        self
    }

    fn get_request(&self, url: &str, bearer: &SecretString) -> reqwest::RequestBuilder {
        self.client.get(url).bearer_auth(bearer.expose_secret())
    }

    async fn error_from_response(&self, resp: reqwest::Response) -> FitbitError {
        let status = resp.status().as_u16();
        let body = resp.text().await.unwrap_or_default();
        let body_snippet: String = body.chars().take(256).collect();
        match status {
            401 | 403 => FitbitError::Auth(body_snippet),
            _ => FitbitError::Status {
                status,
                body: body_snippet,
            },
        }
    }

    async fn execute_bytes(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<Vec<u8>, FitbitError> {
        self.throttle.acquire().await;
        let resp = request.send().await?;
        metrics::counter!("fitbit_client_requests_total").increment(1);
        if !resp.status().is_success() {
            return Err(self.error_from_response(resp).await);
        }
        Ok(resp.bytes().await?.to_vec())
    }

    async fn execute_token_request(
        &self,
        form: &[(&str, &str)],
    ) -> Result<AuthToken, FitbitError> {
        let url = format!("{}/oauth2/token", self.config.api_base_url);
        self.throttle.acquire().await;
        let resp = self.client.post(&url).form(form).send().await?;
        metrics::counter!("fitbit_client_requests_total").increment(1);
        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body: String = resp
                .text()
                .await
                .unwrap_or_default()
                .chars()
                .take(256)
                .collect();
            return Err(FitbitError::Auth(format!("token endpoint {status}: {body}")));
        }
        let token: TokenResponse = resp
            .json()
            .await
            .map_err(|e| FitbitError::Auth(format!("decoding token response: {e}")))?;
        Ok(AuthToken {
            access_token: token.access_token,
            refresh_token: token.refresh_token,
            expires_in: token.expires_in,
            ts: Utc::now().timestamp(),
        })
    }

    fn activity_log_list_url(&self, start: NaiveDate) -> String {
        format!(
            "{}/1/user/-/activities/list.json?offset=0&limit=100&sort=asc&afterDate={}",
            self.config.api_base_url,
            start.format("%Y-%m-%d")
        )
    }
}

/// `originalStartTime` of a log entry, as a calendar date. A missing or
/// unparseable value is a malformed payload, not a transient failure.
fn entry_start_date(entry: &serde_json::Value) -> Result<NaiveDate, FitbitError> {
    let raw = entry
        .get("originalStartTime")
        .and_then(|v| v.as_str())
        .ok_or_else(|| FitbitError::Decode("activity entry without originalStartTime".into()))?;
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.date_naive())
        .map_err(|e| FitbitError::Decode(format!("originalStartTime {raw:?}: {e}")))
}

#[async_trait]
impl FitbitClient for ReqwestFitbitClient {
    async fn get_activity_log_list(
        &self,
        bearer: &SecretString,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<serde_json::Value>, FitbitError> {
        let mut activities = Vec::new();
        let mut url = Some(self.activity_log_list_url(start));
        while let Some(page_url) = url.take() {
            self.throttle.acquire().await;
            let resp = self.get_request(&page_url, bearer).send().await?;
            metrics::counter!("fitbit_client_requests_total").increment(1);
            if !resp.status().is_success() {
                return Err(self.error_from_response(resp).await);
            }
            let page: ActivityLogPage = resp
                .json()
                .await
                .map_err(|e| FitbitError::Decode(format!("activity log page: {e}")))?;
            if page.activities.is_empty() {
                break;
            }
            let mut in_range = Vec::new();
            for entry in page.activities {
                if entry_start_date(&entry)? <= end {
                    in_range.push(entry);
                }
            }
            if in_range.is_empty() {
                break;
            }
            activities.extend(in_range);
            url = page.pagination.and_then(|p| p.next);
        }
        Ok(activities)
    }

    async fn get_activity_track(
        &self,
        bearer: &SecretString,
        log_id: i64,
    ) -> Result<Vec<u8>, FitbitError> {
        let url = format!(
            "{}/1/user/-/activities/{}.tcx",
            self.config.api_base_url, log_id
        );
        self.execute_bytes(self.get_request(&url, bearer)).await
    }

    async fn get_intraday(
        &self,
        bearer: &SecretString,
        url: &str,
    ) -> Result<Vec<u8>, FitbitError> {
        self.execute_bytes(self.get_request(url, bearer)).await
    }

    async fn get_calories(
        &self,
        bearer: &SecretString,
        url: &str,
    ) -> Result<Option<Vec<u8>>, FitbitError> {
        self.throttle.acquire().await;
        let resp = self.get_request(url, bearer).send().await?;
        metrics::counter!("fitbit_client_requests_total").increment(1);
        match resp.status().as_u16() {
            200 => Ok(Some(resp.bytes().await?.to_vec())),
            400 => {
                // Some detail levels 400 on the windowed form of the URL;
                // the truncated whole-day form usually still works.
                let Some((prefix, _)) = url.split_once("1min/time") else {
                    tracing::warn!(url, "calorie request rejected, no fallback URL");
                    return Ok(None);
                };
                let fallback = format!("{prefix}1min.json");
                tracing::info!(%fallback, "falling back to truncated calorie URL");
                self.throttle.acquire().await;
                let resp = self.get_request(&fallback, bearer).send().await?;
                metrics::counter!("fitbit_client_requests_total").increment(1);
                if resp.status().is_success() {
                    Ok(Some(resp.bytes().await?.to_vec()))
                } else {
                    tracing::warn!(status = resp.status().as_u16(), "calorie fallback failed");
                    Ok(None)
                }
            }
            status => {
                tracing::warn!(status, "calorie request failed, continuing without calories");
                Ok(None)
            }
        }
    }

    async fn exchange_code(
        &self,
        code: &str,
        pkce: &PkceCodes,
    ) -> Result<AuthToken, FitbitError> {
        let form = [
            ("client_id", self.config.client_id.as_str()),
            ("redirect_uri", self.config.redirect_uri.as_str()),
            ("state", pkce.state.as_str()),
            ("code", code),
            ("code_verifier", pkce.verifier.as_str()),
            ("grant_type", "authorization_code"),
        ];
        self.execute_token_request(&form).await
    }

    async fn refresh_token(&self, refresh_token: &str) -> Result<AuthToken, FitbitError> {
        let form = [
            ("client_id", self.config.client_id.as_str()),
            ("refresh_token", refresh_token),
            ("grant_type", "refresh_token"),
        ];
        self.execute_token_request(&form).await
    }

    fn authorize_url(&self, pkce: &PkceCodes) -> String {
        oauth::authorize_url(
            &self.config.oauth_base_url,
            &self.config.client_id,
            &self.config.redirect_uri,
            pkce,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn entry_start_date_parses_offset_timestamps() {
        let entry = json!({"originalStartTime": "2024-05-01T06:30:00.000-07:00"});
        let date = entry_start_date(&entry).expect("date");
        assert_eq!(date, NaiveDate::from_ymd_opt(2024, 5, 1).unwrap());
    }

    #[test]
    fn entry_start_date_rejects_missing_field() {
        let entry = json!({"logId": 1});
        assert!(matches!(
            entry_start_date(&entry),
            Err(FitbitError::Decode(_))
        ));
    }

    #[test]
    fn list_url_carries_after_date() {
        let client = ReqwestFitbitClient::new(
            Config::from_env_with(|_| None).expect("cfg"),
        );
        let url = client.activity_log_list_url(NaiveDate::from_ymd_opt(2024, 5, 1).unwrap());
        assert!(url.contains("afterDate=2024-05-01"));
        assert!(url.contains("sort=asc"));
    }
}
