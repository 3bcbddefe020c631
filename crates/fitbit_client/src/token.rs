//! Persistent OAuth2 token handling.

use crate::cache::write_atomic;
use crate::oauth::PkceCodes;
use crate::{FitbitClient, FitbitError};
use async_trait::async_trait;
use chrono::Utc;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// The single current credential, persisted as JSON at `<cache>/.auth`.
/// `ts` is the unix timestamp at which the token was obtained; the token
/// is considered expired once `now > ts + expires_in`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AuthToken {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    pub expires_in: u64,
    pub ts: i64,
}

impl AuthToken {
    pub fn is_expired(&self, now: i64) -> bool {
        now > self.ts + self.expires_in as i64
    }

    pub fn bearer(&self) -> SecretString {
        SecretString::new(self.access_token.clone().into())
    }
}

/// Supplies the authorization code during the interactive grant. The
/// conversion core stays headless; the binary plugs in a localhost
/// redirect-capture implementation.
#[async_trait]
pub trait AuthorizeFlow: Send + Sync {
    async fn obtain_code(&self, authorize_url: &str) -> Result<String, FitbitError>;
}

/// Loads, refreshes and persists the token file. Safe to call on every
/// retry attempt; the only side effect is overwriting `.auth`.
pub struct TokenStore {
    path: PathBuf,
}

impl TokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn load(&self) -> Option<AuthToken> {
        let bytes = std::fs::read(&self.path).ok()?;
        match serde_json::from_slice(&bytes) {
            Ok(token) => Some(token),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "ignoring unreadable token file");
                None
            }
        }
    }

    fn persist(&self, token: &AuthToken) -> Result<(), FitbitError> {
        write_atomic(&self.path, &serde_json::to_vec(token)?)
    }

    /// Produce a valid token: load the persisted one, run the
    /// authorization exchange when there is none, refresh when expired,
    /// and persist the result before returning. Exchange failures are
    /// fatal here; retries happen one layer up.
    pub async fn acquire(
        &self,
        client: &dyn FitbitClient,
        flow: &dyn AuthorizeFlow,
    ) -> Result<AuthToken, FitbitError> {
        let now = Utc::now().timestamp();
        let token = match self.load() {
            None => self.authorize(client, flow).await?,
            Some(token) if token.is_expired(now) => match token.refresh_token.as_deref() {
                Some(refresh) => {
                    tracing::debug!("token expired, refreshing");
                    client.refresh_token(refresh).await?
                }
                None => {
                    tracing::warn!("token expired with no refresh token, re-authorizing");
                    self.authorize(client, flow).await?
                }
            },
            Some(token) => token,
        };
        self.persist(&token)?;
        Ok(token)
    }

    async fn authorize(
        &self,
        client: &dyn FitbitClient,
        flow: &dyn AuthorizeFlow,
    ) -> Result<AuthToken, FitbitError> {
        let pkce = PkceCodes::generate();
        let url = client.authorize_url(&pkce);
        let code = flow.obtain_code(&url).await?;
        client.exchange_code(&code, &pkce).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expiry_uses_ts_plus_expires_in() {
        let token = AuthToken {
            access_token: "a".into(),
            refresh_token: None,
            expires_in: 3600,
            ts: 1_000,
        };
        assert!(!token.is_expired(1_000 + 3600));
        assert!(token.is_expired(1_000 + 3601));
    }

    #[test]
    fn load_tolerates_missing_and_corrupt_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = TokenStore::new(dir.path().join(".auth"));
        assert!(store.load().is_none());

        std::fs::write(dir.path().join(".auth"), b"not json").expect("write");
        assert!(store.load().is_none());
    }

    #[test]
    fn persist_then_load_roundtrips() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = TokenStore::new(dir.path().join(".auth"));
        let token = AuthToken {
            access_token: "abc".into(),
            refresh_token: Some("def".into()),
            expires_in: 28800,
            ts: 42,
        };
        store.persist(&token).expect("persist");
        let loaded = store.load().expect("loaded");
        assert_eq!(loaded.access_token, "abc");
        assert_eq!(loaded.refresh_token.as_deref(), Some("def"));
        assert_eq!(loaded.ts, 42);
    }
}
