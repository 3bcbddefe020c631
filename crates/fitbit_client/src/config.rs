use crate::FitbitError;

/// Fitbit application settings. The client id identifies a public OAuth2
/// client (PKCE, no secret).
#[derive(Clone, Debug)]
pub struct Config {
    pub client_id: String,
    pub redirect_uri: String,
    pub api_base_url: String,
    pub oauth_base_url: String,
}

impl Config {
    pub fn from_env() -> Result<Self, FitbitError> {
        Self::from_env_with(|k| std::env::var(k).ok())
    }

    /// Read configuration through an injected getter so tests never have
    /// to touch the process environment.
    pub fn from_env_with<F>(mut get: F) -> Result<Self, FitbitError>
    where
        F: FnMut(&str) -> Option<String>,
    {
        let client_id = get("FITBIT_CLIENT_ID").unwrap_or_else(|| "23RBKP".into());
        if client_id.trim().is_empty() {
            return Err(FitbitError::Config("FITBIT_CLIENT_ID is empty".into()));
        }
        let redirect_uri =
            get("FITBIT_REDIRECT_URI").unwrap_or_else(|| "http://localhost:8080".into());
        let api_base_url =
            get("FITBIT_API_BASE_URL").unwrap_or_else(|| "https://api.fitbit.com".into());
        let oauth_base_url =
            get("FITBIT_OAUTH_BASE_URL").unwrap_or_else(|| "https://www.fitbit.com/oauth2".into());
        // authorize_url builds on this without re-checking
        if reqwest::Url::parse(&oauth_base_url).is_err() {
            return Err(FitbitError::Config(format!(
                "FITBIT_OAUTH_BASE_URL is not a valid URL: {oauth_base_url}"
            )));
        }
        Ok(Self {
            client_id,
            redirect_uri,
            api_base_url: api_base_url.trim_end_matches('/').to_string(),
            oauth_base_url: oauth_base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_env_defaults() {
        let cfg = Config::from_env_with(|_| None).expect("cfg");
        assert_eq!(cfg.client_id, "23RBKP");
        assert_eq!(cfg.api_base_url, "https://api.fitbit.com");
        assert_eq!(cfg.redirect_uri, "http://localhost:8080");
    }

    #[test]
    fn from_env_overrides_and_trims() {
        let get = |k: &str| match k {
            "FITBIT_CLIENT_ID" => Some("ABC123".into()),
            "FITBIT_API_BASE_URL" => Some("http://localhost:9000/".into()),
            _ => None,
        };
        let cfg = Config::from_env_with(get).expect("cfg");
        assert_eq!(cfg.client_id, "ABC123");
        assert_eq!(cfg.api_base_url, "http://localhost:9000");
    }

    #[test]
    fn from_env_rejects_blank_client_id() {
        let res = Config::from_env_with(|k| (k == "FITBIT_CLIENT_ID").then(|| "  ".into()));
        assert!(res.is_err());
    }

    #[test]
    fn from_env_rejects_unparseable_oauth_url() {
        let res = Config::from_env_with(|k| {
            (k == "FITBIT_OAUTH_BASE_URL").then(|| "not a url".into())
        });
        assert!(matches!(res, Err(FitbitError::Config(_))));
    }
}
