//! OAuth2 authorization-code helpers for a public (PKCE) client.

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::Rng;
use sha2::{Digest, Sha256};

/// Scopes requested during authorization.
pub const SCOPE: &str = "activity heartrate location weight";

/// One-shot PKCE material for an authorization attempt: the code verifier,
/// its S256 challenge, and a CSRF state token.
#[derive(Clone, Debug)]
pub struct PkceCodes {
    pub verifier: String,
    pub challenge: String,
    pub state: String,
}

impl PkceCodes {
    pub fn generate() -> Self {
        let mut rng = rand::rng();
        let mut verifier_bytes = [0u8; 64];
        rng.fill_bytes(&mut verifier_bytes);
        let verifier = URL_SAFE_NO_PAD.encode(verifier_bytes);
        let challenge = code_challenge(&verifier);

        let mut state_bytes = [0u8; 64];
        rng.fill_bytes(&mut state_bytes);
        let state = hex::encode(Sha256::digest(state_bytes));

        Self {
            verifier,
            challenge,
            state,
        }
    }
}

/// S256 challenge: base64url(sha256(verifier)), unpadded.
pub fn code_challenge(verifier: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()))
}

/// Build the browser authorization URL.
pub fn authorize_url(
    oauth_base_url: &str,
    client_id: &str,
    redirect_uri: &str,
    pkce: &PkceCodes,
) -> String {
    let mut url = reqwest::Url::parse(&format!("{oauth_base_url}/authorize"))
        .expect("oauth base url is validated by Config");
    url.query_pairs_mut()
        .append_pair("client_id", client_id)
        .append_pair("redirect_uri", redirect_uri)
        .append_pair("state", &pkce.state)
        .append_pair("scope", SCOPE)
        .append_pair("code_challenge", &pkce.challenge)
        .append_pair("code_challenge_method", "S256")
        .append_pair("response_type", "code");
    url.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn challenge_matches_rfc7636_appendix_b() {
        // Test vector from RFC 7636 appendix B.
        let verifier = "dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk";
        assert_eq!(
            code_challenge(verifier),
            "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM"
        );
    }

    #[test]
    fn generated_codes_are_unpadded_and_distinct() {
        let a = PkceCodes::generate();
        let b = PkceCodes::generate();
        assert!(!a.verifier.contains('='));
        assert!(!a.challenge.contains('='));
        assert_eq!(a.state.len(), 64);
        assert_ne!(a.verifier, b.verifier);
        assert_ne!(a.state, b.state);
    }

    #[test]
    fn authorize_url_carries_all_parameters() {
        let pkce = PkceCodes::generate();
        let url = authorize_url(
            "https://www.fitbit.com/oauth2",
            "23RBKP",
            "http://localhost:8080",
            &pkce,
        );
        let parsed = reqwest::Url::parse(&url).expect("url");
        let pairs: std::collections::HashMap<_, _> = parsed.query_pairs().collect();
        assert_eq!(pairs["client_id"], "23RBKP");
        assert_eq!(pairs["response_type"], "code");
        assert_eq!(pairs["code_challenge_method"], "S256");
        assert_eq!(pairs["code_challenge"], pkce.challenge.as_str());
        assert_eq!(pairs["scope"], SCOPE);
    }
}
