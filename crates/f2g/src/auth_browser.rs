//! Localhost capture of the OAuth2 redirect.
//!
//! Serves a one-shot HTTP endpoint on the redirect address, prints the
//! authorization link for the operator to open, and resolves with the
//! `code` query parameter of the first request that carries one.

use std::collections::HashMap;

use async_trait::async_trait;
use axum::Router;
use axum::extract::{Query, State};
use axum::response::Html;
use fitbit_client::FitbitError;
use fitbit_client::token::AuthorizeFlow;
use tokio::net::TcpListener;
use tokio::sync::{Mutex, mpsc};

pub struct BrowserFlow {
    listener: Mutex<Option<TcpListener>>,
}

impl BrowserFlow {
    /// Bind the redirect listener up front so a port conflict surfaces
    /// before the operator is sent to the authorization page.
    pub async fn bind(redirect_uri: &str) -> Result<Self, FitbitError> {
        let addr = redirect_addr(redirect_uri)?;
        let listener = TcpListener::bind(&addr).await.map_err(|e| {
            FitbitError::Config(format!("cannot listen on redirect address {addr}: {e}"))
        })?;
        Ok(Self {
            listener: Mutex::new(Some(listener)),
        })
    }

    pub async fn local_addr(&self) -> Result<std::net::SocketAddr, FitbitError> {
        let guard = self.listener.lock().await;
        let listener = guard
            .as_ref()
            .ok_or_else(|| FitbitError::Auth("redirect listener already consumed".into()))?;
        Ok(listener.local_addr()?)
    }
}

/// `http://host:port[/path]` to a bindable `host:port`, defaulting the
/// port to 80.
fn redirect_addr(redirect_uri: &str) -> Result<String, FitbitError> {
    let rest = redirect_uri
        .strip_prefix("http://")
        .ok_or_else(|| FitbitError::Config(format!("unsupported redirect uri: {redirect_uri}")))?;
    let host_port = rest.split('/').next().unwrap_or(rest);
    if host_port.is_empty() {
        return Err(FitbitError::Config(format!(
            "unsupported redirect uri: {redirect_uri}"
        )));
    }
    Ok(if host_port.contains(':') {
        host_port.to_string()
    } else {
        format!("{host_port}:80")
    })
}

async fn callback(
    State(tx): State<mpsc::Sender<String>>,
    Query(params): Query<HashMap<String, String>>,
) -> Html<&'static str> {
    match params.get("code") {
        Some(code) => {
            let _ = tx.send(code.clone()).await;
            Html("<h1>Success!</h1><p>You can close this tab and return to the terminal.</p>")
        }
        None => Html("<h1>Missing authorization code</h1><p>Please retry the login link.</p>"),
    }
}

#[async_trait]
impl AuthorizeFlow for BrowserFlow {
    async fn obtain_code(&self, authorize_url: &str) -> Result<String, FitbitError> {
        let listener = self
            .listener
            .lock()
            .await
            .take()
            .ok_or_else(|| FitbitError::Auth("redirect listener already consumed".into()))?;

        let (tx, mut rx) = mpsc::channel::<String>(1);
        let app = Router::new()
            .fallback(axum::routing::get(callback))
            .with_state(tx);

        println!("Open this link in your browser to log in:\n\n  {authorize_url}\n");
        tracing::info!("waiting for the OAuth redirect");

        let server = axum::serve(listener, app);
        tokio::select! {
            result = server => {
                result.map_err(|e| FitbitError::Auth(format!("redirect listener failed: {e}")))?;
                Err(FitbitError::Auth("redirect listener stopped early".into()))
            }
            code = rx.recv() => {
                code.ok_or_else(|| FitbitError::Auth("redirect channel closed".into()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    #[test]
    fn redirect_addr_parsing() {
        assert_eq!(redirect_addr("http://localhost:8080").unwrap(), "localhost:8080");
        assert_eq!(
            redirect_addr("http://127.0.0.1:9001/callback").unwrap(),
            "127.0.0.1:9001"
        );
        assert_eq!(redirect_addr("http://localhost").unwrap(), "localhost:80");
        assert!(redirect_addr("https://example.com").is_err());
    }

    #[tokio::test]
    async fn captures_code_from_first_redirect() {
        let flow = BrowserFlow::bind("http://127.0.0.1:0").await.expect("bind");
        let addr = flow.local_addr().await.expect("addr");

        let task = tokio::spawn(async move { flow.obtain_code("http://unused.example").await });

        let mut stream = tokio::net::TcpStream::connect(addr).await.expect("connect");
        stream
            .write_all(
                b"GET /?code=abc123&state=xyz HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n",
            )
            .await
            .expect("request");
        let mut response = String::new();
        let _ = stream.read_to_string(&mut response).await;

        let code = task.await.expect("join").expect("code");
        assert_eq!(code, "abc123");
    }
}
