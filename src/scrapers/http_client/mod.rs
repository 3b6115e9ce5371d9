//! HTTP fetcher for the vehicle lookup form.

mod headers;

pub use headers::USER_AGENT;

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{header, Client};
use thiserror::Error;
use tracing::debug;

use super::RecordFetcher;
use crate::config::{FetchConfig, Settings};
use crate::models::InputKey;

/// Why a single lookup request failed.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP {status} {reason}")]
    Status { status: u16, reason: String },
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
    #[error("connection failed: {0}")]
    Connect(String),
    #[error("request failed: {0}")]
    Transport(String),
    #[error("failed to read response body: {0}")]
    Body(String),
    #[error("invalid request setup: {0}")]
    Client(String),
}

impl FetchError {
    fn from_reqwest(err: reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            FetchError::Timeout(timeout)
        } else if err.is_connect() {
            FetchError::Connect(error_chain(&err))
        } else if err.is_body() || err.is_decode() {
            FetchError::Body(error_chain(&err))
        } else {
            FetchError::Transport(error_chain(&err))
        }
    }
}

/// Flatten an error and its sources into one line; reqwest hides the
/// interesting part (DNS, TLS) in the source chain.
fn error_chain(err: &dyn std::error::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

/// Submits the lookup form over HTTPS with browser-like headers.
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    endpoint: String,
    timeout: Duration,
}

impl HttpClient {
    /// Create a client from process settings.
    pub fn new(settings: &Settings) -> Result<Self, FetchError> {
        let origin = settings
            .origin()
            .map_err(|e| FetchError::Client(e.to_string()))?;
        Self::build(
            &settings.endpoint,
            &origin,
            &settings.referer,
            &settings.user_agent,
            settings.timeout(),
            settings.accept_invalid_certs,
        )
    }

    /// Create a client for an arbitrary endpoint with default headers.
    pub fn with_endpoint(endpoint: &str, timeout: Duration) -> Result<Self, FetchError> {
        let settings = Settings {
            endpoint: endpoint.to_string(),
            ..Settings::default()
        };
        let origin = settings
            .origin()
            .map_err(|e| FetchError::Client(e.to_string()))?;
        Self::build(endpoint, &origin, endpoint, USER_AGENT, timeout, false)
    }

    fn build(
        endpoint: &str,
        origin: &str,
        referer: &str,
        user_agent: &str,
        timeout: Duration,
        accept_invalid_certs: bool,
    ) -> Result<Self, FetchError> {
        let default_headers = headers::browser_headers(origin, referer)
            .map_err(|e| FetchError::Client(e.to_string()))?;

        let client = Client::builder()
            .user_agent(user_agent)
            .default_headers(default_headers)
            .timeout(timeout)
            .danger_accept_invalid_certs(accept_invalid_certs)
            .gzip(true)
            .brotli(true)
            .build()
            .map_err(|e| FetchError::Client(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: endpoint.to_string(),
            timeout,
        })
    }
}

#[async_trait]
impl RecordFetcher for HttpClient {
    async fn fetch(&self, key: &InputKey, config: &FetchConfig) -> Result<String, FetchError> {
        let cookie = headers::session_cookie(config.session_id())
            .map_err(|e| FetchError::Client(format!("invalid session ID: {}", e)))?;

        let form = [
            ("nicNumber", config.nic()),
            ("contactNumber", config.contact()),
            ("vehicleRegistrationNumber", key.as_str()),
        ];

        let start = Instant::now();
        let response = self
            .client
            .post(&self.endpoint)
            .header(header::COOKIE, cookie)
            .form(&form)
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(e, self.timeout))?;

        let status = response.status();
        debug!(
            "POST {} for {} -> {} in {:?}",
            self.endpoint,
            key,
            status.as_u16(),
            start.elapsed()
        );

        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or("").to_string(),
            });
        }

        response
            .text()
            .await
            .map_err(|e| FetchError::from_reqwest(e, self.timeout))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::HeaderMap, http::StatusCode, routing::post, Form, Router};
    use std::collections::HashMap;

    async fn spawn_server(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}/lookup", addr)
    }

    fn config() -> FetchConfig {
        FetchConfig::new(1, 0.0, "2200000000", "0777777777", "SESSION42").unwrap()
    }

    fn key(s: &str) -> InputKey {
        InputKey::parse(s).unwrap()
    }

    #[tokio::test]
    async fn test_fetch_posts_form_with_session_cookie() {
        let app = Router::new().route(
            "/lookup",
            post(
                |headers: HeaderMap, Form(form): Form<HashMap<String, String>>| async move {
                    let cookie = headers
                        .get("cookie")
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or("")
                        .to_string();
                    format!(
                        "{}|{}|{}|{}",
                        form.get("vehicleRegistrationNumber").cloned().unwrap_or_default(),
                        form.get("nicNumber").cloned().unwrap_or_default(),
                        form.get("contactNumber").cloned().unwrap_or_default(),
                        cookie
                    )
                },
            ),
        );
        let url = spawn_server(app).await;

        let client = HttpClient::with_endpoint(&url, Duration::from_secs(5)).unwrap();
        let body = client.fetch(&key("CAB-1234"), &config()).await.unwrap();

        assert_eq!(
            body,
            "CAB-1234|2200000000|0777777777|f5_cspm=1234; JSESSIONID=SESSION42"
        );
    }

    #[tokio::test]
    async fn test_fetch_http_500_is_failure() {
        let app = Router::new().route(
            "/lookup",
            post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom") }),
        );
        let url = spawn_server(app).await;

        let client = HttpClient::with_endpoint(&url, Duration::from_secs(5)).unwrap();
        let err = client.fetch(&key("ABC1"), &config()).await.unwrap_err();

        assert!(matches!(err, FetchError::Status { status: 500, .. }));
        assert!(err.to_string().contains("500"));
    }

    #[tokio::test]
    async fn test_fetch_timeout_is_reported() {
        let app = Router::new().route(
            "/lookup",
            post(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                "late"
            }),
        );
        let url = spawn_server(app).await;

        let client = HttpClient::with_endpoint(&url, Duration::from_millis(200)).unwrap();
        let err = client.fetch(&key("ABC1"), &config()).await.unwrap_err();

        assert!(matches!(err, FetchError::Timeout(_)), "got {:?}", err);
        assert!(err.to_string().contains("timed out"));
    }

    #[tokio::test]
    async fn test_fetch_connection_refused() {
        // Bind then drop to get a port nobody listens on.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let url = format!("http://{}/lookup", addr);
        let client = HttpClient::with_endpoint(&url, Duration::from_secs(2)).unwrap();
        let err = client.fetch(&key("ABC1"), &config()).await.unwrap_err();

        assert!(matches!(err, FetchError::Connect(_)), "got {:?}", err);
    }
}
