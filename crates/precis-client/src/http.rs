//! HTTP client for a running precis server.

use precis_core::{ErrorBody, HealthResponse, SummarizeRequest, SummaryResponse};
use reqwest::StatusCode;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server returned {status}: {message}")]
    Server { status: u16, message: String },
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Client for the `/summarize/` and `/health/` endpoints.
pub struct SummaryClient {
    client: reqwest::Client,
    base_url: String,
}

impl SummaryClient {
    /// Create a client for the given server, e.g. `http://127.0.0.1:8000`.
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Summarize one article.
    pub async fn summarize(
        &self,
        request: &SummarizeRequest,
    ) -> Result<SummaryResponse, ClientError> {
        let url = format!("{}/summarize/", self.base_url);

        info!(url = %url, chars = request.text.len(), "requesting summary");
        let resp = self.client.post(&url).json(request).send().await?;
        let status = resp.status();
        let body = resp.text().await?;
        if !status.is_success() {
            return Err(server_error(status, &body));
        }

        let summary: SummaryResponse = serde_json::from_str(&body)?;
        debug!(
            summary_length = summary.summary_length,
            compression_ratio = summary.compression_ratio,
            "summary received"
        );
        Ok(summary)
    }

    /// Query server health.
    ///
    /// An unhealthy server answers 500 with a health body; that is returned
    /// as `Ok` so callers can show the load error.
    pub async fn health(&self) -> Result<HealthResponse, ClientError> {
        let url = format!("{}/health/", self.base_url);

        debug!(url = %url, "checking server health");
        let resp = self.client.get(&url).send().await?;
        let status = resp.status();
        let body = resp.text().await?;

        match serde_json::from_str::<HealthResponse>(&body) {
            Ok(health) if status.is_success() || status == StatusCode::INTERNAL_SERVER_ERROR => {
                Ok(health)
            }
            Ok(_) => Err(server_error(status, &body)),
            Err(e) if status.is_success() => Err(e.into()),
            Err(_) => Err(server_error(status, &body)),
        }
    }
}

/// Prefer the `{"error": ...}` message over the raw body.
fn server_error(status: StatusCode, body: &str) -> ClientError {
    let message = serde_json::from_str::<ErrorBody>(body)
        .map(|b| b.error)
        .unwrap_or_else(|_| body.to_string());
    ClientError::Server {
        status: status.as_u16(),
        message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_trims_trailing_slash() {
        let client = SummaryClient::new("http://localhost:8000/");
        assert_eq!(client.base_url(), "http://localhost:8000");
    }

    #[test]
    fn server_error_uses_error_field() {
        let err = server_error(
            StatusCode::BAD_REQUEST,
            r#"{"error": "No text provided for summarization"}"#,
        );
        match err {
            ClientError::Server { status, message } => {
                assert_eq!(status, 400);
                assert_eq!(message, "No text provided for summarization");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn server_error_falls_back_to_body() {
        let err = server_error(StatusCode::BAD_GATEWAY, "upstream down");
        assert_eq!(err.to_string(), "server returned 502: upstream down");
    }

    #[tokio::test]
    async fn unreachable_server_is_http_error() {
        // Port 9 (discard) is almost never listening on localhost.
        let client = SummaryClient::new("http://127.0.0.1:9");
        let err = client.health().await.unwrap_err();
        assert!(matches!(err, ClientError::Http(_)));
    }
}
