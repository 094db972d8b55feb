//! HTTP client shared by the live marketplace adapters
//!
//! Wraps `reqwest` with user-agent rotation, cancellation at every await
//! point, and classification of transport failures into [`FetchError`]
//! kinds. Request spacing is not handled here; the orchestrator owns the
//! per-platform rate limiters.

use anyhow::{Context, Result};
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, HeaderMap, HeaderValue, USER_AGENT};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::domain::FetchError;
use crate::infrastructure::config::ScraperConfig;

pub const DEFAULT_USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Safari/605.1.15",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/123.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:125.0) Gecko/20100101 Firefox/125.0",
];

/// Markers of bot-verification interstitials served with a 200 status
const BLOCK_MARKERS: &[&str] = &[
    "captcha",
    "verify you are human",
    "/verify/traffic",
    "punish?x5secdata",
    "unusual traffic",
];

#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    user_agents: Vec<String>,
}

impl HttpClient {
    pub fn new(config: &ScraperConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("text/html,application/json;q=0.9,*/*;q=0.8"),
        );
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.8,ms;q=0.6,id;q=0.5"));

        let client = Client::builder()
            .timeout(config.request_timeout())
            .default_headers(headers)
            .cookie_store(true)
            .gzip(true)
            .brotli(true)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .context("Failed to create HTTP client")?;

        let user_agents = if config.user_agents.is_empty() {
            DEFAULT_USER_AGENTS.iter().map(ToString::to_string).collect()
        } else {
            config.user_agents.clone()
        };

        Ok(Self { client, user_agents })
    }

    fn pick_user_agent(&self) -> &str {
        &self.user_agents[fastrand::usize(..self.user_agents.len())]
    }

    /// GET `url` and return the body, classifying every failure.
    pub async fn get_text(
        &self,
        url: &str,
        extra_headers: &[(&'static str, &str)],
        cancel: &CancellationToken,
    ) -> Result<String, FetchError> {
        if cancel.is_cancelled() {
            return Err(FetchError::network("request cancelled before start"));
        }

        let mut request = self.client.get(url).header(USER_AGENT, self.pick_user_agent());
        for (name, value) in extra_headers {
            request = request.header(*name, *value);
        }

        debug!("Fetching URL: {}", url);
        let response = tokio::select! {
            () = cancel.cancelled() => return Err(FetchError::network("request cancelled")),
            response = request.send() => response.map_err(classify_transport_error)?,
        };

        let status = response.status();
        if let Some(error) = classify_status(status) {
            warn!("HTTP {} from {}", status, url);
            return Err(error);
        }

        let body = tokio::select! {
            () = cancel.cancelled() => return Err(FetchError::network("response reading cancelled")),
            body = response.text() => body.map_err(classify_transport_error)?,
        };

        if looks_blocked(&body) {
            warn!("Bot verification page served for {}", url);
            return Err(FetchError::blocked("verification page returned"));
        }
        Ok(body)
    }

    pub async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        extra_headers: &[(&'static str, &str)],
        cancel: &CancellationToken,
    ) -> Result<T, FetchError> {
        let body = self.get_text(url, extra_headers, cancel).await?;
        serde_json::from_str(&body).map_err(|e| FetchError::parse_failure(format!("invalid JSON payload: {e}")))
    }
}

/// Non-success statuses mapped to the fetch error taxonomy
pub fn classify_status(status: StatusCode) -> Option<FetchError> {
    if status.is_success() {
        return None;
    }
    Some(match status {
        StatusCode::FORBIDDEN | StatusCode::TOO_MANY_REQUESTS => FetchError::blocked(format!("HTTP {status}")),
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => FetchError::timeout(format!("HTTP {status}")),
        s if s.is_server_error() => FetchError::network(format!("HTTP {status}")),
        _ => FetchError::parse_failure(format!("unexpected HTTP {status}")),
    })
}

pub fn classify_transport_error(error: reqwest::Error) -> FetchError {
    if error.is_timeout() {
        FetchError::timeout(error.to_string())
    } else if error.is_decode() {
        FetchError::parse_failure(error.to_string())
    } else {
        FetchError::network(error.to_string())
    }
}

pub fn looks_blocked(body: &str) -> bool {
    let head: String = body.chars().take(4096).collect::<String>().to_lowercase();
    BLOCK_MARKERS.iter().any(|marker| head.contains(marker))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::FetchErrorKind;
    use rstest::rstest;

    #[rstest]
    #[case(StatusCode::FORBIDDEN, FetchErrorKind::Blocked)]
    #[case(StatusCode::TOO_MANY_REQUESTS, FetchErrorKind::Blocked)]
    #[case(StatusCode::GATEWAY_TIMEOUT, FetchErrorKind::Timeout)]
    #[case(StatusCode::BAD_GATEWAY, FetchErrorKind::NetworkError)]
    #[case(StatusCode::SERVICE_UNAVAILABLE, FetchErrorKind::NetworkError)]
    #[case(StatusCode::NOT_FOUND, FetchErrorKind::ParseFailure)]
    fn statuses_map_to_kinds(#[case] status: StatusCode, #[case] kind: FetchErrorKind) {
        assert_eq!(classify_status(status).unwrap().kind, kind);
    }

    #[test]
    fn success_is_not_an_error() {
        assert!(classify_status(StatusCode::OK).is_none());
    }

    #[test]
    fn detects_verification_pages() {
        assert!(looks_blocked("<html><title>Please complete the CAPTCHA</title></html>"));
        assert!(looks_blocked("<script>location='/verify/traffic?x=1'</script>"));
        assert!(!looks_blocked("<html><body>USB cable 1m</body></html>"));
    }

    #[test]
    fn builds_with_default_user_agents() {
        let client = HttpClient::new(&ScraperConfig::default()).unwrap();
        assert_eq!(client.user_agents.len(), DEFAULT_USER_AGENTS.len());
        assert!(client.pick_user_agent().starts_with("Mozilla/5.0"));
    }

    #[tokio::test]
    async fn cancelled_token_short_circuits() {
        let client = HttpClient::new(&ScraperConfig::default()).unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = client.get_text("http://127.0.0.1:9/", &[], &cancel).await.unwrap_err();
        assert_eq!(err.kind, FetchErrorKind::NetworkError);
    }
}
