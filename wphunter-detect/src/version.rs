//! WordPress version fingerprint from the `generator` meta tag.

use std::collections::BTreeMap;
use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::detector::{Detector, DetectorResult, Severity};
use crate::error::DetectError;

static GENERATOR_VERSION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"WordPress\s+([0-9]+\.[0-9]+(\.[0-9]+)?)").expect("generator pattern is valid")
});

/// Generator tags can be edited or stripped, so a match is strong but not certain.
pub const GENERATOR_TAG_CONFIDENCE: f64 = 0.85;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_MAX_BODY_BYTES: usize = 1024 * 1024;
const USER_AGENT: &str = concat!("wphunter/", env!("CARGO_PKG_VERSION"));

/// Fetches the target's front page and reads the WordPress version from it.
///
/// One HTTP client is kept per detector so connections are pooled across
/// targets. Clones share the pool.
#[derive(Debug, Clone)]
pub struct VersionDetector {
    client: reqwest::Client,
    timeout: Duration,
    max_body_bytes: usize,
}

impl VersionDetector {
    pub fn new() -> Self {
        Self::with_client(reqwest::Client::new())
    }

    /// Use an existing client, sharing its connection pool.
    pub fn with_client(client: reqwest::Client) -> Self {
        Self {
            client,
            timeout: DEFAULT_TIMEOUT,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_body_bytes(mut self, max: usize) -> Self {
        self.max_body_bytes = max;
        self
    }

    async fn fetch_body(&self, url: &str) -> Result<Vec<u8>, DetectError> {
        let mut response = self
            .client
            .get(url)
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .timeout(self.timeout)
            .send()
            .await?;
        let status = response.status();
        if status.as_u16() >= 400 {
            return Err(DetectError::UnexpectedStatus(status.as_u16()));
        }

        let mut body = Vec::new();
        while let Some(chunk) = response.chunk().await? {
            let room = self.max_body_bytes - body.len();
            body.extend_from_slice(&chunk[..chunk.len().min(room)]);
            if body.len() >= self.max_body_bytes {
                break;
            }
        }
        Ok(body)
    }
}

impl Default for VersionDetector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Detector for VersionDetector {
    fn name(&self) -> &str {
        "version"
    }

    async fn detect(
        &self,
        cancel: &CancellationToken,
        target: &str,
    ) -> Result<DetectorResult, DetectError> {
        let url = normalize_target_url(target);
        debug!(target = %target, url = %url, "Fetching generator tag");

        let body = tokio::select! {
            _ = cancel.cancelled() => return Err(DetectError::Cancelled),
            body = self.fetch_body(&url) => body?,
        };

        let text = String::from_utf8_lossy(&body);
        let version = GENERATOR_VERSION
            .captures(&text)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
            .ok_or(DetectError::VersionNotFound)?;

        let mut metadata = BTreeMap::new();
        metadata.insert("version".to_string(), Value::from(version.clone()));
        metadata.insert("source".to_string(), Value::from("meta-generator"));

        Ok(DetectorResult {
            target: target.to_string(),
            detector: self.name().to_string(),
            severity: Severity::Info,
            summary: format!("WordPress version {version} detected"),
            metadata,
            confidence: GENERATOR_TAG_CONFIDENCE,
        })
    }
}

/// Prefix `https://` when the target carries no scheme.
///
/// The scheme check is case-sensitive: `HTTP://host` is not recognized and
/// becomes `https://HTTP://host`. Blank input is returned untouched.
pub fn normalize_target_url(target: &str) -> String {
    let trimmed = target.trim();
    if trimmed.is_empty() {
        return target.to_string();
    }
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        return trimmed.to_string();
    }
    format!("https://{trimmed}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::Router;
    use axum::http::{HeaderMap, StatusCode, header};
    use axum::response::Html;
    use axum::routing::get;
    use pretty_assertions::assert_eq;

    async fn spawn_site() -> String {
        let app = Router::new()
            .route(
                "/wp",
                get(|| async {
                    Html(r#"<html><head><meta name="generator" content="WordPress 6.4.2" /></head></html>"#)
                }),
            )
            .route(
                "/short",
                get(|| async { Html(r#"<meta name="generator" content="WordPress 5.9">"#) }),
            )
            .route("/plain", get(|| async { Html("<html>nothing here</html>") }))
            .route(
                "/agent",
                get(|headers: HeaderMap| async move {
                    let agent = headers
                        .get(header::USER_AGENT)
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or_default()
                        .to_string();
                    if agent.starts_with("wphunter/") {
                        Html(r#"<meta name="generator" content="WordPress 6.5">"#.to_string())
                    } else {
                        Html(format!("unexpected agent {agent}"))
                    }
                }),
            )
            .route("/missing", get(|| async { StatusCode::NOT_FOUND }))
            .route(
                "/huge",
                get(|| async {
                    let mut page = "a".repeat(2 * 1024 * 1024);
                    page.push_str("WordPress 6.0.0");
                    Html(page)
                }),
            )
            .route(
                "/slow",
                get(|| async {
                    tokio::time::sleep(Duration::from_secs(30)).await;
                    Html("WordPress 1.0")
                }),
            );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    #[test]
    fn test_normalize_target_url() {
        assert_eq!(normalize_target_url("example.com"), "https://example.com");
        assert_eq!(normalize_target_url("  example.com  "), "https://example.com");
        assert_eq!(normalize_target_url("http://example.com "), "http://example.com");
        assert_eq!(normalize_target_url("https://example.com"), "https://example.com");
        assert_eq!(normalize_target_url(""), "");
        assert_eq!(normalize_target_url("   "), "   ");
    }

    #[test]
    fn test_uppercase_scheme_is_double_prefixed() {
        assert_eq!(
            normalize_target_url("HTTP://example.com"),
            "https://HTTP://example.com"
        );
    }

    #[tokio::test]
    async fn test_detects_full_version() {
        let base = spawn_site().await;
        let target = format!("{base}/wp");
        let result = VersionDetector::new()
            .detect(&CancellationToken::new(), &target)
            .await
            .unwrap();

        assert_eq!(result.target, target);
        assert_eq!(result.detector, "version");
        assert_eq!(result.severity, Severity::Info);
        assert_eq!(result.summary, "WordPress version 6.4.2 detected");
        assert_eq!(result.metadata["version"], "6.4.2");
        assert_eq!(result.metadata["source"], "meta-generator");
        assert_eq!(result.confidence, GENERATOR_TAG_CONFIDENCE);
    }

    #[tokio::test]
    async fn test_one_detector_serves_many_targets() {
        let base = spawn_site().await;
        let detector = VersionDetector::new();
        let cancel = CancellationToken::new();

        let first = detector.detect(&cancel, &format!("{base}/wp")).await.unwrap();
        let second = detector.detect(&cancel, &format!("{base}/short")).await.unwrap();
        let shared = detector
            .clone()
            .detect(&cancel, &format!("{base}/agent"))
            .await
            .unwrap();

        assert_eq!(first.metadata["version"], "6.4.2");
        assert_eq!(second.metadata["version"], "5.9");
        assert_eq!(shared.metadata["version"], "6.5");
    }

    #[tokio::test]
    async fn test_supplied_client_still_sends_agent() {
        let base = spawn_site().await;
        let result = VersionDetector::with_client(reqwest::Client::new())
            .detect(&CancellationToken::new(), &format!("{base}/agent"))
            .await
            .unwrap();
        assert_eq!(result.metadata["version"], "6.5");
    }

    #[tokio::test]
    async fn test_detects_two_part_version() {
        let base = spawn_site().await;
        let result = VersionDetector::new()
            .detect(&CancellationToken::new(), &format!("{base}/short"))
            .await
            .unwrap();
        assert_eq!(result.metadata["version"], "5.9");
    }

    #[tokio::test]
    async fn test_error_status_fails() {
        let base = spawn_site().await;
        let err = VersionDetector::new()
            .detect(&CancellationToken::new(), &format!("{base}/missing"))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "unexpected status code 404");
    }

    #[tokio::test]
    async fn test_no_generator_is_an_error() {
        let base = spawn_site().await;
        let err = VersionDetector::new()
            .detect(&CancellationToken::new(), &format!("{base}/plain"))
            .await
            .unwrap_err();
        assert!(matches!(err, DetectError::VersionNotFound));
    }

    #[tokio::test]
    async fn test_marker_past_body_cap_is_ignored() {
        let base = spawn_site().await;
        let err = VersionDetector::new()
            .detect(&CancellationToken::new(), &format!("{base}/huge"))
            .await
            .unwrap_err();
        assert!(matches!(err, DetectError::VersionNotFound));
    }

    #[tokio::test]
    async fn test_cancellation_interrupts_request() {
        let base = spawn_site().await;
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let err = VersionDetector::new()
            .detect(&cancel, &format!("{base}/slow"))
            .await
            .unwrap_err();
        assert!(matches!(err, DetectError::Cancelled));
    }

    #[tokio::test]
    async fn test_timeout_surfaces_as_http_error() {
        let base = spawn_site().await;
        let err = VersionDetector::new()
            .with_timeout(Duration::from_millis(100))
            .detect(&CancellationToken::new(), &format!("{base}/slow"))
            .await
            .unwrap_err();
        assert!(matches!(err, DetectError::Http(_)));
    }
}
