//! Judge site HTTP client
//!
//! Both sites speak the same small JSON API:
//! - `GET {host}/problem/{id}/export` -> `{ "success": bool, "obj": { "title", "tags", .. } }`
//! - `GET {host}/api/v2/search/problems/{title}` ->
//!   `{ "success": bool, "results": [{ "name": "<n>. <title>", "value": <id> }] }`
//!
//! Error mapping:
//! - network failure, timeout, non-2xx status -> `LookupError::Transport`
//! - body not the expected JSON shape -> `LookupError::Protocol`
//! - `success: false` -> `LookupError::NotFound`
//!
//! Search candidate ids are passed through unparsed; see [`CandidateId`].

use crate::error::LookupError;
use crate::models::{CandidateId, ProblemRef, SearchCandidate};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::{Duration, Instant};
use tagsync_common::config::SiteConfig;
use tagsync_common::{Error, Result};
use tokio::sync::Mutex;

/// Remote judge site operations used by the reconciler
#[async_trait]
pub trait JudgeApi: Send + Sync {
    /// Base URL, used in log and error messages
    fn host(&self) -> &str;

    /// Export one problem by id
    async fn fetch_problem(&self, id: u64) -> std::result::Result<ProblemRef, LookupError>;

    /// Search problems by title; candidates keep the remote's order
    async fn search_problems(
        &self,
        title: &str,
    ) -> std::result::Result<Vec<SearchCandidate>, LookupError>;
}

#[derive(Debug, Deserialize)]
struct ExportResponse {
    success: bool,
    obj: Option<ProblemPayload>,
}

#[derive(Debug, Deserialize)]
struct ProblemPayload {
    title: String,
    tags: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    success: bool,
    #[serde(default)]
    results: Vec<RawCandidate>,
}

#[derive(Debug, Deserialize)]
struct RawCandidate {
    name: String,
    value: CandidateId,
}

/// Strip the `"<n>. "` prefix the search endpoint puts before titles
pub fn strip_display_prefix(name: &str) -> &str {
    match name.find(". ") {
        Some(pos) => &name[pos + 2..],
        None => name,
    }
}

/// Minimum spacing between requests to one site
struct RateLimiter {
    last_request: Mutex<Option<Instant>>,
    min_interval: Duration,
}

impl RateLimiter {
    fn new(min_interval_ms: u64) -> Self {
        Self {
            last_request: Mutex::new(None),
            min_interval: Duration::from_millis(min_interval_ms),
        }
    }

    /// Wait if necessary to comply with the configured spacing
    async fn wait(&self) {
        if self.min_interval.is_zero() {
            return;
        }

        let mut last = self.last_request.lock().await;

        if let Some(last_time) = *last {
            let elapsed = last_time.elapsed();
            if elapsed < self.min_interval {
                let wait_time = self.min_interval - elapsed;
                tracing::debug!("Rate limiting: waiting {:?}", wait_time);
                tokio::time::sleep(wait_time).await;
            }
        }

        *last = Some(Instant::now());
    }
}

/// reqwest-backed [`JudgeApi`]
pub struct HttpJudgeClient {
    host: String,
    http_client: reqwest::Client,
    rate_limiter: RateLimiter,
}

impl HttpJudgeClient {
    /// Build a client for one site
    ///
    /// `timeout` bounds each request end to end; an expired request is dropped.
    pub fn new(site: &SiteConfig, timeout: Duration) -> Result<Self> {
        let mut headers = HeaderMap::new();
        for (name, value) in &site.headers {
            let header_name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| Error::Config(format!("invalid header name {:?}: {}", name, e)))?;
            let header_value = HeaderValue::from_str(value)
                .map_err(|e| Error::Config(format!("invalid value for header {}: {}", name, e)))?;
            headers.insert(header_name, header_value);
        }

        let http_client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("HTTP client setup failed: {}", e)))?;

        Ok(Self {
            host: site.host.trim_end_matches('/').to_string(),
            http_client,
            rate_limiter: RateLimiter::new(site.min_request_interval_ms),
        })
    }

    fn search_url(&self, title: &str) -> std::result::Result<reqwest::Url, LookupError> {
        let mut url = reqwest::Url::parse(&self.host)
            .map_err(|e| LookupError::Transport(format!("invalid host {}: {}", self.host, e)))?;
        url.path_segments_mut()
            .map_err(|_| LookupError::Transport(format!("invalid host {}", self.host)))?
            .pop_if_empty()
            .extend(["api", "v2", "search", "problems", title]);
        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: reqwest::Url,
    ) -> std::result::Result<T, LookupError> {
        self.rate_limiter.wait().await;

        tracing::debug!(url = %url, "Querying judge API");

        let response = self
            .http_client
            .get(url)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(LookupError::Transport(format!("HTTP {}", status.as_u16())));
        }

        let body = response.bytes().await.map_err(transport_error)?;
        serde_json::from_slice(&body).map_err(|e| LookupError::Protocol(e.to_string()))
    }
}

fn transport_error(e: reqwest::Error) -> LookupError {
    if e.is_timeout() {
        LookupError::Transport("request timeout".to_string())
    } else {
        LookupError::Transport(e.to_string())
    }
}

#[async_trait]
impl JudgeApi for HttpJudgeClient {
    fn host(&self) -> &str {
        &self.host
    }

    async fn fetch_problem(&self, id: u64) -> std::result::Result<ProblemRef, LookupError> {
        let url = reqwest::Url::parse(&format!("{}/problem/{}/export", self.host, id))
            .map_err(|e| LookupError::Transport(format!("invalid host {}: {}", self.host, e)))?;

        let data: ExportResponse = self.get_json(url).await?;
        if !data.success {
            return Err(LookupError::NotFound(format!(
                "problem {} not found at {}",
                id, self.host
            )));
        }

        let payload = data
            .obj
            .ok_or_else(|| LookupError::Protocol("export response without obj".to_string()))?;

        Ok(ProblemRef {
            id,
            title: payload.title,
            tags: payload.tags.unwrap_or_default(),
        })
    }

    async fn search_problems(
        &self,
        title: &str,
    ) -> std::result::Result<Vec<SearchCandidate>, LookupError> {
        let data: SearchResponse = self.get_json(self.search_url(title)?).await?;
        if !data.success {
            return Err(LookupError::NotFound("problem search failed".to_string()));
        }

        Ok(data
            .results
            .into_iter()
            .map(|raw| SearchCandidate {
                name: strip_display_prefix(&raw.name).to_string(),
                id: raw.value,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn site(host: &str) -> SiteConfig {
        SiteConfig {
            host: host.to_string(),
            headers: BTreeMap::new(),
            min_request_interval_ms: 0,
        }
    }

    #[test]
    fn test_strip_display_prefix() {
        assert_eq!(strip_display_prefix("1024. Two Sum"), "Two Sum");
        assert_eq!(strip_display_prefix("7. A. B. C"), "A. B. C");
        assert_eq!(strip_display_prefix("Plain"), "Plain");
    }

    #[test]
    fn test_search_url_encodes_title() {
        let client = HttpJudgeClient::new(&site("https://judge.example.org/"), Duration::from_secs(1)).unwrap();
        let url = client.search_url("A/B Sum?").unwrap();
        assert_eq!(
            url.as_str(),
            "https://judge.example.org/api/v2/search/problems/A%2FB%20Sum%3F"
        );
    }

    #[test]
    fn test_invalid_header_rejected() {
        let mut config = site("http://judge.local");
        config.headers.insert("Bad Header".to_string(), "x".to_string());
        assert!(matches!(
            HttpJudgeClient::new(&config, Duration::from_secs(1)),
            Err(Error::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_rate_limiter_timing() {
        let limiter = RateLimiter::new(200);

        let start = Instant::now();
        limiter.wait().await;
        let first_elapsed = start.elapsed();
        limiter.wait().await;
        let second_elapsed = start.elapsed();

        assert!(first_elapsed < Duration::from_millis(100));
        assert!(second_elapsed >= Duration::from_millis(180));
    }

    #[tokio::test]
    async fn test_zero_interval_never_waits() {
        let limiter = RateLimiter::new(0);
        let start = Instant::now();
        for _ in 0..5 {
            limiter.wait().await;
        }
        assert!(start.elapsed() < Duration::from_millis(50));
    }
}
