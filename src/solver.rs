//! External CAPTCHA-solving service client.
//!
//! Protocol: the submit endpoint accepts a base64-encoded image and returns
//! `{status, request}` where `status == 1` carries a solve id; the result
//! endpoint is polled with that id until `status == 1` (solved text),
//! `request == "CAPCHA_NOT_READY"` (keep polling), or anything else (final
//! error). Polling is interruptible by cancellation and bounded by
//! `MAX_WAIT_TIME`.

use crate::constants::timing;
use crate::error::{Error, Result};
use crate::session::CancelToken;
use async_trait::async_trait;
use base64::Engine as _;
use serde::Deserialize;
use std::time::Duration;
use tokio::time::{sleep, Instant};

/// Sentinel the service returns while still working on a captcha.
const NOT_READY: &str = "CAPCHA_NOT_READY";

/// Image-captcha solving service.
#[async_trait]
pub trait CaptchaSolver: Send + Sync {
    /// Solve a captcha image. `Ok(None)` means the service gave no answer
    /// within the time budget; callers fall back to manual handling.
    async fn solve_image(&self, image: &[u8], cancel: &CancelToken) -> Result<Option<String>>;
}

/// Solver that never answers; used when no external service is configured.
#[derive(Debug, Default)]
pub struct NullSolver;

#[async_trait]
impl CaptchaSolver for NullSolver {
    async fn solve_image(&self, _image: &[u8], _cancel: &CancelToken) -> Result<Option<String>> {
        Ok(None)
    }
}

/// Configuration for the HTTP solver client.
#[derive(Debug, Clone)]
pub struct SolverConfig {
    pub api_key: String,
    /// Service base URL; submit and result endpoints hang off it.
    pub base_url: String,
    pub poll_interval: Duration,
    pub max_wait: Duration,
}

impl SolverConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: "http://2captcha.com".to_string(),
            poll_interval: timing::POLL_INTERVAL,
            max_wait: timing::MAX_WAIT_TIME,
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_max_wait(mut self, max_wait: Duration) -> Self {
        self.max_wait = max_wait;
        self
    }
}

#[derive(Debug, Deserialize)]
struct ServiceResponse {
    status: i32,
    request: String,
}

/// HTTP client for the solving service.
pub struct HttpCaptchaSolver {
    config: SolverConfig,
    http: reqwest::Client,
}

impl HttpCaptchaSolver {
    pub fn new(config: SolverConfig) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();
        Self { config, http }
    }

    fn submit_url(&self) -> String {
        format!("{}/in.php", self.config.base_url.trim_end_matches('/'))
    }

    fn result_url(&self) -> String {
        format!("{}/res.php", self.config.base_url.trim_end_matches('/'))
    }

    async fn submit(&self, image: &[u8]) -> Result<String> {
        let encoded = base64::engine::general_purpose::STANDARD.encode(image);
        let response: ServiceResponse = self
            .http
            .post(self.submit_url())
            .form(&[
                ("key", self.config.api_key.as_str()),
                ("method", "base64"),
                ("body", encoded.as_str()),
                ("json", "1"),
            ])
            .send()
            .await
            .map_err(|e| Error::Solver(format!("submit failed: {}", e)))?
            .json()
            .await
            .map_err(|e| Error::Solver(format!("malformed submit response: {}", e)))?;

        if response.status != 1 {
            return Err(Error::Solver(format!("submit rejected: {}", response.request)));
        }
        Ok(response.request)
    }

    async fn poll(&self, id: &str, cancel: &CancelToken) -> Result<Option<String>> {
        let deadline = Instant::now() + self.config.max_wait;
        loop {
            cancel.check()?;
            if Instant::now() >= deadline {
                tracing::warn!(id, "captcha solver timed out");
                return Ok(None);
            }
            sleep(self.config.poll_interval).await;
            cancel.check()?;

            let response: ServiceResponse = self
                .http
                .get(self.result_url())
                .query(&[
                    ("key", self.config.api_key.as_str()),
                    ("action", "get"),
                    ("id", id),
                    ("json", "1"),
                ])
                .send()
                .await
                .map_err(|e| Error::Solver(format!("poll failed: {}", e)))?
                .json()
                .await
                .map_err(|e| Error::Solver(format!("malformed poll response: {}", e)))?;

            if response.status == 1 {
                return Ok(Some(response.request));
            }
            if response.request != NOT_READY {
                return Err(Error::Solver(format!("solver error: {}", response.request)));
            }
            tracing::debug!(id, "captcha not ready, polling again");
        }
    }
}

#[async_trait]
impl CaptchaSolver for HttpCaptchaSolver {
    async fn solve_image(&self, image: &[u8], cancel: &CancelToken) -> Result<Option<String>> {
        if self.config.api_key.is_empty() {
            return Err(Error::Solver("no API key configured".to_string()));
        }
        cancel.check()?;
        let id = self.submit(image).await?;
        tracing::info!(id, "captcha submitted to external solver");
        self.poll(&id, cancel).await
    }
}
