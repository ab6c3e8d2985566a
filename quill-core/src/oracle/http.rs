//! Messages API client

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::json;
use tokio::time::Instant;
use tracing::{debug, warn};

use super::breaker::CircuitBreaker;
use super::prompt::{build_prompt, SYSTEM_PROMPT};
use super::Oracle;
use crate::config::OracleConfig;
use crate::review::AnalysisUnit;
use crate::{Error, Result};

const API_VERSION: &str = "2023-06-01";

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: String,
}

/// Oracle over an HTTP messages endpoint
pub struct HttpOracle {
    client: reqwest::Client,
    api_key: String,
    config: OracleConfig,
    breaker: Mutex<CircuitBreaker>,
}

impl HttpOracle {
    /// Create a client with an explicit API key
    pub fn new(config: OracleConfig, api_key: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {}", e)))?;

        let breaker = CircuitBreaker::new(config.breaker_threshold, config.breaker_cooldown);

        Ok(Self {
            client,
            api_key: api_key.into(),
            config,
            breaker: Mutex::new(breaker),
        })
    }

    /// Create a client reading the API key from `QUILL_ORACLE_API_KEY`
    pub fn from_env(config: OracleConfig) -> Result<Self> {
        let api_key = std::env::var("QUILL_ORACLE_API_KEY")
            .ok()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .ok_or_else(|| {
                Error::Fatal("Oracle API key not found. Set QUILL_ORACLE_API_KEY".to_string())
            })?;
        Self::new(config, api_key)
    }

    fn breaker(&self) -> std::sync::MutexGuard<'_, CircuitBreaker> {
        // A poisoned breaker still holds valid counters
        self.breaker.lock().unwrap_or_else(|e| e.into_inner())
    }

    async fn send(&self, prompt: String) -> Result<String> {
        let response = self
            .client
            .post(&self.config.endpoint)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&json!({
                "model": self.config.model,
                "max_tokens": self.config.max_tokens,
                "system": SYSTEM_PROMPT,
                "messages": [
                    { "role": "user", "content": prompt }
                ]
            }))
            .send()
            .await
            .map_err(classify_transport)?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = parse_retry_after(response.headers());
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, retry_after, &body));
        }

        let parsed: MessagesResponse = response
            .json()
            .await
            .map_err(|e| Error::MalformedResponse(format!("undecodable response body: {}", e)))?;

        let text: String = parsed
            .content
            .into_iter()
            .filter(|b| b.kind == "text")
            .map(|b| b.text)
            .collect::<Vec<_>>()
            .join("\n");

        if text.trim().is_empty() {
            return Err(Error::MalformedResponse(
                "response contained no text".to_string(),
            ));
        }

        Ok(text)
    }
}

#[async_trait]
impl Oracle for HttpOracle {
    fn name(&self) -> &'static str {
        "messages-api"
    }

    async fn analyze(&self, unit: &AnalysisUnit) -> Result<String> {
        self.breaker().check(Instant::now())?;

        let prompt = build_prompt(&unit.unit_id, &unit.content, &unit.metadata);
        debug!(
            unit = %unit.unit_id,
            model = %self.config.model,
            prompt_len = prompt.len(),
            "Sending oracle request"
        );

        let result = self.send(prompt).await;

        let mut breaker = self.breaker();
        match &result {
            Ok(_) => breaker.record_success(),
            Err(Error::TransientUpstream(reason)) => {
                breaker.record_failure(Instant::now());
                warn!(
                    reason = %reason,
                    failures = breaker.failure_count(),
                    state = ?breaker.state(),
                    "Oracle transient failure"
                );
            }
            Err(_) => breaker.record_reachable(),
        }

        result
    }
}

impl std::fmt::Debug for HttpOracle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpOracle")
            .field("endpoint", &self.config.endpoint)
            .field("model", &self.config.model)
            .finish_non_exhaustive()
    }
}

fn classify_transport(err: reqwest::Error) -> Error {
    if err.is_decode() || err.is_body() {
        Error::MalformedResponse(err.to_string())
    } else if err.is_builder() {
        Error::Fatal(format!("invalid oracle request: {}", err))
    } else {
        // timeouts, connection resets, DNS failures
        Error::TransientUpstream(err.to_string())
    }
}

fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

/// Map a non-success HTTP status onto the error taxonomy
fn classify_status(status: StatusCode, retry_after: Option<Duration>, body: &str) -> Error {
    let snippet: String = body.chars().take(300).collect();
    let lower = body.to_ascii_lowercase();

    match status.as_u16() {
        429 => Error::RateLimited { retry_after },
        413 => Error::PayloadTooLarge(format!("HTTP 413: {}", snippet)),
        400 if lower.contains("too long") || lower.contains("too large") => {
            Error::PayloadTooLarge(format!("HTTP 400: {}", snippet))
        }
        401 | 403 => Error::Fatal(format!("oracle rejected credentials: HTTP {}", status)),
        408 => Error::TransientUpstream(format!("HTTP 408: {}", snippet)),
        s if s >= 500 => Error::TransientUpstream(format!("HTTP {}: {}", status, snippet)),
        _ => Error::Fatal(format!("oracle request rejected: HTTP {}: {}", status, snippet)),
    }
}
