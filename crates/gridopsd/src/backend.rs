//! Backend client - one call shape for local and remote language models.
//!
//! LOCAL talks to a same-host Ollama generate endpoint, REMOTE to a hosted
//! OpenAI-compatible chat completions API. Transport failures never escape
//! as errors: they come back as a `BackendReply` with `provider_error` set
//! and a marker line in `raw_text`. No retries happen at this layer.

use crate::config::BackendConfig;
use async_trait::async_trait;
use gridops_shared::{BackendTarget, ErrorKind, GridError};
use serde_json::Value;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, warn};

/// Marker fragments written into `raw_text` on transport failure.
pub const ERROR_MARKERS: &[&str] = &["Connection Error", "Timeout Error", "API Error ("];

/// Longest provider body echoed back in an error message
const MAX_ERROR_BODY: usize = 500;

// ============================================================================
// Reply types
// ============================================================================

/// Why a backend call failed
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderError {
    pub kind: ErrorKind,
    pub message: String,
}

impl ProviderError {
    pub fn new(kind: ErrorKind, message: &str) -> Self {
        Self {
            kind,
            message: message.to_string(),
        }
    }

    /// Marker line carried in `raw_text` for this failure.
    fn marker_line(&self) -> String {
        match self.kind {
            ErrorKind::BackendTimeout => format!("Backend Timeout Error: {}", self.message),
            ErrorKind::BackendHttp(status) => {
                format!("Backend API Error ({}): {}", status, self.message)
            }
            _ => format!("Backend Connection Error: {}", self.message),
        }
    }

    pub fn into_grid_error(self) -> GridError {
        match self.kind {
            ErrorKind::BackendTimeout => GridError::BackendTimeout(self.message),
            ErrorKind::BackendHttp(status) => GridError::BackendHttp {
                status,
                message: self.message,
            },
            _ => GridError::BackendConnection(self.message),
        }
    }
}

/// Result of one backend call. Ephemeral.
#[derive(Debug, Clone, PartialEq)]
pub struct BackendReply {
    pub raw_text: String,
    pub provider_error: Option<ProviderError>,
}

impl BackendReply {
    pub fn ok(text: &str) -> Self {
        Self {
            raw_text: text.to_string(),
            provider_error: None,
        }
    }

    pub fn failed(kind: ErrorKind, message: &str) -> Self {
        let error = ProviderError::new(kind, message);
        Self {
            raw_text: error.marker_line(),
            provider_error: Some(error),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.provider_error.is_none()
    }

    /// True when the call failed or the text itself reads like a transport error.
    pub fn signals_transport_failure(&self) -> bool {
        self.provider_error.is_some() || carries_error_marker(&self.raw_text)
    }
}

/// Heuristic for error text relayed as a normal reply (e.g. by a proxy).
pub fn carries_error_marker(text: &str) -> bool {
    ERROR_MARKERS.iter().any(|m| text.contains(m))
}

/// Cut `s` to at most `max` chars for logs and messages.
pub fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}

// ============================================================================
// Backend trait
// ============================================================================

/// Uniform call to a language-model provider.
#[async_trait]
pub trait Backend: Send + Sync {
    async fn invoke(&self, prompt: &str, target: BackendTarget, timeout: Duration) -> BackendReply;
}

/// A backend bound to one target and timeout for the lifetime of a request.
#[derive(Clone)]
pub struct BackendRoute {
    backend: Arc<dyn Backend>,
    target: BackendTarget,
    timeout: Duration,
}

impl BackendRoute {
    pub fn new(backend: Arc<dyn Backend>, target: BackendTarget, timeout: Duration) -> Self {
        Self {
            backend,
            target,
            timeout,
        }
    }

    pub fn from_config(
        backend: Arc<dyn Backend>,
        target: BackendTarget,
        config: &BackendConfig,
    ) -> Self {
        Self::new(backend, target, config.timeout_for(target))
    }

    /// Invoke the backend; `stage` only labels the logs.
    pub async fn call(&self, stage: &str, prompt: &str) -> BackendReply {
        debug!(
            stage,
            target = %self.target,
            "prompt ({} chars): {}",
            prompt.len(),
            truncate_chars(prompt, 200)
        );
        let reply = self.backend.invoke(prompt, self.target, self.timeout).await;
        match &reply.provider_error {
            Some(err) => warn!(stage, target = %self.target, kind = %err.kind, "backend call failed: {}", err.message),
            None => debug!(stage, "reply: {}", truncate_chars(&reply.raw_text, 300)),
        }
        reply
    }
}

// ============================================================================
// HTTP backend (production)
// ============================================================================

/// reqwest-based client for Ollama and OpenAI-compatible providers
pub struct HttpBackend {
    http: reqwest::Client,
    config: BackendConfig,
}

impl HttpBackend {
    pub fn new(config: BackendConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder().build()?;
        Ok(Self { http, config })
    }

    async fn call_local(&self, prompt: &str, timeout: Duration) -> BackendReply {
        let body = serde_json::json!({
            "model": self.config.local_model,
            "prompt": prompt,
            "stream": false,
            "options": { "temperature": self.config.temperature }
        });

        let request = self
            .http
            .post(&self.config.local_url)
            .timeout(timeout)
            .json(&body);

        match send_for_json(request).await {
            Ok(json) => match json.get("response").and_then(Value::as_str) {
                Some(text) => BackendReply::ok(text),
                None => BackendReply::failed(
                    ErrorKind::BackendConnection,
                    "empty provider payload: no 'response' field",
                ),
            },
            Err(err) => BackendReply {
                raw_text: err.marker_line(),
                provider_error: Some(err),
            },
        }
    }

    async fn call_remote(&self, prompt: &str, timeout: Duration) -> BackendReply {
        let body = serde_json::json!({
            "model": self.config.remote_model,
            "messages": [{ "role": "user", "content": prompt }],
            "temperature": self.config.temperature,
            "max_tokens": self.config.max_tokens
        });

        let request = self
            .http
            .post(&self.config.remote_url)
            .timeout(timeout)
            .bearer_auth(&self.config.remote_api_key)
            .json(&body);

        match send_for_json(request).await {
            Ok(json) => match json
                .pointer("/choices/0/message/content")
                .and_then(Value::as_str)
            {
                Some(text) => BackendReply::ok(text),
                None => BackendReply::failed(
                    ErrorKind::BackendConnection,
                    "empty provider payload: no 'choices[0].message.content'",
                ),
            },
            Err(err) => BackendReply {
                raw_text: err.marker_line(),
                provider_error: Some(err),
            },
        }
    }
}

#[async_trait]
impl Backend for HttpBackend {
    async fn invoke(&self, prompt: &str, target: BackendTarget, timeout: Duration) -> BackendReply {
        match target {
            BackendTarget::Local => self.call_local(prompt, timeout).await,
            BackendTarget::Remote => self.call_remote(prompt, timeout).await,
        }
    }
}

fn transport_error(e: &reqwest::Error) -> ProviderError {
    if e.is_timeout() {
        ProviderError::new(ErrorKind::BackendTimeout, &e.to_string())
    } else {
        ProviderError::new(ErrorKind::BackendConnection, &e.to_string())
    }
}

/// Send, require 2xx, decode JSON. Every failure becomes a `ProviderError`.
async fn send_for_json(request: reqwest::RequestBuilder) -> Result<Value, ProviderError> {
    let response = request.send().await.map_err(|e| transport_error(&e))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ProviderError::new(
            ErrorKind::BackendHttp(status.as_u16()),
            &truncate_chars(body.trim(), MAX_ERROR_BODY),
        ));
    }

    response.json::<Value>().await.map_err(|e| {
        if e.is_timeout() {
            transport_error(&e)
        } else {
            ProviderError::new(
                ErrorKind::BackendConnection,
                &format!("malformed provider response: {}", e),
            )
        }
    })
}

// ============================================================================
// Fake backend (testing)
// ============================================================================

/// Scripted backend for deterministic tests.
///
/// Replies are chosen by the first rule whose marker appears in the prompt.
///
/// ```rust,ignore
/// let fake = FakeBackend::new()
///     .respond_when("intent classifier", r#"{"intent": "FORECAST"}"#)
///     .fail_when("Data Analyst", ErrorKind::BackendTimeout);
/// ```
pub struct FakeBackend {
    rules: Vec<(String, BackendReply)>,
    default_reply: BackendReply,
    down_targets: Vec<(BackendTarget, ErrorKind)>,
    calls: Arc<Mutex<Vec<(BackendTarget, String)>>>,
}

impl FakeBackend {
    /// Unmatched prompts get an empty, successful reply
    pub fn new() -> Self {
        Self {
            rules: Vec::new(),
            default_reply: BackendReply::ok(""),
            down_targets: Vec::new(),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Every call fails as if the provider were down
    pub fn unreachable() -> Self {
        Self::new().otherwise_fail(ErrorKind::BackendConnection)
    }

    pub fn respond_when(mut self, marker: &str, text: &str) -> Self {
        self.rules.push((marker.to_string(), BackendReply::ok(text)));
        self
    }

    pub fn fail_when(mut self, marker: &str, kind: ErrorKind) -> Self {
        self.rules
            .push((marker.to_string(), BackendReply::failed(kind, "scripted failure")));
        self
    }

    /// Every call to `target` fails, whatever the prompt
    pub fn target_down(mut self, target: BackendTarget, kind: ErrorKind) -> Self {
        self.down_targets.push((target, kind));
        self
    }

    pub fn otherwise(mut self, text: &str) -> Self {
        self.default_reply = BackendReply::ok(text);
        self
    }

    pub fn otherwise_fail(mut self, kind: ErrorKind) -> Self {
        self.default_reply = BackendReply::failed(kind, "scripted failure");
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().map(|c| c.len()).unwrap_or(0)
    }

    /// Number of calls whose prompt contained `marker`
    pub fn calls_matching(&self, marker: &str) -> usize {
        self.calls
            .lock()
            .map(|c| c.iter().filter(|(_, p)| p.contains(marker)).count())
            .unwrap_or(0)
    }

    pub fn prompts(&self) -> Vec<String> {
        self.calls
            .lock()
            .map(|c| c.iter().map(|(_, p)| p.clone()).collect())
            .unwrap_or_default()
    }

    pub fn targets(&self) -> Vec<BackendTarget> {
        self.calls
            .lock()
            .map(|c| c.iter().map(|(t, _)| *t).collect())
            .unwrap_or_default()
    }
}

impl Default for FakeBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Backend for FakeBackend {
    async fn invoke(&self, prompt: &str, target: BackendTarget, _timeout: Duration) -> BackendReply {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push((target, prompt.to_string()));
        }
        if let Some((_, kind)) = self.down_targets.iter().find(|(t, _)| *t == target) {
            return BackendReply::failed(*kind, "scripted outage");
        }
        self.rules
            .iter()
            .find(|(marker, _)| prompt.contains(marker.as_str()))
            .map(|(_, reply)| reply.clone())
            .unwrap_or_else(|| self.default_reply.clone())
    }
}
