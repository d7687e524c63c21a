//! The model boundary: a trait for completion requests plus the HTTP
//! implementation that posts Anthropic-style message bodies to the relay.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::config::{MAX_TOKENS, RELAY_API_KEY};

/// The relay fronts an agent runtime that may run tools for minutes.
const RELAY_TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("relay request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("relay returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("malformed relay response: {0}")]
    Malformed(String),
}

/// One completion request. `allow_execution` tells the relay whether the
/// agent behind it may run code; MCP-direct combinations disable it.
#[derive(Debug, Clone)]
pub struct RelayRequest {
    pub model: String,
    pub system: String,
    pub prompt: String,
    pub max_tokens: u32,
    pub allow_execution: bool,
}

impl RelayRequest {
    pub fn new(model: &str, system: &str, prompt: &str, allow_execution: bool) -> Self {
        Self {
            model: model.to_string(),
            system: system.to_string(),
            prompt: prompt.to_string(),
            max_tokens: MAX_TOKENS,
            allow_execution,
        }
    }
}

/// Final text plus token usage, as reported by the relay.
#[derive(Debug, Clone)]
pub struct RelayOutcome {
    pub text: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
}

#[async_trait]
pub trait ModelRelay: Send + Sync {
    async fn complete(&self, request: RelayRequest) -> Result<RelayOutcome, RelayError>;
}

/// HTTP relay client speaking the Anthropic messages API shape.
pub struct HttpRelay {
    http: reqwest::Client,
    base_url: String,
}

#[derive(Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
    usage: Usage,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: String,
}

#[derive(Deserialize, Serialize)]
struct Usage {
    input_tokens: u64,
    output_tokens: u64,
}

impl HttpRelay {
    pub fn new(base_url: impl Into<String>) -> Result<Self, RelayError> {
        let http = reqwest::Client::builder()
            .timeout(RELAY_TIMEOUT)
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.into(),
        })
    }
}

#[async_trait]
impl ModelRelay for HttpRelay {
    async fn complete(&self, request: RelayRequest) -> Result<RelayOutcome, RelayError> {
        let url = format!("{}/v1/messages", self.base_url.trim_end_matches('/'));
        let body = json!({
            "model": request.model,
            "max_tokens": request.max_tokens,
            "system": request.system,
            "messages": [{ "role": "user", "content": request.prompt }],
            "metadata": { "allow_execution": request.allow_execution },
        });

        let response = self
            .http
            .post(&url)
            .header("x-api-key", RELAY_API_KEY)
            .header("anthropic-version", "2023-06-01")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RelayError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: MessagesResponse = response
            .json()
            .await
            .map_err(|e| RelayError::Malformed(e.to_string()))?;

        let text = parsed
            .content
            .iter()
            .filter(|b| b.kind == "text")
            .map(|b| b.text.as_str())
            .collect::<Vec<_>>()
            .join("\n");

        Ok(RelayOutcome {
            text,
            input_tokens: parsed.usage.input_tokens,
            output_tokens: parsed.usage.output_tokens,
        })
    }
}
