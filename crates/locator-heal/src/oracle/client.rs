//! OpenAI-compatible repair oracle.
//!
//! Sends the rendered [`HealingRequest`] as a single user message to
//! `<endpoint>/v1/chat/completions` and decodes the answer text found at
//! `choices[0].message.content`.

use super::parse;
use super::prompt::HealingRequest;
use super::RepairOracle;
use crate::locator::Locator;
use crate::result::{HealError, HealResult};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// Default oracle endpoint
pub const DEFAULT_ENDPOINT: &str = "http://localhost:8081";

/// Default model name
pub const DEFAULT_MODEL: &str = "default";

/// Default bearer token (local servers accept anything)
pub const DEFAULT_API_TOKEN: &str = "EMPTY";

/// Default connect timeout (30 seconds)
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 30_000;

/// Default read timeout (60 seconds)
pub const DEFAULT_READ_TIMEOUT_MS: u64 = 60_000;

/// How a multi-locator answer maps back onto the request
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchProtocol {
    /// Line `i` answers damaged locator `i`
    #[default]
    LinePerLocator,
    /// Every predicate-bearing XPath in the answer, in order of appearance
    XPathScan,
}

/// Oracle endpoint configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OracleConfig {
    /// Base URL of the chat completions server
    pub endpoint: String,
    /// Model identifier
    pub model: String,
    /// Bearer token
    pub api_token: String,
    /// Connect timeout in milliseconds
    pub connect_timeout_ms: u64,
    /// Request timeout in milliseconds
    pub read_timeout_ms: u64,
    /// Batch answer protocol
    pub batch_protocol: BatchProtocol,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            model: DEFAULT_MODEL.to_string(),
            api_token: DEFAULT_API_TOKEN.to_string(),
            connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT_MS,
            read_timeout_ms: DEFAULT_READ_TIMEOUT_MS,
            batch_protocol: BatchProtocol::default(),
        }
    }
}

impl OracleConfig {
    /// Set endpoint
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Set model
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set bearer token
    #[must_use]
    pub fn with_api_token(mut self, token: impl Into<String>) -> Self {
        self.api_token = token.into();
        self
    }

    /// Set both timeouts in milliseconds
    #[must_use]
    pub const fn with_timeouts(mut self, connect_ms: u64, read_ms: u64) -> Self {
        self.connect_timeout_ms = connect_ms;
        self.read_timeout_ms = read_ms;
        self
    }

    /// Set batch protocol
    #[must_use]
    pub const fn with_batch_protocol(mut self, protocol: BatchProtocol) -> Self {
        self.batch_protocol = protocol;
        self
    }
}

/// Chat message role.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System prompt
    System,
    /// User message
    User,
    /// Assistant response
    Assistant,
}

/// A single chat message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    /// The role of the message author.
    pub role: Role,
    /// The content of the message.
    pub content: String,
}

/// Chat completion request body.
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    /// Model identifier.
    pub model: String,
    /// The messages for the chat completion.
    pub messages: Vec<ChatMessage>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatResponseChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatResponseChoice {
    message: Option<ResponseMessage>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

/// Repair oracle backed by a chat completions endpoint
#[derive(Debug, Clone)]
pub struct ChatOracle {
    endpoint: String,
    model: String,
    api_token: String,
    protocol: BatchProtocol,
    client: reqwest::blocking::Client,
}

impl ChatOracle {
    /// Build an oracle from configuration
    pub fn new(config: &OracleConfig) -> HealResult<Self> {
        let client = reqwest::blocking::Client::builder()
            .connect_timeout(Duration::from_millis(config.connect_timeout_ms))
            .timeout(Duration::from_millis(config.read_timeout_ms))
            .build()
            .map_err(|e| HealError::config(format!("oracle HTTP client: {e}")))?;
        Ok(Self {
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_token: config.api_token.clone(),
            protocol: config.batch_protocol,
            client,
        })
    }

    /// Returns the endpoint base URL.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Returns the model name.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Send one prompt and return the answer text with fences stripped
    pub fn complete(&self, prompt: String) -> HealResult<String> {
        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage {
                role: Role::User,
                content: prompt,
            }],
        };

        let url = format!("{}/v1/chat/completions", self.endpoint);
        let start = Instant::now();
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_token)
            .json(&request)
            .send()
            .map_err(|e| HealError::oracle_unavailable(format!("{url}: {e}")))?;

        let status = response.status();
        let body = response
            .text()
            .map_err(|e| HealError::oracle_unavailable(format!("{url}: {e}")))?;
        if !status.is_success() {
            tracing::warn!(status = status.as_u16(), body = %body, "repair oracle rejected request");
            return Err(HealError::oracle_unavailable(format!(
                "status {}: {}",
                status.as_u16(),
                body
            )));
        }

        tracing::debug!(
            latency_ms = start.elapsed().as_millis() as u64,
            bytes = body.len(),
            "repair oracle answered"
        );

        let answer = extract_content(&body)?;
        let answer = parse::strip_fences(&answer);
        if answer.is_empty() {
            return Err(HealError::healing_failed("oracle answer is empty"));
        }
        Ok(answer.to_string())
    }
}

/// Answer text at `choices[0].message.content`
fn extract_content(body: &str) -> HealResult<String> {
    if body.trim().is_empty() {
        return Err(HealError::healing_failed("oracle returned an empty body"));
    }
    let response: ChatResponse = serde_json::from_str(body)
        .map_err(|e| HealError::healing_failed(format!("malformed oracle response: {e}")))?;
    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message)
        .and_then(|message| message.content)
        .map(|content| content.trim().to_string())
        .filter(|content| !content.is_empty())
        .ok_or_else(|| HealError::healing_failed("oracle response has no content"))
}

impl RepairOracle for ChatOracle {
    fn repair_one(&self, damaged: &Locator, excerpt: &str) -> HealResult<Option<Locator>> {
        let prompt = HealingRequest::single(damaged, excerpt).into_prompt();
        let answer = self.complete(prompt)?;
        let candidate = parse::first_candidate(&answer).map(Locator::from_candidate);
        tracing::info!(
            damaged = %damaged,
            candidate = ?candidate.as_ref().map(Locator::key),
            "oracle proposed replacement"
        );
        Ok(candidate)
    }

    fn repair_many(&self, damaged: &[Locator], excerpt: &str) -> HealResult<Vec<Option<Locator>>> {
        if damaged.is_empty() {
            return Ok(Vec::new());
        }
        let prompt = HealingRequest::new(damaged.to_vec(), excerpt).into_prompt();
        let answer = self.complete(prompt)?;

        let candidates: Vec<Option<&str>> = match self.protocol {
            BatchProtocol::LinePerLocator => parse::aligned_candidates(&answer, damaged.len()),
            BatchProtocol::XPathScan => {
                let found = parse::scan_xpaths(&answer);
                if found.len() != damaged.len() {
                    tracing::warn!(
                        requested = damaged.len(),
                        found = found.len(),
                        "xpath scan count differs from request"
                    );
                }
                let mut found = found.into_iter();
                damaged.iter().map(|_| found.next()).collect()
            }
        };

        Ok(candidates
            .into_iter()
            .map(|c| c.map(Locator::from_candidate))
            .collect())
    }
}
