use crate::config::Config;
use crate::error::{Error, Result};
use crate::retry::{with_retry_if, RetryConfig};
use anyhow::Context;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Prompt pair sent to the completion service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionRequest {
    pub system_prompt: String,
    pub user_prompt: String,
}

/// Anything that can turn a prompt into completion text.
///
/// The OpenAI client is the production implementation; tests plug in stubs.
#[async_trait]
pub trait CompletionService: Send + Sync {
    /// Submit the prompt and return the raw completion text
    async fn complete(&self, request: &CompletionRequest) -> Result<String>;
}

/// OpenAI Chat Completion request
#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_completion_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reasoning_effort: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChatMessage,
}

const DEFAULT_MAX_COMPLETION_TOKENS: u32 = 4000;
const REASONING_MAX_COMPLETION_TOKENS: u32 = 16000;

/// Check if a model is a reasoning model that doesn't support temperature
fn is_reasoning_model(model: &str) -> bool {
    model.starts_with("gpt-5")
        || model.starts_with("o1")
        || model.starts_with("o3")
        || model.starts_with("o4")
}

/// Client for the OpenAI chat completions endpoint
pub struct OpenAiClient {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    model: String,
    temperature: f32,
    retry: RetryConfig,
}

impl OpenAiClient {
    pub fn new(config: &Config) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .connect_timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| Error::service(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_url: config.openai_api_url.clone(),
            api_key: config.openai_api_key.clone(),
            model: config.model.clone(),
            temperature: config.temperature,
            retry: RetryConfig::api_call(),
        })
    }

    /// Override the retry policy (tests use short delays)
    pub fn with_retry_config(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    fn build_request(&self, request: &CompletionRequest) -> ChatRequest {
        // Reasoning models need higher token limits and don't support temperature
        let is_reasoning = is_reasoning_model(&self.model);

        ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: request.system_prompt.clone(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: request.user_prompt.clone(),
                },
            ],
            max_completion_tokens: if is_reasoning {
                REASONING_MAX_COMPLETION_TOKENS
            } else {
                DEFAULT_MAX_COMPLETION_TOKENS
            },
            temperature: if is_reasoning {
                None
            } else {
                Some(self.temperature)
            },
            reasoning_effort: if is_reasoning {
                Some("low".to_string())
            } else {
                None
            },
        }
    }

    async fn send(&self, request: &ChatRequest) -> anyhow::Result<String> {
        let response = self
            .client
            .post(&self.api_url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(request)
            .send()
            .await
            .context("Failed to send request to OpenAI API")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|e| format!("<failed to read body: {}>", e));
            anyhow::bail!("OpenAI API error ({}): {}", status, body);
        }

        let chat_response: ChatResponse = response
            .json()
            .await
            .context("Failed to parse OpenAI response")?;

        chat_response
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .context("OpenAI response contained no choices")
    }
}

#[async_trait]
impl CompletionService for OpenAiClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        let chat_request = self.build_request(request);

        with_retry_if(
            &self.retry,
            "OpenAI completion",
            || self.send(&chat_request),
            is_retryable_error,
        )
        .await
        .map_err(|e| Error::service(format!("{:#}", e)))
    }
}

/// Determine if an error is retryable (5xx errors, 429 rate limit, network errors)
/// Other 4xx client errors should not be retried
fn is_retryable_error(error: &anyhow::Error) -> bool {
    let error_str = error.to_string();

    // Error format: "OpenAI API error (400 Bad Request): ..."
    if error_str.contains("OpenAI API error") {
        if let Some(start) = error_str.find('(') {
            if let Some(end) = error_str[start..].find(')') {
                let status_str = &error_str[start + 1..start + end];
                let status_num = status_str.split_whitespace().next().unwrap_or("");
                if let Ok(status) = status_num.parse::<u16>() {
                    return status == 429 || status >= 500;
                }
            }
        }
    }

    // A well-formed reply without choices won't improve on retry
    if error_str.contains("no choices") {
        return false;
    }

    true
}
