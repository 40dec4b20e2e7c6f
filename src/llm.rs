//! OpenAI-compatible chat completion backend for the summarizer.
//!
//! One `POST {base_url}/chat/completions` per call, no retries. Any
//! non-2xx status, transport error, or missing message content is an
//! error; the summarizer decides what an error means for its output.

use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use newsroll_core::summarize::{GenerationRequest, TextBackend};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::SummarizerConfig;

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    max_tokens: u32,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

pub struct OpenAiChatBackend {
    http: reqwest::Client,
    base_url: String,
}

impl OpenAiChatBackend {
    pub fn new(config: &SummarizerConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }
}

fn build_body<'a>(request: &'a GenerationRequest<'a>) -> ChatRequest<'a> {
    ChatRequest {
        model: request.model,
        temperature: request.temperature,
        max_tokens: request.max_tokens,
        messages: vec![
            ChatMessage {
                role: "system",
                content: request.system_prompt,
            },
            ChatMessage {
                role: "user",
                content: &request.user_prompt,
            },
        ],
    }
}

fn extract_content(response: ChatResponse) -> Result<String> {
    response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .filter(|c| !c.trim().is_empty())
        .ok_or_else(|| anyhow!("No content in chat completion response"))
}

#[async_trait]
impl TextBackend for OpenAiChatBackend {
    async fn generate(&self, request: &GenerationRequest<'_>) -> Result<String> {
        let url = format!("{}/chat/completions", self.base_url);
        debug!(model = %request.model, max_tokens = request.max_tokens, "chat completion request");

        let response = self
            .http
            .post(&url)
            .header("Authorization", format!("Bearer {}", request.api_key))
            .header("Content-Type", "application/json")
            .json(&build_body(request))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(anyhow!("Chat completion error ({}): {}", status, body_text));
        }

        extract_content(response.json().await?)
    }
}
