// src/llm_extract.rs

use crate::config::LlmSection;
use crate::error::ModelCallError;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

/// Something that answers a system + user prompt with raw text.
#[async_trait]
pub trait ModelClient: Send + Sync {
    async fn complete(&self, system_prompt: &str, user_prompt: &str)
    -> Result<String, ModelCallError>;
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    content: Option<String>,
}

/// OpenAI-compatible `/chat/completions` endpoint.
pub struct ChatCompletionsClient {
    client: Client,
    base_url: String,
    model: String,
    api_key: String,
    temperature: f64,
    json_mode: bool,
    timeout: Duration,
}

impl ChatCompletionsClient {
    pub fn new(llm: &LlmSection, api_key: String) -> Self {
        info!(
            url = %llm.base_url,
            model = %llm.model,
            timeout_secs = llm.timeout_secs,
            "Using chat-completions backend"
        );
        Self {
            client: Client::new(),
            base_url: llm.base_url.trim_end_matches('/').to_string(),
            model: llm.model.clone(),
            api_key,
            temperature: llm.temperature,
            json_mode: llm.json_mode,
            timeout: llm.timeout(),
        }
    }

    fn request_error(&self, e: reqwest::Error) -> ModelCallError {
        if e.is_timeout() {
            ModelCallError::Timeout(self.timeout.as_secs())
        } else {
            ModelCallError::Request(e)
        }
    }
}

#[async_trait]
impl ModelClient for ChatCompletionsClient {
    async fn complete(
        &self,
        system_prompt: &str,
        user_prompt: &str,
    ) -> Result<String, ModelCallError> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: user_prompt,
                },
            ],
            temperature: self.temperature,
            response_format: self.json_mode.then_some(ResponseFormat {
                kind: "json_object",
            }),
        };

        let url = format!("{}/chat/completions", self.base_url);
        debug!(url = %url, prompt_chars = user_prompt.len(), "Calling LLM");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .timeout(self.timeout)
            .json(&request)
            .send()
            .await
            .map_err(|e| self.request_error(e))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ModelCallError::Status { status, body });
        }

        let chat_response: ChatResponse = response.json().await.map_err(|e| {
            if e.is_timeout() {
                self.request_error(e)
            } else {
                ModelCallError::Decode(e)
            }
        })?;

        chat_response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or(ModelCallError::EmptyResponse)
    }
}
