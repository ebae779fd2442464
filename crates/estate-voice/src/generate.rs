//! Answer generation over an OpenAI-compatible chat completions API.

use async_trait::async_trait;
use estate_core::{EstateConfig, GenerationError, Generator};
use serde::{Deserialize, Serialize};

use crate::{clip_body, http_client};

#[derive(Debug, Clone)]
pub struct ChatGenerator {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Option<Vec<ChatChoice>>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: Option<ChoiceMessage>,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

impl ChatGenerator {
    pub fn from_config(cfg: &EstateConfig) -> reqwest::Result<Self> {
        let o = &cfg.openai;
        Ok(Self {
            base_url: o.base_url.clone(),
            api_key: o.api_key.clone(),
            model: o.chat_model.clone(),
            max_tokens: o.max_tokens,
            temperature: o.temperature,
            client: http_client(o.timeout_secs)?,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }

    /// The assembled prompt travels as a single user message.
    fn request<'a>(&'a self, prompt: &'a str) -> ChatRequest<'a> {
        ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        }
    }
}

fn parse_reply(body: &str) -> Result<String, GenerationError> {
    let parsed: ChatResponse =
        serde_json::from_str(body).map_err(|e| GenerationError::Malformed(e.to_string()))?;
    let content = parsed
        .choices
        .and_then(|c| c.into_iter().next())
        .and_then(|c| c.message)
        .and_then(|m| m.content)
        .ok_or_else(|| GenerationError::Malformed("no choices[0].message.content".to_string()))?;
    let reply = content.trim();
    if reply.is_empty() {
        return Err(GenerationError::Empty);
    }
    Ok(reply.to_string())
}

#[async_trait]
impl Generator for ChatGenerator {
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        let res = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&self.request(prompt))
            .send()
            .await
            .map_err(|e| GenerationError::Request(e.to_string()))?;
        let status = res.status();
        let body = res
            .text()
            .await
            .map_err(|e| GenerationError::Request(e.to_string()))?;
        if !status.is_success() {
            return Err(GenerationError::Status(status.as_u16(), clip_body(&body)));
        }
        parse_reply(&body)
    }
}
