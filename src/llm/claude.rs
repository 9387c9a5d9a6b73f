use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::llm::provider::{http_error, BackendReply, CompletionBackend, GenerationParams, SYSTEM_PROMPT};
use crate::llm::registry::ProviderConfig;

pub struct ClaudeBackend {
    client: Client,
    api_key: String,
    base_url: String,
}

#[derive(Serialize)]
struct ClaudeRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    messages: Vec<ClaudeMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
}

#[derive(Serialize)]
struct ClaudeMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ClaudeResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
    #[serde(default)]
    stop_reason: Option<String>,
    #[serde(default)]
    error: Option<ClaudeError>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    content_type: String,
    text: Option<String>,
}

#[derive(Deserialize)]
struct ClaudeError {
    message: String,
}

impl ClaudeBackend {
    pub fn new(client: Client, config: &ProviderConfig) -> Result<Self> {
        Ok(Self {
            client,
            api_key: config.api_key()?.to_string(),
            base_url: config.base_url.clone(),
        })
    }

    fn extract(&self, response: ClaudeResponse) -> Result<BackendReply> {
        if let Some(error) = response.error {
            return Err(Error::provider_call(self.name(), error.message));
        }

        let text = response
            .content
            .into_iter()
            .filter(|c| c.content_type == "text")
            .filter_map(|c| c.text)
            .collect::<Vec<_>>()
            .join("");

        Ok(BackendReply {
            text: text.trim().to_string(),
            finish_reason: response.stop_reason,
        })
    }
}

#[async_trait]
impl CompletionBackend for ClaudeBackend {
    async fn complete(&self, prompt: &str, params: &GenerationParams) -> Result<BackendReply> {
        let request_body = ClaudeRequest {
            model: &params.model,
            max_tokens: params.max_tokens,
            temperature: params.temperature,
            system: Some(SYSTEM_PROMPT),
            messages: vec![ClaudeMessage {
                role: "user",
                content: prompt,
            }],
        };

        let response = self
            .client
            .post(format!("{}/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&request_body)
            .send()
            .await
            .map_err(|e| Error::provider_call(self.name(), format!("Failed to send request: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(http_error(self.name(), Some("ANTHROPIC_API_KEY"), status, &body));
        }

        let result: ClaudeResponse = response.json().await.map_err(|e| {
            Error::provider_call(self.name(), format!("Failed to parse Claude response: {}", e))
        })?;

        self.extract(result)
    }

    fn name(&self) -> &str {
        "claude"
    }
}
