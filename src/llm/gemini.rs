use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::llm::provider::{http_error, BackendReply, CompletionBackend, GenerationParams};
use crate::llm::registry::ProviderConfig;

pub struct GeminiBackend {
    client: Client,
    api_key: String,
    base_url: String,
}

#[derive(Serialize)]
struct GeminiRequest {
    contents: Vec<Content>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content {
    role: &'static str,
    parts: Vec<Part>,
}

#[derive(Serialize)]
struct Part {
    text: String,
}

#[derive(Serialize)]
struct GenerationConfig {
    temperature: f32,
    #[serde(rename = "maxOutputTokens")]
    max_output_tokens: u32,
}

#[derive(Deserialize)]
struct GeminiResponse {
    candidates: Option<Vec<Candidate>>,
    #[serde(rename = "promptFeedback")]
    prompt_feedback: Option<PromptFeedback>,
    error: Option<GeminiError>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
    #[serde(rename = "finishReason")]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Deserialize)]
struct PromptFeedback {
    #[serde(rename = "blockReason")]
    block_reason: Option<String>,
}

#[derive(Deserialize)]
struct GeminiError {
    message: String,
}

impl GeminiBackend {
    pub fn new(client: Client, config: &ProviderConfig) -> Result<Self> {
        Ok(Self {
            client,
            api_key: config.api_key()?.to_string(),
            base_url: config.base_url.clone(),
        })
    }

    fn extract(&self, response: GeminiResponse) -> Result<BackendReply> {
        if let Some(error) = response.error {
            return Err(Error::provider_call(self.name(), error.message));
        }

        if let Some(reason) = response.prompt_feedback.and_then(|f| f.block_reason) {
            return Err(Error::provider_call(
                self.name(),
                format!("blocked by safety filter ({})", reason),
            ));
        }

        let candidate = response
            .candidates
            .and_then(|c| c.into_iter().next())
            .ok_or_else(|| Error::provider_call(self.name(), "no candidates in response"))?;

        if candidate.finish_reason.as_deref() == Some("SAFETY") {
            return Err(Error::provider_call(self.name(), "blocked by safety filter"));
        }

        let text = candidate
            .content
            .map(|c| {
                c.parts
                    .into_iter()
                    .filter_map(|p| p.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        Ok(BackendReply {
            text: text.trim().to_string(),
            finish_reason: candidate.finish_reason,
        })
    }
}

#[async_trait]
impl CompletionBackend for GeminiBackend {
    async fn complete(&self, prompt: &str, params: &GenerationParams) -> Result<BackendReply> {
        let url = format!("{}/models/{}:generateContent", self.base_url, params.model);

        let request = GeminiRequest {
            contents: vec![Content {
                role: "user",
                parts: vec![Part {
                    text: prompt.to_string(),
                }],
            }],
            generation_config: GenerationConfig {
                temperature: params.temperature,
                max_output_tokens: params.max_tokens,
            },
        };

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::provider_call(self.name(), format!("Request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(http_error(self.name(), Some("GEMINI_API_KEY"), status, &body));
        }

        let parsed: GeminiResponse = response.json().await.map_err(|e| {
            Error::provider_call(self.name(), format!("Failed to parse Gemini response: {}", e))
        })?;

        self.extract(parsed)
    }

    fn name(&self) -> &str {
        "gemini"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Environment;
    use crate::llm::registry::ProviderRegistry;

    fn backend() -> GeminiBackend {
        let env = Environment::from_pairs([("GEMINI_API_KEY", "k")]);
        let registry = ProviderRegistry::new(&env);
        GeminiBackend::new(Client::new(), registry.get_config("gemini").unwrap()).unwrap()
    }

    #[test]
    fn test_joins_candidate_parts() {
        let response: GeminiResponse = serde_json::from_str(
            r#"{"candidates":[{"content":{"parts":[{"text":"{\"is_valid\":"},{"text":" true}"}]},"finishReason":"STOP"}]}"#,
        )
        .unwrap();
        let reply = backend().extract(response).unwrap();
        assert_eq!(reply.text, r#"{"is_valid": true}"#);
        assert_eq!(reply.finish_reason.as_deref(), Some("STOP"));
    }

    #[test]
    fn test_safety_block_is_provider_error() {
        let response: GeminiResponse = serde_json::from_str(
            r#"{"candidates":[{"finishReason":"SAFETY"}]}"#,
        )
        .unwrap();
        let err = backend().extract(response).unwrap_err();
        assert!(matches!(err, Error::ProviderCall { ref message, .. } if message.contains("safety")));
    }

    #[test]
    fn test_prompt_block() {
        let response: GeminiResponse = serde_json::from_str(
            r#"{"promptFeedback":{"blockReason":"OTHER"}}"#,
        )
        .unwrap();
        assert!(backend().extract(response).is_err());
    }
}
