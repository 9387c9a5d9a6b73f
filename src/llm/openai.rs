use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::llm::provider::{http_error, BackendReply, CompletionBackend, GenerationParams, SYSTEM_PROMPT};
use crate::llm::registry::ProviderConfig;

/// Chat-completions protocol shared by OpenAI, DeepSeek, Tongyi
/// (DashScope compatible mode) and Zhipu.
pub struct OpenAiCompatBackend {
    client: Client,
    name: &'static str,
    credential_var: &'static str,
    api_key: String,
    base_url: String,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    thinking: Option<Thinking>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct Thinking {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    error: Option<ApiError>,
}

#[derive(Deserialize)]
struct Choice {
    message: Option<ResponseMessage>,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ApiError {
    message: String,
}

impl OpenAiCompatBackend {
    pub fn new(client: Client, config: &ProviderConfig) -> Result<Self> {
        Ok(Self {
            client,
            name: config.name,
            credential_var: config.required_credentials[0],
            api_key: config.api_key()?.to_string(),
            base_url: config.base_url.clone(),
        })
    }

    fn extract(&self, response: ChatResponse) -> Result<BackendReply> {
        if let Some(error) = response.error {
            return Err(Error::provider_call(self.name, error.message));
        }

        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| Error::provider_call(self.name, "no choices in response"))?;

        Ok(BackendReply {
            text: choice
                .message
                .and_then(|m| m.content)
                .unwrap_or_default()
                .trim()
                .to_string(),
            finish_reason: choice.finish_reason,
        })
    }
}

#[async_trait]
impl CompletionBackend for OpenAiCompatBackend {
    async fn complete(&self, prompt: &str, params: &GenerationParams) -> Result<BackendReply> {
        let request = ChatRequest {
            model: &params.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            temperature: params.temperature,
            max_tokens: params.max_tokens,
            thinking: params.thinking.then_some(Thinking { kind: "enabled" }),
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::provider_call(self.name, format!("Request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(http_error(self.name, Some(self.credential_var), status, &body));
        }

        let parsed: ChatResponse = response.json().await.map_err(|e| {
            Error::provider_call(self.name, format!("Failed to parse response: {}", e))
        })?;

        self.extract(parsed)
    }

    fn name(&self) -> &str {
        self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Environment;
    use crate::llm::registry::ProviderRegistry;

    fn backend(name: &str) -> OpenAiCompatBackend {
        let env = Environment::from_pairs([("DEEPSEEK_API_KEY", "k"), ("ZHIPU_API_KEY", "z")]);
        let registry = ProviderRegistry::new(&env);
        OpenAiCompatBackend::new(Client::new(), registry.get_config(name).unwrap()).unwrap()
    }

    fn response(json: &str) -> ChatResponse {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_first_choice_trimmed() {
        let reply = backend("deepseek")
            .extract(response(
                r#"{"choices":[{"message":{"content":"  {\"is_valid\": false}\n"},"finish_reason":"stop"}]}"#,
            ))
            .unwrap();
        assert_eq!(reply.text, r#"{"is_valid": false}"#);
        assert_eq!(reply.finish_reason.as_deref(), Some("stop"));
    }

    #[test]
    fn test_error_envelope_names_provider() {
        let err = backend("zhipu")
            .extract(response(r#"{"error":{"message":"model not found","code":"1211"}}"#))
            .unwrap_err();
        assert!(matches!(
            err,
            Error::ProviderCall { ref provider, ref message } if provider == "zhipu" && message == "model not found"
        ));
    }

    #[test]
    fn test_no_choices_is_provider_error() {
        let err = backend("deepseek").extract(response(r#"{"choices":[]}"#)).unwrap_err();
        assert!(matches!(err, Error::ProviderCall { ref message, .. } if message.contains("no choices")));
        assert!(backend("deepseek").extract(response("{}")).is_err());
    }

    #[test]
    fn test_blank_content_extracts_empty() {
        let reply = backend("deepseek")
            .extract(response(r#"{"choices":[{"message":{"content":"  \n "}},{"message":{"content":"second"}}]}"#))
            .unwrap();
        assert!(reply.text.is_empty());

        let reply = backend("deepseek")
            .extract(response(r#"{"choices":[{"message":{"content":null},"finish_reason":"length"}]}"#))
            .unwrap();
        assert!(reply.text.is_empty());
        assert_eq!(reply.finish_reason.as_deref(), Some("length"));
    }

    #[test]
    fn test_thinking_only_when_enabled() {
        let request = ChatRequest {
            model: "glm-4.7",
            messages: vec![],
            temperature: 1.0,
            max_tokens: 10,
            thinking: None,
        };
        let value = serde_json::to_value(&request).unwrap();
        assert!(value.get("thinking").is_none());

        let request = ChatRequest {
            thinking: Some(Thinking { kind: "enabled" }),
            ..request
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["thinking"]["type"], "enabled");
    }
}
