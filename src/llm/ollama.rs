use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::llm::provider::{http_error, BackendReply, CompletionBackend, GenerationParams, SYSTEM_PROMPT};
use crate::llm::registry::ProviderConfig;

pub struct OllamaBackend {
    client: Client,
    base_url: String,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    system: &'a str,
    stream: bool,
    options: Options,
}

#[derive(Serialize)]
struct Options {
    temperature: f32,
    num_predict: u32,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
    done_reason: Option<String>,
    error: Option<String>,
}

impl OllamaBackend {
    pub fn new(client: Client, config: &ProviderConfig) -> Result<Self> {
        if !config.is_available() {
            return Err(Error::provider_call(config.name, "OLLAMA_BASE_URL is not set"));
        }

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
        })
    }

    fn extract(&self, response: GenerateResponse) -> Result<BackendReply> {
        if let Some(error) = response.error {
            return Err(Error::provider_call(self.name(), error));
        }

        Ok(BackendReply {
            text: response.response.trim().to_string(),
            finish_reason: response.done_reason.or_else(|| Some("stop".to_string())),
        })
    }
}

#[async_trait]
impl CompletionBackend for OllamaBackend {
    async fn complete(&self, prompt: &str, params: &GenerationParams) -> Result<BackendReply> {
        let request = GenerateRequest {
            model: &params.model,
            prompt,
            system: SYSTEM_PROMPT,
            stream: false,
            options: Options {
                temperature: params.temperature,
                num_predict: params.max_tokens,
            },
        };

        let response = self
            .client
            .post(format!("{}/api/generate", self.base_url))
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::provider_call(self.name(), format!("Request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(http_error(self.name(), None, status, &body));
        }

        let parsed: GenerateResponse = response.json().await.map_err(|e| {
            Error::provider_call(self.name(), format!("Failed to parse response: {}", e))
        })?;

        self.extract(parsed)
    }

    fn name(&self) -> &str {
        "ollama"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Environment;
    use crate::llm::registry::ProviderRegistry;

    fn backend() -> OllamaBackend {
        let env = Environment::from_pairs([("OLLAMA_BASE_URL", "http://gpu-box:11434/")]);
        let registry = ProviderRegistry::new(&env);
        OllamaBackend::new(Client::new(), registry.get_config("ollama").unwrap()).unwrap()
    }

    fn response(json: &str) -> GenerateResponse {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_base_url_from_environment() {
        assert_eq!(backend().base_url, "http://gpu-box:11434");
    }

    #[test]
    fn test_unset_base_url_rejected() {
        let registry = ProviderRegistry::new(&Environment::default());
        let err = OllamaBackend::new(Client::new(), registry.get_config("ollama").unwrap()).err();
        assert!(matches!(
            err,
            Some(Error::ProviderCall { ref provider, ref message }) if provider == "ollama" && message.contains("OLLAMA_BASE_URL")
        ));
    }

    #[test]
    fn test_reply_defaults_finish_reason() {
        let reply = backend()
            .extract(response(r#"{"model":"llama2","response":" VALID: no \n","done":true}"#))
            .unwrap();
        assert_eq!(reply.text, "VALID: no");
        assert_eq!(reply.finish_reason.as_deref(), Some("stop"));
    }

    #[test]
    fn test_error_field_is_provider_error() {
        let err = backend()
            .extract(response(r#"{"error":"model 'mistral' not found, try pulling it first"}"#))
            .unwrap_err();
        assert!(matches!(err, Error::ProviderCall { ref message, .. } if message.contains("not found")));
    }

    #[test]
    fn test_blank_response_extracts_empty() {
        let reply = backend().extract(response(r#"{"done":true,"done_reason":"length"}"#)).unwrap();
        assert!(reply.text.is_empty());
        assert_eq!(reply.finish_reason.as_deref(), Some("length"));
    }
}
