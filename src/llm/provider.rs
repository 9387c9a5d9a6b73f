use async_trait::async_trait;
use reqwest::StatusCode;

use crate::error::{Error, Result};

pub const SYSTEM_PROMPT: &str = "You are a professional news analysis assistant, skilled at analyzing, translating and summarizing news articles.";

#[derive(Debug, Clone, PartialEq)]
pub struct GenerationParams {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub thinking: bool,
}

/// Per-call overrides; any field set here wins over the provider defaults.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParamOverrides {
    pub model: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub thinking: Option<bool>,
}

impl GenerationParams {
    pub fn merged(&self, overrides: &ParamOverrides) -> Self {
        Self {
            model: overrides.model.clone().unwrap_or_else(|| self.model.clone()),
            temperature: overrides.temperature.unwrap_or(self.temperature),
            max_tokens: overrides.max_tokens.unwrap_or(self.max_tokens),
            thinking: overrides.thinking.unwrap_or(self.thinking),
        }
    }
}

#[derive(Debug, Clone)]
pub struct BackendReply {
    pub text: String,
    pub finish_reason: Option<String>,
}

/// One wire protocol. Errors are reported as `Error::ProviderCall`.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    async fn complete(&self, prompt: &str, params: &GenerationParams) -> Result<BackendReply>;
    fn name(&self) -> &str;
}

/// Maps a non-success HTTP reply to a provider error, with a hint for
/// credential and balance problems.
pub(crate) fn http_error(
    provider: &str,
    credential: Option<&str>,
    status: StatusCode,
    body: &str,
) -> Error {
    let body: String = body.chars().take(500).collect();
    let mut message = format!("HTTP {}: {}", status, body.trim());
    match status.as_u16() {
        401 | 403 => {
            if let Some(var) = credential {
                message.push_str(&format!(" (check {})", var));
            }
        }
        402 => message.push_str(" (insufficient balance; top up or switch provider with AI_PROVIDER)"),
        _ => {}
    }
    Error::provider_call(provider, message)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overrides_win() {
        let defaults = GenerationParams {
            model: "deepseek-chat".to_string(),
            temperature: 0.7,
            max_tokens: 4096,
            thinking: false,
        };
        let overrides = ParamOverrides {
            temperature: Some(0.2),
            max_tokens: Some(512),
            ..Default::default()
        };

        let merged = defaults.merged(&overrides);
        assert_eq!(merged.model, "deepseek-chat");
        assert_eq!(merged.temperature, 0.2);
        assert_eq!(merged.max_tokens, 512);
        assert!(!merged.thinking);
    }

    #[test]
    fn test_http_error_hints() {
        let err = http_error("deepseek", Some("DEEPSEEK_API_KEY"), StatusCode::UNAUTHORIZED, "bad key");
        assert!(err.to_string().contains("check DEEPSEEK_API_KEY"));

        let err = http_error("zhipu", Some("ZHIPU_API_KEY"), StatusCode::PAYMENT_REQUIRED, "");
        assert!(err.to_string().contains("AI_PROVIDER"));
    }
}
