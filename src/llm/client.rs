use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;

use crate::error::{Error, Result};
use crate::llm::claude::ClaudeBackend;
use crate::llm::gemini::GeminiBackend;
use crate::llm::hunyuan::HunyuanBackend;
use crate::llm::ollama::OllamaBackend;
use crate::llm::openai::OpenAiCompatBackend;
use crate::llm::provider::{BackendReply, CompletionBackend, ParamOverrides};
use crate::llm::registry::{ProviderConfig, ProviderKind, ProviderRegistry};

#[derive(Debug, Clone, Default)]
pub struct CompletionRequest {
    pub prompt: String,
    pub provider: Option<String>,
    pub overrides: ParamOverrides,
}

impl CompletionRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Default::default()
        }
    }

    pub fn with_provider(mut self, provider: Option<String>) -> Self {
        self.provider = provider;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompletionResult {
    pub provider: String,
    pub model: String,
    pub text: String,
    pub finish_reason: Option<String>,
}

impl CompletionResult {
    /// `provider-model`, as recorded on processed articles.
    pub fn source_label(&self) -> String {
        format!("{}-{}", self.provider, self.model)
    }
}

/// The one capability the batch processor needs.
#[async_trait]
pub trait Completer: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResult>;
}

#[derive(Debug, Clone)]
pub struct ProviderStatus {
    pub name: &'static str,
    pub display_name: &'static str,
    pub available: bool,
    pub missing: Vec<&'static str>,
    pub model: String,
    pub models: &'static [&'static str],
}

pub struct CompletionClient {
    registry: ProviderRegistry,
    default_provider: String,
    http: Client,
    local_http: Client,
}

impl CompletionClient {
    pub fn new(
        registry: ProviderRegistry,
        default_provider: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let http = Client::builder().timeout(timeout).build()?;
        // Local models are slow; give them longer.
        let local_http = Client::builder()
            .timeout(timeout.max(Duration::from_secs(300)))
            .build()?;

        Ok(Self {
            registry,
            default_provider: default_provider.into().to_lowercase(),
            http,
            local_http,
        })
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    /// Named provider, or the configured default with fallback to the
    /// first available provider in registry order.
    pub fn resolve(&self, name: Option<&str>) -> Result<&ProviderConfig> {
        if let Some(name) = name {
            return self.registry.get_config(name);
        }

        let default = self.registry.get_config(&self.default_provider)?;
        if default.is_available() {
            return Ok(default);
        }

        let fallback = self
            .registry
            .first_available()
            .ok_or(Error::NoProviderAvailable)?;
        tracing::warn!(
            default = default.name,
            fallback = fallback.name,
            "Default provider unavailable, falling back"
        );
        Ok(fallback)
    }

    /// Startup check; configuration problems surface before any work.
    pub fn validate(&self) -> Result<&ProviderConfig> {
        self.resolve(None)
    }

    pub fn status(&self) -> Vec<ProviderStatus> {
        self.registry
            .iter()
            .map(|p| ProviderStatus {
                name: p.name,
                display_name: p.display_name,
                available: p.is_available(),
                missing: p.missing_credentials(),
                model: p.defaults.model.clone(),
                models: p.models,
            })
            .collect()
    }

    fn backend(&self, config: &ProviderConfig) -> Result<Box<dyn CompletionBackend>> {
        let http = self.http.clone();
        let backend: Box<dyn CompletionBackend> = match config.kind {
            ProviderKind::Gemini => Box::new(GeminiBackend::new(http, config)?),
            ProviderKind::Claude => Box::new(ClaudeBackend::new(http, config)?),
            ProviderKind::OpenAi
            | ProviderKind::DeepSeek
            | ProviderKind::Tongyi
            | ProviderKind::Zhipu => Box::new(OpenAiCompatBackend::new(http, config)?),
            ProviderKind::Ollama => Box::new(OllamaBackend::new(self.local_http.clone(), config)?),
            ProviderKind::Hunyuan => Box::new(HunyuanBackend::new(http, config)?),
        };
        Ok(backend)
    }
}

#[async_trait]
impl Completer for CompletionClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResult> {
        let config = self.resolve(request.provider.as_deref())?;
        let params = config.defaults.merged(&request.overrides);
        let backend = self.backend(config)?;

        tracing::debug!(
            provider = config.name,
            model = %params.model,
            prompt_chars = request.prompt.chars().count(),
            "Sending completion request"
        );

        let started = Instant::now();
        let reply = backend
            .complete(&request.prompt, &params)
            .await
            .map_err(|e| match e {
                Error::ProviderCall { .. } => e,
                other => Error::provider_call(config.name, other.to_string()),
            })?;

        tracing::debug!(
            provider = config.name,
            elapsed_ms = started.elapsed().as_millis() as u64,
            finish_reason = ?reply.finish_reason,
            "Completion received"
        );

        into_result(config, params.model, reply)
    }
}

fn into_result(config: &ProviderConfig, model: String, reply: BackendReply) -> Result<CompletionResult> {
    if reply.text.is_empty() {
        return Err(Error::provider_call(config.name, "empty response"));
    }

    Ok(CompletionResult {
        provider: config.name.to_string(),
        model,
        text: reply.text,
        finish_reason: reply.finish_reason,
    })
}
