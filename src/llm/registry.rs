use std::collections::HashMap;

use crate::config::Environment;
use crate::error::{Error, Result};
use crate::llm::provider::GenerationParams;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    Gemini,
    OpenAi,
    Claude,
    Ollama,
    Tongyi,
    DeepSeek,
    Hunyuan,
    Zhipu,
}

struct ProviderSpec {
    kind: ProviderKind,
    name: &'static str,
    display_name: &'static str,
    credentials: &'static [&'static str],
    models: &'static [&'static str],
    temperature: f32,
    max_tokens: u32,
    base_url: &'static str,
}

// Iteration order is the fallback order.
const PROVIDERS: &[ProviderSpec] = &[
    ProviderSpec {
        kind: ProviderKind::Gemini,
        name: "gemini",
        display_name: "Google Gemini",
        credentials: &["GEMINI_API_KEY"],
        models: &["gemini-3-flash-preview", "gemini-1.5-pro"],
        temperature: 0.7,
        max_tokens: 8192,
        base_url: "https://generativelanguage.googleapis.com/v1beta",
    },
    ProviderSpec {
        kind: ProviderKind::OpenAi,
        name: "openai",
        display_name: "OpenAI GPT",
        credentials: &["OPENAI_API_KEY"],
        models: &["gpt-4-turbo-preview", "gpt-4", "gpt-3.5-turbo"],
        temperature: 0.7,
        max_tokens: 4096,
        base_url: "https://api.openai.com/v1",
    },
    ProviderSpec {
        kind: ProviderKind::Claude,
        name: "claude",
        display_name: "Anthropic Claude",
        credentials: &["ANTHROPIC_API_KEY"],
        models: &[
            "claude-3-sonnet-20240229",
            "claude-3-opus-20240229",
            "claude-3-haiku-20240307",
        ],
        temperature: 0.7,
        max_tokens: 4096,
        base_url: "https://api.anthropic.com/v1",
    },
    ProviderSpec {
        kind: ProviderKind::Ollama,
        name: "ollama",
        display_name: "Ollama (local)",
        credentials: &["OLLAMA_BASE_URL"],
        models: &["llama2", "mistral", "codellama", "llama2:13b"],
        temperature: 0.7,
        max_tokens: 4096,
        base_url: "http://localhost:11434",
    },
    ProviderSpec {
        kind: ProviderKind::Tongyi,
        name: "tongyi",
        display_name: "Alibaba Tongyi Qianwen",
        credentials: &["DASHSCOPE_API_KEY"],
        models: &["qwen-max", "qwen-plus", "qwen-turbo", "qwen-plus-longcontext"],
        temperature: 0.7,
        max_tokens: 2000,
        base_url: "https://dashscope.aliyuncs.com/compatible-mode/v1",
    },
    ProviderSpec {
        kind: ProviderKind::DeepSeek,
        name: "deepseek",
        display_name: "DeepSeek",
        credentials: &["DEEPSEEK_API_KEY"],
        models: &["deepseek-chat", "deepseek-reasoner"],
        temperature: 0.7,
        max_tokens: 4096,
        base_url: "https://api.deepseek.com",
    },
    ProviderSpec {
        kind: ProviderKind::Hunyuan,
        name: "hunyuan",
        display_name: "Tencent Hunyuan",
        credentials: &["TENCENT_SECRET_ID", "TENCENT_SECRET_KEY"],
        models: &["hunyuan-lite", "hunyuan-standard", "hunyuan-pro"],
        temperature: 0.7,
        max_tokens: 4096,
        base_url: "https://hunyuan.tencentcloudapi.com",
    },
    ProviderSpec {
        kind: ProviderKind::Zhipu,
        name: "zhipu",
        display_name: "Zhipu AI (GLM)",
        credentials: &["ZHIPU_API_KEY"],
        models: &["glm-4.7", "glm-4", "glm-4-flash", "glm-3-turbo"],
        temperature: 1.0,
        max_tokens: 65536,
        base_url: "https://open.bigmodel.cn/api/paas/v4",
    },
];

/// One backend as resolved from the environment at startup.
#[derive(Clone)]
pub struct ProviderConfig {
    pub kind: ProviderKind,
    pub name: &'static str,
    pub display_name: &'static str,
    pub required_credentials: &'static [&'static str],
    pub models: &'static [&'static str],
    pub defaults: GenerationParams,
    pub base_url: String,
    pub region: Option<String>,
    credentials: HashMap<&'static str, String>,
}

impl ProviderConfig {
    fn resolve(spec: &ProviderSpec, env: &Environment) -> Self {
        let credentials = spec
            .credentials
            .iter()
            .filter_map(|var| env.get(var).map(|v| (*var, v.to_string())))
            .collect::<HashMap<_, _>>();

        let model_var = format!("{}_MODEL", spec.name.to_uppercase());
        let model = env
            .get(&model_var)
            .unwrap_or(spec.models[0])
            .to_string();

        let base_url = match spec.kind {
            ProviderKind::Ollama => env.get("OLLAMA_BASE_URL").unwrap_or(spec.base_url),
            _ => spec.base_url,
        }
        .trim_end_matches('/')
        .to_string();

        let region = match spec.kind {
            ProviderKind::Hunyuan => {
                Some(env.get("TENCENT_REGION").unwrap_or("ap-beijing").to_string())
            }
            _ => None,
        };

        let thinking = spec.kind == ProviderKind::Zhipu
            && env
                .get("ZHIPU_THINKING")
                .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes" | "on"))
                .unwrap_or(false);

        Self {
            kind: spec.kind,
            name: spec.name,
            display_name: spec.display_name,
            required_credentials: spec.credentials,
            models: spec.models,
            defaults: GenerationParams {
                model,
                temperature: spec.temperature,
                max_tokens: spec.max_tokens,
                thinking,
            },
            base_url,
            region,
            credentials,
        }
    }

    pub fn is_available(&self) -> bool {
        self.required_credentials
            .iter()
            .all(|var| self.credentials.contains_key(var))
    }

    pub fn credential(&self, var: &str) -> Option<&str> {
        self.credentials.get(var).map(String::as_str)
    }

    /// First required credential; the API key for single-key providers.
    pub fn api_key(&self) -> Result<&str> {
        let var = self.required_credentials[0];
        self.credential(var).ok_or_else(|| {
            Error::provider_call(self.name, format!("{} is not set", var))
        })
    }

    pub fn missing_credentials(&self) -> Vec<&'static str> {
        self.required_credentials
            .iter()
            .copied()
            .filter(|var| !self.credentials.contains_key(var))
            .collect()
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("name", &self.name)
            .field("defaults", &self.defaults)
            .field("base_url", &self.base_url)
            .field("region", &self.region)
            .field("credentials", &self.credentials.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct ProviderRegistry {
    providers: Vec<ProviderConfig>,
}

impl ProviderRegistry {
    pub fn new(env: &Environment) -> Self {
        Self {
            providers: PROVIDERS
                .iter()
                .map(|spec| ProviderConfig::resolve(spec, env))
                .collect(),
        }
    }

    pub fn get_config(&self, name: &str) -> Result<&ProviderConfig> {
        let wanted = name.trim().to_lowercase();
        self.providers
            .iter()
            .find(|p| p.name == wanted)
            .ok_or_else(|| Error::UnknownProvider(name.to_string()))
    }

    pub fn is_available(&self, name: &str) -> Result<bool> {
        Ok(self.get_config(name)?.is_available())
    }

    pub fn list_available(&self) -> Vec<&'static str> {
        self.providers
            .iter()
            .filter(|p| p.is_available())
            .map(|p| p.name)
            .collect()
    }

    pub fn first_available(&self) -> Option<&ProviderConfig> {
        self.providers.iter().find(|p| p.is_available())
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.providers.iter().map(|p| p.name).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ProviderConfig> {
        self.providers.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_credentials_no_providers() {
        let registry = ProviderRegistry::new(&Environment::default());
        assert!(registry.list_available().is_empty());
        assert_eq!(registry.names().len(), 8);
    }

    #[test]
    fn test_credential_makes_provider_available() {
        let before = ProviderRegistry::new(&Environment::default());
        assert!(!before.list_available().contains(&"deepseek"));

        let env = Environment::from_pairs([("DEEPSEEK_API_KEY", "sk-test")]);
        let after = ProviderRegistry::new(&env);
        assert_eq!(after.list_available(), vec!["deepseek"]);
    }

    #[test]
    fn test_hunyuan_needs_both_secrets() {
        let env = Environment::from_pairs([("TENCENT_SECRET_ID", "id")]);
        let registry = ProviderRegistry::new(&env);
        assert!(!registry.is_available("hunyuan").unwrap());
        assert_eq!(
            registry.get_config("hunyuan").unwrap().missing_credentials(),
            vec!["TENCENT_SECRET_KEY"]
        );

        let env = Environment::from_pairs([
            ("TENCENT_SECRET_ID", "id"),
            ("TENCENT_SECRET_KEY", "key"),
        ]);
        let registry = ProviderRegistry::new(&env);
        assert!(registry.is_available("hunyuan").unwrap());
        let config = registry.get_config("hunyuan").unwrap();
        assert_eq!(config.region.as_deref(), Some("ap-beijing"));
    }

    #[test]
    fn test_available_in_registry_order() {
        let env = Environment::from_pairs([
            ("ZHIPU_API_KEY", "z"),
            ("OPENAI_API_KEY", "o"),
            ("OLLAMA_BASE_URL", "http://127.0.0.1:11434/"),
        ]);
        let registry = ProviderRegistry::new(&env);
        assert_eq!(registry.list_available(), vec!["openai", "ollama", "zhipu"]);
        assert_eq!(registry.first_available().unwrap().name, "openai");
        assert_eq!(
            registry.get_config("ollama").unwrap().base_url,
            "http://127.0.0.1:11434"
        );
    }

    #[test]
    fn test_unknown_provider() {
        let registry = ProviderRegistry::new(&Environment::default());
        assert!(matches!(
            registry.get_config("mistral"),
            Err(Error::UnknownProvider(name)) if name == "mistral"
        ));
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        let registry = ProviderRegistry::new(&Environment::default());
        assert_eq!(registry.get_config("Gemini").unwrap().name, "gemini");
    }

    #[test]
    fn test_defaults_and_model_override() {
        let env = Environment::from_pairs([("CLAUDE_MODEL", "claude-3-haiku-20240307")]);
        let registry = ProviderRegistry::new(&env);

        let zhipu = registry.get_config("zhipu").unwrap();
        assert_eq!(zhipu.defaults.max_tokens, 65536);
        assert_eq!(zhipu.defaults.temperature, 1.0);
        assert!(!zhipu.defaults.thinking);

        let claude = registry.get_config("claude").unwrap();
        assert_eq!(claude.defaults.model, "claude-3-haiku-20240307");
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let env = Environment::from_pairs([("GEMINI_API_KEY", "very-secret")]);
        let registry = ProviderRegistry::new(&env);
        let printed = format!("{:?}", registry.get_config("gemini").unwrap());
        assert!(!printed.contains("very-secret"));
    }
}
