use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::llm::parser::ResponseFormat;

pub const DEFAULT_HOMEPAGES: &[&str] = &[
    "https://punchng.com/",
    "https://dailypost.ng/",
    "https://dailytrust.com/",
    "https://thesun.ng/",
];

/// Snapshot of the process environment taken once at startup.
///
/// Everything downstream reads configuration from this value instead of
/// calling `std::env::var`, so tests can inject variables by building one
/// from pairs.
#[derive(Clone, Default)]
pub struct Environment {
    vars: HashMap<String, String>,
}

impl Environment {
    pub fn capture() -> Self {
        Self {
            vars: std::env::vars().collect(),
        }
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Returns the value if set and not blank.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars
            .get(key)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    fn parse_or<T: std::str::FromStr>(&self, key: &str, default: T) -> T {
        self.get(key).and_then(|v| v.parse().ok()).unwrap_or(default)
    }

    fn flag_or(&self, key: &str, default: bool) -> bool {
        self.get(key)
            .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes" | "on"))
            .unwrap_or(default)
    }
}

// Keys only; values may be secrets.
impl std::fmt::Debug for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut keys: Vec<_> = self.vars.keys().collect();
        keys.sort();
        f.debug_struct("Environment").field("keys", &keys).finish()
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub env: Environment,
    pub default_provider: String,
    pub data_dir: PathBuf,
    pub report_dir: PathBuf,
    pub articles_file: Option<PathBuf>,
    pub prompt_template: Option<String>,
    pub prompt_template_file: PathBuf,
    pub response_format: ResponseFormat,
    pub response_fields: Option<String>,
    pub target_language: String,
    pub request_interval_ms: u64,
    pub request_timeout_secs: u64,
    pub min_body_chars: usize,
    pub max_body_chars: usize,
    pub retry_failed: bool,
    pub homepages: Vec<String>,
    pub crawl_limit: usize,
    pub crawl_delay_ms: u64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_environment(Environment::capture())
    }

    pub fn from_environment(env: Environment) -> Result<Self> {
        let default_provider = env.get("AI_PROVIDER").unwrap_or("gemini").to_lowercase();

        let response_format = match env.get("RESPONSE_FORMAT") {
            Some(v) => v.parse()?,
            None => ResponseFormat::Json,
        };

        let homepages = env
            .get("CRAWL_HOMEPAGES")
            .map(|v| {
                v.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect::<Vec<_>>()
            })
            .unwrap_or_else(|| DEFAULT_HOMEPAGES.iter().map(|s| s.to_string()).collect());

        let min_body_chars = env.parse_or("MIN_BODY_CHARS", 100);
        let max_body_chars = env.parse_or("MAX_BODY_CHARS", 3000);
        if max_body_chars == 0 {
            return Err(Error::Config("MAX_BODY_CHARS must be greater than zero".to_string()));
        }

        Ok(Self {
            default_provider,
            data_dir: PathBuf::from(env.get("DATA_DIR").unwrap_or("data")),
            report_dir: PathBuf::from(env.get("REPORT_DIR").unwrap_or("report")),
            articles_file: env.get("ARTICLES_FILE").map(PathBuf::from),
            prompt_template: env.get("PROMPT_TEMPLATE").map(str::to_string),
            prompt_template_file: PathBuf::from(
                env.get("PROMPT_TEMPLATE_FILE").unwrap_or("prompt_template.txt"),
            ),
            response_format,
            response_fields: env.get("RESPONSE_FIELDS").map(str::to_string),
            target_language: env.get("TARGET_LANGUAGE").unwrap_or("Chinese").to_string(),
            request_interval_ms: env.parse_or("REQUEST_INTERVAL_MS", 1000),
            request_timeout_secs: env.parse_or("REQUEST_TIMEOUT_SECS", 120),
            min_body_chars,
            max_body_chars,
            retry_failed: env.flag_or("RETRY_FAILED", true),
            homepages,
            crawl_limit: env.parse_or("CRAWL_LIMIT", 25),
            crawl_delay_ms: env.parse_or("CRAWL_DELAY_MS", 1000),
            env,
        })
    }

    /// Checkpoint for today's run, next to the report it feeds.
    pub fn checkpoint_path(&self, date: &str) -> PathBuf {
        self.report_dir.join(date).join("processed_cache.json")
    }
}

#[derive(Debug, Clone)]
pub struct BatchConfig {
    pub provider: Option<String>,
    pub request_interval: Duration,
    pub min_body_chars: usize,
    pub max_body_chars: usize,
    pub retry_failed: bool,
}

impl From<&Config> for BatchConfig {
    fn from(config: &Config) -> Self {
        Self {
            provider: None,
            request_interval: Duration::from_millis(config.request_interval_ms),
            min_body_chars: config.min_body_chars,
            max_body_chars: config.max_body_chars,
            retry_failed: config.retry_failed,
        }
    }
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            provider: None,
            request_interval: Duration::from_secs(1),
            min_body_chars: 100,
            max_body_chars: 3000,
            retry_failed: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CrawlerConfig {
    pub homepages: Vec<String>,
    pub limit_per_homepage: usize,
    pub delay: Duration,
    pub timeout: Duration,
}

impl From<&Config> for CrawlerConfig {
    fn from(config: &Config) -> Self {
        Self {
            homepages: config.homepages.clone(),
            limit_per_homepage: config.crawl_limit,
            delay: Duration::from_millis(config.crawl_delay_ms),
            timeout: Duration::from_secs(10),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::from_environment(Environment::default()).unwrap();
        assert_eq!(config.default_provider, "gemini");
        assert_eq!(config.data_dir, PathBuf::from("data"));
        assert_eq!(config.response_format, ResponseFormat::Json);
        assert_eq!(config.request_interval_ms, 1000);
        assert_eq!(config.homepages.len(), DEFAULT_HOMEPAGES.len());
        assert!(config.retry_failed);
    }

    #[test]
    fn test_overrides_from_environment() {
        let env = Environment::from_pairs([
            ("AI_PROVIDER", "DeepSeek"),
            ("CRAWL_HOMEPAGES", "https://a.example/, https://b.example/"),
            ("REQUEST_INTERVAL_MS", "0"),
            ("RETRY_FAILED", "false"),
            ("RESPONSE_FORMAT", "labeled"),
        ]);
        let config = Config::from_environment(env).unwrap();
        assert_eq!(config.default_provider, "deepseek");
        assert_eq!(config.homepages, vec!["https://a.example/", "https://b.example/"]);
        assert_eq!(config.request_interval_ms, 0);
        assert!(!config.retry_failed);
        assert_eq!(config.response_format, ResponseFormat::Labeled);
    }

    #[test]
    fn test_blank_values_are_unset() {
        let env = Environment::from_pairs([("GEMINI_API_KEY", "   ")]);
        assert_eq!(env.get("GEMINI_API_KEY"), None);
    }

    #[test]
    fn test_invalid_response_format() {
        let env = Environment::from_pairs([("RESPONSE_FORMAT", "yaml")]);
        assert!(matches!(Config::from_environment(env), Err(Error::Config(_))));
    }

    #[test]
    fn test_debug_hides_values() {
        let env = Environment::from_pairs([("OPENAI_API_KEY", "sk-secret")]);
        let printed = format!("{:?}", env);
        assert!(printed.contains("OPENAI_API_KEY"));
        assert!(!printed.contains("sk-secret"));
    }
}
