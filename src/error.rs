use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Unknown AI provider '{0}'")]
    UnknownProvider(String),

    #[error("No AI provider available: set credentials for at least one provider")]
    NoProviderAvailable,

    #[error("{provider} call failed: {message}")]
    ProviderCall { provider: String, message: String },

    #[error("Failed to parse model output: {0}")]
    OutputParse(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Checkpoint error: {0}")]
    Checkpoint(String),

    #[error("Crawl error: {0}")]
    Crawl(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn provider_call(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Error::ProviderCall {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Per-article failures: recorded on the article, never abort a batch.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::ProviderCall { .. } | Error::OutputParse(_) | Error::Network(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recoverable_errors() {
        assert!(Error::provider_call("gemini", "timeout").is_recoverable());
        assert!(Error::OutputParse("no json".to_string()).is_recoverable());
        assert!(!Error::NoProviderAvailable.is_recoverable());
        assert!(!Error::UnknownProvider("foo".to_string()).is_recoverable());
    }

    #[test]
    fn test_provider_call_message() {
        let err = Error::provider_call("deepseek", "HTTP 500");
        assert_eq!(err.to_string(), "deepseek call failed: HTTP 500");
    }
}
