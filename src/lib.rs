pub mod batch;
pub mod config;
pub mod crawler;
pub mod error;
pub mod llm;
pub mod models;
pub mod report;

pub use batch::BatchProcessor;
pub use config::{BatchConfig, Config, CrawlerConfig, Environment};
pub use crawler::Crawler;
pub use error::{Error, Result};
pub use llm::{Completer, CompletionClient, CompletionRequest, CompletionResult, ProviderRegistry};
