pub mod registry;
pub mod provider;
pub mod client;
pub mod claude;
pub mod gemini;
pub mod openai;
pub mod ollama;
pub mod hunyuan;
pub mod parser;
pub mod prompts;

pub use registry::{ProviderConfig, ProviderKind, ProviderRegistry};
pub use provider::{CompletionBackend, GenerationParams, ParamOverrides};
pub use client::{Completer, CompletionClient, CompletionRequest, CompletionResult, ProviderStatus};
pub use parser::{ResponseFormat, ResponseParser};
pub use prompts::PromptTemplate;
