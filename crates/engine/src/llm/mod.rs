//! Generative-model collaborator port and adapters.

pub mod output;
pub mod provider;

pub use output::parse_structured;
pub use provider::{
    create_provider, AnthropicProvider, CompletionOptions, CompletionResponse, LlmConfig,
    LlmProvider, MockProvider, OpenAiProvider, ResponseFormat,
};
