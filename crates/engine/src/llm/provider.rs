//! LLM Provider Abstraction
//!
//! Provides a unified interface for different LLM providers using Rig.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use rig::completion::Prompt;
use rig::providers::{anthropic, openai};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    pub provider: String,
    pub endpoint: Option<String>,
    pub model: String,
    pub api_key: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub timeout_seconds: Option<u64>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "anthropic".to_string(),
            endpoint: None,
            model: "claude-3-5-sonnet".to_string(),
            api_key: None,
            temperature: Some(0.2),
            max_tokens: Some(2048),
            timeout_seconds: Some(60),
        }
    }
}

/// Expected shape of the model output. `Json` output is validated by
/// `output::parse_structured` before a step may consume it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseFormat {
    Text,
    Json,
}

/// Per-call options, overriding the provider's configured defaults.
#[derive(Debug, Clone)]
pub struct CompletionOptions {
    pub model: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub response_format: ResponseFormat,
}

impl Default for CompletionOptions {
    fn default() -> Self {
        Self {
            model: None,
            temperature: None,
            max_tokens: None,
            response_format: ResponseFormat::Text,
        }
    }
}

/// Raw completion plus the provider-reported cost, when available. Cost is
/// `None` when the provider does not report usage-based pricing; the budget
/// guard then commits the step's estimate instead.
#[derive(Debug, Clone)]
pub struct CompletionResponse {
    pub text: String,
    pub cost_cents: Option<i64>,
}

/// Trait for LLM providers that can handle completion requests.
#[async_trait::async_trait]
pub trait LlmProvider: Send + Sync {
    async fn complete(&self, prompt: &str, options: &CompletionOptions)
        -> Result<CompletionResponse>;
}

/// Anthropic Claude provider using Rig.
pub struct AnthropicProvider {
    client: anthropic::Client,
    model: String,
}

impl AnthropicProvider {
    pub fn new(api_key: Option<String>, model: &str) -> Result<Self> {
        let client = if let Some(key) = api_key {
            anthropic::Client::new(
                &key,
                "https://api.anthropic.com",
                None,
                anthropic::ANTHROPIC_VERSION_LATEST,
            )
        } else {
            // Reads ANTHROPIC_API_KEY from the environment.
            anthropic::Client::from_env()
        };

        Ok(Self {
            client,
            model: model.to_string(),
        })
    }

    /// Map model name to Rig's model constant.
    fn resolve_model<'a>(&'a self, options: &'a CompletionOptions) -> &'a str {
        match options.model.as_deref().unwrap_or(&self.model) {
            "claude-3-5-sonnet" | "claude-3-5-sonnet-20241022" => anthropic::CLAUDE_3_5_SONNET,
            "claude-3-7-sonnet" => anthropic::CLAUDE_3_7_SONNET,
            "claude-3-haiku" | "claude-3-haiku-20240307" => anthropic::CLAUDE_3_HAIKU,
            "claude-3-opus" | "claude-3-opus-20240229" => anthropic::CLAUDE_3_OPUS,
            other => {
                if other.starts_with("claude") {
                    // Pass through full model ids Rig has no constant for.
                    return options.model.as_deref().unwrap_or(&self.model);
                }
                anthropic::CLAUDE_3_5_SONNET
            }
        }
    }
}

#[async_trait::async_trait]
impl LlmProvider for AnthropicProvider {
    async fn complete(
        &self,
        prompt: &str,
        options: &CompletionOptions,
    ) -> Result<CompletionResponse> {
        let mut builder = self.client.agent(self.resolve_model(options));
        if let Some(temperature) = options.temperature {
            builder = builder.temperature(temperature as f64);
        }
        if let Some(max_tokens) = options.max_tokens {
            builder = builder.max_tokens(max_tokens as u64);
        }
        let agent = builder.build();

        let text = agent
            .prompt(prompt)
            .await
            .map_err(|e| anyhow::anyhow!("Anthropic API error: {:?}", e))?;

        Ok(CompletionResponse {
            text,
            cost_cents: None,
        })
    }
}

/// OpenAI provider using Rig.
pub struct OpenAiProvider {
    client: openai::Client,
    model: String,
}

impl OpenAiProvider {
    pub fn new(api_key: Option<String>, model: &str) -> Result<Self> {
        let client = if let Some(key) = api_key {
            openai::Client::new(&key)
        } else {
            // Reads OPENAI_API_KEY from the environment.
            openai::Client::from_env()
        };

        Ok(Self {
            client,
            model: model.to_string(),
        })
    }
}

#[async_trait::async_trait]
impl LlmProvider for OpenAiProvider {
    async fn complete(
        &self,
        prompt: &str,
        options: &CompletionOptions,
    ) -> Result<CompletionResponse> {
        let model = options.model.as_deref().unwrap_or(&self.model);
        let mut builder = self.client.agent(model);
        if let Some(temperature) = options.temperature {
            builder = builder.temperature(temperature as f64);
        }
        if let Some(max_tokens) = options.max_tokens {
            builder = builder.max_tokens(max_tokens as u64);
        }
        let agent = builder.build();

        let text = agent
            .prompt(prompt)
            .await
            .map_err(|e| anyhow::anyhow!("OpenAI API error: {:?}", e))?;

        Ok(CompletionResponse {
            text,
            cost_cents: None,
        })
    }
}

/// Mock provider for testing. Responses are deterministic and keyed on
/// prompt content so pipeline tests never touch the network.
pub struct MockProvider;

#[async_trait::async_trait]
impl LlmProvider for MockProvider {
    async fn complete(
        &self,
        prompt: &str,
        options: &CompletionOptions,
    ) -> Result<CompletionResponse> {
        let text = if prompt.contains("lead analyst") || prompt.contains("Analyze the answers") {
            r#"{
  "summary": "Mid-market healthcare provider evaluating intake automation.",
  "quality_score": 78.0,
  "industry": "healthcare",
  "dimensions": {
    "technical_readiness": 0.8,
    "business_impact": 0.9,
    "financial_capacity": 0.7,
    "urgency": 0.6,
    "decision_authority": 0.75,
    "implementation_simplicity": 0.65
  }
}"#
            .to_string()
        } else if prompt.contains("follow-up") {
            "Thanks for completing the form. Based on your answers, our team \
             will reach out within one business day to discuss next steps."
                .to_string()
        } else if options.response_format == ResponseFormat::Json {
            r#"{"summary": "No specific template matched.", "quality_score": 50.0}"#.to_string()
        } else {
            format!(
                "Mock completion for: {}...",
                prompt.chars().take(50).collect::<String>()
            )
        };

        Ok(CompletionResponse {
            text,
            cost_cents: None,
        })
    }
}

/// Create a provider from configuration.
pub fn create_provider(config: &LlmConfig) -> Result<Arc<dyn LlmProvider>> {
    match config.provider.as_str() {
        "anthropic" | "claude" => {
            let provider = AnthropicProvider::new(config.api_key.clone(), &config.model)?;
            Ok(Arc::new(provider))
        }
        "openai" => {
            let provider = OpenAiProvider::new(config.api_key.clone(), &config.model)?;
            Ok(Arc::new(provider))
        }
        "mock" => Ok(Arc::new(MockProvider)),
        other => Err(anyhow::anyhow!("unknown LLM provider '{}'", other)),
    }
}
