pub mod anthropic;
pub mod mock;

pub use anthropic::AnthropicClient;
pub use mock::MockProvider;

use crate::llm::CompletionClient;
use anima_core::config::LlmConfig;
use anyhow::Result;
use std::sync::Arc;

/// Build the configured completion client. Unknown providers fall back to
/// the deterministic mock so a misconfigured session still answers.
pub fn build(config: &LlmConfig) -> Result<Arc<dyn CompletionClient>> {
    match config.provider.as_str() {
        "anthropic" => Ok(Arc::new(AnthropicClient::new(
            &config.model,
            config.base_url.clone(),
        )?)),
        "mock" => Ok(Arc::new(MockProvider::new(&config.model))),
        other => {
            tracing::warn!("unknown provider '{}', using mock", other);
            Ok(Arc::new(MockProvider::new(&config.model)))
        }
    }
}
