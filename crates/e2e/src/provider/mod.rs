//! Language-model providers

use std::sync::Arc;

use async_trait::async_trait;
use mcptest_common::{ProviderKind, ProviderSettings};

use crate::error::{E2eError, E2eResult};
use crate::message::{AssistantTurn, Message, Tool};

pub mod anthropic;
pub mod openai;

pub use anthropic::AnthropicModel;
pub use openai::OpenAiModel;

/// One model call: conversation so far plus tool catalogue in, one turn out
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// `provider/model`, for logs
    fn describe(&self) -> String;

    async fn complete(&self, messages: &[Message], tools: &[Tool]) -> E2eResult<AssistantTurn>;
}

/// Build the configured provider client
pub fn build_model(settings: &ProviderSettings) -> E2eResult<Arc<dyn ChatModel>> {
    let model: Arc<dyn ChatModel> = match settings.kind {
        ProviderKind::Anthropic => Arc::new(AnthropicModel::new(settings.clone())?),
        ProviderKind::OpenAi => Arc::new(OpenAiModel::new(settings.clone())?),
    };
    Ok(model)
}

pub(crate) fn http_client() -> E2eResult<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(concat!("mcptest/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(E2eError::from)
}

/// Turn a non-2xx response into a provider error carrying the body
pub(crate) async fn check_status(response: reqwest::Response) -> E2eResult<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(E2eError::Provider(format!("HTTP {}: {}", status, body)))
}
