//! Model invocation gateway.
//!
//! Wraps a [`Provider`] with the generation settings of the deployment, a
//! per-attempt time budget and a [`RetryPolicy`]. Callers get back either a
//! final assistant message or the ordered list of tool calls it proposes.

use std::sync::Arc;

use concierge_config::AppConfig;
use concierge_core::error::ProviderError;
use concierge_core::message::{Message, Role};
use concierge_core::provider::{
    GenerationConfig, Provider, ProviderRequest, ProviderResponse, ToolDefinition, Usage,
};
use concierge_core::retry::RetryPolicy;
use concierge_core::tool::ToolCall;
use tracing::debug;

/// What the model decided to do with the transcript.
#[derive(Debug, Clone)]
pub enum ModelOutcome {
    /// The model answered; the turn can finalize.
    Final(Message),
    /// The model proposed tool calls, in the order it listed them.
    ToolCalls { message: Message, calls: Vec<ToolCall> },
}

#[derive(Debug, Clone)]
pub struct ModelReply {
    pub outcome: ModelOutcome,
    pub usage: Option<Usage>,
    pub model: String,
}

pub struct ModelGateway {
    provider: Arc<dyn Provider>,
    retry: RetryPolicy,
    config: GenerationConfig,
}

impl ModelGateway {
    pub fn new(provider: Arc<dyn Provider>, config: GenerationConfig) -> Self {
        Self {
            provider,
            retry: RetryPolicy::default(),
            config,
        }
    }

    /// Build a gateway with the model settings and retry policy from config.
    pub fn from_config(provider: Arc<dyn Provider>, config: &AppConfig) -> Self {
        Self::new(provider, config.generation_config()).with_retry_policy(config.retry.to_policy())
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn config(&self) -> &GenerationConfig {
        &self.config
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Send a fully formed request, with the time budget and retry policy
    /// applied but no checks on the reply.
    pub async fn generate(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let budget = self.config.time_budget;
        self.retry
            .execute(|| {
                let provider = self.provider.clone();
                let request = request.clone();
                async move {
                    match tokio::time::timeout(budget, provider.complete(request)).await {
                        Ok(result) => result,
                        Err(_) => Err(ProviderError::Timeout(format!(
                            "{} gave no response within {}ms",
                            provider.name(),
                            budget.as_millis()
                        ))),
                    }
                }
            })
            .await
    }

    /// Send the transcript and tool set to the model.
    ///
    /// Each attempt runs under the configured time budget; an attempt that
    /// overruns it counts as a transient [`ProviderError::Timeout`].
    pub async fn invoke(
        &self,
        transcript: &[Message],
        tools: &[ToolDefinition],
    ) -> Result<ModelReply, ProviderError> {
        let request = ProviderRequest {
            model: self.config.model.clone(),
            system: self.config.system_prompt.clone(),
            messages: transcript.to_vec(),
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
            tools: tools.to_vec(),
            stop: self.config.stop.clone(),
        };
        let response = self.generate(request).await?;

        let message = response.message;
        if message.role != Role::Assistant {
            return Err(ProviderError::MalformedResponse(format!(
                "expected an assistant message, got {:?}",
                message.role
            )));
        }
        if let Some(bad) = message
            .tool_calls
            .iter()
            .find(|tc| tc.id.is_empty() || tc.name.is_empty())
        {
            return Err(ProviderError::MalformedResponse(format!(
                "tool call without id or name: {bad:?}"
            )));
        }

        let outcome = if message.tool_calls.is_empty() {
            ModelOutcome::Final(message)
        } else {
            let calls = ToolCall::from_message(&message);
            debug!(
                tool_calls = calls.len(),
                names = ?calls.iter().map(|c| c.name.as_str()).collect::<Vec<_>>(),
                "Model proposed tool calls"
            );
            ModelOutcome::ToolCalls { message, calls }
        };

        Ok(ModelReply {
            outcome,
            usage: response.usage,
            model: response.model,
        })
    }
}
