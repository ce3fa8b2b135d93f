mod client;
pub(crate) mod types;

use std::time::Duration;

use async_trait::async_trait;
use tracing::warn;

use crate::error::ProviderError;
use crate::traits::{AiProvider, GenerateRequest, ProviderHealth};
use client::OpenAiClient;
use types::{ChatMessage, ChatRequest, Role};

// =============================================================================
// OpenAI provider
// =============================================================================

pub struct OpenAiProvider {
    client: OpenAiClient,
    model: String,
    timeout: Duration,
}

impl OpenAiProvider {
    pub fn new(api_key: &str, model: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client: OpenAiClient::new(api_key),
            model: model.into(),
            timeout,
        }
    }

    pub fn with_base_url(mut self, url: &str) -> Self {
        self.client = self.client.with_base_url(url);
        self
    }
}

#[async_trait]
impl AiProvider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    fn model(&self) -> Option<&str> {
        Some(&self.model)
    }

    async fn generate(&self, request: &GenerateRequest) -> Result<String, ProviderError> {
        let chat = ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: Role::System,
                    content: request.context.clone(),
                },
                ChatMessage {
                    role: Role::User,
                    content: request.prompt.clone(),
                },
            ],
            temperature: request.temperature,
        };

        tokio::time::timeout(self.timeout, self.client.chat(&chat))
            .await
            .map_err(|_| ProviderError::Timeout(self.timeout))?
    }

    async fn check_health(&self) -> ProviderHealth {
        match tokio::time::timeout(self.timeout, self.client.models()).await {
            Ok(Ok(_)) => ProviderHealth::Available,
            Ok(Err(ProviderError::QuotaExceeded(_))) => ProviderHealth::QuotaExceeded,
            Ok(Err(ProviderError::Config(reason))) => {
                warn!(provider = "openai", %reason, "credentials rejected during health check");
                ProviderHealth::Unconfigured
            }
            Ok(Err(_)) | Err(_) => ProviderHealth::Offline,
        }
    }

    async fn list_models(&self) -> Result<Vec<String>, ProviderError> {
        tokio::time::timeout(self.timeout, self.client.models())
            .await
            .map_err(|_| ProviderError::Timeout(self.timeout))?
    }
}
