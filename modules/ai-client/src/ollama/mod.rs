mod client;
pub(crate) mod types;

use std::time::Duration;

use async_trait::async_trait;

use crate::error::ProviderError;
use crate::traits::{AiProvider, GenerateRequest, ProviderHealth};
use client::OllamaClient;
use types::{GenerateBody, GenerateOptions};

// =============================================================================
// Ollama provider (local model server)
// =============================================================================

pub struct OllamaProvider {
    client: OllamaClient,
    model: String,
    timeout: Duration,
}

impl OllamaProvider {
    pub fn new(model: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client: OllamaClient::new(),
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
impl AiProvider for OllamaProvider {
    fn name(&self) -> &str {
        "ollama"
    }

    fn model(&self) -> Option<&str> {
        Some(&self.model)
    }

    async fn generate(&self, request: &GenerateRequest) -> Result<String, ProviderError> {
        let body = GenerateBody {
            model: self.model.clone(),
            prompt: request.prompt.clone(),
            system: Some(request.context.clone()),
            stream: false,
            options: request
                .temperature
                .map(|temperature| GenerateOptions { temperature }),
        };

        tokio::time::timeout(self.timeout, self.client.generate(&body))
            .await
            .map_err(|_| ProviderError::Timeout(self.timeout))?
    }

    async fn check_health(&self) -> ProviderHealth {
        // A local server has no quota; it is either reachable or not.
        match tokio::time::timeout(self.timeout, self.client.tags()).await {
            Ok(Ok(_)) => ProviderHealth::Available,
            Ok(Err(_)) | Err(_) => ProviderHealth::Offline,
        }
    }

    async fn list_models(&self) -> Result<Vec<String>, ProviderError> {
        tokio::time::timeout(self.timeout, self.client.tags())
            .await
            .map_err(|_| ProviderError::Timeout(self.timeout))?
    }
}
