use tracing::debug;

use super::types::*;
use crate::error::ProviderError;

const OLLAMA_BASE_URL: &str = "http://localhost:11434";

pub(crate) struct OllamaClient {
    http: reqwest::Client,
    base_url: String,
}

impl OllamaClient {
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: OLLAMA_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, url: &str) -> Self {
        self.base_url = url.trim_end_matches('/').to_string();
        self
    }

    pub async fn generate(&self, body: &GenerateBody) -> Result<String, ProviderError> {
        let url = format!("{}/api/generate", self.base_url);

        debug!(model = %body.model, "Ollama generate request");

        let response = self
            .http
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(ProviderError::from_transport)?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let text = response.text().await.unwrap_or_default();
            return Err(ProviderError::from_status(status, text));
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(ProviderError::from_transport)?;

        Ok(parsed.response)
    }

    pub async fn tags(&self) -> Result<Vec<String>, ProviderError> {
        let url = format!("{}/api/tags", self.base_url);

        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(ProviderError::from_transport)?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let text = response.text().await.unwrap_or_default();
            return Err(ProviderError::from_status(status, text));
        }

        let parsed: TagsResponse = response
            .json()
            .await
            .map_err(ProviderError::from_transport)?;

        Ok(parsed.models.into_iter().map(|m| m.name).collect())
    }
}
