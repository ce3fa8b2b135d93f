use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;

// =============================================================================
// Requests
// =============================================================================

/// A single prose-generation request. `context` becomes the system
/// message; `prompt` the user message.
#[derive(Debug, Clone)]
pub struct GenerateRequest {
    pub context: String,
    pub prompt: String,
    pub temperature: Option<f32>,
}

impl GenerateRequest {
    pub fn new(context: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            context: context.into(),
            prompt: prompt.into(),
            temperature: None,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

// =============================================================================
// Health
// =============================================================================

/// Capability state of a backend. `QuotaExceeded` and `Offline` are
/// operational limits; `Unconfigured` means no provider (or no
/// credentials) is set up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderHealth {
    Available,
    QuotaExceeded,
    Offline,
    Unconfigured,
}

// =============================================================================
// AiProvider trait
// =============================================================================

/// Uniform surface over interchangeable AI backends. Selected once at
/// startup via the factory; callers never branch on the concrete type.
#[async_trait]
pub trait AiProvider: Send + Sync {
    /// Provider key, e.g. "ollama" or "openai".
    fn name(&self) -> &str;

    /// Model the provider is configured to use, if any.
    fn model(&self) -> Option<&str>;

    /// Generate prose. Bounded by the configured timeout; on timeout or
    /// backend error returns a typed failure the caller interprets as
    /// "fall back", never a panic.
    async fn generate(&self, request: &GenerateRequest) -> Result<String, ProviderError>;

    async fn check_health(&self) -> ProviderHealth;

    async fn list_models(&self) -> Result<Vec<String>, ProviderError>;
}

impl std::fmt::Debug for dyn AiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AiProvider")
            .field("name", &self.name())
            .field("model", &self.model())
            .finish()
    }
}
