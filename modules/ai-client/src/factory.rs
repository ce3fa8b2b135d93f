use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::info;

use crate::error::ProviderError;
use crate::ollama::OllamaProvider;
use crate::openai::OpenAiProvider;
use crate::traits::{AiProvider, GenerateRequest, ProviderHealth};

/// Everything the factory needs to resolve a backend. Decoupled from the
/// application config so this crate stays standalone.
#[derive(Debug, Clone)]
pub struct AiConfig {
    /// Provider key: "none", "ollama" or "openai".
    pub provider: String,
    pub model: String,
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub timeout: Duration,
}

/// Resolve the configured provider once at startup. Fails fast with a
/// descriptive error on an unknown key or missing credentials; the
/// closed set of variants replaces dispatch on arbitrary strings.
pub fn build_provider(config: &AiConfig) -> Result<Arc<dyn AiProvider>, ProviderError> {
    match config.provider.as_str() {
        "none" => {
            info!("No AI provider configured, all chapters use rule-based narratives");
            Ok(Arc::new(NullProvider))
        }
        "ollama" => {
            let mut provider = OllamaProvider::new(&config.model, config.timeout);
            if let Some(url) = &config.base_url {
                provider = provider.with_base_url(url);
            }
            info!(model = %config.model, "Using Ollama provider");
            Ok(Arc::new(provider))
        }
        "openai" => {
            let api_key = config.api_key.as_deref().ok_or_else(|| {
                ProviderError::Config("OPENAI_API_KEY is required for provider \"openai\"".into())
            })?;
            let mut provider = OpenAiProvider::new(api_key, &config.model, config.timeout);
            if let Some(url) = &config.base_url {
                provider = provider.with_base_url(url);
            }
            info!(model = %config.model, "Using OpenAI provider");
            Ok(Arc::new(provider))
        }
        other => Err(ProviderError::Config(format!(
            "unknown AI provider \"{other}\" (expected none, ollama or openai)"
        ))),
    }
}

// =============================================================================
// Null provider
// =============================================================================

/// Stand-in when no provider is configured. Every generate call reports
/// `Unconfigured`, which callers treat as "use the rule-based path by
/// design, not by error".
pub struct NullProvider;

#[async_trait]
impl AiProvider for NullProvider {
    fn name(&self) -> &str {
        "none"
    }

    fn model(&self) -> Option<&str> {
        None
    }

    async fn generate(&self, _request: &GenerateRequest) -> Result<String, ProviderError> {
        Err(ProviderError::Unconfigured)
    }

    async fn check_health(&self) -> ProviderHealth {
        ProviderHealth::Unconfigured
    }

    async fn list_models(&self) -> Result<Vec<String>, ProviderError> {
        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(provider: &str) -> AiConfig {
        AiConfig {
            provider: provider.to_string(),
            model: "llama3.1".to_string(),
            base_url: None,
            api_key: None,
            timeout: Duration::from_secs(5),
        }
    }

    #[test]
    fn unknown_provider_fails_fast() {
        let err = build_provider(&config("mystery")).unwrap_err();
        assert!(matches!(err, ProviderError::Config(_)));
        assert!(err.to_string().contains("mystery"));
    }

    #[test]
    fn openai_without_key_is_config_error() {
        let err = build_provider(&config("openai")).unwrap_err();
        assert!(matches!(err, ProviderError::Config(_)));
    }

    #[test]
    fn none_resolves_to_null_provider() {
        let provider = build_provider(&config("none")).unwrap();
        assert_eq!(provider.name(), "none");
        assert!(provider.model().is_none());
    }

    #[tokio::test]
    async fn null_provider_is_unconfigured() {
        let provider = NullProvider;
        assert_eq!(provider.check_health().await, ProviderHealth::Unconfigured);
        let err = provider
            .generate(&GenerateRequest::new("ctx", "prompt"))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Unconfigured));
        assert!(err.is_operational());
    }
}
