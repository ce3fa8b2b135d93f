//! Provider-agnostic AI client.
//!
//! One trait (`AiProvider`), a closed set of backends (Ollama local
//! server, OpenAI hosted API, or none at all) and a factory that
//! resolves the configured backend once at startup.

pub mod error;
pub mod factory;
pub mod ollama;
pub mod openai;
pub mod traits;
pub mod util;

pub use error::ProviderError;
pub use factory::{build_provider, AiConfig, NullProvider};
pub use ollama::OllamaProvider;
pub use openai::OpenAiProvider;
pub use traits::{AiProvider, GenerateRequest, ProviderHealth};
