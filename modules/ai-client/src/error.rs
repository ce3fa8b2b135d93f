use std::time::Duration;

use thiserror::Error;

/// Provider failure taxonomy. Everything except `Config` is an
/// operational limit the caller may degrade around; `Config` means the
/// setup itself is wrong and should have failed at startup.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("AI request timed out after {0:?}")]
    Timeout(Duration),

    #[error("AI provider quota exceeded: {0}")]
    QuotaExceeded(String),

    #[error("AI provider unreachable")]
    Offline,

    #[error("AI provider returned HTTP {status}: {body}")]
    Api { status: u16, body: String },

    #[error("no AI provider configured")]
    Unconfigured,

    #[error("AI provider configuration error: {0}")]
    Config(String),
}

impl ProviderError {
    /// Operational errors degrade to the rule-based narrative path;
    /// configuration errors do not.
    pub fn is_operational(&self) -> bool {
        !matches!(self, ProviderError::Config(_))
    }

    /// Map a transport-level reqwest failure onto the taxonomy.
    pub fn from_transport(e: reqwest::Error) -> Self {
        if e.is_timeout() || e.is_connect() {
            ProviderError::Offline
        } else {
            ProviderError::Api {
                status: e.status().map(|s| s.as_u16()).unwrap_or(0),
                body: e.to_string(),
            }
        }
    }

    /// Map a non-success HTTP status onto the taxonomy.
    pub fn from_status(status: u16, body: String) -> Self {
        match status {
            429 => ProviderError::QuotaExceeded(body),
            401 | 403 => ProviderError::Config(format!(
                "provider rejected credentials (HTTP {status})"
            )),
            _ => ProviderError::Api { status, body },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quota_status_maps_to_quota_exceeded() {
        assert!(matches!(
            ProviderError::from_status(429, String::new()),
            ProviderError::QuotaExceeded(_)
        ));
    }

    #[test]
    fn auth_statuses_are_config_errors() {
        for status in [401, 403] {
            let err = ProviderError::from_status(status, String::new());
            assert!(matches!(err, ProviderError::Config(_)));
            assert!(!err.is_operational());
        }
    }

    #[test]
    fn server_error_is_operational() {
        let err = ProviderError::from_status(500, "boom".into());
        assert!(matches!(err, ProviderError::Api { status: 500, .. }));
        assert!(err.is_operational());
    }

    #[test]
    fn timeout_and_offline_are_operational() {
        assert!(ProviderError::Timeout(Duration::from_secs(30)).is_operational());
        assert!(ProviderError::Offline.is_operational());
        assert!(ProviderError::Unconfigured.is_operational());
    }
}
