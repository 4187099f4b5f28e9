//! Broker error types

use thiserror::Error;

/// Everything that can go wrong between a generation intent and an image.
///
/// Every failure reaches the caller as one of these variants; the broker
/// never swallows an error and never crashes the process over one request.
#[derive(Debug, Clone, Error)]
pub enum GenerationError {
    /// Malformed or missing configuration for the chosen format
    #[error("configuration error: {0}")]
    Config(String),

    /// Provider rejected the credential (HTTP 401)
    #[error("authentication failed: {0}")]
    Auth(String),

    /// Provider refused the account (HTTP 403), commonly "needs verification"
    #[error("permission denied: {0}")]
    Permission(String),

    /// Provider rejected the request itself (HTTP 400)
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Provider rate limit (HTTP 429); the message is kept verbatim so the
    /// caller can distinguish RPM/RPD/TPM/TPD/IPM/IPD limits
    #[error("rate limited: {0}")]
    RateLimited(String),

    /// Upstream temporarily unavailable (HTTP 503/504); retryable by the caller
    #[error("upstream overloaded: {0}")]
    UpstreamOverloaded(String),

    /// Response shape was recognized but its payload could not be decoded
    #[error("decode error: {0}")]
    Decode(String),

    /// Response contained no image in any recognized shape
    #[error("empty result: {0}")]
    EmptyResult(String),

    /// Requested model id is not configured
    #[error("model not found: {0}")]
    ModelNotFound(String),

    /// Requested style is neither a style id nor a known alias
    #[error("style not found: {0}")]
    StyleNotFound(String),

    /// Network-level failure before any provider answer arrived
    #[error("transport error: {0}")]
    Transport(String),

    /// Provider answered with a status outside the mapped set
    #[error("provider error (status {status}): {message}")]
    UnknownProvider { status: u16, message: String },
}

impl GenerationError {
    /// Whether the caller may reasonably retry this failure later.
    /// The core itself never retries.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RateLimited(_) | Self::UpstreamOverloaded(_) | Self::Transport(_)
        )
    }

    /// Whether this failure is cached under the request fingerprint.
    ///
    /// Failures that reached the provider are cached so identical broken
    /// requests do not hit the upstream again. Caller-input errors never
    /// reached the provider, and transport failures paid for nothing, so
    /// neither is cached.
    pub fn is_cacheable(&self) -> bool {
        !matches!(
            self,
            Self::Config(_) | Self::ModelNotFound(_) | Self::StyleNotFound(_) | Self::Transport(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_failures() {
        assert!(GenerationError::RateLimited("IPM limit exceeded".into()).is_retryable());
        assert!(GenerationError::UpstreamOverloaded("503".into()).is_retryable());
        assert!(GenerationError::Transport("connection reset".into()).is_retryable());
        assert!(!GenerationError::Auth("bad key".into()).is_retryable());
        assert!(!GenerationError::BadRequest("prompt rejected".into()).is_retryable());
    }

    #[test]
    fn test_only_provider_answers_are_cacheable() {
        // reached the provider: cached
        assert!(GenerationError::BadRequest("prompt rejected".into()).is_cacheable());
        assert!(GenerationError::RateLimited("RPM".into()).is_cacheable());
        assert!(GenerationError::Auth("bad key".into()).is_cacheable());
        assert!(GenerationError::EmptyResult("no image".into()).is_cacheable());
        assert!(GenerationError::UnknownProvider {
            status: 418,
            message: "teapot".into()
        }
        .is_cacheable());
        // never reached the provider, or paid for nothing: not cached
        assert!(!GenerationError::Config("no api key".into()).is_cacheable());
        assert!(!GenerationError::ModelNotFound("model9".into()).is_cacheable());
        assert!(!GenerationError::StyleNotFound("oilpaint".into()).is_cacheable());
        assert!(!GenerationError::Transport("timeout".into()).is_cacheable());
    }
}
