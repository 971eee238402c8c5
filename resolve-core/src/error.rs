//! Error types for resolve-core.

use thiserror::Error;

/// Result type alias using resolve-core's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during resolution. Adapter-level failures are
/// captured into a row's error list rather than propagated as exceptions;
/// these variants are what gets recorded there and what the Orchestrator
/// itself can return.
#[derive(Error, Debug)]
pub enum Error {
    /// The input row failed normalization (missing required fields, etc).
    #[error("invalid input: {0}")]
    InputInvalid(String),

    /// An adapter call exceeded its deadline.
    #[error("adapter timed out after {duration_ms}ms")]
    AdapterTimeout { duration_ms: u64 },

    /// An adapter returned an HTTP error.
    #[error("adapter http error: {status} from {adapter}")]
    AdapterHttpError { adapter: String, status: u16 },

    /// An adapter's quota was exhausted.
    #[error("adapter quota exhausted: {adapter}")]
    AdapterQuota { adapter: String },

    /// A response body could not be parsed.
    #[error("parse error: {0}")]
    ParseError(String),

    /// The LLM judge could not be reached.
    #[error("judge unavailable: {0}")]
    JudgeUnavailable(String),

    /// No candidate survived scoring.
    #[error("no candidate found")]
    NoCandidate,

    /// A contact failed validation.
    #[error("validation failed: {0}")]
    ValidationFailed(String),

    /// A per-row deadline was reached.
    #[error("deadline exceeded")]
    DeadlineExceeded,

    /// Persisting a result failed. The only error class the Orchestrator retries.
    #[error("persistence error: {0}")]
    PersistenceError(String),

    /// LLM API error at the transport/provider level.
    #[error("LLM API error: {provider} - {message}")]
    LlmApi { provider: String, message: String },

    /// Simple LLM error variant used where no provider name is available.
    #[error("LLM error: {0}")]
    LLM(String),

    /// Generic timeout, not tied to a specific adapter.
    #[error("operation timed out after {duration_ms}ms")]
    Timeout { duration_ms: u64 },

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration error, surfaced to the CLI as exit code 2.
    #[error("configuration error: {0}")]
    Config(String),

    /// Internal error that should not occur in normal operation.
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    pub fn input_invalid(message: impl Into<String>) -> Self {
        Self::InputInvalid(message.into())
    }

    pub fn adapter_timeout(duration_ms: u64) -> Self {
        Self::AdapterTimeout { duration_ms }
    }

    pub fn adapter_http_error(adapter: impl Into<String>, status: u16) -> Self {
        Self::AdapterHttpError {
            adapter: adapter.into(),
            status,
        }
    }

    pub fn adapter_quota(adapter: impl Into<String>) -> Self {
        Self::AdapterQuota {
            adapter: adapter.into(),
        }
    }

    pub fn parse_error(message: impl Into<String>) -> Self {
        Self::ParseError(message.into())
    }

    pub fn judge_unavailable(message: impl Into<String>) -> Self {
        Self::JudgeUnavailable(message.into())
    }

    pub fn validation_failed(message: impl Into<String>) -> Self {
        Self::ValidationFailed(message.into())
    }

    pub fn persistence_error(message: impl Into<String>) -> Self {
        Self::PersistenceError(message.into())
    }

    pub fn llm_api(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::LlmApi {
            provider: provider.into(),
            message: message.into(),
        }
    }

    pub fn timeout(duration_ms: u64) -> Self {
        Self::Timeout { duration_ms }
    }

    /// The stable error-kind tag used in `ResolvedRecord.errors` and the
    /// jobs table's `error_message` classification.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InputInvalid(_) => "input_invalid",
            Self::AdapterTimeout { .. } | Self::Timeout { .. } => "adapter_timeout",
            Self::AdapterHttpError { .. } => "adapter_http_error",
            Self::AdapterQuota { .. } => "adapter_quota",
            Self::ParseError(_) => "parse_error",
            Self::JudgeUnavailable(_) => "judge_unavailable",
            Self::NoCandidate => "no_candidate",
            Self::ValidationFailed(_) => "validation_failed",
            Self::DeadlineExceeded => "deadline_exceeded",
            Self::PersistenceError(_) => "persistence_error",
            Self::LlmApi { .. } | Self::LLM(_) => "judge_unavailable",
            Self::Serialization(_) => "parse_error",
            Self::Config(_) => "input_invalid",
            Self::Internal(_) => "persistence_error",
        }
    }

    /// Truncate the display message to at most `max_chars` characters, per
    /// the `error_message` field's length cap.
    pub fn truncated_message(&self, max_chars: usize) -> String {
        let full = self.to_string();
        if full.chars().count() <= max_chars {
            full
        } else {
            full.chars().take(max_chars).collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_maps_to_stable_tags() {
        assert_eq!(Error::input_invalid("x").kind(), "input_invalid");
        assert_eq!(Error::adapter_timeout(100).kind(), "adapter_timeout");
        assert_eq!(Error::NoCandidate.kind(), "no_candidate");
        assert_eq!(Error::DeadlineExceeded.kind(), "deadline_exceeded");
    }

    #[test]
    fn truncated_message_respects_cap() {
        let err = Error::input_invalid("x".repeat(2000));
        let msg = err.truncated_message(1000);
        assert_eq!(msg.chars().count(), 1000);
    }
}
