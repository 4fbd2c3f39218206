//! Completion service interface.
//!
//! The language-model call is a pure request/response collaborator: a system
//! prompt and user text in, generated text or a displayable error out.

use async_trait::async_trait;
use thiserror::Error;

/// Failures of a completion request.
///
/// None of these abort the session. The session renders the `Display` text
/// in the output field the generated text would have occupied.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CompletionError {
    /// No API key configured; no request was sent
    #[error("Error: no API key configured. Add one to secret.json or set OPENAI_API_KEY.")]
    MissingCredential,

    /// The endpoint answered with a non-success HTTP status
    #[error("Error: API request failed with status {status}: {message}")]
    RequestFailed { status: u16, message: String },

    /// Transport-level failure (DNS, connect, timeout, ...)
    #[error("Error: network failure: {0}")]
    NetworkFailure(String),

    /// The endpoint answered 2xx but the body held no usable text
    #[error("Error: invalid API response: {0}")]
    InvalidResponse(String),
}

impl CompletionError {
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::RequestFailed { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// A remote text-completion endpoint.
#[async_trait]
pub trait CompletionService: Send + Sync {
    /// Generates a continuation of `user_text` under `system_prompt`.
    async fn complete(
        &self,
        system_prompt: &str,
        user_text: &str,
    ) -> Result<String, CompletionError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_failed_message_contains_status() {
        let err = CompletionError::RequestFailed {
            status: 500,
            message: "upstream exploded".to_string(),
        };
        let rendered = err.to_string();
        assert!(rendered.contains("500"));
        assert!(rendered.contains("upstream exploded"));
        assert_eq!(err.status(), Some(500));
    }
}
