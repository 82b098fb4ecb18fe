//! Model invocation boundary: prompt in, free text out, may fail.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelError {
    /// Backend reported rate limiting or quota exhaustion.
    #[error("quota exceeded: {0}")]
    QuotaExceeded(String),

    /// Network, auth, malformed request or response.
    #[error("model backend unavailable: {0}")]
    Unavailable(String),
}

impl ModelError {
    /// Classify a backend failure from its HTTP status and body text.
    pub fn from_status(status: u16, body: &str) -> Self {
        if status == 429 || looks_like_quota(body) {
            ModelError::QuotaExceeded(format!("{status} {}", body.trim()))
        } else {
            ModelError::Unavailable(format!("{status} {}", body.trim()))
        }
    }

    pub fn is_quota(&self) -> bool {
        matches!(self, ModelError::QuotaExceeded(_))
    }
}

fn looks_like_quota(body: &str) -> bool {
    let lower = body.to_lowercase();
    lower.contains("resource_exhausted")
        || lower.contains("quota")
        || lower.contains("rate limit")
        || lower.contains("insufficient_quota")
}

/// Any text-generation backend.
pub trait TextModel {
    fn generate(&self, prompt: &str) -> Result<String, ModelError>;
}

impl<T: TextModel + ?Sized> TextModel for Box<T> {
    fn generate(&self, prompt: &str) -> Result<String, ModelError> {
        (**self).generate(prompt)
    }
}

impl<T: TextModel + ?Sized> TextModel for &T {
    fn generate(&self, prompt: &str) -> Result<String, ModelError> {
        (**self).generate(prompt)
    }
}
