use std::fmt::{Display, Formatter};

/// How a provider failure should be treated by caller policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderErrorKind {
    /// Worth retrying with a fresh request (timeouts, rate limits, 5xx).
    Transient,
    /// Misconfigured model, bad credentials, anything a retry cannot fix.
    Permanent,
    /// The upstream payload could not be understood.
    Malformed,
}

#[derive(Debug, Clone)]
pub struct ProviderError {
    pub kind: ProviderErrorKind,
    pub message: String,
    pub status: Option<u16>,
}

impl ProviderError {
    pub fn transient(message: impl Into<String>) -> Self {
        Self {
            kind: ProviderErrorKind::Transient,
            message: message.into(),
            status: None,
        }
    }

    pub fn permanent(message: impl Into<String>) -> Self {
        Self {
            kind: ProviderErrorKind::Permanent,
            message: message.into(),
            status: None,
        }
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self {
            kind: ProviderErrorKind::Malformed,
            message: message.into(),
            status: None,
        }
    }

    /// Classify an upstream HTTP status. 408/429 and server errors are
    /// retryable, everything else is a configuration or request problem.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let kind = match status {
            408 | 429 => ProviderErrorKind::Transient,
            s if s >= 500 => ProviderErrorKind::Transient,
            _ => ProviderErrorKind::Permanent,
        };
        Self {
            kind,
            message: message.into(),
            status: Some(status),
        }
    }

    pub fn is_transient(&self) -> bool {
        self.kind == ProviderErrorKind::Transient
    }
}

impl Display for ProviderError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.status {
            Some(status) => write!(f, "{} (status {})", self.message, status),
            None => write!(f, "{}", self.message),
        }
    }
}

/// Error taxonomy for the chat pipeline.
#[derive(Debug)]
pub enum ChatError {
    /// Malformed or out-of-range input; the message names the offending field.
    BadRequest(String),
    /// Policy rejection: the requester may not touch this chat/model.
    Unauthorized(String),
    /// Balance must be strictly positive before a generation is admitted.
    InsufficientBalance,
    /// Dangling id reference.
    NotFound(String),
    /// Idempotent-finalize collision or a structural tree violation.
    Conflict(String),
    /// Missing or unusable price/model configuration.
    InvalidConfig(String),
    Provider(ProviderError),
    Storage(String),
    /// The relay channel to the client overflowed or closed.
    Relay(String),
}

impl Display for ChatError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ChatError::BadRequest(m) => write!(f, "bad request: {}", m),
            ChatError::Unauthorized(m) => write!(f, "unauthorized: {}", m),
            ChatError::InsufficientBalance => write!(f, "insufficient balance"),
            ChatError::NotFound(m) => write!(f, "not found: {}", m),
            ChatError::Conflict(m) => write!(f, "conflict: {}", m),
            ChatError::InvalidConfig(m) => write!(f, "invalid config: {}", m),
            ChatError::Provider(e) => write!(f, "provider error: {}", e),
            ChatError::Storage(m) => write!(f, "storage error: {}", m),
            ChatError::Relay(m) => write!(f, "relay error: {}", m),
        }
    }
}

impl std::error::Error for ChatError {}

impl From<ProviderError> for ChatError {
    fn from(value: ProviderError) -> Self {
        ChatError::Provider(value)
    }
}

impl From<rusqlite::Error> for ChatError {
    fn from(value: rusqlite::Error) -> Self {
        ChatError::Storage(value.to_string())
    }
}

impl From<r2d2::Error> for ChatError {
    fn from(value: r2d2::Error) -> Self {
        ChatError::Storage(value.to_string())
    }
}

impl From<reqwest::Error> for ChatError {
    fn from(value: reqwest::Error) -> Self {
        let kind = if value.is_timeout() || value.is_connect() || value.is_request() {
            ProviderErrorKind::Transient
        } else if value.is_decode() {
            ProviderErrorKind::Malformed
        } else {
            ProviderErrorKind::Transient
        };
        ChatError::Provider(ProviderError {
            kind,
            message: value.to_string(),
            status: value.status().map(|s| s.as_u16()),
        })
    }
}

pub type ChatResult<T> = Result<T, ChatError>;
