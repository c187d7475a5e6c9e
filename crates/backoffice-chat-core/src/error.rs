use thiserror::Error;

/// Text shown in the conversation when a failure carries no message of its own.
pub const DEFAULT_ERROR_MESSAGE: &str = "An error occurred. Please try again.";

/// Errors produced by the conversation store and the backend clients.
#[derive(Debug, Error)]
pub enum ChatError {
    /// A send was attempted before the minimum interval elapsed.
    #[error("Please wait before sending another message")]
    RateLimited,

    /// The in-flight request was abandoned by the user.
    #[error("Request cancelled")]
    Cancelled,

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The backend answered with a non-success status.
    #[error("Chat backend error {status}: {}", .message.as_deref().unwrap_or("no details"))]
    Server {
        status: u16,
        message: Option<String>,
    },

    /// The backend answered 2xx but reported `success: false`.
    #[error("Chat backend rejected the query: {}", .message.as_deref().unwrap_or("no details"))]
    Rejected { message: Option<String> },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ChatError {
    /// Human-readable text for an error-flagged assistant message.
    ///
    /// Uses the backend's own `error` text when it sent one, otherwise the
    /// generic fallback.
    pub fn user_message(&self) -> String {
        match self {
            ChatError::Server {
                message: Some(message),
                ..
            }
            | ChatError::Rejected {
                message: Some(message),
            } if !message.trim().is_empty() => message.clone(),
            _ => DEFAULT_ERROR_MESSAGE.to_string(),
        }
    }
}

pub type ChatResult<T> = Result<T, ChatError>;
