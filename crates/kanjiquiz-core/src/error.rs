//! Shared error type across kanjiquiz crates.

use std::time::Duration;

use thiserror::Error;

/// Stable error families surfaced to callers and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Transport could not be opened, closed unexpectedly, or timed out opening.
    Connection,
    /// A request got no reply within its deadline.
    Timeout,
    /// The peer answered with something we did not expect.
    Protocol,
    /// The question source ran out of attempts.
    ContentGeneration,
    /// Local state does not allow the operation.
    Application,
    /// An external collaborator (words, glyphs, stats, keys) failed.
    Collaborator,
    /// Invalid configuration.
    Config,
    /// Internal invariant broken.
    Internal,
}

impl ErrorKind {
    /// String representation used in logs and metrics labels.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Connection => "CONNECTION",
            ErrorKind::Timeout => "TIMEOUT",
            ErrorKind::Protocol => "PROTOCOL",
            ErrorKind::ContentGeneration => "CONTENT_GENERATION",
            ErrorKind::Application => "APPLICATION",
            ErrorKind::Collaborator => "COLLABORATOR",
            ErrorKind::Config => "CONFIG",
            ErrorKind::Internal => "INTERNAL",
        }
    }
}

/// Shared result type.
pub type Result<T> = std::result::Result<T, QuizError>;

/// Unified error type used by core and client.
#[derive(Debug, Error)]
pub enum QuizError {
    #[error("connection failed: {0}")]
    ConnectionFailed(String),
    #[error("connection closed")]
    ConnectionClosed,
    #[error("connect timed out after {0:?}")]
    ConnectTimeout(Duration),
    #[error("not connected")]
    NotConnected,

    #[error("request {correlation_id} timed out after {timeout:?}")]
    RequestTimeout {
        correlation_id: String,
        timeout: Duration,
    },

    #[error("unexpected response type: {0}")]
    UnexpectedResponse(String),
    #[error("host reported status: {0}")]
    Status(String),
    #[error("malformed envelope: {0}")]
    MalformedEnvelope(String),
    #[error("malformed payload for {message_type}: {reason}")]
    MalformedPayload {
        message_type: String,
        reason: String,
    },
    #[error("correlation id already pending: {0}")]
    DuplicateCorrelationId(String),

    #[error("question generation failed after {attempts} attempts: {last}")]
    ContentGeneration { attempts: u32, last: String },

    #[error("noAdmin: client {0} is not in the roster")]
    NoAdmin(String),
    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("collaborator failed: {0}")]
    Collaborator(String),
    #[error("bad config: {0}")]
    Config(String),
    #[error("internal: {0}")]
    Internal(String),
}

impl QuizError {
    /// Map to a stable error family.
    pub fn kind(&self) -> ErrorKind {
        match self {
            QuizError::ConnectionFailed(_)
            | QuizError::ConnectionClosed
            | QuizError::ConnectTimeout(_)
            | QuizError::NotConnected => ErrorKind::Connection,
            QuizError::RequestTimeout { .. } => ErrorKind::Timeout,
            QuizError::UnexpectedResponse(_)
            | QuizError::Status(_)
            | QuizError::MalformedEnvelope(_)
            | QuizError::MalformedPayload { .. }
            | QuizError::DuplicateCorrelationId(_) => ErrorKind::Protocol,
            QuizError::ContentGeneration { .. } => ErrorKind::ContentGeneration,
            QuizError::NoAdmin(_) | QuizError::InvalidState(_) => ErrorKind::Application,
            QuizError::Collaborator(_) => ErrorKind::Collaborator,
            QuizError::Config(_) => ErrorKind::Config,
            QuizError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// True for errors that mean the link is gone.
    pub fn is_connection(&self) -> bool {
        self.kind() == ErrorKind::Connection
    }
}
