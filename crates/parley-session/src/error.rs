//! Error types for the session controllers.

use parley_client::ClientError;

use crate::exchange::ExchangePhase;

/// Input rejected before any request was made.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Please enter an email address.")]
    EmptyEmail,
    #[error("Please enter a search query.")]
    EmptyQuery,
    /// Shares the sign-in message: the create form reports both cases alike.
    #[error("User must be logged in to create a chat.")]
    EmptyChatName,
    #[error("User must be logged in to create a chat.")]
    SignInRequired,
    #[error("Message cannot be empty.")]
    EmptyMessage,
}

/// Errors from the session and message exchange controllers.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Request(#[from] ClientError),
    /// A newer request (or a session/chat change) made this result stale.
    #[error("superseded by a newer request")]
    Superseded,
    #[error("no user session is active")]
    NoSession,
    #[error("no chat is open")]
    NoChatOpen,
    #[error("invalid exchange transition: {0} -> {1}")]
    InvalidTransition(ExchangePhase, ExchangePhase),
}

impl SessionError {
    pub fn is_superseded(&self) -> bool {
        matches!(self, SessionError::Superseded)
    }
}
