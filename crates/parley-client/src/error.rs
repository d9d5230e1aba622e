//! Transport errors.
//!
//! Failed calls display only the fixed message of the operation that
//! failed; response bodies are never parsed for detail.

use thiserror::Error;

use crate::backend::Operation;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("invalid base URL: {0}")]
    InvalidBaseUrl(String),
    #[error("invalid user agent: {0:?}")]
    InvalidUserAgent(String),
    #[error("HTTP client setup failed: {0}")]
    Setup(#[source] reqwest::Error),
    /// The backend answered with a non-2xx status.
    #[error("{operation}")]
    Status { operation: Operation, status: u16 },
    /// The request never produced a response.
    #[error("{operation}")]
    Transport {
        operation: Operation,
        #[source]
        source: reqwest::Error,
    },
    /// A 2xx response whose body did not match the expected shape.
    #[error("{operation}")]
    Decode {
        operation: Operation,
        #[source]
        source: reqwest::Error,
    },
}

impl ClientError {
    /// The operation this error belongs to, if it came from a call.
    pub fn operation(&self) -> Option<&Operation> {
        match self {
            Self::Status { operation, .. }
            | Self::Transport { operation, .. }
            | Self::Decode { operation, .. } => Some(operation),
            Self::InvalidBaseUrl(_) | Self::InvalidUserAgent(_) | Self::Setup(_) => None,
        }
    }

    /// HTTP status for non-2xx failures.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_core::Sender;

    #[test]
    fn test_status_error_displays_fixed_message() {
        let err = ClientError::Status {
            operation: Operation::ResolveUser,
            status: 500,
        };
        assert_eq!(err.to_string(), "Failed to fetch or create user.");
        assert_eq!(err.status(), Some(500));
        assert_eq!(err.operation(), Some(&Operation::ResolveUser));
    }

    #[test]
    fn test_fetch_messages_message_names_chat() {
        let err = ClientError::Status {
            operation: Operation::FetchMessages {
                chat_id: "c-42".to_string(),
            },
            status: 404,
        };
        assert_eq!(err.to_string(), "Failed to fetch messages for chat ID: c-42");
    }

    #[test]
    fn test_post_message_message_depends_on_sender() {
        let user = ClientError::Status {
            operation: Operation::PostMessage {
                sender: Sender::User,
            },
            status: 404,
        };
        let agent = ClientError::Status {
            operation: Operation::PostMessage {
                sender: Sender::Agent,
            },
            status: 404,
        };
        assert_eq!(user.to_string(), "Failed to post user message.");
        assert_eq!(agent.to_string(), "Failed to post agent message.");
    }

    #[test]
    fn test_invalid_base_url_has_no_operation() {
        let err = ClientError::InvalidBaseUrl("mailto:x".to_string());
        assert!(err.operation().is_none());
        assert!(err.status().is_none());
        assert_eq!(err.to_string(), "invalid base URL: mailto:x");
    }

    #[test]
    fn test_invalid_user_agent_is_not_a_url_error() {
        let err = ClientError::InvalidUserAgent("bad\nagent".to_string());
        assert!(err.operation().is_none());
        assert_eq!(err.to_string(), "invalid user agent: \"bad\\nagent\"");
    }
}
