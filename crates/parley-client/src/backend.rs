//! The backend contract consumed by the session controllers.

use std::fmt;

use async_trait::async_trait;
use parley_core::{AgentRun, AgentTask, Chat, Message, NewChat, NewMessage, Sender, User};

use crate::error::ClientError;

/// A named backend call. Its `Display` is the text surfaced to the user when
/// the call fails.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Operation {
    ResolveUser,
    ListChats,
    SearchChats,
    CreateChat,
    FetchMessages { chat_id: String },
    PostMessage { sender: Sender },
    RunAgent,
}

/// Operation identity without call arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    ResolveUser,
    ListChats,
    SearchChats,
    CreateChat,
    FetchMessages,
    PostUserMessage,
    PostAgentMessage,
    RunAgent,
}

impl Operation {
    pub fn kind(&self) -> OperationKind {
        match self {
            Operation::ResolveUser => OperationKind::ResolveUser,
            Operation::ListChats => OperationKind::ListChats,
            Operation::SearchChats => OperationKind::SearchChats,
            Operation::CreateChat => OperationKind::CreateChat,
            Operation::FetchMessages { .. } => OperationKind::FetchMessages,
            Operation::PostMessage {
                sender: Sender::User,
            } => OperationKind::PostUserMessage,
            Operation::PostMessage {
                sender: Sender::Agent,
            } => OperationKind::PostAgentMessage,
            Operation::RunAgent => OperationKind::RunAgent,
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::ResolveUser => write!(f, "Failed to fetch or create user."),
            Operation::ListChats => write!(f, "Failed to fetch chats."),
            Operation::SearchChats => write!(f, "Failed to search chats."),
            Operation::CreateChat => write!(f, "Failed to create new chat."),
            Operation::FetchMessages { chat_id } => {
                write!(f, "Failed to fetch messages for chat ID: {chat_id}")
            }
            Operation::PostMessage { sender } => write!(f, "Failed to post {sender} message."),
            Operation::RunAgent => write!(f, "Failed to call the agent."),
        }
    }
}

/// Stateless request/response access to the chat service.
///
/// Every method is a single round trip. Implementations never retry.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Fetch the user registered under `email`, creating it if absent.
    async fn resolve_user(&self, email: &str) -> Result<User, ClientError>;

    /// List the chats owned by the user registered under `email`.
    async fn list_chats(&self, email: &str) -> Result<Vec<Chat>, ClientError>;

    /// Search the chats of `user_id`. An empty result is a success.
    async fn search_chats(&self, user_id: &str, query: &str) -> Result<Vec<Chat>, ClientError>;

    /// Create a chat under `request.user_id`.
    async fn create_chat(&self, request: &NewChat) -> Result<Chat, ClientError>;

    /// Fetch the stored message history of a chat.
    async fn fetch_messages(&self, chat_id: &str) -> Result<Vec<Message>, ClientError>;

    /// Persist a message and return the stored representation.
    async fn post_message(
        &self,
        chat_id: &str,
        message: &NewMessage,
    ) -> Result<Message, ClientError>;

    /// Run the agent on a task and return its step results.
    async fn run_agent(&self, task: &AgentTask) -> Result<AgentRun, ClientError>;
}
