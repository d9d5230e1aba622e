use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Name shown for chats the backend stored without one.
pub const UNLABELED_CHAT: &str = "Unlabeled Chat";

/// Preview shown for chats with no messages.
pub const NO_MESSAGES_PREVIEW: &str = "No messages yet";

/// Reply stored when the agent finished without any usable content.
pub const FALLBACK_AGENT_REPLY: &str = "Agent response not available.";

/// Read an explicit `null` as the type's default. The service serializes
/// unset optional fields as `null` rather than omitting them.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

// =============================================================================
// Enums
// =============================================================================

/// Author of a chat message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sender {
    /// The signed-in person.
    User,
    /// The remote autonomous agent.
    Agent,
}

impl Sender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sender::User => "user",
            Sender::Agent => "agent",
        }
    }
}

impl std::fmt::Display for Sender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Users and chats
// =============================================================================

/// Identity resolved from an email address.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Backend identifier (the normalized email).
    pub user_id: String,
    /// Display name. The backend defaults it to the email.
    #[serde(default)]
    pub name: Option<String>,
    /// Chats owned by this user, in creation order.
    #[serde(default)]
    pub chat_ids: Vec<String>,
}

impl User {
    /// Name to greet the user with.
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or(&self.user_id)
    }
}

/// A conversation owned by a user.
///
/// Presence and typing indicators have no producer on the backend; they are
/// accepted from the wire when present and otherwise stay `false`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chat {
    pub chat_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, rename = "isOnline", deserialize_with = "null_as_default")]
    pub is_online: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub is_typing: bool,
    #[serde(default)]
    pub messages: Option<Vec<Message>>,
}

impl Chat {
    pub fn new(chat_id: impl Into<String>, name: Option<String>) -> Self {
        Self {
            chat_id: chat_id.into(),
            user_id: None,
            name,
            is_online: false,
            is_typing: false,
            messages: None,
        }
    }

    /// Name for list rows and headers.
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .filter(|name| !name.is_empty())
            .unwrap_or(UNLABELED_CHAT)
    }

    /// Most recent message, if the backend included any.
    pub fn last_message(&self) -> Option<&Message> {
        self.messages.as_ref().and_then(|messages| messages.last())
    }

    /// One-line preview of the latest message content.
    pub fn preview(&self) -> &str {
        self.last_message()
            .map(|message| message.content.as_str())
            .filter(|content| !content.is_empty())
            .unwrap_or(NO_MESSAGES_PREVIEW)
    }
}

// =============================================================================
// Messages
// =============================================================================

/// A stored message as returned by the backend.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub content: String,
    /// `None` for messages stored without a sender.
    #[serde(default)]
    pub sender: Option<Sender>,
    /// ISO-8601 timestamp assigned by the client that posted it; empty when
    /// the stored message has none.
    #[serde(default, deserialize_with = "null_as_default")]
    pub timestamp: String,
}

/// Body for `POST /chats/{chat_id}/messages`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewMessage {
    pub content: String,
    pub timestamp: String,
    pub sender: Sender,
}

impl NewMessage {
    pub fn new(sender: Sender, content: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self {
            content: content.into(),
            timestamp: iso_timestamp(at),
            sender,
        }
    }

    pub fn from_user(content: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self::new(Sender::User, content, at)
    }

    pub fn from_agent(content: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self::new(Sender::Agent, content, at)
    }
}

impl From<NewMessage> for Message {
    fn from(message: NewMessage) -> Self {
        Self {
            content: message.content,
            sender: Some(message.sender),
            timestamp: message.timestamp,
        }
    }
}

/// Body of `GET /chats/{chat_id}`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatHistory {
    #[serde(default)]
    pub chat_id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub messages: Option<Vec<Message>>,
}

impl ChatHistory {
    pub fn into_messages(self) -> Vec<Message> {
        self.messages.unwrap_or_default()
    }
}

/// Body for `POST /chats/`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewChat {
    pub user_id: String,
    pub name: String,
}

// =============================================================================
// Agent runs
// =============================================================================

/// Body for `POST /run-agent/`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentTask {
    pub task: String,
}

/// One step result reported by the agent runner.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentResult {
    /// The runner reports `null` for steps that never finished.
    #[serde(default, deserialize_with = "null_as_default")]
    pub is_done: bool,
    #[serde(default)]
    pub extracted_content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AgentResult {
    pub fn done(content: impl Into<String>) -> Self {
        Self {
            is_done: true,
            extracted_content: Some(content.into()),
            error: None,
        }
    }

    pub fn step(content: impl Into<String>) -> Self {
        Self {
            is_done: false,
            extracted_content: Some(content.into()),
            error: None,
        }
    }

    /// Content usable as a final reply: done and non-empty.
    pub fn final_content(&self) -> Option<&str> {
        if !self.is_done {
            return None;
        }
        self.extracted_content
            .as_deref()
            .filter(|content| !content.is_empty())
    }
}

/// Body of `POST /run-agent/`. The runner reports `results: null` when the
/// agent produced no history.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentRun {
    #[serde(default)]
    pub success: Option<bool>,
    #[serde(default)]
    pub results: Option<Vec<AgentResult>>,
}

impl AgentRun {
    pub fn from_results(results: Vec<AgentResult>) -> Self {
        Self {
            success: Some(!results.is_empty()),
            results: Some(results),
        }
    }

    pub fn results(&self) -> &[AgentResult] {
        self.results.as_deref().unwrap_or(&[])
    }

    /// The reply text: the last result that is done with non-empty content,
    /// or [`FALLBACK_AGENT_REPLY`].
    pub fn reply(&self) -> String {
        self.results()
            .iter()
            .rev()
            .find_map(AgentResult::final_content)
            .unwrap_or(FALLBACK_AGENT_REPLY)
            .to_string()
    }
}

/// Format a timestamp the way browsers serialize dates (millisecond
/// precision, `Z` suffix).
pub fn iso_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}
