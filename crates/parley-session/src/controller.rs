//! Async controllers that drive the state transitions against a backend.
//!
//! Each operation locks the state only to begin or finish a step; the lock
//! is never held across a backend call, so overlapping operations are
//! allowed and resolved by generation tokens.

use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;
use parley_client::ChatBackend;
use parley_core::{AgentTask, Chat, Message, NewMessage, User};

use crate::error::SessionError;
use crate::exchange::ExchangeState;
use crate::session::SessionState;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// =============================================================================
// Session
// =============================================================================

/// Owns the session state (user, chat list, search overlay, create form).
pub struct SessionController<B: ChatBackend> {
    backend: Arc<B>,
    state: Mutex<SessionState>,
}

impl<B: ChatBackend> SessionController<B> {
    pub fn new(backend: Arc<B>) -> Self {
        Self {
            backend,
            state: Mutex::new(SessionState::new()),
        }
    }

    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    /// Copy of the current state.
    pub fn snapshot(&self) -> SessionState {
        lock(&self.state).clone()
    }

    /// Run `f` against the current state without copying it.
    pub fn with_state<R>(&self, f: impl FnOnce(&SessionState) -> R) -> R {
        f(&lock(&self.state))
    }

    pub fn displayed_chats(&self) -> Vec<Chat> {
        lock(&self.state).displayed_chats().to_vec()
    }

    /// Resolve `email` to a user, then load that user's chats.
    ///
    /// The chat list is requested only after the user lookup succeeded.
    pub async fn resolve(&self, email: &str) -> Result<User, SessionError> {
        let ticket = lock(&self.state).begin_resolve(email)?;

        let result = match self.backend.resolve_user(&ticket.email).await {
            Ok(user) => self
                .backend
                .list_chats(&ticket.email)
                .await
                .map(|chats| (user, chats)),
            Err(err) => Err(err),
        };

        lock(&self.state).finish_resolve(&ticket, result)
    }

    /// Search the signed-in user's chats. Returns the number of hits.
    pub async fn search(&self, query: &str) -> Result<usize, SessionError> {
        let ticket = lock(&self.state).begin_search(query)?;
        let result = self
            .backend
            .search_chats(&ticket.user_id, &ticket.query)
            .await;
        lock(&self.state).finish_search(&ticket, result)
    }

    pub fn clear_search(&self) {
        lock(&self.state).clear_search();
    }

    pub fn set_search_query(&self, query: impl Into<String>) {
        lock(&self.state).set_search_query(query);
    }

    pub fn toggle_create_form(&self) -> bool {
        lock(&self.state).toggle_create_form()
    }

    pub fn cancel_create(&self) {
        lock(&self.state).cancel_create();
    }

    pub fn set_chat_name(&self, name: impl Into<String>) {
        lock(&self.state).set_chat_name(name);
    }

    /// Create a chat named `name`, or the form's current name when `None`.
    pub async fn create_chat(&self, name: Option<&str>) -> Result<Chat, SessionError> {
        let ticket = lock(&self.state).begin_create(name)?;
        let result = self.backend.create_chat(&ticket.request).await;
        lock(&self.state).finish_create(&ticket, result)
    }
}

// =============================================================================
// Exchange
// =============================================================================

/// The two messages stored by a completed send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendOutcome {
    pub user_message: Message,
    pub agent_message: Message,
}

/// Owns the open chat's message log and runs the send protocol.
pub struct ExchangeController<B: ChatBackend> {
    backend: Arc<B>,
    state: Mutex<ExchangeState>,
}

impl<B: ChatBackend> ExchangeController<B> {
    pub fn new(backend: Arc<B>) -> Self {
        Self {
            backend,
            state: Mutex::new(ExchangeState::new()),
        }
    }

    pub fn snapshot(&self) -> ExchangeState {
        lock(&self.state).clone()
    }

    pub fn with_state<R>(&self, f: impl FnOnce(&ExchangeState) -> R) -> R {
        f(&lock(&self.state))
    }

    pub fn log(&self) -> Vec<Message> {
        lock(&self.state).log().to_vec()
    }

    pub fn set_input(&self, text: impl Into<String>) {
        lock(&self.state).set_input(text);
    }

    /// Open `chat_id`, replacing any log held for another chat.
    pub async fn open(&self, chat_id: &str) -> Result<usize, SessionError> {
        let ticket = lock(&self.state).begin_open(chat_id);
        let result = self.backend.fetch_messages(&ticket.chat_id).await;
        lock(&self.state).finish_open(&ticket, result)
    }

    pub fn close(&self) {
        lock(&self.state).close();
    }

    /// Send the current input buffer.
    pub async fn submit(&self) -> Result<SendOutcome, SessionError> {
        let text = lock(&self.state).input().to_string();
        self.send(&text).await
    }

    /// Store `text` as a user message, ask the agent, and store its reply.
    ///
    /// Each step waits for the previous one. A failed step ends the send and
    /// leaves whatever was already appended.
    pub async fn send(&self, text: &str) -> Result<SendOutcome, SessionError> {
        let ticket = lock(&self.state).begin_send(text)?;

        let outgoing = NewMessage::from_user(ticket.text.clone(), Utc::now());
        let result = self.backend.post_message(&ticket.chat_id, &outgoing).await;
        let user_message = lock(&self.state).user_message_stored(&ticket, result)?;

        let task = AgentTask {
            task: ticket.text.clone(),
        };
        let result = self.backend.run_agent(&task).await;
        let reply = lock(&self.state).agent_replied(&ticket, result)?;

        let outgoing = NewMessage::from_agent(reply, Utc::now());
        let result = self.backend.post_message(&ticket.chat_id, &outgoing).await;
        let agent_message = lock(&self.state).agent_message_stored(&ticket, result)?;

        tracing::info!(chat_id = %ticket.chat_id, generation = %ticket.generation, "Send completed");
        Ok(SendOutcome {
            user_message,
            agent_message,
        })
    }
}

// =============================================================================
// Tests
// =============================================================================
