//! In-memory chat backend.
//!
//! Mirrors the service's observable behavior (normalized emails, users
//! created on first lookup, "Unlabeled Chat" default names, substring
//! search scoped to the owner) and adds test hooks: injected failures and
//! per-call hold gates for forcing completion order.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use tokio::sync::Notify;
use uuid::Uuid;

use parley_core::{
    AgentResult, AgentRun, AgentTask, Chat, Message, NewChat, NewMessage, User, UNLABELED_CHAT,
};

use crate::backend::{ChatBackend, Operation, OperationKind};
use crate::error::ClientError;

#[derive(Default)]
struct MockState {
    users: HashMap<String, User>,
    chats: HashMap<String, Chat>,
    agent_runs: VecDeque<AgentRun>,
    failures: HashMap<OperationKind, usize>,
    always_failing: HashSet<OperationKind>,
    holds: HashMap<OperationKind, VecDeque<Arc<Notify>>>,
    calls: Vec<OperationKind>,
}

/// Scriptable in-memory [`ChatBackend`].
#[derive(Default)]
pub struct MockBackend {
    state: Mutex<MockState>,
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Register a user with an explicit display name.
    pub fn with_user(self, email: &str, name: &str) -> Self {
        let user_id = normalize_email(email);
        self.state().users.insert(
            user_id.clone(),
            User {
                user_id,
                name: Some(name.to_string()),
                chat_ids: Vec::new(),
            },
        );
        self
    }

    /// Store a chat for the user registered under `email` (creating the
    /// user if needed) and return its id.
    pub fn seed_chat(&self, email: &str, name: &str, messages: Vec<Message>) -> String {
        let user_id = normalize_email(email);
        let chat_id = Uuid::new_v4().to_string();
        let mut state = self.state();
        let user = state
            .users
            .entry(user_id.clone())
            .or_insert_with(|| new_user(&user_id));
        user.chat_ids.push(chat_id.clone());
        state.chats.insert(
            chat_id.clone(),
            Chat {
                user_id: Some(user_id),
                messages: Some(messages),
                ..Chat::new(chat_id.clone(), Some(name.to_string()))
            },
        );
        chat_id
    }

    /// Queue the response for the next agent run. Without a queued run the
    /// agent answers `Done: <task>`.
    pub fn script_agent(&self, run: AgentRun) {
        self.state().agent_runs.push_back(run);
    }

    /// Make the next call of `kind` fail with a 500.
    pub fn fail_next(&self, kind: OperationKind) {
        *self.state().failures.entry(kind).or_insert(0) += 1;
    }

    /// Make every call of `kind` fail until [`MockBackend::recover`].
    pub fn fail_always(&self, kind: OperationKind) {
        self.state().always_failing.insert(kind);
    }

    pub fn recover(&self, kind: OperationKind) {
        let mut state = self.state();
        state.always_failing.remove(&kind);
        state.failures.remove(&kind);
    }

    /// Park the next call of `kind` until the returned gate is notified.
    pub fn hold_next(&self, kind: OperationKind) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.state()
            .holds
            .entry(kind)
            .or_default()
            .push_back(Arc::clone(&gate));
        gate
    }

    /// Calls received so far, in arrival order.
    pub fn calls(&self) -> Vec<OperationKind> {
        self.state().calls.clone()
    }

    pub fn call_count(&self, kind: OperationKind) -> usize {
        self.state().calls.iter().filter(|k| **k == kind).count()
    }

    /// Messages stored server-side for a chat.
    pub fn stored_messages(&self, chat_id: &str) -> Vec<Message> {
        self.state()
            .chats
            .get(chat_id)
            .and_then(|chat| chat.messages.clone())
            .unwrap_or_default()
    }

    /// Record the call, wait on any hold gate, then apply injected failures.
    async fn enter(&self, operation: &Operation) -> Result<(), ClientError> {
        let kind = operation.kind();
        let gate = {
            let mut state = self.state();
            state.calls.push(kind);
            state.holds.get_mut(&kind).and_then(VecDeque::pop_front)
        };
        if let Some(gate) = gate {
            gate.notified().await;
        }

        let mut state = self.state();
        let injected = match state.failures.get_mut(&kind) {
            Some(remaining) if *remaining > 0 => {
                *remaining -= 1;
                true
            }
            _ => false,
        };
        if injected || state.always_failing.contains(&kind) {
            return Err(status(operation.clone(), 500));
        }
        Ok(())
    }
}

fn new_user(user_id: &str) -> User {
    User {
        user_id: user_id.to_string(),
        name: Some(user_id.to_string()),
        chat_ids: Vec::new(),
    }
}

fn status(operation: Operation, status: u16) -> ClientError {
    ClientError::Status { operation, status }
}

fn matches_query(chat: &Chat, needle: &str) -> bool {
    let name_hit = chat
        .name
        .as_deref()
        .is_some_and(|name| name.to_lowercase().contains(needle));
    let message_hit = chat.messages.as_ref().is_some_and(|messages| {
        messages
            .iter()
            .any(|message| message.content.to_lowercase().contains(needle))
    });
    name_hit || message_hit
}

#[async_trait]
impl ChatBackend for MockBackend {
    async fn resolve_user(&self, email: &str) -> Result<User, ClientError> {
        self.enter(&Operation::ResolveUser).await?;
        let user_id = normalize_email(email);
        let mut state = self.state();
        let user = state
            .users
            .entry(user_id.clone())
            .or_insert_with(|| new_user(&user_id));
        Ok(user.clone())
    }

    async fn list_chats(&self, email: &str) -> Result<Vec<Chat>, ClientError> {
        self.enter(&Operation::ListChats).await?;
        let user_id = normalize_email(email);
        let state = self.state();
        let user = state
            .users
            .get(&user_id)
            .ok_or_else(|| status(Operation::ListChats, 500))?;
        Ok(user
            .chat_ids
            .iter()
            .filter_map(|id| state.chats.get(id).cloned())
            .collect())
    }

    async fn search_chats(&self, user_id: &str, query: &str) -> Result<Vec<Chat>, ClientError> {
        self.enter(&Operation::SearchChats).await?;
        if query.trim().is_empty() {
            return Err(status(Operation::SearchChats, 400));
        }
        let needle = query.trim().to_lowercase();
        let state = self.state();
        let Some(user) = state.users.get(user_id) else {
            return Ok(Vec::new());
        };
        Ok(user
            .chat_ids
            .iter()
            .filter_map(|id| state.chats.get(id))
            .filter(|chat| matches_query(chat, &needle))
            .cloned()
            .collect())
    }

    async fn create_chat(&self, request: &NewChat) -> Result<Chat, ClientError> {
        self.enter(&Operation::CreateChat).await?;
        let mut state = self.state();
        let user = state
            .users
            .get_mut(&request.user_id)
            .ok_or_else(|| status(Operation::CreateChat, 500))?;
        let chat_id = Uuid::new_v4().to_string();
        user.chat_ids.push(chat_id.clone());

        let name = if request.name.is_empty() {
            UNLABELED_CHAT.to_string()
        } else {
            request.name.clone()
        };
        let chat = Chat {
            user_id: Some(request.user_id.clone()),
            messages: Some(Vec::new()),
            ..Chat::new(chat_id.clone(), Some(name))
        };
        state.chats.insert(chat_id, chat.clone());
        Ok(chat)
    }

    async fn fetch_messages(&self, chat_id: &str) -> Result<Vec<Message>, ClientError> {
        let operation = Operation::FetchMessages {
            chat_id: chat_id.to_string(),
        };
        self.enter(&operation).await?;
        let state = self.state();
        let chat = state
            .chats
            .get(chat_id)
            .ok_or_else(|| status(operation, 404))?;
        Ok(chat.messages.clone().unwrap_or_default())
    }

    async fn post_message(
        &self,
        chat_id: &str,
        message: &NewMessage,
    ) -> Result<Message, ClientError> {
        let operation = Operation::PostMessage {
            sender: message.sender,
        };
        self.enter(&operation).await?;
        let mut state = self.state();
        let chat = state
            .chats
            .get_mut(chat_id)
            .ok_or_else(|| status(operation, 404))?;
        let stored = Message::from(message.clone());
        chat.messages.get_or_insert_with(Vec::new).push(stored.clone());
        Ok(stored)
    }

    async fn run_agent(&self, task: &AgentTask) -> Result<AgentRun, ClientError> {
        self.enter(&Operation::RunAgent).await?;
        let scripted = self.state().agent_runs.pop_front();
        Ok(scripted.unwrap_or_else(|| {
            AgentRun::from_results(vec![AgentResult::done(format!("Done: {}", task.task))])
        }))
    }
}
