//! Message exchange state for the open chat.
//!
//! Valid phase transitions:
//! - Idle -> LoadingHistory (open a chat)
//! - LoadingHistory -> Idle (history loaded or failed)
//! - Idle -> PostingUserMessage (send)
//! - PostingUserMessage -> AwaitingAgent (user message stored)
//! - AwaitingAgent -> PostingAgentMessage (agent replied)
//! - PostingAgentMessage -> Idle (agent message stored)
//! - PostingUserMessage -> Idle, AwaitingAgent -> Idle (step failed)
//!
//! Failures never roll back messages already appended by the same send.

use std::fmt;

use parley_client::ClientError;
use parley_core::{AgentRun, Message};

use crate::error::{SessionError, ValidationError};
use crate::generation::{Generation, GenerationCounter};

/// Where the open chat is in its open/send protocol.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ExchangePhase {
    /// Nothing in flight.
    #[default]
    Idle,
    /// Fetching the chat's stored messages.
    LoadingHistory,
    /// Persisting the typed message.
    PostingUserMessage,
    /// Waiting for the agent run to finish.
    AwaitingAgent,
    /// Persisting the agent's reply.
    PostingAgentMessage,
}

impl fmt::Display for ExchangePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExchangePhase::Idle => write!(f, "Idle"),
            ExchangePhase::LoadingHistory => write!(f, "LoadingHistory"),
            ExchangePhase::PostingUserMessage => write!(f, "PostingUserMessage"),
            ExchangePhase::AwaitingAgent => write!(f, "AwaitingAgent"),
            ExchangePhase::PostingAgentMessage => write!(f, "PostingAgentMessage"),
        }
    }
}

impl ExchangePhase {
    /// Returns whether a transition from `self` to `target` is valid.
    pub fn can_transition_to(&self, target: &ExchangePhase) -> bool {
        matches!(
            (self, target),
            (ExchangePhase::Idle, ExchangePhase::LoadingHistory)
                | (ExchangePhase::LoadingHistory, ExchangePhase::Idle)
                | (ExchangePhase::Idle, ExchangePhase::PostingUserMessage)
                | (ExchangePhase::PostingUserMessage, ExchangePhase::AwaitingAgent)
                | (ExchangePhase::AwaitingAgent, ExchangePhase::PostingAgentMessage)
                | (ExchangePhase::PostingAgentMessage, ExchangePhase::Idle)
                // Step failures
                | (ExchangePhase::PostingUserMessage, ExchangePhase::Idle)
                | (ExchangePhase::AwaitingAgent, ExchangePhase::Idle)
        )
    }

    pub fn is_busy(&self) -> bool {
        *self != ExchangePhase::Idle
    }
}

/// Issued by [`ExchangeState::begin_open`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenTicket {
    pub(crate) epoch: Generation,
    pub(crate) chat_id: String,
}

impl OpenTicket {
    pub fn chat_id(&self) -> &str {
        &self.chat_id
    }
}

/// Issued by [`ExchangeState::begin_send`]; carries the text as typed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendTicket {
    pub(crate) epoch: Generation,
    pub(crate) generation: Generation,
    pub(crate) chat_id: String,
    pub(crate) text: String,
}

impl SendTicket {
    pub fn chat_id(&self) -> &str {
        &self.chat_id
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }
}

/// The open chat's message log and send protocol state.
///
/// The epoch changes on every open and close. Results carrying an older
/// epoch belong to a chat that is no longer shown and are dropped. Among
/// sends in the same epoch only the latest drives the phase and the error
/// slot; earlier ones still append what they store, since the log is
/// append-only.
#[derive(Debug, Clone, Default)]
pub struct ExchangeState {
    pub(crate) chat_id: Option<String>,
    pub(crate) log: Vec<Message>,
    pub(crate) phase: ExchangePhase,
    pub(crate) input: String,
    pub(crate) error: Option<String>,
    pub(crate) epoch: GenerationCounter,
    pub(crate) sends: GenerationCounter,
}

impl ExchangeState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn chat_id(&self) -> Option<&str> {
        self.chat_id.as_deref()
    }

    pub fn log(&self) -> &[Message] {
        &self.log
    }

    pub fn phase(&self) -> ExchangePhase {
        self.phase
    }

    pub fn is_loading(&self) -> bool {
        self.phase.is_busy()
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn set_input(&mut self, text: impl Into<String>) {
        self.input = text.into();
    }

    fn transition(&mut self, target: ExchangePhase) -> Result<(), SessionError> {
        if !self.phase.can_transition_to(&target) {
            return Err(SessionError::InvalidTransition(self.phase, target));
        }
        tracing::debug!("Exchange phase: {} -> {}", self.phase, target);
        self.phase = target;
        Ok(())
    }

    /// Jump to `target` regardless of the current phase, abandoning
    /// whatever was in flight.
    fn force(&mut self, target: ExchangePhase) {
        if self.phase != target {
            tracing::debug!("Exchange phase forced: {} -> {}", self.phase, target);
        }
        self.phase = target;
    }

    /// Discard the current log and start loading `chat_id`.
    pub fn begin_open(&mut self, chat_id: &str) -> OpenTicket {
        let epoch = self.epoch.issue();
        self.chat_id = Some(chat_id.to_string());
        self.log.clear();
        self.input.clear();
        self.error = None;
        self.force(ExchangePhase::LoadingHistory);
        tracing::debug!(chat_id, %epoch, "Opening chat");
        OpenTicket {
            epoch,
            chat_id: chat_id.to_string(),
        }
    }

    /// Replace the log with the fetched history.
    pub fn finish_open(
        &mut self,
        ticket: &OpenTicket,
        result: Result<Vec<Message>, ClientError>,
    ) -> Result<usize, SessionError> {
        if !self.epoch.is_current(ticket.epoch) {
            tracing::debug!(chat_id = %ticket.chat_id, "Dropping history for a chat no longer open");
            return Err(SessionError::Superseded);
        }

        self.transition(ExchangePhase::Idle)?;
        match result {
            Ok(messages) => {
                tracing::info!(chat_id = %ticket.chat_id, messages = messages.len(), "Chat opened");
                self.log = messages;
                Ok(self.log.len())
            }
            Err(err) => {
                tracing::warn!(chat_id = %ticket.chat_id, error = %err, "Chat history failed to load");
                self.error = Some(err.to_string());
                Err(err.into())
            }
        }
    }

    /// Discard the open chat and its log.
    pub fn close(&mut self) {
        if let Some(chat_id) = self.chat_id.take() {
            tracing::debug!(%chat_id, "Closing chat");
        }
        self.epoch.invalidate();
        self.log.clear();
        self.input.clear();
        self.error = None;
        self.force(ExchangePhase::Idle);
    }

    /// Validate `text` and start a send.
    ///
    /// Empty text is a no-op. A send started while another is in flight
    /// takes over the phase.
    pub fn begin_send(&mut self, text: &str) -> Result<SendTicket, SessionError> {
        if text.trim().is_empty() {
            return Err(ValidationError::EmptyMessage.into());
        }
        let Some(chat_id) = self.chat_id.clone() else {
            return Err(SessionError::NoChatOpen);
        };
        if self.phase == ExchangePhase::LoadingHistory {
            return Err(SessionError::InvalidTransition(
                self.phase,
                ExchangePhase::PostingUserMessage,
            ));
        }

        let generation = self.sends.issue();
        self.force(ExchangePhase::PostingUserMessage);
        self.error = None;
        tracing::debug!(%chat_id, %generation, "Send started");
        Ok(SendTicket {
            epoch: self.epoch.current(),
            generation,
            chat_id,
            text: text.to_string(),
        })
    }

    /// Check that `ticket` still belongs to the open chat; report whether it
    /// is the latest send.
    fn check_send(&self, ticket: &SendTicket) -> Result<bool, SessionError> {
        if !self.epoch.is_current(ticket.epoch) {
            tracing::debug!(generation = %ticket.generation, "Dropping send for a chat no longer open");
            return Err(SessionError::Superseded);
        }
        Ok(self.sends.is_current(ticket.generation))
    }

    /// Record a failed step. Only the latest send touches phase and error.
    fn fail_send(&mut self, latest: bool, err: ClientError) -> SessionError {
        tracing::warn!(error = %err, "Send step failed");
        if latest {
            self.force(ExchangePhase::Idle);
            self.error = Some(err.to_string());
        }
        err.into()
    }

    /// Step 1 finished: append the stored user message and clear the input.
    pub fn user_message_stored(
        &mut self,
        ticket: &SendTicket,
        result: Result<Message, ClientError>,
    ) -> Result<Message, SessionError> {
        let latest = self.check_send(ticket)?;
        let message = result.map_err(|err| self.fail_send(latest, err))?;
        self.log.push(message.clone());
        if latest {
            self.input.clear();
            self.transition(ExchangePhase::AwaitingAgent)?;
        }
        Ok(message)
    }

    /// Steps 2 and 3: the agent run finished; pick the reply text.
    pub fn agent_replied(
        &mut self,
        ticket: &SendTicket,
        result: Result<AgentRun, ClientError>,
    ) -> Result<String, SessionError> {
        let latest = self.check_send(ticket)?;
        let run = result.map_err(|err| self.fail_send(latest, err))?;
        let reply = run.reply();
        tracing::debug!(results = run.results().len(), "Agent replied");
        if latest {
            self.transition(ExchangePhase::PostingAgentMessage)?;
        }
        Ok(reply)
    }

    /// Step 4 finished: append the stored agent message.
    pub fn agent_message_stored(
        &mut self,
        ticket: &SendTicket,
        result: Result<Message, ClientError>,
    ) -> Result<Message, SessionError> {
        let latest = self.check_send(ticket)?;
        let message = result.map_err(|err| self.fail_send(latest, err))?;
        self.log.push(message.clone());
        if latest {
            self.transition(ExchangePhase::Idle)?;
        }
        Ok(message)
    }
}

// =============================================================================
// Tests
// =============================================================================
