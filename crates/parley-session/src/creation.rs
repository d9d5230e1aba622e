//! Chat creation form.

use parley_client::ClientError;
use parley_core::{Chat, NewChat};

use crate::error::{SessionError, ValidationError};
use crate::generation::Generation;
use crate::session::SessionState;

/// State of the "new chat" form.
#[derive(Debug, Clone, Default)]
pub struct CreateForm {
    pub(crate) open: bool,
    pub(crate) name: String,
    pub(crate) error: Option<String>,
    pub(crate) pending: usize,
}

impl CreateForm {
    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_creating(&self) -> bool {
        self.pending > 0
    }

    pub(crate) fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Issued by [`SessionState::begin_create`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateTicket {
    pub(crate) epoch: Generation,
    pub(crate) request: NewChat,
}

impl CreateTicket {
    pub fn request(&self) -> &NewChat {
        &self.request
    }
}

impl SessionState {
    /// Show or hide the form. Hiding keeps the typed name.
    pub fn toggle_create_form(&mut self) -> bool {
        self.create.open = !self.create.open;
        self.create.open
    }

    pub fn cancel_create(&mut self) {
        self.create.open = false;
        self.create.error = None;
    }

    pub fn set_chat_name(&mut self, name: impl Into<String>) {
        self.create.name = name.into();
    }

    /// Validate the form (or `name`, when given) and mark a create in flight.
    pub fn begin_create(&mut self, name: Option<&str>) -> Result<CreateTicket, ValidationError> {
        if let Some(name) = name {
            self.create.name = name.to_string();
        }

        let name = self.create.name.trim();
        let checked = match self.user.as_ref() {
            None => Err(ValidationError::SignInRequired),
            Some(_) if name.is_empty() => Err(ValidationError::EmptyChatName),
            Some(user) => Ok(NewChat {
                user_id: user.user_id.clone(),
                name: name.to_string(),
            }),
        };
        let request = match checked {
            Ok(request) => request,
            Err(err) => {
                self.create.error = Some(err.to_string());
                return Err(err);
            }
        };
        self.create.pending += 1;
        self.create.error = None;
        tracing::debug!(name = %request.name, "Chat creation started");
        Ok(CreateTicket {
            epoch: self.epoch.current(),
            request,
        })
    }

    /// Apply a create outcome. Success appends the chat at the end of the
    /// list and closes the form; failure keeps the form and its name.
    pub fn finish_create(
        &mut self,
        ticket: &CreateTicket,
        result: Result<Chat, ClientError>,
    ) -> Result<Chat, SessionError> {
        if !self.epoch.is_current(ticket.epoch) {
            tracing::debug!(name = %ticket.request.name, "Dropping chat created for a previous session");
            return Err(SessionError::Superseded);
        }

        self.create.pending = self.create.pending.saturating_sub(1);
        match result {
            Ok(chat) => {
                tracing::info!(chat_id = %chat.chat_id, "Chat created");
                self.chats.push(chat.clone());
                self.create.name.clear();
                self.create.open = false;
                self.create.error = None;
                Ok(chat)
            }
            Err(err) => {
                tracing::warn!(error = %err, "Chat creation failed");
                self.create.error = Some(err.to_string());
                Err(err.into())
            }
        }
    }
}
