//! Session state and the resolve transition.
//!
//! A session is either anonymous (no user, empty chat list) or resolved
//! (user and chat list set together). Resolution is split into
//! [`SessionState::begin_resolve`] and [`SessionState::finish_resolve`] so
//! the network round trips can run without holding the state.

use parley_client::ClientError;
use parley_core::{Chat, User};

use crate::creation::CreateForm;
use crate::error::{SessionError, ValidationError};
use crate::generation::{Generation, GenerationCounter};
use crate::search::{SearchOverlay, SearchResults};

/// Everything the list side of the client holds between requests.
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    pub(crate) user: Option<User>,
    pub(crate) chats: Vec<Chat>,
    pub(crate) error: Option<String>,
    pub(crate) resolving: bool,
    pub(crate) resolves: GenerationCounter,
    /// Bumped whenever user and chat list are replaced or cleared. Search and
    /// create requests issued under an older epoch are dropped on arrival.
    pub(crate) epoch: GenerationCounter,
    pub(crate) search: SearchOverlay,
    pub(crate) create: CreateForm,
}

/// Issued by [`SessionState::begin_resolve`]; carries the trimmed email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolveTicket {
    pub(crate) generation: Generation,
    pub(crate) email: String,
}

impl ResolveTicket {
    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }
}

/// What the chat list area should show.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListView<'a> {
    /// No user resolved yet.
    SignedOut,
    /// The full chat list (possibly empty).
    Chats(&'a [Chat]),
    /// A non-empty search result set shadowing the chat list.
    SearchResults { query: &'a str, chats: &'a [Chat] },
    /// A present but empty result set; offer to load all chats.
    NoSearchResults { query: &'a str },
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    pub fn chats(&self) -> &[Chat] {
        &self.chats
    }

    pub fn is_signed_in(&self) -> bool {
        self.user.is_some()
    }

    /// Last session error (validation or resolution failure).
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_resolving(&self) -> bool {
        self.resolving
    }

    pub fn search(&self) -> &SearchOverlay {
        &self.search
    }

    pub fn create_form(&self) -> &CreateForm {
        &self.create
    }

    /// Search results when present (even if empty), otherwise the chat list.
    pub fn displayed_chats(&self) -> &[Chat] {
        match &self.search.results {
            Some(results) => &results.chats,
            None => &self.chats,
        }
    }

    pub fn list_view(&self) -> ListView<'_> {
        match &self.search.results {
            Some(SearchResults { query, chats }) if chats.is_empty() => {
                ListView::NoSearchResults { query }
            }
            Some(SearchResults { query, chats }) => ListView::SearchResults { query, chats },
            None if self.user.is_none() => ListView::SignedOut,
            None => ListView::Chats(&self.chats),
        }
    }

    /// Validate the email and mark a resolution in flight.
    ///
    /// An empty email is recorded as the session error; nothing else changes.
    pub fn begin_resolve(&mut self, email: &str) -> Result<ResolveTicket, ValidationError> {
        let email = email.trim();
        if email.is_empty() {
            self.error = Some(ValidationError::EmptyEmail.to_string());
            return Err(ValidationError::EmptyEmail);
        }

        let generation = self.resolves.issue();
        self.resolving = true;
        self.error = None;
        tracing::debug!(%generation, "Session resolve started");
        Ok(ResolveTicket {
            generation,
            email: email.to_string(),
        })
    }

    /// Apply the outcome of a resolution.
    ///
    /// Success replaces user and chat list together and drops any search
    /// overlay. Failure clears both. A ticket that is no longer the latest
    /// changes nothing and yields [`SessionError::Superseded`].
    pub fn finish_resolve(
        &mut self,
        ticket: &ResolveTicket,
        result: Result<(User, Vec<Chat>), ClientError>,
    ) -> Result<User, SessionError> {
        if !self.resolves.is_current(ticket.generation) {
            tracing::debug!(generation = %ticket.generation, "Dropping stale session resolve");
            return Err(SessionError::Superseded);
        }

        self.resolving = false;
        self.epoch.invalidate();
        self.search.reset();
        self.create.reset();

        match result {
            Ok((user, chats)) => {
                tracing::info!(
                    user_id = %user.user_id,
                    chats = chats.len(),
                    "Session resolved"
                );
                self.user = Some(user.clone());
                self.chats = chats;
                self.error = None;
                Ok(user)
            }
            Err(err) => {
                tracing::warn!(error = %err, "Session resolve failed");
                self.user = None;
                self.chats.clear();
                self.error = Some(err.to_string());
                Err(err.into())
            }
        }
    }
}
