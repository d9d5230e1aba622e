//! Search overlay over the resolved chat list.

use parley_client::ClientError;
use parley_core::Chat;

use crate::error::{SessionError, ValidationError};
use crate::generation::{Generation, GenerationCounter};
use crate::session::SessionState;

/// A completed search. Shadows the chat list while present, even when empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchResults {
    pub(crate) query: String,
    pub(crate) chats: Vec<Chat>,
}

impl SearchResults {
    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn chats(&self) -> &[Chat] {
        &self.chats
    }

    pub fn is_empty(&self) -> bool {
        self.chats.is_empty()
    }
}

#[derive(Debug, Clone, Default)]
pub struct SearchOverlay {
    pub(crate) query: String,
    pub(crate) results: Option<SearchResults>,
    pub(crate) error: Option<String>,
    pub(crate) searching: bool,
    pub(crate) searches: GenerationCounter,
}

impl SearchOverlay {
    /// Pending query text.
    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn results(&self) -> Option<&SearchResults> {
        self.results.as_ref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_searching(&self) -> bool {
        self.searching
    }

    /// Drop results, query and error; in-flight searches become stale.
    pub(crate) fn reset(&mut self) {
        self.query.clear();
        self.results = None;
        self.error = None;
        self.searching = false;
        self.searches.invalidate();
    }
}

/// Issued by [`SessionState::begin_search`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchTicket {
    pub(crate) generation: Generation,
    pub(crate) epoch: Generation,
    pub(crate) user_id: String,
    pub(crate) query: String,
}

impl SearchTicket {
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn query(&self) -> &str {
        &self.query
    }
}

impl SessionState {
    pub fn set_search_query(&mut self, query: impl Into<String>) {
        self.search.query = query.into();
    }

    /// Validate a search and mark it in flight.
    ///
    /// Rejections leave the overlay untouched.
    pub fn begin_search(&mut self, query: &str) -> Result<SearchTicket, SessionError> {
        let Some(user) = self.user.as_ref() else {
            return Err(SessionError::NoSession);
        };
        let trimmed = query.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::EmptyQuery.into());
        }

        let ticket = SearchTicket {
            generation: self.search.searches.issue(),
            epoch: self.epoch.current(),
            user_id: user.user_id.clone(),
            query: trimmed.to_string(),
        };
        self.search.query = query.to_string();
        self.search.searching = true;
        self.search.error = None;
        tracing::debug!(generation = %ticket.generation, query = %ticket.query, "Chat search started");
        Ok(ticket)
    }

    /// Apply a search outcome. Failures keep the previous results.
    pub fn finish_search(
        &mut self,
        ticket: &SearchTicket,
        result: Result<Vec<Chat>, ClientError>,
    ) -> Result<usize, SessionError> {
        if !self.epoch.is_current(ticket.epoch) || !self.search.searches.is_current(ticket.generation)
        {
            tracing::debug!(generation = %ticket.generation, "Dropping stale chat search");
            return Err(SessionError::Superseded);
        }

        self.search.searching = false;
        match result {
            Ok(chats) => {
                let found = chats.len();
                tracing::info!(query = %ticket.query, found, "Chat search finished");
                self.search.results = Some(SearchResults {
                    query: ticket.query.clone(),
                    chats,
                });
                self.search.error = None;
                Ok(found)
            }
            Err(err) => {
                tracing::warn!(query = %ticket.query, error = %err, "Chat search failed");
                self.search.error = Some(err.to_string());
                Err(err.into())
            }
        }
    }

    /// Remove the result set so the chat list shows again.
    pub fn clear_search(&mut self) {
        self.search.reset();
        tracing::debug!("Chat search cleared");
    }
}
