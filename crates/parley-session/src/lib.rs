//! Conversation session controller.
//!
//! [`SessionState`] holds the signed-in user, their chat list, the search
//! overlay and the create form. [`ExchangeState`] holds the open chat's
//! message log and drives the send protocol. Every operation is split into a
//! `begin` step that validates input and issues a ticket, and a `finish`
//! step that applies the backend result carried by that ticket. Tickets
//! carry generation tokens so that late results are dropped rather than
//! overwriting newer state.
//!
//! [`SessionController`] and [`ExchangeController`] run those steps against
//! any [`parley_client::ChatBackend`].

pub mod controller;
pub mod creation;
pub mod error;
pub mod exchange;
pub mod generation;
pub mod search;
pub mod session;

pub use controller::{ExchangeController, SendOutcome, SessionController};
pub use creation::{CreateForm, CreateTicket};
pub use error::{SessionError, ValidationError};
pub use exchange::{ExchangePhase, ExchangeState, OpenTicket, SendTicket};
pub use generation::{Generation, GenerationCounter};
pub use search::{SearchOverlay, SearchResults, SearchTicket};
pub use session::{ListView, ResolveTicket, SessionState};
