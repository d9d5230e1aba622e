//! Transport layer for the Parley chat backend.
//!
//! [`ChatBackend`] is the seam the session controllers talk to.
//! [`HttpBackend`] speaks the service's HTTP+JSON contract; [`MockBackend`]
//! is an in-memory stand-in with failure injection for tests and demos.

pub mod backend;
pub mod endpoint;
pub mod error;
pub mod http;
pub mod mock;

pub use backend::{ChatBackend, Operation, OperationKind};
pub use endpoint::{normalize_base_url, BackendUrl};
pub use error::ClientError;
pub use http::HttpBackend;
pub use mock::MockBackend;
