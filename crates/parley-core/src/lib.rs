//! Shared data model, configuration, and errors for the Parley chat client.

pub mod config;
pub mod error;
pub mod types;

pub use config::{BackendConfig, GeneralConfig, ParleyConfig, DEFAULT_BASE_URL};
pub use error::{ParleyError, Result};
pub use types::*;
