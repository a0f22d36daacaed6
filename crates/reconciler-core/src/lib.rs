//! Reconciler Core - types, lifecycle protocol, and error handling

pub mod error;
pub mod protocol;
pub mod types;

pub use error::{tolerate_not_found, Error, Result};
pub use protocol::*;
pub use types::*;
