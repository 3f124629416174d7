//! The `utils` module provides the pieces shared across the relay:
//! the crate-wide error type and logging initialization.

pub mod error;
pub mod logging;

pub use error::{RelayError, Result};
