//! Shared types for the dashboard gateway workspace

mod error;
mod secret;

pub use error::{Error, Result};
pub use secret::Secret;
