//! Shared types for the federated login workspace
//!
//! `Secret` wraps token material so it never reaches logs, and `Error` covers
//! configuration loading for the gateway binary.

mod error;
mod secret;

pub use error::{Error, Result};
pub use secret::Secret;
