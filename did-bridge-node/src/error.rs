//! Error types for the did-bridge-node crate.
//!
//! Command failures never surface here; they are marshalled into result
//! envelopes. These errors cover setting the runtime up.

use thiserror::Error;

/// The main error type for did-bridge-node operations.
#[derive(Error, Debug)]
pub enum Error {
    /// An error from the core crate.
    #[error("Core error: {0}")]
    Core(#[from] did_bridge_core::Error),

    /// The HTTP client could not be built.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The bridge configuration is invalid.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// An error occurred during serialization or deserialization.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// A specialized Result type for did-bridge-node operations.
pub type Result<T> = std::result::Result<T, Error>;
