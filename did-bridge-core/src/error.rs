//! Error types for the did-bridge-core crate.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{Handle, ObjectKind};

/// Error type for the bridge.
#[derive(Debug, Error)]
pub enum Error {
    /// The operation received the wrong number of arguments.
    #[error("{operation}: {expected} parameters are expected, got {actual}")]
    InvalidArgumentCount {
        /// The operation name.
        operation: String,
        /// Declared arity.
        expected: usize,
        /// Number of arguments received.
        actual: usize,
    },
    /// An argument had the wrong type or format.
    #[error("argument {index}: expected {expected}")]
    InvalidArgumentType {
        /// Zero-based argument position.
        index: usize,
        /// What was expected at that position.
        expected: String,
    },
    /// A handle is unknown, released, or of another kind.
    #[error("no live {kind} for handle {handle}")]
    HandleNotFound {
        /// The kind the handle was resolved against.
        kind: ObjectKind,
        /// The raw handle.
        handle: Handle,
    },
    /// The store is missing, or the object is not attached to one.
    #[error("store not found: {0}")]
    StoreNotFound(String),
    /// The document is missing.
    #[error("document not found: {0}")]
    DocumentNotFound(String),
    /// The credential is missing.
    #[error("credential not found: {0}")]
    CredentialNotFound(String),
    /// No transaction result arrived before the deadline.
    #[error("transaction {0} timed out")]
    TransactionTimeout(String),
    /// A transaction result named an unknown or already settled correlation id.
    #[error("no pending transaction for correlation id {0}")]
    TransactionCorrelationMismatch(String),
    /// A publish was attempted while no transaction listener is registered.
    #[error("no transaction listener registered")]
    NoTransactionListener,
    /// The operation does not exist for the target.
    #[error("operation '{operation}' not found for target {target}")]
    UnknownOperation {
        /// The target the operation was sent to.
        target: String,
        /// The operation name.
        operation: String,
    },
    /// The store password was rejected.
    #[error("wrong password")]
    WrongPassword,
    /// The capability provider failed.
    #[error("{0}")]
    Provider(String),
    /// Serialization error
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    /// Anything else.
    #[error("{0}")]
    Unspecified(String),
}

/// Stable, machine-checkable error codes carried on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCode {
    /// See [`Error::InvalidArgumentCount`].
    InvalidArgumentCount,
    /// See [`Error::InvalidArgumentType`].
    InvalidArgumentType,
    /// See [`Error::HandleNotFound`].
    HandleNotFound,
    /// See [`Error::StoreNotFound`].
    StoreNotFound,
    /// See [`Error::DocumentNotFound`].
    DocumentNotFound,
    /// See [`Error::CredentialNotFound`].
    CredentialNotFound,
    /// See [`Error::TransactionTimeout`].
    TransactionTimeout,
    /// See [`Error::TransactionCorrelationMismatch`].
    TransactionCorrelationMismatch,
    /// See [`Error::NoTransactionListener`].
    NoTransactionListener,
    /// See [`Error::UnknownOperation`].
    UnknownOperation,
    /// See [`Error::WrongPassword`].
    WrongPassword,
    /// See [`Error::Provider`].
    ProviderError,
    /// Everything that fits nowhere else.
    Unspecified,
}

impl Error {
    /// Returns the wire code of this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::InvalidArgumentCount { .. } => ErrorCode::InvalidArgumentCount,
            Self::InvalidArgumentType { .. } => ErrorCode::InvalidArgumentType,
            Self::HandleNotFound { .. } => ErrorCode::HandleNotFound,
            Self::StoreNotFound(_) => ErrorCode::StoreNotFound,
            Self::DocumentNotFound(_) => ErrorCode::DocumentNotFound,
            Self::CredentialNotFound(_) => ErrorCode::CredentialNotFound,
            Self::TransactionTimeout(_) => ErrorCode::TransactionTimeout,
            Self::TransactionCorrelationMismatch(_) => ErrorCode::TransactionCorrelationMismatch,
            Self::NoTransactionListener => ErrorCode::NoTransactionListener,
            Self::UnknownOperation { .. } => ErrorCode::UnknownOperation,
            Self::WrongPassword => ErrorCode::WrongPassword,
            Self::Provider(_) => ErrorCode::ProviderError,
            Self::Serialization(_) | Self::Unspecified(_) => ErrorCode::Unspecified,
        }
    }

    /// Shorthand for [`Error::InvalidArgumentType`].
    pub fn invalid_argument(index: usize, expected: impl Into<String>) -> Self {
        Self::InvalidArgumentType {
            index,
            expected: expected.into(),
        }
    }
}

/// Result type for the bridge
pub type Result<T> = std::result::Result<T, Error>;
