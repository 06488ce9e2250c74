//! Prelude module for commonly used types and traits.
//!
//! Import everything a capability provider implementation needs with
//! `use did_bridge_core::prelude::*`.

// Re-export error types
pub use crate::error::{Error, ErrorCode, Result};

// Re-export capability traits
pub use crate::provider::{
    CapabilityProvider, LedgerAdapter, NativeCredential, NativeDocument, NativeIssuer,
    ProviderError, ProviderResult,
};

// Re-export shared types
pub use crate::types::{
    ChannelId, CredentialEntry, CredentialRequest, DocumentEdit, Handle, Identity,
    IdentityFilter, ObjectKind, ParsedJwt, PresentationStatus, PrivateIdentityRequest,
    PublicKeyInfo, Service, Target, TransactionEvent, TransactionOutcome,
};

// Re-export envelopes and the handle table
pub use crate::envelope::{CommandEnvelope, Delivery, ObjectRef, Reply};
pub use crate::handle::HandleTable;
