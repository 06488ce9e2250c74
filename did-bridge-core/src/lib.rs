//! Core of the DID bridge.
//!
//! This crate holds everything the bridge runtime needs that is independent of
//! threading and transport:
//! - `handle`: the handle table that owns native objects on the caller's behalf
//! - `provider`: capability traits the native DID SDK is reached through
//! - `envelope`: command and result envelopes exchanged with the caller
//! - `args`: positional argument checking for command handlers
//! - `types`: shared type definitions
//! - `error`: the error type and its stable wire codes
//!
//! # Examples
//!
//! ```rust
//! use did_bridge_core::{HandleTable, ObjectKind};
//!
//! let table: HandleTable<String, String, String, String> = HandleTable::new();
//! let store = table.insert_store("/data/alice".to_string(), "alice");
//! let doc = table
//!     .insert_document("doc".to_string(), Some(store), "did:example:alice")
//!     .unwrap();
//!
//! // Releasing the store takes its documents with it.
//! assert_eq!(table.release(ObjectKind::Store, store).unwrap(), 2);
//! assert!(table.documents().get(doc).is_err());
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod args;
pub mod envelope;
pub mod error;
pub mod handle;
pub mod prelude;
pub mod provider;
pub mod types;


pub use args::Args;
pub use envelope::{CommandEnvelope, Delivery, ObjectRef, Reply};
pub use error::{Error, ErrorCode, Result};
pub use handle::{HandleTable, Resolved, SubTable};
pub use provider::{
    CapabilityProvider, LedgerAdapter, NativeCredential, NativeDocument, NativeIssuer,
    ProviderError, ProviderResult,
};
pub use types::{ChannelId, Handle, ObjectKind, Target};
