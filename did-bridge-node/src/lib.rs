//! Asynchronous runtime for the DID bridge.
//!
//! This crate turns the handle table and capability traits of
//! `did-bridge-core` into a running bridge:
//! - Receive command envelopes and run them on a bounded worker pool
//! - Park publishes until the caller answers the transaction event
//! - Resolve DIDs over JSON-RPC
//! - Deliver exactly one reply per command, or a stream of listener events
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//! - `bridge`: the runtime that accepts commands and queues deliveries
//! - `dispatch`: the operation table and per-operation handlers
//! - `adapter`: transaction correlation and the per-store ledger hook
//! - `resolver`: HTTP DID resolution
//! - `channel`: the delivery outbox
//! - `config`: runtime configuration
//! - `memory`: an in-memory capability provider for tests and demos
//! - `logging`: `tracing` subscriber setup
//! - `error`: setup errors
//!
//! # Examples
//!
//! ```rust,no_run
//! use did_bridge_core::{ChannelId, CommandEnvelope};
//! use did_bridge_node::{memory::MemoryProvider, Bridge, BridgeConfig};
//! use serde_json::json;
//!
//! async fn example() -> did_bridge_node::Result<()> {
//!     did_bridge_node::logging::init();
//!     let (bridge, _inbox) = Bridge::new(BridgeConfig::default(), MemoryProvider::new())?;
//!
//!     let store = bridge
//!         .execute(CommandEnvelope::manager("initDidStore", vec![json!("alice")], ChannelId(1)))
//!         .await;
//!     println!("{}", serde_json::to_string(&store)?);
//!     Ok(())
//! }
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod adapter;
pub mod bridge;
pub mod channel;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod logging;
pub mod memory;
pub mod resolver;

#[cfg(test)]
mod tests;

// Re-export main types for convenience
pub use adapter::{StoreAdapter, TransactionHub};
pub use bridge::Bridge;
pub use channel::{Inbox, Outbox};
pub use config::BridgeConfig;
pub use dispatch::{Dispatcher, Operation, OPERATIONS};
pub use error::{Error, Result};
