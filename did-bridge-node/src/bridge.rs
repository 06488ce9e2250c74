//! The bridge runtime.
//!
//! [`Bridge`] accepts [`CommandEnvelope`]s from the caller, runs them on a
//! bounded worker pool and pushes one [`Delivery`] per command into the
//! outbox. Control operations (`setTransactionResult`, `setListener`,
//! `release`, `reset`, `getVersion`) skip the pool, so a pool full of parked
//! publishes can always be answered.
//!
//! # Examples
//!
//! ```rust,no_run
//! use did_bridge_core::{ChannelId, CommandEnvelope};
//! use did_bridge_node::{memory::MemoryProvider, Bridge, BridgeConfig};
//! use serde_json::json;
//!
//! async fn example() -> did_bridge_node::Result<()> {
//!     let (bridge, mut inbox) = Bridge::new(BridgeConfig::default(), MemoryProvider::new())?;
//!
//!     bridge.submit(CommandEnvelope::manager(
//!         "initDidStore",
//!         vec![json!("alice")],
//!         ChannelId(1),
//!     ));
//!
//!     while let Some(delivery) = inbox.recv().await {
//!         println!("{}", serde_json::to_string(&delivery)?);
//!     }
//!     Ok(())
//! }
//! ```

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use did_bridge_core::{CapabilityProvider, CommandEnvelope, Delivery, Error, LedgerAdapter, Reply};
use futures::FutureExt;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::adapter::{StoreAdapter, TransactionHub};
use crate::channel::{Inbox, Outbox};
use crate::config::BridgeConfig;
use crate::dispatch::{lookup, Dispatcher, Mode};
use crate::error::Result;
use crate::resolver::HttpResolver;

struct Inner<P: CapabilityProvider> {
    dispatcher: Dispatcher<P>,
    outbox: Outbox,
    workers: Semaphore,
}

/// A running bridge.
///
/// Cheap to clone; clones share the handle table, the worker pool and the
/// outbox.
pub struct Bridge<P: CapabilityProvider> {
    inner: Arc<Inner<P>>,
}

impl<P: CapabilityProvider> Clone for Bridge<P> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|message| (*message).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

impl<P: CapabilityProvider> Bridge<P> {
    /// Creates a bridge and the inbox its deliveries arrive on.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The configuration is invalid
    /// - The resolver HTTP client cannot be built
    pub fn new(config: BridgeConfig, provider: P) -> Result<(Self, Inbox)> {
        config.validate()?;
        let (outbox, inbox) = Outbox::new();
        let hub = Arc::new(TransactionHub::new(outbox.clone(), config.transaction_timeout));
        let resolver = HttpResolver::new(config.resolver_url.clone(), config.http_timeout)?;
        let default_adapter: Arc<dyn LedgerAdapter> =
            Arc::new(StoreAdapter::new(Arc::clone(&hub), resolver));

        info!(
            version = provider.version(),
            resolver = %config.resolver_url,
            max_in_flight = config.max_in_flight,
            "Starting DID bridge"
        );
        let workers = Semaphore::new(config.max_in_flight);
        let dispatcher = Dispatcher::new(provider, config, hub, default_adapter);
        let bridge = Self {
            inner: Arc::new(Inner {
                dispatcher,
                outbox,
                workers,
            }),
        };
        Ok((bridge, inbox))
    }

    /// The dispatcher, for direct access to the handle table and provider.
    #[must_use]
    pub fn dispatcher(&self) -> &Dispatcher<P> {
        &self.inner.dispatcher
    }

    /// Accepts a command; its delivery arrives on the inbox.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn submit(&self, command: CommandEnvelope) -> JoinHandle<()> {
        let bridge = self.clone();
        tokio::spawn(async move {
            let delivery = bridge.execute(command).await;
            bridge.inner.outbox.deliver(delivery);
        })
    }

    /// Runs a command and returns its delivery instead of queueing it.
    pub async fn execute(&self, command: CommandEnvelope) -> Delivery {
        let operation = lookup(command.target, &command.operation).ok();
        let _permit = match operation.map(|op| op.mode) {
            Some(Mode::Worker) => match self.inner.workers.acquire().await {
                Ok(permit) => Some(permit),
                Err(_) => {
                    let err = Error::Unspecified("worker pool closed".into());
                    return Delivery::terminal(command.channel, err.into());
                }
            },
            Some(Mode::Inline) | None => None,
        };

        let outcome = AssertUnwindSafe(self.inner.dispatcher.dispatch(&command))
            .catch_unwind()
            .await
            .unwrap_or_else(|payload| {
                let message = panic_message(payload.as_ref());
                error!(
                    target_kind = %command.target,
                    operation = %command.operation,
                    panic = %message,
                    "Command panicked"
                );
                Err(Error::Unspecified(format!("provider panicked: {message}")))
            });

        let reply = Reply::from(outcome);
        let keep_open = reply.is_ok() && operation.is_some_and(|op| op.listener);
        Delivery {
            channel: command.channel,
            reply,
            keep_open,
        }
    }
}
