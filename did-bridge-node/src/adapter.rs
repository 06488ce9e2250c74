//! The transaction adapter.
//!
//! A provider that publishes a document hands the unsigned transaction to
//! [`LedgerAdapter::create_id_transaction`] and expects the outcome back. The
//! bridge turns that call into a [`TransactionEvent`] on the caller's
//! listener channel and parks the provider task on a oneshot until
//! `setTransactionResult` arrives with the same correlation id, or the
//! deadline passes. Each pending transaction reaches exactly one terminal
//! state; whichever of resolve and timeout removes the entry first wins.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use did_bridge_core::provider::{LedgerAdapter, ProviderResult};
use did_bridge_core::types::{TransactionEvent, TransactionOutcome};
use did_bridge_core::{ChannelId, Delivery, Error, Result};
use serde_json::Value;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::channel::Outbox;
use crate::resolver::HttpResolver;

type Pending = HashMap<String, oneshot::Sender<TransactionOutcome>>;

/// Correlates transaction events with their results.
#[derive(Debug)]
pub struct TransactionHub {
    outbox: Outbox,
    timeout: Duration,
    listener: Mutex<Option<ChannelId>>,
    pending: Mutex<Pending>,
}

struct PendingGuard<'a> {
    hub: &'a TransactionHub,
    id: String,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.hub.pending().remove(&self.id);
    }
}

impl TransactionHub {
    /// Creates a hub emitting events through `outbox`.
    #[must_use]
    pub fn new(outbox: Outbox, timeout: Duration) -> Self {
        Self {
            outbox,
            timeout,
            listener: Mutex::new(None),
            pending: Mutex::new(HashMap::new()),
        }
    }

    fn pending(&self) -> MutexGuard<'_, Pending> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn listener_slot(&self) -> MutexGuard<'_, Option<ChannelId>> {
        self.listener.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Makes `channel` the transaction listener, returning the previous one.
    ///
    /// Transactions already pending are unaffected.
    pub fn set_listener(&self, channel: ChannelId) -> Option<ChannelId> {
        let previous = self.listener_slot().replace(channel);
        info!(channel = channel.0, previous = previous.map(|c| c.0), "Transaction listener registered");
        previous
    }

    /// The current listener channel.
    #[must_use]
    pub fn listener(&self) -> Option<ChannelId> {
        *self.listener_slot()
    }

    /// Forgets the listener channel.
    pub fn clear_listener(&self) {
        self.listener_slot().take();
    }

    /// Number of transactions waiting for a result.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending().len()
    }

    /// Emits a transaction event and waits for its outcome.
    ///
    /// # Errors
    ///
    /// - [`Error::NoTransactionListener`] if no listener is registered
    /// - [`Error::Unspecified`] if the event cannot be delivered
    /// - [`Error::TransactionTimeout`] if no result arrives in time
    pub async fn request(&self, payload: String, memo: Option<String>) -> Result<TransactionOutcome> {
        let listener = self.listener().ok_or(Error::NoTransactionListener)?;

        let id = Uuid::new_v4().to_string();
        let (tx, mut rx) = oneshot::channel();
        self.pending().insert(id.clone(), tx);
        let _guard = PendingGuard {
            hub: self,
            id: id.clone(),
        };

        let event = TransactionEvent {
            correlation_id: id.clone(),
            payload,
            memo,
        };
        if !self
            .outbox
            .deliver(Delivery::event(listener, serde_json::to_value(&event)?))
        {
            warn!(correlation_id = %id, channel = listener.0, "Listener channel closed");
            return Err(Error::Unspecified("listener channel closed".into()));
        }
        info!(correlation_id = %id, channel = listener.0, "Transaction requested");

        match tokio::time::timeout(self.timeout, &mut rx).await {
            Ok(Ok(outcome)) => Ok(outcome),
            Ok(Err(_)) => Err(Error::Unspecified(format!("transaction {id} abandoned"))),
            Err(_) => {
                if self.pending().remove(&id).is_some() {
                    warn!(correlation_id = %id, timeout = ?self.timeout, "Transaction timed out");
                    return Err(Error::TransactionTimeout(id));
                }
                // A result claimed the entry just as the deadline passed.
                rx.await
                    .map_err(|_| Error::Unspecified(format!("transaction {id} abandoned")))
            }
        }
    }

    /// Completes a pending transaction.
    ///
    /// # Errors
    ///
    /// - [`Error::TransactionCorrelationMismatch`] if the id is unknown or
    ///   already settled
    pub fn resolve(&self, correlation_id: &str, outcome: TransactionOutcome) -> Result<()> {
        let sender = self.pending().remove(correlation_id);
        let delivered = sender.is_some_and(|sender| sender.send(outcome).is_ok());
        if !delivered {
            warn!(correlation_id, "Transaction result has no pending transaction");
            return Err(Error::TransactionCorrelationMismatch(correlation_id.to_string()));
        }
        debug!(correlation_id, "Transaction resolved");
        Ok(())
    }
}

/// The ledger hook installed for one store.
#[derive(Debug, Clone)]
pub struct StoreAdapter {
    hub: Arc<TransactionHub>,
    resolver: HttpResolver,
}

impl StoreAdapter {
    /// Creates an adapter publishing through `hub` and resolving via `resolver`.
    #[must_use]
    pub fn new(hub: Arc<TransactionHub>, resolver: HttpResolver) -> Self {
        Self { hub, resolver }
    }

    /// The resolver endpoint.
    #[must_use]
    pub fn resolver_url(&self) -> &str {
        self.resolver.url()
    }
}

#[async_trait]
impl LedgerAdapter for StoreAdapter {
    async fn create_id_transaction(
        &self,
        payload: String,
        memo: Option<String>,
    ) -> ProviderResult<TransactionOutcome> {
        Ok(self.hub.request(payload, memo).await?)
    }

    async fn resolve(&self, request_id: &str, did: &str, all: bool) -> ProviderResult<Option<Value>> {
        self.resolver.resolve(request_id, did, all).await
    }
}
