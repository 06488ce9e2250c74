//! The handle table.
//!
//! Every native object the caller can name lives in one [`SubTable`] and is
//! addressed by an opaque [`Handle`]. Handle values come from one counter
//! shared by all sub-tables, so a handle of one kind never resolves in the
//! table of another kind.
//!
//! Objects are kept behind `Arc`. Resolving a handle clones the `Arc`, so a
//! call already running keeps its object alive even if the handle is released
//! meanwhile; the object is dropped when the last such clone goes away.
//!
//! Documents, credentials, issuers and adapters may be owned by a store.
//! Releasing the store releases its dependents in the same step. Locks are
//! always taken in the order stores first, dependents second.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::debug;

use crate::error::{Error, Result};
use crate::provider::LedgerAdapter;
use crate::types::{Handle, ObjectKind};

/// A resolved handle: the object plus the metadata it was allocated with.
#[derive(Debug)]
pub struct Resolved<T: ?Sized> {
    /// The handle that was resolved.
    pub handle: Handle,
    /// Shared reference to the native object.
    pub object: Arc<T>,
    /// The store handle this object depends on, if any.
    pub owner: Option<Handle>,
    /// Free-form label (store id, DID, credential id or resolver URL).
    pub label: String,
}

impl<T: ?Sized> Clone for Resolved<T> {
    fn clone(&self) -> Self {
        Self {
            handle: self.handle,
            object: Arc::clone(&self.object),
            owner: self.owner,
            label: self.label.clone(),
        }
    }
}

struct Slot<T: ?Sized> {
    object: Arc<T>,
    owner: Option<Handle>,
    label: String,
}

/// One kind's slice of the handle table.
pub struct SubTable<T: ?Sized> {
    kind: ObjectKind,
    slots: RwLock<HashMap<Handle, Slot<T>>>,
}

impl<T: ?Sized> SubTable<T> {
    fn new(kind: ObjectKind) -> Self {
        Self {
            kind,
            slots: RwLock::new(HashMap::new()),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<Handle, Slot<T>>> {
        self.slots.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<Handle, Slot<T>>> {
        self.slots.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// The kind stored in this table.
    #[must_use]
    pub const fn kind(&self) -> ObjectKind {
        self.kind
    }

    /// Resolves a handle.
    ///
    /// # Errors
    /// - [`Error::HandleNotFound`] if the handle is not live in this table
    pub fn get(&self, handle: Handle) -> Result<Resolved<T>> {
        self.read()
            .get(&handle)
            .map(|slot| Resolved {
                handle,
                object: Arc::clone(&slot.object),
                owner: slot.owner,
                label: slot.label.clone(),
            })
            .ok_or(Error::HandleNotFound {
                kind: self.kind,
                handle,
            })
    }

    /// Whether the handle is live in this table.
    #[must_use]
    pub fn contains(&self, handle: Handle) -> bool {
        self.read().contains_key(&handle)
    }

    /// Number of live handles.
    #[must_use]
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Whether no handle is live.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// The newest live handle owned by `owner`.
    #[must_use]
    pub fn latest_owned_by(&self, owner: Handle) -> Option<Resolved<T>> {
        self.read()
            .iter()
            .filter(|(_, slot)| slot.owner == Some(owner))
            .max_by_key(|(handle, _)| **handle)
            .map(|(handle, slot)| Resolved {
                handle: *handle,
                object: Arc::clone(&slot.object),
                owner: slot.owner,
                label: slot.label.clone(),
            })
    }

    fn insert(&self, handle: Handle, object: Arc<T>, owner: Option<Handle>, label: String) {
        self.write().insert(
            handle,
            Slot {
                object,
                owner,
                label,
            },
        );
    }

    fn remove(&self, handle: Handle) -> bool {
        self.write().remove(&handle).is_some()
    }

    fn remove_owned_by(&self, owner: Handle) -> usize {
        let mut slots = self.write();
        let before = slots.len();
        slots.retain(|_, slot| slot.owner != Some(owner));
        before - slots.len()
    }

    fn clear(&self) -> usize {
        let mut slots = self.write();
        let count = slots.len();
        slots.clear();
        count
    }
}

/// All live native objects, by kind.
///
/// Type parameters are the store, document, credential and issuer types of
/// the capability provider. Adapters are always trait objects.
pub struct HandleTable<S, D, C, I> {
    next: AtomicU64,
    stores: SubTable<S>,
    documents: SubTable<D>,
    credentials: SubTable<C>,
    issuers: SubTable<I>,
    adapters: SubTable<dyn LedgerAdapter>,
}

impl<S, D, C, I> Default for HandleTable<S, D, C, I> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S, D, C, I> HandleTable<S, D, C, I> {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self {
            next: AtomicU64::new(1),
            stores: SubTable::new(ObjectKind::Store),
            documents: SubTable::new(ObjectKind::Document),
            credentials: SubTable::new(ObjectKind::Credential),
            issuers: SubTable::new(ObjectKind::Issuer),
            adapters: SubTable::new(ObjectKind::Adapter),
        }
    }

    fn allocate(&self) -> Handle {
        Handle(self.next.fetch_add(1, Ordering::Relaxed))
    }

    /// The store table.
    #[must_use]
    pub const fn stores(&self) -> &SubTable<S> {
        &self.stores
    }

    /// The document table.
    #[must_use]
    pub const fn documents(&self) -> &SubTable<D> {
        &self.documents
    }

    /// The credential table.
    #[must_use]
    pub const fn credentials(&self) -> &SubTable<C> {
        &self.credentials
    }

    /// The issuer table.
    #[must_use]
    pub const fn issuers(&self) -> &SubTable<I> {
        &self.issuers
    }

    /// The adapter table.
    #[must_use]
    pub const fn adapters(&self) -> &SubTable<dyn LedgerAdapter> {
        &self.adapters
    }

    /// Registers a store under its id.
    ///
    /// At most one live handle names a store id: if `label` is already
    /// registered, that handle is returned and `store` is dropped.
    pub fn insert_store(&self, store: S, label: impl Into<String>) -> Handle {
        let label = label.into();
        let mut stores = self.stores.write();
        if let Some((handle, _)) = stores.iter().find(|(_, slot)| slot.label == label) {
            debug!(kind = "store", handle = handle.value(), "Store handle reused");
            return *handle;
        }
        let handle = self.allocate();
        stores.insert(
            handle,
            Slot {
                object: Arc::new(store),
                owner: None,
                label,
            },
        );
        drop(stores);
        debug!(kind = "store", handle = handle.value(), "Handle allocated");
        handle
    }

    /// Registers a document, optionally owned by a store.
    ///
    /// # Errors
    /// - [`Error::HandleNotFound`] if the owner store is not live
    pub fn insert_document(
        &self,
        document: D,
        owner: Option<Handle>,
        label: impl Into<String>,
    ) -> Result<Handle> {
        self.insert_dependent(&self.documents, Arc::new(document), owner, label.into())
    }

    /// Registers a credential, optionally owned by a store.
    ///
    /// # Errors
    /// - [`Error::HandleNotFound`] if the owner store is not live
    pub fn insert_credential(
        &self,
        credential: C,
        owner: Option<Handle>,
        label: impl Into<String>,
    ) -> Result<Handle> {
        self.insert_dependent(&self.credentials, Arc::new(credential), owner, label.into())
    }

    /// Registers an issuer owned by a store.
    ///
    /// # Errors
    /// - [`Error::HandleNotFound`] if the owner store is not live
    pub fn insert_issuer(
        &self,
        issuer: I,
        owner: Handle,
        label: impl Into<String>,
    ) -> Result<Handle> {
        self.insert_dependent(&self.issuers, Arc::new(issuer), Some(owner), label.into())
    }

    /// Registers a ledger adapter owned by a store.
    ///
    /// # Errors
    /// - [`Error::HandleNotFound`] if the owner store is not live
    pub fn insert_adapter(
        &self,
        adapter: Arc<dyn LedgerAdapter>,
        owner: Handle,
        label: impl Into<String>,
    ) -> Result<Handle> {
        self.insert_dependent(&self.adapters, adapter, Some(owner), label.into())
    }

    /// Installs a store's ledger adapter, releasing every adapter it had.
    ///
    /// Returns the new handle and the number of adapters replaced.
    ///
    /// # Errors
    /// - [`Error::HandleNotFound`] if the owner store is not live
    pub fn replace_adapter(
        &self,
        adapter: Arc<dyn LedgerAdapter>,
        owner: Handle,
        label: impl Into<String>,
    ) -> Result<(Handle, usize)> {
        let stores = self.stores.read();
        if !stores.contains_key(&owner) {
            return Err(Error::HandleNotFound {
                kind: ObjectKind::Store,
                handle: owner,
            });
        }
        let handle = self.allocate();
        let mut adapters = self.adapters.write();
        let before = adapters.len();
        adapters.retain(|_, slot| slot.owner != Some(owner));
        let replaced = before - adapters.len();
        adapters.insert(
            handle,
            Slot {
                object: adapter,
                owner: Some(owner),
                label: label.into(),
            },
        );
        drop(adapters);
        drop(stores);
        debug!(
            store = owner.value(),
            handle = handle.value(),
            replaced,
            "Ledger adapter replaced"
        );
        Ok((handle, replaced))
    }

    fn insert_dependent<T: ?Sized>(
        &self,
        table: &SubTable<T>,
        object: Arc<T>,
        owner: Option<Handle>,
        label: String,
    ) -> Result<Handle> {
        // Holding the store lock keeps the owner alive until the slot exists.
        let stores = self.stores.read();
        if let Some(owner) = owner {
            if !stores.contains_key(&owner) {
                return Err(Error::HandleNotFound {
                    kind: ObjectKind::Store,
                    handle: owner,
                });
            }
        }
        let handle = self.allocate();
        table.insert(handle, object, owner, label);
        drop(stores);
        debug!(
            kind = table.kind().as_str(),
            handle = handle.value(),
            owner = owner.map(Handle::value),
            "Handle allocated"
        );
        Ok(handle)
    }

    /// The adapter most recently installed for a store.
    #[must_use]
    pub fn adapter_for(&self, store: Handle) -> Option<Resolved<dyn LedgerAdapter>> {
        self.adapters.latest_owned_by(store)
    }

    /// Releases a handle of the given kind.
    ///
    /// Releasing a store also releases every object it owns. Returns the
    /// number of handles released.
    ///
    /// # Errors
    /// - [`Error::HandleNotFound`] if the handle is not live for `kind`
    pub fn release(&self, kind: ObjectKind, handle: Handle) -> Result<usize> {
        let missing = Error::HandleNotFound { kind, handle };
        let released = match kind {
            ObjectKind::Store => {
                let mut stores = self.stores.write();
                if stores.remove(&handle).is_none() {
                    return Err(missing);
                }
                let dependents = self.documents.remove_owned_by(handle)
                    + self.credentials.remove_owned_by(handle)
                    + self.issuers.remove_owned_by(handle)
                    + self.adapters.remove_owned_by(handle);
                drop(stores);
                1 + dependents
            }
            ObjectKind::Document => usize::from(self.documents.remove(handle)),
            ObjectKind::Credential => usize::from(self.credentials.remove(handle)),
            ObjectKind::Issuer => usize::from(self.issuers.remove(handle)),
            ObjectKind::Adapter => usize::from(self.adapters.remove(handle)),
        };
        if released == 0 {
            return Err(missing);
        }
        debug!(kind = kind.as_str(), handle = handle.value(), released, "Handle released");
        Ok(released)
    }

    /// Releases every handle of every kind.
    pub fn reset(&self) -> usize {
        let mut stores = self.stores.write();
        let count = stores.len();
        stores.clear();
        let released = count
            + self.documents.clear()
            + self.credentials.clear()
            + self.issuers.clear()
            + self.adapters.clear();
        drop(stores);
        debug!(released, "Handle table reset");
        released
    }
}
