//! Capability traits for the native DID SDK.
//!
//! The bridge never touches DID cryptography itself. Everything it needs from
//! the SDK is expressed by the traits in this module:
//! - [`CapabilityProvider`]: store, document, credential, JWT and mnemonic
//!   operations
//! - [`NativeDocument`], [`NativeCredential`], [`NativeIssuer`]: the metadata
//!   the bridge reads from the objects it keeps behind handles
//! - [`LedgerAdapter`]: the hook the provider calls back into when it needs a
//!   transaction published or a DID resolved against the ledger
//!
//! # Examples
//!
//! ```rust,no_run
//! use did_bridge_core::provider::{CapabilityProvider, LedgerAdapter};
//!
//! async fn publish<P: CapabilityProvider>(
//!     provider: &P,
//!     store: &P::Store,
//!     document: &P::Document,
//!     adapter: &dyn LedgerAdapter,
//! ) -> did_bridge_core::provider::ProviderResult<String> {
//!     provider.publish(store, document, "storepass", adapter).await
//! }
//! ```

use std::path::Path;

use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::error::Error;
use crate::types::{
    CredentialEntry, CredentialRequest, DocumentEdit, Identity, IdentityFilter, ObjectKind,
    ParsedJwt, PresentationStatus, PrivateIdentityRequest, PublicKeyInfo, TransactionOutcome,
};

/// Failure reported by a capability provider.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The store password was rejected.
    #[error("wrong password")]
    WrongPassword,
    /// A looked-up object does not exist.
    #[error("{kind} not found: {id}")]
    NotFound {
        /// What was looked up.
        kind: ObjectKind,
        /// The id that missed.
        id: String,
    },
    /// Transport failure while talking to the ledger or resolver.
    #[error("network error: {0}")]
    Network(String),
    /// Any other SDK failure, message kept verbatim.
    #[error("{0}")]
    Failed(String),
    /// A bridge error raised while servicing a provider callback.
    #[error(transparent)]
    Bridge(Box<Error>),
    /// An opaque SDK error.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<Error> for ProviderError {
    fn from(err: Error) -> Self {
        Self::Bridge(Box::new(err))
    }
}

/// Result type for provider calls.
pub type ProviderResult<T> = std::result::Result<T, ProviderError>;

fn is_transport_failure(err: &anyhow::Error) -> bool {
    use std::io::ErrorKind;

    err.chain()
        .filter_map(|cause| cause.downcast_ref::<std::io::Error>())
        .any(|io| {
            matches!(
                io.kind(),
                ErrorKind::ConnectionRefused
                    | ErrorKind::ConnectionReset
                    | ErrorKind::ConnectionAborted
                    | ErrorKind::NotConnected
                    | ErrorKind::AddrNotAvailable
                    | ErrorKind::BrokenPipe
                    | ErrorKind::TimedOut
            )
        })
}

impl From<ProviderError> for Error {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::WrongPassword => Self::WrongPassword,
            ProviderError::NotFound { kind, id } => match kind {
                ObjectKind::Store => Self::StoreNotFound(id),
                ObjectKind::Document => Self::DocumentNotFound(id),
                ObjectKind::Credential => Self::CredentialNotFound(id),
                ObjectKind::Issuer | ObjectKind::Adapter => {
                    Self::Provider(format!("{kind} not found: {id}"))
                }
            },
            ProviderError::Network(_) => Self::Provider("network error".into()),
            ProviderError::Bridge(err) => *err,
            ProviderError::Failed(message) => Self::Provider(message),
            ProviderError::Other(err) if is_transport_failure(&err) => {
                Self::Provider("network error".into())
            }
            ProviderError::Other(err) => Self::Provider(format!("{err:#}")),
        }
    }
}

/// Metadata the bridge reads from a native document.
pub trait NativeDocument: Send + Sync + 'static {
    /// The document subject.
    fn did(&self) -> &str;

    /// Canonical JSON form.
    fn to_json(&self) -> String;

    /// Last update timestamp, if the document carries one.
    fn updated(&self) -> Option<String>;

    /// The default public key.
    fn default_public_key(&self) -> Option<PublicKeyInfo>;

    /// JSON forms of the embedded credentials.
    fn credentials(&self) -> Vec<String>;
}

/// Metadata the bridge reads from a native credential.
pub trait NativeCredential: Send + Sync + 'static {
    /// Fully qualified credential id.
    fn id(&self) -> &str;

    /// DID of the credential subject.
    fn subject(&self) -> &str;

    /// Canonical JSON form, byte-identical across store and load.
    fn to_json(&self) -> String;
}

/// Metadata the bridge reads from a native issuer.
pub trait NativeIssuer: Send + Sync + 'static {
    /// DID of the issuer.
    fn did(&self) -> &str;
}

/// The hook a provider calls when it needs the outside world.
///
/// The bridge installs one adapter per store. A publish parks inside
/// [`LedgerAdapter::create_id_transaction`] until the caller answers the
/// transaction event or the deadline passes.
#[async_trait]
pub trait LedgerAdapter: Send + Sync {
    /// Hands an unsigned transaction to the caller and waits for its outcome.
    ///
    /// # Errors
    /// - If no transaction listener is registered
    /// - If the caller does not answer before the deadline
    async fn create_id_transaction(
        &self,
        payload: String,
        memo: Option<String>,
    ) -> ProviderResult<TransactionOutcome>;

    /// Resolves a DID against the ledger.
    ///
    /// Returns `None` when the resolver has no record of the DID.
    ///
    /// # Errors
    /// - On transport failure
    async fn resolve(&self, request_id: &str, did: &str, all: bool)
        -> ProviderResult<Option<Value>>;
}

/// The DID SDK surface the bridge depends on.
///
/// Object types are associated so the handle table can own them without
/// knowing their representation.
#[async_trait]
pub trait CapabilityProvider: Send + Sync + 'static {
    /// A DID store.
    type Store: Send + Sync + 'static;
    /// A DID document.
    type Document: NativeDocument;
    /// A verifiable credential.
    type Credential: NativeCredential;
    /// A credential issuer.
    type Issuer: NativeIssuer;

    /// SDK version string.
    fn version(&self) -> String;

    /// Opens the store rooted at `root`, creating it when absent.
    async fn open_store(&self, root: &Path) -> ProviderResult<Self::Store>;

    /// Removes the store rooted at `root` and everything in it.
    async fn delete_store(&self, root: &Path) -> ProviderResult<()>;

    /// Changes the store password.
    async fn change_password(
        &self,
        store: &Self::Store,
        old_password: &str,
        new_password: &str,
    ) -> ProviderResult<()>;

    /// Whether a private identity (root key) has been initialised.
    async fn contains_private_identity(&self, store: &Self::Store) -> ProviderResult<bool>;

    /// Initialises the private identity from a mnemonic.
    async fn init_private_identity(
        &self,
        store: &Self::Store,
        request: PrivateIdentityRequest,
    ) -> ProviderResult<()>;

    /// Exports the mnemonic of the private identity.
    async fn export_mnemonic(&self, store: &Self::Store, storepass: &str)
        -> ProviderResult<String>;

    /// Restores every identity published by this private identity.
    async fn synchronize(
        &self,
        store: &Self::Store,
        storepass: &str,
        adapter: &dyn LedgerAdapter,
    ) -> ProviderResult<()>;

    /// Lists the identities of a store.
    async fn list_identities(
        &self,
        store: &Self::Store,
        filter: IdentityFilter,
    ) -> ProviderResult<Vec<Identity>>;

    /// Derives and stores a new identity.
    async fn new_identity(
        &self,
        store: &Self::Store,
        storepass: &str,
        alias: Option<&str>,
    ) -> ProviderResult<Self::Document>;

    /// Loads a stored document.
    async fn load_document(
        &self,
        store: &Self::Store,
        did: &str,
    ) -> ProviderResult<Option<Self::Document>>;

    /// Stores a document, optionally under an alias.
    async fn store_document(
        &self,
        store: &Self::Store,
        document: &Self::Document,
        alias: Option<&str>,
    ) -> ProviderResult<()>;

    /// Deletes a stored identity, returning whether it existed.
    async fn delete_identity(&self, store: &Self::Store, did: &str) -> ProviderResult<bool>;

    /// Loads a stored credential by fully qualified id.
    async fn load_credential(
        &self,
        store: &Self::Store,
        did: &str,
        id: &str,
    ) -> ProviderResult<Option<Self::Credential>>;

    /// Stores a credential.
    async fn store_credential(
        &self,
        store: &Self::Store,
        credential: &Self::Credential,
    ) -> ProviderResult<()>;

    /// Deletes a stored credential, returning whether it existed.
    async fn delete_credential(
        &self,
        store: &Self::Store,
        did: &str,
        id: &str,
    ) -> ProviderResult<bool>;

    /// Lists the credentials stored for a DID.
    async fn list_credentials(
        &self,
        store: &Self::Store,
        did: &str,
    ) -> ProviderResult<Vec<CredentialEntry>>;

    /// Creates an issuer for a DID of the store.
    async fn create_issuer(&self, store: &Self::Store, did: &str) -> ProviderResult<Self::Issuer>;

    /// Signs a presentation embedding the given credentials.
    async fn create_presentation(
        &self,
        store: &Self::Store,
        did: &str,
        credentials: &[Self::Credential],
        realm: &str,
        nonce: &str,
        storepass: &str,
    ) -> ProviderResult<String>;

    /// Checks a presentation.
    async fn verify_presentation(&self, json: &str) -> ProviderResult<PresentationStatus>;

    /// Parses a document from JSON.
    fn document_from_json(&self, json: &str) -> ProviderResult<Self::Document>;

    /// Resolves a document from the ledger, bypassing caches when `force_remote`.
    async fn resolve_document(
        &self,
        did: &str,
        force_remote: bool,
        adapter: &dyn LedgerAdapter,
    ) -> ProviderResult<Option<Self::Document>>;

    /// Applies an edit and seals the document again with the store key.
    async fn seal_document(
        &self,
        store: &Self::Store,
        document: &Self::Document,
        edit: DocumentEdit,
        storepass: &str,
    ) -> ProviderResult<Self::Document>;

    /// Publishes a document through the adapter's transaction hook.
    ///
    /// Returns the transaction id.
    async fn publish(
        &self,
        store: &Self::Store,
        document: &Self::Document,
        storepass: &str,
        adapter: &dyn LedgerAdapter,
    ) -> ProviderResult<String>;

    /// Signs `data` with the document's default key, returning base64.
    async fn sign(
        &self,
        store: &Self::Store,
        document: &Self::Document,
        storepass: &str,
        data: &[u8],
    ) -> ProviderResult<String>;

    /// Verifies a base64 signature against the document's default key.
    fn verify(
        &self,
        document: &Self::Document,
        signature: &str,
        data: &[u8],
    ) -> ProviderResult<bool>;

    /// Builds and signs a JWT with the document's default key.
    async fn create_jwt(
        &self,
        store: &Self::Store,
        document: &Self::Document,
        claims: Map<String, Value>,
        storepass: &str,
    ) -> ProviderResult<String>;

    /// Parses a JWT and checks its signature.
    async fn parse_jwt(&self, token: &str) -> ProviderResult<ParsedJwt>;

    /// Parses a credential from JSON.
    fn credential_from_json(&self, json: &str) -> ProviderResult<Self::Credential>;

    /// Issues and seals a credential.
    async fn issue_credential(
        &self,
        issuer: &Self::Issuer,
        request: CredentialRequest,
        storepass: &str,
    ) -> ProviderResult<Self::Credential>;

    /// Generates a new mnemonic.
    fn generate_mnemonic(&self, language: &str) -> ProviderResult<String>;

    /// Checks a mnemonic.
    fn is_mnemonic_valid(&self, language: &str, mnemonic: &str) -> ProviderResult<bool>;
}
