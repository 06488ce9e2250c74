//! Core type definitions shared by the handle table, the capability traits
//! and the wire envelopes.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// The kind of native object a handle refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectKind {
    /// A DID store.
    Store,
    /// A DID document.
    Document,
    /// A verifiable credential.
    Credential,
    /// A credential issuer bound to one DID of a store.
    Issuer,
    /// A ledger adapter bound to one store.
    Adapter,
}

impl ObjectKind {
    /// Returns the wire name of the kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Store => "store",
            Self::Document => "document",
            Self::Credential => "credential",
            Self::Issuer => "issuer",
            Self::Adapter => "adapter",
        }
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An opaque handle naming one live native object.
///
/// Handle values come from a single process-wide counter, so a value is never
/// shared by two kinds and never handed out twice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Handle(pub u64);

impl Handle {
    /// Returns the raw handle value.
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifies one caller response channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelId(pub u64);

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The receiver of a command: the bridge itself or one object kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Target {
    /// Manager-level operations that need no target handle.
    Manager,
    /// Operations on a store handle.
    Store,
    /// Operations on a document handle.
    Document,
    /// Operations on a credential handle.
    Credential,
    /// Operations on an issuer handle.
    Issuer,
    /// Operations on an adapter handle.
    Adapter,
}

impl Target {
    /// Returns the object kind the target handle must belong to.
    #[must_use]
    pub const fn kind(self) -> Option<ObjectKind> {
        match self {
            Self::Manager => None,
            Self::Store => Some(ObjectKind::Store),
            Self::Document => Some(ObjectKind::Document),
            Self::Credential => Some(ObjectKind::Credential),
            Self::Issuer => Some(ObjectKind::Issuer),
            Self::Adapter => Some(ObjectKind::Adapter),
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind() {
            Some(kind) => kind.fmt(f),
            None => f.write_str("manager"),
        }
    }
}

/// An identity listed from a store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// The DID string.
    pub did: String,
    /// The alias the identity was stored with.
    pub alias: Option<String>,
}

/// Which identities a store listing returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IdentityFilter {
    /// Identities whose private key lives in the store.
    HasPrivateKey,
    /// Identities stored without a private key.
    NoPrivateKey,
    /// Every identity.
    All,
}

impl IdentityFilter {
    /// Maps the numeric filter used on the wire.
    #[must_use]
    pub const fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(Self::HasPrivateKey),
            1 => Some(Self::NoPrivateKey),
            2 => Some(Self::All),
            _ => None,
        }
    }

    /// Returns whether an identity with or without a private key passes.
    #[must_use]
    pub const fn matches(self, has_private_key: bool) -> bool {
        match self {
            Self::HasPrivateKey => has_private_key,
            Self::NoPrivateKey => !has_private_key,
            Self::All => true,
        }
    }
}

/// A credential listed from a store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialEntry {
    /// The full credential id (`did:...#fragment`).
    pub id: String,
    /// The alias the credential was stored with.
    pub alias: Option<String>,
}

/// Public key information of a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicKeyInfo {
    /// The key id (`did:...#primary`).
    pub id: String,
    /// The DID controlling the key.
    pub controller: String,
    /// The base58 encoded public key.
    pub key_base58: String,
}

/// A service entry of a DID document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Service {
    /// The service id.
    pub id: String,
    /// The service type.
    #[serde(rename = "type")]
    pub kind: String,
    /// The service endpoint.
    pub endpoint: String,
}

/// One edit applied to a document before it is sealed again.
#[derive(Debug, Clone, PartialEq)]
pub enum DocumentEdit {
    /// Adds a service entry.
    AddService(Service),
    /// Removes the service with the given id.
    RemoveService(String),
    /// Embeds the credential given as JSON.
    AddCredential(String),
    /// Removes the embedded credential with the given id.
    RemoveCredential(String),
}

/// Parameters of a private identity initialisation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrivateIdentityRequest {
    /// Mnemonic language.
    pub language: String,
    /// The mnemonic words.
    pub mnemonic: String,
    /// Optional extra passphrase, empty when unused.
    pub passphrase: String,
    /// The store password.
    pub storepass: String,
    /// Overwrite an existing private identity.
    pub force: bool,
}

/// Parameters of a credential issuance.
#[derive(Debug, Clone, PartialEq)]
pub struct CredentialRequest {
    /// DID of the credential subject.
    pub subject: String,
    /// Fully qualified credential id.
    pub id: String,
    /// Credential type names.
    pub types: Vec<String>,
    /// Validity in days from now.
    pub expiration_days: u32,
    /// Subject properties.
    pub properties: Map<String, Value>,
}

/// A parsed JWT.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedJwt {
    /// The payload claims.
    pub claims: Map<String, Value>,
    /// Whether the signature checked out against the issuer's document.
    pub valid: bool,
}

/// Validity of a verifiable presentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresentationStatus {
    /// Not expired and every embedded credential valid.
    pub valid: bool,
    /// Signatures check out.
    pub genuine: bool,
}

/// The caller's answer to a transaction event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionOutcome {
    /// Whether the caller published the transaction.
    pub accepted: bool,
    /// Free-form details, such as the transaction id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

/// The event emitted on the listener channel for every publish.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionEvent {
    /// Pairs this event with its `setTransactionResult` answer.
    pub correlation_id: String,
    /// The unsigned transaction payload.
    pub payload: String,
    /// Optional memo to attach to the transaction.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memo: Option<String>,
}

/// Listener types accepted by `setListener`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerKind {
    /// Transaction publish events.
    IdTransaction,
}

impl ListenerKind {
    /// Maps the numeric listener type used on the wire.
    #[must_use]
    pub const fn from_code(code: i64) -> Option<Self> {
        match code {
            1 => Some(Self::IdTransaction),
            _ => None,
        }
    }
}

/// Splits a DID string into its method and method-specific id.
///
/// `did:mem:abc` gives `("mem", "abc")`. DID URLs (with a path, query or
/// fragment) are rejected.
#[must_use]
pub fn split_did(did: &str) -> Option<(&str, &str)> {
    let (method, specific) = did.strip_prefix("did:")?.split_once(':')?;
    let method_ok = !method.is_empty()
        && method
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit());
    let specific_ok = !specific.is_empty() && !specific.contains(['/', '?', '#']);
    (method_ok && specific_ok).then_some((method, specific))
}

/// Extracts the fragment of a credential id.
///
/// Accepts the short form `#fragment` and the long form `did:...#fragment`.
#[must_use]
pub fn credential_fragment(id: &str) -> Option<&str> {
    let fragment = match id.strip_prefix('#') {
        Some(fragment) => fragment,
        None if id.starts_with("did:") => id.split_once('#')?.1,
        None => return None,
    };
    (!fragment.is_empty()).then_some(fragment)
}

/// Qualifies a credential id against the DID that owns it.
#[must_use]
pub fn qualify_credential_id(did: &str, id: &str) -> Option<String> {
    credential_fragment(id).map(|fragment| format!("{did}#{fragment}"))
}
