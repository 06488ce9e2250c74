//! An in-memory capability provider.
//!
//! `MemoryProvider` implements every [`CapabilityProvider`] operation without a
//! native SDK: stores live in a map keyed by root path, published documents
//! in a shared ledger map. Keys are derived deterministically from the
//! mnemonic so `synchronize` can find published identities again.
//!
//! Signatures are SHA-256 digests over the public key and the signed bytes.
//! They exercise every code path of the bridge but prove nothing; never use
//! this provider outside tests and demos.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine;
use did_bridge_core::prelude::*;
use did_bridge_core::types::qualify_credential_id;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use sha2::{Digest, Sha256};
use tracing::debug;
use uuid::Uuid;

const MNEMONIC_WORDS: usize = 12;

const WORDS: [&str; 64] = [
    "abandon", "ability", "able", "about", "above", "absent", "absorb", "abstract",
    "absurd", "abuse", "access", "accident", "account", "accuse", "achieve", "acid",
    "acoustic", "acquire", "across", "act", "action", "actor", "actress", "actual",
    "adapt", "add", "addict", "address", "adjust", "admit", "adult", "advance",
    "advice", "aerobic", "affair", "afford", "afraid", "again", "age", "agent",
    "agree", "ahead", "aim", "air", "airport", "aisle", "alarm", "album",
    "alcohol", "alert", "alien", "all", "alley", "allow", "almost", "alone",
    "alpha", "already", "also", "alter", "always", "amateur", "amazing", "among",
];

const BASE58: &[u8; 58] = b"123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";

fn base58(bytes: &[u8]) -> String {
    let mut digits: Vec<u8> = Vec::new();
    for &byte in bytes {
        let mut carry = u32::from(byte);
        for digit in &mut digits {
            carry += u32::from(*digit) << 8;
            *digit = u8::try_from(carry % 58).unwrap_or_default();
            carry /= 58;
        }
        while carry > 0 {
            digits.push(u8::try_from(carry % 58).unwrap_or_default());
            carry /= 58;
        }
    }
    let zeros = bytes.iter().take_while(|b| **b == 0).count();
    std::iter::repeat('1')
        .take(zeros)
        .chain(digits.iter().rev().map(|d| char::from(BASE58[usize::from(*d)])))
        .collect()
}

fn digest(parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part);
    }
    hasher.finalize().into()
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| elapsed.as_secs())
}

fn failed(message: impl Into<String>) -> ProviderError {
    ProviderError::Failed(message.into())
}

fn not_found(kind: ObjectKind, id: impl Into<String>) -> ProviderError {
    ProviderError::NotFound {
        kind,
        id: id.into(),
    }
}

/// Pseudo-signature: base64 of SHA-256 over the public key and the data.
fn pseudo_sign(public_key: &str, data: &[u8]) -> String {
    STANDARD.encode(digest(&[public_key.as_bytes(), data]))
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A credential kept with its JSON exactly as it was received or issued.
#[derive(Debug, Clone, PartialEq)]
pub struct MemCredential {
    id: String,
    subject: String,
    json: String,
    value: Value,
}

impl MemCredential {
    fn parse(json: &str) -> ProviderResult<Self> {
        let value: Value =
            serde_json::from_str(json).map_err(|e| failed(format!("malformed credential: {e}")))?;
        let subject = value
            .pointer("/credentialSubject/id")
            .and_then(Value::as_str)
            .ok_or_else(|| failed("credential has no subject"))?
            .to_string();
        let id = value
            .get("id")
            .and_then(Value::as_str)
            .and_then(|id| qualify_credential_id(&subject, id))
            .ok_or_else(|| failed("credential id must be a DID URL with a fragment"))?;
        Ok(Self {
            id,
            subject,
            json: json.to_string(),
            value,
        })
    }

    fn expires(&self) -> Option<u64> {
        self.value.get("expirationDate").and_then(Value::as_u64)
    }
}

impl NativeCredential for MemCredential {
    fn id(&self) -> &str {
        &self.id
    }

    fn subject(&self) -> &str {
        &self.subject
    }

    fn to_json(&self) -> String {
        self.json.clone()
    }
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PublicKeyJson {
    id: String,
    #[serde(rename = "type")]
    kind: String,
    controller: String,
    public_key_base58: String,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProofJson {
    #[serde(rename = "type")]
    kind: String,
    creator: String,
    signature_value: String,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DocumentJson {
    id: String,
    public_key: Vec<PublicKeyJson>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    verifiable_credential: Vec<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    service: Vec<Service>,
    updated: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    proof: Option<ProofJson>,
}

/// A DID document held in memory.
#[derive(Debug, Clone, PartialEq)]
pub struct MemDocument {
    did: String,
    public_key: String,
    services: Vec<Service>,
    credentials: Vec<MemCredential>,
    updated: String,
    signature: String,
}

impl MemDocument {
    fn new(did: String, public_key: String) -> Self {
        let mut document = Self {
            did,
            public_key,
            services: Vec::new(),
            credentials: Vec::new(),
            updated: String::new(),
            signature: String::new(),
        };
        document.seal();
        document
    }

    fn key_id(&self) -> String {
        format!("{}#primary", self.did)
    }

    fn unsigned(&self) -> DocumentJson {
        DocumentJson {
            id: self.did.clone(),
            public_key: vec![PublicKeyJson {
                id: self.key_id(),
                kind: "ECDSAsecp256r1".into(),
                controller: self.did.clone(),
                public_key_base58: self.public_key.clone(),
            }],
            verifiable_credential: self.credentials.iter().map(|c| c.value.clone()).collect(),
            service: self.services.clone(),
            updated: self.updated.clone(),
            proof: None,
        }
    }

    fn seal(&mut self) {
        self.updated = now_secs().to_string();
        let unsigned = serde_json::to_string(&self.unsigned()).unwrap_or_default();
        self.signature = pseudo_sign(&self.public_key, unsigned.as_bytes());
    }

    fn apply(&mut self, edit: DocumentEdit) -> ProviderResult<()> {
        match edit {
            DocumentEdit::AddService(service) => {
                if self.services.iter().any(|s| s.id == service.id) {
                    return Err(failed(format!("service {} already exists", service.id)));
                }
                self.services.push(service);
            }
            DocumentEdit::RemoveService(id) => {
                let before = self.services.len();
                self.services.retain(|s| s.id != id);
                if self.services.len() == before {
                    return Err(failed(format!("no service {id}")));
                }
            }
            DocumentEdit::AddCredential(json) => {
                let credential = MemCredential::parse(&json)?;
                if credential.subject != self.did {
                    return Err(failed("credential subject is not the document subject"));
                }
                if self.credentials.iter().any(|c| c.id == credential.id) {
                    return Err(failed(format!("credential {} already embedded", credential.id)));
                }
                self.credentials.push(credential);
            }
            DocumentEdit::RemoveCredential(id) => {
                let id = qualify_credential_id(&self.did, &id)
                    .ok_or_else(|| failed("credential id must be a DID URL with a fragment"))?;
                let before = self.credentials.len();
                self.credentials.retain(|c| c.id != id);
                if self.credentials.len() == before {
                    return Err(not_found(ObjectKind::Credential, id));
                }
            }
        }
        Ok(())
    }

    fn parse(json: &str) -> ProviderResult<Self> {
        let parsed: DocumentJson =
            serde_json::from_str(json).map_err(|e| failed(format!("malformed document: {e}")))?;
        let key = parsed
            .public_key
            .into_iter()
            .next()
            .ok_or_else(|| failed("document has no public key"))?;
        let credentials = parsed
            .verifiable_credential
            .iter()
            .map(|value| MemCredential::parse(&value.to_string()))
            .collect::<ProviderResult<Vec<_>>>()?;
        Ok(Self {
            did: parsed.id,
            public_key: key.public_key_base58,
            services: parsed.service,
            credentials,
            updated: parsed.updated,
            signature: parsed.proof.map(|p| p.signature_value).unwrap_or_default(),
        })
    }
}

impl NativeDocument for MemDocument {
    fn did(&self) -> &str {
        &self.did
    }

    fn to_json(&self) -> String {
        let mut document = self.unsigned();
        document.proof = Some(ProofJson {
            kind: "ECDSAsecp256r1".into(),
            creator: self.key_id(),
            signature_value: self.signature.clone(),
        });
        serde_json::to_string(&document).unwrap_or_default()
    }

    fn updated(&self) -> Option<String> {
        Some(self.updated.clone())
    }

    fn default_public_key(&self) -> Option<PublicKeyInfo> {
        Some(PublicKeyInfo {
            id: self.key_id(),
            controller: self.did.clone(),
            key_base58: self.public_key.clone(),
        })
    }

    fn credentials(&self) -> Vec<String> {
        self.credentials.iter().map(|c| c.json.clone()).collect()
    }
}

/// An issuer bound to one identity of a store.
#[derive(Debug, Clone)]
pub struct MemIssuer {
    did: String,
    public_key: String,
    store: Arc<MemStore>,
}

impl NativeIssuer for MemIssuer {
    fn did(&self) -> &str {
        &self.did
    }
}

#[derive(Debug, Clone)]
struct StoredIdentity {
    document: MemDocument,
    alias: Option<String>,
    has_private_key: bool,
}

#[derive(Debug, Default)]
struct StoreState {
    password: Option<String>,
    mnemonic: Option<String>,
    seed: Option<[u8; 32]>,
    next_index: u32,
    identities: BTreeMap<String, StoredIdentity>,
    credentials: BTreeMap<String, MemCredential>,
}

impl StoreState {
    fn check_password(&self, storepass: &str) -> ProviderResult<()> {
        match &self.password {
            None => Err(failed("store has no private identity")),
            Some(password) if password == storepass => Ok(()),
            Some(_) => Err(ProviderError::WrongPassword),
        }
    }

    fn signing_key(&self, did: &str, storepass: &str) -> ProviderResult<String> {
        self.check_password(storepass)?;
        match self.identities.get(did) {
            Some(identity) if identity.has_private_key => Ok(identity.document.public_key.clone()),
            Some(_) => Err(failed(format!("no private key for {did}"))),
            None => Err(not_found(ObjectKind::Document, did)),
        }
    }

    fn derive(&self, index: u32) -> ProviderResult<MemDocument> {
        let seed = self.seed.ok_or_else(|| failed("store has no private identity"))?;
        let secret = digest(&[&seed, &index.to_be_bytes()]);
        let public = digest(&[b"public", &secret]);
        let did = format!("did:mem:{}", base58(&digest(&[&public])[..20]));
        Ok(MemDocument::new(did, base58(&public)))
    }
}

/// A store rooted at one path.
#[derive(Debug)]
pub struct MemStore {
    root: PathBuf,
    state: Mutex<StoreState>,
}

impl MemStore {
    /// The root path the store was opened at.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn state(&self) -> MutexGuard<'_, StoreState> {
        lock(&self.state)
    }
}

/// The in-memory provider.
#[derive(Debug, Default)]
pub struct MemoryProvider {
    stores: Mutex<HashMap<PathBuf, Arc<MemStore>>>,
    ledger: Mutex<HashMap<String, MemDocument>>,
}

impl MemoryProvider {
    /// Creates a provider with no stores and an empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The published version of a document, if any.
    #[must_use]
    pub fn published(&self, did: &str) -> Option<MemDocument> {
        lock(&self.ledger).get(did).cloned()
    }

    fn find_document(&self, did: &str) -> Option<MemDocument> {
        if let Some(document) = self.published(did) {
            return Some(document);
        }
        let stores: Vec<_> = lock(&self.stores).values().cloned().collect();
        stores
            .iter()
            .find_map(|store| store.state().identities.get(did).map(|i| i.document.clone()))
    }

    fn has_english(language: &str) -> ProviderResult<()> {
        match language {
            "" | "english" | "ENGLISH" => Ok(()),
            other => Err(failed(format!("unsupported mnemonic language: {other}"))),
        }
    }

    fn presentation_input(credentials: &[Value], realm: &str, nonce: &str) -> String {
        format!("{}|{realm}|{nonce}", Value::Array(credentials.to_vec()))
    }
}

#[async_trait]
impl CapabilityProvider for MemoryProvider {
    type Store = Arc<MemStore>;
    type Document = MemDocument;
    type Credential = MemCredential;
    type Issuer = MemIssuer;

    fn version(&self) -> String {
        format!("memory-{}", env!("CARGO_PKG_VERSION"))
    }

    async fn open_store(&self, root: &Path) -> ProviderResult<Self::Store> {
        let store = lock(&self.stores)
            .entry(root.to_path_buf())
            .or_insert_with(|| {
                debug!(root = %root.display(), "Creating in-memory store");
                Arc::new(MemStore {
                    root: root.to_path_buf(),
                    state: Mutex::new(StoreState::default()),
                })
            })
            .clone();
        Ok(store)
    }

    async fn delete_store(&self, root: &Path) -> ProviderResult<()> {
        lock(&self.stores)
            .remove(root)
            .map(|_| ())
            .ok_or_else(|| not_found(ObjectKind::Store, root.display().to_string()))
    }

    async fn change_password(
        &self,
        store: &Self::Store,
        old_password: &str,
        new_password: &str,
    ) -> ProviderResult<()> {
        let mut state = store.state();
        state.check_password(old_password)?;
        state.password = Some(new_password.to_string());
        Ok(())
    }

    async fn contains_private_identity(&self, store: &Self::Store) -> ProviderResult<bool> {
        Ok(store.state().seed.is_some())
    }

    async fn init_private_identity(
        &self,
        store: &Self::Store,
        request: PrivateIdentityRequest,
    ) -> ProviderResult<()> {
        if !self.is_mnemonic_valid(&request.language, &request.mnemonic)? {
            return Err(failed("invalid mnemonic"));
        }
        let mut state = store.state();
        if state.seed.is_some() && !request.force {
            return Err(failed("store already has a private identity"));
        }
        state.seed = Some(digest(&[
            request.mnemonic.as_bytes(),
            b"|",
            request.passphrase.as_bytes(),
        ]));
        state.mnemonic = Some(request.mnemonic);
        state.password = Some(request.storepass);
        state.next_index = 0;
        Ok(())
    }

    async fn export_mnemonic(&self, store: &Self::Store, storepass: &str) -> ProviderResult<String> {
        let state = store.state();
        state.check_password(storepass)?;
        state
            .mnemonic
            .clone()
            .ok_or_else(|| failed("store has no private identity"))
    }

    async fn synchronize(
        &self,
        store: &Self::Store,
        storepass: &str,
        adapter: &dyn LedgerAdapter,
    ) -> ProviderResult<()> {
        store.state().check_password(storepass)?;

        let mut index = 0;
        loop {
            let derived = store.state().derive(index)?;
            let Some(published) = self.resolve_document(&derived.did, true, adapter).await? else {
                break;
            };
            let mut state = store.state();
            let alias = state.identities.get(&published.did).and_then(|i| i.alias.clone());
            state.identities.insert(
                published.did.clone(),
                StoredIdentity {
                    document: published,
                    alias,
                    has_private_key: true,
                },
            );
            state.next_index = state.next_index.max(index + 1);
            index += 1;
        }
        debug!(root = %store.root.display(), restored = index, "Store synchronized");
        Ok(())
    }

    async fn list_identities(
        &self,
        store: &Self::Store,
        filter: IdentityFilter,
    ) -> ProviderResult<Vec<Identity>> {
        Ok(store
            .state()
            .identities
            .iter()
            .filter(|(_, identity)| filter.matches(identity.has_private_key))
            .map(|(did, identity)| Identity {
                did: did.clone(),
                alias: identity.alias.clone(),
            })
            .collect())
    }

    async fn new_identity(
        &self,
        store: &Self::Store,
        storepass: &str,
        alias: Option<&str>,
    ) -> ProviderResult<Self::Document> {
        let mut state = store.state();
        state.check_password(storepass)?;
        let document = state.derive(state.next_index)?;
        state.next_index += 1;
        state.identities.insert(
            document.did.clone(),
            StoredIdentity {
                document: document.clone(),
                alias: alias.map(str::to_string),
                has_private_key: true,
            },
        );
        Ok(document)
    }

    async fn load_document(
        &self,
        store: &Self::Store,
        did: &str,
    ) -> ProviderResult<Option<Self::Document>> {
        Ok(store.state().identities.get(did).map(|i| i.document.clone()))
    }

    async fn store_document(
        &self,
        store: &Self::Store,
        document: &Self::Document,
        alias: Option<&str>,
    ) -> ProviderResult<()> {
        let mut state = store.state();
        let (previous_alias, has_private_key) = state
            .identities
            .get(&document.did)
            .map_or((None, false), |i| (i.alias.clone(), i.has_private_key));
        state.identities.insert(
            document.did.clone(),
            StoredIdentity {
                document: document.clone(),
                alias: alias.map(str::to_string).or(previous_alias),
                has_private_key,
            },
        );
        Ok(())
    }

    async fn delete_identity(&self, store: &Self::Store, did: &str) -> ProviderResult<bool> {
        let mut state = store.state();
        let existed = state.identities.remove(did).is_some();
        let prefix = format!("{did}#");
        state.credentials.retain(|id, _| !id.starts_with(&prefix));
        Ok(existed)
    }

    async fn load_credential(
        &self,
        store: &Self::Store,
        _did: &str,
        id: &str,
    ) -> ProviderResult<Option<Self::Credential>> {
        Ok(store.state().credentials.get(id).cloned())
    }

    async fn store_credential(
        &self,
        store: &Self::Store,
        credential: &Self::Credential,
    ) -> ProviderResult<()> {
        store
            .state()
            .credentials
            .insert(credential.id.clone(), credential.clone());
        Ok(())
    }

    async fn delete_credential(
        &self,
        store: &Self::Store,
        _did: &str,
        id: &str,
    ) -> ProviderResult<bool> {
        Ok(store.state().credentials.remove(id).is_some())
    }

    async fn list_credentials(
        &self,
        store: &Self::Store,
        did: &str,
    ) -> ProviderResult<Vec<CredentialEntry>> {
        let prefix = format!("{did}#");
        Ok(store
            .state()
            .credentials
            .keys()
            .filter(|id| id.starts_with(&prefix))
            .map(|id| CredentialEntry {
                id: id.clone(),
                alias: None,
            })
            .collect())
    }

    async fn create_issuer(&self, store: &Self::Store, did: &str) -> ProviderResult<Self::Issuer> {
        let state = store.state();
        match state.identities.get(did) {
            Some(identity) if identity.has_private_key => Ok(MemIssuer {
                did: did.to_string(),
                public_key: identity.document.public_key.clone(),
                store: Arc::clone(store),
            }),
            Some(_) => Err(failed(format!("no private key for {did}"))),
            None => Err(not_found(ObjectKind::Document, did)),
        }
    }

    async fn create_presentation(
        &self,
        store: &Self::Store,
        did: &str,
        credentials: &[Self::Credential],
        realm: &str,
        nonce: &str,
        storepass: &str,
    ) -> ProviderResult<String> {
        let public_key = store.state().signing_key(did, storepass)?;
        let embedded: Vec<Value> = credentials.iter().map(|c| c.value.clone()).collect();
        let input = Self::presentation_input(&embedded, realm, nonce);
        let presentation = json!({
            "type": "VerifiablePresentation",
            "created": now_secs(),
            "verifiableCredential": embedded,
            "proof": {
                "type": "ECDSAsecp256r1",
                "verificationMethod": format!("{did}#primary"),
                "realm": realm,
                "nonce": nonce,
                "signature": pseudo_sign(&public_key, input.as_bytes()),
            }
        });
        Ok(presentation.to_string())
    }

    async fn verify_presentation(&self, json: &str) -> ProviderResult<PresentationStatus> {
        let value: Value =
            serde_json::from_str(json).map_err(|e| failed(format!("malformed presentation: {e}")))?;
        let proof = value.get("proof").ok_or_else(|| failed("presentation has no proof"))?;
        let field = |name: &str| proof.get(name).and_then(Value::as_str).unwrap_or_default();
        let signer = field("verificationMethod")
            .split_once('#')
            .map_or("", |(did, _)| did);
        let embedded = value
            .get("verifiableCredential")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        let genuine = self.find_document(signer).is_some_and(|document| {
            let input = Self::presentation_input(&embedded, field("realm"), field("nonce"));
            pseudo_sign(&document.public_key, input.as_bytes()) == field("signature")
        });
        let now = now_secs();
        let unexpired = embedded
            .iter()
            .map(|credential| MemCredential::parse(&credential.to_string()))
            .all(|credential| {
                credential.is_ok_and(|c| !matches!(c.expires(), Some(expires) if expires <= now))
            });
        Ok(PresentationStatus {
            valid: genuine && unexpired,
            genuine,
        })
    }

    fn document_from_json(&self, json: &str) -> ProviderResult<Self::Document> {
        MemDocument::parse(json)
    }

    async fn resolve_document(
        &self,
        did: &str,
        force_remote: bool,
        adapter: &dyn LedgerAdapter,
    ) -> ProviderResult<Option<Self::Document>> {
        if let Some(document) = self.published(did) {
            return Ok(Some(document));
        }
        if !force_remote {
            if let Some(document) = self.find_document(did) {
                return Ok(Some(document));
            }
        }
        let request_id = Uuid::new_v4().to_string();
        let Some(answer) = adapter.resolve(&request_id, did, false).await? else {
            return Ok(None);
        };
        match answer.pointer("/result/document") {
            Some(Value::String(json)) => MemDocument::parse(json).map(Some),
            Some(document @ Value::Object(_)) => MemDocument::parse(&document.to_string()).map(Some),
            _ => Ok(None),
        }
    }

    async fn seal_document(
        &self,
        store: &Self::Store,
        document: &Self::Document,
        edit: DocumentEdit,
        storepass: &str,
    ) -> ProviderResult<Self::Document> {
        let mut state = store.state();
        state.signing_key(&document.did, storepass)?;
        let mut sealed = document.clone();
        sealed.apply(edit)?;
        sealed.seal();
        if let Some(identity) = state.identities.get_mut(&sealed.did) {
            identity.document = sealed.clone();
        }
        Ok(sealed)
    }

    async fn publish(
        &self,
        store: &Self::Store,
        document: &Self::Document,
        storepass: &str,
        adapter: &dyn LedgerAdapter,
    ) -> ProviderResult<String> {
        let public_key = store.state().signing_key(&document.did, storepass)?;
        let operation = if self.published(&document.did).is_some() {
            "update"
        } else {
            "create"
        };
        let body = STANDARD.encode(document.to_json());
        let payload = json!({
            "header": {"specification": "elastos/did/1.0", "operation": operation},
            "payload": body,
            "proof": {
                "verificationMethod": document.key_id(),
                "signature": pseudo_sign(&public_key, body.as_bytes()),
            }
        })
        .to_string();

        let outcome = adapter.create_id_transaction(payload.clone(), None).await?;
        if !outcome.accepted {
            return Err(failed("transaction rejected"));
        }
        let txid = outcome
            .details
            .as_ref()
            .and_then(|details| details.get("txid"))
            .and_then(Value::as_str)
            .map_or_else(
                || STANDARD.encode(digest(&[payload.as_bytes()])),
                str::to_string,
            );
        lock(&self.ledger).insert(document.did.clone(), document.clone());
        debug!(did = %document.did, %txid, operation, "Document published");
        Ok(txid)
    }

    async fn sign(
        &self,
        store: &Self::Store,
        document: &Self::Document,
        storepass: &str,
        data: &[u8],
    ) -> ProviderResult<String> {
        let public_key = store.state().signing_key(&document.did, storepass)?;
        Ok(pseudo_sign(&public_key, data))
    }

    fn verify(
        &self,
        document: &Self::Document,
        signature: &str,
        data: &[u8],
    ) -> ProviderResult<bool> {
        Ok(pseudo_sign(&document.public_key, data) == signature)
    }

    async fn create_jwt(
        &self,
        store: &Self::Store,
        document: &Self::Document,
        claims: Map<String, Value>,
        storepass: &str,
    ) -> ProviderResult<String> {
        let public_key = store.state().signing_key(&document.did, storepass)?;
        let header = json!({"alg": "ES256", "typ": "JWT", "kid": document.key_id()});
        let mut payload = claims;
        payload
            .entry("iss")
            .or_insert_with(|| Value::from(document.did.clone()));
        let input = format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(header.to_string()),
            URL_SAFE_NO_PAD.encode(Value::Object(payload).to_string())
        );
        let signature = URL_SAFE_NO_PAD.encode(digest(&[public_key.as_bytes(), input.as_bytes()]));
        Ok(format!("{input}.{signature}"))
    }

    async fn parse_jwt(&self, token: &str) -> ProviderResult<ParsedJwt> {
        let malformed = || failed("malformed JWT");
        let mut parts = token.split('.');
        let (Some(header), Some(payload), Some(signature), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(malformed());
        };
        let decode = |part: &str| -> ProviderResult<Value> {
            let bytes = URL_SAFE_NO_PAD.decode(part).map_err(|_| malformed())?;
            serde_json::from_slice(&bytes).map_err(|_| malformed())
        };
        let header = decode(header)?;
        let Value::Object(claims) = decode(payload)? else {
            return Err(malformed());
        };

        let signer = header
            .get("kid")
            .and_then(Value::as_str)
            .and_then(|kid| kid.split_once('#'))
            .map_or("", |(did, _)| did);
        let input = &token[..token.len() - signature.len() - 1];
        let valid = self.find_document(signer).is_some_and(|document| {
            URL_SAFE_NO_PAD.encode(digest(&[document.public_key.as_bytes(), input.as_bytes()]))
                == signature
        });
        Ok(ParsedJwt { claims, valid })
    }

    fn credential_from_json(&self, json: &str) -> ProviderResult<Self::Credential> {
        MemCredential::parse(json)
    }

    async fn issue_credential(
        &self,
        issuer: &Self::Issuer,
        request: CredentialRequest,
        storepass: &str,
    ) -> ProviderResult<Self::Credential> {
        issuer.store.state().check_password(storepass)?;
        let id = qualify_credential_id(&request.subject, &request.id)
            .ok_or_else(|| failed("credential id must be a DID URL with a fragment"))?;
        let issued = now_secs();
        let expires = issued + u64::from(request.expiration_days) * 86_400;

        let mut subject = request.properties;
        subject.insert("id".into(), Value::from(request.subject.clone()));
        let unsigned = json!({
            "id": id,
            "type": request.types,
            "issuer": issuer.did,
            "issuanceDate": issued,
            "expirationDate": expires,
            "credentialSubject": subject,
        });
        let signature = pseudo_sign(&issuer.public_key, unsigned.to_string().as_bytes());
        let mut credential = unsigned;
        credential["proof"] = json!({
            "type": "ECDSAsecp256r1",
            "verificationMethod": format!("{}#primary", issuer.did),
            "signature": signature,
        });
        MemCredential::parse(&credential.to_string())
    }

    fn generate_mnemonic(&self, language: &str) -> ProviderResult<String> {
        Self::has_english(language)?;
        let entropy = [Uuid::new_v4().into_bytes(), Uuid::new_v4().into_bytes()].concat();
        Ok(entropy
            .iter()
            .take(MNEMONIC_WORDS)
            .map(|byte| WORDS[usize::from(*byte) % WORDS.len()])
            .collect::<Vec<_>>()
            .join(" "))
    }

    fn is_mnemonic_valid(&self, language: &str, mnemonic: &str) -> ProviderResult<bool> {
        Self::has_english(language)?;
        let words: Vec<&str> = mnemonic.split_whitespace().collect();
        Ok(words.len() == MNEMONIC_WORDS && words.iter().all(|word| WORDS.contains(word)))
    }
}
