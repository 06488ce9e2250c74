//! Command dispatch.
//!
//! Every command goes through the same steps:
//! 1. Look the operation up in [`OPERATIONS`]
//! 2. Check the argument count against the declared arity
//! 3. Resolve the target handle, then every handle argument
//! 4. Call the capability provider
//! 5. Wrap returned native objects in fresh handles
//!
//! A failure at any step ends the command; the provider is never called with
//! an unresolved handle. Failures are classified into the core error type and
//! marshalled by the caller of [`Dispatcher::dispatch`].
//!
//! # Examples
//!
//! ```rust,no_run
//! use did_bridge_core::{ChannelId, CommandEnvelope};
//! use did_bridge_node::dispatch::lookup;
//!
//! let command = CommandEnvelope::manager("getVersion", vec![], ChannelId(1));
//! let operation = lookup(command.target, &command.operation).unwrap();
//! assert_eq!(operation.arity, 0);
//! ```

use std::path::Component;
use std::sync::Arc;

use did_bridge_core::handle::Resolved;
use did_bridge_core::types::{
    credential_fragment, qualify_credential_id, split_did, CredentialRequest, DocumentEdit, IdentityFilter,
    ListenerKind, PrivateIdentityRequest, Service, TransactionOutcome,
};
use did_bridge_core::{
    Args, CapabilityProvider, ChannelId, CommandEnvelope, Error, Handle, HandleTable,
    LedgerAdapter, NativeCredential, NativeDocument, NativeIssuer, ObjectKind, ObjectRef,
    ProviderResult, Result, Target,
};
use serde_json::{json, Value};
use tracing::debug;

use crate::adapter::{StoreAdapter, TransactionHub};
use crate::config::{is_http_url, BridgeConfig};
use crate::resolver::HttpResolver;

/// Where an operation runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// On the bounded worker pool.
    Worker,
    /// Immediately, bypassing the pool.
    Inline,
}

/// One entry of the operation table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Operation {
    /// Wire name.
    pub name: &'static str,
    /// What the command must be addressed to.
    pub target: Target,
    /// Exact number of arguments.
    pub arity: usize,
    /// Execution mode.
    pub mode: Mode,
    /// Whether replies keep the channel open.
    pub listener: bool,
}

const fn op(target: Target, name: &'static str, arity: usize) -> Operation {
    Operation {
        name,
        target,
        arity,
        mode: Mode::Worker,
        listener: false,
    }
}

const fn inline(target: Target, name: &'static str, arity: usize) -> Operation {
    Operation {
        name,
        target,
        arity,
        mode: Mode::Inline,
        listener: false,
    }
}

/// Every operation the bridge understands.
pub const OPERATIONS: &[Operation] = &[
    inline(Target::Manager, "getVersion", 0),
    Operation {
        name: "setListener",
        target: Target::Manager,
        arity: 1,
        mode: Mode::Inline,
        listener: true,
    },
    inline(Target::Manager, "setTransactionResult", 2),
    inline(Target::Manager, "reset", 0),
    op(Target::Manager, "initDidStore", 1),
    op(Target::Manager, "createDidDocumentFromJson", 1),
    op(Target::Manager, "generateMnemonic", 1),
    op(Target::Manager, "isMnemonicValid", 2),
    op(Target::Manager, "resolveDidDocument", 2),
    op(Target::Manager, "getMethod", 1),
    op(Target::Manager, "getMethodSpecificId", 1),
    op(Target::Manager, "parseJwt", 1),
    op(Target::Manager, "verifyPresentation", 1),
    op(Target::Store, "changePassword", 2),
    op(Target::Store, "containsPrivateIdentity", 0),
    op(Target::Store, "initPrivateIdentity", 5),
    op(Target::Store, "exportMnemonic", 1),
    op(Target::Store, "setResolverUrl", 1),
    op(Target::Store, "synchronize", 1),
    op(Target::Store, "newDid", 2),
    op(Target::Store, "listDids", 1),
    op(Target::Store, "loadDid", 1),
    op(Target::Store, "storeDid", 2),
    op(Target::Store, "deleteDid", 1),
    op(Target::Store, "prepareIssuer", 1),
    op(Target::Store, "loadCredential", 2),
    op(Target::Store, "storeCredential", 1),
    op(Target::Store, "deleteCredential", 2),
    op(Target::Store, "listCredentials", 1),
    op(Target::Store, "createPresentation", 5),
    op(Target::Store, "delete", 0),
    inline(Target::Store, "release", 0),
    op(Target::Document, "toJson", 0),
    op(Target::Document, "publish", 1),
    op(Target::Document, "sign", 2),
    op(Target::Document, "verify", 2),
    op(Target::Document, "addService", 2),
    op(Target::Document, "removeService", 2),
    op(Target::Document, "addCredential", 2),
    op(Target::Document, "removeCredential", 2),
    op(Target::Document, "getCredentials", 0),
    op(Target::Document, "getDefaultPublicKey", 0),
    op(Target::Document, "createJwt", 2),
    inline(Target::Document, "release", 0),
    op(Target::Issuer, "issueCredential", 6),
    inline(Target::Issuer, "release", 0),
    op(Target::Credential, "toJson", 0),
    inline(Target::Credential, "release", 0),
    op(Target::Adapter, "getResolverUrl", 0),
    inline(Target::Adapter, "release", 0),
];

/// Finds an operation.
///
/// # Errors
///
/// Returns [`Error::UnknownOperation`] if the target has no such operation
pub fn lookup(target: Target, name: &str) -> Result<&'static Operation> {
    OPERATIONS
        .iter()
        .find(|op| op.target == target && op.name == name)
        .ok_or_else(|| unknown(target, name))
}

fn unknown(target: Target, operation: &str) -> Error {
    Error::UnknownOperation {
        target: target.to_string(),
        operation: operation.to_string(),
    }
}

/// The handle table for a provider's object types.
pub type ObjectTable<P> = HandleTable<
    <P as CapabilityProvider>::Store,
    <P as CapabilityProvider>::Document,
    <P as CapabilityProvider>::Credential,
    <P as CapabilityProvider>::Issuer,
>;

const CREDENTIAL_ID: &str = "a credential id ('#fragment' or 'did:...#fragment')";
const DID: &str = "a DID string ('did:method:id')";

fn released(count: usize) -> Value {
    json!({ "released": count })
}

fn valid_store_id(id: &str) -> bool {
    let mut components = std::path::Path::new(id).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

/// Executes commands against a provider and the handle table.
pub struct Dispatcher<P: CapabilityProvider> {
    provider: P,
    table: ObjectTable<P>,
    hub: Arc<TransactionHub>,
    config: BridgeConfig,
    default_adapter: Arc<dyn LedgerAdapter>,
}

impl<P: CapabilityProvider> Dispatcher<P> {
    /// Creates a dispatcher.
    ///
    /// `default_adapter` serves stores that never had a resolver URL set, and
    /// manager-level resolution.
    #[must_use]
    pub fn new(
        provider: P,
        config: BridgeConfig,
        hub: Arc<TransactionHub>,
        default_adapter: Arc<dyn LedgerAdapter>,
    ) -> Self {
        Self {
            provider,
            table: ObjectTable::<P>::new(),
            hub,
            config,
            default_adapter,
        }
    }

    /// The capability provider.
    #[must_use]
    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// The handle table.
    #[must_use]
    pub fn table(&self) -> &ObjectTable<P> {
        &self.table
    }

    /// The transaction hub.
    #[must_use]
    pub fn hub(&self) -> &TransactionHub {
        &self.hub
    }

    /// Runs one command to completion.
    ///
    /// # Errors
    ///
    /// Returns the classified failure of whichever step failed
    pub async fn dispatch(&self, command: &CommandEnvelope) -> Result<Value> {
        let operation = lookup(command.target, &command.operation)?;
        let args = Args::new(operation.name, &command.args, operation.arity)?;
        debug!(
            target_kind = %command.target,
            handle = command.handle.map(Handle::value),
            operation = operation.name,
            channel = command.channel.0,
            "Dispatching command"
        );

        let Some(kind) = command.target.kind() else {
            return self.manager(operation.name, args, command.channel).await;
        };
        // Handle 0 is never issued, so a missing target handle misses too.
        let handle = command.handle.unwrap_or(Handle(0));
        if operation.name == "release" {
            return self.table.release(kind, handle).map(released);
        }
        match kind {
            ObjectKind::Store => {
                let store = self.table.stores().get(handle)?;
                self.store(operation.name, &store, args).await
            }
            ObjectKind::Document => {
                let document = self.table.documents().get(handle)?;
                self.document(operation.name, &document, args).await
            }
            ObjectKind::Credential => {
                let credential = self.table.credentials().get(handle)?;
                match operation.name {
                    "toJson" => Ok(Value::from(credential.object.to_json())),
                    other => Err(unknown(command.target, other)),
                }
            }
            ObjectKind::Issuer => {
                let issuer = self.table.issuers().get(handle)?;
                self.issuer(operation.name, &issuer, args).await
            }
            ObjectKind::Adapter => {
                let adapter = self.table.adapters().get(handle)?;
                match operation.name {
                    "getResolverUrl" => Ok(Value::from(adapter.label)),
                    other => Err(unknown(command.target, other)),
                }
            }
        }
    }

    fn adapter_for(&self, store: Handle) -> Arc<dyn LedgerAdapter> {
        self.table
            .adapter_for(store)
            .map_or_else(|| Arc::clone(&self.default_adapter), |adapter| adapter.object)
    }

    fn owning_store(&self, document: &Resolved<P::Document>) -> Result<Resolved<P::Store>> {
        let missing = || Error::StoreNotFound(format!("{} is not attached to a store", document.label));
        let owner = document.owner.ok_or_else(missing)?;
        self.table.stores().get(owner).map_err(|_| missing())
    }

    async fn manager(&self, operation: &str, args: Args<'_>, channel: ChannelId) -> Result<Value> {
        match operation {
            "getVersion" => Ok(Value::from(self.provider.version())),
            "setListener" => {
                let kind = args.i64(0)?;
                ListenerKind::from_code(kind)
                    .ok_or_else(|| Error::invalid_argument(0, "listener type 1 (id transaction)"))?;
                self.hub.set_listener(channel);
                Ok(json!({ "listening": true, "type": kind }))
            }
            "setTransactionResult" => {
                let correlation_id = args.non_empty_str(0)?;
                let outcome: TransactionOutcome =
                    serde_json::from_value(Value::Object(args.object(1)?.clone()))
                        .map_err(|_| Error::invalid_argument(1, "{accepted, details?}"))?;
                self.hub.resolve(correlation_id, outcome)?;
                Ok(Value::Null)
            }
            "reset" => Ok(released(self.table.reset())),
            "initDidStore" => {
                let id = args.non_empty_str(0)?;
                if !valid_store_id(id) {
                    return Err(Error::invalid_argument(0, "a store id without path separators"));
                }
                let root = self.config.store_root(id);
                let store = self.provider.open_store(&root).await?;
                let handle = self.table.insert_store(store, id);
                Ok(ObjectRef::new(handle, ObjectKind::Store)
                    .with("id", id)
                    .with("path", root.display().to_string())
                    .into_value())
            }
            "createDidDocumentFromJson" => {
                let json = args.json_text(0)?;
                let document = self.provider.document_from_json(&json)?;
                self.insert_document(document, None)
            }
            "generateMnemonic" => Ok(Value::from(self.provider.generate_mnemonic(args.str(0)?)?)),
            "isMnemonicValid" => Ok(Value::from(
                self.provider.is_mnemonic_valid(args.str(0)?, args.str(1)?)?,
            )),
            "resolveDidDocument" => {
                let did = args.non_empty_str(0)?;
                let force_remote = args.bool(1)?;
                let document = self
                    .provider
                    .resolve_document(did, force_remote, self.default_adapter.as_ref())
                    .await?
                    .ok_or_else(|| Error::DocumentNotFound(did.to_string()))?;
                self.insert_document(document, None)
            }
            "getMethod" | "getMethodSpecificId" => {
                let (method, specific) =
                    split_did(args.str(0)?).ok_or_else(|| Error::invalid_argument(0, DID))?;
                Ok(Value::from(if operation == "getMethod" {
                    method
                } else {
                    specific
                }))
            }
            "parseJwt" => {
                let parsed = self.provider.parse_jwt(args.non_empty_str(0)?).await?;
                Ok(serde_json::to_value(parsed)?)
            }
            "verifyPresentation" => {
                let status = self.provider.verify_presentation(&args.json_text(0)?).await?;
                Ok(serde_json::to_value(status)?)
            }
            other => Err(unknown(Target::Manager, other)),
        }
    }

    fn insert_document(&self, document: P::Document, owner: Option<Handle>) -> Result<Value> {
        let did = document.did().to_string();
        let updated = document.updated();
        let handle = self.table.insert_document(document, owner, did.clone())?;
        let mut object = ObjectRef::new(handle, ObjectKind::Document).with("did", did);
        if let Some(updated) = updated {
            object = object.with("updated", updated);
        }
        Ok(object.into_value())
    }

    #[allow(clippy::too_many_lines)]
    async fn store(
        &self,
        operation: &str,
        store: &Resolved<P::Store>,
        args: Args<'_>,
    ) -> Result<Value> {
        let provider = &self.provider;
        let native = store.object.as_ref();
        match operation {
            "changePassword" => {
                provider
                    .change_password(native, args.str(0)?, args.non_empty_str(1)?)
                    .await?;
                Ok(Value::Null)
            }
            "containsPrivateIdentity" => {
                Ok(Value::from(provider.contains_private_identity(native).await?))
            }
            "initPrivateIdentity" => {
                let request = PrivateIdentityRequest {
                    language: args.str(0)?.to_string(),
                    mnemonic: args.non_empty_str(1)?.to_string(),
                    passphrase: args.opt_str(2)?.unwrap_or_default().to_string(),
                    storepass: args.non_empty_str(3)?.to_string(),
                    force: args.bool(4)?,
                };
                provider.init_private_identity(native, request).await?;
                Ok(Value::Null)
            }
            "exportMnemonic" => Ok(Value::from(
                provider.export_mnemonic(native, args.str(0)?).await?,
            )),
            "setResolverUrl" => {
                let url = args.non_empty_str(0)?;
                if !is_http_url(url) {
                    return Err(Error::invalid_argument(0, "an http(s) URL"));
                }
                let resolver = HttpResolver::new(url, self.config.http_timeout)
                    .map_err(|e| Error::Provider(e.to_string()))?;
                let adapter = Arc::new(StoreAdapter::new(Arc::clone(&self.hub), resolver));
                let (handle, replaced) = self.table.replace_adapter(adapter, store.handle, url)?;
                debug!(store = store.handle.value(), replaced, resolver = url, "Resolver URL set");
                Ok(ObjectRef::new(handle, ObjectKind::Adapter)
                    .with("resolver", url)
                    .into_value())
            }
            "synchronize" => {
                let adapter = self.adapter_for(store.handle);
                provider
                    .synchronize(native, args.str(0)?, adapter.as_ref())
                    .await?;
                Ok(Value::Null)
            }
            "newDid" => {
                let document = provider
                    .new_identity(native, args.str(0)?, args.opt_str(1)?)
                    .await?;
                self.insert_document(document, Some(store.handle))
            }
            "listDids" => {
                let filter = IdentityFilter::from_code(args.i64(0)?).ok_or_else(|| {
                    Error::invalid_argument(0, "a filter (0 private, 1 no private, 2 all)")
                })?;
                Ok(serde_json::to_value(provider.list_identities(native, filter).await?)?)
            }
            "loadDid" => {
                let did = args.non_empty_str(0)?;
                let document = provider
                    .load_document(native, did)
                    .await?
                    .ok_or_else(|| Error::DocumentNotFound(did.to_string()))?;
                self.insert_document(document, Some(store.handle))
            }
            "storeDid" => {
                let document = self.table.documents().get(args.handle(0)?)?;
                let alias = args.opt_str(1)?;
                provider
                    .store_document(native, document.object.as_ref(), alias)
                    .await?;
                Ok(Value::Null)
            }
            "deleteDid" => Ok(Value::from(
                provider.delete_identity(native, args.non_empty_str(0)?).await?,
            )),
            "prepareIssuer" => {
                let did = args.non_empty_str(0)?;
                let issuer = provider.create_issuer(native, did).await?;
                let handle = self.table.insert_issuer(issuer, store.handle, did)?;
                Ok(ObjectRef::new(handle, ObjectKind::Issuer)
                    .with("did", did)
                    .into_value())
            }
            "loadCredential" => {
                let did = args.non_empty_str(0)?;
                let id = qualify_credential_id(did, args.str(1)?)
                    .ok_or_else(|| Error::invalid_argument(1, CREDENTIAL_ID))?;
                let credential = provider
                    .load_credential(native, did, &id)
                    .await?
                    .ok_or_else(|| Error::CredentialNotFound(id.clone()))?;
                self.insert_credential(credential, Some(store.handle))
            }
            "storeCredential" => {
                let credential = provider.credential_from_json(&args.json_text(0)?)?;
                provider.store_credential(native, &credential).await?;
                self.insert_credential(credential, Some(store.handle))
            }
            "deleteCredential" => {
                let did = args.non_empty_str(0)?;
                let id = qualify_credential_id(did, args.str(1)?)
                    .ok_or_else(|| Error::invalid_argument(1, CREDENTIAL_ID))?;
                Ok(Value::from(provider.delete_credential(native, did, &id).await?))
            }
            "listCredentials" => Ok(serde_json::to_value(
                provider
                    .list_credentials(native, args.non_empty_str(0)?)
                    .await?,
            )?),
            "createPresentation" => {
                let did = args.non_empty_str(0)?;
                let credentials = args.string_list(1)?;
                let (realm, nonce, storepass) = (args.str(2)?, args.str(3)?, args.str(4)?);
                let credentials = credentials
                    .iter()
                    .map(|json| provider.credential_from_json(json))
                    .collect::<ProviderResult<Vec<_>>>()?;
                let presentation = provider
                    .create_presentation(native, did, &credentials, realm, nonce, storepass)
                    .await?;
                Ok(Value::from(presentation))
            }
            "delete" => {
                let root = self.config.store_root(&store.label);
                provider.delete_store(&root).await?;
                Ok(released(self.table.release(ObjectKind::Store, store.handle)?))
            }
            other => Err(unknown(Target::Store, other)),
        }
    }

    fn insert_credential(&self, credential: P::Credential, owner: Option<Handle>) -> Result<Value> {
        let id = credential.id().to_string();
        let json = credential.to_json();
        let handle = self.table.insert_credential(credential, owner, id.clone())?;
        Ok(ObjectRef::new(handle, ObjectKind::Credential)
            .with("id", id)
            .with("json", json)
            .into_value())
    }

    async fn seal(
        &self,
        document: &Resolved<P::Document>,
        edit: DocumentEdit,
        storepass: &str,
    ) -> Result<Value> {
        let store = self.owning_store(document)?;
        let sealed = self
            .provider
            .seal_document(store.object.as_ref(), document.object.as_ref(), edit, storepass)
            .await?;
        self.insert_document(sealed, Some(store.handle))
    }

    async fn document(
        &self,
        operation: &str,
        document: &Resolved<P::Document>,
        args: Args<'_>,
    ) -> Result<Value> {
        let provider = &self.provider;
        let native = document.object.as_ref();
        match operation {
            "toJson" => Ok(Value::from(native.to_json())),
            "publish" => {
                let store = self.owning_store(document)?;
                let adapter = self.adapter_for(store.handle);
                let txid = provider
                    .publish(store.object.as_ref(), native, args.str(0)?, adapter.as_ref())
                    .await?;
                Ok(json!({ "txid": txid }))
            }
            "sign" => {
                let store = self.owning_store(document)?;
                let signature = provider
                    .sign(store.object.as_ref(), native, args.str(0)?, args.str(1)?.as_bytes())
                    .await?;
                Ok(Value::from(signature))
            }
            "verify" => Ok(Value::from(provider.verify(
                native,
                args.non_empty_str(0)?,
                args.str(1)?.as_bytes(),
            )?)),
            "addService" => {
                let service: Service =
                    serde_json::from_value(Value::Object(args.object(0)?.clone()))
                        .map_err(|_| Error::invalid_argument(0, "a service {id, type, endpoint}"))?;
                self.seal(document, DocumentEdit::AddService(service), args.str(1)?)
                    .await
            }
            "removeService" => {
                let id = args.non_empty_str(0)?.to_string();
                self.seal(document, DocumentEdit::RemoveService(id), args.str(1)?)
                    .await
            }
            "addCredential" => {
                let json = args.json_text(0)?;
                self.seal(document, DocumentEdit::AddCredential(json), args.str(1)?)
                    .await
            }
            "removeCredential" => {
                let id = args.str(0)?;
                if credential_fragment(id).is_none() {
                    return Err(Error::invalid_argument(0, CREDENTIAL_ID));
                }
                self.seal(document, DocumentEdit::RemoveCredential(id.to_string()), args.str(1)?)
                    .await
            }
            "getCredentials" => Ok(Value::from(native.credentials())),
            "getDefaultPublicKey" => {
                let key = native.default_public_key().ok_or_else(|| {
                    Error::Provider(format!("{} has no default public key", native.did()))
                })?;
                Ok(serde_json::to_value(key)?)
            }
            "createJwt" => {
                let store = self.owning_store(document)?;
                let claims = args.object(0)?.clone();
                let token = provider
                    .create_jwt(store.object.as_ref(), native, claims, args.str(1)?)
                    .await?;
                Ok(Value::from(token))
            }
            other => Err(unknown(Target::Document, other)),
        }
    }

    async fn issuer(
        &self,
        operation: &str,
        issuer: &Resolved<P::Issuer>,
        args: Args<'_>,
    ) -> Result<Value> {
        match operation {
            "issueCredential" => {
                let subject = args.non_empty_str(0)?;
                let id = qualify_credential_id(subject, args.str(1)?)
                    .ok_or_else(|| Error::invalid_argument(1, CREDENTIAL_ID))?;
                let request = CredentialRequest {
                    subject: subject.to_string(),
                    id,
                    types: args.string_list(2)?,
                    expiration_days: args.u32(3)?,
                    properties: args.object(4)?.clone(),
                };
                let credential = self
                    .provider
                    .issue_credential(issuer.object.as_ref(), request, args.str(5)?)
                    .await?;
                debug!(issuer = issuer.object.did(), id = credential.id(), "Credential issued");
                self.insert_credential(credential, issuer.owner)
            }
            other => Err(unknown(Target::Issuer, other)),
        }
    }
}
