use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use did_bridge_core::{ChannelId, CommandEnvelope, Delivery, ErrorCode, Handle, Reply, Target};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::channel::Inbox;
use crate::memory::MemoryProvider;
use crate::{Bridge, BridgeConfig};

const MNEMONIC: &str =
    "abandon ability able about above absent absorb abstract absurd abuse access accident";

const EMAIL_CREDENTIAL: &str = r##"{"id":"#email","type":["EmailCredential"],"credentialSubject":{"id":"did:mem:alice","email":"alice@example.com"}}"##;

const LISTENER: ChannelId = ChannelId(1_000);

/// Nothing listens here, so resolution fails fast with a connection error.
const DEAD_RESOLVER: &str = "http://127.0.0.1:9";

struct Harness {
    bridge: Bridge<MemoryProvider>,
    inbox: Inbox,
    channels: AtomicU64,
}

fn handle_of(value: &Value) -> Handle {
    Handle(value["handle"].as_u64().expect("object reference"))
}

impl Harness {
    fn new() -> Self {
        Self::with_config(BridgeConfig::default().with_resolver_url(DEAD_RESOLVER))
    }

    fn with_config(config: BridgeConfig) -> Self {
        let (bridge, inbox) = Bridge::new(config, MemoryProvider::new()).unwrap();
        Self {
            bridge,
            inbox,
            channels: AtomicU64::new(1),
        }
    }

    fn command(
        &self,
        target: Target,
        handle: Option<Handle>,
        operation: &str,
        args: Vec<Value>,
    ) -> CommandEnvelope {
        CommandEnvelope {
            target,
            handle,
            operation: operation.into(),
            args,
            channel: ChannelId(self.channels.fetch_add(1, Ordering::Relaxed)),
        }
    }

    async fn call(
        &self,
        target: Target,
        handle: Option<Handle>,
        operation: &str,
        args: Vec<Value>,
    ) -> Delivery {
        self.bridge
            .execute(self.command(target, handle, operation, args))
            .await
    }

    async fn ok(
        &self,
        target: Target,
        handle: Option<Handle>,
        operation: &str,
        args: Vec<Value>,
    ) -> Value {
        match self.call(target, handle, operation, args).await.reply {
            Reply::Ok(value) => value,
            Reply::Err { code, message } => panic!("{operation} failed: {code:?} {message}"),
        }
    }

    async fn err(
        &self,
        target: Target,
        handle: Option<Handle>,
        operation: &str,
        args: Vec<Value>,
    ) -> (ErrorCode, String) {
        match self.call(target, handle, operation, args).await.reply {
            Reply::Ok(value) => panic!("{operation} unexpectedly returned {value}"),
            Reply::Err { code, message } => (code, message),
        }
    }

    async fn listen(&self) {
        let ack = self
            .bridge
            .execute(CommandEnvelope::manager("setListener", vec![json!(1)], LISTENER))
            .await;
        assert!(ack.keep_open);
    }

    async fn store(&self, id: &str) -> Handle {
        let store = self
            .ok(Target::Manager, None, "initDidStore", vec![json!(id)])
            .await;
        let handle = handle_of(&store);
        self.ok(
            Target::Store,
            Some(handle),
            "initPrivateIdentity",
            vec![json!("english"), json!(MNEMONIC), json!(""), json!("pw"), json!(false)],
        )
        .await;
        handle
    }

    async fn new_did(&self, store: Handle) -> (Handle, String) {
        let document = self
            .ok(Target::Store, Some(store), "newDid", vec![json!("pw"), Value::Null])
            .await;
        let did = document["did"].as_str().unwrap().to_string();
        (handle_of(&document), did)
    }

    async fn next(&mut self) -> Delivery {
        tokio::time::timeout(Duration::from_secs(5), self.inbox.recv())
            .await
            .expect("delivery within 5s")
            .expect("inbox open")
    }

    /// Submits a publish and returns its channel with the correlation id of
    /// the event it raised.
    async fn start_publish(&mut self, document: Handle) -> (ChannelId, String) {
        let publish = self.command(Target::Document, Some(document), "publish", vec![json!("pw")]);
        let channel = publish.channel;
        self.bridge.submit(publish);

        let event = self.next().await;
        assert_eq!(event.channel, LISTENER);
        assert!(event.keep_open);
        let body = event.reply.value().unwrap();
        let correlation_id = body["correlationId"].as_str().unwrap().to_string();
        (channel, correlation_id)
    }

    async fn answer(&self, correlation_id: &str, outcome: Value) -> Delivery {
        self.call(
            Target::Manager,
            None,
            "setTransactionResult",
            vec![json!(correlation_id), outcome],
        )
        .await
    }

    async fn publish(&mut self, document: Handle) -> Value {
        let (channel, correlation_id) = self.start_publish(document).await;
        let answered = self
            .answer(&correlation_id, json!({"accepted": true, "details": {"txid": "0xabc"}}))
            .await;
        assert_eq!(answered.reply, Reply::Ok(Value::Null));
        let done = self.next().await;
        assert_eq!(done.channel, channel);
        done.reply.value().cloned().unwrap()
    }
}

#[tokio::test]
async fn test_publish_round_trip() {
    let mut h = Harness::new();
    h.listen().await;
    let store = h.store("alice").await;
    let (document, did) = h.new_did(store).await;

    let (channel, correlation_id) = h.start_publish(document).await;
    let answered = h
        .answer(&correlation_id, json!({"accepted": true, "details": {"txid": "0xabc"}}))
        .await;
    assert_eq!(answered.reply, Reply::Ok(Value::Null));

    let done = h.next().await;
    assert_eq!(
        serde_json::to_value(&done).unwrap(),
        json!({"channel": channel.0, "ok": true, "value": {"txid": "0xabc"}})
    );
    assert!(h.bridge.dispatcher().provider().published(&did).is_some());
    assert_eq!(h.bridge.dispatcher().hub().pending_count(), 0);

    // A second answer for the same transaction has nothing to complete.
    let again = h.answer(&correlation_id, json!({"accepted": true})).await;
    assert_eq!(again.reply.code(), Some(ErrorCode::TransactionCorrelationMismatch));
}

#[tokio::test]
async fn test_rejected_publish_fails() {
    let mut h = Harness::new();
    h.listen().await;
    let store = h.store("alice").await;
    let (document, did) = h.new_did(store).await;

    let (channel, correlation_id) = h.start_publish(document).await;
    h.answer(&correlation_id, json!({"accepted": false})).await;

    let done = h.next().await;
    assert_eq!(done.channel, channel);
    assert_eq!(done.reply.code(), Some(ErrorCode::ProviderError));
    assert!(h.bridge.dispatcher().provider().published(&did).is_none());
}

#[tokio::test]
async fn test_publish_without_listener() {
    let h = Harness::new();
    let store = h.store("alice").await;
    let (document, _) = h.new_did(store).await;

    let (code, _) = h
        .err(Target::Document, Some(document), "publish", vec![json!("pw")])
        .await;
    assert_eq!(code, ErrorCode::NoTransactionListener);
}

#[tokio::test]
async fn test_unanswered_publish_times_out() {
    let mut h = Harness::with_config(BridgeConfig {
        transaction_timeout: Duration::from_millis(100),
        ..BridgeConfig::default().with_resolver_url(DEAD_RESOLVER)
    });
    h.listen().await;
    let store = h.store("alice").await;
    let (document, _) = h.new_did(store).await;

    let (channel, correlation_id) = h.start_publish(document).await;
    let done = h.next().await;
    assert_eq!(done.channel, channel);
    assert_eq!(done.reply.code(), Some(ErrorCode::TransactionTimeout));

    let late = h.answer(&correlation_id, json!({"accepted": true})).await;
    assert_eq!(late.reply.code(), Some(ErrorCode::TransactionCorrelationMismatch));
}

#[tokio::test]
async fn test_answers_bypass_a_saturated_pool() {
    let mut h = Harness::with_config(BridgeConfig {
        max_in_flight: 1,
        ..BridgeConfig::default().with_resolver_url(DEAD_RESOLVER)
    });
    h.listen().await;
    let store = h.store("alice").await;
    let (document, _) = h.new_did(store).await;

    // The parked publish holds the only worker.
    let (publish_channel, correlation_id) = h.start_publish(document).await;
    let list = h.command(Target::Store, Some(store), "listDids", vec![json!(2)]);
    let list_channel = list.channel;
    h.bridge.submit(list);
    assert!(
        tokio::time::timeout(Duration::from_millis(50), h.inbox.recv())
            .await
            .is_err(),
        "worker ops must wait for the parked publish"
    );

    let answered = h.answer(&correlation_id, json!({"accepted": true})).await;
    assert!(answered.reply.is_ok());

    let mut finished = HashSet::new();
    for _ in 0..2 {
        let delivery = h.next().await;
        assert!(delivery.reply.is_ok());
        finished.insert(delivery.channel);
    }
    assert_eq!(finished, HashSet::from([publish_channel, list_channel]));
}

#[tokio::test]
async fn test_release_cascades_to_documents() {
    let h = Harness::new();
    let store = h.store("alice").await;
    let (document, _) = h.new_did(store).await;

    let released = h.ok(Target::Store, Some(store), "release", vec![]).await;
    assert_eq!(released, json!({"released": 2}));

    let (code, _) = h.err(Target::Document, Some(document), "toJson", vec![]).await;
    assert_eq!(code, ErrorCode::HandleNotFound);
    let (code, _) = h.err(Target::Store, Some(store), "listDids", vec![json!(2)]).await;
    assert_eq!(code, ErrorCode::HandleNotFound);
}

#[tokio::test]
async fn test_wrong_kind_handle_never_reaches_provider() {
    let h = Harness::new();
    let store = h.store("alice").await;
    let credential = h
        .ok(Target::Store, Some(store), "storeCredential", vec![json!(EMAIL_CREDENTIAL)])
        .await;
    let credential = handle_of(&credential);

    let (code, _) = h.err(Target::Document, Some(credential), "toJson", vec![]).await;
    assert_eq!(code, ErrorCode::HandleNotFound);

    let (code, message) = h
        .err(Target::Store, Some(store), "storeDid", vec![json!(credential.0), Value::Null])
        .await;
    assert_eq!(code, ErrorCode::HandleNotFound);
    assert!(message.contains(&credential.to_string()));
    let dids = h.ok(Target::Store, Some(store), "listDids", vec![json!(2)]).await;
    assert_eq!(dids, json!([]));
}

#[tokio::test]
async fn test_arguments_are_checked_before_handles() {
    let h = Harness::new();
    let stale = Some(Handle(999_999));

    let (code, message) = h.err(Target::Document, stale, "sign", vec![json!("pw")]).await;
    assert_eq!(code, ErrorCode::InvalidArgumentCount);
    assert!(message.contains("sign"));

    let (code, _) = h.err(Target::Document, stale, "sign", vec![json!("pw"), json!("data")]).await;
    assert_eq!(code, ErrorCode::HandleNotFound);

    let (code, _) = h.err(Target::Manager, None, "initDidStore", vec![json!(42)]).await;
    assert_eq!(code, ErrorCode::InvalidArgumentType);

    let (code, _) = h.err(Target::Manager, None, "initDidStore", vec![json!("../escape")]).await;
    assert_eq!(code, ErrorCode::InvalidArgumentType);

    let (code, _) = h.err(Target::Manager, None, "frobnicate", vec![]).await;
    assert_eq!(code, ErrorCode::UnknownOperation);
}

#[tokio::test]
async fn test_credential_json_round_trip() {
    let h = Harness::new();
    let store = h.store("alice").await;

    let stored = h
        .ok(Target::Store, Some(store), "storeCredential", vec![json!(EMAIL_CREDENTIAL)])
        .await;
    assert_eq!(stored["id"], json!("did:mem:alice#email"));
    assert_eq!(stored["json"], json!(EMAIL_CREDENTIAL));

    let text = h
        .ok(Target::Credential, Some(handle_of(&stored)), "toJson", vec![])
        .await;
    assert_eq!(text, json!(EMAIL_CREDENTIAL));

    for id in ["#email", "did:mem:alice#email"] {
        let loaded = h
            .ok(
                Target::Store,
                Some(store),
                "loadCredential",
                vec![json!("did:mem:alice"), json!(id)],
            )
            .await;
        assert_eq!(loaded["json"], json!(EMAIL_CREDENTIAL));
    }

    let (code, _) = h
        .err(
            Target::Store,
            Some(store),
            "loadCredential",
            vec![json!("did:mem:alice"), json!("email")],
        )
        .await;
    assert_eq!(code, ErrorCode::InvalidArgumentType);

    let listed = h
        .ok(Target::Store, Some(store), "listCredentials", vec![json!("did:mem:alice")])
        .await;
    assert_eq!(listed, json!([{"id": "did:mem:alice#email", "alias": null}]));

    let deleted = h
        .ok(
            Target::Store,
            Some(store),
            "deleteCredential",
            vec![json!("did:mem:alice"), json!("#email")],
        )
        .await;
    assert_eq!(deleted, json!(true));
    let (code, _) = h
        .err(
            Target::Store,
            Some(store),
            "loadCredential",
            vec![json!("did:mem:alice"), json!("#email")],
        )
        .await;
    assert_eq!(code, ErrorCode::CredentialNotFound);
}

#[tokio::test]
async fn test_document_edits_return_new_handles() {
    let h = Harness::new();
    let store = h.store("alice").await;
    let (document, did) = h.new_did(store).await;

    let edited = h
        .ok(
            Target::Document,
            Some(document),
            "addService",
            vec![
                json!({"id": "#hub", "type": "Hub", "endpoint": "https://hub.example"}),
                json!("pw"),
            ],
        )
        .await;
    let edited = handle_of(&edited);
    assert_ne!(edited, document);

    let before = h.ok(Target::Document, Some(document), "toJson", vec![]).await;
    let after = h.ok(Target::Document, Some(edited), "toJson", vec![]).await;
    assert!(!before.as_str().unwrap().contains("hub.example"));
    assert!(after.as_str().unwrap().contains("hub.example"));

    let credential = json!({
        "id": "#profile",
        "type": ["ProfileCredential"],
        "credentialSubject": {"id": did, "name": "Alice"},
    })
    .to_string();
    let with_credential = h
        .ok(
            Target::Document,
            Some(edited),
            "addCredential",
            vec![json!(credential), json!("pw")],
        )
        .await;
    let with_credential = handle_of(&with_credential);
    let embedded = h
        .ok(Target::Document, Some(with_credential), "getCredentials", vec![])
        .await;
    assert_eq!(embedded, json!([credential]));

    let (code, _) = h
        .err(
            Target::Document,
            Some(with_credential),
            "removeCredential",
            vec![json!("profile"), json!("pw")],
        )
        .await;
    assert_eq!(code, ErrorCode::InvalidArgumentType);
    let (code, _) = h
        .err(
            Target::Document,
            Some(with_credential),
            "removeCredential",
            vec![json!("#missing"), json!("pw")],
        )
        .await;
    assert_eq!(code, ErrorCode::CredentialNotFound);

    let (code, _) = h
        .err(
            Target::Document,
            Some(with_credential),
            "removeService",
            vec![json!("#nope"), json!("pw")],
        )
        .await;
    assert_eq!(code, ErrorCode::ProviderError);

    let key = h
        .ok(Target::Document, Some(with_credential), "getDefaultPublicKey", vec![])
        .await;
    assert_eq!(key["id"], json!(format!("{did}#primary")));
}

#[tokio::test]
async fn test_sign_verify_and_jwt() {
    let h = Harness::new();
    let store = h.store("alice").await;
    let (document, did) = h.new_did(store).await;

    let signature = h
        .ok(Target::Document, Some(document), "sign", vec![json!("pw"), json!("hello")])
        .await;
    let verified = h
        .ok(Target::Document, Some(document), "verify", vec![signature.clone(), json!("hello")])
        .await;
    assert_eq!(verified, json!(true));

    let (code, _) = h
        .err(Target::Document, Some(document), "sign", vec![json!("nope"), json!("hello")])
        .await;
    assert_eq!(code, ErrorCode::WrongPassword);

    let token = h
        .ok(
            Target::Document,
            Some(document),
            "createJwt",
            vec![json!({"sub": "bob"}), json!("pw")],
        )
        .await;
    let parsed = h.ok(Target::Manager, None, "parseJwt", vec![token]).await;
    assert_eq!(parsed["valid"], json!(true));
    assert_eq!(parsed["claims"]["iss"], json!(did));
    assert_eq!(parsed["claims"]["sub"], json!("bob"));
}

#[tokio::test]
async fn test_issue_and_verify_presentation() {
    let h = Harness::new();
    let store = h.store("alice").await;
    let (_, did) = h.new_did(store).await;

    let issuer = h
        .ok(Target::Store, Some(store), "prepareIssuer", vec![json!(did)])
        .await;
    let credential = h
        .ok(
            Target::Issuer,
            Some(handle_of(&issuer)),
            "issueCredential",
            vec![
                json!(did),
                json!("#profile"),
                json!(["ProfileCredential"]),
                json!(30),
                json!({"name": "Alice"}),
                json!("pw"),
            ],
        )
        .await;
    assert_eq!(credential["id"], json!(format!("{did}#profile")));

    let presentation = h
        .ok(
            Target::Store,
            Some(store),
            "createPresentation",
            vec![
                json!(did),
                json!([credential["json"].clone()]),
                json!("realm"),
                json!("nonce"),
                json!("pw"),
            ],
        )
        .await;
    let status = h
        .ok(Target::Manager, None, "verifyPresentation", vec![presentation])
        .await;
    assert_eq!(status, json!({"valid": true, "genuine": true}));

    // Issuers die with their store.
    h.ok(Target::Store, Some(store), "release", vec![]).await;
    let (code, _) = h
        .err(Target::Issuer, Some(handle_of(&issuer)), "release", vec![])
        .await;
    assert_eq!(code, ErrorCode::HandleNotFound);
}

#[tokio::test]
async fn test_detached_documents_have_no_store() {
    let mut h = Harness::new();
    h.listen().await;
    let store = h.store("alice").await;
    let (document, did) = h.new_did(store).await;
    h.publish(document).await;

    let resolved = h
        .ok(Target::Manager, None, "resolveDidDocument", vec![json!(did), json!(false)])
        .await;
    assert_eq!(resolved["did"], json!(did));
    let (code, _) = h
        .err(
            Target::Document,
            Some(handle_of(&resolved)),
            "sign",
            vec![json!("pw"), json!("hello")],
        )
        .await;
    assert_eq!(code, ErrorCode::StoreNotFound);

    let text = h.ok(Target::Document, Some(document), "toJson", vec![]).await;
    let parsed = h
        .ok(Target::Manager, None, "createDidDocumentFromJson", vec![text])
        .await;
    assert_eq!(parsed["did"], json!(did));
    let (code, _) = h
        .err(Target::Document, Some(handle_of(&parsed)), "publish", vec![json!("pw")])
        .await;
    assert_eq!(code, ErrorCode::StoreNotFound);
}

#[tokio::test]
async fn test_network_failures_are_normalised() {
    let h = Harness::new();
    let (code, message) = h
        .err(
            Target::Manager,
            None,
            "resolveDidDocument",
            vec![json!("did:mem:nobody"), json!(true)],
        )
        .await;
    assert_eq!(code, ErrorCode::ProviderError);
    assert_eq!(message, "network error");
}

#[tokio::test]
async fn test_synchronize_uses_the_store_resolver() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let mut h = Harness::new();
    h.listen().await;
    let alice = h.store("alice").await;
    let (document, did) = h.new_did(alice).await;
    h.publish(document).await;

    let bob = h.store("bob").await;
    let (code, _) = h
        .err(Target::Store, Some(bob), "synchronize", vec![json!("pw")])
        .await;
    assert_eq!(code, ErrorCode::ProviderError);

    let adapter = h
        .ok(Target::Store, Some(bob), "setResolverUrl", vec![json!(server.uri())])
        .await;
    assert_eq!(adapter["resolver"], json!(server.uri()));
    h.ok(Target::Store, Some(bob), "synchronize", vec![json!("pw")])
        .await;

    let dids = h.ok(Target::Store, Some(bob), "listDids", vec![json!(2)]).await;
    assert_eq!(dids, json!([{"did": did, "alias": null}]));
    assert!(!server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_set_resolver_url_replaces_adapter() {
    let h = Harness::new();
    let store = h.store("alice").await;

    let first = h
        .ok(Target::Store, Some(store), "setResolverUrl", vec![json!("http://one.example")])
        .await;
    let second = h
        .ok(Target::Store, Some(store), "setResolverUrl", vec![json!("http://two.example")])
        .await;
    assert_ne!(handle_of(&first), handle_of(&second));

    let url = h
        .ok(Target::Adapter, Some(handle_of(&second)), "getResolverUrl", vec![])
        .await;
    assert_eq!(url, json!("http://two.example"));
    let (code, _) = h
        .err(Target::Adapter, Some(handle_of(&first)), "getResolverUrl", vec![])
        .await;
    assert_eq!(code, ErrorCode::HandleNotFound);

    let (code, _) = h
        .err(Target::Store, Some(store), "setResolverUrl", vec![json!("ftp://nope")])
        .await;
    assert_eq!(code, ErrorCode::InvalidArgumentType);
}

#[tokio::test]
async fn test_store_lifecycle() {
    let h = Harness::new();
    let store = h.store("alice").await;
    h.new_did(store).await;

    let mnemonic = h
        .ok(Target::Store, Some(store), "exportMnemonic", vec![json!("pw")])
        .await;
    assert_eq!(mnemonic, json!(MNEMONIC));
    let (code, _) = h
        .err(Target::Store, Some(store), "exportMnemonic", vec![json!("nope")])
        .await;
    assert_eq!(code, ErrorCode::WrongPassword);

    h.ok(
        Target::Store,
        Some(store),
        "changePassword",
        vec![json!("pw"), json!("pw2")],
    )
    .await;
    let (code, _) = h
        .err(Target::Store, Some(store), "exportMnemonic", vec![json!("pw")])
        .await;
    assert_eq!(code, ErrorCode::WrongPassword);

    let released = h.ok(Target::Store, Some(store), "delete", vec![]).await;
    assert_eq!(released, json!({"released": 2}));

    let reopened = h
        .ok(Target::Manager, None, "initDidStore", vec![json!("alice")])
        .await;
    let contains = h
        .ok(Target::Store, Some(handle_of(&reopened)), "containsPrivateIdentity", vec![])
        .await;
    assert_eq!(contains, json!(false));
}

#[tokio::test]
async fn test_mnemonic_operations() {
    let h = Harness::new();
    let mnemonic = h
        .ok(Target::Manager, None, "generateMnemonic", vec![json!("english")])
        .await;
    let valid = h
        .ok(
            Target::Manager,
            None,
            "isMnemonicValid",
            vec![json!("english"), mnemonic],
        )
        .await;
    assert_eq!(valid, json!(true));

    let (code, _) = h
        .err(Target::Manager, None, "generateMnemonic", vec![json!("klingon")])
        .await;
    assert_eq!(code, ErrorCode::ProviderError);
}

#[tokio::test]
async fn test_concurrent_commands_get_distinct_handles() {
    let mut h = Harness::new();
    let store = h.store("alice").await;

    let mut channels = HashSet::new();
    for _ in 0..32 {
        let command = h.command(Target::Store, Some(store), "newDid", vec![json!("pw"), Value::Null]);
        channels.insert(command.channel);
        h.bridge.submit(command);
    }

    let mut handles = HashSet::new();
    let mut dids = HashSet::new();
    for _ in 0..32 {
        let delivery = h.next().await;
        assert!(channels.remove(&delivery.channel));
        let value = delivery.reply.value().unwrap();
        assert!(handles.insert(handle_of(value)));
        assert!(dids.insert(value["did"].as_str().unwrap().to_string()));
    }
    assert!(channels.is_empty());
    assert!(!handles.contains(&store));
}

#[tokio::test]
async fn test_reset_releases_everything() {
    let h = Harness::new();
    let store = h.store("alice").await;
    let (document, _) = h.new_did(store).await;
    h.ok(Target::Store, Some(store), "setResolverUrl", vec![json!("http://one.example")])
        .await;

    let released = h.ok(Target::Manager, None, "reset", vec![]).await;
    assert_eq!(released, json!({"released": 3}));
    assert!(h.bridge.dispatcher().table().stores().is_empty());

    let (code, _) = h.err(Target::Document, Some(document), "toJson", vec![]).await;
    assert_eq!(code, ErrorCode::HandleNotFound);

    // Fresh handles never reuse released values.
    let again = h.store("again").await;
    assert!(again > document);
}

#[tokio::test]
async fn test_store_id_maps_to_one_handle() {
    let h = Harness::new();
    let first = h.store("alice").await;
    let second = h
        .ok(Target::Manager, None, "initDidStore", vec![json!("alice")])
        .await;
    assert_eq!(handle_of(&second), first);

    let (document, _) = h.new_did(first).await;
    let released = h.ok(Target::Store, Some(first), "delete", vec![]).await;
    assert_eq!(released, json!({"released": 2}));

    let (code, _) = h.err(Target::Store, Some(handle_of(&second)), "listDids", vec![json!(2)]).await;
    assert_eq!(code, ErrorCode::HandleNotFound);
    let (code, _) = h.err(Target::Document, Some(document), "toJson", vec![]).await;
    assert_eq!(code, ErrorCode::HandleNotFound);
}

#[tokio::test]
async fn test_provider_messages_are_kept_verbatim() {
    let h = Harness::new();
    let store = h.store("alice").await;
    let (document, did) = h.new_did(store).await;

    let text = h.ok(Target::Document, Some(document), "toJson", vec![]).await;
    let foreign = text.as_str().unwrap().replace(&did, "did:mem:xDNSq");
    let parsed = h
        .ok(Target::Manager, None, "createDidDocumentFromJson", vec![json!(foreign)])
        .await;
    h.ok(
        Target::Store,
        Some(store),
        "storeDid",
        vec![json!(handle_of(&parsed).0), Value::Null],
    )
    .await;

    let (code, message) = h
        .err(Target::Store, Some(store), "prepareIssuer", vec![json!("did:mem:xDNSq")])
        .await;
    assert_eq!(code, ErrorCode::ProviderError);
    assert_eq!(message, "no private key for did:mem:xDNSq");
}

#[tokio::test]
async fn test_issued_credential_survives_store_and_load() {
    let h = Harness::new();
    let store = h.store("alice").await;
    let (_, did) = h.new_did(store).await;

    let issuer = h
        .ok(Target::Store, Some(store), "prepareIssuer", vec![json!(did)])
        .await;
    let issued = h
        .ok(
            Target::Issuer,
            Some(handle_of(&issuer)),
            "issueCredential",
            vec![
                json!(did),
                json!("#passport"),
                json!(["PassportCredential"]),
                json!(365),
                json!({"nationality": "Finnish", "number": "X123"}),
                json!("pw"),
            ],
        )
        .await;

    h.ok(Target::Store, Some(store), "storeCredential", vec![issued["json"].clone()])
        .await;
    let loaded = h
        .ok(
            Target::Store,
            Some(store),
            "loadCredential",
            vec![json!(did), json!("#passport")],
        )
        .await;
    assert_eq!(loaded["json"], issued["json"]);

    let text = h
        .ok(Target::Credential, Some(handle_of(&loaded)), "toJson", vec![])
        .await;
    assert_eq!(text, issued["json"]);
}

#[tokio::test]
async fn test_presentation_arguments_are_checked_first() {
    let h = Harness::new();
    let store = h.store("alice").await;
    let (_, did) = h.new_did(store).await;

    let (code, message) = h
        .err(
            Target::Store,
            Some(store),
            "createPresentation",
            vec![json!(did), json!(["not a credential"]), json!(7), json!("nonce"), json!("pw")],
        )
        .await;
    assert_eq!(code, ErrorCode::InvalidArgumentType);
    assert!(message.starts_with("argument 2"), "{message}");
}

#[tokio::test]
async fn test_concurrent_resolver_updates_keep_one_adapter() {
    let mut h = Harness::new();
    let store = h.store("alice").await;

    for i in 0..16 {
        let command = h.command(
            Target::Store,
            Some(store),
            "setResolverUrl",
            vec![json!(format!("http://resolver{i}.example"))],
        );
        h.bridge.submit(command);
    }
    for _ in 0..16 {
        assert!(h.next().await.reply.is_ok());
    }

    assert_eq!(h.bridge.dispatcher().table().adapters().len(), 1);
    let adapter = h.bridge.dispatcher().table().adapter_for(store).unwrap();
    let url = h
        .ok(Target::Adapter, Some(adapter.handle), "getResolverUrl", vec![])
        .await;
    assert_eq!(url, json!(adapter.label));
}

#[tokio::test]
async fn test_did_string_parts() {
    let h = Harness::new();
    let method = h
        .ok(Target::Manager, None, "getMethod", vec![json!("did:elastos:icJ4z2DULrHEzYSvjKNJpKyhqFDxvYV7pN")])
        .await;
    assert_eq!(method, json!("elastos"));
    let specific = h
        .ok(
            Target::Manager,
            None,
            "getMethodSpecificId",
            vec![json!("did:elastos:icJ4z2DULrHEzYSvjKNJpKyhqFDxvYV7pN")],
        )
        .await;
    assert_eq!(specific, json!("icJ4z2DULrHEzYSvjKNJpKyhqFDxvYV7pN"));

    let (code, _) = h
        .err(Target::Manager, None, "getMethod", vec![json!("not-a-did")])
        .await;
    assert_eq!(code, ErrorCode::InvalidArgumentType);
}
