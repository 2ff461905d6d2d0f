//! In-process multi-node fixtures.
use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, Mutex, PoisonError},
};

use async_trait::async_trait;

use crate::{
    codec::{decode_party_info, decode_payload_with_recipients, encode_party_info},
    constants::{PARTYINFO_PATH, PARTYINFO_VALIDATE_PATH, PUSH_PATH, PUSH_PRIVACY_GROUP_PATH},
    crypto::{EncryptorType, KeyPair},
    enclave::{Enclave, LocalKeyManager},
    error::Error,
    party::{DirectorySettings, P2pClient, PartyInfoService, PayloadPublisher, TransportError},
    privacy_group::PrivacyGroupManager,
    identifiers::MessageHash,
    storage::memory::{MemoryPrivacyGroupStore, MemoryRawTransactionStore, MemoryTransactionStore},
    transaction::TransactionManager,
    util::url::normalize,
};

pub fn keypair() -> KeyPair {
    EncryptorType::default().create().generate_new_keys()
}

pub fn enclave(pairs: &[&KeyPair], forwarding: &[&KeyPair]) -> Enclave {
    let manager = LocalKeyManager::new(
        pairs.iter().map(|pair| (*pair).clone()).collect(),
        forwarding.iter().map(|pair| pair.public).collect(),
    )
    .expect("valid key pairs");

    Enclave::new(EncryptorType::default().create(), Arc::new(manager))
}

pub fn single_key_enclave(pair: &KeyPair) -> Enclave {
    enclave(&[pair], &[])
}

/// Every call fails as if the peer were down.
pub struct UnreachableClient;

#[async_trait]
impl P2pClient for UnreachableClient {
    async fn post(&self, url: &str, _: &str, _: Vec<u8>) -> Result<Vec<u8>, TransportError> {
        Err(TransportError::Connect(url.to_owned()))
    }
}

pub struct TestNode {
    pub url: String,
    pub directory: Arc<PartyInfoService>,
    pub transactions: TransactionManager,
    pub groups: PrivacyGroupManager,
    pub transaction_store: Arc<MemoryTransactionStore>,
    pub group_store: Arc<MemoryPrivacyGroupStore>,
}

/// Routes posts to the node registered under the target url, the way the
/// HTTP server would.
#[derive(Default)]
pub struct FakeNetwork {
    nodes: Mutex<HashMap<String, Arc<TestNode>>>,
    rejected_pushes: Mutex<HashSet<MessageHash>>,
}

#[derive(Default)]
pub struct NodeOptions<'a> {
    pub peers: Vec<&'a str>,
    pub forwarding: Vec<&'a KeyPair>,
    pub disable_peer_discovery: bool,
    pub enable_remote_key_validation: bool,
}

impl FakeNetwork {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn spawn(
        self: &Arc<Self>,
        url: &str,
        keys: &[&KeyPair],
        options: NodeOptions<'_>,
    ) -> Arc<TestNode> {
        let client: Arc<dyn P2pClient> = self.clone();
        let enclave = Arc::new(enclave(keys, &options.forwarding));
        let directory = Arc::new(PartyInfoService::new(
            DirectorySettings {
                own_url: url.to_owned(),
                peers: options.peers.iter().map(|p| (*p).to_owned()).collect(),
                disable_peer_discovery: options.disable_peer_discovery,
                enable_remote_key_validation: options.enable_remote_key_validation,
            },
            enclave.clone(),
            client.clone(),
        ));
        let publisher = Arc::new(PayloadPublisher::new(directory.clone(), client));
        let transaction_store = Arc::new(MemoryTransactionStore::default());
        let group_store = Arc::new(MemoryPrivacyGroupStore::default());

        let node = Arc::new(TestNode {
            url: normalize(url),
            directory,
            transactions: TransactionManager::new(
                enclave.clone(),
                transaction_store.clone(),
                Arc::new(MemoryRawTransactionStore::default()),
                publisher.clone(),
            ),
            groups: PrivacyGroupManager::new(enclave, group_store.clone(), publisher),
            transaction_store,
            group_store,
        });

        self.nodes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(node.url.clone(), node.clone());

        node
    }

    /// Every node answers a push of `hash` with an error from now on.
    pub fn reject_push(&self, hash: MessageHash) {
        self.rejected_pushes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(hash);
    }

    fn is_rejected(&self, body: &[u8]) -> bool {
        decode_payload_with_recipients(body).is_ok_and(|pushed| {
            self.rejected_pushes
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .contains(&MessageHash::of_cipher_text(&pushed.payload.cipher_text))
        })
    }

    async fn dispatch(node: &TestNode, path: &str, body: Vec<u8>) -> Result<Vec<u8>, Error> {
        match path {
            PARTYINFO_PATH => {
                let incoming = decode_party_info(&body)?;
                let merged = node.directory.handle_incoming(incoming).await?;
                Ok(encode_party_info(&merged))
            }
            PARTYINFO_VALIDATE_PATH => Ok(node
                .directory
                .unencrypt_sample_data(&body)?
                .into_bytes()),
            PUSH_PATH => Ok(node
                .transactions
                .store_payload(&body)?
                .to_base64()
                .into_bytes()),
            PUSH_PRIVACY_GROUP_PATH => {
                node.groups.store_privacy_group(&body)?;
                Ok(Vec::new())
            }
            other => Err(Error::InvalidRequest(format!("no route for {other}"))),
        }
    }
}

#[async_trait]
impl P2pClient for FakeNetwork {
    async fn post(&self, url: &str, path: &str, body: Vec<u8>) -> Result<Vec<u8>, TransportError> {
        let node = self
            .nodes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&normalize(url))
            .cloned()
            .ok_or_else(|| TransportError::Connect(url.to_owned()))?;

        if path == PUSH_PATH && self.is_rejected(&body) {
            return Err(TransportError::Status {
                url: format!("{url}/{path}"),
                status: 400,
            });
        }

        Self::dispatch(&node, path, body)
            .await
            .map_err(|e| TransportError::Status {
                url: format!("{url}/{path} ({e})"),
                status: 500,
            })
    }
}
