//! The peer directory: which nodes exist and which keys they serve.
use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::{crypto::PublicKey, util::url::normalize};

mod client;
mod poller;
mod publisher;
mod service;
mod store;
mod validator;

pub use client::{P2pClient, TransportError};
pub use poller::PartyInfoPoller;
pub use publisher::PayloadPublisher;
pub use service::{DirectorySettings, PartyInfoService};
pub use store::PartyInfoStore;

/// A known peer node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Party {
    pub url: String,
}

impl Party {
    pub fn new(url: &str) -> Self {
        Self {
            url: normalize(url),
        }
    }
}

/// A claim that `key` is served by the node at `url`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Recipient {
    pub key: PublicKey,
    pub url: String,
}

impl Recipient {
    pub fn new(key: PublicKey, url: &str) -> Self {
        Self {
            key,
            url: normalize(url),
        }
    }
}

/// A node's description of itself plus everything it knows about others.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartyInfo {
    pub url: String,
    pub recipients: BTreeSet<Recipient>,
    pub parties: BTreeSet<Party>,
}

impl PartyInfo {
    /// The same information with every url in canonical form.
    #[must_use]
    pub fn normalized(self) -> Self {
        Self {
            url: normalize(&self.url),
            recipients: self
                .recipients
                .into_iter()
                .map(|r| Recipient::new(r.key, &r.url))
                .collect(),
            parties: self.parties.into_iter().map(|p| Party::new(&p.url)).collect(),
        }
    }
}
