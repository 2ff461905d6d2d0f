use std::{
    collections::{BTreeMap, BTreeSet},
    sync::Arc,
};

use tracing::{info, instrument, warn};

use crate::{crypto::PublicKey, enclave::Enclave, error::Error, util::url::normalize};

use super::{validator, P2pClient, Party, PartyInfo, PartyInfoStore, Recipient};

/// How the directory treats strangers.
#[derive(Debug, Clone, Default)]
pub struct DirectorySettings {
    pub own_url: String,
    pub peers: Vec<String>,
    /// Only parties already known (configured peers) may merge.
    pub disable_peer_discovery: bool,
    /// Challenge every key a sender claims before merging it.
    pub enable_remote_key_validation: bool,
}

pub struct PartyInfoService {
    store: PartyInfoStore,
    enclave: Arc<Enclave>,
    client: Arc<dyn P2pClient>,
    settings: DirectorySettings,
}

impl PartyInfoService {
    /// Seeds the directory with the node's own keys at its own url and the
    /// configured peers.
    pub fn new(
        settings: DirectorySettings,
        enclave: Arc<Enclave>,
        client: Arc<dyn P2pClient>,
    ) -> Self {
        let own_url = normalize(&settings.own_url);
        let store = PartyInfoStore::new(&own_url);

        store.store(&PartyInfo {
            url: own_url.clone(),
            recipients: enclave
                .public_keys()
                .into_iter()
                .map(|key| Recipient::new(key, &own_url))
                .collect(),
            parties: settings.peers.iter().map(|url| Party::new(url)).collect(),
        });

        info!(
            "Directory initialised for {own_url} with {} configured peers",
            settings.peers.len()
        );

        Self {
            store,
            enclave,
            client,
            settings: DirectorySettings {
                own_url,
                ..settings
            },
        }
    }

    pub fn own_url(&self) -> &str {
        &self.settings.own_url
    }

    pub fn get_party_info(&self) -> PartyInfo {
        self.store.get_party_info()
    }

    pub fn url_for_key(&self, key: &PublicKey) -> Result<String, Error> {
        self.store.get_url_from_recipient_key(key)
    }

    pub fn find_unsaved_parties(&self, incoming: &PartyInfo) -> BTreeSet<Party> {
        self.store.find_unsaved_parties(incoming)
    }

    /// Merges `incoming` under the directory's policy and returns the state
    /// after the merge. The policy check and the merge happen atomically, so
    /// a rejected merge changes nothing.
    pub fn update_party_info(&self, incoming: PartyInfo) -> Result<PartyInfo, Error> {
        let incoming = incoming.normalized();

        self.store.try_merge(incoming, |known, incoming| {
            if self.settings.disable_peer_discovery {
                restrict_to_known_parties(known, &self.settings.peers, incoming)
            } else {
                Ok(incoming)
            }
        })
    }

    /// The `/partyinfo` entry point: optionally challenges the sender's keys,
    /// then merges.
    #[instrument(skip_all, fields(url = %incoming.url))]
    pub async fn handle_incoming(&self, incoming: PartyInfo) -> Result<PartyInfo, Error> {
        let incoming = incoming.normalized();

        if !self.settings.enable_remote_key_validation {
            return self.update_party_info(incoming);
        }

        let recipients = validator::validate_and_extract_valid_recipients(
            &incoming,
            &self.enclave,
            self.client.as_ref(),
        )
        .await?;

        self.update_party_info(PartyInfo {
            recipients,
            ..incoming
        })
    }

    /// Answers a challenge sent by [`validator::validate_and_extract_valid_recipients`]
    /// on another node.
    pub fn unencrypt_sample_data(&self, challenge: &[u8]) -> Result<String, Error> {
        validator::unencrypt_sample_data(&self.enclave, challenge)
    }
}

fn restrict_to_known_parties(
    known: &BTreeSet<Party>,
    peers: &[String],
    incoming: PartyInfo,
) -> Result<PartyInfo, Error> {
    let is_known = |url: &str| known.contains(&Party::new(url));

    if !is_known(&incoming.url) {
        warn!("Rejected party info from unknown party {}", incoming.url);
        return Err(Error::AutoDiscoveryDisabled(incoming.url));
    }

    if let Some(unknown) = incoming.parties.iter().find(|party| !is_known(&party.url)) {
        warn!(
            "Rejected party info from {}, it lists unknown party {}",
            incoming.url, unknown.url
        );
        return Err(Error::AutoDiscoveryDisabled(unknown.url.clone()));
    }

    let sender_url = incoming.url.clone();

    Ok(PartyInfo {
        recipients: incoming
            .recipients
            .into_iter()
            .filter(|recipient| recipient.url == sender_url)
            .collect(),
        parties: peers.iter().map(|url| Party::new(url)).collect(),
        url: sender_url,
    })
}

/// Anti key-hijack check: `false` if any key is claimed by two different
/// urls, either between `existing` and `incoming` or within `incoming`.
/// Urls are compared case-insensitively after normalization.
pub fn validate_keys_to_urls(existing: &PartyInfo, incoming: &PartyInfo) -> bool {
    let mut claims: BTreeMap<PublicKey, String> = existing
        .recipients
        .iter()
        .map(|recipient| (recipient.key, normalize(&recipient.url).to_lowercase()))
        .collect();

    incoming.recipients.iter().all(|recipient| {
        let url = normalize(&recipient.url).to_lowercase();
        match claims.get(&recipient.key) {
            Some(known) => known == &url,
            None => {
                claims.insert(recipient.key, url);
                true
            }
        }
    })
}
