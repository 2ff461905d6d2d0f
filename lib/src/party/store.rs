use std::{
    collections::{BTreeMap, BTreeSet},
    sync::{Mutex, MutexGuard, PoisonError},
};

use tracing::{debug, warn};

use crate::{crypto::PublicKey, error::Error, util::url::normalize};

use super::{service::validate_keys_to_urls, Party, PartyInfo, Recipient};

struct State {
    url: String,
    recipients: BTreeMap<PublicKey, String>,
    parties: BTreeSet<Party>,
}

/// The merged directory. Only ever grows: entries are added by
/// [`PartyInfoStore::store`] and never removed.
pub struct PartyInfoStore {
    state: Mutex<State>,
}

impl PartyInfoStore {
    /// Starts with the node itself as the only party.
    pub fn new(own_url: &str) -> Self {
        let url = normalize(own_url);
        let parties = BTreeSet::from([Party::new(&url)]);

        Self {
            state: Mutex::new(State {
                url,
                recipients: BTreeMap::new(),
                parties,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Union-merges `incoming`, including its own url as a party. A key that
    /// is already mapped keeps its url.
    pub fn store(&self, incoming: &PartyInfo) {
        merge(&mut self.lock(), incoming);
    }

    /// Check-then-merge under a single lock acquisition.
    ///
    /// `admit` sees the known parties and may reject or narrow `incoming`.
    /// The admitted info is then checked against the stored key claims and
    /// merged only if no key would move to another url. Returns the state
    /// after the merge. A rejected merge changes nothing.
    pub fn try_merge<F>(&self, incoming: PartyInfo, admit: F) -> Result<PartyInfo, Error>
    where
        F: FnOnce(&BTreeSet<Party>, PartyInfo) -> Result<PartyInfo, Error>,
    {
        let mut state = self.lock();

        let incoming = admit(&state.parties, incoming)?;

        if !validate_keys_to_urls(&snapshot(&state), &incoming) {
            return Err(Error::ConflictingKeyClaim(format!(
                "{} claims keys already served elsewhere",
                incoming.url
            )));
        }

        merge(&mut state, &incoming);
        debug!(
            "Merged party info from {} ({} recipients, {} parties)",
            incoming.url,
            incoming.recipients.len(),
            incoming.parties.len()
        );

        Ok(snapshot(&state))
    }

    /// An independent copy of the current state.
    pub fn get_party_info(&self) -> PartyInfo {
        snapshot(&self.lock())
    }

    pub fn get_url_from_recipient_key(&self, key: &PublicKey) -> Result<String, Error> {
        self.lock()
            .recipients
            .get(key)
            .cloned()
            .ok_or_else(|| Error::KeyNotFound(key.to_string()))
    }

    pub fn is_known_party(&self, url: &str) -> bool {
        self.lock().parties.contains(&Party::new(url))
    }

    /// Parties in `incoming` that are not stored yet.
    pub fn find_unsaved_parties(&self, incoming: &PartyInfo) -> BTreeSet<Party> {
        let state = self.lock();

        incoming
            .parties
            .iter()
            .map(|party| Party::new(&party.url))
            .filter(|party| !state.parties.contains(party))
            .collect()
    }
}

fn merge(state: &mut State, incoming: &PartyInfo) {
    for recipient in &incoming.recipients {
        let url = normalize(&recipient.url);
        match state.recipients.get(&recipient.key) {
            Some(existing) if existing != &url => {
                warn!(
                    "Ignoring claim of {} for {}, already served by {existing}",
                    url, recipient.key
                );
            }
            Some(_) => {}
            None => {
                state.recipients.insert(recipient.key, url);
            }
        }
    }

    for party in &incoming.parties {
        state.parties.insert(Party::new(&party.url));
    }

    if !incoming.url.is_empty() {
        state.parties.insert(Party::new(&incoming.url));
    }
}

fn snapshot(state: &State) -> PartyInfo {
    PartyInfo {
        url: state.url.clone(),
        recipients: state
            .recipients
            .iter()
            .map(|(key, url)| Recipient {
                key: *key,
                url: url.clone(),
            })
            .collect(),
        parties: state.parties.clone(),
    }
}
