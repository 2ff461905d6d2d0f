use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::{
    codec::{decode_party_info, encode_party_info},
    constants::PARTYINFO_PATH,
    error::Error,
};

use super::{P2pClient, PartyInfoService};

/// One gossip round with every known party.
pub struct PartyInfoPoller {
    service: Arc<PartyInfoService>,
    client: Arc<dyn P2pClient>,
}

impl PartyInfoPoller {
    pub fn new(service: Arc<PartyInfoService>, client: Arc<dyn P2pClient>) -> Self {
        Self { service, client }
    }

    /// Sends the local directory to every other known party and merges what
    /// they send back.
    ///
    /// Unreachable peers are skipped until the next round. A peer whose answer
    /// the directory refuses to merge is skipped too, the directory is left
    /// unchanged in that case. Any other failure ends the round.
    pub async fn poll(&self) -> Result<(), Error> {
        let local = self.service.get_party_info();
        let encoded = encode_party_info(&local);

        for party in local.parties.iter().filter(|p| p.url != local.url) {
            let response = match self
                .client
                .post(&party.url, PARTYINFO_PATH, encoded.clone())
                .await
            {
                Ok(response) => response,
                Err(e) if e.is_connect() => {
                    warn!("Skipping {} this round: {e}", party.url);
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            let remote = decode_party_info(&response)?;
            let unsaved = self.service.find_unsaved_parties(&remote);
            if !unsaved.is_empty() {
                info!(
                    "Learned {} new parties from {}",
                    unsaved.len(),
                    party.url
                );
            }

            match self.service.update_party_info(remote) {
                Ok(_) => debug!("Merged party info from {}", party.url),
                Err(e @ (Error::AutoDiscoveryDisabled(_) | Error::ConflictingKeyClaim(_))) => {
                    warn!("Not merging answer from {}: {e}", party.url);
                }
                Err(e) => return Err(e),
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        party::{Party, PartyInfo, Recipient, TransportError},
        testing::{keypair, FakeNetwork, NodeOptions, TestNode},
    };

    use super::*;

    fn poller(node: &TestNode, network: &Arc<FakeNetwork>) -> PartyInfoPoller {
        PartyInfoPoller::new(node.directory.clone(), network.clone())
    }

    #[tokio::test]
    async fn gossip_spreads_keys_both_ways() {
        let network = FakeNetwork::new();
        let alice = keypair();
        let bob = keypair();
        let node_a = network.spawn(
            "http://a",
            &[&alice],
            NodeOptions {
                peers: vec!["http://b"],
                ..NodeOptions::default()
            },
        );
        let node_b = network.spawn("http://b", &[&bob], NodeOptions::default());

        poller(&node_a, &network).poll().await.expect("round completes");

        assert_eq!(
            node_a.directory.url_for_key(&bob.public).expect("a learned bob"),
            "http://b",
            "the answer is merged"
        );
        assert_eq!(
            node_b.directory.url_for_key(&alice.public).expect("b learned alice"),
            "http://a",
            "the push is merged by the peer"
        );
    }

    #[tokio::test]
    async fn new_parties_are_contacted_next_round() {
        let network = FakeNetwork::new();
        let node_a = network.spawn(
            "http://a",
            &[&keypair()],
            NodeOptions {
                peers: vec!["http://b"],
                ..NodeOptions::default()
            },
        );
        network.spawn(
            "http://b",
            &[&keypair()],
            NodeOptions {
                peers: vec!["http://c"],
                ..NodeOptions::default()
            },
        );
        let carol = keypair();
        let node_c = network.spawn("http://c", &[&carol], NodeOptions::default());

        let poller = poller(&node_a, &network);
        poller.poll().await.expect("first round completes");
        assert!(
            node_a
                .directory
                .get_party_info()
                .parties
                .contains(&Party::new("http://c")),
            "c is learned from b"
        );

        poller.poll().await.expect("second round completes");
        assert_eq!(
            node_a.directory.url_for_key(&carol.public).expect("a learned carol"),
            "http://c",
            "c answered directly in the second round"
        );
        assert!(
            node_c
                .directory
                .get_party_info()
                .parties
                .contains(&Party::new("http://a")),
            "c learned a from the push"
        );
    }

    #[tokio::test]
    async fn unreachable_peer_is_skipped() {
        let network = FakeNetwork::new();
        let bob = keypair();
        let node_a = network.spawn(
            "http://a",
            &[&keypair()],
            NodeOptions {
                peers: vec!["http://down", "http://b"],
                ..NodeOptions::default()
            },
        );
        network.spawn("http://b", &[&bob], NodeOptions::default());

        poller(&node_a, &network)
            .poll()
            .await
            .expect("a dead peer does not end the round");

        assert!(
            node_a.directory.url_for_key(&bob.public).is_ok(),
            "the reachable peer is still polled"
        );
    }

    #[tokio::test]
    async fn failing_peer_ends_the_round() {
        let network = FakeNetwork::new();
        let node_a = network.spawn(
            "http://a",
            &[&keypair()],
            NodeOptions {
                peers: vec!["http://b"],
                ..NodeOptions::default()
            },
        );
        // b only accepts known parties, so a's push fails with a status.
        network.spawn(
            "http://b",
            &[&keypair()],
            NodeOptions {
                disable_peer_discovery: true,
                ..NodeOptions::default()
            },
        );

        assert!(
            matches!(
                poller(&node_a, &network).poll().await,
                Err(Error::Transport(TransportError::Status { .. }))
            ),
            "errors other than connect failures propagate"
        );
    }

    #[tokio::test]
    async fn validated_merge_keeps_only_proven_keys() {
        let network = FakeNetwork::new();
        let alice = keypair();
        let bob = keypair();
        let stolen = keypair();
        let node_a = network.spawn(
            "http://a",
            &[&alice],
            NodeOptions {
                enable_remote_key_validation: true,
                ..NodeOptions::default()
            },
        );
        network.spawn("http://b", &[&bob], NodeOptions::default());

        let mut claim = PartyInfo {
            url: "http://b".to_owned(),
            ..PartyInfo::default()
        };
        claim.recipients.insert(Recipient::new(bob.public, "http://b"));
        claim.recipients.insert(Recipient::new(stolen.public, "http://b"));

        let merged = node_a
            .directory
            .handle_incoming(claim)
            .await
            .expect("bob proves one key");

        assert!(
            merged.recipients.contains(&Recipient::new(bob.public, "http://b")),
            "bob's real key is merged"
        );
        assert!(
            !merged.recipients.iter().any(|r| r.key == stolen.public),
            "a key b cannot open challenges for is dropped"
        );
    }

    #[tokio::test]
    async fn validation_rejects_impostor() {
        let network = FakeNetwork::new();
        let alice = keypair();
        let victim = keypair();
        let node_a = network.spawn(
            "http://a",
            &[&alice],
            NodeOptions {
                enable_remote_key_validation: true,
                ..NodeOptions::default()
            },
        );
        network.spawn("http://evil", &[&keypair()], NodeOptions::default());

        let mut claim = PartyInfo {
            url: "http://evil".to_owned(),
            ..PartyInfo::default()
        };
        claim
            .recipients
            .insert(Recipient::new(victim.public, "http://evil"));

        assert!(
            matches!(
                node_a.directory.handle_incoming(claim).await,
                Err(Error::UnverifiedParty(_))
            ),
            "claiming someone else's key is refused"
        );
        assert!(
            node_a.directory.url_for_key(&victim.public).is_err(),
            "nothing is merged"
        );
    }
}
