use std::time::Duration;

use privtx::party::PartyInfoPoller;
use tokio::{task::JoinHandle, time::MissedTickBehavior};
use tracing::{error, info_span, Instrument};

/// Runs a poll round every `interval`. A failed round is logged and the
/// schedule carries on.
pub fn spawn_poller(poller: PartyInfoPoller, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(
        async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;

                if let Err(e) = poller.poll().await {
                    error!("Party info poll failed: {e}");
                }
            }
        }
        .instrument(info_span!("poller")),
    )
}

#[cfg(test)]
mod tests {
    use std::{
        collections::BTreeSet,
        sync::{
            atomic::{AtomicUsize, Ordering},
            Arc,
        },
    };

    use async_trait::async_trait;
    use privtx::{
        codec::encode_party_info,
        crypto::PublicKey,
        party::{P2pClient, PartyInfo, Recipient, TransportError},
    };

    use super::*;
    use crate::services::test_support::{keypair, node};

    /// Answers with an error status first, then with a directory serving
    /// `key`.
    struct FlakyPeer {
        key: PublicKey,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl P2pClient for FlakyPeer {
        async fn post(&self, url: &str, _: &str, _: Vec<u8>) -> Result<Vec<u8>, TransportError> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                return Err(TransportError::Status {
                    url: url.to_owned(),
                    status: 500,
                });
            }

            Ok(encode_party_info(&PartyInfo {
                url: "http://b:9000".to_owned(),
                recipients: BTreeSet::from([Recipient::new(self.key, "http://b:9000")]),
                parties: BTreeSet::new(),
            }))
        }
    }

    #[tokio::test]
    async fn polling_survives_a_failed_round() {
        let bob = keypair();
        let state = node("http://a:9000", &[&keypair()]);
        state
            .directory
            .update_party_info(PartyInfo {
                url: "http://b:9000".to_owned(),
                ..PartyInfo::default()
            })
            .expect("b becomes a known party");

        let peer = Arc::new(FlakyPeer {
            key: bob.public,
            calls: AtomicUsize::new(0),
        });
        let handle = spawn_poller(
            PartyInfoPoller::new(state.directory.clone(), peer.clone()),
            Duration::from_millis(10),
        );

        let mut merged = false;
        for _ in 0..200 {
            if state.directory.url_for_key(&bob.public).is_ok() {
                merged = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        handle.abort();

        assert!(merged, "a later round merges the peer's keys");
        assert!(
            peer.calls.load(Ordering::SeqCst) >= 2,
            "the failed round was followed by another one"
        );
    }
}
