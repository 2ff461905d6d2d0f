use std::sync::Arc;

use tracing::{event, Level};

use crate::{
    codec::{encode_payload_with_recipients, EncodedPayloadWithRecipients},
    constants::{PUSH_PATH, PUSH_PRIVACY_GROUP_PATH},
    crypto::PublicKey,
    error::Error,
};

use super::{P2pClient, PartyInfoService};

/// Delivers payloads and privacy group records to the node serving a key.
pub struct PayloadPublisher {
    directory: Arc<PartyInfoService>,
    client: Arc<dyn P2pClient>,
}

impl PayloadPublisher {
    pub fn new(directory: Arc<PartyInfoService>, client: Arc<dyn P2pClient>) -> Self {
        Self { directory, client }
    }

    /// Pushes `payload` as-is; pruning it for `recipient` is up to the caller.
    pub async fn publish_payload(
        &self,
        payload: &EncodedPayloadWithRecipients,
        recipient: &PublicKey,
    ) -> Result<(), Error> {
        let url = self.directory.url_for_key(recipient)?;
        let body = encode_payload_with_recipients(payload);

        event!(Level::DEBUG, "Publishing payload for {recipient} to {url}");
        self.client.post(&url, PUSH_PATH, body).await?;

        Ok(())
    }

    pub async fn publish_privacy_group(
        &self,
        encoded_group: &[u8],
        recipient: &PublicKey,
    ) -> Result<(), Error> {
        let url = self.directory.url_for_key(recipient)?;

        event!(Level::DEBUG, "Publishing privacy group for {recipient} to {url}");
        self.client
            .post(&url, PUSH_PRIVACY_GROUP_PATH, encoded_group.to_vec())
            .await?;

        Ok(())
    }
}
