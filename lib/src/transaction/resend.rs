use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::{
    codec::{encode_payload_with_recipients, EncodedPayloadWithRecipients},
    crypto::PublicKey,
    error::Error,
    identifiers::MessageHash,
};

use super::TransactionManager;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ResendType {
    All,
    Individual,
}

/// Sent by a node that lost its transactions for `public_key`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResendRequest {
    #[serde(rename = "type")]
    pub resend_type: ResendType,
    pub public_key: PublicKey,
    /// Required for [`ResendType::Individual`].
    #[serde(default)]
    pub key: Option<MessageHash>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResendResponse {
    /// Number of copies pushed back to the requester.
    Published(usize),
    /// The encoded copy for the requested transaction.
    Individual(Vec<u8>),
}

impl TransactionManager {
    pub async fn resend(&self, request: &ResendRequest) -> Result<ResendResponse, Error> {
        match request.resend_type {
            ResendType::Individual => {
                let hash = request.key.ok_or_else(|| {
                    Error::InvalidRequest("an individual resend needs a transaction hash".to_owned())
                })?;
                let copy = self.fetch_transaction_for_recipient(&hash, &request.public_key)?;

                Ok(ResendResponse::Individual(encode_payload_with_recipients(
                    &copy,
                )))
            }
            ResendType::All => self.resend_all(&request.public_key).await,
        }
    }

    /// Pushes back every stored transaction `key` took part in. A copy that
    /// fails to publish is skipped; only delivered copies are counted.
    ///
    /// Transactions `key` received go back pruned to its own box. Transactions
    /// `key` sent go back with our box and our key attached, so the sender
    /// can rebuild its record from it.
    async fn resend_all(&self, key: &PublicKey) -> Result<ResendResponse, Error> {
        let mut published = 0;

        for (hash, record) in self.store.retrieve_all()? {
            let copy = if &record.payload.sender_key == key {
                self.copy_for_sender(&hash, &record)
            } else {
                record.for_recipient(key)
            };

            let Some(copy) = copy else {
                continue;
            };

            match self.publisher.publish_payload(&copy, key).await {
                Ok(()) => published += 1,
                Err(e) => warn!("Resending {hash} to {key} failed, skipping it: {e}"),
            }
        }

        info!("Resent {published} transactions to {key}");
        Ok(ResendResponse::Published(published))
    }

    /// Our own box of a transaction someone else sent, with the local key
    /// that opens it.
    fn copy_for_sender(
        &self,
        hash: &MessageHash,
        record: &EncodedPayloadWithRecipients,
    ) -> Option<EncodedPayloadWithRecipients> {
        let local_keys = self.enclave.public_keys();

        for recipient_box in &record.payload.recipient_boxes {
            let mut payload = record.payload.clone();
            payload.recipient_boxes = vec![recipient_box.clone()];

            if let Some(local) = local_keys.iter().find(|local| {
                self.enclave
                    .unencrypt_transaction(&payload, std::slice::from_ref(*local), local)
                    .is_ok()
            }) {
                return Some(EncodedPayloadWithRecipients::new(payload, vec![*local]));
            }
        }

        warn!("No local key opens {hash}, not resending it");
        None
    }
}
