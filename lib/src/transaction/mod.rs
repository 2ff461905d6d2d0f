//! Transaction level operations: store, send, receive, and the receiving end
//! of a push.
use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use crate::{
    codec::{decode_payload_with_recipients, EncodedPayloadWithRecipients},
    crypto::PublicKey,
    enclave::Enclave,
    error::Error,
    identifiers::{MessageHash, PrivacyGroupId},
    party::PayloadPublisher,
    storage::{RawTransactionStore, TransactionStore},
};

mod resend;

pub use resend::{ResendRequest, ResendResponse, ResendType};

pub struct TransactionManager {
    enclave: Arc<Enclave>,
    store: Arc<dyn TransactionStore>,
    raw_store: Arc<dyn RawTransactionStore>,
    publisher: Arc<PayloadPublisher>,
}

impl TransactionManager {
    pub fn new(
        enclave: Arc<Enclave>,
        store: Arc<dyn TransactionStore>,
        raw_store: Arc<dyn RawTransactionStore>,
        publisher: Arc<PayloadPublisher>,
    ) -> Self {
        Self {
            enclave,
            store,
            raw_store,
            publisher,
        }
    }

    /// Encrypts `payload` and persists it, returning its hash.
    ///
    /// The recipient list is `recipients`, then the sender, then the
    /// forwarding keys, without duplicates. `from` defaults to the node's
    /// default key.
    pub fn store(
        &self,
        from: Option<PublicKey>,
        recipients: &[PublicKey],
        payload: &[u8],
        privacy_group_id: Option<PrivacyGroupId>,
    ) -> Result<MessageHash, Error> {
        self.encrypt_and_store(from, recipients, payload, privacy_group_id)
            .map(|(hash, _)| hash)
    }

    /// [`TransactionManager::store`], then a push of each remote recipient's
    /// own copy. If any push fails the stored record is removed again.
    #[instrument(skip_all, fields(recipients = recipients.len()))]
    pub async fn send(
        &self,
        from: Option<PublicKey>,
        recipients: &[PublicKey],
        payload: &[u8],
        privacy_group_id: Option<PrivacyGroupId>,
    ) -> Result<MessageHash, Error> {
        let (hash, record) =
            self.encrypt_and_store(from, recipients, payload, privacy_group_id)?;

        self.publish_or_roll_back(&hash, &record).await?;

        info!("Sent transaction {hash}");
        Ok(hash)
    }

    /// Seals `payload` for its sender only and keeps it until
    /// [`TransactionManager::send_signed_transaction`] names the recipients.
    pub fn store_raw(&self, from: Option<PublicKey>, payload: &[u8]) -> Result<MessageHash, Error> {
        let sender = from.unwrap_or_else(|| self.enclave.default_public_key());

        let raw = self.enclave.encrypt_raw_payload(payload, &sender)?;
        let hash = MessageHash::of_cipher_text(&raw.encrypted_payload);

        self.raw_store.save(&hash, &raw)?;

        debug!("Stored raw transaction {hash}");
        Ok(hash)
    }

    /// Sends a raw transaction stored earlier. The hash stays the same; the
    /// recipient list is built the way [`TransactionManager::store`] builds
    /// it.
    #[instrument(skip_all, fields(hash = %hash))]
    pub async fn send_signed_transaction(
        &self,
        hash: &MessageHash,
        recipients: &[PublicKey],
        privacy_group_id: Option<PrivacyGroupId>,
    ) -> Result<MessageHash, Error> {
        let raw = self
            .raw_store
            .retrieve(hash)?
            .ok_or(Error::TransactionNotFound(*hash))?;

        let recipient_keys = self.recipient_list(&raw.from, recipients);
        let encoded = self
            .enclave
            .encrypt_payload_from_raw(&raw, &recipient_keys, privacy_group_id)?;
        let record = EncodedPayloadWithRecipients::new(encoded, recipient_keys);

        self.store.save(hash, &record)?;
        self.publish_or_roll_back(hash, &record).await?;

        info!("Sent signed transaction {hash}");
        Ok(*hash)
    }

    /// Decrypts a stored transaction with `to`, or with the first local key
    /// that can open it.
    pub fn receive(&self, hash: &MessageHash, to: Option<PublicKey>) -> Result<Vec<u8>, Error> {
        let record = self.retrieve(hash)?;

        let candidates = match to {
            Some(key) => vec![key],
            None => self.enclave.public_keys(),
        };

        candidates
            .iter()
            .find_map(|key| {
                self.enclave
                    .unencrypt_transaction(&record.payload, &record.recipient_keys, key)
                    .map_err(|e| debug!("{key} cannot open {hash}: {e}"))
                    .ok()
            })
            .ok_or(Error::NoRecipientKeyFound(*hash))
    }

    /// The copy of a transaction `key` is entitled to: its own box and no
    /// recipient keys.
    pub fn fetch_transaction_for_recipient(
        &self,
        hash: &MessageHash,
        key: &PublicKey,
    ) -> Result<EncodedPayloadWithRecipients, Error> {
        self.retrieve(hash)?.for_recipient(key).ok_or_else(|| {
            Error::PrivacyViolation(format!("recipient {key} is not a party to transaction {hash}"))
        })
    }

    /// Stores a payload pushed by another node and returns its hash.
    ///
    /// A payload sent by one of our own keys is a copy coming back during a
    /// resend; its box is merged into the existing record instead.
    #[instrument(skip_all)]
    pub fn store_payload(&self, body: &[u8]) -> Result<MessageHash, Error> {
        let incoming = decode_payload_with_recipients(body)?;
        let hash = MessageHash::of_cipher_text(&incoming.payload.cipher_text);

        if self.enclave.is_local(&incoming.payload.sender_key) {
            self.store_own_payload(&hash, incoming)?;
        } else {
            self.store_foreign_payload(&hash, incoming)?;
        }

        debug!("Stored pushed transaction {hash}");
        Ok(hash)
    }

    pub fn delete(&self, hash: &MessageHash) -> Result<(), Error> {
        if !self.store.delete(hash)? {
            return Err(Error::TransactionNotFound(*hash));
        }

        info!("Deleted transaction {hash}");
        Ok(())
    }

    fn retrieve(&self, hash: &MessageHash) -> Result<EncodedPayloadWithRecipients, Error> {
        self.store
            .retrieve(hash)?
            .ok_or(Error::TransactionNotFound(*hash))
    }

    fn encrypt_and_store(
        &self,
        from: Option<PublicKey>,
        recipients: &[PublicKey],
        payload: &[u8],
        privacy_group_id: Option<PrivacyGroupId>,
    ) -> Result<(MessageHash, EncodedPayloadWithRecipients), Error> {
        let sender = from.unwrap_or_else(|| self.enclave.default_public_key());
        let recipient_keys = self.recipient_list(&sender, recipients);

        let encoded =
            self.enclave
                .encrypt_payload(payload, &sender, &recipient_keys, privacy_group_id)?;
        let hash = MessageHash::of_cipher_text(&encoded.cipher_text);
        let record = EncodedPayloadWithRecipients::new(encoded, recipient_keys);

        self.store.save(&hash, &record)?;

        Ok((hash, record))
    }

    /// `recipients`, then the sender, then the forwarding keys, without
    /// duplicates.
    fn recipient_list(&self, sender: &PublicKey, recipients: &[PublicKey]) -> Vec<PublicKey> {
        let forwarding = self.enclave.forwarding_keys();

        let mut recipient_keys: Vec<PublicKey> = Vec::with_capacity(recipients.len() + 1);
        for key in recipients
            .iter()
            .chain(std::iter::once(sender))
            .chain(&forwarding)
        {
            if !recipient_keys.contains(key) {
                recipient_keys.push(*key);
            }
        }

        recipient_keys
    }

    async fn publish_or_roll_back(
        &self,
        hash: &MessageHash,
        record: &EncodedPayloadWithRecipients,
    ) -> Result<(), Error> {
        for recipient in record
            .recipient_keys
            .iter()
            .filter(|key| !self.enclave.is_local(key))
        {
            let published = match record.for_recipient(recipient) {
                Some(copy) => self.publisher.publish_payload(&copy, recipient).await,
                None => Err(Error::PrivacyViolation(format!(
                    "{recipient} has no box in {hash}"
                ))),
            };

            if let Err(e) = published {
                warn!("Publishing {hash} to {recipient} failed, removing it: {e}");
                self.store.delete(hash)?;
                return Err(e);
            }
        }

        Ok(())
    }

    /// Several of our keys can receive the same transaction, each through
    /// its own push. Boxes are collected into one record.
    fn store_foreign_payload(
        &self,
        hash: &MessageHash,
        incoming: EncodedPayloadWithRecipients,
    ) -> Result<(), Error> {
        let record = match self.store.retrieve(hash)? {
            Some(mut existing) if existing.recipient_keys.is_empty() => {
                for recipient_box in incoming.payload.recipient_boxes {
                    if !existing.payload.recipient_boxes.contains(&recipient_box) {
                        existing.payload.recipient_boxes.push(recipient_box);
                    }
                }
                existing
            }
            Some(existing) => {
                warn!("Ignoring push for {hash}, a complete record is already stored");
                existing
            }
            None => incoming,
        };

        self.store.save(hash, &record)?;
        Ok(())
    }

    fn store_own_payload(
        &self,
        hash: &MessageHash,
        incoming: EncodedPayloadWithRecipients,
    ) -> Result<(), Error> {
        let sender = incoming.payload.sender_key;
        let recipient = *incoming.recipient_keys.first().ok_or_else(|| {
            Error::InvalidRequest(format!("returned copy of {hash} names no recipient"))
        })?;
        let recipient_box = incoming.payload.recipient_boxes.first().cloned().ok_or_else(|| {
            Error::InvalidRequest(format!("returned copy of {hash} carries no box"))
        })?;

        // Proves the copy really is one of ours before anything is written.
        self.enclave
            .unencrypt_transaction(&incoming.payload, &incoming.recipient_keys, &sender)?;

        let record = match self.store.retrieve(hash)? {
            Some(mut existing) => {
                if !existing.recipient_keys.contains(&recipient) {
                    existing.recipient_keys.push(recipient);
                    existing.payload.recipient_boxes.push(recipient_box);
                }
                existing
            }
            None => {
                let sender_box = self.enclave.create_new_recipient_box(
                    &incoming.payload,
                    &incoming.recipient_keys,
                    &sender,
                )?;

                let mut payload = incoming.payload;
                payload.recipient_boxes = vec![recipient_box, sender_box];
                EncodedPayloadWithRecipients::new(payload, vec![recipient, sender])
            }
        };

        self.store.save(hash, &record)?;
        Ok(())
    }
}
