//! Hybrid encryption of transactions.
//!
//! A payload is sealed once with a random content key. The content key is then
//! sealed once per recipient, with the key shared between the sender and that
//! recipient, producing the recipient boxes.
use std::sync::Arc;

use tracing::{event, Level};

use crate::{
    codec::{EncodedPayload, RawTransaction},
    crypto::{Encryptor, Nonce, PrivateKey, PublicKey, SharedKey},
    error::Error,
    identifiers::PrivacyGroupId,
};

mod key_manager;

pub use key_manager::{KeyManager, LocalKeyManager};

pub struct Enclave {
    encryptor: Box<dyn Encryptor>,
    keys: Arc<dyn KeyManager>,
}

impl Enclave {
    pub fn new(encryptor: Box<dyn Encryptor>, keys: Arc<dyn KeyManager>) -> Self {
        Self { encryptor, keys }
    }

    pub fn default_public_key(&self) -> PublicKey {
        self.keys.default_public_key()
    }

    pub fn public_keys(&self) -> Vec<PublicKey> {
        self.keys.public_keys()
    }

    pub fn forwarding_keys(&self) -> Vec<PublicKey> {
        self.keys.forwarding_keys()
    }

    pub fn is_local(&self, key: &PublicKey) -> bool {
        self.keys.private_key_for(key).is_some()
    }

    fn private_key(&self, public: &PublicKey) -> Result<&PrivateKey, Error> {
        self.keys
            .private_key_for(public)
            .ok_or_else(|| Error::KeyNotFound(format!("{public} is not managed by this node")))
    }

    /// Seals `message` for `recipients`, in that order. The caller decides
    /// the recipient list; nothing is added here.
    pub fn encrypt_payload(
        &self,
        message: &[u8],
        sender: &PublicKey,
        recipients: &[PublicKey],
        privacy_group_id: Option<PrivacyGroupId>,
    ) -> Result<EncodedPayload, Error> {
        let sender_private = self.private_key(sender)?;

        let content_key = self.encryptor.create_single_key();
        let cipher_text_nonce = self.encryptor.random_nonce();
        let cipher_text =
            self.encryptor
                .seal_after_precomputation(message, &cipher_text_nonce, &content_key)?;

        let recipient_nonce = self.encryptor.random_nonce();
        let recipient_boxes =
            self.recipient_boxes(&content_key, sender_private, recipients, &recipient_nonce)?;

        event!(
            Level::DEBUG,
            "Encrypted payload from {sender} for {} recipients",
            recipients.len()
        );

        Ok(EncodedPayload {
            sender_key: *sender,
            cipher_text,
            cipher_text_nonce,
            recipient_boxes,
            recipient_nonce,
            privacy_group_id,
        })
    }

    /// Seals `message` for its sender alone. The recipients are picked later
    /// with [`Enclave::encrypt_payload_from_raw`].
    pub fn encrypt_raw_payload(
        &self,
        message: &[u8],
        sender: &PublicKey,
    ) -> Result<RawTransaction, Error> {
        let sender_private = self.private_key(sender)?;

        let content_key = self.encryptor.create_single_key();
        let nonce = self.encryptor.random_nonce();
        let encrypted_payload =
            self.encryptor
                .seal_after_precomputation(message, &nonce, &content_key)?;

        let own = self.encryptor.compute_shared_key(sender, sender_private)?;
        let encrypted_key =
            self.encryptor
                .seal_after_precomputation(content_key.as_bytes(), &nonce, &own)?;

        Ok(RawTransaction {
            from: *sender,
            encrypted_payload,
            encrypted_key,
            nonce,
        })
    }

    /// Turns a raw transaction into a regular payload for `recipients`. The
    /// cipher text is kept, so the transaction hash does not change.
    pub fn encrypt_payload_from_raw(
        &self,
        raw: &RawTransaction,
        recipients: &[PublicKey],
        privacy_group_id: Option<PrivacyGroupId>,
    ) -> Result<EncodedPayload, Error> {
        let sender_private = self.private_key(&raw.from)?;
        let content_key = self.raw_content_key(raw)?;

        let recipient_nonce = self.encryptor.random_nonce();
        let recipient_boxes =
            self.recipient_boxes(&content_key, sender_private, recipients, &recipient_nonce)?;

        event!(
            Level::DEBUG,
            "Encrypted raw payload from {} for {} recipients",
            raw.from,
            recipients.len()
        );

        Ok(EncodedPayload {
            sender_key: raw.from,
            cipher_text: raw.encrypted_payload.clone(),
            cipher_text_nonce: raw.nonce,
            recipient_boxes,
            recipient_nonce,
            privacy_group_id,
        })
    }

    pub fn unencrypt_raw_payload(&self, raw: &RawTransaction) -> Result<Vec<u8>, Error> {
        let content_key = self.raw_content_key(raw)?;

        Ok(self.encryptor.open_after_precomputation(
            &raw.encrypted_payload,
            &raw.nonce,
            &content_key,
        )?)
    }

    /// Opens `payload` with the local key `key`.
    ///
    /// `recipient_keys` is whatever key list travelled with the payload. The
    /// box to open is the one at `key`'s position; a copy without keys is
    /// tried box by box; a sender holding a copy addressed to someone else
    /// opens the first box with that someone's key.
    pub fn unencrypt_transaction(
        &self,
        payload: &EncodedPayload,
        recipient_keys: &[PublicKey],
        key: &PublicKey,
    ) -> Result<Vec<u8>, Error> {
        let content_key = self.recover_content_key(payload, recipient_keys, key)?;

        Ok(self.encryptor.open_after_precomputation(
            &payload.cipher_text,
            &payload.cipher_text_nonce,
            &content_key,
        )?)
    }

    /// A box for `new_recipient` holding the content key of a payload this
    /// node sent. Only the sender can produce one.
    pub fn create_new_recipient_box(
        &self,
        payload: &EncodedPayload,
        recipient_keys: &[PublicKey],
        new_recipient: &PublicKey,
    ) -> Result<Vec<u8>, Error> {
        let sender_private = self.private_key(&payload.sender_key)?;
        let content_key = self.recover_content_key(payload, recipient_keys, &payload.sender_key)?;

        let shared = self
            .encryptor
            .compute_shared_key(new_recipient, sender_private)?;

        Ok(self.encryptor.seal_after_precomputation(
            content_key.as_bytes(),
            &payload.recipient_nonce,
            &shared,
        )?)
    }

    fn recipient_boxes(
        &self,
        content_key: &SharedKey,
        sender_private: &PrivateKey,
        recipients: &[PublicKey],
        recipient_nonce: &Nonce,
    ) -> Result<Vec<Vec<u8>>, Error> {
        Ok(recipients
            .iter()
            .map(|recipient| {
                let shared = self.encryptor.compute_shared_key(recipient, sender_private)?;
                self.encryptor.seal_after_precomputation(
                    content_key.as_bytes(),
                    recipient_nonce,
                    &shared,
                )
            })
            .collect::<Result<Vec<_>, _>>()?)
    }

    fn raw_content_key(&self, raw: &RawTransaction) -> Result<SharedKey, Error> {
        let private = self.private_key(&raw.from)?;
        let own = self.encryptor.compute_shared_key(&raw.from, private)?;

        let mut bytes =
            self.encryptor
                .open_after_precomputation(&raw.encrypted_key, &raw.nonce, &own)?;
        let content_key = SharedKey::from_slice(&bytes);
        zeroize::Zeroize::zeroize(&mut bytes);

        Ok(content_key?)
    }

    fn recover_content_key(
        &self,
        payload: &EncodedPayload,
        recipient_keys: &[PublicKey],
        key: &PublicKey,
    ) -> Result<SharedKey, Error> {
        let private = self.private_key(key)?;

        let (candidates, counterpart): (Vec<&Vec<u8>>, PublicKey) =
            if let Some(index) = recipient_keys.iter().position(|k| k == key) {
                (
                    payload.recipient_boxes.get(index).into_iter().collect(),
                    payload.sender_key,
                )
            } else if recipient_keys.is_empty() {
                (payload.recipient_boxes.iter().collect(), payload.sender_key)
            } else if key == &payload.sender_key {
                (
                    payload.recipient_boxes.first().into_iter().collect(),
                    recipient_keys[0],
                )
            } else {
                return Err(Error::PrivacyViolation(format!(
                    "{key} is not a recipient of this payload"
                )));
            };

        let shared = self.encryptor.compute_shared_key(&counterpart, private)?;

        let mut last_error = None;
        for recipient_box in candidates {
            match self.encryptor.open_after_precomputation(
                recipient_box,
                &payload.recipient_nonce,
                &shared,
            ) {
                Ok(mut bytes) => {
                    let content_key = SharedKey::from_slice(&bytes);
                    zeroize::Zeroize::zeroize(&mut bytes);
                    return Ok(content_key?);
                }
                Err(e) => last_error = Some(e),
            }
        }

        Err(last_error.map_or_else(
            || Error::PrivacyViolation(format!("no recipient box for {key}")),
            Error::Crypto,
        ))
    }
}
