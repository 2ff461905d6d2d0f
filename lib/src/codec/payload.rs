use crate::{
    crypto::{Nonce, PublicKey},
    identifiers::PrivacyGroupId,
};

use super::{encode_array, encode_field, ByteReader, DecodeError};

/// A transaction payload sealed once with a content key, plus one box per
/// recipient holding that content key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedPayload {
    pub sender_key: PublicKey,
    pub cipher_text: Vec<u8>,
    pub cipher_text_nonce: Nonce,
    /// Parallel to the recipient key list the payload was created with.
    pub recipient_boxes: Vec<Vec<u8>>,
    pub recipient_nonce: Nonce,
    pub privacy_group_id: Option<PrivacyGroupId>,
}

/// An [`EncodedPayload`] paired with the recipient keys its boxes belong to.
///
/// Only the node that created a transaction holds the full key list. Copies
/// handed to anyone else go through [`EncodedPayloadWithRecipients::for_recipient`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedPayloadWithRecipients {
    pub payload: EncodedPayload,
    pub recipient_keys: Vec<PublicKey>,
}

impl EncodedPayloadWithRecipients {
    pub fn new(payload: EncodedPayload, recipient_keys: Vec<PublicKey>) -> Self {
        Self {
            payload,
            recipient_keys,
        }
    }

    /// A copy that exposes only the box belonging to `key` and no recipient
    /// keys at all. `None` if `key` is not a recipient.
    pub fn for_recipient(&self, key: &PublicKey) -> Option<Self> {
        let index = self.recipient_keys.iter().position(|k| k == key)?;
        let recipient_box = self.payload.recipient_boxes.get(index)?.clone();

        Some(Self {
            payload: EncodedPayload {
                recipient_boxes: vec![recipient_box],
                ..self.payload.clone()
            },
            recipient_keys: Vec::new(),
        })
    }
}

pub fn encode_payload(payload: &EncodedPayload) -> Vec<u8> {
    let mut buffer = Vec::with_capacity(
        payload.cipher_text.len()
            + payload.recipient_boxes.iter().map(Vec::len).sum::<usize>()
            + 128,
    );

    write_payload(&mut buffer, payload);

    buffer
}

pub fn decode_payload(input: &[u8]) -> Result<EncodedPayload, DecodeError> {
    read_payload(&mut ByteReader::new(input))
}

/// The layout every `/push` body uses. A privacy group id, when present,
/// trails the recipient keys so payloads without one keep the plain layout.
pub fn encode_payload_with_recipients(value: &EncodedPayloadWithRecipients) -> Vec<u8> {
    let mut buffer = encode_payload(&value.payload);
    encode_array(&mut buffer, value.recipient_keys.iter());

    if let Some(group_id) = &value.payload.privacy_group_id {
        encode_field(&mut buffer, group_id.as_ref());
    }

    buffer
}

pub fn decode_payload_with_recipients(
    input: &[u8],
) -> Result<EncodedPayloadWithRecipients, DecodeError> {
    let mut reader = ByteReader::new(input);
    let mut payload = read_payload(&mut reader)?;

    let recipient_keys = reader
        .read_array("recipient keys")?
        .into_iter()
        .map(|key| {
            PublicKey::from_slice(key).map_err(|_| DecodeError::InvalidValue {
                field: "recipient keys",
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    if !reader.is_empty() {
        let group_id = reader.read_field("privacy group id")?;
        payload.privacy_group_id = Some(PrivacyGroupId::from(group_id.to_vec()));
    }

    Ok(EncodedPayloadWithRecipients {
        payload,
        recipient_keys,
    })
}

fn write_payload(buffer: &mut Vec<u8>, payload: &EncodedPayload) {
    encode_field(buffer, payload.sender_key.as_ref());
    encode_field(buffer, &payload.cipher_text);
    encode_field(buffer, payload.cipher_text_nonce.as_ref());
    encode_array(buffer, payload.recipient_boxes.iter());
    encode_field(buffer, payload.recipient_nonce.as_ref());
}

fn read_payload(reader: &mut ByteReader<'_>) -> Result<EncodedPayload, DecodeError> {
    let sender_key = PublicKey::from_slice(reader.read_field("sender key")?)
        .map_err(|_| DecodeError::InvalidValue { field: "sender key" })?;
    let cipher_text = reader.read_field("cipher text")?.to_vec();
    let cipher_text_nonce = Nonce::from_slice(reader.read_field("cipher text nonce")?)
        .map_err(|_| DecodeError::InvalidValue {
            field: "cipher text nonce",
        })?;
    let recipient_boxes = reader
        .read_array("recipient boxes")?
        .into_iter()
        .map(<[u8]>::to_vec)
        .collect();
    let recipient_nonce = Nonce::from_slice(reader.read_field("recipient nonce")?)
        .map_err(|_| DecodeError::InvalidValue {
            field: "recipient nonce",
        })?;

    Ok(EncodedPayload {
        sender_key,
        cipher_text,
        cipher_text_nonce,
        recipient_boxes,
        recipient_nonce,
        privacy_group_id: None,
    })
}
