use crate::crypto::{Nonce, PublicKey};

use super::{encode_field, ByteReader, DecodeError};

/// A payload sealed for its sender only, waiting for a recipient list.
///
/// `encrypted_key` is the content key sealed with the key the sender shares
/// with itself. Both seals use `nonce`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawTransaction {
    pub from: PublicKey,
    pub encrypted_payload: Vec<u8>,
    pub encrypted_key: Vec<u8>,
    pub nonce: Nonce,
}

pub fn encode_raw_transaction(raw: &RawTransaction) -> Vec<u8> {
    let mut buffer =
        Vec::with_capacity(raw.encrypted_payload.len() + raw.encrypted_key.len() + 96);

    encode_field(&mut buffer, raw.from.as_ref());
    encode_field(&mut buffer, &raw.encrypted_payload);
    encode_field(&mut buffer, &raw.encrypted_key);
    encode_field(&mut buffer, raw.nonce.as_ref());

    buffer
}

pub fn decode_raw_transaction(input: &[u8]) -> Result<RawTransaction, DecodeError> {
    let mut reader = ByteReader::new(input);

    let from = PublicKey::from_slice(reader.read_field("sender key")?)
        .map_err(|_| DecodeError::InvalidValue { field: "sender key" })?;
    let encrypted_payload = reader.read_field("encrypted payload")?.to_vec();
    let encrypted_key = reader.read_field("encrypted key")?.to_vec();
    let nonce = Nonce::from_slice(reader.read_field("nonce")?)
        .map_err(|_| DecodeError::InvalidValue { field: "nonce" })?;

    Ok(RawTransaction {
        from,
        encrypted_payload,
        encrypted_key,
        nonce,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncated_raw_transaction_names_the_field() {
        let raw = RawTransaction {
            from: PublicKey::from_bytes([1; 32]),
            encrypted_payload: vec![2; 10],
            encrypted_key: vec![3; 48],
            nonce: Nonce::from_bytes([4; 24]),
        };
        let encoded = encode_raw_transaction(&raw);

        assert_eq!(
            decode_raw_transaction(&encoded).expect("complete record decodes"),
            raw,
            "every field comes back"
        );
        assert_eq!(
            decode_raw_transaction(&encoded[..encoded.len() - 4]),
            Err(DecodeError::Truncated { field: "nonce" }),
            "a cut-off record reports the missing field"
        );
    }
}
