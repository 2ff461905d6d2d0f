use std::collections::BTreeSet;

use crate::{
    crypto::PublicKey,
    party::{Party, PartyInfo, Recipient},
};

use super::{encode_array, encode_count, encode_field, ByteReader, DecodeError};

/// Layout: url, recipient count, then key and url for each recipient, then
/// the party urls as an array.
pub fn encode_party_info(party_info: &PartyInfo) -> Vec<u8> {
    let mut buffer = Vec::new();

    encode_field(&mut buffer, party_info.url.as_bytes());

    encode_count(&mut buffer, party_info.recipients.len());
    for recipient in &party_info.recipients {
        encode_field(&mut buffer, recipient.key.as_ref());
        encode_field(&mut buffer, recipient.url.as_bytes());
    }

    encode_array(
        &mut buffer,
        party_info.parties.iter().map(|party| party.url.as_bytes()),
    );

    buffer
}

/// Bytes after the party list are ignored; some peers pad their messages.
pub fn decode_party_info(input: &[u8]) -> Result<PartyInfo, DecodeError> {
    let mut reader = ByteReader::new(input);

    let url = reader.read_string("url")?;

    // Each recipient is at least two length prefixes.
    let recipient_count = reader.read_length("recipient count", 16)?;
    let mut recipients = BTreeSet::new();
    for _ in 0..recipient_count {
        let key = PublicKey::from_slice(reader.read_field("recipient key")?).map_err(|_| {
            DecodeError::InvalidValue {
                field: "recipient key",
            }
        })?;
        let url = reader.read_string("recipient url")?;

        recipients.insert(Recipient { key, url });
    }

    let parties = reader
        .read_array("parties")?
        .into_iter()
        .map(|url| {
            String::from_utf8(url.to_vec())
                .map(|url| Party { url })
                .map_err(|_| DecodeError::InvalidValue { field: "parties" })
        })
        .collect::<Result<BTreeSet<_>, _>>()?;

    Ok(PartyInfo {
        url,
        recipients,
        parties,
    })
}
