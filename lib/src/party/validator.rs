//! Challenge/response proof that a node holds the private key it claims.
//!
//! The challenger encrypts a random UUID from its default key to the claimed
//! key and posts it to the claimed url. Only the holder of the private key can
//! echo the UUID back.
use std::collections::BTreeSet;

use tracing::{debug, warn};
use uuid::Uuid;

use crate::{
    codec::{
        decode_payload_with_recipients, encode_payload_with_recipients,
        EncodedPayloadWithRecipients,
    },
    constants::PARTYINFO_VALIDATE_PATH,
    crypto::rng::random_uuid,
    enclave::Enclave,
    error::Error,
};

use super::{P2pClient, PartyInfo, Recipient};

/// Recipients of `incoming` served at the sender's own url that answered
/// their challenge. Keys relayed for other urls are never trusted here.
pub(super) async fn validate_and_extract_valid_recipients(
    incoming: &PartyInfo,
    enclave: &Enclave,
    client: &dyn P2pClient,
) -> Result<BTreeSet<Recipient>, Error> {
    let mut validated = BTreeSet::new();

    for recipient in incoming
        .recipients
        .iter()
        .filter(|recipient| recipient.url == incoming.url)
    {
        let challenge = random_uuid().to_string();
        let payload = enclave.encrypt_payload(
            challenge.as_bytes(),
            &enclave.default_public_key(),
            &[recipient.key],
            None,
        )?;
        let body = encode_payload_with_recipients(&EncodedPayloadWithRecipients::new(
            payload,
            vec![recipient.key],
        ));

        match client
            .post(&incoming.url, PARTYINFO_VALIDATE_PATH, body)
            .await
        {
            Ok(response) if response == challenge.as_bytes() => {
                debug!("Validated {} at {}", recipient.key, recipient.url);
                validated.insert(recipient.clone());
            }
            Ok(_) => warn!(
                "{} answered the challenge for {} incorrectly",
                incoming.url, recipient.key
            ),
            Err(e) => warn!(
                "Could not challenge {} for {}: {e}",
                incoming.url, recipient.key
            ),
        }
    }

    if validated.is_empty() {
        return Err(Error::UnverifiedParty(format!(
            "{} did not prove ownership of any key",
            incoming.url
        )));
    }

    Ok(validated)
}

/// Responder side. Opens the challenge with its first recipient key, which
/// has to be ours, and only ever answers with a UUID.
pub(super) fn unencrypt_sample_data(enclave: &Enclave, challenge: &[u8]) -> Result<String, Error> {
    let decoded = decode_payload_with_recipients(challenge)?;

    let key = decoded
        .recipient_keys
        .first()
        .ok_or_else(|| Error::InvalidRequest("challenge names no recipient".to_owned()))?;

    if !enclave.is_local(key) {
        return Err(Error::KeyNotFound(format!("{key} is not managed by this node")));
    }

    let plain =
        enclave.unencrypt_transaction(&decoded.payload, &decoded.recipient_keys, key)?;
    let text = String::from_utf8(plain)
        .map_err(|_| Error::InvalidRequest("challenge is not text".to_owned()))?;

    Uuid::parse_str(&text)
        .map_err(|_| Error::InvalidRequest("challenge is not a UUID".to_owned()))?;

    Ok(text)
}

#[cfg(test)]
mod tests {
    use crate::testing::{keypair, single_key_enclave, UnreachableClient};

    use super::*;

    #[test]
    fn responder_echoes_uuid() {
        let challenger = keypair();
        let responder = keypair();
        let challenger_node = single_key_enclave(&challenger);
        let responder_node = single_key_enclave(&responder);

        let uuid = random_uuid().to_string();
        let payload = challenger_node
            .encrypt_payload(uuid.as_bytes(), &challenger.public, &[responder.public], None)
            .expect("encryption works");
        let body = encode_payload_with_recipients(&EncodedPayloadWithRecipients::new(
            payload,
            vec![responder.public],
        ));

        assert_eq!(
            unencrypt_sample_data(&responder_node, &body).expect("valid challenge"),
            uuid,
            "the responder must echo the uuid"
        );
    }

    #[test]
    fn responder_refuses_arbitrary_plaintext() {
        let challenger = keypair();
        let responder = keypair();
        let challenger_node = single_key_enclave(&challenger);
        let responder_node = single_key_enclave(&responder);

        let payload = challenger_node
            .encrypt_payload(b"decrypt this for me", &challenger.public, &[responder.public], None)
            .expect("encryption works");
        let body = encode_payload_with_recipients(&EncodedPayloadWithRecipients::new(
            payload,
            vec![responder.public],
        ));

        assert!(
            matches!(
                unencrypt_sample_data(&responder_node, &body),
                Err(Error::InvalidRequest(_))
            ),
            "the validate endpoint must not act as a decryption oracle"
        );
    }

    #[test]
    fn responder_refuses_foreign_key() {
        let challenger = keypair();
        let responder = keypair();
        let stranger = keypair();
        let challenger_node = single_key_enclave(&challenger);
        let responder_node = single_key_enclave(&responder);

        let payload = challenger_node
            .encrypt_payload(b"x", &challenger.public, &[stranger.public], None)
            .expect("encryption works");
        let body = encode_payload_with_recipients(&EncodedPayloadWithRecipients::new(
            payload,
            vec![stranger.public],
        ));

        assert!(
            matches!(
                unencrypt_sample_data(&responder_node, &body),
                Err(Error::KeyNotFound(_))
            ),
            "only local keys can be challenged"
        );
    }

    #[tokio::test]
    async fn unreachable_claimant_is_unverified() {
        let challenger = keypair();
        let enclave = single_key_enclave(&challenger);
        let incoming = PartyInfo {
            url: "http://claimant".to_owned(),
            recipients: BTreeSet::from([Recipient::new(keypair().public, "http://claimant")]),
            parties: BTreeSet::new(),
        };

        let result =
            validate_and_extract_valid_recipients(&incoming, &enclave, &UnreachableClient).await;

        assert!(
            matches!(result, Err(Error::UnverifiedParty(_))),
            "no validated key means the party is not trusted"
        );
    }
}
