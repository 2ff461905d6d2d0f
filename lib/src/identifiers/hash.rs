use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha512};

use crate::util::base64::Base64String;

use super::IdentifierError;

pub const MESSAGE_HASH_BYTES: usize = 64;

/// `MessageHash` is the key a transaction is stored under.
///
/// It is the SHA-512 digest of the payload cipher text, which every node
/// holding a copy of the transaction has regardless of which recipient boxes
/// that copy carries, so all of them agree on the hash.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MessageHash([u8; MESSAGE_HASH_BYTES]);

impl MessageHash {
    pub fn of_cipher_text(cipher_text: &[u8]) -> Self {
        let digest = Sha512::digest(cipher_text);
        let mut bytes = [0u8; MESSAGE_HASH_BYTES];
        bytes.copy_from_slice(&digest);

        MessageHash(bytes)
    }

    pub fn from_base64(s: &str) -> Result<Self, IdentifierError> {
        let bytes = Base64String::decode_standard(s).ok_or(IdentifierError::InvalidBase64)?;
        Self::try_from(bytes.as_slice())
    }

    pub fn to_base64(&self) -> String {
        Base64String::encode_standard(self.0)
    }
}

impl AsRef<[u8]> for MessageHash {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl TryFrom<&[u8]> for MessageHash {
    type Error = IdentifierError;

    fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
        Ok(MessageHash(
            value.try_into().map_err(|_| IdentifierError::InvalidLength)?,
        ))
    }
}

impl std::fmt::Display for MessageHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_base64())
    }
}

impl std::fmt::Debug for MessageHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "MessageHash({})", self.to_base64())
    }
}

impl Serialize for MessageHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_base64())
    }
}

impl<'de> Deserialize<'de> for MessageHash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        MessageHash::from_base64(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_depends_only_on_cipher_text() {
        let first = MessageHash::of_cipher_text(b"cipher");
        let second = MessageHash::of_cipher_text(b"cipher");

        assert_eq!(first, second, "same cipher text should give the same hash");
        assert_ne!(
            first,
            MessageHash::of_cipher_text(b"other"),
            "different cipher text should give a different hash"
        );
    }

    #[test]
    fn base64_roundtrip_accepts_url_alphabet() {
        let hash = MessageHash::of_cipher_text(b"cipher");
        let url_form = Base64String::encode_url(hash);

        assert_eq!(
            MessageHash::from_base64(&hash.to_base64()),
            Ok(hash),
            "standard base64 should parse"
        );
        assert_eq!(
            MessageHash::from_base64(&url_form),
            Ok(hash),
            "path-safe base64 should parse too"
        );
    }

    #[test]
    fn wrong_length_is_rejected() {
        assert_eq!(
            MessageHash::try_from([0u8; 32].as_slice()),
            Err(IdentifierError::InvalidLength),
            "a hash is 64 bytes"
        );
    }
}
