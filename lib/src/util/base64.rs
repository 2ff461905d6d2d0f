use std::fmt::Display;

use base64ct::{Base64, Base64UrlUnpadded, Encoding};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Binary content carried as standard padded base64 in JSON bodies.
///
/// Decoding also accepts the unpadded URL-safe alphabet, which is what hashes
/// look like when they travel in a path segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Base64String(String);

impl Display for Base64String {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl Base64String {
    pub fn inner_str(&self) -> &str {
        &self.0
    }

    pub fn from_base64_str(s: &str) -> Option<Self> {
        Self::decode_standard(s).map(Base64String::from_bytes)
    }

    pub fn from_bytes<Bytes: AsRef<[u8]>>(bytes: Bytes) -> Self {
        Base64String(Self::encode_standard(bytes))
    }

    pub fn to_vec(&self) -> Vec<u8> {
        // Only constructed from valid base64, so this never falls back.
        Self::decode_standard(&self.0).unwrap_or_default()
    }

    pub fn encode_standard<Bytes: AsRef<[u8]>>(bytes: Bytes) -> String {
        Base64::encode_string(bytes.as_ref())
    }

    pub fn encode_url<Bytes: AsRef<[u8]>>(bytes: Bytes) -> String {
        Base64UrlUnpadded::encode_string(bytes.as_ref())
    }

    pub fn decode_standard(s: &str) -> Option<Vec<u8>> {
        Base64::decode_vec(s)
            .or_else(|_| Base64UrlUnpadded::decode_vec(s))
            .ok()
    }
}

impl Serialize for Base64String {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Base64String {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Base64String::from_base64_str(&s)
            .ok_or_else(|| serde::de::Error::custom("invalid base64 content"))
    }
}
