use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::util::base64::Base64String;

use super::IdentifierError;

/// `PrivacyGroupId` identifies a privacy group.
///
/// Negotiated and legacy group ids are digests of the member keys, resident
/// group ids are the bytes of the group name, so the length is not fixed.
#[derive(PartialEq, Eq, Clone, Hash, PartialOrd, Ord)]
pub struct PrivacyGroupId(Vec<u8>);

impl PrivacyGroupId {
    pub fn from_base64(s: &str) -> Result<Self, IdentifierError> {
        Base64String::decode_standard(s)
            .map(PrivacyGroupId)
            .ok_or(IdentifierError::InvalidBase64)
    }

    pub fn to_base64(&self) -> String {
        Base64String::encode_standard(&self.0)
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }
}

impl AsRef<[u8]> for PrivacyGroupId {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<Vec<u8>> for PrivacyGroupId {
    fn from(value: Vec<u8>) -> Self {
        PrivacyGroupId(value)
    }
}

impl std::fmt::Display for PrivacyGroupId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PrivacyGroup({})", self.to_base64())
    }
}

impl std::fmt::Debug for PrivacyGroupId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(self, f)
    }
}

impl Serialize for PrivacyGroupId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_base64())
    }
}

impl<'de> Deserialize<'de> for PrivacyGroupId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        PrivacyGroupId::from_base64(&s).map_err(serde::de::Error::custom)
    }
}
