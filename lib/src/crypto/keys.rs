//! Fixed-length key and nonce wrappers.
//!
//! Public keys and nonces are plain value types. Private keys and shared keys
//! are zeroized on drop and never print their content.
use std::fmt::Display;

use serde::{de::Error as _, Deserialize, Deserializer, Serialize, Serializer};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::util::base64::Base64String;

use super::CryptoError;

pub const KEY_LENGTH: usize = 32;
pub const NONCE_LENGTH: usize = 24;

#[inline]
fn copy_exact<const N: usize>(bytes: &[u8]) -> Result<[u8; N], CryptoError> {
    bytes.try_into().map_err(|_| CryptoError::InvalidKeyLength {
        expected: N,
        actual: bytes.len(),
    })
}

/// A 32 byte public key. Equality, ordering and hashing are by byte content.
///
/// Human-readable formats (JSON, TOML) carry it as standard base64, binary
/// formats as the raw bytes.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PublicKey([u8; KEY_LENGTH]);

impl PublicKey {
    pub const fn from_bytes(bytes: [u8; KEY_LENGTH]) -> Self {
        Self(bytes)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, CryptoError> {
        Ok(Self(copy_exact(bytes)?))
    }

    /// Parses a standard (padded) base64 string, the format keys are
    /// exchanged in over JSON and in configuration files.
    pub fn from_base64(s: &str) -> Result<Self, CryptoError> {
        let bytes = Base64String::decode_standard(s).ok_or(CryptoError::InvalidKeyLength {
            expected: KEY_LENGTH,
            actual: 0,
        })?;

        Self::from_slice(&bytes)
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LENGTH] {
        &self.0
    }

    pub fn to_base64(&self) -> String {
        Base64String::encode_standard(self.0)
    }
}

impl AsRef<[u8]> for PublicKey {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl Display for PublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_base64())
    }
}

impl std::fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PublicKey({})", self.to_base64())
    }
}

impl Serialize for PublicKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            serializer.serialize_str(&self.to_base64())
        } else {
            self.0.serialize(serializer)
        }
    }
}

impl<'de> Deserialize<'de> for PublicKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        if deserializer.is_human_readable() {
            let s = String::deserialize(deserializer)?;
            PublicKey::from_base64(&s).map_err(D::Error::custom)
        } else {
            <[u8; KEY_LENGTH]>::deserialize(deserializer).map(PublicKey)
        }
    }
}

/// A 32 byte private key.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct PrivateKey([u8; KEY_LENGTH]);

impl PrivateKey {
    pub const fn from_bytes(bytes: [u8; KEY_LENGTH]) -> Self {
        Self(bytes)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, CryptoError> {
        Ok(Self(copy_exact(bytes)?))
    }

    pub fn from_base64(s: &str) -> Result<Self, CryptoError> {
        let mut bytes = Base64String::decode_standard(s).ok_or(CryptoError::InvalidKeyLength {
            expected: KEY_LENGTH,
            actual: 0,
        })?;
        let key = Self::from_slice(&bytes);
        bytes.zeroize();

        key
    }

    /// Avoid logging or persisting the returned bytes.
    pub fn as_bytes(&self) -> &[u8; KEY_LENGTH] {
        &self.0
    }

    pub fn to_base64(&self) -> String {
        Base64String::encode_standard(self.0)
    }
}

impl std::fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("PrivateKey([REDACTED])")
    }
}

/// Private keys are only ever read from configuration, never written out.
impl<'de> Deserialize<'de> for PrivateKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let mut s = String::deserialize(deserializer)?;
        let key = PrivateKey::from_base64(&s).map_err(D::Error::custom);
        s.zeroize();

        key
    }
}

/// A symmetric key, either derived from a keypair with
/// [`Encryptor::compute_shared_key`](super::Encryptor::compute_shared_key) or
/// generated at random to act as a one-time content key.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct SharedKey([u8; KEY_LENGTH]);

impl SharedKey {
    pub const fn from_bytes(bytes: [u8; KEY_LENGTH]) -> Self {
        Self(bytes)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, CryptoError> {
        Ok(Self(copy_exact(bytes)?))
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LENGTH] {
        &self.0
    }
}

impl std::fmt::Debug for SharedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SharedKey([REDACTED])")
    }
}

/// A 24 byte nonce.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Nonce([u8; NONCE_LENGTH]);

impl Nonce {
    pub const fn from_bytes(bytes: [u8; NONCE_LENGTH]) -> Self {
        Self(bytes)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, CryptoError> {
        let bytes = bytes
            .try_into()
            .map_err(|_| CryptoError::InvalidNonceLength {
                expected: NONCE_LENGTH,
                actual: bytes.len(),
            })?;

        Ok(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; NONCE_LENGTH] {
        &self.0
    }
}

impl AsRef<[u8]> for Nonce {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl std::fmt::Debug for Nonce {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Nonce({:02x}{:02x}..)", self.0[0], self.0[1])
    }
}

#[derive(Debug, Clone)]
pub struct KeyPair {
    pub public: PublicKey,
    pub private: PrivateKey,
}
