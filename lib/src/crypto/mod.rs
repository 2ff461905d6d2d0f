//! Key agreement and authenticated sealing.
//!
//! Everything above this module talks to the [`Encryptor`] trait and the key
//! wrapper types, never to a concrete cipher.
mod engine;
mod keys;
pub mod rng;
mod xchacha;

pub use engine::{Encryptor, EncryptorType};
pub use keys::{KeyPair, Nonce, PrivateKey, PublicKey, SharedKey, KEY_LENGTH, NONCE_LENGTH};
pub use xchacha::{public_key_for, XChaChaEncryptor};

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    #[error("invalid key length: expected {expected} bytes, got {actual}")]
    InvalidKeyLength { expected: usize, actual: usize },
    #[error("invalid nonce length: expected {expected} bytes, got {actual}")]
    InvalidNonceLength { expected: usize, actual: usize },
    #[error("public key is not usable for key agreement")]
    InvalidPublicKey,
    #[error("encryption failed")]
    Encryption,
    #[error("decryption failed: the box could not be authenticated")]
    Authentication,
}
