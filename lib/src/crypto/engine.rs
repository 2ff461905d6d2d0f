use serde::{Deserialize, Serialize};

use super::{
    keys::{KeyPair, Nonce, PrivateKey, PublicKey, SharedKey},
    xchacha::XChaChaEncryptor,
    CryptoError,
};

/// Box-style sealing primitives.
///
/// `seal`/`open` take a keypair (one public, one private half) and are
/// equivalent to computing the shared key first and then calling the
/// `*_after_precomputation` variants. The precomputed variants are what the
/// enclave uses when the same shared key is reused, and also for one-time
/// content keys from [`Encryptor::create_single_key`].
pub trait Encryptor: Send + Sync {
    /// Must be commutative: `compute_shared_key(a.public, b.private)` equals
    /// `compute_shared_key(b.public, a.private)`.
    fn compute_shared_key(
        &self,
        public: &PublicKey,
        private: &PrivateKey,
    ) -> Result<SharedKey, CryptoError>;

    fn seal_after_precomputation(
        &self,
        message: &[u8],
        nonce: &Nonce,
        shared_key: &SharedKey,
    ) -> Result<Vec<u8>, CryptoError>;

    fn open_after_precomputation(
        &self,
        cipher_text: &[u8],
        nonce: &Nonce,
        shared_key: &SharedKey,
    ) -> Result<Vec<u8>, CryptoError>;

    fn random_nonce(&self) -> Nonce;

    fn generate_new_keys(&self) -> KeyPair;

    /// A random symmetric key, not derived from any keypair.
    fn create_single_key(&self) -> SharedKey;

    fn seal(
        &self,
        message: &[u8],
        nonce: &Nonce,
        public: &PublicKey,
        private: &PrivateKey,
    ) -> Result<Vec<u8>, CryptoError> {
        let shared_key = self.compute_shared_key(public, private)?;
        self.seal_after_precomputation(message, nonce, &shared_key)
    }

    fn open(
        &self,
        cipher_text: &[u8],
        nonce: &Nonce,
        public: &PublicKey,
        private: &PrivateKey,
    ) -> Result<Vec<u8>, CryptoError> {
        let shared_key = self.compute_shared_key(public, private)?;
        self.open_after_precomputation(cipher_text, nonce, &shared_key)
    }
}

/// The closed set of [`Encryptor`] implementations a node can be configured with.
/// Resolved once at startup with [`EncryptorType::create`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EncryptorType {
    #[default]
    #[serde(rename = "xchacha20poly1305")]
    XChaCha20Poly1305,
}

impl EncryptorType {
    pub fn create(self) -> Box<dyn Encryptor> {
        match self {
            EncryptorType::XChaCha20Poly1305 => Box::new(XChaChaEncryptor),
        }
    }
}
