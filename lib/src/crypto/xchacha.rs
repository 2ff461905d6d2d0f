//! X25519 key agreement with XChaCha20-Poly1305 sealing.
//!
//! The X25519 output is never used as a key directly: it goes through
//! HKDF-SHA256 first, so the shared key is uniformly distributed.
use chacha20poly1305::{
    aead::{Aead, KeyInit},
    XChaCha20Poly1305, XNonce,
};
use hkdf::Hkdf;
use sha2::Sha256;
use x25519_dalek::StaticSecret;
use zeroize::Zeroize;

use super::{
    keys::{KeyPair, Nonce, PrivateKey, PublicKey, SharedKey, KEY_LENGTH, NONCE_LENGTH},
    rng::{get_rng, random_bytes},
    Encryptor, CryptoError,
};

const SHARED_KEY_INFO: &[u8] = b"privtx shared key v1";

#[derive(Debug, Default, Clone, Copy)]
pub struct XChaChaEncryptor;

impl Encryptor for XChaChaEncryptor {
    fn compute_shared_key(
        &self,
        public: &PublicKey,
        private: &PrivateKey,
    ) -> Result<SharedKey, CryptoError> {
        let secret = StaticSecret::from(*private.as_bytes());
        let peer = x25519_dalek::PublicKey::from(*public.as_bytes());
        let shared = secret.diffie_hellman(&peer);

        // A low order point gives an all-zero output, which must not become a key.
        if !shared.was_contributory() {
            return Err(CryptoError::InvalidPublicKey);
        }

        let mut okm = [0u8; KEY_LENGTH];
        Hkdf::<Sha256>::new(None, shared.as_bytes())
            .expand(SHARED_KEY_INFO, &mut okm)
            .map_err(|_| CryptoError::Encryption)?;

        let key = SharedKey::from_bytes(okm);
        okm.zeroize();

        Ok(key)
    }

    fn seal_after_precomputation(
        &self,
        message: &[u8],
        nonce: &Nonce,
        shared_key: &SharedKey,
    ) -> Result<Vec<u8>, CryptoError> {
        XChaCha20Poly1305::new(shared_key.as_bytes().into())
            .encrypt(XNonce::from_slice(nonce.as_bytes()), message)
            .map_err(|_| CryptoError::Encryption)
    }

    fn open_after_precomputation(
        &self,
        cipher_text: &[u8],
        nonce: &Nonce,
        shared_key: &SharedKey,
    ) -> Result<Vec<u8>, CryptoError> {
        XChaCha20Poly1305::new(shared_key.as_bytes().into())
            .decrypt(XNonce::from_slice(nonce.as_bytes()), cipher_text)
            .map_err(|_| CryptoError::Authentication)
    }

    fn random_nonce(&self) -> Nonce {
        Nonce::from_bytes(random_bytes::<NONCE_LENGTH>())
    }

    fn generate_new_keys(&self) -> KeyPair {
        let secret = StaticSecret::random_from_rng(get_rng());
        let public = x25519_dalek::PublicKey::from(&secret);

        KeyPair {
            public: PublicKey::from_bytes(public.to_bytes()),
            private: PrivateKey::from_bytes(secret.to_bytes()),
        }
    }

    fn create_single_key(&self) -> SharedKey {
        SharedKey::from_bytes(random_bytes::<KEY_LENGTH>())
    }
}

/// Derives the public half of a private key. Used to check configured keypairs.
pub fn public_key_for(private: &PrivateKey) -> PublicKey {
    let secret = StaticSecret::from(*private.as_bytes());
    PublicKey::from_bytes(x25519_dalek::PublicKey::from(&secret).to_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shared_key_is_commutative() {
        let encryptor = XChaChaEncryptor;
        let a = encryptor.generate_new_keys();
        let b = encryptor.generate_new_keys();

        let ab = encryptor
            .compute_shared_key(&a.public, &b.private)
            .expect("valid keys");
        let ba = encryptor
            .compute_shared_key(&b.public, &a.private)
            .expect("valid keys");

        assert_eq!(ab, ba, "both sides must derive the same shared key");
    }

    #[test]
    fn seal_open_with_keypairs() {
        let encryptor = XChaChaEncryptor;
        let a = encryptor.generate_new_keys();
        let b = encryptor.generate_new_keys();
        let nonce = encryptor.random_nonce();

        let sealed = encryptor
            .seal(b"hello", &nonce, &a.public, &b.private)
            .expect("seal works");
        let opened = encryptor
            .open(&sealed, &nonce, &b.public, &a.private)
            .expect("open works");

        assert_eq!(opened, b"hello", "the other side must recover the message");
    }

    #[test]
    fn seal_open_after_precomputation() {
        let encryptor = XChaChaEncryptor;
        let a = encryptor.generate_new_keys();
        let b = encryptor.generate_new_keys();
        let nonce = encryptor.random_nonce();

        let shared = encryptor
            .compute_shared_key(&b.public, &a.private)
            .expect("valid keys");
        let sealed = encryptor
            .seal_after_precomputation(b"precomputed", &nonce, &shared)
            .expect("seal works");

        let other_side = encryptor
            .compute_shared_key(&a.public, &b.private)
            .expect("valid keys");
        let opened = encryptor
            .open_after_precomputation(&sealed, &nonce, &other_side)
            .expect("open works");

        assert_eq!(opened, b"precomputed", "precomputed keys must interoperate");
    }

    #[test]
    fn content_key_round_trip() {
        let encryptor = XChaChaEncryptor;
        let key = encryptor.create_single_key();
        let nonce = encryptor.random_nonce();

        let sealed = encryptor
            .seal_after_precomputation(b"content", &nonce, &key)
            .expect("seal works");

        assert_eq!(
            encryptor
                .open_after_precomputation(&sealed, &nonce, &key)
                .expect("open works"),
            b"content",
            "a single key opens what it sealed"
        );
        assert_ne!(
            encryptor.create_single_key(),
            key,
            "single keys are random, not derived"
        );
    }

    #[test]
    fn tampered_box_fails_authentication() {
        let encryptor = XChaChaEncryptor;
        let key = encryptor.create_single_key();
        let nonce = encryptor.random_nonce();

        let mut sealed = encryptor
            .seal_after_precomputation(b"content", &nonce, &key)
            .expect("seal works");
        sealed[0] ^= 0xff;

        assert_eq!(
            encryptor.open_after_precomputation(&sealed, &nonce, &key),
            Err(CryptoError::Authentication),
            "a modified cipher text must be rejected"
        );
    }

    #[test]
    fn wrong_key_fails_authentication() {
        let encryptor = XChaChaEncryptor;
        let a = encryptor.generate_new_keys();
        let b = encryptor.generate_new_keys();
        let eve = encryptor.generate_new_keys();
        let nonce = encryptor.random_nonce();

        let sealed = encryptor
            .seal(b"secret", &nonce, &b.public, &a.private)
            .expect("seal works");

        assert!(
            encryptor
                .open(&sealed, &nonce, &a.public, &eve.private)
                .is_err(),
            "a third party cannot open the box"
        );
    }

    #[test]
    fn low_order_public_key_is_rejected() {
        let encryptor = XChaChaEncryptor;
        let a = encryptor.generate_new_keys();

        assert_eq!(
            encryptor.compute_shared_key(&PublicKey::from_bytes([0u8; KEY_LENGTH]), &a.private),
            Err(CryptoError::InvalidPublicKey),
            "the all-zero point gives no shared secret"
        );
    }

    #[test]
    fn derived_public_key_matches() {
        let encryptor = XChaChaEncryptor;
        let pair = encryptor.generate_new_keys();

        assert_eq!(
            public_key_for(&pair.private),
            pair.public,
            "the public key is derived from the private key"
        );
    }
}
