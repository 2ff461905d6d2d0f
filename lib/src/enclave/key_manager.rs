use crate::{
    crypto::{public_key_for, CryptoError, KeyPair, PrivateKey, PublicKey},
    error::Error,
};

/// The keys this node manages.
pub trait KeyManager: Send + Sync {
    /// Every managed public key, default key first.
    fn public_keys(&self) -> Vec<PublicKey>;

    fn private_key_for(&self, public: &PublicKey) -> Option<&PrivateKey>;

    /// Sender used when a request does not name one.
    fn default_public_key(&self) -> PublicKey;

    /// Added as recipients to every outbound transaction.
    fn forwarding_keys(&self) -> Vec<PublicKey>;
}

/// Keys held in process memory, usually read from the config file.
#[derive(Debug)]
pub struct LocalKeyManager {
    keys: Vec<KeyPair>,
    forwarding: Vec<PublicKey>,
}

impl LocalKeyManager {
    /// Fails if there are no keys or a private key does not belong to its
    /// public key.
    pub fn new(keys: Vec<KeyPair>, forwarding: Vec<PublicKey>) -> Result<Self, Error> {
        if keys.is_empty() {
            return Err(Error::InvalidRequest(
                "at least one key pair must be configured".to_owned(),
            ));
        }

        if let Some(pair) = keys
            .iter()
            .find(|pair| public_key_for(&pair.private) != pair.public)
        {
            tracing::error!("Private key does not match public key {}", pair.public);
            return Err(Error::Crypto(CryptoError::InvalidPublicKey));
        }

        Ok(Self { keys, forwarding })
    }
}

impl KeyManager for LocalKeyManager {
    fn public_keys(&self) -> Vec<PublicKey> {
        self.keys.iter().map(|pair| pair.public).collect()
    }

    fn private_key_for(&self, public: &PublicKey) -> Option<&PrivateKey> {
        self.keys
            .iter()
            .find(|pair| &pair.public == public)
            .map(|pair| &pair.private)
    }

    fn default_public_key(&self) -> PublicKey {
        // `new` guarantees at least one key.
        self.keys[0].public
    }

    fn forwarding_keys(&self) -> Vec<PublicKey> {
        self.forwarding.clone()
    }
}

#[cfg(test)]
mod tests {
    use crate::crypto::{Encryptor, XChaChaEncryptor};

    use super::*;

    #[test]
    fn first_key_is_default() {
        let first = XChaChaEncryptor.generate_new_keys();
        let second = XChaChaEncryptor.generate_new_keys();
        let manager = LocalKeyManager::new(vec![first.clone(), second.clone()], vec![])
            .expect("valid key pairs");

        assert_eq!(
            manager.default_public_key(),
            first.public,
            "the first configured key is the default"
        );
        assert_eq!(
            manager.public_keys(),
            vec![first.public, second.public],
            "keys keep their configured order"
        );
        assert!(
            manager.private_key_for(&second.public).is_some(),
            "every managed key has its private half"
        );
    }

    #[test]
    fn mismatched_pair_is_rejected() {
        let first = XChaChaEncryptor.generate_new_keys();
        let second = XChaChaEncryptor.generate_new_keys();
        let mixed = KeyPair {
            public: first.public,
            private: second.private,
        };

        assert!(
            LocalKeyManager::new(vec![mixed], vec![]).is_err(),
            "a private key from another pair must not be accepted"
        );
        assert!(
            LocalKeyManager::new(vec![], vec![]).is_err(),
            "a node without keys cannot work"
        );
    }
}
