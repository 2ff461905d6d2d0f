//! Persistence seams. The core only needs keyed get/put/delete; the server
//! backs these with sled, tests and embedders can use [`memory`].
use serde::{Deserialize, Serialize};

use crate::{
    codec::{EncodedPayloadWithRecipients, RawTransaction},
    identifiers::{MessageHash, PrivacyGroupId},
};

#[derive(thiserror::Error, Debug)]
pub enum StorageError {
    #[error("Storage backend failure: {0}")]
    Backend(String),
    #[error("Stored record is corrupt: {0}")]
    Corrupt(String),
}

pub trait TransactionStore: Send + Sync {
    fn save(
        &self,
        hash: &MessageHash,
        payload: &EncodedPayloadWithRecipients,
    ) -> Result<(), StorageError>;

    fn retrieve(&self, hash: &MessageHash)
        -> Result<Option<EncodedPayloadWithRecipients>, StorageError>;

    /// Returns whether a record was removed.
    fn delete(&self, hash: &MessageHash) -> Result<bool, StorageError>;

    fn retrieve_all(
        &self,
    ) -> Result<Vec<(MessageHash, EncodedPayloadWithRecipients)>, StorageError>;
}

/// Raw transactions waiting to be sent, keyed by the hash of their cipher
/// text.
pub trait RawTransactionStore: Send + Sync {
    fn save(&self, hash: &MessageHash, raw: &RawTransaction) -> Result<(), StorageError>;

    fn retrieve(&self, hash: &MessageHash) -> Result<Option<RawTransaction>, StorageError>;
}

/// A privacy group as persisted: the encoded record plus the two keys it is
/// found by.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrivacyGroupEntity {
    pub id: Vec<u8>,
    pub lookup_id: Vec<u8>,
    pub data: Vec<u8>,
}

pub trait PrivacyGroupStore: Send + Sync {
    /// Inserts or replaces the record with the same id.
    fn save(&self, entity: &PrivacyGroupEntity) -> Result<(), StorageError>;

    fn retrieve(&self, id: &PrivacyGroupId) -> Result<Option<PrivacyGroupEntity>, StorageError>;

    /// Returns whether a record was removed.
    fn delete(&self, id: &PrivacyGroupId) -> Result<bool, StorageError>;

    fn find_by_lookup_id(&self, lookup_id: &[u8]) -> Result<Vec<PrivacyGroupEntity>, StorageError>;

    fn find_all(&self) -> Result<Vec<PrivacyGroupEntity>, StorageError>;

    /// Atomic create-if-absent: returns the stored record, which is `entity`
    /// only if nothing was stored under its id before.
    fn retrieve_or_save(&self, entity: &PrivacyGroupEntity)
        -> Result<PrivacyGroupEntity, StorageError>;
}

pub mod memory {
    use std::{
        collections::BTreeMap,
        sync::{Mutex, MutexGuard, PoisonError},
    };

    use crate::codec::{
        decode_payload_with_recipients, decode_raw_transaction, encode_payload_with_recipients,
        encode_raw_transaction,
    };

    use super::*;

    fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
        mutex.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Keeps the wire encoding, like a real store would.
    #[derive(Default)]
    pub struct MemoryTransactionStore {
        entries: Mutex<BTreeMap<MessageHash, Vec<u8>>>,
    }

    impl MemoryTransactionStore {
        pub fn len(&self) -> usize {
            lock(&self.entries).len()
        }

        pub fn is_empty(&self) -> bool {
            self.len() == 0
        }
    }

    impl TransactionStore for MemoryTransactionStore {
        fn save(
            &self,
            hash: &MessageHash,
            payload: &EncodedPayloadWithRecipients,
        ) -> Result<(), StorageError> {
            lock(&self.entries).insert(*hash, encode_payload_with_recipients(payload));
            Ok(())
        }

        fn retrieve(
            &self,
            hash: &MessageHash,
        ) -> Result<Option<EncodedPayloadWithRecipients>, StorageError> {
            lock(&self.entries)
                .get(hash)
                .map(|bytes| {
                    decode_payload_with_recipients(bytes)
                        .map_err(|e| StorageError::Corrupt(e.to_string()))
                })
                .transpose()
        }

        fn delete(&self, hash: &MessageHash) -> Result<bool, StorageError> {
            Ok(lock(&self.entries).remove(hash).is_some())
        }

        fn retrieve_all(
            &self,
        ) -> Result<Vec<(MessageHash, EncodedPayloadWithRecipients)>, StorageError> {
            lock(&self.entries)
                .iter()
                .map(|(hash, bytes)| {
                    decode_payload_with_recipients(bytes)
                        .map(|payload| (*hash, payload))
                        .map_err(|e| StorageError::Corrupt(e.to_string()))
                })
                .collect()
        }
    }

    #[derive(Default)]
    pub struct MemoryRawTransactionStore {
        entries: Mutex<BTreeMap<MessageHash, Vec<u8>>>,
    }

    impl RawTransactionStore for MemoryRawTransactionStore {
        fn save(&self, hash: &MessageHash, raw: &RawTransaction) -> Result<(), StorageError> {
            lock(&self.entries).insert(*hash, encode_raw_transaction(raw));
            Ok(())
        }

        fn retrieve(&self, hash: &MessageHash) -> Result<Option<RawTransaction>, StorageError> {
            lock(&self.entries)
                .get(hash)
                .map(|bytes| {
                    decode_raw_transaction(bytes).map_err(|e| StorageError::Corrupt(e.to_string()))
                })
                .transpose()
        }
    }

    #[derive(Default)]
    pub struct MemoryPrivacyGroupStore {
        entries: Mutex<BTreeMap<Vec<u8>, PrivacyGroupEntity>>,
    }

    impl MemoryPrivacyGroupStore {
        pub fn len(&self) -> usize {
            lock(&self.entries).len()
        }

        pub fn is_empty(&self) -> bool {
            self.len() == 0
        }
    }

    impl PrivacyGroupStore for MemoryPrivacyGroupStore {
        fn save(&self, entity: &PrivacyGroupEntity) -> Result<(), StorageError> {
            lock(&self.entries).insert(entity.id.clone(), entity.clone());
            Ok(())
        }

        fn retrieve(
            &self,
            id: &PrivacyGroupId,
        ) -> Result<Option<PrivacyGroupEntity>, StorageError> {
            Ok(lock(&self.entries).get(id.as_ref()).cloned())
        }

        fn delete(&self, id: &PrivacyGroupId) -> Result<bool, StorageError> {
            Ok(lock(&self.entries).remove(id.as_ref()).is_some())
        }

        fn find_by_lookup_id(
            &self,
            lookup_id: &[u8],
        ) -> Result<Vec<PrivacyGroupEntity>, StorageError> {
            Ok(lock(&self.entries)
                .values()
                .filter(|entity| entity.lookup_id == lookup_id)
                .cloned()
                .collect())
        }

        fn find_all(&self) -> Result<Vec<PrivacyGroupEntity>, StorageError> {
            Ok(lock(&self.entries).values().cloned().collect())
        }

        fn retrieve_or_save(
            &self,
            entity: &PrivacyGroupEntity,
        ) -> Result<PrivacyGroupEntity, StorageError> {
            Ok(lock(&self.entries)
                .entry(entity.id.clone())
                .or_insert_with(|| entity.clone())
                .clone())
        }
    }
}
