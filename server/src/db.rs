use std::path::Path;

use privtx::{
    codec::{
        decode_payload_with_recipients, decode_raw_transaction, encode_payload_with_recipients,
        encode_raw_transaction, EncodedPayloadWithRecipients, RawTransaction,
    },
    identifiers::{MessageHash, PrivacyGroupId},
    storage::{
        PrivacyGroupEntity, PrivacyGroupStore, RawTransactionStore, StorageError,
        TransactionStore,
    },
};
use serde::{Deserialize, Serialize};
use sled::{Db, Tree};

const TRANSACTIONS_TREE: &[u8] = b"transactions";
const RAW_TRANSACTIONS_TREE: &[u8] = b"raw_transactions";
const PRIVACY_GROUPS_TREE: &[u8] = b"privacy_groups";

fn backend(err: sled::Error) -> StorageError {
    StorageError::Backend(err.to_string())
}

pub fn serialize_bytes<T: Serialize>(stuff: &T) -> Result<Vec<u8>, StorageError> {
    bincode::serialize(stuff).map_err(|e| StorageError::Corrupt(e.to_string()))
}

pub fn deserialize_bytes<T: for<'de> Deserialize<'de>, B: AsRef<[u8]>>(
    bytes: B,
) -> Result<T, StorageError> {
    bincode::deserialize(bytes.as_ref()).map_err(|e| StorageError::Corrupt(e.to_string()))
}

/// The node's sled database.
///
/// `transactions`: message hash -> encoded payload with recipients.
/// `raw_transactions`: message hash -> encoded raw transaction.
/// `privacy_groups`: group id -> bincode [`PrivacyGroupEntity`].
#[derive(Clone)]
pub struct Database {
    db: Db,
    transactions: Tree,
    raw_transactions: Tree,
    privacy_groups: Tree,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self, sled::Error> {
        let db = sled::Config::new()
            .path(path)
            .mode(sled::Mode::HighThroughput)
            .open()?;

        Self::with_db(db)
    }

    /// Deleted when dropped.
    pub fn temporary() -> Result<Self, sled::Error> {
        Self::with_db(sled::Config::new().temporary(true).open()?)
    }

    fn with_db(db: Db) -> Result<Self, sled::Error> {
        Ok(Self {
            transactions: db.open_tree(TRANSACTIONS_TREE)?,
            raw_transactions: db.open_tree(RAW_TRANSACTIONS_TREE)?,
            privacy_groups: db.open_tree(PRIVACY_GROUPS_TREE)?,
            db,
        })
    }

    pub async fn flush(&self) -> Result<usize, sled::Error> {
        self.db.flush_async().await
    }
}

impl TransactionStore for Database {
    fn save(
        &self,
        hash: &MessageHash,
        payload: &EncodedPayloadWithRecipients,
    ) -> Result<(), StorageError> {
        self.transactions
            .insert(hash, encode_payload_with_recipients(payload))
            .map_err(backend)?;
        Ok(())
    }

    fn retrieve(
        &self,
        hash: &MessageHash,
    ) -> Result<Option<EncodedPayloadWithRecipients>, StorageError> {
        self.transactions
            .get(hash)
            .map_err(backend)?
            .map(|bytes| {
                decode_payload_with_recipients(&bytes)
                    .map_err(|e| StorageError::Corrupt(format!("transaction {hash}: {e}")))
            })
            .transpose()
    }

    fn delete(&self, hash: &MessageHash) -> Result<bool, StorageError> {
        Ok(self.transactions.remove(hash).map_err(backend)?.is_some())
    }

    fn retrieve_all(
        &self,
    ) -> Result<Vec<(MessageHash, EncodedPayloadWithRecipients)>, StorageError> {
        self.transactions
            .iter()
            .map(|entry| {
                let (key, value) = entry.map_err(backend)?;
                let hash = MessageHash::try_from(&*key)
                    .map_err(|e| StorageError::Corrupt(format!("transaction key: {e}")))?;
                let payload = decode_payload_with_recipients(&value)
                    .map_err(|e| StorageError::Corrupt(format!("transaction {hash}: {e}")))?;

                Ok((hash, payload))
            })
            .collect()
    }
}

impl RawTransactionStore for Database {
    fn save(&self, hash: &MessageHash, raw: &RawTransaction) -> Result<(), StorageError> {
        self.raw_transactions
            .insert(hash, encode_raw_transaction(raw))
            .map_err(backend)?;
        Ok(())
    }

    fn retrieve(&self, hash: &MessageHash) -> Result<Option<RawTransaction>, StorageError> {
        self.raw_transactions
            .get(hash)
            .map_err(backend)?
            .map(|bytes| {
                decode_raw_transaction(&bytes)
                    .map_err(|e| StorageError::Corrupt(format!("raw transaction {hash}: {e}")))
            })
            .transpose()
    }
}

impl PrivacyGroupStore for Database {
    fn save(&self, entity: &PrivacyGroupEntity) -> Result<(), StorageError> {
        self.privacy_groups
            .insert(&entity.id, serialize_bytes(entity)?)
            .map_err(backend)?;
        Ok(())
    }

    fn retrieve(&self, id: &PrivacyGroupId) -> Result<Option<PrivacyGroupEntity>, StorageError> {
        self.privacy_groups
            .get(id)
            .map_err(backend)?
            .map(deserialize_bytes)
            .transpose()
    }

    fn delete(&self, id: &PrivacyGroupId) -> Result<bool, StorageError> {
        Ok(self.privacy_groups.remove(id).map_err(backend)?.is_some())
    }

    fn find_by_lookup_id(&self, lookup_id: &[u8]) -> Result<Vec<PrivacyGroupEntity>, StorageError> {
        Ok(self
            .find_all()?
            .into_iter()
            .filter(|entity| entity.lookup_id == lookup_id)
            .collect())
    }

    fn find_all(&self) -> Result<Vec<PrivacyGroupEntity>, StorageError> {
        self.privacy_groups
            .iter()
            .values()
            .map(|value| deserialize_bytes(value.map_err(backend)?))
            .collect()
    }

    fn retrieve_or_save(
        &self,
        entity: &PrivacyGroupEntity,
    ) -> Result<PrivacyGroupEntity, StorageError> {
        let swapped = self
            .privacy_groups
            .compare_and_swap(
                &entity.id,
                None as Option<&[u8]>,
                Some(serialize_bytes(entity)?),
            )
            .map_err(backend)?;

        match swapped {
            Ok(()) => Ok(entity.clone()),
            Err(sled::CompareAndSwapError {
                current: Some(current),
                ..
            }) => deserialize_bytes(current),
            Err(sled::CompareAndSwapError { current: None, .. }) => Err(StorageError::Backend(
                "compare and swap failed without a current value".to_owned(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use privtx::{
        codec::EncodedPayload,
        crypto::{Nonce, PublicKey},
    };

    use super::*;

    fn payload(cipher_text: &[u8]) -> EncodedPayloadWithRecipients {
        EncodedPayloadWithRecipients::new(
            EncodedPayload {
                sender_key: PublicKey::from_bytes([1u8; 32]),
                cipher_text: cipher_text.to_vec(),
                cipher_text_nonce: Nonce::from_bytes([2u8; 24]),
                recipient_boxes: vec![vec![3u8; 48]],
                recipient_nonce: Nonce::from_bytes([4u8; 24]),
                privacy_group_id: None,
            },
            vec![PublicKey::from_bytes([5u8; 32])],
        )
    }

    fn entity(id: &[u8], lookup_id: &[u8], data: &[u8]) -> PrivacyGroupEntity {
        PrivacyGroupEntity {
            id: id.to_vec(),
            lookup_id: lookup_id.to_vec(),
            data: data.to_vec(),
        }
    }

    #[test]
    fn transactions_survive_the_tree() {
        let db = Database::temporary().expect("temporary db opens");
        let record = payload(b"cipher");
        let hash = MessageHash::of_cipher_text(b"cipher");

        TransactionStore::save(&db, &hash, &record).expect("save works");

        assert_eq!(
            TransactionStore::retrieve(&db, &hash).expect("retrieve works"),
            Some(record.clone()),
            "the stored record comes back"
        );
        assert_eq!(
            db.retrieve_all().expect("iteration works"),
            vec![(hash, record)],
            "the record is listed"
        );
        assert!(
            TransactionStore::delete(&db, &hash).expect("delete works"),
            "an existing record is removed"
        );
        assert!(
            !TransactionStore::delete(&db, &hash).expect("delete works"),
            "a second delete finds nothing"
        );
    }

    #[test]
    fn groups_are_found_by_lookup_id() {
        let db = Database::temporary().expect("temporary db opens");

        PrivacyGroupStore::save(&db, &entity(b"a", b"members", b"1")).expect("save works");
        PrivacyGroupStore::save(&db, &entity(b"b", b"members", b"2")).expect("save works");
        PrivacyGroupStore::save(&db, &entity(b"c", b"others", b"3")).expect("save works");

        assert_eq!(
            db.find_by_lookup_id(b"members").expect("lookup works").len(),
            2,
            "both groups with the same members are found"
        );
        assert_eq!(
            PrivacyGroupStore::retrieve(&db, &PrivacyGroupId::from(b"c".to_vec()))
                .expect("retrieve works"),
            Some(entity(b"c", b"others", b"3")),
            "groups are keyed by id"
        );
        assert!(
            PrivacyGroupStore::delete(&db, &PrivacyGroupId::from(b"c".to_vec()))
                .expect("delete works"),
            "an existing group is removed"
        );
        assert_eq!(db.find_all().expect("listing works").len(), 2, "two remain");
    }

    #[test]
    fn raw_transactions_have_their_own_tree() {
        let db = Database::temporary().expect("temporary db opens");
        let raw = RawTransaction {
            from: PublicKey::from_bytes([1u8; 32]),
            encrypted_payload: b"cipher".to_vec(),
            encrypted_key: vec![2u8; 48],
            nonce: Nonce::from_bytes([3u8; 24]),
        };
        let hash = MessageHash::of_cipher_text(b"cipher");

        RawTransactionStore::save(&db, &hash, &raw).expect("save works");

        assert_eq!(
            RawTransactionStore::retrieve(&db, &hash).expect("retrieve works"),
            Some(raw),
            "the raw record comes back"
        );
        assert_eq!(
            TransactionStore::retrieve(&db, &hash).expect("retrieve works"),
            None,
            "a raw record is not a regular transaction"
        );
    }

    #[test]
    fn retrieve_or_save_keeps_the_first_record() {
        let db = Database::temporary().expect("temporary db opens");

        let first = db
            .retrieve_or_save(&entity(b"a", b"l", b"first"))
            .expect("first save works");
        let second = db
            .retrieve_or_save(&entity(b"a", b"l", b"second"))
            .expect("second call works");

        assert_eq!(first, second, "the stored record wins");
        assert_eq!(second.data, b"first", "the first record is kept");
        assert_eq!(db.find_all().expect("listing works").len(), 1, "no duplicate");
    }
}
