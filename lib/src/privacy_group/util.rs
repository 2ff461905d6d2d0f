//! Deterministic privacy group identifiers.
//!
//! Members are put in canonical order (sorted by key bytes, duplicates
//! removed) before hashing, so every node computing an id for the same set
//! of keys gets the same bytes.
use sha2::{Digest, Sha256};

use crate::{crypto::PublicKey, identifiers::PrivacyGroupId};

fn canonical_members(members: &[PublicKey]) -> Vec<PublicKey> {
    let mut sorted = members.to_vec();
    sorted.sort_unstable();
    sorted.dedup();
    sorted
}

fn hash_members(members: &[PublicKey], seed: Option<&[u8]>) -> Vec<u8> {
    let mut hasher = Sha256::new();
    for member in canonical_members(members) {
        hasher.update(member.as_bytes());
    }
    if let Some(seed) = seed {
        hasher.update(seed);
    }

    hasher.finalize().to_vec()
}

pub fn generate_id(members: &[PublicKey], seed: Option<&[u8]>) -> PrivacyGroupId {
    PrivacyGroupId::from(hash_members(members, seed))
}

pub fn generate_lookup_id(members: &[PublicKey]) -> Vec<u8> {
    hash_members(members, None)
}
