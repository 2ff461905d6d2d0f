use crate::{
    codec::DecodeError,
    crypto::CryptoError,
    identifiers::{IdentifierError, MessageHash},
    party::TransportError,
    storage::StorageError,
};

/// Errors surfaced to whoever drives the core, usually the HTTP layer.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Crypto error: {0}")]
    Crypto(#[from] CryptoError),
    #[error("No url is known for key {0}")]
    KeyNotFound(String),
    #[error("Peer discovery is disabled and {0} is not a known party")]
    AutoDiscoveryDisabled(String),
    #[error("Privacy violation: {0}")]
    PrivacyViolation(String),
    #[error("Transaction {0} not found")]
    TransactionNotFound(MessageHash),
    #[error("Privacy group {0} not found")]
    PrivacyGroupNotFound(String),
    #[error("No local key can open transaction {0}")]
    NoRecipientKeyFound(MessageHash),
    #[error("Conflicting key claim: {0}")]
    ConflictingKeyClaim(String),
    #[error("Party could not be verified: {0}")]
    UnverifiedParty(String),
    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl From<IdentifierError> for Error {
    fn from(value: IdentifierError) -> Self {
        Error::InvalidRequest(value.to_string())
    }
}

impl From<Error> for std::io::Error {
    fn from(value: Error) -> Self {
        std::io::Error::other(value)
    }
}
