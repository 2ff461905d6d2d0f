//! Content-derived identifiers for transactions and privacy groups.
pub mod group;
pub mod hash;

pub use {group::PrivacyGroupId, hash::MessageHash};

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum IdentifierError {
    #[error("The input is not valid base64")]
    InvalidBase64,
    #[error("The input has the wrong length for this identifier")]
    InvalidLength,
}
