pub mod codec;
pub mod config;
pub mod constants;
pub mod crypto;
pub mod enclave;
pub mod error;
pub mod identifiers;
pub mod party;
pub mod privacy_group;
pub mod storage;
pub mod transaction;
pub mod util;

#[cfg(test)]
pub(crate) mod testing;
