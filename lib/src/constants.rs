//! Endpoint paths and defaults shared by the core and the server.

pub const PARTYINFO_PATH: &str = "partyinfo";
pub const PARTYINFO_VALIDATE_PATH: &str = "partyinfo/validate";
pub const PUSH_PATH: &str = "push";
pub const PUSH_PRIVACY_GROUP_PATH: &str = "pushPrivacyGroup";

/// Name (and id) of the resident group holding every managed key that no
/// configured resident group claims.
pub const DEFAULT_RESIDENT_GROUP: &str = "private";
pub const DEFAULT_RESIDENT_GROUP_DESCRIPTION: &str =
    "Default resident group for all managed keys";

pub const DEFAULT_POLL_INTERVAL_MS: u64 = 2000;
pub const DEFAULT_BIND_ADDRESS: &str = "127.0.0.1:9000";
