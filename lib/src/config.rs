use std::{
    fs,
    path::{Path, PathBuf},
};

use serde::Deserialize;
use thiserror::Error;

use crate::{
    constants::{DEFAULT_BIND_ADDRESS, DEFAULT_POLL_INTERVAL_MS},
    crypto::{public_key_for, EncryptorType, KeyPair, PrivateKey, PublicKey},
    party::DirectorySettings,
    privacy_group::ResidentGroupConfig,
};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unable to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(String),
    #[error("configuration invalid: {0}")]
    Validation(String),
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct KeyConfig {
    pub public: PublicKey,
    pub private: PrivateKey,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Config {
    /// The url other nodes reach this one at.
    pub server_url: String,
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default)]
    pub peers: Vec<String>,
    pub keys: Vec<KeyConfig>,
    #[serde(default)]
    pub forwarding_keys: Vec<PublicKey>,
    #[serde(default)]
    pub disable_peer_discovery: bool,
    #[serde(default)]
    pub enable_remote_key_validation: bool,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Without one, a temporary database is used.
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
    #[serde(default)]
    pub encryptor: EncryptorType,
    #[serde(default)]
    pub resident_groups: Vec<ResidentGroupConfig>,
}

fn default_bind_address() -> String {
    DEFAULT_BIND_ADDRESS.to_owned()
}

const fn default_poll_interval_ms() -> u64 {
    DEFAULT_POLL_INTERVAL_MS
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server_url.trim().is_empty() {
            return Err(ConfigError::Validation("server_url must be set".into()));
        }
        if self.keys.is_empty() {
            return Err(ConfigError::Validation(
                "at least one key pair must be configured".into(),
            ));
        }
        if let Some(key) = self
            .keys
            .iter()
            .find(|key| public_key_for(&key.private) != key.public)
        {
            return Err(ConfigError::Validation(format!(
                "private key does not match public key {}",
                key.public
            )));
        }
        if self.peers.iter().any(|peer| peer.trim().is_empty()) {
            return Err(ConfigError::Validation("peer urls must not be empty".into()));
        }
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::Validation(
                "poll interval must be greater than zero".into(),
            ));
        }
        Ok(())
    }

    pub fn key_pairs(&self) -> Vec<KeyPair> {
        self.keys
            .iter()
            .map(|key| KeyPair {
                public: key.public,
                private: key.private.clone(),
            })
            .collect()
    }

    pub fn directory_settings(&self) -> DirectorySettings {
        DirectorySettings {
            own_url: self.server_url.clone(),
            peers: self.peers.clone(),
            disable_peer_discovery: self.disable_peer_discovery,
            enable_remote_key_validation: self.enable_remote_key_validation,
        }
    }
}

pub fn parse_config(contents: &str) -> Result<Config, ConfigError> {
    let config: Config =
        toml::from_str(contents).map_err(|err| ConfigError::Parse(err.to_string()))?;
    config.validate()?;
    Ok(config)
}

pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    parse_config(&contents)
}
