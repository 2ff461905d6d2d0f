use std::sync::Arc;

use privtx::{
    config::Config,
    enclave::{Enclave, LocalKeyManager},
    party::{P2pClient, PartyInfoPoller, PartyInfoService, PayloadPublisher},
    privacy_group::PrivacyGroupManager,
    transaction::TransactionManager,
};

use crate::{db::Database, error::Error};

/// Everything a request handler needs, built once from the config.
#[derive(Clone)]
pub struct AppState {
    pub enclave: Arc<Enclave>,
    pub directory: Arc<PartyInfoService>,
    pub transactions: Arc<TransactionManager>,
    pub groups: Arc<PrivacyGroupManager>,
    client: Arc<dyn P2pClient>,
}

impl AppState {
    pub fn new(config: &Config, db: &Database, client: Arc<dyn P2pClient>) -> Result<Self, Error> {
        let keys = LocalKeyManager::new(config.key_pairs(), config.forwarding_keys.clone())?;
        let enclave = Arc::new(Enclave::new(config.encryptor.create(), Arc::new(keys)));

        let directory = Arc::new(PartyInfoService::new(
            config.directory_settings(),
            enclave.clone(),
            client.clone(),
        ));
        let publisher = Arc::new(PayloadPublisher::new(directory.clone(), client.clone()));

        let db = Arc::new(db.clone());
        let transactions = Arc::new(TransactionManager::new(
            enclave.clone(),
            db.clone(),
            db.clone(),
            publisher.clone(),
        ));
        let groups = Arc::new(PrivacyGroupManager::new(enclave.clone(), db, publisher));

        Ok(Self {
            enclave,
            directory,
            transactions,
            groups,
            client,
        })
    }

    pub fn poller(&self) -> PartyInfoPoller {
        PartyInfoPoller::new(self.directory.clone(), self.client.clone())
    }
}
