use async_trait::async_trait;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The peer could not be reached at all. Transient; pollers skip it.
    #[error("Could not connect to {0}")]
    Connect(String),
    #[error("{url} answered with status {status}")]
    Status { url: String, status: u16 },
    #[error("Request failed: {0}")]
    Request(String),
}

impl TransportError {
    pub fn is_connect(&self) -> bool {
        matches!(self, TransportError::Connect(_))
    }
}

/// Outbound node-to-node calls. Every call is a POST of a binary body to
/// `path` under the peer's base `url`, answered with a binary body.
#[async_trait]
pub trait P2pClient: Send + Sync {
    async fn post(&self, url: &str, path: &str, body: Vec<u8>) -> Result<Vec<u8>, TransportError>;
}
