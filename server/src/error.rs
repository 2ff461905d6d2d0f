use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use privtx::{config::ConfigError, error::Error as CoreError};

/// Failures while starting the node.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
    #[error("Core error: {0}")]
    Core(#[from] CoreError),
    #[error("Sled database error: {0}")]
    Sled(#[from] sled::Error),
    #[error("HTTP client error: {0}")]
    Client(#[from] reqwest::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A core error on its way out of a handler.
#[derive(Debug)]
pub struct ApiError(pub CoreError);

impl<E> From<E> for ApiError
where
    E: Into<CoreError>,
{
    fn from(value: E) -> Self {
        ApiError(value.into())
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            CoreError::KeyNotFound(_)
            | CoreError::TransactionNotFound(_)
            | CoreError::PrivacyGroupNotFound(_)
            | CoreError::NoRecipientKeyFound(_) => StatusCode::NOT_FOUND,
            CoreError::PrivacyViolation(_)
            | CoreError::ConflictingKeyClaim(_)
            | CoreError::UnverifiedParty(_)
            | CoreError::AutoDiscoveryDisabled(_) => StatusCode::FORBIDDEN,
            CoreError::Decode(_) | CoreError::InvalidRequest(_) | CoreError::Crypto(_) => {
                StatusCode::BAD_REQUEST
            }
            CoreError::Storage(_) | CoreError::Transport(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        if status.is_server_error() {
            tracing::error!("Internal server error while processing request: {}", self.0);
            return (status, "internal server error").into_response();
        }

        tracing::debug!("Request rejected with {status}: {}", self.0);
        (status, self.0.to_string()).into_response()
    }
}
