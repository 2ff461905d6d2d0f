use std::time::Duration;

use async_trait::async_trait;
use privtx::{
    party::{P2pClient, TransportError},
    util::url::join,
};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Outbound node-to-node calls over HTTP.
#[derive(Clone)]
pub struct HttpClient {
    client: reqwest::Client,
}

impl HttpClient {
    pub fn new() -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self { client })
    }
}

fn transport_error(url: &str, err: &reqwest::Error) -> TransportError {
    if err.is_connect() {
        TransportError::Connect(url.to_owned())
    } else {
        TransportError::Request(format!("{url}: {err}"))
    }
}

#[async_trait]
impl P2pClient for HttpClient {
    async fn post(&self, url: &str, path: &str, body: Vec<u8>) -> Result<Vec<u8>, TransportError> {
        let target = join(url, path);

        let response = self
            .client
            .post(&target)
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(body)
            .send()
            .await
            .map_err(|e| transport_error(url, &e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status {
                url: target,
                status: status.as_u16(),
            });
        }

        response
            .bytes()
            .await
            .map(|bytes| bytes.to_vec())
            .map_err(|e| transport_error(url, &e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn refused_connection_is_a_connect_error() {
        let client = HttpClient::new().expect("client builds");

        // Nothing listens on the discard port.
        let result = client.post("http://127.0.0.1:9", "partyinfo", Vec::new()).await;

        assert!(
            matches!(result, Err(TransportError::Connect(_))),
            "an unreachable node must be reported as a connect failure, got {result:?}"
        );
    }
}
