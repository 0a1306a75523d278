//! HTTP invocation target.

use async_trait::async_trait;
use bytes::Bytes;
use messaging::{InvokeError, InvokeTarget};
use tracing::debug;

/// Invokes a compute target by POSTing the payload to an HTTP endpoint.
///
/// Any 2xx response is success and its body is the invocation output; any
/// other status is surfaced as [`InvokeError::Failed`] with the response
/// body as detail.
#[derive(Debug, Clone)]
pub struct HttpInvoker {
    endpoint: String,
    client: reqwest::Client,
}

impl HttpInvoker {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            client: reqwest::Client::new(),
        }
    }

    /// The configured endpoint.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl InvokeTarget for HttpInvoker {
    async fn invoke(&self, payload: Bytes) -> Result<Bytes, InvokeError> {
        let response = self
            .client
            .post(&self.endpoint)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(payload)
            .send()
            .await
            .map_err(InvokeError::transport)?;

        let status = response.status();
        let body = response.bytes().await.map_err(InvokeError::transport)?;

        if !status.is_success() {
            return Err(InvokeError::failed(
                status.as_u16(),
                String::from_utf8_lossy(&body).into_owned(),
            ));
        }

        debug!(endpoint = %self.endpoint, bytes = body.len(), "target invoked");
        Ok(body)
    }
}
