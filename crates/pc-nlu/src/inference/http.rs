//! HTTP client for the external LLM inference service.
//!
//! POSTs an `LlmRequest` as JSON to the configured endpoint. Connection
//! errors and non-2xx statuses are `Unavailable`; a body that is not the
//! expected shape is `Malformed`.

use async_trait::async_trait;

use super::{LlmEngine, LlmRequest, LlmResponse, parse_response};
use crate::config::LlmConfig;
use crate::error::{LlmError, NluError, NluResult};

pub struct HttpLlmEngine {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    timeout_ms: u64,
}

impl HttpLlmEngine {
    pub fn new(config: &LlmConfig, timeout_ms: u64) -> NluResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_millis(timeout_ms))
            .build()
            .map_err(|e| NluError::InvalidConfig(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            api_key: config.api_key.clone(),
            timeout_ms,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl LlmEngine for HttpLlmEngine {
    async fn infer(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        let mut builder = self.client.post(&self.endpoint).json(request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                LlmError::Timeout(self.timeout_ms)
            } else {
                LlmError::Unavailable(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(LlmError::Unavailable(format!("HTTP {status}")));
        }

        let body = response.text().await.map_err(|e| {
            if e.is_timeout() {
                LlmError::Timeout(self.timeout_ms)
            } else {
                LlmError::Unavailable(format!("failed to read body: {e}"))
            }
        })?;

        parse_response(&body)
    }

    fn name(&self) -> &str {
        "http"
    }
}
