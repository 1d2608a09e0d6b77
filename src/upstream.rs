//! Client for the hosted completions endpoint.

use crate::config::GatewayConfig;
use crate::error::{GatewayError, Result};
use crate::translate::gateway_types::GenerationResponse;
use crate::translate::response::decode_response;
use crate::translate::upstream_types::UpstreamRequest;

use bytes::Bytes;
use futures::stream::Stream;
use std::time::Duration;

/// Issues completion requests with an injected credential.
///
/// The credential is resolved once by the caller and handed in here; a missing
/// one is reported per request, before any network traffic.
#[derive(Debug, Clone)]
pub struct UpstreamClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    api_key_env: String,
}

impl UpstreamClient {
    pub fn new(
        http: reqwest::Client,
        endpoint: impl Into<String>,
        api_key: Option<String>,
        api_key_env: impl Into<String>,
    ) -> Self {
        Self {
            http,
            endpoint: endpoint.into(),
            api_key,
            api_key_env: api_key_env.into(),
        }
    }

    /// Build a client from config. No overall request timeout is set: streamed
    /// completions may legitimately run for minutes.
    pub fn from_config(config: &GatewayConfig, api_key: Option<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(config.upstream.connect_timeout_secs))
            .build()?;

        Ok(Self::new(
            http,
            config.upstream.endpoint.clone(),
            api_key,
            config.upstream.api_key_env.clone(),
        ))
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn has_credential(&self) -> bool {
        self.api_key.is_some()
    }

    fn api_key(&self) -> Result<&str> {
        self.api_key.as_deref().ok_or_else(|| {
            GatewayError::config(format!(
                "API key not set in {} environment variable",
                self.api_key_env
            ))
        })
    }

    /// POST the request and return the response once headers arrive.
    ///
    /// Non-2xx statuses are turned into [`GatewayError::Upstream`] in both
    /// modes, so a rejected streaming request fails with 500 before any
    /// stream headers are sent instead of producing an empty 200 stream.
    pub async fn send(&self, req: &UpstreamRequest) -> Result<reqwest::Response> {
        let api_key = self.api_key()?;

        tracing::debug!(
            endpoint = %self.endpoint,
            model = %req.model,
            stream = req.stream,
            "POST upstream"
        );

        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(api_key)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .json(req)
            .send()
            .await
            .map_err(|e| GatewayError::upstream(format!("request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(status = status.as_u16(), body = %truncate(&body, 300), "Upstream rejected request");
            return Err(GatewayError::upstream(format!(
                "provider returned status {}: {}",
                status.as_u16(),
                truncate(&body, 500)
            )));
        }

        Ok(response)
    }

    /// Non-streaming completion: read the whole body and translate it.
    pub async fn complete(&self, req: &UpstreamRequest) -> Result<GenerationResponse> {
        let response = self.send(req).await?;
        let body = response
            .bytes()
            .await
            .map_err(|e| GatewayError::upstream(format!("failed to read response: {}", e)))?;

        decode_response(&body, &req.model)
    }

    /// Streaming completion: hand back the raw body stream. Dropping the stream
    /// closes the upstream connection.
    pub async fn stream(
        &self,
        req: &UpstreamRequest,
    ) -> Result<impl Stream<Item = std::result::Result<Bytes, reqwest::Error>> + Send + 'static>
    {
        let response = self.send(req).await?;
        Ok(response.bytes_stream())
    }
}

fn truncate(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}
