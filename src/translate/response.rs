//! Non-streaming translation: one provider document into one gateway reply.

use super::gateway_types::GenerationResponse;
use super::upstream_types::UpstreamResult;
use crate::error::{GatewayError, Result};

/// Wrap the first choice's text in a [`GenerationResponse`] echoing the requested model.
pub fn result_to_response(result: UpstreamResult, model: &str) -> Result<GenerationResponse> {
    let choice = result
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| GatewayError::upstream("no choices returned"))?;

    Ok(GenerationResponse {
        model: model.to_string(),
        response: choice.text,
        created_at: None,
    })
}

/// Decode a complete provider body and translate it.
pub fn decode_response(body: &[u8], model: &str) -> Result<GenerationResponse> {
    let result: UpstreamResult = serde_json::from_slice(body)
        .map_err(|e| GatewayError::upstream(format!("failed to decode response: {}", e)))?;
    result_to_response(result, model)
}
