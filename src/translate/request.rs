//! Inbound request normalization: default substitution and upstream body construction.

use super::gateway_types::GenerationRequest;
use super::upstream_types::UpstreamRequest;
use crate::config::GenerationDefaults;
use crate::error::{GatewayError, Result};

/// Decode the first JSON value of an inbound body.
///
/// Anything after the first value is ignored, and a top-level `null` counts as
/// an empty request. An empty body or malformed JSON is a
/// [`GatewayError::BadRequest`] carrying the decoder's message.
pub fn decode_request(body: &[u8]) -> Result<GenerationRequest> {
    let mut values =
        serde_json::Deserializer::from_slice(body).into_iter::<Option<GenerationRequest>>();
    match values.next() {
        Some(Ok(req)) => Ok(req.unwrap_or_default()),
        Some(Err(e)) => Err(GatewayError::bad_request(e.to_string())),
        None => Err(GatewayError::bad_request("EOF")),
    }
}

/// Replace empty/zero fields with the configured defaults.
///
/// Zero is treated as "unset": an explicit `temperature: 0` becomes the
/// default temperature, the same as an omitted one.
pub fn apply_defaults(mut req: GenerationRequest, defaults: &GenerationDefaults) -> GenerationRequest {
    if req.model.is_empty() {
        req.model = defaults.model.clone();
    }
    if req.max_tokens == 0 {
        req.max_tokens = defaults.max_tokens;
    }
    if req.temperature == 0.0 {
        req.temperature = defaults.temperature;
    }
    req
}

/// Build the provider request body mirroring the (defaulted) inbound request.
pub fn to_upstream(req: &GenerationRequest) -> UpstreamRequest {
    UpstreamRequest {
        model: req.model.clone(),
        prompt: req.prompt.clone(),
        max_tokens: req.max_tokens,
        temperature: req.temperature,
        stream: req.stream,
    }
}
