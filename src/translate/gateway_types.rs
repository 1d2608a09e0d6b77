//! Types for the gateway's own `/generate` API (what callers send and receive).

use serde::{Deserialize, Deserializer, Serialize};

/// Inbound generation request.
///
/// Every field is optional on the wire; absent or `null` fields decode to
/// their zero value and are later replaced by
/// [`crate::config::GenerationDefaults`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationRequest {
    #[serde(deserialize_with = "null_as_zero")]
    pub model: String,
    #[serde(deserialize_with = "null_as_zero")]
    pub prompt: String,
    #[serde(deserialize_with = "null_as_zero")]
    pub stream: bool,
    #[serde(deserialize_with = "null_as_zero")]
    pub max_tokens: i64,
    #[serde(deserialize_with = "null_as_zero")]
    pub temperature: f64,
}

fn null_as_zero<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Reply body for non-streaming requests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationResponse {
    pub model: String,
    pub response: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}
