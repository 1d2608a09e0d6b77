//! Type definitions for the provider's legacy completions API.
//!
//! Only the fields the gateway reads are modelled; everything else in the
//! provider's payloads is ignored on decode.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Request types (what we send TO the provider)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpstreamRequest {
    pub model: String,
    pub prompt: String,
    pub max_tokens: i64,
    pub temperature: f64,
    pub stream: bool,
}

// ---------------------------------------------------------------------------
// Non-streaming response
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpstreamResult {
    #[serde(default)]
    pub choices: Vec<ResultChoice>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResultChoice {
    #[serde(default)]
    pub text: String,
}

// ---------------------------------------------------------------------------
// Streaming chunks
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpstreamChunk {
    #[serde(default)]
    pub choices: Vec<ChunkChoice>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChunkChoice {
    #[serde(default)]
    pub delta: ChunkDelta,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChunkDelta {
    #[serde(default)]
    pub content: Option<String>,
}

impl UpstreamChunk {
    /// Text fragment of the first choice, if it carries a non-empty one.
    pub fn fragment(&self) -> Option<&str> {
        self.choices
            .first()
            .and_then(|c| c.delta.content.as_deref())
            .filter(|s| !s.is_empty())
    }
}
