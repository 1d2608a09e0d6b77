//! Translation between the gateway's `/generate` API and the provider's completions API.
//!
//! Request normalization and non-streaming translation are pure functions;
//! the streaming relay consumes a byte stream but performs no I/O of its own.

pub mod gateway_types;
pub mod request;
pub mod response;
pub mod streaming;
pub mod upstream_types;
