use crate::config::GatewayConfig;
use crate::error::GatewayError;
use crate::logging::{AccessLog, AccessRecord};
use crate::translate::gateway_types::GenerationRequest;
use crate::translate::request::{apply_defaults, decode_request, to_upstream};
use crate::translate::streaming::{relay_fragments, RelayEvent, StreamOutcome};
use crate::upstream::UpstreamClient;

use axum::body::Body;
use axum::extract::State;
use axum::http::{header, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{any, get};
use axum::{Json, Router};
use bytes::Bytes;
use futures::future;
use futures::stream::StreamExt;
use std::convert::Infallible;
use std::sync::Arc;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Clone)]
pub struct AppState {
    pub config: GatewayConfig,
    pub upstream: UpstreamClient,
    pub access_log: Option<AccessLog>,
}

impl AppState {
    fn log_access(&self, record: AccessRecord) {
        if let Some(log) = &self.access_log {
            log.record(record);
        }
    }
}

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/generate", any(handle_generate))
        .route("/health", get(handle_health))
        .layer(SetResponseHeaderLayer::overriding(
            header::ACCESS_CONTROL_ALLOW_ORIGIN,
            HeaderValue::from_static("*"),
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn handle_generate(
    State(state): State<Arc<AppState>>,
    method: Method,
    body: Bytes,
) -> Response {
    let request_id = Uuid::new_v4().to_string();

    if method != Method::POST {
        return reject(&state, AccessRecord::new(request_id), GatewayError::MethodNotAllowed);
    }

    let req = match decode_request(&body) {
        Ok(r) => r,
        Err(e) => return reject(&state, AccessRecord::new(request_id), e),
    };

    let req = apply_defaults(req, &state.config.defaults);

    info!(
        %request_id,
        model = %req.model,
        stream = req.stream,
        max_tokens = req.max_tokens,
        temperature = req.temperature,
        "Generation request"
    );

    let record = AccessRecord::new(request_id).for_request(&req);

    if req.stream {
        handle_streaming(state, &req, record).await
    } else {
        handle_non_streaming(state, &req, record).await
    }
}

async fn handle_non_streaming(
    state: Arc<AppState>,
    req: &GenerationRequest,
    record: AccessRecord,
) -> Response {
    match state.upstream.complete(&to_upstream(req)).await {
        Ok(resp) => {
            state.log_access(record);
            Json(resp).into_response()
        }
        Err(e) => reject(&state, record, e),
    }
}

async fn handle_streaming(
    state: Arc<AppState>,
    req: &GenerationRequest,
    record: AccessRecord,
) -> Response {
    let byte_stream = match state.upstream.stream(&to_upstream(req)).await {
        Ok(s) => s,
        Err(e) => return reject(&state, record, e),
    };

    let access_log = state.access_log.clone();
    let body = relay_fragments(byte_stream).filter_map(move |event| {
        let frame = match event {
            RelayEvent::Fragment(text) => Some(Ok::<_, Infallible>(text)),
            RelayEvent::Finished { outcome, fragments } => {
                match &outcome {
                    StreamOutcome::Completed => {
                        info!(request_id = %record.request_id, fragments, "Stream completed")
                    }
                    StreamOutcome::Truncated { reason } => {
                        warn!(request_id = %record.request_id, fragments, %reason, "Stream truncated")
                    }
                }
                if let Some(log) = &access_log {
                    log.record(record.clone().streamed(&outcome, fragments));
                }
                None
            }
        };
        future::ready(frame)
    });

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/event-stream")
        .header(header::CACHE_CONTROL, "no-cache")
        .header(header::CONNECTION, "keep-alive")
        .body(Body::from_stream(body))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}

fn reject(state: &AppState, record: AccessRecord, err: GatewayError) -> Response {
    warn!(request_id = %record.request_id, error = %err, "Request failed");
    state.log_access(record.failed(&err));
    err.into_response()
}

async fn handle_health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
