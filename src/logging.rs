//! Optional JSONL access log for `/generate` requests.
//!
//! Each finished request appends one line to the log file. Requests only
//! enqueue their record; a single writer task owns the file.

use crate::error::GatewayError;
use crate::translate::gateway_types::GenerationRequest;
use crate::translate::streaming::StreamOutcome;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Completed,
    Truncated,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessRecord {
    pub timestamp: DateTime<Utc>,
    pub request_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    pub stream: bool,
    pub status: u16,
    pub outcome: Outcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fragments: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AccessRecord {
    pub fn new(request_id: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            request_id: request_id.into(),
            model: None,
            stream: false,
            status: 200,
            outcome: Outcome::Completed,
            fragments: None,
            error: None,
        }
    }

    pub fn for_request(mut self, req: &GenerationRequest) -> Self {
        self.model = Some(req.model.clone());
        self.stream = req.stream;
        self
    }

    pub fn failed(mut self, err: &GatewayError) -> Self {
        self.status = err.status().as_u16();
        self.outcome = Outcome::Failed;
        self.error = Some(err.to_string());
        self
    }

    pub fn streamed(mut self, outcome: &StreamOutcome, fragments: usize) -> Self {
        self.fragments = Some(fragments);
        match outcome {
            StreamOutcome::Completed => self.outcome = Outcome::Completed,
            StreamOutcome::Truncated { reason } => {
                self.outcome = Outcome::Truncated;
                self.error = Some(reason.clone());
            }
        }
        self
    }
}

#[derive(Clone)]
pub struct AccessLog {
    tx: mpsc::UnboundedSender<AccessRecord>,
}

impl AccessLog {
    /// Append to (creating if needed) the JSONL file at `path` and start the
    /// writer task. Must be called inside a Tokio runtime.
    pub async fn open(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await?;
        let display_path = path.display().to_string();
        let (tx, mut rx) = mpsc::unbounded_channel::<AccessRecord>();

        tokio::spawn(async move {
            while let Some(record) = rx.recv().await {
                let mut line = match serde_json::to_vec(&record) {
                    Ok(line) => line,
                    Err(e) => {
                        tracing::warn!(error = %e, "Failed to encode access record");
                        continue;
                    }
                };
                line.push(b'\n');

                let written = match file.write_all(&line).await {
                    Ok(()) => file.flush().await,
                    Err(e) => Err(e),
                };
                if let Err(e) = written {
                    tracing::error!(path = %display_path, error = %e, "Access log write failed; disabling");
                    break;
                }
            }
        });

        Ok(Self { tx })
    }

    /// Queue a record for the writer task. Never blocks.
    pub fn record(&self, record: AccessRecord) {
        let _ = self.tx.send(record);
    }
}
