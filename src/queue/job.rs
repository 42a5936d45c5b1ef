//! Print job model: identity, lifecycle status and the read-only snapshots
//! handed to executors and event subscribers.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for JobId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Lifecycle of a job.
///
/// ```text
/// PENDING ──► IN_PROGRESS ──► COMPLETED
///    ▲  │          │
///    │  │          ├──► FAILED
///    │  ▼          │
///    │ CANCELLED   │
///    └─────────────┘ (retryable failure)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::InProgress => "IN_PROGRESS",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
            Self::Cancelled => "CANCELLED",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-job options accepted by [`PrintQueue::add`](super::PrintQueue::add).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct JobOptions {
    /// Higher values dispatch first
    pub priority: i32,
    /// Total attempts allowed; falls back to the queue's `default_retries`
    pub max_retries: Option<u32>,
    /// Link this job will write to; at most one job per target runs at a time
    pub target: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

impl JobOptions {
    pub fn priority(priority: i32) -> Self {
        Self {
            priority,
            ..Self::default()
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// Queue-owned job record. Only the queue changes its status.
#[derive(Debug, Clone)]
pub(crate) struct PrintJob {
    pub id: JobId,
    pub seq: u64,
    pub payload: Arc<[u8]>,
    pub priority: i32,
    pub status: JobStatus,
    pub attempts: u32,
    pub max_attempts: u32,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub target: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

impl PrintJob {
    pub fn new(seq: u64, payload: Arc<[u8]>, options: JobOptions, default_retries: u32) -> Self {
        Self {
            id: JobId::new(),
            seq,
            payload,
            priority: options.priority,
            status: JobStatus::Pending,
            attempts: 0,
            max_attempts: options.max_retries.unwrap_or(default_retries).max(1),
            created_at: Utc::now(),
            started_at: None,
            finished_at: None,
            last_error: None,
            target: options.target,
            metadata: options.metadata,
        }
    }

    pub fn finish(&mut self, status: JobStatus) {
        self.status = status;
        self.finished_at = Some(Utc::now());
    }

    pub fn snapshot(&self) -> JobSnapshot {
        JobSnapshot {
            id: self.id,
            payload: Arc::clone(&self.payload),
            payload_len: self.payload.len(),
            priority: self.priority,
            status: self.status,
            attempts: self.attempts,
            max_attempts: self.max_attempts,
            created_at: self.created_at,
            started_at: self.started_at,
            finished_at: self.finished_at,
            last_error: self.last_error.clone(),
            target: self.target.clone(),
            metadata: self.metadata.clone(),
        }
    }
}

/// Point-in-time copy of a job.
#[derive(Debug, Clone, Serialize)]
pub struct JobSnapshot {
    pub id: JobId,
    #[serde(skip)]
    pub payload: Arc<[u8]>,
    pub payload_len: usize,
    pub priority: i32,
    pub status: JobStatus,
    /// Dispatches so far, including the current one
    pub attempts: u32,
    pub max_attempts: u32,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub target: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_wire_names() {
        assert_eq!(
            serde_json::to_string(&JobStatus::InProgress).unwrap(),
            "\"IN_PROGRESS\""
        );
        assert_eq!(JobStatus::Cancelled.to_string(), "CANCELLED");
        assert!(JobStatus::Failed.is_terminal());
        assert!(!JobStatus::Pending.is_terminal());
    }

    #[test]
    fn test_max_attempts_defaults_and_floor() {
        let payload: Arc<[u8]> = Arc::from(&b"x"[..]);
        let job = PrintJob::new(0, payload.clone(), JobOptions::default(), 3);
        assert_eq!(job.max_attempts, 3);
        let job = PrintJob::new(1, payload, JobOptions::default().with_max_retries(0), 3);
        assert_eq!(job.max_attempts, 1);
    }

    #[test]
    fn test_snapshot_serializes_without_payload() {
        let payload: Arc<[u8]> = Arc::from(&b"Hi"[..]);
        let job = PrintJob::new(0, payload, JobOptions::priority(5), 3);
        let value = serde_json::to_value(job.snapshot()).unwrap();
        assert_eq!(value["payload_len"], 2);
        assert_eq!(value["priority"], 5);
        assert_eq!(value["status"], "PENDING");
        assert!(value.get("payload").is_none());
    }

    #[test]
    fn test_job_id_round_trips_through_text() {
        let id = JobId::new();
        let parsed: JobId = id.to_string().parse().unwrap();
        assert_eq!(parsed, id);
    }
}
