//! Asynchronous generation job records.
//!
//! A `GenerationJob` is owned by the job poller; the block it serves holds
//! only the opaque id as a back-reference.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a generation job.
///
/// Provider-assigned ids are wrapped as-is; internally generated ids are
/// random v4 UUIDs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Generate a new random job ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from a provider-assigned string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
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
        write!(f, "{}", self.0)
    }
}

/// Lifecycle state of a generation job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Submitted, provider still rendering
    #[default]
    Pending,
    /// Provider reported a downloadable result
    Ready,
    /// Provider reported failure
    Failed,
    /// Attempt ceiling exhausted without a result
    TimedOut,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Ready => "ready",
            JobStatus::Failed => "failed",
            JobStatus::TimedOut => "timed_out",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, JobStatus::Pending)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A long-running render request tracked by the job poller.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct GenerationJob {
    /// Provider-assigned job id
    pub id: JobId,

    /// Provider name, for logs and attempt-ceiling selection
    pub provider: String,

    /// Index of the block this job renders for
    pub block_index: usize,

    /// Submission timestamp
    pub submitted_at: DateTime<Utc>,

    /// Current lifecycle state
    #[serde(default)]
    pub status: JobStatus,

    /// Result URL once the provider reports `Ready`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_url: Option<String>,
}

impl GenerationJob {
    /// Record a freshly submitted job.
    pub fn submitted(id: JobId, provider: impl Into<String>, block_index: usize) -> Self {
        Self {
            id,
            provider: provider.into(),
            block_index,
            submitted_at: Utc::now(),
            status: JobStatus::Pending,
            result_url: None,
        }
    }
}
