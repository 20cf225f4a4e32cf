use std::fmt;

use serde::{Deserialize, Serialize};

pub type JobId = u64;

/// Lifecycle of a transcription job as reported by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    #[serde(alias = "pending")]
    Queued,
    Processing,
    Transcribed,
    #[serde(alias = "failed")]
    Error,
}

impl JobStatus {
    /// Terminal states change the user's remaining quota on the server.
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Transcribed | JobStatus::Error)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            JobStatus::Queued => "queued",
            JobStatus::Processing => "processing",
            JobStatus::Transcribed => "transcribed",
            JobStatus::Error => "error",
        };
        f.write_str(label)
    }
}

/// One row of the paginated job listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub status: JobStatus,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default, alias = "transcription")]
    pub payload: Option<String>,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default, alias = "upload_time")]
    pub uploaded_at: Option<String>,
    #[serde(default, alias = "media_duration")]
    pub media_duration_secs: Option<u64>,
    #[serde(default)]
    pub output_format: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
}

impl Job {
    pub fn new(id: JobId, status: JobStatus) -> Self {
        Self {
            id,
            status,
            message: None,
            payload: None,
            filename: None,
            uploaded_at: None,
            media_duration_secs: None,
            output_format: None,
            language: None,
        }
    }

    /// Field-level merge of a push event. Status and message are replaced
    /// wholesale; the payload is only ever filled in, never cleared.
    pub(crate) fn patch(&mut self, event: &JobEvent) {
        self.status = event.status;
        self.message = event.message.clone();
        if let Some(payload) = &event.payload {
            self.payload = Some(payload.clone());
        }
    }
}

/// Partial job update delivered over the push stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobEvent {
    #[serde(rename = "jobId", alias = "job_id", alias = "file_id")]
    pub job_id: JobId,
    pub status: JobStatus,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default, alias = "transcription")]
    pub payload: Option<String>,
}

impl JobEvent {
    pub fn new(job_id: JobId, status: JobStatus) -> Self {
        Self {
            job_id,
            status,
            message: None,
            payload: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_payload(mut self, payload: impl Into<String>) -> Self {
        self.payload = Some(payload.into());
        self
    }
}

/// The signed-in user and their aggregate quota.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: u64,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub picture: Option<String>,
    /// Remaining transcription quota in minutes.
    #[serde(default)]
    pub remaining_time: f64,
    #[serde(default)]
    pub is_admin: bool,
}

/// Authoritative slice of the job listing.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Page {
    #[serde(alias = "files")]
    pub items: Vec<Job>,
    pub total: u64,
}

/// Persisted copy of the last authoritative page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobsSnapshot {
    pub page_index: u32,
    pub page_size: u32,
    pub total: u64,
    pub items: Vec<Job>,
}

/// A failed request against the listing or session endpoints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchFailure {
    pub message: String,
}

impl FetchFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for FetchFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}
