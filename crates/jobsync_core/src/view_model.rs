use crate::stream::ConnectionState;
use crate::{Job, JobId, JobStatus, User};

/// Longest transcription excerpt shown inline in a job row.
pub const PAYLOAD_PREVIEW_CHARS: usize = 80;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct AppViewModel {
    pub connection: ConnectionState,
    /// Automatic retries are exhausted; a trigger or manual reconnect resumes.
    pub live_updates_paused: bool,
    pub reconnecting: bool,
    pub offline: bool,
    pub user: Option<UserView>,
    pub user_unavailable: bool,
    pub jobs: Vec<JobRowView>,
    pub page_index: u32,
    pub page_count: u32,
    pub total: u64,
    pub loading: bool,
    pub list_unavailable: bool,
    pub dirty: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UserView {
    pub name: String,
    pub email: String,
    pub remaining_minutes: f64,
}

impl From<&User> for UserView {
    fn from(user: &User) -> Self {
        Self {
            name: user.name.clone(),
            email: user.email.clone(),
            remaining_minutes: user.remaining_time,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobRowView {
    pub job_id: JobId,
    pub filename: String,
    pub status: JobStatus,
    pub message: Option<String>,
    pub payload_preview: Option<String>,
}

impl From<&Job> for JobRowView {
    fn from(job: &Job) -> Self {
        Self {
            job_id: job.id,
            filename: job
                .filename
                .clone()
                .unwrap_or_else(|| format!("job-{}", job.id)),
            status: job.status,
            message: job.message.clone(),
            payload_preview: job.payload.as_deref().map(preview),
        }
    }
}

fn preview(text: &str) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= PAYLOAD_PREVIEW_CHARS {
        return flat;
    }
    let mut cut: String = flat.chars().take(PAYLOAD_PREVIEW_CHARS).collect();
    cut.push('…');
    cut
}
