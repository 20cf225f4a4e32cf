use std::fmt::Write;

use chrono::{DateTime, Local};
use jobsync_core::{AppViewModel, CloseReason, ConnectionState, JobRowView};

pub fn render(view: &AppViewModel, now: DateTime<Local>) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "[{}] {} | {}",
        now.format("%H:%M:%S"),
        connection_label(view),
        user_label(view)
    );

    if view.list_unavailable {
        out.push_str("  (job list could not be refreshed; showing last known state)\n");
    }
    if view.jobs.is_empty() {
        out.push_str(if view.loading {
            "  loading…\n"
        } else {
            "  no jobs\n"
        });
    }
    for row in &view.jobs {
        render_row(&mut out, row);
    }

    let _ = writeln!(
        out,
        "page {}/{} | {} jobs{}",
        view.page_index,
        view.page_count.max(1),
        view.total,
        if view.loading { " | loading" } else { "" }
    );
    out
}

fn render_row(out: &mut String, row: &JobRowView) {
    let _ = write!(
        out,
        "  #{:<6} {:<12} {}",
        row.job_id,
        row.status.to_string(),
        row.filename
    );
    if let Some(message) = &row.message {
        let _ = write!(out, " ({message})");
    }
    out.push('\n');
    if let Some(preview) = &row.payload_preview {
        let _ = writeln!(out, "           \"{preview}\"");
    }
}

fn connection_label(view: &AppViewModel) -> String {
    if view.offline {
        return "offline".to_string();
    }
    if view.live_updates_paused {
        return "live updates paused (r to reconnect)".to_string();
    }
    match view.connection {
        ConnectionState::Idle => "idle".to_string(),
        ConnectionState::Connecting { attempt: 0 } => "connecting".to_string(),
        ConnectionState::Connecting { attempt } => format!("reconnecting (attempt {attempt})"),
        ConnectionState::Open => "live".to_string(),
        ConnectionState::Backoff { attempt, delay } => {
            format!("retry {} in {}s", attempt, delay.as_secs().max(1))
        }
        ConnectionState::Closed {
            reason: CloseReason::Stopped,
        } => "stopped".to_string(),
        ConnectionState::Closed { reason } => format!("closed ({reason:?})"),
    }
}

fn user_label(view: &AppViewModel) -> String {
    match &view.user {
        Some(user) => format!(
            "{} <{}> {:.1} min left",
            user.name, user.email, user.remaining_minutes
        ),
        None if view.user_unavailable => "profile unavailable".to_string(),
        None => "signed out".to_string(),
    }
}
