//! Jobsync core: pure state machine for the live job list.
//!
//! Push events, page loads and host triggers go in as [`Msg`]s; [`update`]
//! returns the new [`AppState`] plus the [`Effect`]s the host must run.
mod backoff;
mod effect;
mod job;
mod msg;
mod payload;
mod state;
mod store;
mod stream;
mod update;
mod view_model;

pub use backoff::BackoffPolicy;
pub use effect::Effect;
pub use job::{FetchFailure, Job, JobEvent, JobId, JobStatus, JobsSnapshot, Page, User};
pub use msg::Msg;
pub use payload::{classify_payload, Inbound};
pub use state::{AppState, Lifecycle, SyncSettings};
pub use store::{ReconciliationStore, StoreRequest};
pub use stream::{
    CloseReason, ConnectionId, ConnectionState, EventStreamClient, HostTrigger, StreamCommand,
    TimerId,
};
pub use update::update;
pub use view_model::{AppViewModel, JobRowView, UserView, PAYLOAD_PREVIEW_CHARS};
