use jobsync_logging::sync_debug;

use crate::stream::{ConnectionState, EventStreamClient};
use crate::view_model::{AppViewModel, JobRowView, UserView};
use crate::{BackoffPolicy, JobsSnapshot, ReconciliationStore, User};

/// Fixed per-session tuning for the store and the stream client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncSettings {
    pub page_size: u32,
    pub backoff: BackoffPolicy,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            page_size: 10,
            backoff: BackoffPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Lifecycle {
    #[default]
    Unmounted,
    Mounted,
    TornDown,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppState {
    lifecycle: Lifecycle,
    store: ReconciliationStore,
    stream: EventStreamClient,
    stream_opened_once: bool,
    user: Option<User>,
    user_fetch_in_flight: bool,
    user_unavailable: bool,
    dirty: bool,
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(SyncSettings::default())
    }
}

impl AppState {
    pub fn new(settings: SyncSettings) -> Self {
        Self {
            lifecycle: Lifecycle::Unmounted,
            store: ReconciliationStore::new(settings.page_size),
            stream: EventStreamClient::new(settings.backoff),
            stream_opened_once: false,
            user: None,
            user_fetch_in_flight: false,
            user_unavailable: false,
            dirty: false,
        }
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    pub fn store(&self) -> &ReconciliationStore {
        &self.store
    }

    pub fn stream(&self) -> &EventStreamClient {
        &self.stream
    }

    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    pub fn view(&self) -> AppViewModel {
        let connection = self.stream.state();
        let reconnecting = match connection {
            ConnectionState::Connecting { attempt } => attempt > 0,
            ConnectionState::Backoff { .. } => true,
            _ => false,
        };
        AppViewModel {
            connection,
            live_updates_paused: self.stream.is_paused(),
            reconnecting,
            offline: self.stream.is_offline(),
            user: self.user.as_ref().map(UserView::from),
            user_unavailable: self.user_unavailable,
            jobs: self.store.rows().iter().map(JobRowView::from).collect(),
            page_index: self.store.page_index(),
            page_count: self.store.page_count(),
            total: self.store.total(),
            loading: self.store.is_loading(),
            list_unavailable: self.store.list_unavailable(),
            dirty: self.dirty,
        }
    }

    /// Returns whether the view changed since the last call and clears the flag.
    pub fn consume_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    pub(crate) fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub(crate) fn store_mut(&mut self) -> &mut ReconciliationStore {
        &mut self.store
    }

    pub(crate) fn stream_mut(&mut self) -> &mut EventStreamClient {
        &mut self.stream
    }

    pub(crate) fn mount(&mut self, user: Option<User>, jobs: Option<JobsSnapshot>) {
        self.lifecycle = Lifecycle::Mounted;
        self.user = user;
        if let Some(snapshot) = jobs {
            self.store.seed(snapshot);
        }
        self.mark_dirty();
    }

    pub(crate) fn tear_down(&mut self) {
        self.lifecycle = Lifecycle::TornDown;
        self.store.clear_in_flight();
        self.user_fetch_in_flight = false;
        self.mark_dirty();
    }

    /// Records that the stream opened; true when this is a reopen after the
    /// first connection, meaning events may have been missed meanwhile.
    pub(crate) fn note_stream_opened(&mut self) -> bool {
        std::mem::replace(&mut self.stream_opened_once, true)
    }

    /// Claims the single user-fetch slot. False when a fetch is already out.
    pub(crate) fn begin_user_fetch(&mut self) -> bool {
        if self.user_fetch_in_flight {
            sync_debug!("state: user refresh already in flight");
            return false;
        }
        self.user_fetch_in_flight = true;
        true
    }

    pub(crate) fn set_user(&mut self, user: Option<User>) {
        self.user_fetch_in_flight = false;
        self.user_unavailable = false;
        self.user = user;
        self.mark_dirty();
    }

    pub(crate) fn mark_user_unavailable(&mut self) {
        self.user_fetch_in_flight = false;
        self.user_unavailable = true;
        self.mark_dirty();
    }
}
