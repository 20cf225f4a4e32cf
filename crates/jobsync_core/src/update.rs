use jobsync_logging::{sync_debug, sync_info};

use crate::state::Lifecycle;
use crate::store::StoreRequest;
use crate::stream::StreamCommand;
use crate::{AppState, Effect, EventStreamClient, Msg};

/// Pure update function: applies a message to state and returns any effects.
pub fn update(mut state: AppState, msg: Msg) -> (AppState, Vec<Effect>) {
    match (state.lifecycle(), &msg) {
        (Lifecycle::TornDown, _) => {
            sync_debug!("update: dropping message after teardown: {:?}", msg_kind(&msg));
            return (state, Vec::new());
        }
        (Lifecycle::Unmounted, Msg::Mounted { .. } | Msg::TornDown) => {}
        (Lifecycle::Unmounted, _) => return (state, Vec::new()),
        (Lifecycle::Mounted, Msg::Mounted { .. }) => return (state, Vec::new()),
        (Lifecycle::Mounted, _) => {}
    }

    let mut effects = Vec::new();
    match msg {
        Msg::Mounted { user, jobs } => {
            state.mount(user, jobs);
            request_user(&mut state, &mut effects);
            let request = state.store_mut().refetch_current();
            absorb(&mut state, request, &mut effects);
            drive_stream(&mut state, &mut effects, EventStreamClient::start);
        }
        Msg::PageRequested(page_index) => navigate(&mut state, page_index, &mut effects),
        Msg::NextPage => {
            let next = state.store().target_page().saturating_add(1);
            navigate(&mut state, next, &mut effects);
        }
        Msg::PreviousPage => {
            let previous = state.store().target_page().saturating_sub(1);
            navigate(&mut state, previous, &mut effects);
        }
        Msg::RefreshRequested => {
            let request = state.store_mut().refetch_current();
            absorb(&mut state, request, &mut effects);
            request_user(&mut state, &mut effects);
            state.mark_dirty();
        }
        Msg::JobDeleted(job_id) => {
            let request = state.store_mut().remove(job_id);
            absorb(&mut state, request, &mut effects);
            state.mark_dirty();
        }
        Msg::PageLoaded { page_index, result } => {
            let requests = state.store_mut().on_page_loaded(page_index, result);
            absorb(&mut state, requests, &mut effects);
            state.mark_dirty();
        }
        Msg::UserLoaded(result) => match result {
            Ok(Some(user)) => {
                state.set_user(Some(user.clone()));
                effects.push(Effect::PersistUser(user));
            }
            Ok(None) => {
                sync_info!("update: session ended, clearing cached snapshots");
                state.set_user(None);
                effects.push(Effect::ClearSnapshots);
            }
            Err(failure) => {
                sync_debug!("update: user refresh failed: {}", failure);
                state.mark_user_unavailable();
            }
        },
        Msg::StreamOpened { connection } => {
            let before = state.stream().state();
            state.stream_mut().on_opened(connection);
            if state.stream().state() != before {
                state.mark_dirty();
                if state.note_stream_opened() {
                    // Anything published while we were disconnected was lost.
                    let request = state.store_mut().refetch_current();
                    absorb(&mut state, request, &mut effects);
                    request_user(&mut state, &mut effects);
                }
            }
        }
        Msg::StreamMessage { connection, data } => {
            if let Some(event) = state.stream_mut().on_message(connection, &data) {
                let requests = state.store_mut().apply_event(&event);
                absorb(&mut state, requests, &mut effects);
                state.mark_dirty();
            }
        }
        Msg::StreamStable { connection } => {
            state.stream_mut().on_stable(connection);
        }
        Msg::StreamFailed { connection, reason } => {
            drive_stream(&mut state, &mut effects, |client| {
                client.on_transport_error(connection, &reason)
            });
        }
        Msg::RetryDue { timer } => {
            drive_stream(&mut state, &mut effects, |client| client.on_retry_due(timer));
        }
        Msg::Trigger(trigger) => {
            drive_stream(&mut state, &mut effects, |client| client.on_trigger(trigger));
        }
        Msg::ReconnectClicked => {
            drive_stream(&mut state, &mut effects, EventStreamClient::reconnect);
        }
        Msg::TornDown => {
            drive_stream(&mut state, &mut effects, EventStreamClient::stop);
            state.tear_down();
        }
        Msg::Tick | Msg::NoOp => {}
    }

    (state, effects)
}

fn navigate(state: &mut AppState, page_index: u32, effects: &mut Vec<Effect>) {
    let before = state.store().target_page();
    let request = state.store_mut().go_to_page(page_index);
    if state.store().target_page() != before || request.is_some() {
        state.mark_dirty();
    }
    absorb(state, request, effects);
}

fn request_user(state: &mut AppState, effects: &mut Vec<Effect>) {
    if state.begin_user_fetch() {
        effects.push(Effect::FetchUser);
    }
}

fn drive_stream<F>(state: &mut AppState, effects: &mut Vec<Effect>, step: F)
where
    F: FnOnce(&mut EventStreamClient) -> Vec<StreamCommand>,
{
    let before = state.stream().state();
    let commands = step(state.stream_mut());
    if state.stream().state() != before {
        state.mark_dirty();
    }
    effects.extend(commands.into_iter().map(Effect::Stream));
}

fn absorb<I>(state: &mut AppState, requests: I, effects: &mut Vec<Effect>)
where
    I: IntoIterator<Item = StoreRequest>,
{
    for request in requests {
        match request {
            StoreRequest::FetchPage {
                page_index,
                page_size,
            } => effects.push(Effect::FetchPage {
                page_index,
                page_size,
            }),
            StoreRequest::RefreshUser => request_user(state, effects),
            StoreRequest::PersistJobs(snapshot) => effects.push(Effect::PersistJobs(snapshot)),
        }
    }
}

fn msg_kind(msg: &Msg) -> &'static str {
    match msg {
        Msg::Mounted { .. } => "Mounted",
        Msg::PageRequested(_) => "PageRequested",
        Msg::NextPage => "NextPage",
        Msg::PreviousPage => "PreviousPage",
        Msg::RefreshRequested => "RefreshRequested",
        Msg::JobDeleted(_) => "JobDeleted",
        Msg::PageLoaded { .. } => "PageLoaded",
        Msg::UserLoaded(_) => "UserLoaded",
        Msg::StreamOpened { .. } => "StreamOpened",
        Msg::StreamMessage { .. } => "StreamMessage",
        Msg::StreamStable { .. } => "StreamStable",
        Msg::StreamFailed { .. } => "StreamFailed",
        Msg::RetryDue { .. } => "RetryDue",
        Msg::Trigger(_) => "Trigger",
        Msg::ReconnectClicked => "ReconnectClicked",
        Msg::TornDown => "TornDown",
        Msg::Tick => "Tick",
        Msg::NoOp => "NoOp",
    }
}
