use std::sync::Once;
use std::time::Duration;

use jobsync_core::{
    update, AppState, BackoffPolicy, CloseReason, ConnectionState, Effect, HostTrigger, Job,
    JobStatus, Msg, Page, StreamCommand, SyncSettings,
};

fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(jobsync_logging::initialize_for_tests);
}

fn settings(max_attempts: u32) -> SyncSettings {
    SyncSettings {
        page_size: 10,
        backoff: BackoffPolicy {
            base_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(2),
            max_attempts,
        },
    }
}

fn mounted(max_attempts: u32) -> AppState {
    let (state, _) = update(
        AppState::new(settings(max_attempts)),
        Msg::Mounted {
            user: None,
            jobs: None,
        },
    );
    let (state, _) = update(
        state,
        Msg::PageLoaded {
            page_index: 1,
            result: Ok(Page {
                items: vec![Job::new(1, JobStatus::Processing)],
                total: 1,
            }),
        },
    );
    let (state, _) = update(state, Msg::UserLoaded(Ok(None)));
    let (state, _) = update(state, Msg::StreamOpened { connection: 1 });
    state
}

fn stream_commands(effects: &[Effect]) -> Vec<StreamCommand> {
    effects
        .iter()
        .filter_map(|effect| match effect {
            Effect::Stream(command) => Some(*command),
            _ => None,
        })
        .collect()
}

fn scheduled(effects: &[Effect]) -> Option<(u64, Duration)> {
    stream_commands(effects)
        .into_iter()
        .find_map(|command| match command {
            StreamCommand::ScheduleRetry { timer, delay } => Some((timer, delay)),
            _ => None,
        })
}

fn connected(effects: &[Effect]) -> Option<u64> {
    stream_commands(effects)
        .into_iter()
        .find_map(|command| match command {
            StreamCommand::Connect { connection } => Some(connection),
            _ => None,
        })
}

#[test]
fn failures_back_off_then_pause() {
    init_logging();
    let mut state = mounted(3);
    let mut connection = 1;
    let mut delays = Vec::new();

    for _ in 0..3 {
        let (next, effects) = update(
            state,
            Msg::StreamFailed {
                connection,
                reason: "connection reset".to_string(),
            },
        );
        assert_eq!(stream_commands(&effects)[0], StreamCommand::Disconnect);
        let (timer, delay) = scheduled(&effects).expect("retry scheduled");
        delays.push(delay);
        assert!(matches!(
            next.stream().state(),
            ConnectionState::Backoff { .. }
        ));

        let (next, effects) = update(next, Msg::RetryDue { timer });
        connection = connected(&effects).expect("reconnect attempt");
        state = next;
    }
    assert_eq!(
        delays,
        vec![
            Duration::from_millis(250),
            Duration::from_millis(500),
            Duration::from_secs(1),
        ]
    );

    let (state, effects) = update(
        state,
        Msg::StreamFailed {
            connection,
            reason: "connection refused".to_string(),
        },
    );
    assert_eq!(
        stream_commands(&effects),
        vec![
            StreamCommand::Disconnect,
            StreamCommand::ReportRetriesExhausted { attempts: 3 },
        ]
    );
    let view = state.view();
    assert!(view.live_updates_paused);
    assert_eq!(
        view.connection,
        ConnectionState::Closed {
            reason: CloseReason::RetriesExhausted
        }
    );
    // Last known rows stay visible.
    assert_eq!(view.jobs.len(), 1);
}

#[test]
fn manual_reconnect_resumes_after_pause() {
    init_logging();
    let state = mounted(0);
    let (state, _) = update(
        state,
        Msg::StreamFailed {
            connection: 1,
            reason: "eof".to_string(),
        },
    );
    assert!(state.view().live_updates_paused);

    let (state, effects) = update(state, Msg::ReconnectClicked);
    assert!(connected(&effects).is_some());
    assert!(!state.view().live_updates_paused);
    assert!(matches!(
        state.stream().state(),
        ConnectionState::Connecting { attempt: 0 }
    ));
}

#[test]
fn reconnect_bypasses_pending_backoff() {
    init_logging();
    let state = mounted(5);
    let (state, effects) = update(
        state,
        Msg::StreamFailed {
            connection: 1,
            reason: "eof".to_string(),
        },
    );
    let (timer, _) = scheduled(&effects).unwrap();

    let (state, effects) = update(state, Msg::ReconnectClicked);
    assert_eq!(
        stream_commands(&effects),
        vec![
            StreamCommand::CancelRetry,
            StreamCommand::Connect { connection: 3 },
        ]
    );

    // The cancelled timer firing late changes nothing.
    let (_, effects) = update(state, Msg::RetryDue { timer });
    assert!(effects.is_empty());
}

#[test]
fn visible_trigger_skips_backoff_wait() {
    init_logging();
    let state = mounted(5);
    let (state, _) = update(
        state,
        Msg::StreamFailed {
            connection: 1,
            reason: "eof".to_string(),
        },
    );

    let (state, effects) = update(state, Msg::Trigger(HostTrigger::Visible));
    let commands = stream_commands(&effects);
    assert_eq!(commands[0], StreamCommand::CancelRetry);
    assert!(matches!(commands[1], StreamCommand::Connect { .. }));
    assert!(matches!(
        state.stream().state(),
        ConnectionState::Connecting { .. }
    ));
}

#[test]
fn visible_trigger_while_open_is_ignored() {
    init_logging();
    let state = mounted(5);
    let (state, effects) = update(state, Msg::Trigger(HostTrigger::Visible));
    assert!(effects.is_empty());
    assert_eq!(state.stream().state(), ConnectionState::Open);
}

#[test]
fn offline_closes_and_online_reconnects() {
    init_logging();
    let state = mounted(5);
    let (state, _) = update(
        state,
        Msg::StreamFailed {
            connection: 1,
            reason: "eof".to_string(),
        },
    );

    let (state, effects) = update(state, Msg::Trigger(HostTrigger::Offline));
    assert_eq!(stream_commands(&effects), vec![StreamCommand::CancelRetry]);
    assert_eq!(
        state.stream().state(),
        ConnectionState::Closed {
            reason: CloseReason::Offline
        }
    );
    assert!(state.view().offline);

    let (state, effects) = update(state, Msg::Trigger(HostTrigger::Online));
    assert!(connected(&effects).is_some());
    assert!(matches!(
        state.stream().state(),
        ConnectionState::Connecting { attempt: 0 }
    ));
}

#[test]
fn visible_and_reconnect_both_connect_while_offline() {
    init_logging();
    let state = mounted(5);
    let (state, _) = update(state, Msg::Trigger(HostTrigger::Offline));

    let (state, effects) = update(state, Msg::Trigger(HostTrigger::Visible));
    let visible = connected(&effects).expect("visible connects");
    assert!(state.view().offline);

    let (state, _) = update(state, Msg::Trigger(HostTrigger::Offline));
    let (state, effects) = update(state, Msg::ReconnectClicked);
    let manual = connected(&effects).expect("reconnect connects");
    assert!(manual > visible);

    let (state, _) = update(state, Msg::StreamOpened { connection: manual });
    assert!(!state.view().offline);
    assert_eq!(state.stream().state(), ConnectionState::Open);
}

#[test]
fn stable_connection_restores_the_retry_budget() {
    init_logging();
    let mut state = mounted(2);
    let mut connection = 1;
    for _ in 0..6 {
        let (next, _) = update(state, Msg::StreamStable { connection });
        let (next, effects) = update(
            next,
            Msg::StreamFailed {
                connection,
                reason: "stream stalled".to_string(),
            },
        );
        let (timer, _) = scheduled(&effects).expect("retry scheduled");
        let (next, effects) = update(next, Msg::RetryDue { timer });
        connection = connected(&effects).expect("reconnects");
        let (next, _) = update(next, Msg::StreamOpened { connection });
        state = next;
    }
    assert!(!state.view().live_updates_paused);
    assert_eq!(state.stream().state(), ConnectionState::Open);
}

#[test]
fn offline_while_open_disconnects() {
    init_logging();
    let state = mounted(5);
    let (state, effects) = update(state, Msg::Trigger(HostTrigger::Offline));
    assert_eq!(stream_commands(&effects), vec![StreamCommand::Disconnect]);

    // Transport noise from the dropped connection is ignored.
    let (state, effects) = update(
        state,
        Msg::StreamFailed {
            connection: 1,
            reason: "aborted".to_string(),
        },
    );
    assert!(effects.is_empty());
    assert_eq!(
        state.stream().state(),
        ConnectionState::Closed {
            reason: CloseReason::Offline
        }
    );
}

#[test]
fn keep_alive_and_garbage_do_not_disturb_the_connection() {
    init_logging();
    let state = mounted(5);
    let before = state.store().clone();

    let (state, effects) = update(
        state,
        Msg::StreamMessage {
            connection: 1,
            data: ": keepalive".to_string(),
        },
    );
    assert!(effects.is_empty());
    let (state, effects) = update(
        state,
        Msg::StreamMessage {
            connection: 1,
            data: "{\"jobId\": ".to_string(),
        },
    );
    assert!(effects.is_empty());

    assert_eq!(state.stream().state(), ConnectionState::Open);
    assert_eq!(state.store(), &before);
}

#[test]
fn reopening_after_failure_resyncs_page_and_user() {
    init_logging();
    let state = mounted(5);
    let (state, effects) = update(
        state,
        Msg::StreamFailed {
            connection: 1,
            reason: "eof".to_string(),
        },
    );
    let (timer, _) = scheduled(&effects).unwrap();
    let (state, effects) = update(state, Msg::RetryDue { timer });
    let connection = connected(&effects).unwrap();

    let (_, effects) = update(state, Msg::StreamOpened { connection });
    assert_eq!(
        effects,
        vec![
            Effect::FetchPage {
                page_index: 1,
                page_size: 10
            },
            Effect::FetchUser,
        ]
    );
}
