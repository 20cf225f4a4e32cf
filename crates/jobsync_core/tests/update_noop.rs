use jobsync_core::{update, AppState, Msg};

#[test]
fn update_is_noop() {
    let state = AppState::new(Default::default());
    let (next, effects) = update(state.clone(), Msg::NoOp);

    assert_eq!(state, next);
    assert!(effects.is_empty());
}

#[test]
fn messages_before_mount_are_ignored() {
    let state = AppState::default();
    let (next, effects) = update(
        state.clone(),
        Msg::StreamMessage {
            connection: 1,
            data: r#"{"jobId":1,"status":"queued"}"#.to_string(),
        },
    );

    assert_eq!(state, next);
    assert!(effects.is_empty());
}
