//! Push-stream connection lifecycle.
//!
//! `EventStreamClient` is a pure state machine: every input returns the
//! [`StreamCommand`]s the host must execute (open/close the transport, arm or
//! cancel the reconnect timer). Connection and timer ids let the machine
//! ignore inputs that belong to a connection or timer it already discarded.

use std::time::Duration;

use jobsync_logging::{sync_debug, sync_info, sync_warn};

use crate::payload::{classify_payload, Inbound};
use crate::{BackoffPolicy, JobEvent};

pub type ConnectionId = u64;
pub type TimerId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Idle,
    Connecting {
        attempt: u32,
    },
    Open,
    Backoff {
        attempt: u32,
        delay: Duration,
    },
    Closed {
        reason: CloseReason,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    Stopped,
    Offline,
    RetriesExhausted,
}

/// Host environment signals that may restart the stream early.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostTrigger {
    Visible,
    Online,
    Offline,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamCommand {
    Connect { connection: ConnectionId },
    Disconnect,
    ScheduleRetry { timer: TimerId, delay: Duration },
    CancelRetry,
    ReportRetriesExhausted { attempts: u32 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventStreamClient {
    state: ConnectionState,
    policy: BackoffPolicy,
    retries: u32,
    connection: ConnectionId,
    timer: TimerId,
    pending_timer: Option<TimerId>,
    offline: bool,
}

impl Default for EventStreamClient {
    fn default() -> Self {
        Self::new(BackoffPolicy::default())
    }
}

impl EventStreamClient {
    pub fn new(policy: BackoffPolicy) -> Self {
        Self {
            state: ConnectionState::Idle,
            policy,
            retries: 0,
            connection: 0,
            timer: 0,
            pending_timer: None,
            offline: false,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn retries(&self) -> u32 {
        self.retries
    }

    pub fn is_offline(&self) -> bool {
        self.offline
    }

    /// True once automatic retries are used up; only a trigger or a manual
    /// reconnect brings the stream back.
    pub fn is_paused(&self) -> bool {
        matches!(
            self.state,
            ConnectionState::Closed {
                reason: CloseReason::RetriesExhausted
            }
        )
    }

    pub fn start(&mut self) -> Vec<StreamCommand> {
        match self.state {
            ConnectionState::Connecting { .. } | ConnectionState::Open => Vec::new(),
            _ => {
                let mut commands = Vec::with_capacity(2);
                self.cancel_timer(&mut commands);
                self.connect(&mut commands);
                commands
            }
        }
    }

    pub fn stop(&mut self) -> Vec<StreamCommand> {
        let mut commands = Vec::with_capacity(2);
        self.close(CloseReason::Stopped, &mut commands);
        commands
    }

    /// Tear down and reconnect immediately with a fresh retry budget.
    pub fn reconnect(&mut self) -> Vec<StreamCommand> {
        sync_info!("stream: manual reconnect");
        let mut commands = self.stop();
        self.retries = 0;
        commands.extend(self.start());
        commands
    }

    pub fn on_opened(&mut self, connection: ConnectionId) {
        if connection != self.connection {
            return;
        }
        if let ConnectionState::Connecting { attempt } = self.state {
            sync_info!("stream: connection {} open (attempt {})", connection, attempt);
            self.state = ConnectionState::Open;
            self.offline = false;
        }
    }

    /// The transport reports the connection outlived its stability window.
    ///
    /// Restores the retry budget even when the stream carried no events, so
    /// a connection that idles until the liveness timeout is not counted as
    /// a flap.
    pub fn on_stable(&mut self, connection: ConnectionId) {
        if connection != self.connection || self.state != ConnectionState::Open {
            return;
        }
        if self.retries > 0 {
            sync_info!(
                "stream: connection {} stable, resetting {} retries",
                connection,
                self.retries
            );
            self.retries = 0;
        }
    }

    /// Classify an inbound payload, returning the event to hand to the store.
    ///
    /// Keep-alives and malformed payloads are dropped without touching the
    /// connection state.
    pub fn on_message(&mut self, connection: ConnectionId, data: &str) -> Option<JobEvent> {
        if connection != self.connection || !self.is_live() {
            return None;
        }
        match classify_payload(data) {
            Inbound::KeepAlive => {
                sync_debug!("stream: keep-alive on connection {}", connection);
                None
            }
            Inbound::Malformed(reason) => {
                sync_debug!("stream: dropping malformed payload: {}", reason);
                None
            }
            Inbound::Event(event) => {
                // A delivered message proves the stream works again.
                self.state = ConnectionState::Open;
                self.retries = 0;
                Some(event)
            }
        }
    }

    pub fn on_transport_error(
        &mut self,
        connection: ConnectionId,
        reason: &str,
    ) -> Vec<StreamCommand> {
        if connection != self.connection || !self.is_live() {
            return Vec::new();
        }
        sync_warn!("stream: connection {} failed: {}", connection, reason);

        // Erroring: the failed connection is discarded before deciding what next.
        let mut commands = vec![StreamCommand::Disconnect];
        match self.policy.delay_for_attempt(self.retries) {
            Some(delay) => {
                self.retries += 1;
                self.timer += 1;
                self.pending_timer = Some(self.timer);
                self.state = ConnectionState::Backoff {
                    attempt: self.retries,
                    delay,
                };
                sync_info!(
                    "stream: retry {} of {} in {:?}",
                    self.retries,
                    self.policy.max_attempts,
                    delay
                );
                commands.push(StreamCommand::ScheduleRetry {
                    timer: self.timer,
                    delay,
                });
            }
            None => {
                sync_warn!(
                    "stream: giving up after {} retries, live updates paused",
                    self.retries
                );
                self.state = ConnectionState::Closed {
                    reason: CloseReason::RetriesExhausted,
                };
                commands.push(StreamCommand::ReportRetriesExhausted {
                    attempts: self.retries,
                });
            }
        }
        commands
    }

    pub fn on_retry_due(&mut self, timer: TimerId) -> Vec<StreamCommand> {
        if self.pending_timer != Some(timer) {
            return Vec::new();
        }
        self.pending_timer = None;
        if !matches!(self.state, ConnectionState::Backoff { .. }) {
            return Vec::new();
        }
        let mut commands = Vec::with_capacity(1);
        self.connect(&mut commands);
        commands
    }

    pub fn on_trigger(&mut self, trigger: HostTrigger) -> Vec<StreamCommand> {
        sync_debug!("stream: trigger {:?} in state {:?}", trigger, self.state);
        match trigger {
            HostTrigger::Visible => match self.state {
                ConnectionState::Idle
                | ConnectionState::Closed { .. }
                | ConnectionState::Backoff { .. } => self.restart_fresh(),
                ConnectionState::Connecting { .. } | ConnectionState::Open => Vec::new(),
            },
            HostTrigger::Online => {
                self.offline = false;
                if self.is_live() {
                    Vec::new()
                } else {
                    self.restart_fresh()
                }
            }
            HostTrigger::Offline => {
                self.offline = true;
                let mut commands = Vec::with_capacity(2);
                if !matches!(self.state, ConnectionState::Closed { .. }) {
                    self.close(CloseReason::Offline, &mut commands);
                }
                commands
            }
        }
    }

    fn is_live(&self) -> bool {
        matches!(
            self.state,
            ConnectionState::Connecting { .. } | ConnectionState::Open
        )
    }

    fn restart_fresh(&mut self) -> Vec<StreamCommand> {
        self.retries = 0;
        let mut commands = Vec::with_capacity(2);
        self.cancel_timer(&mut commands);
        self.connect(&mut commands);
        commands
    }

    fn connect(&mut self, commands: &mut Vec<StreamCommand>) {
        self.connection += 1;
        self.state = ConnectionState::Connecting {
            attempt: self.retries,
        };
        sync_debug!("stream: connecting (connection {})", self.connection);
        commands.push(StreamCommand::Connect {
            connection: self.connection,
        });
    }

    fn close(&mut self, reason: CloseReason, commands: &mut Vec<StreamCommand>) {
        if self.is_live() {
            commands.push(StreamCommand::Disconnect);
        }
        self.cancel_timer(commands);
        // Bump the id so late transport events from the old connection are ignored.
        self.connection += 1;
        self.state = ConnectionState::Closed { reason };
        sync_info!("stream: closed ({:?})", reason);
    }

    fn cancel_timer(&mut self, commands: &mut Vec<StreamCommand>) {
        if self.pending_timer.take().is_some() {
            commands.push(StreamCommand::CancelRetry);
        }
    }
}
