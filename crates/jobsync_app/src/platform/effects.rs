use jobsync_core::{Effect, FetchFailure, Msg, StreamCommand};
use jobsync_engine::{EngineEvent, EngineHandle, FetchError, TransportEvent};
use jobsync_logging::{sync_debug, sync_warn};

use super::persistence::Snapshots;

/// Runs core effects against the engine and the snapshot cache, and turns
/// engine events back into messages.
pub struct EffectRunner {
    engine: EngineHandle,
    snapshots: Snapshots,
}

impl EffectRunner {
    pub(crate) fn new(engine: EngineHandle, snapshots: Snapshots) -> Self {
        Self { engine, snapshots }
    }

    pub fn enqueue(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::FetchPage {
                    page_index,
                    page_size,
                } => self.engine.fetch_page(page_index, page_size),
                Effect::FetchUser => self.engine.fetch_user(),
                Effect::Stream(command) => self.run_stream_command(command),
                Effect::PersistJobs(jobs) => self.snapshots.save_jobs(&jobs),
                Effect::PersistUser(user) => self.snapshots.save_user(&user),
                Effect::ClearSnapshots => self.snapshots.clear(),
            }
        }
    }

    fn run_stream_command(&self, command: StreamCommand) {
        match command {
            StreamCommand::Connect { connection } => self.engine.open_stream(connection),
            StreamCommand::Disconnect => self.engine.close_stream(),
            StreamCommand::ScheduleRetry { timer, delay } => {
                sync_debug!("effects: retry timer {} in {:?}", timer, delay);
                self.engine.schedule_retry(timer, delay);
            }
            StreamCommand::CancelRetry => self.engine.cancel_retry(),
            StreamCommand::ReportRetriesExhausted { attempts } => {
                sync_warn!(
                    "effects: live updates paused after {} reconnect attempts",
                    attempts
                );
            }
        }
    }

    /// Next pending engine event as a message, if any.
    pub fn poll(&self) -> Option<Msg> {
        self.engine.try_recv().map(to_msg)
    }
}

fn to_msg(event: EngineEvent) -> Msg {
    match event {
        EngineEvent::PageFetched { page_index, result } => Msg::PageLoaded {
            page_index,
            result: result.map_err(|err| failure("page", err)),
        },
        EngineEvent::UserFetched(result) => {
            Msg::UserLoaded(result.map_err(|err| failure("user", err)))
        }
        EngineEvent::Stream(TransportEvent::Opened { connection }) => {
            Msg::StreamOpened { connection }
        }
        EngineEvent::Stream(TransportEvent::Message { connection, data }) => {
            Msg::StreamMessage { connection, data }
        }
        EngineEvent::Stream(TransportEvent::Stable { connection }) => {
            Msg::StreamStable { connection }
        }
        EngineEvent::Stream(TransportEvent::Failed { connection, error }) => {
            sync_warn!("effects: connection {} failed: {}", connection, error);
            Msg::StreamFailed {
                connection,
                reason: error.to_string(),
            }
        }
        EngineEvent::RetryDue { timer } => Msg::RetryDue { timer },
    }
}

fn failure(what: &str, err: FetchError) -> FetchFailure {
    sync_warn!("effects: {} fetch failed: {}", what, err);
    FetchFailure::new(err.to_string())
}
