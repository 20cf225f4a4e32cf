use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

use jobsync_core::{ConnectionId, TimerId};
use jobsync_logging::{sync_debug, sync_info};
use thiserror::Error;
use tokio::runtime::Runtime;
use tokio_util::sync::CancellationToken;

use crate::api::{ClientSettings, HttpApiClient, PageFetcher, UserFetcher};
use crate::transport::{ChannelTransportSink, EventTransport, SseTransport, StreamSettings};
use crate::{EngineEvent, FetchError};

#[derive(Debug, Clone, Default)]
pub struct EngineSettings {
    pub client: ClientSettings,
    pub stream: StreamSettings,
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("failed to start engine runtime: {0}")]
    Runtime(#[from] std::io::Error),
    #[error("failed to build http client: {0}")]
    Client(#[from] FetchError),
}

/// The IO collaborators the engine drives.
#[derive(Clone)]
pub struct Backends {
    pub pages: Arc<dyn PageFetcher>,
    pub users: Arc<dyn UserFetcher>,
    pub transport: Arc<dyn EventTransport>,
}

impl Backends {
    pub fn http(settings: &EngineSettings) -> Result<Self, FetchError> {
        let api = Arc::new(HttpApiClient::new(settings.client.clone())?);
        let transport = Arc::new(SseTransport::new(&settings.client, &settings.stream)?);
        Ok(Self {
            pages: api.clone(),
            users: api,
            transport,
        })
    }
}

enum EngineCommand {
    FetchPage { page_index: u32, page_size: u32 },
    FetchUser,
    OpenStream { connection: ConnectionId },
    CloseStream,
    ScheduleRetry { timer: TimerId, delay: Duration },
    CancelRetry,
}

/// Host-side handle to the IO thread. Dropping it shuts the thread down and
/// cancels any open stream and pending timer.
pub struct EngineHandle {
    cmd_tx: mpsc::Sender<EngineCommand>,
    event_rx: mpsc::Receiver<EngineEvent>,
}

impl EngineHandle {
    pub fn new(settings: EngineSettings) -> Result<Self, EngineError> {
        Self::with_backends(Backends::http(&settings)?)
    }

    pub fn with_backends(backends: Backends) -> Result<Self, EngineError> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_all()
            .build()?;
        let (cmd_tx, cmd_rx) = mpsc::channel();
        let (event_tx, event_rx) = mpsc::channel();

        thread::Builder::new()
            .name("jobsync-engine".to_string())
            .spawn(move || run_commands(runtime, backends, cmd_rx, event_tx))?;

        Ok(Self { cmd_tx, event_rx })
    }

    pub fn fetch_page(&self, page_index: u32, page_size: u32) {
        self.send(EngineCommand::FetchPage {
            page_index,
            page_size,
        });
    }

    pub fn fetch_user(&self) {
        self.send(EngineCommand::FetchUser);
    }

    /// Opens a new stream connection, replacing any existing one.
    pub fn open_stream(&self, connection: ConnectionId) {
        self.send(EngineCommand::OpenStream { connection });
    }

    pub fn close_stream(&self) {
        self.send(EngineCommand::CloseStream);
    }

    pub fn schedule_retry(&self, timer: TimerId, delay: Duration) {
        self.send(EngineCommand::ScheduleRetry { timer, delay });
    }

    pub fn cancel_retry(&self) {
        self.send(EngineCommand::CancelRetry);
    }

    pub fn try_recv(&self) -> Option<EngineEvent> {
        self.event_rx.try_recv().ok()
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Option<EngineEvent> {
        self.event_rx.recv_timeout(timeout).ok()
    }

    fn send(&self, command: EngineCommand) {
        let _ = self.cmd_tx.send(command);
    }
}

fn run_commands(
    runtime: Runtime,
    backends: Backends,
    cmd_rx: mpsc::Receiver<EngineCommand>,
    event_tx: mpsc::Sender<EngineEvent>,
) {
    let shutdown = CancellationToken::new();
    let mut stream: Option<CancellationToken> = None;
    let mut retry: Option<CancellationToken> = None;

    while let Ok(command) = cmd_rx.recv() {
        match command {
            EngineCommand::FetchPage {
                page_index,
                page_size,
            } => {
                let pages = backends.pages.clone();
                let event_tx = event_tx.clone();
                runtime.spawn(async move {
                    let result = pages.fetch_page(page_index, page_size).await;
                    let _ = event_tx.send(EngineEvent::PageFetched { page_index, result });
                });
            }
            EngineCommand::FetchUser => {
                let users = backends.users.clone();
                let event_tx = event_tx.clone();
                runtime.spawn(async move {
                    let result = users.fetch_current_user().await;
                    let _ = event_tx.send(EngineEvent::UserFetched(result));
                });
            }
            EngineCommand::OpenStream { connection } => {
                cancel(&mut stream);
                let token = shutdown.child_token();
                stream = Some(token.clone());
                let transport = backends.transport.clone();
                let sink = ChannelTransportSink::new(event_tx.clone());
                runtime.spawn(async move {
                    tokio::select! {
                        _ = token.cancelled() => {
                            sync_debug!("engine: connection {} cancelled", connection);
                        }
                        _ = transport.run(connection, &sink) => {}
                    }
                });
            }
            EngineCommand::CloseStream => cancel(&mut stream),
            EngineCommand::ScheduleRetry { timer, delay } => {
                cancel(&mut retry);
                let token = shutdown.child_token();
                retry = Some(token.clone());
                let event_tx = event_tx.clone();
                runtime.spawn(async move {
                    tokio::select! {
                        _ = token.cancelled() => {}
                        _ = tokio::time::sleep(delay) => {
                            let _ = event_tx.send(EngineEvent::RetryDue { timer });
                        }
                    }
                });
            }
            EngineCommand::CancelRetry => cancel(&mut retry),
        }
    }

    sync_info!("engine: handle dropped, shutting down");
    shutdown.cancel();
    runtime.shutdown_background();
}

fn cancel(slot: &mut Option<CancellationToken>) {
    if let Some(token) = slot.take() {
        token.cancel();
    }
}
