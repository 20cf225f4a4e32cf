use std::sync::mpsc;
use std::time::{Duration, Instant};

use futures_util::StreamExt;
use jobsync_core::ConnectionId;
use jobsync_logging::{sync_debug, sync_info, sync_trace};
use reqwest::header::{ACCEPT, CACHE_CONTROL, CONTENT_TYPE, COOKIE};
use url::Url;

use crate::api::{endpoint, map_reqwest_error};
use crate::sse::{SseDecoder, SseFrame, DEFAULT_MAX_EVENT_BYTES};
use crate::{ClientSettings, EngineEvent, FailureKind, FetchError, TransportEvent};

const EVENT_STREAM: &str = "text/event-stream";

#[derive(Debug, Clone)]
pub struct StreamSettings {
    /// Path of the event stream below the API base url.
    pub path: String,
    /// A connection that delivers no bytes for this long is treated as dead.
    pub liveness_timeout: Duration,
    /// A connection open this long is reported as stable, restoring the
    /// client's retry budget. Keep it below `liveness_timeout` so a quiet
    /// but healthy connection still counts.
    pub stable_after: Duration,
    /// Upper bound on one event, counting buffered bytes of a partial line
    /// plus data lines not yet dispatched.
    pub max_event_bytes: usize,
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            path: "sse".to_string(),
            liveness_timeout: Duration::from_secs(45),
            stable_after: Duration::from_secs(30),
            max_event_bytes: DEFAULT_MAX_EVENT_BYTES,
        }
    }
}

pub trait TransportSink: Send + Sync {
    fn emit(&self, event: TransportEvent);
}

pub struct ChannelTransportSink {
    tx: mpsc::Sender<EngineEvent>,
}

impl ChannelTransportSink {
    pub fn new(tx: mpsc::Sender<EngineEvent>) -> Self {
        Self { tx }
    }
}

impl TransportSink for ChannelTransportSink {
    fn emit(&self, event: TransportEvent) {
        let _ = self.tx.send(EngineEvent::Stream(event));
    }
}

/// One push-stream connection attempt.
#[async_trait::async_trait]
pub trait EventTransport: Send + Sync {
    /// Runs the connection until it ends. Unless the future is dropped first,
    /// the last event emitted is always `TransportEvent::Failed`.
    async fn run(&self, connection: ConnectionId, sink: &dyn TransportSink);
}

#[derive(Debug, Clone)]
pub struct SseTransport {
    client: reqwest::Client,
    url: Url,
    session_cookie: Option<String>,
    liveness_timeout: Duration,
    stable_after: Duration,
    max_event_bytes: usize,
}

impl SseTransport {
    pub fn new(client: &ClientSettings, stream: &StreamSettings) -> Result<Self, FetchError> {
        let url = endpoint(&client.base_url, &stream.path)?;
        // No overall request timeout: the response body is meant to stay open.
        let http = reqwest::Client::builder()
            .connect_timeout(client.connect_timeout)
            .build()
            .map_err(|err| FetchError::new(FailureKind::Network, err.to_string()))?;
        Ok(Self {
            client: http,
            url,
            session_cookie: client.session_cookie.clone(),
            liveness_timeout: stream.liveness_timeout,
            stable_after: stream.stable_after,
            max_event_bytes: stream.max_event_bytes,
        })
    }

    async fn pump(&self, connection: ConnectionId, sink: &dyn TransportSink) -> FetchError {
        let mut request = self
            .client
            .get(self.url.clone())
            .header(ACCEPT, EVENT_STREAM)
            .header(CACHE_CONTROL, "no-cache");
        if let Some(cookie) = &self.session_cookie {
            request = request.header(COOKIE, cookie);
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(err) => return map_reqwest_error(err),
        };
        let status = response.status();
        if !status.is_success() {
            return FetchError::new(FailureKind::HttpStatus(status.as_u16()), status.to_string());
        }
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.to_string());
        if let Some(ct) = content_type.as_deref() {
            let essence = ct.split(';').next().unwrap_or(ct).trim();
            if !essence.eq_ignore_ascii_case(EVENT_STREAM) {
                return FetchError::new(
                    FailureKind::UnsupportedContentType {
                        content_type: ct.to_string(),
                    },
                    "not an event stream",
                );
            }
        }

        sync_info!("transport: connection {} established to {}", connection, self.url);
        sink.emit(TransportEvent::Opened { connection });

        let mut watch = StabilityWatch::new(connection, self.stable_after);
        let mut decoder = SseDecoder::new(self.max_event_bytes);
        let mut body = response.bytes_stream();
        loop {
            let next = tokio::time::timeout(self.liveness_timeout, body.next()).await;
            watch.check(sink);
            let chunk = match next {
                Ok(Some(Ok(chunk))) => chunk,
                Ok(Some(Err(err))) => return map_reqwest_error(err),
                Ok(None) => return FetchError::new(FailureKind::ServerClosed, "end of stream"),
                Err(_) => {
                    return FetchError::new(
                        FailureKind::Stalled,
                        format!("no data for {:?}", self.liveness_timeout),
                    )
                }
            };
            let frames = match decoder.push(&chunk) {
                Ok(frames) => frames,
                Err(overflow) => {
                    return FetchError::new(
                        FailureKind::TooLarge {
                            max_bytes: overflow.limit as u64,
                            actual: Some(overflow.pending as u64),
                        },
                        "event exceeds size limit",
                    )
                }
            };
            for frame in frames {
                match frame {
                    SseFrame::Event { event, data, .. } => {
                        if event.as_deref().is_none_or(|name| name == "message") {
                            sink.emit(TransportEvent::Message { connection, data });
                        } else {
                            sync_debug!("transport: ignoring named event {:?}", event);
                        }
                    }
                    SseFrame::Comment(comment) => {
                        sync_trace!("transport: comment {:?}", comment);
                    }
                }
            }
        }
    }
}

/// Emits `TransportEvent::Stable` once per connection after it has stayed
/// open for the configured time.
struct StabilityWatch {
    connection: ConnectionId,
    opened_at: Instant,
    stable_after: Duration,
    reported: bool,
}

impl StabilityWatch {
    fn new(connection: ConnectionId, stable_after: Duration) -> Self {
        Self {
            connection,
            opened_at: Instant::now(),
            stable_after,
            reported: false,
        }
    }

    fn check(&mut self, sink: &dyn TransportSink) {
        if self.reported || self.opened_at.elapsed() < self.stable_after {
            return;
        }
        self.reported = true;
        sync_debug!("transport: connection {} stable", self.connection);
        sink.emit(TransportEvent::Stable {
            connection: self.connection,
        });
    }
}

#[async_trait::async_trait]
impl EventTransport for SseTransport {
    async fn run(&self, connection: ConnectionId, sink: &dyn TransportSink) {
        let error = self.pump(connection, sink).await;
        sink.emit(TransportEvent::Failed { connection, error });
    }
}
