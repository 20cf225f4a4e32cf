//! Jobsync engine: HTTP fetchers, push-stream transport, timers and the
//! snapshot cache. Everything that touches the network or disk lives here.
mod api;
mod engine;
mod persist;
mod snapshot;
mod sse;
mod transport;
mod types;

pub use api::{ClientSettings, HttpApiClient, PageFetcher, UserFetcher};
pub use engine::{Backends, EngineError, EngineHandle, EngineSettings};
pub use persist::PersistError;
pub use snapshot::{FileStore, KeyValueStore, MemoryStore, SnapshotCache, JOBS_KEY, USER_KEY};
pub use sse::{EventTooLarge, SseDecoder, SseFrame, DEFAULT_MAX_EVENT_BYTES};
pub use transport::{
    ChannelTransportSink, EventTransport, SseTransport, StreamSettings, TransportSink,
};
pub use types::{EngineEvent, FailureKind, FetchError, TransportEvent};
