use std::fmt;

use jobsync_core::{ConnectionId, Page, TimerId, User};

/// Lifecycle notifications from one push-stream connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Opened {
        connection: ConnectionId,
    },
    Message {
        connection: ConnectionId,
        data: String,
    },
    /// The connection has stayed open long enough to count as healthy.
    Stable {
        connection: ConnectionId,
    },
    Failed {
        connection: ConnectionId,
        error: FetchError,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    PageFetched {
        page_index: u32,
        result: Result<Page, FetchError>,
    },
    UserFetched(Result<Option<User>, FetchError>),
    Stream(TransportEvent),
    RetryDue {
        timer: TimerId,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchError {
    pub kind: FailureKind,
    pub message: String,
}

impl FetchError {
    pub(crate) fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for FetchError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    InvalidUrl,
    HttpStatus(u16),
    Timeout,
    /// Connected stream went quiet for longer than the liveness window.
    Stalled,
    ServerClosed,
    TooLarge { max_bytes: u64, actual: Option<u64> },
    UnsupportedContentType { content_type: String },
    Decode,
    Network,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::InvalidUrl => write!(f, "invalid url"),
            FailureKind::HttpStatus(code) => write!(f, "http status {code}"),
            FailureKind::Timeout => write!(f, "timeout"),
            FailureKind::Stalled => write!(f, "stream stalled"),
            FailureKind::ServerClosed => write!(f, "stream closed by server"),
            FailureKind::TooLarge { max_bytes, actual } => {
                write!(f, "response too large (max {max_bytes}, actual {actual:?})")
            }
            FailureKind::UnsupportedContentType { content_type } => {
                write!(f, "unsupported content type {content_type}")
            }
            FailureKind::Decode => write!(f, "invalid response body"),
            FailureKind::Network => write!(f, "network error"),
        }
    }
}
