use crate::stream::{ConnectionId, HostTrigger, TimerId};

#[derive(Debug, Clone, PartialEq)]
pub enum Msg {
    /// The view came up; carries whatever the snapshot cache had.
    Mounted {
        user: Option<crate::User>,
        jobs: Option<crate::JobsSnapshot>,
    },
    /// User asked for a specific page.
    PageRequested(u32),
    NextPage,
    PreviousPage,
    /// User asked to reload the current page and their profile.
    RefreshRequested,
    /// A job was deleted through another surface.
    JobDeleted(crate::JobId),
    /// Listing endpoint answered.
    PageLoaded {
        page_index: u32,
        result: Result<crate::Page, crate::FetchFailure>,
    },
    /// Session endpoint answered; `Ok(None)` means signed out.
    UserLoaded(Result<Option<crate::User>, crate::FetchFailure>),
    StreamOpened {
        connection: ConnectionId,
    },
    StreamMessage {
        connection: ConnectionId,
        data: String,
    },
    /// The connection stayed open long enough to count as healthy.
    StreamStable {
        connection: ConnectionId,
    },
    StreamFailed {
        connection: ConnectionId,
        reason: String,
    },
    /// A scheduled reconnect timer elapsed.
    RetryDue {
        timer: TimerId,
    },
    Trigger(HostTrigger),
    ReconnectClicked,
    /// The view is going away; nothing after this is applied.
    TornDown,
    /// Render tick to coalesce rendering.
    Tick,
    NoOp,
}
