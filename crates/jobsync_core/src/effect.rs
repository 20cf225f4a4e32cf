use crate::stream::StreamCommand;

#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    FetchPage { page_index: u32, page_size: u32 },
    FetchUser,
    Stream(StreamCommand),
    PersistJobs(crate::JobsSnapshot),
    PersistUser(crate::User),
    /// Session is gone; forget everything cached for it.
    ClearSnapshots,
}
