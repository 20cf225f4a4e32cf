use std::collections::{BTreeSet, HashSet};

use jobsync_logging::sync_debug;

use crate::{FetchFailure, Job, JobEvent, JobId, JobsSnapshot, Page};

/// What the store needs from the outside after applying an input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreRequest {
    FetchPage { page_index: u32, page_size: u32 },
    RefreshUser,
    PersistJobs(JobsSnapshot),
}

/// Page-scoped view of jobs, patched in place by push events and replaced
/// wholesale by authoritative page loads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconciliationStore {
    page_size: u32,
    page_index: u32,
    /// Navigation target; `page_index` only moves once this page loads.
    pending_page: Option<u32>,
    rows: Vec<Job>,
    total: u64,
    in_flight: BTreeSet<u32>,
    list_unavailable: bool,
}

impl ReconciliationStore {
    pub fn new(page_size: u32) -> Self {
        Self {
            page_size: page_size.max(1),
            page_index: 1,
            pending_page: None,
            rows: Vec::new(),
            total: 0,
            in_flight: BTreeSet::new(),
            list_unavailable: false,
        }
    }

    pub fn rows(&self) -> &[Job] {
        &self.rows
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn page_index(&self) -> u32 {
        self.page_index
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// The page being navigated to, or the shown page when nothing is pending.
    pub fn target_page(&self) -> u32 {
        self.pending_page.unwrap_or(self.page_index)
    }

    pub fn is_loading(&self) -> bool {
        self.pending_page.is_some() || self.in_flight.contains(&self.page_index)
    }

    pub fn list_unavailable(&self) -> bool {
        self.list_unavailable
    }

    /// Last valid page index; zero when the listing is empty.
    pub fn page_count(&self) -> u32 {
        let pages = self.total.div_ceil(u64::from(self.page_size));
        u32::try_from(pages).unwrap_or(u32::MAX)
    }

    /// Paint rows from a persisted snapshot. Snapshots taken with another page
    /// size or of a page other than the first are stale and ignored.
    pub fn seed(&mut self, snapshot: JobsSnapshot) -> bool {
        if snapshot.page_size != self.page_size || snapshot.page_index != 1 {
            sync_debug!(
                "store: discarding stale snapshot (page {} size {})",
                snapshot.page_index,
                snapshot.page_size
            );
            return false;
        }
        self.page_index = 1;
        self.total = snapshot.total;
        self.rows = dedupe(snapshot.items);
        true
    }

    pub fn apply_event(&mut self, event: &JobEvent) -> Vec<StoreRequest> {
        let mut requests = Vec::new();
        match self.rows.iter_mut().find(|job| job.id == event.job_id) {
            Some(job) => job.patch(event),
            None => {
                sync_debug!(
                    "store: job {} not on page {}, refetching",
                    event.job_id,
                    self.page_index
                );
                requests.extend(self.refetch_current());
            }
        }
        if event.status.is_terminal() {
            requests.push(StoreRequest::RefreshUser);
        }
        requests
    }

    /// Reload the current page unless a load for it is already outstanding.
    pub fn refetch_current(&mut self) -> Option<StoreRequest> {
        self.request_page(self.page_index)
    }

    /// Navigate to another page. Out-of-range indices are ignored. The shown
    /// page only changes once the target loads successfully.
    pub fn go_to_page(&mut self, page_index: u32) -> Option<StoreRequest> {
        if page_index < 1 || page_index > self.page_count() {
            return None;
        }
        self.pending_page = (page_index != self.page_index).then_some(page_index);
        self.request_page(page_index)
    }

    /// Drop a row the user deleted elsewhere, then resync the page.
    pub fn remove(&mut self, job_id: JobId) -> Option<StoreRequest> {
        self.rows.retain(|job| job.id != job_id);
        self.refetch_current()
    }

    pub fn on_page_loaded(
        &mut self,
        page_index: u32,
        result: Result<Page, FetchFailure>,
    ) -> Vec<StoreRequest> {
        self.in_flight.remove(&page_index);
        if page_index != self.target_page() {
            sync_debug!(
                "store: discarding page {} result, expecting page {}",
                page_index,
                self.target_page()
            );
            return Vec::new();
        }
        self.pending_page = None;
        match result {
            Ok(page) => {
                self.page_index = page_index;
                self.rows = dedupe(page.items);
                self.total = page.total;
                self.list_unavailable = false;
                vec![StoreRequest::PersistJobs(self.snapshot())]
            }
            Err(failure) => {
                sync_debug!(
                    "store: page {} failed ({}), keeping page {}",
                    page_index,
                    failure,
                    self.page_index
                );
                self.list_unavailable = true;
                Vec::new()
            }
        }
    }

    pub fn snapshot(&self) -> JobsSnapshot {
        JobsSnapshot {
            page_index: self.page_index,
            page_size: self.page_size,
            total: self.total,
            items: self.rows.clone(),
        }
    }

    pub(crate) fn clear_in_flight(&mut self) {
        self.in_flight.clear();
        self.pending_page = None;
    }

    fn request_page(&mut self, page_index: u32) -> Option<StoreRequest> {
        if !self.in_flight.insert(page_index) {
            return None;
        }
        Some(StoreRequest::FetchPage {
            page_index,
            page_size: self.page_size,
        })
    }
}

fn dedupe(items: Vec<Job>) -> Vec<Job> {
    let mut seen = HashSet::with_capacity(items.len());
    items.into_iter().filter(|job| seen.insert(job.id)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::JobStatus;

    fn page(ids: &[JobId], total: u64) -> Page {
        Page {
            items: ids
                .iter()
                .map(|id| Job::new(*id, JobStatus::Queued))
                .collect(),
            total,
        }
    }

    #[test]
    fn page_count_rounds_up() {
        let mut store = ReconciliationStore::new(10);
        assert_eq!(store.page_count(), 0);
        store.refetch_current();
        store.on_page_loaded(1, Ok(page(&[1], 25)));
        assert_eq!(store.page_count(), 3);
    }

    #[test]
    fn out_of_range_pages_are_ignored() {
        let mut store = ReconciliationStore::new(10);
        store.refetch_current();
        store.on_page_loaded(1, Ok(page(&[1, 2], 25)));

        assert_eq!(store.go_to_page(0), None);
        assert_eq!(store.go_to_page(4), None);
        assert_eq!(store.page_index(), 1);
        assert_eq!(
            store.go_to_page(3),
            Some(StoreRequest::FetchPage {
                page_index: 3,
                page_size: 10
            })
        );
    }

    #[test]
    fn results_for_a_page_no_longer_shown_are_dropped() {
        let mut store = ReconciliationStore::new(2);
        store.refetch_current();
        store.on_page_loaded(1, Ok(page(&[1, 2], 6)));
        store.refetch_current();
        store.go_to_page(2);

        let requests = store.on_page_loaded(1, Ok(page(&[9, 8], 6)));
        assert!(requests.is_empty());
        assert_eq!(store.rows()[0].id, 1);
        assert!(store.is_loading());
    }

    #[test]
    fn failed_navigation_stays_on_the_shown_page() {
        let mut store = ReconciliationStore::new(10);
        store.refetch_current();
        store.on_page_loaded(1, Ok(page(&[1, 2], 25)));

        store.go_to_page(2);
        assert_eq!(store.page_index(), 1);
        assert_eq!(store.target_page(), 2);
        assert!(store.is_loading());

        store.on_page_loaded(2, Err(FetchFailure::new("503")));

        assert_eq!(store.page_index(), 1);
        assert_eq!(store.target_page(), 1);
        assert!(store.list_unavailable());
        assert!(!store.is_loading());
        let snapshot = store.snapshot();
        assert_eq!(snapshot.page_index, 1);
        assert_eq!(snapshot.items.len(), 2);
    }

    #[test]
    fn navigating_back_cancels_the_pending_page() {
        let mut store = ReconciliationStore::new(10);
        store.refetch_current();
        store.on_page_loaded(1, Ok(page(&[1], 25)));

        store.go_to_page(3);
        assert_eq!(
            store.go_to_page(1),
            Some(StoreRequest::FetchPage {
                page_index: 1,
                page_size: 10
            })
        );
        assert!(store.on_page_loaded(3, Ok(page(&[21], 25))).is_empty());
        assert_eq!(store.page_index(), 1);
        assert_eq!(store.rows()[0].id, 1);
    }

    #[test]
    fn duplicate_ids_in_a_page_are_collapsed() {
        let mut store = ReconciliationStore::new(10);
        store.refetch_current();
        store.on_page_loaded(1, Ok(page(&[3, 1, 3], 3)));
        let ids: Vec<_> = store.rows().iter().map(|job| job.id).collect();
        assert_eq!(ids, vec![3, 1]);
    }

    #[test]
    fn failed_load_keeps_rows() {
        let mut store = ReconciliationStore::new(10);
        store.refetch_current();
        store.on_page_loaded(1, Ok(page(&[1, 2], 2)));
        store.refetch_current();
        let requests = store.on_page_loaded(1, Err(FetchFailure::new("503")));
        assert!(requests.is_empty());
        assert_eq!(store.rows().len(), 2);
        assert!(store.list_unavailable());
        assert!(!store.is_loading());
    }

    #[test]
    fn stale_snapshots_are_not_seeded() {
        let mut store = ReconciliationStore::new(10);
        let snapshot = JobsSnapshot {
            page_index: 1,
            page_size: 20,
            total: 1,
            items: vec![Job::new(1, JobStatus::Queued)],
        };
        assert!(!store.seed(snapshot.clone()));
        assert!(store.rows().is_empty());

        assert!(!store.seed(JobsSnapshot {
            page_index: 2,
            page_size: 10,
            ..snapshot.clone()
        }));
        assert!(store.seed(JobsSnapshot {
            page_size: 10,
            ..snapshot
        }));
        assert_eq!(store.rows().len(), 1);
    }
}
