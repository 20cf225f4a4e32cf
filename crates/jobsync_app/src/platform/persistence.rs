use std::path::Path;

use jobsync_core::{JobsSnapshot, User};
use jobsync_engine::{FileStore, SnapshotCache, JOBS_KEY, USER_KEY};
use jobsync_logging::{sync_info, sync_warn};

const NAMESPACE: &str = "jobsync";

/// File-backed cold-start cache for the signed-in user and the last page.
pub(crate) struct Snapshots {
    cache: SnapshotCache<FileStore>,
}

impl Snapshots {
    pub(crate) fn open(dir: &Path) -> Self {
        let store = FileStore::open(dir.to_path_buf()).unwrap_or_else(|err| {
            // Writes retry the directory and are dropped if it stays unusable.
            sync_warn!("snapshots: {:?} unusable: {}", dir, err);
            FileStore::new(dir.to_path_buf())
        });
        Self {
            cache: SnapshotCache::new(store, NAMESPACE),
        }
    }

    pub(crate) fn load(&mut self) -> (Option<User>, Option<JobsSnapshot>) {
        let user = self.cache.read::<User>(USER_KEY);
        let jobs = self.cache.read::<JobsSnapshot>(JOBS_KEY);
        sync_info!(
            "snapshots: cold start with user={} jobs={}",
            user.is_some(),
            jobs.as_ref().map_or(0, |jobs| jobs.items.len())
        );
        (user, jobs)
    }

    pub(crate) fn save_user(&mut self, user: &User) {
        self.cache.write(USER_KEY, user);
    }

    pub(crate) fn save_jobs(&mut self, jobs: &JobsSnapshot) {
        self.cache.write(JOBS_KEY, jobs);
    }

    pub(crate) fn clear(&mut self) {
        self.cache.clear(USER_KEY);
        self.cache.clear(JOBS_KEY);
    }
}
