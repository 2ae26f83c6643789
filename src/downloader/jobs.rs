// Job status table shared between download tasks and pollers

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use super::models::Job;

/// How long terminal records stay observable
pub const DEFAULT_RETENTION: Duration = Duration::from_secs(60);

/// Mapping from job id to the latest job record.
///
/// Every write replaces the whole record. Once a record is terminal it is
/// never overwritten, and it is evicted after the retention window by a
/// background task that also stops on [`JobTable::shutdown`].
#[derive(Clone)]
pub struct JobTable {
    inner: Arc<Inner>,
}

struct Inner {
    jobs: RwLock<HashMap<String, Job>>,
    retention: Duration,
    shutdown: CancellationToken,
    evictions: TaskTracker,
}

impl JobTable {
    pub fn new(retention: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                jobs: RwLock::new(HashMap::new()),
                retention,
                shutdown: CancellationToken::new(),
                evictions: TaskTracker::new(),
            }),
        }
    }

    /// Record a freshly submitted job
    pub async fn insert(&self, job: Job) {
        self.inner.jobs.write().await.insert(job.id.clone(), job);
    }

    pub async fn get(&self, id: &str) -> Option<Job> {
        self.inner.jobs.read().await.get(id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.inner.jobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Replace a non-terminal record. Returns false when the id is unknown
    /// or already terminal.
    pub async fn update(&self, job: Job) -> bool {
        let mut jobs = self.inner.jobs.write().await;
        match jobs.get(&job.id) {
            Some(current) if !current.status.is_terminal() => {
                jobs.insert(job.id.clone(), job);
                true
            }
            _ => false,
        }
    }

    /// Write the terminal record and schedule its eviction
    pub async fn finish(&self, job: Job) {
        let id = job.id.clone();
        if self.update(job).await {
            self.schedule_eviction(id);
        } else {
            tracing::warn!("[jobs] ignoring terminal write for unknown or finished job {}", id);
        }
    }

    fn schedule_eviction(&self, id: String) {
        let table = self.clone();
        let retention = self.inner.retention;
        let shutdown = self.inner.shutdown.clone();

        self.inner.evictions.spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(retention) => {
                    table.inner.jobs.write().await.remove(&id);
                    tracing::debug!("[jobs] evicted {}", id);
                }
                _ = shutdown.cancelled() => {}
            }
        });
    }

    /// Cancel pending evictions and wait for their tasks to exit
    pub async fn shutdown(&self) {
        self.inner.shutdown.cancel();
        self.inner.evictions.close();
        self.inner.evictions.wait().await;
    }
}

impl Default for JobTable {
    fn default() -> Self {
        Self::new(DEFAULT_RETENTION)
    }
}
