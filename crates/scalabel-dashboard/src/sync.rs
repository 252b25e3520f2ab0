use crate::fetcher::{FetchError, MetadataFetcher};
use crate::store::DashboardStore;
use futures_util::StreamExt;
use scalabel_core::{DashboardError, TaskKey, TaskMetadata};
use std::time::Duration;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Log the failure and leave the slot at the pending sentinel.
    #[default]
    StayPending,
    /// Record the failure so the slot reports `SlotStatus::Failed`.
    MarkFailed,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncOptions {
    /// Cap on concurrent fetches; `None` dispatches every task at once.
    pub max_in_flight: Option<usize>,
    /// Per-fetch deadline; `None` waits forever.
    pub fetch_timeout: Option<Duration>,
    pub failure_policy: FailurePolicy,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub dispatched: usize,
    pub resolved: usize,
    pub failed: usize,
    pub pending: usize,
}

pub struct SyncEngine<F> {
    fetcher: F,
    options: SyncOptions,
}

impl<F: MetadataFetcher> SyncEngine<F> {
    pub fn new(fetcher: F, options: SyncOptions) -> Self {
        Self { fetcher, options }
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    /// Fetches metadata for every task key and merges each result into `store`
    /// as it arrives.
    ///
    /// Completions are applied one at a time on the calling task, in whatever
    /// order they finish. Returns once every fetch has settled; without a
    /// timeout a fetch that never settles keeps this future pending, and
    /// progress is visible through [`DashboardStore::subscribe`].
    pub async fn run(&self, store: &mut DashboardStore) -> Result<SyncReport, DashboardError> {
        let (project_name, jobs) = {
            let snapshot = store.snapshot();
            let jobs: Vec<(usize, TaskKey)> =
                snapshot.task_keys.iter().flatten().cloned().enumerate().collect();
            (snapshot.project_metadata.name.clone(), jobs)
        };
        let mut report = SyncReport {
            dispatched: jobs.len(),
            ..SyncReport::default()
        };
        if jobs.is_empty() {
            info!(event = "sync_skipped", reason = "no_task_keys");
            return Ok(report);
        }

        let limit = self
            .options
            .max_in_flight
            .filter(|limit| *limit > 0)
            .unwrap_or(jobs.len());
        info!(
            event = "sync_start",
            project = %project_name,
            tasks = jobs.len(),
            max_in_flight = limit
        );

        let fetcher = &self.fetcher;
        let project = project_name.as_str();
        let timeout = self.options.fetch_timeout;
        let completions = futures_util::stream::iter(jobs)
            .map(move |(index, key)| async move {
                let result = fetch_with_timeout(fetcher, project, &key, timeout).await;
                (index, key, result)
            })
            .buffer_unordered(limit);
        let mut completions = std::pin::pin!(completions);

        while let Some((index, key, result)) = completions.next().await {
            match result {
                Ok(metadata) => {
                    let snapshot = store.apply_task_result(index, metadata)?;
                    report.resolved += 1;
                    info!(
                        event = "task_metadata_applied",
                        index,
                        task_id = key.normalized(),
                        num_labeled_items = %snapshot.task_metadata[index].num_labeled_items,
                        num_labels = %snapshot.task_metadata[index].num_labels,
                        remaining = report.dispatched - report.resolved - report.failed
                    );
                }
                Err(err) => {
                    report.failed += 1;
                    warn!(
                        event = "task_metadata_failed",
                        index,
                        task_id = key.normalized(),
                        error = %err
                    );
                    if self.options.failure_policy == FailurePolicy::MarkFailed {
                        store.apply_task_failure(index, err.to_string())?;
                    }
                }
            }
        }

        report.pending = store.snapshot().pending_indices().len();
        info!(
            event = "sync_complete",
            resolved = report.resolved,
            failed = report.failed,
            pending = report.pending
        );
        Ok(report)
    }
}

async fn fetch_with_timeout<F: MetadataFetcher>(
    fetcher: &F,
    project_name: &str,
    key: &TaskKey,
    timeout: Option<Duration>,
) -> Result<TaskMetadata, FetchError> {
    match timeout {
        Some(limit) => tokio::time::timeout(limit, fetcher.fetch(project_name, key))
            .await
            .unwrap_or(Err(FetchError::TimedOut(limit))),
        None => fetcher.fetch(project_name, key).await,
    }
}
