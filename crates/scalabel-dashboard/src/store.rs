use scalabel_core::{
    compute_aggregates, AggregateCounters, BootstrapInput, DashboardError, DashboardSnapshot,
    TaskMetadata,
};
use tokio::sync::watch;
use tracing::debug;

/// Owner of the authoritative dashboard snapshot.
///
/// Every update is computed from the snapshot currently held here, never from a
/// copy taken when the fetch was dispatched, and the result is published to
/// subscribers before the call returns.
///
/// The held snapshot and the published one are patched slot by slot, so an
/// update costs one slot rather than a copy of the whole task list.
pub struct DashboardStore {
    snapshot: DashboardSnapshot,
    updates: watch::Sender<DashboardSnapshot>,
    applied: u64,
}

impl DashboardStore {
    pub fn initialize(bootstrap: BootstrapInput) -> Result<Self, DashboardError> {
        Ok(Self::from_snapshot(DashboardSnapshot::initialize(bootstrap)?))
    }

    pub fn from_snapshot(snapshot: DashboardSnapshot) -> Self {
        let (updates, _) = watch::channel(snapshot.clone());
        Self {
            snapshot,
            updates,
            applied: 0,
        }
    }

    pub fn snapshot(&self) -> &DashboardSnapshot {
        &self.snapshot
    }

    pub fn subscribe(&self) -> watch::Receiver<DashboardSnapshot> {
        self.updates.subscribe()
    }

    /// Number of updates applied since construction.
    pub fn applied(&self) -> u64 {
        self.applied
    }

    pub fn aggregates(&self) -> AggregateCounters {
        compute_aggregates(&self.snapshot.task_metadata)
    }

    pub fn apply_task_result(
        &mut self,
        index: usize,
        metadata: TaskMetadata,
    ) -> Result<&DashboardSnapshot, DashboardError> {
        if metadata.labeled_items().is_none() || metadata.labels().is_none() {
            debug!(
                event = "unparseable_task_counts",
                index,
                num_labeled_items = %metadata.num_labeled_items,
                num_labels = %metadata.num_labels
            );
        }
        self.snapshot.set_task_result(index, metadata.clone())?;
        self.publish(|published| published.set_task_result(index, metadata));
        Ok(&self.snapshot)
    }

    pub fn apply_task_failure(
        &mut self,
        index: usize,
        reason: impl Into<String>,
    ) -> Result<&DashboardSnapshot, DashboardError> {
        let reason = reason.into();
        self.snapshot.set_task_failure(index, reason.clone())?;
        self.publish(|published| published.set_task_failure(index, reason));
        Ok(&self.snapshot)
    }

    fn publish<U>(&mut self, update: U)
    where
        U: FnOnce(&mut DashboardSnapshot) -> Result<(), DashboardError>,
    {
        self.applied += 1;
        // both copies share a shape, so an update that fit the held one fits here
        self.updates.send_if_modified(|published| update(published).is_ok());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scalabel_core::{ProjectMetadata, SlotStatus, TaskKey};

    fn store(n: usize) -> DashboardStore {
        DashboardStore::initialize(BootstrapInput {
            project_metadata: ProjectMetadata {
                name: "store".to_string(),
                ..ProjectMetadata::default()
            },
            task_metadata: Vec::new(),
            task_keys: Some((0..n).map(|i| TaskKey::new(format!("k{i}"))).collect()),
            num_users: 1,
        })
        .expect("init")
    }

    fn labeled(n: &str) -> TaskMetadata {
        TaskMetadata {
            num_labeled_items: n.to_string(),
            num_labels: n.to_string(),
            ..TaskMetadata::pending()
        }
    }

    #[test]
    fn updates_build_on_the_latest_snapshot() {
        let mut store = store(3);
        store.apply_task_result(2, labeled("4")).expect("apply 2");
        store.apply_task_result(0, labeled("1")).expect("apply 0");
        let snapshot = store.snapshot();
        assert_eq!(snapshot.task_metadata[0].labeled_items(), Some(1));
        assert!(snapshot.task_metadata[1].is_pending());
        assert_eq!(snapshot.task_metadata[2].labeled_items(), Some(4));
        assert_eq!(store.applied(), 2);
        assert_eq!(store.aggregates().total_task_labeled, 2);
        assert_eq!(store.aggregates().total_labels, 4);
    }

    #[test]
    fn subscribers_see_each_published_snapshot() {
        let mut store = store(2);
        let rx = store.subscribe();
        assert!(rx.borrow().task_metadata[1].is_pending());
        store.apply_task_result(1, labeled("2")).expect("apply");
        assert_eq!(rx.borrow().task_metadata[1].labeled_items(), Some(2));
        store.apply_task_failure(0, "timed out").expect("fail");
        assert_eq!(rx.borrow().slot_status(0), Some(SlotStatus::Failed));
    }

    #[test]
    fn out_of_range_leaves_state_untouched() {
        let mut store = store(1);
        let err = store.apply_task_result(3, labeled("1")).expect_err("range");
        assert_eq!(err, DashboardError::IndexOutOfRange { index: 3, len: 1 });
        assert_eq!(store.applied(), 0);
        assert!(store.snapshot().task_metadata[0].is_pending());
    }

    #[test]
    fn published_copy_tracks_the_held_snapshot() {
        let mut store = store(3);
        let mut rx = store.subscribe();
        store.apply_task_result(0, labeled("1")).expect("apply 0");
        store.apply_task_failure(1, "refused").expect("fail 1");
        store.apply_task_result(1, labeled("6")).expect("apply 1");
        assert!(rx.has_changed().expect("sender alive"));
        assert_eq!(*rx.borrow_and_update(), *store.snapshot());
        assert_eq!(store.applied(), 3);

        store.apply_task_failure(7, "gone").expect_err("range");
        assert!(!rx.has_changed().expect("sender alive"));
    }
}
