use crate::{ProjectMetadata, TaskKey, TaskMetadata};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DashboardError {
    #[error("task index {index} out of range for {len} tasks")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("bootstrap has {metadata} task metadata entries but only {keys} task keys")]
    MisalignedBootstrap { metadata: usize, keys: usize },
}

/// Initial page state handed to the dashboard by the hosting page.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BootstrapInput {
    #[serde(rename = "projectMetadata")]
    pub project_metadata: ProjectMetadata,
    #[serde(default, rename = "taskMetaDatas", alias = "taskMetadata")]
    pub task_metadata: Vec<TaskMetadata>,
    #[serde(default, rename = "taskKeys")]
    pub task_keys: Option<Vec<TaskKey>>,
    #[serde(default, rename = "numUsers")]
    pub num_users: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SlotStatus {
    Pending,
    Resolved,
    Failed,
}

impl SlotStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SlotStatus::Pending => "pending",
            SlotStatus::Resolved => "resolved",
            SlotStatus::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardSnapshot {
    #[serde(rename = "projectMetadata")]
    pub project_metadata: ProjectMetadata,
    #[serde(rename = "taskMetaDatas")]
    pub task_metadata: Vec<TaskMetadata>,
    /// `None` when the page supplied final metadata and nothing is polled.
    /// Otherwise there is exactly one key per metadata slot.
    #[serde(default, rename = "taskKeys", skip_serializing_if = "Option::is_none")]
    pub task_keys: Option<Vec<TaskKey>>,
    #[serde(rename = "numUsers")]
    pub num_users: u64,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub failures: BTreeMap<usize, String>,
}

impl DashboardSnapshot {
    /// Seeds one slot per task key, keeping metadata the page already supplied and
    /// filling the rest with pending placeholders.
    ///
    /// Without task keys the supplied metadata is final and nothing will be polled.
    pub fn initialize(bootstrap: BootstrapInput) -> Result<Self, DashboardError> {
        let BootstrapInput {
            project_metadata,
            mut task_metadata,
            task_keys,
            num_users,
        } = bootstrap;

        if let Some(keys) = &task_keys {
            if task_metadata.len() > keys.len() {
                return Err(DashboardError::MisalignedBootstrap {
                    metadata: task_metadata.len(),
                    keys: keys.len(),
                });
            }
            task_metadata.resize_with(keys.len(), TaskMetadata::pending);
        }

        Ok(Self {
            project_metadata,
            task_metadata,
            task_keys,
            num_users,
            failures: BTreeMap::new(),
        })
    }

    pub fn is_polling(&self) -> bool {
        self.task_keys.as_ref().is_some_and(|keys| !keys.is_empty())
    }

    pub fn task_key(&self, index: usize) -> Option<&TaskKey> {
        self.task_keys.as_ref()?.get(index)
    }

    /// Replaces slot `index` in place and clears any failure recorded for it.
    pub fn set_task_result(
        &mut self,
        index: usize,
        metadata: TaskMetadata,
    ) -> Result<(), DashboardError> {
        self.check_index(index)?;
        self.task_metadata[index] = metadata;
        self.failures.remove(&index);
        Ok(())
    }

    pub fn set_task_failure(
        &mut self,
        index: usize,
        reason: impl Into<String>,
    ) -> Result<(), DashboardError> {
        self.check_index(index)?;
        self.failures.insert(index, reason.into());
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.task_metadata.len()
    }

    pub fn is_empty(&self) -> bool {
        self.task_metadata.is_empty()
    }

    pub fn slot_status(&self, index: usize) -> Option<SlotStatus> {
        let meta = self.task_metadata.get(index)?;
        if self.failures.contains_key(&index) {
            return Some(SlotStatus::Failed);
        }
        if meta.is_pending() {
            Some(SlotStatus::Pending)
        } else {
            Some(SlotStatus::Resolved)
        }
    }

    pub fn pending_indices(&self) -> Vec<usize> {
        (0..self.task_metadata.len())
            .filter(|index| self.slot_status(*index) == Some(SlotStatus::Pending))
            .collect()
    }

    fn check_index(&self, index: usize) -> Result<(), DashboardError> {
        if index >= self.task_metadata.len() {
            return Err(DashboardError::IndexOutOfRange {
                index,
                len: self.task_metadata.len(),
            });
        }
        Ok(())
    }
}

/// Returns a new snapshot with slot `index` replaced by `metadata`.
///
/// Every other slot is carried over untouched, so applying one result per index
/// in any order converges on the same snapshot.
pub fn apply_task_result(
    previous: &DashboardSnapshot,
    index: usize,
    metadata: TaskMetadata,
) -> Result<DashboardSnapshot, DashboardError> {
    previous.check_index(index)?;
    let mut next = previous.clone();
    next.set_task_result(index, metadata)?;
    Ok(next)
}

/// Marks slot `index` as failed while leaving its metadata at the pending sentinel.
pub fn apply_task_failure(
    previous: &DashboardSnapshot,
    index: usize,
    reason: impl Into<String>,
) -> Result<DashboardSnapshot, DashboardError> {
    previous.check_index(index)?;
    let mut next = previous.clone();
    next.set_task_failure(index, reason)?;
    Ok(next)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Submission;

    fn bootstrap(keys: Option<Vec<&str>>, metadata: Vec<TaskMetadata>) -> BootstrapInput {
        BootstrapInput {
            project_metadata: ProjectMetadata {
                name: "demo".to_string(),
                ..ProjectMetadata::default()
            },
            task_metadata: metadata,
            task_keys: keys.map(|keys| keys.into_iter().map(TaskKey::from).collect()),
            num_users: 2,
        }
    }

    fn resolved(labeled: &str, labels: &str, times: &[i64]) -> TaskMetadata {
        TaskMetadata {
            num_labeled_items: labeled.to_string(),
            num_labels: labels.to_string(),
            submissions: times.iter().copied().map(Submission::at).collect(),
            handler_url: String::new(),
        }
    }

    #[test]
    fn initialize_pads_missing_slots_with_placeholders() {
        let snapshot = DashboardSnapshot::initialize(bootstrap(
            Some(vec!["k0", "k1", "k2"]),
            vec![resolved("3", "9", &[])],
        ))
        .expect("init");
        assert_eq!(snapshot.task_keys.as_ref().map(Vec::len), Some(3));
        assert_eq!(snapshot.task_metadata.len(), 3);
        assert_eq!(snapshot.task_metadata[0].labeled_items(), Some(3));
        assert!(snapshot.task_metadata[1].is_pending());
        assert!(snapshot.task_metadata[2].is_pending());
        assert_eq!(snapshot.pending_indices(), vec![1, 2]);
        assert!(snapshot.is_polling());
    }

    #[test]
    fn initialize_rejects_more_metadata_than_keys() {
        let err = DashboardSnapshot::initialize(bootstrap(
            Some(vec!["k0"]),
            vec![TaskMetadata::pending(), TaskMetadata::pending()],
        ))
        .expect_err("misaligned");
        assert_eq!(
            err,
            DashboardError::MisalignedBootstrap {
                metadata: 2,
                keys: 1
            }
        );
    }

    #[test]
    fn initialize_without_keys_is_final() {
        let snapshot = DashboardSnapshot::initialize(bootstrap(
            None,
            vec![resolved("1", "4", &[10])],
        ))
        .expect("init");
        assert!(!snapshot.is_polling());
        assert_eq!(snapshot.task_keys, None);
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot.task_key(0), None);
        assert_eq!(
            apply_task_result(&snapshot, 1, TaskMetadata::pending()),
            Err(DashboardError::IndexOutOfRange { index: 1, len: 1 })
        );
    }

    #[test]
    fn final_metadata_slots_stay_addressable() {
        let snapshot = DashboardSnapshot::initialize(bootstrap(
            None,
            vec![resolved("1", "4", &[10]), TaskMetadata::pending()],
        ))
        .expect("init");
        assert_eq!(snapshot.slot_status(1), Some(SlotStatus::Pending));
        let next = apply_task_result(&snapshot, 1, resolved("2", "6", &[])).expect("apply");
        assert_eq!(next.slot_status(1), Some(SlotStatus::Resolved));
        assert_eq!(next.task_metadata[0].labels(), Some(4));
        let failed = apply_task_failure(&snapshot, 0, "stale").expect("fail");
        assert_eq!(failed.slot_status(0), Some(SlotStatus::Failed));
    }

    #[test]
    fn in_place_updates_match_the_pure_reducer() {
        let initial =
            DashboardSnapshot::initialize(bootstrap(Some(vec!["k0", "k1"]), Vec::new()))
                .expect("init");
        let mut in_place = initial.clone();
        in_place
            .set_task_result(0, resolved("3", "3", &[]))
            .expect("set");
        assert_eq!(
            in_place,
            apply_task_result(&initial, 0, resolved("3", "3", &[])).expect("apply")
        );
        assert_eq!(
            in_place.set_task_failure(2, "boom"),
            Err(DashboardError::IndexOutOfRange { index: 2, len: 2 })
        );
        assert!(in_place.failures.is_empty());
    }

    #[test]
    fn apply_replaces_only_the_target_slot() {
        let initial =
            DashboardSnapshot::initialize(bootstrap(Some(vec!["k0", "k1"]), Vec::new()))
                .expect("init");
        let next = apply_task_result(&initial, 1, resolved("5", "20", &[1000])).expect("apply");
        assert!(next.task_metadata[0].is_pending());
        assert_eq!(next.task_metadata[1].labels(), Some(20));
        assert!(initial.task_metadata[1].is_pending());
    }

    #[test]
    fn apply_out_of_range_fails() {
        let initial =
            DashboardSnapshot::initialize(bootstrap(Some(vec!["k0", "k1"]), Vec::new()))
                .expect("init");
        assert_eq!(
            apply_task_result(&initial, 2, TaskMetadata::pending()),
            Err(DashboardError::IndexOutOfRange { index: 2, len: 2 })
        );
        assert!(apply_task_failure(&initial, 5, "boom").is_err());
    }

    #[test]
    fn failure_is_cleared_by_later_result() {
        let initial =
            DashboardSnapshot::initialize(bootstrap(Some(vec!["k0"]), Vec::new())).expect("init");
        let failed = apply_task_failure(&initial, 0, "timeout").expect("fail");
        assert_eq!(failed.slot_status(0), Some(SlotStatus::Failed));
        assert!(failed.task_metadata[0].is_pending());
        assert!(failed.pending_indices().is_empty());

        let recovered = apply_task_result(&failed, 0, resolved("0", "0", &[])).expect("apply");
        assert_eq!(recovered.slot_status(0), Some(SlotStatus::Resolved));
        assert!(recovered.failures.is_empty());
    }

    #[test]
    fn bootstrap_parses_page_payload() {
        let input: BootstrapInput = serde_json::from_str(
            r#"{
                "projectMetadata": {"name": "p1", "itemType": "image", "labelTypes": ["box2d"], "taskSize": 5},
                "taskMetaDatas": [{"numLabeledItems": "-1", "numLabels": "-1", "submissions": []}],
                "taskKeys": ["p1/tasks/000000", "p1/tasks/000001"],
                "numUsers": 4
            }"#,
        )
        .expect("parse");
        let snapshot = DashboardSnapshot::initialize(input).expect("init");
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot.num_users, 4);
        assert_eq!(snapshot.task_key(1).map(TaskKey::normalized), Some("000001"));
    }
}
