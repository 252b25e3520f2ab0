use crate::snapshot::{DashboardSnapshot, SlotStatus};
use crate::{Submission, TaskKey, TaskMetadata};
use chrono::{TimeZone, Utc};
use serde::{Deserialize, Serialize};

const SUBMISSION_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateCounters {
    #[serde(rename = "totalTaskLabeled")]
    pub total_task_labeled: usize,
    #[serde(rename = "totalLabels")]
    pub total_labels: i64,
}

/// Derives the summary counters from the current task list.
///
/// A pending task (`-1` labeled items) is not counted as labeled, but its `-1`
/// label count is still added to `total_labels` until it resolves. The label
/// total saturates at the `i64` bounds.
pub fn compute_aggregates(tasks: &[TaskMetadata]) -> AggregateCounters {
    let mut counters = AggregateCounters::default();
    for task in tasks {
        if task.labeled_items().map(|n| n > 0).unwrap_or(false) {
            counters.total_task_labeled += 1;
        }
        counters.total_labels = counters
            .total_labels
            .saturating_add(task.labels().unwrap_or(0));
    }
    counters
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderSummary {
    pub num_tasks: usize,
    pub total_task_labeled: usize,
    pub total_labels: i64,
    pub num_users: u64,
}

/// Aggregate block shown above the task table. Vendors never see it.
pub fn header_summary(snapshot: &DashboardSnapshot, vendor: bool) -> Option<HeaderSummary> {
    if vendor {
        return None;
    }
    let counters = compute_aggregates(&snapshot.task_metadata);
    Some(HeaderSummary {
        num_tasks: snapshot.task_metadata.len(),
        total_task_labeled: counters.total_task_labeled,
        total_labels: counters.total_labels,
        num_users: snapshot.num_users,
    })
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskRow {
    pub index: usize,
    pub key: Option<TaskKey>,
    pub status: SlotStatus,
    pub labeled_items: Option<i64>,
    pub labels: Option<i64>,
    pub submitted: String,
    pub handler_url: String,
}

pub fn task_rows(snapshot: &DashboardSnapshot) -> Vec<TaskRow> {
    snapshot
        .task_metadata
        .iter()
        .enumerate()
        .map(|(index, meta)| {
            let status = snapshot.slot_status(index).unwrap_or(SlotStatus::Pending);
            let resolved = status == SlotStatus::Resolved;
            TaskRow {
                index,
                key: snapshot.task_key(index).cloned(),
                status,
                labeled_items: meta.labeled_items().filter(|_| resolved),
                labels: meta.labels().filter(|_| resolved),
                submitted: meta.submitted_display(),
                handler_url: meta.handler_url.clone(),
            }
        })
        .collect()
}

/// Time of the last submission in sequence order, which is not necessarily the
/// largest timestamp.
pub fn latest_submission_time(submissions: &[Submission]) -> Option<i64> {
    submissions.last().map(|submission| submission.time)
}

/// Formats a millisecond epoch timestamp in UTC.
pub fn format_submission_time(time_ms: i64) -> String {
    match Utc.timestamp_millis_opt(time_ms).single() {
        Some(ts) => ts.format(SUBMISSION_TIME_FORMAT).to_string(),
        None => time_ms.to_string(),
    }
}
