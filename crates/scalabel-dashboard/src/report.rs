use scalabel_core::{header_summary, task_rows, DashboardSnapshot, SlotStatus, TaskRow};
use std::fmt::Write;

/// Plain-text dashboard: the aggregate header (omitted for vendors) followed by
/// one line per task.
pub fn render_text(snapshot: &DashboardSnapshot, vendor: bool) -> String {
    let mut out = String::new();
    let project = &snapshot.project_metadata;
    let _ = writeln!(
        out,
        "project {} ({}, {})",
        project.name,
        or_dash(&project.item_type),
        or_dash(&project.label_types.join("/"))
    );
    if let Some(summary) = header_summary(snapshot, vendor) {
        let _ = writeln!(
            out,
            "tasks {}  labeled {}  labels {}  users {}",
            summary.num_tasks, summary.total_task_labeled, summary.total_labels, summary.num_users
        );
    }
    for row in task_rows(snapshot) {
        let _ = writeln!(out, "{}", render_row(&row));
    }
    out
}

fn render_row(row: &TaskRow) -> String {
    let task_id = row
        .key
        .as_ref()
        .map(|key| key.normalized().to_string())
        .unwrap_or_else(|| format!("#{}", row.index));
    match row.status {
        SlotStatus::Pending => format!("{task_id:<8} loading..."),
        SlotStatus::Failed => format!("{task_id:<8} {}", row.status.as_str()),
        SlotStatus::Resolved => format!(
            "{task_id:<8} items {:<6} labels {:<6} submitted {}",
            count(row.labeled_items),
            count(row.labels),
            or_dash(&row.submitted)
        ),
    }
}

fn count(value: Option<i64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| "?".to_string())
}

fn or_dash(value: &str) -> &str {
    if value.is_empty() {
        "-"
    } else {
        value
    }
}
