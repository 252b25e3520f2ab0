pub mod aggregate;
pub mod snapshot;

pub use aggregate::{
    compute_aggregates, format_submission_time, header_summary, latest_submission_time,
    task_rows, AggregateCounters, HeaderSummary, TaskRow,
};
pub use snapshot::{
    apply_task_failure, apply_task_result, BootstrapInput, DashboardError, DashboardSnapshot,
    SlotStatus,
};

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;

/// Value stored in the numeric fields of a task whose metadata has not been fetched yet.
pub const PENDING_SENTINEL: &str = "-1";

/// Number of trailing characters of a task key sent as `task_id`.
pub const TASK_ID_SUFFIX_LEN: usize = 6;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectMetadata {
    pub name: String,
    #[serde(default, rename = "itemType")]
    pub item_type: String,
    #[serde(
        default,
        rename = "labelTypes",
        alias = "labelType",
        deserialize_with = "deserialize_label_types"
    )]
    pub label_types: Vec<String>,
    #[serde(default, rename = "taskSize", deserialize_with = "deserialize_count_u64")]
    pub task_size: u64,
    #[serde(default, rename = "numItems", deserialize_with = "deserialize_count_u64")]
    pub num_items: u64,
    #[serde(
        default,
        rename = "numLeafCategories",
        alias = "numCategories",
        deserialize_with = "deserialize_count_u64"
    )]
    pub num_categories: u64,
    #[serde(default, rename = "numAttributes", deserialize_with = "deserialize_count_u64")]
    pub num_attributes: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskMetadata {
    #[serde(
        default = "pending_count",
        rename = "numLabeledItems",
        deserialize_with = "deserialize_numeric_string"
    )]
    pub num_labeled_items: String,
    #[serde(
        default = "pending_count",
        rename = "numLabels",
        deserialize_with = "deserialize_numeric_string"
    )]
    pub num_labels: String,
    #[serde(default, deserialize_with = "deserialize_submissions")]
    pub submissions: Vec<Submission>,
    #[serde(default, rename = "handlerUrl")]
    pub handler_url: String,
}

impl Default for TaskMetadata {
    fn default() -> Self {
        Self::pending()
    }
}

impl TaskMetadata {
    /// Placeholder for a task whose metadata is still being fetched.
    pub fn pending() -> Self {
        Self {
            num_labeled_items: pending_count(),
            num_labels: pending_count(),
            submissions: Vec::new(),
            handler_url: String::new(),
        }
    }

    pub fn labeled_items(&self) -> Option<i64> {
        parse_count(&self.num_labeled_items)
    }

    pub fn labels(&self) -> Option<i64> {
        parse_count(&self.num_labels)
    }

    pub fn is_pending(&self) -> bool {
        self.labeled_items() == Some(-1)
    }

    pub fn latest_submission_time(&self) -> Option<i64> {
        latest_submission_time(&self.submissions)
    }

    /// Display value of the "submitted" column; empty when nothing was submitted.
    pub fn submitted_display(&self) -> String {
        self.latest_submission_time()
            .map(format_submission_time)
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Submission {
    pub time: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(default, flatten)]
    pub extra: HashMap<String, Value>,
}

impl Submission {
    pub fn at(time: i64) -> Self {
        Self {
            time,
            user: None,
            extra: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskKey(pub String);

impl TaskKey {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Trailing characters of the key used as the `task_id` query parameter.
    ///
    /// Counts characters rather than bytes; keys shorter than the suffix length
    /// are returned unchanged.
    pub fn normalized(&self) -> &str {
        let count = self.0.chars().count();
        if count <= TASK_ID_SUFFIX_LEN {
            return &self.0;
        }
        let skip = count - TASK_ID_SUFFIX_LEN;
        match self.0.char_indices().nth(skip) {
            Some((offset, _)) => &self.0[offset..],
            None => &self.0,
        }
    }
}

impl fmt::Display for TaskKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TaskKey {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for TaskKey {
    fn from(value: String) -> Self {
        Self(value)
    }
}

fn pending_count() -> String {
    PENDING_SENTINEL.to_string()
}

fn parse_count(raw: &str) -> Option<i64> {
    let trimmed = raw.trim();
    if let Ok(value) = trimmed.parse::<i64>() {
        return Some(value);
    }
    trimmed
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
        .map(|value| value.trunc() as i64)
}

/// Deserialize a count that can be a JSON number, a numeric string or null into a String
fn deserialize_numeric_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let val: Value = Value::deserialize(deserializer)?;
    match val {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        Value::Null => Ok(pending_count()),
        _ => Err(serde::de::Error::custom(
            "expected string or number for count",
        )),
    }
}

fn deserialize_count_u64<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let val: Value = Value::deserialize(deserializer)?;
    match val {
        Value::String(s) => s.trim().parse::<u64>().map_err(serde::de::Error::custom),
        Value::Number(n) => n
            .as_u64()
            .ok_or_else(|| serde::de::Error::custom("invalid count")),
        Value::Null => Ok(0),
        _ => Err(serde::de::Error::custom(
            "expected string or number for count",
        )),
    }
}

fn deserialize_label_types<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let val: Value = Value::deserialize(deserializer)?;
    match val {
        Value::String(s) => Ok(vec![s]),
        Value::Array(items) => Ok(items
            .into_iter()
            .filter_map(|item| item.as_str().map(str::to_string))
            .collect()),
        Value::Null => Ok(Vec::new()),
        _ => Err(serde::de::Error::custom(
            "expected string or array for label types",
        )),
    }
}

fn deserialize_submissions<'de, D>(deserializer: D) -> Result<Vec<Submission>, D::Error>
where
    D: Deserializer<'de>,
{
    let val: Option<Vec<Submission>> = Option::deserialize(deserializer)?;
    Ok(val.unwrap_or_default())
}
