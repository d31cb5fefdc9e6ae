// Data models for the agent task log

use chrono::{Local, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Format used for `created_at` / `updated_at` columns
pub const DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f";

/// Format used for the task display date (`timestamp` column)
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// A unit of recorded work reported by an agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: i64,
    pub agent: String,
    /// Display date, derived from the creation time
    pub timestamp: NaiveDate,
    pub description: String,
    pub status: TaskStatus,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// Task status
///
/// The three known values get their own variants. Anything else is kept
/// verbatim in `Custom` so legacy logs round-trip without validation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TaskStatus {
    NotStarted,
    #[default]
    InProgress,
    Done,
    Custom(String),
}

impl TaskStatus {
    /// Parse a stored status string. Matching is exact and case-sensitive.
    pub fn parse(s: &str) -> Self {
        match s {
            "Not Started" => TaskStatus::NotStarted,
            "In Progress" => TaskStatus::InProgress,
            "Done" => TaskStatus::Done,
            other => TaskStatus::Custom(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            TaskStatus::NotStarted => "Not Started",
            TaskStatus::InProgress => "In Progress",
            TaskStatus::Done => "Done",
            TaskStatus::Custom(s) => s,
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, TaskStatus::Custom(_))
    }
}

// Equality follows the stored text, so `Custom("Done")` equals `Done`.
impl PartialEq for TaskStatus {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

impl Eq for TaskStatus {}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for TaskStatus {
    fn from(s: &str) -> Self {
        TaskStatus::parse(s)
    }
}

impl From<String> for TaskStatus {
    fn from(s: String) -> Self {
        TaskStatus::parse(&s)
    }
}

impl From<TaskStatus> for String {
    fn from(status: TaskStatus) -> Self {
        status.as_str().to_string()
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(TaskStatus::parse(s))
    }
}

/// A shared objective. At most one goal is active at a time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Goal {
    pub id: i64,
    pub goal_text: String,
    pub created_at: NaiveDateTime,
    pub is_active: bool,
}

/// Current goal and all tasks, read together
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub goal: Option<String>,
    pub tasks: Vec<Task>,
}

/// Current local time, without timezone
pub fn now() -> NaiveDateTime {
    Local::now().naive_local()
}

pub fn format_datetime(ts: &NaiveDateTime) -> String {
    ts.format(DATETIME_FORMAT).to_string()
}

pub fn format_date(date: &NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// Parse a stored datetime. Accepts values with or without fractional seconds.
pub fn parse_datetime(s: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f").ok()
}

pub fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s, DATE_FORMAT).ok()
}
