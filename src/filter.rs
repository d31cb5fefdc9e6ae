// Equality filters for task queries

use crate::models::TaskStatus;

/// Task column a filter applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskField {
    Agent,
    Status,
}

impl TaskField {
    pub(crate) fn column(self) -> &'static str {
        match self {
            TaskField::Agent => "agent",
            TaskField::Status => "status",
        }
    }
}

impl std::fmt::Display for TaskField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.column())
    }
}

/// Exact, case-sensitive match of one task column
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
    pub field: TaskField,
    pub value: String,
}

impl Filter {
    pub fn agent(agent: impl Into<String>) -> Self {
        Self {
            field: TaskField::Agent,
            value: agent.into(),
        }
    }

    pub fn status(status: &TaskStatus) -> Self {
        Self {
            field: TaskField::Status,
            value: status.as_str().to_string(),
        }
    }
}

/// Build a `WHERE` clause joining all filters with `AND`.
///
/// Placeholders are numbered from `?1` in filter order. Returns an empty
/// string when there are no filters.
pub(crate) fn where_clause(filters: &[Filter]) -> String {
    if filters.is_empty() {
        return String::new();
    }

    let terms: Vec<String> = filters
        .iter()
        .enumerate()
        .map(|(i, filter)| format!("{} = ?{}", filter.field.column(), i + 1))
        .collect();

    format!(" WHERE {}", terms.join(" AND "))
}
