// Typed row mapping for the store's tables

use crate::models::{Goal, Task, TaskStatus, parse_date, parse_datetime};
use rusqlite::Row;
use rusqlite::types::Type;

/// A type that is stored as one row of a table
pub trait Record: Sized {
    /// Table name (e.g., "tasks", "goals")
    fn table_name() -> &'static str;

    /// Column list in the order `from_row` reads them
    fn columns() -> &'static str;

    /// Build the record from a row selected with `columns()`
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self>;
}

impl Record for Task {
    fn table_name() -> &'static str {
        "tasks"
    }

    fn columns() -> &'static str {
        "id, agent, timestamp, description, status, created_at, updated_at"
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let timestamp: String = row.get(2)?;
        let status: String = row.get(4)?;
        let created_at: String = row.get(5)?;
        let updated_at: String = row.get(6)?;

        Ok(Task {
            id: row.get(0)?,
            agent: row.get(1)?,
            timestamp: parse_date(&timestamp).ok_or_else(|| invalid_text(2, &timestamp))?,
            description: row.get(3)?,
            status: TaskStatus::parse(&status),
            created_at: parse_datetime(&created_at).ok_or_else(|| invalid_text(5, &created_at))?,
            updated_at: parse_datetime(&updated_at).ok_or_else(|| invalid_text(6, &updated_at))?,
        })
    }
}

impl Record for Goal {
    fn table_name() -> &'static str {
        "goals"
    }

    fn columns() -> &'static str {
        "id, goal_text, created_at, is_active"
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let created_at: String = row.get(2)?;
        let is_active: i64 = row.get(3)?;

        Ok(Goal {
            id: row.get(0)?,
            goal_text: row.get(1)?,
            created_at: parse_datetime(&created_at).ok_or_else(|| invalid_text(2, &created_at))?,
            is_active: is_active != 0,
        })
    }
}

fn invalid_text(column: usize, value: &str) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        column,
        Type::Text,
        format!("invalid timestamp text: {:?}", value).into(),
    )
}
