// Task and goal store backed by SQLite

use crate::filter::{self, Filter};
use crate::models::{Goal, Snapshot, Task, TaskStatus, format_date, format_datetime, now};
use crate::record::Record;
use eyre::{Context, Result, eyre};
use rusqlite::{Connection, OptionalExtension, TransactionBehavior, params, params_from_iter};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Default wait for a locked database before an operation gives up
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_millis(5000);

/// Tuning knobs for a store handle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreOptions {
    /// How long a single operation waits on a locked database
    pub busy_timeout: Duration,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
        }
    }
}

/// Handle to the task/goal database
///
/// The handle holds no connection. Every operation opens its own
/// connection, runs a single transaction, commits and closes it again.
#[derive(Debug, Clone)]
pub struct Store {
    db_path: PathBuf,
    options: StoreOptions,
}

impl Store {
    /// Open or create a store at the given database file
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with(path, StoreOptions::default())
    }

    /// Open or create a store with explicit options
    pub fn open_with<P: AsRef<Path>>(path: P, options: StoreOptions) -> Result<Self> {
        let db_path = path.as_ref().to_path_buf();

        // Create parent directory if it doesn't exist
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).context("Failed to create store directory")?;
        }

        let store = Self { db_path, options };
        store.create_schema()?;

        info!(path = ?store.db_path, "Opened task store");
        Ok(store)
    }

    /// Get the path of the database file
    pub fn path(&self) -> &Path {
        &self.db_path
    }

    pub fn options(&self) -> &StoreOptions {
        &self.options
    }

    fn connect(&self) -> Result<Connection> {
        let conn = Connection::open(&self.db_path)
            .with_context(|| format!("Failed to open SQLite database: {}", self.db_path.display()))?;
        conn.busy_timeout(self.options.busy_timeout)?;
        Ok(conn)
    }

    /// Create database schema
    fn create_schema(&self) -> Result<()> {
        debug!("Creating database schema");

        let conn = self.connect()?;

        // WAL lets a reader run while a writer commits
        let mode: String = conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        debug!(journal_mode = %mode, "Configured journal mode");

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS tasks (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                agent TEXT NOT NULL,
                timestamp TEXT NOT NULL,
                description TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'In Progress',
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_tasks_created_at ON tasks(created_at);
            CREATE INDEX IF NOT EXISTS idx_tasks_agent ON tasks(agent);
            CREATE INDEX IF NOT EXISTS idx_tasks_status ON tasks(status);

            CREATE TABLE IF NOT EXISTS goals (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                goal_text TEXT NOT NULL,
                created_at TEXT NOT NULL,
                is_active INTEGER DEFAULT 1
            );
            "#,
        )
        .context("Failed to create schema")?;

        Ok(())
    }

    // ========================================================================
    // Tasks
    // ========================================================================

    /// Add a task and return its id
    ///
    /// Status defaults to "In Progress". Ids are assigned by SQLite
    /// `AUTOINCREMENT`, so they grow monotonically and are never reused.
    pub fn add_task(&self, agent: &str, description: &str, status: Option<TaskStatus>) -> Result<i64> {
        Self::validate_text("Agent", agent)?;
        Self::validate_text("Description", description)?;

        let status = status.unwrap_or_default();
        let created = now();
        let created_at = format_datetime(&created);

        let mut conn = self.connect()?;
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO tasks (agent, timestamp, description, status, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
            params![
                agent,
                format_date(&created.date()),
                description,
                status.as_str(),
                created_at
            ],
        )?;
        let id = tx.last_insert_rowid();
        tx.commit()?;

        info!(id, agent, status = %status, "Added task");
        Ok(id)
    }

    /// Get a task by id
    pub fn get_task(&self, id: i64) -> Result<Option<Task>> {
        let conn = self.connect()?;
        let sql = format!("SELECT {} FROM {} WHERE id = ?1", Task::columns(), Task::table_name());
        let task = conn.query_row(&sql, [id], Task::from_row).optional()?;
        Ok(task)
    }

    /// Set the status of a task. Returns false if the task doesn't exist.
    pub fn update_task_status(&self, id: i64, status: &TaskStatus) -> Result<bool> {
        self.update_task_column(id, "status", status.as_str())
    }

    /// Replace the description of a task. Returns false if the task doesn't exist.
    pub fn update_task_description(&self, id: i64, description: &str) -> Result<bool> {
        Self::validate_text("Description", description)?;
        self.update_task_column(id, "description", description)
    }

    /// Reassign a task to another agent. Returns false if the task doesn't exist.
    pub fn update_task_agent(&self, id: i64, agent: &str) -> Result<bool> {
        Self::validate_text("Agent", agent)?;
        self.update_task_column(id, "agent", agent)
    }

    fn update_task_column(&self, id: i64, column: &'static str, value: &str) -> Result<bool> {
        let mut conn = self.connect()?;
        let tx = conn.transaction()?;

        // MAX keeps updated_at >= created_at if the clock stepped back
        let sql = format!(
            "UPDATE tasks SET {} = ?1, updated_at = MAX(?2, created_at) WHERE id = ?3",
            column
        );
        let changed = tx.execute(&sql, params![value, format_datetime(&now()), id])?;
        tx.commit()?;

        if changed == 0 {
            debug!(id, column, "update_task_column: task not found");
            return Ok(false);
        }

        debug!(id, column, "Updated task");
        Ok(true)
    }

    /// Permanently delete a task. Returns false if the task doesn't exist.
    pub fn delete_task(&self, id: i64) -> Result<bool> {
        let mut conn = self.connect()?;
        let tx = conn.transaction()?;
        let changed = tx.execute("DELETE FROM tasks WHERE id = ?1", [id])?;
        tx.commit()?;

        if changed > 0 {
            info!(id, "Deleted task");
        }
        Ok(changed > 0)
    }

    /// All tasks, newest first
    pub fn get_all_tasks(&self) -> Result<Vec<Task>> {
        self.list_tasks(&[])
    }

    /// Tasks whose agent equals `agent` exactly, newest first
    pub fn get_tasks_by_agent(&self, agent: &str) -> Result<Vec<Task>> {
        self.list_tasks(&[Filter::agent(agent)])
    }

    /// Tasks whose status equals `status` exactly, newest first
    pub fn get_tasks_by_status(&self, status: &TaskStatus) -> Result<Vec<Task>> {
        self.list_tasks(&[Filter::status(status)])
    }

    /// Tasks matching every filter, newest first
    pub fn list_tasks(&self, filters: &[Filter]) -> Result<Vec<Task>> {
        let conn = self.connect()?;
        Self::query_tasks(&conn, filters)
    }

    fn query_tasks(conn: &Connection, filters: &[Filter]) -> Result<Vec<Task>> {
        let sql = format!(
            "SELECT {} FROM {}{} ORDER BY created_at DESC, id DESC",
            Task::columns(),
            Task::table_name(),
            filter::where_clause(filters)
        );

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(filters.iter().map(|f| f.value.as_str())), Task::from_row)?;

        let mut tasks = Vec::new();
        for row in rows {
            tasks.push(row.context("Failed to read task row")?);
        }
        Ok(tasks)
    }

    /// Distinct agent names, sorted
    pub fn agents(&self) -> Result<Vec<String>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare("SELECT DISTINCT agent FROM tasks ORDER BY agent")?;
        let agents = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(agents)
    }

    /// Whether a task with exactly this agent, description and status exists
    pub fn task_exists(&self, agent: &str, description: &str, status: &TaskStatus) -> Result<bool> {
        let conn = self.connect()?;
        let exists: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM tasks WHERE agent = ?1 AND description = ?2 AND status = ?3)",
            params![agent, description, status.as_str()],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    // ========================================================================
    // Goals
    // ========================================================================

    /// Make `goal_text` the current goal
    ///
    /// Retiring the previous goals and inserting the new one happen in one
    /// immediate transaction, so readers never see zero active goals once a
    /// goal has been set.
    pub fn set_goal(&self, goal_text: &str) -> Result<()> {
        Self::validate_text("Goal", goal_text)?;

        let mut conn = self.connect()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let retired = tx.execute("UPDATE goals SET is_active = 0 WHERE is_active = 1", [])?;
        tx.execute(
            "INSERT INTO goals (goal_text, created_at, is_active) VALUES (?1, ?2, 1)",
            params![goal_text, format_datetime(&now())],
        )?;
        tx.commit()?;

        info!(retired, "Set current goal");
        Ok(())
    }

    /// Text of the most recently created active goal
    pub fn get_current_goal(&self) -> Result<Option<String>> {
        let conn = self.connect()?;
        Self::query_current_goal(&conn)
    }

    fn query_current_goal(conn: &Connection) -> Result<Option<String>> {
        let goal = conn
            .query_row(
                "SELECT goal_text FROM goals WHERE is_active = 1 ORDER BY created_at DESC, id DESC LIMIT 1",
                [],
                |row| row.get(0),
            )
            .optional()?;
        Ok(goal)
    }

    /// Every goal ever set, newest first
    pub fn goal_history(&self) -> Result<Vec<Goal>> {
        let conn = self.connect()?;
        let sql = format!(
            "SELECT {} FROM {} ORDER BY created_at DESC, id DESC",
            Goal::columns(),
            Goal::table_name()
        );
        let mut stmt = conn.prepare(&sql)?;
        let goals = stmt
            .query_map([], Goal::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("Failed to read goal rows")?;
        Ok(goals)
    }

    /// Number of goals flagged active (0 or 1)
    pub fn count_active_goals(&self) -> Result<usize> {
        let conn = self.connect()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM goals WHERE is_active = 1", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    // ========================================================================
    // Snapshot
    // ========================================================================

    /// Current goal and all tasks, read inside one transaction
    pub fn snapshot(&self) -> Result<Snapshot> {
        let mut conn = self.connect()?;
        let tx = conn.transaction()?;

        let goal = Self::query_current_goal(&tx)?;
        let tasks = Self::query_tasks(&tx, &[])?;
        tx.commit()?;

        Ok(Snapshot { goal, tasks })
    }

    // ========================================================================
    // Helper methods
    // ========================================================================

    fn validate_text(field: &str, value: &str) -> Result<()> {
        if value.trim().is_empty() {
            return Err(eyre!("{} cannot be empty or whitespace-only", field));
        }
        Ok(())
    }
}
