// Markdown interchange format: rendering

use crate::models::{Task, format_date};
use crate::store::Store;
use eyre::{Context, Result};
use fs2::FileExt;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use tracing::info;

/// Goal text rendered when no goal has been set
pub const NO_GOAL_PLACEHOLDER: &str = "No goal set";

/// Render a goal block followed by the task log.
///
/// Tasks are emitted in the order given; pass them as returned by
/// `Store::get_all_tasks` (newest first).
pub fn export(goal: Option<&str>, tasks: &[Task]) -> String {
    let mut out = String::new();

    out.push_str("<goal>\n");
    out.push_str(goal.unwrap_or(NO_GOAL_PLACEHOLDER));
    out.push_str("\n</goal>\n\nTask Log:\n\n");

    for task in tasks {
        out.push_str(&render_task_block(task));
    }

    out
}

/// Render one `<details>` block for a task
pub fn render_task_block(task: &Task) -> String {
    format!(
        "<details>\n<summary>{description}</summary>\n\n\
         **Agent:** {agent}\n\
         **Timestamp:** {date}\n\
         **Description:** {description}\n\
         **Status:** {status}\n\n\
         </details>\n",
        description = task.description,
        agent = task.agent,
        date = format_date(&task.timestamp),
        status = task.status,
    )
}

/// Render the store's current goal and tasks
pub fn export_store(store: &Store) -> Result<String> {
    let snapshot = store.snapshot()?;
    Ok(export(snapshot.goal.as_deref(), &snapshot.tasks))
}

/// Write the store's export to `path`, holding an exclusive lock while writing
pub fn export_to_file(store: &Store, path: &Path) -> Result<usize> {
    let snapshot = store.snapshot()?;
    let text = export(snapshot.goal.as_deref(), &snapshot.tasks);

    let mut file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(false)
        .open(path)
        .with_context(|| format!("Failed to open export file: {}", path.display()))?;

    file.lock_exclusive().context("Failed to acquire file lock")?;

    // Truncate only once the lock is held
    file.set_len(0)?;
    file.write_all(text.as_bytes())?;
    file.sync_all()?;

    info!(path = ?path, tasks = snapshot.tasks.len(), "Exported task log");
    Ok(snapshot.tasks.len())
}
