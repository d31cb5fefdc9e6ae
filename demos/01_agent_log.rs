//! Demo 01: Agent Task Log
//!
//! Two agents report work toward a shared goal, the log is exported as
//! markdown and replayed into a fresh store.
//!
//! Run with: cargo run --example 01_agent_log

use agentlog::{Store, TaskStatus, export_store, migrate};
use eyre::Result;

fn main() -> Result<()> {
    let temp_dir = tempfile::tempdir()?;

    println!("AgentLog Demo");
    println!("=============\n");

    let store = Store::open(temp_dir.path().join("tasks.db"))?;

    // Goal
    store.set_goal("Ship the v1 release")?;
    println!("Current goal: {}\n", store.get_current_goal()?.unwrap_or_default());

    // Agents report work
    let plan = store.add_task("planner", "Split the release into milestones", Some(TaskStatus::Done))?;
    let build = store.add_task("builder", "Fix the flaky integration test", None)?;
    store.add_task("builder", "Write release notes", Some(TaskStatus::NotStarted))?;
    println!("Added tasks {} and {} (plus one more)\n", plan, build);

    store.update_task_status(build, &TaskStatus::Done)?;

    for task in store.get_tasks_by_agent("builder")? {
        println!("  #{} [{}] {}", task.id, task.status, task.description);
    }
    println!();

    // Export and replay into a second store
    let text = export_store(&store)?;
    println!("{}", text);

    let replica = Store::open(temp_dir.path().join("replica.db"))?;
    let count = migrate(&replica, &text)?;
    println!("Migrated {} tasks into the replica", count);
    println!("Replica goal: {}", replica.get_current_goal()?.unwrap_or_default());

    Ok(())
}
