use agentlog::models::format_date;
use agentlog::{
    Config, Filter, MigrateOptions, MigrationOutcome, Store, Task, TaskStatus, markdown, migrate_file,
};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use eyre::Result;
use std::path::PathBuf;
use tracing::warn;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "agentlog")]
#[command(about = "AgentLog CLI - Shared task log and goal store for multi-agent work")]
#[command(version = env!("GIT_DESCRIBE"))]
struct Cli {
    /// Path to the task database (overrides the config file)
    #[arg(short, long)]
    db: Option<PathBuf>,

    /// Path to a YAML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Add a new task
    Add {
        /// Agent identifier
        agent: String,
        /// Task description
        description: String,
        /// Task status
        #[arg(long, default_value = "In Progress")]
        status: String,
    },

    /// List tasks, newest first
    List {
        /// Only tasks from this agent
        #[arg(long)]
        agent: Option<String>,
        /// Only tasks with this status
        #[arg(long)]
        status: Option<String>,
        #[arg(long, value_enum, default_value_t = Format::Table)]
        format: Format,
    },

    /// Update task status
    Update {
        task_id: i64,
        status: String,
    },

    /// Edit task description or agent
    Edit {
        task_id: i64,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        agent: Option<String>,
    },

    /// Delete a task
    Delete {
        task_id: i64,
    },

    /// Goal management
    Goal {
        #[command(subcommand)]
        command: GoalCommands,
    },

    /// Export goal and tasks as markdown
    Export {
        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Migrate tasks from a markdown task log
    Migrate {
        /// Source document (default: from config)
        file: Option<PathBuf>,
        /// Skip tasks that already exist with the same agent, description and status
        #[arg(long)]
        dedup: bool,
    },
}

#[derive(Subcommand)]
enum GoalCommands {
    /// Set the current goal
    Set { goal_text: String },
    /// Print the current goal
    Get,
    /// Print every goal, newest first
    History,
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Table,
    Markdown,
    Json,
}

fn main() -> Result<()> {
    // Logs go to stderr so exports on stdout stay clean
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = Config::load(cli.config.as_deref())?;
    let db_path = cli.db.clone().unwrap_or_else(|| config.database.clone());
    let store = Store::open_with(&db_path, config.store_options())?;

    match cli.command {
        Commands::Add {
            agent,
            description,
            status,
        } => {
            let id = store.add_task(&agent, &description, Some(parse_status(&status)))?;
            println!("Task added with ID: {}", id);
        }
        Commands::List { agent, status, format } => {
            let mut filters = Vec::new();
            if let Some(agent) = agent {
                filters.push(Filter::agent(agent));
            }
            if let Some(status) = status {
                filters.push(Filter::status(&TaskStatus::parse(&status)));
            }
            let tasks = store.list_tasks(&filters)?;

            match format {
                Format::Table => print_tasks_table(&tasks),
                Format::Markdown => print_tasks_markdown(&tasks),
                Format::Json => println!("{}", serde_json::to_string_pretty(&tasks)?),
            }
        }
        Commands::Update { task_id, status } => {
            if store.update_task_status(task_id, &parse_status(&status))? {
                println!("Task {} updated to '{}'", task_id, status);
            } else {
                println!("Task {} not found", task_id);
            }
        }
        Commands::Edit {
            task_id,
            description,
            agent,
        } => {
            if description.is_none() && agent.is_none() {
                println!("Nothing to change: pass --description and/or --agent");
                return Ok(());
            }
            let mut found = true;
            if let Some(description) = description {
                found &= store.update_task_description(task_id, &description)?;
            }
            if let Some(agent) = agent {
                found &= store.update_task_agent(task_id, &agent)?;
            }
            if found {
                println!("Task {} updated", task_id);
            } else {
                println!("Task {} not found", task_id);
            }
        }
        Commands::Delete { task_id } => {
            if store.delete_task(task_id)? {
                println!("Task {} deleted", task_id);
            } else {
                println!("Task {} not found", task_id);
            }
        }
        Commands::Goal { command } => match command {
            GoalCommands::Set { goal_text } => {
                store.set_goal(&goal_text)?;
                println!("Goal updated");
            }
            GoalCommands::Get => {
                let goal = store.get_current_goal()?;
                println!("{}", goal.as_deref().unwrap_or(markdown::NO_GOAL_PLACEHOLDER));
            }
            GoalCommands::History => {
                for goal in store.goal_history()? {
                    let marker = if goal.is_active { "*" } else { " " };
                    println!(
                        "{} {} {}",
                        marker,
                        goal.created_at.format("%Y-%m-%d %H:%M:%S"),
                        goal.goal_text
                    );
                }
            }
        },
        Commands::Export { output } => match output {
            Some(path) => {
                markdown::export_to_file(&store, &path)?;
                println!("Tasks exported to {}", path.display());
            }
            None => print!("{}", markdown::export_store(&store)?),
        },
        Commands::Migrate { file, dedup } => {
            let source = file.unwrap_or_else(|| config.migrate_source.clone());
            match migrate_file(&store, &source, &MigrateOptions { dedup })? {
                MigrationOutcome::Migrated(report) => {
                    if let Some(goal) = &report.goal {
                        println!("Migrated goal: {}", goal);
                    }
                    println!("Migrated {} tasks from {}", report.tasks_added, source.display());
                    if report.duplicates > 0 {
                        println!("Skipped {} duplicate tasks", report.duplicates);
                    }
                }
                MigrationOutcome::SourceMissing(path) => {
                    println!("{} not found", path.display());
                }
            }
        }
    }

    Ok(())
}

/// Parse a status from the command line, warning about non-standard values
fn parse_status(text: &str) -> TaskStatus {
    let status = TaskStatus::parse(text);
    if !status.is_known() {
        warn!(status = %status, "Not one of Not Started / In Progress / Done, storing as-is");
    }
    status
}

fn print_tasks_table(tasks: &[Task]) {
    if tasks.is_empty() {
        println!("No tasks found.");
        return;
    }

    println!("{:<4} {:<12} {:<12} {:<15} Description", "ID", "Agent", "Date", "Status");
    println!("{}", "-".repeat(80));

    for task in tasks {
        // Pad before coloring so escape codes don't break alignment
        let status = format!("{:<15}", task.status.as_str());
        let status = match task.status {
            TaskStatus::Done => status.green(),
            TaskStatus::InProgress => status.yellow(),
            TaskStatus::NotStarted => status.red(),
            TaskStatus::Custom(_) => status.normal(),
        };
        println!(
            "{:<4} {:<12} {:<12} {} {}",
            task.id,
            task.agent,
            format_date(&task.timestamp),
            status,
            truncate(&task.description, 40)
        );
    }
}

fn print_tasks_markdown(tasks: &[Task]) {
    if tasks.is_empty() {
        println!("No tasks found.");
        return;
    }

    for task in tasks {
        print!("{}", markdown::render_task_block(task));
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() > max_chars {
        let head: String = text.chars().take(max_chars).collect();
        format!("{}...", head)
    } else {
        text.to_string()
    }
}
