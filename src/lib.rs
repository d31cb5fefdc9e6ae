// AgentLog - Shared task log and goal store for multi-agent work

pub mod config;
pub mod filter;
pub mod import;
pub mod markdown;
pub mod models;
pub mod record;
pub mod store;

// Re-export main types for convenience
pub use config::Config;
pub use filter::{Filter, TaskField};
pub use import::{MigrateOptions, MigrationOutcome, MigrationReport, ParsedDocument, TaskEntry, migrate, migrate_file};
pub use markdown::{NO_GOAL_PLACEHOLDER, export, export_store};
pub use models::{Goal, Snapshot, Task, TaskStatus};
pub use record::Record;
pub use store::{Store, StoreOptions};
