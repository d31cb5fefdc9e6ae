// Markdown interchange format: tolerant parsing and migration into a store
//
// The scanner works line by line. A task entry is a `<details>` block that
// carries the four labeled fields in any order, with any amount of other
// text between them. Blocks that lack a field are dropped.

use crate::markdown::NO_GOAL_PLACEHOLDER;
use crate::models::TaskStatus;
use crate::store::Store;
use eyre::{Context, Result};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const GOAL_OPEN: &str = "<goal>";
const GOAL_CLOSE: &str = "</goal>";
const DETAILS_OPEN: &str = "<details";
const DETAILS_CLOSE: &str = "</details>";
const SUMMARY_OPEN: &str = "<summary>";
const SUMMARY_CLOSE: &str = "</summary>";

const AGENT_LABEL: &str = "**Agent:**";
const TIMESTAMP_LABEL: &str = "**Timestamp:**";
const DESCRIPTION_LABEL: &str = "**Description:**";
const STATUS_LABEL: &str = "**Status:**";

/// One task entry recovered from a document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskEntry {
    /// `<summary>` text, if the block had one. Not used for migration.
    pub summary: Option<String>,
    pub agent: String,
    /// Date text as written in the source. Not used for migration.
    pub timestamp: String,
    pub description: String,
    pub status: TaskStatus,
}

/// Goal and task entries recovered from a document
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedDocument {
    pub goal: Option<String>,
    /// Entries in document order
    pub entries: Vec<TaskEntry>,
}

/// Parse an interchange document, skipping anything malformed
pub fn parse(document: &str) -> ParsedDocument {
    let (goal, rest) = split_goal(document);
    let entries = scan_entries(&rest);

    debug!(has_goal = goal.is_some(), entries = entries.len(), "Parsed document");
    ParsedDocument { goal, entries }
}

/// Pull the goal block out of the document.
///
/// Returns the trimmed goal (none when missing, empty, or the export
/// placeholder) and the document with the goal block removed.
fn split_goal(document: &str) -> (Option<String>, String) {
    let Some(start) = document.find(GOAL_OPEN) else {
        return (None, document.to_string());
    };
    let body_start = start + GOAL_OPEN.len();
    let Some(body_len) = document[body_start..].find(GOAL_CLOSE) else {
        return (None, document.to_string());
    };
    let body_end = body_start + body_len;

    let text = document[body_start..body_end].trim();
    let goal = (!text.is_empty() && text != NO_GOAL_PLACEHOLDER).then(|| text.to_string());

    let rest = format!("{}\n{}", &document[..start], &document[body_end + GOAL_CLOSE.len()..]);
    (goal, rest)
}

fn scan_entries(text: &str) -> Vec<TaskEntry> {
    let mut entries = Vec::new();
    let mut current: Option<BlockFields> = None;

    for (line_num, raw) in text.lines().enumerate() {
        let line = raw.trim();

        if let Some(after) = details_open(line) {
            // A new block implicitly closes an unterminated one
            if let Some(block) = current.take() {
                finish_block(block, line_num, &mut entries);
            }
            let mut block = BlockFields::default();
            block.absorb(after.trim());
            current = Some(block);
        } else if line.starts_with(DETAILS_CLOSE) {
            if let Some(block) = current.take() {
                finish_block(block, line_num + 1, &mut entries);
            }
        } else if let Some(block) = current.as_mut() {
            block.absorb(line);
        }
    }

    // Truncated input: keep the last block if it is complete
    if let Some(block) = current.take() {
        finish_block(block, text.lines().count(), &mut entries);
    }

    entries
}

fn finish_block(block: BlockFields, line: usize, entries: &mut Vec<TaskEntry>) {
    match block.into_entry() {
        Some(entry) => entries.push(entry),
        None => debug!(line, "Skipping malformed task entry"),
    }
}

/// If `line` opens a `<details>` block, return the text after the tag
fn details_open(line: &str) -> Option<&str> {
    let rest = line.strip_prefix(DETAILS_OPEN)?;
    if let Some(after) = rest.strip_prefix('>') {
        return Some(after);
    }
    // `<details open>` and similar attribute forms
    if rest.starts_with(char::is_whitespace) {
        return rest.find('>').map(|i| &rest[i + 1..]);
    }
    None
}

/// Field values collected while inside one block
#[derive(Debug, Default)]
struct BlockFields {
    summary: Option<String>,
    agent: Option<String>,
    timestamp: Option<String>,
    description: Option<String>,
    status: Option<String>,
}

impl BlockFields {
    fn absorb(&mut self, line: &str) {
        let slots = [
            (AGENT_LABEL, &mut self.agent),
            (TIMESTAMP_LABEL, &mut self.timestamp),
            (DESCRIPTION_LABEL, &mut self.description),
            (STATUS_LABEL, &mut self.status),
        ];
        for (label, slot) in slots {
            if let Some(value) = line.strip_prefix(label) {
                first_wins(slot, value);
                return;
            }
        }

        if let Some(body) = line.strip_prefix(SUMMARY_OPEN) {
            let body = body.find(SUMMARY_CLOSE).map_or(body, |end| &body[..end]);
            first_wins(&mut self.summary, body);
        }
    }

    fn into_entry(self) -> Option<TaskEntry> {
        let agent = self.agent.filter(|a| !a.is_empty())?;
        let description = self.description.filter(|d| !d.is_empty())?;
        let timestamp = self.timestamp?;
        let status = match self.status?.as_str() {
            "" => TaskStatus::default(),
            s => TaskStatus::parse(s),
        };

        Some(TaskEntry {
            summary: self.summary,
            agent,
            timestamp,
            description,
            status,
        })
    }
}

fn first_wins(slot: &mut Option<String>, value: &str) {
    if slot.is_none() {
        *slot = Some(value.trim().to_string());
    }
}

// ============================================================================
// Migration
// ============================================================================

/// Migration behavior switches
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrateOptions {
    /// Skip entries whose agent, description and status already exist in
    /// the store. Off by default: plain migration duplicates on re-run.
    pub dedup: bool,
}

/// What a migration wrote
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationReport {
    /// Goal that was set, if the document had one
    pub goal: Option<String>,
    pub tasks_added: usize,
    /// Entries skipped by `MigrateOptions::dedup`
    pub duplicates: usize,
}

/// Result of migrating from a file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MigrationOutcome {
    Migrated(MigrationReport),
    /// The source file does not exist; nothing was written
    SourceMissing(PathBuf),
}

/// Replay a document into the store and return the number of tasks added
///
/// Source ids and timestamps are discarded; the store assigns fresh ones.
/// Running this twice on the same document adds every task twice.
pub fn migrate(store: &Store, document: &str) -> Result<usize> {
    let report = migrate_with(store, document, &MigrateOptions::default())?;
    Ok(report.tasks_added)
}

/// Replay a document into the store with explicit options
pub fn migrate_with(store: &Store, document: &str, options: &MigrateOptions) -> Result<MigrationReport> {
    let parsed = parse(document);
    let mut report = MigrationReport::default();

    if let Some(goal) = parsed.goal {
        store.set_goal(&goal)?;
        info!(goal = %goal, "Migrated goal");
        report.goal = Some(goal);
    }

    // Documents list newest first; replay oldest first so a re-export keeps the order
    for entry in parsed.entries.iter().rev() {
        if options.dedup && store.task_exists(&entry.agent, &entry.description, &entry.status)? {
            debug!(agent = %entry.agent, "Skipping duplicate task entry");
            report.duplicates += 1;
            continue;
        }

        store.add_task(&entry.agent, &entry.description, Some(entry.status.clone()))?;
        report.tasks_added += 1;
    }

    info!(
        tasks = report.tasks_added,
        duplicates = report.duplicates,
        "Migration complete"
    );
    Ok(report)
}

/// Read `path` and migrate it. A missing file is reported, not an error.
pub fn migrate_file(store: &Store, path: &Path, options: &MigrateOptions) -> Result<MigrationOutcome> {
    let document = match fs::read_to_string(path) {
        Ok(document) => document,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            warn!(path = ?path, "Migration source not found");
            return Ok(MigrationOutcome::SourceMissing(path.to_path_buf()));
        }
        Err(e) => {
            return Err(e).with_context(|| format!("Failed to read migration source: {}", path.display()));
        }
    };

    let report = migrate_with(store, &document, options)?;
    Ok(MigrationOutcome::Migrated(report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markdown::export_store;
    use tempfile::TempDir;

    fn open_store(temp: &TempDir) -> Store {
        Store::open(temp.path().join("tasks.db")).unwrap()
    }

    const LEGACY: &str = "\
# Team notes

<goal>
  Ship the importer
</goal>

Task Log:

<details>
<summary>Fix login</summary>

**Agent:** alice
**Timestamp:** 2024-01-02
**Description:** Fix login redirect
**Status:** Done

</details>
random chatter between blocks
<details>
<summary>Half written</summary>
**Agent:** bob
**Description:** no status or timestamp here
</details>
<details>
<summary>Docs</summary>


**Agent:** carol

some stray line
**Timestamp:** 2024-01-01
**Description:** Write docs
**Status:** Waiting on review
</details>
";

    #[test]
    fn test_parse_legacy_document() {
        let parsed = parse(LEGACY);
        assert_eq!(parsed.goal.as_deref(), Some("Ship the importer"));
        assert_eq!(parsed.entries.len(), 2);

        let first = &parsed.entries[0];
        assert_eq!(first.summary.as_deref(), Some("Fix login"));
        assert_eq!(first.agent, "alice");
        assert_eq!(first.timestamp, "2024-01-02");
        assert_eq!(first.description, "Fix login redirect");
        assert_eq!(first.status, TaskStatus::Done);

        let second = &parsed.entries[1];
        assert_eq!(second.agent, "carol");
        assert_eq!(second.status.as_str(), "Waiting on review");
    }

    #[test]
    fn test_parse_out_of_order_labels() {
        let doc = "<details>\n**Status:** Done\n**Description:** d\n**Timestamp:** t\n**Agent:** a\n</details>\n";
        let parsed = parse(doc);
        assert_eq!(parsed.entries.len(), 1);
        assert_eq!(parsed.entries[0].agent, "a");
        assert_eq!(parsed.entries[0].status, TaskStatus::Done);
        assert!(parsed.entries[0].summary.is_none());
    }

    #[test]
    fn test_parse_duplicated_labels_first_wins() {
        let doc = "<details>\n<summary>s</summary>\n**Agent:** first\n**Agent:** second\n\
                   **Timestamp:** t\n**Description:** d\n**Status:** Not Started\n**Status:** Done\n</details>";
        let parsed = parse(doc);
        assert_eq!(parsed.entries.len(), 1);
        assert_eq!(parsed.entries[0].agent, "first");
        assert_eq!(parsed.entries[0].status, TaskStatus::NotStarted);
    }

    #[test]
    fn test_parse_fields_do_not_leak_across_blocks() {
        let doc = "<details>\n**Agent:** a\n**Timestamp:** t\n</details>\n\
                   <details>\n**Description:** d\n**Status:** Done\n</details>\n";
        assert!(parse(doc).entries.is_empty());
    }

    #[test]
    fn test_parse_unterminated_blocks() {
        let doc = "<details>\n**Agent:** a\n**Timestamp:** t\n**Description:** one\n**Status:** Done\n\
                   <details>\n**Agent:** b\n**Timestamp:** t\n**Description:** two\n**Status:** Done";
        let parsed = parse(doc);
        let descriptions: Vec<&str> = parsed.entries.iter().map(|e| e.description.as_str()).collect();
        assert_eq!(descriptions, vec!["one", "two"]);
    }

    #[test]
    fn test_parse_crlf_and_indentation() {
        let doc = "<goal>\r\nG\r\n</goal>\r\n<details open>\r\n  <summary>x</summary>\r\n  **Agent:** a\r\n  \
                   **Timestamp:** t\r\n  **Description:** d\r\n  **Status:** \r\n</details>\r\n";
        let parsed = parse(doc);
        assert_eq!(parsed.goal.as_deref(), Some("G"));
        assert_eq!(parsed.entries.len(), 1);
        assert_eq!(parsed.entries[0].summary.as_deref(), Some("x"));
        // Empty status falls back to the default
        assert_eq!(parsed.entries[0].status, TaskStatus::InProgress);
    }

    #[test]
    fn test_label_values_may_contain_summary_tag() {
        let doc = "<details>\n<summary>wrap output in a <summary> tag</summary>\n\
                   **Agent:** <summary>bot\n**Timestamp:** t\n\
                   **Description:** wrap output in a <summary> tag\n**Status:** Done\n</details>";
        let parsed = parse(doc);
        assert_eq!(parsed.entries.len(), 1);
        assert_eq!(parsed.entries[0].agent, "<summary>bot");
        assert_eq!(parsed.entries[0].description, "wrap output in a <summary> tag");
        assert_eq!(parsed.entries[0].summary.as_deref(), Some("wrap output in a <summary> tag"));
    }

    #[test]
    fn test_roundtrip_values_with_summary_tag() {
        let temp = TempDir::new().unwrap();
        let source = Store::open(temp.path().join("source.db")).unwrap();
        source.add_task("bot1", "wrap output in a <summary> tag", None).unwrap();
        source.add_task("<summary>bot", "plain description", Some(TaskStatus::Done)).unwrap();

        let target = Store::open(temp.path().join("target.db")).unwrap();
        assert_eq!(migrate(&target, &export_store(&source).unwrap()).unwrap(), 2);

        let tasks = target.get_all_tasks().unwrap();
        assert_eq!(tasks[0].agent, "<summary>bot");
        assert_eq!(tasks[1].description, "wrap output in a <summary> tag");
    }

    #[test]
    fn test_parse_skips_empty_agent() {
        let doc = "<details>\n**Agent:**\n**Timestamp:** t\n**Description:** d\n**Status:** Done\n</details>";
        assert!(parse(doc).entries.is_empty());
    }

    #[test]
    fn test_parse_goal_variants() {
        assert_eq!(parse("no goal block at all").goal, None);
        assert_eq!(parse("<goal>\n   \n</goal>").goal, None);
        assert_eq!(parse("<goal>\nNo goal set\n</goal>").goal, None);
        assert_eq!(parse("<goal>unterminated").goal, None);
        assert_eq!(parse("<goal>inline</goal>").goal.as_deref(), Some("inline"));
    }

    #[test]
    fn test_details_open() {
        assert_eq!(details_open("<details>"), Some(""));
        assert_eq!(details_open("<details><summary>x</summary>"), Some("<summary>x</summary>"));
        assert_eq!(details_open("<details open>"), Some(""));
        assert_eq!(details_open("<detailsx>"), None);
        assert_eq!(details_open("</details>"), None);
    }

    #[test]
    fn test_migrate_counts_only_wellformed() {
        let temp = TempDir::new().unwrap();
        let store = open_store(&temp);

        let count = migrate(&store, LEGACY).unwrap();
        assert_eq!(count, 2);
        assert_eq!(store.get_current_goal().unwrap().as_deref(), Some("Ship the importer"));
        assert_eq!(store.get_tasks_by_agent("bob").unwrap().len(), 0);
    }

    #[test]
    fn test_migrate_without_goal_leaves_goal_unset() {
        let temp = TempDir::new().unwrap();
        let store = open_store(&temp);

        let doc = "<details>\n**Agent:** a\n**Timestamp:** t\n**Description:** d\n**Status:** Done\n</details>";
        assert_eq!(migrate(&store, doc).unwrap(), 1);
        assert!(store.get_current_goal().unwrap().is_none());
    }

    #[test]
    fn test_export_then_migrate_roundtrip() {
        let temp = TempDir::new().unwrap();
        let source = Store::open(temp.path().join("source.db")).unwrap();
        source.set_goal("ship v1").unwrap();
        source.add_task("bot1", "fix bug", Some(TaskStatus::Done)).unwrap();
        source.add_task("bot2", "write docs", None).unwrap();
        source.add_task("bot1", "triage", Some(TaskStatus::parse("Blocked"))).unwrap();

        let text = export_store(&source).unwrap();

        let target = Store::open(temp.path().join("target.db")).unwrap();
        assert_eq!(migrate(&target, &text).unwrap(), 3);
        assert_eq!(target.get_current_goal().unwrap().as_deref(), Some("ship v1"));

        let fields = |store: &Store| -> Vec<(String, String, String)> {
            store
                .get_all_tasks()
                .unwrap()
                .into_iter()
                .map(|t| (t.agent, t.description, t.status.to_string()))
                .collect()
        };
        assert_eq!(fields(&target), fields(&source));
    }

    #[test]
    fn test_export_of_empty_store_migrates_to_nothing() {
        let temp = TempDir::new().unwrap();
        let source = Store::open(temp.path().join("source.db")).unwrap();
        let target = Store::open(temp.path().join("target.db")).unwrap();

        assert_eq!(migrate(&target, &export_store(&source).unwrap()).unwrap(), 0);
        assert!(target.get_current_goal().unwrap().is_none());
    }

    #[test]
    fn test_migrate_is_not_idempotent() {
        let temp = TempDir::new().unwrap();
        let store = open_store(&temp);

        assert_eq!(migrate(&store, LEGACY).unwrap(), 2);
        assert_eq!(migrate(&store, LEGACY).unwrap(), 2);
        assert_eq!(store.get_all_tasks().unwrap().len(), 4);
        assert_eq!(store.count_active_goals().unwrap(), 1);
        assert_eq!(store.goal_history().unwrap().len(), 2);
    }

    #[test]
    fn test_migrate_dedup_skips_existing() {
        let temp = TempDir::new().unwrap();
        let store = open_store(&temp);
        let options = MigrateOptions { dedup: true };

        let first = migrate_with(&store, LEGACY, &options).unwrap();
        assert_eq!(first.tasks_added, 2);
        assert_eq!(first.duplicates, 0);

        let second = migrate_with(&store, LEGACY, &options).unwrap();
        assert_eq!(second.tasks_added, 0);
        assert_eq!(second.duplicates, 2);
        assert_eq!(store.get_all_tasks().unwrap().len(), 2);
    }

    #[test]
    fn test_migrate_file_missing_is_distinct() {
        let temp = TempDir::new().unwrap();
        let store = open_store(&temp);
        let missing = temp.path().join("comunication.md");

        let outcome = migrate_file(&store, &missing, &MigrateOptions::default()).unwrap();
        assert_eq!(outcome, MigrationOutcome::SourceMissing(missing));
    }

    #[test]
    fn test_migrate_file_empty_document() {
        let temp = TempDir::new().unwrap();
        let store = open_store(&temp);
        let path = temp.path().join("empty.md");
        fs::write(&path, "").unwrap();

        let outcome = migrate_file(&store, &path, &MigrateOptions::default()).unwrap();
        assert_eq!(outcome, MigrationOutcome::Migrated(MigrationReport::default()));
    }

    #[test]
    fn test_migrate_file_unreadable_is_error() {
        let temp = TempDir::new().unwrap();
        let store = open_store(&temp);

        // A directory can't be read as a document
        assert!(migrate_file(&store, temp.path(), &MigrateOptions::default()).is_err());
    }
}
