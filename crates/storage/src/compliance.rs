//! Markdown compliance ledger.
//!
//! The artifact is a Markdown checklist with one `- [ ] <id>` line per task.
//! Marking a task checks its box, tags it with the status and the actor, and
//! appends an audit comment:
//!
//! ```text
//! - [x] MP-3 // COMPLETED - Autonomous Claude
//!
//! <!-- MP-3: COMPLETED by Autonomous Claude at 2026-10-14T09:30:00Z -->
//! ```
//!
//! Checkbox lines are rewritten; audit comments are only ever appended. A line
//! already checked under a note from another actor is rejected untouched.

use async_trait::async_trait;
use autocrew_core::{TaskId, TaskStatus, Time};
use chrono::SecondsFormat;
use regex::Regex;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::debug;

use super::{Ledger, LedgerError, Result};

/// Statuses that can appear in a note written by this ledger.
const NOTE_STATUSES: [TaskStatus; 4] = [
    TaskStatus::Completed,
    TaskStatus::Failed,
    TaskStatus::Running,
    TaskStatus::Pending,
];

/// Configuration for [`ComplianceLedger`].
#[derive(Debug, Clone)]
pub struct LedgerConfig {
    /// Path of the Markdown artifact
    pub path: PathBuf,
    /// Name written into notes and audit comments
    pub actor: String,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("CODE-COMPLIANCE.md"),
            actor: "Autonomous Claude".to_string(),
        }
    }
}

/// File-backed ledger. All writes go through one async mutex.
pub struct ComplianceLedger {
    config: LedgerConfig,
    write_lock: Mutex<()>,
}

impl ComplianceLedger {
    /// Create a ledger for the artifact at `path` with the default actor.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self::with_config(LedgerConfig {
            path: path.as_ref().to_path_buf(),
            ..Default::default()
        })
    }

    /// Create a ledger from a full config.
    pub fn with_config(config: LedgerConfig) -> Self {
        Self {
            config,
            write_lock: Mutex::new(()),
        }
    }

    /// Set the actor name.
    pub fn with_actor(mut self, actor: impl Into<String>) -> Self {
        self.config.actor = actor.into();
        self
    }

    /// Path of the artifact.
    pub fn path(&self) -> &Path {
        &self.config.path
    }

    /// Mark with an explicit timestamp.
    pub async fn mark_at(&self, id: &TaskId, status: TaskStatus, at: Time) -> Result<()> {
        let _guard = self.write_lock.lock().await;

        let content = match fs::read_to_string(&self.config.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(LedgerError::Missing(self.config.path.clone()));
            }
            Err(e) => return Err(e.into()),
        };

        let patched = apply_mark(&content, id, status, &self.config.actor, at)?;
        fs::write(&self.config.path, patched.as_bytes()).await?;

        debug!(task = %id, status = %status, path = %self.config.path.display(), "ledger marked");
        Ok(())
    }

    /// Append an unchecked marker for every id that has none yet, creating the
    /// artifact if needed. Returns how many markers were added.
    pub async fn seed<'a, I>(&self, ids: I) -> Result<usize>
    where
        I: IntoIterator<Item = &'a TaskId>,
    {
        let _guard = self.write_lock.lock().await;

        let mut content = match fs::read_to_string(&self.config.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
            Err(e) => return Err(e.into()),
        };

        let mut added = 0;
        for id in ids {
            if count_markers(&content, id)? > 0 {
                continue;
            }
            if !content.is_empty() && !content.ends_with('\n') {
                content.push('\n');
            }
            content.push_str(&format!("- [ ] {}\n", id));
            added += 1;
        }

        fs::write(&self.config.path, content.as_bytes()).await?;
        Ok(added)
    }
}

#[async_trait]
impl Ledger for ComplianceLedger {
    async fn mark(&self, id: &TaskId, status: TaskStatus) -> Result<()> {
        self.mark_at(id, status, chrono::Utc::now()).await
    }
}

fn unchecked_pattern(id: &TaskId) -> Result<Regex> {
    Ok(Regex::new(&format!(
        r"(?m)^[ \t]*(- \[ \] {})(?:[ \t\r]|$)",
        regex::escape(id.as_str())
    ))?)
}

fn checked_pattern(id: &TaskId) -> Result<Regex> {
    Ok(Regex::new(&format!(
        r"(?m)^[ \t]*(- \[x\] {})(?:[ \t\r]|$)",
        regex::escape(id.as_str())
    ))?)
}

fn count_markers(content: &str, id: &TaskId) -> Result<usize> {
    Ok(unchecked_pattern(id)?.find_iter(content).count()
        + checked_pattern(id)?.find_iter(content).count())
}

fn note(status: TaskStatus, actor: &str) -> String {
    format!("{} - {}", status.label(), actor)
}

/// Rewrite the marker for `id` and append the audit comment.
fn apply_mark(content: &str, id: &TaskId, status: TaskStatus, actor: &str, at: Time) -> Result<String> {
    let unchecked: Vec<_> = unchecked_pattern(id)?
        .captures_iter(content)
        .filter_map(|c| c.get(1).map(|m| m.range()))
        .collect();
    let checked: Vec<_> = checked_pattern(id)?
        .captures_iter(content)
        .filter_map(|c| c.get(1).map(|m| m.range()))
        .collect();

    let checked_token = format!("- [x] {} // {}", id, note(status, actor));
    let patched = match (unchecked.as_slice(), checked.as_slice()) {
        ([], []) => return Err(LedgerError::NotFound(id.clone())),
        ([range], []) => splice(content, range.clone(), &checked_token),
        ([], [range]) => {
            // Already checked: only a note written under this actor may be replaced.
            let rest = &content[range.end..];
            let ours = NOTE_STATUSES
                .iter()
                .map(|s| format!(" // {}", note(*s, actor)))
                .find(|n| {
                    rest.strip_prefix(n.as_str())
                        .is_some_and(|tail| tail.is_empty() || tail.starts_with([' ', '\t', '\r', '\n']))
                });
            match ours {
                Some(old) => splice(content, range.start..range.end + old.len(), &checked_token),
                None => return Err(LedgerError::Foreign(id.clone())),
            }
        }
        _ => return Err(LedgerError::Duplicate(id.clone())),
    };

    let stamp = at.to_rfc3339_opts(SecondsFormat::Secs, true);
    Ok(format!(
        "{}\n<!-- {}: {} by {} at {} -->\n",
        patched,
        id,
        status.label(),
        actor,
        stamp
    ))
}

fn splice(content: &str, range: std::ops::Range<usize>, replacement: &str) -> String {
    let mut out = String::with_capacity(content.len() + replacement.len());
    out.push_str(&content[..range.start]);
    out.push_str(replacement);
    out.push_str(&content[range.end..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at() -> Time {
        chrono::Utc.with_ymd_and_hms(2026, 10, 14, 9, 30, 0).unwrap()
    }

    fn checkbox_lines(content: &str) -> Vec<&str> {
        content.lines().filter(|l| l.trim_start().starts_with("- [")).collect()
    }

    #[test]
    fn test_apply_mark_exact_format() {
        let content = "# Compliance\n- [ ] MP-3\n- [ ] MP-1\n";
        let out = apply_mark(content, &TaskId::from("MP-3"), TaskStatus::Completed, "Autonomous Claude", at()).unwrap();

        assert_eq!(
            out,
            "# Compliance\n- [x] MP-3 // COMPLETED - Autonomous Claude\n- [ ] MP-1\n\n\
             <!-- MP-3: COMPLETED by Autonomous Claude at 2026-10-14T09:30:00Z -->\n"
        );
    }

    #[test]
    fn test_id_prefix_does_not_match() {
        let content = "- [ ] MP-10\n- [ ] MP-1 CSV import\n";
        let out = apply_mark(content, &TaskId::from("MP-1"), TaskStatus::Failed, "bot", at()).unwrap();

        assert_eq!(
            checkbox_lines(&out),
            vec!["- [ ] MP-10", "- [x] MP-1 // FAILED - bot CSV import"]
        );
    }

    #[test]
    fn test_missing_marker() {
        let err = apply_mark("- [ ] MP-10\n", &TaskId::from("MP-1"), TaskStatus::Completed, "bot", at()).unwrap_err();
        assert!(matches!(err, LedgerError::NotFound(id) if id.as_str() == "MP-1"));
    }

    #[test]
    fn test_duplicate_marker() {
        let content = "- [ ] MP-1\n  - [ ] MP-1\n";
        let err = apply_mark(content, &TaskId::from("MP-1"), TaskStatus::Completed, "bot", at()).unwrap_err();
        assert!(matches!(err, LedgerError::Duplicate(_)));
    }

    #[test]
    fn test_checked_note_is_refreshed() {
        let id = TaskId::from("MP-1");
        let failed = apply_mark("- [ ] MP-1\n", &id, TaskStatus::Failed, "bot", at()).unwrap();
        let retried = apply_mark(&failed, &id, TaskStatus::Completed, "bot", at()).unwrap();

        assert_eq!(checkbox_lines(&retried), vec!["- [x] MP-1 // COMPLETED - bot"]);
        assert_eq!(retried.matches("<!-- MP-1:").count(), 2);
    }

    #[test]
    fn test_foreign_checked_line_is_rejected() {
        let content = "- [x] MP-3 // AUTONOMOUS COMPLETION - CLAUDE\n";
        let err = apply_mark(content, &TaskId::from("MP-3"), TaskStatus::Completed, "bot", at()).unwrap_err();
        assert!(matches!(err, LedgerError::Foreign(id) if id.as_str() == "MP-3"));

        let bare = apply_mark("- [x] MP-3\n", &TaskId::from("MP-3"), TaskStatus::Failed, "bot", at()).unwrap_err();
        assert!(matches!(bare, LedgerError::Foreign(_)));
    }

    #[tokio::test]
    async fn test_actor_change_surfaces_error_and_keeps_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("CODE-COMPLIANCE.md");
        fs::write(&path, "- [ ] MP-3\n").await.unwrap();
        let id = TaskId::from("MP-3");

        ComplianceLedger::new(&path).with_actor("bot").mark(&id, TaskStatus::Failed).await.unwrap();
        let after_failure = fs::read_to_string(&path).await.unwrap();

        let err = ComplianceLedger::new(&path)
            .with_actor("ci")
            .mark(&id, TaskStatus::Completed)
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Foreign(_)));

        let content = fs::read_to_string(&path).await.unwrap();
        assert_eq!(content, after_failure);
        assert!(!content.contains("COMPLETED"));
    }

    #[test]
    fn test_crlf_line_endings() {
        let content = "- [ ] MP-3\r\n- [ ] MP-4\r\n";
        let out = apply_mark(content, &TaskId::from("MP-3"), TaskStatus::Completed, "bot", at()).unwrap();
        assert!(out.starts_with("- [x] MP-3 // COMPLETED - bot\r\n- [ ] MP-4\r\n"));
    }

    #[tokio::test]
    async fn test_mark_twice_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("CODE-COMPLIANCE.md");
        fs::write(&path, "# Tasks\n- [ ] MP-3\n- [ ] MP-4\n").await.unwrap();

        let ledger = ComplianceLedger::new(&path);
        let id = TaskId::from("MP-3");

        ledger.mark(&id, TaskStatus::Completed).await.unwrap();
        let first = fs::read_to_string(&path).await.unwrap();
        ledger.mark(&id, TaskStatus::Completed).await.unwrap();
        let second = fs::read_to_string(&path).await.unwrap();

        assert_eq!(checkbox_lines(&first), checkbox_lines(&second));
        assert_eq!(
            checkbox_lines(&second),
            vec!["- [x] MP-3 // COMPLETED - Autonomous Claude", "- [ ] MP-4"]
        );
        assert_eq!(second.matches("<!-- MP-3: COMPLETED by Autonomous Claude at ").count(), 2);
    }

    #[tokio::test]
    async fn test_missing_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = ComplianceLedger::new(dir.path().join("absent.md"));

        let err = ledger.mark(&TaskId::from("MP-3"), TaskStatus::Completed).await.unwrap_err();
        assert!(matches!(err, LedgerError::Missing(_)));
    }

    #[tokio::test]
    async fn test_seed_creates_and_skips_existing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.md");
        fs::write(&path, "# Tasks\n- [x] MP-3 // COMPLETED - bot").await.unwrap();

        let ledger = ComplianceLedger::new(&path).with_actor("bot");
        let ids = [TaskId::from("MP-3"), TaskId::from("MP-1"), TaskId::from("MP-4")];

        assert_eq!(ledger.seed(&ids).await.unwrap(), 2);
        assert_eq!(ledger.seed(&ids).await.unwrap(), 0);

        let content = fs::read_to_string(&path).await.unwrap();
        assert_eq!(
            checkbox_lines(&content),
            vec!["- [x] MP-3 // COMPLETED - bot", "- [ ] MP-1", "- [ ] MP-4"]
        );
    }

    #[tokio::test]
    async fn test_concurrent_marks_are_serialized() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.md");
        let ids: Vec<TaskId> = (0..8).map(|i| TaskId::new(format!("T-{}", i))).collect();

        let ledger = std::sync::Arc::new(ComplianceLedger::new(&path));
        ledger.seed(&ids).await.unwrap();

        let mut handles = Vec::new();
        for id in ids.clone() {
            let ledger = ledger.clone();
            handles.push(tokio::spawn(async move {
                ledger.mark(&id, TaskStatus::Completed).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let content = fs::read_to_string(&path).await.unwrap();
        assert_eq!(content.matches("- [x] T-").count(), 8);
        assert_eq!(content.matches("<!-- T-").count(), 8);
        assert!(!content.contains("- [ ]"));
    }
}
