//! Command-level logger with a per-template run summary.
use std::path::PathBuf;
use std::sync::Mutex;

use super::subscriber::{DRY_RUN_TARGET, STAGE_TARGET};
use super::utils::log_file_path;

/// Outcome of processing one template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    /// Processed cleanly.
    Ok,
    /// Processed with validation or prerequisite warnings.
    Warned,
    /// Skipped by a prerequisite.
    Skipped,
    /// Failed with an error.
    Failed,
}

/// One template's outcome for the summary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunEntry {
    /// Template name or path.
    pub name: String,
    /// Outcome.
    pub status: RunStatus,
    /// Optional detail (warning count, error text).
    pub message: Option<String>,
}

/// Logger handed to command handlers.
///
/// Messages go through `tracing`, so they reach both the console and the
/// log file installed by [`init_subscriber`](super::init_subscriber).
#[derive(Debug)]
pub struct Logger {
    entries: Mutex<Vec<RunEntry>>,
    log_file: Option<PathBuf>,
}

impl Logger {
    /// Logger for `command`; remembers the log file path for the summary.
    #[must_use]
    pub fn new(command: &str) -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
            log_file: log_file_path(command),
        }
    }

    /// Log file path, if the cache directory is available.
    #[must_use]
    pub const fn log_path(&self) -> Option<&PathBuf> {
        self.log_file.as_ref()
    }

    /// Stage header.
    pub fn stage(&self, msg: &str) {
        tracing::info!(target: STAGE_TARGET, "{msg}");
    }

    /// Informational message.
    pub fn info(&self, msg: &str) {
        tracing::info!("{msg}");
    }

    /// Debug message; console only when verbose, file always.
    pub fn debug(&self, msg: &str) {
        tracing::debug!("{msg}");
    }

    /// Warning.
    pub fn warn(&self, msg: &str) {
        tracing::warn!("{msg}");
    }

    /// Error.
    pub fn error(&self, msg: &str) {
        tracing::error!("{msg}");
    }

    /// Something a `--what-if` run would have done.
    pub fn dry_run(&self, msg: &str) {
        tracing::info!(target: DRY_RUN_TARGET, "{msg}");
    }

    /// Record a template outcome for the summary.
    pub fn record(&self, name: &str, status: RunStatus, message: Option<&str>) {
        if let Ok(mut guard) = self.entries.lock() {
            guard.push(RunEntry {
                name: name.to_string(),
                status,
                message: message.map(String::from),
            });
        }
    }

    /// Recorded outcomes, in recording order.
    #[must_use]
    pub fn entries(&self) -> Vec<RunEntry> {
        self.entries.lock().map_or_else(|_| vec![], |g| g.clone())
    }

    /// Number of failed templates.
    #[must_use]
    pub fn failure_count(&self) -> usize {
        self.entries.lock().map_or(0, |guard| {
            guard
                .iter()
                .filter(|e| e.status == RunStatus::Failed)
                .count()
        })
    }

    /// Log the summary of recorded outcomes. No-op when nothing was recorded.
    pub fn print_summary(&self) {
        let entries = self.entries();
        if entries.is_empty() {
            return;
        }
        self.stage("Summary");

        let (mut ok, mut warned, mut skipped, mut failed) = (0u32, 0u32, 0u32, 0u32);
        for entry in &entries {
            let (icon, color) = match entry.status {
                RunStatus::Ok => {
                    ok += 1;
                    ("✓", "\x1b[32m")
                }
                RunStatus::Warned => {
                    warned += 1;
                    ("!", "\x1b[33m")
                }
                RunStatus::Skipped => {
                    skipped += 1;
                    ("○", "\x1b[2m")
                }
                RunStatus::Failed => {
                    failed += 1;
                    ("✗", "\x1b[31m")
                }
            };
            let suffix = entry
                .message
                .as_ref()
                .map_or_else(String::new, |msg| format!(" ({msg})"));
            self.info(&format!("{color}{icon} {}{suffix}\x1b[0m", entry.name));
        }

        let total = ok + warned + skipped + failed;
        self.info(&format!(
            "{total} templates: \x1b[32m{ok} ok\x1b[0m, \x1b[33m{warned} warned\x1b[0m, \x1b[2m{skipped} skipped\x1b[0m, \x1b[31m{failed} failed\x1b[0m"
        ));
        if let Some(path) = &self.log_file {
            self.info(&format!("\x1b[2mlog: {}\x1b[0m", path.display()));
        }
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::logging::isolated_logger;
    use std::fs;

    fn file_contents(log: &Logger) -> String {
        fs::read_to_string(log.log_path().expect("log path")).unwrap()
    }

    #[test]
    fn starts_empty() {
        let (log, _tmp, _guard) = isolated_logger();
        assert!(log.entries().is_empty());
        assert_eq!(log.failure_count(), 0);
    }

    #[test]
    fn record_keeps_order_and_message() {
        let (log, _tmp, _guard) = isolated_logger();
        log.record("theme", RunStatus::Ok, None);
        log.record("fonts", RunStatus::Skipped, Some("prerequisite 'pwsh' not met"));
        let entries = log.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].name, "theme");
        assert_eq!(
            entries[1].message.as_deref(),
            Some("prerequisite 'pwsh' not met")
        );
    }

    #[test]
    fn failure_count_counts_failed_only() {
        let (log, _tmp, _guard) = isolated_logger();
        log.record("a", RunStatus::Ok, None);
        log.record("b", RunStatus::Failed, Some("bad regex"));
        log.record("c", RunStatus::Warned, None);
        log.record("d", RunStatus::Failed, None);
        assert_eq!(log.failure_count(), 2);
    }

    #[test]
    fn log_file_is_created_with_header() {
        let (log, _tmp, _guard) = isolated_logger();
        let contents = file_contents(&log);
        assert!(contents.contains("recovery"));
        assert!(contents.contains("test"));
    }

    #[test]
    fn levels_are_tagged_in_file() {
        let (log, _tmp, _guard) = isolated_logger();
        log.debug("debug-marker");
        log.warn("warn-marker");
        log.error("error-marker");
        log.stage("stage-marker");
        log.dry_run("dry-run-marker");
        let contents = file_contents(&log);
        assert!(contents.contains("[debug] debug-marker"));
        assert!(contents.contains("[warn] warn-marker"));
        assert!(contents.contains("[error] error-marker"));
        assert!(contents.contains("==> stage-marker"));
        assert!(contents.contains("[dry run] dry-run-marker"));
    }

    #[test]
    fn summary_is_written_without_ansi() {
        let (log, _tmp, _guard) = isolated_logger();
        log.record("theme", RunStatus::Ok, None);
        log.record("fonts", RunStatus::Failed, Some("boom"));
        log.print_summary();
        let contents = file_contents(&log);
        assert!(contents.contains("==> Summary"));
        assert!(contents.contains("✗ fonts (boom)"));
        assert!(contents.contains("2 templates: 1 ok, 0 warned, 0 skipped, 1 failed"));
        assert!(!contents.contains('\x1b'));
    }
}
