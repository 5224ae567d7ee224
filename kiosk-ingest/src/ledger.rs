use std::collections::HashSet;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Append-only record of batch source files that have already been ingested.
/// Marking a file that is already marked is a no-op, which is what makes
/// repeated batch runs safe: re-running over an unchanged file set does no
/// redundant reads and produces no new downstream writes.
pub trait ProcessedFileLedger: Send + Sync {
    fn contains(&self, file: &str) -> bool;
    fn mark(&self, file: &str) -> Result<(), std::io::Error>;
}

/// Test and dry-run ledger; state lives and dies with the process.
#[derive(Debug, Default)]
pub struct InMemoryLedger {
    seen: Mutex<HashSet<String>>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProcessedFileLedger for InMemoryLedger {
    fn contains(&self, file: &str) -> bool {
        self.seen.lock().expect("ledger lock poisoned").contains(file)
    }

    fn mark(&self, file: &str) -> Result<(), std::io::Error> {
        self.seen
            .lock()
            .expect("ledger lock poisoned")
            .insert(file.to_string());
        Ok(())
    }
}

/// Production ledger: a newline-delimited file, read once at open and
/// appended to on every new mark, so the processed set survives restarts.
/// The file is never rewritten or compacted here.
#[derive(Debug)]
pub struct AppendLogLedger {
    path: PathBuf,
    seen: Mutex<HashSet<String>>,
}

impl AppendLogLedger {
    /// A missing ledger file is a first run, not an error.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, std::io::Error> {
        let path = path.as_ref().to_path_buf();
        let seen = match std::fs::read_to_string(&path) {
            Ok(contents) => contents
                .lines()
                .map(|line| line.trim().to_string())
                .filter(|line| !line.is_empty())
                .collect(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashSet::new(),
            Err(e) => return Err(e),
        };
        Ok(Self {
            path,
            seen: Mutex::new(seen),
        })
    }
}

impl ProcessedFileLedger for AppendLogLedger {
    fn contains(&self, file: &str) -> bool {
        self.seen.lock().expect("ledger lock poisoned").contains(file)
    }

    fn mark(&self, file: &str) -> Result<(), std::io::Error> {
        let mut seen = self.seen.lock().expect("ledger lock poisoned");
        if seen.contains(file) {
            return Ok(());
        }
        let mut log = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(log, "{file}")?;
        seen.insert(file.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_memory_ledger_marks_idempotently() {
        let ledger = InMemoryLedger::new();
        assert!(!ledger.contains("lmnh_hist_data_0.csv"));

        ledger.mark("lmnh_hist_data_0.csv").unwrap();
        ledger.mark("lmnh_hist_data_0.csv").unwrap();

        assert!(ledger.contains("lmnh_hist_data_0.csv"));
        assert!(!ledger.contains("lmnh_hist_data_1.csv"));
    }

    #[test]
    fn append_log_ledger_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("processed_files.txt");

        {
            let ledger = AppendLogLedger::open(&path).unwrap();
            ledger.mark("lmnh_exhibition_0.json").unwrap();
            ledger.mark("lmnh_exhibition_1.json").unwrap();
            ledger.mark("lmnh_exhibition_0.json").unwrap();
        }

        let reopened = AppendLogLedger::open(&path).unwrap();
        assert!(reopened.contains("lmnh_exhibition_0.json"));
        assert!(reopened.contains("lmnh_exhibition_1.json"));
        assert!(!reopened.contains("lmnh_exhibition_2.json"));

        // Re-marking after reopen appends nothing new.
        reopened.mark("lmnh_exhibition_1.json").unwrap();
        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), 2);
    }

    #[test]
    fn append_log_ledger_tolerates_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = AppendLogLedger::open(dir.path().join("absent.txt")).unwrap();
        assert!(!ledger.contains("anything"));
    }
}
