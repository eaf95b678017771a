use anyhow::Result;
use chrono::Utc;
use patchflow_core::runtime_dir;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Operational log writer. Append-only `pipeline.log` in the runtime
/// directory; warnings also go to stderr.
pub struct Observer {
    log_path: PathBuf,
    verbose: bool,
}

impl Observer {
    pub fn new(workspace: &Path) -> Result<Self> {
        let dir = runtime_dir(workspace);
        fs::create_dir_all(&dir)?;
        Ok(Self {
            log_path: dir.join("pipeline.log"),
            verbose: false,
        })
    }

    pub fn set_verbose(&mut self, verbose: bool) {
        self.verbose = verbose;
    }

    pub fn record(&self, event: &str, detail: &str) -> Result<()> {
        self.append_log_line(&format!("{} {event} {detail}", Utc::now().to_rfc3339()))
    }

    /// Stderr output gated on verbose mode.
    pub fn verbose_log(&self, msg: &str) {
        if self.verbose {
            eprintln!("[patchflow] {msg}");
        }
    }

    /// Warnings are always written to the log file and stderr.
    pub fn warn_log(&self, msg: &str) {
        eprintln!("[patchflow WARN] {msg}");
        let _ = self.append_log_line(&format!("{} WARN {msg}", Utc::now().to_rfc3339()));
    }

    fn append_log_line(&self, line: &str) -> Result<()> {
        let mut f = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_path)?;
        writeln!(f, "{line}")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn record_appends_timestamped_lines() {
        let workspace =
            std::env::temp_dir().join(format!("patchflow-observe-test-{}", Uuid::now_v7()));
        fs::create_dir_all(&workspace).expect("workspace");
        let observer = Observer::new(&workspace).expect("observer");
        observer.record("session.create", "mode=action").expect("record");
        observer.record("ai.execute", "attempt=1").expect("record");

        let log = fs::read_to_string(runtime_dir(&workspace).join("pipeline.log")).expect("log");
        let lines: Vec<&str> = log.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("session.create mode=action"));
        assert!(lines[1].contains("ai.execute attempt=1"));
    }
}
