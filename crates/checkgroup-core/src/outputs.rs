//! Machine-readable tick outputs for downstream pipeline steps.
//!
//! Three keys are published after every tick, each a JSON array of
//! check-runs: `all-checks`, `required-checks` and `unsuccessful-checks`.

use std::fs::OpenOptions;
use std::io::{Seek, SeekFrom, Write};
use std::path::PathBuf;
use std::sync::Mutex;

use crate::domain::CheckRun;
use crate::engine::TickReport;
use crate::error::Result;

pub const ALL_CHECKS: &str = "all-checks";
pub const REQUIRED_CHECKS: &str = "required-checks";
pub const UNSUCCESSFUL_CHECKS: &str = "unsuccessful-checks";

/// Destination for per-tick snapshots.
pub trait OutputSink: Send + Sync {
    fn publish(&self, report: &TickReport) -> Result<()>;
}

/// `(key, json)` pairs for one report.
pub fn encode_outputs(report: &TickReport) -> Result<Vec<(&'static str, String)>> {
    let encode = |checks: &[CheckRun]| serde_json::to_string(checks);
    Ok(vec![
        (ALL_CHECKS, encode(&report.all_checks)?),
        (REQUIRED_CHECKS, encode(&report.required_checks)?),
        (UNSUCCESSFUL_CHECKS, encode(&report.unsuccessful_checks)?),
    ])
}

/// Writes `key=value` lines to a step-output file such as `$GITHUB_OUTPUT`.
///
/// Compact JSON never contains a raw newline, so the single-line form is
/// always safe. Each publish replaces the previous snapshot in place, so a
/// long wait holds one snapshot in the file rather than one per tick.
/// Content written before the first publish is left alone.
#[derive(Debug)]
pub struct StepOutputFile {
    path: PathBuf,
    /// File length before our first write.
    start: Mutex<Option<u64>>,
}

impl StepOutputFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            start: Mutex::new(None),
        }
    }

    /// Sink for the file named by `$GITHUB_OUTPUT`, if set.
    pub fn from_env() -> Option<Self> {
        std::env::var_os("GITHUB_OUTPUT")
            .filter(|p| !p.is_empty())
            .map(Self::new)
    }
}

impl OutputSink for StepOutputFile {
    fn publish(&self, report: &TickReport) -> Result<()> {
        let mut buf = String::new();
        for (key, value) in encode_outputs(report)? {
            buf.push_str(key);
            buf.push('=');
            buf.push_str(&value);
            buf.push('\n');
        }
        let mut start = self
            .start
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(&self.path)?;
        let offset = match *start {
            Some(offset) => offset,
            None => {
                let len = file.metadata()?.len();
                *start = Some(len);
                len
            }
        };
        file.set_len(offset)?;
        file.seek(SeekFrom::Start(offset))?;
        file.write_all(buf.as_bytes())?;
        Ok(())
    }
}

/// Keeps every published report in memory.
#[derive(Debug, Default)]
pub struct MemoryOutputs {
    reports: Mutex<Vec<TickReport>>,
}

impl MemoryOutputs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reports(&self) -> Vec<TickReport> {
        self.reports.lock().map(|r| r.clone()).unwrap_or_default()
    }

    pub fn last(&self) -> Option<TickReport> {
        self.reports().pop()
    }
}

impl OutputSink for MemoryOutputs {
    fn publish(&self, report: &TickReport) -> Result<()> {
        if let Ok(mut reports) = self.reports.lock() {
            reports.push(report.clone());
        }
        Ok(())
    }
}
