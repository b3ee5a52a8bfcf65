//! Bounded history of `run` invocations.
//!
//! The ledger is a plain ordered list of entries. Every operation on it returns
//! a new [`Ledger`]; [`HistoryStore`] reads it from and writes it to disk.

use crate::error::HistoryError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Name of the tool as it appears on a command line.
pub const PROGRAM: &str = "runmd";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Status {
    Success,
    Fail,
}

impl From<bool> for Status {
    fn from(success: bool) -> Self {
        if success { Status::Success } else { Status::Fail }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Success => write!(f, "SUCCESS"),
            Status::Fail => write!(f, "FAIL"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: u64,
    /// ISO-8601 local timestamp.
    pub date: String,
    pub command: String,
    pub status: Status,
}

impl fmt::Display for HistoryEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {} {}", self.id, self.date, self.command, self.status)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Ledger {
    entries: Vec<HistoryEntry>,
}

impl Ledger {
    pub fn new(entries: Vec<HistoryEntry>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Id the next appended entry receives.
    pub fn next_id(&self) -> u64 {
        self.entries.last().map_or(0, |last| last.id + 1)
    }

    /// Record `command` with the current local time, keeping at most `max` entries.
    pub fn append(&self, command: &str, success: bool, max: usize) -> Ledger {
        let date = chrono::Local::now()
            .naive_local()
            .format("%Y-%m-%dT%H:%M:%S%.6f")
            .to_string();
        self.append_at(command, success, max, date)
    }

    /// Like [`Ledger::append`] with an explicit timestamp.
    pub fn append_at(&self, command: &str, success: bool, max: usize, date: String) -> Ledger {
        let mut entries = self.entries.clone();
        entries.push(HistoryEntry {
            id: self.next_id(),
            date,
            command: normalize_command(command),
            status: success.into(),
        });
        Ledger {
            entries: truncate(entries, max),
        }
    }

    /// Command line recorded under `id`.
    pub fn command_for(&self, id: u64) -> Result<&str, HistoryError> {
        self.entries
            .iter()
            .find(|entry| entry.id == id)
            .map(|entry| entry.command.as_str())
            .ok_or(HistoryError::UnknownId(id))
    }

    pub fn clear(&self) -> Ledger {
        Ledger::default()
    }
}

/// Keep the most recent `max` entries, dropping the oldest first.
pub fn truncate(mut entries: Vec<HistoryEntry>, max: usize) -> Vec<HistoryEntry> {
    if entries.len() > max {
        entries.drain(..entries.len() - max);
    }
    entries
}

/// Drop everything before the tool's own invocation token, e.g. the
/// directory the binary was launched from.
///
/// Words are split and re-quoted like a POSIX shell does, so quoted
/// arguments survive. Lines that never mention the tool are returned unchanged.
pub fn normalize_command(command: &str) -> String {
    let Some(words) = shlex::split(command) else {
        return command.to_string();
    };
    let invoked = words.iter().position(|word| {
        Path::new(word)
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| name.strip_suffix(".exe").unwrap_or(name) == PROGRAM)
    });
    match invoked {
        Some(idx) => {
            let rest = words[idx + 1..].iter().map(String::as_str);
            shlex::try_join(std::iter::once(PROGRAM).chain(rest)).unwrap_or_else(|_| command.to_string())
        }
        None => command.to_string(),
    }
}

/// On-disk location of the ledger.
#[derive(Debug, Clone)]
pub struct HistoryStore {
    path: PathBuf,
}

impl HistoryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `history.json` next to the configuration file.
    pub fn in_dir(dir: &Path) -> Self {
        Self::new(dir.join("history.json"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the ledger; a missing file is an empty ledger.
    pub fn load(&self) -> Result<Ledger, HistoryError> {
        let text = match std::fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Ledger::default()),
            Err(source) => {
                return Err(HistoryError::Io {
                    path: self.path.clone(),
                    source,
                });
            }
        };
        serde_json::from_str(&text).map_err(|source| HistoryError::Corrupt {
            path: self.path.clone(),
            source,
        })
    }

    /// Replace the ledger file atomically.
    ///
    /// The new content goes to a temporary file in the same directory which is
    /// then renamed over the old file.
    pub fn persist(&self, ledger: &Ledger) -> Result<(), HistoryError> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let io_err = |source| HistoryError::Io {
            path: self.path.clone(),
            source,
        };
        std::fs::create_dir_all(dir).map_err(io_err)?;

        let mut tmp = NamedTempFile::new_in(dir).map_err(io_err)?;
        serde_json::to_writer_pretty(&mut tmp, ledger)?;
        tmp.write_all(b"\n").map_err(io_err)?;
        tmp.as_file().sync_all().map_err(io_err)?;
        tmp.persist(&self.path)?;
        Ok(())
    }
}
