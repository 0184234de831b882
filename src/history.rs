//! Conversion history ledger.
//!
//! Keeps the last [`MAX_RECORDS`] completed conversions, oldest first at rest,
//! either in a JSON array file (`~/.tts-converter/tts_history.json` by default)
//! or in memory for the lifetime of the process.

use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use chrono::Local;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::languages;

/// Records kept at rest; older entries are evicted first.
pub const MAX_RECORDS: usize = 10;

/// Stored text is cut to this many characters (plus `...`).
pub const MAX_TEXT_CHARS: usize = 100;

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Default history file location.
pub fn default_history_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".tts-converter")
        .join("tts_history.json")
}

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("failed to access history file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("history file {path} is not valid JSON: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to serialize history: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// One completed conversion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionRecord {
    pub text: String,
    pub language: String,
    pub timestamp: String,
}

impl ConversionRecord {
    /// Record stamped with the current local time.
    pub fn now(text: &str, language: &str) -> Self {
        Self::with_timestamp(text, language, Local::now().format(TIMESTAMP_FORMAT).to_string())
    }

    pub fn with_timestamp(text: &str, language: &str, timestamp: impl Into<String>) -> Self {
        Self {
            text: truncate(text, MAX_TEXT_CHARS),
            language: language.to_string(),
            timestamp: timestamp.into(),
        }
    }

    pub fn language_name(&self) -> &str {
        languages::display_name(&self.language)
    }
}

/// Backing storage for the ledger. Records are passed oldest first.
pub trait LedgerStore: Send {
    fn load(&self) -> Result<Vec<ConversionRecord>, LedgerError>;
    fn save(&mut self, records: &[ConversionRecord]) -> Result<(), LedgerError>;
    fn describe(&self) -> String;
}

/// A single JSON array file, rewritten on every append.
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn io_error(&self, source: std::io::Error) -> LedgerError {
        LedgerError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

impl LedgerStore for JsonFileStore {
    fn load(&self) -> Result<Vec<ConversionRecord>, LedgerError> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(self.io_error(e)),
        };
        if contents.trim().is_empty() {
            return Ok(Vec::new());
        }
        serde_json::from_str(&contents).map_err(|source| LedgerError::Parse {
            path: self.path.clone(),
            source,
        })
    }

    fn save(&mut self, records: &[ConversionRecord]) -> Result<(), LedgerError> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).map_err(|e| self.io_error(e))?;
        }

        let json = serde_json::to_string_pretty(records)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json).map_err(|e| self.io_error(e))?;
        fs::rename(&tmp, &self.path).map_err(|e| self.io_error(e))?;
        debug!("Saved {} history records to {}", records.len(), self.path.display());
        Ok(())
    }

    fn describe(&self) -> String {
        format!("file:{}", self.path.display())
    }
}

/// Session-only history, lost when the process exits.
#[derive(Default)]
pub struct MemoryStore {
    records: Vec<ConversionRecord>,
}

impl LedgerStore for MemoryStore {
    fn load(&self) -> Result<Vec<ConversionRecord>, LedgerError> {
        Ok(self.records.clone())
    }

    fn save(&mut self, records: &[ConversionRecord]) -> Result<(), LedgerError> {
        self.records = records.to_vec();
        Ok(())
    }

    fn describe(&self) -> String {
        "session".to_string()
    }
}

/// Bounded append-only record of past conversions.
pub struct ConversionLedger {
    store: Box<dyn LedgerStore>,
}

impl ConversionLedger {
    pub fn new(store: Box<dyn LedgerStore>) -> Self {
        Self { store }
    }

    pub fn in_memory() -> Self {
        Self::new(Box::new(MemoryStore::default()))
    }

    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self::new(Box::new(JsonFileStore::new(path)))
    }

    /// Append a record, evict the oldest beyond [`MAX_RECORDS`], and persist.
    ///
    /// If the existing history cannot be read it is left untouched.
    pub fn append(&mut self, record: ConversionRecord) -> Result<(), LedgerError> {
        let mut records = self.store.load()?;
        records.push(record);
        if records.len() > MAX_RECORDS {
            let excess = records.len() - MAX_RECORDS;
            records.drain(..excess);
        }
        self.store.save(&records)
    }

    /// Up to `n` records, most recent first. Read failures yield an empty list.
    pub fn recent(&self, n: usize) -> Vec<ConversionRecord> {
        match self.store.load() {
            Ok(records) => records.into_iter().rev().take(n).collect(),
            Err(e) => {
                warn!("Failed to read conversion history: {e}");
                Vec::new()
            }
        }
    }

    pub fn len(&self) -> usize {
        self.store.load().map(|r| r.len()).unwrap_or(0)
    }

    pub fn backend(&self) -> String {
        self.store.describe()
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let head: String = text.chars().take(max_chars).collect();
        format!("{head}...")
    }
}

/// Markdown summary of the given records (expected most recent first).
pub fn generate_report(records: &[ConversionRecord]) -> String {
    if records.is_empty() {
        return "# Conversion History\n\nNo conversion history yet.".to_string();
    }

    let mut by_language: BTreeMap<&str, usize> = BTreeMap::new();
    for r in records {
        *by_language.entry(r.language_name()).or_insert(0) += 1;
    }

    let mut lines = vec![
        "# Conversion History".to_string(),
        String::new(),
        "## Summary".to_string(),
        format!("- **Conversions**: {}", records.len()),
    ];
    if let (Some(newest), Some(oldest)) = (records.first(), records.last()) {
        lines.push(format!("- **Period**: {} to {}", oldest.timestamp, newest.timestamp));
    }

    lines.extend([String::new(), "## Languages".to_string()]);
    for (name, count) in &by_language {
        lines.push(format!("- {name}: {count}"));
    }

    lines.extend([
        String::new(),
        "## Recent Conversions".to_string(),
        String::new(),
        "| Time | Language | Text |".to_string(),
        "|------|----------|------|".to_string(),
    ]);

    for r in records {
        let text = r.text.replace('\n', " ").replace('|', "\\|");
        lines.push(format!("| {} | {} | {text} |", r.timestamp, r.language_name()));
    }

    lines.join("\n")
}
