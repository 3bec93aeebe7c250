//! Persistence layer.
//!
//! Every settled wager is appended to an append-only CSV trade log with
//! the columns `Timestamp,Trade,Outcome,Stake,Profit/Loss`. The header is
//! written once, when the file is first created. Rows are flushed as they
//! are written so the log never lags behind the session state.

use anyhow::{anyhow, Context, Result};
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

use crate::types::WagerRecord;

/// Sink for settled wagers.
#[cfg_attr(test, mockall::automock)]
pub trait TradeRecorder {
    /// Persist one record. Must not return before the record is written.
    fn append(&mut self, record: &WagerRecord) -> Result<()>;
}

// ---------------------------------------------------------------------------
// CSV trade log
// ---------------------------------------------------------------------------

/// Append target that can cut itself back to an earlier length.
trait RowTarget: Write {
    fn end_offset(&mut self) -> io::Result<u64>;
    fn truncate(&mut self, len: u64) -> io::Result<()>;
}

impl RowTarget for File {
    fn end_offset(&mut self) -> io::Result<u64> {
        Ok(self.metadata()?.len())
    }

    fn truncate(&mut self, len: u64) -> io::Result<()> {
        self.set_len(len)
    }
}

/// Encode one row (plus the header on an empty log) without touching the
/// target, so a failed write never leaves bytes queued for the next one.
fn encode_row(record: &WagerRecord, with_header: bool) -> Result<Vec<u8>> {
    let mut wtr = csv::WriterBuilder::new()
        .has_headers(with_header)
        .from_writer(Vec::new());
    wtr.serialize(record)
        .with_context(|| format!("Failed to encode trade {}", record.trade()))?;
    wtr.into_inner()
        .map_err(|e| anyhow!("Failed to encode trade {}: {}", record.trade(), e.error()))
}

/// Write one whole row or nothing. A partial write is cut back off.
fn write_row<T: RowTarget>(target: &mut T, record: &WagerRecord) -> Result<()> {
    let start = target.end_offset()?;
    let bytes = encode_row(record, start == 0)?;

    if let Err(e) = target.write_all(&bytes).and_then(|()| target.flush()) {
        if let Err(undo) = target.truncate(start) {
            warn!(trade = record.trade(), error = %undo, "Could not roll back partial trade row");
        }
        return Err(e.into());
    }
    Ok(())
}

/// Append-only CSV trade history.
pub struct CsvTradeLog {
    path: PathBuf,
    /// Opened lazily on the first append, dropped after a failed one.
    file: Option<File>,
    rows_written: u64,
}

impl CsvTradeLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            file: None,
            rows_written: 0,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Rows appended through this handle.
    pub fn rows_written(&self) -> u64 {
        self.rows_written
    }

    fn open(path: &Path) -> Result<File> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("Failed to open trade log: {}", path.display()))?;

        debug!(path = %path.display(), "Trade log opened");
        Ok(file)
    }
}

impl TradeRecorder for CsvTradeLog {
    fn append(&mut self, record: &WagerRecord) -> Result<()> {
        if self.file.is_none() {
            self.file = Some(Self::open(&self.path)?);
        }
        let file = self
            .file
            .as_mut()
            .ok_or_else(|| anyhow!("Trade log unavailable: {}", self.path.display()))?;

        if let Err(e) = write_row(file, record) {
            self.file = None;
            return Err(e).with_context(|| {
                format!("Failed to write trade {} to {}", record.trade(), self.path.display())
            });
        }

        self.rows_written += 1;
        Ok(())
    }
}

/// Load the full trade history in file order.
/// Returns None if the log doesn't exist yet.
pub fn load_trade_history(path: &Path) -> Result<Option<Vec<WagerRecord>>> {
    if !path.exists() {
        info!(path = %path.display(), "No trade history found");
        return Ok(None);
    }

    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("Failed to open trade history: {}", path.display()))?;

    let records = reader
        .deserialize::<WagerRecord>()
        .enumerate()
        .map(|(i, row)| {
            row.with_context(|| format!("Malformed row {} in {}", i + 1, path.display()))
        })
        .collect::<Result<Vec<WagerRecord>>>()?;

    debug!(path = %path.display(), rows = records.len(), "Trade history loaded");
    Ok(Some(records))
}

// ---------------------------------------------------------------------------
// In-memory recorder
// ---------------------------------------------------------------------------

/// Keeps records in memory. Clones share the same buffer, so a handle kept
/// by the caller sees what a session (possibly on another thread) wrote.
#[derive(Debug, Clone, Default)]
pub struct MemoryRecorder {
    records: Arc<Mutex<Vec<WagerRecord>>>,
}

impl MemoryRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything appended so far.
    pub fn records(&self) -> Vec<WagerRecord> {
        self.records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn len(&self) -> usize {
        self.records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl TradeRecorder for MemoryRecorder {
    fn append(&mut self, record: &WagerRecord) -> Result<()> {
        self.records
            .lock()
            .map_err(|_| anyhow!("Memory recorder lock poisoned"))?
            .push(record.clone());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
