//! Durable append-only log of accepted pixel writes.
//!
//! The log is the source of truth for the canvas: every accepted write is
//! appended here before the in-memory grid is touched, and the grid is
//! rebuilt at startup by scanning the log from the beginning. Records are
//! never updated or deleted.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use log::warn;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// One accepted pixel change, as persisted in the durable log.
///
/// `seq` is assigned by the log on append and strictly increases across the
/// lifetime of a log file. Records are immutable once written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PixelWrite {
    pub seq: u64,
    pub x: u32,
    pub y: u32,
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

/// Ordered scan over persisted records, ascending by sequence.
pub type Scan<'a> = Box<dyn Iterator<Item = Result<PixelWrite>> + 'a>;

/// Append-only record store backing the canvas.
///
/// Implementations must make `append` durable before returning and must
/// return records from `scan_all` in ascending sequence order. Each call to
/// `scan_all` starts a fresh scan from the beginning.
pub trait PixelLog: Send {
    fn append(&mut self, x: u32, y: u32, rgb: (u8, u8, u8)) -> Result<u64>;
    fn scan_all(&self) -> Result<Scan<'_>>;
}

/// File-backed log: one JSON record per line, fsynced on every append.
pub struct FileLog {
    path: PathBuf,
    file: File,
    next_seq: u64,
}

impl FileLog {
    /// Open a log file, creating it if missing.
    ///
    /// A partial record at the end of the file is a torn append from a crash
    /// mid-write; it was never acknowledged to any caller, so it is dropped
    /// and the file truncated back to the last complete record. Corruption
    /// anywhere before the tail is an error.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut next_seq = 1;

        if path.exists() {
            let data = std::fs::read_to_string(&path)?;
            let (valid_len, last_seq, torn) = Self::recover(&data)?;
            if torn {
                warn!(
                    "dropping torn record at end of {} ({} of {} bytes kept)",
                    path.display(),
                    valid_len,
                    data.len()
                );
                let file = OpenOptions::new().write(true).open(&path)?;
                file.set_len(valid_len as u64)?;
                file.sync_data()?;
            }
            if let Some(seq) = last_seq {
                next_seq = seq + 1;
            }
        }

        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            path,
            file,
            next_seq,
        })
    }

    /// Scan raw file contents and find the valid prefix.
    ///
    /// Returns the byte length of that prefix, the last sequence number in
    /// it, and whether a torn tail needs truncating.
    fn recover(data: &str) -> Result<(usize, Option<u64>, bool)> {
        let mut valid_len = 0;
        let mut last_seq = None;

        for (i, chunk) in data.split_inclusive('\n').enumerate() {
            let complete = chunk.ends_with('\n');
            let at_end = valid_len + chunk.len() == data.len();

            match serde_json::from_str::<PixelWrite>(chunk.trim_end()) {
                Ok(record) if complete => {
                    if last_seq.is_some_and(|seq| record.seq <= seq) {
                        return Err(Error::CorruptRecord {
                            line: i + 1,
                            reason: format!("sequence {} does not increase", record.seq),
                        });
                    }
                    last_seq = Some(record.seq);
                    valid_len += chunk.len();
                }
                // A record missing its newline, or an unparseable final
                // fragment, is a torn append.
                Ok(_) => return Ok((valid_len, last_seq, true)),
                Err(e) => {
                    if at_end {
                        return Ok((valid_len, last_seq, true));
                    }
                    return Err(Error::CorruptRecord {
                        line: i + 1,
                        reason: e.to_string(),
                    });
                }
            }
        }

        Ok((valid_len, last_seq, false))
    }
}

impl PixelLog for FileLog {
    fn append(&mut self, x: u32, y: u32, rgb: (u8, u8, u8)) -> Result<u64> {
        let record = PixelWrite {
            seq: self.next_seq,
            x,
            y,
            r: rgb.0,
            g: rgb.1,
            b: rgb.2,
        };
        let mut line = serde_json::to_string(&record)
            .map_err(|e| Error::PersistFailed(e.to_string()))?;
        line.push('\n');

        self.file
            .write_all(line.as_bytes())
            .and_then(|()| self.file.sync_data())
            .map_err(|e| Error::PersistFailed(e.to_string()))?;
        self.next_seq += 1;
        Ok(record.seq)
    }

    fn scan_all(&self) -> Result<Scan<'_>> {
        let reader = BufReader::new(File::open(&self.path)?);
        let iter = reader.lines().enumerate().map(|(i, line)| {
            let line = line?;
            serde_json::from_str::<PixelWrite>(&line).map_err(|e| Error::CorruptRecord {
                line: i + 1,
                reason: e.to_string(),
            })
        });
        Ok(Box::new(iter))
    }
}

/// In-memory log used by tests and benches.
///
/// Cloned handles share the same backing records, so a test can keep a handle
/// to inspect the log, or rebuild a second store from writes made through the
/// first.
#[derive(Clone, Default)]
pub struct MemoryLog {
    records: Arc<Mutex<Vec<PixelWrite>>>,
}

impl MemoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn records(&self) -> Vec<PixelWrite> {
        self.records.lock().unwrap().clone()
    }
}

impl PixelLog for MemoryLog {
    fn append(&mut self, x: u32, y: u32, rgb: (u8, u8, u8)) -> Result<u64> {
        let mut records = self.records.lock().unwrap();
        let seq = records.last().map_or(1, |r| r.seq + 1);
        records.push(PixelWrite {
            seq,
            x,
            y,
            r: rgb.0,
            g: rgb.1,
            b: rgb.2,
        });
        Ok(seq)
    }

    fn scan_all(&self) -> Result<Scan<'_>> {
        let records = self.records.lock().unwrap().clone();
        Ok(Box::new(records.into_iter().map(Ok)))
    }
}
