use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};

use crate::persist::{ensure_output_dir, PersistError};
use crate::{RequestResult, SequenceId};

pub const RESULTS_FILENAME: &str = "results.jsonl";

const NEVER_SENT_STATUS: &str = "000";
const NEVER_SENT_TIMESTAMP: &str = "0000-00-00 00:00:00";

/// Persisted shape of one result, with sentinels for unknown measurements.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRow {
    pub id: SequenceId,
    pub status_code: String,
    /// Round-trip time in seconds, millisecond precision.
    pub rtt: f64,
    pub content_length: u64,
    /// JSON array of the raw payload values.
    pub payloads: String,
    pub reflected: String,
    pub timeout: String,
    pub errors: String,
    pub timestamp: String,
    pub raw_request: String,
    pub raw_response: String,
}

impl ResultRow {
    pub fn new(id: SequenceId, result: &RequestResult) -> Self {
        let rtt = result
            .round_trip
            .map(|elapsed| (elapsed.as_secs_f64() * 1000.0).round() / 1000.0)
            .unwrap_or(0.0);
        Self {
            id,
            status_code: result
                .status_code
                .map(|code| code.to_string())
                .unwrap_or_else(|| NEVER_SENT_STATUS.to_string()),
            rtt,
            content_length: result.content_length.unwrap_or(0),
            payloads: serde_json::to_string(&result.payloads).unwrap_or_default(),
            reflected: yes_no(result.reflected),
            timeout: yes_no(result.timed_out),
            errors: result
                .error
                .map(|category| category.to_string())
                .unwrap_or_default(),
            timestamp: result
                .timestamp
                .map(|at| at.format("%Y-%m-%d %H:%M:%S").to_string())
                .unwrap_or_else(|| NEVER_SENT_TIMESTAMP.to_string()),
            raw_request: result.raw_request.clone(),
            raw_response: result.raw_response.clone(),
        }
    }

    /// Decodes the payload tuple back into its values.
    pub fn payload_values(&self) -> Vec<String> {
        serde_json::from_str(&self.payloads).unwrap_or_default()
    }
}

fn yes_no(flag: bool) -> String {
    if flag { "Y" } else { "N" }.to_string()
}

/// Destination for result rows. Calls are serialized by the result sink.
pub trait ResultStore: Send {
    /// Removes every row from a previous run.
    fn clear(&mut self) -> Result<(), PersistError>;
    fn insert(&mut self, row: &ResultRow) -> Result<(), PersistError>;
}

/// Appends one JSON object per line to `{dir}/results.jsonl`.
pub struct JsonLinesStore {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl JsonLinesStore {
    pub fn create(dir: &Path) -> Result<Self, PersistError> {
        ensure_output_dir(dir)?;
        let path = dir.join(RESULTS_FILENAME);
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            path,
            writer: BufWriter::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ResultStore for JsonLinesStore {
    fn clear(&mut self) -> Result<(), PersistError> {
        self.writer.flush()?;
        File::create(&self.path)?;
        let file = OpenOptions::new().append(true).open(&self.path)?;
        self.writer = BufWriter::new(file);
        Ok(())
    }

    fn insert(&mut self, row: &ResultRow) -> Result<(), PersistError> {
        serde_json::to_writer(&mut self.writer, row)?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        Ok(())
    }
}

/// Reads every row of a results file written by [`JsonLinesStore`].
pub fn read_result_rows(path: &Path) -> Result<Vec<ResultRow>, PersistError> {
    let reader = BufReader::new(fs::File::open(path)?);
    let mut rows = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        rows.push(serde_json::from_str(&line)?);
    }
    Ok(rows)
}

/// In-memory store; clones share the same rows.
#[derive(Debug, Clone, Default)]
pub struct MemoryResultStore {
    rows: Arc<Mutex<Vec<ResultRow>>>,
}

impl MemoryResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rows(&self) -> Vec<ResultRow> {
        self.rows
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl ResultStore for MemoryResultStore {
    fn clear(&mut self) -> Result<(), PersistError> {
        self.rows
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        Ok(())
    }

    fn insert(&mut self, row: &ResultRow) -> Result<(), PersistError> {
        self.rows
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(row.clone());
        Ok(())
    }
}
