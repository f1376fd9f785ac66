use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use thiserror::Error;

use crate::{RunProgress, RunStatus};

pub const RUN_SUMMARY_FILENAME: &str = "run_summary.json";

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("output directory missing or not writable: {0}")]
    OutputDir(String),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Creates `dir` if needed and checks that results can be written into it.
pub fn ensure_output_dir(dir: &Path) -> Result<(), PersistError> {
    match fs::metadata(dir) {
        Ok(meta) if !meta.is_dir() => {
            return Err(PersistError::OutputDir(format!("{} is not a directory", dir.display())));
        }
        Ok(_) => {}
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            fs::create_dir_all(dir).map_err(|err| PersistError::OutputDir(err.to_string()))?;
        }
        Err(err) => return Err(PersistError::OutputDir(err.to_string())),
    }
    NamedTempFile::new_in(dir).map_err(|err| PersistError::OutputDir(err.to_string()))?;
    Ok(())
}

/// Replaces files under one directory through a sibling temp file, so
/// readers never observe a half-written file.
pub struct AtomicFileWriter {
    dir: PathBuf,
}

impl AtomicFileWriter {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn write(&self, filename: &str, content: &[u8]) -> Result<PathBuf, PersistError> {
        ensure_output_dir(&self.dir)?;
        let target = self.dir.join(filename);
        let mut staged = NamedTempFile::new_in(&self.dir)?;
        staged.write_all(content)?;
        staged.as_file().sync_all()?;
        staged.persist(&target).map_err(|err| PersistError::Io(err.error))?;
        Ok(target)
    }
}

/// Terminal record of a run, written next to its results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub status: RunStatus,
    pub progress: RunProgress,
    pub encoder: String,
    pub workers: usize,
    pub started_at: String,
    pub finished_at: String,
}

pub fn write_run_summary(dir: &Path, summary: &RunSummary) -> Result<PathBuf, PersistError> {
    let content = serde_json::to_vec_pretty(summary)?;
    AtomicFileWriter::new(dir.to_path_buf()).write(RUN_SUMMARY_FILENAME, &content)
}

pub fn read_run_summary(dir: &Path) -> Result<RunSummary, PersistError> {
    let content = fs::read(dir.join(RUN_SUMMARY_FILENAME))?;
    Ok(serde_json::from_slice(&content)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_dir_must_be_a_directory() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("plain");
        fs::write(&file, "x").unwrap();
        assert!(matches!(
            ensure_output_dir(&file),
            Err(PersistError::OutputDir(_))
        ));

        let nested = dir.path().join("a").join("b");
        ensure_output_dir(&nested).unwrap();
        assert!(nested.is_dir());
    }

    #[test]
    fn summary_replaces_previous_one() {
        let dir = tempfile::tempdir().unwrap();
        let mut summary = RunSummary {
            status: RunStatus::Cancelled,
            progress: RunProgress {
                processed: 3,
                total: 10,
            },
            encoder: "url".to_string(),
            workers: 4,
            started_at: "2024-05-01T10:00:00+00:00".to_string(),
            finished_at: "2024-05-01T10:00:05+00:00".to_string(),
        };
        write_run_summary(dir.path(), &summary).unwrap();
        summary.status = RunStatus::Completed;
        summary.progress.processed = 10;
        let path = write_run_summary(dir.path(), &summary).unwrap();

        assert_eq!(path, dir.path().join(RUN_SUMMARY_FILENAME));
        assert_eq!(read_run_summary(dir.path()).unwrap(), summary);
        let entries = fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(entries, 1);
    }
}
