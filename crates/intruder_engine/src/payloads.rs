use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use engine_logging::engine_debug;
use intruder_core::combination_count;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("failed to read payload file {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Ordered payload values loaded from one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayloadSet {
    pub source: PathBuf,
    pub payloads: Vec<String>,
}

impl PayloadSet {
    /// One payload per line with trailing whitespace trimmed. Blank lines
    /// stay as empty payloads.
    pub fn parse(source: impl Into<PathBuf>, text: &str) -> Self {
        Self {
            source: source.into(),
            payloads: text.lines().map(|line| line.trim_end().to_string()).collect(),
        }
    }

    pub fn from_file(path: &Path) -> Result<Self, PayloadError> {
        let bytes = fs::read(path).map_err(|source| PayloadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::parse(path, &String::from_utf8_lossy(&bytes)))
    }

    pub fn len(&self) -> usize {
        self.payloads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payloads.is_empty()
    }
}

/// Loads every file in order; the first unreadable file aborts the whole load.
pub fn load_payload_sets<P: AsRef<Path>>(paths: &[P]) -> Result<Vec<PayloadSet>, PayloadError> {
    let sets = paths
        .iter()
        .map(|path| PayloadSet::from_file(path.as_ref()))
        .collect::<Result<Vec<_>, _>>()?;
    for set in &sets {
        engine_debug!("Loaded {} payloads from {:?}", set.len(), set.source);
    }
    Ok(sets)
}

/// Product of the set sizes; zero when any set is empty.
pub fn total_combinations(sets: &[PayloadSet]) -> u64 {
    combination_count(sets.iter().map(PayloadSet::len))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_keeps_blank_lines_and_trims_trailing_whitespace() {
        let set = PayloadSet::parse("inline", "alice  \r\n\n  bob\t\n");
        assert_eq!(set.payloads, vec!["alice", "", "  bob"]);
    }

    #[test]
    fn empty_text_is_an_empty_set() {
        assert!(PayloadSet::parse("inline", "").is_empty());
    }
}
