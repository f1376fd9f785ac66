//! RON description of one fuzzing run.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use engine_logging::{engine_info, LogDestination};
use intruder_core::EncoderKind;
use intruder_engine::FuzzSettings;
use serde::{Deserialize, Serialize};

const MAX_WORKERS: usize = 100;
const MAX_SECONDS: u64 = 300;

/// One marked span, in editor coordinates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionSpec {
    /// 1-based line.
    pub line: usize,
    /// 0-based character column, inclusive.
    pub start: usize,
    /// 0-based character column, exclusive.
    pub stop: usize,
    pub payload_file: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LogTarget {
    #[default]
    Terminal,
    File(PathBuf),
    Both(PathBuf),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunFile {
    pub request_file: PathBuf,
    pub selections: Vec<SelectionSpec>,
    pub encoder: String,
    pub workers: usize,
    pub timeout_secs: u64,
    pub delay_secs: u64,
    pub output_dir: PathBuf,
    pub scheme: String,
    pub log: LogTarget,
    pub log_level: String,
}

impl Default for RunFile {
    fn default() -> Self {
        let settings = FuzzSettings::default();
        Self {
            request_file: PathBuf::from("request.txt"),
            selections: Vec::new(),
            encoder: EncoderKind::None.name().to_string(),
            workers: settings.workers,
            timeout_secs: settings.request_timeout.as_secs(),
            delay_secs: settings.delay.as_secs(),
            output_dir: PathBuf::from("results"),
            scheme: settings.default_scheme,
            log: LogTarget::Terminal,
            log_level: "info".to_string(),
        }
    }
}

impl RunFile {
    /// Reads a run file. Relative paths inside it are resolved against the
    /// directory holding the file.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read run file {:?}", path))?;
        let mut run: RunFile = ron::from_str(&content)
            .with_context(|| format!("failed to parse run file {:?}", path))?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        run.resolve_paths(base);
        Ok(run)
    }

    fn resolve_paths(&mut self, base: &Path) {
        let resolve = |path: &mut PathBuf| {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        };
        resolve(&mut self.request_file);
        resolve(&mut self.output_dir);
        for selection in &mut self.selections {
            resolve(&mut selection.payload_file);
        }
        match &mut self.log {
            LogTarget::Terminal => {}
            LogTarget::File(path) | LogTarget::Both(path) => resolve(path),
        }
    }

    pub fn encoder(&self) -> EncoderKind {
        EncoderKind::from_name(&self.encoder)
    }

    /// Engine settings with out-of-range values clamped.
    pub fn settings(&self) -> FuzzSettings {
        let workers = self.workers.clamp(1, MAX_WORKERS);
        let timeout = self.timeout_secs.min(MAX_SECONDS);
        let delay = self.delay_secs.min(MAX_SECONDS);
        if workers != self.workers || timeout != self.timeout_secs || delay != self.delay_secs {
            engine_info!(
                "Clamped settings to workers={}, timeout={}s, delay={}s",
                workers,
                timeout,
                delay
            );
        }
        FuzzSettings {
            workers,
            request_timeout: Duration::from_secs(timeout),
            delay: Duration::from_secs(delay),
            default_scheme: self.scheme.clone(),
            ..FuzzSettings::default()
        }
    }

    pub fn log_destination(&self) -> LogDestination {
        match &self.log {
            LogTarget::Terminal => LogDestination::Terminal,
            LogTarget::File(path) => LogDestination::File(path.clone()),
            LogTarget::Both(path) => LogDestination::Both(path.clone()),
        }
    }
}
