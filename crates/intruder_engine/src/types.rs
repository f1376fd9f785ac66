use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Local};
use intruder_core::{ParsedRequest, RequestParseError};
use serde::{Deserialize, Serialize};

/// Strictly increasing id assigned to a result when it is persisted.
pub type SequenceId = u64;

/// One element of the payload product, ready to be sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CombinationJob {
    /// Raw, unencoded payload values in placeholder order.
    pub payloads: Vec<String>,
    /// Template text after encoding and substitution.
    pub raw_request: String,
    pub request: Result<ParsedRequest, RequestParseError>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCategory {
    Connection,
    Timeout,
    Http,
    Url,
    MalformedRequest,
    Unclassified,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCategory::Connection => write!(f, "Connection Error"),
            ErrorCategory::Timeout => write!(f, "Timeout Error"),
            ErrorCategory::Http => write!(f, "HTTP Error"),
            ErrorCategory::Url => write!(f, "URL Error"),
            ErrorCategory::MalformedRequest => write!(f, "Malformed Request"),
            ErrorCategory::Unclassified => write!(f, "Generic Request Error"),
        }
    }
}

/// Outcome of one combination. Unknown fields are `None` when the request
/// was never answered.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestResult {
    pub status_code: Option<u16>,
    pub round_trip: Option<Duration>,
    pub content_length: Option<u64>,
    pub payloads: Vec<String>,
    pub reflected: bool,
    pub timed_out: bool,
    pub error: Option<ErrorCategory>,
    pub timestamp: Option<DateTime<Local>>,
    pub raw_request: String,
    pub raw_response: String,
}

impl RequestResult {
    /// Result for a job that failed with `category`; every measurement is unknown.
    pub fn failed(job: &CombinationJob, category: ErrorCategory) -> Self {
        Self {
            status_code: None,
            round_trip: None,
            content_length: None,
            payloads: job.payloads.clone(),
            reflected: false,
            timed_out: category == ErrorCategory::Timeout,
            error: Some(category),
            timestamp: None,
            raw_request: job.raw_request.clone(),
            raw_response: String::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStatus {
    Idle,
    Running,
    Completed,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RunProgress {
    pub processed: u64,
    pub total: u64,
}

impl RunProgress {
    /// Fraction of the product handled so far; an empty run counts as done.
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            return 1.0;
        }
        self.processed as f64 / self.total as f64
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    RunStarted { total: u64 },
    Progress(RunProgress),
    RunFinished { status: RunStatus, progress: RunProgress },
}
