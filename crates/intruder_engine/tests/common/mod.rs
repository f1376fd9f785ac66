#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Once;
use std::time::{Duration, Instant};

use bytes::Bytes;
use intruder_core::{build_template, EncoderKind, ParsedRequest, SelectionSet, Span};
use intruder_engine::{
    DispatchError, Dispatcher, FuzzSettings, HttpExchange, MemoryResultStore, RunPlan,
};

pub fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(engine_logging::initialize_for_tests);
}

pub fn write_payloads(dir: &Path, name: &str, payloads: &[&str]) -> PathBuf {
    let path = dir.join(name);
    let mut text = payloads.join("\n");
    text.push('\n');
    fs::write(&path, text).unwrap();
    path
}

/// Builds a plan by marking `(line, start, stop, payload_file)` spans on `buffer`.
pub fn plan_for(
    buffer: &str,
    marks: &[(usize, usize, usize, PathBuf)],
    encoder: EncoderKind,
    settings: FuzzSettings,
) -> RunPlan {
    let mut selections = SelectionSet::new();
    for (line, start, stop, file) in marks {
        selections
            .record_selection(buffer, Span::on_line(*line, *start, *stop), file)
            .unwrap();
    }
    let prepared = build_template(buffer, &selections).unwrap();
    RunPlan {
        template: prepared.template,
        bindings: prepared.bindings,
        encoder,
        settings,
    }
}

pub fn fast_settings(workers: usize) -> FuzzSettings {
    FuzzSettings {
        workers,
        poll_interval: Duration::from_millis(50),
        request_timeout: Duration::from_secs(5),
        ..FuzzSettings::default()
    }
}

/// Answers every request with `200 OK` and the request target as body.
pub struct EchoDispatcher {
    latency: Duration,
    calls: AtomicUsize,
}

impl EchoDispatcher {
    pub fn new(latency: Duration) -> Self {
        Self {
            latency,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl Dispatcher for EchoDispatcher {
    async fn dispatch(&self, request: &ParsedRequest) -> Result<HttpExchange, DispatchError> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(HttpExchange {
            status: 200,
            reason: "OK".to_string(),
            headers: vec![("content-type".to_string(), "text/plain".to_string())],
            body: Bytes::from(request.target.clone()),
        })
    }
}

pub fn wait_for_rows(store: &MemoryResultStore, at_least: usize, limit: Duration) {
    let started = Instant::now();
    while store.rows().len() < at_least {
        assert!(
            started.elapsed() < limit,
            "timed out waiting for {at_least} rows"
        );
        std::thread::sleep(Duration::from_millis(5));
    }
}
