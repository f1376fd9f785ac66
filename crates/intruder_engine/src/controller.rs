use std::io;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use chrono::Local;
use engine_logging::{engine_error, engine_info, engine_warn};
use intruder_core::{EncoderKind, Template, TemplateError};
use thiserror::Error;
use tokio::task::JoinHandle as TaskHandle;

use crate::context::RunContext;
use crate::dispatch::{
    DispatchSettings, Dispatcher, RawResponseFormatter, ReqwestDispatcher, ResponseFormatter,
};
use crate::generator::CombinationGenerator;
use crate::payloads::{load_payload_sets, PayloadError};
use crate::persist::{write_run_summary, PersistError, RunSummary};
use crate::sink::{EventQueue, ProgressSink, ResultSink};
use crate::store::ResultStore;
use crate::worker::Worker;
use crate::{EngineEvent, RunProgress, RunStatus};

#[derive(Debug, Clone)]
pub struct FuzzSettings {
    pub workers: usize,
    pub request_timeout: Duration,
    /// Pause after each handled job, per worker.
    pub delay: Duration,
    pub queue_capacity: usize,
    pub poll_interval: Duration,
    pub default_scheme: String,
}

impl Default for FuzzSettings {
    fn default() -> Self {
        Self {
            workers: 4,
            request_timeout: Duration::from_secs(90),
            delay: Duration::ZERO,
            queue_capacity: 100,
            poll_interval: Duration::from_secs(2),
            default_scheme: "http".to_string(),
        }
    }
}

impl FuzzSettings {
    pub fn dispatch_settings(&self) -> DispatchSettings {
        DispatchSettings {
            request_timeout: self.request_timeout,
            default_scheme: self.default_scheme.clone(),
        }
    }
}

/// Everything needed to start one run.
#[derive(Debug, Clone)]
pub struct RunPlan {
    pub template: Template,
    /// Payload file per placeholder, in ordinal order.
    pub bindings: Vec<PathBuf>,
    pub encoder: EncoderKind,
    pub settings: FuzzSettings,
}

#[derive(Debug, Error)]
pub enum RunError {
    #[error("a run is already in progress")]
    AlreadyRunning,
    #[error(transparent)]
    Template(#[from] TemplateError),
    #[error(transparent)]
    Payload(#[from] PayloadError),
    #[error("failed to reset results: {0}")]
    Persist(#[from] PersistError),
    #[error("failed to build http client: {0}")]
    Client(String),
    #[error("failed to start runtime: {0}")]
    Runtime(#[from] io::Error),
}

/// Owns the lifecycle of runs: `Idle -> Running -> (Completed | Cancelled) -> Idle`.
///
/// `start` returns as soon as the producer and workers are launched on a
/// background runtime; progress arrives through [`RunController::try_recv`].
pub struct RunController {
    sink: Arc<ResultSink>,
    events: Arc<EventQueue>,
    formatter: Arc<dyn ResponseFormatter>,
    summary_dir: Option<PathBuf>,
    status: Arc<Mutex<RunStatus>>,
    active: Option<ActiveRun>,
}

struct ActiveRun {
    ctx: Arc<RunContext>,
    thread: JoinHandle<()>,
}

impl RunController {
    pub fn new(store: Box<dyn ResultStore>) -> Self {
        let events = Arc::new(EventQueue::new());
        Self {
            sink: Arc::new(ResultSink::new(store, events.clone())),
            events,
            formatter: Arc::new(RawResponseFormatter),
            summary_dir: None,
            status: Arc::new(Mutex::new(RunStatus::Idle)),
            active: None,
        }
    }

    pub fn with_formatter(mut self, formatter: Arc<dyn ResponseFormatter>) -> Self {
        self.formatter = formatter;
        self
    }

    /// Writes a run summary into `dir` whenever a run ends.
    pub fn with_summary_dir(mut self, dir: PathBuf) -> Self {
        self.summary_dir = Some(dir);
        self
    }

    /// Starts a run against the live target.
    pub fn start(&mut self, plan: RunPlan) -> Result<(), RunError> {
        let dispatcher = ReqwestDispatcher::new(plan.settings.dispatch_settings())
            .map_err(|err| RunError::Client(err.message))?;
        self.start_with(plan, Arc::new(dispatcher))
    }

    /// Starts a run that sends its requests through `dispatcher`.
    ///
    /// Payload files are loaded and the template checked before anything is
    /// dispatched; any failure there leaves the previous results untouched.
    pub fn start_with(
        &mut self,
        plan: RunPlan,
        dispatcher: Arc<dyn Dispatcher>,
    ) -> Result<(), RunError> {
        if self.status() == RunStatus::Running {
            return Err(RunError::AlreadyRunning);
        }
        self.reap();

        let placeholders = plan.template.placeholder_count();
        if placeholders == 0 {
            return Err(TemplateError::NoPlaceholders.into());
        }
        if placeholders != plan.bindings.len() {
            return Err(TemplateError::PlaceholderCount {
                expected: placeholders,
                actual: plan.bindings.len(),
            }
            .into());
        }

        let sets = load_payload_sets(&plan.bindings)?;
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()?;
        self.sink.reset()?;

        let settings = plan.settings;
        let generator = CombinationGenerator::new(plan.template, sets, plan.encoder);
        let total = generator.total();
        let (ctx, tx) = RunContext::new(
            self.sink.clone(),
            settings.queue_capacity,
            settings.poll_interval,
        );

        engine_info!(
            "Starting run: {} combinations, {} workers, encoder {}",
            total,
            settings.workers,
            plan.encoder
        );
        *self.status.lock().unwrap_or_else(PoisonError::into_inner) = RunStatus::Running;
        self.events.emit(EngineEvent::RunStarted { total });

        let run = RunThread {
            ctx: ctx.clone(),
            status: self.status.clone(),
            events: self.events.clone(),
            summary_dir: self.summary_dir.clone(),
            encoder: plan.encoder,
            workers: settings.workers.max(1),
            started_at: Local::now().to_rfc3339(),
        };
        let formatter = self.formatter.clone();
        let thread = thread::spawn(move || {
            let status = runtime.block_on(drive_run(
                run.ctx.clone(),
                tx,
                generator,
                dispatcher,
                formatter,
                &settings,
            ));
            run.finish(status);
        });

        self.active = Some(ActiveRun { ctx, thread });
        Ok(())
    }

    /// Requests cancellation, discards queued jobs and waits for in-flight
    /// workers to finish their current request.
    pub fn stop(&mut self) -> RunStatus {
        if let Some(active) = &self.active {
            engine_info!("Stop requested");
            active.ctx.request_stop();
        }
        self.wait()
    }

    /// Blocks until the current run ends and returns its terminal status.
    /// The controller is idle afterwards.
    pub fn wait(&mut self) -> RunStatus {
        let Some(active) = self.active.take() else {
            return self.status();
        };
        if active.thread.join().is_err() {
            engine_error!("Run thread panicked");
        }
        let mut status = self.status.lock().unwrap_or_else(PoisonError::into_inner);
        let terminal = match *status {
            RunStatus::Running => RunStatus::Cancelled,
            other => other,
        };
        *status = RunStatus::Idle;
        terminal
    }

    pub fn status(&self) -> RunStatus {
        *self.status.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn progress(&self) -> RunProgress {
        self.sink.progress()
    }

    /// Next pending event. Progress updates nobody read in time are
    /// collapsed into the latest one.
    pub fn try_recv(&self) -> Option<EngineEvent> {
        self.events.pop()
    }

    /// Joins a run that already finished without `wait` being called.
    fn reap(&mut self) {
        if self.active.is_some() {
            self.wait();
        }
    }
}

impl Drop for RunController {
    fn drop(&mut self) {
        if self.active.is_some() {
            self.stop();
        }
    }
}

struct RunThread {
    ctx: Arc<RunContext>,
    status: Arc<Mutex<RunStatus>>,
    events: Arc<EventQueue>,
    summary_dir: Option<PathBuf>,
    encoder: EncoderKind,
    workers: usize,
    started_at: String,
}

impl RunThread {
    fn finish(self, status: RunStatus) {
        let progress = self.ctx.sink().progress();
        engine_info!(
            "Run {:?}: {} of {} combinations recorded",
            status,
            progress.processed,
            progress.total
        );

        if let Some(dir) = &self.summary_dir {
            let summary = RunSummary {
                status,
                progress,
                encoder: self.encoder.name().to_string(),
                workers: self.workers,
                started_at: self.started_at.clone(),
                finished_at: Local::now().to_rfc3339(),
            };
            if let Err(err) = write_run_summary(dir, &summary) {
                engine_error!("Failed to write run summary to {:?}: {}", dir, err);
            }
        }

        *self.status.lock().unwrap_or_else(PoisonError::into_inner) = status;
        self.events
            .emit(EngineEvent::RunFinished { status, progress });
    }
}

/// Runs the producer and the worker pool to completion or cancellation.
pub async fn drive_run(
    ctx: Arc<RunContext>,
    tx: tokio::sync::mpsc::Sender<crate::CombinationJob>,
    generator: CombinationGenerator,
    dispatcher: Arc<dyn Dispatcher>,
    formatter: Arc<dyn ResponseFormatter>,
    settings: &FuzzSettings,
) -> RunStatus {
    let producer = tokio::spawn(generator.run(ctx.clone(), tx));
    let workers: Vec<TaskHandle<usize>> = (0..settings.workers.max(1))
        .map(|id| {
            let worker = Worker::new(
                id,
                ctx.clone(),
                dispatcher.clone(),
                formatter.clone(),
                settings.delay,
            );
            tokio::spawn(worker.run())
        })
        .collect();

    let finished = join_all(producer, workers);
    tokio::pin!(finished);
    tokio::select! {
        _ = &mut finished => {}
        _ = ctx.stopped() => {
            let discarded = ctx.drain().await;
            engine_info!("Discarded {} queued jobs", discarded);
            finished.await;
        }
    }

    if ctx.stop_requested() {
        RunStatus::Cancelled
    } else {
        RunStatus::Completed
    }
}

async fn join_all(producer: TaskHandle<u64>, workers: Vec<TaskHandle<usize>>) {
    if let Err(err) = producer.await {
        engine_warn!("Producer task failed: {}", err);
    }
    for worker in workers {
        if let Err(err) = worker.await {
            engine_warn!("Worker task failed: {}", err);
        }
    }
}
