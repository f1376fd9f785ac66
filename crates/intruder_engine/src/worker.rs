use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Local;
use engine_logging::{engine_debug, engine_error, engine_trace};

use crate::context::{QueuePoll, RunContext};
use crate::dispatch::{Dispatcher, ResponseFormatter};
use crate::{CombinationJob, ErrorCategory, RequestResult};

/// One consumer of the job queue.
pub struct Worker {
    id: usize,
    ctx: Arc<RunContext>,
    dispatcher: Arc<dyn Dispatcher>,
    formatter: Arc<dyn ResponseFormatter>,
    delay: Duration,
}

impl Worker {
    pub fn new(
        id: usize,
        ctx: Arc<RunContext>,
        dispatcher: Arc<dyn Dispatcher>,
        formatter: Arc<dyn ResponseFormatter>,
        delay: Duration,
    ) -> Self {
        Self {
            id,
            ctx,
            dispatcher,
            formatter,
            delay,
        }
    }

    /// Handles jobs until the queue closes or the run stops. Returns the
    /// number of jobs handled.
    pub async fn run(self) -> usize {
        let mut handled = 0;
        while self.ctx.is_running() {
            let job = match self.ctx.next_job().await {
                QueuePoll::Job(job) => job,
                QueuePoll::Idle => continue,
                QueuePoll::Closed => break,
            };
            // Popped after a stop but before the drain: discard, never send.
            if !self.ctx.is_running() {
                engine_debug!("Worker {} discarding job popped after stop", self.id);
                break;
            }

            let result = self.execute(&job).await;
            match self.ctx.sink().record(result) {
                Ok(sequence_id) => engine_trace!("Worker {} recorded #{}", self.id, sequence_id),
                Err(err) => engine_error!("Worker {} failed to persist result: {}", self.id, err),
            }
            handled += 1;
            self.ctx.pause(self.delay).await;
        }
        engine_debug!("Worker {} exiting after {} jobs", self.id, handled);
        handled
    }

    /// Sends one job and classifies the outcome. Never fails: errors become
    /// part of the result.
    pub async fn execute(&self, job: &CombinationJob) -> RequestResult {
        let request = match &job.request {
            Ok(request) => request,
            Err(err) => {
                engine_debug!("Skipping malformed request: {}", err);
                return RequestResult::failed(job, ErrorCategory::MalformedRequest);
            }
        };

        let timestamp = Local::now();
        let started = Instant::now();
        let exchange = match self.dispatcher.dispatch(request).await {
            Ok(exchange) => exchange,
            Err(err) => {
                engine_debug!("{} for {:?}: {}", err.category, job.payloads, err.message);
                return RequestResult::failed(job, err.category);
            }
        };
        let round_trip = started.elapsed();

        RequestResult {
            status_code: Some(exchange.status),
            round_trip: Some(round_trip),
            content_length: Some(exchange.body.len() as u64),
            payloads: job.payloads.clone(),
            reflected: is_reflected(&exchange.body, &job.payloads),
            timed_out: false,
            error: None,
            timestamp: Some(timestamp),
            raw_request: job.raw_request.clone(),
            raw_response: self.formatter.format(&exchange),
        }
    }
}

/// True when any non-empty payload appears verbatim in `body`.
pub fn is_reflected(body: &[u8], payloads: &[String]) -> bool {
    payloads
        .iter()
        .map(String::as_bytes)
        .filter(|needle| !needle.is_empty())
        .any(|needle| body.windows(needle.len()).any(|window| window == needle))
}
