use std::sync::Arc;

use engine_logging::{engine_debug, engine_error};
use intruder_core::{parse_request, CartesianProduct, Encoder, EncoderKind, Template};
use tokio::sync::mpsc;

use crate::context::RunContext;
use crate::payloads::{total_combinations, PayloadSet};
use crate::CombinationJob;

/// Producer side of a run: walks the payload product and feeds the queue.
pub struct CombinationGenerator {
    template: Template,
    sets: Vec<Vec<String>>,
    total: u64,
    encoder: &'static dyn Encoder,
}

impl CombinationGenerator {
    pub fn new(template: Template, sets: Vec<PayloadSet>, encoder: EncoderKind) -> Self {
        let total = total_combinations(&sets);
        Self {
            template,
            sets: sets.into_iter().map(|set| set.payloads).collect(),
            total,
            encoder: encoder.encoder(),
        }
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    /// Encodes and substitutes one payload tuple.
    pub fn build_job(&self, tuple: &[&String]) -> Option<CombinationJob> {
        let encoded: Vec<String> = tuple
            .iter()
            .map(|payload| self.encoder.encode(payload))
            .collect();
        let raw_request = match self.template.render(&encoded) {
            Ok(text) => text,
            Err(err) => {
                engine_error!("Failed to render template: {}", err);
                return None;
            }
        };
        Some(CombinationJob {
            payloads: tuple.iter().map(|payload| payload.to_string()).collect(),
            request: parse_request(&raw_request),
            raw_request,
        })
    }

    /// Pushes every combination onto the queue, blocking while it is full.
    ///
    /// Returns the number of jobs enqueued. Stops early once the run is no
    /// longer running or the queue has been closed.
    pub async fn run(self, ctx: Arc<RunContext>, tx: mpsc::Sender<CombinationJob>) -> u64 {
        ctx.sink().set_total(self.total);
        let mut enqueued = 0;
        for tuple in CartesianProduct::new(&self.sets) {
            if !ctx.is_running() {
                break;
            }
            let Some(job) = self.build_job(&tuple) else {
                break;
            };
            if tx.send(job).await.is_err() {
                break;
            }
            enqueued += 1;
        }
        engine_debug!(
            "Producer finished: enqueued {} of {} combinations (stopped: {})",
            enqueued,
            self.total,
            ctx.stop_requested()
        );
        enqueued
    }
}
