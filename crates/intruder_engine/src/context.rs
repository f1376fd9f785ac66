use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;

use crate::sink::ResultSink;
use crate::CombinationJob;

/// What a worker got back from one poll of the queue.
#[derive(Debug)]
pub enum QueuePoll {
    Job(CombinationJob),
    /// Nothing arrived within the poll interval.
    Idle,
    /// The producer is gone and the queue is empty, or the queue was drained.
    Closed,
}

/// State shared by the producer and every worker of one run.
///
/// The running flag is read on every poll and written only by a stop
/// request. Workers may therefore keep going for up to one poll interval
/// after a stop before they notice it.
pub struct RunContext {
    running: AtomicBool,
    stop_signal: CancellationToken,
    queue: Mutex<mpsc::Receiver<CombinationJob>>,
    poll_interval: Duration,
    sink: Arc<ResultSink>,
}

impl RunContext {
    /// Creates the context and the sending half of its bounded queue.
    pub fn new(
        sink: Arc<ResultSink>,
        queue_capacity: usize,
        poll_interval: Duration,
    ) -> (Arc<Self>, mpsc::Sender<CombinationJob>) {
        let (tx, rx) = mpsc::channel(queue_capacity.max(1));
        let context = Self {
            running: AtomicBool::new(true),
            stop_signal: CancellationToken::new(),
            queue: Mutex::new(rx),
            poll_interval,
            sink,
        };
        (Arc::new(context), tx)
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    pub fn request_stop(&self) {
        self.running.store(false, Ordering::Relaxed);
        self.stop_signal.cancel();
    }

    pub fn stop_requested(&self) -> bool {
        self.stop_signal.is_cancelled()
    }

    /// Resolves once a stop has been requested.
    pub async fn stopped(&self) {
        self.stop_signal.cancelled().await;
    }

    pub fn sink(&self) -> &ResultSink {
        &self.sink
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Waits at most one poll interval for the next job.
    pub async fn next_job(&self) -> QueuePoll {
        let polled = tokio::time::timeout(self.poll_interval, async {
            self.queue.lock().await.recv().await
        })
        .await;
        match polled {
            Ok(Some(job)) => QueuePoll::Job(job),
            Ok(None) => QueuePoll::Closed,
            Err(_) => QueuePoll::Idle,
        }
    }

    /// Closes the queue and discards every job still waiting in it.
    ///
    /// A producer blocked on a full queue is released with an error, so
    /// nothing can be enqueued afterwards.
    pub async fn drain(&self) -> usize {
        let mut queue = self.queue.lock().await;
        queue.close();
        let mut discarded = 0;
        while queue.try_recv().is_ok() {
            discarded += 1;
        }
        discarded
    }

    /// Sleeps for `delay`, waking early if a stop is requested.
    pub async fn pause(&self, delay: Duration) {
        if delay.is_zero() {
            return;
        }
        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = self.stop_signal.cancelled() => {}
        }
    }
}
