use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use crate::persist::PersistError;
use crate::store::{ResultRow, ResultStore};
use crate::{EngineEvent, RequestResult, RunProgress, SequenceId};

pub trait ProgressSink: Send + Sync {
    fn emit(&self, event: EngineEvent);
}

/// Engine events waiting for the front end.
///
/// A progress update replaces a progress update queued right before it, so a
/// queue nobody reads holds at most three events per run.
#[derive(Debug, Default)]
pub struct EventQueue {
    events: Mutex<VecDeque<EngineEvent>>,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pop(&self) -> Option<EngineEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
    }

    pub fn len(&self) -> usize {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ProgressSink for EventQueue {
    fn emit(&self, event: EngineEvent) {
        let mut events = self.events.lock().unwrap_or_else(PoisonError::into_inner);
        if matches!(event, EngineEvent::Progress(_))
            && matches!(events.back(), Some(EngineEvent::Progress(_)))
        {
            events.pop_back();
        }
        events.push_back(event);
    }
}

struct SinkState {
    store: Box<dyn ResultStore>,
    next_sequence: SequenceId,
    processed: u64,
}

/// Persists every result exactly once.
///
/// Sequence assignment, the row write, the processed counter and the progress
/// event all happen under one lock. No network IO is done while it is held.
pub struct ResultSink {
    state: Mutex<SinkState>,
    total: AtomicU64,
    progress: Arc<dyn ProgressSink>,
}

impl ResultSink {
    pub fn new(store: Box<dyn ResultStore>, progress: Arc<dyn ProgressSink>) -> Self {
        Self {
            state: Mutex::new(SinkState {
                store,
                next_sequence: 1,
                processed: 0,
            }),
            total: AtomicU64::new(0),
            progress,
        }
    }

    /// Drops previous rows and restarts sequence ids at 1.
    pub fn reset(&self) -> Result<(), PersistError> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.store.clear()?;
        state.next_sequence = 1;
        state.processed = 0;
        self.total.store(0, Ordering::Relaxed);
        Ok(())
    }

    pub fn set_total(&self, total: u64) {
        self.total.store(total, Ordering::Relaxed);
    }

    /// Persists `result` and returns its sequence id.
    ///
    /// A failed write consumes no id and is not counted as processed.
    pub fn record(&self, result: RequestResult) -> Result<SequenceId, PersistError> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let sequence_id = state.next_sequence;
        state.store.insert(&ResultRow::new(sequence_id, &result))?;
        state.next_sequence += 1;
        state.processed += 1;
        self.progress.emit(EngineEvent::Progress(RunProgress {
            processed: state.processed,
            total: self.total.load(Ordering::Relaxed),
        }));
        Ok(sequence_id)
    }

    pub fn progress(&self) -> RunProgress {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        RunProgress {
            processed: state.processed,
            total: self.total.load(Ordering::Relaxed),
        }
    }
}
