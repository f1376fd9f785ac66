//! Intruder engine: payload loading, request dispatch and run orchestration.
mod context;
mod controller;
mod dispatch;
mod generator;
mod payloads;
mod persist;
mod sink;
mod store;
mod types;
mod worker;

pub use context::{QueuePoll, RunContext};
pub use controller::{drive_run, FuzzSettings, RunController, RunError, RunPlan};
pub use dispatch::{
    DispatchError, DispatchSettings, Dispatcher, HttpExchange, RawResponseFormatter,
    ReqwestDispatcher, ResponseFormatter,
};
pub use generator::CombinationGenerator;
pub use payloads::{load_payload_sets, total_combinations, PayloadError, PayloadSet};
pub use persist::{
    ensure_output_dir, read_run_summary, write_run_summary, AtomicFileWriter, PersistError,
    RunSummary, RUN_SUMMARY_FILENAME,
};
pub use sink::{EventQueue, ProgressSink, ResultSink};
pub use store::{
    read_result_rows, JsonLinesStore, MemoryResultStore, ResultRow, ResultStore,
    RESULTS_FILENAME,
};
pub use types::{
    CombinationJob, EngineEvent, ErrorCategory, RequestResult, RunProgress, RunStatus, SequenceId,
};
pub use worker::{is_reflected, Worker};
