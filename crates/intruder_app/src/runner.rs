use std::fs;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use anyhow::Context;
use engine_logging::{engine_info, engine_warn};
use intruder_core::{SelectionSet, Span};
use intruder_engine::{
    EngineEvent, JsonLinesStore, RunController, RunPlan, RunStatus, RESULTS_FILENAME,
};

use crate::run_file::RunFile;

const EVENT_POLL: Duration = Duration::from_millis(100);

/// Marks every selection of `run` on the request text and builds the plan.
pub fn prepare_plan(run: &RunFile) -> anyhow::Result<RunPlan> {
    let buffer = fs::read_to_string(&run.request_file)
        .with_context(|| format!("failed to read request file {:?}", run.request_file))?;

    let mut selections = SelectionSet::new();
    for (index, spec) in run.selections.iter().enumerate() {
        let accepted = selections
            .record_selection(
                &buffer,
                Span::on_line(spec.line, spec.start, spec.stop),
                &spec.payload_file,
            )
            .with_context(|| format!("selection #{} rejected", index + 1))?;
        engine_info!(
            "Marked line {} [{}..{}) with {} -> {:?}",
            spec.line,
            spec.start,
            spec.stop,
            accepted.tag,
            accepted.payload_file
        );
    }

    let prepared = selections.take_template(&buffer)?;
    Ok(RunPlan {
        template: prepared.template,
        bindings: prepared.bindings,
        encoder: run.encoder(),
        settings: run.settings(),
    })
}

/// Runs `plan` to completion, writing results into the run's output directory.
///
/// Setting `interrupted` stops the run: queued jobs are discarded, in-flight
/// requests finish and the run summary is still written.
pub fn execute(run: &RunFile, plan: RunPlan, interrupted: &AtomicBool) -> anyhow::Result<RunStatus> {
    let store = JsonLinesStore::create(&run.output_dir)
        .with_context(|| format!("failed to open results in {:?}", run.output_dir))?;
    let mut controller =
        RunController::new(Box::new(store)).with_summary_dir(run.output_dir.clone());
    controller.start(plan)?;

    let status = supervise(&mut controller, interrupted);
    let progress = controller.progress();
    println!(
        "{:?}: {} of {} combinations recorded in {:?}",
        status,
        progress.processed,
        progress.total,
        run.output_dir.join(RESULTS_FILENAME)
    );
    Ok(status)
}

/// Prints events until the run ends, stopping it once `interrupted` is set.
pub(crate) fn supervise(controller: &mut RunController, interrupted: &AtomicBool) -> RunStatus {
    let mut last_percent = None;
    loop {
        while let Some(event) = controller.try_recv() {
            match event {
                EngineEvent::RunStarted { total } => {
                    println!("Fuzzing {total} combinations");
                }
                EngineEvent::Progress(progress) => {
                    let percent = (progress.fraction() * 100.0) as u32;
                    if last_percent != Some(percent) {
                        last_percent = Some(percent);
                        println!("{}/{} ({}%)", progress.processed, progress.total, percent);
                    }
                }
                EngineEvent::RunFinished { .. } => {}
            }
        }
        if interrupted.load(Ordering::SeqCst) {
            engine_warn!("Interrupted, stopping run");
            return controller.stop();
        }
        if controller.status() != RunStatus::Running {
            return controller.wait();
        }
        thread::sleep(EVENT_POLL);
    }
}
