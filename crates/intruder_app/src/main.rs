mod run_file;
mod runner;

use std::path::PathBuf;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use clap::Parser;
use engine_logging::{engine_info, engine_warn};
use intruder_engine::RunStatus;
use log::LevelFilter;

use crate::run_file::RunFile;

/// Sends every combination of payloads through the marked spots of a raw
/// HTTP request and records each response.
#[derive(Parser)]
#[command(name = "intruder")]
struct Args {
    /// RON run file describing the request, selections and settings.
    run_file: PathBuf,
    /// Overrides the encoder named in the run file.
    #[arg(long)]
    encoder: Option<String>,
    /// Overrides the worker count named in the run file.
    #[arg(long)]
    workers: Option<usize>,
    /// Overrides the output directory named in the run file.
    #[arg(long)]
    output_dir: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let mut run = RunFile::load(&args.run_file)?;
    if let Some(encoder) = args.encoder {
        run.encoder = encoder;
    }
    if let Some(workers) = args.workers {
        run.workers = workers;
    }
    if let Some(dir) = args.output_dir {
        run.output_dir = dir;
    }

    let level = LevelFilter::from_str(&run.log_level).unwrap_or(LevelFilter::Info);
    engine_logging::initialize(level, run.log_destination());

    let plan = runner::prepare_plan(&run)?;
    let interrupted = listen_for_interrupt()?;
    match runner::execute(&run, plan, &interrupted)? {
        RunStatus::Cancelled => anyhow::bail!("run cancelled before all combinations were sent"),
        _ => Ok(()),
    }
}

/// Raises the returned flag on the first Ctrl+C instead of killing the process.
fn listen_for_interrupt() -> anyhow::Result<Arc<AtomicBool>> {
    let interrupted = Arc::new(AtomicBool::new(false));
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let raised = interrupted.clone();
    thread::spawn(move || {
        runtime.block_on(async {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    engine_info!("Received Ctrl+C, stopping run");
                    raised.store(true, Ordering::SeqCst);
                }
                Err(err) => engine_warn!("Failed to listen for Ctrl+C: {}", err),
            }
        });
    });
    Ok(interrupted)
}
