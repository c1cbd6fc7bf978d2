//! `debsched` — a demonstration harness that loads a recipe set, builds a
//! [`debsched_core::Schedule`], and drains it with a simulated worker pool.
//!
//! This binary is an integration-test surface for the scheduler, not part of
//! its public contract: a real deployment would swap [`debsched_core::InMemoryPackageIndex`]
//! for an APT-backed one and replace [`worker::simulate_build`]-style stubs
//! with real build execution.

mod worker;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use debsched_core::{
    build_schedule_from_config, DscControlFileReader, InMemoryPackageIndex, ScheduleConfig,
};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use worker::WorkerPoolOptions;

/// Build-schedule a set of Debian source recipes and drive them through a
/// simulated worker pool.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Opts {
    /// Recipe-list file: one recipe path per line.
    #[arg(long)]
    recipes: PathBuf,

    /// Circular-declarations file naming allowed build cycles and their
    /// serial order. Omit if the recipe set has no declared cycles.
    #[arg(long)]
    declarations: Option<PathBuf>,

    /// Number of simulated build worker threads. Defaults to the available
    /// CPU count.
    #[arg(long)]
    workers: Option<usize>,

    /// Recipes requested per `next_batch` call.
    #[arg(long, default_value_t = debsched_core::config::DEFAULT_BATCH_SIZE)]
    batch_size: usize,

    /// Probability in `[0.0, 1.0]` that a dispensed recipe is reported as a
    /// failure, to exercise the retry path.
    #[arg(long, default_value_t = 0.0)]
    fail_rate: f64,
}

fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "debsched=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let opts = Opts::parse();

    let mut config = ScheduleConfig::new(opts.recipes.clone()).with_batch_size(opts.batch_size);
    if let Some(declarations) = opts.declarations.clone() {
        config = config.with_declarations(declarations);
    }

    let index = InMemoryPackageIndex::new();
    let schedule = match build_schedule_from_config(&config, DscControlFileReader, &index) {
        Ok(schedule) => Arc::new(schedule),
        Err(err) => {
            tracing::error!(error = %err, "failed to build schedule");
            return ExitCode::FAILURE;
        }
    };

    let worker_options = WorkerPoolOptions {
        workers: opts.workers.unwrap_or_else(num_cpus::get),
        batch_size: opts.batch_size,
        fail_rate: opts.fail_rate,
    };

    println!(
        "dispatching with {} worker(s), batch size {}",
        worker_options.workers, worker_options.batch_size
    );

    let progress = {
        let schedule = Arc::clone(&schedule);
        std::thread::spawn(move || report_progress(&schedule))
    };

    worker::run(Arc::clone(&schedule), worker_options);
    if progress.join().is_err() {
        tracing::warn!("progress reporter thread panicked");
    }

    let stats = schedule.stats();
    println!(
        "done: {}/{} recipes accomplished across {} group(s)",
        stats.overall.accomplished,
        stats.overall.total,
        stats.groups.len()
    );

    ExitCode::SUCCESS
}

fn report_progress(schedule: &debsched_core::Schedule) {
    loop {
        let stats = schedule.stats();
        println!(
            "progress: {} accomplished, {} building, {} ready, {} waiting (of {})",
            stats.overall.accomplished,
            stats.overall.building,
            stats.overall.ready,
            stats.overall.waiting,
            stats.overall.total
        );
        if stats.done {
            return;
        }
        std::thread::sleep(Duration::from_millis(50));
    }
}
