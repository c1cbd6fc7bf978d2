//! Simulated build worker pool: a concrete instantiation of the concurrency
//! model in spec §5 — each worker thread holds no lock of its own between
//! calls, taking the schedule's mutex only for the duration of one
//! `next_batch`/`report_success`/`report_failure` call.

use std::sync::Arc;
use std::time::Duration;

use debsched_core::Schedule;
use rand::Rng;

/// Options controlling the simulated worker pool.
#[derive(Debug, Clone, Copy)]
pub struct WorkerPoolOptions {
    /// Number of worker threads to spawn.
    pub workers: usize,
    /// How many recipes each worker requests per `next_batch` call.
    pub batch_size: usize,
    /// Probability (0.0-1.0) that a dispensed recipe is reported as failed,
    /// for demonstrating the `report_failure` / retry path.
    pub fail_rate: f64,
}

/// Run `workers` simulated build threads against `schedule` until it's
/// `Done`, then return.
pub fn run(schedule: Arc<Schedule>, options: WorkerPoolOptions) {
    let handles: Vec<_> = (0..options.workers.max(1))
        .map(|worker_id| {
            let schedule = Arc::clone(&schedule);
            std::thread::spawn(move || worker_loop(worker_id, &schedule, options))
        })
        .collect();

    for handle in handles {
        if handle.join().is_err() {
            tracing::error!("a build worker thread panicked");
        }
    }
}

fn worker_loop(worker_id: usize, schedule: &Schedule, options: WorkerPoolOptions) {
    loop {
        let batch = match schedule.next_batch(options.batch_size.clamp(1, 99)) {
            Ok(batch) => batch,
            Err(err) => {
                tracing::error!(worker = worker_id, error = %err, "next_batch rejected");
                return;
            }
        };

        if batch.is_empty() {
            if schedule.is_done() {
                return;
            }
            // Nothing ready right now; another worker holds the only
            // in-flight slot of a Circular group, or we're between layers.
            std::thread::sleep(Duration::from_millis(5));
            continue;
        }

        for recipe in batch {
            simulate_build(recipe, worker_id, schedule, options);
        }
    }
}

fn simulate_build(
    recipe: debsched_core::RecipeId,
    worker_id: usize,
    schedule: &Schedule,
    options: WorkerPoolOptions,
) {
    let mut rng = rand::thread_rng();
    std::thread::sleep(Duration::from_millis(rng.gen_range(1..10)));

    if rng.gen_bool(options.fail_rate.clamp(0.0, 1.0)) {
        tracing::debug!(worker = worker_id, recipe = %recipe, "simulated build failure");
        if let Err(err) = schedule.report_failure(recipe) {
            tracing::error!(worker = worker_id, recipe = %recipe, error = %err, "report_failure rejected");
        }
    } else {
        tracing::debug!(worker = worker_id, recipe = %recipe, "simulated build success");
        if let Err(err) = schedule.report_success(recipe) {
            tracing::error!(worker = worker_id, recipe = %recipe, error = %err, "report_success rejected");
        }
    }
}
