/// Local parallel task queue for mesh work.
use crate::constants::{PROGRESS_CHARS, PROGRESS_TEMPLATE};
use crate::error::{Error, Result};
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use tracing::{debug, info};

/// Unit of work that can run on any worker.
pub trait RegisteredTask: Send + Sync {
    fn execute(&self) -> Result<()>;

    /// Short description used in logs and errors.
    fn describe(&self) -> String;
}

/// Runs task batches on a fixed pool of worker threads.
/// Every `insert_all` blocks until the batch has drained.
pub struct LocalTaskQueue {
    pool: ThreadPool,
    parallel: usize,
    executed: usize,
}

impl LocalTaskQueue {
    pub fn new(parallel: usize) -> Result<Self> {
        let parallel = parallel.max(1);
        let pool = ThreadPoolBuilder::new()
            .num_threads(parallel)
            .thread_name(|i| format!("task-worker-{}", i))
            .build()
            .map_err(|e| Error::Task(format!("Could not start task workers: {}", e)))?;

        Ok(Self {
            pool,
            parallel,
            executed: 0,
        })
    }

    /// Worker count.
    pub fn parallel(&self) -> usize {
        self.parallel
    }

    /// Tasks completed so far.
    pub fn executed(&self) -> usize {
        self.executed
    }

    /// Executes `tasks` and waits for all of them. Returns the batch size.
    /// The first failing task aborts the batch and is reported.
    pub fn insert_all<T: RegisteredTask>(&mut self, tasks: Vec<T>, label: &str) -> Result<usize> {
        let count = tasks.len();
        info!("Running {} {} on {} workers", count, label, self.parallel);

        let pb = ProgressBar::new(count as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template(PROGRESS_TEMPLATE)
                .map_err(|e| Error::Task(e.to_string()))?
                .progress_chars(PROGRESS_CHARS),
        );
        pb.set_message(label.to_string());

        let result = self.pool.install(|| {
            tasks.par_iter().try_for_each(|task| {
                debug!(task = %task.describe(), "Executing task");
                let outcome = task
                    .execute()
                    .map_err(|e| Error::Task(format!("{}: {}", task.describe(), e)));
                pb.inc(1);
                outcome
            })
        });

        match result {
            Ok(()) => {
                pb.finish_with_message(format!("{} done", label));
                self.executed += count;
                Ok(count)
            }
            Err(err) => {
                pb.abandon_with_message(format!("{} failed", label));
                Err(err)
            }
        }
    }
}
