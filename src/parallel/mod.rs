//! Bounded worker pool for batch operations

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;
use rayon::prelude::*;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use crate::config::{ExportConfig, ProcessingStrategy};
use crate::error::{Result, BatchError};
use crate::processing::{ImageCodec, Job, JobOutcome, ProcessingEngine};

pub mod progress;
pub mod stats;

pub use progress::*;
pub use stats::*;

/// Everything a job needs from its run, passed explicitly to every worker
#[derive(Debug)]
pub struct RunContext {
    export: ExportConfig,
    output_dir: PathBuf,
    stats: StatisticsAggregator,
    progress: ProgressTracker,
}

impl RunContext {
    pub fn new(
        export: ExportConfig,
        output_dir: PathBuf,
        total_jobs: usize,
        progress: ProgressTracker,
    ) -> Self {
        Self {
            export,
            output_dir,
            stats: StatisticsAggregator::new(total_jobs),
            progress,
        }
    }

    pub fn export(&self) -> &ExportConfig {
        &self.export
    }

    pub fn stats(&self) -> &StatisticsAggregator {
        &self.stats
    }

    pub fn progress(&self) -> &ProgressTracker {
        &self.progress
    }

    /// Destination for a job: the output directory plus the source base name.
    ///
    /// Two sources with the same base name map to the same destination and
    /// race on it; nothing here deduplicates them.
    pub fn output_path_for(&self, job: &Job) -> Result<PathBuf> {
        let file_name = job.file_name().ok_or_else(|| {
            BatchError::write(
                job.path(),
                std::io::Error::new(std::io::ErrorKind::InvalidInput, "source has no file name"),
            )
        })?;
        Ok(self.output_dir.join(file_name))
    }

    /// Fold a finished job into the statistics and announce it
    pub fn complete_job(&self, job: &Job, outcome: &JobOutcome) {
        let totals = self.stats.record(outcome.source_bytes, outcome.output_bytes);
        let total = self.stats.total_jobs();
        let remaining = total.saturating_sub(totals.files_processed as usize) + 1;

        self.progress.file_completed(
            job.display_name(),
            remaining,
            total,
            outcome.source_bytes,
            outcome.output_bytes,
        );
    }
}

/// First-error latch shared by the workers of one batch
///
/// Once tripped no further job is started. Only the first error is kept.
#[derive(Debug, Default)]
pub struct AbortSignal {
    tripped: AtomicBool,
    first_error: Mutex<Option<BatchError>>,
}

impl AbortSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_tripped(&self) -> bool {
        self.tripped.load(Ordering::Acquire)
    }

    /// Record `error` if it is the first one and stop further dispatch
    pub fn trip(&self, error: BatchError) {
        let mut slot = self.first_error.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.is_none() {
            warn!("Aborting batch: {}", error);
            *slot = Some(error);
        } else {
            debug!("Additional failure after abort: {}", error);
        }
        self.tripped.store(true, Ordering::Release);
    }

    pub fn take_error(&self) -> Option<BatchError> {
        self.first_error.lock().unwrap_or_else(PoisonError::into_inner).take()
    }
}

/// Parallel batch processor bounding the number of jobs in flight
pub struct ParallelProcessor<C: ImageCodec> {
    engine: Arc<ProcessingEngine<C>>,
    quota: usize,
    strategy: ProcessingStrategy,
}

impl<C: ImageCodec> Clone for ParallelProcessor<C> {
    fn clone(&self) -> Self {
        Self {
            engine: Arc::clone(&self.engine),
            quota: self.quota,
            strategy: self.strategy,
        }
    }
}

impl<C: ImageCodec> ParallelProcessor<C> {
    /// Create a new parallel processor; a quota of zero is rejected
    pub fn new(engine: ProcessingEngine<C>, quota: usize) -> Result<Self> {
        if quota == 0 {
            return Err(BatchError::invalid_parameters("Quota limit must be not zero."));
        }

        info!("Initializing parallel processor with {} concurrent workers", quota);

        Ok(Self {
            engine: Arc::new(engine),
            quota,
            strategy: ProcessingStrategy::Async,
        })
    }

    pub fn with_strategy(mut self, strategy: ProcessingStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn engine(&self) -> &ProcessingEngine<C> {
        &self.engine
    }

    /// Run every job at most once and return the final statistics.
    ///
    /// Returns only after all started jobs have finished. On the first job
    /// error no further job is started and that error is returned.
    pub async fn process_batch(
        &self,
        jobs: Vec<Job>,
        ctx: Arc<RunContext>,
    ) -> Result<RunStatistics> {
        let start_time = Instant::now();
        let total_jobs = jobs.len();
        if ctx.stats().total_jobs() != total_jobs {
            return Err(BatchError::invalid_parameters(format!(
                "Run context expects {} jobs but {} were submitted",
                ctx.stats().total_jobs(),
                total_jobs
            )));
        }
        info!("Starting {:?} processing of {} files", self.strategy, total_jobs);

        let abort = Arc::new(AbortSignal::new());
        match self.strategy {
            ProcessingStrategy::Async => {
                self.process_jobs_async(jobs, Arc::clone(&ctx), Arc::clone(&abort)).await;
            }
            ProcessingStrategy::Threaded => {
                let processor = self.clone();
                let (ctx, abort) = (Arc::clone(&ctx), Arc::clone(&abort));
                tokio::task::spawn_blocking(move || processor.process_jobs_threaded(&jobs, &ctx, &abort))
                    .await
                    .map_err(|e| BatchError::parallel(format!("Task join error: {}", e)))??;
            }
        }

        if let Some(error) = abort.take_error() {
            return Err(error);
        }

        let totals = ctx.stats().snapshot();
        info!("Parallel processing of {}/{} files completed in {:.2}s",
              totals.files_processed, total_jobs, start_time.elapsed().as_secs_f64());
        Ok(totals)
    }

    /// One tokio task per job, gated by a semaphore of `quota` permits
    async fn process_jobs_async(
        &self,
        jobs: Vec<Job>,
        ctx: Arc<RunContext>,
        abort: Arc<AbortSignal>,
    ) {
        let semaphore = Arc::new(Semaphore::new(self.quota));
        let mut tasks = Vec::with_capacity(jobs.len());

        for job in jobs {
            let engine = Arc::clone(&self.engine);
            let semaphore = Arc::clone(&semaphore);
            let ctx = Arc::clone(&ctx);
            let abort = Arc::clone(&abort);

            tasks.push(tokio::spawn(async move {
                // Closed once the batch aborts
                let Ok(_permit) = semaphore.clone().acquire_owned().await else {
                    return;
                };
                if abort.is_tripped() {
                    return;
                }

                let outcome = tokio::task::spawn_blocking({
                    let ctx = Arc::clone(&ctx);
                    move || engine.process_job(&job, &ctx)
                })
                .await
                .map_err(|e| BatchError::parallel(format!("Task join error: {}", e)))
                .and_then(|result| result);

                if let Err(error) = outcome {
                    abort.trip(error);
                    semaphore.close();
                }
            }));
        }

        for joined in futures::future::join_all(tasks).await {
            if let Err(e) = joined {
                abort.trip(BatchError::parallel(format!("Task join error: {}", e)));
            }
        }
    }

    /// Dedicated rayon pool with exactly `quota` threads
    fn process_jobs_threaded(
        &self,
        jobs: &[Job],
        ctx: &RunContext,
        abort: &AbortSignal,
    ) -> Result<()> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.quota)
            .thread_name(|index| format!("resize-worker-{}", index))
            .build()
            .map_err(|e| BatchError::parallel(format!("Failed to build thread pool: {}", e)))?;

        pool.install(|| {
            jobs.par_iter().for_each(|job| {
                if abort.is_tripped() {
                    return;
                }
                if let Err(error) = self.engine.process_job(job, ctx) {
                    abort.trip(error);
                }
            });
        });

        Ok(())
    }
}
