//! Batch driver: validate, enumerate, run the pool, report

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::config::BatchConfig;
use crate::error::{Result, BatchError};
use crate::parallel::{ParallelProcessor, ProgressTracker, RunContext, RunStatistics};
use crate::processing::{is_batch_input, ImageCodec, Job, JpegCodec, ProcessingEngine};

const MIB: u64 = 1024 * 1024;

/// Final report of a successful run
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub total_jobs: usize,
    pub statistics: RunStatistics,
    pub elapsed: Duration,
}

impl BatchReport {
    /// `TOTAL: 3 files processed, 12M -> 1M. Took time: 1.204s`
    ///
    /// The elapsed time is rounded to the nearest millisecond.
    pub fn summary_line(&self) -> String {
        let millis = (self.elapsed.as_nanos() + 500_000) / 1_000_000;
        let elapsed = Duration::from_millis(millis.try_into().unwrap_or(u64::MAX));
        format!(
            "TOTAL: {} files processed, {}M -> {}M. Took time: {:?}",
            self.statistics.files_processed,
            self.statistics.source_bytes_total / MIB,
            self.statistics.output_bytes_total / MIB,
            elapsed,
        )
    }
}

/// List the batch inputs directly inside `input_dir`, sorted by file name.
pub fn discover_jobs(input_dir: &Path) -> Result<Vec<Job>> {
    let metadata = std::fs::metadata(input_dir)
        .map_err(|e| BatchError::directory_access(input_dir, e))?;
    if !metadata.is_dir() {
        return Err(BatchError::directory_access(
            input_dir,
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "not a directory"),
        ));
    }

    let mut jobs = Vec::new();
    for entry in WalkDir::new(input_dir)
        .min_depth(1)
        .max_depth(1)
        .follow_links(true)
        .sort_by_file_name()
    {
        let entry = entry.map_err(|e| BatchError::directory_access(input_dir, e.into()))?;
        if entry.file_type().is_file() && is_batch_input(entry.path()) {
            jobs.push(Job::new(entry.into_path()));
        }
    }

    debug!("Discovered {} jobs in {:?}", jobs.len(), input_dir);
    Ok(jobs)
}

/// Create the output directory if absent. Returns `true` when it was created.
pub fn ensure_output_dir(output_dir: &Path) -> Result<bool> {
    if output_dir.is_dir() {
        return Ok(false);
    }

    let mut builder = std::fs::DirBuilder::new();
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o755);
    }
    builder.create(output_dir)
        .map_err(|e| BatchError::output_directory(output_dir, e))?;

    info!("Created output directory {:?}", output_dir);
    Ok(true)
}

/// Drives one batch run from configuration to final report
pub struct BatchDriver<C: ImageCodec = JpegCodec> {
    config: BatchConfig,
    codec: C,
    progress: ProgressTracker,
}

impl BatchDriver<JpegCodec> {
    pub fn new(config: BatchConfig) -> Self {
        Self::with_codec(config, JpegCodec::new())
    }
}

impl<C: ImageCodec> BatchDriver<C> {
    pub fn with_codec(config: BatchConfig, codec: C) -> Self {
        Self {
            config,
            codec,
            progress: ProgressTracker::new(),
        }
    }

    /// Progress events for this driver's runs
    pub fn progress(&self) -> &ProgressTracker {
        &self.progress
    }

    /// Run the batch. Consumes the driver because the codec moves into the pool.
    ///
    /// An `Aborted` progress event is emitted on any error.
    pub async fn run(self) -> Result<BatchReport> {
        let progress = self.progress.clone();
        let result = self.run_inner().await;
        if let Err(error) = &result {
            progress.abort(error.user_message());
        }
        result
    }

    async fn run_inner(self) -> Result<BatchReport> {
        let start_time = Instant::now();
        self.config.validate()?;

        let BatchDriver { config, codec, progress } = self;
        let jobs = discover_jobs(&config.input_dir)?;
        if !config.output_dir.is_dir() {
            progress.creating_output_directory(&config.output_dir);
        }
        ensure_output_dir(&config.output_dir)?;

        info!("Starting batch: {} files from {:?} to {:?}",
              jobs.len(), config.input_dir, config.output_dir);

        let total_jobs = jobs.len();
        let ctx = Arc::new(RunContext::new(
            config.export,
            config.output_dir.clone(),
            total_jobs,
            progress.clone(),
        ));
        let processor = ParallelProcessor::new(ProcessingEngine::new(codec), config.quota)?
            .with_strategy(config.strategy);

        progress.start(total_jobs);
        let statistics = processor.process_batch(jobs, ctx).await?;
        let elapsed = start_time.elapsed();
        progress.complete_batch(statistics, elapsed);

        Ok(BatchReport {
            total_jobs,
            statistics,
            elapsed,
        })
    }
}
