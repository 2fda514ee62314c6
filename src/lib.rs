//! jpegresize - bounded-parallel batch JPEG resizer
//!
//! Resizes every `*.jpg` file in a directory to a target width, re-encodes it
//! at a given JPEG quality and writes it under the same name into an output
//! directory. At most `quota` images are processed at the same time, and the
//! first failing image aborts the whole batch.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use jpegresize::{BatchConfig, BatchDriver, ExportConfig};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = BatchConfig {
//!     input_dir: "originals".into(),
//!     output_dir: "web".into(),
//!     export: ExportConfig::new(1920, 1920, 85),
//!     quota: 4,
//!     ..BatchConfig::default()
//! };
//!
//! let report = BatchDriver::new(config).run().await?;
//! println!("{}", report.summary_line());
//! # Ok(())
//! # }
//! ```

#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod batch;
pub mod config;
pub mod error;
pub mod parallel;
pub mod processing;

// Re-export commonly used types
pub use batch::{discover_jobs, ensure_output_dir, BatchDriver, BatchReport};
pub use config::{BatchConfig, Config, ExportConfig, LoggingConfig, ProcessingStrategy};
pub use error::{BatchError, Result};
pub use parallel::{ParallelProcessor, RunContext, RunStatistics, StatisticsAggregator};
pub use processing::{CodecImage, ImageCodec, Job, JpegCodec, ProcessingEngine};

use tracing::info;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize logging from a [`LoggingConfig`]
///
/// Logs go to stderr so they never interleave with progress lines on stdout.
/// `RUST_LOG` takes precedence over the configured level. Safe to call more
/// than once; only the first subscriber is installed.
pub fn init(logging: &LoggingConfig) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(&logging.level))
        .map_err(|e| BatchError::config(format!("Invalid log level {:?}: {}", logging.level, e)))?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    let installed = if logging.json_format {
        tracing::subscriber::set_global_default(builder.json().finish()).is_ok()
    } else {
        tracing::subscriber::set_global_default(builder.finish()).is_ok()
    };

    if installed {
        info!("jpegresize v{} initialized", VERSION);
        log_system_capabilities();
    }

    Ok(())
}

fn log_system_capabilities() {
    use sysinfo::{System, SystemExt};

    let mut system = System::new();
    system.refresh_memory();

    info!(
        "Detected {} logical CPUs ({} physical), {}MB memory available",
        num_cpus::get(),
        num_cpus::get_physical(),
        system.available_memory() / (1024 * 1024)
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_is_set() {
        assert!(!VERSION.is_empty());
        assert!(VERSION.contains('.'));
    }

    #[test]
    fn test_init() {
        // Should not fail on multiple calls
        let logging = LoggingConfig::default();
        assert!(init(&logging).is_ok());
        assert!(init(&logging).is_ok());
    }
}
