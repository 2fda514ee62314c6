//! Configuration management for jpegresize

use std::path::{Path, PathBuf};
use serde::{Deserialize, Serialize};
use crate::error::{Result, BatchError};

/// Lowest accepted JPEG quality
pub const MIN_QUALITY: u32 = 10;
/// Highest accepted JPEG quality
pub const MAX_QUALITY: u32 = 100;

pub const DEFAULT_WIDTH: u32 = 1920;
pub const DEFAULT_HEIGHT: u32 = 1920;
pub const DEFAULT_QUALITY: u32 = 89;
pub const DEFAULT_INPUT_DIR: &str = "2. Для печати и дизайна";
pub const DEFAULT_OUTPUT_DIR: &str = "1. Для просмотра и интернета";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Batch run settings
    pub batch: BatchConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Settings for one batch run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Directory of original images
    pub input_dir: PathBuf,

    /// Directory for resized images, created if absent
    pub output_dir: PathBuf,

    /// Resize and encode parameters
    pub export: ExportConfig,

    /// Maximum number of images resized at the same time
    pub quota: usize,

    /// How workers are scheduled
    pub strategy: ProcessingStrategy,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from(DEFAULT_INPUT_DIR),
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            export: ExportConfig::default(),
            quota: num_cpus::get(),
            strategy: ProcessingStrategy::default(),
        }
    }
}

/// Resize and encode parameters shared read-only by every worker
///
/// Only `max_width` drives the scale factor. `max_height` is accepted and
/// carried through but does not constrain the output height.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    pub max_width: u32,
    pub max_height: u32,
    pub quality: u32,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            max_width: DEFAULT_WIDTH,
            max_height: DEFAULT_HEIGHT,
            quality: DEFAULT_QUALITY,
        }
    }
}

impl ExportConfig {
    pub fn new(max_width: u32, max_height: u32, quality: u32) -> Self {
        Self {
            max_width,
            max_height,
            quality,
        }
    }

    /// Check width and quality bounds
    pub fn validate(&self) -> Result<()> {
        if !(MIN_QUALITY..=MAX_QUALITY).contains(&self.quality) {
            return Err(BatchError::invalid_parameters(format!(
                "Compress rate must be in the range of {} to {}",
                MIN_QUALITY, MAX_QUALITY
            )));
        }
        if self.max_width == 0 {
            return Err(BatchError::invalid_parameters(
                "Resized image max width must be greater than 0",
            ));
        }
        Ok(())
    }

    /// Quality as passed to the JPEG encoder
    pub fn jpeg_quality(&self) -> u8 {
        u8::try_from(self.quality.clamp(MIN_QUALITY, MAX_QUALITY)).unwrap_or(u8::MAX)
    }
}

/// Strategy for parallel processing
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessingStrategy {
    /// tokio tasks gated by a semaphore, codec work on the blocking pool
    #[default]
    Async,
    /// Dedicated rayon pool sized to the quota
    Threaded,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level or filter directive (trace, debug, info, warn, error)
    pub level: String,

    /// Enable JSON logging
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            json_format: false,
        }
    }
}

impl BatchConfig {
    /// Validate run parameters before any file is touched
    pub fn validate(&self) -> Result<()> {
        self.export.validate()?;
        if self.quota == 0 {
            return Err(BatchError::invalid_parameters("Quota limit must be not zero."));
        }
        Ok(())
    }
}

impl Config {
    /// Load configuration from file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)
            .map_err(|e| BatchError::config(
                format!("Failed to read config file {:?}: {}", path.as_ref(), e)
            ))?;

        match config_extension(path.as_ref()).as_str() {
            "toml" => toml::from_str(&content).map_err(Into::into),
            "yaml" | "yml" => serde_yaml::from_str(&content).map_err(Into::into),
            _ => Err(BatchError::config(
                "Unsupported config file format. Use .toml or .yaml"
            )),
        }
    }

    /// Save configuration to file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = match config_extension(path.as_ref()).as_str() {
            "toml" => toml::to_string_pretty(self)
                .map_err(|e| BatchError::config(format!("TOML serialization failed: {}", e)))?,
            "yaml" | "yml" => serde_yaml::to_string(self)?,
            _ => return Err(BatchError::config(
                "Unsupported config file format. Use .toml or .yaml"
            )),
        };

        std::fs::write(&path, content)
            .map_err(|e| BatchError::config(
                format!("Failed to write config file {:?}: {}", path.as_ref(), e)
            ))?;

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        self.batch.validate()?;

        if self.logging.level.trim().is_empty() {
            return Err(BatchError::config("Log level must not be empty"));
        }

        Ok(())
    }
}

fn config_extension(path: &Path) -> String {
    path.extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or("")
        .to_lowercase()
}
