//! Error types and handling for jpegresize

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Result type alias for jpegresize operations
pub type Result<T> = std::result::Result<T, BatchError>;

/// Opaque error produced by an image codec implementation
pub type CodecError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Main error type for batch operations
///
/// Every variant is fatal for the run: the pool stops dispatching new jobs
/// on the first one it sees and the driver surfaces it unchanged.
#[derive(Debug, Error)]
pub enum BatchError {
    /// Input directory missing, unreadable or not a directory
    #[error("Failed to read input directory {path:?}: {source}")]
    DirectoryAccess {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Output directory could not be created
    #[error("Failed to make directory {path:?}: {source}")]
    OutputDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Source image could not be decoded
    #[error("Failed to open image: {path:?}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: CodecError,
    },

    /// Source file size could not be read
    #[error("Failed to get filesize of {path:?}: {source}")]
    StatFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Resampling failed
    #[error("Failed to resize image: {path:?}: {source}")]
    Resize {
        path: PathBuf,
        #[source]
        source: CodecError,
    },

    /// JPEG encoding failed
    #[error("Failed to export image: {path:?}: {source}")]
    Encode {
        path: PathBuf,
        #[source]
        source: CodecError,
    },

    /// Encoded bytes could not be written to the output directory
    #[error("Failed to write image to {path:?}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Invalid run parameters (quality, quota, width)
    #[error("Invalid parameters: {message}")]
    InvalidParameters { message: String },

    /// Configuration errors
    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    SerdeError(String),

    /// Worker pool errors (task join failures, pool construction)
    #[error("Parallel processing error: {message}")]
    ParallelError { message: String },

    /// I/O errors without a more specific home
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

impl BatchError {
    pub fn directory_access(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::DirectoryAccess {
            path: path.into(),
            source,
        }
    }

    pub fn output_directory(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::OutputDirectory {
            path: path.into(),
            source,
        }
    }

    pub fn decode(path: impl Into<PathBuf>, source: CodecError) -> Self {
        Self::Decode {
            path: path.into(),
            source,
        }
    }

    pub fn stat_file(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::StatFile {
            path: path.into(),
            source,
        }
    }

    pub fn resize(path: impl Into<PathBuf>, source: CodecError) -> Self {
        Self::Resize {
            path: path.into(),
            source,
        }
    }

    pub fn encode(path: impl Into<PathBuf>, source: CodecError) -> Self {
        Self::Encode {
            path: path.into(),
            source,
        }
    }

    pub fn write(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Write {
            path: path.into(),
            source,
        }
    }

    /// Create a new invalid parameters error
    pub fn invalid_parameters<S: Into<String>>(message: S) -> Self {
        Self::InvalidParameters {
            message: message.into(),
        }
    }

    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::ConfigError {
            message: message.into(),
        }
    }

    /// Create a new parallel processing error
    pub fn parallel<S: Into<String>>(message: S) -> Self {
        Self::ParallelError {
            message: message.into(),
        }
    }

    /// Get the associated file path if available
    pub fn file_path(&self) -> Option<&Path> {
        match self {
            Self::DirectoryAccess { path, .. }
            | Self::OutputDirectory { path, .. }
            | Self::Decode { path, .. }
            | Self::StatFile { path, .. }
            | Self::Resize { path, .. }
            | Self::Encode { path, .. }
            | Self::Write { path, .. } => Some(path),
            _ => None,
        }
    }

    /// Get a user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            Self::InvalidParameters { message } => message.clone(),
            Self::DirectoryAccess { path, source } => {
                format!("Failed to find input dir: {} ({})", path.display(), source)
            }
            Self::Decode { path, source } => {
                let dir = path
                    .parent()
                    .map(|p| p.display().to_string())
                    .unwrap_or_default();
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                format!("Failed to open image: {} from {} {}", name, dir, source)
            }
            other => other.to_string(),
        }
    }
}

// Convert serde errors to our error type
impl From<toml::de::Error> for BatchError {
    fn from(err: toml::de::Error) -> Self {
        Self::SerdeError(format!("TOML parsing error: {}", err))
    }
}

impl From<serde_yaml::Error> for BatchError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::SerdeError(format!("YAML parsing error: {}", err))
    }
}
