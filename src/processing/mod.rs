//! Core image processing functionality

use std::ffi::OsStr;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{Result, BatchError};
use crate::parallel::RunContext;

pub mod codec;
pub mod formats;
pub mod resize;

pub use codec::*;
pub use formats::*;
pub use resize::*;

/// One source image to resize
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Job {
    path: PathBuf,
}

impl Job {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn file_name(&self) -> Option<&OsStr> {
        self.path.file_name()
    }

    /// Base name for progress output
    pub fn display_name(&self) -> String {
        self.file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }
}

/// Outcome of one successfully processed job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobOutcome {
    pub source_path: PathBuf,
    pub output_path: PathBuf,
    /// Bytes on disk of the original file
    pub source_bytes: u64,
    /// Length of the encoded output
    pub output_bytes: u64,
    pub original_width: u32,
    pub original_height: u32,
    pub width: u32,
    pub height: u32,
}

impl JobOutcome {
    /// Get compression ratio (original size / output size)
    pub fn compression_ratio(&self) -> f64 {
        if self.output_bytes == 0 {
            return 1.0;
        }
        self.source_bytes as f64 / self.output_bytes as f64
    }
}

/// Runs the resize-and-write routine for single jobs
pub struct ProcessingEngine<C: ImageCodec> {
    codec: C,
    filter: FilterType,
}

impl<C: ImageCodec> ProcessingEngine<C> {
    /// Create a new processing engine using Lanczos3 resampling
    pub fn new(codec: C) -> Self {
        Self {
            codec,
            filter: FilterType::Lanczos3,
        }
    }

    pub fn codec(&self) -> &C {
        &self.codec
    }

    /// Decode, scale to the target width, encode, write, then record the
    /// result in the run statistics and emit a progress event.
    pub fn process_job(&self, job: &Job, ctx: &RunContext) -> Result<JobOutcome> {
        let source = job.path();
        debug!("Processing job: {:?}", source);

        let mut image = self.codec.decode(source)
            .map_err(|e| BatchError::decode(source, e))?;

        let source_bytes = std::fs::metadata(source)
            .map_err(|e| BatchError::stat_file(source, e))?
            .len();

        let (original_width, original_height) = (image.width(), image.height());
        let scale = width_scale(ctx.export().max_width, original_width);
        image.resize(scale, scale, self.filter)
            .map_err(|e| BatchError::resize(source, e))?;

        debug!("Resized {:?}: {}x{} -> {}x{} (scale {:.4})",
               source, original_width, original_height, image.width(), image.height(), scale);

        let encoded = image.encode(ctx.export().jpeg_quality())
            .map_err(|e| BatchError::encode(source, e))?;
        if !has_jpeg_signature(&encoded) {
            return Err(BatchError::encode(source, "encoder output is not JPEG data".into()));
        }

        let output_path = ctx.output_path_for(job)?;
        write_output(&output_path, &encoded)?;

        let outcome = JobOutcome {
            source_path: source.to_path_buf(),
            output_path,
            source_bytes,
            output_bytes: encoded.len() as u64,
            original_width,
            original_height,
            width: image.width(),
            height: image.height(),
        };

        debug!("Wrote {:?}: {} -> {} bytes ({:.1}x)",
               outcome.output_path, source_bytes, outcome.output_bytes, outcome.compression_ratio());

        ctx.complete_job(job, &outcome);
        Ok(outcome)
    }
}

/// Write encoded bytes, replacing any existing file
fn write_output(path: &Path, bytes: &[u8]) -> Result<()> {
    let file = File::create(path).map_err(|e| BatchError::write(path, e))?;
    let mut writer = BufWriter::new(file);
    writer.write_all(bytes).map_err(|e| BatchError::write(path, e))?;
    writer.flush().map_err(|e| BatchError::write(path, e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ExportConfig;
    use crate::parallel::ProgressTracker;
    use image::{DynamicImage, Rgb, RgbImage};
    use tempfile::TempDir;

    fn write_jpeg(path: &Path, width: u32, height: u32) {
        DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
            Rgb([(x % 251) as u8, (y % 241) as u8, 64])
        }))
        .save(path)
        .unwrap();
    }

    fn context(output_dir: &Path, width: u32, total: usize) -> RunContext {
        RunContext::new(
            ExportConfig::new(width, width, 89),
            output_dir.to_path_buf(),
            total,
            ProgressTracker::new(),
        )
    }

    #[test]
    fn test_job_names() {
        let job = Job::new("/photos/in/IMG_0001.jpg");
        assert_eq!(job.display_name(), "IMG_0001.jpg");
        assert_eq!(job.file_name(), Some(OsStr::new("IMG_0001.jpg")));
    }

    #[test]
    fn test_process_job_writes_scaled_output() {
        let input = TempDir::new().unwrap();
        let output = TempDir::new().unwrap();
        let source = input.path().join("wide.jpg");
        write_jpeg(&source, 400, 300);

        let ctx = context(output.path(), 200, 1);
        let engine = ProcessingEngine::new(JpegCodec::new());
        let outcome = engine.process_job(&Job::new(&source), &ctx).unwrap();

        assert_eq!(outcome.output_path, output.path().join("wide.jpg"));
        assert_eq!((outcome.width, outcome.height), (200, 150));
        assert_eq!((outcome.original_width, outcome.original_height), (400, 300));
        assert_eq!(outcome.source_bytes, std::fs::metadata(&source).unwrap().len());

        let written = std::fs::read(&outcome.output_path).unwrap();
        assert_eq!(written.len() as u64, outcome.output_bytes);
        assert!(has_jpeg_signature(&written));
        assert_eq!(image::image_dimensions(&outcome.output_path).unwrap(), (200, 150));

        let stats = ctx.stats().snapshot();
        assert_eq!(stats.files_processed, 1);
        assert_eq!(stats.source_bytes_total, outcome.source_bytes);
        assert_eq!(stats.output_bytes_total, outcome.output_bytes);
    }

    #[test]
    fn test_process_job_overwrites_existing_output() {
        let input = TempDir::new().unwrap();
        let output = TempDir::new().unwrap();
        let source = input.path().join("photo.jpg");
        write_jpeg(&source, 64, 64);
        std::fs::write(output.path().join("photo.jpg"), vec![0u8; 1 << 16]).unwrap();

        let ctx = context(output.path(), 32, 1);
        let outcome = ProcessingEngine::new(JpegCodec::new())
            .process_job(&Job::new(&source), &ctx)
            .unwrap();

        let on_disk = std::fs::metadata(&outcome.output_path).unwrap().len();
        assert_eq!(on_disk, outcome.output_bytes);
    }

    #[test]
    fn test_decode_failure_leaves_statistics_untouched() {
        let input = TempDir::new().unwrap();
        let output = TempDir::new().unwrap();
        let source = input.path().join("corrupt.jpg");
        std::fs::write(&source, b"\xFF\xD8\xFF truncated").unwrap();

        let ctx = context(output.path(), 100, 1);
        let err = ProcessingEngine::new(JpegCodec::new())
            .process_job(&Job::new(&source), &ctx)
            .unwrap_err();

        assert!(matches!(err, BatchError::Decode { .. }));
        assert_eq!(err.file_path(), Some(source.as_path()));
        assert_eq!(ctx.stats().snapshot().files_processed, 0);
        assert!(!output.path().join("corrupt.jpg").exists());
    }

    #[test]
    fn test_write_failure_is_reported() {
        let input = TempDir::new().unwrap();
        let source = input.path().join("photo.jpg");
        write_jpeg(&source, 32, 32);

        let missing_output = input.path().join("no-such-dir");
        let ctx = context(&missing_output, 16, 1);
        let err = ProcessingEngine::new(JpegCodec::new())
            .process_job(&Job::new(&source), &ctx)
            .unwrap_err();

        assert!(matches!(err, BatchError::Write { .. }));
    }

    struct RawCodec;

    struct RawImage;

    impl CodecImage for RawImage {
        fn width(&self) -> u32 {
            8
        }

        fn height(&self) -> u32 {
            8
        }

        fn resize(&mut self, _hscale: f64, _vscale: f64, _filter: FilterType) -> std::result::Result<(), crate::error::CodecError> {
            Ok(())
        }

        fn encode(&self, _quality: u8) -> std::result::Result<Vec<u8>, crate::error::CodecError> {
            Ok(b"P6 8 8 255".to_vec())
        }
    }

    impl ImageCodec for RawCodec {
        type Image = RawImage;

        fn decode(&self, _path: &Path) -> std::result::Result<RawImage, crate::error::CodecError> {
            Ok(RawImage)
        }
    }

    #[test]
    fn test_non_jpeg_encoder_output_rejected() {
        let input = TempDir::new().unwrap();
        let output = TempDir::new().unwrap();
        let source = input.path().join("photo.jpg");
        std::fs::write(&source, b"placeholder").unwrap();

        let ctx = context(output.path(), 8, 1);
        let err = ProcessingEngine::new(RawCodec)
            .process_job(&Job::new(&source), &ctx)
            .unwrap_err();

        assert!(matches!(err, BatchError::Encode { .. }));
        assert!(!output.path().join("photo.jpg").exists());
        assert_eq!(ctx.stats().snapshot().files_processed, 0);
    }

    #[test]
    fn test_compression_ratio() {
        let outcome = JobOutcome {
            source_path: PathBuf::from("in.jpg"),
            output_path: PathBuf::from("out.jpg"),
            source_bytes: 1_000_000,
            output_bytes: 250_000,
            original_width: 4000,
            original_height: 3000,
            width: 1920,
            height: 1440,
        };
        assert!((outcome.compression_ratio() - 4.0).abs() < f64::EPSILON);
    }
}
