//! Image codec boundary
//!
//! The pipeline only needs four capabilities from a codec: decode a file,
//! report the decoded width, resample by a scale factor and encode to JPEG
//! bytes. [`JpegCodec`] provides them on top of the `image` crate; tests plug
//! in their own implementations to inject failures or observe concurrency.

use std::path::Path;

use image::codecs::jpeg::JpegEncoder;
use image::{ColorType, DynamicImage};
use tracing::debug;

use crate::error::CodecError;
use super::resize::{scaled_dimensions, FilterType};

/// Decoder half of the codec boundary
pub trait ImageCodec: Send + Sync + 'static {
    /// In-memory image produced by [`ImageCodec::decode`]
    type Image: CodecImage;

    /// Decode the file at `path`
    fn decode(&self, path: &Path) -> Result<Self::Image, CodecError>;
}

/// Operations available on a decoded image
pub trait CodecImage: Send {
    fn width(&self) -> u32;

    fn height(&self) -> u32;

    /// Resample in place by independent horizontal and vertical factors
    fn resize(&mut self, hscale: f64, vscale: f64, filter: FilterType) -> Result<(), CodecError>;

    /// Encode to JPEG at `quality` (1-100)
    fn encode(&self, quality: u8) -> Result<Vec<u8>, CodecError>;
}

/// Production codec backed by the `image` crate
#[derive(Debug, Clone, Copy, Default)]
pub struct JpegCodec;

impl JpegCodec {
    pub fn new() -> Self {
        Self
    }
}

impl ImageCodec for JpegCodec {
    type Image = JpegImage;

    fn decode(&self, path: &Path) -> Result<JpegImage, CodecError> {
        let inner = image::io::Reader::open(path)?
            .with_guessed_format()?
            .decode()?;

        debug!("Decoded {:?}: {}x{}", path, inner.width(), inner.height());
        Ok(JpegImage { inner })
    }
}

/// Decoded image held by [`JpegCodec`]
#[derive(Debug, Clone)]
pub struct JpegImage {
    inner: DynamicImage,
}

impl JpegImage {
    pub fn from_dynamic(inner: DynamicImage) -> Self {
        Self { inner }
    }

    pub fn into_inner(self) -> DynamicImage {
        self.inner
    }
}

impl CodecImage for JpegImage {
    fn width(&self) -> u32 {
        self.inner.width()
    }

    fn height(&self) -> u32 {
        self.inner.height()
    }

    fn resize(&mut self, hscale: f64, vscale: f64, filter: FilterType) -> Result<(), CodecError> {
        let (width, height) = (self.inner.width(), self.inner.height());
        if width == 0 || height == 0 {
            return Err(format!("cannot resample an empty {}x{} image", width, height).into());
        }
        if !hscale.is_finite() || !vscale.is_finite() || hscale <= 0.0 || vscale <= 0.0 {
            return Err(format!("invalid scale factors {}x{}", hscale, vscale).into());
        }

        let (target_width, target_height) = scaled_dimensions(width, height, hscale, vscale);
        if (target_width, target_height) == (width, height) {
            return Ok(());
        }

        self.inner = self.inner.resize_exact(target_width, target_height, filter.into());
        Ok(())
    }

    fn encode(&self, quality: u8) -> Result<Vec<u8>, CodecError> {
        let mut buffer = Vec::new();
        {
            let mut encoder = JpegEncoder::new_with_quality(&mut buffer, quality);
            match &self.inner {
                DynamicImage::ImageLuma8(gray) => {
                    encoder.encode(gray.as_raw(), gray.width(), gray.height(), ColorType::L8)?;
                }
                other => {
                    let rgb = other.to_rgb8();
                    encoder.encode(rgb.as_raw(), rgb.width(), rgb.height(), ColorType::Rgb8)?;
                }
            }
        }
        Ok(buffer)
    }
}
