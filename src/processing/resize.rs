//! Scale computation and resampling filters

/// Available resize filters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FilterType {
    /// Triangle (linear interpolation)
    Triangle,
    /// Lanczos with radius 3 (high quality, recommended)
    #[default]
    Lanczos3,
}

impl From<FilterType> for image::imageops::FilterType {
    fn from(filter: FilterType) -> Self {
        match filter {
            FilterType::Triangle => image::imageops::FilterType::Triangle,
            FilterType::Lanczos3 => image::imageops::FilterType::Lanczos3,
        }
    }
}

/// Uniform scale factor that brings `source_width` to `target_width`.
///
/// Factors above 1.0 are returned as-is: narrower images are upscaled.
pub fn width_scale(target_width: u32, source_width: u32) -> f64 {
    f64::from(target_width) / f64::from(source_width.max(1))
}

/// Dimensions after applying independent horizontal and vertical scales.
///
/// Each side is rounded to the nearest pixel and never drops below 1.
pub fn scaled_dimensions(width: u32, height: u32, hscale: f64, vscale: f64) -> (u32, u32) {
    (scale_side(width, hscale), scale_side(height, vscale))
}

fn scale_side(side: u32, scale: f64) -> u32 {
    let scaled = (f64::from(side) * scale).round();
    if scaled < 1.0 {
        1
    } else if scaled >= f64::from(u32::MAX) {
        u32::MAX
    } else {
        scaled as u32
    }
}
