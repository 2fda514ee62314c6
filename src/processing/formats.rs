//! Input file selection

use std::path::Path;

/// File name suffix of inputs picked up from the input directory
pub const JPEG_SUFFIX: &str = ".jpg";

/// Whether a file name matches `*.jpg`.
///
/// The match is case-sensitive: `photo.JPG` and `photo.jpeg` are not inputs.
/// A file named just `.jpg` is.
pub fn is_batch_input<P: AsRef<Path>>(path: P) -> bool {
    path.as_ref()
        .file_name()
        .map_or(false, |name| name.to_string_lossy().ends_with(JPEG_SUFFIX))
}

/// JPEG start-of-image marker
pub fn has_jpeg_signature(data: &[u8]) -> bool {
    data.starts_with(&[0xFF, 0xD8, 0xFF])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_is_case_sensitive() {
        assert!(is_batch_input("a/b/photo.jpg"));
        assert!(!is_batch_input("photo.JPG"));
        assert!(!is_batch_input("photo.jpeg"));
        assert!(!is_batch_input("photo.png"));
        assert!(!is_batch_input("jpg"));
        assert!(!is_batch_input("photo.jpg.png"));
    }

    #[test]
    fn test_bare_suffix_is_an_input() {
        assert!(is_batch_input(".jpg"));
        assert!(is_batch_input("in/.jpg"));
    }

    #[test]
    fn test_jpeg_signature() {
        assert!(has_jpeg_signature(&[0xFF, 0xD8, 0xFF, 0xE0, 0x00]));
        assert!(!has_jpeg_signature(b"\x89PNG\r\n"));
        assert!(!has_jpeg_signature(&[0xFF]));
    }
}
