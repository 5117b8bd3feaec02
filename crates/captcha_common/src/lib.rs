//! # Captcha Kit Common - Shared Types and Utilities
//!
//! Shared data structures and helpers used across the Captcha Kit crates:
//! frame ranges for batch iteration and the `<index>_<label>` frame naming
//! convention.
//!
//! ## Example
//!
//! ```rust
//! use captcha_common::{FrameRange, utils};
//!
//! let range = FrameRange::new(1, 200).unwrap();
//! assert_eq!(range.len(), 200);
//!
//! let (index, label) = utils::parse_frame_stem("000395_XL3H").unwrap();
//! assert_eq!(index, "000395");
//! assert_eq!(label, "XL3H");
//! ```

use serde::{Deserialize, Serialize};
use schemars::JsonSchema;
use thiserror::Error;

/// Result type for captcha kit operations
pub type Result<T> = std::result::Result<T, CaptchaKitError>;

/// Standard error type for captcha kit operations
#[derive(Error, Debug)]
pub enum CaptchaKitError {
    #[error("Invalid frame range: start {start} > end {end}")]
    InvalidFrameRange { start: u32, end: u32 },

    #[error("Invalid frame name '{name}': expected <index>_<label>")]
    InvalidFrameName { name: String },

    #[error("Invalid value: {message}")]
    InvalidValue { message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// An inclusive range of frame numbers, e.g. frames 1 through 200
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(try_from = "RawFrameRange")]
pub struct FrameRange {
    /// First frame number
    pub start: u32,
    /// Last frame number (inclusive)
    pub end: u32,
}

/// Unchecked form of [`FrameRange`] as it appears in job files
#[derive(Deserialize)]
struct RawFrameRange {
    start: u32,
    end: u32,
}

impl TryFrom<RawFrameRange> for FrameRange {
    type Error = CaptchaKitError;

    fn try_from(raw: RawFrameRange) -> Result<Self> {
        Self::new(raw.start, raw.end)
    }
}

impl FrameRange {
    /// Create a new frame range
    pub fn new(start: u32, end: u32) -> Result<Self> {
        if start > end {
            return Err(CaptchaKitError::InvalidFrameRange { start, end });
        }
        Ok(Self { start, end })
    }

    /// A range covering a single frame
    pub fn single(frame: u32) -> Self {
        Self { start: frame, end: frame }
    }

    /// Number of frames in this range
    pub fn len(&self) -> usize {
        (self.end - self.start) as usize + 1
    }

    /// A valid range always holds at least one frame
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Check if a frame number is within this range
    pub fn contains(&self, frame: u32) -> bool {
        frame >= self.start && frame <= self.end
    }

    /// Iterate over every frame number in the range
    pub fn iter(&self) -> std::ops::RangeInclusive<u32> {
        self.start..=self.end
    }

    /// Frame pairs `(f, f + step)` for every `f` in `start..end`.
    ///
    /// The last frame only ever appears as a second element, and the second
    /// frame may lie past `end`.
    pub fn pairs(&self, step: u32) -> Result<Vec<(u32, u32)>> {
        if step == 0 {
            return Err(CaptchaKitError::InvalidValue {
                message: "Frame step must be positive".to_string(),
            });
        }
        (self.start..self.end)
            .map(|f| {
                f.checked_add(step)
                    .map(|g| (f, g))
                    .ok_or_else(|| CaptchaKitError::InvalidValue {
                        message: format!("Frame {} + step {} overflows", f, step),
                    })
            })
            .collect()
    }
}

impl IntoIterator for FrameRange {
    type Item = u32;
    type IntoIter = std::ops::RangeInclusive<u32>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Utility functions for frame naming
pub mod utils {
    use super::*;

    /// Width of the zero-padded frame number prefix
    pub const FRAME_INDEX_WIDTH: usize = 6;

    /// Format a frame number as its zero-padded file prefix (`395` -> `000395`)
    pub fn format_frame_index(frame: u32) -> String {
        format!("{:0width$}", frame, width = FRAME_INDEX_WIDTH)
    }

    /// Split a frame file stem `<index>_<label>` into its two parts
    pub fn parse_frame_stem(stem: &str) -> Result<(String, String)> {
        match stem.split_once('_') {
            Some((index, label))
                if !index.is_empty()
                    && !label.is_empty()
                    && index.chars().all(|c| c.is_ascii_digit()) =>
            {
                Ok((index.to_string(), label.to_string()))
            }
            _ => Err(CaptchaKitError::InvalidFrameName {
                name: stem.to_string(),
            }),
        }
    }

    /// Build the stem `<index>_<label>` used when writing frames
    pub fn frame_stem(index: &str, label: &str) -> String {
        format!("{}_{}", index, label)
    }

    /// Check if a file extension indicates an image file
    pub fn is_image_file(filename: &str) -> bool {
        matches!(
            get_file_extension(filename).as_deref(),
            Some("jpg" | "jpeg" | "png" | "bmp" | "gif" | "tif" | "tiff")
        )
    }

    /// Get file extension from filename
    pub fn get_file_extension(filename: &str) -> Option<String> {
        std::path::Path::new(filename)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_lowercase())
    }

    /// Ensure output directory exists
    pub fn ensure_output_dir(path: impl AsRef<std::path::Path>) -> Result<()> {
        std::fs::create_dir_all(path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::utils::*;

    #[test]
    fn test_frame_range() {
        let range = FrameRange::new(10, 30).unwrap();
        assert_eq!(range.len(), 21);
        assert!(range.contains(15));
        assert!(range.contains(30));
        assert!(!range.contains(5));
        assert!(!range.contains(31));
        assert_eq!(range.iter().next(), Some(10));
        assert_eq!(range.into_iter().last(), Some(30));
    }

    #[test]
    fn test_invalid_frame_range() {
        assert!(FrameRange::new(30, 10).is_err());
        assert_eq!(FrameRange::new(10, 10).unwrap().len(), 1);
    }

    #[test]
    fn test_frame_pairs() {
        let range = FrameRange::new(1, 5).unwrap();
        assert_eq!(range.pairs(1).unwrap(), vec![(1, 2), (2, 3), (3, 4), (4, 5)]);
        assert_eq!(range.pairs(2).unwrap(), vec![(1, 3), (2, 4), (3, 5), (4, 6)]);
        assert!(range.pairs(0).is_err());
        assert!(FrameRange::single(7).pairs(1).unwrap().is_empty());
        assert!(FrameRange::new(u32::MAX - 1, u32::MAX).unwrap().pairs(2).is_err());
    }

    #[test]
    fn test_deserialized_range_is_checked() {
        let range: FrameRange = serde_json::from_str(r#"{"start": 3, "end": 9}"#).unwrap();
        assert_eq!(range, FrameRange::new(3, 9).unwrap());

        let err = serde_json::from_str::<FrameRange>(r#"{"start": 5, "end": 1}"#).unwrap_err();
        assert!(err.to_string().contains("start 5 > end 1"));
    }

    #[test]
    fn test_format_frame_index() {
        assert_eq!(format_frame_index(395), "000395");
        assert_eq!(format_frame_index(1), "000001");
        assert_eq!(format_frame_index(1234567), "1234567");
    }

    #[test]
    fn test_parse_frame_stem() {
        let (index, label) = parse_frame_stem("000395_XL3H").unwrap();
        assert_eq!(index, "000395");
        assert_eq!(label, "XL3H");
        assert_eq!(frame_stem(&index, &label), "000395_XL3H");

        assert!(parse_frame_stem("000395").is_err());
        assert!(parse_frame_stem("_XL3H").is_err());
        assert!(parse_frame_stem("abc_XL3H").is_err());
        assert!(parse_frame_stem("000395_").is_err());
    }

    #[test]
    fn test_image_extensions() {
        assert!(is_image_file("000001_ABCD.jpg"));
        assert!(is_image_file("000001_ABCD.PNG"));
        assert!(!is_image_file("labels.dat"));
        assert!(!is_image_file("README"));
    }
}
