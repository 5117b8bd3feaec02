//! # Frames
//!
//! Labelled captcha frames on disk. Inputs are named `<NNNNNN>_<LABEL>.<ext>`
//! where the label is the captcha's ground-truth text; outputs are grouped
//! into category directories.

pub mod store;

use std::fmt::Debug;
use std::path::PathBuf;

use image::DynamicImage;
use thiserror::Error;

pub use store::DirectoryStore;

pub type Result<T> = std::result::Result<T, FrameError>;

#[derive(Error, Debug)]
pub enum FrameError {
    #[error("No frame {index} in {}", .dir.display())]
    NotFound { index: u32, dir: PathBuf },

    #[error("Frame file '{name}' is not named <index>_<label>")]
    MalformedName { name: String },

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Common(#[from] captcha_common::CaptchaKitError),
}

/// A decoded input frame with its ground-truth label
#[derive(Debug, Clone)]
pub struct Frame {
    pub image: DynamicImage,
    pub label: String,
    pub index: u32,
}

/// Where input frames are read from
pub trait FrameSource: Debug + Send + Sync {
    /// Load frame `index`
    fn read(&self, index: u32) -> Result<Frame>;

    /// Number of input frames available
    fn count_frames(&self) -> Result<usize>;

    /// Get a human-readable description of this source
    fn description(&self) -> String;
}

/// Where rendered images are written to
pub trait FrameSink: Debug + Send + Sync {
    /// Write `<category>/<index>_<label>.<ext>`, replacing any existing file
    fn write(&self, image: &DynamicImage, label: &str, index: u32, category: &str) -> Result<PathBuf>;

    /// Append a glyph to `<category>/<label>/`, numbered after the files
    /// already there
    fn write_letter(&self, image: &DynamicImage, label: &str, category: &str) -> Result<PathBuf>;

    /// Get a human-readable description of this sink
    fn description(&self) -> String;
}
