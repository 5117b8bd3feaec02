use thiserror::Error;

use crate::types::Stage;

#[derive(Error, Debug)]
pub enum SegmentationError {
    #[error("Failed to load image: {0}")]
    ImageLoad(#[from] image::ImageError),

    #[error(
        "Frame size mismatch during {stage}: expected {expected_width}x{expected_height}, got {width}x{height}"
    )]
    FrameMismatch {
        stage: Stage,
        expected_width: u32,
        expected_height: u32,
        width: u32,
        height: u32,
    },

    #[error("Unsupported channel count: {channels} (expected 1, 3 or 4)")]
    UnsupportedChannels { channels: u8 },

    #[error("Buffer of {len} bytes does not hold a {width}x{height}x{channels} image")]
    BufferSize {
        len: usize,
        width: u32,
        height: u32,
        channels: u8,
    },

    #[error("Invalid region ({x0}, {y0}, {x1}, {y1}): corners must satisfy x0 < x1 and y0 < y1")]
    InvalidRegion { x0: u32, y0: u32, x1: u32, y1: u32 },

    #[error("Region {region} lies outside the {width}x{height} image")]
    RegionOutOfBounds {
        region: crate::types::Region,
        width: u32,
        height: u32,
    },

    #[error("Cannot normalize an empty {width}x{height} crop")]
    EmptyCrop { width: u32, height: u32 },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Classifier error: {0}")]
    Classifier(String),

    #[error("Processing cancelled")]
    Cancelled,

    #[error("{stage} failed for {image}: {source}")]
    Frame {
        stage: Stage,
        image: String,
        #[source]
        source: Box<SegmentationError>,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlDe(#[from] toml::de::Error),

    #[error("TOML write error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl SegmentationError {
    /// Attach the failing stage and the offending image reference
    pub fn at(self, stage: Stage, image: impl Into<String>) -> Self {
        match self {
            already @ Self::Frame { .. } => already,
            other => Self::Frame {
                stage,
                image: image.into(),
                source: Box::new(other),
            },
        }
    }

    /// The stage a wrapped or mismatch error was raised in, if known
    pub fn stage(&self) -> Option<Stage> {
        match self {
            Self::Frame { stage, .. } | Self::FrameMismatch { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, SegmentationError>;
