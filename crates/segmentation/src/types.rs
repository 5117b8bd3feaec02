use std::fmt;
use std::time::Duration;

use image::{DynamicImage, GrayImage, ImageBuffer, Luma};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, IntoStaticStr};

use crate::error::{Result, SegmentationError};

/// Pipeline stages, used to tag errors and log lines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum Stage {
    Load,
    Binarize,
    Seal,
    Extract,
    Split,
    Reconcile,
    Crop,
    Normalize,
    Classify,
}

/// Width and height of the frame the pipeline constants are tuned for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct FrameGeometry {
    pub width: u32,
    pub height: u32,
}

impl FrameGeometry {
    /// The 60x20 captcha frame
    pub const CANONICAL: FrameGeometry = FrameGeometry { width: 60, height: 20 };

    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Fail with `FrameMismatch` unless the image has exactly this size
    pub fn check(&self, stage: Stage, width: u32, height: u32) -> Result<()> {
        if (width, height) == (self.width, self.height) {
            return Ok(());
        }
        Err(SegmentationError::FrameMismatch {
            stage,
            expected_width: self.width,
            expected_height: self.height,
            width,
            height,
        })
    }

    /// Whether a region fits entirely inside the frame
    pub fn contains(&self, region: &Region) -> bool {
        region.x1 <= self.width && region.y1 <= self.height
    }
}

impl Default for FrameGeometry {
    fn default() -> Self {
        Self::CANONICAL
    }
}

/// Axis-aligned bounding box in pixel coordinates; `x1` and `y1` are exclusive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub struct Region {
    pub x0: u32,
    pub y0: u32,
    pub x1: u32,
    pub y1: u32,
}

impl Region {
    /// Create a region, rejecting empty or inverted boxes
    pub fn new(x0: u32, y0: u32, x1: u32, y1: u32) -> Result<Self> {
        let region = Self { x0, y0, x1, y1 };
        if !region.is_valid() {
            return Err(SegmentationError::InvalidRegion { x0, y0, x1, y1 });
        }
        Ok(region)
    }

    pub fn is_valid(&self) -> bool {
        self.x0 < self.x1 && self.y0 < self.y1
    }

    pub fn width(&self) -> u32 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> u32 {
        self.y1 - self.y0
    }

    /// Width over height
    pub fn aspect_ratio(&self) -> f64 {
        self.width() as f64 / self.height() as f64
    }

    pub fn area(&self) -> u32 {
        self.width() * self.height()
    }

    /// Cut the box into `parts` vertical strips sharing `y0..y1`.
    ///
    /// Each strip is `width / parts` wide and the last one absorbs the
    /// remainder, so the strips tile the box. `parts` is clamped to the width
    /// so that no strip is empty.
    pub fn split_horizontally(&self, parts: u32) -> Vec<Region> {
        if !self.is_valid() {
            return vec![*self];
        }
        let parts = parts.clamp(1, self.width());
        let fraction = self.width() / parts;
        (0..parts)
            .map(|i| Region {
                x0: self.x0 + i * fraction,
                y0: self.y0,
                x1: if i + 1 == parts { self.x1 } else { self.x0 + (i + 1) * fraction },
                y1: self.y1,
            })
            .collect()
    }

    /// `count` equal strips across this box, usable as a fallback layout
    pub fn even_slices(&self, count: u32) -> Vec<Region> {
        self.split_horizontally(count)
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {}, {})", self.x0, self.y0, self.x1, self.y1)
    }
}

/// Exactly `N` regions sorted left to right by `x0`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct RegionSet {
    regions: Vec<Region>,
}

impl RegionSet {
    /// Build a set of `expected` regions, stable-sorted by ascending `x0`
    pub fn from_regions(mut regions: Vec<Region>, expected: usize) -> Result<Self> {
        if regions.len() != expected {
            return Err(SegmentationError::InvalidConfig(format!(
                "region set needs exactly {} regions, got {}",
                expected,
                regions.len()
            )));
        }
        if let Some(bad) = regions.iter().find(|r| !r.is_valid()) {
            return Err(SegmentationError::InvalidRegion {
                x0: bad.x0,
                y0: bad.y0,
                x1: bad.x1,
                y1: bad.y1,
            });
        }
        regions.sort_by_key(|r| r.x0);
        Ok(Self { regions })
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Region> {
        self.regions.iter()
    }

    pub fn as_slice(&self) -> &[Region] {
        &self.regions
    }

    pub fn into_vec(self) -> Vec<Region> {
        self.regions
    }
}

impl std::ops::Index<usize> for RegionSet {
    type Output = Region;

    fn index(&self, index: usize) -> &Region {
        &self.regions[index]
    }
}

impl<'a> IntoIterator for &'a RegionSet {
    type Item = &'a Region;
    type IntoIter = std::slice::Iter<'a, Region>;

    fn into_iter(self) -> Self::IntoIter {
        self.regions.iter()
    }
}

/// Which branch the reconciler took for an image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(tag = "type", rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ReconcileOutcome {
    /// The detector found exactly the expected number of regions
    Exact,
    /// Too many regions; the trailing ones were dropped
    Truncated { dropped: usize },
    /// Too few regions; the fixed fallback layout was used instead
    Fallback { found: usize },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Reconciliation {
    pub regions: RegionSet,
    pub outcome: ReconcileOutcome,
}

/// Two-valued single-channel mask that remembers which value is background
#[derive(Debug, Clone, PartialEq)]
pub struct BinaryMask {
    pixels: GrayImage,
    background: u8,
}

impl BinaryMask {
    pub fn new(pixels: GrayImage, background: u8) -> Self {
        Self { pixels, background }
    }

    pub fn background(&self) -> u8 {
        self.background
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn is_background(&self, x: u32, y: u32) -> bool {
        self.pixels.get_pixel(x, y)[0] == self.background
    }

    pub fn as_image(&self) -> &GrayImage {
        &self.pixels
    }

    pub fn image_mut(&mut self) -> &mut GrayImage {
        &mut self.pixels
    }

    pub fn into_image(self) -> GrayImage {
        self.pixels
    }
}

/// Fixed-size `H x W x 1` buffer of intensities in `[0, 1]`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedTensor {
    width: u32,
    height: u32,
    data: Vec<f32>,
}

impl NormalizedTensor {
    /// Scale an 8-bit grayscale image into `[0, 1]`
    pub fn from_luma(image: &GrayImage) -> Self {
        Self {
            width: image.width(),
            height: image.height(),
            data: image.pixels().map(|p| p[0] as f32 / 255.0).collect(),
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// `[height, width, channels]`
    pub fn shape(&self) -> [usize; 3] {
        [self.height as usize, self.width as usize, 1]
    }

    pub fn get(&self, x: u32, y: u32) -> Option<f32> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.data.get((y * self.width + x) as usize).copied()
    }

    /// Row-major values
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    /// Back to an 8-bit image, e.g. for writing the tensor to disk
    pub fn to_luma(&self) -> GrayImage {
        ImageBuffer::from_fn(self.width, self.height, |x, y| {
            let v = self.data[(y * self.width + x) as usize];
            Luma([(v.clamp(0.0, 1.0) * 255.0).round() as u8])
        })
    }
}

/// A located glyph and its classifier input
#[derive(Debug, Clone, PartialEq)]
pub struct Glyph {
    pub region: Region,
    pub tensor: NormalizedTensor,
}

/// Per-image summary handed to observers
#[derive(Debug, Clone)]
pub struct FrameReport {
    pub reference: String,
    pub candidates: usize,
    pub outcome: ReconcileOutcome,
    pub elapsed: Duration,
}

/// Build a grayscale image from a raw interleaved 8-bit buffer.
///
/// One channel is taken as-is, three are read as RGB and four as RGBA.
pub fn gray_from_raw(width: u32, height: u32, channels: u8, data: Vec<u8>) -> Result<GrayImage> {
    let len = data.len();
    let size_error = || SegmentationError::BufferSize {
        len,
        width,
        height,
        channels,
    };
    let expected = width as usize * height as usize * channels as usize;
    if !matches!(channels, 1 | 3 | 4) {
        return Err(SegmentationError::UnsupportedChannels { channels });
    }
    if len != expected {
        return Err(size_error());
    }
    let image = match channels {
        1 => DynamicImage::ImageLuma8(GrayImage::from_raw(width, height, data).ok_or_else(size_error)?),
        3 => DynamicImage::ImageRgb8(image::RgbImage::from_raw(width, height, data).ok_or_else(size_error)?),
        _ => DynamicImage::ImageRgba8(image::RgbaImage::from_raw(width, height, data).ok_or_else(size_error)?),
    };
    Ok(image.to_luma8())
}
