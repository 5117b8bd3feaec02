use image::{GrayImage, Luma};
use crate::{
    config::{ThresholdConfig, ThresholdMode},
    error::Result,
    traits::{Binarizer, BorderSealer},
    types::BinaryMask,
};

/// Fixed-threshold binarizer
#[derive(Debug, Clone, Default)]
pub struct ThresholdBinarizer {
    pub config: ThresholdConfig,
}

impl ThresholdBinarizer {
    pub fn new(config: ThresholdConfig) -> Self {
        Self { config }
    }

    /// Plain binary thresholding with the given cut-off
    pub fn at(low: u8) -> Self {
        Self {
            config: ThresholdConfig { low, ..ThresholdConfig::default() },
        }
    }
}

impl Binarizer for ThresholdBinarizer {
    fn binarize(&self, image: &GrayImage) -> Result<BinaryMask> {
        let ThresholdConfig { low, high, mode } = self.config;
        let pixels = imageproc::map::map_colors(image, |Luma([value])| {
            let bright = value >= low;
            match (mode, bright) {
                (ThresholdMode::Binary, true) | (ThresholdMode::BinaryInverted, false) => Luma([high]),
                _ => Luma([0u8]),
            }
        });
        Ok(BinaryMask::new(pixels, self.config.background()))
    }
}

/// Seals the outermost rows and columns with the mask's background value.
///
/// Without this, dark glyph pixels touching the frame connect to the
/// outside and the glyph never becomes a closed contour of its own.
#[derive(Debug, Clone, Default)]
pub struct FrameBorderSealer;

impl BorderSealer for FrameBorderSealer {
    fn seal(&self, mut mask: BinaryMask) -> Result<BinaryMask> {
        let (width, height) = (mask.width(), mask.height());
        if width == 0 || height == 0 {
            return Ok(mask);
        }

        let background = Luma([mask.background()]);
        let pixels = mask.image_mut();
        for x in 0..width {
            pixels.put_pixel(x, 0, background);
            pixels.put_pixel(x, height - 1, background);
        }
        for y in 0..height {
            pixels.put_pixel(0, y, background);
            pixels.put_pixel(width - 1, y, background);
        }
        Ok(mask)
    }
}
