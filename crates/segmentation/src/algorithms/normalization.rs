use image::{GrayImage, imageops::{self, FilterType}};

use crate::{
    config::TargetSize,
    error::{Result, SegmentationError},
    traits::GlyphNormalizer,
};

/// Scaled size and symmetric padding for fitting a crop into a target box
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResizePlan {
    pub scaled_width: u32,
    pub scaled_height: u32,
    /// Columns added on each side
    pub pad_x: u32,
    /// Rows added on each side
    pub pad_y: u32,
}

impl ResizePlan {
    /// Scale along the dominant dimension, keeping the aspect ratio.
    ///
    /// Wider-than-tall crops are scaled to the target width, all others to
    /// the target height; the other side is truncated and never below 1.
    /// An empty source has nothing to scale and is rejected.
    pub fn new(width: u32, height: u32, target_width: u32, target_height: u32) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(SegmentationError::EmptyCrop { width, height });
        }
        let (scaled_width, scaled_height) = if width > height {
            let h = (height as u64 * target_width as u64 / width as u64).max(1);
            (target_width, h as u32)
        } else {
            let w = (width as u64 * target_height as u64 / height as u64).max(1);
            (w as u32, target_height)
        };

        Ok(Self {
            scaled_width,
            scaled_height,
            pad_x: target_width.saturating_sub(scaled_width) / 2,
            pad_y: target_height.saturating_sub(scaled_height) / 2,
        })
    }

    /// Size after padding, before the final exact resize
    pub fn padded_size(&self) -> (u32, u32) {
        (
            self.scaled_width + 2 * self.pad_x,
            self.scaled_height + 2 * self.pad_y,
        )
    }
}

/// Aspect-preserving resize + edge-replicated padding + exact resize
#[derive(Debug, Clone, Copy)]
pub struct PaddedResizeNormalizer {
    pub width: u32,
    pub height: u32,
    pub filter: FilterType,
}

impl PaddedResizeNormalizer {
    pub fn new(target: TargetSize) -> Self {
        Self {
            width: target.width,
            height: target.height,
            filter: target.filter.into(),
        }
    }

    pub fn plan(&self, crop: &GrayImage) -> Result<ResizePlan> {
        ResizePlan::new(crop.width(), crop.height(), self.width, self.height)
    }
}

impl Default for PaddedResizeNormalizer {
    fn default() -> Self {
        Self::new(TargetSize::default())
    }
}

impl GlyphNormalizer for PaddedResizeNormalizer {
    fn normalize(&self, crop: &GrayImage) -> Result<GrayImage> {
        let plan = self.plan(crop)?;
        let scaled = resize_exact(crop, plan.scaled_width, plan.scaled_height, self.filter);
        let padded = replicate_border(&scaled, plan.pad_x, plan.pad_y);
        Ok(resize_exact(&padded, self.width, self.height, self.filter))
    }
}

fn resize_exact(image: &GrayImage, width: u32, height: u32, filter: FilterType) -> GrayImage {
    if image.dimensions() == (width, height) {
        return image.clone();
    }
    imageops::resize(image, width, height, filter)
}

/// Pad by repeating the outermost pixels, so no artificial edge appears
pub fn replicate_border(image: &GrayImage, pad_x: u32, pad_y: u32) -> GrayImage {
    let (width, height) = image.dimensions();
    if (pad_x == 0 && pad_y == 0) || width == 0 || height == 0 {
        return image.clone();
    }
    GrayImage::from_fn(width + 2 * pad_x, height + 2 * pad_y, |x, y| {
        let sx = x.saturating_sub(pad_x).min(width - 1);
        let sy = y.saturating_sub(pad_y).min(height - 1);
        *image.get_pixel(sx, sy)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    fn checker(width: u32, height: u32) -> GrayImage {
        GrayImage::from_fn(width, height, |x, y| Luma([if (x + y) % 2 == 0 { 30 } else { 220 }]))
    }

    #[test]
    fn test_target_sized_crop_is_unchanged() {
        let crop = checker(20, 20);
        let normalized = PaddedResizeNormalizer::default().normalize(&crop).unwrap();
        assert_eq!(normalized, crop);
    }

    #[test]
    fn test_wide_crop_plan() {
        let plan = ResizePlan::new(40, 20, 20, 20).unwrap();
        assert_eq!((plan.scaled_width, plan.scaled_height), (20, 10));
        assert_eq!((plan.pad_x, plan.pad_y), (0, 5));
        assert_eq!(2 * plan.pad_y, 20 - plan.scaled_height);
        assert_eq!(plan.padded_size(), (20, 20));
    }

    #[test]
    fn test_tall_crop_plan() {
        let plan = ResizePlan::new(10, 30, 20, 20).unwrap();
        assert_eq!((plan.scaled_width, plan.scaled_height), (6, 20));
        assert_eq!((plan.pad_x, plan.pad_y), (7, 0));

        // Odd slack leaves one column for the final resize to absorb
        let plan = ResizePlan::new(11, 20, 20, 20).unwrap();
        assert_eq!(plan.padded_size(), (19, 20));
    }

    #[test]
    fn test_plan_never_collapses_to_zero() {
        let plan = ResizePlan::new(200, 1, 20, 20).unwrap();
        assert_eq!(plan.scaled_height, 1);
    }

    #[test]
    fn test_plan_rejects_empty_source() {
        assert!(matches!(
            ResizePlan::new(0, 0, 20, 20),
            Err(SegmentationError::EmptyCrop { width: 0, height: 0 })
        ));
        assert!(ResizePlan::new(12, 0, 20, 20).is_err());
        assert!(PaddedResizeNormalizer::default().plan(&GrayImage::new(0, 7)).is_err());
        assert_eq!(replicate_border(&GrayImage::new(0, 3), 2, 2).dimensions(), (0, 3));
    }

    #[test]
    fn test_replicate_border_extends_edges() {
        let image = GrayImage::from_fn(2, 1, |x, _| Luma([if x == 0 { 10 } else { 20 }]));
        let padded = replicate_border(&image, 1, 1);
        assert_eq!(padded.dimensions(), (4, 3));
        for y in 0..3 {
            let row: Vec<u8> = (0..4).map(|x| padded.get_pixel(x, y)[0]).collect();
            assert_eq!(row, vec![10, 10, 20, 20]);
        }
    }

    #[test]
    fn test_every_shape_reaches_target() {
        let normalizer = PaddedResizeNormalizer::default();
        for (w, h) in [(40, 20), (13, 14), (11, 20), (3, 17), (57, 14), (1, 1)] {
            let normalized = normalizer.normalize(&checker(w, h)).unwrap();
            assert_eq!(normalized.dimensions(), (20, 20), "crop {}x{}", w, h);
        }
    }

    #[test]
    fn test_uniform_wide_crop_stays_uniform() {
        let crop = GrayImage::from_pixel(40, 20, Luma([77u8]));
        let normalized = PaddedResizeNormalizer::default().normalize(&crop).unwrap();
        assert!(normalized.pixels().all(|p| p[0] == 77));
    }

    #[test]
    fn test_empty_crop_is_rejected() {
        let result = PaddedResizeNormalizer::default().normalize(&GrayImage::new(0, 5));
        assert!(matches!(result, Err(SegmentationError::EmptyCrop { .. })));
    }
}
