pub mod builder;

use image::{DynamicImage, GrayImage, imageops};
use tracing::debug;

use crate::{
    config::SegmentationConfig,
    error::{Result, SegmentationError},
    traits::{Binarizer, BorderSealer, GlyphNormalizer, RegionExtractor, RegionReconciler, RegionSplitter},
    types::{BinaryMask, FrameGeometry, Glyph, NormalizedTensor, Reconciliation, Region, RegionSet, Stage},
};

/// Reference used in errors when the caller did not name the image
const UNNAMED: &str = "<image>";

/// Letter segmentation pipeline: binarize, seal, extract, split, reconcile.
///
/// Holds no per-image state; one instance can serve any number of threads.
pub struct Pipeline {
    frame: FrameGeometry,
    glyph_count: usize,
    binarizer: Box<dyn Binarizer>,
    sealer: Box<dyn BorderSealer>,
    extractor: Box<dyn RegionExtractor>,
    splitter: Box<dyn RegionSplitter>,
    reconciler: Box<dyn RegionReconciler>,
    normalizer: Box<dyn GlyphNormalizer>,
}

/// Every intermediate of one segmentation run
#[derive(Debug, Clone)]
pub struct SegmentationTrace {
    pub mask: BinaryMask,
    pub sealed: BinaryMask,
    pub candidates: Vec<Region>,
    pub split: Vec<Region>,
    pub reconciliation: Reconciliation,
}

impl SegmentationTrace {
    pub fn regions(&self) -> &RegionSet {
        &self.reconciliation.regions
    }
}

impl Pipeline {
    /// Create a new pipeline builder
    pub fn builder() -> builder::PipelineBuilder {
        builder::PipelineBuilder::new()
    }

    /// Build the standard pipeline for a configuration
    pub fn from_config(config: &SegmentationConfig) -> Result<Self> {
        builder::PipelineBuilder::from_config(config.clone()).build()
    }

    #[allow(clippy::too_many_arguments)]
    pub fn new(
        frame: FrameGeometry,
        glyph_count: usize,
        binarizer: Box<dyn Binarizer>,
        sealer: Box<dyn BorderSealer>,
        extractor: Box<dyn RegionExtractor>,
        splitter: Box<dyn RegionSplitter>,
        reconciler: Box<dyn RegionReconciler>,
        normalizer: Box<dyn GlyphNormalizer>,
    ) -> Self {
        Self {
            frame,
            glyph_count,
            binarizer,
            sealer,
            extractor,
            splitter,
            reconciler,
            normalizer,
        }
    }

    pub fn frame(&self) -> FrameGeometry {
        self.frame
    }

    /// Number of glyphs every region set holds
    pub fn glyph_count(&self) -> usize {
        self.glyph_count
    }

    /// Segment an image, keeping every intermediate result.
    ///
    /// Errors are tagged with the failing stage and `reference`.
    pub fn trace_named(&self, reference: &str, image: &GrayImage) -> Result<SegmentationTrace> {
        self.frame
            .check(Stage::Binarize, image.width(), image.height())
            .map_err(|e| e.at(Stage::Binarize, reference))?;

        let mask = self
            .binarizer
            .binarize(image)
            .map_err(|e| e.at(Stage::Binarize, reference))?;
        let sealed = self
            .sealer
            .seal(mask.clone())
            .map_err(|e| e.at(Stage::Seal, reference))?;
        let candidates = self
            .extractor
            .extract_regions(&sealed)
            .map_err(|e| e.at(Stage::Extract, reference))?;
        let split = self.splitter.split(candidates.clone());
        let reconciliation = self
            .reconciler
            .reconcile(split.clone())
            .map_err(|e| e.at(Stage::Reconcile, reference))?;

        debug!(
            image = reference,
            candidates = candidates.len(),
            split = split.len(),
            outcome = %reconciliation.outcome,
            "segmented frame"
        );

        Ok(SegmentationTrace {
            mask,
            sealed,
            candidates,
            split,
            reconciliation,
        })
    }

    pub fn trace(&self, image: &GrayImage) -> Result<SegmentationTrace> {
        self.trace_named(UNNAMED, image)
    }

    /// Exactly `glyph_count` regions ordered left to right
    pub fn segment(&self, image: &GrayImage) -> Result<RegionSet> {
        Ok(self.trace(image)?.reconciliation.regions)
    }

    /// Segment a color or grayscale image of any pixel format
    pub fn segment_image(&self, image: &DynamicImage) -> Result<RegionSet> {
        self.segment(&image.to_luma8())
    }

    /// Cut a region out of the image
    pub fn crop(&self, image: &GrayImage, region: &Region) -> Result<GrayImage> {
        if !region.is_valid() || region.x1 > image.width() || region.y1 > image.height() {
            return Err(SegmentationError::RegionOutOfBounds {
                region: *region,
                width: image.width(),
                height: image.height(),
            });
        }
        Ok(imageops::crop_imm(image, region.x0, region.y0, region.width(), region.height()).to_image())
    }

    /// Fit a crop into the classifier input size
    pub fn normalize(&self, crop: &GrayImage) -> Result<NormalizedTensor> {
        let resized = self.normalizer.normalize(crop)?;
        Ok(NormalizedTensor::from_luma(&resized))
    }

    /// Segment, crop and normalize every glyph of an image
    pub fn glyphs_named(&self, reference: &str, image: &GrayImage) -> Result<Vec<Glyph>> {
        let trace = self.trace_named(reference, image)?;
        trace
            .regions()
            .iter()
            .map(|region| {
                let crop = self
                    .crop(image, region)
                    .map_err(|e| e.at(Stage::Crop, reference))?;
                let tensor = self
                    .normalize(&crop)
                    .map_err(|e| e.at(Stage::Normalize, reference))?;
                Ok(Glyph { region: *region, tensor })
            })
            .collect()
    }

    pub fn glyphs(&self, image: &GrayImage) -> Result<Vec<Glyph>> {
        self.glyphs_named(UNNAMED, image)
    }

    /// Get information about the pipeline configuration
    pub fn info(&self) -> String {
        format!(
            "Pipeline: {}x{} frame, {} glyphs per image",
            self.frame.width, self.frame.height, self.glyph_count
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SplitOrder;
    use crate::types::ReconcileOutcome;
    use image::Luma;

    fn frame_with_blobs(blobs: &[(u32, u32, u32, u32)]) -> GrayImage {
        let mut img = GrayImage::from_pixel(60, 20, Luma([255u8]));
        for &(bx, by, bw, bh) in blobs {
            for y in by..by + bh {
                for x in bx..bx + bw {
                    img.put_pixel(x, y, Luma([0u8]));
                }
            }
        }
        img
    }

    fn four_letters() -> GrayImage {
        // 8x10 blobs, 80 pixels each
        frame_with_blobs(&[(5, 5, 8, 10), (20, 5, 8, 10), (35, 5, 8, 10), (50, 5, 8, 10)])
    }

    fn pipeline() -> Pipeline {
        Pipeline::from_config(&SegmentationConfig::default()).unwrap()
    }

    #[test]
    fn test_four_separated_letters() {
        let trace = pipeline().trace(&four_letters()).unwrap();
        assert_eq!(trace.reconciliation.outcome, ReconcileOutcome::Exact);
        assert_eq!(trace.candidates, trace.split, "nothing should be split");

        let xs: Vec<u32> = trace.regions().iter().map(|r| r.x0).collect();
        assert_eq!(xs, vec![4, 19, 34, 49]);
        assert!(trace.regions().iter().all(|r| r.width() == 10 && r.height() == 12));
    }

    #[test]
    fn test_wide_blob_splits_four_ways() {
        let image = frame_with_blobs(&[(8, 5, 44, 10)]);
        let regions = pipeline().segment(&image).unwrap();
        assert_eq!(
            regions.as_slice(),
            &[
                Region { x0: 7, y0: 4, x1: 18, y1: 16 },
                Region { x0: 18, y0: 4, x1: 29, y1: 16 },
                Region { x0: 29, y0: 4, x1: 40, y1: 16 },
                Region { x0: 40, y0: 4, x1: 53, y1: 16 },
            ]
        );
    }

    #[test]
    fn test_lowest_first_order_falls_back_on_wide_blob() {
        let pipeline = Pipeline::builder()
            .with_split_order(SplitOrder::LowestFirst)
            .build()
            .unwrap();
        let trace = pipeline.trace(&frame_with_blobs(&[(8, 5, 44, 10)])).unwrap();
        assert_eq!(trace.split.len(), 2);
        assert_eq!(trace.reconciliation.outcome, ReconcileOutcome::Fallback { found: 2 });
    }

    #[test]
    fn test_blank_frame_uses_fallback_layout() {
        let config = SegmentationConfig::default();
        let regions = pipeline().segment(&frame_with_blobs(&[])).unwrap();
        assert_eq!(regions.as_slice(), config.fallback.as_slice());
    }

    #[test]
    fn test_extra_blobs_are_truncated() {
        let blobs: Vec<_> = (0..6).map(|i| (2 + 10 * i, 5, 6, 10)).collect();
        let trace = pipeline().trace(&frame_with_blobs(&blobs)).unwrap();
        assert_eq!(trace.candidates.len(), 6);
        assert_eq!(trace.reconciliation.outcome, ReconcileOutcome::Truncated { dropped: 2 });
        let xs: Vec<u32> = trace.regions().iter().map(|r| r.x0).collect();
        assert_eq!(xs, vec![1, 11, 21, 31]);
    }

    #[test]
    fn test_segment_is_idempotent() {
        let pipeline = pipeline();
        let image = four_letters();
        assert_eq!(pipeline.segment(&image).unwrap(), pipeline.segment(&image).unwrap());
    }

    #[test]
    fn test_result_is_always_sorted_and_complete() {
        let pipeline = pipeline();
        let images = [
            four_letters(),
            frame_with_blobs(&[(40, 3, 9, 12), (3, 4, 9, 12)]),
            frame_with_blobs(&[(30, 2, 20, 14), (4, 4, 10, 12), (16, 4, 9, 12)]),
            GrayImage::new(60, 20),
        ];
        for image in &images {
            let regions = pipeline.segment(image).unwrap();
            assert_eq!(regions.len(), 4);
            assert!(regions.as_slice().windows(2).all(|w| w[0].x0 <= w[1].x0));
        }
    }

    #[test]
    fn test_color_input_matches_grayscale() {
        let gray = four_letters();
        let color = DynamicImage::ImageLuma8(gray.clone()).to_rgb8();
        let pipeline = pipeline();
        assert_eq!(
            pipeline.segment_image(&DynamicImage::ImageRgb8(color)).unwrap(),
            pipeline.segment(&gray).unwrap()
        );
    }

    #[test]
    fn test_wrong_frame_size_is_rejected() {
        let err = pipeline()
            .trace_named("000001_ABCD.jpg", &GrayImage::new(64, 20))
            .unwrap_err();
        assert_eq!(err.stage(), Some(Stage::Binarize));
        assert!(err.to_string().contains("000001_ABCD.jpg"));
    }

    #[test]
    fn test_glyphs_are_normalized() {
        let glyphs = pipeline().glyphs(&four_letters()).unwrap();
        assert_eq!(glyphs.len(), 4);
        for glyph in &glyphs {
            assert_eq!(glyph.tensor.shape(), [20, 20, 1]);
            assert!(glyph.tensor.as_slice().iter().all(|v| (0.0..=1.0).contains(v)));
        }
    }

    #[test]
    fn test_crop_bounds() {
        let pipeline = pipeline();
        let image = four_letters();
        let crop = pipeline.crop(&image, &Region { x0: 4, y0: 4, x1: 14, y1: 16 }).unwrap();
        assert_eq!(crop.dimensions(), (10, 12));
        assert_eq!(crop.get_pixel(1, 1)[0], 0);
        assert_eq!(crop.get_pixel(0, 0)[0], 255);

        let outside = Region { x0: 50, y0: 0, x1: 61, y1: 20 };
        assert!(matches!(
            pipeline.crop(&image, &outside),
            Err(SegmentationError::RegionOutOfBounds { .. })
        ));
    }
}
