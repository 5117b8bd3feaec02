//! Reading a captcha end to end: segment, normalize, classify.

use image::{DynamicImage, GrayImage, Rgb, RgbImage, imageops};
use imageproc::{drawing::draw_hollow_rect_mut, rect::Rect};
use serde::Serialize;
use tracing::debug;

use crate::{
    error::{Result, SegmentationError},
    pipeline::Pipeline,
    traits::Classifier,
    types::{RegionSet, Stage},
};

/// Height of the blank band `annotate` adds above the frame
pub const HEADER_HEIGHT: u32 = 20;

const BOX_COLOR: Rgb<u8> = Rgb([255, 0, 0]);

/// The decoded text and where each character was read from
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Solution {
    pub text: String,
    pub regions: RegionSet,
}

/// Classify every glyph of `image`, left to right
pub fn solve(pipeline: &Pipeline, image: &DynamicImage, classifier: &dyn Classifier) -> Result<Solution> {
    solve_gray(pipeline, "<image>", &image.to_luma8(), classifier)
}

/// Same as [`solve`] for an already decoded grayscale frame
pub fn solve_gray(
    pipeline: &Pipeline,
    reference: &str,
    image: &GrayImage,
    classifier: &dyn Classifier,
) -> Result<Solution> {
    let glyphs = pipeline.glyphs_named(reference, image)?;

    let text = glyphs
        .iter()
        .map(|glyph| {
            classifier
                .classify(&glyph.tensor)
                .map_err(|e| e.at(Stage::Classify, reference))
        })
        .collect::<Result<String>>()?;
    debug!(image = reference, text = %text, "solved captcha");

    let regions = RegionSet::from_regions(
        glyphs.into_iter().map(|glyph| glyph.region).collect(),
        pipeline.glyph_count(),
    )?;
    Ok(Solution { text, regions })
}

/// RGB copy of `image` with a header band on top and every region outlined
pub fn annotate(image: &DynamicImage, regions: &RegionSet) -> RgbImage {
    let frame = image.to_rgb8();
    let mut canvas = RgbImage::from_pixel(frame.width(), frame.height() + HEADER_HEIGHT, Rgb([255, 255, 255]));
    imageops::replace(&mut canvas, &frame, 0, HEADER_HEIGHT as i64);

    for region in regions {
        let rect = Rect::at(region.x0 as i32, (region.y0 + HEADER_HEIGHT) as i32)
            .of_size(region.width(), region.height());
        draw_hollow_rect_mut(&mut canvas, rect, BOX_COLOR);
    }
    canvas
}

/// Classifier that always fails, for wiring checks without a model
#[derive(Debug, Clone, Copy, Default)]
pub struct NoClassifier;

impl Classifier for NoClassifier {
    fn classify(&self, _tensor: &crate::types::NormalizedTensor) -> Result<char> {
        Err(SegmentationError::Classifier("no classifier configured".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SegmentationConfig;
    use crate::types::NormalizedTensor;
    use image::Luma;

    /// Labels a glyph by how much ink it holds
    struct InkClassifier;

    impl Classifier for InkClassifier {
        fn classify(&self, tensor: &NormalizedTensor) -> Result<char> {
            let mean = tensor.as_slice().iter().sum::<f32>() / tensor.as_slice().len() as f32;
            Ok(if mean < 0.9 { 'X' } else { 'O' })
        }
    }

    fn four_letters() -> GrayImage {
        let mut img = GrayImage::from_pixel(60, 20, Luma([255u8]));
        for bx in [5, 20, 35, 50] {
            for y in 5..15 {
                for x in bx..bx + 8 {
                    img.put_pixel(x, y, Luma([0u8]));
                }
            }
        }
        img
    }

    fn pipeline() -> Pipeline {
        Pipeline::from_config(&SegmentationConfig::default()).unwrap()
    }

    #[test]
    fn test_solve_reads_every_glyph() {
        let image = DynamicImage::ImageLuma8(four_letters());
        let solution = solve(&pipeline(), &image, &InkClassifier).unwrap();
        assert_eq!(solution.text, "XXXX");
        assert_eq!(solution.regions.len(), 4);
        assert_eq!(solution.regions[0].x0, 4);
    }

    #[test]
    fn test_solve_blank_frame_reads_fallback_boxes() {
        let image = DynamicImage::ImageLuma8(GrayImage::from_pixel(60, 20, Luma([255u8])));
        let solution = solve(&pipeline(), &image, &InkClassifier).unwrap();
        assert_eq!(solution.text, "OOOO");
        assert_eq!(solution.regions.as_slice(), SegmentationConfig::default().fallback.as_slice());
    }

    #[test]
    fn test_classifier_errors_name_the_stage() {
        let err = solve_gray(&pipeline(), "000007_ABCD.png", &four_letters(), &NoClassifier).unwrap_err();
        assert_eq!(err.stage(), Some(Stage::Classify));
        assert!(err.to_string().contains("000007_ABCD.png"));
    }

    #[test]
    fn test_annotate_adds_header_and_boxes() {
        let image = DynamicImage::ImageLuma8(four_letters());
        let regions = pipeline().segment_image(&image).unwrap();
        let annotated = annotate(&image, &regions);

        assert_eq!(annotated.dimensions(), (60, 20 + HEADER_HEIGHT));
        assert_eq!(*annotated.get_pixel(0, 0), Rgb([255, 255, 255]));
        let first = regions[0];
        assert_eq!(*annotated.get_pixel(first.x0, first.y0 + HEADER_HEIGHT), BOX_COLOR);
        // Glyph interior is copied through untouched
        assert_eq!(*annotated.get_pixel(8, 10 + HEADER_HEIGHT), Rgb([0, 0, 0]));
    }
}
