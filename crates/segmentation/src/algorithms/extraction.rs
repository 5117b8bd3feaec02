use geo_types::{Coord, LineString, Polygon};
use imageproc::{contours::Contour, point::Point};
use tracing::trace;

use crate::{
    config::AreaRange,
    error::Result,
    traits::RegionExtractor,
    types::{BinaryMask, Region},
};

/// Imageproc-based extractor keeping every contour (outer and hole borders)
/// whose polygon area falls inside the configured range
#[derive(Debug, Clone, Default)]
pub struct ContourRegionExtractor {
    pub area: AreaRange,
}

impl ContourRegionExtractor {
    pub fn new(area: AreaRange) -> Self {
        Self { area }
    }

    fn accept(&self, contour: &Contour<i32>) -> Option<Region> {
        let area = contour_area(&contour.points);
        if !self.area.contains(area) {
            trace!(area, border = ?contour.border_type, "contour rejected by area filter");
            return None;
        }
        bounding_region(&contour.points)
    }
}

impl RegionExtractor for ContourRegionExtractor {
    fn extract_regions(&self, mask: &BinaryMask) -> Result<Vec<Region>> {
        let contours = imageproc::contours::find_contours::<i32>(mask.as_image());

        let regions = contours
            .iter()
            .filter_map(|contour| self.accept(contour))
            .collect();

        Ok(regions)
    }
}

/// Shoelace area of the polygon through the traced pixel centres
pub fn contour_area(points: &[Point<i32>]) -> f64 {
    use geo::Area;

    let coords: Vec<Coord<f64>> = points
        .iter()
        .map(|p| Coord { x: p.x as f64, y: p.y as f64 })
        .collect();

    Polygon::new(LineString::new(coords), vec![]).unsigned_area()
}

/// Smallest box holding every point, with exclusive right/bottom edges
pub fn bounding_region(points: &[Point<i32>]) -> Option<Region> {
    let first = points.first()?;
    let (mut min_x, mut min_y, mut max_x, mut max_y) = (first.x, first.y, first.x, first.y);
    for p in points {
        min_x = min_x.min(p.x);
        min_y = min_y.min(p.y);
        max_x = max_x.max(p.x);
        max_y = max_y.max(p.y);
    }
    if min_x < 0 || min_y < 0 {
        return None;
    }

    Some(Region {
        x0: min_x as u32,
        y0: min_y as u32,
        x1: max_x as u32 + 1,
        y1: max_y as u32 + 1,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithms::{FrameBorderSealer, ThresholdBinarizer};
    use crate::traits::{Binarizer, BorderSealer};
    use image::{GrayImage, Luma};

    /// White 60x20 frame with black rectangles given as (x, y, width, height)
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

    fn sealed_mask(image: &GrayImage) -> BinaryMask {
        let mask = ThresholdBinarizer::default().binarize(image).unwrap();
        FrameBorderSealer.seal(mask).unwrap()
    }

    #[test]
    fn test_area_of_square_outline() {
        let points = vec![
            Point::new(0, 0),
            Point::new(4, 0),
            Point::new(4, 4),
            Point::new(0, 4),
        ];
        assert_eq!(contour_area(&points), 16.0);
        assert_eq!(contour_area(&points[..1]), 0.0);
    }

    #[test]
    fn test_bounding_region_is_exclusive() {
        let points = vec![Point::new(3, 7), Point::new(9, 2), Point::new(5, 5)];
        assert_eq!(
            bounding_region(&points),
            Some(Region { x0: 3, y0: 2, x1: 10, y1: 8 })
        );
        assert_eq!(bounding_region(&[]), None);
    }

    #[test]
    fn test_dark_glyph_becomes_one_region() {
        let image = frame_with_blobs(&[(5, 5, 8, 10)]);
        let regions = ContourRegionExtractor::default()
            .extract_regions(&sealed_mask(&image))
            .unwrap();
        // The hole border runs through the light pixels around the glyph
        assert_eq!(regions, vec![Region { x0: 4, y0: 4, x1: 14, y1: 16 }]);
    }

    #[test]
    fn test_specks_and_blank_frames_yield_nothing() {
        let extractor = ContourRegionExtractor::default();

        let speck = frame_with_blobs(&[(30, 10, 2, 2)]);
        assert!(extractor.extract_regions(&sealed_mask(&speck)).unwrap().is_empty());

        let blank = frame_with_blobs(&[]);
        assert!(extractor.extract_regions(&sealed_mask(&blank)).unwrap().is_empty());

        let dark = GrayImage::new(60, 20);
        assert!(extractor.extract_regions(&sealed_mask(&dark)).unwrap().is_empty());
    }

    #[test]
    fn test_sealing_recovers_glyph_touching_the_border() {
        let image = frame_with_blobs(&[(0, 0, 9, 12)]);
        let extractor = ContourRegionExtractor::default();

        let unsealed = ThresholdBinarizer::default().binarize(&image).unwrap();
        assert!(extractor.extract_regions(&unsealed).unwrap().is_empty());

        let regions = extractor.extract_regions(&sealed_mask(&image)).unwrap();
        assert_eq!(regions, vec![Region { x0: 0, y0: 0, x1: 10, y1: 13 }]);
    }

    #[test]
    fn test_area_range_is_configurable() {
        let image = frame_with_blobs(&[(5, 5, 8, 10)]);
        let strict = ContourRegionExtractor::new(AreaRange { min: 200.0, max: 676.0 });
        assert!(strict.extract_regions(&sealed_mask(&image)).unwrap().is_empty());
    }
}
