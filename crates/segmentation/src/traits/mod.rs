use image::GrayImage;
use crate::{
    error::Result,
    types::{BinaryMask, FrameReport, NormalizedTensor, Reconciliation, Region},
};

/// Trait for turning a grayscale image into a two-valued mask
pub trait Binarizer: Send + Sync {
    fn binarize(&self, image: &GrayImage) -> Result<BinaryMask>;
}

/// Trait for stamping the mask border with its background value
pub trait BorderSealer: Send + Sync {
    /// Consumes the mask and returns the sealed one
    fn seal(&self, mask: BinaryMask) -> Result<BinaryMask>;
}

/// Trait for finding candidate glyph boxes in a sealed mask
pub trait RegionExtractor: Send + Sync {
    fn extract_regions(&self, mask: &BinaryMask) -> Result<Vec<Region>>;
}

/// Trait for breaking up boxes that hold several touching glyphs
pub trait RegionSplitter: Send + Sync {
    fn split(&self, regions: Vec<Region>) -> Vec<Region>;
}

/// Trait for forcing the region list to the expected glyph count
pub trait RegionReconciler: Send + Sync {
    fn reconcile(&self, regions: Vec<Region>) -> Result<Reconciliation>;
}

/// Trait for resizing a glyph crop to the classifier input size
pub trait GlyphNormalizer: Send + Sync {
    fn normalize(&self, crop: &GrayImage) -> Result<GrayImage>;
}

/// Trait for the character classifier consuming normalized glyphs
pub trait Classifier: Send + Sync {
    fn classify(&self, tensor: &NormalizedTensor) -> Result<char>;
}

/// Trait for instrumentation invoked once per processed image
pub trait SegmentationObserver: Send + Sync {
    fn on_frame(&self, report: &FrameReport);
}
