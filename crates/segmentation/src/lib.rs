//! # Captcha Letter Segmentation Library
//!
//! Locates the individual glyphs of small fixed-size captcha images and turns
//! each one into a fixed-size classifier input.
//!
//! ## Core Features
//!
//! - **Trait-based Architecture**: every stage (binarize, seal, extract, split,
//!   reconcile, normalize) sits behind a trait and can be swapped
//! - **Exact Glyph Count**: every image yields exactly `N` boxes, ordered left
//!   to right, falling back to a fixed layout when detection comes up short
//! - **Configurable Geometry**: frame size, thresholds, area bounds, split
//!   breakpoints and fallback layout are loaded from TOML or JSON
//! - **Batch Processing**: frames are segmented in parallel on a rayon pool
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use segmentation::{Pipeline, SegmentationConfig, io::load_frame};
//!
//! let pipeline = Pipeline::from_config(&SegmentationConfig::default())?;
//! let image = load_frame("000001_ABCD.jpg")?;
//! let regions = pipeline.segment(&image)?;
//!
//! for region in &regions {
//!     let crop = pipeline.crop(&image, region)?;
//!     let tensor = pipeline.normalize(&crop)?;
//!     println!("{} -> {:?}", region, tensor.shape());
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Custom Pipeline
//!
//! ```rust,no_run
//! use segmentation::{Pipeline, SplitOrder, algorithms::ThresholdBinarizer};
//!
//! let pipeline = Pipeline::builder()
//!     .set_binarizer(ThresholdBinarizer::at(110))
//!     .with_split_order(SplitOrder::LowestFirst)
//!     .build()?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod error;
pub mod types;
pub mod config;
pub mod traits;
pub mod algorithms;
pub mod pipeline;
pub mod solver;
pub mod batch;
pub mod io;

pub use error::{Result, SegmentationError};
pub use types::{
    BinaryMask, FrameGeometry, FrameReport, Glyph, NormalizedTensor, ReconcileOutcome, Reconciliation,
    Region, RegionSet, Stage,
};
pub use config::{
    AreaRange, ResampleFilter, SegmentationConfig, SplitBreakpoint, SplitOrder, SplitPolicy, TargetSize,
    ThresholdConfig, ThresholdMode,
};
pub use traits::*;
pub use pipeline::{Pipeline, SegmentationTrace, builder::PipelineBuilder};
pub use solver::{Solution, annotate, solve};
pub use batch::{BatchFrame, CancellationToken, ThroughputObserver, ThroughputSummary, segment_batch, trace_batch};

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn test_pipeline_is_shareable() {
        assert_send_sync::<Pipeline>();
        assert_send_sync::<ThroughputObserver>();
    }

    #[test]
    fn test_stage_names() {
        assert_eq!(Stage::Binarize.to_string(), "binarize");
        assert_eq!(Stage::Reconcile.to_string(), "reconcile");
    }

    #[test]
    fn test_info_reports_frame() {
        let pipeline = Pipeline::from_config(&SegmentationConfig::default()).unwrap();
        assert_eq!(pipeline.info(), "Pipeline: 60x20 frame, 4 glyphs per image");
    }
}
