//! Batch rendering of derived images over a range of captcha frames:
//! detection previews, per-letter training crops, thresholded and
//! difference frames.

use std::sync::Arc;

use captcha_common::{FrameRange, utils::{format_frame_index, frame_stem}};
use frames::{DirectoryStore, FrameError, FrameSink, FrameSource};
use image::{DynamicImage, GrayImage, Luma};
use imageproc::{drawing::draw_hollow_rect_mut, rect::Rect};
use schemars::JsonSchema;
use segmentation::{
    BatchFrame, Binarizer, CancellationToken, Pipeline, ReconcileOutcome, RegionSet, SegmentationError,
    SegmentationObserver, algorithms::ThresholdBinarizer, trace_batch,
};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoStaticStr, VariantNames};
use thiserror::Error;
use tracing::{info, warn};

pub const LETTERS_CATEGORY: &str = "output/letters";
pub const DETECTION_CATEGORY: &str = "output/detection";
pub const THRESHOLD_CATEGORY: &str = "output/threshold";
pub const DIFFERENCE_CATEGORY: &str = "output/difference";

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Frame storage error: {0}")]
    Frames(#[from] FrameError),
    #[error("Segmentation error: {0}")]
    Segmentation(#[from] SegmentationError),
    #[error(transparent)]
    Common(#[from] captcha_common::CaptchaKitError),
    #[error("Frames {first} and {second} differ in size: {first_size:?} vs {second_size:?}")]
    FrameSizeMismatch {
        first: u32,
        second: u32,
        first_size: (u32, u32),
        second_size: (u32, u32),
    },
}

pub type Result<T> = std::result::Result<T, RenderError>;

#[derive(
    Debug, Clone,
    Serialize, Deserialize, JsonSchema,
    Display, EnumString, EnumIter, VariantNames, IntoStaticStr,
    PartialEq
)]
#[serde(tag = "type", content = "params", rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RenderOperation {
    /// Segment each frame, export the glyph crops by label and draw the boxes
    LetterDetection,
    /// Binarize each frame; pixels at or above `threshold` become white
    Threshold {
        threshold: u8,
    },
    /// Absolute difference between each frame and the one `step` later
    Difference {
        #[schemars(range(min = 1))]
        step: u32,
    },
}

impl RenderOperation {
    /// Get the JSON schema for all operations
    pub fn schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(RenderOperation)
    }

    /// Get a list of all available operation names
    pub fn command_names() -> &'static [&'static str] {
        <Self as VariantNames>::VARIANTS
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::LetterDetection => "Export glyph crops per label character and detection previews",
            Self::Threshold { .. } => "Write binarized frames",
            Self::Difference { .. } => "Write absolute differences of frames a fixed step apart",
        }
    }

    /// Output category the operation writes frames to
    pub fn category(&self) -> &'static str {
        match self {
            Self::LetterDetection => DETECTION_CATEGORY,
            Self::Threshold { .. } => THRESHOLD_CATEGORY,
            Self::Difference { .. } => DIFFERENCE_CATEGORY,
        }
    }
}

/// What a render run produced
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RenderSummary {
    /// Frames read and processed
    pub frames: usize,
    /// Frame-level images written
    pub written: usize,
    /// Glyph crops exported
    pub letters: usize,
    /// Frames whose label did not match the glyph count
    pub skipped: usize,
    /// Frames segmented with the fallback layout
    pub fallback: usize,
}

/// Runs render operations from a frame source into a sink
pub struct Renderer<S: FrameSource, K: FrameSink> {
    pipeline: Pipeline,
    source: S,
    sink: K,
    observer: Option<Arc<dyn SegmentationObserver>>,
    token: CancellationToken,
}

impl<S: FrameSource, K: FrameSink> Renderer<S, K> {
    pub fn new(pipeline: Pipeline, source: S, sink: K) -> Self {
        Self {
            pipeline,
            source,
            sink,
            observer: None,
            token: CancellationToken::new(),
        }
    }

    /// Report every frame segmented during letter detection to `observer`
    pub fn with_observer(mut self, observer: Arc<dyn SegmentationObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Stop letter detection early once `token` is cancelled
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.token = token;
        self
    }

    pub fn execute(&self, operation: &RenderOperation, range: FrameRange) -> Result<RenderSummary> {
        info!(
            operation = %operation,
            start = range.start,
            end = range.end,
            source = %self.source.description(),
            sink = %self.sink.description(),
            "rendering"
        );

        let summary = match operation {
            RenderOperation::LetterDetection => self.letter_detection(range)?,
            RenderOperation::Threshold { threshold } => self.threshold(range, *threshold)?,
            RenderOperation::Difference { step } => self.difference(range, *step)?,
        };

        info!(
            operation = %operation,
            frames = summary.frames,
            written = summary.written,
            letters = summary.letters,
            skipped = summary.skipped,
            fallback = summary.fallback,
            "render finished"
        );
        Ok(summary)
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn sink(&self) -> &K {
        &self.sink
    }

    fn letter_detection(&self, range: FrameRange) -> Result<RenderSummary> {
        let mut summary = RenderSummary::default();

        let frames = range
            .iter()
            .map(|index| self.source.read(index))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        let batch: Vec<BatchFrame> = frames
            .iter()
            .map(|frame| {
                BatchFrame::new(
                    frame_stem(&format_frame_index(frame.index), &frame.label),
                    frame.image.to_luma8(),
                )
            })
            .collect();
        let traces = trace_batch(&self.pipeline, &batch, &self.token, self.observer.as_deref());

        // Letters are numbered per directory, so exports stay sequential
        for ((frame, input), trace) in frames.iter().zip(&batch).zip(traces) {
            let trace = trace?;
            summary.frames += 1;
            if matches!(trace.reconciliation.outcome, ReconcileOutcome::Fallback { .. }) {
                summary.fallback += 1;
            }

            let regions = trace.regions();
            if frame.label.chars().count() == regions.len() {
                for (region, letter) in regions.iter().zip(frame.label.chars()) {
                    let crop = self.pipeline.crop(&input.image, region)?;
                    self.sink
                        .write_letter(&DynamicImage::ImageLuma8(crop), &letter.to_string(), LETTERS_CATEGORY)?;
                    summary.letters += 1;
                }
            } else {
                warn!(
                    frame = %input.reference,
                    label_length = frame.label.chars().count(),
                    glyphs = regions.len(),
                    "label length differs from glyph count, skipping letter export"
                );
                summary.skipped += 1;
            }

            let preview = detection_overlay(trace.mask.as_image(), regions);
            self.sink
                .write(&DynamicImage::ImageLuma8(preview), &frame.label, frame.index, DETECTION_CATEGORY)?;
            summary.written += 1;
        }

        Ok(summary)
    }

    fn threshold(&self, range: FrameRange, threshold: u8) -> Result<RenderSummary> {
        let binarizer = ThresholdBinarizer::at(threshold);
        let mut summary = RenderSummary::default();

        for index in range {
            let frame = self.source.read(index)?;
            let mask = binarizer.binarize(&frame.image.to_luma8())?;
            self.sink.write(
                &DynamicImage::ImageLuma8(mask.into_image()),
                &frame.label,
                index,
                THRESHOLD_CATEGORY,
            )?;
            summary.frames += 1;
            summary.written += 1;
        }

        Ok(summary)
    }

    fn difference(&self, range: FrameRange, step: u32) -> Result<RenderSummary> {
        let mut summary = RenderSummary::default();

        for (first, second) in range.pairs(step)? {
            let a = self.source.read(first)?;
            let b = self.source.read(second)?;
            let diff = frame_difference(&a.image.to_luma8(), &b.image.to_luma8()).ok_or_else(|| {
                RenderError::FrameSizeMismatch {
                    first,
                    second,
                    first_size: (a.image.width(), a.image.height()),
                    second_size: (b.image.width(), b.image.height()),
                }
            })?;
            self.sink
                .write(&DynamicImage::ImageLuma8(diff), &a.label, first, DIFFERENCE_CATEGORY)?;
            summary.frames += 1;
            summary.written += 1;
        }

        Ok(summary)
    }
}

impl Renderer<DirectoryStore, DirectoryStore> {
    /// Read from and write to the same data directory
    pub fn directory(pipeline: Pipeline, store: DirectoryStore) -> Self {
        Self::new(pipeline, store.clone(), store)
    }
}

/// Copy of the thresholded frame with each region outlined in black.
///
/// Outlines run through both corners `(x0, y0)` and `(x1, y1)`, so the right
/// and bottom edges sit on the first pixel past the region.
pub fn detection_overlay(mask: &GrayImage, regions: &RegionSet) -> GrayImage {
    let mut overlay = mask.clone();
    for region in regions {
        let rect = Rect::at(region.x0 as i32, region.y0 as i32).of_size(region.width() + 1, region.height() + 1);
        draw_hollow_rect_mut(&mut overlay, rect, Luma([0u8]));
    }
    overlay
}

/// Per-pixel absolute difference, `None` if the sizes differ
pub fn frame_difference(a: &GrayImage, b: &GrayImage) -> Option<GrayImage> {
    if a.dimensions() != b.dimensions() {
        return None;
    }
    Some(imageproc::map::map_colors2(a, b, |Luma([p]), Luma([q])| Luma([p.abs_diff(q)])))
}
