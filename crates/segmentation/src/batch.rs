//! Parallel segmentation of many independent frames.

use std::sync::{
    Arc,
    atomic::{AtomicBool, AtomicUsize, Ordering},
};
use std::time::Instant;

use image::GrayImage;
use rayon::prelude::*;
use tracing::info;

use crate::{
    error::{Result, SegmentationError},
    pipeline::{Pipeline, SegmentationTrace},
    traits::SegmentationObserver,
    types::{FrameReport, ReconcileOutcome, Reconciliation},
};

/// Shared flag for stopping a running batch between images
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// A frame and the name it is reported under
#[derive(Debug, Clone)]
pub struct BatchFrame {
    pub reference: String,
    pub image: GrayImage,
}

impl BatchFrame {
    pub fn new(reference: impl Into<String>, image: GrayImage) -> Self {
        Self {
            reference: reference.into(),
            image,
        }
    }
}

/// Segment every frame on the rayon pool.
///
/// Results come back in input order. Frames not yet started when the token
/// is cancelled fail with [`SegmentationError::Cancelled`].
pub fn segment_batch(
    pipeline: &Pipeline,
    frames: &[BatchFrame],
    token: &CancellationToken,
    observer: Option<&dyn SegmentationObserver>,
) -> Vec<Result<Reconciliation>> {
    trace_batch(pipeline, frames, token, observer)
        .into_iter()
        .map(|trace| trace.map(|trace| trace.reconciliation))
        .collect()
}

/// Like [`segment_batch`], keeping every intermediate of each frame
pub fn trace_batch(
    pipeline: &Pipeline,
    frames: &[BatchFrame],
    token: &CancellationToken,
    observer: Option<&dyn SegmentationObserver>,
) -> Vec<Result<SegmentationTrace>> {
    frames
        .par_iter()
        .map(|frame| {
            if token.is_cancelled() {
                return Err(SegmentationError::Cancelled);
            }
            let started = Instant::now();
            let trace = pipeline.trace_named(&frame.reference, &frame.image)?;
            if let Some(observer) = observer {
                observer.on_frame(&FrameReport {
                    reference: frame.reference.clone(),
                    candidates: trace.candidates.len(),
                    outcome: trace.reconciliation.outcome,
                    elapsed: started.elapsed(),
                });
            }
            Ok(trace)
        })
        .collect()
}

/// Counts of a finished or running batch
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThroughputSummary {
    pub frames: usize,
    pub truncated: usize,
    pub fallback: usize,
    pub frames_per_second: f64,
}

/// Observer that logs how many frames per second the batch sustains
#[derive(Debug)]
pub struct ThroughputObserver {
    started: Instant,
    log_every: usize,
    frames: AtomicUsize,
    truncated: AtomicUsize,
    fallback: AtomicUsize,
}

impl ThroughputObserver {
    /// Log progress every `log_every` frames; `0` only logs on [`Self::finish`]
    pub fn new(log_every: usize) -> Self {
        Self {
            started: Instant::now(),
            log_every,
            frames: AtomicUsize::new(0),
            truncated: AtomicUsize::new(0),
            fallback: AtomicUsize::new(0),
        }
    }

    pub fn summary(&self) -> ThroughputSummary {
        let frames = self.frames.load(Ordering::Relaxed);
        let seconds = self.started.elapsed().as_secs_f64();
        ThroughputSummary {
            frames,
            truncated: self.truncated.load(Ordering::Relaxed),
            fallback: self.fallback.load(Ordering::Relaxed),
            frames_per_second: if seconds > 0.0 { frames as f64 / seconds } else { 0.0 },
        }
    }

    /// Log the final counts and return them
    pub fn finish(&self) -> ThroughputSummary {
        let summary = self.summary();
        info!(
            frames = summary.frames,
            truncated = summary.truncated,
            fallback = summary.fallback,
            fps = summary.frames_per_second,
            "segmentation finished"
        );
        summary
    }
}

impl Default for ThroughputObserver {
    fn default() -> Self {
        Self::new(1000)
    }
}

impl SegmentationObserver for ThroughputObserver {
    fn on_frame(&self, report: &FrameReport) {
        match report.outcome {
            ReconcileOutcome::Truncated { .. } => {
                self.truncated.fetch_add(1, Ordering::Relaxed);
            }
            ReconcileOutcome::Fallback { .. } => {
                self.fallback.fetch_add(1, Ordering::Relaxed);
            }
            ReconcileOutcome::Exact => {}
        }

        let frames = self.frames.fetch_add(1, Ordering::Relaxed) + 1;
        if self.log_every > 0 && frames % self.log_every == 0 {
            let summary = self.summary();
            info!(
                frames,
                fps = summary.frames_per_second,
                "segmentation progress"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SegmentationConfig;
    use image::Luma;

    fn frame(blobs: &[u32]) -> GrayImage {
        let mut img = GrayImage::from_pixel(60, 20, Luma([255u8]));
        for &bx in blobs {
            for y in 5..15 {
                for x in bx..bx + 8 {
                    img.put_pixel(x, y, Luma([0u8]));
                }
            }
        }
        img
    }

    fn batch() -> Vec<BatchFrame> {
        vec![
            BatchFrame::new("000001_ABCD", frame(&[5, 20, 35, 50])),
            BatchFrame::new("000002_EFGH", frame(&[])),
            BatchFrame::new("000003_IJKL", frame(&[5, 20, 35, 50])),
            BatchFrame::new("000004_MNOP", GrayImage::new(64, 20)),
        ]
    }

    #[test]
    fn test_batch_preserves_order_and_errors() {
        let pipeline = Pipeline::from_config(&SegmentationConfig::default()).unwrap();
        let observer = ThroughputObserver::new(0);
        let results = segment_batch(&pipeline, &batch(), &CancellationToken::new(), Some(&observer));

        assert_eq!(results.len(), 4);
        assert_eq!(results[0].as_ref().unwrap().outcome, ReconcileOutcome::Exact);
        assert_eq!(results[1].as_ref().unwrap().outcome, ReconcileOutcome::Fallback { found: 0 });
        assert_eq!(results[0].as_ref().unwrap(), results[2].as_ref().unwrap());
        let err = results[3].as_ref().unwrap_err();
        assert!(err.to_string().contains("000004_MNOP"));

        let summary = observer.finish();
        assert_eq!(summary.frames, 3);
        assert_eq!(summary.fallback, 1);
        assert_eq!(summary.truncated, 0);
    }

    #[test]
    fn test_cancelled_batch_does_no_work() {
        let pipeline = Pipeline::from_config(&SegmentationConfig::default()).unwrap();
        let token = CancellationToken::new();
        token.cancel();
        let observer = ThroughputObserver::default();
        let results = segment_batch(&pipeline, &batch(), &token, Some(&observer));

        assert!(results.iter().all(|r| matches!(r, Err(SegmentationError::Cancelled))));
        assert_eq!(observer.summary().frames, 0);
    }

    #[test]
    fn test_trace_batch_keeps_masks() {
        let pipeline = Pipeline::from_config(&SegmentationConfig::default()).unwrap();
        let traces = trace_batch(&pipeline, &batch()[..2], &CancellationToken::new(), None);

        let first = traces[0].as_ref().unwrap();
        assert_eq!(first.mask.width(), 60);
        assert_eq!(first.candidates.len(), 4);
        assert_eq!(traces[1].as_ref().unwrap().candidates.len(), 0);
    }

    #[test]
    fn test_token_clones_share_state() {
        let token = CancellationToken::new();
        let clone = token.clone();
        assert!(!token.is_cancelled());
        clone.cancel();
        assert!(token.is_cancelled());
    }
}
