//! Loading frames and exporting segmentation results.

use std::fs;
use std::path::Path;

use image::GrayImage;
use serde::Serialize;

use crate::{
    error::Result,
    pipeline::SegmentationTrace,
    types::{ReconcileOutcome, RegionSet},
};

/// Decode an image file into the grayscale buffer the pipeline consumes
pub fn load_frame<P: AsRef<Path>>(path: P) -> Result<GrayImage> {
    Ok(image::open(path)?.to_luma8())
}

/// Decode an in-memory image (PNG, JPEG)
pub fn load_frame_from_bytes(bytes: &[u8]) -> Result<GrayImage> {
    Ok(image::load_from_memory(bytes)?.to_luma8())
}

/// Serializable outcome of segmenting one image
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegionReport {
    pub image_width: u32,
    pub image_height: u32,
    pub candidates: usize,
    pub outcome: ReconcileOutcome,
    pub regions: RegionSet,
}

impl RegionReport {
    pub fn from_trace(trace: &SegmentationTrace) -> Self {
        Self {
            image_width: trace.mask.width(),
            image_height: trace.mask.height(),
            candidates: trace.candidates.len(),
            outcome: trace.reconciliation.outcome,
            regions: trace.reconciliation.regions.clone(),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn save_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        fs::write(path, self.to_json()?)?;
        Ok(())
    }
}
