use std::cmp::Ordering;

use tracing::debug;

use crate::{
    error::{Result, SegmentationError},
    traits::RegionReconciler,
    types::{ReconcileOutcome, Reconciliation, Region, RegionSet},
};

/// Forces exactly `glyph_count` regions per image.
///
/// Extra regions are dropped from the end in arrival order, which may keep
/// the wrong ones. Too few regions are replaced wholesale by the fixed
/// fallback layout.
#[derive(Debug, Clone)]
pub struct FallbackReconciler {
    glyph_count: usize,
    fallback: Vec<Region>,
}

impl FallbackReconciler {
    pub fn new(glyph_count: usize, fallback: Vec<Region>) -> Result<Self> {
        if glyph_count == 0 || fallback.len() != glyph_count {
            return Err(SegmentationError::InvalidConfig(format!(
                "fallback layout has {} regions, expected {}",
                fallback.len(),
                glyph_count
            )));
        }
        Ok(Self { glyph_count, fallback })
    }

    pub fn glyph_count(&self) -> usize {
        self.glyph_count
    }

    pub fn fallback(&self) -> &[Region] {
        &self.fallback
    }
}

impl RegionReconciler for FallbackReconciler {
    fn reconcile(&self, mut regions: Vec<Region>) -> Result<Reconciliation> {
        let found = regions.len();
        let outcome = match found.cmp(&self.glyph_count) {
            Ordering::Greater => {
                regions.truncate(self.glyph_count);
                debug!(found, kept = self.glyph_count, "too many regions, truncating");
                ReconcileOutcome::Truncated {
                    dropped: found - self.glyph_count,
                }
            }
            Ordering::Less => {
                debug!(found, expected = self.glyph_count, "too few regions, using fallback layout");
                regions = self.fallback.clone();
                ReconcileOutcome::Fallback { found }
            }
            Ordering::Equal => ReconcileOutcome::Exact,
        };

        Ok(Reconciliation {
            regions: RegionSet::from_regions(regions, self.glyph_count)?,
            outcome,
        })
    }
}
