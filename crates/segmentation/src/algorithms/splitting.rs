use tracing::debug;

use crate::{
    config::{SplitBreakpoint, SplitPolicy},
    traits::RegionSplitter,
    types::Region,
};

/// Splits boxes whose width/height ratio passes a breakpoint into equal
/// vertical strips.
///
/// Breakpoints overlap (a ratio of 3.5 passes all of the defaults), so the
/// table is evaluated in the policy's order and the first match wins.
#[derive(Debug, Clone)]
pub struct AspectRatioSplitter {
    table: Vec<SplitBreakpoint>,
}

impl AspectRatioSplitter {
    pub fn new(policy: &SplitPolicy) -> Self {
        Self {
            table: policy.ordered(),
        }
    }

    /// Number of glyphs a box is assumed to hold
    pub fn parts_for(&self, region: &Region) -> u32 {
        let ratio = region.aspect_ratio();
        self.table
            .iter()
            .find(|breakpoint| ratio > breakpoint.ratio)
            .map_or(1, |breakpoint| breakpoint.parts)
    }
}

impl Default for AspectRatioSplitter {
    fn default() -> Self {
        Self::new(&SplitPolicy::default())
    }
}

impl RegionSplitter for AspectRatioSplitter {
    fn split(&self, regions: Vec<Region>) -> Vec<Region> {
        let mut result = Vec::with_capacity(regions.len());
        for region in regions {
            let parts = self.parts_for(&region);
            if parts > 1 {
                debug!(%region, parts, ratio = region.aspect_ratio(), "splitting conjoined glyphs");
                result.extend(region.split_horizontally(parts));
            } else {
                result.push(region);
            }
        }
        result
    }
}
