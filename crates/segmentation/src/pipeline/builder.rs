use crate::{
    algorithms::{
        AspectRatioSplitter, ContourRegionExtractor, FallbackReconciler, FrameBorderSealer,
        PaddedResizeNormalizer, ThresholdBinarizer,
    },
    config::{SegmentationConfig, SplitOrder},
    error::Result,
    pipeline::Pipeline,
    traits::{Binarizer, BorderSealer, GlyphNormalizer, RegionExtractor, RegionReconciler, RegionSplitter},
    types::{FrameGeometry, Region},
};

/// Builder for creating segmentation pipelines with a fluent API.
///
/// Stages that are not set explicitly are built from the configuration.
pub struct PipelineBuilder {
    config: SegmentationConfig,
    binarizer: Option<Box<dyn Binarizer>>,
    sealer: Option<Box<dyn BorderSealer>>,
    extractor: Option<Box<dyn RegionExtractor>>,
    splitter: Option<Box<dyn RegionSplitter>>,
    reconciler: Option<Box<dyn RegionReconciler>>,
    normalizer: Option<Box<dyn GlyphNormalizer>>,
}

impl PipelineBuilder {
    /// Create a new pipeline builder
    pub fn new() -> Self {
        Self::from_config(SegmentationConfig::default())
    }

    pub fn from_config(config: SegmentationConfig) -> Self {
        Self {
            config,
            binarizer: None,
            sealer: None,
            extractor: None,
            splitter: None,
            reconciler: None,
            normalizer: None,
        }
    }

    /// Set the binarizer (replaces any existing one)
    pub fn set_binarizer<B>(mut self, binarizer: B) -> Self
    where
        B: Binarizer + 'static,
    {
        self.binarizer = Some(Box::new(binarizer));
        self
    }

    /// Set the border sealer (replaces any existing one)
    pub fn set_sealer<S>(mut self, sealer: S) -> Self
    where
        S: BorderSealer + 'static,
    {
        self.sealer = Some(Box::new(sealer));
        self
    }

    /// Set the region extractor (replaces any existing one)
    pub fn set_extractor<E>(mut self, extractor: E) -> Self
    where
        E: RegionExtractor + 'static,
    {
        self.extractor = Some(Box::new(extractor));
        self
    }

    /// Set the region splitter (replaces any existing one)
    pub fn set_splitter<S>(mut self, splitter: S) -> Self
    where
        S: RegionSplitter + 'static,
    {
        self.splitter = Some(Box::new(splitter));
        self
    }

    /// Set the reconciler (replaces any existing one)
    pub fn set_reconciler<R>(mut self, reconciler: R) -> Self
    where
        R: RegionReconciler + 'static,
    {
        self.reconciler = Some(Box::new(reconciler));
        self
    }

    /// Set the glyph normalizer (replaces any existing one)
    pub fn set_normalizer<N>(mut self, normalizer: N) -> Self
    where
        N: GlyphNormalizer + 'static,
    {
        self.normalizer = Some(Box::new(normalizer));
        self
    }

    pub fn with_frame(mut self, frame: FrameGeometry) -> Self {
        self.config.frame = frame;
        self
    }

    /// Binarize at `low` instead of the configured threshold
    pub fn with_threshold(mut self, low: u8) -> Self {
        self.config.threshold.low = low;
        self
    }

    pub fn with_split_order(mut self, order: SplitOrder) -> Self {
        self.config.split.order = order;
        self
    }

    /// Expect `fallback.len()` glyphs and use `fallback` when too few are found
    pub fn with_fallback(mut self, fallback: Vec<Region>) -> Self {
        self.config.glyph_count = fallback.len();
        self.config.fallback = fallback;
        self
    }

    pub fn with_target_size(mut self, width: u32, height: u32) -> Self {
        self.config.target.width = width;
        self.config.target.height = height;
        self
    }

    /// Build the pipeline with default components if not specified
    pub fn build(self) -> Result<Pipeline> {
        let Self {
            config,
            binarizer,
            sealer,
            extractor,
            splitter,
            reconciler,
            normalizer,
        } = self;
        config.validate()?;

        let binarizer = binarizer.unwrap_or_else(|| Box::new(ThresholdBinarizer::new(config.threshold)));
        let sealer = sealer.unwrap_or_else(|| Box::new(FrameBorderSealer));
        let extractor = extractor.unwrap_or_else(|| Box::new(ContourRegionExtractor::new(config.contour_area)));
        let splitter = splitter.unwrap_or_else(|| Box::new(AspectRatioSplitter::new(&config.split)));
        let reconciler = match reconciler {
            Some(reconciler) => reconciler,
            None => Box::new(FallbackReconciler::new(config.glyph_count, config.fallback.clone())?),
        };
        let normalizer = normalizer.unwrap_or_else(|| Box::new(PaddedResizeNormalizer::new(config.target)));

        Ok(Pipeline::new(
            config.frame,
            config.glyph_count,
            binarizer,
            sealer,
            extractor,
            splitter,
            reconciler,
            normalizer,
        ))
    }
}

impl Default for PipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}
