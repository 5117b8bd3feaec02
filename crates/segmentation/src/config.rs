//! Tunable parameters of the segmentation pipeline.
//!
//! Every constant the pipeline relies on lives here so it can be retuned for
//! other frame sizes without touching the algorithms. The defaults reproduce
//! the behaviour tuned for 60x20 captchas with 13 pixel tall glyphs.

use std::fs;
use std::path::Path;

use image::imageops::FilterType;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoStaticStr, VariantNames};

use crate::error::{Result, SegmentationError};
use crate::types::{FrameGeometry, Region};

/// How pixels at or above the low threshold are mapped
#[derive(
    Debug, Clone, Copy, Default,
    Serialize, Deserialize, JsonSchema,
    Display, EnumString, EnumIter, VariantNames, IntoStaticStr,
    PartialEq, Eq
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ThresholdMode {
    /// `>= low` becomes `high`, everything else `0`; background is `high`
    #[default]
    Binary,
    /// `>= low` becomes `0`, everything else `high`; background is `0`
    BinaryInverted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ThresholdConfig {
    pub low: u8,
    pub high: u8,
    #[serde(default)]
    pub mode: ThresholdMode,
}

impl ThresholdConfig {
    /// Value of paper and of the sealed border in the resulting mask
    pub fn background(&self) -> u8 {
        match self.mode {
            ThresholdMode::Binary => self.high,
            ThresholdMode::BinaryInverted => 0,
        }
    }
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            low: 128,
            high: 255,
            mode: ThresholdMode::Binary,
        }
    }
}

/// Accepted contour area, inclusive on both ends
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AreaRange {
    pub min: f64,
    pub max: f64,
}

impl AreaRange {
    /// Range for glyphs `glyph_height` pixels tall.
    ///
    /// The lower bound is a 4 pixel wide stroke of full height, the upper one
    /// allows up to `width_factor` times the height (conjoined glyphs).
    pub fn for_glyph(glyph_height: u32, width_factor: u32) -> Self {
        Self {
            min: (glyph_height * 4) as f64,
            max: (glyph_height * width_factor * 4) as f64,
        }
    }

    pub fn contains(&self, area: f64) -> bool {
        self.min <= area && area <= self.max
    }
}

impl Default for AreaRange {
    fn default() -> Self {
        Self::for_glyph(13, 13)
    }
}

/// Boxes wider than `ratio` times their height hold `parts` glyphs
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SplitBreakpoint {
    pub ratio: f64,
    pub parts: u32,
}

/// Order in which split breakpoints are tested
#[derive(
    Debug, Clone, Copy, Default,
    Serialize, Deserialize, JsonSchema,
    Display, EnumString, EnumIter, VariantNames, IntoStaticStr,
    PartialEq, Eq
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SplitOrder {
    /// Largest ratio first; the widest matching breakpoint wins
    #[default]
    HighestFirst,
    /// Smallest ratio first, as in the original if/elif chain. Any box past
    /// the smallest breakpoint only ever gets that breakpoint's split.
    LowestFirst,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SplitPolicy {
    pub breakpoints: Vec<SplitBreakpoint>,
    #[serde(default)]
    pub order: SplitOrder,
}

impl SplitPolicy {
    /// Breakpoints in evaluation order
    pub fn ordered(&self) -> Vec<SplitBreakpoint> {
        let mut table = self.breakpoints.clone();
        table.sort_by(|a, b| a.ratio.total_cmp(&b.ratio));
        if self.order == SplitOrder::HighestFirst {
            table.reverse();
        }
        table
    }
}

impl Default for SplitPolicy {
    fn default() -> Self {
        Self {
            breakpoints: vec![
                SplitBreakpoint { ratio: 3.25, parts: 4 },
                SplitBreakpoint { ratio: 2.25, parts: 3 },
                SplitBreakpoint { ratio: 1.25, parts: 2 },
            ],
            order: SplitOrder::HighestFirst,
        }
    }
}

/// Resampling kernel used by the normalizer
#[derive(
    Debug, Clone, Copy, Default,
    Serialize, Deserialize, JsonSchema,
    Display, EnumString, EnumIter, VariantNames, IntoStaticStr,
    PartialEq, Eq
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ResampleFilter {
    Nearest,
    #[default]
    Triangle,
    CatmullRom,
    Lanczos3,
}

impl From<ResampleFilter> for FilterType {
    fn from(filter: ResampleFilter) -> Self {
        match filter {
            ResampleFilter::Nearest => FilterType::Nearest,
            ResampleFilter::Triangle => FilterType::Triangle,
            ResampleFilter::CatmullRom => FilterType::CatmullRom,
            ResampleFilter::Lanczos3 => FilterType::Lanczos3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct TargetSize {
    pub width: u32,
    pub height: u32,
    #[serde(default)]
    pub filter: ResampleFilter,
}

impl Default for TargetSize {
    fn default() -> Self {
        Self {
            width: 20,
            height: 20,
            filter: ResampleFilter::Triangle,
        }
    }
}

/// Complete pipeline configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct SegmentationConfig {
    pub frame: FrameGeometry,
    pub threshold: ThresholdConfig,
    pub contour_area: AreaRange,
    pub split: SplitPolicy,
    /// Number of glyphs in every captcha
    pub glyph_count: usize,
    /// Layout used when fewer than `glyph_count` regions are detected
    pub fallback: Vec<Region>,
    pub target: TargetSize,
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            frame: FrameGeometry::CANONICAL,
            threshold: ThresholdConfig::default(),
            contour_area: AreaRange::default(),
            split: SplitPolicy::default(),
            glyph_count: 4,
            fallback: vec![
                Region { x0: 5, y0: 3, x1: 18, y1: 17 },
                Region { x0: 18, y0: 3, x1: 30, y1: 17 },
                Region { x0: 30, y0: 3, x1: 42, y1: 17 },
                Region { x0: 42, y0: 3, x1: 55, y1: 17 },
            ],
            target: TargetSize::default(),
        }
    }
}

impl SegmentationConfig {
    /// Replace the fallback layout with `glyph_count` equal slices of `band`
    pub fn with_even_fallback(mut self, band: Region) -> Self {
        self.fallback = band.even_slices(self.glyph_count as u32);
        self
    }

    /// Check internal consistency; the pipeline refuses invalid configs
    pub fn validate(&self) -> Result<()> {
        let invalid = |message: String| Err(SegmentationError::InvalidConfig(message));

        if self.frame.width == 0 || self.frame.height == 0 {
            return invalid("frame dimensions must be positive".to_string());
        }
        if self.threshold.high == 0 {
            return invalid("threshold.high must be above 0 to separate background".to_string());
        }
        if !(self.contour_area.min <= self.contour_area.max) {
            return invalid(format!(
                "contour_area.min ({}) exceeds contour_area.max ({})",
                self.contour_area.min, self.contour_area.max
            ));
        }
        for breakpoint in &self.split.breakpoints {
            if !(breakpoint.ratio > 0.0) || breakpoint.parts < 2 {
                return invalid(format!(
                    "split breakpoint {}:{} needs a positive ratio and at least 2 parts",
                    breakpoint.ratio, breakpoint.parts
                ));
            }
        }
        if self.glyph_count == 0 {
            return invalid("glyph_count must be positive".to_string());
        }
        if self.fallback.len() != self.glyph_count {
            return invalid(format!(
                "fallback layout has {} regions, glyph_count is {}",
                self.fallback.len(),
                self.glyph_count
            ));
        }
        if let Some(region) = self
            .fallback
            .iter()
            .find(|r| !r.is_valid() || !self.frame.contains(r))
        {
            return invalid(format!(
                "fallback region {} is empty or outside the {}x{} frame",
                region, self.frame.width, self.frame.height
            ));
        }
        if self.target.width == 0 || self.target.height == 0 {
            return invalid("target size must be positive".to_string());
        }
        Ok(())
    }

    /// Load configuration from a TOML file
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Load configuration from a TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: SegmentationConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a JSON file
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Load configuration from a JSON string
    pub fn from_json(content: &str) -> Result<Self> {
        let config: SegmentationConfig = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Auto-detect file format and load configuration
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_ref = path.as_ref();
        match path_ref.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Self::from_toml_file(path),
            Some("json") => Self::from_json_file(path),
            _ => Err(SegmentationError::InvalidConfig(format!(
                "unsupported config format for {}; use .toml or .json",
                path_ref.display()
            ))),
        }
    }

    /// Convert configuration to a TOML string
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Convert configuration to a JSON string
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Get the JSON schema of the configuration file
    pub fn schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(SegmentationConfig)
    }
}
