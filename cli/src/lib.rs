use captcha_common::FrameRange;
use frames::DirectoryStore;
use prerender::RenderOperation;
use segmentation::{Pipeline, SegmentationConfig, SegmentationError};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error(transparent)]
    SerdeError(#[from] serde_json::Error),
    #[error(transparent)]
    TomlDeError(#[from] toml::de::Error),
    #[error(transparent)]
    TomlSerError(#[from] toml::ser::Error),
    #[error(transparent)]
    IoError(#[from] std::io::Error),
    #[error(transparent)]
    Segmentation(#[from] SegmentationError),
    #[error("Unsupported file format. Please use .toml or .json files")]
    UnsupportedFileFormat,
}

/// One named render pass of a job
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct RenderStep {
    pub name: String,
    pub description: Option<String>,
    pub operation: Option<RenderOperation>,
}

fn default_input_dir() -> String {
    "input".to_string()
}

fn default_extension() -> String {
    "jpg".to_string()
}

/// A data directory, the frames to process and the passes to run over them
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct RenderJob {
    pub data_dir: String,
    #[serde(default = "default_input_dir")]
    pub input_dir: String,
    /// Extension of the written images
    #[serde(default = "default_extension")]
    pub extension: String,
    pub frames: FrameRange,
    #[serde(default)]
    pub segmentation: SegmentationConfig,
    pub steps: Vec<RenderStep>,
}

impl RenderJob {
    /// Load a job from a TOML file
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self, CliError> {
        let content = fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Load a job from a TOML string
    pub fn from_toml(content: &str) -> Result<Self, CliError> {
        let job: RenderJob = toml::from_str(content)?;
        job.segmentation.validate()?;
        Ok(job)
    }

    /// Load a job from a JSON file
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, CliError> {
        let content = fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Load a job from a JSON string
    pub fn from_json(content: &str) -> Result<Self, CliError> {
        let job: RenderJob = serde_json::from_str(content)?;
        job.segmentation.validate()?;
        Ok(job)
    }

    /// Auto-detect file format and load the job
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, CliError> {
        let path_ref = path.as_ref();
        match path_ref.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Self::from_toml_file(path),
            Some("json") => Self::from_json_file(path),
            _ => Err(CliError::UnsupportedFileFormat),
        }
    }

    /// Convert the job to a TOML string
    pub fn to_toml(&self) -> Result<String, CliError> {
        Ok(toml::to_string_pretty(&self)?)
    }

    /// Convert the job to a JSON string
    pub fn to_json(&self) -> Result<String, CliError> {
        Ok(serde_json::to_string_pretty(&self)?)
    }

    pub fn schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(RenderJob)
    }

    pub fn store(&self) -> DirectoryStore {
        DirectoryStore::new(&self.data_dir)
            .with_input_dir(&self.input_dir)
            .with_extension(&self.extension)
    }

    pub fn pipeline(&self) -> Result<Pipeline, CliError> {
        Ok(Pipeline::from_config(&self.segmentation)?)
    }
}

/// Load a segmentation config file, or the defaults when none is given
pub fn load_config(path: Option<&Path>) -> Result<SegmentationConfig, CliError> {
    match path {
        Some(path) => Ok(SegmentationConfig::from_file(path)?),
        None => Ok(SegmentationConfig::default()),
    }
}

/// Write a segmentation config as TOML or JSON depending on the extension
pub fn write_config(config: &SegmentationConfig, path: &Path) -> Result<(), CliError> {
    let content = match path.extension().and_then(|ext| ext.to_str()) {
        Some("toml") => config.to_toml()?,
        Some("json") => config.to_json()?,
        _ => return Err(CliError::UnsupportedFileFormat),
    };
    fs::write(path, content)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use segmentation::SplitOrder;
    use tempfile::TempDir;

    const JOB_TOML: &str = r#"
data_dir = "data"
frames = { start = 1, end = 200 }

[segmentation.split]
order = "lowest_first"
breakpoints = [{ ratio = 1.25, parts = 2 }]

[[steps]]
name = "letters"
description = "Training crops"
operation = { type = "letter_detection" }

[[steps]]
name = "binarized"
operation = { type = "threshold", params = { threshold = 127 } }

[[steps]]
name = "notes"
description = "No operation, skipped"
"#;

    #[test]
    fn test_job_from_toml() {
        let job = RenderJob::from_toml(JOB_TOML).unwrap();
        assert_eq!(job.data_dir, "data");
        assert_eq!(job.input_dir, "input");
        assert_eq!(job.extension, "jpg");
        assert_eq!(job.frames, FrameRange::new(1, 200).unwrap());
        assert_eq!(job.segmentation.split.order, SplitOrder::LowestFirst);
        assert_eq!(job.segmentation.glyph_count, 4);
        assert_eq!(job.steps.len(), 3);
        assert_eq!(job.steps[0].operation, Some(RenderOperation::LetterDetection));
        assert_eq!(job.steps[1].operation, Some(RenderOperation::Threshold { threshold: 127 }));
        assert_eq!(job.steps[2].operation, None);
    }

    #[test]
    fn test_job_survives_json() {
        let job = RenderJob::from_toml(JOB_TOML).unwrap();
        let json = job.to_json().unwrap();
        assert_eq!(RenderJob::from_json(&json).unwrap(), job);
    }

    #[test]
    fn test_job_rejects_invalid_segmentation() {
        let content = format!("{}\n[segmentation]\nglyph_count = 5\n", JOB_TOML);
        assert!(matches!(
            RenderJob::from_toml(&content),
            Err(CliError::Segmentation(SegmentationError::InvalidConfig(_)))
        ));
    }

    #[test]
    fn test_job_rejects_inverted_frame_range() {
        let content = JOB_TOML.replace("frames = { start = 1, end = 200 }", "frames = { start = 5, end = 1 }");
        let err = RenderJob::from_toml(&content).unwrap_err();
        assert!(matches!(err, CliError::TomlDeError(_)));
        assert!(err.to_string().contains("start 5 > end 1"));

        let json = r#"{"data_dir": "data", "frames": {"start": 9, "end": 3}, "steps": []}"#;
        assert!(matches!(RenderJob::from_json(json), Err(CliError::SerdeError(_))));
    }

    #[test]
    fn test_from_file_by_extension() {
        let dir = TempDir::new().unwrap();
        let toml_path = dir.path().join("job.toml");
        fs::write(&toml_path, JOB_TOML).unwrap();
        assert!(RenderJob::from_file(&toml_path).is_ok());

        let yaml_path = dir.path().join("job.yaml");
        fs::write(&yaml_path, JOB_TOML).unwrap();
        assert!(matches!(RenderJob::from_file(&yaml_path), Err(CliError::UnsupportedFileFormat)));
    }

    #[test]
    fn test_config_files() {
        let dir = TempDir::new().unwrap();
        let config = SegmentationConfig::default();
        for name in ["config.toml", "config.json"] {
            let path = dir.path().join(name);
            write_config(&config, &path).unwrap();
            assert_eq!(load_config(Some(&path)).unwrap(), config);
        }
        assert!(write_config(&config, &dir.path().join("config.ini")).is_err());
        assert_eq!(load_config(None).unwrap(), config);
    }
}
