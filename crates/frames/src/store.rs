use std::fs;
use std::path::{Path, PathBuf};

use captcha_common::utils::{ensure_output_dir, format_frame_index, frame_stem, is_image_file, parse_frame_stem};
use image::DynamicImage;
use tracing::trace;

use crate::{Frame, FrameError, FrameSink, FrameSource, Result};

/// A data directory holding an input folder and one folder per output category
#[derive(Debug, Clone)]
pub struct DirectoryStore {
    pub root: PathBuf,
    pub input_dir: String,
    /// Extension of written files; also picks the encoder
    pub extension: String,
}

impl DirectoryStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            input_dir: "input".to_string(),
            extension: "jpg".to_string(),
        }
    }

    pub fn with_input_dir(mut self, input_dir: impl Into<String>) -> Self {
        self.input_dir = input_dir.into();
        self
    }

    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    pub fn input_path(&self) -> PathBuf {
        self.root.join(&self.input_dir)
    }

    pub fn category_path(&self, category: &str) -> PathBuf {
        self.root.join(category)
    }

    /// Image file names in `dir`, sorted
    fn image_files(dir: &Path) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                if is_image_file(name) {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    /// First input file whose name carries the given frame number
    fn find_input(&self, index: u32) -> Result<String> {
        let dir = self.input_path();
        let prefix = format_frame_index(index);
        let not_found = || FrameError::NotFound {
            index,
            dir: dir.clone(),
        };
        if !dir.is_dir() {
            return Err(not_found());
        }

        Self::image_files(&dir)?
            .into_iter()
            .find(|name| {
                name.strip_prefix(&prefix)
                    .is_some_and(|rest| !rest.starts_with(|c: char| c.is_ascii_digit()))
            })
            .ok_or_else(not_found)
    }
}

impl FrameSource for DirectoryStore {
    fn read(&self, index: u32) -> Result<Frame> {
        let name = self.find_input(index)?;
        let stem = Path::new(&name)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default();
        let (_, label) = parse_frame_stem(stem).map_err(|_| FrameError::MalformedName { name: name.clone() })?;

        trace!(index, file = %name, "reading frame");
        let image = image::open(self.input_path().join(&name))?;
        Ok(Frame { image, label, index })
    }

    fn count_frames(&self) -> Result<usize> {
        Ok(Self::image_files(&self.input_path())?.len())
    }

    fn description(&self) -> String {
        format!("Directory: {}", self.input_path().display())
    }
}

impl FrameSink for DirectoryStore {
    fn write(&self, image: &DynamicImage, label: &str, index: u32, category: &str) -> Result<PathBuf> {
        let dir = self.category_path(category);
        ensure_output_dir(&dir)?;
        let path = dir.join(format!(
            "{}.{}",
            frame_stem(&format_frame_index(index), label),
            self.extension
        ));
        image.save(&path)?;
        Ok(path)
    }

    fn write_letter(&self, image: &DynamicImage, label: &str, category: &str) -> Result<PathBuf> {
        let dir = self.category_path(category).join(label);
        ensure_output_dir(&dir)?;
        let count = fs::read_dir(&dir)?.count();
        let path = dir.join(format!("{}.{}", count + 1, self.extension));
        image.save(&path)?;
        Ok(path)
    }

    fn description(&self) -> String {
        format!("Directory: {} (*.{})", self.root.display(), self.extension)
    }
}
