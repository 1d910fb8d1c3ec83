//! Application settings, stored as JSON.
//!
//! Every field has a default so a partial (or missing) file is fine.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::classify::engine::DEFAULT_INPUT_SIZE;
use crate::classify::fallback::DEFAULT_STRIDE;
use crate::classify::scores::ScoreNormalization;

/// Classification pipeline settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ClassifierSettings {
    /// Directory holding `model.rten` and `labels.txt`
    pub assets_dir: PathBuf,
    /// Input width used when the model does not declare one
    pub input_width: u32,
    /// Input height used when the model does not declare one
    pub input_height: u32,
    pub normalization: ScoreNormalization,
    /// Pixel stride for the heuristic color average
    pub sample_stride: u32,
}

impl Default for ClassifierSettings {
    fn default() -> Self {
        Self {
            assets_dir: PathBuf::from("assets"),
            input_width: DEFAULT_INPUT_SIZE.0,
            input_height: DEFAULT_INPUT_SIZE.1,
            normalization: ScoreNormalization::Auto,
            sample_stride: DEFAULT_STRIDE,
        }
    }
}

/// History store settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct HistorySettings {
    pub database_path: PathBuf,
}

impl Default for HistorySettings {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("wastesort.db"),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub classifier: ClassifierSettings,
    pub history: HistorySettings,
}

impl Settings {
    /// Load settings from a file. A missing file gives the defaults.
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::debug!(path = %path.display(), "settings file not found, using defaults");
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings {:?}", path))?;
        let settings = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse settings {:?}", path))?;
        Ok(settings)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content).with_context(|| format!("Failed to write settings {:?}", path))?;
        Ok(())
    }
}
