use std::fs;
use std::path::{Path, PathBuf};

use crate::color::ColorConfig;
use crate::ocr::RecognizerConfig;

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    pub color: ColorConfig,
    pub recognizer: RecognizerConfig,
    // Run color extraction and text recognition side by side
    pub parallel: bool,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            color: ColorConfig::default(),
            recognizer: RecognizerConfig::default(),
            parallel: true,
        }
    }
}

impl AnalyzerConfig {
    pub fn load() -> Option<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn save(&self) -> Option<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Option<Self> {
        fs::read_to_string(path)
            .ok()
            .and_then(|contents| serde_json::from_str(&contents).ok())
    }

    pub fn save_to(&self, path: &Path) -> Option<()> {
        // Create config directory if it doesn't exist
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).ok()?;
        }

        serde_json::to_string_pretty(self)
            .ok()
            .and_then(|json| fs::write(path, json).ok())
    }

    pub fn config_path() -> Option<PathBuf> {
        #[allow(deprecated)]
        let home = std::env::home_dir()?;
        Some(home.join(".config").join("thumbcheck").join("config.json"))
    }
}
