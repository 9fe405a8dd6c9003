//! Text recognition through an external OCR engine

use num_enum::TryFromPrimitive;
use serde::{Deserialize, Serialize};
use strum::{EnumCount, EnumIter};

use std::fs::{self, File};
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crate::error::RecognitionError;
use crate::image::EncodedImage;

/// Latin letters and digits; no punctuation or whitespace-producing symbols.
pub const DEFAULT_WHITELIST: &str =
    "ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

const POLL_INTERVAL: Duration = Duration::from_millis(25);
// Bytes of engine stderr kept in error messages
const STDERR_EXCERPT: usize = 512;

/// Tesseract page segmentation modes (`--psm`).
#[derive(
    Debug,
    Copy,
    Clone,
    PartialEq,
    Eq,
    Default,
    Serialize,
    Deserialize,
    TryFromPrimitive,
    EnumCount,
    EnumIter,
)]
#[repr(u8)]
pub enum PageSegMode {
    OsdOnly = 0,
    AutoOsd = 1,
    AutoOnly = 2,
    /// Fully automatic page segmentation, no orientation detection.
    #[default]
    FullyAutomatic = 3,
    SingleColumn = 4,
    SingleBlockVertical = 5,
    SingleBlock = 6,
    SingleLine = 7,
    SingleWord = 8,
    CircleWord = 9,
    SingleChar = 10,
    SparseText = 11,
    SparseTextOsd = 12,
    RawLine = 13,
}

impl PageSegMode {
    pub fn len() -> usize {
        Self::COUNT
    }

    pub fn iter() -> impl Iterator<Item = Self> {
        <Self as strum::IntoEnumIterator>::iter()
    }

    pub fn name(&self) -> &'static str {
        match self {
            PageSegMode::OsdOnly => "Orientation and script detection only",
            PageSegMode::AutoOsd => "Automatic segmentation with OSD",
            PageSegMode::AutoOnly => "Automatic segmentation, no OSD or OCR",
            PageSegMode::FullyAutomatic => "Fully automatic segmentation, no OSD",
            PageSegMode::SingleColumn => "Single column of text",
            PageSegMode::SingleBlockVertical => "Single block of vertical text",
            PageSegMode::SingleBlock => "Single uniform block of text",
            PageSegMode::SingleLine => "Single text line",
            PageSegMode::SingleWord => "Single word",
            PageSegMode::CircleWord => "Single word in a circle",
            PageSegMode::SingleChar => "Single character",
            PageSegMode::SparseText => "Sparse text",
            PageSegMode::SparseTextOsd => "Sparse text with OSD",
            PageSegMode::RawLine => "Raw line",
        }
    }

    /// Value passed to `--psm`.
    pub fn as_arg(&self) -> String {
        (*self as u8).to_string()
    }
}

#[derive(Debug)]
pub struct ParseError(String);

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.write_str("Invalid page segmentation mode: ")?;
        f.write_str(&self.0)
    }
}

impl std::error::Error for ParseError {}

impl TryFrom<&str> for PageSegMode {
    type Error = ParseError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        s.trim()
            .parse::<u8>()
            .ok()
            .and_then(|n| PageSegMode::try_from(n).ok())
            .ok_or_else(|| ParseError(s.to_string()))
    }
}

impl FromStr for PageSegMode {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::try_from(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecognizerConfig {
    /// OCR executable, looked up in PATH when not absolute.
    pub program: PathBuf,
    pub language: String,
    pub whitelist: String,
    pub page_seg_mode: PageSegMode,
    pub timeout_secs: u64,
}

impl Default for RecognizerConfig {
    fn default() -> Self {
        Self {
            program: PathBuf::from("tesseract"),
            language: "eng".to_string(),
            whitelist: DEFAULT_WHITELIST.to_string(),
            page_seg_mode: PageSegMode::FullyAutomatic,
            timeout_secs: 60,
        }
    }
}

impl RecognizerConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn validate(&self) -> Result<(), RecognitionError> {
        if self.whitelist.is_empty() {
            return Err(RecognitionError::Config("whitelist is empty".to_string()));
        }
        if let Some(c) = self.whitelist.chars().find(|c| !c.is_ascii_alphanumeric()) {
            return Err(RecognitionError::Config(format!(
                "whitelist may only hold ASCII letters and digits, found {c:?}"
            )));
        }
        if self.language.trim().is_empty() {
            return Err(RecognitionError::Config("language is empty".to_string()));
        }
        if self.timeout_secs == 0 {
            return Err(RecognitionError::Config("timeout must be positive".to_string()));
        }
        Ok(())
    }
}

/// Shared flag telling a running recognition to give up.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// An OCR engine. Receives the binarized PNG and returns the raw recognized text.
pub trait TextRecognizer: Send + Sync {
    fn recognize(
        &self,
        image: &EncodedImage,
        config: &RecognizerConfig,
        cancel: &CancelToken,
    ) -> Result<String, RecognitionError>;
}

/// Runs the `tesseract` command line tool, one process per image.
#[derive(Debug, Default, Clone, Copy)]
pub struct Tesseract;

impl Tesseract {
    /// Arguments after the input image and output base.
    pub fn options(config: &RecognizerConfig) -> Vec<String> {
        vec![
            "-l".to_string(),
            config.language.clone(),
            "--psm".to_string(),
            config.page_seg_mode.as_arg(),
            "-c".to_string(),
            format!("tessedit_char_whitelist={}", config.whitelist),
        ]
    }

    /// Checks if the OCR executable can be started
    pub fn is_available(config: &RecognizerConfig) -> bool {
        Command::new(&config.program)
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .is_ok()
    }
}

impl TextRecognizer for Tesseract {
    fn recognize(
        &self,
        image: &EncodedImage,
        config: &RecognizerConfig,
        cancel: &CancelToken,
    ) -> Result<String, RecognitionError> {
        config.validate()?;
        if cancel.is_cancelled() {
            return Err(RecognitionError::Cancelled);
        }

        // tesseract appends `.txt` to the output base
        let dir = tempfile::tempdir()?;
        let input = dir.path().join("input.png");
        let output_base = dir.path().join("output");
        let stderr_path = dir.path().join("stderr.log");
        fs::write(&input, image.as_bytes())?;

        let mut command = Command::new(&config.program);
        command
            .arg(&input)
            .arg(&output_base)
            .args(Self::options(config))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(File::create(&stderr_path)?);
        log::debug!("Running {command:?}");

        let start = Instant::now();
        let mut child = command.spawn().map_err(|source| RecognitionError::Spawn {
            program: config.program.display().to_string(),
            source,
        })?;

        let status = loop {
            if let Some(status) = child.try_wait()? {
                break status;
            }
            let error = if cancel.is_cancelled() {
                RecognitionError::Cancelled
            } else if start.elapsed() >= config.timeout() {
                RecognitionError::Timeout(config.timeout())
            } else {
                thread::sleep(POLL_INTERVAL);
                continue;
            };
            log::warn!("Stopping OCR engine: {error}");
            child.kill().ok();
            child.wait().ok();
            return Err(error);
        };

        if !status.success() {
            let stderr = fs::read(&stderr_path).unwrap_or_default();
            let stderr = String::from_utf8_lossy(&stderr);
            let stderr = stderr.trim();
            let excerpt = match stderr.char_indices().nth(STDERR_EXCERPT) {
                Some((end, _)) => &stderr[..end],
                None => stderr,
            };
            return Err(RecognitionError::Engine {
                code: status.code(),
                stderr: excerpt.to_string(),
            });
        }

        let text = fs::read(output_base.with_extension("txt"))?;
        let text = String::from_utf8_lossy(&text).into_owned();

        log::debug!(
            "OCR finished in {:?} with {} characters",
            start.elapsed(),
            text.trim().chars().count()
        );

        Ok(text)
    }
}
