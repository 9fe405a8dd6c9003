use std::time::Duration;

use thiserror::Error;

/// The encoded bytes could not be turned into a pixel buffer.
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("Failed to decode image: {0}")]
    Image(#[from] imageproc::image::ImageError),
    #[error("Invalid data URL: {0}")]
    DataUrl(String),
    #[error("Invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("Pixel buffer of {len} bytes does not match {width}x{height} RGBA")]
    BufferSize { width: u32, height: u32, len: usize },
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ExtractionError {
    #[error("Image has no pixels ({width}x{height})")]
    Empty { width: u32, height: u32 },
}

#[derive(Error, Debug)]
pub enum RecognitionError {
    #[error("Invalid recognizer configuration: {0}")]
    Config(String),
    #[error("Failed to prepare OCR input: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to start `{program}`: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },
    #[error("OCR engine failed with code {code:?}: {stderr}")]
    Engine { code: Option<i32>, stderr: String },
    #[error("OCR engine timed out after {0:?}")]
    Timeout(Duration),
    #[error("OCR engine was cancelled")]
    Cancelled,
}

/// Anything that can end an analysis run in the `Failed` state.
#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error("Failed to encode binarized image: {0}")]
    Encode(imageproc::image::ImageError),
    #[error(transparent)]
    Extraction(#[from] ExtractionError),
    #[error(transparent)]
    Recognition(#[from] RecognitionError),
    #[error("Analysis superseded by a newer run")]
    Cancelled,
    #[error("Analysis worker panicked")]
    WorkerPanicked,
}

impl AnalysisError {
    pub fn is_cancelled(&self) -> bool {
        matches!(
            self,
            AnalysisError::Cancelled | AnalysisError::Recognition(RecognitionError::Cancelled)
        )
    }
}
