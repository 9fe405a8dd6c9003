pub mod analyzer;
pub mod color;
pub mod config;
pub mod error;
pub mod image;
pub mod ocr;
pub mod report;
pub mod verdict;

// Re-export commonly used types
pub use analyzer::{
    run, AnalysisEvent, AnalysisHandle, AnalysisStatus, Analyzer, ANALYZING_MESSAGE,
    GENERIC_FAILURE_MESSAGE,
};
pub use color::{ColorConfig, DominantColor};
pub use config::AnalyzerConfig;
pub use error::{AnalysisError, DecodeError, ExtractionError, RecognitionError};
pub use image::{EncodedImage, PixelBuffer};
pub use ocr::{CancelToken, PageSegMode, RecognizerConfig, Tesseract, TextRecognizer};
pub use report::AnalysisReport;
pub use verdict::{ColorVerdict, Conclusion, TextVerdict, Verdict};
