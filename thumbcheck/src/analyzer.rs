//! Pipeline orchestration: decode, extract the dominant color, binarize and
//! recognize text, then judge both.
//!
//! [`run`] is the whole pipeline as one blocking call. [`Analyzer`] wraps it in a
//! session that owns the current image, runs the pipeline on a worker thread and
//! tracks `Idle -> Running -> Succeeded | Failed`.

use parking_lot::Mutex;

use std::panic::{self, AssertUnwindSafe};
use std::sync::{mpsc, Arc};
use std::thread::{self, JoinHandle};

use crate::color::{self, DominantColor};
use crate::config::AnalyzerConfig;
use crate::error::AnalysisError;
use crate::image::{self, EncodedImage};
use crate::ocr::{CancelToken, Tesseract, TextRecognizer};
use crate::report::AnalysisReport;
use crate::verdict::Verdict;

/// Shown while a run is in progress.
pub const ANALYZING_MESSAGE: &str = "Analyzing...";
/// The only failure text end users ever see.
pub const GENERIC_FAILURE_MESSAGE: &str = "An error occurred while analyzing the image.";

#[derive(Debug, Clone)]
pub enum AnalysisStatus {
    Idle,
    Running,
    Succeeded(AnalysisReport),
    Failed {
        // kept for diagnostics, never shown to the user
        error: Arc<AnalysisError>,
    },
}

impl AnalysisStatus {
    /// Text for the presentation layer.
    pub fn message(&self) -> String {
        match self {
            AnalysisStatus::Idle => String::new(),
            AnalysisStatus::Running => ANALYZING_MESSAGE.to_string(),
            AnalysisStatus::Succeeded(report) => report.to_string(),
            AnalysisStatus::Failed { .. } => GENERIC_FAILURE_MESSAGE.to_string(),
        }
    }

    pub fn report(&self) -> Option<&AnalysisReport> {
        match self {
            AnalysisStatus::Succeeded(report) => Some(report),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&AnalysisError> {
        match self {
            AnalysisStatus::Failed { error } => Some(error.as_ref()),
            _ => None,
        }
    }
}

impl From<Result<AnalysisReport, AnalysisError>> for AnalysisStatus {
    fn from(result: Result<AnalysisReport, AnalysisError>) -> Self {
        match result {
            Ok(report) => AnalysisStatus::Succeeded(report),
            Err(error) => AnalysisStatus::Failed {
                error: Arc::new(error),
            },
        }
    }
}

#[derive(Debug, Clone)]
pub enum AnalysisEvent {
    Started { generation: u64 },
    Decoded { width: u32, height: u32 },
    ColorExtracted(DominantColor),
    TextRecognized { chars: usize },
    Finished(AnalysisStatus),
}

/// Run the full pipeline on one image.
pub fn run(
    image: &EncodedImage,
    recognizer: &dyn TextRecognizer,
    config: &AnalyzerConfig,
    cancel: &CancelToken,
) -> Result<AnalysisReport, AnalysisError> {
    run_observed(image, recognizer, config, cancel, &|_: AnalysisEvent| {})
}

fn run_observed(
    image: &EncodedImage,
    recognizer: &dyn TextRecognizer,
    config: &AnalyzerConfig,
    cancel: &CancelToken,
    on_event: &(dyn Fn(AnalysisEvent) + Sync),
) -> Result<AnalysisReport, AnalysisError> {
    // each run works on its own decoded copy
    let pixels = image::decode(image.as_bytes())?;
    let (width, height) = pixels.dimensions();
    log::info!("Analyzing {width}x{height} image");
    on_event(AnalysisEvent::Decoded { width, height });

    let color_branch = || -> Result<DominantColor, AnalysisError> {
        let color = color::dominant_color(&pixels, &config.color)?;
        on_event(AnalysisEvent::ColorExtracted(color));
        Ok(color)
    };

    // the recognizer only ever sees the binarized image
    let text_branch = || -> Result<String, AnalysisError> {
        let png = image::binarize_to_png(&pixels)?;
        if cancel.is_cancelled() {
            return Err(AnalysisError::Cancelled);
        }
        let raw = recognizer.recognize(&png, &config.recognizer, cancel)?;
        let text = raw.trim().to_string();
        on_event(AnalysisEvent::TextRecognized {
            chars: text.chars().count(),
        });
        Ok(text)
    };

    let (color, text) = if config.parallel {
        let (color, text) = rayon::join(color_branch, text_branch);
        (color?, text?)
    } else {
        (color_branch()?, text_branch()?)
    };

    if cancel.is_cancelled() {
        return Err(AnalysisError::Cancelled);
    }

    let report = AnalysisReport::new(color, text);
    log::info!(
        "Verdicts: color {}, text {}, conclusion {}",
        report.color_verdict.label(),
        report.text_verdict.label(),
        report.conclusion.label()
    );
    Ok(report)
}

struct Session {
    image: Option<Arc<EncodedImage>>,
    status: AnalysisStatus,
    // bumped by every load and every run; a run only publishes if it is still current
    generation: u64,
    cancel: CancelToken,
}

impl Session {
    fn supersede(&mut self) -> (u64, CancelToken) {
        self.cancel.cancel();
        self.generation += 1;
        self.cancel = CancelToken::new();
        (self.generation, self.cancel.clone())
    }

    fn publish(&mut self, generation: u64, status: &AnalysisStatus) {
        if self.generation == generation {
            self.status = status.clone();
        } else {
            log::info!(
                "Discarding result of run {generation}, session is at {}",
                self.generation
            );
        }
    }
}

/// A stateful analysis session holding at most one image and one in-flight run.
pub struct Analyzer {
    recognizer: Arc<dyn TextRecognizer>,
    config: AnalyzerConfig,
    session: Arc<Mutex<Session>>,
}

impl Analyzer {
    pub fn new(recognizer: impl TextRecognizer + 'static, config: AnalyzerConfig) -> Self {
        Self {
            recognizer: Arc::new(recognizer),
            config,
            session: Arc::new(Mutex::new(Session {
                image: None,
                status: AnalysisStatus::Idle,
                generation: 0,
                cancel: CancelToken::new(),
            })),
        }
    }

    pub fn with_tesseract(config: AnalyzerConfig) -> Self {
        Self::new(Tesseract, config)
    }

    /// Replace the current image.
    ///
    /// The previous report is discarded and a run still in flight is cancelled;
    /// its result will never be published.
    pub fn load(&self, image: impl Into<EncodedImage>) {
        let image = image.into();
        let mut session = self.session.lock();
        let (generation, _) = session.supersede();
        log::debug!("Loaded {} byte image, generation {generation}", image.len());
        session.image = Some(Arc::new(image));
        session.status = AnalysisStatus::Idle;
    }

    pub fn status(&self) -> AnalysisStatus {
        self.session.lock().status.clone()
    }

    pub fn message(&self) -> String {
        self.session.lock().status.message()
    }

    /// Start analyzing the current image on a worker thread.
    ///
    /// Returns `None`, leaving the session untouched, when no image is loaded.
    /// Starting a new run cancels the previous one.
    pub fn analyze(&self) -> Option<AnalysisHandle> {
        let (image, generation, cancel) = {
            let mut session = self.session.lock();
            let Some(image) = session.image.clone() else {
                log::debug!("No image loaded, nothing to analyze");
                return None;
            };
            let (generation, cancel) = session.supersede();
            session.status = AnalysisStatus::Running;
            (image, generation, cancel)
        };

        let (event_tx, event_rx) = mpsc::channel();
        event_tx.send(AnalysisEvent::Started { generation }).ok();

        let recognizer = Arc::clone(&self.recognizer);
        let config = self.config.clone();
        let session = Arc::clone(&self.session);

        let worker = thread::spawn(move || {
            let on_event = |event: AnalysisEvent| {
                event_tx.send(event).ok();
            };
            let result = panic::catch_unwind(AssertUnwindSafe(|| {
                run_observed(&image, recognizer.as_ref(), &config, &cancel, &on_event)
            }))
            .unwrap_or(Err(AnalysisError::WorkerPanicked));

            match &result {
                Ok(_) => log::info!("Analysis {generation} succeeded"),
                Err(e) if e.is_cancelled() => log::info!("Analysis {generation} cancelled"),
                Err(e) => log::error!("Analysis {generation} failed: {e}"),
            }

            let status = AnalysisStatus::from(result);
            session.lock().publish(generation, &status);
            event_tx.send(AnalysisEvent::Finished(status.clone())).ok();
            status
        });

        Some(AnalysisHandle {
            generation,
            events: event_rx,
            worker,
        })
    }
}

/// A run in progress.
pub struct AnalysisHandle {
    generation: u64,
    events: mpsc::Receiver<AnalysisEvent>,
    worker: JoinHandle<AnalysisStatus>,
}

impl AnalysisHandle {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Progress events, ending with `Finished`.
    pub fn events(&self) -> &mpsc::Receiver<AnalysisEvent> {
        &self.events
    }

    /// Block until the run ends and return its own final status.
    pub fn wait(self) -> AnalysisStatus {
        self.worker
            .join()
            .unwrap_or_else(|_| AnalysisStatus::from(Err(AnalysisError::WorkerPanicked)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RecognitionError;
    use crate::image::{encode_png, PixelBuffer};
    use crate::ocr::RecognizerConfig;
    use crate::verdict::{ColorVerdict, Conclusion, TextVerdict};

    use std::time::Duration;

    struct FixedText(&'static str);

    impl TextRecognizer for FixedText {
        fn recognize(
            &self,
            _: &EncodedImage,
            _: &RecognizerConfig,
            _: &CancelToken,
        ) -> Result<String, RecognitionError> {
            Ok(self.0.to_string())
        }
    }

    /// Blocks until cancelled.
    struct Stuck;

    impl TextRecognizer for Stuck {
        fn recognize(
            &self,
            _: &EncodedImage,
            _: &RecognizerConfig,
            cancel: &CancelToken,
        ) -> Result<String, RecognitionError> {
            while !cancel.is_cancelled() {
                thread::sleep(Duration::from_millis(5));
            }
            Err(RecognitionError::Cancelled)
        }
    }

    struct Crashing;

    impl TextRecognizer for Crashing {
        fn recognize(
            &self,
            _: &EncodedImage,
            _: &RecognizerConfig,
            _: &CancelToken,
        ) -> Result<String, RecognitionError> {
            panic!("engine crashed")
        }
    }

    fn png(rgba: [u8; 4]) -> EncodedImage {
        encode_png(&PixelBuffer::filled(16, 16, rgba)).unwrap()
    }

    #[test]
    fn run_trims_recognized_text() {
        let report = run(
            &png([120, 120, 120, 255]),
            &FixedText("  \n SALE 50 \n\n"),
            &AnalyzerConfig::default(),
            &CancelToken::new(),
        )
        .unwrap();

        assert_eq!(report.text, "SALE 50");
        assert_eq!(report.color_verdict, ColorVerdict::Balanced);
        assert_eq!(report.text_verdict, TextVerdict::ReasonableAmount);
        assert_eq!(report.conclusion, Conclusion::LooksGood);
    }

    #[test]
    fn sequential_and_parallel_agree() {
        let image = png([10, 200, 30, 255]);
        let parallel = AnalyzerConfig::default();
        let sequential = AnalyzerConfig {
            parallel: false,
            ..AnalyzerConfig::default()
        };
        let a = run(&image, &FixedText("abc"), &parallel, &CancelToken::new()).unwrap();
        let b = run(&image, &FixedText("abc"), &sequential, &CancelToken::new()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn analyze_without_image_is_a_no_op() {
        let analyzer = Analyzer::new(FixedText("x"), AnalyzerConfig::default());
        assert!(analyzer.analyze().is_none());
        assert!(matches!(analyzer.status(), AnalysisStatus::Idle));
        assert_eq!(analyzer.message(), "");
    }

    #[test]
    fn loading_cancels_the_running_analysis() {
        let analyzer = Analyzer::new(Stuck, AnalyzerConfig::default());
        analyzer.load(png([240, 240, 240, 255]));

        let handle = analyzer.analyze().unwrap();
        assert!(matches!(analyzer.status(), AnalysisStatus::Running));
        assert_eq!(analyzer.message(), ANALYZING_MESSAGE);

        // loading a new image cancels the stuck run and resets to idle
        analyzer.load(png([10, 10, 10, 255]));
        let status = handle.wait();
        assert!(status.error().is_some_and(AnalysisError::is_cancelled));
        assert!(matches!(analyzer.status(), AnalysisStatus::Idle));
    }

    #[test]
    fn events_end_with_finished() {
        let analyzer = Analyzer::new(FixedText("HELLO"), AnalyzerConfig::default());
        analyzer.load(png([10, 10, 10, 255]));

        let handle = analyzer.analyze().unwrap();
        let events: Vec<_> = handle.events().iter().collect();
        let status = handle.wait();

        assert!(matches!(events.first(), Some(AnalysisEvent::Started { .. })));
        assert!(events
            .iter()
            .any(|e| matches!(e, AnalysisEvent::ColorExtracted(c) if c.rgb() == [10, 10, 10])));
        assert!(events
            .iter()
            .any(|e| matches!(e, AnalysisEvent::TextRecognized { chars: 5 })));
        assert!(matches!(
            events.last(),
            Some(AnalysisEvent::Finished(AnalysisStatus::Succeeded(_)))
        ));

        let report = status.report().unwrap();
        assert_eq!(report.conclusion, Conclusion::AdjustColors);
        assert_eq!(analyzer.status().report(), Some(report));
    }

    #[test]
    fn retriggering_supersedes_the_running_analysis() {
        let analyzer = Analyzer::new(Stuck, AnalyzerConfig::default());
        analyzer.load(png([120, 120, 120, 255]));

        let first = analyzer.analyze().unwrap();
        let second = analyzer.analyze().unwrap();
        assert!(second.generation() > first.generation());

        assert!(first.wait().error().is_some_and(AnalysisError::is_cancelled));
        // the first run's cancellation never leaks into the session
        assert!(matches!(analyzer.status(), AnalysisStatus::Running));

        analyzer.load(png([1, 2, 3, 255]));
        second.wait();
        assert!(matches!(analyzer.status(), AnalysisStatus::Idle));
    }

    #[test]
    fn panicking_recognizer_fails_the_session() {
        let analyzer = Analyzer::new(Crashing, AnalyzerConfig::default());
        analyzer.load(png([120, 120, 120, 255]));

        let handle = analyzer.analyze().unwrap();
        let events: Vec<_> = handle.events().iter().collect();
        drop(handle);

        assert!(matches!(
            events.last(),
            Some(AnalysisEvent::Finished(AnalysisStatus::Failed { .. }))
        ));
        let status = analyzer.status();
        assert!(matches!(status.error(), Some(AnalysisError::WorkerPanicked)));
        assert_eq!(analyzer.message(), GENERIC_FAILURE_MESSAGE);
    }

    #[test]
    fn failure_hides_details() {
        let analyzer = Analyzer::new(FixedText("x"), AnalyzerConfig::default());
        analyzer.load(b"not an image".to_vec());

        let status = analyzer.analyze().unwrap().wait();
        assert!(matches!(status.error(), Some(AnalysisError::Decode(_))));
        assert!(status.report().is_none());
        assert_eq!(analyzer.message(), GENERIC_FAILURE_MESSAGE);
    }
}
