use anyhow::{Context, Result};
use clap::Parser;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use thumbcheck::{
    AnalysisEvent, AnalysisStatus, Analyzer, AnalyzerConfig, EncodedImage, PageSegMode, Tesseract,
};

#[derive(Parser)]
#[command(name = "thumbcheck")]
#[command(about = "Check a thumbnail's dominant color and amount of text", long_about = None)]
#[command(version)]
struct Args {
    /// Input image (PNG, JPEG, ...) or a text file holding a data URL
    #[arg(value_name = "INPUT")]
    input: PathBuf,

    /// Tesseract executable
    #[arg(long, value_name = "PATH")]
    tesseract: Option<PathBuf>,

    /// Tesseract page segmentation mode (0-13)
    #[arg(long, value_name = "MODE")]
    psm: Option<PageSegMode>,

    /// OCR timeout in seconds
    #[arg(long, value_name = "SECS")]
    timeout: Option<u64>,

    /// Extract the color and recognize text one after the other
    #[arg(long, default_value_t)]
    sequential: bool,

    /// Print the report as JSON
    #[arg(long, default_value_t)]
    json: bool,

    /// Store the effective settings in the config file
    #[arg(long, default_value_t)]
    save_config: bool,

    /// Verbose output
    #[arg(short, long, default_value_t)]
    verbose: bool,

    /// Quiet mode (minimal output)
    #[arg(short, long, default_value_t)]
    quiet: bool,
}

fn main() -> Result<ExitCode> {
    let args = Args::parse();

    // Setup logging
    setup_logging(args.verbose, args.quiet);

    // Validate input file
    if !args.input.exists() {
        anyhow::bail!("Input file does not exist: {}", args.input.display());
    }

    let config = build_config(&args)?;
    let psm = config.recognizer.page_seg_mode;
    log::debug!("Page segmentation mode {} ({})", psm.as_arg(), psm.name());
    if args.save_config {
        config.save().context("Failed to save config")?;
        log::info!("Saved config to {:?}", AnalyzerConfig::config_path());
    }

    if !Tesseract::is_available(&config.recognizer) {
        log::warn!(
            "`{}` could not be started, text recognition will fail",
            config.recognizer.program.display()
        );
    }

    let image = read_image(&args.input)?;

    let analyzer = Analyzer::with_tesseract(config);
    analyzer.load(image);
    let handle = analyzer.analyze().context("No image loaded")?;

    if !args.quiet && !args.json {
        println!("{}", analyzer.message());
    }

    for event in handle.events() {
        match event {
            AnalysisEvent::Decoded { width, height } => {
                log::info!("Decoded {width}x{height} image")
            }
            AnalysisEvent::ColorExtracted(color) => log::info!("Dominant color: {color}"),
            AnalysisEvent::TextRecognized { chars } => {
                log::info!("Recognized {chars} characters")
            }
            AnalysisEvent::Started { .. } | AnalysisEvent::Finished(_) => {}
        }
    }

    let status = handle.wait();
    match &status {
        AnalysisStatus::Succeeded(report) if args.json => {
            println!("{}", report.to_json().context("Failed to serialize report")?);
        }
        AnalysisStatus::Failed { error } => {
            log::debug!("Analysis error: {error:?}");
            eprintln!("{}", status.message());
            return Ok(ExitCode::FAILURE);
        }
        _ => println!("{}", status.message()),
    }

    Ok(ExitCode::SUCCESS)
}

fn setup_logging(verbose: bool, quiet: bool) {
    if quiet {
        return;
    }

    let level = if verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    env_logger::Builder::from_default_env()
        .filter_level(level)
        .format_timestamp(None)
        .format_target(false)
        .init();
}

fn build_config(args: &Args) -> Result<AnalyzerConfig> {
    let mut config = AnalyzerConfig::load().unwrap_or_default();

    if let Some(program) = &args.tesseract {
        config.recognizer.program = program.clone();
    }
    if let Some(psm) = args.psm {
        config.recognizer.page_seg_mode = psm;
    }
    if let Some(timeout) = args.timeout {
        config.recognizer.timeout_secs = timeout;
    }
    if args.sequential {
        config.parallel = false;
    }

    config
        .recognizer
        .validate()
        .context("Invalid recognizer settings")?;

    Ok(config)
}

/// Raw image bytes, or the image inside a `data:` URL.
fn read_image(path: &Path) -> Result<EncodedImage> {
    let bytes = std::fs::read(path).context("Failed to read input file")?;
    if bytes.starts_with(b"data:") {
        let url = String::from_utf8(bytes).context("Data URL is not valid UTF-8")?;
        return EncodedImage::from_data_url(&url).context("Failed to parse data URL");
    }
    Ok(EncodedImage::new(bytes))
}
