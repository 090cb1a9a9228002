//! Process command - extract fields from a single document image.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::Args;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info};

use invex_core::models::config::InvexConfig;
use invex_core::pipeline::{DocumentPipeline, DocumentResult};
use invex_core::ExtractedRecord;

use super::config::load_config;

/// Arguments for the process command.
#[derive(Args)]
pub struct ProcessArgs {
    /// Input image (PNG, JPEG, TIFF, BMP, WebP)
    #[arg(required = true)]
    input: PathBuf,

    /// Output file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "json")]
    format: OutputFormat,

    #[command(flatten)]
    engine: EngineArgs,

    /// Include detections and stage timings in JSON output
    #[arg(long)]
    details: bool,
}

/// Pipeline overrides shared by `process` and `batch`.
#[derive(Args, Clone)]
pub struct EngineArgs {
    /// Tesseract executable (overrides recognition.tesseract_cmd)
    #[arg(long)]
    tesseract_cmd: Option<PathBuf>,

    /// Run object detection before recognition
    #[arg(long)]
    detect: bool,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    /// JSON output
    Json,
    /// CSV output
    Csv,
    /// Plain text summary
    Text,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Json => "json",
            OutputFormat::Csv => "csv",
            OutputFormat::Text => "txt",
        }
    }
}

pub async fn run(args: ProcessArgs, config_path: Option<&Path>) -> anyhow::Result<()> {
    let start = Instant::now();

    let config = load_config(config_path)?;

    // Check input file exists
    if !args.input.exists() {
        anyhow::bail!("Input file not found: {}", args.input.display());
    }

    info!("Processing file: {}", args.input.display());

    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")
            .unwrap(),
    );
    pb.set_message("Loading pipeline...");

    let pipeline = build_pipeline(config, &args.engine)?;

    pb.set_message(format!("Recognizing text with {}...", pipeline.recognizer_name()));
    let result = pipeline.process_file(&args.input);
    pb.finish_and_clear();
    let result = result?;

    let output = if args.details && matches!(args.format, OutputFormat::Json) {
        serde_json::to_string_pretty(&result)?
    } else {
        format_record(&result.record, args.format)?
    };

    if let Some(output_path) = &args.output {
        fs::write(output_path, &output)?;
        eprintln!(
            "{} Output written to {}",
            style("✓").green(),
            output_path.display()
        );
    } else {
        println!("{}", output);
    }

    if args.details && !matches!(args.format, OutputFormat::Json) {
        print_details(&result);
    }

    debug!("Total processing time: {:?}", start.elapsed());

    Ok(())
}

/// Build the pipeline from configuration plus command-line overrides.
pub fn build_pipeline(mut config: InvexConfig, engine: &EngineArgs) -> anyhow::Result<DocumentPipeline> {
    if let Some(cmd) = &engine.tesseract_cmd {
        config.recognition.tesseract_cmd = cmd.clone();
    }
    if engine.detect {
        config.detection.enabled = true;
    }

    let pipeline = DocumentPipeline::from_config(&config)
        .map_err(|e| anyhow::anyhow!("Failed to set up pipeline: {}", e))?;

    Ok(pipeline)
}

fn print_details(result: &DocumentResult) {
    eprintln!();
    eprintln!(
        "{} Image {}x{}, recognizer: {}",
        style("ℹ").blue(),
        result.image_size.0,
        result.image_size.1,
        result.recognizer
    );
    eprintln!(
        "{} Detections: {}",
        style("ℹ").blue(),
        result.detections.len()
    );
    eprintln!(
        "{} Processing time: {}ms (detection {}ms, preprocessing {}ms, recognition {}ms)",
        style("ℹ").blue(),
        result.timings.total_ms,
        result.timings.detection_ms,
        result.timings.preprocessing_ms,
        result.timings.recognition_ms
    );
}

pub fn format_record(record: &ExtractedRecord, format: OutputFormat) -> anyhow::Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(record)?),
        OutputFormat::Csv => format_csv(record),
        OutputFormat::Text => Ok(format_text(record)),
    }
}

fn format_csv(record: &ExtractedRecord) -> anyhow::Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);

    wtr.write_record(["invoice_number", "date", "total_amount", "vendor"])?;
    wtr.write_record([
        record.invoice_number.as_deref().unwrap_or_default(),
        record.date.as_deref().unwrap_or_default(),
        record.total_amount.as_deref().unwrap_or_default(),
        record.vendor.as_deref().unwrap_or_default(),
    ])?;

    let data = String::from_utf8(wtr.into_inner()?)?;
    Ok(data)
}

fn format_text(record: &ExtractedRecord) -> String {
    let show = |value: &Option<String>| value.clone().unwrap_or_else(|| "-".to_string());

    let mut output = String::new();
    output.push_str(&format!("Invoice number: {}\n", show(&record.invoice_number)));
    output.push_str(&format!("Date:           {}\n", show(&record.date)));
    output.push_str(&format!("Total amount:   {}\n", show(&record.total_amount)));
    output.push_str(&format!("Vendor:         {}\n", show(&record.vendor)));

    if let Some(raw_text) = &record.raw_text {
        output.push_str("\nRecognized text:\n");
        for line in raw_text.lines() {
            output.push_str(&format!("  {}\n", line));
        }
    }

    output
}
