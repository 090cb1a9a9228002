//! Extract command - run field extraction on text that was already recognized.

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use clap::Args;
use tracing::debug;

use invex_core::FieldParser;

use super::config::load_config;
use super::process::{format_record, OutputFormat};

/// Arguments for the extract command.
#[derive(Args)]
pub struct ExtractArgs {
    /// Text file to read (default: stdin)
    input: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "json")]
    format: OutputFormat,

    /// Leave the input text out of the record
    #[arg(long)]
    no_raw_text: bool,
}

pub async fn run(args: ExtractArgs, config_path: Option<&Path>) -> anyhow::Result<()> {
    let config = load_config(config_path)?;

    let text = match &args.input {
        Some(path) => fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read {}: {}", path.display(), e))?,
        None => {
            let mut text = String::new();
            std::io::stdin().read_to_string(&mut text)?;
            text
        }
    };

    debug!("Read {} characters", text.len());

    let mut parser = FieldParser::from_config(&config.extraction);
    if args.no_raw_text {
        parser = parser.with_raw_text(false);
    }

    let result = parser.parse(&text);
    println!("{}", format_record(&result.record, args.format)?);

    Ok(())
}
