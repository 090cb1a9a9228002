//! Models command - inspect and download model files.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Command;

use clap::{Args, Subcommand};
use console::style;
use futures_util::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::warn;

use invex_core::models::config::{InvexConfig, RecognitionEngine};

use super::config::load_config;

/// Arguments for the models command.
#[derive(Args)]
pub struct ModelsArgs {
    #[command(subcommand)]
    command: ModelsCommand,
}

#[derive(Subcommand)]
enum ModelsCommand {
    /// Check which engines and model files are available
    Status,

    /// Download a model file
    Fetch(FetchArgs),
}

#[derive(Args)]
struct FetchArgs {
    /// URL of the file to download
    url: String,

    /// Destination path (default: the recognition model directory)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Overwrite an existing file
    #[arg(long)]
    force: bool,
}

pub async fn run(args: ModelsArgs, config_path: Option<&Path>) -> anyhow::Result<()> {
    let config = load_config(config_path)?;

    match args.command {
        ModelsCommand::Status => check_status(&config),
        ModelsCommand::Fetch(fetch_args) => fetch_model(fetch_args, &config).await,
    }
}

fn check_status(config: &InvexConfig) -> anyhow::Result<()> {
    let recognition = &config.recognition;

    println!("{}", style("Model Status").bold());
    println!(
        "Recognition engine: {}",
        style(format!("{:?}", recognition.engine).to_lowercase()).cyan().bold()
    );
    println!();

    let tesseract = &recognition.tesseract_cmd;
    let active_marker = |engine: RecognitionEngine| {
        if recognition.engine == engine {
            style(" ◀ active").green().to_string()
        } else {
            String::new()
        }
    };

    println!(
        "{} {}{}",
        style("▸ tesseract").bold(),
        tesseract.display(),
        active_marker(RecognitionEngine::Tesseract)
    );
    match tesseract_version(tesseract) {
        Some(version) => println!("    {} {}", style("✓").green(), version),
        None => println!("    {} not found", style("✗").red()),
    }
    println!();

    println!(
        "{} {}{}",
        style("▸ onnx").bold(),
        recognition.model_dir.display(),
        active_marker(RecognitionEngine::Onnx)
    );
    for file_name in [
        &recognition.detection_model,
        &recognition.recognition_model,
        &recognition.dictionary,
    ] {
        print_file_status(file_name, &recognition.model_path(file_name))?;
    }
    println!();

    let detection = &config.detection;
    let enabled = if detection.enabled {
        style(" ◀ enabled").green().to_string()
    } else {
        String::new()
    };
    println!("{}{}", style("▸ detection").bold(), enabled);
    print_file_status(
        &detection.model_path.display().to_string(),
        &detection.model_path,
    )?;
    println!();

    Ok(())
}

fn print_file_status(label: &str, path: &Path) -> anyhow::Result<()> {
    let (status, size_str) = if path.exists() {
        let size = fs::metadata(path)?.len();
        (style("✓").green(), format_size(size))
    } else {
        (style("✗").red(), "missing".to_string())
    };

    println!("    {} {:<25} {:>10}", status, label, size_str);
    Ok(())
}

/// First line of `<cmd> --version`, if the command runs.
fn tesseract_version(cmd: &Path) -> Option<String> {
    let output = Command::new(cmd).arg("--version").output().ok()?;
    if !output.status.success() {
        return None;
    }
    // Older releases print the version to stderr.
    let text = if output.stdout.is_empty() {
        String::from_utf8_lossy(&output.stderr).into_owned()
    } else {
        String::from_utf8_lossy(&output.stdout).into_owned()
    };
    text.lines().next().map(|l| l.trim().to_string())
}

async fn fetch_model(args: FetchArgs, config: &InvexConfig) -> anyhow::Result<()> {
    let file_name = file_name_from_url(&args.url)
        .ok_or_else(|| anyhow::anyhow!("Cannot determine file name from URL: {}", args.url))?;

    let path = args
        .output
        .unwrap_or_else(|| config.recognition.model_dir.join(&file_name));

    if path.exists() && !args.force {
        println!(
            "  {} {} (already exists, {})",
            style("✓").green(),
            path.display(),
            format_size(fs::metadata(&path)?.len())
        );
        return Ok(());
    }

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let client = reqwest::Client::builder()
        .user_agent(concat!("invex-cli/", env!("CARGO_PKG_VERSION")))
        .timeout(std::time::Duration::from_secs(300))
        .build()?;

    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("  {spinner:.green} {msg:<30} [{bar:25.cyan/blue}] {bytes}/{total_bytes}")
            .unwrap()
            .progress_chars("=>-"),
    );
    pb.set_message(file_name.clone());

    match download_file(&client, &args.url, &path, &pb).await {
        Ok(size) => {
            pb.finish_with_message(format!("{} {}", style("✓").green(), file_name));
            println!(
                "{} Saved {} to {}",
                style("✓").green().bold(),
                format_size(size),
                path.display()
            );
            Ok(())
        }
        Err(e) => {
            pb.finish_with_message(format!("{} {} - {}", style("✗").red(), file_name, e));
            Err(e)
        }
    }
}

async fn download_file(
    client: &reqwest::Client,
    url: &str,
    path: &Path,
    pb: &ProgressBar,
) -> anyhow::Result<u64> {
    let response = client.get(url).send().await?;

    if !response.status().is_success() {
        anyhow::bail!("HTTP {}", response.status());
    }

    if let Some(content_length) = response.content_length() {
        pb.set_length(content_length);
    }

    // Renamed into place once complete
    let temp_path = path.with_extension("tmp");
    let mut file = File::create(&temp_path)?;

    let mut stream = response.bytes_stream();
    let mut downloaded: u64 = 0;

    let written: anyhow::Result<()> = async {
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk)?;
            downloaded += chunk.len() as u64;
            pb.set_position(downloaded);
        }
        file.flush()?;
        Ok(())
    }
    .await;
    drop(file);

    if let Err(e) = written {
        remove_partial(&temp_path);
        return Err(e);
    }

    fs::rename(&temp_path, path)?;

    Ok(downloaded)
}

/// Delete a partially written download, ignoring a file that is already gone.
fn remove_partial(temp_path: &Path) {
    if let Err(e) = fs::remove_file(temp_path) {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!("Could not remove {}: {}", temp_path.display(), e);
        }
    }
}

/// Last non-empty path segment of a URL, without query or fragment.
fn file_name_from_url(url: &str) -> Option<String> {
    let path = url.split(['?', '#']).next()?;
    let path = path.split_once("://").map(|(_, rest)| rest).unwrap_or(path);
    let (_, tail) = path.split_once('/')?;
    tail.rsplit('/')
        .find(|segment| !segment.is_empty())
        .map(str::to_string)
}

fn format_size(bytes: u64) -> String {
    if bytes >= 1_000_000_000 {
        format!("{:.1}GB", bytes as f64 / 1_000_000_000.0)
    } else if bytes >= 1_000_000 {
        format!("{:.1}MB", bytes as f64 / 1_000_000.0)
    } else if bytes >= 1_000 {
        format!("{:.1}KB", bytes as f64 / 1_000.0)
    } else {
        format!("{}B", bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_name_from_url() {
        assert_eq!(
            file_name_from_url("https://example.com/models/yolov8n.onnx?download=1").as_deref(),
            Some("yolov8n.onnx")
        );
        assert_eq!(
            file_name_from_url("https://example.com/models/det.onnx/").as_deref(),
            Some("det.onnx")
        );
        assert_eq!(file_name_from_url("https://example.com"), None);
        assert_eq!(file_name_from_url("https://example.com/"), None);
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(512), "512B");
        assert_eq!(format_size(2_500), "2.5KB");
        assert_eq!(format_size(6_200_000), "6.2MB");
    }

    #[test]
    fn test_remove_partial() {
        let dir = tempfile::tempdir().unwrap();
        let temp_path = dir.path().join("det.tmp");
        fs::write(&temp_path, b"partial").unwrap();

        remove_partial(&temp_path);
        assert!(!temp_path.exists());

        // Already gone is not an error.
        remove_partial(&temp_path);
    }
}
