//! Text recognition through an external Tesseract executable.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Command;

use image::{GrayImage, ImageFormat};
use tracing::{debug, trace};

use crate::error::OcrError;
use crate::models::config::RecognitionConfig;

use super::TextRecognizer;

/// Runs `tesseract <image> stdout` on a temporary PNG and returns stdout.
#[derive(Debug, Clone)]
pub struct TesseractRecognizer {
    command: PathBuf,
    language: String,
    page_segmentation_mode: Option<u8>,
}

impl TesseractRecognizer {
    /// Use the given executable with English and Tesseract's default page mode.
    pub fn new(command: impl Into<PathBuf>) -> Self {
        Self {
            command: command.into(),
            language: "eng".to_string(),
            page_segmentation_mode: None,
        }
    }

    pub fn from_config(config: &RecognitionConfig) -> Self {
        Self {
            command: config.tesseract_cmd.clone(),
            language: config.language.clone(),
            page_segmentation_mode: config.page_segmentation_mode,
        }
    }

    /// Set the language code(s).
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    /// Set the page segmentation mode.
    pub fn with_page_segmentation_mode(mut self, psm: u8) -> Self {
        self.page_segmentation_mode = Some(psm);
        self
    }

    pub fn command(&self) -> &Path {
        &self.command
    }

    fn build_command(&self, image_path: &Path) -> Command {
        let mut cmd = Command::new(&self.command);
        cmd.arg(image_path).arg("stdout").arg("-l").arg(&self.language);
        if let Some(psm) = self.page_segmentation_mode {
            cmd.arg("--psm").arg(psm.to_string());
        }
        cmd
    }
}

impl TextRecognizer for TesseractRecognizer {
    fn name(&self) -> &str {
        "tesseract"
    }

    fn recognize(&self, image: &GrayImage) -> Result<String, OcrError> {
        let file = tempfile::Builder::new()
            .prefix("invex-")
            .suffix(".png")
            .tempfile()
            .map_err(|e| OcrError::Recognition(format!("failed to create temp file: {}", e)))?;

        image
            .save_with_format(file.path(), ImageFormat::Png)
            .map_err(|e| OcrError::Recognition(format!("failed to write temp image: {}", e)))?;

        debug!(
            "Running {} on {}x{} image",
            self.command.display(),
            image.width(),
            image.height()
        );

        let output = self.build_command(file.path()).output().map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                OcrError::EngineNotFound(self.command.display().to_string())
            } else {
                OcrError::Recognition(format!("failed to run {}: {}", self.command.display(), e))
            }
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(OcrError::Recognition(format!(
                "{} exited with {}: {}",
                self.command.display(),
                output.status,
                stderr.trim()
            )));
        }

        let text = String::from_utf8_lossy(&output.stdout).into_owned();
        trace!("Tesseract output: {:?}", text);

        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    fn page() -> GrayImage {
        GrayImage::from_pixel(8, 8, Luma([255]))
    }

    #[test]
    fn test_missing_executable() {
        let recognizer = TesseractRecognizer::new("/nonexistent/bin/tesseract-invex");
        let err = recognizer.recognize(&page()).unwrap_err();
        assert!(matches!(err, OcrError::EngineNotFound(ref cmd) if cmd.contains("tesseract-invex")));
    }

    #[test]
    fn test_from_config() {
        let config = RecognitionConfig {
            tesseract_cmd: PathBuf::from("/usr/local/bin/tesseract"),
            language: "deu".to_string(),
            page_segmentation_mode: Some(4),
            ..Default::default()
        };
        let recognizer = TesseractRecognizer::from_config(&config);

        assert_eq!(recognizer.command(), Path::new("/usr/local/bin/tesseract"));
        assert_eq!(recognizer.language, "deu");
        assert_eq!(recognizer.page_segmentation_mode, Some(4));
    }

    #[cfg(unix)]
    #[test]
    fn test_passes_arguments_and_reads_stdout() {
        // `echo` prints back the arguments it was given.
        let recognizer = TesseractRecognizer::new("echo")
            .with_language("eng+deu")
            .with_page_segmentation_mode(6);

        let text = recognizer.recognize(&page()).unwrap();
        let args: Vec<&str> = text.split_whitespace().collect();

        assert!(args[0].ends_with(".png"));
        assert_eq!(&args[1..], ["stdout", "-l", "eng+deu", "--psm", "6"]);
    }

    #[cfg(unix)]
    #[test]
    fn test_failing_engine() {
        let err = TesseractRecognizer::new("false").recognize(&page()).unwrap_err();
        assert!(matches!(err, OcrError::Recognition(_)));
    }
}
