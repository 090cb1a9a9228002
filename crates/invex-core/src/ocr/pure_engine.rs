//! Pure Rust OCR engine wrapper using `pure-onnx-ocr`.

use std::sync::Mutex;
use std::time::Instant;

use image::{DynamicImage, GrayImage};
use tracing::{debug, info};

use crate::error::OcrError;
use crate::models::config::RecognitionConfig;

use super::TextRecognizer;

/// Vertical distance within which two text boxes belong to the same line.
const LINE_TOLERANCE: f32 = 20.0;

/// Recognizer backed by `pure-onnx-ocr` detection and recognition models.
pub struct PureOcrEngine {
    engine: Mutex<pure_onnx_ocr::engine::OcrEngine>,
}

/// A recognized text fragment and the top-left corner of its box.
#[derive(Debug, Clone, PartialEq)]
struct Fragment {
    x: f32,
    y: f32,
    text: String,
}

impl PureOcrEngine {
    /// Load the models named in the recognition configuration.
    pub fn from_config(config: &RecognitionConfig) -> Result<Self, OcrError> {
        let det_path = config.model_path(&config.detection_model);
        let rec_path = config.model_path(&config.recognition_model);
        let dict_path = config.model_path(&config.dictionary);

        for path in [&det_path, &rec_path, &dict_path] {
            if !path.exists() {
                return Err(OcrError::ModelLoad(format!("missing {}", path.display())));
            }
        }

        let engine = pure_onnx_ocr::engine::OcrEngineBuilder::new()
            .det_model_path(&det_path)
            .rec_model_path(&rec_path)
            .dictionary_path(&dict_path)
            .build()
            .map_err(|e| OcrError::ModelLoad(format!("pure-onnx-ocr: {}", e)))?;

        info!("Loaded pure-onnx-ocr engine from {}", config.model_dir.display());

        Ok(Self {
            engine: Mutex::new(engine),
        })
    }
}

impl TextRecognizer for PureOcrEngine {
    fn name(&self) -> &str {
        "onnx"
    }

    fn recognize(&self, image: &GrayImage) -> Result<String, OcrError> {
        let start = Instant::now();
        let image = DynamicImage::ImageLuma8(image.clone());

        let engine = self
            .engine
            .lock()
            .map_err(|e| OcrError::Recognition(format!("engine lock poisoned: {}", e)))?;

        let results = engine
            .run_from_image(&image)
            .map_err(|e| OcrError::Recognition(format!("pure-onnx-ocr: {}", e)))?;

        debug!("pure-onnx-ocr returned {} text regions", results.len());

        let fragments = results
            .iter()
            .map(|r| {
                let (x, y) = top_left(&r.bounding_box);
                Fragment {
                    x,
                    y,
                    text: r.text.replace("[UNK]", " "),
                }
            })
            .collect();

        let text = join_reading_order(fragments);

        debug!(
            "Recognized {} characters in {}ms",
            text.len(),
            start.elapsed().as_millis()
        );

        Ok(text)
    }
}

fn top_left(polygon: &pure_onnx_ocr::Polygon<f64>) -> (f32, f32) {
    polygon
        .exterior()
        .coords()
        .fold((f32::INFINITY, f32::INFINITY), |(x, y), c| {
            (x.min(c.x as f32), y.min(c.y as f32))
        })
}

/// Sort fragments top-to-bottom, left-to-right and join them into lines.
fn join_reading_order(mut fragments: Vec<Fragment>) -> String {
    fragments.sort_by(|a, b| {
        a.y.partial_cmp(&b.y)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut lines: Vec<Vec<Fragment>> = Vec::new();
    for fragment in fragments {
        match lines.last_mut() {
            Some(line) if (fragment.y - line[0].y).abs() < LINE_TOLERANCE => line.push(fragment),
            _ => lines.push(vec![fragment]),
        }
    }

    lines
        .into_iter()
        .map(|mut line| {
            line.sort_by(|a, b| a.x.partial_cmp(&b.x).unwrap_or(std::cmp::Ordering::Equal));
            line.into_iter()
                .map(|f| f.text)
                .collect::<Vec<_>>()
                .join(" ")
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn fragment(x: f32, y: f32, text: &str) -> Fragment {
        Fragment {
            x,
            y,
            text: text.to_string(),
        }
    }

    #[test]
    fn test_join_reading_order() {
        let fragments = vec![
            fragment(300.0, 105.0, "$150.00"),
            fragment(10.0, 12.0, "Invoice:"),
            fragment(10.0, 100.0, "Total:"),
            fragment(120.0, 8.0, "INV-2024"),
        ];

        assert_eq!(
            join_reading_order(fragments),
            "Invoice: INV-2024\nTotal: $150.00"
        );
    }

    #[test]
    fn test_join_empty() {
        assert_eq!(join_reading_order(Vec::new()), "");
    }

    #[test]
    fn test_missing_models() {
        let dir = tempfile::tempdir().unwrap();
        let config = RecognitionConfig {
            model_dir: dir.path().to_path_buf(),
            ..Default::default()
        };

        let err = PureOcrEngine::from_config(&config).err().unwrap();
        assert!(matches!(err, OcrError::ModelLoad(_)));
    }
}
