//! Image preprocessing: binarization for recognition and letterboxing for detection.

use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, GrayImage, Luma};
use ndarray::Array4;
use tracing::debug;

use crate::error::OcrError;
use crate::models::config::PreprocessConfig;

/// Gray level used to pad letterboxed detector input.
const LETTERBOX_FILL: u8 = 114;

/// Image preprocessor for the recognition stage.
///
/// Grayscale, Gaussian blur, then an adaptive Gaussian threshold that leaves
/// dark text at 0 and background at 255.
#[derive(Debug, Clone)]
pub struct ImagePreprocessor {
    /// Gaussian blur kernel size, 1 to skip blurring.
    blur_kernel: u32,
    /// Adaptive threshold neighbourhood size.
    block_size: u32,
    /// Constant subtracted from the neighbourhood mean.
    threshold_offset: f32,
    /// Maximum image dimension.
    max_size: u32,
}

/// Geometry of a letterboxed image, for mapping model coordinates back.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Letterbox {
    /// Resize factor applied to the original image.
    pub scale: f32,
    /// Horizontal padding on the left, in model pixels.
    pub pad_x: f32,
    /// Vertical padding on the top, in model pixels.
    pub pad_y: f32,
}

impl Letterbox {
    /// Map a point in model input space to original image space.
    pub fn to_original(&self, x: f32, y: f32) -> (f32, f32) {
        ((x - self.pad_x) / self.scale, (y - self.pad_y) / self.scale)
    }
}

impl ImagePreprocessor {
    /// Create a new preprocessor with default settings.
    pub fn new() -> Self {
        Self::from_config(&PreprocessConfig::default())
    }

    /// Create a preprocessor from configuration.
    pub fn from_config(config: &PreprocessConfig) -> Self {
        Self {
            blur_kernel: config.blur_kernel,
            block_size: config.block_size,
            threshold_offset: config.threshold_offset,
            max_size: config.max_image_size,
        }
    }

    /// Set maximum image dimension.
    pub fn with_max_size(mut self, size: u32) -> Self {
        self.max_size = size;
        self
    }

    /// Set the Gaussian blur kernel size.
    pub fn with_blur_kernel(mut self, size: u32) -> Self {
        self.blur_kernel = size;
        self
    }

    /// Set the adaptive threshold block size and offset.
    pub fn with_threshold(mut self, block_size: u32, offset: f32) -> Self {
        self.block_size = block_size;
        self.threshold_offset = offset;
        self
    }

    /// Binarize an image for text recognition.
    pub fn preprocess(&self, image: &DynamicImage) -> Result<GrayImage, OcrError> {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Err(OcrError::InvalidImage(format!("empty image {}x{}", width, height)));
        }
        if self.blur_kernel == 0 || self.blur_kernel % 2 == 0 {
            return Err(OcrError::Preprocessing(format!(
                "blur kernel must be odd, got {}",
                self.blur_kernel
            )));
        }
        if self.block_size < 3 || self.block_size % 2 == 0 {
            return Err(OcrError::Preprocessing(format!(
                "threshold block size must be odd and at least 3, got {}",
                self.block_size
            )));
        }

        let mut gray = image.to_luma8();

        let (new_width, new_height) = calculate_resize_dimensions(width, height, self.max_size);
        if (new_width, new_height) != (width, height) {
            debug!("Downscaling {}x{} to {}x{}", width, height, new_width, new_height);
            gray = image::imageops::resize(&gray, new_width, new_height, FilterType::Triangle);
        }

        let blurred = if self.blur_kernel > 1 {
            gaussian_blur(&gray, self.blur_kernel)
        } else {
            gray
        };

        Ok(adaptive_threshold(&blurred, self.block_size, self.threshold_offset))
    }

    /// Resize into a `size` x `size` square keeping aspect ratio, padding with gray.
    ///
    /// Returns an NCHW RGB tensor scaled to [0, 1].
    pub fn letterbox(
        &self,
        image: &DynamicImage,
        size: u32,
    ) -> Result<(Array4<f32>, Letterbox), OcrError> {
        if size == 0 {
            return Err(OcrError::Preprocessing(
                "letterbox size must be positive".to_string(),
            ));
        }

        let (width, height) = image.dimensions();
        let scale = size as f32 / width.max(height).max(1) as f32;
        let new_width = ((width as f32 * scale).round() as u32).clamp(1, size);
        let new_height = ((height as f32 * scale).round() as u32).clamp(1, size);
        let pad_x = (size - new_width) / 2;
        let pad_y = (size - new_height) / 2;

        let resized = image
            .resize_exact(new_width, new_height, FilterType::Triangle)
            .to_rgb8();

        let fill = LETTERBOX_FILL as f32 / 255.0;
        let mut tensor = Array4::<f32>::from_elem((1, 3, size as usize, size as usize), fill);

        for (x, y, pixel) in resized.enumerate_pixels() {
            let tx = (x + pad_x) as usize;
            let ty = (y + pad_y) as usize;
            for c in 0..3 {
                tensor[[0, c, ty, tx]] = pixel[c] as f32 / 255.0;
            }
        }

        let letterbox = Letterbox {
            scale,
            pad_x: pad_x as f32,
            pad_y: pad_y as f32,
        };

        Ok((tensor, letterbox))
    }
}

impl Default for ImagePreprocessor {
    fn default() -> Self {
        Self::new()
    }
}

fn calculate_resize_dimensions(width: u32, height: u32, max_size: u32) -> (u32, u32) {
    let max_dim = width.max(height);

    if max_dim <= max_size {
        return (width, height);
    }

    let scale = max_size as f32 / max_dim as f32;
    let new_width = (width as f32 * scale) as u32;
    let new_height = (height as f32 * scale) as u32;

    (new_width.max(1), new_height.max(1))
}

/// Standard deviation used for a kernel of `size` when none is given.
fn sigma_for_kernel(size: u32) -> f32 {
    0.3 * ((size as f32 - 1.0) * 0.5 - 1.0) + 0.8
}

/// Normalized 1-D Gaussian weights.
fn gaussian_kernel(size: u32) -> Vec<f32> {
    let sigma = sigma_for_kernel(size);
    let center = (size / 2) as f32;
    let mut weights: Vec<f32> = (0..size)
        .map(|i| {
            let d = i as f32 - center;
            (-(d * d) / (2.0 * sigma * sigma)).exp()
        })
        .collect();
    let sum: f32 = weights.iter().sum();
    weights.iter_mut().for_each(|w| *w /= sum);
    weights
}

/// Separable Gaussian smoothing with replicated borders.
fn gaussian_smooth(image: &GrayImage, size: u32) -> Vec<f32> {
    let (width, height) = image.dimensions();
    let (w, h) = (width as i64, height as i64);
    let kernel = gaussian_kernel(size);
    let half = (size / 2) as i64;

    let mut horizontal = vec![0f32; (width * height) as usize];
    for y in 0..h {
        for x in 0..w {
            let mut acc = 0f32;
            for (k, weight) in kernel.iter().enumerate() {
                let sx = (x + k as i64 - half).clamp(0, w - 1);
                acc += weight * image.get_pixel(sx as u32, y as u32)[0] as f32;
            }
            horizontal[(y * w + x) as usize] = acc;
        }
    }

    let mut smoothed = vec![0f32; horizontal.len()];
    for y in 0..h {
        for x in 0..w {
            let mut acc = 0f32;
            for (k, weight) in kernel.iter().enumerate() {
                let sy = (y + k as i64 - half).clamp(0, h - 1);
                acc += weight * horizontal[(sy * w + x) as usize];
            }
            smoothed[(y * w + x) as usize] = acc;
        }
    }

    smoothed
}

fn gaussian_blur(image: &GrayImage, size: u32) -> GrayImage {
    let (width, height) = image.dimensions();
    let smoothed = gaussian_smooth(image, size);
    GrayImage::from_fn(width, height, |x, y| {
        let v = smoothed[(y * width + x) as usize];
        Luma([v.round().clamp(0.0, 255.0) as u8])
    })
}

/// Pixel becomes 255 when brighter than its Gaussian-weighted neighbourhood
/// mean minus `offset`, otherwise 0.
fn adaptive_threshold(image: &GrayImage, block_size: u32, offset: f32) -> GrayImage {
    let (width, height) = image.dimensions();
    let means = gaussian_smooth(image, block_size);

    GrayImage::from_fn(width, height, |x, y| {
        let mean = means[(y * width + x) as usize].round();
        let value = image.get_pixel(x, y)[0] as f32;
        Luma([if value > mean - offset { 255 } else { 0 }])
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn white_with_dark_square(size: u32, square: u32) -> DynamicImage {
        let start = (size - square) / 2;
        let end = start + square;
        DynamicImage::ImageLuma8(GrayImage::from_fn(size, size, |x, y| {
            if (start..end).contains(&x) && (start..end).contains(&y) {
                Luma([0])
            } else {
                Luma([255])
            }
        }))
    }

    #[test]
    fn test_resize_dimensions() {
        assert_eq!(calculate_resize_dimensions(500, 300, 960), (500, 300));

        let (w, h) = calculate_resize_dimensions(1920, 1080, 960);
        assert_eq!(w, 960);
        assert!(h < 960);
    }

    #[test]
    fn test_sigma_from_kernel_size() {
        assert!((sigma_for_kernel(5) - 1.1).abs() < 1e-6);
        assert!((sigma_for_kernel(11) - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_gaussian_kernel_is_normalized_and_symmetric() {
        let kernel = gaussian_kernel(5);
        assert_eq!(kernel.len(), 5);
        assert!((kernel.iter().sum::<f32>() - 1.0).abs() < 1e-5);
        assert!((kernel[0] - kernel[4]).abs() < 1e-6);
        assert!(kernel[2] > kernel[1]);
    }

    #[test]
    fn test_uniform_image_becomes_background() {
        let image = DynamicImage::ImageLuma8(GrayImage::from_pixel(16, 12, Luma([90])));
        let binary = ImagePreprocessor::new().preprocess(&image).unwrap();

        assert_eq!(binary.dimensions(), (16, 12));
        assert!(binary.pixels().all(|p| p[0] == 255));
    }

    #[test]
    fn test_dark_mark_stays_dark() {
        let binary = ImagePreprocessor::new()
            .preprocess(&white_with_dark_square(21, 3))
            .unwrap();

        assert_eq!(binary.get_pixel(10, 10)[0], 0);
        assert_eq!(binary.get_pixel(0, 0)[0], 255);
        assert_eq!(binary.get_pixel(20, 20)[0], 255);
    }

    #[test]
    fn test_output_is_binary() {
        let image = DynamicImage::ImageLuma8(GrayImage::from_fn(30, 30, |x, y| {
            Luma([((x * 7 + y * 13) % 256) as u8])
        }));
        let binary = ImagePreprocessor::new().preprocess(&image).unwrap();
        assert!(binary.pixels().all(|p| p[0] == 0 || p[0] == 255));
    }

    #[test]
    fn test_large_image_is_downscaled() {
        let image = DynamicImage::ImageLuma8(GrayImage::from_pixel(100, 50, Luma([200])));
        let binary = ImagePreprocessor::new()
            .with_max_size(40)
            .preprocess(&image)
            .unwrap();
        assert_eq!(binary.dimensions(), (40, 20));
    }

    #[test]
    fn test_rejects_even_kernel_and_empty_image() {
        let image = DynamicImage::ImageLuma8(GrayImage::from_pixel(8, 8, Luma([0])));
        let err = ImagePreprocessor::new().with_blur_kernel(4).preprocess(&image);
        assert!(matches!(err, Err(OcrError::Preprocessing(_))));

        let err = ImagePreprocessor::new().with_threshold(10, 2.0).preprocess(&image);
        assert!(matches!(err, Err(OcrError::Preprocessing(_))));

        let empty = DynamicImage::ImageLuma8(GrayImage::new(0, 0));
        let err = ImagePreprocessor::new().preprocess(&empty);
        assert!(matches!(err, Err(OcrError::InvalidImage(_))));
    }

    #[test]
    fn test_letterbox_pads_short_side() {
        let image = DynamicImage::ImageRgb8(image::RgbImage::from_pixel(
            200,
            100,
            image::Rgb([255, 0, 0]),
        ));
        let (tensor, letterbox) = ImagePreprocessor::new().letterbox(&image, 64).unwrap();

        assert_eq!(tensor.shape(), &[1, 3, 64, 64]);
        assert_eq!(letterbox.pad_x, 0.0);
        assert_eq!(letterbox.pad_y, 16.0);
        assert!((letterbox.scale - 0.32).abs() < 1e-6);

        let fill = 114.0 / 255.0;
        assert!((tensor[[0, 0, 0, 0]] - fill).abs() < 1e-6);
        assert!((tensor[[0, 0, 32, 32]] - 1.0).abs() < 1e-6);
        assert!(tensor[[0, 1, 32, 32]].abs() < 1e-6);

        let (x, y) = letterbox.to_original(32.0, 32.0);
        assert!((x - 100.0).abs() < 1e-3);
        assert!((y - 50.0).abs() < 1e-3);
    }

    #[test]
    fn test_letterbox_rejects_zero_size() {
        let image = DynamicImage::new_rgb8(10, 10);
        let err = ImagePreprocessor::new().letterbox(&image, 0);
        assert!(matches!(err, Err(OcrError::Preprocessing(_))));
    }
}
