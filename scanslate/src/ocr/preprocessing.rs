use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, GenericImageView, ImageReader};

use crate::error::{Result, ScanslateError};

pub const JPEG_QUALITY: u8 = 85;

/// A decoded, size-bounded, JPEG re-encoded image ready for recognition.
#[derive(Debug, Clone)]
pub struct NormalizedImage {
    bytes: Vec<u8>,
    width: u32,
    height: u32,
}

impl NormalizedImage {
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

/// Normalize uploaded image bytes for OCR
///
/// 1. Decodes the image (format guessed from content, not the file name)
/// 2. Drops any alpha channel by converting to RGB
/// 3. Downscales so the largest side is at most `max_dimension`
/// 4. Re-encodes as JPEG at quality 85
///
/// Decode failures are reported as [`ScanslateError::InvalidImage`].
pub fn normalize_image(bytes: &[u8], max_dimension: u32) -> Result<NormalizedImage> {
    let reader = ImageReader::new(std::io::Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| ScanslateError::InvalidImage(e.to_string()))?;

    let img = reader
        .decode()
        .map_err(|e| ScanslateError::InvalidImage(e.to_string()))?;

    let img = DynamicImage::ImageRgb8(img.to_rgb8());
    let img = resize_if_needed(img, max_dimension);
    let (width, height) = img.dimensions();

    let mut output = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut output, JPEG_QUALITY);
    img.write_with_encoder(encoder)
        .map_err(|e| ScanslateError::Internal(format!("Failed to encode image: {e}")))?;

    Ok(NormalizedImage {
        bytes: output,
        width,
        height,
    })
}

/// Resize image if it exceeds maximum dimension while maintaining aspect ratio
///
/// Uses Lanczos3 filter for high-quality downscaling
fn resize_if_needed(img: DynamicImage, max_dim: u32) -> DynamicImage {
    let (width, height) = img.dimensions();

    if max_dim == 0 || (width <= max_dim && height <= max_dim) {
        return img;
    }

    let ratio = max_dim as f64 / width.max(height) as f64;
    let new_width = ((width as f64 * ratio) as u32).max(1);
    let new_height = ((height as f64 * ratio) as u32).max(1);

    img.resize_exact(
        new_width,
        new_height,
        image::imageops::FilterType::Lanczos3,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgb, RgbImage, Rgba, RgbaImage};

    fn encode(img: DynamicImage, format: ImageFormat) -> Vec<u8> {
        let mut bytes = Vec::new();
        img.write_to(&mut std::io::Cursor::new(&mut bytes), format)
            .unwrap();
        bytes
    }

    #[test]
    fn test_small_image_keeps_dimensions() {
        let img = RgbImage::from_pixel(500, 300, Rgb([73, 109, 137]));
        let bytes = encode(DynamicImage::ImageRgb8(img), ImageFormat::Png);

        let normalized = normalize_image(&bytes, 1920).unwrap();
        assert_eq!(normalized.dimensions(), (500, 300));
    }

    #[test]
    fn test_large_image_is_bounded_with_aspect_ratio() {
        let img = RgbImage::from_pixel(4000, 2000, Rgb([255, 255, 255]));
        let bytes = encode(DynamicImage::ImageRgb8(img), ImageFormat::Jpeg);

        let normalized = normalize_image(&bytes, 1920).unwrap();
        assert_eq!(normalized.dimensions(), (1920, 960));
    }

    #[test]
    fn test_portrait_image_bounds_height() {
        let img = RgbImage::from_pixel(1000, 3000, Rgb([0, 0, 0]));
        let bytes = encode(DynamicImage::ImageRgb8(img), ImageFormat::Png);

        let normalized = normalize_image(&bytes, 1500).unwrap();
        assert_eq!(normalized.dimensions(), (500, 1500));
    }

    #[test]
    fn test_output_is_jpeg() {
        let img = RgbaImage::from_pixel(64, 64, Rgba([10, 20, 30, 128]));
        let bytes = encode(DynamicImage::ImageRgba8(img), ImageFormat::Png);

        let normalized = normalize_image(&bytes, 1920).unwrap();
        assert_eq!(
            image::guess_format(normalized.bytes()).unwrap(),
            ImageFormat::Jpeg
        );
    }

    #[test]
    fn test_garbage_is_invalid_image() {
        let result = normalize_image(b"definitely not an image", 1920);
        assert!(matches!(result, Err(ScanslateError::InvalidImage(_))));
    }
}
