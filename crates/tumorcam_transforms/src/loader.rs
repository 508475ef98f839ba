//! Image loading utilities.

use std::path::Path;

use image::{ColorType, ImageFormat, RgbImage};

use crate::error::{Result, TransformError};

/// Decode an uploaded JPEG or PNG file into an RGB bitmap.
///
/// The format is sniffed from the content, not from a file name. Grayscale,
/// palette and alpha images are converted to 3-channel RGB.
///
/// # Errors
///
/// - [`TransformError::EmptyInput`] for an empty buffer
/// - [`TransformError::UnsupportedFormat`] for anything but JPEG or PNG
/// - [`TransformError::Decode`] for truncated or corrupted data
pub fn load_image_bytes(bytes: &[u8]) -> Result<RgbImage> {
    if bytes.is_empty() {
        return Err(TransformError::EmptyInput);
    }

    let format = image::guess_format(bytes)
        .map_err(|_| TransformError::UnsupportedFormat("unrecognized content".to_string()))?;
    if !matches!(format, ImageFormat::Jpeg | ImageFormat::Png) {
        return Err(TransformError::UnsupportedFormat(format!("{format:?}")));
    }

    let decoded =
        image::load_from_memory_with_format(bytes, format).map_err(TransformError::Decode)?;
    tracing::debug!(
        ?format,
        color = ?decoded.color(),
        width = decoded.width(),
        height = decoded.height(),
        "Decoded image"
    );
    if decoded.color() != ColorType::Rgb8 {
        tracing::warn!(color = ?decoded.color(), "Converting image to 8-bit RGB");
    }

    Ok(decoded.to_rgb8())
}

/// Read and decode an image file.
///
/// # Errors
///
/// Returns [`TransformError::Read`] if the file cannot be read, otherwise the
/// errors of [`load_image_bytes`].
pub fn load_image<P: AsRef<Path>>(path: P) -> Result<RgbImage> {
    let path = path.as_ref();
    let bytes = std::fs::read(path).map_err(|source| TransformError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    load_image_bytes(&bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, GrayImage, Luma};
    use std::io::Cursor;

    fn encode(image: DynamicImage, format: ImageFormat) -> Vec<u8> {
        let mut bytes = Vec::new();
        image.write_to(&mut Cursor::new(&mut bytes), format).unwrap();
        bytes
    }

    #[test]
    fn test_decode_png() {
        let image = RgbImage::from_pixel(5, 7, image::Rgb([200, 100, 50]));
        let bytes = encode(DynamicImage::ImageRgb8(image.clone()), ImageFormat::Png);

        let decoded = load_image_bytes(&bytes).unwrap();
        assert_eq!(decoded, image);
    }

    #[test]
    fn test_decode_jpeg() {
        let image = RgbImage::from_pixel(16, 16, image::Rgb([128, 128, 128]));
        let bytes = encode(DynamicImage::ImageRgb8(image), ImageFormat::Jpeg);

        let decoded = load_image_bytes(&bytes).unwrap();
        assert_eq!(decoded.dimensions(), (16, 16));
    }

    #[test]
    fn test_grayscale_converted_to_rgb() {
        let gray = GrayImage::from_pixel(4, 4, Luma([77]));
        let bytes = encode(DynamicImage::ImageLuma8(gray), ImageFormat::Png);

        let decoded = load_image_bytes(&bytes).unwrap();
        assert_eq!(decoded.get_pixel(0, 0).0, [77, 77, 77]);
    }

    #[test]
    fn test_empty_input() {
        assert!(matches!(load_image_bytes(&[]), Err(TransformError::EmptyInput)));
    }

    #[test]
    fn test_non_image_rejected() {
        let result = load_image_bytes(b"definitely not an image");
        assert!(matches!(result, Err(TransformError::UnsupportedFormat(_))));
    }

    #[test]
    fn test_truncated_png_fails_to_decode() {
        let image = RgbImage::from_pixel(32, 32, image::Rgb([1, 2, 3]));
        let mut bytes = encode(DynamicImage::ImageRgb8(image), ImageFormat::Png);
        bytes.truncate(40);

        assert!(matches!(load_image_bytes(&bytes), Err(TransformError::Decode(_))));
    }

    #[test]
    fn test_missing_file() {
        let result = load_image("/nonexistent/scan.jpg");
        assert!(matches!(result, Err(TransformError::Read { .. })));
    }
}
