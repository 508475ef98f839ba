//! Imaging helpers for rendering predictions.
//!
//! - Display resize of the uploaded image
//! - JET colormap and heatmap overlay
//! - JPEG / base64 encoding for inline embedding

use std::io::Cursor;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::codecs::jpeg::JpegEncoder;
use image::{imageops, imageops::FilterType, Rgb, RgbImage};

use crate::error::{Result, TransformError};

/// Resize to a `size x size` square for display, ignoring the aspect ratio.
#[must_use]
pub fn resize_for_display(image: &RgbImage, size: u32) -> RgbImage {
    if image.dimensions() == (size, size) {
        return image.clone();
    }
    imageops::resize(image, size, size, FilterType::CatmullRom)
}

/// Map an intensity in `[0, 1]` to the JET colormap (dark blue to dark red).
///
/// The value is quantized to 8 bits first, like a lookup-table colormap.
#[must_use]
pub fn jet_colormap(value: f32) -> Rgb<u8> {
    let level = (value.clamp(0.0, 1.0) * 255.0) as u8;
    let x = f32::from(level) / 255.0;

    let channel = |center: f32| {
        let v = (1.5 - (4.0 * x - center).abs()).clamp(0.0, 1.0);
        (v * 255.0).round() as u8
    };

    Rgb([channel(3.0), channel(2.0), channel(1.0)])
}

/// Blend a JET-colored mask over an image.
///
/// `overlay = (1 - image_weight) * heatmap + image_weight * image`, rescaled so
/// the brightest channel value maps to 255.
///
/// # Arguments
///
/// * `image` - Background image
/// * `mask` - Row-major intensities in `[0, 1]`, one per pixel of `image`
/// * `image_weight` - Weight of the background, in `[0, 1]`
///
/// # Errors
///
/// Returns [`TransformError::InvalidParameter`] if the mask size does not match
/// the image or the weight is out of range.
pub fn overlay_heatmap(image: &RgbImage, mask: &[f32], image_weight: f32) -> Result<RgbImage> {
    let (width, height) = image.dimensions();
    if mask.len() != (width * height) as usize {
        return Err(TransformError::invalid(
            "mask",
            format!(
                "{} values for a {}x{} image",
                mask.len(),
                width,
                height
            ),
        ));
    }
    if !(0.0..=1.0).contains(&image_weight) {
        return Err(TransformError::invalid(
            "image_weight",
            format!("{image_weight} is outside [0, 1]"),
        ));
    }

    let blended: Vec<f32> = image
        .pixels()
        .zip(mask)
        .flat_map(|(pixel, &m)| {
            let heat = jet_colormap(m);
            (0..3).map(move |c| {
                (1.0 - image_weight) * f32::from(heat[c]) / 255.0
                    + image_weight * f32::from(pixel[c]) / 255.0
            })
        })
        .collect();

    let peak = blended.iter().copied().fold(0.0f32, f32::max);
    let raw: Vec<u8> = blended
        .iter()
        .map(|v| if peak > 0.0 { (v / peak * 255.0) as u8 } else { 0 })
        .collect();

    RgbImage::from_raw(width, height, raw)
        .ok_or_else(|| TransformError::invalid("mask", "overlay buffer size mismatch"))
}

/// Encode as baseline JPEG.
///
/// # Errors
///
/// Returns [`TransformError::Encode`] if encoding fails.
pub fn encode_jpeg(image: &RgbImage, quality: u8) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    JpegEncoder::new_with_quality(Cursor::new(&mut bytes), quality.clamp(1, 100))
        .encode_image(image)
        .map_err(TransformError::Encode)?;
    Ok(bytes)
}

/// Encode as JPEG and then as standard base64.
///
/// # Errors
///
/// Returns [`TransformError::Encode`] if encoding fails.
pub fn to_base64_jpeg(image: &RgbImage, quality: u8) -> Result<String> {
    Ok(STANDARD.encode(encode_jpeg(image, quality)?))
}

/// `data:` URI embedding an image as inline JPEG.
///
/// # Errors
///
/// Returns [`TransformError::Encode`] if encoding fails.
pub fn data_uri(image: &RgbImage, quality: u8) -> Result<String> {
    Ok(format!("data:image/jpeg;base64,{}", to_base64_jpeg(image, quality)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_jet_endpoints() {
        assert_eq!(jet_colormap(0.0).0, [0, 0, 128]);
        assert_eq!(jet_colormap(1.0).0, [128, 0, 0]);
        // Middle of the map is green-dominant.
        let mid = jet_colormap(0.5).0;
        assert!(mid[1] > mid[0] && mid[1] > mid[2]);
    }

    #[test]
    fn test_jet_clamps_out_of_range() {
        assert_eq!(jet_colormap(-3.0), jet_colormap(0.0));
        assert_eq!(jet_colormap(7.0), jet_colormap(1.0));
    }

    #[test]
    fn test_resize_for_display() {
        let image = RgbImage::new(300, 180);
        assert_eq!(resize_for_display(&image, 224).dimensions(), (224, 224));
    }

    #[test]
    fn test_overlay_keeps_dimensions() {
        let image = RgbImage::from_pixel(8, 4, Rgb([40, 40, 40]));
        let mask: Vec<f32> = (0..32).map(|i| i as f32 / 31.0).collect();

        let overlay = overlay_heatmap(&image, &mask, 0.5).unwrap();
        assert_eq!(overlay.dimensions(), (8, 4));
        // Rescaling puts the brightest channel at (almost) full intensity.
        let peak = overlay.pixels().flat_map(|p| p.0).max().unwrap();
        assert!(peak >= 254);
    }

    #[test]
    fn test_overlay_full_image_weight_is_rescaled_image() {
        let image = RgbImage::from_pixel(2, 2, Rgb([100, 50, 0]));
        let overlay = overlay_heatmap(&image, &[0.3; 4], 1.0).unwrap();
        assert_eq!(overlay.get_pixel(0, 0).0[0], 255);
        assert_eq!(overlay.get_pixel(0, 0).0[2], 0);
    }

    #[test]
    fn test_overlay_rejects_bad_inputs() {
        let image = RgbImage::new(2, 2);
        assert!(overlay_heatmap(&image, &[0.0; 3], 0.5).is_err());
        assert!(overlay_heatmap(&image, &[0.0; 4], 1.5).is_err());
    }

    #[test]
    fn test_jpeg_base64() {
        let image = RgbImage::from_pixel(4, 4, Rgb([10, 200, 30]));
        let bytes = encode_jpeg(&image, 90).unwrap();
        assert_eq!(&bytes[..2], &[0xFF, 0xD8]);

        let uri = data_uri(&image, 90).unwrap();
        assert!(uri.starts_with("data:image/jpeg;base64,/9j/"));
        assert_eq!(STANDARD.decode(&uri[23..]).unwrap(), bytes);
    }
}
