//! Image preprocessing for the confidence model
//!
//! Handles resizing, normalization, and tensor conversion of captured frames.

use image::{imageops, imageops::FilterType, RgbaImage};
use ndarray::{Array3, Array4};

use crate::capture::frame::CapturedFrame;

/// Convert RGBA image data to an HWC RGB f32 array scaled to 0-1
pub fn rgba_to_rgb_f32(data: &[u8], width: u32, height: u32) -> Array3<f32> {
    let mut rgb = Array3::<f32>::zeros((height as usize, width as usize, 3));

    for y in 0..height as usize {
        for x in 0..width as usize {
            let idx = (y * width as usize + x) * 4;
            if idx + 2 < data.len() {
                rgb[[y, x, 0]] = data[idx] as f32 / 255.0;
                rgb[[y, x, 1]] = data[idx + 1] as f32 / 255.0;
                rgb[[y, x, 2]] = data[idx + 2] as f32 / 255.0;
            }
        }
    }

    rgb
}

/// Add a leading batch dimension: HWC -> NHWC with N = 1
pub fn hwc_to_nhwc(image: Array3<f32>) -> Array4<f32> {
    image.insert_axis(ndarray::Axis(0))
}

/// Bilinear resize of a frame to a square `size x size` image
pub fn resize_square(frame: &CapturedFrame, size: u32) -> RgbaImage {
    match frame.to_rgba_image() {
        Some(image) if image.dimensions() == (size, size) => image,
        Some(image) => imageops::resize(&image, size, size, FilterType::Triangle),
        None => RgbaImage::new(size, size),
    }
}

/// Full preprocessing for the confidence model: resize, scale to 0-1, NHWC
pub fn preprocess_for_confidence(frame: &CapturedFrame, size: u32) -> Array4<f32> {
    let resized = resize_square(frame, size);
    let rgb = rgba_to_rgb_f32(resized.as_raw(), size, size);
    hwc_to_nhwc(rgb)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rgba_to_rgb() {
        // Create a 2x2 RGBA image
        let rgba = vec![
            255, 0, 0, 255,     // Red pixel (RGBA)
            0, 255, 0, 255,     // Green pixel
            0, 0, 255, 255,     // Blue pixel
            128, 128, 128, 255, // Gray pixel
        ];

        let rgb = rgba_to_rgb_f32(&rgba, 2, 2);

        assert!((rgb[[0, 0, 0]] - 1.0).abs() < 0.01); // R = 1.0
        assert!(rgb[[0, 0, 1]].abs() < 0.01);
        assert!((rgb[[0, 1, 1]] - 1.0).abs() < 0.01); // G = 1.0
        assert!((rgb[[1, 0, 2]] - 1.0).abs() < 0.01); // B = 1.0
        assert!((rgb[[1, 1, 0]] - 128.0 / 255.0).abs() < 0.01);
    }

    #[test]
    fn test_preprocess_shape_and_range() {
        let frame = CapturedFrame::new(vec![255; 40 * 30 * 4], 40, 30);
        let tensor = preprocess_for_confidence(&frame, 224);

        assert_eq!(tensor.dim(), (1, 224, 224, 3));
        assert!(tensor.iter().all(|v| (0.0..=1.0).contains(v)));
        assert!((tensor[[0, 100, 100, 1]] - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_corrupt_frame_gives_blank_input() {
        let frame = CapturedFrame::new(vec![1, 2, 3], 10, 10);
        let tensor = preprocess_for_confidence(&frame, 8);
        assert_eq!(tensor.dim(), (1, 8, 8, 3));
        assert!(tensor.iter().all(|v| *v == 0.0));
    }
}
