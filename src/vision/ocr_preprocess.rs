//! Image preprocessing filters for OCR
//!
//! Pure transforms on RGBA buffers that make text stand out against textured
//! camera backgrounds. The alpha channel is never modified.

use tracing::{debug, warn};

use crate::capture::frame::CapturedFrame;
use crate::config::OcrPreprocessing;

/// Result of preprocessing that includes potentially resized dimensions
pub struct PreprocessResult {
    /// Processed image data
    pub data: Vec<u8>,
    /// New width (may differ from original if scaled)
    pub width: u32,
    /// New height (may differ from original if scaled)
    pub height: u32,
}

/// Apply the configured filters to a frame, returning a new frame
pub fn preprocess_frame(frame: &CapturedFrame, settings: &OcrPreprocessing) -> CapturedFrame {
    let result = apply_preprocessing(&frame.data, frame.width, frame.height, settings);
    frame.with_pixels(result.data, result.width, result.height)
}

/// Apply preprocessing filters to RGBA image data
///
/// Order: upscale, grayscale, contrast stretch, threshold, invert.
pub fn apply_preprocessing(data: &[u8], width: u32, height: u32, settings: &OcrPreprocessing) -> PreprocessResult {
    if !settings.enabled {
        return PreprocessResult {
            data: data.to_vec(),
            width,
            height,
        };
    }

    debug!(
        "OCR preprocessing: grayscale={}, stretch={}, threshold={:?}, invert={}, scale={}",
        settings.grayscale, settings.contrast_stretch, settings.threshold, settings.invert, settings.scale
    );

    let scaled = if settings.scale > 1 && width > 0 && height > 0 {
        let dims = scaled_dimensions(width, height, settings.scale);
        if dims.is_none() {
            warn!(
                "Upscale factor {} overflows a {}x{} frame, skipping upscale",
                settings.scale, width, height
            );
        }
        dims
    } else {
        None
    };

    let (mut result, width, height) = match scaled {
        Some((new_width, new_height)) => (
            apply_upscale(data, width, height, settings.scale),
            new_width,
            new_height,
        ),
        None => (data.to_vec(), width, height),
    };

    if settings.grayscale {
        apply_grayscale(&mut result);
    }

    if settings.contrast_stretch {
        apply_contrast_stretch(&mut result);
    }

    if let Some(level) = settings.threshold {
        apply_threshold_inverted(&mut result, level);
    }

    if settings.invert {
        apply_invert(&mut result);
    }

    PreprocessResult {
        data: result,
        width,
        height,
    }
}

/// Upscaled size, or `None` if it or its RGBA buffer length would overflow
fn scaled_dimensions(width: u32, height: u32, scale: u32) -> Option<(u32, u32)> {
    let new_width = width.checked_mul(scale)?;
    let new_height = height.checked_mul(scale)?;
    (new_width as usize)
        .checked_mul(new_height as usize)?
        .checked_mul(4)?;
    Some((new_width, new_height))
}

fn luminance(chunk: &[u8]) -> u8 {
    (0.299 * chunk[0] as f32 + 0.587 * chunk[1] as f32 + 0.114 * chunk[2] as f32) as u8
}

/// Convert RGBA to grayscale (keeping RGBA format)
fn apply_grayscale(data: &mut [u8]) {
    for chunk in data.chunks_exact_mut(4) {
        let gray = luminance(chunk);
        chunk[0] = gray;
        chunk[1] = gray;
        chunk[2] = gray;
    }
}

/// Linearly map the darkest channel value to 0 and the brightest to 255
fn apply_contrast_stretch(data: &mut [u8]) {
    let mut lo = u8::MAX;
    let mut hi = u8::MIN;
    for chunk in data.chunks_exact(4) {
        for &v in &chunk[..3] {
            lo = lo.min(v);
            hi = hi.max(v);
        }
    }

    // Flat image (or empty buffer): nothing to stretch.
    if hi <= lo {
        return;
    }

    let range = (hi - lo) as f32;
    for chunk in data.chunks_exact_mut(4) {
        for v in &mut chunk[..3] {
            *v = (((*v - lo) as f32 / range) * 255.0).round() as u8;
        }
    }
}

/// Binary threshold on luminance: bright pixels become black, the rest white
fn apply_threshold_inverted(data: &mut [u8], level: u8) {
    for chunk in data.chunks_exact_mut(4) {
        let out = if luminance(chunk) > level { 0 } else { 255 };
        chunk[0] = out;
        chunk[1] = out;
        chunk[2] = out;
    }
}

/// Invert RGB colors (useful for light text on dark backgrounds)
fn apply_invert(data: &mut [u8]) {
    for chunk in data.chunks_exact_mut(4) {
        for v in &mut chunk[..3] {
            *v = 255 - *v;
        }
    }
}

/// Upscale RGBA image using bilinear interpolation
fn apply_upscale(data: &[u8], width: u32, height: u32, scale: u32) -> Vec<u8> {
    let (w, h) = (width as usize, height as usize);
    let (nw, nh) = (w * scale as usize, h * scale as usize);
    let scale_f = scale as f32;
    let mut result = vec![0u8; nw * nh * 4];

    for ny in 0..nh {
        let src_y = ny as f32 / scale_f;
        let y0 = (src_y.floor() as usize).min(h - 1);
        let y1 = (y0 + 1).min(h - 1);
        let fy = src_y - src_y.floor();

        for nx in 0..nw {
            let src_x = nx as f32 / scale_f;
            let x0 = (src_x.floor() as usize).min(w - 1);
            let x1 = (x0 + 1).min(w - 1);
            let fx = src_x - src_x.floor();

            let dst = (ny * nw + nx) * 4;
            for c in 0..4 {
                let px = |x: usize, y: usize| data[(y * w + x) * 4 + c] as f32;
                let top = px(x0, y0) * (1.0 - fx) + px(x1, y0) * fx;
                let bottom = px(x0, y1) * (1.0 - fx) + px(x1, y1) * fx;
                result[dst + c] = (top * (1.0 - fy) + bottom * fy).clamp(0.0, 255.0) as u8;
            }
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn enabled() -> OcrPreprocessing {
        OcrPreprocessing {
            enabled: true,
            grayscale: false,
            contrast_stretch: false,
            threshold: None,
            invert: false,
            scale: 1,
        }
    }

    #[test]
    fn test_preprocessing_disabled() {
        let data = vec![100, 150, 200, 255];
        let settings = OcrPreprocessing::default();
        let result = apply_preprocessing(&data, 1, 1, &settings);
        assert_eq!(result.data, data);
    }

    #[test]
    fn test_grayscale() {
        let mut data = vec![255, 0, 0, 255];
        apply_grayscale(&mut data);
        // 0.299 * 255 = 76.245
        assert_eq!(&data, &[76, 76, 76, 255]);
    }

    #[test]
    fn test_contrast_stretch_spans_full_range() {
        let mut data = vec![
            100, 100, 100, 255,
            150, 150, 150, 255,
            200, 200, 200, 128,
        ];
        apply_contrast_stretch(&mut data);
        assert_eq!(&data[0..4], &[0, 0, 0, 255]);
        assert_eq!(&data[4..8], &[128, 128, 128, 255]);
        assert_eq!(&data[8..12], &[255, 255, 255, 128]);
    }

    #[test]
    fn test_contrast_stretch_flat_image_unchanged() {
        let mut data = vec![90, 90, 90, 255, 90, 90, 90, 255];
        apply_contrast_stretch(&mut data);
        assert_eq!(data, vec![90, 90, 90, 255, 90, 90, 90, 255]);
    }

    #[test]
    fn test_threshold_inverted() {
        let mut data = vec![200, 200, 200, 255, 20, 20, 20, 255];
        apply_threshold_inverted(&mut data, 150);
        assert_eq!(&data[0..4], &[0, 0, 0, 255]);
        assert_eq!(&data[4..8], &[255, 255, 255, 255]);
    }

    #[test]
    fn test_invert() {
        let mut data = vec![0, 100, 255, 255];
        apply_invert(&mut data);
        assert_eq!(&data, &[255, 155, 0, 255]);
    }

    #[test]
    fn test_overflowing_scale_skips_upscale() {
        let data = vec![10, 20, 30, 255, 40, 50, 60, 255];
        let mut settings = enabled();
        settings.scale = u32::MAX;

        let result = apply_preprocessing(&data, 2, 1, &settings);
        assert_eq!((result.width, result.height), (2, 1));
        assert_eq!(result.data, data);
        assert_eq!(scaled_dimensions(2, 1, u32::MAX), None);
        assert_eq!(scaled_dimensions(3, 2, 4), Some((12, 8)));
    }

    #[test]
    fn test_upscale_2x_dimensions() {
        let data = vec![
            255, 0, 0, 255,
            0, 255, 0, 255,
            0, 0, 255, 255,
            255, 255, 0, 255,
        ];
        let mut settings = enabled();
        settings.scale = 2;

        let result = apply_preprocessing(&data, 2, 2, &settings);
        assert_eq!((result.width, result.height), (4, 4));
        assert_eq!(result.data.len(), 4 * 4 * 4);
        // Top-left source pixel maps exactly
        assert_eq!(&result.data[0..4], &[255, 0, 0, 255]);
    }

    #[test]
    fn test_grayscale_then_stretch_pipeline() {
        let data = vec![
            60, 60, 60, 255,
            120, 120, 120, 255,
        ];
        let mut settings = enabled();
        settings.grayscale = true;
        settings.contrast_stretch = true;

        let result = apply_preprocessing(&data, 2, 1, &settings);
        assert_eq!(&result.data[0..3], &[0, 0, 0]);
        assert_eq!(&result.data[4..7], &[255, 255, 255]);
    }

    #[test]
    fn test_preprocess_frame_keeps_timestamp() {
        let frame = CapturedFrame::new(vec![10, 20, 30, 255], 1, 1);
        let mut settings = enabled();
        settings.scale = 3;

        let processed = preprocess_frame(&frame, &settings);
        assert_eq!(processed.dimensions(), (3, 3));
        assert_eq!(processed.timestamp, frame.timestamp);
        assert!(processed.is_well_formed());
    }
}
