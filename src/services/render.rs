use image::{imageops, ImageFormat, Rgb, RgbImage};
use std::io::Cursor;

use crate::models::importance::ImportanceMap;

pub const HEATMAP_CONTENT_TYPE: &str = "image/png";

/// Smallest edge of a rendered heat-map, in pixels.
const MIN_EDGE: u32 = 224;

/// Largest edge of a rendered heat-map, in pixels. Upscaling stops here and
/// larger maps are refused.
const MAX_EDGE: u32 = 4096;

/// Render the map as a diverging heat-map PNG: blue for negative, white for
/// zero, red for positive, scaled by the largest absolute value.
pub fn render_heatmap(map: &ImportanceMap) -> Result<Vec<u8>, RenderError> {
    let width = u32::try_from(map.width()).map_err(|_| RenderError::TooLarge)?;
    let height = u32::try_from(map.height()).map_err(|_| RenderError::TooLarge)?;
    if width > MAX_EDGE || height > MAX_EDGE {
        return Err(RenderError::TooLarge);
    }

    let peak = map.values().iter().fold(0.0f64, |acc, v| acc.max(v.abs()));
    let img = RgbImage::from_fn(width, height, |x, y| {
        let value = map.get(y as usize, x as usize);
        let t = if peak > 0.0 { value / peak } else { 0.0 };
        diverging(t)
    });

    // Nearest-neighbour upscale so small maps stay legible, without letting
    // the long edge pass MAX_EDGE.
    let scale = (MIN_EDGE / width.min(height))
        .min(MAX_EDGE / width.max(height))
        .max(1);
    let img = if scale > 1 {
        let (w, h) = width
            .checked_mul(scale)
            .zip(height.checked_mul(scale))
            .ok_or(RenderError::TooLarge)?;
        imageops::resize(&img, w, h, imageops::FilterType::Nearest)
    } else {
        img
    };

    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, ImageFormat::Png)
        .map_err(RenderError::Encode)?;
    Ok(buf.into_inner())
}

/// `t` in [-1, 1] to RGB.
fn diverging(t: f64) -> Rgb<u8> {
    let t = t.clamp(-1.0, 1.0);
    let fade = ((1.0 - t.abs()) * 255.0).round() as u8;
    if t >= 0.0 {
        Rgb([255, fade, fade])
    } else {
        Rgb([fade, fade, 255])
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("Importance map too large to render")]
    TooLarge,

    #[error("Image encoding failed: {0}")]
    Encode(#[from] image::ImageError),
}
