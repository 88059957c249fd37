use std::path::Path;

use image::{imageops::FilterType, Rgba, RgbaImage};

use crate::{
    config::{AssetConfig, ScreenConfig},
    JawSyncError, Result,
};

const TRANSPARENT: Rgba<u8> = Rgba([0, 0, 0, 0]);

/// The two mouth halves, decoded and scaled once at startup.
#[derive(Debug, Clone)]
pub struct SpriteAssets {
    pub upper: RgbaImage,
    pub lower: RgbaImage,
}

impl SpriteAssets {
    pub fn load(assets: &AssetConfig, screen: &ScreenConfig) -> Result<Self> {
        let max_width = screen.width as f32 * assets.fit_fraction;
        let max_height = screen.height as f32 * assets.fit_fraction;

        let upper = load_sprite(&assets.upper, max_width, max_height)?;
        let lower = load_sprite(&assets.lower, max_width, max_height)?;
        tracing::info!(
            upper = ?upper.dimensions(),
            lower = ?lower.dimensions(),
            "loaded sprite halves"
        );

        Ok(Self { upper, lower })
    }
}

/// Decodes an image file and scales it to fit inside the given box.
pub fn load_sprite(path: &Path, max_width: f32, max_height: f32) -> Result<RgbaImage> {
    let decoded = image::open(path)
        .map_err(|source| JawSyncError::Asset {
            path: path.to_path_buf(),
            source,
        })?
        .to_rgba8();

    if decoded.width() == 0 || decoded.height() == 0 {
        return Err(JawSyncError::EmptyAsset {
            path: path.to_path_buf(),
        });
    }

    Ok(fit_within(&decoded, max_width, max_height))
}

/// Scales `image` by the largest factor that keeps it inside the box while
/// preserving aspect ratio. Small images are scaled up.
pub fn fit_within(image: &RgbaImage, max_width: f32, max_height: f32) -> RgbaImage {
    let (width, height) = image.dimensions();
    let scale = (max_width / width as f32).min(max_height / height as f32);
    let target_width = ((width as f32 * scale) as u32).max(1);
    let target_height = ((height as f32 * scale) as u32).max(1);

    if (target_width, target_height) == (width, height) {
        return image.clone();
    }
    image::imageops::resize(image, target_width, target_height, FilterType::Triangle)
}

/// Rotates counter-clockwise by `degrees`, growing the canvas to the
/// rotated bounding box. Uncovered pixels are transparent.
pub fn rotate_expanded(image: &RgbaImage, degrees: f32) -> RgbaImage {
    if degrees == 0.0 {
        return image.clone();
    }

    let (width, height) = image.dimensions();
    let theta = f64::from(degrees).to_radians();
    let (sin, cos) = theta.sin_cos();
    let (w, h) = (f64::from(width), f64::from(height));

    // Trim float noise so a quarter turn does not gain a pixel.
    let out_width = ((w * cos.abs() + h * sin.abs()) - 1e-6).ceil().max(1.0) as u32;
    let out_height = ((w * sin.abs() + h * cos.abs()) - 1e-6).ceil().max(1.0) as u32;

    let (src_cx, src_cy) = (w / 2.0, h / 2.0);
    let (dst_cx, dst_cy) = (f64::from(out_width) / 2.0, f64::from(out_height) / 2.0);

    let mut rotated = RgbaImage::from_pixel(out_width, out_height, TRANSPARENT);
    for (x, y, pixel) in rotated.enumerate_pixels_mut() {
        let dx = f64::from(x) + 0.5 - dst_cx;
        let dy = f64::from(y) + 0.5 - dst_cy;
        let sx = (dx * cos - dy * sin + src_cx).floor();
        let sy = (dx * sin + dy * cos + src_cy).floor();

        if sx >= 0.0 && sy >= 0.0 && sx < w && sy < h {
            *pixel = *image.get_pixel(sx as u32, sy as u32);
        }
    }
    rotated
}
