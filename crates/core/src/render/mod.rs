use font8x8::{UnicodeFonts, BASIC_FONTS};
use image::RgbaImage;

use crate::{geometry::Rect, Result};

const OVERLAY_ORIGIN: (usize, usize) = (10, 10);
const OVERLAY_LINE_HEIGHT: usize = 30;
const OVERLAY_SCALE: usize = 2;
const OVERLAY_COLOR: [u8; 3] = [255, 255, 255];

/// Rendering surface the frame loop draws onto.
///
/// Implementations own their display resources; `close` releases them and is
/// called exactly once by the frame loop during teardown.
pub trait Canvas {
    /// Non-blocking check for a quit request.
    fn poll_quit(&mut self) -> bool;

    fn clear(&mut self, color: [u8; 3]);

    /// Draws `image` with its top-left corner at the rect's top-left. Pixels
    /// outside the rect are clipped.
    fn draw_image(&mut self, image: &RgbaImage, dest: Rect);

    /// Diagnostic text for the current frame, drawn over the sprites so it
    /// is part of the captured picture.
    fn draw_overlay(&mut self, lines: &[String]);

    fn present(&mut self) -> Result<()>;

    fn close(&mut self);
}

/// Packs an RGB triple into the 0RGB layout used by [`FrameBuffer`].
pub fn pack_rgb([r, g, b]: [u8; 3]) -> u32 {
    (u32::from(r) << 16) | (u32::from(g) << 8) | u32::from(b)
}

fn unpack_rgb(pixel: u32) -> [u8; 3] {
    [(pixel >> 16) as u8, (pixel >> 8) as u8, pixel as u8]
}

/// CPU-side 0RGB pixel buffer. Doubles as an offscreen [`Canvas`].
#[derive(Debug, Clone)]
pub struct FrameBuffer {
    width: usize,
    height: usize,
    pixels: Vec<u32>,
    overlay: Vec<String>,
    presented: u64,
}

impl FrameBuffer {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            pixels: vec![0; width * height],
            overlay: Vec::new(),
            presented: 0,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn pixels(&self) -> &[u32] {
        &self.pixels
    }

    pub fn pixel(&self, x: usize, y: usize) -> Option<[u8; 3]> {
        (x < self.width && y < self.height).then(|| unpack_rgb(self.pixels[y * self.width + x]))
    }

    pub fn overlay(&self) -> &[String] {
        &self.overlay
    }

    pub fn presented_frames(&self) -> u64 {
        self.presented
    }

    pub fn fill(&mut self, color: [u8; 3]) {
        self.pixels.fill(pack_rgb(color));
        self.overlay.clear();
    }

    /// Alpha-blends `image` at the rect's top-left, clipped to both the rect
    /// and the buffer.
    pub fn blit(&mut self, image: &RgbaImage, dest: Rect) {
        let rows = image.height().min(dest.height);
        let cols = image.width().min(dest.width);

        for y in 0..rows {
            let canvas_y = dest.top + y as i32;
            if canvas_y < 0 || canvas_y as usize >= self.height {
                continue;
            }
            let row_start = canvas_y as usize * self.width;

            for x in 0..cols {
                let canvas_x = dest.left + x as i32;
                if canvas_x < 0 || canvas_x as usize >= self.width {
                    continue;
                }

                let [r, g, b, a] = image.get_pixel(x, y).0;
                let slot = &mut self.pixels[row_start + canvas_x as usize];
                match a {
                    0 => {}
                    255 => *slot = pack_rgb([r, g, b]),
                    alpha => *slot = pack_rgb(blend(unpack_rgb(*slot), [r, g, b], alpha)),
                }
            }
        }
    }

    /// Renders `lines` top-left with an 8x8 bitmap font, one line every
    /// [`OVERLAY_LINE_HEIGHT`] pixels. Characters without a glyph are skipped.
    pub fn draw_text(&mut self, lines: &[String]) {
        let (origin_x, origin_y) = OVERLAY_ORIGIN;
        let color = pack_rgb(OVERLAY_COLOR);
        let advance = 8 * OVERLAY_SCALE;

        for (row, line) in lines.iter().enumerate() {
            let top = origin_y + row * OVERLAY_LINE_HEIGHT;
            for (column, ch) in line.chars().enumerate() {
                let Some(glyph) = BASIC_FONTS.get(ch) else {
                    continue;
                };
                self.draw_glyph(&glyph, origin_x + column * advance, top, color);
            }
        }
    }

    fn draw_glyph(&mut self, glyph: &[u8; 8], left: usize, top: usize, color: u32) {
        for (gy, bits) in glyph.iter().enumerate() {
            for gx in 0..8 {
                // Bit 0 is the leftmost pixel.
                if bits & (1 << gx) == 0 {
                    continue;
                }
                for dy in 0..OVERLAY_SCALE {
                    for dx in 0..OVERLAY_SCALE {
                        let x = left + gx * OVERLAY_SCALE + dx;
                        let y = top + gy * OVERLAY_SCALE + dy;
                        if x < self.width && y < self.height {
                            self.pixels[y * self.width + x] = color;
                        }
                    }
                }
            }
        }
    }
}

fn blend(under: [u8; 3], over: [u8; 3], alpha: u8) -> [u8; 3] {
    let alpha = u32::from(alpha);
    let mix = |u: u8, o: u8| {
        ((u32::from(o) * alpha + u32::from(u) * (255 - alpha) + 127) / 255) as u8
    };
    [
        mix(under[0], over[0]),
        mix(under[1], over[1]),
        mix(under[2], over[2]),
    ]
}

impl Canvas for FrameBuffer {
    fn poll_quit(&mut self) -> bool {
        false
    }

    fn clear(&mut self, color: [u8; 3]) {
        self.fill(color);
    }

    fn draw_image(&mut self, image: &RgbaImage, dest: Rect) {
        self.blit(image, dest);
    }

    fn draw_overlay(&mut self, lines: &[String]) {
        self.draw_text(lines);
        self.overlay = lines.to_vec();
    }

    fn present(&mut self) -> Result<()> {
        self.presented += 1;
        Ok(())
    }

    fn close(&mut self) {}
}
