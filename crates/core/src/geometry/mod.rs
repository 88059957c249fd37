use serde::{Deserialize, Serialize};

use crate::config::{MotionConfig, ScreenConfig};

/// Axis-aligned rectangle in canvas pixels, y growing downwards.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rect {
    pub left: i32,
    pub top: i32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub fn new(left: i32, top: i32, width: u32, height: u32) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    /// Builds a rect of the given size centred on `(center_x, center_y)`.
    pub fn from_center(center_x: f32, center_y: f32, width: u32, height: u32) -> Self {
        Self {
            left: center_x.round() as i32 - (width / 2) as i32,
            top: center_y.round() as i32 - (height / 2) as i32,
            width,
            height,
        }
    }

    pub fn right(&self) -> i32 {
        self.left + self.width as i32
    }

    pub fn bottom(&self) -> i32 {
        self.top + self.height as i32
    }

    pub fn top_left(&self) -> (i32, i32) {
        (self.left, self.top)
    }

    pub fn center_x(&self) -> i32 {
        self.left + (self.width / 2) as i32
    }

    fn recenter_x(&mut self, center_x: i32) {
        self.left = center_x - (self.width / 2) as i32;
    }
}

/// Pins both halves to the canvas midline after rotation.
///
/// The upper half hangs from the seam, the lower half stands on it. When a
/// floor below the seam is configured the lower rect is cropped so it never
/// extends past it; a floor at or above the seam is ignored because it would
/// hide the lower half entirely.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeamClampGeometry {
    center_x: i32,
    seam_y: i32,
    floor_y: Option<i32>,
}

impl SeamClampGeometry {
    pub fn new(screen: &ScreenConfig, motion: &MotionConfig) -> Self {
        let seam_y = screen.seam_y();
        let floor_y = Some(motion.lower_half_min_y).filter(|floor| *floor > seam_y);
        if floor_y.is_none() {
            tracing::debug!(
                floor = motion.lower_half_min_y,
                seam = seam_y,
                "lower half floor is not below the seam, ignoring it"
            );
        }

        Self {
            center_x: screen.center_x(),
            seam_y,
            floor_y,
        }
    }

    pub fn seam_y(&self) -> i32 {
        self.seam_y
    }

    /// Active floor for the lower half, if any.
    pub fn floor_y(&self) -> Option<i32> {
        self.floor_y
    }

    pub fn clamp(&self, upper: Rect, lower: Rect) -> (Rect, Rect) {
        let mut upper = upper;
        upper.recenter_x(self.center_x);
        upper.top = self.seam_y - upper.height as i32;

        let mut lower = lower;
        lower.recenter_x(self.center_x);
        lower.top = self.seam_y;
        if let Some(floor) = self.floor_y {
            if lower.bottom() > floor {
                lower.height = (floor - self.seam_y) as u32;
            }
        }

        (upper, lower)
    }
}
