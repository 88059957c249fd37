use image::RgbaImage;

use crate::{
    assets::{rotate_expanded, SpriteAssets},
    config::ScreenConfig,
    geometry::{Rect, SeamClampGeometry},
    MotionFrame,
};

/// One mouth half: an immutable base image plus the variant and placement
/// rendered this frame.
#[derive(Debug, Clone)]
pub struct HalfSprite {
    base: RgbaImage,
    rotated: Option<RgbaImage>,
    angle: f32,
    rect: Rect,
}

impl HalfSprite {
    /// Wraps `base`, centred on the canvas.
    pub fn new(base: RgbaImage, screen: &ScreenConfig) -> Self {
        let rect = Rect::from_center(
            screen.center_x() as f32,
            screen.seam_y() as f32,
            base.width(),
            base.height(),
        );
        Self {
            base,
            rotated: None,
            angle: 0.0,
            rect,
        }
    }

    pub fn base(&self) -> &RgbaImage {
        &self.base
    }

    /// Image to draw this frame.
    pub fn image(&self) -> &RgbaImage {
        self.rotated.as_ref().unwrap_or(&self.base)
    }

    pub fn angle(&self) -> f32 {
        self.angle
    }

    pub fn rect(&self) -> Rect {
        self.rect
    }

    /// Selects the variant for `angle` and returns its bounding rect centred
    /// at the given point. The previous rotation is reused when unchanged.
    fn orient(&mut self, angle: f32, center_x: f32, center_y: f32) -> Rect {
        if angle == 0.0 {
            self.rotated = None;
        } else if self.rotated.is_none() || angle != self.angle {
            self.rotated = Some(rotate_expanded(&self.base, angle));
        }
        self.angle = angle;

        let (width, height) = self.image().dimensions();
        Rect::from_center(center_x, center_y, width, height)
    }
}

/// Both halves plus the geometry that keeps them joined.
#[derive(Debug, Clone)]
pub struct MouthRig {
    upper: HalfSprite,
    lower: HalfSprite,
    geometry: SeamClampGeometry,
    center_x: f32,
}

impl MouthRig {
    pub fn new(sprites: SpriteAssets, screen: &ScreenConfig, geometry: SeamClampGeometry) -> Self {
        Self {
            upper: HalfSprite::new(sprites.upper, screen),
            lower: HalfSprite::new(sprites.lower, screen),
            geometry,
            center_x: screen.center_x() as f32,
        }
    }

    pub fn upper(&self) -> &HalfSprite {
        &self.upper
    }

    pub fn lower(&self) -> &HalfSprite {
        &self.lower
    }

    /// Rotates both halves for `motion` (base images when closed), clamps
    /// them to the seam and stores the final placements.
    pub fn apply(&mut self, motion: &MotionFrame) -> (Rect, Rect) {
        let (upper_angle, lower_angle) = if motion.is_open {
            (motion.upper_angle, motion.lower_angle)
        } else {
            (0.0, 0.0)
        };

        let upper = self.upper.orient(upper_angle, self.center_x, motion.upper_center_y);
        let lower = self.lower.orient(lower_angle, self.center_x, motion.lower_center_y);

        let (upper, lower) = self.geometry.clamp(upper, lower);
        self.upper.rect = upper;
        self.lower.rect = lower;
        (upper, lower)
    }
}

#[cfg(test)]
mod tests {
    use image::Rgba;

    use super::*;
    use crate::{config::MotionConfig, LoudnessLevel, MotionMapper, OpeningSide};

    fn rig() -> MouthRig {
        let screen = ScreenConfig::default();
        let sprites = SpriteAssets {
            upper: RgbaImage::from_pixel(300, 150, Rgba([200, 50, 50, 255])),
            lower: RgbaImage::from_pixel(300, 120, Rgba([50, 50, 200, 255])),
        };
        let geometry = SeamClampGeometry::new(&screen, &MotionConfig::default());
        MouthRig::new(sprites, &screen, geometry)
    }

    #[test]
    fn closed_pose_uses_base_images_at_rest() {
        let mut rig = rig();
        let motion = MotionMapper::default().compute(LoudnessLevel::SILENT, OpeningSide::Bottom);
        let (upper, lower) = rig.apply(&motion);

        assert_eq!(upper, Rect::new(250, 150, 300, 150));
        assert_eq!(lower, Rect::new(250, 300, 300, 120));
        assert_eq!(rig.upper().image().dimensions(), (300, 150));
        assert_eq!(rig.lower().angle(), 0.0);
    }

    #[test]
    fn open_pose_rotates_and_keeps_seam() {
        let mut rig = rig();
        let motion =
            MotionMapper::default().compute(LoudnessLevel::new(300.0), OpeningSide::Bottom);
        let (upper, lower) = rig.apply(&motion);

        assert_eq!(rig.lower().angle(), 15.0);
        assert_eq!(rig.upper().angle(), -7.5);
        assert!(rig.lower().image().height() > 120);
        assert_eq!(upper.bottom(), 300);
        assert_eq!(lower.top, 300);
        assert_eq!(upper.center_x(), 400);
        assert_eq!(lower.center_x(), 400);
    }

    #[test]
    fn returning_to_silence_drops_rotation() {
        let mut rig = rig();
        let mapper = MotionMapper::default();
        rig.apply(&mapper.compute(LoudnessLevel::new(300.0), OpeningSide::Top));
        rig.apply(&mapper.compute(LoudnessLevel::SILENT, OpeningSide::Top));

        assert_eq!(rig.upper().image().dimensions(), rig.upper().base().dimensions());
        assert_eq!(rig.lower().rect().height, 120);
    }
}
