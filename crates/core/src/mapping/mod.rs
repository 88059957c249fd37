use serde::{Deserialize, Serialize};

use crate::{
    config::{MotionConfig, ScreenConfig},
    LoudnessLevel, OpeningSide,
};

/// Share of the primary rotation applied, with opposite sign, to the
/// secondary half.
const SECONDARY_ROTATION_RATIO: f32 = 0.5;

/// Pose of both halves for a single frame.
///
/// Angles are in degrees, positive meaning counter-clockwise on screen.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MotionFrame {
    pub jaw_offset: u32,
    pub upper_angle: f32,
    pub lower_angle: f32,
    pub upper_center_y: f32,
    pub lower_center_y: f32,
    pub is_open: bool,
}

/// Maps loudness and the current opening side onto a [`MotionFrame`].
#[derive(Debug, Clone, PartialEq)]
pub struct MotionMapper {
    sensitivity: f32,
    min_audio_threshold: f32,
    angular_offset: f32,
    max_offset: u32,
    seam_y: f32,
}

impl MotionMapper {
    pub fn new(motion: &MotionConfig, screen: &ScreenConfig) -> Self {
        Self {
            sensitivity: motion.sensitivity,
            min_audio_threshold: motion.min_audio_threshold,
            angular_offset: motion.angular_offset,
            max_offset: screen.max_jaw_offset(),
            seam_y: screen.seam_y() as f32,
        }
    }

    /// Bounded jaw displacement, `min(floor(level * sensitivity), height / 16)`.
    pub fn jaw_offset(&self, level: LoudnessLevel) -> u32 {
        let scaled = (level.value() * self.sensitivity).floor();
        if !(scaled >= 1.0) {
            return 0;
        }
        if scaled >= self.max_offset as f32 {
            self.max_offset
        } else {
            scaled as u32
        }
    }

    pub fn compute(&self, level: LoudnessLevel, side: OpeningSide) -> MotionFrame {
        let jaw_offset = self.jaw_offset(level);
        let is_open = jaw_offset > 0 && level.value() > self.min_audio_threshold;

        if !is_open {
            return MotionFrame {
                jaw_offset,
                upper_angle: 0.0,
                lower_angle: 0.0,
                upper_center_y: self.seam_y,
                lower_center_y: self.seam_y,
                is_open,
            };
        }

        let primary = jaw_offset as f32 * self.angular_offset;
        let secondary = -primary * SECONDARY_ROTATION_RATIO;
        let (upper_angle, lower_angle) = match side {
            OpeningSide::Bottom => (secondary, primary),
            OpeningSide::Top => (primary, secondary),
        };

        let separation = jaw_offset as f32 * 0.5;
        MotionFrame {
            jaw_offset,
            upper_angle,
            lower_angle,
            upper_center_y: self.seam_y - separation,
            lower_center_y: self.seam_y + separation,
            is_open,
        }
    }
}

impl Default for MotionMapper {
    fn default() -> Self {
        Self::new(&MotionConfig::default(), &ScreenConfig::default())
    }
}
