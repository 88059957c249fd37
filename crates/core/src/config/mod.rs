use std::{path::Path, path::PathBuf, time::Duration};

use serde::{Deserialize, Serialize};

use crate::{JawSyncError, Result};

/// Largest accepted canvas edge, in pixels.
const MAX_SCREEN_DIMENSION: u32 = 16_384;

/// Top-level configuration structure for the application.
///
/// Every section falls back to its defaults, so a preset file only needs to
/// name the values it changes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub screen: ScreenConfig,
    pub audio: AudioConfig,
    pub motion: MotionConfig,
    #[serde(rename = "loop")]
    pub frame_loop: LoopConfig,
    pub assets: AssetConfig,
}

impl AppConfig {
    pub fn live_defaults() -> Self {
        Self::default()
    }

    /// Reads a JSON preset from disk and validates it.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    pub fn from_json_str(raw: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Rejects values that would make the animator misbehave at runtime.
    pub fn validate(&self) -> Result<()> {
        if self.screen.width == 0 || self.screen.height == 0 {
            return Err(invalid("screen dimensions must be non-zero"));
        }
        if self.screen.width > MAX_SCREEN_DIMENSION || self.screen.height > MAX_SCREEN_DIMENSION {
            return Err(invalid(format!(
                "screen dimensions must not exceed {MAX_SCREEN_DIMENSION} pixels"
            )));
        }
        if self.audio.sample_rate == 0 {
            return Err(invalid("audio.sample_rate must be non-zero"));
        }
        if self.audio.block_size == 0 {
            return Err(invalid("audio.block_size must be non-zero"));
        }
        if self.audio.ring_blocks == 0 {
            return Err(invalid("audio.ring_blocks must be non-zero"));
        }
        if self.audio.read_timeout_ms == 0 {
            return Err(invalid("audio.read_timeout_ms must be non-zero"));
        }
        for (name, value) in [
            ("motion.sensitivity", self.motion.sensitivity),
            ("motion.min_audio_threshold", self.motion.min_audio_threshold),
            ("motion.angular_offset", self.motion.angular_offset),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(invalid(format!("{name} must be a finite, non-negative number")));
            }
        }
        if self.motion.side_interval == 0 {
            return Err(invalid("motion.side_interval must be non-zero"));
        }
        if self.frame_loop.tick_rate == 0 {
            return Err(invalid("loop.tick_rate must be non-zero"));
        }
        let fit = self.assets.fit_fraction;
        if !(fit > 0.0 && fit <= 1.0) {
            return Err(invalid("assets.fit_fraction must be in (0, 1]"));
        }
        Ok(())
    }
}

fn invalid(message: impl Into<String>) -> JawSyncError {
    JawSyncError::InvalidConfig(message.into())
}

/// Canvas size and appearance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScreenConfig {
    pub width: u32,
    pub height: u32,
    pub title: String,
    /// Clear colour, green by default so the output can be chroma keyed.
    pub background: [u8; 3],
}

impl Default for ScreenConfig {
    fn default() -> Self {
        Self {
            width: 800,
            height: 600,
            title: "JawSync".to_string(),
            background: [0, 255, 0],
        }
    }
}

impl ScreenConfig {
    /// Vertical midline where the two halves meet.
    pub fn seam_y(&self) -> i32 {
        (self.height / 2) as i32
    }

    pub fn center_x(&self) -> i32 {
        (self.width / 2) as i32
    }

    /// Upper bound for the jaw offset.
    pub fn max_jaw_offset(&self) -> u32 {
        self.height / 16
    }
}

/// Configuration specific to the audio subsystem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    pub sample_rate: u32,
    pub block_size: usize,
    /// Capacity of the capture ring, in blocks.
    pub ring_blocks: usize,
    /// Longest a read waits for a full block before the stream is
    /// considered lost.
    pub read_timeout_ms: u64,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44_100,
            block_size: 512,
            ring_blocks: 8,
            read_timeout_ms: 1_000,
        }
    }
}

impl AudioConfig {
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }
}

/// Tunables for the loudness to motion mapping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MotionConfig {
    pub sensitivity: f32,
    pub min_audio_threshold: f32,
    /// Degrees of rotation per unit of jaw offset.
    pub angular_offset: f32,
    /// Frames between opening side flips.
    pub side_interval: u32,
    pub lower_half_min_y: i32,
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            sensitivity: 0.1,
            min_audio_threshold: 15.0,
            angular_offset: 0.5,
            side_interval: 30,
            lower_half_min_y: 300,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoopConfig {
    pub tick_rate: u32,
    pub debug_overlay: bool,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            tick_rate: 30,
            debug_overlay: false,
        }
    }
}

impl LoopConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.tick_rate.max(1)))
    }
}

/// Locations of the two sprite halves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetConfig {
    pub upper: PathBuf,
    pub lower: PathBuf,
    /// Fraction of each screen dimension a sprite may occupy.
    pub fit_fraction: f32,
}

impl Default for AssetConfig {
    fn default() -> Self {
        Self {
            upper: PathBuf::from("images/upper_half.png"),
            lower: PathBuf::from("images/lower_half.png"),
            fit_fraction: 0.5,
        }
    }
}
