//! Core library for the JawSync avatar animator.
//!
//! Each tick samples one block of microphone audio, reduces it to a loudness
//! level, maps that level onto rotations and offsets for the two mouth
//! halves, pins the halves to the canvas midline and draws them. Audio
//! capture and the display sit behind the [`AudioSource`] and [`Canvas`]
//! traits so the whole pipeline can run against in-memory fakes.

pub mod assets;
pub mod audio;
pub mod config;
pub mod error;
pub mod frame_loop;
pub mod geometry;
pub mod mapping;
pub mod render;
pub mod scene;
pub mod timeline;

pub use assets::SpriteAssets;
pub use audio::{mean_abs_level, AudioLevelSampler, AudioSource, LoudnessLevel, MicrophoneSource};
pub use config::{AppConfig, AssetConfig, AudioConfig, LoopConfig, MotionConfig, ScreenConfig};
pub use error::{JawSyncError, Result};
pub use frame_loop::{FrameLoop, FrameReport, LoopState, TickOutcome};
pub use geometry::{Rect, SeamClampGeometry};
pub use image::RgbaImage;
pub use mapping::{MotionFrame, MotionMapper};
pub use render::{pack_rgb, Canvas, FrameBuffer};
pub use scene::{HalfSprite, MouthRig};
pub use timeline::{OpeningSide, SideAlternator, TickClock};
