mod capture;

pub use capture::MicrophoneSource;

use std::fmt;

use crate::{config::AudioConfig, JawSyncError, Result};

/// Producer of fixed-size mono PCM blocks.
///
/// Implementations block until `block` has been completely filled. Buffer
/// overflows are absorbed internally; only unrecoverable conditions are
/// returned as errors.
pub trait AudioSource {
    fn read_block(&mut self, block: &mut [i16]) -> Result<()>;

    /// Releases the underlying stream. Called exactly once at shutdown.
    fn close(&mut self);
}

/// Mean absolute amplitude of one audio block. Never negative.
#[derive(Debug, Clone, Copy, Default, PartialEq, PartialOrd)]
pub struct LoudnessLevel(f32);

impl LoudnessLevel {
    pub const SILENT: Self = Self(0.0);

    /// Wraps a raw level, mapping negative or NaN input to silence.
    pub fn new(value: f32) -> Self {
        if value.is_nan() || value < 0.0 {
            Self::SILENT
        } else {
            Self(value)
        }
    }

    pub fn value(self) -> f32 {
        self.0
    }
}

impl fmt::Display for LoudnessLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

/// Reduces a block to the mean of its absolute sample values.
pub fn mean_abs_level(block: &[i16]) -> LoudnessLevel {
    if block.is_empty() {
        return LoudnessLevel::SILENT;
    }

    // i16::MIN has no positive i16 counterpart, so widen first.
    let sum: u64 = block
        .iter()
        .map(|sample| u64::from(i32::from(*sample).unsigned_abs()))
        .sum();
    LoudnessLevel::new((sum as f64 / block.len() as f64) as f32)
}

/// Pulls one block per call from an [`AudioSource`] and reports its level.
pub struct AudioLevelSampler<S> {
    source: S,
    block: Vec<i16>,
    closed: bool,
}

impl<S: AudioSource> AudioLevelSampler<S> {
    pub fn new(source: S, block_size: usize) -> Self {
        Self {
            source,
            block: vec![0; block_size.max(1)],
            closed: false,
        }
    }

    pub fn from_config(source: S, config: &AudioConfig) -> Self {
        Self::new(source, config.block_size)
    }

    /// Reads the next block and returns its loudness. The block is reused
    /// for the following call, nothing is retained across ticks.
    pub fn sample(&mut self) -> Result<LoudnessLevel> {
        if self.closed {
            return Err(JawSyncError::AudioStream(
                "sampler has already been closed".to_string(),
            ));
        }

        self.source.read_block(&mut self.block)?;
        Ok(mean_abs_level(&self.block))
    }

    /// Releases the input stream. Further calls are no-ops.
    pub fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.source.close();
            tracing::debug!("audio input released");
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }
}

impl<S> fmt::Debug for AudioLevelSampler<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AudioLevelSampler")
            .field("block_size", &self.block.len())
            .field("closed", &self.closed)
            .finish()
    }
}
