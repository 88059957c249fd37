use std::{
    fmt, thread,
    time::{Duration, Instant},
};

use serde::{Deserialize, Serialize};

/// Which mouth half currently takes the larger rotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OpeningSide {
    Top,
    Bottom,
}

impl OpeningSide {
    pub fn flipped(self) -> Self {
        match self {
            Self::Top => Self::Bottom,
            Self::Bottom => Self::Top,
        }
    }
}

impl fmt::Display for OpeningSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Top => f.write_str("Top"),
            Self::Bottom => f.write_str("Bottom"),
        }
    }
}

/// Free-running oscillator that flips the opening side once the frame
/// counter exceeds `interval`. It ignores audio entirely.
#[derive(Debug, Clone)]
pub struct SideAlternator {
    interval: u32,
    frame_count: u32,
    side: OpeningSide,
}

impl SideAlternator {
    pub fn new(interval: u32) -> Self {
        Self {
            interval,
            frame_count: 0,
            side: OpeningSide::Bottom,
        }
    }

    /// Advances one frame and returns the side in effect for it.
    pub fn tick(&mut self) -> OpeningSide {
        self.frame_count += 1;
        if self.frame_count > self.interval {
            self.frame_count = 0;
            self.side = self.side.flipped();
            tracing::debug!(side = %self.side, "opening side flipped");
        }
        self.side
    }

    pub fn side(&self) -> OpeningSide {
        self.side
    }

    pub fn frame_count(&self) -> u32 {
        self.frame_count
    }
}

impl Default for SideAlternator {
    fn default() -> Self {
        Self::new(30)
    }
}

/// Paces the frame loop at a fixed tick rate.
#[derive(Debug, Clone)]
pub struct TickClock {
    interval: Duration,
    next_deadline: Instant,
}

impl TickClock {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            next_deadline: Instant::now() + interval,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Sleeps until the next tick boundary. An overrun tick restarts the
    /// schedule from now instead of bursting to catch up.
    pub fn wait_for_next_tick(&mut self) {
        let now = Instant::now();
        let remaining = self.remaining_at(now);
        if remaining.is_zero() {
            self.next_deadline = now + self.interval;
            return;
        }

        thread::sleep(remaining);
        self.next_deadline += self.interval;
    }

    fn remaining_at(&self, now: Instant) -> Duration {
        self.next_deadline.saturating_duration_since(now)
    }
}
