use crate::{
    assets::SpriteAssets,
    audio::{AudioLevelSampler, AudioSource, LoudnessLevel},
    config::AppConfig,
    geometry::{Rect, SeamClampGeometry},
    mapping::{MotionFrame, MotionMapper},
    render::Canvas,
    scene::MouthRig,
    timeline::{OpeningSide, SideAlternator, TickClock},
    Result,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Running,
    Stopped,
}

/// Everything computed for one rendered frame.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameReport {
    pub level: LoudnessLevel,
    pub side: OpeningSide,
    pub motion: MotionFrame,
    pub upper: Rect,
    pub lower: Rect,
}

impl FrameReport {
    pub fn overlay_lines(&self) -> Vec<String> {
        vec![
            format!("Audio Level: {}", self.level),
            format!("Jaw Offset: {}", self.motion.jaw_offset),
            format!("Upper Half Pos: ({}, {})", self.upper.left, self.upper.top),
            format!("Lower Half Pos: ({}, {})", self.lower.left, self.lower.top),
            format!("Opening Side: {}", self.side),
        ]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    Rendered(FrameReport),
    Stopped,
}

/// Drives sample, map, clamp, draw and present at a fixed tick rate.
///
/// The loop owns the audio sampler and the canvas. Both are released exactly
/// once, audio first, when the loop stops for any reason (including drop).
pub struct FrameLoop<S: AudioSource, C: Canvas> {
    sampler: AudioLevelSampler<S>,
    canvas: C,
    alternator: SideAlternator,
    mapper: MotionMapper,
    rig: MouthRig,
    clock: TickClock,
    background: [u8; 3],
    debug_overlay: bool,
    state: LoopState,
    released: bool,
    frames: u64,
}

impl<S: AudioSource, C: Canvas> FrameLoop<S, C> {
    pub fn new(config: &AppConfig, source: S, canvas: C, sprites: SpriteAssets) -> Self {
        let geometry = SeamClampGeometry::new(&config.screen, &config.motion);
        Self {
            sampler: AudioLevelSampler::from_config(source, &config.audio),
            canvas,
            alternator: SideAlternator::new(config.motion.side_interval),
            mapper: MotionMapper::new(&config.motion, &config.screen),
            rig: MouthRig::new(sprites, &config.screen, geometry),
            clock: TickClock::new(config.frame_loop.tick_interval()),
            background: config.screen.background,
            debug_overlay: config.frame_loop.debug_overlay,
            state: LoopState::Running,
            released: false,
            frames: 0,
        }
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn canvas(&self) -> &C {
        &self.canvas
    }

    pub fn rig(&self) -> &MouthRig {
        &self.rig
    }

    /// Runs one tick without pacing. Audio or presentation failures stop the
    /// loop, release resources, and are returned.
    pub fn tick(&mut self) -> Result<TickOutcome> {
        if self.state == LoopState::Stopped {
            return Ok(TickOutcome::Stopped);
        }

        if self.canvas.poll_quit() {
            tracing::info!(frames = self.frames, "quit requested");
            self.stop();
            return Ok(TickOutcome::Stopped);
        }

        let level = match self.sampler.sample() {
            Ok(level) => level,
            Err(err) => {
                tracing::error!(%err, "audio sampling failed");
                self.stop();
                return Err(err);
            }
        };

        let side = self.alternator.tick();
        let motion = self.mapper.compute(level, side);
        let (upper, lower) = self.rig.apply(&motion);

        self.canvas.clear(self.background);
        self.canvas.draw_image(self.rig.upper().image(), upper);
        self.canvas.draw_image(self.rig.lower().image(), lower);

        let report = FrameReport {
            level,
            side,
            motion,
            upper,
            lower,
        };
        if self.debug_overlay {
            self.canvas.draw_overlay(&report.overlay_lines());
        }

        if let Err(err) = self.canvas.present() {
            tracing::error!(%err, "failed to present frame");
            self.stop();
            return Err(err);
        }

        self.frames += 1;
        Ok(TickOutcome::Rendered(report))
    }

    /// Ticks at the configured rate until stopped. Returns the number of
    /// frames rendered.
    pub fn run(&mut self) -> Result<u64> {
        tracing::info!(interval = ?self.clock.interval(), "frame loop running");
        while let TickOutcome::Rendered(_) = self.tick()? {
            self.clock.wait_for_next_tick();
        }
        Ok(self.frames)
    }

    /// Transitions to STOPPED and tears down audio, then the canvas.
    pub fn stop(&mut self) {
        self.state = LoopState::Stopped;
        if self.released {
            return;
        }
        self.released = true;
        self.sampler.close();
        self.canvas.close();
        tracing::info!(frames = self.frames, "frame loop stopped");
    }
}

impl<S: AudioSource, C: Canvas> Drop for FrameLoop<S, C> {
    fn drop(&mut self) {
        self.stop();
    }
}

impl<S: AudioSource, C: Canvas> std::fmt::Debug for FrameLoop<S, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameLoop")
            .field("state", &self.state)
            .field("frames", &self.frames)
            .field("side", &self.alternator.side())
            .field("debug_overlay", &self.debug_overlay)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, rc::Rc};

    use image::{Rgba, RgbaImage};

    use super::*;
    use crate::{render::FrameBuffer, JawSyncError};

    type Journal = Rc<RefCell<Vec<String>>>;

    /// Plays back per-block amplitudes, then fails once exhausted.
    struct ScriptedSource {
        amplitudes: Vec<i16>,
        journal: Journal,
    }

    impl AudioSource for ScriptedSource {
        fn read_block(&mut self, block: &mut [i16]) -> Result<()> {
            self.journal.borrow_mut().push("read".to_string());
            if self.amplitudes.is_empty() {
                return Err(JawSyncError::AudioStream("device unplugged".to_string()));
            }
            block.fill(self.amplitudes.remove(0));
            Ok(())
        }

        fn close(&mut self) {
            self.journal.borrow_mut().push("close audio".to_string());
        }
    }

    /// Offscreen canvas that requests quit after a fixed number of polls.
    struct TestCanvas {
        buffer: FrameBuffer,
        quit_after: usize,
        polls: usize,
        journal: Journal,
    }

    impl Canvas for TestCanvas {
        fn poll_quit(&mut self) -> bool {
            self.polls += 1;
            self.polls > self.quit_after
        }

        fn clear(&mut self, color: [u8; 3]) {
            self.buffer.clear(color);
        }

        fn draw_image(&mut self, image: &RgbaImage, dest: Rect) {
            self.buffer.draw_image(image, dest);
        }

        fn draw_overlay(&mut self, lines: &[String]) {
            self.buffer.draw_overlay(lines);
        }

        fn present(&mut self) -> Result<()> {
            self.buffer.present()
        }

        fn close(&mut self) {
            self.journal.borrow_mut().push("close canvas".to_string());
        }
    }

    fn sprites() -> SpriteAssets {
        SpriteAssets {
            upper: RgbaImage::from_pixel(200, 100, Rgba([255, 0, 0, 255])),
            lower: RgbaImage::from_pixel(200, 80, Rgba([0, 0, 255, 255])),
        }
    }

    fn fast_config(debug_overlay: bool) -> AppConfig {
        let mut config = AppConfig::default();
        config.audio.block_size = 64;
        config.frame_loop.tick_rate = 1_000;
        config.frame_loop.debug_overlay = debug_overlay;
        config
    }

    fn build(
        amplitudes: Vec<i16>,
        quit_after: usize,
        debug_overlay: bool,
    ) -> (FrameLoop<ScriptedSource, TestCanvas>, Journal) {
        let journal: Journal = Rc::default();
        let source = ScriptedSource {
            amplitudes,
            journal: Rc::clone(&journal),
        };
        let canvas = TestCanvas {
            buffer: FrameBuffer::new(800, 600),
            quit_after,
            polls: 0,
            journal: Rc::clone(&journal),
        };
        let frame_loop = FrameLoop::new(&fast_config(debug_overlay), source, canvas, sprites());
        (frame_loop, journal)
    }

    fn count(journal: &Journal, entry: &str) -> usize {
        journal.borrow().iter().filter(|e| *e == entry).count()
    }

    #[test]
    fn silent_tick_draws_halves_at_rest() {
        let (mut frame_loop, _) = build(vec![0], 10, false);

        let TickOutcome::Rendered(report) = frame_loop.tick().unwrap() else {
            panic!("expected a rendered frame");
        };
        assert!(!report.motion.is_open);
        assert_eq!(report.upper, Rect::new(300, 200, 200, 100));
        assert_eq!(report.lower, Rect::new(300, 300, 200, 80));

        let buffer = &frame_loop.canvas().buffer;
        assert_eq!(buffer.pixel(400, 299), Some([255, 0, 0]));
        assert_eq!(buffer.pixel(400, 300), Some([0, 0, 255]));
        assert_eq!(buffer.pixel(10, 10), Some([0, 255, 0]));
        assert_eq!(buffer.presented_frames(), 1);
    }

    #[test]
    fn loud_tick_opens_bottom_side_first() {
        let (mut frame_loop, _) = build(vec![100], 10, false);

        let TickOutcome::Rendered(report) = frame_loop.tick().unwrap() else {
            panic!("expected a rendered frame");
        };
        assert_eq!(report.side, OpeningSide::Bottom);
        assert_eq!(report.motion.jaw_offset, 10);
        assert_eq!(report.motion.lower_angle, 5.0);
        assert_eq!(report.motion.upper_angle, -2.5);
        assert_eq!(report.upper.bottom(), report.lower.top);
        assert_eq!(report.lower.top, 300);
    }

    #[test]
    fn quit_stops_before_sampling_and_releases_once() {
        let (mut frame_loop, journal) = build(vec![50; 10], 3, false);

        let frames = frame_loop.run().unwrap();
        assert_eq!(frames, 3);
        assert_eq!(frame_loop.state(), LoopState::Stopped);
        assert_eq!(count(&journal, "read"), 3);

        assert_eq!(frame_loop.tick().unwrap(), TickOutcome::Stopped);
        frame_loop.stop();
        drop(frame_loop);

        assert_eq!(count(&journal, "read"), 3);
        assert_eq!(count(&journal, "close audio"), 1);
        assert_eq!(count(&journal, "close canvas"), 1);
    }

    #[test]
    fn teardown_releases_audio_before_canvas() {
        let (mut frame_loop, journal) = build(vec![], 0, false);
        assert_eq!(frame_loop.tick().unwrap(), TickOutcome::Stopped);

        let entries = journal.borrow().clone();
        assert_eq!(entries, vec!["close audio", "close canvas"]);
    }

    #[test]
    fn audio_loss_is_fatal_and_tears_down() {
        let (mut frame_loop, journal) = build(vec![20, 20], 100, false);

        let err = frame_loop.run().unwrap_err();
        assert!(matches!(err, JawSyncError::AudioStream(_)));
        assert_eq!(frame_loop.frames(), 2);
        assert_eq!(frame_loop.state(), LoopState::Stopped);

        drop(frame_loop);
        assert_eq!(count(&journal, "close audio"), 1);
        assert_eq!(count(&journal, "close canvas"), 1);
    }

    #[test]
    fn dropping_a_running_loop_releases_resources() {
        let (frame_loop, journal) = build(vec![0], 10, false);
        drop(frame_loop);

        assert_eq!(count(&journal, "close audio"), 1);
        assert_eq!(count(&journal, "close canvas"), 1);
    }

    #[test]
    fn debug_overlay_reports_frame_state() {
        let (mut frame_loop, _) = build(vec![100], 10, true);
        frame_loop.tick().unwrap();

        let overlay = frame_loop.canvas().buffer.overlay();
        assert_eq!(overlay[0], "Audio Level: 100.00");
        assert_eq!(overlay[1], "Jaw Offset: 10");
        assert!(overlay[2].starts_with("Upper Half Pos: ("));
        assert_eq!(overlay[4], "Opening Side: Bottom");
    }

    #[test]
    fn overlay_is_skipped_when_disabled() {
        let (mut frame_loop, _) = build(vec![100], 10, false);
        frame_loop.tick().unwrap();
        assert!(frame_loop.canvas().buffer.overlay().is_empty());
    }

    #[test]
    fn seam_holds_across_side_flips() {
        let amplitudes = (0..70).map(|i| (i * 37 % 600) as i16).collect();
        let (mut frame_loop, _) = build(amplitudes, 70, false);

        let mut sides = Vec::new();
        while let TickOutcome::Rendered(report) = frame_loop.tick().unwrap() {
            assert_eq!(report.upper.bottom(), 300);
            assert_eq!(report.lower.top, 300);
            assert!(report.motion.jaw_offset <= 37);
            sides.push(report.side);
        }

        assert_eq!(sides.len(), 70);
        assert_eq!(sides[29], OpeningSide::Bottom);
        assert_eq!(sides[30], OpeningSide::Top);
        assert_eq!(sides[61], OpeningSide::Bottom);
    }
}
