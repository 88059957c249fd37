use jawsync_core::{Canvas, FrameBuffer, JawSyncError, Rect, Result, RgbaImage, ScreenConfig};
use minifb::{Window, WindowOptions};

/// Native window backed by a software [`FrameBuffer`].
pub struct WindowCanvas {
    window: Option<Window>,
    buffer: FrameBuffer,
}

impl WindowCanvas {
    pub fn open(screen: &ScreenConfig) -> Result<Self> {
        let width = screen.width as usize;
        let height = screen.height as usize;
        let mut window = Window::new(&screen.title, width, height, WindowOptions::default())
            .map_err(|err| JawSyncError::Display(err.to_string()))?;
        // The frame loop paces itself.
        window.set_target_fps(0);

        tracing::info!(width, height, title = %screen.title, "window opened");
        Ok(Self {
            window: Some(window),
            buffer: FrameBuffer::new(width, height),
        })
    }
}

impl Canvas for WindowCanvas {
    fn poll_quit(&mut self) -> bool {
        self.window.as_ref().map_or(true, |window| !window.is_open())
    }

    fn clear(&mut self, color: [u8; 3]) {
        self.buffer.clear(color);
    }

    fn draw_image(&mut self, image: &RgbaImage, dest: Rect) {
        self.buffer.blit(image, dest);
    }

    fn draw_overlay(&mut self, lines: &[String]) {
        tracing::debug!(overlay = ?lines, "frame diagnostics");
        self.buffer.draw_overlay(lines);
    }

    fn present(&mut self) -> Result<()> {
        let window = self
            .window
            .as_mut()
            .ok_or_else(|| JawSyncError::Display("window already closed".to_string()))?;
        window
            .update_with_buffer(self.buffer.pixels(), self.buffer.width(), self.buffer.height())
            .map_err(|err| JawSyncError::Display(err.to_string()))
    }

    fn close(&mut self) {
        if self.window.take().is_some() {
            tracing::info!("window closed");
        }
    }
}

impl Drop for WindowCanvas {
    fn drop(&mut self) {
        self.close();
    }
}
