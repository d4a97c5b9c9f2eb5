//! Frame diagnostics
//!
//! A rolling per-second frame counter plus the draw-call count submitted in
//! the last frame, surfaced for the on-screen/CLI readout.

use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct FrameStats {
    window_start: Instant,
    frames_in_window: u32,
    fps: u32,
    draw_calls_last_frame: u32,
    total_frames: u64,
}

impl FrameStats {
    pub fn new() -> Self {
        Self {
            window_start: Instant::now(),
            frames_in_window: 0,
            fps: 0,
            draw_calls_last_frame: 0,
            total_frames: 0,
        }
    }

    pub fn record_frame(&mut self, draw_calls: u32) {
        self.record_frame_at(Instant::now(), draw_calls);
    }

    fn record_frame_at(&mut self, now: Instant, draw_calls: u32) {
        self.frames_in_window += 1;
        self.total_frames += 1;
        self.draw_calls_last_frame = draw_calls;
        if now.duration_since(self.window_start) >= Duration::from_secs(1) {
            self.fps = self.frames_in_window;
            self.frames_in_window = 0;
            self.window_start = now;
        }
    }

    /// Frames counted in the last completed one-second window. Zero until
    /// the first window closes.
    pub fn fps(&self) -> u32 {
        self.fps
    }

    pub fn draw_calls_last_frame(&self) -> u32 {
        self.draw_calls_last_frame
    }

    pub fn total_frames(&self) -> u64 {
        self.total_frames
    }
}

impl Default for FrameStats {
    fn default() -> Self {
        Self::new()
    }
}
