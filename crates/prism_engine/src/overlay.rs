//! Debug overlay seam
//!
//! The renderer records the overlay last inside the render pass, so an
//! implementation may emit draw commands over the finished scene. The
//! engine ships a widget-free implementation that only aggregates frame
//! statistics; an immediate-mode UI library can be slotted in behind the
//! same trait.

use ash::vk;
use std::time::{Duration, Instant};

/// Hook for drawing diagnostics on top of the scene each frame
pub trait DebugOverlay {
    /// Called once per frame before recording, with the previous frame's
    /// duration.
    fn begin_frame(&mut self, delta_seconds: f32);

    /// Called inside the render pass, after all scene draws. The overlay
    /// may record draw commands into `command_buffer`.
    fn record(&mut self, command_buffer: vk::CommandBuffer);
}

/// Frame statistics overlay: rolling frame-time average, reported through
/// the log once per second
pub struct FrameStatsOverlay {
    frames: u32,
    accumulated: f32,
    worst: f32,
    last_report: Instant,
}

impl FrameStatsOverlay {
    pub fn new() -> Self {
        Self {
            frames: 0,
            accumulated: 0.0,
            worst: 0.0,
            last_report: Instant::now(),
        }
    }
}

impl Default for FrameStatsOverlay {
    fn default() -> Self {
        Self::new()
    }
}

impl DebugOverlay for FrameStatsOverlay {
    fn begin_frame(&mut self, delta_seconds: f32) {
        self.frames += 1;
        self.accumulated += delta_seconds;
        self.worst = self.worst.max(delta_seconds);

        if self.last_report.elapsed() >= Duration::from_secs(1) && self.frames > 0 {
            let average_ms = self.accumulated / self.frames as f32 * 1000.0;
            log::info!(
                "{} fps, {:.2} ms avg, {:.2} ms worst",
                self.frames,
                average_ms,
                self.worst * 1000.0
            );
            self.frames = 0;
            self.accumulated = 0.0;
            self.worst = 0.0;
            self.last_report = Instant::now();
        }
    }

    fn record(&mut self, _command_buffer: vk::CommandBuffer) {
        // Stats go to the log; nothing is drawn.
    }
}
