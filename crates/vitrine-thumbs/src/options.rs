use std::time::Duration;

use vitrine_engine::surface::{Background, SurfaceConfig};

/// Upper bound for the device pixel ratio applied to thumbnails.
pub const MAX_PIXEL_RATIO: f32 = 2.0;

/// When an admitted job starts rendering.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub enum Schedule {
    /// Wait for the host to report idle capacity, bounded by `idle_timeout`.
    #[default]
    Idle,
    /// Render as soon as the job is admitted.
    Immediate,
}

/// Service configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ThumbnailOptions {
    pub width: u32,
    pub height: u32,
    pub pixel_ratio: f32,
    pub background: Background,
    pub schedule: Schedule,
    /// Jobs admitted at once. Values below 1 are treated as 1.
    pub max_concurrent: usize,
    /// Longest an idle-scheduled job waits before rendering anyway.
    pub idle_timeout: Duration,
}

impl Default for ThumbnailOptions {
    fn default() -> Self {
        Self {
            width: 512,
            height: 512,
            pixel_ratio: 1.0,
            background: Background::Transparent,
            schedule: Schedule::Idle,
            max_concurrent: 1,
            idle_timeout: Duration::from_millis(1200),
        }
    }
}

impl ThumbnailOptions {
    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn with_pixel_ratio(mut self, pixel_ratio: f32) -> Self {
        self.pixel_ratio = pixel_ratio;
        self
    }

    pub fn with_background(mut self, background: Background) -> Self {
        self.background = background;
        self
    }

    pub fn with_schedule(mut self, schedule: Schedule) -> Self {
        self.schedule = schedule;
        self
    }

    pub fn with_max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.max_concurrent = max_concurrent;
        self
    }

    pub fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    pub(crate) fn admission_limit(&self) -> usize {
        self.max_concurrent.max(1)
    }

    /// Pixel ratio clamped to `(0, MAX_PIXEL_RATIO]`; invalid values become 1.
    pub fn effective_pixel_ratio(&self) -> f32 {
        if self.pixel_ratio.is_finite() && self.pixel_ratio > 0.0 {
            self.pixel_ratio.min(MAX_PIXEL_RATIO)
        } else {
            1.0
        }
    }

    /// Surface parameters a job renders with.
    pub fn surface_config(&self) -> SurfaceConfig {
        SurfaceConfig {
            width: self.width.max(1),
            height: self.height.max(1),
            pixel_ratio: self.effective_pixel_ratio(),
            background: self.background,
        }
    }
}
