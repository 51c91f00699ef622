//! Frame timing

use std::time::Instant;

/// Longest frame time handed to simulation, in seconds
pub const MAX_FRAME_TIME: f32 = 0.25;

/// High-precision timer for frame timing
pub struct Timer {
    last_frame: Instant,
    delta_time: f32,
    total_time: f32,
    frame_count: u64,
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}

impl Timer {
    /// Create a new timer
    pub fn new() -> Self {
        Self {
            last_frame: Instant::now(),
            delta_time: 0.0,
            total_time: 0.0,
            frame_count: 0,
        }
    }

    /// Advance to now; the delta is clamped to [`MAX_FRAME_TIME`]
    pub fn update(&mut self) -> f32 {
        let now = Instant::now();
        self.advance(now.duration_since(self.last_frame).as_secs_f32());
        self.last_frame = now;
        self.delta_time
    }

    fn advance(&mut self, elapsed: f32) {
        self.delta_time = elapsed.min(MAX_FRAME_TIME);
        self.total_time += self.delta_time;
        self.frame_count += 1;
    }

    /// Get the time since the last frame in seconds
    pub fn delta_time(&self) -> f32 {
        self.delta_time
    }

    /// Get the total elapsed time since timer creation
    pub fn total_time(&self) -> f32 {
        self.total_time
    }

    /// Get the current frame count
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Get the average FPS since timer creation
    pub fn average_fps(&self) -> f32 {
        if self.total_time > 0.0 {
            self.frame_count as f32 / self.total_time
        } else {
            0.0
        }
    }
}

/// Frame rate over fixed reporting intervals
#[derive(Debug, Clone)]
pub struct FpsCounter {
    interval: f32,
    elapsed: f32,
    frames: u32,
}

impl FpsCounter {
    /// Report once every `interval` seconds
    pub fn new(interval: f32) -> Self {
        Self {
            interval,
            elapsed: 0.0,
            frames: 0,
        }
    }

    /// Count one frame of `delta_time` seconds
    ///
    /// Returns the rate over the interval that just closed, if one did.
    pub fn tick(&mut self, delta_time: f32) -> Option<f32> {
        self.elapsed += delta_time;
        self.frames += 1;
        if self.elapsed < self.interval {
            return None;
        }
        let fps = self.frames as f32 / self.elapsed;
        self.elapsed = 0.0;
        self.frames = 0;
        Some(fps)
    }
}

impl Default for FpsCounter {
    fn default() -> Self {
        Self::new(1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_long_frames_are_clamped() {
        let mut timer = Timer::new();
        timer.advance(3.0);
        assert_eq!(timer.delta_time(), MAX_FRAME_TIME);
        timer.advance(0.25);
        assert_eq!(timer.frame_count(), 2);
        assert_eq!(timer.average_fps(), 4.0);
    }

    #[test]
    fn test_fps_reported_once_per_interval() {
        let mut fps = FpsCounter::new(1.0);
        for _ in 0..3 {
            assert_eq!(fps.tick(0.25), None);
        }
        assert_eq!(fps.tick(0.25), Some(4.0));

        // The next interval starts from zero
        assert_eq!(fps.tick(0.5), None);
        assert_eq!(fps.tick(0.5), Some(2.0));
    }
}
