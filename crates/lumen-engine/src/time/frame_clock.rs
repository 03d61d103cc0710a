use std::time::{Duration, Instant};

/// Timing for one iteration of the render loop.
#[derive(Debug, Copy, Clone)]
pub struct FrameTime {
    /// Seconds since the previous tick, clamped.
    pub dt: f32,

    /// Monotonic timestamp taken at the tick.
    pub now: Instant,

    /// Seconds since the clock was created or last reset.
    pub elapsed: f32,

    /// Zero on the first tick.
    pub frame_index: u64,
}

/// Frame clock producing `FrameTime` snapshots.
///
/// One clock per render loop. `elapsed` drives time-based animation (the viewer's
/// model rotation); `dt` drives anything integrated per frame.
///
/// `dt` is clamped to `[dt_min, dt_max]` so a stalled or minimized window does
/// not produce a huge step. `elapsed` is never clamped.
#[derive(Debug, Clone)]
pub struct FrameClock {
    start: Instant,
    last: Instant,
    frame_index: u64,
    dt_min: Duration,
    dt_max: Duration,
}

impl FrameClock {
    /// Clock with `dt` clamped to 100µs..250ms.
    pub fn new() -> Self {
        Self::with_clamps(Duration::from_micros(100), Duration::from_millis(250))
    }

    pub fn with_clamps(dt_min: Duration, dt_max: Duration) -> Self {
        debug_assert!(dt_min <= dt_max);
        let now = Instant::now();
        Self {
            start: now,
            last: now,
            frame_index: 0,
            dt_min,
            dt_max,
        }
    }

    /// Restarts `elapsed` at zero. The frame counter keeps running.
    pub fn reset(&mut self) {
        self.start = Instant::now();
        self.last = self.start;
    }

    pub fn tick(&mut self) -> FrameTime {
        self.tick_at(Instant::now())
    }

    fn tick_at(&mut self, now: Instant) -> FrameTime {
        let dt = now
            .saturating_duration_since(self.last)
            .clamp(self.dt_min, self.dt_max);
        self.last = now;

        let time = FrameTime {
            dt: dt.as_secs_f32(),
            now,
            elapsed: now.saturating_duration_since(self.start).as_secs_f32(),
            frame_index: self.frame_index,
        };
        self.frame_index = self.frame_index.wrapping_add(1);
        time
    }
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── clamps ────────────────────────────────────────────────────────────

    #[test]
    fn dt_is_clamped_to_max_after_stall() {
        let mut clock = FrameClock::new();
        let ft = clock.tick_at(clock.last + Duration::from_secs(5));
        assert_eq!(ft.dt, 0.25);
    }

    #[test]
    fn dt_is_clamped_to_min_in_tight_loops() {
        let mut clock = FrameClock::new();
        let ft = clock.tick_at(clock.last);
        assert_eq!(ft.dt, Duration::from_micros(100).as_secs_f32());
    }

    // ── elapsed / counter ────────────────────────────────────────────────

    #[test]
    fn elapsed_is_not_clamped() {
        let mut clock = FrameClock::new();
        let start = clock.start;
        clock.tick_at(start + Duration::from_secs(1));
        let ft = clock.tick_at(start + Duration::from_secs(3));
        assert_eq!(ft.elapsed, 3.0);
        assert_eq!(ft.frame_index, 1);
    }

    #[test]
    fn reset_restarts_elapsed() {
        let mut clock = FrameClock::new();
        clock.tick_at(clock.start + Duration::from_secs(2));
        clock.reset();
        let ft = clock.tick_at(clock.start + Duration::from_millis(500));
        assert_eq!(ft.elapsed, 0.5);
    }
}
