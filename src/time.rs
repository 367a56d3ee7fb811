// src/time.rs
//! Frame clock driving every time-dependent uniform.
//!
//! - Simulation time is accumulated as `delta × speed`, so changing the speed mid-session
//!   changes the *rate* of the fire, never its phase.
//! - Wall-clock deltas measured by [`FrameClock::measure`] are capped at `max_delta`
//!   (tab-out, window drag). Scripted deltas passed to [`FrameClock::advance`] are not.
//! - f32 deltas in, f64 accumulation; uniforms receive the f32 narrowing.

use std::time::Instant;

/// Default cap on a measured frame delta (4 FPS).
pub const DEFAULT_MAX_DELTA: f32 = 0.25;

/// Snapshot of timing data produced by one advance (Copy, cheap).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Time {
    /// Delta fed into the accumulator, before speed scaling.
    pub delta: f32,
    /// `delta × speed`.
    pub scaled_delta: f32,
    /// Accumulated simulation time after this advance.
    pub simulation_time: f32,
    pub speed: f32,
    pub frame: u64,
}

/// Monotonic simulation clock scaled by a user-adjustable speed factor.
#[derive(Debug)]
pub struct FrameClock {
    last_frame: Option<Instant>,
    /// f64 so long sessions keep advancing; narrowed to f32 per [`Time`].
    simulation_time: f64,
    speed: f32,
    max_delta: f32,
    frame: u64,
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new(1.0)
    }
}

impl FrameClock {
    pub fn new(speed: f32) -> Self {
        Self {
            last_frame: None,
            simulation_time: 0.0,
            speed,
            max_delta: DEFAULT_MAX_DELTA,
            frame: 0,
        }
    }

    pub fn with_max_delta(mut self, max_delta: f32) -> Self {
        self.max_delta = max_delta.max(0.0);
        self
    }

    /// Wall-clock seconds since the previous measurement, capped at `max_delta`.
    /// The first call after construction (or after [`FrameClock::rebase`]) returns 0.
    pub fn measure(&mut self) -> f32 {
        let now = Instant::now();
        let raw = match self.last_frame {
            Some(prev) => now.duration_since(prev).as_secs_f32(),
            None => 0.0,
        };
        self.last_frame = Some(now);
        raw.min(self.max_delta)
    }

    /// Forget the previous measurement so the next [`FrameClock::measure`] starts at 0.
    /// Used when a stopped loop is restarted: the paused interval is not simulated.
    pub fn rebase(&mut self) {
        self.last_frame = None;
    }

    /// Accumulate `delta × speed`. Negative or NaN deltas count as zero.
    pub fn advance(&mut self, delta: f32) -> Time {
        let delta = if delta > 0.0 { delta } else { 0.0 };
        let scaled_delta = f64::from(delta) * f64::from(self.speed);
        self.simulation_time += scaled_delta;
        self.frame += 1;

        Time {
            delta,
            scaled_delta: scaled_delta as f32,
            simulation_time: self.simulation_time as f32,
            speed: self.speed,
            frame: self.frame,
        }
    }

    // ================ CONTROLS ================
    /// Any value is accepted; the panel keeps it within [0.1, 3.0].
    #[inline]
    pub fn set_speed(&mut self, speed: f32) {
        self.speed = speed;
    }
    #[inline]
    pub fn speed(&self) -> f32 {
        self.speed
    }
    #[inline]
    pub fn simulation_time(&self) -> f64 {
        self.simulation_time
    }
    #[inline]
    pub fn frame(&self) -> u64 {
        self.frame
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accumulates_scaled_deltas() {
        let mut clock = FrameClock::new(2.0);
        for _ in 0..3 {
            clock.advance(0.016);
        }
        assert!((clock.simulation_time() - 0.096).abs() < 1e-6);
        assert_eq!(clock.frame(), 3);
    }

    #[test]
    fn monotonic_for_non_negative_deltas() {
        let mut clock = FrameClock::new(0.7);
        let mut last = clock.simulation_time();
        for delta in [0.0, 0.5, 0.001, 0.0, 2.0, 1e-7] {
            clock.advance(delta);
            let now = clock.simulation_time();
            assert!(now >= last);
            last = now;
        }
    }

    #[test]
    fn negative_and_nan_deltas_are_ignored() {
        let mut clock = FrameClock::new(1.0);
        clock.advance(1.0);
        clock.advance(-5.0);
        clock.advance(f32::NAN);
        assert_eq!(clock.simulation_time(), 1.0);
    }

    #[test]
    fn long_sessions_keep_advancing() {
        let mut clock = FrameClock::new(0.1);
        clock.advance(400_000.0);
        let start = clock.simulation_time();
        assert!(start > 39_999.0);
        // ten seconds at 62.5 FPS
        for _ in 0..625 {
            clock.advance(0.016);
        }
        assert!((clock.simulation_time() - start - 1.0).abs() < 1e-6);

        let mut clock = FrameClock::new(1.0);
        clock.advance(300_000.0);
        let start = clock.simulation_time();
        for _ in 0..625 {
            clock.advance(0.016);
        }
        assert!((clock.simulation_time() - start - 10.0).abs() < 1e-5);
    }

    #[test]
    fn out_of_range_speed_still_computes() {
        let mut clock = FrameClock::new(1.0);
        clock.set_speed(10.0);
        assert_eq!(clock.advance(0.5).simulation_time, 5.0);
        clock.set_speed(0.0);
        assert_eq!(clock.advance(0.5).simulation_time, 5.0);
    }

    #[test]
    fn first_measurement_is_zero_and_capped_afterwards() {
        let mut clock = FrameClock::new(1.0).with_max_delta(0.0);
        assert_eq!(clock.measure(), 0.0);
        std::thread::sleep(std::time::Duration::from_millis(2));
        assert_eq!(clock.measure(), 0.0);
        clock.rebase();
        assert_eq!(clock.measure(), 0.0);
    }
}
