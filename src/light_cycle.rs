// src/light_cycle.rs
//! Ambient light colour cycling.
//!
//! The fire "lights" the room by tinting the baked lightmaps. The tint is a closed-form
//! function of simulation time: two sinusoids per channel (the second one four times faster)
//! folded through `abs`, so the colour drifts organically, never goes negative and can be
//! reproduced for any `t` without per-frame randomness.

use std::f32::consts::{FRAC_PI_2, PI};

/// Peak amplitude of a raw channel before the per-surface rescale.
const CHANNEL_SCALE: f32 = 0.2;

/// One frame's light colour. Transient: recomputed every tick, never stored.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightColorSample {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl LightColorSample {
    #[inline]
    pub fn to_array(self) -> [f32; 3] {
        [self.r, self.g, self.b]
    }
}

/// Sample the light colour at simulation time `t`.
#[inline]
pub fn light_cycle(t: f32) -> LightColorSample {
    let r = (t.sin() + (t * 4.0 + 0.1).cos() * 0.5).abs() * CHANNEL_SCALE;
    let g = ((t + FRAC_PI_2).sin() + (t * 4.0 + 1.4).cos() * 0.5).abs() * CHANNEL_SCALE;
    let b = (t + PI).sin().abs() * CHANNEL_SCALE;
    LightColorSample { r, g, b }
}

/// Linear rescale applied to a [`LightColorSample`] before it becomes tint ratios.
///
/// The blue channel never receives the floor offset.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TintScale {
    pub gain: f32,
    /// Added to red and green only.
    pub floor: f32,
}

impl TintScale {
    /// Floor surface: strong tint with a small ambient floor.
    pub const FLOOR: TintScale = TintScale { gain: 3.0, floor: 0.1 };
    /// Fireplace surface: half the gain, no ambient floor.
    pub const FIREPLACE: TintScale = TintScale { gain: 1.5, floor: 0.0 };

    /// Tint ratios `[r, g, b]` for `sample`.
    #[inline]
    pub fn apply(&self, sample: LightColorSample) -> [f32; 3] {
        [
            self.floor + sample.r * self.gain,
            self.floor + sample.g * self.gain,
            sample.b * self.gain,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_samples_are_bit_identical() {
        for &t in &[0.0_f32, 0.016, 1.0, 3.7, 1234.5] {
            let a = light_cycle(t);
            let b = light_cycle(t);
            assert_eq!(a.r.to_bits(), b.r.to_bits());
            assert_eq!(a.g.to_bits(), b.g.to_bits());
            assert_eq!(a.b.to_bits(), b.b.to_bits());
        }
    }

    #[test]
    fn start_of_time_is_non_negative() {
        let s = light_cycle(0.0);
        assert!(s.r >= 0.0 && s.g >= 0.0 && s.b >= 0.0);
        // sin(0) + 0.5 cos(0.1)
        assert!((s.r - (0.5 * 0.1_f32.cos()) * 0.2).abs() < 1e-6);
        // sin(pi/2) + 0.5 cos(1.4)
        assert!((s.g - (1.0 + 0.5 * 1.4_f32.cos()) * 0.2).abs() < 1e-6);
        assert!(s.b.abs() < 1e-6);
    }

    #[test]
    fn channels_stay_in_band_over_a_long_run() {
        let mut t = 0.0_f32;
        while t < 200.0 {
            let s = light_cycle(t);
            for c in s.to_array() {
                assert!((0.0..=0.3 + 1e-6).contains(&c), "channel {c} out of band at t={t}");
            }
            t += 0.05;
        }
    }

    #[test]
    fn floor_scale_skips_blue_offset() {
        let sample = LightColorSample { r: 0.1, g: 0.2, b: 0.05 };
        let [r, g, b] = TintScale::FLOOR.apply(sample);
        assert!((r - 0.4).abs() < 1e-6);
        assert!((g - 0.7).abs() < 1e-6);
        assert!((b - 0.15).abs() < 1e-6);

        let [r, g, b] = TintScale::FIREPLACE.apply(sample);
        assert!((r - 0.15).abs() < 1e-6);
        assert!((g - 0.3).abs() < 1e-6);
        assert!((b - 0.075).abs() < 1e-6);
    }
}
