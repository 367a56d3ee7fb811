// src/params.rs
//! Live-tweakable scene parameters and the panel that exposes them.
//!
//! The panel is an external actor: it only mutates [`SceneParams`] between ticks, and the
//! animation loop reads the whole struct once per tick.

use serde::{Deserialize, Serialize};

/// Below this viewport width the panel collapses.
pub const PANEL_COLLAPSE_WIDTH: u32 = 600;

pub const SPEED_RANGE: (f32, f32) = (0.1, 3.0);
pub const OPACITY_RANGE: (f32, f32) = (0.0, 1.0);
pub const INTENSITY_RANGE: (f32, f32) = (0.5, 1.5);
pub const STYLIZE_RANGE: (f32, f32) = (0.0, 1.0);
pub const DETAILS_RANGE: (f32, f32) = (0.0, 2.0);
pub const BLOOM_STRENGTH_RANGE: (f32, f32) = (0.0, 2.0);

/// Uniforms of the fire material that the panel drives.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FireParams {
    pub opacity: f32,
    pub intensity: f32,
    pub stylize_ratio: f32,
    pub stylize_threshold: f32,
    pub details: f32,
    pub grayscale: bool,
}

impl Default for FireParams {
    fn default() -> Self {
        Self {
            opacity: 1.0,
            intensity: 1.0,
            stylize_ratio: 0.5,
            stylize_threshold: 0.5,
            details: 0.5,
            grayscale: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneParams {
    pub speed: f32,
    pub fire: FireParams,
    pub bloom_strength: f32,
}

impl Default for SceneParams {
    fn default() -> Self {
        Self {
            speed: 1.0,
            fire: FireParams::default(),
            bloom_strength: 0.25,
        }
    }
}

fn clamp(value: f32, (lo, hi): (f32, f32)) -> f32 {
    if value.is_nan() {
        lo
    } else {
        value.clamp(lo, hi)
    }
}

impl SceneParams {
    /// Copy with every field pulled into its panel range.
    pub fn clamped(&self) -> Self {
        Self {
            speed: clamp(self.speed, SPEED_RANGE),
            fire: FireParams {
                opacity: clamp(self.fire.opacity, OPACITY_RANGE),
                intensity: clamp(self.fire.intensity, INTENSITY_RANGE),
                stylize_ratio: clamp(self.fire.stylize_ratio, STYLIZE_RANGE),
                stylize_threshold: clamp(self.fire.stylize_threshold, STYLIZE_RANGE),
                details: clamp(self.fire.details, DETAILS_RANGE),
                grayscale: self.fire.grayscale,
            },
            bloom_strength: clamp(self.bloom_strength, BLOOM_STRENGTH_RANGE),
        }
    }
}

/// A single panel control.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    Speed,
    Opacity,
    Intensity,
    Details,
    StylizeRatio,
    StylizeThreshold,
    Grayscale,
    Bloom,
}

impl Control {
    pub fn label(&self) -> &'static str {
        match self {
            Control::Speed => "Speed",
            Control::Opacity => "Opacity",
            Control::Intensity => "Intensity",
            Control::Details => "Details",
            Control::StylizeRatio => "Stylize Ratio",
            Control::StylizeThreshold => "Stylize Threshold",
            Control::Grayscale => "Grayscale",
            Control::Bloom => "Bloom",
        }
    }

    fn step(&self) -> f32 {
        match self {
            Control::Speed | Control::Details => 0.1,
            Control::Grayscale => 0.0,
            _ => 0.05,
        }
    }
}

/// Panel state: whether it is shown, and the slider edits it applies to [`SceneParams`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParameterPanel {
    open: bool,
}

impl Default for ParameterPanel {
    fn default() -> Self {
        Self { open: true }
    }
}

impl ParameterPanel {
    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Collapse below [`PANEL_COLLAPSE_WIDTH`], re-open at or above it.
    /// Returns `true` when the state changed.
    pub fn on_resize(&mut self, width: u32) -> bool {
        let open = width >= PANEL_COLLAPSE_WIDTH;
        let changed = open != self.open;
        self.open = open;
        changed
    }

    /// Nudge one control by `steps` slider steps (negative to decrease). Booleans toggle.
    /// Results stay inside the control's range.
    pub fn nudge(&self, params: &mut SceneParams, control: Control, steps: i32) {
        let delta = control.step() * steps as f32;
        match control {
            Control::Speed => params.speed = clamp(params.speed + delta, SPEED_RANGE),
            Control::Opacity => params.fire.opacity = clamp(params.fire.opacity + delta, OPACITY_RANGE),
            Control::Intensity => {
                params.fire.intensity = clamp(params.fire.intensity + delta, INTENSITY_RANGE)
            }
            Control::Details => params.fire.details = clamp(params.fire.details + delta, DETAILS_RANGE),
            Control::StylizeRatio => {
                params.fire.stylize_ratio = clamp(params.fire.stylize_ratio + delta, STYLIZE_RANGE)
            }
            Control::StylizeThreshold => {
                params.fire.stylize_threshold =
                    clamp(params.fire.stylize_threshold + delta, STYLIZE_RANGE)
            }
            Control::Grayscale => params.fire.grayscale = !params.fire.grayscale,
            Control::Bloom => {
                params.bloom_strength = clamp(params.bloom_strength + delta, BLOOM_STRENGTH_RANGE)
            }
        }
    }

    /// One-line readout of every control, empty when collapsed.
    pub fn summary(&self, params: &SceneParams) -> String {
        if !self.open {
            return String::new();
        }
        format!(
            "{} {:.2} | {} {:.2} | {} {:.2} | {} {:.2} | {} {:.2} | {} {:.2} | {} {} | {} {:.2}",
            Control::Speed.label(),
            params.speed,
            Control::Opacity.label(),
            params.fire.opacity,
            Control::Intensity.label(),
            params.fire.intensity,
            Control::Details.label(),
            params.fire.details,
            Control::StylizeRatio.label(),
            params.fire.stylize_ratio,
            Control::StylizeThreshold.label(),
            params.fire.stylize_threshold,
            Control::Grayscale.label(),
            if params.fire.grayscale { "on" } else { "off" },
            Control::Bloom.label(),
            params.bloom_strength,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn panel_collapses_on_narrow_viewports() {
        let mut panel = ParameterPanel::default();
        assert!(panel.is_open());
        assert!(panel.on_resize(599));
        assert!(!panel.is_open());
        assert!(panel.summary(&SceneParams::default()).is_empty());
        assert!(!panel.on_resize(400));
        assert!(panel.on_resize(600));
        assert!(panel.is_open());
    }

    #[test]
    fn nudges_stay_in_range() {
        let panel = ParameterPanel::default();
        let mut params = SceneParams::default();
        panel.nudge(&mut params, Control::Speed, 100);
        assert_eq!(params.speed, 3.0);
        panel.nudge(&mut params, Control::Speed, -100);
        assert_eq!(params.speed, 0.1);
        panel.nudge(&mut params, Control::Intensity, -20);
        assert_eq!(params.fire.intensity, 0.5);
        panel.nudge(&mut params, Control::Grayscale, 1);
        assert!(params.fire.grayscale);
        panel.nudge(&mut params, Control::Bloom, 2);
        assert!((params.bloom_strength - 0.35).abs() < 1e-6);
    }

    #[test]
    fn clamped_pulls_values_into_range() {
        let params = SceneParams {
            speed: 9.0,
            fire: FireParams { opacity: -1.0, details: f32::NAN, ..FireParams::default() },
            bloom_strength: 5.0,
        };
        let c = params.clamped();
        assert_eq!(c.speed, 3.0);
        assert_eq!(c.fire.opacity, 0.0);
        assert_eq!(c.fire.details, 0.0);
        assert_eq!(c.bloom_strength, 2.0);
    }

    #[test]
    fn summary_lists_every_control() {
        let text = ParameterPanel::default().summary(&SceneParams::default());
        for label in ["Speed 1.00", "Opacity 1.00", "Grayscale off", "Bloom 0.25"] {
            assert!(text.contains(label), "missing `{label}` in `{text}`");
        }
    }
}
