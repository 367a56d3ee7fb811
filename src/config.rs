// src/config.rs
//! Startup configuration, read from the JSON file named by `HEARTH_CONFIG`.
//!
//! Every field is optional in the file; missing ones take the defaults below. Values are
//! validated once on load, so the rest of the app can trust them.

use std::path::{Path, PathBuf};

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::context::Context;
use crate::error::Result;
use crate::params::SceneParams;
use crate::time::DEFAULT_MAX_DELTA;

pub const CONFIG_ENV: &str = "HEARTH_CONFIG";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HearthConfig {
    /// Directory asset paths are resolved against.
    pub asset_root: PathBuf,
    pub model_path: String,
    pub noise_path: String,
    pub title: String,
    pub window_size: (u32, u32),
    pub params: SceneParams,
    /// Cap on a measured frame delta, seconds.
    pub max_delta: f32,
}

impl Default for HearthConfig {
    fn default() -> Self {
        Self {
            asset_root: PathBuf::from("assets"),
            model_path: "models/fireplace.glb".into(),
            noise_path: "textures/noise.jpg".into(),
            title: "Hearth".into(),
            window_size: (1280, 720),
            params: SceneParams::default(),
            max_delta: DEFAULT_MAX_DELTA,
        }
    }
}

impl HearthConfig {
    /// Parse and validate JSON text.
    pub fn from_json(text: &str) -> Result<Self> {
        let config: HearthConfig = serde_json::from_str(text)?;
        Ok(config.validated())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config `{}`", path.display()))?;
        Self::from_json(&text).with_context(|| format!("parsing config `{}`", path.display()))
    }

    /// `HEARTH_CONFIG` when set, defaults otherwise.
    pub fn from_env() -> Result<Self> {
        match std::env::var_os(CONFIG_ENV) {
            Some(path) => {
                info!("loading config from {}", Path::new(&path).display());
                Self::load(path)
            }
            None => Ok(Self::default()),
        }
    }

    /// Panel ranges, a non-zero window, and a usable delta cap.
    pub fn validated(mut self) -> Self {
        let clamped = self.params.clamped();
        if clamped != self.params {
            warn!("config: scene parameters clamped into panel ranges");
        }
        self.params = clamped;
        self.window_size = (self.window_size.0.max(1), self.window_size.1.max(1));
        if !(self.max_delta.is_finite() && self.max_delta > 0.0) {
            warn!("config: invalid max_delta {}, using {}", self.max_delta, DEFAULT_MAX_DELTA);
            self.max_delta = DEFAULT_MAX_DELTA;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_object_gives_defaults() {
        let config = HearthConfig::from_json("{}").unwrap();
        assert_eq!(config, HearthConfig::default());
        assert_eq!(config.params.bloom_strength, 0.25);
    }

    #[test]
    fn partial_params_are_merged_and_clamped() {
        let config = HearthConfig::from_json(
            r#"{ "title": "Den", "params": { "speed": 7.5, "fire": { "grayscale": true } }, "max_delta": -1 }"#,
        )
        .unwrap();
        assert_eq!(config.title, "Den");
        assert_eq!(config.params.speed, 3.0);
        assert!(config.params.fire.grayscale);
        assert_eq!(config.params.fire.opacity, 1.0);
        assert_eq!(config.max_delta, DEFAULT_MAX_DELTA);
    }

    #[test]
    fn malformed_json_is_a_config_error() {
        let err = HearthConfig::from_json("{ not json").unwrap_err();
        assert!(matches!(err, crate::Error::Config(_)));
    }

    #[test]
    fn missing_file_names_the_path() {
        let err = HearthConfig::load("definitely/not/here.json").unwrap_err();
        assert!(err.to_string().contains("definitely/not/here.json"));
    }
}
