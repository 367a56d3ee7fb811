// src/error.rs
//! Error handling for the whole crate.
//!
//! Two families matter at runtime:
//! - **setup errors** (`FatalSetup`, `Resource`, `Gpu`, `Config`) abort initialization before the
//!   animation loop ever starts, so no partial scene is shown;
//! - **per-frame errors** do not exist in practice: a tick only does arithmetic and uniform
//!   writes. `ViewportMismatch` guards the render path and is unreachable through the public API.

use std::fmt;
use thiserror::Error;

use crate::materials::MaterialError;

/// Main error type.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// A required named object or asset is missing; the scene cannot be built.
    #[error("fatal setup error: {0}")]
    FatalSetup(String),

    /// An asset could not be fetched or decoded. The core never retries.
    #[error("failed to load resource `{path}`: {message}")]
    Resource { path: String, message: String },

    /// Uniform access on a material that does not expose it.
    #[error(transparent)]
    Material(#[from] MaterialError),

    /// Camera aspect or post-processing buffers disagree with the viewport.
    #[error(
        "viewport mismatch: camera aspect {camera_aspect} vs viewport aspect {viewport_aspect}, \
         post buffers {buffer_size:?} vs surface {surface_size:?}"
    )]
    ViewportMismatch {
        camera_aspect: f32,
        viewport_aspect: f32,
        buffer_size: (u32, u32),
        surface_size: (u32, u32),
    },

    /// Adapter, device or surface creation failed.
    #[error("GPU error: {0}")]
    Gpu(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config error: {0}")]
    Config(#[from] serde_json::Error),

    /// Simple custom message.
    #[error("{0}")]
    Custom(String),

    /// Context chaining, see [`crate::context::Context`].
    #[error("{message}: {source}")]
    WithContext {
        message: String,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    #[inline]
    pub fn custom<S: Into<String>>(msg: S) -> Self {
        Self::Custom(msg.into())
    }

    #[inline]
    pub fn fatal_setup<S: Into<String>>(msg: S) -> Self {
        Self::FatalSetup(msg.into())
    }

    #[inline]
    pub fn resource(path: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Resource {
            path: path.into(),
            message: message.to_string(),
        }
    }

    /// Wrap `self` with a context message.
    #[inline]
    pub fn context<C: Into<String>>(self, context: C) -> Self {
        Self::WithContext {
            message: context.into(),
            source: Box::new(self),
        }
    }

    /// The innermost error, skipping context layers.
    pub fn root(&self) -> &Error {
        match self {
            Error::WithContext { source, .. } => source.root(),
            other => other,
        }
    }

    #[inline]
    pub fn is_fatal_setup(&self) -> bool {
        matches!(self.root(), Error::FatalSetup(_))
    }

    #[inline]
    pub fn is_resource(&self) -> bool {
        matches!(self.root(), Error::Resource { .. })
    }
}

/// Crate-wide `Result` alias.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_layers_keep_the_root_kind() {
        let err = Error::fatal_setup("object `floor` not found")
            .context("assembling scene")
            .context("initializing app");

        assert!(err.is_fatal_setup());
        assert!(!err.is_resource());
        assert_eq!(
            err.to_string(),
            "initializing app: assembling scene: fatal setup error: object `floor` not found"
        );
    }

    #[test]
    fn resource_error_names_the_path() {
        let err = Error::resource("assets/noise.jpg", "unexpected EOF");
        assert!(err.is_resource());
        assert!(err.to_string().contains("assets/noise.jpg"));
    }
}
