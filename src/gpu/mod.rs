// src/gpu/mod.rs
//! wgpu backend: device setup, uploads, the scene / bloom / output passes.

pub mod backend;
pub mod bloom;
pub mod context;
pub mod mesh;
pub mod texture;

pub use backend::WgpuBackend;
pub use context::GpuContext;
