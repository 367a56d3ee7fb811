// src/assets.rs
//! Asset loading: the glTF scene model and the fire noise texture.
//!
//! Loading goes through [`AssetProvider`] so the scene can be assembled from in-memory data in
//! tests. A failed load is a setup error; the loader never retries.

use std::path::{Path, PathBuf};

use glam::Mat4;
use log::{debug, info, warn};

use crate::error::{Error, Result};
use crate::geometry::{MeshData, Vertex};
use crate::materials::TextureHandle;
use crate::scene::Transform;

/// Sampler address mode requested by a texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum WrapMode {
    #[default]
    ClampToEdge,
    Repeat,
}

/// Decoded RGBA8 image.
#[derive(Debug, Clone, PartialEq)]
pub struct TextureData {
    pub label: String,
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
    pub wrap: WrapMode,
    /// Colour data (sRGB encoded) rather than raw values such as noise.
    pub srgb: bool,
}

impl TextureData {
    /// 1×1 texture of a single colour.
    pub fn solid(label: impl Into<String>, rgba: [u8; 4], wrap: WrapMode) -> Self {
        Self { label: label.into(), width: 1, height: 1, rgba: rgba.to_vec(), wrap, srgb: false }
    }

    pub fn with_wrap(mut self, wrap: WrapMode) -> Self {
        self.wrap = wrap;
        self
    }

    #[inline]
    pub fn byte_len(&self) -> usize {
        self.width as usize * self.height as usize * 4
    }
}

/// One named object of the model, already flattened to world space.
#[derive(Debug, Clone)]
pub struct ModelObject {
    pub name: String,
    pub transform: Transform,
    pub mesh: MeshData,
    /// Base colour texture of the object's first material, if any.
    pub texture: Option<TextureData>,
}

#[derive(Debug, Clone, Default)]
pub struct ModelData {
    pub objects: Vec<ModelObject>,
}

impl ModelData {
    pub fn find(&self, name: &str) -> Option<&ModelObject> {
        self.objects.iter().find(|o| o.name == name)
    }

    /// Remove and return the first object called `name`.
    pub fn take_object(&mut self, name: &str) -> Option<ModelObject> {
        let index = self.objects.iter().position(|o| o.name == name)?;
        Some(self.objects.remove(index))
    }
}

/// CPU-side textures, addressed by the handles materials store.
#[derive(Debug, Default)]
pub struct TextureStore {
    textures: Vec<TextureData>,
}

impl TextureStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, texture: TextureData) -> TextureHandle {
        let handle = TextureHandle(self.textures.len() as u32);
        debug!("texture {:?}: `{}` {}x{}", handle, texture.label, texture.width, texture.height);
        self.textures.push(texture);
        handle
    }

    pub fn get(&self, handle: TextureHandle) -> Option<&TextureData> {
        self.textures.get(handle.0 as usize)
    }

    pub fn iter(&self) -> impl Iterator<Item = (TextureHandle, &TextureData)> {
        self.textures
            .iter()
            .enumerate()
            .map(|(i, t)| (TextureHandle(i as u32), t))
    }

    pub fn len(&self) -> usize {
        self.textures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.textures.is_empty()
    }
}

/// Source of the scene's assets.
#[allow(async_fn_in_trait)]
pub trait AssetProvider {
    async fn load_model(&self, path: &str) -> Result<ModelData>;
    async fn load_texture(&self, path: &str) -> Result<TextureData>;
}

/// Everything the scene needs before the loop can start.
#[derive(Debug, Clone)]
pub struct SceneAssets {
    pub model: ModelData,
    pub noise: TextureData,
}

/// Load the model, then the noise texture. The noise is sampled with repeat wrapping.
pub async fn load_scene_assets<P: AssetProvider>(
    provider: &P,
    model_path: &str,
    noise_path: &str,
) -> Result<SceneAssets> {
    let model = provider.load_model(model_path).await?;
    info!("model `{}` loaded: {} objects", model_path, model.objects.len());
    let noise = provider.load_texture(noise_path).await?.with_wrap(WrapMode::Repeat);
    info!("noise `{}` loaded: {}x{}", noise_path, noise.width, noise.height);
    Ok(SceneAssets { model, noise })
}

// ============================================================================
// Filesystem provider
// ============================================================================

/// Reads glTF / GLB models through `gltf::import` and images through `image::open`,
/// relative to `root`.
#[derive(Debug, Clone, Default)]
pub struct GltfAssetProvider {
    root: PathBuf,
}

impl GltfAssetProvider {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, path: &str) -> PathBuf {
        let p = Path::new(path);
        if p.is_absolute() {
            p.to_path_buf()
        } else {
            self.root.join(p)
        }
    }
}

impl AssetProvider for GltfAssetProvider {
    async fn load_model(&self, path: &str) -> Result<ModelData> {
        let full = self.resolve(path);
        let (document, buffers, images) =
            gltf::import(&full).map_err(|e| Error::resource(path, e))?;

        let mut objects = Vec::new();
        let scene = document
            .default_scene()
            .or_else(|| document.scenes().next())
            .ok_or_else(|| Error::resource(path, "model contains no scene"))?;
        for node in scene.nodes() {
            collect_node(&node, Mat4::IDENTITY, &buffers, &images, &mut objects)
                .map_err(|e| Error::resource(path, e))?;
        }
        Ok(ModelData { objects })
    }

    async fn load_texture(&self, path: &str) -> Result<TextureData> {
        let full = self.resolve(path);
        let img = image::open(&full).map_err(|e| Error::resource(path, e))?;
        let rgba = img.to_rgba8();
        let (width, height) = rgba.dimensions();
        Ok(TextureData {
            label: path.to_string(),
            width,
            height,
            rgba: rgba.into_raw(),
            wrap: WrapMode::ClampToEdge,
            srgb: false,
        })
    }
}

fn collect_node(
    node: &gltf::Node,
    parent: Mat4,
    buffers: &[gltf::buffer::Data],
    images: &[gltf::image::Data],
    out: &mut Vec<ModelObject>,
) -> std::result::Result<(), String> {
    let world = parent * Mat4::from_cols_array_2d(&node.transform().matrix());

    if let Some(mesh) = node.mesh() {
        let name = node
            .name()
            .or_else(|| mesh.name())
            .unwrap_or_default()
            .to_string();

        let mut data = MeshData::default();
        let mut texture = None;
        for prim in mesh.primitives() {
            append_primitive(&mut data, &prim, buffers)?;
            if texture.is_none() {
                texture = base_color_texture(&prim, images, &name);
            }
        }

        debug!(
            "object `{}`: {} vertices, local bounds {:?}",
            name,
            data.vertices.len(),
            data.bounds()
        );
        let (scale, rotation, translation) = world.to_scale_rotation_translation();
        out.push(ModelObject {
            name,
            transform: Transform { translation, rotation, scale },
            mesh: data,
            texture,
        });
    }

    for child in node.children() {
        collect_node(&child, world, buffers, images, out)?;
    }
    Ok(())
}

fn append_primitive(
    data: &mut MeshData,
    prim: &gltf::Primitive,
    buffers: &[gltf::buffer::Data],
) -> std::result::Result<(), String> {
    let reader = prim.reader(|buffer| buffers.get(buffer.index()).map(|b| &b.0[..]));

    let positions: Vec<[f32; 3]> = reader
        .read_positions()
        .ok_or_else(|| "primitive has no positions".to_string())?
        .collect();
    let normals: Vec<[f32; 3]> = reader.read_normals().map(|n| n.collect()).unwrap_or_default();
    let uvs: Vec<[f32; 2]> = reader
        .read_tex_coords(0)
        .map(|t| t.into_f32().collect())
        .unwrap_or_default();

    let base = data.vertices.len() as u32;
    data.vertices.extend(positions.iter().enumerate().map(|(i, &position)| Vertex {
        position,
        normal: normals.get(i).copied().unwrap_or([0.0, 1.0, 0.0]),
        uv: uvs.get(i).copied().unwrap_or([0.0, 0.0]),
    }));

    match reader.read_indices() {
        Some(iter) => data.indices.extend(iter.into_u32().map(|i| base + i)),
        None => data.indices.extend(base..base + positions.len() as u32),
    }
    Ok(())
}

fn base_color_texture(prim: &gltf::Primitive, images: &[gltf::image::Data], object: &str) -> Option<TextureData> {
    let info = prim.material().pbr_metallic_roughness().base_color_texture()?;
    let image = images.get(info.texture().source().index())?;
    match rgba8_pixels(image) {
        Some(rgba) => Some(TextureData {
            label: format!("{object}_map"),
            width: image.width,
            height: image.height,
            rgba,
            wrap: WrapMode::ClampToEdge,
            srgb: true,
        }),
        None => {
            warn!("`{object}`: unsupported texture format {:?}", image.format);
            None
        }
    }
}

/// Expand 8-bit glTF pixel data to RGBA8.
pub(crate) fn rgba8_pixels(image: &gltf::image::Data) -> Option<Vec<u8>> {
    use gltf::image::Format;

    let px = &image.pixels;
    let rgba = match image.format {
        Format::R8G8B8A8 => px.clone(),
        Format::R8G8B8 => px.chunks_exact(3).flat_map(|c| [c[0], c[1], c[2], 255]).collect(),
        Format::R8G8 => px.chunks_exact(2).flat_map(|c| [c[0], c[0], c[0], c[1]]).collect(),
        Format::R8 => px.iter().flat_map(|&l| [l, l, l, 255]).collect(),
        _ => return None,
    };
    Some(rgba)
}
