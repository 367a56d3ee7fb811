// src/gpu/backend.rs
// wgpu implementation of `RenderBackend`.
//
// Frame layout:
//   scene pass  -> HDR target (+ depth), opaque materials first, then blended volumes
//   bloom       -> half-res mip chain, composite
//   output pass -> HDR + bloom, linear tone mapping, sRGB surface

use std::borrow::Cow;
use std::collections::HashMap;

use bytemuck::{Pod, Zeroable};
use glam::Mat4;
use log::{debug, error, info, warn};
use wgpu::util::DeviceExt;

use super::bloom::{fullscreen_pipeline, run_pass, sampler_entry, texture_entry, uniform_entry, BloomPass};
use super::context::GpuContext;
use super::mesh::{vertex_layout, GpuMesh};
use super::texture::{linear_clamp_sampler, GpuTexture, RenderTarget, DEPTH_FORMAT, HDR_FORMAT};
use crate::assets::TextureStore;
use crate::camera::CameraUniform;
use crate::error::{Error, Result};
use crate::geometry::MeshData;
use crate::materials::{BlendMode, MaterialId, RenderState, ShaderMaterial, ShaderStage, Side};
use crate::post_processing::{OutputUniforms, PostChain};
use crate::renderer::{FrameView, RenderBackend, Viewport};
use crate::scene::{MeshId, NodeId};

const OUTPUT_WGSL: &str = include_str!("../shaders/output.wgsl");

const CLEAR_COLOR: wgpu::Color = wgpu::Color { r: 0.0, g: 0.0, b: 0.0, a: 1.0 };

/// World and normal matrix, group 1 of the scene shaders.
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
struct ModelUniform {
    world: [[f32; 4]; 4],
    normal: [[f32; 4]; 4],
}

impl ModelUniform {
    fn new(world: Mat4) -> Self {
        Self {
            world: world.to_cols_array_2d(),
            normal: world.inverse().transpose().to_cols_array_2d(),
        }
    }
}

struct MaterialBinding {
    buffer: wgpu::Buffer,
    group: wgpu::BindGroup,
    uploaded_revision: Option<u64>,
}

struct ModelBinding {
    buffer: wgpu::Buffer,
    group: wgpu::BindGroup,
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
struct PipelineKey {
    program: &'static str,
    state: RenderState,
}

fn blend_state(mode: BlendMode) -> Option<wgpu::BlendState> {
    let keep_alpha = wgpu::BlendComponent {
        src_factor: wgpu::BlendFactor::Zero,
        dst_factor: wgpu::BlendFactor::One,
        operation: wgpu::BlendOperation::Add,
    };
    match mode {
        BlendMode::Opaque => None,
        BlendMode::Additive => Some(wgpu::BlendState {
            color: wgpu::BlendComponent {
                src_factor: wgpu::BlendFactor::SrcAlpha,
                dst_factor: wgpu::BlendFactor::One,
                operation: wgpu::BlendOperation::Add,
            },
            alpha: keep_alpha,
        }),
        BlendMode::Multiply => Some(wgpu::BlendState {
            color: wgpu::BlendComponent {
                src_factor: wgpu::BlendFactor::Zero,
                dst_factor: wgpu::BlendFactor::Src,
                operation: wgpu::BlendOperation::Add,
            },
            alpha: keep_alpha,
        }),
    }
}

pub struct WgpuBackend {
    ctx: GpuContext,

    camera_buffer: wgpu::Buffer,
    camera_group: wgpu::BindGroup,
    model_layout: wgpu::BindGroupLayout,
    material_layout: wgpu::BindGroupLayout,
    scene_layout: wgpu::PipelineLayout,

    modules: HashMap<&'static str, wgpu::ShaderModule>,
    pipelines: HashMap<PipelineKey, wgpu::RenderPipeline>,

    meshes: HashMap<MeshId, GpuMesh>,
    textures: Vec<GpuTexture>,
    materials: HashMap<MaterialId, MaterialBinding>,
    models: HashMap<NodeId, ModelBinding>,

    hdr: RenderTarget,
    depth: RenderTarget,
    bloom: BloomPass,

    output_layout: wgpu::BindGroupLayout,
    output_pipeline: wgpu::RenderPipeline,
    output_buffer: wgpu::Buffer,
    output_group: wgpu::BindGroup,
    post_sampler: wgpu::Sampler,
}

impl WgpuBackend {
    /// Upload every texture and mesh once; they never change afterwards. Render targets start
    /// at `chain`'s buffer size until the first resize.
    pub fn new<'a>(
        ctx: GpuContext,
        textures: &TextureStore,
        meshes: impl IntoIterator<Item = (MeshId, &'a MeshData)>,
        chain: &PostChain,
    ) -> Result<Self> {
        let device = &ctx.device;

        let camera_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("camera_layout"),
            entries: &[uniform_entry(0, wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT)],
        });
        let model_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("model_layout"),
            entries: &[uniform_entry(0, wgpu::ShaderStages::VERTEX)],
        });
        let material_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("material_layout"),
            entries: &[
                uniform_entry(0, wgpu::ShaderStages::FRAGMENT),
                texture_entry(1),
                sampler_entry(2),
            ],
        });
        let scene_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("scene_layout"),
            bind_group_layouts: &[&camera_layout, &model_layout, &material_layout],
            push_constant_ranges: &[],
        });

        let camera_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("camera_buffer"),
            contents: bytemuck::bytes_of(&CameraUniform::default()),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let camera_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("camera_group"),
            layout: &camera_layout,
            entries: &[wgpu::BindGroupEntry { binding: 0, resource: camera_buffer.as_entire_binding() }],
        });

        let gpu_textures: Vec<GpuTexture> = textures
            .iter()
            .map(|(_, data)| GpuTexture::upload(device, &ctx.queue, data))
            .collect();
        let gpu_meshes: HashMap<MeshId, GpuMesh> = meshes
            .into_iter()
            .filter_map(|(id, mesh)| GpuMesh::upload(device, mesh, &format!("mesh{}", id.0)).map(|m| (id, m)))
            .collect();
        info!("uploaded {} textures, {} meshes", gpu_textures.len(), gpu_meshes.len());

        let size = chain.buffer_size();
        let hdr = RenderTarget::new(device, size, HDR_FORMAT, "hdr_target");
        let depth = RenderTarget::new(device, size, DEPTH_FORMAT, "depth_target");
        let mut bloom = BloomPass::new(device);
        bloom.resize(device, &hdr, &chain.bloom_mip_sizes());

        let output_module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("output"),
            source: wgpu::ShaderSource::Wgsl(Cow::Borrowed(OUTPUT_WGSL)),
        });
        let output_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("output_layout"),
            entries: &[
                uniform_entry(0, wgpu::ShaderStages::FRAGMENT),
                texture_entry(1),
                texture_entry(2),
                sampler_entry(3),
            ],
        });
        let output_pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("output_pipeline_layout"),
            bind_group_layouts: &[&output_layout],
            push_constant_ranges: &[],
        });
        let output_pipeline = fullscreen_pipeline(
            device,
            "output",
            &output_pipeline_layout,
            &output_module,
            "fs_main",
            ctx.config.format,
        );
        let output_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("output_uniforms"),
            contents: bytemuck::bytes_of(&OutputUniforms::new(Default::default())),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let post_sampler = linear_clamp_sampler(device, "post_sampler");
        let output_group = create_output_group(device, &output_layout, &output_buffer, &hdr, &bloom, &post_sampler)?;

        Ok(Self {
            camera_buffer,
            camera_group,
            model_layout,
            material_layout,
            scene_layout,
            modules: HashMap::new(),
            pipelines: HashMap::new(),
            meshes: gpu_meshes,
            textures: gpu_textures,
            materials: HashMap::new(),
            models: HashMap::new(),
            hdr,
            depth,
            bloom,
            output_layout,
            output_pipeline,
            output_buffer,
            output_group,
            post_sampler,
            ctx,
        })
    }

    pub fn context(&self) -> &GpuContext {
        &self.ctx
    }

    // ============================================================================
    // Lazy GPU state
    // ============================================================================

    fn module(&mut self, stage: &ShaderStage) -> &wgpu::ShaderModule {
        let device = &self.ctx.device;
        self.modules.entry(stage.label).or_insert_with(|| {
            debug!("compiling shader `{}`", stage.label);
            device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(stage.label),
                source: wgpu::ShaderSource::Wgsl(Cow::Borrowed(stage.source)),
            })
        })
    }

    fn ensure_pipeline(&mut self, material: &ShaderMaterial) -> PipelineKey {
        let program = material.program();
        let key = PipelineKey { program: program.name, state: material.state() };
        if self.pipelines.contains_key(&key) {
            return key;
        }

        self.module(&program.vertex);
        self.module(&program.fragment);
        let (Some(vs), Some(fs)) = (self.modules.get(program.vertex.label), self.modules.get(program.fragment.label)) else {
            return key;
        };

        let state = key.state;
        let pipeline = self.ctx.device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(&format!("pipeline:{}", program.name)),
            layout: Some(&self.scene_layout),
            vertex: wgpu::VertexState {
                module: vs,
                entry_point: program.vertex.entry,
                buffers: &[vertex_layout()],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: fs,
                entry_point: program.fragment.entry,
                targets: &[Some(wgpu::ColorTargetState {
                    format: HDR_FORMAT,
                    blend: blend_state(state.blend),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: match state.side {
                    Side::Front => Some(wgpu::Face::Back),
                    Side::Double => None,
                },
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: DEPTH_FORMAT,
                depth_write_enabled: state.depth_write,
                depth_compare: wgpu::CompareFunction::LessEqual,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });
        debug!("pipeline `{}` {:?}", program.name, state);
        self.pipelines.insert(key, pipeline);
        key
    }

    /// Create the material's bind group on first use; re-upload its uniforms when the
    /// revision moved.
    fn sync_material(&mut self, id: MaterialId, material: &ShaderMaterial) -> Result<()> {
        if !self.materials.contains_key(&id) {
            let handle = material.texture()?;
            let texture = self
                .textures
                .get(handle.0 as usize)
                .ok_or_else(|| Error::custom(format!("material {:?} samples unknown texture {:?}", id, handle)))?;
            let bytes = material.gpu_uniforms()?;
            let buffer = self.ctx.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(&format!("material{}_uniforms", id.0)),
                contents: bytes.as_bytes(),
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            });
            let group = self.ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some(&format!("material{}_group", id.0)),
                layout: &self.material_layout,
                entries: &[
                    wgpu::BindGroupEntry { binding: 0, resource: buffer.as_entire_binding() },
                    wgpu::BindGroupEntry { binding: 1, resource: wgpu::BindingResource::TextureView(&texture.view) },
                    wgpu::BindGroupEntry { binding: 2, resource: wgpu::BindingResource::Sampler(&texture.sampler) },
                ],
            });
            self.materials.insert(
                id,
                MaterialBinding { buffer, group, uploaded_revision: Some(material.revision()) },
            );
            return Ok(());
        }

        if let Some(binding) = self.materials.get_mut(&id) {
            if binding.uploaded_revision != Some(material.revision()) {
                let bytes = material.gpu_uniforms()?;
                self.ctx.queue.write_buffer(&binding.buffer, 0, bytes.as_bytes());
                binding.uploaded_revision = Some(material.revision());
            }
        }
        Ok(())
    }

    fn sync_model(&mut self, node: NodeId, world: Mat4) {
        let uniform = ModelUniform::new(world);
        match self.models.get(&node) {
            Some(binding) => self.ctx.queue.write_buffer(&binding.buffer, 0, bytemuck::bytes_of(&uniform)),
            None => {
                let buffer = self.ctx.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some(&format!("node{}_model", node.0)),
                    contents: bytemuck::bytes_of(&uniform),
                    usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                });
                let group = self.ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
                    label: Some(&format!("node{}_group", node.0)),
                    layout: &self.model_layout,
                    entries: &[wgpu::BindGroupEntry { binding: 0, resource: buffer.as_entire_binding() }],
                });
                self.models.insert(node, ModelBinding { buffer, group });
            }
        }
    }

    fn acquire_frame(&self) -> Option<wgpu::SurfaceTexture> {
        match self.ctx.surface.get_current_texture() {
            Ok(frame) => Some(frame),
            Err(err) => {
                warn!("failed to acquire surface texture: {:?}, reconfiguring", err);
                self.ctx.reconfigure();
                match self.ctx.surface.get_current_texture() {
                    Ok(frame) => Some(frame),
                    Err(e) => {
                        error!("failed to acquire surface texture after reconfigure: {:?}", e);
                        None
                    }
                }
            }
        }
    }
}

fn create_output_group(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    buffer: &wgpu::Buffer,
    hdr: &RenderTarget,
    bloom: &BloomPass,
    sampler: &wgpu::Sampler,
) -> Result<wgpu::BindGroup> {
    let bloom_view = &bloom
        .output()
        .ok_or_else(|| Error::custom("bloom targets not allocated"))?
        .view;
    Ok(device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("output_group"),
        layout,
        entries: &[
            wgpu::BindGroupEntry { binding: 0, resource: buffer.as_entire_binding() },
            wgpu::BindGroupEntry { binding: 1, resource: wgpu::BindingResource::TextureView(&hdr.view) },
            wgpu::BindGroupEntry { binding: 2, resource: wgpu::BindingResource::TextureView(bloom_view) },
            wgpu::BindGroupEntry { binding: 3, resource: wgpu::BindingResource::Sampler(sampler) },
        ],
    }))
}

impl RenderBackend for WgpuBackend {
    fn resize(&mut self, viewport: Viewport, chain: &PostChain) -> Result<()> {
        let (width, height) = viewport.physical_size();
        self.ctx.resize(width, height);

        let size = chain.buffer_size();
        let device = &self.ctx.device;
        self.hdr = RenderTarget::new(device, size, HDR_FORMAT, "hdr_target");
        self.depth = RenderTarget::new(device, size, DEPTH_FORMAT, "depth_target");
        self.bloom.resize(device, &self.hdr, &chain.bloom_mip_sizes());
        self.output_group = create_output_group(
            device,
            &self.output_layout,
            &self.output_buffer,
            &self.hdr,
            &self.bloom,
            &self.post_sampler,
        )?;
        debug!("backend targets resized to {}x{}", size.0, size.1);
        Ok(())
    }

    fn render(&mut self, frame: &FrameView<'_>) -> Result<()> {
        self.ctx
            .queue
            .write_buffer(&self.camera_buffer, 0, bytemuck::bytes_of(&CameraUniform::from_camera(frame.camera)));

        // opaque first, blended volumes after
        let mut draws: Vec<_> = frame.scene.graph.drawables().collect();
        let mut blended = Vec::new();
        draws.retain(|d| {
            let is_blended = frame
                .materials
                .get(d.material)
                .map(|m| m.state().blend != BlendMode::Opaque)
                .unwrap_or(false);
            if is_blended {
                blended.push(*d);
            }
            !is_blended
        });
        draws.extend(blended);

        let mut batches = Vec::with_capacity(draws.len());
        for draw in &draws {
            let material = frame.materials.get(draw.material)?;
            self.sync_material(draw.material, material)?;
            self.sync_model(draw.node, draw.world);
            let key = self.ensure_pipeline(material);
            batches.push((key, *draw));
        }

        let exposure = OutputUniforms::new(frame.chain.tone_mapping());
        self.ctx.queue.write_buffer(&self.output_buffer, 0, bytemuck::bytes_of(&exposure));

        let Some(surface_frame) = self.acquire_frame() else {
            return Ok(());
        };
        let surface_view = surface_frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = self.ctx.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("frame_encoder"),
        });

        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("scene_pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &self.hdr.view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(CLEAR_COLOR),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth.view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                occlusion_query_set: None,
                timestamp_writes: None,
            });
            pass.set_bind_group(0, &self.camera_group, &[]);

            for (key, draw) in &batches {
                let (Some(pipeline), Some(mesh), Some(material), Some(model)) = (
                    self.pipelines.get(key),
                    self.meshes.get(&draw.mesh),
                    self.materials.get(&draw.material),
                    self.models.get(&draw.node),
                ) else {
                    continue;
                };
                pass.set_pipeline(pipeline);
                pass.set_bind_group(1, &model.group, &[]);
                pass.set_bind_group(2, &material.group, &[]);
                pass.set_vertex_buffer(0, mesh.vertex_buffer.slice(..));
                pass.set_index_buffer(mesh.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
                pass.draw_indexed(0..mesh.index_count, 0, 0..1);
            }
        }

        if let Some(settings) = frame.chain.bloom() {
            self.bloom.encode(&self.ctx.queue, &mut encoder, settings);
        }

        run_pass(&mut encoder, "output_pass", &self.output_pipeline, &surface_view, &[&self.output_group]);

        self.ctx.queue.submit(Some(encoder.finish()));
        surface_frame.present();
        Ok(())
    }
}
