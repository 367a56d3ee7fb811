// src/gpu/bloom.rs
// Bloom: bright-pass into the first mip, downsample through the chain, weighted composite.

use std::borrow::Cow;

use wgpu::util::DeviceExt;

use super::texture::{linear_clamp_sampler, RenderTarget, HDR_FORMAT};
use crate::post_processing::{BloomSettings, BloomUniforms};

const BLOOM_WGSL: &str = include_str!("../shaders/bloom.wgsl");
/// Composite reads exactly this many mips.
pub const COMPOSITE_MIPS: usize = 5;

pub(crate) fn texture_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Texture {
            sample_type: wgpu::TextureSampleType::Float { filterable: true },
            view_dimension: wgpu::TextureViewDimension::D2,
            multisampled: false,
        },
        count: None,
    }
}

pub(crate) fn uniform_entry(binding: u32, visibility: wgpu::ShaderStages) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

pub(crate) fn sampler_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
        count: None,
    }
}

/// Fullscreen-triangle pipeline with no vertex buffers.
pub(crate) fn fullscreen_pipeline(
    device: &wgpu::Device,
    label: &str,
    layout: &wgpu::PipelineLayout,
    module: &wgpu::ShaderModule,
    fs_entry: &str,
    format: wgpu::TextureFormat,
) -> wgpu::RenderPipeline {
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(label),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module,
            entry_point: "vs_main",
            buffers: &[],
            compilation_options: Default::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module,
            entry_point: fs_entry,
            targets: &[Some(wgpu::ColorTargetState {
                format,
                blend: None,
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: Default::default(),
        }),
        primitive: wgpu::PrimitiveState::default(),
        depth_stencil: None,
        multisample: wgpu::MultisampleState::default(),
        multiview: None,
        cache: None,
    })
}

/// One pass: reads `source`, writes `target`.
struct Stage {
    uniforms: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
    source_size: (u32, u32),
}

struct Targets {
    mips: Vec<RenderTarget>,
    composite: RenderTarget,
    prefilter: Stage,
    downsample: Vec<Stage>,
    composite_stage: Stage,
    mips_group: wgpu::BindGroup,
}

pub struct BloomPass {
    stage_layout: wgpu::BindGroupLayout,
    mips_layout: wgpu::BindGroupLayout,
    prefilter: wgpu::RenderPipeline,
    downsample: wgpu::RenderPipeline,
    composite: wgpu::RenderPipeline,
    sampler: wgpu::Sampler,
    targets: Option<Targets>,
}

impl BloomPass {
    pub fn new(device: &wgpu::Device) -> Self {
        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("bloom"),
            source: wgpu::ShaderSource::Wgsl(Cow::Borrowed(BLOOM_WGSL)),
        });

        let stage_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("bloom_stage_layout"),
            entries: &[
                uniform_entry(0, wgpu::ShaderStages::FRAGMENT),
                texture_entry(1),
                sampler_entry(2),
            ],
        });
        let mips_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("bloom_mips_layout"),
            entries: &(0..COMPOSITE_MIPS as u32).map(texture_entry).collect::<Vec<_>>(),
        });

        let single = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("bloom_single_layout"),
            bind_group_layouts: &[&stage_layout],
            push_constant_ranges: &[],
        });
        let with_mips = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("bloom_composite_layout"),
            bind_group_layouts: &[&stage_layout, &mips_layout],
            push_constant_ranges: &[],
        });

        Self {
            prefilter: fullscreen_pipeline(device, "bloom_prefilter", &single, &module, "fs_prefilter", HDR_FORMAT),
            downsample: fullscreen_pipeline(device, "bloom_downsample", &single, &module, "fs_downsample", HDR_FORMAT),
            composite: fullscreen_pipeline(device, "bloom_composite", &with_mips, &module, "fs_composite", HDR_FORMAT),
            sampler: linear_clamp_sampler(device, "bloom_sampler"),
            stage_layout,
            mips_layout,
            targets: None,
        }
    }

    fn stage(&self, device: &wgpu::Device, label: &str, source: &wgpu::TextureView, source_size: (u32, u32)) -> Stage {
        let uniforms = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(label),
            contents: bytemuck::bytes_of(&BloomUniforms::new(&BloomSettings::default(), source_size)),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(label),
            layout: &self.stage_layout,
            entries: &[
                wgpu::BindGroupEntry { binding: 0, resource: uniforms.as_entire_binding() },
                wgpu::BindGroupEntry { binding: 1, resource: wgpu::BindingResource::TextureView(source) },
                wgpu::BindGroupEntry { binding: 2, resource: wgpu::BindingResource::Sampler(&self.sampler) },
            ],
        });
        Stage { uniforms, bind_group, source_size }
    }

    /// Rebuild the mip chain for a new HDR source from the post chain's mip sizes. The
    /// composite always reads five mips; missing levels keep halving.
    pub fn resize(&mut self, device: &wgpu::Device, hdr: &RenderTarget, mip_sizes: &[(u32, u32)]) {
        let mut sizes: Vec<(u32, u32)> = mip_sizes.iter().copied().take(COMPOSITE_MIPS).collect();
        while sizes.len() < COMPOSITE_MIPS {
            let (w, h) = sizes.last().copied().unwrap_or(hdr.size);
            sizes.push(((w / 2).max(1), (h / 2).max(1)));
        }

        let mips: Vec<RenderTarget> = sizes
            .iter()
            .enumerate()
            .map(|(i, &size)| RenderTarget::new(device, size, HDR_FORMAT, &format!("bloom_mip{i}")))
            .collect();
        let composite = RenderTarget::new(device, sizes[0], HDR_FORMAT, "bloom_composite");

        let prefilter = self.stage(device, "bloom_prefilter", &hdr.view, hdr.size);
        let downsample = (1..mips.len())
            .map(|i| self.stage(device, &format!("bloom_down{i}"), &mips[i - 1].view, mips[i - 1].size))
            .collect();
        let composite_stage = self.stage(device, "bloom_composite", &mips[0].view, mips[0].size);

        let mips_entries: Vec<wgpu::BindGroupEntry> = mips
            .iter()
            .enumerate()
            .map(|(i, m)| wgpu::BindGroupEntry {
                binding: i as u32,
                resource: wgpu::BindingResource::TextureView(&m.view),
            })
            .collect();
        let mips_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("bloom_mips"),
            layout: &self.mips_layout,
            entries: &mips_entries,
        });

        self.targets = Some(Targets { mips, composite, prefilter, downsample, composite_stage, mips_group });
    }

    /// Result of the last `encode`, at half the HDR size.
    pub fn output(&self) -> Option<&RenderTarget> {
        self.targets.as_ref().map(|t| &t.composite)
    }

    pub fn encode(&self, queue: &wgpu::Queue, encoder: &mut wgpu::CommandEncoder, settings: &BloomSettings) {
        let Some(t) = self.targets.as_ref() else { return };

        let write = |stage: &Stage| {
            queue.write_buffer(&stage.uniforms, 0, bytemuck::bytes_of(&BloomUniforms::new(settings, stage.source_size)));
        };
        write(&t.prefilter);
        for stage in &t.downsample {
            write(stage);
        }
        write(&t.composite_stage);

        run_pass(encoder, "bloom_prefilter", &self.prefilter, &t.mips[0].view, &[&t.prefilter.bind_group]);
        for (i, stage) in t.downsample.iter().enumerate() {
            run_pass(encoder, "bloom_downsample", &self.downsample, &t.mips[i + 1].view, &[&stage.bind_group]);
        }
        run_pass(
            encoder,
            "bloom_composite",
            &self.composite,
            &t.composite.view,
            &[&t.composite_stage.bind_group, &t.mips_group],
        );
    }
}

pub(crate) fn run_pass(
    encoder: &mut wgpu::CommandEncoder,
    label: &str,
    pipeline: &wgpu::RenderPipeline,
    target: &wgpu::TextureView,
    groups: &[&wgpu::BindGroup],
) {
    let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
        label: Some(label),
        color_attachments: &[Some(wgpu::RenderPassColorAttachment {
            view: target,
            resolve_target: None,
            ops: wgpu::Operations {
                load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                store: wgpu::StoreOp::Store,
            },
        })],
        depth_stencil_attachment: None,
        occlusion_query_set: None,
        timestamp_writes: None,
    });
    pass.set_pipeline(pipeline);
    for (i, group) in groups.iter().enumerate() {
        pass.set_bind_group(i as u32, *group, &[]);
    }
    pass.draw(0..3, 0..1);
}
