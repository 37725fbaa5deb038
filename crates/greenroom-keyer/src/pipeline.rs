//! The compiled keying program.

use crate::shader::{validate_wgsl, KeyUniforms, CHROMA_KEY_WGSL, FRAGMENT_ENTRY, VERTEX_ENTRY};
use greenroom_core::{ChromaKeyParams, GreenroomError, Result};
use greenroom_gpu::{GpuContext, GpuTexture, FRAME_FORMAT};
use std::borrow::Cow;
use tracing::info;
use wgpu::util::DeviceExt;

/// Render pipeline, layouts and uniform buffer for one session.
pub struct ChromaKeyPipeline {
    pipeline: wgpu::RenderPipeline,
    bind_group_layout: wgpu::BindGroupLayout,
    uniform_buffer: wgpu::Buffer,
}

impl ChromaKeyPipeline {
    /// Compile the built-in keying program.
    pub fn new(ctx: &GpuContext) -> Result<Self> {
        Self::with_source(ctx, CHROMA_KEY_WGSL)
    }

    /// Compile a keying program from WGSL source. The source must expose
    /// the same entry points and bindings as the built-in one.
    pub fn with_source(ctx: &GpuContext, wgsl: &str) -> Result<Self> {
        validate_wgsl(wgsl)?;

        let (pipeline, err) = ctx.validation_scope(|device| Self::build(device, wgsl));
        if let Some(err) = err {
            return Err(GreenroomError::PipelineInit(err.to_string()));
        }
        info!("Chroma key pipeline compiled");
        Ok(pipeline)
    }

    fn build(device: &wgpu::Device, wgsl: &str) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Chroma Key Shader"),
            source: wgpu::ShaderSource::Wgsl(Cow::Borrowed(wgsl)),
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Chroma Key Bind Group Layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: false },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: wgpu::BufferSize::new(
                            std::mem::size_of::<KeyUniforms>() as u64,
                        ),
                    },
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Chroma Key Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Chroma Key Pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some(VERTEX_ENTRY),
                buffers: &[],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some(FRAGMENT_ENTRY),
                targets: &[Some(wgpu::ColorTargetState {
                    format: FRAME_FORMAT,
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
        });

        let uniforms = KeyUniforms::from_params(&ChromaKeyParams::default());
        let uniform_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Chroma Key Uniforms"),
            contents: bytemuck::bytes_of(&uniforms),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        Self {
            pipeline,
            bind_group_layout,
            uniform_buffer,
        }
    }

    /// Key `input` into `output` with `params`.
    ///
    /// Uniforms are rewritten on every call, so a parameter change shows up
    /// in the very next frame.
    pub fn render(
        &self,
        ctx: &GpuContext,
        input: &GpuTexture,
        output: &GpuTexture,
        params: &ChromaKeyParams,
    ) -> Result<()> {
        let uniforms = KeyUniforms::from_params(params);

        let ((), err) = ctx.validation_scope(|device| {
            ctx.queue
                .write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(&uniforms));

            let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("Chroma Key Bind Group"),
                layout: &self.bind_group_layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: wgpu::BindingResource::TextureView(&input.view),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: self.uniform_buffer.as_entire_binding(),
                    },
                ],
            });

            let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Chroma Key Encoder"),
            });
            {
                let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                    label: Some("Chroma Key Pass"),
                    color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                        view: &output.view,
                        resolve_target: None,
                        ops: wgpu::Operations {
                            load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                            store: wgpu::StoreOp::Store,
                        },
                    })],
                    depth_stencil_attachment: None,
                    timestamp_writes: None,
                    occlusion_query_set: None,
                });
                pass.set_pipeline(&self.pipeline);
                pass.set_bind_group(0, &bind_group, &[]);
                pass.draw(0..3, 0..1);
            }
            ctx.queue.submit(std::iter::once(encoder.finish()));
        });

        match err {
            Some(e) => Err(GreenroomError::Render(e.to_string())),
            None => Ok(()),
        }
    }
}
