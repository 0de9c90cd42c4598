//! Offscreen wgpu implementation of [`RenderTarget`].
//!
//! Renders into a texture sized to the basemap canvas; no window or
//! surface is required. Draw calls are recorded between `begin_frame`
//! and `end_frame` and replayed in one render pass, with per-draw
//! uniforms bound through dynamic offsets.

use crate::error::{RenderError, RenderResult};
use crate::projection::ProjectionState;
use crate::render::{BufferId, RenderBuffer, RenderTarget};
use bytemuck::{Pod, Zeroable};
use once_cell::sync::OnceCell;
use wgpu::util::DeviceExt;

pub const TEXTURE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8UnormSrgb;

/// Minimum uniform dynamic-offset alignment under downlevel defaults.
const UNIFORM_STRIDE: u64 = 256;

static WGPU_CTX: OnceCell<GpuContext> = OnceCell::new();

/// Shared device/queue, created once per process.
pub struct GpuContext {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub adapter: wgpu::Adapter,
}

impl GpuContext {
    /// Acquire the shared context. Adapter or device acquisition failure
    /// surfaces as an explicit Device error instead of a panic.
    pub fn get() -> RenderResult<&'static Self> {
        WGPU_CTX.get_or_try_init(|| {
            let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
                backends: wgpu::Backends::all(),
                ..Default::default()
            });

            let adapter = pollster::block_on(instance.request_adapter(
                &wgpu::RequestAdapterOptions {
                    power_preference: wgpu::PowerPreference::HighPerformance,
                    compatible_surface: None,
                    force_fallback_adapter: false,
                },
            ))
            .ok_or_else(|| RenderError::device("No suitable GPU adapter"))?;

            let (device, queue) = pollster::block_on(adapter.request_device(
                &wgpu::DeviceDescriptor {
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::downlevel_defaults(),
                    label: Some("thematic-device"),
                },
                None,
            ))
            .map_err(|e| RenderError::device(format!("request_device failed: {e}")))?;

            Ok(GpuContext { device, queue, adapter })
        })
    }
}

/// Per-draw uniform data (16-byte aligned)
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct DrawUniform {
    /// Column-major 3x3 clip matrix, columns padded to vec4
    transform: [[f32; 4]; 3],
    color: [f32; 4],
    /// x = point size (px), y = canvas width, z = canvas height
    params: [f32; 4],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PipelineKind {
    Fill,
    Border,
    Point,
}

struct PendingDraw {
    kind: PipelineKind,
    vertices: BufferId,
    indices: Option<BufferId>,
    element_count: u32,
    uniform: DrawUniform,
}

struct FrameState {
    transform: [[f32; 4]; 3],
    draws: Vec<PendingDraw>,
}

/// Offscreen render target backed by wgpu.
pub struct WgpuTarget {
    fill_pipeline: wgpu::RenderPipeline,
    border_pipeline: wgpu::RenderPipeline,
    point_pipeline: wgpu::RenderPipeline,
    bind_group_layout: wgpu::BindGroupLayout,
    buffers: Vec<wgpu::Buffer>,
    target_texture: wgpu::Texture,
    target: wgpu::TextureView,
    width: u32,
    height: u32,
    frame: Option<FrameState>,
}

impl WgpuTarget {
    pub fn new(width: u32, height: u32) -> RenderResult<Self> {
        if width == 0 || height == 0 {
            return Err(RenderError::device(format!(
                "Render target needs a non-zero size, got {width}x{height}"
            )));
        }
        let ctx = GpuContext::get()?;
        let device = &ctx.device;

        let layer_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("layer_fill.wgsl"),
            source: wgpu::ShaderSource::Wgsl(std::borrow::Cow::Borrowed(include_str!(
                "../shaders/layer_fill.wgsl"
            ))),
        });
        let point_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("point_instanced.wgsl"),
            source: wgpu::ShaderSource::Wgsl(std::borrow::Cow::Borrowed(include_str!(
                "../shaders/point_instanced.wgsl"
            ))),
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("thematic.Layer.BindGroupLayout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: true,
                    min_binding_size: wgpu::BufferSize::new(
                        std::mem::size_of::<DrawUniform>() as u64
                    ),
                },
                count: None,
            }],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("thematic.Layer.PipelineLayout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let lonlat_layout = wgpu::VertexBufferLayout {
            array_stride: 8,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &wgpu::vertex_attr_array![0 => Float32x2],
        };
        let instance_layout = wgpu::VertexBufferLayout {
            array_stride: 8,
            step_mode: wgpu::VertexStepMode::Instance,
            attributes: &wgpu::vertex_attr_array![0 => Float32x2],
        };

        let make_pipeline = |label: &str,
                             shader: &wgpu::ShaderModule,
                             topology: wgpu::PrimitiveTopology,
                             layout: wgpu::VertexBufferLayout| {
            device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(label),
                layout: Some(&pipeline_layout),
                vertex: wgpu::VertexState {
                    module: shader,
                    entry_point: "vs_main",
                    buffers: &[layout],
                },
                fragment: Some(wgpu::FragmentState {
                    module: shader,
                    entry_point: "fs_main",
                    targets: &[Some(wgpu::ColorTargetState {
                        format: TEXTURE_FORMAT,
                        blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                }),
                primitive: wgpu::PrimitiveState {
                    topology,
                    strip_index_format: None,
                    front_face: wgpu::FrontFace::Ccw,
                    cull_mode: None,
                    unclipped_depth: false,
                    polygon_mode: wgpu::PolygonMode::Fill,
                    conservative: false,
                },
                depth_stencil: None,
                multisample: wgpu::MultisampleState::default(),
                multiview: None,
            })
        };

        let fill_pipeline = make_pipeline(
            "thematic.Fill.Pipeline",
            &layer_shader,
            wgpu::PrimitiveTopology::TriangleList,
            lonlat_layout.clone(),
        );
        let border_pipeline = make_pipeline(
            "thematic.Border.Pipeline",
            &layer_shader,
            wgpu::PrimitiveTopology::LineStrip,
            lonlat_layout,
        );
        let point_pipeline = make_pipeline(
            "thematic.Point.Pipeline",
            &point_shader,
            wgpu::PrimitiveTopology::TriangleStrip,
            instance_layout,
        );

        let (target_texture, target) = create_target(device, width, height);

        Ok(Self {
            fill_pipeline,
            border_pipeline,
            point_pipeline,
            bind_group_layout,
            buffers: Vec::new(),
            target_texture,
            target,
            width,
            height,
            frame: None,
        })
    }

    fn push_draw(
        &mut self,
        kind: PipelineKind,
        buffer: &RenderBuffer,
        color: [f32; 4],
        point_size: f32,
    ) -> RenderResult<()> {
        let (width, height) = (self.width as f32, self.height as f32);
        let frame = self
            .frame
            .as_mut()
            .ok_or_else(|| RenderError::render("Draw call outside begin_frame/end_frame"))?;

        frame.draws.push(PendingDraw {
            kind,
            vertices: buffer.vertices,
            indices: buffer.indices,
            element_count: buffer.element_count,
            uniform: DrawUniform {
                transform: frame.transform,
                color,
                params: [point_size, width, height, 0.0],
            },
        });
        Ok(())
    }

    fn buffer(&self, id: BufferId) -> RenderResult<&wgpu::Buffer> {
        self.buffers
            .get(id.0 as usize)
            .ok_or_else(|| RenderError::render(format!("Unknown buffer id {}", id.0)))
    }

    /// Read the rendered frame back as tightly packed RGBA8 rows.
    pub fn read_pixels(&self) -> RenderResult<Vec<u8>> {
        let ctx = GpuContext::get()?;
        let (device, queue) = (&ctx.device, &ctx.queue);

        let padded_bpr = align_copy_bpr(self.width * 4);
        let size = (padded_bpr * self.height) as u64;
        let readback = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("thematic.Readback.Buffer"),
            size,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("thematic.Readback.Encoder"),
        });
        encoder.copy_texture_to_buffer(
            wgpu::ImageCopyTexture {
                texture: &self.target_texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::ImageCopyBuffer {
                buffer: &readback,
                layout: wgpu::ImageDataLayout {
                    offset: 0,
                    bytes_per_row: Some(padded_bpr),
                    rows_per_image: Some(self.height),
                },
            },
            wgpu::Extent3d {
                width: self.width,
                height: self.height,
                depth_or_array_layers: 1,
            },
        );
        queue.submit(Some(encoder.finish()));

        let slice = readback.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        device.poll(wgpu::Maintain::Wait);
        rx.recv()
            .map_err(|_| RenderError::render("Readback mapping callback dropped"))?
            .map_err(|e| RenderError::render(format!("Readback map failed: {e:?}")))?;

        let mapped = slice.get_mapped_range();
        let mut pixels = Vec::with_capacity((self.width * self.height * 4) as usize);
        for row in 0..self.height {
            let start = (row * padded_bpr) as usize;
            pixels.extend_from_slice(&mapped[start..start + (self.width * 4) as usize]);
        }
        drop(mapped);
        readback.unmap();
        Ok(pixels)
    }
}

fn create_target(device: &wgpu::Device, width: u32, height: u32) -> (wgpu::Texture, wgpu::TextureView) {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("thematic.Target"),
        size: wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: TEXTURE_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
        view_formats: &[],
    });
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    (texture, view)
}

/// Align to WebGPU's required bytes-per-row for texture copies.
#[inline]
pub fn align_copy_bpr(unpadded: u32) -> u32 {
    let a = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    ((unpadded + a - 1) / a) * a
}

/// WGSL mat3x3 columns are vec4-aligned.
fn pad_mat3(m: glam::Mat3) -> [[f32; 4]; 3] {
    let c = m.to_cols_array_2d();
    [
        [c[0][0], c[0][1], c[0][2], 0.0],
        [c[1][0], c[1][1], c[1][2], 0.0],
        [c[2][0], c[2][1], c[2][2], 0.0],
    ]
}

impl RenderTarget for WgpuTarget {
    fn create_vertex_buffer(&mut self, data: &[f32]) -> RenderResult<BufferId> {
        if data.is_empty() {
            return Err(RenderError::upload("Empty vertex data"));
        }
        let ctx = GpuContext::get()?;
        let buffer = ctx
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("thematic.VertexBuffer"),
                contents: bytemuck::cast_slice(data),
                usage: wgpu::BufferUsages::VERTEX,
            });
        let id = BufferId(self.buffers.len() as u32);
        self.buffers.push(buffer);
        Ok(id)
    }

    fn create_index_buffer(&mut self, data: &[u32]) -> RenderResult<BufferId> {
        if data.is_empty() {
            return Err(RenderError::upload("Empty index data"));
        }
        let ctx = GpuContext::get()?;
        let buffer = ctx
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("thematic.IndexBuffer"),
                contents: bytemuck::cast_slice(data),
                usage: wgpu::BufferUsages::INDEX,
            });
        let id = BufferId(self.buffers.len() as u32);
        self.buffers.push(buffer);
        Ok(id)
    }

    fn resize(&mut self, width: u32, height: u32) -> RenderResult<()> {
        if width == 0 || height == 0 {
            return Err(RenderError::device(format!(
                "Render target needs a non-zero size, got {width}x{height}"
            )));
        }
        if width != self.width || height != self.height {
            let ctx = GpuContext::get()?;
            let (texture, view) = create_target(&ctx.device, width, height);
            self.target_texture = texture;
            self.target = view;
            self.width = width;
            self.height = height;
        }
        Ok(())
    }

    fn begin_frame(&mut self, projection: &ProjectionState) -> RenderResult<()> {
        if self.frame.is_some() {
            return Err(RenderError::render("begin_frame while a frame is open"));
        }
        self.resize(projection.width, projection.height)?;
        self.frame = Some(FrameState {
            transform: pad_mat3(projection.clip_matrix()),
            draws: Vec::new(),
        });
        Ok(())
    }

    fn draw_triangles(&mut self, buffer: &RenderBuffer, color: [f32; 4]) -> RenderResult<()> {
        if buffer.indices.is_none() {
            return Err(RenderError::render("Triangle draw requires an index buffer"));
        }
        self.push_draw(PipelineKind::Fill, buffer, color, 0.0)
    }

    fn draw_line_strip(&mut self, buffer: &RenderBuffer, color: [f32; 4]) -> RenderResult<()> {
        self.push_draw(PipelineKind::Border, buffer, color, 0.0)
    }

    fn draw_points(
        &mut self,
        buffer: &RenderBuffer,
        color: [f32; 4],
        point_size: f32,
    ) -> RenderResult<()> {
        if point_size <= 0.0 || !point_size.is_finite() {
            return Err(RenderError::render(format!(
                "Point size must be positive and finite, got {point_size}"
            )));
        }
        self.push_draw(PipelineKind::Point, buffer, color, point_size)
    }

    fn end_frame(&mut self) -> RenderResult<()> {
        let frame = self
            .frame
            .take()
            .ok_or_else(|| RenderError::render("end_frame without begin_frame"))?;

        let ctx = GpuContext::get()?;
        let (device, queue) = (&ctx.device, &ctx.queue);

        let uniform_size = UNIFORM_STRIDE * frame.draws.len().max(1) as u64;
        let uniforms = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("thematic.Frame.Uniforms"),
            size: uniform_size,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        for (i, draw) in frame.draws.iter().enumerate() {
            queue.write_buffer(
                &uniforms,
                i as u64 * UNIFORM_STRIDE,
                bytemuck::cast_slice(&[draw.uniform]),
            );
        }

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("thematic.Frame.BindGroup"),
            layout: &self.bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                    buffer: &uniforms,
                    offset: 0,
                    size: wgpu::BufferSize::new(std::mem::size_of::<DrawUniform>() as u64),
                }),
            }],
        });

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("thematic.Frame.Encoder"),
        });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("thematic.Frame.Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &self.target,
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

            for (i, draw) in frame.draws.iter().enumerate() {
                let pipeline = match draw.kind {
                    PipelineKind::Fill => &self.fill_pipeline,
                    PipelineKind::Border => &self.border_pipeline,
                    PipelineKind::Point => &self.point_pipeline,
                };
                pass.set_pipeline(pipeline);
                pass.set_bind_group(0, &bind_group, &[(i as u64 * UNIFORM_STRIDE) as u32]);
                pass.set_vertex_buffer(0, self.buffer(draw.vertices)?.slice(..));

                match draw.kind {
                    PipelineKind::Fill => {
                        let indices = draw.indices.ok_or_else(|| {
                            RenderError::render("Fill draw lost its index buffer")
                        })?;
                        pass.set_index_buffer(
                            self.buffer(indices)?.slice(..),
                            wgpu::IndexFormat::Uint32,
                        );
                        pass.draw_indexed(0..draw.element_count, 0, 0..1);
                    }
                    PipelineKind::Border => {
                        pass.draw(0..draw.element_count, 0..1);
                    }
                    PipelineKind::Point => {
                        pass.draw(0..4, 0..draw.element_count);
                    }
                }
            }
        }

        queue.submit(Some(encoder.finish()));
        Ok(())
    }
}
