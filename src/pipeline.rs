//! GPU pipelines and offscreen plumbing.
//!
//! The engine renders headless into an RGBA8 color target it owns, reads
//! back from it for pick and pixel export, and snapshots it for the blit
//! cycle. One uniform arena with dynamic offsets feeds every draw of a
//! frame; pipelines vary only by vertex layout, topology and blending.

use wgpu::util::DeviceExt;

use ahash::{HashMap, HashMapExt};

use crate::error::{Result, S52Error};

pub const UNIFORM_STRIDE: u64 = 256;

pub const MODE_SOLID: u32 = 0;
pub const MODE_STIPPLE: u32 = 1;
pub const MODE_PATTERN: u32 = 2;
pub const MODE_TEXT: u32 = 3;
pub const MODE_BLIT: u32 = 4;

/// Per-draw uniform block; layout mirrors `Uniforms` in the WGSL sources.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Uniforms {
    pub mvp: [f32; 16],
    pub color: [f32; 4],
    pub pattern_origin: [f32; 2],
    pub pattern_tile: [f32; 2],
    pub mode: u32,
    pub stipple_px: f32,
    pub _pad: [f32; 2],
}

impl Default for Uniforms {
    fn default() -> Self {
        Self {
            mvp: crate::matrix::to_f32(&crate::matrix::IDENTITY),
            color: [0.0, 0.0, 0.0, 1.0],
            pattern_origin: [0.0, 0.0],
            pattern_tile: [1.0, 1.0],
            mode: MODE_SOLID,
            stipple_px: 32.0,
            _pad: [0.0; 2],
        }
    }
}

/// Bare world-position vertex of retained primitives.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct PrimVertex {
    pub position: [f32; 3],
}

impl PrimVertex {
    const ATTRIBS: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![0 => Float32x3];

    pub fn desc() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<PrimVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBS,
        }
    }
}

/// Per-frame line vertex carrying the running pixel length for stippling.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct LineVertex {
    pub position: [f32; 3],
    pub dist: f32,
}

impl LineVertex {
    const ATTRIBS: [wgpu::VertexAttribute; 2] =
        wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32];

    pub fn desc() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<LineVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBS,
        }
    }
}

/// Textured quad vertex (glyphs, blits); matches `text_atlas::TextVertex`.
pub fn quad_vertex_desc() -> wgpu::VertexBufferLayout<'static> {
    const ATTRIBS: [wgpu::VertexAttribute; 2] =
        wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x2];
    wgpu::VertexBufferLayout {
        array_stride: std::mem::size_of::<crate::text_atlas::TextVertex>() as wgpu::BufferAddress,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes: &ATTRIBS,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VertexLayout {
    Prim,
    Line,
    Quad,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topo {
    Triangles,
    TriangleStrip,
    Lines,
    LineStrip,
    Points,
}

impl Topo {
    fn wgpu(self) -> wgpu::PrimitiveTopology {
        match self {
            Topo::Triangles => wgpu::PrimitiveTopology::TriangleList,
            Topo::TriangleStrip => wgpu::PrimitiveTopology::TriangleStrip,
            Topo::Lines => wgpu::PrimitiveTopology::LineList,
            Topo::LineStrip => wgpu::PrimitiveTopology::LineStrip,
            Topo::Points => wgpu::PrimitiveTopology::PointList,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PipelineKey {
    pub layout: VertexLayout,
    pub topo: Topo,
    /// Pick cycles draw opaque: no blending, exact index colors.
    pub opaque: bool,
}

pub const TARGET_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

pub struct GpuState {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub size: (u32, u32),

    pub target: wgpu::Texture,
    pub target_view: wgpu::TextureView,
    /// Copy of the color target taken on entry to the Last cycle.
    pub snapshot: wgpu::Texture,
    pub snapshot_view: wgpu::TextureView,

    pub uniform_bgl: wgpu::BindGroupLayout,
    pub texture_bgl: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,

    pipelines: HashMap<PipelineKey, wgpu::RenderPipeline>,

    /// 1×1 opaque white, bound when a draw needs no texture.
    pub white_bind_group: wgpu::BindGroup,

    arena_buffer: wgpu::Buffer,
    arena_capacity: u32,
    arena_data: Vec<u8>,
    arena_count: u32,
    pub uniform_bind_group: wgpu::BindGroup,

    readback_buffer: Option<wgpu::Buffer>,
    readback_capacity: u64,
}

fn blend_state() -> wgpu::BlendState {
    wgpu::BlendState {
        color: wgpu::BlendComponent {
            src_factor: wgpu::BlendFactor::SrcAlpha,
            dst_factor: wgpu::BlendFactor::OneMinusSrcAlpha,
            operation: wgpu::BlendOperation::Add,
        },
        alpha: wgpu::BlendComponent {
            src_factor: wgpu::BlendFactor::One,
            dst_factor: wgpu::BlendFactor::OneMinusSrcAlpha,
            operation: wgpu::BlendOperation::Add,
        },
    }
}

fn create_color_target(device: &wgpu::Device, size: (u32, u32), label: &str) -> wgpu::Texture {
    device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size: wgpu::Extent3d {
            width: size.0.max(1),
            height: size.1.max(1),
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: TARGET_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT
            | wgpu::TextureUsages::COPY_SRC
            | wgpu::TextureUsages::COPY_DST
            | wgpu::TextureUsages::TEXTURE_BINDING,
        view_formats: &[],
    })
}

pub fn compute_padded_bytes_per_row(width: u32, bytes_per_pixel: u32) -> (u32, u32) {
    let unpadded = width * bytes_per_pixel;
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    let padded = unpadded.div_ceil(align) * align;
    (unpadded, padded)
}

impl GpuState {
    /// Bring up a headless device and the full pipeline set. This is the
    /// expensive, fallible part of `init`; everything after it is cheap.
    pub async fn new_headless(width: u32, height: u32) -> Result<Self> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::default());
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .map_err(|e| S52Error::GpuInit(format!("no adapter: {e}")))?;

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: None,
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                memory_hints: Default::default(),
                trace: Default::default(),
            })
            .await
            .map_err(|e| S52Error::GpuInit(format!("no device: {e}")))?;

        let uniform_bgl = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("uniform_bgl"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: true,
                    min_binding_size: wgpu::BufferSize::new(std::mem::size_of::<Uniforms>() as u64),
                },
                count: None,
            }],
        });

        let texture_bgl = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("texture_bgl"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        multisampled: false,
                        view_dimension: wgpu::TextureViewDimension::D2,
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("chart_sampler"),
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::Repeat,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        let chart_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("chart_shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/chart.wgsl").into()),
        });
        let quad_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("quad_shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/text.wgsl").into()),
        });

        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("chart_pipeline_layout"),
            bind_group_layouts: &[&uniform_bgl, &texture_bgl],
            push_constant_ranges: &[],
        });

        let mut pipelines = HashMap::new();
        for vertex_layout in [VertexLayout::Prim, VertexLayout::Line, VertexLayout::Quad] {
            let topos: &[Topo] = match vertex_layout {
                VertexLayout::Quad => &[Topo::Triangles],
                _ => &[
                    Topo::Triangles,
                    Topo::TriangleStrip,
                    Topo::Lines,
                    Topo::LineStrip,
                    Topo::Points,
                ],
            };
            for &topo in topos {
                for opaque in [false, true] {
                    let (module, vs, fs, buffers) = match vertex_layout {
                        VertexLayout::Prim => {
                            (&chart_shader, "vs_prim", "fs_chart", PrimVertex::desc())
                        }
                        VertexLayout::Line => {
                            (&chart_shader, "vs_line", "fs_chart", LineVertex::desc())
                        }
                        VertexLayout::Quad => (&quad_shader, "vs_quad", "fs_quad", quad_vertex_desc()),
                    };
                    let pipeline =
                        device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                            label: Some("chart_pipeline"),
                            layout: Some(&layout),
                            vertex: wgpu::VertexState {
                                module,
                                entry_point: Some(vs),
                                compilation_options: Default::default(),
                                buffers: &[buffers],
                            },
                            fragment: Some(wgpu::FragmentState {
                                module,
                                entry_point: Some(fs),
                                compilation_options: Default::default(),
                                targets: &[Some(wgpu::ColorTargetState {
                                    format: TARGET_FORMAT,
                                    blend: if opaque { None } else { Some(blend_state()) },
                                    write_mask: wgpu::ColorWrites::ALL,
                                })],
                            }),
                            primitive: wgpu::PrimitiveState {
                                topology: topo.wgpu(),
                                ..Default::default()
                            },
                            depth_stencil: None,
                            multisample: wgpu::MultisampleState::default(),
                            multiview: None,
                            cache: None,
                        });
                    pipelines.insert(
                        PipelineKey {
                            layout: vertex_layout,
                            topo,
                            opaque,
                        },
                        pipeline,
                    );
                }
            }
        }

        let target = create_color_target(&device, (width, height), "chart_target");
        let target_view = target.create_view(&wgpu::TextureViewDescriptor::default());
        let snapshot = create_color_target(&device, (width, height), "chart_snapshot");
        let snapshot_view = snapshot.create_view(&wgpu::TextureViewDescriptor::default());

        let white = device.create_texture_with_data(
            &queue,
            &wgpu::TextureDescriptor {
                label: Some("white_1x1"),
                size: wgpu::Extent3d {
                    width: 1,
                    height: 1,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: wgpu::TextureFormat::Rgba8Unorm,
                usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
                view_formats: &[],
            },
            wgpu::util::TextureDataOrder::LayerMajor,
            &[255, 255, 255, 255],
        );
        let white_view = white.create_view(&wgpu::TextureViewDescriptor::default());
        let white_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("white_bind_group"),
            layout: &texture_bgl,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&white_view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&sampler),
                },
            ],
        });

        let arena_capacity = 1024u32;
        let arena_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("uniform_arena"),
            size: arena_capacity as u64 * UNIFORM_STRIDE,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let uniform_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("uniform_arena_bind_group"),
            layout: &uniform_bgl,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                    buffer: &arena_buffer,
                    offset: 0,
                    size: wgpu::BufferSize::new(std::mem::size_of::<Uniforms>() as u64),
                }),
            }],
        });

        Ok(Self {
            device,
            queue,
            size: (width.max(1), height.max(1)),
            target,
            target_view,
            snapshot,
            snapshot_view,
            uniform_bgl,
            texture_bgl,
            sampler,
            pipelines,
            white_bind_group,
            arena_buffer,
            arena_capacity,
            arena_data: Vec::new(),
            arena_count: 0,
            uniform_bind_group,
            readback_buffer: None,
            readback_capacity: 0,
        })
    }

    pub fn pipeline(&self, key: PipelineKey) -> &wgpu::RenderPipeline {
        &self.pipelines[&key]
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        if (width, height) == self.size || width == 0 || height == 0 {
            return;
        }
        self.size = (width, height);
        self.target = create_color_target(&self.device, self.size, "chart_target");
        self.target_view = self
            .target
            .create_view(&wgpu::TextureViewDescriptor::default());
        self.snapshot = create_color_target(&self.device, self.size, "chart_snapshot");
        self.snapshot_view = self
            .snapshot
            .create_view(&wgpu::TextureViewDescriptor::default());
    }

    // ── texture helpers ──────────────────────────────────────────────────

    pub fn upload_rgba_texture(&self, label: &str, w: u32, h: u32, data: &[u8]) -> wgpu::Texture {
        self.device.create_texture_with_data(
            &self.queue,
            &wgpu::TextureDescriptor {
                label: Some(label),
                size: wgpu::Extent3d {
                    width: w,
                    height: h,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: wgpu::TextureFormat::Rgba8Unorm,
                usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
                view_formats: &[],
            },
            wgpu::util::TextureDataOrder::LayerMajor,
            data,
        )
    }

    pub fn upload_r8_texture(&self, label: &str, w: u32, h: u32, data: &[u8]) -> wgpu::Texture {
        self.device.create_texture_with_data(
            &self.queue,
            &wgpu::TextureDescriptor {
                label: Some(label),
                size: wgpu::Extent3d {
                    width: w,
                    height: h,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: wgpu::TextureFormat::R8Unorm,
                usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
                view_formats: &[],
            },
            wgpu::util::TextureDataOrder::LayerMajor,
            data,
        )
    }

    pub fn bind_texture(&self, view: &wgpu::TextureView) -> wgpu::BindGroup {
        self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: None,
            layout: &self.texture_bgl,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
            ],
        })
    }

    // ── uniform arena ────────────────────────────────────────────────────

    pub fn arena_reset(&mut self) {
        self.arena_data.clear();
        self.arena_count = 0;
    }

    /// Append a uniform block, returning its dynamic-offset slot.
    pub fn arena_push(&mut self, uniforms: &Uniforms) -> u32 {
        let slot = self.arena_count;
        self.arena_data
            .extend_from_slice(bytemuck::bytes_of(uniforms));
        self.arena_data
            .resize(((slot + 1) as u64 * UNIFORM_STRIDE) as usize, 0);
        self.arena_count += 1;
        slot
    }

    /// Upload the frame's uniforms, growing the arena when needed.
    pub fn arena_flush(&mut self) {
        if self.arena_count > self.arena_capacity {
            self.arena_capacity = self.arena_count.next_power_of_two();
            self.arena_buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("uniform_arena"),
                size: self.arena_capacity as u64 * UNIFORM_STRIDE,
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            });
            self.uniform_bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("uniform_arena_bind_group"),
                layout: &self.uniform_bgl,
                entries: &[wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                        buffer: &self.arena_buffer,
                        offset: 0,
                        size: wgpu::BufferSize::new(std::mem::size_of::<Uniforms>() as u64),
                    }),
                }],
            });
        }
        if !self.arena_data.is_empty() {
            self.queue.write_buffer(&self.arena_buffer, 0, &self.arena_data);
        }
    }

    #[inline]
    pub fn arena_offset(slot: u32) -> u32 {
        slot * UNIFORM_STRIDE as u32
    }

    // ── readback ─────────────────────────────────────────────────────────

    /// Copy a window of the color target into host memory, RGBA8 tightly
    /// packed. Origin is clamped to the target.
    pub fn readback_rgba(&mut self, x: u32, y: u32, w: u32, h: u32, out: &mut Vec<u8>) {
        let x = x.min(self.size.0.saturating_sub(1));
        let y = y.min(self.size.1.saturating_sub(1));
        let w = w.min(self.size.0 - x).max(1);
        let h = h.min(self.size.1 - y).max(1);

        let (unpadded, padded) = compute_padded_bytes_per_row(w, 4);
        let needed = padded as u64 * h as u64;
        if self.readback_buffer.is_none() || self.readback_capacity < needed {
            self.readback_buffer = Some(self.device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("chart_readback"),
                size: needed,
                usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
                mapped_at_creation: false,
            }));
            self.readback_capacity = needed;
        }
        let buffer = self.readback_buffer.as_ref().unwrap();

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("readback_encoder"),
            });
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture: &self.target,
                mip_level: 0,
                origin: wgpu::Origin3d { x, y, z: 0 },
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(padded),
                    rows_per_image: None,
                },
            },
            wgpu::Extent3d {
                width: w,
                height: h,
                depth_or_array_layers: 1,
            },
        );
        self.queue.submit(std::iter::once(encoder.finish()));

        out.clear();
        let slice = buffer.slice(..needed);
        let (sender, receiver) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            if sender.send(result).is_err() {
                log::warn!("failed to send map_async result from callback");
            }
        });
        let _ = self.device.poll(wgpu::PollType::Wait);
        match receiver.recv() {
            Ok(Ok(())) => {}
            Ok(Err(error)) => {
                log::warn!("failed to map readback buffer: {error:?}");
                return;
            }
            Err(error) => {
                log::warn!("failed to receive mapped buffer result: {error}");
                return;
            }
        }
        {
            let mapped = slice.get_mapped_range();
            out.reserve((unpadded * h) as usize);
            for row in 0..h {
                let start = (row * padded) as usize;
                out.extend_from_slice(&mapped[start..start + unpadded as usize]);
            }
        }
        buffer.unmap();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniforms_block_fits_the_arena_stride() {
        assert_eq!(std::mem::size_of::<Uniforms>(), 112);
        assert!((std::mem::size_of::<Uniforms>() as u64) <= UNIFORM_STRIDE);
    }

    #[test]
    fn padded_rows_align_to_256() {
        let (unpadded, padded) = compute_padded_bytes_per_row(8, 4);
        assert_eq!(unpadded, 32);
        assert_eq!(padded, 256);
        let (unpadded, padded) = compute_padded_bytes_per_row(64, 4);
        assert_eq!(unpadded, 256);
        assert_eq!(padded, 256);
    }

    #[test]
    fn vertex_strides_match_layouts() {
        assert_eq!(std::mem::size_of::<PrimVertex>(), 12);
        assert_eq!(std::mem::size_of::<LineVertex>(), 16);
        assert_eq!(std::mem::size_of::<crate::text_atlas::TextVertex>(), 20);
    }
}
