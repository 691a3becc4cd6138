//! Plan execution: one render pass per cycle.
//!
//! Pattern tiles that became visible this frame are prerendered into their
//! own textures first, then the frame pools and the uniform arena upload,
//! and finally every recorded plan replays into the offscreen color target
//! in order.

use ahash::{HashMap, HashMapExt};
use wgpu::util::DeviceExt;

use crate::matrix;
use crate::pipeline::{GpuState, PipelineKey, Uniforms, VertexLayout};
use crate::plib::LineStyleKind;

use super::types::{GeomSource, PlanTex};
use super::S52Engine;

impl S52Engine {
    /// Execute and drop every recorded plan. `clear` paints the target
    /// first (Draw/Pick); `None` draws over what is there (Last).
    pub(crate) fn flush(&mut self, clear: Option<wgpu::Color>) {
        let pending = std::mem::take(&mut self.pending_tiles);
        for name in pending {
            self.prerender_tile(&name);
        }

        // resolve symbol sublist buffers up front
        let mut wanted: Vec<(String, usize)> = Vec::new();
        for plan in &self.plans {
            if let GeomSource::SymbolPrim { name, sublist, .. } = &plan.geom {
                if !wanted.iter().any(|(n, s)| n == name && s == sublist) {
                    wanted.push((name.clone(), *sublist));
                }
            }
        }
        let mut sym_buffers: HashMap<(String, usize), wgpu::Buffer> = HashMap::new();
        for (name, sublist) in wanted {
            if let Some(sym) = self.symbols.get_mut(&name) {
                if let Some((_, prim)) = sym.sublists.get_mut(sublist) {
                    if let Ok(buffer) = prim.upload(&self.gpu.device) {
                        sym_buffers.insert((name, sublist), buffer.clone());
                    }
                }
            }
        }

        let chart_buffer = (!self.pool.chart.is_empty()).then(|| {
            self.gpu
                .device
                .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("frame_chart_vertices"),
                    contents: bytemuck::cast_slice(&self.pool.chart),
                    usage: wgpu::BufferUsages::VERTEX,
                })
        });
        let quad_buffer = (!self.pool.quads.is_empty()).then(|| {
            self.gpu
                .device
                .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("frame_quad_vertices"),
                    contents: bytemuck::cast_slice(&self.pool.quads),
                    usage: wgpu::BufferUsages::VERTEX,
                })
        });

        self.gpu.arena_reset();
        let slots: Vec<u32> = self
            .plans
            .iter()
            .map(|plan| self.gpu.arena_push(&plan.uniforms))
            .collect();
        self.gpu.arena_flush();

        let mut encoder =
            self.gpu
                .device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("cycle_encoder"),
                });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("cycle_pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &self.gpu.target_view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: match clear {
                            Some(color) => wgpu::LoadOp::Clear(color),
                            None => wgpu::LoadOp::Load,
                        },
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            for (plan, slot) in self.plans.iter().zip(&slots) {
                let (layout, topo, buffer, first, count) = match &plan.geom {
                    GeomSource::FeaturePrim {
                        first,
                        count,
                        topo,
                        buffer: Some(buffer),
                    } => (VertexLayout::Prim, *topo, buffer, *first, *count),
                    GeomSource::FeaturePrim { buffer: None, .. } => continue,
                    GeomSource::SymbolPrim {
                        name,
                        sublist,
                        first,
                        count,
                        topo,
                    } => match sym_buffers.get(&(name.clone(), *sublist)) {
                        Some(buffer) => (VertexLayout::Prim, *topo, buffer, *first, *count),
                        None => continue,
                    },
                    GeomSource::Chart { first, count, topo } => match &chart_buffer {
                        Some(buffer) => (VertexLayout::Line, *topo, buffer, *first, *count),
                        None => continue,
                    },
                    GeomSource::Quad { first, count } => match &quad_buffer {
                        Some(buffer) => (
                            VertexLayout::Quad,
                            crate::pipeline::Topo::Triangles,
                            buffer,
                            *first,
                            *count,
                        ),
                        None => continue,
                    },
                };
                if count == 0 {
                    continue;
                }

                let tex_bind = match &plan.tex {
                    PlanTex::None => &self.gpu.white_bind_group,
                    PlanTex::Stipple(LineStyleKind::Dotted) => &self.dot_bind,
                    PlanTex::Stipple(_) => &self.dash_bind,
                    PlanTex::Nodata => &self.nodata_bind,
                    PlanTex::Atlas => match &self.atlas_bind {
                        Some(bind) => bind,
                        None => continue,
                    },
                    PlanTex::Snapshot => &self.snapshot_bind,
                    PlanTex::Pattern(name) => match self.pattern_tiles.get(name) {
                        Some(tile) if !tile.disabled => match &tile.bind {
                            Some(bind) => bind,
                            None => continue,
                        },
                        _ => continue,
                    },
                    PlanTex::Raster(id) => match self.raster_binds.get(id) {
                        Some(bind) => bind,
                        None => continue,
                    },
                };

                pass.set_pipeline(self.gpu.pipeline(PipelineKey {
                    layout,
                    topo,
                    opaque: plan.opaque,
                }));
                pass.set_bind_group(
                    0,
                    &self.gpu.uniform_bind_group,
                    &[GpuState::arena_offset(*slot)],
                );
                pass.set_bind_group(1, tex_bind, &[]);
                pass.set_vertex_buffer(0, buffer.slice(..));
                pass.draw(first..first + count, 0..1);
            }
        }
        self.gpu.queue.submit(std::iter::once(encoder.finish()));
        self.plans.clear();
    }

    /// Render a pattern symbol into its tile texture, once per session (or
    /// again after a palette reload cleared the registry).
    pub(crate) fn prerender_tile(&mut self, name: &str) {
        if self.pattern_tiles.contains_key(name) {
            return;
        }

        let (tile_units, pivot, steps) = match self.symbols.get(name) {
            Some(sym) => {
                let tile = sym
                    .tile
                    .map(|t| (t.width, t.height))
                    .unwrap_or((sym.size.0.max(1.0), sym.size.1.max(1.0)));
                (tile, sym.pivot, super::symbols::collect_steps(sym))
            }
            None => {
                log::debug!("pattern {name} has no definition, disabling");
                self.pattern_tiles.insert(
                    name.to_owned(),
                    super::PatternTile {
                        bind: None,
                        disabled: true,
                    },
                );
                return;
            }
        };

        // one tile unit (0.01 mm) is one texel
        let px_w = ((tile_units.0 * 0.01 / self.view.dotpitch_mm_x).ceil() as u32).max(1);
        let px_h = ((tile_units.1 * 0.01 / self.view.dotpitch_mm_y).ceil() as u32).max(1);
        if px_w > 2048 || px_h > 2048 {
            log::warn!("pattern {name} tile {px_w}x{px_h} too large, disabling");
            self.pattern_tiles.insert(
                name.to_owned(),
                super::PatternTile {
                    bind: None,
                    disabled: true,
                },
            );
            return;
        }

        let texture = self.gpu.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("pattern_tile"),
            size: wgpu::Extent3d {
                width: px_w,
                height: px_h,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: crate::pipeline::TARGET_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        // ortho over the tile in symbol units, pivot-adjusted
        let mut stacks = matrix::MatrixStacks::new();
        stacks.set_mode(matrix::MatrixMode::Projection);
        stacks.ortho(
            -pivot.0,
            tile_units.0 - pivot.0,
            pivot.1 - tile_units.1,
            pivot.1,
            1.0,
            -1.0,
        );
        let mvp = matrix::to_f32(&stacks.composed());

        self.gpu.arena_reset();
        let mut draws: Vec<(u32, usize, crate::primitive::Span)> = Vec::new();
        let mut offset = (0.0f64, 0.0f64);
        for step in &steps {
            match step {
                super::symbols::SymStep::Translate(v) => {
                    offset.0 += v[0] as f64;
                    offset.1 += v[1] as f64;
                }
                super::symbols::SymStep::Draw {
                    sublist,
                    color,
                    span,
                } => {
                    let mut m = mvp;
                    // translate sentinel folded into the tile matrix
                    m[12] += (m[0] as f64 * offset.0 + m[4] as f64 * offset.1) as f32;
                    m[13] += (m[1] as f64 * offset.0 + m[5] as f64 * offset.1) as f32;
                    let slot = self.gpu.arena_push(&Uniforms {
                        mvp: m,
                        color: *color,
                        ..Default::default()
                    });
                    draws.push((slot, *sublist, *span));
                }
            }
        }
        self.gpu.arena_flush();

        let mut buffers: HashMap<usize, wgpu::Buffer> = HashMap::new();
        if let Some(sym) = self.symbols.get_mut(name) {
            for (_, sublist, _) in &draws {
                if !buffers.contains_key(sublist) {
                    if let Some((_, prim)) = sym.sublists.get_mut(*sublist) {
                        if let Ok(buffer) = prim.upload(&self.gpu.device) {
                            buffers.insert(*sublist, buffer.clone());
                        }
                    }
                }
            }
        }

        let mut encoder =
            self.gpu
                .device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("tile_encoder"),
                });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("tile_pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
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
            for (slot, sublist, span) in &draws {
                let Some(buffer) = buffers.get(sublist) else {
                    continue;
                };
                let topo = match span.mode {
                    crate::primitive::DrawMode::Points => crate::pipeline::Topo::Points,
                    crate::primitive::DrawMode::Lines => crate::pipeline::Topo::Lines,
                    crate::primitive::DrawMode::LineStrip | crate::primitive::DrawMode::LineLoop => {
                        crate::pipeline::Topo::LineStrip
                    }
                    crate::primitive::DrawMode::TriangleStrip
                    | crate::primitive::DrawMode::TriangleFan => crate::pipeline::Topo::TriangleStrip,
                    _ => crate::pipeline::Topo::Triangles,
                };
                pass.set_pipeline(self.gpu.pipeline(PipelineKey {
                    layout: VertexLayout::Prim,
                    topo,
                    opaque: false,
                }));
                pass.set_bind_group(
                    0,
                    &self.gpu.uniform_bind_group,
                    &[GpuState::arena_offset(*slot)],
                );
                pass.set_bind_group(1, &self.gpu.white_bind_group, &[]);
                pass.set_vertex_buffer(0, buffer.slice(..));
                pass.draw(span.first..span.first + span.count, 0..1);
            }
        }
        self.gpu.queue.submit(std::iter::once(encoder.finish()));

        let bind = self.gpu.bind_texture(&view);
        self.pattern_tiles.insert(
            name.to_owned(),
            super::PatternTile {
                bind: Some(bind),
                disabled: false,
            },
        );
    }
}
