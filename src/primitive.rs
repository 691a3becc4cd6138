//! Packed draw primitives.
//!
//! A [`Primitive`] owns a packed `(x, y, z)` vertex array and an ordered list
//! of draw spans. It is filled by the tessellator driver and the HPGL symbol
//! builder, uploaded to a GPU buffer on first draw, and dropped with its
//! owner (feature or symbol-cache entry).

use wgpu::util::DeviceExt;

use crate::error::{Result, S52Error};

/// Draw topology of one span. `Translate` is a sentinel: it consumes exactly
/// one vertex, applied as a modelview translation before the next span (used
/// to place a sub-symbol inside an already-composed HPGL program).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawMode {
    Points,
    Lines,
    LineStrip,
    LineLoop,
    Triangles,
    TriangleStrip,
    TriangleFan,
    Translate,
}

/// `(mode, first, count)` over the owning primitive's vertex array.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Span {
    pub mode: DrawMode,
    pub first: u32,
    pub count: u32,
}

#[derive(Debug, Default)]
pub struct Primitive {
    vertices: Vec<[f32; 3]>,
    spans: Vec<Span>,
    /// Lazily created backing buffer; one per primitive, uploaded once.
    gpu: Option<wgpu::Buffer>,
}

impl Primitive {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset to empty, dropping any GPU handle.
    pub fn clear(&mut self) {
        self.vertices.clear();
        self.spans.clear();
        self.gpu = None;
    }

    /// Open a new span at the current vertex cursor.
    pub fn begin_prim(&mut self, mode: DrawMode) {
        self.spans.push(Span {
            mode,
            first: self.vertices.len() as u32,
            count: 0,
        });
    }

    pub fn append_vertex(&mut self, x: f32, y: f32, z: f32) {
        self.vertices.push([x, y, z]);
        self.gpu = None;
    }

    /// Finalize the open span's count.
    pub fn end_prim(&mut self) {
        if let Some(span) = self.spans.last_mut() {
            span.count = self.vertices.len() as u32 - span.first;
        } else {
            log::warn!("end_prim without begin_prim");
        }
    }

    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    #[inline]
    pub fn vertices(&self) -> &[[f32; 3]] {
        &self.vertices
    }

    #[inline]
    pub fn spans(&self) -> &[Span] {
        &self.spans
    }

    pub fn span(&self, i: usize) -> Option<Span> {
        self.spans.get(i).copied()
    }

    /// Σ span.count never exceeds the vertex array, and every `Translate`
    /// span consumes exactly one vertex.
    pub fn spans_consistent(&self) -> bool {
        let mut total: u64 = 0;
        for span in &self.spans {
            if span.mode == DrawMode::Translate && span.count != 1 {
                return false;
            }
            if (span.first + span.count) as usize > self.vertices.len() {
                return false;
            }
            total += span.count as u64;
        }
        total <= self.vertices.len() as u64
    }

    #[inline]
    pub fn is_uploaded(&self) -> bool {
        self.gpu.is_some()
    }

    /// Upload on first use; later calls return the cached handle. An empty
    /// primitive has nothing to draw and reports `UploadFailure` so the
    /// caller can skip (and retry after a refill).
    pub fn upload(&mut self, device: &wgpu::Device) -> Result<&wgpu::Buffer> {
        if self.vertices.is_empty() {
            return Err(S52Error::UploadFailure("empty vertex array"));
        }
        if self.gpu.is_none() {
            self.gpu = Some(
                device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("primitive_vertices"),
                    contents: bytemuck::cast_slice(&self.vertices),
                    usage: wgpu::BufferUsages::VERTEX,
                }),
            );
        }
        Ok(self.gpu.as_ref().unwrap())
    }

    /// Drop the GPU handle (palette reload, device loss); CPU data stays.
    pub fn invalidate_gpu(&mut self) {
        self.gpu = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn span_counts_follow_vertices() {
        let mut p = Primitive::new();
        p.begin_prim(DrawMode::Triangles);
        p.append_vertex(0.0, 0.0, 0.0);
        p.append_vertex(1.0, 0.0, 0.0);
        p.append_vertex(0.0, 1.0, 0.0);
        p.end_prim();
        p.begin_prim(DrawMode::LineStrip);
        p.append_vertex(0.0, 0.0, 0.0);
        p.append_vertex(2.0, 2.0, 0.0);
        p.end_prim();

        assert_eq!(p.vertex_count(), 5);
        assert_eq!(
            p.span(0),
            Some(Span {
                mode: DrawMode::Triangles,
                first: 0,
                count: 3
            })
        );
        assert_eq!(
            p.span(1),
            Some(Span {
                mode: DrawMode::LineStrip,
                first: 3,
                count: 2
            })
        );
        assert!(p.spans_consistent());
    }

    #[test]
    fn translate_sentinel_consumes_one_vertex() {
        let mut p = Primitive::new();
        p.begin_prim(DrawMode::Translate);
        p.append_vertex(10.0, -4.0, 0.0);
        p.end_prim();
        p.begin_prim(DrawMode::Lines);
        p.append_vertex(0.0, 0.0, 0.0);
        p.append_vertex(1.0, 1.0, 0.0);
        p.end_prim();
        assert!(p.spans_consistent());

        // a translate span with more than one vertex is malformed
        let mut bad = Primitive::new();
        bad.begin_prim(DrawMode::Translate);
        bad.append_vertex(0.0, 0.0, 0.0);
        bad.append_vertex(1.0, 0.0, 0.0);
        bad.end_prim();
        assert!(!bad.spans_consistent());
    }

    #[test]
    fn clear_resets_everything() {
        let mut p = Primitive::new();
        p.begin_prim(DrawMode::Points);
        p.append_vertex(0.0, 0.0, 0.0);
        p.end_prim();
        p.clear();
        assert_eq!(p.vertex_count(), 0);
        assert_eq!(p.spans().len(), 0);
        assert!(!p.is_uploaded());
    }
}
