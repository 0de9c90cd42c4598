//! Render-target seam between the map pipeline and the GPU.
//!
//! The preprocessing side (classification, triangulation, indexing) never
//! touches a graphics context; it talks to a [`RenderTarget`] that exposes
//! buffer creation and primitive draws. The wgpu implementation lives in
//! [`wgpu_target`]; tests substitute a recording target.

pub mod wgpu_target;

pub use wgpu_target::WgpuTarget;

use crate::error::RenderResult;
use crate::projection::ProjectionState;

/// Opaque handle to an uploaded vertex or index buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferId(pub u32);

/// GPU-resident vertex data plus the metadata needed for one draw call.
/// Vertices are lon/lat degrees, 2 f32 per vertex, uploaded verbatim.
#[derive(Debug, Clone, Copy)]
pub struct RenderBuffer {
    pub vertices: BufferId,
    pub indices: Option<BufferId>,
    /// Indices for indexed draws, vertices otherwise
    pub element_count: u32,
    /// Floats per vertex
    pub stride: u32,
}

impl RenderBuffer {
    pub fn triangles(vertices: BufferId, indices: BufferId, index_count: u32) -> Self {
        Self {
            vertices,
            indices: Some(indices),
            element_count: index_count,
            stride: 2,
        }
    }

    pub fn strip(vertices: BufferId, vertex_count: u32) -> Self {
        Self {
            vertices,
            indices: None,
            element_count: vertex_count,
            stride: 2,
        }
    }
}

/// Draw-side interface the map controller renders through.
///
/// One frame is `begin_frame` (projection upload + clear), any number of
/// draw calls in class order, then `end_frame` (submission). Buffers are
/// created once during preprocessing and never mutated.
pub trait RenderTarget {
    /// Upload interleaved lon/lat vertex data (2 f32 per vertex).
    fn create_vertex_buffer(&mut self, data: &[f32]) -> RenderResult<BufferId>;

    /// Upload triangle indices.
    fn create_index_buffer(&mut self, data: &[u32]) -> RenderResult<BufferId>;

    /// Resize the drawing surface to the basemap canvas size.
    fn resize(&mut self, width: u32, height: u32) -> RenderResult<()>;

    /// Start a full repaint: bind the frame projection and clear.
    fn begin_frame(&mut self, projection: &ProjectionState) -> RenderResult<()>;

    /// Filled interior triangles of one class.
    fn draw_triangles(&mut self, buffer: &RenderBuffer, color: [f32; 4]) -> RenderResult<()>;

    /// Closed border loop (line strip whose last vertex repeats the first).
    fn draw_line_strip(&mut self, buffer: &RenderBuffer, color: [f32; 4]) -> RenderResult<()>;

    /// Point sprites with a circular fragment mask.
    fn draw_points(
        &mut self,
        buffer: &RenderBuffer,
        color: [f32; 4],
        point_size: f32,
    ) -> RenderResult<()>;

    /// Submit the frame.
    fn end_frame(&mut self) -> RenderResult<()>;
}
