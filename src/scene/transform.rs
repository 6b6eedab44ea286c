use std::sync::Arc;

use nalgebra as na;
use na::{Matrix4, Vector2, Vector3, Vector4};

use super::mesh::{Mesh, Vertex};
use crate::camera::CameraView;
use crate::util::{transform_point, transform_vector};

/// A vertex after projection.
///
/// `position` holds screen x, y in pixels (top-left origin), NDC depth in z and the original
/// clip w. The other attributes are in world space and are left undivided; the rasterizer
/// applies perspective correction when interpolating them.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ScreenVertex {
    pub position: Vector4<f32>,
    pub uv: Vector2<f32>,
    pub normal: Vector3<f32>,
    pub tangent: Vector3<f32>,
    /// World position minus camera origin, not normalized.
    pub view_direction: Vector3<f32>,
}

/// Projects every model space vertex, writing one screen vertex per input into `out`.
///
/// A vertex with clip w near 0 ends up with huge or non-finite coordinates; the rasterizer's
/// depth range check throws away any triangle using it.
pub fn transform_vertices(
    vertices: &[Vertex],
    world: &Matrix4<f32>,
    view: &CameraView,
    width: u32,
    height: u32,
    out: &mut Vec<ScreenVertex>,
) {
    let world_view_projection = view.projection * view.inv_view * world;
    let (width, height) = (width as f32, height as f32);

    out.clear();
    out.extend(vertices.iter().map(|v| {
        let mut position = transform_point(&world_view_projection, v.position);

        // Perspective divide, keeping w for the interpolation stage.
        let inv_w = 1.0 / position.w;
        position.x *= inv_w;
        position.y *= inv_w;
        position.z *= inv_w;

        position.x = (position.x + 1.0) / 2.0 * width;
        position.y = (1.0 - position.y) / 2.0 * height;

        ScreenVertex {
            position,
            uv: v.uv,
            normal: transform_vector(world, v.normal).normalize(),
            tangent: transform_vector(world, v.tangent).normalize(),
            view_direction: transform_point(world, v.position).xyz() - view.origin,
        }
    }));
}

/// Owns the screen vertex array and recycles its allocation from frame to frame.
///
/// Each call hands out a shared snapshot; if a previous snapshot is still alive the next
/// call writes into a fresh copy instead of touching it.
#[derive(Debug, Default)]
pub struct VertexStage {
    vertices_out: Arc<Vec<ScreenVertex>>,
}

impl VertexStage {
    pub fn new() -> Self {
        return Self::default();
    }

    pub fn run(&mut self, mesh: &Mesh, view: &CameraView, width: u32, height: u32) -> Arc<Vec<ScreenVertex>> {
        let out = Arc::make_mut(&mut self.vertices_out);
        transform_vertices(mesh.vertices(), mesh.world(), view, width, height, out);
        return Arc::clone(&self.vertices_out);
    }
}
