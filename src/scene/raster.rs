use std::sync::mpsc;
use std::sync::Arc;

use log::warn;
use nalgebra as na;
use na::{vector, Vector2, Vector3};
use threadpool::ThreadPool;

use super::buffer::{FrameLock, RenderTarget};
use super::mesh::{triangles, Topology};
use super::shader::{Fragment, PixelShader};
use super::transform::ScreenVertex;
use crate::util::quantize;

/// Signed parallelogram area of (a, b, p). Positive when p lies to the left of a -> b
/// in a y-up frame.
fn edge(a: Vector2<f32>, b: Vector2<f32>, p: Vector2<f32>) -> f32 {
    return (b.x - a.x) * (p.y - a.y) - (b.y - a.y) * (p.x - a.x);
}

/// Whether pixels lying exactly on the edge a -> b belong to the triangle.
/// `orientation` is the sign of the triangle's area; edges are judged as if the triangle were
/// wound with positive area, so the rule holds for both windings.
fn is_top_left(a: Vector2<f32>, b: Vector2<f32>, orientation: f32) -> bool {
    let d = (b - a) * orientation;
    // Screen y grows downwards: a top edge runs in +x, a left edge runs upwards.
    return (d.y == 0.0 && d.x > 0.0) || d.y < 0.0;
}

/// Screen space setup shared by every pixel of one triangle.
struct TriangleSetup {
    p: [Vector2<f32>; 3],
    area: f32,
    top_left: [bool; 3],
}

impl TriangleSetup {
    /// Returns None for zero-area triangles, which cover nothing.
    fn new(p0: Vector2<f32>, p1: Vector2<f32>, p2: Vector2<f32>) -> Option<Self> {
        let area = edge(p0, p1, p2);
        if area == 0.0 {
            return None;
        }
        let orientation = area.signum();
        return Some(Self {
            p: [p0, p1, p2],
            area,
            top_left: [
                is_top_left(p1, p2, orientation),
                is_top_left(p2, p0, orientation),
                is_top_left(p0, p1, orientation),
            ],
        });
    }

    /// Barycentric weights of `point`, or None if it is not covered.
    ///
    /// Weights are normalized by the signed area, so they are non-negative inside the triangle
    /// whatever its winding, and sum to 1. Points exactly on an edge are covered only for top
    /// and left edges, so a pixel on an edge shared by two triangles is drawn once.
    fn weights(&self, point: Vector2<f32>) -> Option<Vector3<f32>> {
        let [p0, p1, p2] = self.p;
        let weights = vector![
            edge(p1, p2, point) / self.area,
            edge(p2, p0, point) / self.area,
            edge(p0, p1, point) / self.area
        ];
        for i in 0..3 {
            let covered = weights[i] > 0.0 || (weights[i] == 0.0 && self.top_left[i]);
            if !covered {
                return None;
            }
        }
        return Some(weights);
    }
}

/// Depth at a covered pixel: `1 / sum(weight_i / z_i)` over the NDC depths.
pub fn interpolate_depth(v: [&ScreenVertex; 3], weights: Vector3<f32>) -> f32 {
    return 1.0
        / (weights.x / v[0].position.z + weights.y / v[1].position.z + weights.z / v[2].position.z);
}

/// Perspective correct interpolation of the vertex attributes at pixel (x, y).
///
/// Each attribute is weighted by `weight_i / w_i` and the sum rescaled by the interpolated w.
/// Direction vectors are renormalized afterwards.
pub fn interpolate(v: [&ScreenVertex; 3], weights: Vector3<f32>, x: u32, y: u32, depth: f32) -> Fragment {
    let corrected = vector![
        weights.x / v[0].position.w,
        weights.y / v[1].position.w,
        weights.z / v[2].position.w
    ];
    let w_buffer = 1.0 / corrected.sum();

    let uv = (v[0].uv * corrected.x + v[1].uv * corrected.y + v[2].uv * corrected.z) * w_buffer;
    let blend = |a: Vector3<f32>, b: Vector3<f32>, c: Vector3<f32>| {
        ((a * corrected.x + b * corrected.y + c * corrected.z) * w_buffer).normalize()
    };

    return Fragment {
        x,
        y,
        depth,
        uv,
        normal: blend(v[0].normal, v[1].normal, v[2].normal),
        tangent: blend(v[0].tangent, v[1].tangent, v[2].tangent),
        view_direction: blend(v[0].view_direction, v[1].view_direction, v[2].view_direction),
    };
}

/// Rasterizes one triangle into the rows of `target`, shading every pixel that passes the
/// depth test.
///
/// The triangle is dropped whole if any vertex depth lies outside [0, 1] (this also catches
/// the non-finite depths of vertices at w = 0); there is no clipping.
pub fn rasterize_triangle(target: &mut RenderTarget<'_>, v: [&ScreenVertex; 3], shader: &PixelShader) {
    if v.iter().any(|vertex| !(0.0..=1.0).contains(&vertex.position.z)) {
        return;
    }

    let [p0, p1, p2] = [v[0].position.xy(), v[1].position.xy(), v[2].position.xy()];
    let Some(setup) = TriangleSetup::new(p0, p1, p2) else {
        return;
    };

    // Bounding box of pixel indices whose centers might be covered, clamped to the target.
    // Float to int casts saturate, so far off-screen vertices clamp cleanly.
    let min_x = (p0.x.min(p1.x).min(p2.x).floor() as i64).max(0);
    let max_x = (p0.x.max(p1.x).max(p2.x).ceil() as i64).min(target.width() as i64 - 1);
    let min_y = (p0.y.min(p1.y).min(p2.y).floor() as i64).max(target.row_begin() as i64);
    let max_y = (p0.y.max(p1.y).max(p2.y).ceil() as i64).min(target.row_end() as i64 - 1);

    for py in min_y..=max_y {
        for px in min_x..=max_x {
            let (x, y) = (px as u32, py as u32);
            let center = vector![x as f32 + 0.5, y as f32 + 0.5];
            let Some(weights) = setup.weights(center) else {
                continue;
            };

            let depth = interpolate_depth(v, weights);
            if !(depth < target.depth(x, y)) {
                continue;
            }
            target.set_depth(x, y, depth);

            let fragment = interpolate(v, weights, x, y, depth);
            target.set_pixel(x, y, quantize(shader.shade(&fragment)));
        }
    }
}

/// Rasterizes every triangle in submission order.
pub fn render_triangles(
    target: &mut RenderTarget<'_>,
    vertices: &[ScreenVertex],
    triangles: impl Iterator<Item = [usize; 3]>,
    shader: &PixelShader,
) {
    for [a, b, c] in triangles {
        rasterize_triangle(target, [&vertices[a], &vertices[b], &vertices[c]], shader);
    }
}

/// Same result as `render_triangles` over the whole frame, with the rows split into bands
/// rendered concurrently on `pool`. Every worker owns its band's pixels and walks all
/// triangles in submission order, so per-pixel results do not depend on scheduling.
pub fn render_banded(
    pool: &ThreadPool,
    frame: &mut FrameLock<'_>,
    vertices: &Arc<Vec<ScreenVertex>>,
    indices: &Arc<[u32]>,
    topology: Topology,
    shader: &PixelShader,
) {
    let bands = frame.split_bands(pool.max_count() as u32);
    let band_count = bands.len();
    let (sender, receiver) = mpsc::channel();

    for mut band in bands {
        let sender = sender.clone();
        let vertices = Arc::clone(vertices);
        let indices = Arc::clone(indices);
        let shader = shader.clone();
        pool.execute(move || {
            render_triangles(&mut band.target(), &vertices, triangles(&indices, topology), &shader);
            // The receiver only goes away if the frame was abandoned.
            let _ = sender.send(band);
        });
    }
    drop(sender);

    let mut merged = 0;
    for band in receiver.iter() {
        frame.merge_band(band);
        merged += 1;
    }
    if merged != band_count {
        warn!("{} of {} raster bands were lost to a panicking worker", band_count - merged, band_count);
    }
}
