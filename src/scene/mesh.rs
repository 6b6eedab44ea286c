use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;

use log::{debug, info};
use nalgebra as na;
use na::{vector, Matrix4, Rotation3, Vector2, Vector3};
use obj::{load_obj as parse_obj, Obj, TexturedVertex};

use crate::error::RenderError;

/// Model space vertex as loaded from disk.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Vertex {
    pub position: Vector3<f32>,
    pub uv: Vector2<f32>,
    pub normal: Vector3<f32>,
    pub tangent: Vector3<f32>,
}

/// How an index list groups vertices into triangles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Topology {
    /// Consecutive, non-overlapping triples.
    #[value(name = "list")]
    TriangleList,
    /// Sliding window of three, winding swapped on odd steps.
    #[value(name = "strip")]
    TriangleStrip,
}

/// Decodes an index list into vertex index triples.
///
/// Odd strip steps emit `[i, i + 2, i + 1]` so every triangle keeps the winding of the first one.
pub fn triangles(indices: &[u32], topology: Topology) -> impl Iterator<Item = [usize; 3]> + '_ {
    let count = match topology {
        Topology::TriangleList => indices.len() / 3,
        Topology::TriangleStrip => indices.len().saturating_sub(2),
    };
    return (0..count).map(move |i| {
        let [a, b, c] = match topology {
            Topology::TriangleList => [3 * i, 3 * i + 1, 3 * i + 2],
            Topology::TriangleStrip if i % 2 == 0 => [i, i + 1, i + 2],
            Topology::TriangleStrip => [i, i + 2, i + 1],
        };
        [indices[a] as usize, indices[b] as usize, indices[c] as usize]
    });
}

/// The single mesh instance: immutable vertices and indices plus a mutable world transform.
#[derive(Debug, Clone)]
pub struct Mesh {
    vertices: Vec<Vertex>,
    indices: Arc<[u32]>,
    topology: Topology,
    world: Matrix4<f32>,
}

impl Mesh {
    /// Validates indices against the vertex count and topology.
    /// The world matrix starts as a translation 50 units in front of the origin.
    pub fn new(vertices: Vec<Vertex>, indices: Vec<u32>, topology: Topology) -> Result<Self, RenderError> {
        let count_ok = match topology {
            Topology::TriangleList => indices.len() % 3 == 0,
            Topology::TriangleStrip => indices.is_empty() || indices.len() >= 3,
        };
        if !count_ok {
            return Err(RenderError::IndexCount { count: indices.len(), topology });
        }
        if let Some((position, &index)) = indices
            .iter()
            .enumerate()
            .find(|&(_, &index)| index as usize >= vertices.len())
        {
            return Err(RenderError::IndexOutOfRange {
                index,
                position,
                vertex_count: vertices.len(),
            });
        }

        return Ok(Self {
            vertices,
            indices: indices.into(),
            topology,
            world: Matrix4::new_translation(&vector![0.0, 0.0, 50.0]),
        });
    }

    pub fn with_world(mut self, world: Matrix4<f32>) -> Self {
        self.world = world;
        return self;
    }

    pub fn vertices(&self) -> &[Vertex] {
        return &self.vertices;
    }

    pub fn indices(&self) -> &Arc<[u32]> {
        return &self.indices;
    }

    pub fn topology(&self) -> Topology {
        return self.topology;
    }

    pub fn world(&self) -> &Matrix4<f32> {
        return &self.world;
    }

    pub fn triangles(&self) -> impl Iterator<Item = [usize; 3]> + '_ {
        return triangles(&self.indices, self.topology);
    }

    /// Spins the mesh around its own Y axis.
    pub fn rotate_y(&mut self, degrees_per_second: f32, delta_seconds: f32) {
        let angle = (degrees_per_second * delta_seconds).to_radians();
        let rotation = Rotation3::from_axis_angle(&Vector3::y_axis(), angle).to_homogeneous();
        self.world *= rotation;
    }

    /// Re-encodes a triangle list as a strip that decodes to exactly the same triangles,
    /// in the same order and vertex order, stitched together with zero-area triangles.
    pub fn to_strip(&self) -> Result<Mesh, RenderError> {
        if self.topology == Topology::TriangleStrip {
            return Ok(self.clone());
        }

        let mut strip: Vec<u32> = Vec::with_capacity(self.indices.len() * 2);
        for [a, b, c] in self.triangles() {
            let (a, b, c) = (a as u32, b as u32, c as u32);
            // Each real triangle must start at an even position, preceded by a copy of its
            // first index, so that every window overlapping the seam repeats an index.
            if let Some(&last) = strip.last() {
                strip.extend_from_slice(&[last, last, a]);
            }
            strip.extend_from_slice(&[a, b, c]);
        }
        debug!("converted {} list indices into {} strip indices", self.indices.len(), strip.len());

        let mesh = Mesh::new(self.vertices.clone(), strip, Topology::TriangleStrip)?;
        return Ok(mesh.with_world(self.world));
    }
}

/// Loads a Wavefront OBJ file, converting it to the renderer's left-handed frame.
///
/// Z is negated and the winding reversed to match, V is flipped because images are stored
/// top row first, and tangents are generated from the UV layout.
pub fn load_obj(path: impl AsRef<Path>) -> Result<Mesh, RenderError> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|source| RenderError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let model: Obj<TexturedVertex, u32> = parse_obj(BufReader::new(file)).map_err(|source| RenderError::Obj {
        path: path.to_path_buf(),
        source,
    })?;
    info!("Number of vertices - {}", model.vertices.len());
    info!("Number of indices  - {}", model.indices.len());

    let mut vertices: Vec<Vertex> = model
        .vertices
        .iter()
        .map(|v| Vertex {
            position: vector![v.position[0], v.position[1], -v.position[2]],
            uv: vector![v.texture[0], 1.0 - v.texture[1]],
            normal: vector![v.normal[0], v.normal[1], -v.normal[2]],
            tangent: Vector3::zeros(),
        })
        .collect();

    let mut indices = model.indices;
    for face in indices.chunks_exact_mut(3) {
        face.swap(1, 2);
    }

    generate_tangents(&mut vertices, &indices);
    return Mesh::new(vertices, indices, Topology::TriangleList);
}

/// Accumulates per-triangle tangents from UV gradients, then orthogonalises each against its normal.
pub fn generate_tangents(vertices: &mut [Vertex], indices: &[u32]) {
    for v in vertices.iter_mut() {
        v.tangent = Vector3::zeros();
    }

    for face in indices.chunks_exact(3) {
        let [i0, i1, i2] = [face[0] as usize, face[1] as usize, face[2] as usize];
        let edge_1 = vertices[i1].position - vertices[i0].position;
        let edge_2 = vertices[i2].position - vertices[i0].position;
        let duv_1 = vertices[i1].uv - vertices[i0].uv;
        let duv_2 = vertices[i2].uv - vertices[i0].uv;

        let det = duv_1.x * duv_2.y - duv_2.x * duv_1.y;
        if det.abs() < f32::EPSILON {
            continue;
        }
        let tangent = (edge_1 * duv_2.y - edge_2 * duv_1.y) / det;
        for i in [i0, i1, i2] {
            vertices[i].tangent += tangent;
        }
    }

    for v in vertices.iter_mut() {
        let projected = v.tangent - v.normal * v.normal.dot(&v.tangent);
        v.tangent = match projected.try_normalize(1.0e-6) {
            Some(t) => t,
            // No usable UV gradient; any unit vector perpendicular to the normal will do.
            None => v.normal.cross(&Vector3::x()).try_normalize(1.0e-6)
                .unwrap_or_else(|| v.normal.cross(&Vector3::y()).normalize()),
        };
    }
}
