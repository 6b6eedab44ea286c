pub mod buffer;
pub mod mesh;
pub mod raster;
pub mod shader;
pub mod texture;
pub mod transform;

use std::sync::Arc;

use log::debug;
use nalgebra::Vector3;
use threadpool::ThreadPool;

use crate::camera::CameraView;
use crate::util::Color;
use buffer::FrameBuffer;
use mesh::{triangles, Mesh};
use shader::{default_light_direction, PixelShader, ShadingMode, ShadingState};
use texture::Material;
use transform::VertexStage;

/// Everything needed to turn the mesh into a frame: the mesh itself, its material, the
/// shading toggles and the buffers reused from frame to frame.
pub struct Scene {
    pub width: u32,
    pub height: u32,
    mesh: Mesh,
    material: Arc<Material>,
    shading: ShadingState,
    light_direction: Vector3<f32>,
    vertex_stage: VertexStage,
    frame_buffer: FrameBuffer,
    pool: Option<ThreadPool>,
}

impl Scene {
    /// With `threads` > 1 rows are rasterized in parallel bands, otherwise on the caller's thread.
    pub fn new(width: u32, height: u32, mesh: Mesh, material: Material, threads: usize) -> Scene {
        let pool = if threads > 1 {
            debug!("rasterizing on {} worker threads", threads);
            Some(ThreadPool::with_name(String::from("raster"), threads))
        } else {
            None
        };
        return Scene {
            width,
            height,
            mesh,
            material: Arc::new(material),
            shading: ShadingState::default(),
            light_direction: default_light_direction(),
            vertex_stage: VertexStage::new(),
            frame_buffer: FrameBuffer::new(width, height),
            pool,
        };
    }

    pub fn mesh(&self) -> &Mesh {
        return &self.mesh;
    }

    pub fn shading(&self) -> ShadingState {
        return self.shading;
    }

    pub fn frame_buffer(&self) -> &FrameBuffer {
        return &self.frame_buffer;
    }

    /// Last completed frame as rgb8 bytes.
    pub fn as_render_data(&self) -> &[u8] {
        return self.frame_buffer.as_render_data();
    }

    pub fn cycle_shading_mode(&mut self) -> ShadingMode {
        return self.shading.cycle_shading_mode();
    }

    pub fn toggle_depth_buffer(&mut self) -> bool {
        return self.shading.toggle_depth_buffer();
    }

    pub fn toggle_normal_map(&mut self) -> bool {
        return self.shading.toggle_normal_map();
    }

    /// Advances the mesh rotation by `delta_seconds`.
    pub fn update(&mut self, degrees_per_second: f32, delta_seconds: f32) {
        self.mesh.rotate_y(degrees_per_second, delta_seconds);
    }

    /// Renders one complete frame: transform, then rasterize and shade every triangle in
    /// submission order. The frame buffer only changes inside this call.
    pub fn render(&mut self, view: &CameraView, clear_color: Color) {
        let vertices = self.vertex_stage.run(&self.mesh, view, self.width, self.height);
        let shader = PixelShader::new(Arc::clone(&self.material), self.shading, self.light_direction);

        let mut frame = self.frame_buffer.lock(clear_color);
        match &self.pool {
            Some(pool) => raster::render_banded(
                pool,
                &mut frame,
                &vertices,
                self.mesh.indices(),
                self.mesh.topology(),
                &shader,
            ),
            None => raster::render_triangles(
                &mut frame.target(),
                &vertices,
                triangles(self.mesh.indices(), self.mesh.topology()),
                &shader,
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::Camera;
    use crate::scene::mesh::{generate_tangents, Topology, Vertex};
    use crate::scene::texture::Texture;
    use image::Rgb;
    use nalgebra::vector;

    /// A 10x10 quad facing the camera, 50 units ahead once the default world is applied.
    fn quad() -> Mesh {
        let corner = |x: f32, y: f32| Vertex {
            position: vector![x, y, 0.0],
            uv: vector![(x + 5.0) / 10.0, (5.0 - y) / 10.0],
            normal: vector![0.0, 0.0, -1.0],
            tangent: Vector3::zeros(),
        };
        let mut vertices = vec![corner(-5.0, 5.0), corner(5.0, 5.0), corner(-5.0, -5.0), corner(5.0, -5.0)];
        let indices = vec![0, 1, 2, 2, 1, 3];
        generate_tangents(&mut vertices, &indices);
        return Mesh::new(vertices, indices, Topology::TriangleList).unwrap();
    }

    fn checker_material() -> Material {
        let checker = |x: u32, y: u32| {
            if (x / 4 + y / 4) % 2 == 0 {
                Rgb([220, 40, 40])
            } else {
                Rgb([30, 200, 90])
            }
        };
        return Material {
            diffuse: Texture::from_fn(32, 32, checker),
            normal: Texture::from_color(1, 1, vector![0.5, 0.5, 1.0]),
            gloss: Texture::from_color(1, 1, vector![0.6, 0.6, 0.6]),
            specular: Texture::from_color(1, 1, vector![0.8, 0.8, 0.8]),
        };
    }

    fn view() -> CameraView {
        return Camera::new(1.0, 45.0, Vector3::zeros()).view();
    }

    fn clear() -> Color {
        return vector![0.39, 0.39, 0.39];
    }

    #[test]
    fn test_renders_quad_in_center() {
        let mut scene = Scene::new(64, 64, quad(), checker_material(), 1);
        scene.render(&view(), clear());

        let frame = scene.frame_buffer();
        assert_eq!(frame.frame_index(), 1);
        // Quad spans about a quarter of the 45 degree field of view at distance 50.
        assert!(frame.depth(32, 32).is_finite());
        assert!(frame.depth(1, 1).is_infinite());
        assert_eq!(frame.pixel(1, 1), [99, 99, 99]);
        assert_ne!(frame.pixel(32, 32), [99, 99, 99]);
    }

    #[test]
    fn test_same_inputs_give_identical_frames() {
        let mut scene = Scene::new(48, 48, quad(), checker_material(), 1);
        scene.render(&view(), clear());
        let first = scene.as_render_data().to_vec();
        scene.render(&view(), clear());
        assert_eq!(first, scene.as_render_data());
        assert_eq!(scene.frame_buffer().frame_index(), 2);
    }

    #[test]
    fn test_parallel_matches_serial() {
        let mut serial = Scene::new(80, 60, quad(), checker_material(), 1);
        let mut parallel = Scene::new(80, 60, quad(), checker_material(), 4);
        for scene in [&mut serial, &mut parallel] {
            scene.update(30.0, 1.0);
            scene.render(&view(), clear());
        }
        assert_eq!(serial.as_render_data(), parallel.as_render_data());
        assert_eq!(serial.frame_buffer().depth_data(), parallel.frame_buffer().depth_data());
    }

    #[test]
    fn test_strip_matches_list() {
        let list_mesh = quad();
        let strip_mesh = list_mesh.to_strip().unwrap();
        let mut list = Scene::new(64, 64, list_mesh, checker_material(), 1);
        let mut strip = Scene::new(64, 64, strip_mesh, checker_material(), 1);
        list.render(&view(), clear());
        strip.render(&view(), clear());
        assert_eq!(list.as_render_data(), strip.as_render_data());
    }

    #[test]
    fn test_toggles_change_output() {
        let mut scene = Scene::new(64, 64, quad(), checker_material(), 1);
        scene.render(&view(), clear());
        let combined = scene.as_render_data().to_vec();

        assert_eq!(scene.cycle_shading_mode(), ShadingMode::ObservedArea);
        scene.render(&view(), clear());
        let observed = scene.as_render_data().to_vec();
        assert_ne!(combined, observed);
        // Observed area is grey.
        let [r, g, b] = scene.frame_buffer().pixel(32, 32);
        assert!(r == g && g == b);

        assert!(scene.toggle_depth_buffer());
        scene.render(&view(), clear());
        assert_ne!(observed, scene.as_render_data());

        assert!(!scene.toggle_depth_buffer());
        scene.render(&view(), clear());
        assert_eq!(observed, scene.as_render_data());
        assert_eq!(scene.shading().shading_mode, ShadingMode::ObservedArea);
    }

    #[test]
    fn test_update_rotates_mesh() {
        let mut scene = Scene::new(16, 16, quad(), checker_material(), 1);
        let before = *scene.mesh().world();
        scene.update(45.0, 2.0);
        let x = scene.mesh().world() * vector![1.0, 0.0, 0.0, 0.0];
        assert_ne!(before, *scene.mesh().world());
        assert!(x.x.abs() < 1e-6);
    }
}
