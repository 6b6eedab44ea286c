use nalgebra as na;
use na::{matrix, vector, Matrix4, Rotation3, Vector3};

use crate::util::transform_vector;

/// Per-frame camera matrices consumed by the vertex transform stage.
#[derive(Debug, Clone, Copy)]
pub struct CameraView {
    /// Inverse of the camera's world transform, i.e. world to camera space.
    pub inv_view: Matrix4<f32>,
    /// Left-handed perspective, view z in [near, far] mapped to NDC z in [0, 1].
    pub projection: Matrix4<f32>,
    /// Camera position in world space.
    pub origin: Vector3<f32>,
}

/// Which movement keys are currently held.
#[derive(Debug, Default, Clone, Copy)]
pub struct CameraInput {
    pub forward: bool,
    pub backward: bool,
    pub left: bool,
    pub right: bool,
    pub yaw_left: bool,
    pub yaw_right: bool,
    pub pitch_up: bool,
    pub pitch_down: bool,
    pub boost: bool,
}

/// First person camera in a left-handed frame (+z forward, +y up).
pub struct Camera {
    pub origin: Vector3<f32>,
    pub fov_angle: f32,
    pub aspect_ratio: f32,
    pub near_plane: f32,
    pub far_plane: f32,
    pub total_pitch: f32,
    pub total_yaw: f32,
}

impl Camera {
    pub fn new(aspect_ratio: f32, fov_angle: f32, origin: Vector3<f32>) -> Self {
        return Self {
            origin,
            fov_angle,
            aspect_ratio,
            near_plane: 0.1,
            far_plane: 100.0,
            total_pitch: 0.0,
            total_yaw: 0.0,
        };
    }

    fn rotation(&self) -> Matrix4<f32> {
        return Rotation3::from_euler_angles(self.total_pitch, self.total_yaw, 0.0).to_homogeneous();
    }

    pub fn forward(&self) -> Vector3<f32> {
        return transform_vector(&self.rotation(), Vector3::z()).normalize();
    }

    pub fn right(&self) -> Vector3<f32> {
        return Vector3::y().cross(&self.forward()).normalize();
    }

    /// Moves and turns the camera according to held keys.
    pub fn update(&mut self, input: &CameraInput, delta_seconds: f32) {
        // Very high frame rates would otherwise barely move the camera.
        let step = delta_seconds.max(1.0 / 30.0);
        let mut move_speed = 5.0 * step;
        let rotate_speed = 1.0 * step;
        if input.boost {
            move_speed *= 2.0;
        }

        let forward = self.forward();
        let right = self.right();
        let axis = |positive: bool, negative: bool| (positive as i32 - negative as i32) as f32;
        self.origin += forward * axis(input.forward, input.backward) * move_speed;
        self.origin += right * axis(input.right, input.left) * move_speed;
        self.total_yaw += axis(input.yaw_right, input.yaw_left) * rotate_speed;
        self.total_pitch = (self.total_pitch + axis(input.pitch_down, input.pitch_up) * rotate_speed)
            .clamp(-std::f32::consts::FRAC_PI_2 + 0.01, std::f32::consts::FRAC_PI_2 - 0.01);
    }

    pub fn view(&self) -> CameraView {
        return CameraView {
            inv_view: look_at_lh(self.origin, self.forward(), Vector3::y()),
            projection: perspective_fov_lh(
                (self.fov_angle.to_radians() / 2.0).tan(),
                self.aspect_ratio,
                self.near_plane,
                self.far_plane,
            ),
            origin: self.origin,
        };
    }
}

/// World to camera transform for a camera at `origin` looking along `forward`.
pub fn look_at_lh(origin: Vector3<f32>, forward: Vector3<f32>, up: Vector3<f32>) -> Matrix4<f32> {
    let f = forward.normalize();
    let r = up.cross(&f).normalize();
    let u = f.cross(&r);
    return matrix![r.x, r.y, r.z, -r.dot(&origin);
                   u.x, u.y, u.z, -u.dot(&origin);
                   f.x, f.y, f.z, -f.dot(&origin);
                   0.0, 0.0, 0.0, 1.0];
}

/// Perspective projection with `fov` = tan(half vertical angle). Clip w holds view z.
pub fn perspective_fov_lh(fov: f32, aspect_ratio: f32, near: f32, far: f32) -> Matrix4<f32> {
    let a = far / (far - near);
    let b = -(far * near) / (far - near);
    return matrix![1.0 / (aspect_ratio * fov), 0.0,       0.0, 0.0;
                   0.0,                        1.0 / fov, 0.0, 0.0;
                   0.0,                        0.0,       a,   b;
                   0.0,                        0.0,       1.0, 0.0];
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::{to_hom_point, transform_point};

    fn project(m: &Matrix4<f32>, p: Vector3<f32>) -> Vector3<f32> {
        let clip = transform_point(m, p);
        return clip.xyz() / clip.w;
    }

    #[test]
    fn test_default_camera_looks_down_z() {
        let camera = Camera::new(1.0, 90.0, Vector3::zeros());
        assert!((camera.forward() - Vector3::z()).norm() < 1e-6);
        assert!((camera.right() - Vector3::x()).norm() < 1e-6);
    }

    #[test]
    fn test_projection_maps_near_far_to_unit_depth() {
        let view = Camera::new(1.0, 90.0, Vector3::zeros()).view();
        let m = view.projection * view.inv_view;
        let near = project(&m, vector![0.0, 0.0, 0.1]);
        let far = project(&m, vector![0.0, 0.0, 100.0]);
        assert!(near.z.abs() < 1e-5);
        assert!((far.z - 1.0).abs() < 1e-5);

        // Clip w is the view-space depth.
        let clip = m * to_hom_point(vector![0.0, 0.0, 50.0]);
        assert!((clip.w - 50.0).abs() < 1e-4);
    }

    #[test]
    fn test_view_moves_origin_to_zero() {
        let camera = Camera::new(1.0, 45.0, vector![1.0, 2.0, 3.0]);
        let view = camera.view();
        let p = project(&view.inv_view, camera.origin);
        assert!(p.norm() < 1e-5);
    }

    #[test]
    fn test_update_moves_forward() {
        let mut camera = Camera::new(1.0, 45.0, Vector3::zeros());
        let input = CameraInput { forward: true, ..Default::default() };
        camera.update(&input, 1.0);
        assert!(camera.origin.z > 0.0);
        assert!(camera.origin.x.abs() < 1e-6);
    }
}
