use nalgebra as na;
use na::{vector, Matrix4, Vector3, Vector4};

/// Linear RGB color with channels nominally in [0.0, 1.0].
/// Channels may exceed 1.0 during shading; see `max_to_one`.
pub type Color = Vector3<f32>;

/// Transformation of a point to homogenous coordinates.
pub fn to_hom_point(v: Vector3<f32>) -> Vector4<f32> {
    return vector![v.x, v.y, v.z, 1.0];
}

/// Transformation of a vector to homogenous coordinates.
pub fn to_hom_vector(v: Vector3<f32>) -> Vector4<f32> {
    return vector![v.x, v.y, v.z, 0.0];
}

/// Transformation of a vector from homogenous coordinates.
pub fn from_hom_vector(v: Vector4<f32>) -> Vector3<f32> {
    return vector![v.x, v.y, v.z];
}

/// Applies `m` to a point, keeping the resulting w untouched (no perspective divide).
pub fn transform_point(m: &Matrix4<f32>, p: Vector3<f32>) -> Vector4<f32> {
    return m * to_hom_point(p);
}

/// Applies `m` to a direction, ignoring translation.
pub fn transform_vector(m: &Matrix4<f32>, v: Vector3<f32>) -> Vector3<f32> {
    return from_hom_vector(m * to_hom_vector(v));
}

/// Lambert's law: reflectance `kd` times diffuse color `cd`, over pi.
pub fn lambert(kd: f32, cd: Color) -> Color {
    return cd * kd / std::f32::consts::PI;
}

/// Scales the color down uniformly if its largest channel exceeds 1.0, preserving hue.
pub fn max_to_one(color: Color) -> Color {
    let max = color.max();
    if max > 1.0 {
        return color / max;
    }
    return color;
}

/// Linear remap of `value` from [min, max] to [0, 1], clamped.
pub fn remap(value: f32, min: f32, max: f32) -> f32 {
    return ((value - min) / (max - min)).clamp(0.0, 1.0);
}

/// Quantizes a color with channels in [0.0, 1.0] to rgb8.
/// Negative channels saturate to 0 on the cast.
pub fn quantize(color: Color) -> [u8; 3] {
    return [
        (color.x * 255.0) as u8,
        (color.y * 255.0) as u8,
        (color.z * 255.0) as u8,
    ];
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hom_point_and_vector() {
        assert_eq!(to_hom_point(vector![1.0, 2.0, 3.0]), vector![1.0, 2.0, 3.0, 1.0]);
        assert_eq!(from_hom_vector(to_hom_vector(vector![1.0, 2.0, 3.0])), vector![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_transform_vector_ignores_translation() {
        let m = Matrix4::new_translation(&vector![5.0, 6.0, 7.0]);
        let v = transform_vector(&m, vector![1.0, 0.0, 0.0]);
        assert_eq!(v, vector![1.0, 0.0, 0.0]);
        let p = transform_point(&m, vector![1.0, 0.0, 0.0]);
        assert_eq!(p, vector![6.0, 6.0, 7.0, 1.0]);
    }

    #[test]
    fn test_max_to_one_preserves_ratio() {
        let c = max_to_one(vector![2.0, 1.0, 0.5]);
        assert!((c.x - 1.0).abs() < 1e-6);
        assert!((c.y - 0.5).abs() < 1e-6);
        assert!((c.z - 0.25).abs() < 1e-6);

        let untouched = max_to_one(vector![0.2, 0.3, 0.4]);
        assert_eq!(untouched, vector![0.2, 0.3, 0.4]);
    }

    #[test]
    fn test_remap_clamps() {
        assert_eq!(remap(0.5, 0.985, 1.0), 0.0);
        assert_eq!(remap(2.0, 0.985, 1.0), 1.0);
        assert!((remap(0.9925, 0.985, 1.0) - 0.5).abs() < 1e-3);
    }

    #[test]
    fn test_quantize() {
        assert_eq!(quantize(vector![1.0, 0.0, 0.5]), [255, 0, 127]);
        assert_eq!(quantize(vector![-0.5, 0.0, 0.0]), [0, 0, 0]);
    }
}
