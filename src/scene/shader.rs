use std::sync::Arc;

use log::info;
use nalgebra as na;
use na::{vector, Matrix3, Vector2, Vector3};

use super::texture::Material;
use crate::util::{lambert, max_to_one, remap, Color};

/// Light intensity fed to the Lambert term.
pub const LIGHT_INTENSITY: f32 = 7.0;
/// Phong exponent before scaling by the gloss map.
pub const SHININESS: f32 = 25.0;
/// Constant term added in `Combined` mode only.
pub const AMBIENT: f32 = 0.025;
/// Depth range stretched to full brightness in depth buffer visualization. Depth values of a
/// perspective projection crowd towards 1, so anything nearer than the lower bound shows black.
pub const DEPTH_REMAP_RANGE: (f32, f32) = (0.985, 1.0);

/// Default directional light, pointing away from the light source.
pub fn default_light_direction() -> Vector3<f32> {
    return vector![0.577, -0.577, 0.577].normalize();
}

/// What the lit path computes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShadingMode {
    Combined,
    Diffuse,
    ObservedArea,
    Specular,
}

impl ShadingMode {
    /// Cycle order: Combined, ObservedArea, Diffuse, Specular, back to Combined.
    pub fn next(self) -> Self {
        return match self {
            ShadingMode::Combined => ShadingMode::ObservedArea,
            ShadingMode::ObservedArea => ShadingMode::Diffuse,
            ShadingMode::Diffuse => ShadingMode::Specular,
            ShadingMode::Specular => ShadingMode::Combined,
        };
    }

    pub fn label(self) -> &'static str {
        return match self {
            ShadingMode::Combined => "COMBINED",
            ShadingMode::Diffuse => "DIFFUSE",
            ShadingMode::ObservedArea => "OBSERVED_AREA",
            ShadingMode::Specular => "SPECULAR",
        };
    }
}

/// What actually ends up on screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayMode {
    Lit(ShadingMode),
    DepthBuffer,
}

/// Shading toggles. The lighting mode and the depth visualization flag are independent, so
/// leaving depth visualization always returns to the lighting mode selected before (or while)
/// it was on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShadingState {
    pub shading_mode: ShadingMode,
    pub show_depth: bool,
    pub use_normal_map: bool,
}

impl Default for ShadingState {
    fn default() -> Self {
        return Self {
            shading_mode: ShadingMode::Combined,
            show_depth: false,
            use_normal_map: true,
        };
    }
}

impl ShadingState {
    pub fn cycle_shading_mode(&mut self) -> ShadingMode {
        self.shading_mode = self.shading_mode.next();
        info!("**(SOFTWARE) Shading Mode = {}", self.shading_mode.label());
        return self.shading_mode;
    }

    pub fn toggle_depth_buffer(&mut self) -> bool {
        self.show_depth = !self.show_depth;
        info!(
            "**(SOFTWARE) DepthBuffer Visualization {}",
            if self.show_depth { "ON" } else { "OFF" }
        );
        return self.show_depth;
    }

    pub fn toggle_normal_map(&mut self) -> bool {
        self.use_normal_map = !self.use_normal_map;
        info!(
            "**(SOFTWARE) NormalMap {}",
            if self.use_normal_map { "ON" } else { "OFF" }
        );
        return self.use_normal_map;
    }

    /// Depth visualization wins over any lighting mode.
    pub fn display_mode(&self) -> DisplayMode {
        if self.show_depth {
            return DisplayMode::DepthBuffer;
        }
        return DisplayMode::Lit(self.shading_mode);
    }
}

/// Attributes of one covered pixel after perspective correct interpolation.
/// Normal, tangent and view direction are unit length.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fragment {
    pub x: u32,
    pub y: u32,
    /// Interpolated NDC depth, the value stored in the depth buffer.
    pub depth: f32,
    pub uv: Vector2<f32>,
    pub normal: Vector3<f32>,
    pub tangent: Vector3<f32>,
    pub view_direction: Vector3<f32>,
}

/// Per-frame pixel shader: shared material, a snapshot of the toggles and the light.
/// Cheap to clone into worker threads.
#[derive(Debug, Clone)]
pub struct PixelShader {
    material: Arc<Material>,
    state: ShadingState,
    light_direction: Vector3<f32>,
}

impl PixelShader {
    pub fn new(material: Arc<Material>, state: ShadingState, light_direction: Vector3<f32>) -> Self {
        return Self {
            material,
            state,
            light_direction,
        };
    }

    /// Normal used for lighting: the normal map sample moved from tangent space into world
    /// space when normal mapping is on, the interpolated normal otherwise.
    fn shading_normal(&self, fragment: &Fragment) -> Vector3<f32> {
        if !self.state.use_normal_map {
            return fragment.normal;
        }
        let binormal = fragment.normal.cross(&fragment.tangent);
        let tangent_space = Matrix3::from_columns(&[fragment.tangent, binormal, fragment.normal]);
        let sample = self.material.normal.sample(fragment.uv);
        let tangent_normal = sample * 2.0 - vector![1.0, 1.0, 1.0];
        return (tangent_space * tangent_normal).normalize();
    }

    /// Final color of a fragment, before quantization. No channel exceeds 1.
    pub fn shade(&self, fragment: &Fragment) -> Color {
        let normal = self.shading_normal(fragment);
        let lambert_cosine = normal.dot(&-self.light_direction);

        let color = match self.state.display_mode() {
            DisplayMode::DepthBuffer => {
                let remapped = remap(fragment.depth, DEPTH_REMAP_RANGE.0, DEPTH_REMAP_RANGE.1);
                vector![remapped, remapped, remapped]
            }
            DisplayMode::Lit(_) if lambert_cosine <= 0.0 => Color::zeros(),
            DisplayMode::Lit(mode) => self.lit(fragment, normal, lambert_cosine, mode),
        };
        return max_to_one(color);
    }

    fn lit(&self, fragment: &Fragment, normal: Vector3<f32>, lambert_cosine: f32, mode: ShadingMode) -> Color {
        let uv = fragment.uv;

        // Phong. The view direction points from the camera to the surface, so the mirrored
        // light-facing vector is compared against it directly.
        let to_light = -self.light_direction;
        let reflected = to_light - 2.0 * normal.dot(&to_light).max(0.0) * normal;
        let alpha = reflected.dot(&fragment.view_direction).max(0.0);
        let exponent = SHININESS * self.material.gloss.sample(uv).x;
        let specular = (self.material.specular.sample(uv) * alpha.powf(exponent)).map(|c| c.max(0.0));

        let diffuse = lambert(LIGHT_INTENSITY, self.material.diffuse.sample(uv));
        let ambient = vector![AMBIENT, AMBIENT, AMBIENT];

        return match mode {
            ShadingMode::Combined => (diffuse + specular + ambient) * lambert_cosine,
            ShadingMode::Diffuse => diffuse * lambert_cosine,
            ShadingMode::ObservedArea => vector![lambert_cosine, lambert_cosine, lambert_cosine],
            ShadingMode::Specular => specular * lambert_cosine,
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::texture::Texture;

    fn material(diffuse: Color, specular: Color, gloss: f32) -> Arc<Material> {
        return Arc::new(Material {
            diffuse: Texture::from_color(2, 2, diffuse),
            // Straight up in tangent space.
            normal: Texture::from_color(2, 2, vector![0.5, 0.5, 1.0]),
            gloss: Texture::from_color(2, 2, vector![gloss, gloss, gloss]),
            specular: Texture::from_color(2, 2, specular),
        });
    }

    fn facing_fragment() -> Fragment {
        return Fragment {
            x: 0,
            y: 0,
            depth: 0.5,
            uv: vector![0.5, 0.5],
            normal: vector![0.0, 0.0, -1.0],
            tangent: vector![1.0, 0.0, 0.0],
            view_direction: vector![0.0, 0.0, 1.0],
        };
    }

    fn shader(material: Arc<Material>, state: ShadingState) -> PixelShader {
        // Light travels along +z, straight into the fragment normal: lambert = 1.
        return PixelShader::new(material, state, vector![0.0, 0.0, 1.0]);
    }

    fn state(mode: ShadingMode) -> ShadingState {
        return ShadingState {
            shading_mode: mode,
            show_depth: false,
            use_normal_map: false,
        };
    }

    #[test]
    fn test_cycle_returns_after_four_steps() {
        let mut s = ShadingState::default();
        let order: Vec<_> = (0..4).map(|_| s.cycle_shading_mode()).collect();
        assert_eq!(
            order,
            vec![
                ShadingMode::ObservedArea,
                ShadingMode::Diffuse,
                ShadingMode::Specular,
                ShadingMode::Combined
            ]
        );
        assert_eq!(s, ShadingState::default());
    }

    #[test]
    fn test_depth_toggle_restores_lighting_mode() {
        let mut s = ShadingState::default();
        s.cycle_shading_mode();
        s.toggle_depth_buffer();
        assert_eq!(s.display_mode(), DisplayMode::DepthBuffer);
        s.toggle_depth_buffer();
        assert_eq!(s.display_mode(), DisplayMode::Lit(ShadingMode::ObservedArea));
    }

    #[test]
    fn test_cycle_while_depth_shown_applies_after_toggle_off() {
        let mut s = ShadingState::default();
        s.toggle_depth_buffer();
        s.cycle_shading_mode();
        assert_eq!(s.display_mode(), DisplayMode::DepthBuffer);
        s.toggle_depth_buffer();
        assert_eq!(s.display_mode(), DisplayMode::Lit(ShadingMode::ObservedArea));
    }

    #[test]
    fn test_diffuse_is_intensity_over_pi() {
        let m = material(vector![0.3, 0.3, 0.3], Color::zeros(), 1.0);
        let grey = m.diffuse.sample(vector![0.5, 0.5]).x;
        let c = shader(m, state(ShadingMode::Diffuse)).shade(&facing_fragment());
        let expected = grey * LIGHT_INTENSITY / std::f32::consts::PI;
        assert!(expected < 1.0);
        assert!((c.x - expected).abs() < 1e-5);
        assert_eq!(c.x, c.y);
        assert_eq!(c.y, c.z);
    }

    #[test]
    fn test_white_diffuse_clamps_to_one() {
        let m = material(vector![1.0, 1.0, 1.0], Color::zeros(), 1.0);
        let c = shader(m, state(ShadingMode::Diffuse)).shade(&facing_fragment());
        assert_eq!(c, vector![1.0, 1.0, 1.0]);
    }

    #[test]
    fn test_observed_area_is_cosine() {
        let m = material(Color::zeros(), Color::zeros(), 1.0);
        let tilt = std::f32::consts::FRAC_PI_3;
        let s = PixelShader::new(m, state(ShadingMode::ObservedArea), vector![tilt.sin(), 0.0, tilt.cos()]);
        let c = s.shade(&facing_fragment());
        assert!((c.x - tilt.cos()).abs() < 1e-5);
    }

    #[test]
    fn test_back_lit_is_black_even_in_combined() {
        let m = material(vector![1.0, 1.0, 1.0], vector![1.0, 1.0, 1.0], 1.0);
        let s = PixelShader::new(m, state(ShadingMode::Combined), vector![0.0, 0.0, -1.0]);
        assert_eq!(s.shade(&facing_fragment()), Color::zeros());
    }

    #[test]
    fn test_specular_peaks_when_view_mirrors_light() {
        let m = material(Color::zeros(), vector![1.0, 0.2, 0.0], 1.0);
        // Head-on light and viewer: reflection lines up with the view direction exactly.
        let c = shader(m, state(ShadingMode::Specular)).shade(&facing_fragment());
        assert!((c - vector![1.0, 0.2, 0.0]).norm() < 1e-5);
    }

    #[test]
    fn test_combined_adds_ambient() {
        let m = material(Color::zeros(), Color::zeros(), 1.0);
        let c = shader(m, state(ShadingMode::Combined)).shade(&facing_fragment());
        assert!((c - vector![AMBIENT, AMBIENT, AMBIENT]).norm() < 1e-6);
    }

    #[test]
    fn test_flat_normal_map_matches_geometric_normal() {
        let m = material(Color::zeros(), Color::zeros(), 1.0);
        let mut with_map = state(ShadingMode::ObservedArea);
        with_map.use_normal_map = true;
        let mapped = shader(m.clone(), with_map).shade(&facing_fragment());
        let plain = shader(m, state(ShadingMode::ObservedArea)).shade(&facing_fragment());
        // rgb8 0.5 decodes to 1/255, not exactly 0.
        assert!((mapped - plain).norm() < 1e-2);
    }

    #[test]
    fn test_depth_visualization_overrides_lighting() {
        let m = material(vector![1.0, 1.0, 1.0], Color::zeros(), 1.0);
        let mut s = state(ShadingMode::Diffuse);
        s.show_depth = true;
        let mut fragment = facing_fragment();
        fragment.depth = 0.9925;
        let c = shader(m.clone(), s).shade(&fragment);
        assert!((c.x - 0.5).abs() < 1e-3);
        assert_eq!(c.x, c.z);

        // Even a back-lit fragment still shows its depth.
        let back_lit = PixelShader::new(m, s, vector![0.0, 0.0, -1.0]);
        fragment.depth = 1.0;
        assert_eq!(back_lit.shade(&fragment), vector![1.0, 1.0, 1.0]);
    }
}
