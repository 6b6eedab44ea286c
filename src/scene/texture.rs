use std::path::Path;

use image::RgbImage;
use log::info;
use nalgebra as na;
use na::{vector, Vector2};

use crate::error::RenderError;
use crate::util::Color;

/// Decoded rgb8 image, sampled with nearest-pixel lookup.
#[derive(Debug, Clone)]
pub struct Texture {
    image: RgbImage,
}

impl Texture {
    /// Decodes any format `image` understands and converts it to rgb8.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, RenderError> {
        let path = path.as_ref();
        let image = image::open(path)
            .map_err(|source| RenderError::Image {
                path: path.to_path_buf(),
                source,
            })?
            .to_rgb8();
        info!("Loaded texture {} ({}x{})", path.display(), image.width(), image.height());
        return Ok(Self::from_image(image));
    }

    pub fn from_image(image: RgbImage) -> Self {
        return Self { image };
    }

    pub fn width(&self) -> u32 {
        return self.image.width();
    }

    pub fn height(&self) -> u32 {
        return self.image.height();
    }

    /// Nearest-pixel lookup: `uv * (width, height)`, floored.
    /// UVs outside [0, 1] are clamped to the edge texel.
    pub fn sample(&self, uv: Vector2<f32>) -> Color {
        // Float to int casts saturate, so negative (and NaN) coordinates land on 0.
        let x = ((uv.x * self.width() as f32) as u32).min(self.width() - 1);
        let y = ((uv.y * self.height() as f32) as u32).min(self.height() - 1);
        let texel = self.image.get_pixel(x, y).0;
        return vector![
            texel[0] as f32 / 255.0,
            texel[1] as f32 / 255.0,
            texel[2] as f32 / 255.0
        ];
    }
}

/// In-memory textures.
#[cfg(test)]
impl Texture {
    /// Texture of a single color.
    pub fn from_color(width: u32, height: u32, color: Color) -> Self {
        let [r, g, b] = crate::util::quantize(color);
        return Self {
            image: RgbImage::from_pixel(width, height, image::Rgb([r, g, b])),
        };
    }

    /// Texture whose texel at (x, y) is `f(x, y)`.
    pub fn from_fn(width: u32, height: u32, f: impl FnMut(u32, u32) -> image::Rgb<u8>) -> Self {
        return Self {
            image: RgbImage::from_fn(width, height, f),
        };
    }
}

/// The four maps shading reads from. Immutable once loaded, shared by all shading calls.
#[derive(Debug, Clone)]
pub struct Material {
    pub diffuse: Texture,
    pub normal: Texture,
    pub gloss: Texture,
    pub specular: Texture,
}

impl Material {
    /// Loads `vehicle_{diffuse,normal,gloss,specular}.png` from `dir`.
    pub fn load(dir: impl AsRef<Path>) -> Result<Self, RenderError> {
        let dir = dir.as_ref();
        return Ok(Self {
            diffuse: Texture::load(dir.join("vehicle_diffuse.png"))?,
            normal: Texture::load(dir.join("vehicle_normal.png"))?,
            gloss: Texture::load(dir.join("vehicle_gloss.png"))?,
            specular: Texture::load(dir.join("vehicle_specular.png"))?,
        });
    }
}
