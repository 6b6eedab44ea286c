use log::trace;

use crate::util::{quantize, Color};

/// Color (rgb8, row-major, top-left origin) and depth buffers for one render target.
///
/// Writes only happen through a `FrameLock`, so nothing can read a half drawn frame.
pub struct FrameBuffer {
    width: u32,
    height: u32,
    color: Vec<u8>,
    depth: Vec<f32>,
    frame_index: u64,
}

impl FrameBuffer {
    pub fn new(width: u32, height: u32) -> Self {
        let n_pixels = (width * height) as usize;
        return Self {
            width,
            height,
            color: vec![0; 3 * n_pixels],
            depth: vec![f32::INFINITY; n_pixels],
            frame_index: 0,
        };
    }

    pub fn width(&self) -> u32 {
        return self.width;
    }

    pub fn height(&self) -> u32 {
        return self.height;
    }

    /// Number of frames completed so far.
    pub fn frame_index(&self) -> u64 {
        return self.frame_index;
    }

    /// Opens the frame for writing: depth is reset to +inf and color to `clear_color`.
    /// The frame counts as complete when the returned lock is dropped.
    pub fn lock(&mut self, clear_color: Color) -> FrameLock<'_> {
        let clear = quantize(clear_color);
        self.depth.fill(f32::INFINITY);
        for pixel in self.color.chunks_exact_mut(3) {
            pixel.copy_from_slice(&clear);
        }
        trace!("frame {} locked", self.frame_index);
        return FrameLock { buffer: self };
    }

    /// Completed frame as a slice of 3 * (number of pixels) bytes.
    pub fn as_render_data(&self) -> &[u8] {
        return &self.color[..];
    }

    pub fn depth_data(&self) -> &[f32] {
        return &self.depth[..];
    }
}

#[cfg(test)]
impl FrameBuffer {
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 3] {
        let index = 3 * (x + y * self.width) as usize;
        return [self.color[index], self.color[index + 1], self.color[index + 2]];
    }

    pub fn depth(&self, x: u32, y: u32) -> f32 {
        return self.depth[(x + y * self.width) as usize];
    }
}

/// Exclusive write access to a `FrameBuffer` for the duration of one frame.
pub struct FrameLock<'a> {
    buffer: &'a mut FrameBuffer,
}

impl<'a> FrameLock<'a> {
    /// Target covering the whole frame.
    pub fn target(&mut self) -> RenderTarget<'_> {
        let buffer = &mut *self.buffer;
        return RenderTarget {
            width: buffer.width,
            row_begin: 0,
            row_end: buffer.height,
            color: &mut buffer.color,
            depth: &mut buffer.depth,
        };
    }

    /// Splits the frame into at most `count` horizontal bands of whole rows, each carrying
    /// its own copy of the cleared color and depth rows.
    pub fn split_bands(&self, count: u32) -> Vec<Band> {
        let (width, height) = (self.buffer.width, self.buffer.height);
        let count = count.clamp(1, height.max(1));
        let rows_per_band = (height + count - 1) / count;

        let mut bands = Vec::with_capacity(count as usize);
        let mut row_begin = 0;
        while row_begin < height {
            let row_end = (row_begin + rows_per_band).min(height);
            let pixels = (row_begin * width) as usize..(row_end * width) as usize;
            bands.push(Band {
                width,
                row_begin,
                row_end,
                color: self.buffer.color[3 * pixels.start..3 * pixels.end].to_vec(),
                depth: self.buffer.depth[pixels].to_vec(),
            });
            row_begin = row_end;
        }
        return bands;
    }

    /// Copies a finished band back into its rows.
    pub fn merge_band(&mut self, band: Band) {
        let width = self.buffer.width;
        let pixels = (band.row_begin * width) as usize..(band.row_end * width) as usize;
        self.buffer.color[3 * pixels.start..3 * pixels.end].copy_from_slice(&band.color);
        self.buffer.depth[pixels].copy_from_slice(&band.depth);
    }
}

impl<'a> Drop for FrameLock<'a> {
    fn drop(&mut self) {
        trace!("frame {} unlocked", self.buffer.frame_index);
        self.buffer.frame_index += 1;
    }
}

/// Rows `row_begin..row_end` of a frame, owned by a single worker.
pub struct Band {
    width: u32,
    row_begin: u32,
    row_end: u32,
    color: Vec<u8>,
    depth: Vec<f32>,
}

impl Band {
    pub fn target(&mut self) -> RenderTarget<'_> {
        return RenderTarget {
            width: self.width,
            row_begin: self.row_begin,
            row_end: self.row_end,
            color: &mut self.color,
            depth: &mut self.depth,
        };
    }
}

/// Mutable view of the rows `row_begin..row_end` of a frame.
/// Pixel coordinates are always frame coordinates.
pub struct RenderTarget<'a> {
    width: u32,
    row_begin: u32,
    row_end: u32,
    color: &'a mut [u8],
    depth: &'a mut [f32],
}

impl<'a> RenderTarget<'a> {
    pub fn width(&self) -> u32 {
        return self.width;
    }

    pub fn row_begin(&self) -> u32 {
        return self.row_begin;
    }

    pub fn row_end(&self) -> u32 {
        return self.row_end;
    }

    fn index(&self, x: u32, y: u32) -> usize {
        debug_assert!(x < self.width && y >= self.row_begin && y < self.row_end);
        return (x + (y - self.row_begin) * self.width) as usize;
    }

    pub fn depth(&self, x: u32, y: u32) -> f32 {
        return self.depth[self.index(x, y)];
    }

    pub fn set_depth(&mut self, x: u32, y: u32, depth: f32) {
        let index = self.index(x, y);
        self.depth[index] = depth;
    }

    pub fn set_pixel(&mut self, x: u32, y: u32, color: [u8; 3]) {
        let index = 3 * self.index(x, y);
        self.color[index..index + 3].copy_from_slice(&color);
    }
}
