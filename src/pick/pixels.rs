//! Reading back pick-pass pixels
//!
//! Coordinates are in pixels with the origin at the top-left corner of the
//! render target, matching texture readback row order.

use image::RgbaImage;

use super::color::Rgba8;
use crate::core::error::{Error, Result};

/// Pixel rectangle in render-target coordinates
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PickRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl PickRect {
    /// Rectangles this small are treated as a point pick
    pub const DEGENERATE_EXTENT: u32 = 3;

    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    pub fn is_degenerate(&self) -> bool {
        self.width <= Self::DEGENERATE_EXTENT && self.height <= Self::DEGENERATE_EXTENT
    }

    pub fn center(&self) -> [u32; 2] {
        [self.x + self.width / 2, self.y + self.height / 2]
    }

    /// Intersect with a `width` x `height` target
    pub fn clamp_to(&self, width: u32, height: u32) -> PickRect {
        let x0 = self.x.min(width);
        let y0 = self.y.min(height);
        let x1 = self.x.saturating_add(self.width).min(width);
        let y1 = self.y.saturating_add(self.height).min(height);
        PickRect::new(x0, y0, x1 - x0, y1 - y0)
    }

    pub fn area(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

/// Read access to the pick pass output
pub trait PixelSource {
    /// Target size in pixels
    fn dimensions(&self) -> (u32, u32);

    /// One pixel, or `None` outside the target
    fn read_pixel(&self, x: u32, y: u32) -> Option<Rgba8>;

    /// Every pixel of `rect` inside the target, row by row
    fn read_rect(&self, rect: PickRect) -> Vec<Rgba8> {
        let (width, height) = self.dimensions();
        let rect = rect.clamp_to(width, height);
        let mut pixels = Vec::with_capacity(rect.area());
        for y in rect.y..rect.y + rect.height {
            for x in rect.x..rect.x + rect.width {
                if let Some(pixel) = self.read_pixel(x, y) {
                    pixels.push(pixel);
                }
            }
        }
        pixels
    }
}

impl PixelSource for RgbaImage {
    fn dimensions(&self) -> (u32, u32) {
        RgbaImage::dimensions(self)
    }

    fn read_pixel(&self, x: u32, y: u32) -> Option<Rgba8> {
        self.get_pixel_checked(x, y).map(|p| Rgba8::new(p[0], p[1], p[2], p[3]))
    }
}

/// Pixels copied out of a GPU texture into a mapped buffer
///
/// Rows are padded to `wgpu::COPY_BYTES_PER_ROW_ALIGNMENT`, as
/// `copy_texture_to_buffer` requires.
#[derive(Clone, Debug)]
pub struct ReadbackPixels {
    width: u32,
    height: u32,
    bytes_per_row: usize,
    data: Vec<u8>,
}

impl ReadbackPixels {
    /// Padded row size for an RGBA8 target of `width` pixels
    pub fn padded_bytes_per_row(width: u32) -> u32 {
        let unpadded = width * std::mem::size_of::<Rgba8>() as u32;
        let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
        unpadded.div_ceil(align) * align
    }

    /// Wrap mapped readback bytes
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Result<Self> {
        let bytes_per_row = Self::padded_bytes_per_row(width) as usize;
        let expected = bytes_per_row * height as usize;
        if data.len() < expected {
            return Err(Error::Pick(format!(
                "readback holds {} bytes, {}x{} needs {}",
                data.len(),
                width,
                height,
                expected
            )));
        }
        Ok(Self { width, height, bytes_per_row, data })
    }

    fn row(&self, y: u32) -> &[Rgba8] {
        let start = y as usize * self.bytes_per_row;
        let end = start + self.width as usize * std::mem::size_of::<Rgba8>();
        bytemuck::cast_slice(&self.data[start..end])
    }
}

impl PixelSource for ReadbackPixels {
    fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn read_pixel(&self, x: u32, y: u32) -> Option<Rgba8> {
        if x >= self.width || y >= self.height {
            return None;
        }
        Some(self.row(y)[x as usize])
    }

    fn read_rect(&self, rect: PickRect) -> Vec<Rgba8> {
        let rect = rect.clamp_to(self.width, self.height);
        let mut pixels = Vec::with_capacity(rect.area());
        for y in rect.y..rect.y + rect.height {
            let row = self.row(y);
            pixels.extend_from_slice(&row[rect.x as usize..(rect.x + rect.width) as usize]);
        }
        pixels
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn test_degenerate() {
        assert!(PickRect::new(10, 10, 3, 3).is_degenerate());
        assert!(PickRect::new(10, 10, 1, 0).is_degenerate());
        assert!(!PickRect::new(10, 10, 4, 3).is_degenerate());
        assert_eq!(PickRect::new(10, 20, 3, 3).center(), [11, 21]);
    }

    #[test]
    fn test_clamp_to() {
        assert_eq!(PickRect::new(8, 8, 10, 10).clamp_to(12, 10), PickRect::new(8, 8, 4, 2));
        assert_eq!(PickRect::new(20, 20, 5, 5).clamp_to(10, 10).area(), 0);
    }

    #[test]
    fn test_image_source() {
        let mut image = RgbaImage::new(4, 4);
        image.put_pixel(2, 1, Rgba([1, 2, 3, 255]));

        assert_eq!(image.read_pixel(2, 1), Some(Rgba8::new(1, 2, 3, 255)));
        assert_eq!(image.read_pixel(4, 0), None);
        assert_eq!(image.read_rect(PickRect::new(1, 1, 2, 2)).len(), 4);
        assert_eq!(image.read_rect(PickRect::new(3, 3, 5, 5)).len(), 1);
    }

    #[test]
    fn test_padded_bytes_per_row() {
        assert_eq!(ReadbackPixels::padded_bytes_per_row(1), 256);
        assert_eq!(ReadbackPixels::padded_bytes_per_row(64), 256);
        assert_eq!(ReadbackPixels::padded_bytes_per_row(65), 512);
    }

    #[test]
    fn test_readback_skips_padding() {
        let (width, height) = (3u32, 2u32);
        let stride = ReadbackPixels::padded_bytes_per_row(width) as usize;
        let mut data = vec![0xAAu8; stride * height as usize];
        for y in 0..height as usize {
            for x in 0..width as usize {
                let offset = y * stride + x * 4;
                data[offset..offset + 4].copy_from_slice(&[x as u8, y as u8, 0, 255]);
            }
        }

        let pixels = ReadbackPixels::new(width, height, data).unwrap();
        assert_eq!(pixels.read_pixel(2, 1), Some(Rgba8::new(2, 1, 0, 255)));
        assert_eq!(pixels.read_pixel(3, 0), None);

        let rect = pixels.read_rect(PickRect::new(1, 0, 5, 5));
        assert_eq!(rect, vec![
            Rgba8::new(1, 0, 0, 255),
            Rgba8::new(2, 0, 0, 255),
            Rgba8::new(1, 1, 0, 255),
            Rgba8::new(2, 1, 0, 255),
        ]);
    }

    #[test]
    fn test_readback_too_short() {
        assert!(ReadbackPixels::new(4, 4, vec![0; 16]).is_err());
    }
}
