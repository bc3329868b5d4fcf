//! Pick color encoding
//!
//! The pick pass draws every pickable object in a flat color that encodes
//! its pick id in the 24 RGB bits: red holds the high byte, blue the low
//! byte. Id 0 is black, which is also the clear color, so it means nothing
//! was drawn there. Alpha is ignored when decoding.

use bytemuck::{Pod, Zeroable};

/// Largest id that fits the 24-bit encoding
pub const MAX_PICK_ID: u32 = 0x00FF_FFFF;

/// Id reserved for "no object"
pub const NO_PICK_ID: u32 = 0;

/// One RGBA8 pixel as read back from a render target
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Pod, Zeroable)]
pub struct Rgba8 {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba8 {
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Normalized color for a shader uniform
    pub fn to_f32(self) -> [f32; 4] {
        [
            self.r as f32 / 255.0,
            self.g as f32 / 255.0,
            self.b as f32 / 255.0,
            self.a as f32 / 255.0,
        ]
    }
}

/// Encode a pick id as an opaque flat color
///
/// Ids above [`MAX_PICK_ID`] are truncated to 24 bits; sessions never hand
/// them out.
pub fn encode_pick_id(id: u32) -> Rgba8 {
    debug_assert!(id <= MAX_PICK_ID, "pick id {} out of range", id);
    Rgba8 {
        r: (id >> 16) as u8,
        g: (id >> 8) as u8,
        b: id as u8,
        a: u8::MAX,
    }
}

/// Decode a pixel from the pick pass back to a pick id
pub fn decode_pick_id(pixel: Rgba8) -> u32 {
    (pixel.r as u32) << 16 | (pixel.g as u32) << 8 | pixel.b as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_is_black() {
        assert_eq!(decode_pick_id(Rgba8::new(0, 0, 0, 0)), NO_PICK_ID);
        assert_eq!(decode_pick_id(Rgba8::new(0, 0, 0, 255)), NO_PICK_ID);
    }

    #[test]
    fn test_encode_layout() {
        assert_eq!(encode_pick_id(1), Rgba8::new(0, 0, 1, 255));
        assert_eq!(encode_pick_id(0x0102_03), Rgba8::new(1, 2, 3, 255));
        assert_eq!(encode_pick_id(MAX_PICK_ID), Rgba8::new(255, 255, 255, 255));
    }

    #[test]
    fn test_bijective_on_sampled_ids() {
        for id in [1, 255, 256, 65_535, 65_536, 1_000_000, MAX_PICK_ID] {
            assert_eq!(decode_pick_id(encode_pick_id(id)), id);
        }
    }

    #[test]
    fn test_alpha_ignored() {
        let mut pixel = encode_pick_id(4242);
        pixel.a = 17;
        assert_eq!(decode_pick_id(pixel), 4242);
    }

    #[test]
    fn test_pod_cast() {
        let bytes = [0u8, 1, 2, 255, 9, 9, 9, 255];
        let pixels: &[Rgba8] = bytemuck::cast_slice(&bytes);
        assert_eq!(pixels.len(), 2);
        assert_eq!(decode_pick_id(pixels[0]), 0x0102);
    }

    #[test]
    fn test_to_f32() {
        assert_eq!(Rgba8::new(255, 0, 0, 255).to_f32(), [1.0, 0.0, 0.0, 1.0]);
    }
}
