//! Captured video frames.
//!
//! A `Frame` owns packed RGB24 pixels for one captured image together with
//! its 0-based index in the stream. Frames are consumed within one loop
//! iteration; nothing retains them once the next frame is acquired.

use anyhow::{anyhow, Result};
use image::RgbImage;

pub struct Frame {
    /// Packed RGB24 pixel data, row-major.
    data: Vec<u8>,

    pub width: u32,
    pub height: u32,

    /// Position of this frame in the stream, starting at 0.
    pub index: u64,
}

impl Frame {
    /// Wrap RGB24 pixels. Fails when the byte count does not match the dimensions.
    pub fn new(index: u64, data: Vec<u8>, width: u32, height: u32) -> Result<Self> {
        let expected_len = (width as usize)
            .checked_mul(height as usize)
            .and_then(|v| v.checked_mul(3))
            .ok_or_else(|| anyhow!("frame dimensions overflow"))?;
        if data.len() != expected_len {
            return Err(anyhow!(
                "expected {} RGB bytes for {}x{} frame, received {}",
                expected_len,
                width,
                height,
                data.len()
            ));
        }
        Ok(Self {
            data,
            width,
            height,
            index,
        })
    }

    /// All-black frame of the given size.
    pub fn blank(index: u64, width: u32, height: u32) -> Self {
        Self {
            data: vec![0u8; width as usize * height as usize * 3],
            width,
            height,
            index,
        }
    }

    pub fn pixels(&self) -> &[u8] {
        &self.data
    }

    /// Copy the pixels into an `image` buffer for drawing or encoding.
    pub fn to_rgb_image(&self) -> Result<RgbImage> {
        RgbImage::from_raw(self.width, self.height, self.data.clone())
            .ok_or_else(|| anyhow!("frame buffer does not match {}x{}", self.width, self.height))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_rejects_mismatched_buffer() {
        assert!(Frame::new(0, vec![0u8; 10], 4, 4).is_err());
        assert!(Frame::new(0, vec![0u8; 48], 4, 4).is_ok());
    }

    #[test]
    fn frame_converts_to_image() {
        let frame = Frame::blank(3, 8, 6);
        let image = frame.to_rgb_image().unwrap();
        assert_eq!(image.dimensions(), (8, 6));
        assert_eq!(frame.index, 3);
        assert_eq!(frame.pixels().len(), 8 * 6 * 3);
    }
}
