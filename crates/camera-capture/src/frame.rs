//! Raster frame type shared by every extraction pass

use std::path::Path;

use crate::CameraError;

/// Bytes per packed RGB24 pixel
pub const BYTES_PER_PIXEL: usize = 3;

/// Decoded RGB video frame
#[derive(Debug, Clone)]
pub struct VideoFrame {
    /// RGB pixel data (width * height * 3)
    pub data: Vec<u8>,
    /// Frame width
    pub width: u32,
    /// Frame height
    pub height: u32,
    /// Capture timestamp (nanoseconds)
    pub timestamp_ns: u64,
    /// Frame sequence number
    pub sequence: u32,
}

impl VideoFrame {
    /// Create a new video frame from raw RGB data
    pub fn new(data: Vec<u8>, width: u32, height: u32, timestamp_ns: u64, sequence: u32) -> Self {
        Self {
            data,
            width,
            height,
            timestamp_ns,
            sequence,
        }
    }

    /// Frame of a single repeated color
    pub fn solid(width: u32, height: u32, rgb: [u8; 3]) -> Self {
        let data = rgb.repeat(width as usize * height as usize);
        Self::new(data, width, height, 0, 0)
    }

    /// Wrap a decoded `image` buffer
    pub fn from_rgb_image(img: image::RgbImage) -> Self {
        let (width, height) = img.dimensions();
        Self::new(img.into_raw(), width, height, 0, 0)
    }

    /// Decode any format the `image` crate understands into RGB24
    pub fn from_image_file(path: &Path) -> Result<Self, CameraError> {
        let img = image::open(path)
            .map_err(|e| CameraError::Format(format!("{}: {}", path.display(), e)))?;
        Ok(Self::from_rgb_image(img.to_rgb8()))
    }

    /// Number of pixels in the frame
    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Check the buffer length against the declared dimensions
    pub fn validate(&self) -> Result<(), CameraError> {
        let expected = self.pixel_count() * BYTES_PER_PIXEL;
        if self.data.len() != expected {
            return Err(CameraError::Format(format!(
                "expected {} bytes for {}x{} RGB, got {}",
                expected,
                self.width,
                self.height,
                self.data.len()
            )));
        }
        Ok(())
    }

    /// Iterate pixels in row-major order
    pub fn pixels(&self) -> impl Iterator<Item = [u8; 3]> + '_ {
        self.data
            .chunks_exact(BYTES_PER_PIXEL)
            .map(|p| [p[0], p[1], p[2]])
    }

    /// Get pixel at (x, y)
    pub fn get_pixel(&self, x: u32, y: u32) -> Option<[u8; 3]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = (y as usize * self.width as usize + x as usize) * BYTES_PER_PIXEL;
        self.data.get(idx..idx + BYTES_PER_PIXEL).map(|p| [p[0], p[1], p[2]])
    }

    /// Resize frame (nearest neighbour)
    pub fn resize(&self, new_width: u32, new_height: u32) -> VideoFrame {
        if new_width == self.width && new_height == self.height {
            return self.clone();
        }

        let mut resized = Vec::with_capacity(new_width as usize * new_height as usize * BYTES_PER_PIXEL);

        let x_ratio = self.width as f32 / new_width.max(1) as f32;
        let y_ratio = self.height as f32 / new_height.max(1) as f32;

        for y in 0..new_height {
            for x in 0..new_width {
                let x0 = (x as f32 * x_ratio).floor() as u32;
                let y0 = (y as f32 * y_ratio).floor() as u32;

                match self.get_pixel(
                    x0.min(self.width.saturating_sub(1)),
                    y0.min(self.height.saturating_sub(1)),
                ) {
                    Some(pixel) => resized.extend_from_slice(&pixel),
                    None => resized.extend_from_slice(&[0, 0, 0]),
                }
            }
        }

        VideoFrame {
            data: resized,
            width: new_width,
            height: new_height,
            timestamp_ns: self.timestamp_ns,
            sequence: self.sequence,
        }
    }

    /// Borrow as an `image` buffer view for model preprocessing
    pub fn as_rgb_image(&self) -> Option<image::ImageBuffer<image::Rgb<u8>, &[u8]>> {
        image::ImageBuffer::from_raw(self.width, self.height, self.data.as_slice())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_pixel_bounds() {
        let frame = VideoFrame::solid(4, 2, [10, 20, 30]);
        assert_eq!(frame.get_pixel(3, 1), Some([10, 20, 30]));
        assert_eq!(frame.get_pixel(4, 0), None);
        assert_eq!(frame.get_pixel(0, 2), None);
    }

    #[test]
    fn test_validate_rejects_short_buffer() {
        let mut frame = VideoFrame::solid(4, 4, [0, 0, 0]);
        assert!(frame.validate().is_ok());
        frame.data.pop();
        assert!(matches!(frame.validate(), Err(CameraError::Format(_))));
    }

    #[test]
    fn test_resize_keeps_color() {
        let frame = VideoFrame::solid(8, 6, [200, 100, 50]);
        let resized = frame.resize(4, 3);
        assert_eq!(resized.width, 4);
        assert_eq!(resized.height, 3);
        assert!(resized.validate().is_ok());
        assert!(resized.pixels().all(|p| p == [200, 100, 50]));
    }
}
