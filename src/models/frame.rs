// Data structures for video frames entering the engine

/// Pixel format of incoming frames
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    Rgba8,
    Bgra8,
}

/// A single captured video frame
///
/// The pixel buffer is owned and treated as immutable for the duration of a
/// tick; the render pipeline composites into its own working copy.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Capture timestamp in milliseconds (stream clock)
    pub timestamp_ms: i64,
    pub width: u32,
    pub height: u32,
    /// Tightly packed pixel data, 4 bytes per pixel
    pub data: Vec<u8>,
    pub format: PixelFormat,
}

impl Frame {
    pub fn new(timestamp_ms: i64, width: u32, height: u32, data: Vec<u8>, format: PixelFormat) -> Self {
        Self {
            timestamp_ms,
            width,
            height,
            data,
            format,
        }
    }

    /// Frame stamped with the wall-clock capture time
    pub fn captured_now(width: u32, height: u32, data: Vec<u8>, format: PixelFormat) -> Self {
        Self::new(
            chrono::Utc::now().timestamp_millis(),
            width,
            height,
            data,
            format,
        )
    }

    /// Expected buffer length for the frame dimensions
    pub fn expected_len(&self) -> usize {
        (self.width as usize) * (self.height as usize) * 4
    }

    /// Whether the buffer length matches the declared dimensions
    pub fn is_well_formed(&self) -> bool {
        self.data.len() == self.expected_len()
    }

    /// Convert the pixel data to RGBA byte order in place
    pub fn ensure_rgba(&mut self) {
        if self.format == PixelFormat::Bgra8 {
            for px in self.data.chunks_exact_mut(4) {
                px.swap(0, 2);
            }
            self.format = PixelFormat::Rgba8;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bgra_to_rgba_swaps_channels() {
        let mut frame = Frame::new(0, 1, 1, vec![10, 20, 30, 255], PixelFormat::Bgra8);
        frame.ensure_rgba();
        assert_eq!(frame.data, vec![30, 20, 10, 255]);
        assert_eq!(frame.format, PixelFormat::Rgba8);
    }

    #[test]
    fn test_rgba_passthrough_is_untouched() {
        let mut frame = Frame::new(0, 1, 1, vec![10, 20, 30, 255], PixelFormat::Rgba8);
        frame.ensure_rgba();
        assert_eq!(frame.data, vec![10, 20, 30, 255]);
    }

    #[test]
    fn test_well_formed_checks_buffer_length() {
        let frame = Frame::new(0, 2, 2, vec![0; 16], PixelFormat::Rgba8);
        assert!(frame.is_well_formed());

        let short = Frame::new(0, 2, 2, vec![0; 15], PixelFormat::Rgba8);
        assert!(!short.is_well_formed());
    }
}
