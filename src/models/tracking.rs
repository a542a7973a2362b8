// Data models for face tracking: boxes, detections, samples, and velocity

use serde::{Deserialize, Serialize};

use crate::models::emotion::EmotionVector;

// ==============================================================================
// Face Box
// ==============================================================================

/// Axis-aligned rectangle describing a detected or predicted face location,
/// in pixel coordinates with the origin at the top-left of the frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FaceBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl FaceBox {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn area(&self) -> f32 {
        self.width * self.height
    }

    pub fn center(&self) -> (f32, f32) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// All four components are finite numbers
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.width.is_finite() && self.height.is_finite()
    }

    /// A box that cannot be rendered or tracked (zero or negative size)
    pub fn is_degenerate(&self) -> bool {
        !(self.width > 0.0 && self.height > 0.0)
    }

    /// Grow each dimension by `fraction` about the box center.
    pub fn expand(&self, fraction: f32) -> FaceBox {
        let dw = self.width * fraction;
        let dh = self.height * fraction;
        FaceBox {
            x: self.x - dw / 2.0,
            y: self.y - dh / 2.0,
            width: self.width + dw,
            height: self.height + dh,
        }
    }

    /// Clamp the box into `[0, frame_width] x [0, frame_height]`.
    ///
    /// The clipped box may be degenerate (zero width or height) when the
    /// input lies entirely outside the frame; callers are expected to check
    /// `is_degenerate` before rendering.
    pub fn clip(&self, frame_width: u32, frame_height: u32) -> FaceBox {
        let fw = frame_width as f32;
        let fh = frame_height as f32;
        let x0 = self.x.clamp(0.0, fw);
        let y0 = self.y.clamp(0.0, fh);
        let x1 = (self.x + self.width).clamp(0.0, fw);
        let y1 = (self.y + self.height).clamp(0.0, fh);
        FaceBox {
            x: x0,
            y: y0,
            width: (x1 - x0).max(0.0),
            height: (y1 - y0).max(0.0),
        }
    }
}

// ==============================================================================
// Detections & Samples
// ==============================================================================

/// One candidate face region returned by the detection capability,
/// with per-label expression scores when the model provides them.
#[derive(Debug, Clone)]
pub struct Detection {
    pub face_box: FaceBox,
    pub expressions: EmotionVector,
}

impl Detection {
    pub fn new(face_box: FaceBox) -> Self {
        Self {
            face_box,
            expressions: EmotionVector::new(),
        }
    }

    pub fn with_expressions(face_box: FaceBox, expressions: EmotionVector) -> Self {
        Self {
            face_box,
            expressions,
        }
    }
}

/// A timestamped face box recorded from a real detection
#[derive(Debug, Clone, Copy)]
pub struct TrackingSample {
    pub face_box: FaceBox,
    pub timestamp_ms: i64,
}

// ==============================================================================
// Motion Velocity
// ==============================================================================

/// Smoothed per-millisecond rate of change of box geometry
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MotionVelocity {
    pub dx: f32,
    pub dy: f32,
    pub dw: f32,
    pub dh: f32,
}

impl MotionVelocity {
    pub fn is_finite(&self) -> bool {
        self.dx.is_finite() && self.dy.is_finite() && self.dw.is_finite() && self.dh.is_finite()
    }

    /// Translational speed in pixels per millisecond
    pub fn magnitude(&self) -> f32 {
        (self.dx * self.dx + self.dy * self.dy).sqrt()
    }
}

// ==============================================================================
// Prediction
// ==============================================================================

/// The effective face box for a tick: either a real detection or an
/// extrapolation from motion history.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Prediction {
    pub face_box: FaceBox,
    /// True when the box was extrapolated rather than observed
    pub is_predicted: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clip_keeps_interior_box() {
        let b = FaceBox::new(10.0, 20.0, 30.0, 40.0);
        assert_eq!(b.clip(640, 480), b);
    }

    #[test]
    fn test_clip_clamps_overflow() {
        let b = FaceBox::new(-10.0, -5.0, 30.0, 20.0).clip(640, 480);
        assert_eq!(b.x, 0.0);
        assert_eq!(b.y, 0.0);
        assert_eq!(b.width, 20.0);
        assert_eq!(b.height, 15.0);

        let b = FaceBox::new(630.0, 470.0, 30.0, 20.0).clip(640, 480);
        assert_eq!(b.width, 10.0);
        assert_eq!(b.height, 10.0);
    }

    #[test]
    fn test_clip_outside_frame_is_degenerate() {
        let b = FaceBox::new(700.0, 500.0, 30.0, 20.0).clip(640, 480);
        assert!(b.is_degenerate());
    }

    #[test]
    fn test_expand_is_centered() {
        let b = FaceBox::new(100.0, 100.0, 100.0, 50.0).expand(0.2);
        assert_eq!(b.width, 120.0);
        assert_eq!(b.height, 60.0);
        assert_eq!(b.center(), FaceBox::new(100.0, 100.0, 100.0, 50.0).center());
    }

    #[test]
    fn test_velocity_magnitude() {
        let v = MotionVelocity {
            dx: 3.0,
            dy: 4.0,
            dw: 0.0,
            dh: 0.0,
        };
        assert_eq!(v.magnitude(), 5.0);
    }
}
