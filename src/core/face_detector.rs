// Face detection capability - the engine consumes detection as an opaque,
// externally provided model (ONNX session, MediaPipe bridge, remote service)

use async_trait::async_trait;

use crate::models::frame::Frame;
use crate::models::tracking::Detection;

/// Error types for the detection capability
#[derive(Debug, thiserror::Error)]
pub enum DetectorError {
    #[error("Detector not initialized")]
    NotInitialized,

    #[error("Model initialization failed: {0}")]
    InitFailed(String),

    #[error("Inference failed: {0}")]
    Inference(String),

    #[error("Not supported on this platform")]
    NotSupported,
}

pub type DetectorResult<T> = Result<T, DetectorError>;

/// Opaque face detection capability
///
/// `detect` may reject; the engine treats any failure as "zero detections
/// this tick" and keeps running. `initialize` failures are fatal to engine
/// start and are reported once - the caller decides whether to retry.
#[async_trait]
pub trait FaceDetector: Send + Sync {
    /// One-shot model/capability readiness. Called once by the engine before
    /// the first tick; must be idempotent.
    async fn initialize(&self) -> DetectorResult<()>;

    /// Return zero or more candidate face regions for the frame, each with
    /// per-label expression scores when the model provides them.
    async fn detect(&self, frame: &Frame) -> DetectorResult<Vec<Detection>>;
}

/// Pick the primary face among the candidates: largest area wins.
/// Non-finite or degenerate boxes are discarded first.
pub fn select_primary(detections: Vec<Detection>) -> Option<Detection> {
    detections
        .into_iter()
        .filter(|d| d.face_box.is_finite() && !d.face_box.is_degenerate())
        .max_by(|a, b| {
            a.face_box
                .area()
                .partial_cmp(&b.face_box.area())
                .unwrap_or(std::cmp::Ordering::Equal)
        })
}
