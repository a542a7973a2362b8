// Event payloads emitted by the engine to its consumer

use serde::{Deserialize, Serialize};

use crate::models::emotion::{Emotion, EmotionVector, ModalitySource};
use crate::models::quality::{NetworkCondition, QualityClass};

// ==============================================================================
// Event Payloads
// ==============================================================================

/// Per-tick tracking status for UI indicators
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FaceDetectionStatus {
    pub face_detected: bool,
    pub no_face_count: u32,
    pub full_page_blur_active: bool,
    pub is_predicted: bool,
}

/// A combined emotion reading from one fusion evaluation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmotionReading {
    pub vector: EmotionVector,
    pub source: ModalitySource,
}

/// Raised when the fused dominant emotion falls in the negative-affect set
/// above threshold. Level-triggered: re-raised on every evaluation while the
/// condition holds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DiscomfortEvent {
    pub emotion: Emotion,
    pub score: f32,
    pub source: ModalitySource,
}

/// Quality retune notice, emitted only when the resolved class changes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityChange {
    pub condition: QualityClass,
    pub network: Option<NetworkCondition>,
    pub message: String,
}

// ==============================================================================
// Event Envelope
// ==============================================================================

/// Everything the engine reports to its consumer over the event channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineEvent {
    EmotionDetected(EmotionReading),
    DiscomfortDetected(DiscomfortEvent),
    FaceDetectionStatus(FaceDetectionStatus),
    NetworkConditionChange(QualityChange),
}
