//! faceveil - live-video face tracking, motion prediction, and privacy-blur
//! rendering, with multi-modal emotion fusion driving an automatic privacy
//! action.
//!
//! One [`Engine`] is constructed per video stream with its dependencies
//! passed in explicitly: a [`FaceDetector`] capability, an optional
//! [`AudioExpressionSource`], and a [`RenderPipeline`] with its blur
//! strategy. The engine drives a cooperative tick loop that detects, tracks
//! across detector misses with velocity extrapolation, adapts quality to
//! observed latency, and composites the privacy blur onto each frame.

pub mod core;
pub mod models;

pub use crate::core::audio_expression::{AudioExpressionSource, SilentAudioSource};
pub use crate::core::config::{DetectionMode, EngineConfig};
pub use crate::core::emotion_fusion::{EmotionFusionEngine, FusionOutcome};
pub use crate::core::engine::{
    Engine, EngineError, EngineResult, EngineState, EngineStatus, FrameSource, RenderTarget,
};
pub use crate::core::face_detector::{DetectorError, DetectorResult, FaceDetector};
pub use crate::core::quality_controller::QualityController;
pub use crate::core::render_pipeline::{
    BlurFilter, GaussianBlur, PixelateBlur, RenderError, RenderOptions, RenderPipeline,
    RenderResult,
};
pub use crate::core::tracking_estimator::TrackingEstimator;
pub use crate::models::emotion::{Emotion, EmotionVector, FusionWeights, ModalitySource};
pub use crate::models::events::{
    DiscomfortEvent, EmotionReading, EngineEvent, FaceDetectionStatus, QualityChange,
};
pub use crate::models::frame::{Frame, PixelFormat};
pub use crate::models::quality::{NetworkCondition, QualityClass, QualityProfile};
pub use crate::models::tracking::{Detection, FaceBox, MotionVelocity, Prediction, TrackingSample};
