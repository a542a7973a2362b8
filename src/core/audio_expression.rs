// Audio-side expression capability - sampled on its own cadence,
// independent of the video tick

use async_trait::async_trait;

use crate::core::face_detector::DetectorResult;
use crate::models::emotion::EmotionVector;

/// How often the audio modality is sampled, in milliseconds
pub const AUDIO_SAMPLE_INTERVAL_MS: u64 = 500;

/// Opaque audio expression analysis capability
///
/// Returns the latest expression vector derived from the stream's audio, or
/// `None` when no analysis window is ready yet. Failures are recoverable:
/// the engine logs them and keeps the previous audio reading.
#[async_trait]
pub trait AudioExpressionSource: Send + Sync {
    async fn sample(&self) -> DetectorResult<Option<EmotionVector>>;
}

/// Audio source that never produces a reading. Used when a stream runs in
/// face-only mode without an audio analyzer attached.
pub struct SilentAudioSource;

#[async_trait]
impl AudioExpressionSource for SilentAudioSource {
    async fn sample(&self) -> DetectorResult<Option<EmotionVector>> {
        Ok(None)
    }
}
