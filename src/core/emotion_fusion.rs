// Emotion fusion - combines independently sampled visual and audio
// expression vectors into one privacy-triggering signal

use tracing::debug;

use crate::models::emotion::{Emotion, EmotionVector, FusionWeights, ModalitySource};
use crate::models::events::DiscomfortEvent;

/// A modality reading is accepted only when its own dominant score clears this
const MODALITY_CONFIDENCE_THRESHOLD: f32 = 0.7;
/// Fused dominant score above which a negative-affect label raises discomfort
const DISCOMFORT_THRESHOLD: f32 = 0.7;

/// Result of one fusion evaluation
#[derive(Debug, Clone, PartialEq)]
pub struct FusionOutcome {
    pub combined: EmotionVector,
    pub dominant: (Emotion, f32),
    pub source: ModalitySource,
    /// Present on every evaluation while the discomfort condition holds
    /// (level-triggered; debouncing is the consumer's decision)
    pub discomfort: Option<DiscomfortEvent>,
}

/// Fuses the visual and audio expression signals.
///
/// The two modalities update independently and asynchronously; `combine`
/// reads whatever each last stored, with no freshness requirement between
/// them.
pub struct EmotionFusionEngine {
    last_visual: Option<EmotionVector>,
    last_audio: Option<EmotionVector>,
    weights: FusionWeights,
    last_combined: Option<EmotionVector>,
}

impl EmotionFusionEngine {
    pub fn new(weights: FusionWeights) -> Self {
        Self {
            last_visual: None,
            last_audio: None,
            weights: weights.normalized(),
            last_combined: None,
        }
    }

    /// Replace the fusion weights; arbitrary values are renormalized to sum to 1
    pub fn set_weights(&mut self, weights: FusionWeights) {
        self.weights = weights.normalized();
    }

    pub fn weights(&self) -> FusionWeights {
        self.weights
    }

    /// Update the visual modality from a real detection's expression scores.
    /// Returns whether the reading was accepted.
    pub fn update_visual(&mut self, vector: EmotionVector) -> bool {
        Self::accept(&mut self.last_visual, vector, "visual")
    }

    /// Update the audio modality from the analysis cadence.
    /// Returns whether the reading was accepted.
    pub fn update_audio(&mut self, vector: EmotionVector) -> bool {
        Self::accept(&mut self.last_audio, vector, "audio")
    }

    fn accept(slot: &mut Option<EmotionVector>, vector: EmotionVector, modality: &str) -> bool {
        let Some((label, score)) = vector.dominant() else {
            return false;
        };
        if score <= MODALITY_CONFIDENCE_THRESHOLD {
            debug!(modality, label = label.as_str(), score, "reading below confidence threshold");
            return false;
        }
        *slot = Some(vector);
        true
    }

    pub fn last_combined(&self) -> Option<&EmotionVector> {
        self.last_combined.as_ref()
    }

    /// Fuse the latest modality readings.
    ///
    /// `combined[label] = visual[label] * w_face + audio[label] * w_audio`
    /// over the union of labels. While only one modality has produced a
    /// reading its weight is effectively 1, so single-modality operation can
    /// still cross the discomfort threshold. Returns `None` until at least
    /// one modality is current.
    pub fn combine(&mut self) -> Option<FusionOutcome> {
        let source = match (&self.last_visual, &self.last_audio) {
            (None, None) => return None,
            (Some(_), None) => ModalitySource::Face,
            (None, Some(_)) => ModalitySource::Audio,
            (Some(_), Some(_)) => ModalitySource::Fused,
        };

        let (w_face, w_audio) = match source {
            ModalitySource::Face => (1.0, 0.0),
            ModalitySource::Audio => (0.0, 1.0),
            ModalitySource::Fused => (self.weights.face, self.weights.audio),
        };

        let empty = EmotionVector::new();
        let visual = self.last_visual.as_ref().unwrap_or(&empty);
        let audio = self.last_audio.as_ref().unwrap_or(&empty);

        let labels: std::collections::BTreeSet<Emotion> =
            visual.labels().chain(audio.labels()).collect();

        let mut combined = EmotionVector::new();
        for label in labels {
            let score = visual.get(label) * w_face + audio.get(label) * w_audio;
            combined.set(label, score);
        }

        let dominant = combined.dominant()?;
        self.last_combined = Some(combined.clone());

        let discomfort = if dominant.0.is_negative_affect() && dominant.1 > DISCOMFORT_THRESHOLD {
            Some(DiscomfortEvent {
                emotion: dominant.0,
                score: dominant.1,
                source,
            })
        } else {
            None
        };

        Some(FusionOutcome {
            combined,
            dominant,
            source,
            discomfort,
        })
    }

    /// Drop all modality state (stream teardown)
    pub fn reset(&mut self) {
        self.last_visual = None;
        self.last_audio = None;
        self.last_combined = None;
    }
}
