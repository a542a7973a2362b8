// Data models for emotion signals: labels, per-modality vectors, fusion weights

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ==============================================================================
// Emotion Labels
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Emotion {
    Neutral,
    Happy,
    Sad,
    Angry,
    Fearful,
    Surprised,
    Disgusted,
}

impl Emotion {
    pub fn as_str(&self) -> &'static str {
        match self {
            Emotion::Neutral => "neutral",
            Emotion::Happy => "happy",
            Emotion::Sad => "sad",
            Emotion::Angry => "angry",
            Emotion::Fearful => "fearful",
            Emotion::Surprised => "surprised",
            Emotion::Disgusted => "disgusted",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "neutral" => Some(Emotion::Neutral),
            "happy" => Some(Emotion::Happy),
            "sad" => Some(Emotion::Sad),
            "angry" => Some(Emotion::Angry),
            "fearful" | "fear" => Some(Emotion::Fearful),
            "surprised" | "surprise" => Some(Emotion::Surprised),
            "disgusted" | "disgust" => Some(Emotion::Disgusted),
            _ => None,
        }
    }

    /// Labels that qualify for the discomfort rule
    pub fn is_negative_affect(&self) -> bool {
        matches!(
            self,
            Emotion::Angry | Emotion::Fearful | Emotion::Disgusted | Emotion::Sad
        )
    }
}

// ==============================================================================
// Emotion Vector
// ==============================================================================

/// Per-label confidence scores from one modality (or from fusion).
///
/// Scores are clamped to [0, 1] on insertion. Iteration order is the label
/// order above, which keeps `dominant` deterministic under ties.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EmotionVector {
    scores: BTreeMap<Emotion, f32>,
}

impl EmotionVector {
    pub fn new() -> Self {
        Self {
            scores: BTreeMap::new(),
        }
    }

    pub fn from_pairs(pairs: impl IntoIterator<Item = (Emotion, f32)>) -> Self {
        let mut v = Self::new();
        for (emotion, score) in pairs {
            v.set(emotion, score);
        }
        v
    }

    pub fn set(&mut self, emotion: Emotion, score: f32) {
        let score = if score.is_finite() { score.clamp(0.0, 1.0) } else { 0.0 };
        self.scores.insert(emotion, score);
    }

    pub fn get(&self, emotion: Emotion) -> f32 {
        self.scores.get(&emotion).copied().unwrap_or(0.0)
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Emotion, f32)> + '_ {
        self.scores.iter().map(|(e, s)| (*e, *s))
    }

    pub fn labels(&self) -> impl Iterator<Item = Emotion> + '_ {
        self.scores.keys().copied()
    }

    /// The highest-scoring label, ties broken by label order
    pub fn dominant(&self) -> Option<(Emotion, f32)> {
        let mut best: Option<(Emotion, f32)> = None;
        for (emotion, score) in self.iter() {
            match best {
                Some((_, s)) if score <= s => {}
                _ => best = Some((emotion, score)),
            }
        }
        best
    }
}

// ==============================================================================
// Fusion Weights
// ==============================================================================

pub const DEFAULT_FACE_WEIGHT: f32 = 0.7;
pub const DEFAULT_AUDIO_WEIGHT: f32 = 0.3;

/// Relative contribution of each modality to the combined vector
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FusionWeights {
    pub face: f32,
    pub audio: f32,
}

impl Default for FusionWeights {
    fn default() -> Self {
        Self {
            face: DEFAULT_FACE_WEIGHT,
            audio: DEFAULT_AUDIO_WEIGHT,
        }
    }
}

impl FusionWeights {
    pub fn new(face: f32, audio: f32) -> Self {
        Self { face, audio }
    }

    /// Renormalize so the weights sum to 1. Degenerate input (non-finite or
    /// non-positive sum) falls back to the defaults.
    pub fn normalized(&self) -> FusionWeights {
        let sum = self.face + self.audio;
        if !sum.is_finite() || sum <= 0.0 || self.face < 0.0 || self.audio < 0.0 {
            return FusionWeights::default();
        }
        FusionWeights {
            face: self.face / sum,
            audio: self.audio / sum,
        }
    }
}

// ==============================================================================
// Modality Source
// ==============================================================================

/// Which signal path produced a reading
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModalitySource {
    Face,
    Audio,
    Fused,
}

impl ModalitySource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModalitySource::Face => "face",
            ModalitySource::Audio => "audio",
            ModalitySource::Fused => "fused",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scores_clamped_on_insert() {
        let mut v = EmotionVector::new();
        v.set(Emotion::Happy, 1.7);
        v.set(Emotion::Sad, -0.2);
        v.set(Emotion::Angry, f32::NAN);
        assert_eq!(v.get(Emotion::Happy), 1.0);
        assert_eq!(v.get(Emotion::Sad), 0.0);
        assert_eq!(v.get(Emotion::Angry), 0.0);
    }

    #[test]
    fn test_dominant_picks_highest_score() {
        let v = EmotionVector::from_pairs([
            (Emotion::Happy, 0.4),
            (Emotion::Angry, 0.9),
            (Emotion::Sad, 0.2),
        ]);
        assert_eq!(v.dominant(), Some((Emotion::Angry, 0.9)));
    }

    #[test]
    fn test_dominant_tie_is_deterministic() {
        let v = EmotionVector::from_pairs([(Emotion::Surprised, 0.5), (Emotion::Happy, 0.5)]);
        // Happy sorts before Surprised in label order
        assert_eq!(v.dominant(), Some((Emotion::Happy, 0.5)));
    }

    #[test]
    fn test_weights_renormalize_to_unit_sum() {
        let w = FusionWeights::new(2.0, 2.0).normalized();
        assert!((w.face - 0.5).abs() < 1e-6);
        assert!((w.audio - 0.5).abs() < 1e-6);

        let w = FusionWeights::new(0.7, 0.3).normalized();
        assert!((w.face + w.audio - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_degenerate_weights_fall_back_to_defaults() {
        assert_eq!(FusionWeights::new(0.0, 0.0).normalized(), FusionWeights::default());
        assert_eq!(FusionWeights::new(-1.0, 0.5).normalized(), FusionWeights::default());
        assert_eq!(FusionWeights::new(f32::NAN, 0.5).normalized(), FusionWeights::default());
    }

    #[test]
    fn test_negative_affect_labels() {
        assert!(Emotion::Angry.is_negative_affect());
        assert!(Emotion::Fearful.is_negative_affect());
        assert!(Emotion::Disgusted.is_negative_affect());
        assert!(Emotion::Sad.is_negative_affect());
        assert!(!Emotion::Happy.is_negative_affect());
        assert!(!Emotion::Surprised.is_negative_affect());
        assert!(!Emotion::Neutral.is_negative_affect());
    }
}
