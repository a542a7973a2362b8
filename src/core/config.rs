use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::models::emotion::FusionWeights;

/// Which signal paths participate in emotion fusion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionMode {
    Face,
    Audio,
    Both,
}

impl DetectionMode {
    pub fn uses_face(&self) -> bool {
        matches!(self, DetectionMode::Face | DetectionMode::Both)
    }

    pub fn uses_audio(&self) -> bool {
        matches!(self, DetectionMode::Audio | DetectionMode::Both)
    }
}

/// Engine configuration
///
/// Every field is mutable at runtime through the handle the engine exposes;
/// the tick loop re-reads the configuration each frame.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EngineConfig {
    /// Apply privacy blur around the tracked face
    pub blur_enabled: bool,
    /// Blur strength (1-30)
    pub blur_intensity: u8,
    /// Translucent glass overlay on top of the blurred region
    pub glassmorphism_enabled: bool,
    /// Blur the whole frame after `no_face_threshold` consecutive misses
    pub full_page_blur_enabled: bool,
    /// Run emotion fusion at all
    pub emotion_detection_enabled: bool,
    /// Which modalities feed fusion
    pub detection_mode: DetectionMode,
    /// Relative modality weights, renormalized before use
    pub fusion_weights: FusionWeights,
    /// Extrapolate face position across detector misses
    pub prediction_enabled: bool,
    /// Multiplier on the extrapolation distance
    pub prediction_strength: f32,
    /// Consecutive misses before full-frame blur engages
    pub no_face_threshold: u32,
    /// Video tick rate (1-60)
    pub target_fps: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            blur_enabled: true,
            blur_intensity: 15,
            glassmorphism_enabled: true,
            full_page_blur_enabled: true,
            emotion_detection_enabled: true,
            detection_mode: DetectionMode::Both,
            fusion_weights: FusionWeights::default(),
            prediction_enabled: true,
            prediction_strength: 1.2,
            no_face_threshold: 10,
            target_fps: 5,
        }
    }
}

impl EngineConfig {
    /// Load configuration from file, creating with defaults if it doesn't exist
    pub fn load() -> Result<Self, Box<dyn std::error::Error>> {
        let config_path = Self::get_config_path()?;

        if config_path.exists() {
            let contents = std::fs::read_to_string(&config_path)?;
            let config: EngineConfig = serde_json::from_str(&contents)?;
            config.validate()?;
            Ok(config)
        } else {
            let config = Self::default();
            config.save()?;
            Ok(config)
        }
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<(), Box<dyn std::error::Error>> {
        self.validate()?;

        let config_path = Self::get_config_path()?;

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(&config_path, contents)?;

        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), Box<dyn std::error::Error>> {
        if !(1..=30).contains(&self.blur_intensity) {
            return Err(format!(
                "Invalid blur intensity: {}. Must be between 1 and 30",
                self.blur_intensity
            )
            .into());
        }

        if self.target_fps == 0 || self.target_fps > 60 {
            return Err(format!(
                "Invalid target FPS: {}. Must be between 1 and 60",
                self.target_fps
            )
            .into());
        }

        if !self.prediction_strength.is_finite() || self.prediction_strength < 0.0 {
            return Err(format!(
                "Invalid prediction strength: {}. Must be a non-negative number",
                self.prediction_strength
            )
            .into());
        }

        if self.no_face_threshold == 0 {
            return Err("Invalid no-face threshold: must be at least 1".into());
        }

        if !self.fusion_weights.face.is_finite()
            || !self.fusion_weights.audio.is_finite()
            || self.fusion_weights.face < 0.0
            || self.fusion_weights.audio < 0.0
            || self.fusion_weights.face + self.fusion_weights.audio <= 0.0
        {
            return Err(format!(
                "Invalid fusion weights: ({}, {}). Must be non-negative with a positive sum",
                self.fusion_weights.face, self.fusion_weights.audio
            )
            .into());
        }

        Ok(())
    }

    /// Reset to default configuration
    pub fn reset() -> Result<Self, Box<dyn std::error::Error>> {
        let config = Self::default();
        config.save()?;
        Ok(config)
    }

    /// Get the configuration file path
    fn get_config_path() -> Result<PathBuf, Box<dyn std::error::Error>> {
        let home = std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .map_err(|_| "Could not determine home directory")?;

        let mut path = PathBuf::from(home);
        path.push(".faceveil");
        path.push("config");
        path.push("settings.json");

        Ok(path)
    }
}
