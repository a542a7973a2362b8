// Data models for adaptive quality control

use serde::{Deserialize, Serialize};

// ==============================================================================
// Quality Classes & Profiles
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityClass {
    Low,
    Medium,
    High,
}

impl QualityClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            QualityClass::Low => "low",
            QualityClass::Medium => "medium",
            QualityClass::High => "high",
        }
    }
}

/// Paired frame-rate target and blur intensity for one quality class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityProfile {
    pub class: QualityClass,
    pub target_fps: u32,
    pub blur_intensity: u8,
}

impl QualityProfile {
    pub fn for_class(class: QualityClass) -> QualityProfile {
        match class {
            QualityClass::Low => QualityProfile {
                class,
                target_fps: 2,
                blur_intensity: 10,
            },
            QualityClass::Medium => QualityProfile {
                class,
                target_fps: 3,
                blur_intensity: 15,
            },
            QualityClass::High => QualityProfile {
                class,
                target_fps: 5,
                blur_intensity: 20,
            },
        }
    }
}

// ==============================================================================
// Network Conditions
// ==============================================================================

/// Coarse network classification reported by the host, when available.
/// Takes precedence over the processing-latency heuristic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NetworkCondition {
    Slow2g,
    #[serde(rename = "2g")]
    TwoG,
    #[serde(rename = "3g")]
    ThreeG,
    #[serde(rename = "4g")]
    FourG,
    Wifi,
    Unknown,
}

impl NetworkCondition {
    pub fn as_str(&self) -> &'static str {
        match self {
            NetworkCondition::Slow2g => "slow-2g",
            NetworkCondition::TwoG => "2g",
            NetworkCondition::ThreeG => "3g",
            NetworkCondition::FourG => "4g",
            NetworkCondition::Wifi => "wifi",
            NetworkCondition::Unknown => "unknown",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "slow-2g" | "slow2g" => NetworkCondition::Slow2g,
            "2g" => NetworkCondition::TwoG,
            "3g" => NetworkCondition::ThreeG,
            "4g" => NetworkCondition::FourG,
            "wifi" => NetworkCondition::Wifi,
            _ => NetworkCondition::Unknown,
        }
    }

    pub fn quality_class(&self) -> QualityClass {
        match self {
            NetworkCondition::Slow2g | NetworkCondition::TwoG => QualityClass::Low,
            NetworkCondition::ThreeG => QualityClass::Medium,
            NetworkCondition::FourG | NetworkCondition::Wifi | NetworkCondition::Unknown => {
                QualityClass::High
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profiles_match_classes() {
        let low = QualityProfile::for_class(QualityClass::Low);
        assert_eq!((low.target_fps, low.blur_intensity), (2, 10));

        let medium = QualityProfile::for_class(QualityClass::Medium);
        assert_eq!((medium.target_fps, medium.blur_intensity), (3, 15));

        let high = QualityProfile::for_class(QualityClass::High);
        assert_eq!((high.target_fps, high.blur_intensity), (5, 20));
    }

    #[test]
    fn test_network_condition_mapping() {
        assert_eq!(NetworkCondition::Slow2g.quality_class(), QualityClass::Low);
        assert_eq!(NetworkCondition::TwoG.quality_class(), QualityClass::Low);
        assert_eq!(NetworkCondition::ThreeG.quality_class(), QualityClass::Medium);
        assert_eq!(NetworkCondition::FourG.quality_class(), QualityClass::High);
        assert_eq!(NetworkCondition::Wifi.quality_class(), QualityClass::High);
        assert_eq!(NetworkCondition::Unknown.quality_class(), QualityClass::High);
    }

    #[test]
    fn test_network_condition_round_trip() {
        for cond in [
            NetworkCondition::Slow2g,
            NetworkCondition::TwoG,
            NetworkCondition::ThreeG,
            NetworkCondition::FourG,
            NetworkCondition::Wifi,
        ] {
            assert_eq!(NetworkCondition::from_str(cond.as_str()), cond);
        }
        assert_eq!(NetworkCondition::from_str("5g"), NetworkCondition::Unknown);
    }
}
