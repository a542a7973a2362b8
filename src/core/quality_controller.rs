// Adaptive quality control - watches per-tick processing latency (or a
// declared network class) and retunes frame rate and blur intensity

use std::collections::VecDeque;

use tracing::debug;

use crate::models::quality::{NetworkCondition, QualityClass, QualityProfile};

/// How many tick durations feed the rolling average
const DURATION_WINDOW: usize = 10;
/// Rolling average above this resolves to the low profile (ms)
const SLOW_TICK_MS: f64 = 200.0;
/// Rolling average above this resolves to the medium profile (ms)
const BUSY_TICK_MS: f64 = 100.0;

/// Derives a discretized quality profile from observed processing latency.
///
/// A declared network classification, when present, takes precedence over
/// the latency heuristic. A profile is returned only when the resolved
/// class differs from the previously applied one, so repeated identical
/// classifications never re-notify.
pub struct QualityController {
    durations: VecDeque<f64>,
    network: Option<NetworkCondition>,
    applied: Option<QualityClass>,
}

impl QualityController {
    pub fn new() -> Self {
        Self {
            durations: VecDeque::with_capacity(DURATION_WINDOW),
            network: None,
            applied: None,
        }
    }

    /// Feed one tick's processing duration. Returns the new profile if the
    /// resolved quality class changed.
    pub fn observe_tick(&mut self, elapsed_ms: f64) -> Option<QualityProfile> {
        if elapsed_ms.is_finite() && elapsed_ms >= 0.0 {
            if self.durations.len() == DURATION_WINDOW {
                self.durations.pop_front();
            }
            self.durations.push_back(elapsed_ms);
        }
        self.reclassify()
    }

    /// Declare (or clear) the host-reported network class. Returns the new
    /// profile if the resolved quality class changed.
    pub fn set_network_condition(
        &mut self,
        condition: Option<NetworkCondition>,
    ) -> Option<QualityProfile> {
        self.network = condition;
        self.reclassify()
    }

    pub fn network_condition(&self) -> Option<NetworkCondition> {
        self.network
    }

    pub fn applied_class(&self) -> Option<QualityClass> {
        self.applied
    }

    /// Rolling average of the recorded durations, in milliseconds
    pub fn average_duration_ms(&self) -> f64 {
        if self.durations.is_empty() {
            return 0.0;
        }
        self.durations.iter().sum::<f64>() / self.durations.len() as f64
    }

    fn resolve(&self) -> QualityClass {
        if let Some(network) = self.network {
            return network.quality_class();
        }

        let avg = self.average_duration_ms();
        if avg > SLOW_TICK_MS {
            QualityClass::Low
        } else if avg > BUSY_TICK_MS {
            QualityClass::Medium
        } else {
            QualityClass::High
        }
    }

    fn reclassify(&mut self) -> Option<QualityProfile> {
        let class = self.resolve();
        if self.applied == Some(class) {
            return None;
        }
        debug!(
            from = ?self.applied,
            to = ?class,
            avg_ms = self.average_duration_ms(),
            "quality class changed"
        );
        self.applied = Some(class);
        Some(QualityProfile::for_class(class))
    }
}

impl Default for QualityController {
    fn default() -> Self {
        Self::new()
    }
}
