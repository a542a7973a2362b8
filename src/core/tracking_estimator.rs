// Tracking estimator - turns an intermittent detection stream into a
// continuous face-box signal with velocity extrapolation across misses

use std::collections::VecDeque;

use tracing::debug;

use crate::models::tracking::{FaceBox, MotionVelocity, Prediction, TrackingSample};

/// Ring buffer capacity for tracking samples
const SAMPLE_CAPACITY: usize = 60;
/// How many recent samples feed the velocity estimate
const VELOCITY_WINDOW: usize = 10;
/// Exponential smoothing factor for velocity (weight of the new estimate)
const SMOOTHING_ALPHA: f32 = 0.7;
/// Prediction confidence decays linearly to zero over this horizon
const DAMPING_HORIZON_MS: f32 = 2000.0;

/// Converts a stream of (possibly missing) detections into a continuous
/// face-box signal.
///
/// `last_valid_box` is only ever set from a real observation, never from a
/// prediction. All inputs are assumed hostile: non-finite boxes and
/// out-of-order timestamps are dropped rather than propagated.
pub struct TrackingEstimator {
    samples: VecDeque<TrackingSample>,
    last_valid_box: Option<FaceBox>,
    velocity: MotionVelocity,
    /// Set on each new observation; the smoothing step runs once per
    /// observation so `predict` stays pure between observations.
    velocity_stale: bool,
    consecutive_misses: u32,
    prediction_strength: f32,
}

impl TrackingEstimator {
    pub fn new(prediction_strength: f32) -> Self {
        Self {
            samples: VecDeque::with_capacity(SAMPLE_CAPACITY),
            last_valid_box: None,
            velocity: MotionVelocity::default(),
            velocity_stale: false,
            consecutive_misses: 0,
            prediction_strength,
        }
    }

    /// Record a real detection.
    ///
    /// Appends to the ring buffer (evicting the oldest sample beyond
    /// capacity), updates `last_valid_box`, and resets the miss counter.
    /// Samples older than the newest recorded timestamp are dropped to keep
    /// the buffer strictly non-decreasing.
    pub fn record_observation(&mut self, face_box: FaceBox, timestamp_ms: i64) {
        if !face_box.is_finite() {
            debug!("dropping non-finite observation");
            return;
        }

        if let Some(last) = self.samples.back() {
            if timestamp_ms < last.timestamp_ms {
                debug!(
                    timestamp_ms,
                    newest = last.timestamp_ms,
                    "dropping out-of-order observation"
                );
                return;
            }
        }

        if self.samples.len() == SAMPLE_CAPACITY {
            self.samples.pop_front();
        }
        self.samples.push_back(TrackingSample {
            face_box,
            timestamp_ms,
        });
        self.last_valid_box = Some(face_box);
        self.consecutive_misses = 0;
        self.velocity_stale = true;
    }

    /// Register a tick with no usable detection. Returns the new
    /// consecutive-miss count.
    pub fn on_miss(&mut self) -> u32 {
        self.consecutive_misses = self.consecutive_misses.saturating_add(1);
        self.consecutive_misses
    }

    pub fn miss_count(&self) -> u32 {
        self.consecutive_misses
    }

    pub fn last_valid_box(&self) -> Option<FaceBox> {
        self.last_valid_box
    }

    pub fn velocity(&self) -> MotionVelocity {
        self.velocity
    }

    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    pub fn set_prediction_strength(&mut self, strength: f32) {
        if strength.is_finite() && strength >= 0.0 {
            self.prediction_strength = strength;
        }
    }

    /// Extrapolate the face box to `now_ms`.
    ///
    /// Returns `None` when no face was ever observed. With fewer than two
    /// samples the last valid box is returned unmodified. Otherwise the box
    /// is advanced along the smoothed velocity, damped toward zero as the
    /// time since the last real detection approaches the 2 s horizon.
    ///
    /// Pure for fixed state and `now_ms`: the velocity smoothing step runs
    /// at most once per new observation, so repeated calls return the same
    /// box.
    pub fn predict(&mut self, now_ms: i64) -> Option<Prediction> {
        let last_box = self.last_valid_box?;

        if self.samples.len() < 2 {
            return Some(Prediction {
                face_box: last_box,
                is_predicted: false,
            });
        }

        if self.velocity_stale {
            self.refresh_velocity();
        }

        let last_ts = self.samples.back().map(|s| s.timestamp_ms).unwrap_or(now_ms);
        let elapsed = (now_ms - last_ts).max(0) as f32;
        let damping = (1.0 - elapsed / DAMPING_HORIZON_MS).max(0.0);
        let factor = self.prediction_strength * damping;

        let travel = elapsed * factor;
        let predicted = FaceBox {
            x: last_box.x + self.velocity.dx * travel,
            y: last_box.y + self.velocity.dy * travel,
            width: last_box.width + self.velocity.dw * travel,
            height: last_box.height + self.velocity.dh * travel,
        };

        if !predicted.is_finite() {
            debug!("prediction arithmetic degenerated; falling back to last valid box");
            return Some(Prediction {
                face_box: last_box,
                is_predicted: false,
            });
        }

        Some(Prediction {
            face_box: predicted,
            is_predicted: true,
        })
    }

    /// Recompute the smoothed velocity from the recent sample window.
    ///
    /// Consecutive pairs get per-millisecond deltas weighted by `(i/N)^2`
    /// (1-based pair index) so later pairs dominate; pairs with non-positive
    /// time deltas are skipped.
    fn refresh_velocity(&mut self) {
        self.velocity_stale = false;

        let start = self.samples.len().saturating_sub(VELOCITY_WINDOW);
        let window: Vec<&TrackingSample> = self.samples.iter().skip(start).collect();
        let pair_count = window.len().saturating_sub(1);
        if pair_count == 0 {
            return;
        }

        let mut sum = MotionVelocity::default();
        let mut weight_sum = 0.0f32;

        for i in 1..window.len() {
            let prev = window[i - 1];
            let curr = window[i];
            let dt = (curr.timestamp_ms - prev.timestamp_ms) as f32;
            if dt <= 0.0 {
                continue;
            }

            let weight = (i as f32 / pair_count as f32).powi(2);
            sum.dx += weight * (curr.face_box.x - prev.face_box.x) / dt;
            sum.dy += weight * (curr.face_box.y - prev.face_box.y) / dt;
            sum.dw += weight * (curr.face_box.width - prev.face_box.width) / dt;
            sum.dh += weight * (curr.face_box.height - prev.face_box.height) / dt;
            weight_sum += weight;
        }

        if weight_sum <= 0.0 {
            return;
        }

        let avg = MotionVelocity {
            dx: sum.dx / weight_sum,
            dy: sum.dy / weight_sum,
            dw: sum.dw / weight_sum,
            dh: sum.dh / weight_sum,
        };

        let smoothed = MotionVelocity {
            dx: SMOOTHING_ALPHA * avg.dx + (1.0 - SMOOTHING_ALPHA) * self.velocity.dx,
            dy: SMOOTHING_ALPHA * avg.dy + (1.0 - SMOOTHING_ALPHA) * self.velocity.dy,
            dw: SMOOTHING_ALPHA * avg.dw + (1.0 - SMOOTHING_ALPHA) * self.velocity.dw,
            dh: SMOOTHING_ALPHA * avg.dh + (1.0 - SMOOTHING_ALPHA) * self.velocity.dh,
        };

        if smoothed.is_finite() {
            self.velocity = smoothed;
        }
    }

    /// Clear all state (stream teardown)
    pub fn reset(&mut self) {
        self.samples.clear();
        self.last_valid_box = None;
        self.velocity = MotionVelocity::default();
        self.velocity_stale = false;
        self.consecutive_misses = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn boxed(x: f32, y: f32) -> FaceBox {
        FaceBox::new(x, y, 100.0, 100.0)
    }

    #[test]
    fn test_predict_without_observations_is_none() {
        let mut est = TrackingEstimator::new(1.2);
        assert!(est.predict(1000).is_none());
    }

    #[test]
    fn test_single_sample_returns_last_box_unpredicted() {
        let mut est = TrackingEstimator::new(1.2);
        est.record_observation(boxed(10.0, 10.0), 1000);

        let p = est.predict(1500).unwrap();
        assert_eq!(p.face_box, boxed(10.0, 10.0));
        assert!(!p.is_predicted);
    }

    #[test]
    fn test_linear_motion_extrapolates_forward() {
        let mut est = TrackingEstimator::new(1.0);
        // 1 px/ms rightward motion
        est.record_observation(boxed(0.0, 0.0), 0);
        est.record_observation(boxed(100.0, 0.0), 100);

        let p = est.predict(200).unwrap();
        assert!(p.is_predicted);
        // velocity smoothing from zero: v = 0.7 * 1.0 = 0.7 px/ms,
        // damping = 1 - 100/2000 = 0.95, travel = 100 * 0.95
        let expected_x = 100.0 + 0.7 * 100.0 * 0.95;
        assert!(
            (p.face_box.x - expected_x).abs() < 1e-3,
            "got {}, expected {}",
            p.face_box.x,
            expected_x
        );
        assert!((p.face_box.y - 0.0).abs() < 1e-3);
    }

    #[test]
    fn test_predict_is_pure_between_observations() {
        let mut est = TrackingEstimator::new(1.2);
        est.record_observation(boxed(0.0, 0.0), 0);
        est.record_observation(boxed(50.0, 20.0), 100);
        est.record_observation(boxed(100.0, 40.0), 200);

        let first = est.predict(350).unwrap();
        let second = est.predict(350).unwrap();
        assert_eq!(first, second, "predict must be pure for fixed state and now");
    }

    #[test]
    fn test_damping_zeroes_beyond_horizon() {
        let mut est = TrackingEstimator::new(1.2);
        est.record_observation(boxed(0.0, 0.0), 0);
        est.record_observation(boxed(100.0, 0.0), 100);

        for elapsed in [2000, 2500, 10_000] {
            let p = est.predict(100 + elapsed).unwrap();
            assert!(p.is_predicted);
            assert_eq!(
                p.face_box,
                boxed(100.0, 0.0),
                "no movement beyond the damping horizon (elapsed {})",
                elapsed
            );
        }
    }

    #[test]
    fn test_ring_buffer_caps_at_capacity() {
        let mut est = TrackingEstimator::new(1.2);
        for i in 0..80 {
            est.record_observation(boxed(i as f32, 0.0), i * 10);
        }
        assert_eq!(est.sample_count(), 60);
    }

    #[test]
    fn test_out_of_order_samples_dropped() {
        let mut est = TrackingEstimator::new(1.2);
        est.record_observation(boxed(0.0, 0.0), 1000);
        est.record_observation(boxed(50.0, 0.0), 500);
        assert_eq!(est.sample_count(), 1);
        assert_eq!(est.last_valid_box(), Some(boxed(0.0, 0.0)));
    }

    #[test]
    fn test_non_finite_observation_dropped() {
        let mut est = TrackingEstimator::new(1.2);
        est.record_observation(boxed(10.0, 10.0), 0);
        est.record_observation(FaceBox::new(f32::NAN, 0.0, 10.0, 10.0), 100);
        assert_eq!(est.sample_count(), 1);
        assert_eq!(est.last_valid_box(), Some(boxed(10.0, 10.0)));
    }

    #[test]
    fn test_zero_time_delta_pairs_skipped() {
        let mut est = TrackingEstimator::new(1.2);
        est.record_observation(boxed(0.0, 0.0), 100);
        est.record_observation(boxed(1000.0, 0.0), 100);
        est.record_observation(boxed(10.0, 0.0), 200);

        // Only the (1000 -> 10, dt 100) pair contributes; no division by zero
        let p = est.predict(300).unwrap();
        assert!(p.face_box.is_finite());
    }

    #[test]
    fn test_miss_counter_resets_on_observation() {
        let mut est = TrackingEstimator::new(1.2);
        assert_eq!(est.on_miss(), 1);
        assert_eq!(est.on_miss(), 2);
        est.record_observation(boxed(0.0, 0.0), 0);
        assert_eq!(est.miss_count(), 0);
    }

    #[test]
    fn test_reset_clears_everything() {
        let mut est = TrackingEstimator::new(1.2);
        est.record_observation(boxed(0.0, 0.0), 0);
        est.on_miss();
        est.reset();
        assert_eq!(est.sample_count(), 0);
        assert!(est.last_valid_box().is_none());
        assert_eq!(est.miss_count(), 0);
        assert!(est.predict(100).is_none());
    }
}
