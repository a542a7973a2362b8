// Engine orchestrator - one instance per stream, owning all tracking,
// fusion, quality, and rendering state for that stream

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, watch, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::core::audio_expression::{AudioExpressionSource, AUDIO_SAMPLE_INTERVAL_MS};
use crate::core::config::EngineConfig;
use crate::core::emotion_fusion::{EmotionFusionEngine, FusionOutcome};
use crate::core::face_detector::{select_primary, DetectorError, FaceDetector};
use crate::core::quality_controller::QualityController;
use crate::core::render_pipeline::{RenderOptions, RenderPipeline, RenderResult};
use crate::core::tracking_estimator::TrackingEstimator;
use crate::models::events::{EmotionReading, EngineEvent, FaceDetectionStatus, QualityChange};
use crate::models::frame::Frame;
use crate::models::quality::{NetworkCondition, QualityClass, QualityProfile};
use crate::models::tracking::Prediction;

/// Bounded event queue: a stalled consumer drops events rather than
/// blocking the tick
const EVENT_QUEUE_DEPTH: usize = 64;
/// Tick/detector timing averages are logged every this many frames
const TIMING_LOG_STRIDE: u64 = 300;

// ==============================================================================
// Errors
// ==============================================================================

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Engine already running")]
    AlreadyRunning,

    #[error("Engine has been stopped; construct a new engine for this stream")]
    Stopped,

    #[error("Face detector initialization failed: {0}")]
    DetectorInit(#[source] DetectorError),
}

pub type EngineResult<T> = Result<T, EngineError>;

// ==============================================================================
// Stream I/O traits
// ==============================================================================

/// Supplies frames to the tick loop. `None` means no frame is available
/// right now (paused or ended input) - an idle condition, not an error.
#[async_trait]
pub trait FrameSource: Send {
    async fn next_frame(&mut self) -> Option<Frame>;
}

/// Drawable surface the composited frame is presented to. Must match the
/// input frame's dimensions; the pipeline never resizes.
pub trait RenderTarget: Send {
    fn present(&mut self, frame: &Frame) -> RenderResult<()>;
}

// ==============================================================================
// Engine state
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineState {
    Idle,
    Running,
    /// Terminal: a stopped engine is re-constructed, not restarted
    Stopped,
}

/// Point-in-time engine status for the host UI
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineStatus {
    pub stream_id: String,
    pub state: EngineState,
    pub no_face_count: u32,
    pub quality: Option<QualityClass>,
    pub last_tick_ms: f64,
}

#[derive(Debug, Clone, Copy, Default)]
struct StatusSnapshot {
    no_face_count: u32,
    quality: Option<QualityClass>,
    last_tick_ms: f64,
}

// ==============================================================================
// Engine
// ==============================================================================

/// Per-stream orchestrator.
///
/// All dependencies are passed in explicitly at construction; nothing is
/// discovered through globals, so any number of engines can run
/// concurrently without cross-talk. Events are delivered on the receiver
/// returned by `new`.
pub struct Engine {
    stream_id: String,
    state: Arc<RwLock<EngineState>>,
    config: Arc<RwLock<EngineConfig>>,
    detector: Arc<dyn FaceDetector>,
    audio_source: Option<Arc<dyn AudioExpressionSource>>,
    fusion: Arc<Mutex<EmotionFusionEngine>>,
    pipeline: Option<RenderPipeline>,
    events_tx: mpsc::Sender<EngineEvent>,
    network_tx: watch::Sender<Option<NetworkCondition>>,
    shutdown_tx: watch::Sender<bool>,
    snapshot: Arc<std::sync::Mutex<StatusSnapshot>>,
    video_task: Option<JoinHandle<()>>,
    audio_task: Option<JoinHandle<()>>,
}

impl Engine {
    pub fn new(
        detector: Arc<dyn FaceDetector>,
        audio_source: Option<Arc<dyn AudioExpressionSource>>,
        pipeline: RenderPipeline,
        config: EngineConfig,
    ) -> (Self, mpsc::Receiver<EngineEvent>) {
        let (events_tx, events_rx) = mpsc::channel(EVENT_QUEUE_DEPTH);
        let (network_tx, _) = watch::channel(None);
        let (shutdown_tx, _) = watch::channel(false);
        let fusion = EmotionFusionEngine::new(config.fusion_weights);

        let engine = Self {
            stream_id: Uuid::new_v4().to_string(),
            state: Arc::new(RwLock::new(EngineState::Idle)),
            config: Arc::new(RwLock::new(config)),
            detector,
            audio_source,
            fusion: Arc::new(Mutex::new(fusion)),
            pipeline: Some(pipeline),
            events_tx,
            network_tx,
            shutdown_tx,
            snapshot: Arc::new(std::sync::Mutex::new(StatusSnapshot::default())),
            video_task: None,
            audio_task: None,
        };
        (engine, events_rx)
    }

    pub fn stream_id(&self) -> &str {
        &self.stream_id
    }

    /// Handle for runtime configuration changes; the tick loop re-reads it
    /// every frame.
    pub fn config_handle(&self) -> Arc<RwLock<EngineConfig>> {
        self.config.clone()
    }

    /// Declare (or clear) the host-reported network classification
    pub fn set_network_condition(&self, condition: Option<NetworkCondition>) {
        let _ = self.network_tx.send(condition);
    }

    pub async fn status(&self) -> EngineStatus {
        let snapshot = *self.snapshot.lock().unwrap_or_else(|e| e.into_inner());
        EngineStatus {
            stream_id: self.stream_id.clone(),
            state: *self.state.read().await,
            no_face_count: snapshot.no_face_count,
            quality: snapshot.quality,
            last_tick_ms: snapshot.last_tick_ms,
        }
    }

    /// Start processing the stream.
    ///
    /// Initializes the detection capability first; a failure there is fatal
    /// to this call, reported once, and leaves the engine Idle so the caller
    /// may retry. On success the video tick and audio sampling tasks are
    /// spawned and the engine transitions to Running.
    pub async fn start(
        &mut self,
        source: Box<dyn FrameSource>,
        target: Box<dyn RenderTarget>,
    ) -> EngineResult<()> {
        {
            let state = self.state.read().await;
            match *state {
                EngineState::Running => return Err(EngineError::AlreadyRunning),
                EngineState::Stopped => return Err(EngineError::Stopped),
                EngineState::Idle => {}
            }
        }

        self.detector
            .initialize()
            .await
            .map_err(EngineError::DetectorInit)?;

        let pipeline = match self.pipeline.take() {
            Some(p) => p,
            // start() raced with itself; the state check above makes this
            // unreachable in practice
            None => return Err(EngineError::AlreadyRunning),
        };

        let worker = StreamWorker {
            stream_id: self.stream_id.clone(),
            config: self.config.clone(),
            detector: self.detector.clone(),
            fusion: self.fusion.clone(),
            estimator: TrackingEstimator::new(self.config.read().await.prediction_strength),
            quality: QualityController::new(),
            pipeline,
            source,
            target,
            events: self.events_tx.clone(),
            network_rx: self.network_tx.subscribe(),
            snapshot: self.snapshot.clone(),
            prof_frames: 0,
            prof_detect: Duration::ZERO,
        };

        let shutdown_rx = self.shutdown_tx.subscribe();
        self.video_task = Some(tokio::spawn(worker.run(shutdown_rx)));

        if let Some(audio) = self.audio_source.clone() {
            let shutdown_rx = self.shutdown_tx.subscribe();
            self.audio_task = Some(tokio::spawn(run_audio_sampler(
                audio,
                self.fusion.clone(),
                self.config.clone(),
                self.events_tx.clone(),
                shutdown_rx,
            )));
        }

        *self.state.write().await = EngineState::Running;
        info!(stream = %self.stream_id, "engine started");
        Ok(())
    }

    /// Stop processing. Idempotent; the engine is terminal afterwards and
    /// holds no scheduled work.
    pub async fn stop(&mut self) {
        {
            let mut state = self.state.write().await;
            if *state == EngineState::Stopped {
                return;
            }
            *state = EngineState::Stopped;
        }

        // Cooperative shutdown: in-flight detector calls run to completion
        let _ = self.shutdown_tx.send(true);
        if let Some(handle) = self.video_task.take() {
            let _ = handle.await;
        }
        if let Some(handle) = self.audio_task.take() {
            let _ = handle.await;
        }
        info!(stream = %self.stream_id, "engine stopped");
    }
}

// ==============================================================================
// Video tick worker
// ==============================================================================

struct StreamWorker {
    stream_id: String,
    config: Arc<RwLock<EngineConfig>>,
    detector: Arc<dyn FaceDetector>,
    fusion: Arc<Mutex<EmotionFusionEngine>>,
    estimator: TrackingEstimator,
    quality: QualityController,
    pipeline: RenderPipeline,
    source: Box<dyn FrameSource>,
    target: Box<dyn RenderTarget>,
    events: mpsc::Sender<EngineEvent>,
    network_rx: watch::Receiver<Option<NetworkCondition>>,
    snapshot: Arc<std::sync::Mutex<StatusSnapshot>>,
    prof_frames: u64,
    prof_detect: Duration,
}

impl StreamWorker {
    async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        let mut fps = self.config.read().await.target_fps.clamp(1, 60);
        let mut ticker = tokio::time::interval(Duration::from_millis((1000 / fps as u64).max(1)));
        // Overlapping ticks are skipped, not queued: slow detector calls
        // lower the effective rate instead of building a backlog
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                _ = ticker.tick() => {
                    self.tick().await;

                    let target_fps = self.config.read().await.target_fps.clamp(1, 60);
                    if target_fps != fps {
                        fps = target_fps;
                        ticker = tokio::time::interval(Duration::from_millis((1000 / fps as u64).max(1)));
                        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
                        debug!(stream = %self.stream_id, fps, "tick interval retuned");
                    }
                }
            }
        }
        debug!(stream = %self.stream_id, "video worker exited");
    }

    async fn tick(&mut self) {
        let Some(mut frame) = self.source.next_frame().await else {
            // Paused or ended input: no miss counting, no events
            return;
        };

        let started = Instant::now();
        let cfg = self.config.read().await.clone();
        self.estimator.set_prediction_strength(cfg.prediction_strength);

        let detect_start = Instant::now();
        let detections = match self.detector.detect(&frame).await {
            Ok(d) => d,
            Err(e) => {
                warn!(stream = %self.stream_id, error = %e, "detection failed; treating as zero detections");
                Vec::new()
            }
        };
        self.prof_detect += detect_start.elapsed();

        let primary = select_primary(detections);
        let face_detected = primary.is_some();

        let prediction = match primary {
            Some(detection) => {
                let clipped = detection.face_box.clip(frame.width, frame.height);
                self.estimator.record_observation(clipped, frame.timestamp_ms);

                if cfg.emotion_detection_enabled
                    && cfg.detection_mode.uses_face()
                    && !detection.expressions.is_empty()
                {
                    let outcome = {
                        let mut fusion = self.fusion.lock().await;
                        fusion.set_weights(cfg.fusion_weights);
                        if fusion.update_visual(detection.expressions.clone()) {
                            fusion.combine()
                        } else {
                            None
                        }
                    };
                    if let Some(outcome) = outcome {
                        publish_fusion(&self.config, &self.events, outcome).await;
                    }
                }

                Some(Prediction {
                    face_box: clipped,
                    is_predicted: false,
                })
            }
            None => {
                self.estimator.on_miss();
                if cfg.prediction_enabled {
                    self.estimator.predict(frame.timestamp_ms).map(|p| Prediction {
                        face_box: p.face_box.clip(frame.width, frame.height),
                        is_predicted: p.is_predicted,
                    })
                } else {
                    self.estimator.last_valid_box().map(|b| Prediction {
                        face_box: b.clip(frame.width, frame.height),
                        is_predicted: false,
                    })
                }
            }
        };

        let no_face_count = self.estimator.miss_count();
        let full_page_blur_active =
            cfg.full_page_blur_enabled && no_face_count >= cfg.no_face_threshold;

        let render_opts = RenderOptions {
            blur_enabled: cfg.blur_enabled,
            glassmorphism_enabled: cfg.glassmorphism_enabled,
            blur_intensity: cfg.blur_intensity,
            full_frame_blur: full_page_blur_active,
            velocity_magnitude: self.estimator.velocity().magnitude(),
        };
        if let Err(e) = self.pipeline.compose(&mut frame, prediction.as_ref(), &render_opts) {
            warn!(stream = %self.stream_id, error = %e, "compose failed; presenting raw frame");
        }
        if let Err(e) = self.target.present(&frame) {
            warn!(stream = %self.stream_id, error = %e, "render target rejected frame");
        }

        self.emit(EngineEvent::FaceDetectionStatus(FaceDetectionStatus {
            face_detected,
            no_face_count,
            full_page_blur_active,
            is_predicted: prediction.map(|p| p.is_predicted).unwrap_or(false),
        }));

        // Quality retune: declared network class first, then observed latency
        let declared = *self.network_rx.borrow();
        if declared != self.quality.network_condition() {
            if let Some(profile) = self.quality.set_network_condition(declared) {
                self.apply_profile(profile).await;
            }
        }
        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
        if let Some(profile) = self.quality.observe_tick(elapsed_ms) {
            self.apply_profile(profile).await;
        }

        {
            let mut snapshot = self.snapshot.lock().unwrap_or_else(|e| e.into_inner());
            snapshot.no_face_count = no_face_count;
            snapshot.quality = self.quality.applied_class();
            snapshot.last_tick_ms = elapsed_ms;
        }

        self.prof_frames += 1;
        if self.prof_frames % TIMING_LOG_STRIDE == 0 {
            debug!(
                stream = %self.stream_id,
                frames = self.prof_frames,
                detect_ms_per_frame = self.prof_detect.as_secs_f64() * 1000.0 / self.prof_frames as f64,
                "tick timings"
            );
        }
    }

    async fn apply_profile(&mut self, profile: QualityProfile) {
        {
            let mut cfg = self.config.write().await;
            cfg.blur_intensity = profile.blur_intensity;
            cfg.target_fps = profile.target_fps;
        }
        let message = format!(
            "{} quality: {} fps, blur intensity {}",
            profile.class.as_str(),
            profile.target_fps,
            profile.blur_intensity
        );
        info!(stream = %self.stream_id, class = profile.class.as_str(), "quality profile applied");
        self.emit(EngineEvent::NetworkConditionChange(QualityChange {
            condition: profile.class,
            network: self.quality.network_condition(),
            message,
        }));
    }

    fn emit(&self, event: EngineEvent) {
        if self.events.try_send(event).is_err() {
            debug!(stream = %self.stream_id, "event queue full or closed; dropping event");
        }
    }
}

// ==============================================================================
// Fusion publication (shared by the video tick and the audio sampler)
// ==============================================================================

async fn publish_fusion(
    config: &Arc<RwLock<EngineConfig>>,
    events: &mpsc::Sender<EngineEvent>,
    outcome: FusionOutcome,
) {
    let _ = events.try_send(EngineEvent::EmotionDetected(EmotionReading {
        vector: outcome.combined.clone(),
        source: outcome.source,
    }));

    if let Some(event) = outcome.discomfort {
        // Privacy safeguard: discomfort always turns face blur on,
        // independent of any downstream permission check
        {
            let mut cfg = config.write().await;
            if !cfg.blur_enabled {
                info!(
                    emotion = event.emotion.as_str(),
                    score = event.score,
                    "discomfort detected; enabling privacy blur"
                );
                cfg.blur_enabled = true;
            }
        }
        let _ = events.try_send(EngineEvent::DiscomfortDetected(event));
    }
}

// ==============================================================================
// Audio sampling task
// ==============================================================================

async fn run_audio_sampler(
    source: Arc<dyn AudioExpressionSource>,
    fusion: Arc<Mutex<EmotionFusionEngine>>,
    config: Arc<RwLock<EngineConfig>>,
    events: mpsc::Sender<EngineEvent>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(Duration::from_millis(AUDIO_SAMPLE_INTERVAL_MS));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
            _ = ticker.tick() => {
                let cfg = config.read().await.clone();
                if !cfg.emotion_detection_enabled || !cfg.detection_mode.uses_audio() {
                    continue;
                }

                match source.sample().await {
                    Ok(Some(vector)) => {
                        let outcome = {
                            let mut fusion = fusion.lock().await;
                            fusion.set_weights(cfg.fusion_weights);
                            if fusion.update_audio(vector) {
                                fusion.combine()
                            } else {
                                None
                            }
                        };
                        if let Some(outcome) = outcome {
                            publish_fusion(&config, &events, outcome).await;
                        }
                    }
                    Ok(None) => {}
                    Err(e) => warn!(error = %e, "audio expression sampling failed"),
                }
            }
        }
    }
    debug!("audio sampler exited");
}
