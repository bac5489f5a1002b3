//! End-to-end run orchestration: initialization, optional rectification,
//! tracking, calibration.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use log::{debug, info, warn};
use ndarray::Array3;
use thiserror::Error;

use crate::pipeline::buffer::TrajectoryBuffer;
use crate::pipeline::calibrate::{CalibrationError, Scale, calibrate, derive_scale};
use crate::pipeline::init::{InitializationError, MarkerInitializer};
use crate::pipeline::output::WaveformResult;
use crate::pipeline::rectify::Rectifier;
use crate::pipeline::source::FrameSource;
use crate::tracker::{BankConfig, Frame, Observation, TrackerBank};

/// Where the pixels-per-meter conversion comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum ScaleSource {
    /// Caller-supplied global scale.
    Ppm(f64),
    /// Per-marker scales derived from the setup's reference point pairs.
    FromReferencePoints,
}

/// Configuration for a pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub bank: BankConfig,
    pub scale: ScaleSource,
}

impl PipelineConfig {
    pub fn with_ppm(ppm: f64) -> Self {
        Self {
            bank: BankConfig::default(),
            scale: ScaleSource::Ppm(ppm),
        }
    }

    pub fn from_reference_points() -> Self {
        Self {
            bank: BankConfig::default(),
            scale: ScaleSource::FromReferencePoints,
        }
    }
}

/// Error type for fatal pipeline failures.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("frame source failed while {stage}")]
    Source {
        stage: &'static str,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    #[error("frame source yielded no frames")]
    EmptySource,
    #[error(transparent)]
    Initialization(#[from] InitializationError),
    #[error("per-marker calibration requested but the setup has no reference points")]
    MissingReferencePoints,
    #[error(transparent)]
    Calibration(#[from] CalibrationError),
}

/// Cooperative cancellation handle for a running pipeline.
///
/// Clone it, hand the clone to a signal handler or UI, and call
/// [`CancelToken::cancel`]; the tracking loop stops at the next frame
/// boundary and the run still produces its partial result.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Everything a finished run produces.
#[derive(Debug, Clone)]
pub struct RunOutput {
    /// Calibrated measurements in meters.
    pub waveform: WaveformResult,
    /// The uncalibrated pixel trajectory, same shape.
    pub pixel_positions: Array3<f64>,
    /// Frames actually processed, including frame 0.
    pub frames_processed: usize,
    /// True when the run was stopped through its cancel token.
    pub cancelled: bool,
}

/// Orchestrates one run: read frame 0, initialize markers, track every
/// remaining frame into the trajectory buffer, then calibrate.
pub struct Pipeline<S: FrameSource, I: MarkerInitializer> {
    source: S,
    initializer: I,
    config: PipelineConfig,
    rectifier: Option<Box<dyn Rectifier>>,
    cancel: CancelToken,
    frame_callback: Option<Box<dyn FnMut(&Frame, &[Observation])>>,
}

impl<S: FrameSource, I: MarkerInitializer> Pipeline<S, I> {
    pub fn new(source: S, initializer: I, config: PipelineConfig) -> Self {
        Self {
            source,
            initializer,
            config,
            rectifier: None,
            cancel: CancelToken::new(),
            frame_callback: None,
        }
    }

    /// Rectify every frame (including frame 0) before tracking.
    pub fn with_rectifier(mut self, rectifier: impl Rectifier + 'static) -> Self {
        self.rectifier = Some(Box::new(rectifier));
        self
    }

    /// Observe each processed frame together with its observations.
    ///
    /// Intended for live preview or overlay dumps; the callback cannot
    /// influence tracking.
    pub fn with_frame_callback(
        mut self,
        callback: impl FnMut(&Frame, &[Observation]) + 'static,
    ) -> Self {
        self.frame_callback = Some(Box::new(callback));
        self
    }

    /// Handle for cancelling this run from elsewhere.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Execute the run to completion (or cancellation).
    pub fn run(self) -> Result<RunOutput, PipelineError> {
        let Pipeline {
            mut source,
            mut initializer,
            config,
            rectifier,
            cancel,
            mut frame_callback,
        } = self;

        let apply_rectifier = |frame: Frame| -> Frame {
            match &rectifier {
                Some(r) => r.rectify(&frame),
                None => frame,
            }
        };

        let hint = source.frame_count_hint();
        info!("opening frame source, {} frames reported", hint);

        let first = source
            .next_frame()
            .map_err(|e| PipelineError::Source {
                stage: "reading the first frame",
                source: Box::new(e),
            })?
            .ok_or(PipelineError::EmptySource)?;
        let first = apply_rectifier(first);
        if rectifier.is_some() {
            debug!(
                "rectifying frames to {}x{}",
                first.width, first.height
            );
        }

        let setup = initializer.select(&first)?;
        let num_markers = setup.regions.len();
        let mut bank = TrackerBank::initialize(&first, &setup.regions, &config.bank);
        let mut buffer = TrajectoryBuffer::new(hint.max(1), num_markers);

        // Frame 0 positions come straight from the initial regions.
        let initial = bank.observations();
        for obs in &initial {
            buffer.record(0, obs.marker_id, obs.status, obs.bbox.center());
        }
        if let Some(cb) = frame_callback.as_mut() {
            cb(&first, &initial);
        }
        info!(
            "tracking {} markers across {} frames",
            num_markers,
            buffer.num_frames()
        );

        let mut frames_processed = 1;
        let mut cancelled = false;
        loop {
            if cancel.is_cancelled() {
                info!(
                    "cancelled after {} frames; remaining frames stay unset",
                    frames_processed
                );
                cancelled = true;
                break;
            }

            let frame = match source.next_frame() {
                Ok(Some(frame)) => apply_rectifier(frame),
                Ok(None) => break,
                // A partially decodable video still yields a usable partial
                // result; only a missing first frame is fatal.
                Err(e) => {
                    warn!(
                        "frame decode failed after {} frames, stopping early: {}",
                        frames_processed, e
                    );
                    break;
                }
            };

            if frame.index >= buffer.num_frames() {
                warn!(
                    "source exceeded its reported {} frames, ignoring the rest",
                    buffer.num_frames()
                );
                break;
            }

            let observations = bank.update(&frame);
            for obs in &observations {
                buffer.record(frame.index, obs.marker_id, obs.status, obs.bbox.center());
            }
            if let Some(cb) = frame_callback.as_mut() {
                cb(&frame, &observations);
            }
            frames_processed += 1;
        }

        info!("calibrating {} recorded frames", frames_processed);
        let scale = match &config.scale {
            ScaleSource::Ppm(ppm) => Scale::Global(*ppm),
            ScaleSource::FromReferencePoints => {
                let pairs = setup
                    .reference_points
                    .as_ref()
                    .ok_or(PipelineError::MissingReferencePoints)?;
                Scale::PerMarker(derive_scale(pairs))
            }
        };

        let pixel_positions = buffer.into_positions();
        let meters = calibrate(&pixel_positions, &scale)?;

        Ok(RunOutput {
            waveform: WaveformResult::new(meters),
            pixel_positions,
            frames_processed,
            cancelled,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::init::MarkerSetupBuilder;
    use crate::pipeline::source::BufferedSource;
    use crate::tracker::Rect;

    fn blob_frame(cx: f32, cy: f32) -> Frame {
        Frame::from_fn(0, 64, 64, move |x, y| {
            if (x as f32 - cx).abs() <= 4.0 && (y as f32 - cy).abs() <= 4.0 {
                200.0
            } else {
                10.0
            }
        })
    }

    #[test]
    fn test_empty_source_is_fatal() {
        let source = BufferedSource::new(vec![]);
        let init = |_: &Frame| MarkerSetupBuilder::new().build(0);
        let pipeline = Pipeline::new(source, init, PipelineConfig::with_ppm(100.0));
        assert!(matches!(pipeline.run(), Err(PipelineError::EmptySource)));
    }

    #[test]
    fn test_missing_reference_points_is_fatal() {
        let source = BufferedSource::new(vec![blob_frame(30.0, 30.0)]);
        let init = |_: &Frame| {
            MarkerSetupBuilder::new()
                .region(Rect::from_center(30.0, 30.0, 16.0, 16.0))
                .build(1)
        };
        let pipeline = Pipeline::new(source, init, PipelineConfig::from_reference_points());
        assert!(matches!(
            pipeline.run(),
            Err(PipelineError::MissingReferencePoints)
        ));
    }

    #[test]
    fn test_initializer_count_mismatch_is_fatal() {
        let source = BufferedSource::new(vec![blob_frame(30.0, 30.0)]);
        let init = |_: &Frame| {
            MarkerSetupBuilder::new()
                .region(Rect::from_center(30.0, 30.0, 16.0, 16.0))
                .build(2)
        };
        let pipeline = Pipeline::new(source, init, PipelineConfig::with_ppm(100.0));
        assert!(matches!(
            pipeline.run(),
            Err(PipelineError::Initialization(_))
        ));
    }

    #[test]
    fn test_single_frame_run_records_initial_positions() {
        let source = BufferedSource::new(vec![blob_frame(30.0, 30.0)]);
        let init = |_: &Frame| {
            MarkerSetupBuilder::new()
                .region(Rect::from_center(30.0, 30.0, 16.0, 16.0))
                .build(1)
        };
        let output = Pipeline::new(source, init, PipelineConfig::with_ppm(100.0))
            .run()
            .unwrap();

        assert_eq!(output.frames_processed, 1);
        assert!(!output.cancelled);
        assert!((output.waveform.positions[[0, 0, 0]] - 0.30).abs() < 1e-9);
        assert!((output.waveform.positions[[0, 0, 1]] - 0.30).abs() < 1e-9);
    }
}
