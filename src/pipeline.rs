//! Pipeline layer: frame sources, marker initialization, rectification,
//! trajectory accumulation, calibration, and run orchestration.
//!
//! The [`orchestrator::Pipeline`] ties the pieces together; each piece is
//! also usable on its own.

mod buffer;
mod calibrate;
mod init;
mod orchestrator;
mod output;
mod rectify;
mod source;

pub use buffer::TrajectoryBuffer;
pub use calibrate::{CalibrationError, MIN_SCALE, Scale, calibrate, derive_scale};
pub use init::{
    InitializationError, MarkerInitializer, MarkerSetup, MarkerSetupBuilder, PointPair,
    PresetRegions,
};
pub use orchestrator::{
    CancelToken, Pipeline, PipelineConfig, PipelineError, RunOutput, ScaleSource,
};
pub use output::{
    OutputError, WaveformResult, draw_overlay, load_measurements, plot_elevations,
    save_measurements,
};
pub use rectify::{Homography, HomographyRectifier, Rectifier};
pub use source::{BufferedSource, FrameSource, ImageSequenceSource, ImageSourceError};
