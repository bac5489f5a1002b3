//! Convert videos of floating markers into calibrated waveform
//! measurements.
//!
//! A run tracks N markers (stakes or floats on a water surface) across a
//! frame sequence, accumulates their pixel centers into a
//! (frames x markers x 2) trajectory, and divides by a pixels-per-meter
//! scale to obtain physical displacements. Tracking loss is per-marker and
//! per-frame: affected cells are left as NaN and the run carries on.
//!
//! ```no_run
//! use wavetrack_rs::pipeline::{
//!     ImageSequenceSource, MarkerSetupBuilder, Pipeline, PipelineConfig, PresetRegions,
//! };
//! use wavetrack_rs::tracker::Rect;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let source = ImageSequenceSource::open("frames/".as_ref())?;
//! let setup = MarkerSetupBuilder::new()
//!     .region(Rect::new(120.0, 340.0, 24.0, 24.0))
//!     .region(Rect::new(480.0, 352.0, 24.0, 24.0))
//!     .build(2)?;
//!
//! let pipeline = Pipeline::new(
//!     source,
//!     PresetRegions::new(setup),
//!     PipelineConfig::with_ppm(750.0),
//! );
//! let output = pipeline.run()?;
//! println!("vertical displacement, marker 0: {:?}", output.waveform.elevation(0));
//! # Ok(())
//! # }
//! ```

pub mod pipeline;
pub mod tracker;

pub use pipeline::{Pipeline, PipelineConfig, RunOutput, WaveformResult};
pub use tracker::{BankConfig, Frame, Rect, TrackStatus, TrackerBank};
