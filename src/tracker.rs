mod bank;
mod frame;
mod kalman_filter;
mod marker;
mod ncc;
mod rect;
mod status;

pub use bank::{BankConfig, Observation, TrackerBank};
pub use frame::Frame;
pub use kalman_filter::KalmanFilter;
pub use marker::{MarkerState, MarkerTracker, TrackerKind};
pub use ncc::{NccParams, Template, best_match};
pub use rect::Rect;
pub use status::TrackStatus;
