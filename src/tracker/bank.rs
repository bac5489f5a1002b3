//! Bank of independent per-marker trackers.
//!
//! Marker identity is fixed at initialization: entry i tracks marker i for
//! the whole run. Entries never share state, so one marker losing track can
//! not disturb any other.

use log::warn;

use crate::tracker::frame::Frame;
use crate::tracker::marker::{MarkerState, MarkerTracker, TrackerKind};
use crate::tracker::ncc::NccParams;
use crate::tracker::rect::Rect;
use crate::tracker::status::TrackStatus;

/// Configuration for the tracker bank.
#[derive(Debug, Clone, Default)]
pub struct BankConfig {
    pub kind: TrackerKind,
    pub ncc: NccParams,
}

/// Per-frame result for one marker.
#[derive(Debug, Clone, Copy)]
pub struct Observation {
    pub marker_id: usize,
    pub status: TrackStatus,
    /// Current region on success, last known region on loss.
    pub bbox: Rect,
}

struct BankEntry {
    state: MarkerState,
    /// None when the initial region could not seed a tracker; such markers
    /// stay Lost for the whole run.
    tracker: Option<MarkerTracker>,
    warned_lost: bool,
}

pub struct TrackerBank {
    entries: Vec<BankEntry>,
}

impl TrackerBank {
    /// Construct one tracker per initial region, seeded on `frame`.
    ///
    /// A degenerate or out-of-frame region leaves that marker permanently
    /// Lost; the remaining markers are unaffected.
    pub fn initialize(frame: &Frame, regions: &[Rect], config: &BankConfig) -> Self {
        let entries = regions
            .iter()
            .enumerate()
            .map(|(marker_id, &bbox)| {
                let tracker = if bbox.is_degenerate() {
                    warn!("marker {}: degenerate initial region, marking lost", marker_id);
                    None
                } else if !bbox.within(frame.width, frame.height) {
                    warn!(
                        "marker {}: initial region outside {}x{} frame, marking lost",
                        marker_id, frame.width, frame.height
                    );
                    None
                } else {
                    let t = MarkerTracker::create(config.kind, frame, bbox, &config.ncc);
                    if t.is_none() {
                        warn!(
                            "marker {}: initial region has no trackable structure, marking lost",
                            marker_id
                        );
                    }
                    t
                };

                let status = if tracker.is_some() {
                    TrackStatus::Active
                } else {
                    TrackStatus::Lost
                };
                BankEntry {
                    state: MarkerState {
                        marker_id,
                        bbox,
                        status,
                    },
                    tracker,
                    warned_lost: false,
                }
            })
            .collect();

        Self { entries }
    }

    pub fn num_markers(&self) -> usize {
        self.entries.len()
    }

    /// Snapshot of the current per-marker state, one observation per marker.
    pub fn observations(&self) -> Vec<Observation> {
        self.entries
            .iter()
            .map(|e| Observation {
                marker_id: e.state.marker_id,
                status: e.state.status,
                bbox: e.state.bbox,
            })
            .collect()
    }

    /// Advance every tracker by one frame.
    ///
    /// Always returns exactly one observation per marker, in marker order.
    /// A failed update yields a Lost observation carrying the last known
    /// region; the tracker keeps its state and is retried on the next frame.
    pub fn update(&mut self, frame: &Frame) -> Vec<Observation> {
        for entry in self.entries.iter_mut() {
            let Some(tracker) = entry.tracker.as_mut() else {
                continue;
            };
            match tracker.update(frame) {
                Some(bbox) => {
                    entry.state.bbox = bbox;
                    entry.state.status = TrackStatus::Active;
                }
                None => {
                    entry.state.status = TrackStatus::Lost;
                    if !entry.warned_lost {
                        warn!(
                            "marker {}: lost track at frame {}",
                            entry.state.marker_id, frame.index
                        );
                        entry.warned_lost = true;
                    }
                }
            }
        }
        self.observations()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blobs_frame(index: usize, centers: &[(f32, f32)]) -> Frame {
        let centers = centers.to_vec();
        Frame::from_fn(index, 128, 128, move |x, y| {
            let hit = centers.iter().any(|&(cx, cy)| {
                (x as f32 - cx).abs() <= 4.0 && (y as f32 - cy).abs() <= 4.0
            });
            if hit { 200.0 } else { 10.0 }
        })
    }

    fn region_at(cx: f32, cy: f32) -> Rect {
        Rect::from_center(cx, cy, 16.0, 16.0)
    }

    #[test]
    fn test_tracks_two_markers() {
        let first = blobs_frame(0, &[(30.0, 30.0), (90.0, 90.0)]);
        let regions = [region_at(30.0, 30.0), region_at(90.0, 90.0)];
        let mut bank = TrackerBank::initialize(&first, &regions, &BankConfig::default());

        let next = blobs_frame(1, &[(33.0, 31.0), (88.0, 93.0)]);
        let obs = bank.update(&next);
        assert_eq!(obs.len(), 2);
        assert_eq!(obs[0].bbox.center(), (33.0, 31.0));
        assert_eq!(obs[1].bbox.center(), (88.0, 93.0));
        assert!(obs.iter().all(|o| o.status.is_active()));
    }

    #[test]
    fn test_degenerate_region_permanently_lost() {
        let first = blobs_frame(0, &[(30.0, 30.0)]);
        let regions = [Rect::new(10.0, 10.0, 0.0, 16.0), region_at(30.0, 30.0)];
        let mut bank = TrackerBank::initialize(&first, &regions, &BankConfig::default());

        assert_eq!(bank.observations()[0].status, TrackStatus::Lost);

        let next = blobs_frame(1, &[(32.0, 30.0)]);
        let obs = bank.update(&next);
        assert_eq!(obs[0].status, TrackStatus::Lost);
        assert_eq!(obs[1].status, TrackStatus::Active);
        assert_eq!(obs[1].bbox.center(), (32.0, 30.0));
    }

    #[test]
    fn test_loss_does_not_disturb_other_markers() {
        // marker 0 vanishes after frame 1; marker 1 keeps moving
        let first = blobs_frame(0, &[(30.0, 30.0), (90.0, 30.0)]);
        let both = [region_at(30.0, 30.0), region_at(90.0, 30.0)];
        let solo = [region_at(90.0, 30.0)];

        let mut pair_bank = TrackerBank::initialize(&first, &both, &BankConfig::default());
        let first_solo = blobs_frame(0, &[(90.0, 30.0)]);
        let mut solo_bank = TrackerBank::initialize(&first_solo, &solo, &BankConfig::default());

        for k in 1..=4 {
            let y = 30.0 + 5.0 * k as f32;
            let pair_frame = blobs_frame(k, &[(90.0, y)]); // marker 0 gone
            let solo_frame = blobs_frame(k, &[(90.0, y)]);

            let pair_obs = pair_bank.update(&pair_frame);
            let solo_obs = solo_bank.update(&solo_frame);

            assert_eq!(pair_obs[0].status, TrackStatus::Lost);
            assert_eq!(pair_obs[1].status, solo_obs[0].status);
            assert_eq!(pair_obs[1].bbox.center(), solo_obs[0].bbox.center());
        }
    }

    #[test]
    fn test_update_is_deterministic() {
        let first = blobs_frame(0, &[(30.0, 30.0), (90.0, 90.0)]);
        let regions = [region_at(30.0, 30.0), region_at(90.0, 90.0)];
        let frames: Vec<Frame> = (1..=3)
            .map(|k| blobs_frame(k, &[(30.0 + k as f32, 30.0), (90.0, 90.0 - k as f32)]))
            .collect();

        let run = |frames: &[Frame]| {
            let mut bank = TrackerBank::initialize(&first, &regions, &BankConfig::default());
            frames
                .iter()
                .map(|f| {
                    bank.update(f)
                        .iter()
                        .map(|o| o.bbox.center())
                        .collect::<Vec<_>>()
                })
                .collect::<Vec<_>>()
        };

        assert_eq!(run(&frames), run(&frames));
    }
}
