/// Tracking status of a marker on a given frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrackStatus {
    /// The tracker located the marker on the current frame
    #[default]
    Active,
    /// The tracker failed on the current frame; the last known region is retained
    Lost,
}

impl TrackStatus {
    #[inline]
    pub fn is_active(&self) -> bool {
        matches!(self, TrackStatus::Active)
    }
}
