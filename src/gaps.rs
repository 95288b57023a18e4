//! Data gap detection.
//!
//! A gap is recorded between two consecutive fixes whose spacing exceeds
//! `data_gap_threshold_seconds`, provided it also lasts at least
//! `data_gap_min_duration_seconds`. The same threshold splits a track into
//! contiguous segments for stay and trip detection.

use log::debug;

use crate::timeline::DataGap;
use crate::{GpsPoint, TimelineConfig};

/// Gap thresholds taken from a [`TimelineConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataGapDetector {
    pub threshold_seconds: i64,
    pub min_duration_seconds: i64,
}

impl Default for DataGapDetector {
    fn default() -> Self {
        Self::from_config(&TimelineConfig::default())
    }
}

impl DataGapDetector {
    pub fn from_config(config: &TimelineConfig) -> Self {
        Self {
            threshold_seconds: config.data_gap_threshold_seconds,
            min_duration_seconds: config.data_gap_min_duration_seconds,
        }
    }

    /// Whether the spacing between two consecutive fixes breaks the track.
    pub fn is_break(&self, from: &GpsPoint, to: &GpsPoint) -> bool {
        to.seconds_since(from) > self.threshold_seconds
    }

    /// Gap between two consecutive fixes, if it is long enough to report.
    pub fn gap_between(&self, from: &GpsPoint, to: &GpsPoint) -> Option<DataGap> {
        let dt = to.seconds_since(from);
        (dt > self.threshold_seconds && dt >= self.min_duration_seconds)
            .then(|| DataGap::between(from.timestamp, to.timestamp))
    }

    /// Detect and merge every gap in an ordered track.
    pub fn detect(&self, points: &[GpsPoint]) -> Vec<DataGap> {
        let gaps: Vec<DataGap> = points
            .windows(2)
            .filter_map(|w| self.gap_between(&w[0], &w[1]))
            .collect();

        let found = gaps.len();
        let merged = merge_gaps(gaps, points);
        if found > 0 {
            debug!(
                "[DataGaps] {} gaps in {} points ({} after merge)",
                found,
                points.len(),
                merged.len()
            );
        }
        merged
    }

    /// Contiguous runs of the track, cut at every break.
    ///
    /// Every point lands in exactly one segment; an empty track gives none.
    pub fn split_at_gaps<'a>(&self, points: &'a [GpsPoint]) -> Vec<&'a [GpsPoint]> {
        let mut segments = Vec::new();
        let mut start = 0;
        for i in 1..points.len() {
            if self.is_break(&points[i - 1], &points[i]) {
                segments.push(&points[start..i]);
                start = i;
            }
        }
        if start < points.len() {
            segments.push(&points[start..]);
        }
        segments
    }
}

/// Merge gaps that touch end-to-start when no fix sits on the shared boundary.
///
/// A fix at the boundary is real data that separates the two gaps, so they
/// stay apart. The merged duration is the sum of both.
pub fn merge_gaps(mut gaps: Vec<DataGap>, points: &[GpsPoint]) -> Vec<DataGap> {
    if gaps.len() < 2 {
        return gaps;
    }
    gaps.sort_by_key(|g| g.start_time);

    let mut merged: Vec<DataGap> = Vec::with_capacity(gaps.len());
    for gap in gaps {
        if let Some(last) = merged.last_mut() {
            let boundary = last.end_time();
            let has_point = points.iter().any(|p| p.timestamp == boundary);
            if boundary == gap.start_time && !has_point {
                last.duration_seconds += gap.duration_seconds;
                continue;
            }
        }
        merged.push(gap);
    }
    merged
}
