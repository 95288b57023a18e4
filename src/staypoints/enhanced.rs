//! Enhanced detection: transition-refined boundaries plus drift merging.
//!
//! Radius clusters start at the first fix inside the radius, which is often
//! still the tail of the approach. Looking for the point where speed drops
//! below the stay threshold (and where it rises again at the end) gives a
//! closer estimate of the real arrival and departure.

use std::ops::Range;

use super::merge::merge_stay_points;
use super::simple::find_stay_clusters;
use super::TimelineStayPoint;
use crate::velocity::point_speed_kmh;
use crate::{GpsPoint, TimelineConfig};

/// Maximum number of fixes inspected at each end of a cluster.
pub const REFINEMENT_WINDOW_POINTS: usize = 5;

/// Maximum time inspected at each end of a cluster.
pub const REFINEMENT_WINDOW_SECONDS: i64 = 300;

pub(super) fn detect_enhanced(points: &[GpsPoint], config: &TimelineConfig) -> Vec<TimelineStayPoint> {
    let raw: Vec<TimelineStayPoint> = find_stay_clusters(points, config)
        .into_iter()
        .filter_map(|range| {
            let refined = refine_cluster_bounds(points, range, config);
            TimelineStayPoint::from_cluster(&points[refined])
        })
        .collect();

    if config.is_merge_enabled {
        merge_stay_points(raw, config)
    } else {
        raw
    }
}

fn is_slow(points: &[GpsPoint], index: usize, threshold: f64) -> bool {
    point_speed_kmh(points, index).is_some_and(|s| s <= threshold)
}

fn is_fast(points: &[GpsPoint], index: usize, threshold: f64) -> bool {
    point_speed_kmh(points, index).is_some_and(|s| s > threshold)
}

/// Narrow a raw cluster to the first fast-to-slow and last slow-to-fast
/// transitions found near its ends.
///
/// Returns the raw range when no clear transition exists inside the window, or
/// when the refined range would fall below the minimum dwell.
pub fn refine_cluster_bounds(
    points: &[GpsPoint],
    raw: Range<usize>,
    config: &TimelineConfig,
) -> Range<usize> {
    if raw.len() < 3 {
        return raw;
    }
    let threshold = config.staypoint_velocity_threshold;

    // Arrival: first slow fix right after a fast one
    let arrival_limit = (raw.start + REFINEMENT_WINDOW_POINTS).min(raw.end);
    let start = (raw.start + 1..arrival_limit)
        .take_while(|&k| points[k].seconds_since(&points[raw.start]) <= REFINEMENT_WINDOW_SECONDS)
        .find(|&k| is_slow(points, k, threshold) && is_fast(points, k - 1, threshold))
        .unwrap_or(raw.start);

    // Departure: last slow fix right before a fast one
    let last = raw.end - 1;
    let departure_floor = last.saturating_sub(REFINEMENT_WINDOW_POINTS).max(start);
    let end = (departure_floor..last)
        .rev()
        .take_while(|&k| points[last].seconds_since(&points[k]) <= REFINEMENT_WINDOW_SECONDS)
        .find(|&k| is_slow(points, k, threshold) && is_fast(points, k + 1, threshold))
        .map(|k| k + 1)
        .unwrap_or(raw.end);

    if end <= start + 1 {
        return raw;
    }
    let refined_span = points[end - 1].seconds_since(&points[start]);
    if refined_span < config.min_stay_duration_seconds() {
        return raw;
    }
    start..end
}
