//! Merging of adjacent stay points that belong to one visit.
//!
//! Stays are sorted, then each one is folded into the running result when it
//! is close enough in time or space.

use log::debug;

use super::TimelineStayPoint;
use crate::TimelineConfig;

/// Stays separated by at most this long are always one visit.
pub const SHORT_GAP_SECONDS: i64 = 120;

/// Stays whose centroids are this close are one visit regardless of the gap.
pub const DRIFT_DISTANCE_METERS: f64 = 25.0;

/// Decide whether `next` continues the visit `current`.
///
/// Only the two stays are compared; the fixes recorded between them play no
/// part, so a short round trip that ends back at the same spot is absorbed.
pub fn should_merge(
    current: &TimelineStayPoint,
    next: &TimelineStayPoint,
    config: &TimelineConfig,
) -> bool {
    let gap = (next.start_time - current.end_time).num_seconds();
    if gap <= SHORT_GAP_SECONDS {
        return true;
    }

    let distance = current.distance_to(next);
    if distance <= config.merge_max_distance_meters && gap <= config.merge_max_time_gap_seconds() {
        return true;
    }

    distance <= DRIFT_DISTANCE_METERS
}

/// Combine two stays: duration-weighted centroid over the union interval.
///
/// The merged duration is `max(end) - min(start)`, not the sum of durations.
pub fn merge_pair(a: &TimelineStayPoint, b: &TimelineStayPoint) -> TimelineStayPoint {
    let wa = a.duration_seconds.max(0) as f64;
    let wb = b.duration_seconds.max(0) as f64;
    let (wa, wb) = if wa + wb > 0.0 { (wa, wb) } else { (1.0, 1.0) };
    let total = wa + wb;

    let start_time = a.start_time.min(b.start_time);
    let end_time = a.end_time.max(b.end_time);

    TimelineStayPoint {
        latitude: (a.latitude * wa + b.latitude * wb) / total,
        longitude: (a.longitude * wa + b.longitude * wb) / total,
        start_time,
        end_time,
        duration_seconds: (end_time - start_time).num_seconds(),
    }
}

/// Sort by start time and fold together every adjacent pair that
/// [`should_merge`] accepts. A merged stay keeps absorbing followers.
pub fn merge_stay_points(
    mut stays: Vec<TimelineStayPoint>,
    config: &TimelineConfig,
) -> Vec<TimelineStayPoint> {
    if stays.len() < 2 {
        return stays;
    }
    stays.sort_by_key(|s| s.start_time);

    let before = stays.len();
    let mut merged: Vec<TimelineStayPoint> = Vec::with_capacity(stays.len());
    let mut iter = stays.into_iter();
    let Some(mut current) = iter.next() else {
        return merged;
    };

    for next in iter {
        if should_merge(&current, &next, config) {
            current = merge_pair(&current, &next);
        } else {
            merged.push(current);
            current = next;
        }
    }
    merged.push(current);

    if merged.len() < before {
        debug!(
            "[StayPoints] Merged {} stays into {}",
            before,
            merged.len()
        );
    }
    merged
}
