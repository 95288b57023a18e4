//! Single-pass radius clustering shared by both detectors.

use std::ops::Range;

use super::TimelineStayPoint;
use crate::spatial::find_cluster_end_index;
use crate::validation::is_valid_cluster;
use crate::{GpsPoint, TimelineConfig};

/// Index ranges of every admitted stay cluster, in order and non-overlapping.
pub fn find_stay_clusters(points: &[GpsPoint], config: &TimelineConfig) -> Vec<Range<usize>> {
    let min_duration = config.min_stay_duration_seconds();
    let mut clusters = Vec::new();
    let mut i = 0;

    while i < points.len() {
        let j = find_cluster_end_index(points, i, config.staypoint_radius_meters);
        let span = points[j - 1].seconds_since(&points[i]);

        if span >= min_duration && is_valid_cluster(&points[i..j], config) {
            clusters.push(i..j);
            i = j;
        } else {
            i += 1;
        }
    }

    clusters
}

pub(super) fn detect_simple(points: &[GpsPoint], config: &TimelineConfig) -> Vec<TimelineStayPoint> {
    find_stay_clusters(points, config)
        .into_iter()
        .filter_map(|range| TimelineStayPoint::from_cluster(&points[range]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::*;

    fn config() -> TimelineConfig {
        TimelineConfig {
            staypoint_detection_algorithm: "simple".to_string(),
            trip_min_duration_minutes: 10.0,
            ..TimelineConfig::default()
        }
    }

    #[test]
    fn test_two_places_with_drive_between() {
        let mut points = dwell(0, 16, 60, 45.0, 7.0);
        points.extend(drive(960, 30, 10, 45.001, 7.0, 50.0));
        let last = points.last().unwrap().latitude + 0.001;
        points.extend(dwell(1300, 21, 60, last, 7.0));

        let clusters = find_stay_clusters(&points, &config());
        assert_eq!(clusters.len(), 2);
        assert_eq!(clusters[0], 0..16);
        assert!(clusters[0].end <= clusters[1].start);

        let stays = detect_simple(&points, &config());
        assert_eq!(stays[0].duration_seconds, 900);
        assert_eq!(stays[1].duration_seconds, 1200);
    }

    #[test]
    fn test_short_dwell_is_skipped() {
        let points = dwell(0, 9, 60, 45.0, 7.0);
        assert!(find_stay_clusters(&points, &config()).is_empty());
    }

    #[test]
    fn test_rejected_cluster_is_retried_one_point_later() {
        // A fast first fix poisons the average; dropping it admits the rest
        let mut points = dwell(0, 15, 60, 45.0, 7.0);
        points[0].velocity = Some(500.0);

        let clusters = find_stay_clusters(&points, &config());
        assert_eq!(clusters, vec![1..15]);
    }
}
