//! Admission rules for candidate stay clusters.
//!
//! Two independent checks; a cluster is admitted only if every enabled check
//! passes. Rejected clusters are retried by the detector one point later.

use crate::velocity::VelocityStats;
use crate::{GpsPoint, TimelineConfig};

/// Outcome of validating one candidate cluster.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClusterValidation {
    /// Share of good fixes among fixes with known accuracy (`None` if none known)
    pub accuracy_ratio: Option<f64>,
    pub accuracy_ok: bool,
    /// Average speed, only computed when the velocity check is enabled
    pub avg_velocity_kmh: Option<f64>,
    pub velocity_ok: bool,
}

impl ClusterValidation {
    pub fn is_admitted(&self) -> bool {
        self.accuracy_ok && self.velocity_ok
    }
}

/// Share of fixes at or below `max_accuracy`, ignoring fixes with unknown accuracy.
pub fn accuracy_ratio(cluster: &[GpsPoint], max_accuracy: f64) -> Option<f64> {
    let known: Vec<f64> = cluster.iter().filter_map(|p| p.accuracy).collect();
    if known.is_empty() {
        return None;
    }
    let good = known.iter().filter(|&&a| a <= max_accuracy).count();
    Some(good as f64 / known.len() as f64)
}

/// Run both admission checks against a cluster.
pub fn validate_cluster(cluster: &[GpsPoint], config: &TimelineConfig) -> ClusterValidation {
    let ratio = accuracy_ratio(cluster, config.staypoint_max_accuracy_threshold);
    // Unknown accuracy neither helps nor hurts
    let accuracy_ok = ratio.map_or(true, |r| r >= config.staypoint_min_accuracy_ratio);

    let (avg_velocity_kmh, velocity_ok) = if config.use_velocity_accuracy {
        let stats = VelocityStats::from_points(cluster);
        let ok = stats.samples == 0 || stats.avg_kmh <= config.staypoint_velocity_threshold;
        (Some(stats.avg_kmh), ok)
    } else {
        (None, true)
    };

    ClusterValidation {
        accuracy_ratio: ratio,
        accuracy_ok,
        avg_velocity_kmh,
        velocity_ok,
    }
}

/// Shorthand for `validate_cluster(..).is_admitted()`.
pub fn is_valid_cluster(cluster: &[GpsPoint], config: &TimelineConfig) -> bool {
    validate_cluster(cluster, config).is_admitted()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::*;

    #[test]
    fn test_unknown_accuracy_is_excluded() {
        let cluster = vec![
            at(0, 0.0, 0.0).with_accuracy(10.0),
            at(60, 0.0, 0.0),
            at(120, 0.0, 0.0),
            at(180, 0.0, 0.0).with_accuracy(200.0),
        ];
        // 1 good of 2 known
        assert_eq!(accuracy_ratio(&cluster, 60.0), Some(0.5));
        assert_eq!(accuracy_ratio(&cluster[1..3], 60.0), None);
    }

    #[test]
    fn test_accuracy_check() {
        let config = TimelineConfig {
            staypoint_min_accuracy_ratio: 0.75,
            ..TimelineConfig::default()
        };
        let poor = vec![
            at(0, 0.0, 0.0).with_accuracy(10.0),
            at(60, 0.0, 0.0).with_accuracy(500.0),
        ];
        let result = validate_cluster(&poor, &config);
        assert!(!result.accuracy_ok);
        assert!(!result.is_admitted());

        let unknown = dwell(0, 5, 60, 0.0, 0.0);
        assert!(is_valid_cluster(&unknown, &config));
    }

    #[test]
    fn test_velocity_check_only_when_enabled() {
        let fast: Vec<GpsPoint> = dwell(0, 5, 60, 0.0, 0.0)
            .into_iter()
            .map(|p| p.with_velocity(30.0))
            .collect();

        let config = TimelineConfig::default();
        let result = validate_cluster(&fast, &config);
        assert!(!result.velocity_ok);
        assert_eq!(result.avg_velocity_kmh, Some(30.0));

        let relaxed = TimelineConfig {
            use_velocity_accuracy: false,
            ..TimelineConfig::default()
        };
        let result = validate_cluster(&fast, &relaxed);
        assert!(result.is_admitted());
        assert_eq!(result.avg_velocity_kmh, None);
    }
}
