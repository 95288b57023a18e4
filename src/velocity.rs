//! Velocity analysis: per-point speeds, cluster averages and movement classification.
//!
//! Speeds are km/h. A point's speed is its reported velocity when present,
//! otherwise it is derived from the distance and time to the previous point.

use serde::{Deserialize, Serialize};

use crate::timeline::TripType;
use crate::{GpsPoint, TimelineConfig};

/// Conversion factor from m/s to km/h.
pub const KMH_PER_MPS: f64 = 3.6;

/// Speed between two fixes in km/h, or `None` if no time elapsed.
pub fn derived_speed_kmh(from: &GpsPoint, to: &GpsPoint) -> Option<f64> {
    let seconds = to.seconds_since(from);
    if seconds <= 0 {
        return None;
    }
    Some(from.distance_to(to) / seconds as f64 * KMH_PER_MPS)
}

/// Speed attributed to `points[index]`.
///
/// Reported velocity wins; otherwise the speed over the segment arriving at
/// this point. The first point of a slice has no derived speed.
pub fn point_speed_kmh(points: &[GpsPoint], index: usize) -> Option<f64> {
    let point = points.get(index)?;
    if let Some(v) = point.velocity.filter(|v| v.is_finite() && *v >= 0.0) {
        return Some(v);
    }
    if index == 0 {
        return None;
    }
    derived_speed_kmh(&points[index - 1], point)
}

/// Average and peak speed over a run of points.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct VelocityStats {
    pub avg_kmh: f64,
    pub max_kmh: f64,
    /// Number of points that contributed a speed
    pub samples: usize,
}

impl VelocityStats {
    /// Compute speed statistics, mixing reported and derived speeds per point.
    pub fn from_points(points: &[GpsPoint]) -> Self {
        let speeds: Vec<f64> = (0..points.len())
            .filter_map(|i| point_speed_kmh(points, i))
            .collect();
        Self::from_speeds(&speeds)
    }

    /// Compute statistics from reported velocities only.
    pub fn from_reported(points: &[GpsPoint]) -> Self {
        let speeds: Vec<f64> = points
            .iter()
            .filter_map(|p| p.velocity)
            .filter(|v| v.is_finite() && *v >= 0.0)
            .collect();
        Self::from_speeds(&speeds)
    }

    fn from_speeds(speeds: &[f64]) -> Self {
        if speeds.is_empty() {
            return Self::default();
        }
        let sum: f64 = speeds.iter().sum();
        let max = speeds.iter().cloned().fold(0.0, f64::max);
        Self {
            avg_kmh: sum / speeds.len() as f64,
            max_kmh: max,
            samples: speeds.len(),
        }
    }
}

/// Classify movement from average/peak speed and distance.
///
/// Trips shorter than `trip_min_distance_meters` are walks no matter how fast
/// they look; short hops are dominated by GPS jitter.
pub fn classify_movement(
    avg_kmh: f64,
    max_kmh: f64,
    distance_meters: f64,
    config: &TimelineConfig,
) -> TripType {
    if distance_meters < config.trip_min_distance_meters {
        return TripType::Walk;
    }

    if avg_kmh <= config.walking_max_avg_speed && max_kmh <= config.walking_max_max_speed {
        return TripType::Walk;
    }

    if config.bicycle_enabled
        && avg_kmh >= config.bicycle_min_avg_speed
        && avg_kmh <= config.bicycle_max_avg_speed
        && max_kmh <= config.bicycle_max_max_speed
    {
        return TripType::Bicycle;
    }

    if avg_kmh >= config.car_min_avg_speed || max_kmh >= config.car_min_max_speed {
        return TripType::Car;
    }

    TripType::Unknown
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::*;

    #[test]
    fn test_derived_speed() {
        let a = at(0, 10.0, 10.0);
        let b = at(10, 10.0 + 100.0 * METER_DEG, 10.0);
        let speed = derived_speed_kmh(&a, &b).unwrap();
        assert!((speed - 36.0).abs() < 0.1);
        assert!(derived_speed_kmh(&a, &a).is_none());
    }

    #[test]
    fn test_reported_velocity_wins() {
        let points = vec![
            at(0, 10.0, 10.0),
            at(10, 10.0 + 100.0 * METER_DEG, 10.0).with_velocity(5.0),
        ];
        assert_eq!(point_speed_kmh(&points, 1), Some(5.0));
        assert_eq!(point_speed_kmh(&points, 0), None);
        assert_eq!(point_speed_kmh(&points, 5), None);
    }

    #[test]
    fn test_velocity_stats_mixes_sources() {
        let points = vec![
            at(0, 10.0, 10.0).with_velocity(2.0),
            at(10, 10.0 + 100.0 * METER_DEG, 10.0),
            at(20, 10.0 + 100.0 * METER_DEG, 10.0).with_velocity(10.0),
        ];
        let stats = VelocityStats::from_points(&points);
        assert_eq!(stats.samples, 3);
        assert!((stats.max_kmh - 36.0).abs() < 0.1);
        assert!((stats.avg_kmh - 16.0).abs() < 0.1);

        let reported = VelocityStats::from_reported(&points);
        assert_eq!(reported.samples, 2);
        assert_eq!(reported.avg_kmh, 6.0);
    }

    #[test]
    fn test_classify_movement() {
        let config = TimelineConfig::default();
        assert_eq!(classify_movement(4.0, 6.0, 2_000.0, &config), TripType::Walk);
        assert_eq!(classify_movement(45.0, 80.0, 2_000.0, &config), TripType::Car);
        // Fast but tiny: jitter sprint
        assert_eq!(classify_movement(45.0, 80.0, 20.0, &config), TripType::Walk);
        // Above walking peak but below every car bound
        assert_eq!(classify_movement(6.5, 12.0, 2_000.0, &config), TripType::Unknown);
    }

    #[test]
    fn test_classify_bicycle_when_enabled() {
        let config = TimelineConfig {
            bicycle_enabled: true,
            ..TimelineConfig::default()
        };
        assert_eq!(classify_movement(18.0, 28.0, 5_000.0, &config), TripType::Bicycle);
        assert_eq!(classify_movement(18.0, 60.0, 5_000.0, &config), TripType::Car);

        let disabled = TimelineConfig::default();
        assert_eq!(classify_movement(18.0, 28.0, 5_000.0, &disabled), TripType::Car);
    }
}
