//! Trip statistics and refined movement classification.
//!
//! Reported velocities are trusted when enough of the path carries them.
//! Otherwise speeds are derived from the GPS fixes, and single-point jumps
//! on short trips are trimmed before classifying so that one bad fix
//! cannot turn a walk into a drive.

use serde::{Deserialize, Serialize};

use crate::velocity::{classify_movement, derived_speed_kmh, VelocityStats};
use crate::spatial::trip_path_distance;
use crate::timeline::TripType;
use crate::{GpsPoint, TimelineConfig};

/// Trips shorter than this are checked for GPS speed spikes.
const SPIKE_CHECK_MAX_DISTANCE_METERS: f64 = 1_000.0;

/// Segment speeds above mean + this many standard deviations are spikes.
const SPIKE_SIGMA: f64 = 2.0;

/// Statistics over a trip's path, all derived from the fixes themselves.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct TripStatistics {
    /// Total distance over total time (km/h)
    pub avg_speed_kmh: f64,
    /// Fastest single segment (km/h)
    pub max_speed_kmh: f64,
    /// Mean of the per-segment speeds (km/h)
    pub mean_segment_speed_kmh: f64,
    /// Population variance of the per-segment speeds (km/h squared)
    pub speed_variance: f64,
    /// Fixes whose accuracy is worse than the stay accuracy threshold
    pub low_accuracy_count: usize,
    /// Segments with positive elapsed time
    pub segment_count: usize,
}

impl TripStatistics {
    pub fn from_path(path: &[GpsPoint], config: &TimelineConfig) -> Self {
        let speeds = segment_speeds(path);
        let low_accuracy_count = path
            .iter()
            .filter(|p| {
                p.accuracy
                    .is_some_and(|a| a > config.staypoint_max_accuracy_threshold)
            })
            .count();

        let elapsed = match (path.first(), path.last()) {
            (Some(first), Some(last)) => last.seconds_since(first),
            _ => 0,
        };
        let avg_speed_kmh = if elapsed > 0 {
            trip_path_distance(path) / elapsed as f64 * 3.6
        } else {
            0.0
        };

        let (mean, variance) = mean_and_variance(&speeds);

        Self {
            avg_speed_kmh,
            max_speed_kmh: speeds.iter().cloned().fold(0.0, f64::max),
            mean_segment_speed_kmh: mean,
            speed_variance: variance,
            low_accuracy_count,
            segment_count: speeds.len(),
        }
    }

    pub fn speed_std_dev(&self) -> f64 {
        self.speed_variance.sqrt()
    }

    /// Speed spread larger than the speed itself: a few fixes jumped around.
    pub fn is_erratic(&self) -> bool {
        self.segment_count >= 3 && self.speed_std_dev() > self.mean_segment_speed_kmh
    }
}

/// Speeds of consecutive segments with positive elapsed time (km/h).
pub fn segment_speeds(path: &[GpsPoint]) -> Vec<f64> {
    path.windows(2)
        .filter_map(|w| derived_speed_kmh(&w[0], &w[1]))
        .collect()
}

fn mean_and_variance(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    (mean, variance)
}

/// Classify a trip from its full path and distance.
pub fn classify_trip(path: &[GpsPoint], distance_meters: f64, config: &TimelineConfig) -> TripType {
    let reported = VelocityStats::from_reported(path);
    if reported.samples > 0 && reported.samples * 2 >= path.len() {
        return classify_movement(reported.avg_kmh, reported.max_kmh, distance_meters, config);
    }

    let stats = TripStatistics::from_path(path, config);
    if stats.is_erratic() && distance_meters < SPIKE_CHECK_MAX_DISTANCE_METERS {
        let cutoff = stats.mean_segment_speed_kmh + SPIKE_SIGMA * stats.speed_std_dev();
        let steady: Vec<f64> = segment_speeds(path)
            .into_iter()
            .filter(|&s| s <= cutoff)
            .collect();
        if !steady.is_empty() {
            let (avg, _) = mean_and_variance(&steady);
            let max = steady.iter().cloned().fold(0.0, f64::max);
            log::debug!(
                "[TripStats] Trimmed {} spike segment(s), avg {:.1} -> {:.1} km/h",
                stats.segment_count - steady.len(),
                stats.avg_speed_kmh,
                avg
            );
            return classify_movement(avg, max, distance_meters, config);
        }
    }

    classify_movement(stats.avg_speed_kmh, stats.max_speed_kmh, distance_meters, config)
}
