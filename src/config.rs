//! Timeline detection configuration.
//!
//! The effective values are supplied by an external collaborator (user
//! preferences merged with system defaults). This module only checks that the
//! values it is handed are usable; it never fills in missing ones.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TimelineError};

/// Stay point detection strategy, selected by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StayPointAlgorithm {
    Simple,
    Enhanced,
}

impl FromStr for StayPointAlgorithm {
    type Err = TimelineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "simple" => Ok(StayPointAlgorithm::Simple),
            "enhanced" => Ok(StayPointAlgorithm::Enhanced),
            other => Err(TimelineError::config(format!(
                "unknown staypoint detection algorithm '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for StayPointAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StayPointAlgorithm::Simple => write!(f, "simple"),
            StayPointAlgorithm::Enhanced => write!(f, "enhanced"),
        }
    }
}

/// Configuration for stay, trip and data gap detection.
///
/// All speeds are km/h, all distances meters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TimelineConfig {
    /// "simple" or "enhanced"
    pub staypoint_detection_algorithm: String,
    /// Cluster radius around the first point of a candidate stay
    pub staypoint_radius_meters: f64,
    /// Minimum dwell time for a cluster to count as a stay
    pub trip_min_duration_minutes: f64,
    /// Maximum average speed inside a stay; also the streaming arrival speed
    pub staypoint_velocity_threshold: f64,
    /// Fixes with accuracy above this are considered poor
    pub staypoint_max_accuracy_threshold: f64,
    /// Required share of good fixes among fixes with known accuracy (0.0-1.0)
    pub staypoint_min_accuracy_ratio: f64,
    /// Enables the average-velocity admission check
    pub use_velocity_accuracy: bool,

    /// Enhanced merge: maximum centroid distance
    pub merge_max_distance_meters: f64,
    /// Enhanced merge: maximum gap between consecutive stays
    pub merge_max_time_gap_minutes: f64,
    /// Enhanced merge on/off
    pub is_merge_enabled: bool,

    /// Point pairs further apart than this are a gap
    pub data_gap_threshold_seconds: i64,
    /// Gaps shorter than this are not reported
    pub data_gap_min_duration_seconds: i64,

    /// Trips shorter than this are classified as walks
    pub trip_min_distance_meters: f64,
    /// Streaming: spatially confirmed arrival duration
    pub trip_arrival_detection_min_duration_seconds: i64,
    /// Streaming: velocity-only stop duration (must not be shorter than arrival)
    pub trip_sustained_stop_min_duration_seconds: i64,

    pub walking_max_avg_speed: f64,
    pub walking_max_max_speed: f64,
    pub car_min_avg_speed: f64,
    pub car_min_max_speed: f64,
    pub bicycle_enabled: bool,
    pub bicycle_min_avg_speed: f64,
    pub bicycle_max_avg_speed: f64,
    pub bicycle_max_max_speed: f64,

    /// Streaming: consecutive out-of-radius points that confirm a departure
    pub stay_departure_min_points: usize,
    /// Streaming: out-of-radius time that confirms a departure
    pub stay_departure_min_duration_seconds: i64,

    pub path_simplification_enabled: bool,
    pub path_simplification_tolerance_meters: f64,
    pub path_max_points: usize,
}

impl Default for TimelineConfig {
    fn default() -> Self {
        Self {
            staypoint_detection_algorithm: "enhanced".to_string(),
            staypoint_radius_meters: 50.0,
            trip_min_duration_minutes: 7.0,
            staypoint_velocity_threshold: 8.0,
            staypoint_max_accuracy_threshold: 60.0,
            staypoint_min_accuracy_ratio: 0.5,
            use_velocity_accuracy: true,
            merge_max_distance_meters: 400.0,
            merge_max_time_gap_minutes: 15.0,
            is_merge_enabled: true,
            data_gap_threshold_seconds: 10_800,
            data_gap_min_duration_seconds: 1_800,
            trip_min_distance_meters: 50.0,
            trip_arrival_detection_min_duration_seconds: 90,
            trip_sustained_stop_min_duration_seconds: 180,
            walking_max_avg_speed: 6.0,
            walking_max_max_speed: 8.0,
            car_min_avg_speed: 8.0,
            car_min_max_speed: 15.0,
            bicycle_enabled: false,
            bicycle_min_avg_speed: 8.0,
            bicycle_max_avg_speed: 25.0,
            bicycle_max_max_speed: 35.0,
            stay_departure_min_points: 3,
            stay_departure_min_duration_seconds: 60,
            path_simplification_enabled: true,
            path_simplification_tolerance_meters: 15.0,
            path_max_points: 100,
        }
    }
}

impl TimelineConfig {
    /// Parse a config from JSON. Every field is required.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: TimelineConfig =
            serde_json::from_str(json).map_err(|e| TimelineError::config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// The detection strategy named by `staypoint_detection_algorithm`.
    pub fn algorithm(&self) -> Result<StayPointAlgorithm> {
        self.staypoint_detection_algorithm.parse()
    }

    /// Minimum stay duration in seconds.
    pub fn min_stay_duration_seconds(&self) -> i64 {
        (self.trip_min_duration_minutes * 60.0).round() as i64
    }

    /// Enhanced merge time gap in seconds.
    pub fn merge_max_time_gap_seconds(&self) -> i64 {
        (self.merge_max_time_gap_minutes * 60.0).round() as i64
    }

    /// Check every threshold before any processing starts.
    pub fn validate(&self) -> Result<()> {
        self.algorithm()?;

        positive("staypoint_radius_meters", self.staypoint_radius_meters)?;
        positive("trip_min_duration_minutes", self.trip_min_duration_minutes)?;
        positive("staypoint_velocity_threshold", self.staypoint_velocity_threshold)?;
        positive(
            "staypoint_max_accuracy_threshold",
            self.staypoint_max_accuracy_threshold,
        )?;
        non_negative("merge_max_distance_meters", self.merge_max_distance_meters)?;
        non_negative("merge_max_time_gap_minutes", self.merge_max_time_gap_minutes)?;
        non_negative("trip_min_distance_meters", self.trip_min_distance_meters)?;
        positive("walking_max_avg_speed", self.walking_max_avg_speed)?;
        positive("walking_max_max_speed", self.walking_max_max_speed)?;
        positive("car_min_avg_speed", self.car_min_avg_speed)?;
        positive("car_min_max_speed", self.car_min_max_speed)?;
        non_negative(
            "path_simplification_tolerance_meters",
            self.path_simplification_tolerance_meters,
        )?;

        if !(0.0..=1.0).contains(&self.staypoint_min_accuracy_ratio) {
            return Err(TimelineError::config(format!(
                "staypoint_min_accuracy_ratio must be within [0, 1], got {}",
                self.staypoint_min_accuracy_ratio
            )));
        }
        if self.data_gap_threshold_seconds <= 0 {
            return Err(TimelineError::config(
                "data_gap_threshold_seconds must be positive",
            ));
        }
        if self.data_gap_min_duration_seconds < 0 {
            return Err(TimelineError::config(
                "data_gap_min_duration_seconds must not be negative",
            ));
        }
        if self.trip_arrival_detection_min_duration_seconds <= 0 {
            return Err(TimelineError::config(
                "trip_arrival_detection_min_duration_seconds must be positive",
            ));
        }
        if self.trip_sustained_stop_min_duration_seconds
            <= self.trip_arrival_detection_min_duration_seconds
        {
            return Err(TimelineError::config(format!(
                "trip_sustained_stop_min_duration_seconds ({}) must be longer than \
                 trip_arrival_detection_min_duration_seconds ({})",
                self.trip_sustained_stop_min_duration_seconds,
                self.trip_arrival_detection_min_duration_seconds
            )));
        }
        if self.walking_max_avg_speed > self.walking_max_max_speed {
            return Err(TimelineError::config(
                "walking_max_avg_speed must not exceed walking_max_max_speed",
            ));
        }
        if self.bicycle_enabled {
            positive("bicycle_min_avg_speed", self.bicycle_min_avg_speed)?;
            if self.bicycle_min_avg_speed > self.bicycle_max_avg_speed
                || self.bicycle_max_avg_speed > self.bicycle_max_max_speed
            {
                return Err(TimelineError::config(
                    "bicycle speed bounds must satisfy min_avg <= max_avg <= max_max",
                ));
            }
        }
        if self.stay_departure_min_points == 0 {
            return Err(TimelineError::config(
                "stay_departure_min_points must be at least 1",
            ));
        }
        if self.stay_departure_min_duration_seconds <= 0 {
            return Err(TimelineError::config(
                "stay_departure_min_duration_seconds must be positive",
            ));
        }
        if self.path_max_points < 2 {
            return Err(TimelineError::config("path_max_points must be at least 2"));
        }

        Ok(())
    }
}

fn positive(name: &str, value: f64) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(TimelineError::config(format!(
            "{} must be a positive number, got {}",
            name, value
        )))
    }
}

fn non_negative(name: &str, value: f64) -> Result<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(TimelineError::config(format!(
            "{} must be a non-negative number, got {}",
            name, value
        )))
    }
}
