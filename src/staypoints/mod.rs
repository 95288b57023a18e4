//! # Stay Point Detection
//!
//! Finds places where the user dwelled, from an ordered point stream.
//!
//! ## Algorithm
//! 1. Anchor a candidate cluster at point `i`
//! 2. Extend it while points stay within `staypoint_radius_meters` of the anchor
//! 3. Keep it if it spans at least the minimum dwell and passes validation,
//!    then continue after the cluster; otherwise retry one point later
//!
//! ## Strategies
//! - **Simple** - the sweep above, cluster boundaries used as-is
//! - **Enhanced** - refines arrival/departure from speed transitions and
//!   merges adjacent stays that are really one visit split by GPS drift

mod enhanced;
mod merge;
mod simple;

use chrono::{DateTime, Utc};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::config::StayPointAlgorithm;
use crate::error::Result;
use crate::spatial::{haversine_unchecked, validate_track, weighted_centroid};
use crate::timeline::Stay;
use crate::{GpsPoint, TimelineConfig};

pub use enhanced::{refine_cluster_bounds, REFINEMENT_WINDOW_POINTS, REFINEMENT_WINDOW_SECONDS};
pub use merge::{
    merge_pair, merge_stay_points, should_merge, DRIFT_DISTANCE_METERS, SHORT_GAP_SECONDS,
};
pub use simple::find_stay_clusters;

/// Intermediate detector output: one dwell, before location naming.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimelineStayPoint {
    pub longitude: f64,
    pub latitude: f64,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration_seconds: i64,
}

impl TimelineStayPoint {
    /// Stay point for a cluster: weighted centroid and first/last timestamp.
    pub fn from_cluster(cluster: &[GpsPoint]) -> Option<Self> {
        let [latitude, longitude] = weighted_centroid(cluster)?;
        let first = cluster.first()?;
        let last = cluster.last()?;
        Some(Self {
            longitude,
            latitude,
            start_time: first.timestamp,
            end_time: last.timestamp,
            duration_seconds: last.seconds_since(first),
        })
    }

    /// Distance between two stay centroids in meters.
    pub fn distance_to(&self, other: &TimelineStayPoint) -> f64 {
        haversine_unchecked(self.latitude, self.longitude, other.latitude, other.longitude)
    }

    pub fn to_stay(&self) -> Stay {
        Stay::new(
            self.start_time,
            self.duration_seconds,
            self.latitude,
            self.longitude,
        )
    }
}

/// Stay point detection strategy.
///
/// Chosen once from the config name; both variants share the same contract:
/// ordered points in, ordered, non-overlapping stay points out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StayPointDetector {
    Simple,
    Enhanced,
}

impl StayPointDetector {
    /// Select the detector named by `staypoint_detection_algorithm`.
    pub fn from_config(config: &TimelineConfig) -> Result<Self> {
        Ok(match config.algorithm()? {
            StayPointAlgorithm::Simple => StayPointDetector::Simple,
            StayPointAlgorithm::Enhanced => StayPointDetector::Enhanced,
        })
    }

    /// Detect stay points in an ordered point stream.
    ///
    /// Fewer than two points yield no stays. Points out of timestamp order
    /// fail with `UnorderedInput`.
    pub fn detect(
        &self,
        config: &TimelineConfig,
        points: &[GpsPoint],
    ) -> Result<Vec<TimelineStayPoint>> {
        if points.len() < 2 {
            return Ok(Vec::new());
        }
        validate_track(points)?;

        let stays = match self {
            StayPointDetector::Simple => simple::detect_simple(points, config),
            StayPointDetector::Enhanced => enhanced::detect_enhanced(points, config),
        };

        debug!(
            "[StayPoints] {:?} detector found {} stays in {} points",
            self,
            stays.len(),
            points.len()
        );
        Ok(stays)
    }
}
