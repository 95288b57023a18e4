//! # Timeline Engine
//!
//! Turns a time-ordered stream of noisy GPS fixes into a semantic timeline of
//! stays, trips and data gaps.
//!
//! This library provides:
//! - Stay point detection (simple and enhanced clustering strategies)
//! - Data gap detection with boundary-aware merging
//! - Trip statistics and movement classification
//! - An incremental, point-at-a-time streaming engine
//! - A batch pipeline that assembles everything into a [`RawTimeline`]
//!
//! ## Features
//!
//! - **`parallel`** - Process many users at once with rayon
//! - **`persistence`** - Compact MessagePack snapshots of streaming state
//! - **`full`** - Enable all features
//!
//! ## Quick Start
//!
//! ```rust
//! use chrono::{Duration, TimeZone, Utc};
//! use timeline_engine::{TimelineConfig, TimelinePipeline, TrackPoint};
//!
//! let start = Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap();
//! let points: Vec<TrackPoint> = (0..20)
//!     .map(|i| TrackPoint::new(start + Duration::minutes(i), 51.5074, -0.1278))
//!     .collect();
//!
//! let pipeline = TimelinePipeline::new(TimelineConfig::default()).unwrap();
//! let timeline = pipeline.build_timeline("user-1", &points).unwrap();
//! assert_eq!(timeline.stays.len(), 1);
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// Unified error handling
pub mod error;
pub use error::{Result, TimelineError};

// Detection configuration
pub mod config;
pub use config::{StayPointAlgorithm, TimelineConfig};

// Distance, centroid and cluster-window math
pub mod spatial;

// Speed helpers and movement classification
pub mod velocity;

// Accuracy/velocity admission rules for candidate clusters
pub mod validation;

// Stay point detection strategies
pub mod staypoints;
pub use staypoints::{StayPointDetector, TimelineStayPoint};

// Data gap detection and segment splitting
pub mod gaps;
pub use gaps::DataGapDetector;

// Trip statistics and refined classification
pub mod trip_stats;
pub use trip_stats::{classify_trip, TripStatistics};

// Final timeline events and categorized container
pub mod timeline;
pub use timeline::{DataGap, RawTimeline, Stay, TimelineEvent, Trip, TripType};

// Incremental point-at-a-time engine
pub mod streaming;
pub use streaming::{
    finalize, process_point, ProcessingResult, ProcessorMode, StreamingTimelineProcessor,
    UserState,
};

// Batch pipeline
pub mod pipeline;
pub use pipeline::TimelinePipeline;

// Location naming boundary
pub mod resolver;
pub use resolver::{
    resolve_stay_locations, FavoriteLocation, FavoriteLocations, LocationResolver,
    ResolvedLocation, ResolverError, UNKNOWN_LOCATION_NAME,
};

// Algorithm toolbox - modular access to all algorithms
pub mod algorithms;

// ============================================================================
// Core Types
// ============================================================================

/// A raw location fix as delivered by GPS ingestion.
///
/// `velocity` (km/h) and `accuracy` (meters) are optional: `None` means the
/// device did not report a value, never zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackPoint {
    pub timestamp: DateTime<Utc>,
    pub latitude: f64,
    pub longitude: f64,
    pub velocity: Option<f64>,
    pub accuracy: Option<f64>,
    pub altitude: Option<f64>,
}

impl TrackPoint {
    /// Create a track point without velocity, accuracy or altitude.
    pub fn new(timestamp: DateTime<Utc>, latitude: f64, longitude: f64) -> Self {
        Self {
            timestamp,
            latitude,
            longitude,
            velocity: None,
            accuracy: None,
            altitude: None,
        }
    }

    pub fn with_velocity(mut self, velocity_kmh: f64) -> Self {
        self.velocity = Some(velocity_kmh);
        self
    }

    pub fn with_accuracy(mut self, accuracy_meters: f64) -> Self {
        self.accuracy = Some(accuracy_meters);
        self
    }

    pub fn with_altitude(mut self, altitude_meters: f64) -> Self {
        self.altitude = Some(altitude_meters);
        self
    }
}

/// Lightweight point used by every detection algorithm.
///
/// # Example
/// ```
/// use chrono::Utc;
/// use timeline_engine::GpsPoint;
///
/// let now = Utc::now();
/// let london = GpsPoint::new(now, 51.5074, -0.1278);
/// let paris = GpsPoint::new(now, 48.8566, 2.3522);
/// assert!((london.distance_to(&paris) / 1000.0 - 343.5).abs() < 1.0);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GpsPoint {
    pub timestamp: DateTime<Utc>,
    pub latitude: f64,
    pub longitude: f64,
    /// Reported speed in km/h
    pub velocity: Option<f64>,
    /// Reported horizontal accuracy in meters
    pub accuracy: Option<f64>,
}

impl GpsPoint {
    /// Create a new GPS point.
    pub fn new(timestamp: DateTime<Utc>, latitude: f64, longitude: f64) -> Self {
        Self {
            timestamp,
            latitude,
            longitude,
            velocity: None,
            accuracy: None,
        }
    }

    pub fn with_velocity(mut self, velocity_kmh: f64) -> Self {
        self.velocity = Some(velocity_kmh);
        self
    }

    pub fn with_accuracy(mut self, accuracy_meters: f64) -> Self {
        self.accuracy = Some(accuracy_meters);
        self
    }

    /// Check if the point has valid coordinates.
    pub fn is_valid(&self) -> bool {
        spatial::is_valid_coordinate(self.latitude, self.longitude)
    }

    /// Haversine distance to another point in meters.
    ///
    /// Both points are assumed valid; the pipeline checks coordinates once up
    /// front. Use [`spatial::haversine_distance_meters`] for unchecked input.
    pub fn distance_to(&self, other: &GpsPoint) -> f64 {
        spatial::haversine_unchecked(
            self.latitude,
            self.longitude,
            other.latitude,
            other.longitude,
        )
    }

    /// Whole seconds elapsed from `earlier` to this point (negative if earlier).
    pub fn seconds_since(&self, earlier: &GpsPoint) -> i64 {
        (self.timestamp - earlier.timestamp).num_seconds()
    }
}

impl From<&TrackPoint> for GpsPoint {
    fn from(p: &TrackPoint) -> Self {
        Self {
            timestamp: p.timestamp,
            latitude: p.latitude,
            longitude: p.longitude,
            velocity: p.velocity,
            accuracy: p.accuracy,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
