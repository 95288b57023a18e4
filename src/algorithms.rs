//! # Algorithm Toolbox
//!
//! Direct access to the individual timeline algorithms, for callers that want
//! to plug one step into their own processing instead of running the full
//! pipeline.
//!
//! ## Detection
//!
//! - **Stay Clustering**: radius sweep with accuracy/velocity admission
//! - **Boundary Refinement**: speed-transition arrival/departure estimates
//! - **Stay Merging**: duration-weighted merge of split visits
//! - **Data Gaps**: threshold gaps with boundary-aware merging
//! - **Streaming Stops**: arrival and sustained-stop detection on a trip path
//!
//! ## Geographic Utilities
//!
//! - **Haversine Distance**: great-circle distance in meters
//! - **Weighted Centroid**: accuracy-weighted cluster center, batch or running
//! - **Path Simplification**: Douglas-Peucker plus a point cap
//!
//! # Example
//!
//! ```rust
//! use chrono::{Duration, TimeZone, Utc};
//! use timeline_engine::algorithms::{
//!     find_stay_clusters, haversine_distance_meters, GpsPoint, TimelineConfig,
//! };
//!
//! let d = haversine_distance_meters(51.5074, -0.1278, 48.8566, 2.3522).unwrap();
//! assert!((d / 1000.0 - 343.5).abs() < 1.0);
//!
//! let start = Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap();
//! let points: Vec<GpsPoint> = (0..15)
//!     .map(|i| GpsPoint::new(start + Duration::minutes(i), 51.5074, -0.1278))
//!     .collect();
//! let clusters = find_stay_clusters(&points, &TimelineConfig::default());
//! assert_eq!(clusters, vec![0..15]);
//! ```

// =============================================================================
// Core Types (re-exported from lib)
// =============================================================================

pub use crate::{
    DataGap,
    GpsPoint,
    StayPointDetector,
    TimelineConfig,
    TimelineStayPoint,
    TrackPoint,
    Trip,
    TripType,
};

// =============================================================================
// Geographic Utilities
// =============================================================================

pub use crate::spatial::{
    CentroidSums,
    find_cluster_end_index,
    haversine_distance_meters,
    meters_to_degrees,
    simplify_path,
    trip_path_distance,
    weighted_centroid,
};

// =============================================================================
// Stay Point Detection
// =============================================================================

/// Radius sweep over an ordered track.
///
/// Returns the index range of every admitted cluster. Both detection
/// strategies start from these ranges.
pub use crate::staypoints::find_stay_clusters;

/// Narrow a cluster to its speed transitions.
pub use crate::staypoints::refine_cluster_bounds;

/// Merge rules for adjacent stays.
pub use crate::staypoints::{merge_pair, merge_stay_points, should_merge};

/// Cluster admission checks
pub use crate::validation::{is_valid_cluster, validate_cluster, ClusterValidation};

// =============================================================================
// Velocity & Classification
// =============================================================================

pub use crate::velocity::{classify_movement, derived_speed_kmh, point_speed_kmh, VelocityStats};

pub use crate::trip_stats::{classify_trip, segment_speeds, TripStatistics};

// =============================================================================
// Gaps & Streaming Stops
// =============================================================================

pub use crate::gaps::{merge_gaps, DataGapDetector};

/// Index of the first stopped fix at the end of a trip path.
pub use crate::streaming::find_trip_end;

// =============================================================================
// Spatial Indexing
// =============================================================================

/// R-tree spatial index, as used for favorite lookup.
pub use rstar::RTree;
