//! Location naming for finalized stays.
//!
//! Detection never names places. After a timeline is built, each stay is
//! handed once to a [`LocationResolver`]; failures are logged and the stay
//! falls back to [`UNKNOWN_LOCATION_NAME`] so one bad lookup never loses a
//! timeline.

use log::{debug, warn};
use rstar::{PointDistance, RTree, RTreeObject, AABB};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::spatial::meters_to_degrees;
use crate::timeline::RawTimeline;
use crate::GpsPoint;

/// Placeholder name for stays whose lookup failed.
pub const UNKNOWN_LOCATION_NAME: &str = "Unknown Location";

/// Name and references attached to a stay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedLocation {
    pub location_name: String,
    pub favorite_id: Option<i64>,
    pub geocoding_id: Option<i64>,
}

impl ResolvedLocation {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            location_name: name.into(),
            favorite_id: None,
            geocoding_id: None,
        }
    }

    pub fn unknown() -> Self {
        Self::named(UNKNOWN_LOCATION_NAME)
    }
}

/// Why a lookup produced no location.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ResolverError {
    #[error("No known location near ({latitude}, {longitude})")]
    NotFound { latitude: f64, longitude: f64 },

    #[error("Location service unavailable: {0}")]
    Unavailable(String),
}

/// Boundary to whatever names places (favorites, reverse geocoding, ...).
pub trait LocationResolver {
    fn resolve_location(
        &self,
        user_id: &str,
        point: &GpsPoint,
    ) -> Result<ResolvedLocation, ResolverError>;
}

/// Name every stay in the timeline. Returns how many lookups succeeded.
pub fn resolve_stay_locations(timeline: &mut RawTimeline, resolver: &dyn LocationResolver) -> usize {
    let mut resolved = 0;
    for stay in &mut timeline.stays {
        let point = GpsPoint::new(stay.start_time, stay.latitude, stay.longitude);
        let location = match resolver.resolve_location(&timeline.user_id, &point) {
            Ok(location) => {
                resolved += 1;
                location
            }
            Err(e) => {
                warn!(
                    "[Resolver] {} stay at {}: {}",
                    timeline.user_id, stay.start_time, e
                );
                ResolvedLocation::unknown()
            }
        };
        stay.location_name = Some(location.location_name);
        stay.favorite_id = location.favorite_id;
        stay.geocoding_id = location.geocoding_id;
    }
    debug!(
        "[Resolver] {}: named {}/{} stays",
        timeline.user_id,
        resolved,
        timeline.stays.len()
    );
    resolved
}

// ============================================================================
// Favorites
// ============================================================================

/// A user-named place that claims stays within its radius.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FavoriteLocation {
    pub id: i64,
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub radius_meters: f64,
}

/// Favorite position in the R-tree, pointing back into the favorites list.
#[derive(Debug, Clone, Copy)]
struct FavoriteEntry {
    idx: usize,
    lat: f64,
    lng: f64,
}

impl RTreeObject for FavoriteEntry {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point([self.lat, self.lng])
    }
}

impl PointDistance for FavoriteEntry {
    fn distance_2(&self, point: &[f64; 2]) -> f64 {
        let dlat = self.lat - point[0];
        let dlng = self.lng - point[1];
        dlat * dlat + dlng * dlng
    }
}

/// In-memory favorites resolver.
///
/// The closest favorite whose radius contains the point wins. Points outside
/// every favorite go to the fallback resolver if one is set.
pub struct FavoriteLocations {
    favorites: Vec<FavoriteLocation>,
    tree: RTree<FavoriteEntry>,
    max_radius_meters: f64,
    fallback: Option<Box<dyn LocationResolver + Send + Sync>>,
}

impl FavoriteLocations {
    pub fn new(favorites: Vec<FavoriteLocation>) -> Self {
        let entries: Vec<FavoriteEntry> = favorites
            .iter()
            .enumerate()
            .map(|(idx, f)| FavoriteEntry {
                idx,
                lat: f.latitude,
                lng: f.longitude,
            })
            .collect();
        let max_radius_meters = favorites
            .iter()
            .map(|f| f.radius_meters)
            .fold(0.0, f64::max);

        Self {
            favorites,
            tree: RTree::bulk_load(entries),
            max_radius_meters,
            fallback: None,
        }
    }

    /// Resolver consulted when no favorite matches.
    pub fn with_fallback(mut self, resolver: impl LocationResolver + Send + Sync + 'static) -> Self {
        self.fallback = Some(Box::new(resolver));
        self
    }

    pub fn len(&self) -> usize {
        self.favorites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.favorites.is_empty()
    }

    /// Closest favorite containing the point, by great-circle distance.
    pub fn find(&self, point: &GpsPoint) -> Option<&FavoriteLocation> {
        if self.favorites.is_empty() {
            return None;
        }
        let (dlat, dlng) = meters_to_degrees(self.max_radius_meters, point.latitude);
        let reach = dlat.max(dlng);

        self.tree
            .locate_within_distance([point.latitude, point.longitude], reach * reach)
            .filter_map(|entry| {
                let favorite = &self.favorites[entry.idx];
                let center = GpsPoint::new(point.timestamp, favorite.latitude, favorite.longitude);
                let distance = point.distance_to(&center);
                (distance <= favorite.radius_meters).then_some((distance, favorite))
            })
            .min_by(|a, b| a.0.total_cmp(&b.0))
            .map(|(_, favorite)| favorite)
    }
}

impl LocationResolver for FavoriteLocations {
    fn resolve_location(
        &self,
        user_id: &str,
        point: &GpsPoint,
    ) -> Result<ResolvedLocation, ResolverError> {
        if let Some(favorite) = self.find(point) {
            return Ok(ResolvedLocation {
                location_name: favorite.name.clone(),
                favorite_id: Some(favorite.id),
                geocoding_id: None,
            });
        }
        match &self.fallback {
            Some(fallback) => fallback.resolve_location(user_id, point),
            None => Err(ResolverError::NotFound {
                latitude: point.latitude,
                longitude: point.longitude,
            }),
        }
    }
}
