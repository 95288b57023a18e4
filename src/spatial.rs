//! Spatial calculations: distance, centroid and cluster-window math.
//!
//! All functions are pure. Only [`haversine_distance_meters`] checks its
//! inputs; the rest operate on points the caller has already validated with
//! [`validate_track`].

use geo::{Coord, LineString, SimplifyIdx};

use crate::error::{Result, TimelineError};
use crate::GpsPoint;

/// Mean Earth radius used for every distance in the crate.
pub const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

/// Accuracy assumed for fixes that do not report one (neutral centroid weight).
pub const DEFAULT_ACCURACY_METERS: f64 = 20.0;

/// Approximate meters per degree of latitude.
const METERS_PER_DEGREE: f64 = 111_000.0;

/// Check that a latitude/longitude pair is finite and in range.
pub fn is_valid_coordinate(latitude: f64, longitude: f64) -> bool {
    latitude.is_finite()
        && longitude.is_finite()
        && (-90.0..=90.0).contains(&latitude)
        && (-180.0..=180.0).contains(&longitude)
}

/// Great-circle distance in meters.
///
/// Fails with [`TimelineError::InvalidCoordinate`] when either coordinate is
/// non-finite or out of range; `index` is 0 for the first pair, 1 for the second.
///
/// # Example
/// ```
/// use timeline_engine::spatial::haversine_distance_meters;
///
/// let d = haversine_distance_meters(51.5074, -0.1278, 48.8566, 2.3522).unwrap();
/// assert!((d / 1000.0 - 343.5).abs() < 1.0);
/// assert!(haversine_distance_meters(91.0, 0.0, 0.0, 0.0).is_err());
/// ```
pub fn haversine_distance_meters(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> Result<f64> {
    if !is_valid_coordinate(lat1, lon1) {
        return Err(TimelineError::InvalidCoordinate {
            index: 0,
            latitude: lat1,
            longitude: lon1,
        });
    }
    if !is_valid_coordinate(lat2, lon2) {
        return Err(TimelineError::InvalidCoordinate {
            index: 1,
            latitude: lat2,
            longitude: lon2,
        });
    }
    Ok(haversine_unchecked(lat1, lon1, lat2, lon2))
}

pub(crate) fn haversine_unchecked(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let dphi = (lat2 - lat1).to_radians();
    let dlambda = (lon2 - lon1).to_radians();

    let a = (dphi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (dlambda / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    EARTH_RADIUS_METERS * c
}

/// Check coordinates and timestamp order of a point stream.
///
/// Equal consecutive timestamps are accepted; a timestamp earlier than its
/// predecessor is an [`TimelineError::UnorderedInput`].
pub fn validate_track(points: &[GpsPoint]) -> Result<()> {
    for (index, p) in points.iter().enumerate() {
        if !p.is_valid() {
            return Err(TimelineError::InvalidCoordinate {
                index,
                latitude: p.latitude,
                longitude: p.longitude,
            });
        }
        if index > 0 && p.timestamp < points[index - 1].timestamp {
            return Err(TimelineError::UnorderedInput { index });
        }
    }
    Ok(())
}

/// First index after `start_index` whose point lies farther than `radius_meters`
/// from `points[start_index]`, or `points.len()` if every later point is inside.
pub fn find_cluster_end_index(points: &[GpsPoint], start_index: usize, radius_meters: f64) -> usize {
    let Some(anchor) = points.get(start_index) else {
        return points.len();
    };
    points[start_index + 1..]
        .iter()
        .position(|p| anchor.distance_to(p) > radius_meters)
        .map(|offset| start_index + 1 + offset)
        .unwrap_or(points.len())
}

/// Centroid weight of a fix: inverse accuracy, neutral when unknown.
fn accuracy_weight(point: &GpsPoint) -> f64 {
    match point.accuracy {
        Some(a) if a.is_finite() && a > 0.0 => 1.0 / a,
        _ => 1.0 / DEFAULT_ACCURACY_METERS,
    }
}

/// Running accuracy-weighted sums, for centroids that grow one fix at a time.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CentroidSums {
    weight: f64,
    lat: f64,
    lon: f64,
    count: usize,
}

impl CentroidSums {
    pub fn from_points(points: &[GpsPoint]) -> Self {
        let mut sums = Self::default();
        for p in points {
            sums.add(p);
        }
        sums
    }

    pub fn add(&mut self, point: &GpsPoint) {
        let w = accuracy_weight(point);
        self.weight += w;
        self.lat += point.latitude * w;
        self.lon += point.longitude * w;
        self.count += 1;
    }

    /// Number of fixes added so far.
    pub fn count(&self) -> usize {
        self.count
    }

    /// `[latitude, longitude]`, or `None` before the first fix.
    pub fn centroid(&self) -> Option<[f64; 2]> {
        (self.count > 0).then(|| [self.lat / self.weight, self.lon / self.weight])
    }
}

/// Accuracy-weighted centroid as `[latitude, longitude]`.
///
/// Returns `None` for an empty cluster.
pub fn weighted_centroid(cluster: &[GpsPoint]) -> Option<[f64; 2]> {
    CentroidSums::from_points(cluster).centroid()
}

/// Total distance along a path in meters.
pub fn trip_path_distance(path: &[GpsPoint]) -> f64 {
    path.windows(2).map(|w| w[0].distance_to(&w[1])).sum()
}

/// Convert meters to approximate degrees at a given latitude.
pub fn meters_to_degrees(meters: f64, latitude: f64) -> (f64, f64) {
    let lat_deg = meters / METERS_PER_DEGREE;
    let lng_deg = meters / (METERS_PER_DEGREE * latitude.to_radians().cos().max(1e-6));
    (lat_deg, lng_deg)
}

/// Simplify a path with Douglas-Peucker, then cap it at `max_points`.
///
/// Surviving points are the original fixes (timestamps and optional fields are
/// kept); the first and last point are always retained.
pub fn simplify_path(path: &[GpsPoint], tolerance_meters: f64, max_points: usize) -> Vec<GpsPoint> {
    if path.len() <= 2 {
        return path.to_vec();
    }

    let line: LineString<f64> = path
        .iter()
        .map(|p| Coord {
            x: p.longitude,
            y: p.latitude,
        })
        .collect();

    let epsilon = tolerance_meters / METERS_PER_DEGREE;
    let kept: Vec<usize> = if epsilon > 0.0 {
        line.simplify_idx(&epsilon)
    } else {
        (0..path.len()).collect()
    };

    let max_points = max_points.max(2);
    let indices: Vec<usize> = if kept.len() > max_points {
        // Uniform sampling, pinning the final point
        let step = (kept.len() - 1) as f64 / (max_points - 1) as f64;
        (0..max_points)
            .map(|i| kept[((i as f64 * step).round() as usize).min(kept.len() - 1)])
            .collect()
    } else {
        kept
    };

    indices.into_iter().map(|i| path[i]).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::*;

    #[test]
    fn test_haversine_known_distance() {
        // One degree of latitude on a 6,371 km sphere
        let d = haversine_distance_meters(0.0, 0.0, 1.0, 0.0).unwrap();
        assert!((d - 111_194.93).abs() < 0.1);
    }

    #[test]
    fn test_haversine_rejects_bad_input() {
        let err = haversine_distance_meters(0.0, 0.0, f64::NAN, 0.0).unwrap_err();
        assert!(matches!(err, TimelineError::InvalidCoordinate { index: 1, .. }));
        assert!(haversine_distance_meters(0.0, 200.0, 0.0, 0.0).is_err());
    }

    #[test]
    fn test_find_cluster_end_index() {
        let mut points = dwell(0, 5, 60, 45.0, 7.0);
        points.push(at(400, 45.0 + 200.0 * METER_DEG, 7.0));
        points.push(at(460, 45.0, 7.0));

        assert_eq!(find_cluster_end_index(&points, 0, 50.0), 5);
        // Last point is its own cluster
        assert_eq!(find_cluster_end_index(&points, 6, 50.0), 7);
        assert_eq!(find_cluster_end_index(&points, 10, 50.0), 7);
    }

    #[test]
    fn test_centroid_sums_match_batch_centroid() {
        let cluster = vec![
            at(0, 45.0, 7.0).with_accuracy(5.0),
            at(60, 45.0003, 7.0001),
            at(120, 45.0001, 7.0002).with_accuracy(30.0),
        ];
        let mut sums = CentroidSums::default();
        assert_eq!(sums.centroid(), None);
        for p in &cluster {
            sums.add(p);
        }
        assert_eq!(sums.count(), 3);
        assert_eq!(sums.centroid(), weighted_centroid(&cluster));
        assert_eq!(sums, CentroidSums::from_points(&cluster));
    }

    #[test]
    fn test_weighted_centroid_prefers_accurate_fixes() {
        let cluster = vec![
            at(0, 0.0, 0.0).with_accuracy(5.0),
            at(60, 0.001, 0.0).with_accuracy(45.0),
        ];
        let [lat, lon] = weighted_centroid(&cluster).unwrap();
        // Weights 1/5 : 1/45 -> 9 : 1
        assert!((lat - 0.0001).abs() < 1e-9);
        assert_eq!(lon, 0.0);
    }

    #[test]
    fn test_weighted_centroid_unknown_accuracy_is_neutral() {
        let cluster = vec![at(0, 0.0, 0.0), at(60, 0.002, 0.0)];
        let [lat, _] = weighted_centroid(&cluster).unwrap();
        assert!((lat - 0.001).abs() < 1e-12);
        assert!(weighted_centroid(&[]).is_none());
    }

    #[test]
    fn test_trip_path_distance() {
        let path = drive(0, 11, 10, 10.0, 10.0, 36.0);
        // 10 segments of 100 m
        let d = trip_path_distance(&path);
        assert!((d - 1000.0).abs() < 1.0);
        assert_eq!(trip_path_distance(&path[..1]), 0.0);
    }

    #[test]
    fn test_validate_track() {
        let points = vec![at(0, 0.0, 0.0), at(0, 0.0, 0.0), at(10, 0.0, 0.0)];
        assert!(validate_track(&points).is_ok());

        let unordered = vec![at(10, 0.0, 0.0), at(5, 0.0, 0.0)];
        assert_eq!(
            validate_track(&unordered),
            Err(TimelineError::UnorderedInput { index: 1 })
        );

        let bad = vec![at(0, 0.0, 0.0), at(10, 95.0, 0.0)];
        assert!(matches!(
            validate_track(&bad),
            Err(TimelineError::InvalidCoordinate { index: 1, .. })
        ));
    }

    #[test]
    fn test_simplify_straight_path_keeps_endpoints() {
        let path = drive(0, 50, 10, 10.0, 10.0, 36.0);
        let simplified = simplify_path(&path, 15.0, 100);
        assert_eq!(simplified.len(), 2);
        assert_eq!(simplified[0], path[0]);
        assert_eq!(simplified[1], path[49]);
    }

    #[test]
    fn test_simplify_caps_point_count() {
        // Zig-zag that Douglas-Peucker cannot reduce
        let path: Vec<GpsPoint> = (0..40)
            .map(|i| {
                let lon = if i % 2 == 0 { 0.0 } else { 0.01 };
                at(i * 10, i as f64 * 0.01, lon)
            })
            .collect();
        let simplified = simplify_path(&path, 1.0, 10);
        assert_eq!(simplified.len(), 10);
        assert_eq!(simplified.first(), path.first());
        assert_eq!(simplified.last(), path.last());
    }
}
