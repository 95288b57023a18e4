//! Timeline events and the categorized [`RawTimeline`] container.

use chrono::{DateTime, Duration, Utc};
use geo::{Coord, LineString};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::spatial::{simplify_path, trip_path_distance};
use crate::trip_stats::classify_trip;
use crate::{GpsPoint, TimelineConfig};

/// Movement type of a trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TripType {
    Walk,
    Bicycle,
    Car,
    Unknown,
}

/// Dwelling at one place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stay {
    pub start_time: DateTime<Utc>,
    pub duration_seconds: i64,
    pub latitude: f64,
    pub longitude: f64,
    /// Filled in by the location resolver, never by detection
    pub location_name: Option<String>,
    pub favorite_id: Option<i64>,
    pub geocoding_id: Option<i64>,
}

impl Stay {
    pub fn new(
        start_time: DateTime<Utc>,
        duration_seconds: i64,
        latitude: f64,
        longitude: f64,
    ) -> Self {
        Self {
            start_time,
            duration_seconds,
            latitude,
            longitude,
            location_name: None,
            favorite_id: None,
            geocoding_id: None,
        }
    }

    pub fn end_time(&self) -> DateTime<Utc> {
        self.start_time + Duration::seconds(self.duration_seconds)
    }
}

/// Movement between two places.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trip {
    pub start_time: DateTime<Utc>,
    pub duration_seconds: i64,
    pub trip_type: TripType,
    /// Every fix of the trip, in order
    pub path: Vec<GpsPoint>,
    /// Sum of haversine distances along `path`
    pub distance_meters: f64,
    /// Reduced copy of `path` for display, when simplification is enabled
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub simplified_path: Option<Vec<GpsPoint>>,
}

impl Trip {
    /// Build a trip from its raw path.
    ///
    /// The full path is kept; a simplified copy is added if the config asks
    /// for it. Returns `None` for fewer than two points.
    pub fn from_path(path: &[GpsPoint], config: &TimelineConfig) -> Option<Self> {
        let (first, last) = match (path.first(), path.last()) {
            (Some(f), Some(l)) if path.len() >= 2 => (f, l),
            _ => return None,
        };

        let distance_meters = trip_path_distance(path);
        let trip_type = classify_trip(path, distance_meters, config);

        let simplified_path = config.path_simplification_enabled.then(|| {
            simplify_path(
                path,
                config.path_simplification_tolerance_meters,
                config.path_max_points,
            )
        });

        Some(Self {
            start_time: first.timestamp,
            duration_seconds: last.seconds_since(first).max(0),
            trip_type,
            path: path.to_vec(),
            distance_meters,
            simplified_path,
        })
    }

    pub fn end_time(&self) -> DateTime<Utc> {
        self.start_time + Duration::seconds(self.duration_seconds)
    }

    pub fn start_location(&self) -> Option<&GpsPoint> {
        self.path.first()
    }

    pub fn end_location(&self) -> Option<&GpsPoint> {
        self.path.last()
    }

    /// Simplified path if one was computed, the full path otherwise.
    pub fn display_path(&self) -> &[GpsPoint] {
        self.simplified_path.as_deref().unwrap_or(&self.path)
    }

    /// Display path as a `geo` line string (x = longitude, y = latitude).
    pub fn line_string(&self) -> LineString<f64> {
        self.display_path()
            .iter()
            .map(|p| Coord {
                x: p.longitude,
                y: p.latitude,
            })
            .collect()
    }
}

/// Period without tracking data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataGap {
    pub start_time: DateTime<Utc>,
    pub duration_seconds: i64,
}

impl DataGap {
    pub fn between(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            start_time: start,
            duration_seconds: (end - start).num_seconds(),
        }
    }

    pub fn end_time(&self) -> DateTime<Utc> {
        self.start_time + Duration::seconds(self.duration_seconds)
    }
}

/// Any finalized timeline event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TimelineEvent {
    Stay(Stay),
    Trip(Trip),
    DataGap(DataGap),
}

impl TimelineEvent {
    pub fn start_time(&self) -> DateTime<Utc> {
        match self {
            TimelineEvent::Stay(s) => s.start_time,
            TimelineEvent::Trip(t) => t.start_time,
            TimelineEvent::DataGap(g) => g.start_time,
        }
    }

    pub fn duration_seconds(&self) -> i64 {
        match self {
            TimelineEvent::Stay(s) => s.duration_seconds,
            TimelineEvent::Trip(t) => t.duration_seconds,
            TimelineEvent::DataGap(g) => g.duration_seconds,
        }
    }

    pub fn end_time(&self) -> DateTime<Utc> {
        self.start_time() + Duration::seconds(self.duration_seconds())
    }

    /// Half-open containment: `start <= timestamp < end`.
    pub fn contains(&self, timestamp: DateTime<Utc>) -> bool {
        timestamp >= self.start_time() && timestamp < self.end_time()
    }

    pub fn kind(&self) -> &'static str {
        match self {
            TimelineEvent::Stay(_) => "stay",
            TimelineEvent::Trip(_) => "trip",
            TimelineEvent::DataGap(_) => "data_gap",
        }
    }
}

impl From<Stay> for TimelineEvent {
    fn from(s: Stay) -> Self {
        TimelineEvent::Stay(s)
    }
}

impl From<Trip> for TimelineEvent {
    fn from(t: Trip) -> Self {
        TimelineEvent::Trip(t)
    }
}

impl From<DataGap> for TimelineEvent {
    fn from(g: DataGap) -> Self {
        TimelineEvent::DataGap(g)
    }
}

/// A user's timeline split by event kind.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawTimeline {
    pub user_id: String,
    pub stays: Vec<Stay>,
    pub trips: Vec<Trip>,
    pub data_gaps: Vec<DataGap>,
}

impl RawTimeline {
    pub fn new(user_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            ..Self::default()
        }
    }

    /// Partition a flat event list, keeping relative order within each kind.
    pub fn from_events(user_id: &str, events: Vec<TimelineEvent>) -> Self {
        let mut timeline = Self::new(user_id);
        for event in events {
            timeline.push(event);
        }
        timeline
    }

    pub fn push(&mut self, event: TimelineEvent) {
        match event {
            TimelineEvent::Stay(s) => self.stays.push(s),
            TimelineEvent::Trip(t) => self.trips.push(t),
            TimelineEvent::DataGap(g) => self.data_gaps.push(g),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.total_event_count() == 0
    }

    pub fn total_event_count(&self) -> usize {
        self.stays.len() + self.trips.len() + self.data_gaps.len()
    }

    /// All events flattened back into start-time order.
    pub fn events(&self) -> Vec<TimelineEvent> {
        let mut events: Vec<TimelineEvent> = self
            .stays
            .iter()
            .cloned()
            .map(TimelineEvent::from)
            .chain(self.trips.iter().cloned().map(TimelineEvent::from))
            .chain(self.data_gaps.iter().cloned().map(TimelineEvent::from))
            .collect();
        events.sort_by_key(|e| e.start_time());
        events
    }

    /// Timeline as JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}
