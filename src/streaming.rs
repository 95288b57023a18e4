//! # Streaming Timeline Processing
//!
//! Point-at-a-time engine for live ingestion. All state lives in a
//! [`UserState`] value that the caller owns: [`process_point`] takes the state,
//! one new fix and the config, and hands back the updated state together with
//! any events that became final. Nothing is shared between users, so callers
//! can keep one state per user wherever they like (memory, database, queue).
//!
//! ## Modes
//! - **Unknown** - no context yet; the next fix decides stay or trip
//! - **Stay** - dwelling; fixes outside the radius are held as departure
//!   candidates until the departure is confirmed or turns out to be drift
//! - **Trip** - moving; each fix is checked for an arrival or a sustained stop
//!
//! Unlike the batch pipeline, streaming never revisits finalized events, so
//! adjacent stays are not merged after the fact.

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::error::{Result, TimelineError};
use crate::spatial::{trip_path_distance, weighted_centroid, CentroidSums};
use crate::staypoints::TimelineStayPoint;
use crate::timeline::{DataGap, RawTimeline, TimelineEvent, Trip};
use crate::velocity::{point_speed_kmh, KMH_PER_MPS};
use crate::{GpsPoint, TimelineConfig};

// ============================================================================
// State
// ============================================================================

/// What the user is currently believed to be doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ProcessorMode {
    #[default]
    Unknown,
    Stay,
    Trip,
}

/// Everything the engine remembers about one user between fixes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserState {
    pub current_mode: ProcessorMode,
    /// Stay cluster in Stay mode, trip path in Trip mode
    pub active_points: Vec<GpsPoint>,
    /// Fixes outside the stay radius not yet confirmed as a departure
    pub departure_candidates: Vec<GpsPoint>,
    pub last_processed_point: Option<GpsPoint>,
    /// Fixes accepted so far, used to index input errors
    pub processed_count: usize,
    /// Running centroid of `active_points` outside Trip mode; rebuilt on demand
    #[serde(skip)]
    stay_centroid: CentroidSums,
}

impl PartialEq for UserState {
    fn eq(&self, other: &Self) -> bool {
        self.current_mode == other.current_mode
            && self.active_points == other.active_points
            && self.departure_candidates == other.departure_candidates
            && self.last_processed_point == other.last_processed_point
            && self.processed_count == other.processed_count
    }
}

impl UserState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return every field to its initial value.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Drop buffered points and return to Unknown, keeping the ordering guard.
    fn clear_buffers(&mut self) {
        self.current_mode = ProcessorMode::Unknown;
        self.active_points.clear();
        self.departure_candidates.clear();
        self.stay_centroid = CentroidSums::default();
    }

    fn push_stay_point(&mut self, point: GpsPoint) {
        self.active_points.push(point);
        self.stay_centroid.add(&point);
    }

    /// Replace the active buffer, tracking its centroid only when it is a stay.
    fn set_active(&mut self, points: Vec<GpsPoint>, mode: ProcessorMode) {
        self.stay_centroid = match mode {
            ProcessorMode::Trip => CentroidSums::default(),
            _ => CentroidSums::from_points(&points),
        };
        self.active_points = points;
        self.current_mode = mode;
    }

    /// Whether `point` lies within `radius_meters` of the stay buffer's centroid.
    fn within_stay_radius(&mut self, point: &GpsPoint, radius_meters: f64) -> bool {
        // Restored states carry no sums
        if self.stay_centroid.count() != self.active_points.len() {
            self.stay_centroid = CentroidSums::from_points(&self.active_points);
        }
        match self.stay_centroid.centroid() {
            Some([lat, lon]) => {
                point.distance_to(&GpsPoint::new(point.timestamp, lat, lon)) <= radius_meters
            }
            None => false,
        }
    }

    pub fn is_idle(&self) -> bool {
        self.active_points.is_empty() && self.departure_candidates.is_empty()
    }

    /// Serialize the state to MessagePack.
    #[cfg(feature = "persistence")]
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        rmp_serde::to_vec(self).map_err(|e| TimelineError::Serialization {
            message: e.to_string(),
        })
    }

    /// Restore a state written by [`UserState::to_bytes`].
    #[cfg(feature = "persistence")]
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        rmp_serde::from_slice(bytes).map_err(|e| TimelineError::Serialization {
            message: e.to_string(),
        })
    }
}

/// Output of one processing step.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessingResult {
    pub updated_state: UserState,
    pub finalized_events: Vec<TimelineEvent>,
}

// ============================================================================
// Step Function
// ============================================================================

/// Feed one fix into the state machine.
///
/// The config is expected to be validated already. Fails with
/// `InvalidCoordinate` or `UnorderedInput`; the state passed in is consumed
/// either way, so callers that want to skip a bad fix should keep a copy.
pub fn process_point(
    mut state: UserState,
    point: GpsPoint,
    config: &TimelineConfig,
) -> Result<ProcessingResult> {
    if !point.is_valid() {
        return Err(TimelineError::InvalidCoordinate {
            index: state.processed_count,
            latitude: point.latitude,
            longitude: point.longitude,
        });
    }

    let mut events = Vec::new();

    if let Some(last) = state.last_processed_point {
        let dt = point.seconds_since(&last);
        if dt < 0 {
            return Err(TimelineError::UnorderedInput {
                index: state.processed_count,
            });
        }
        if dt > config.data_gap_threshold_seconds {
            events.extend(flush(&mut state, config));
            if dt >= config.data_gap_min_duration_seconds {
                events.push(DataGap::between(last.timestamp, point.timestamp).into());
            }
            debug!("[Streaming] {}s without data, restarting", dt);
        }
    }

    state.processed_count += 1;
    state.last_processed_point = Some(point);

    match state.current_mode {
        ProcessorMode::Unknown => on_unknown(&mut state, point, config),
        ProcessorMode::Stay => on_stay(&mut state, point, config, &mut events),
        ProcessorMode::Trip => on_trip(&mut state, point, config, &mut events),
    }

    Ok(ProcessingResult {
        updated_state: state,
        finalized_events: events,
    })
}

/// Flush whatever is still buffered at the end of the stream.
///
/// A Stay buffer that meets the minimum dwell becomes a Stay; pending
/// departure candidates become a Trip from the last stay fix. A Trip buffer
/// of two or more fixes becomes a Trip.
pub fn finalize(mut state: UserState, config: &TimelineConfig) -> Vec<TimelineEvent> {
    if state.is_idle() {
        return Vec::new();
    }
    flush(&mut state, config)
}

fn flush(state: &mut UserState, config: &TimelineConfig) -> Vec<TimelineEvent> {
    let mut events = Vec::new();
    let active = std::mem::take(&mut state.active_points);
    let candidates = std::mem::take(&mut state.departure_candidates);

    match state.current_mode {
        ProcessorMode::Unknown => {}
        ProcessorMode::Stay => {
            let trip_path = close_stay(active, candidates, config, &mut events);
            if trip_path.len() >= 2 {
                events.extend(Trip::from_path(&trip_path, config).map(TimelineEvent::from));
            }
        }
        ProcessorMode::Trip => {
            events.extend(Trip::from_path(&active, config).map(TimelineEvent::from));
        }
    }

    state.clear_buffers();
    events
}

// ============================================================================
// Mode Handlers
// ============================================================================

fn on_unknown(state: &mut UserState, point: GpsPoint, config: &TimelineConfig) {
    let Some(&last) = state.active_points.last() else {
        state.push_stay_point(point);
        return;
    };

    if state.within_stay_radius(&point, config.staypoint_radius_meters) {
        state.push_stay_point(point);
        state.current_mode = ProcessorMode::Stay;
    } else {
        state.set_active(vec![last, point], ProcessorMode::Trip);
    }
}

fn on_stay(
    state: &mut UserState,
    point: GpsPoint,
    config: &TimelineConfig,
    events: &mut Vec<TimelineEvent>,
) {
    if state.within_stay_radius(&point, config.staypoint_radius_meters) {
        if !state.departure_candidates.is_empty() {
            debug!(
                "[Streaming] Discarding {} drift fixes",
                state.departure_candidates.len()
            );
            state.departure_candidates.clear();
        }
        state.push_stay_point(point);
        return;
    }

    state.departure_candidates.push(point);

    let away_seconds = state
        .active_points
        .last()
        .map(|last| point.seconds_since(last))
        .unwrap_or(0);
    let confirmed = state.departure_candidates.len() >= config.stay_departure_min_points
        || away_seconds >= config.stay_departure_min_duration_seconds;
    if !confirmed {
        return;
    }

    let active = std::mem::take(&mut state.active_points);
    let candidates = std::mem::take(&mut state.departure_candidates);
    let trip_path = close_stay(active, candidates, config, events);
    state.set_active(trip_path, ProcessorMode::Trip);
}

/// Emit the stay buffer if it qualifies and return the path of the trip that
/// leaves it: the last stay fix plus the candidates, or the whole buffer plus
/// the candidates when the stay was too short to count.
fn close_stay(
    active: Vec<GpsPoint>,
    candidates: Vec<GpsPoint>,
    config: &TimelineConfig,
    events: &mut Vec<TimelineEvent>,
) -> Vec<GpsPoint> {
    let dwell = match (active.first(), active.last()) {
        (Some(first), Some(last)) => last.seconds_since(first),
        _ => 0,
    };

    let mut path: Vec<GpsPoint> = if dwell >= config.min_stay_duration_seconds() {
        if let Some(stay) = TimelineStayPoint::from_cluster(&active) {
            debug!("[Streaming] Stay of {}s finalized", stay.duration_seconds);
            events.push(stay.to_stay().into());
        }
        active.last().copied().into_iter().collect()
    } else {
        active
    };
    path.extend(candidates);
    path
}

fn on_trip(
    state: &mut UserState,
    point: GpsPoint,
    config: &TimelineConfig,
    events: &mut Vec<TimelineEvent>,
) {
    state.active_points.push(point);

    let Some(k) = find_trip_end(&state.active_points, config) else {
        return;
    };

    let seed = state.active_points.split_off(k);
    if !state.active_points.is_empty() {
        // The first stopped fix closes the trip and opens the stay
        let mut path = std::mem::take(&mut state.active_points);
        path.push(seed[0]);
        if let Some(trip) = Trip::from_path(&path, config) {
            debug!(
                "[Streaming] Trip of {:.0}m finalized ({:?})",
                trip.distance_meters, trip.trip_type
            );
            events.push(trip.into());
        }
    }
    state.set_active(seed, ProcessorMode::Stay);
}

/// Index of the first stopped fix of the trip's trailing stop, if any.
pub fn find_trip_end(path: &[GpsPoint], config: &TimelineConfig) -> Option<usize> {
    arrival_start(path, config).or_else(|| sustained_stop_start(path, config))
}

/// Longest trailing run of fixes all within the stay radius of the run's
/// centroid, accepted when it is slow on average and lasts long enough.
fn arrival_start(path: &[GpsPoint], config: &TimelineConfig) -> Option<usize> {
    let n = path.len();
    if n < 2 {
        return None;
    }

    let mut start = None;
    for s in (0..n - 1).rev() {
        let run = &path[s..];
        let [lat, lon] = weighted_centroid(run)?;
        let center = GpsPoint::new(run[0].timestamp, lat, lon);
        if run
            .iter()
            .all(|p| p.distance_to(&center) <= config.staypoint_radius_meters)
        {
            start = Some(s);
        } else {
            break;
        }
    }

    let s = start?;
    let run = &path[s..];
    let span = run[run.len() - 1].seconds_since(&run[0]);
    if span < config.trip_arrival_detection_min_duration_seconds || span <= 0 {
        return None;
    }
    let avg_kmh = trip_path_distance(run) / span as f64 * KMH_PER_MPS;
    (avg_kmh <= config.staypoint_velocity_threshold).then_some(s)
}

/// Trailing run of fixes each at or below the stay speed threshold.
fn sustained_stop_start(path: &[GpsPoint], config: &TimelineConfig) -> Option<usize> {
    let last = path.len().checked_sub(1)?;
    let threshold = config.staypoint_velocity_threshold;

    let mut start = None;
    for i in (0..=last).rev() {
        match point_speed_kmh(path, i) {
            Some(speed) if speed <= threshold => start = Some(i),
            _ => break,
        }
    }

    let s = start?;
    let span = path[last].seconds_since(&path[s]);
    (span >= config.trip_sustained_stop_min_duration_seconds).then_some(s)
}

// ============================================================================
// Convenience Wrapper
// ============================================================================

/// Owns a validated config and drives whole tracks through the step function.
#[derive(Debug, Clone)]
pub struct StreamingTimelineProcessor {
    config: TimelineConfig,
}

impl StreamingTimelineProcessor {
    pub fn new(config: TimelineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &TimelineConfig {
        &self.config
    }

    /// Process one fix for a caller-held state.
    pub fn process(&self, state: UserState, point: GpsPoint) -> Result<ProcessingResult> {
        process_point(state, point, &self.config)
    }

    /// Flush a caller-held state at the end of its stream.
    pub fn finish(&self, state: UserState) -> Vec<TimelineEvent> {
        finalize(state, &self.config)
    }

    /// Run a complete ordered track and finalize it.
    pub fn process_all(&self, user_id: &str, points: &[GpsPoint]) -> Result<RawTimeline> {
        let mut state = UserState::new();
        let mut events = Vec::new();
        for point in points {
            let result = self.process(state, *point)?;
            state = result.updated_state;
            events.extend(result.finalized_events);
        }
        events.extend(self.finish(state));

        info!(
            "[Streaming] {} points -> {} events for {}",
            points.len(),
            events.len(),
            user_id
        );
        Ok(RawTimeline::from_events(user_id, events))
    }
}
