//! # Batch Timeline Pipeline
//!
//! Builds a complete [`RawTimeline`] from a user's full track in one pass:
//!
//! 1. Convert and validate the track (coordinates, timestamp order)
//! 2. Detect data gaps and split the track into contiguous segments
//! 3. Detect stays per segment with the configured strategy
//! 4. Turn every stretch between stays into a trip
//! 5. Sort everything by start time
//!
//! Users are independent, so [`TimelinePipeline::build_timelines`] processes
//! them in parallel when the `parallel` feature is enabled.

use log::{debug, info};

use crate::error::Result;
use crate::gaps::DataGapDetector;
use crate::spatial::validate_track;
use crate::staypoints::{StayPointDetector, TimelineStayPoint};
use crate::timeline::{RawTimeline, TimelineEvent, Trip};
use crate::{GpsPoint, TimelineConfig, TrackPoint};

/// Batch timeline builder holding a validated config.
#[derive(Debug, Clone)]
pub struct TimelinePipeline {
    config: TimelineConfig,
    detector: StayPointDetector,
    gaps: DataGapDetector,
}

impl TimelinePipeline {
    /// Validate the config and select the stay point strategy.
    pub fn new(config: TimelineConfig) -> Result<Self> {
        config.validate()?;
        let detector = StayPointDetector::from_config(&config)?;
        let gaps = DataGapDetector::from_config(&config);
        Ok(Self {
            config,
            detector,
            gaps,
        })
    }

    pub fn config(&self) -> &TimelineConfig {
        &self.config
    }

    pub fn detector(&self) -> StayPointDetector {
        self.detector
    }

    /// Build one user's timeline.
    ///
    /// Fewer than two points give an empty timeline. Invalid coordinates and
    /// out-of-order timestamps are errors, reported with the offending index.
    pub fn build_timeline(&self, user_id: &str, points: &[TrackPoint]) -> Result<RawTimeline> {
        if points.len() < 2 {
            return Ok(RawTimeline::new(user_id));
        }

        let track: Vec<GpsPoint> = points.iter().map(GpsPoint::from).collect();
        validate_track(&track)?;

        let mut events: Vec<TimelineEvent> = self
            .gaps
            .detect(&track)
            .into_iter()
            .map(TimelineEvent::from)
            .collect();

        let segments = self.gaps.split_at_gaps(&track);
        for segment in &segments {
            events.extend(self.segment_events(segment)?);
        }
        events.sort_by_key(|e| e.start_time());

        let timeline = RawTimeline::from_events(user_id, events);
        info!(
            "[Pipeline] {}: {} points, {} segments -> {} stays, {} trips, {} gaps",
            user_id,
            track.len(),
            segments.len(),
            timeline.stays.len(),
            timeline.trips.len(),
            timeline.data_gaps.len()
        );
        Ok(timeline)
    }

    /// Build timelines for many users. One user's bad input does not affect
    /// the others.
    #[cfg(feature = "parallel")]
    pub fn build_timelines(&self, inputs: &[(String, Vec<TrackPoint>)]) -> Vec<Result<RawTimeline>> {
        use rayon::prelude::*;

        inputs
            .par_iter()
            .map(|(user_id, points)| self.build_timeline(user_id, points))
            .collect()
    }

    /// Build timelines for many users. One user's bad input does not affect
    /// the others.
    #[cfg(not(feature = "parallel"))]
    pub fn build_timelines(&self, inputs: &[(String, Vec<TrackPoint>)]) -> Vec<Result<RawTimeline>> {
        inputs
            .iter()
            .map(|(user_id, points)| self.build_timeline(user_id, points))
            .collect()
    }

    /// Stays and the trips around them for one gap-free segment.
    fn segment_events(&self, segment: &[GpsPoint]) -> Result<Vec<TimelineEvent>> {
        let stays = self.detector.detect(&self.config, segment)?;
        let trips = self.trips_between(segment, &stays);
        debug!(
            "[Pipeline] Segment of {} points: {} stays, {} trips",
            segment.len(),
            stays.len(),
            trips.len()
        );

        Ok(stays
            .iter()
            .map(|s| TimelineEvent::Stay(s.to_stay()))
            .chain(trips.into_iter().map(TimelineEvent::Trip))
            .collect())
    }

    /// Every stretch not covered by a stay, sharing the boundary fix with the
    /// stay on either side. Stretches with fewer than two fixes are skipped.
    fn trips_between(&self, segment: &[GpsPoint], stays: &[TimelineStayPoint]) -> Vec<Trip> {
        let mut spans = Vec::with_capacity(stays.len() + 1);
        let mut from = 0;
        for stay in stays {
            let to = segment.partition_point(|p| p.timestamp <= stay.start_time);
            spans.push(from..to);
            from = segment.partition_point(|p| p.timestamp < stay.end_time);
        }
        spans.push(from..segment.len());

        spans
            .into_iter()
            .filter(|span| span.len() >= 2)
            .filter_map(|span| Trip::from_path(&segment[span], &self.config))
            .collect()
    }
}
