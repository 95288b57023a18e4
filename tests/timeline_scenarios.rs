//! End-to-end timeline scenarios.
//!
//! Every scenario runs through the batch pipeline (both stay strategies) and
//! the streaming processor separately. The two are not expected to agree
//! event for event; each is checked against the timeline invariants on its own.
//!
//! Run with: `cargo test --test timeline_scenarios`

use chrono::{DateTime, Duration, TimeZone, Utc};
use timeline_engine::{
    resolve_stay_locations, FavoriteLocation, FavoriteLocations, GpsPoint, RawTimeline,
    StreamingTimelineProcessor, TimelineConfig, TimelineEvent, TimelinePipeline, TrackPoint,
    TripType, UNKNOWN_LOCATION_NAME,
};

const METER_DEG: f64 = 1.0 / 111_195.0;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 3, 7, 0, 0).unwrap()
}

fn point(seconds: i64, lat: f64, lon: f64) -> TrackPoint {
    TrackPoint::new(t0() + Duration::seconds(seconds), lat, lon)
}

fn dwell(start: i64, count: usize, step: i64, lat: f64, lon: f64) -> Vec<TrackPoint> {
    (0..count)
        .map(|i| {
            let jitter = ((i % 5) as f64 - 2.0) * METER_DEG;
            point(start + i as i64 * step, lat + jitter, lon)
        })
        .collect()
}

fn drive(start: i64, count: usize, step: i64, lat: f64, lon: f64, speed_kmh: f64) -> Vec<TrackPoint> {
    let meters_per_step = speed_kmh / 3.6 * step as f64;
    (0..count)
        .map(|i| {
            point(
                start + i as i64 * step,
                lat + i as f64 * meters_per_step * METER_DEG,
                lon,
            )
        })
        .collect()
}

/// Home, commute, work, phone off for five hours, back at work.
fn workday() -> Vec<TrackPoint> {
    let mut points = dwell(0, 31, 60, 45.0, 7.0);
    points.extend(drive(1860, 40, 15, 45.0 + 150.0 * METER_DEG, 7.0, 40.0));
    let work = points.last().unwrap().latitude;
    points.extend(dwell(2460, 60, 60, work, 7.0));
    points.extend(dwell(24_000, 20, 60, work, 7.0));
    points
}

/// Timelines from all three engines for the same track.
fn all_engines(config: &TimelineConfig, points: &[TrackPoint]) -> Vec<(&'static str, RawTimeline)> {
    let mut out = Vec::new();
    for algorithm in ["simple", "enhanced"] {
        let pipeline = TimelinePipeline::new(TimelineConfig {
            staypoint_detection_algorithm: algorithm.to_string(),
            ..config.clone()
        })
        .unwrap();
        out.push((algorithm, pipeline.build_timeline("user-1", points).unwrap()));
    }

    let gps: Vec<GpsPoint> = points.iter().map(GpsPoint::from).collect();
    let streaming = StreamingTimelineProcessor::new(config.clone()).unwrap();
    out.push(("streaming", streaming.process_all("user-1", &gps).unwrap()));
    out
}

fn assert_invariants(name: &str, timeline: &RawTimeline, config: &TimelineConfig) {
    let events = timeline.events();
    for w in events.windows(2) {
        assert!(
            w[0].start_time() <= w[1].start_time(),
            "{}: events out of order",
            name
        );
        assert!(
            w[0].end_time() <= w[1].start_time(),
            "{}: {} at {} overlaps {} at {}",
            name,
            w[0].kind(),
            w[0].start_time(),
            w[1].kind(),
            w[1].start_time()
        );
    }
    for stay in &timeline.stays {
        assert!(
            stay.duration_seconds >= config.min_stay_duration_seconds(),
            "{}: stay of {}s below minimum",
            name,
            stay.duration_seconds
        );
    }
    for gap in &timeline.data_gaps {
        assert!(gap.duration_seconds >= config.data_gap_min_duration_seconds, "{}", name);
        assert!(gap.duration_seconds > config.data_gap_threshold_seconds, "{}", name);
    }
}

// ============================================================================
// Scenarios
// ============================================================================

#[test]
fn test_workday() {
    init_logging();
    let config = TimelineConfig::default();

    for (name, timeline) in all_engines(&config, &workday()) {
        assert_invariants(name, &timeline, &config);
        assert_eq!(timeline.user_id, "user-1");
        assert_eq!(timeline.stays.len(), 3, "{}", name);
        assert_eq!(timeline.trips.len(), 1, "{}", name);
        assert_eq!(timeline.data_gaps.len(), 1, "{}", name);

        assert_eq!(timeline.trips[0].trip_type, TripType::Car, "{}", name);
        assert_eq!(timeline.stays[0].start_time, t0(), "{}", name);
        assert_eq!(timeline.stays[0].duration_seconds, 1800, "{}", name);
        assert_eq!(timeline.data_gaps[0].duration_seconds, 18_000, "{}", name);
        assert_eq!(timeline.stays[2].duration_seconds, 1140, "{}", name);

        let kinds: Vec<&str> = timeline.events().iter().map(TimelineEvent::kind).collect();
        assert_eq!(
            kinds,
            vec!["stay", "trip", "stay", "data_gap", "stay"],
            "{}",
            name
        );
    }
}

#[test]
fn test_deterministic() {
    let config = TimelineConfig::default();
    let first = all_engines(&config, &workday());
    let second = all_engines(&config, &workday());
    assert_eq!(first, second);
}

#[test]
fn test_twenty_points_within_five_meters() {
    let config = TimelineConfig {
        staypoint_radius_meters: 50.0,
        trip_min_duration_minutes: 10.0,
        ..TimelineConfig::default()
    };
    let points: Vec<TrackPoint> = (0..20)
        .map(|i| {
            let jitter = ((i % 3) as f64 - 1.0) * 2.0 * METER_DEG;
            point(i * 1500 / 19, 45.0 + jitter, 7.0 + jitter)
        })
        .collect();

    for (name, timeline) in all_engines(&config, &points) {
        assert_eq!(timeline.stays.len(), 1, "{}", name);
        assert!(
            (timeline.stays[0].duration_seconds - 1500).abs() <= 1,
            "{}",
            name
        );
        assert!(timeline.trips.is_empty(), "{}", name);
    }
}

#[test]
fn test_two_points_two_hours_apart() {
    let config = TimelineConfig {
        data_gap_threshold_seconds: 3600,
        ..TimelineConfig::default()
    };
    let points = vec![point(0, 45.0, 7.0), point(7200, 45.0, 7.0)];

    for (name, timeline) in all_engines(&config, &points) {
        assert_eq!(timeline.total_event_count(), 1, "{}", name);
        assert_eq!(timeline.data_gaps[0].start_time, t0(), "{}", name);
        assert_eq!(timeline.data_gaps[0].duration_seconds, 7200, "{}", name);
    }
}

#[test]
fn test_brief_traffic_dip_is_not_a_stay() {
    let config = TimelineConfig::default();
    let mut points = drive(0, 120, 10, 45.0, 7.0, 50.0);
    let mut lat = points.last().unwrap().latitude;
    for k in 1..=9 {
        lat += 3.0 / 3.6 * 10.0 * METER_DEG;
        points.push(point(1190 + k * 10, lat, 7.0));
    }
    points.extend(drive(1290, 120, 10, lat, 7.0, 50.0).into_iter().skip(1));

    for (name, timeline) in all_engines(&config, &points) {
        assert_invariants(name, &timeline, &config);
        assert!(timeline.stays.is_empty(), "{}", name);
        assert!(!timeline.trips.is_empty(), "{}", name);
    }
}

/// Two dwells 15 m apart with a slow 30-minute wander eastward and back
/// between them, leaving the stay radius for most of it.
fn dwell_wander_dwell() -> Vec<TrackPoint> {
    let lon_meter = METER_DEG / 45f64.to_radians().cos();
    let mut points = dwell(0, 16, 60, 45.0, 7.0);
    for k in 1..60 {
        let east = 12.5 * k.min(60 - k) as f64;
        let north = 15.0 * k as f64 / 60.0;
        points.push(point(
            900 + k as i64 * 30,
            45.0 + north * METER_DEG,
            7.0 + east * lon_meter,
        ));
    }
    points.extend(dwell(2700, 16, 60, 45.0 + 15.0 * METER_DEG, 7.0));
    points
}

#[test]
fn test_drift_merge_covers_the_stretch_between_stays() {
    init_logging();
    let config = TimelineConfig::default();
    let pipeline = TimelinePipeline::new(config.clone()).unwrap();
    let timeline = pipeline
        .build_timeline("user-1", &dwell_wander_dwell())
        .unwrap();

    assert_invariants("enhanced", &timeline, &config);
    assert_eq!(timeline.stays.len(), 1);
    assert!(timeline.trips.is_empty());
    assert!(timeline.data_gaps.is_empty());
    assert_eq!(timeline.stays[0].start_time, t0());
    assert_eq!(timeline.stays[0].duration_seconds, 3600);

    // Without merging the wander stays a trip between two stays
    let unmerged = TimelinePipeline::new(TimelineConfig {
        is_merge_enabled: false,
        ..config.clone()
    })
    .unwrap()
    .build_timeline("user-1", &dwell_wander_dwell())
    .unwrap();
    assert_invariants("unmerged", &unmerged, &config);
    assert_eq!(unmerged.stays.len(), 2);
    assert_eq!(unmerged.trips.len(), 1);
}

#[test]
fn test_short_input_is_empty() {
    let config = TimelineConfig::default();
    for (name, timeline) in all_engines(&config, &[point(0, 45.0, 7.0)]) {
        assert!(timeline.is_empty(), "{}", name);
    }
}

#[test]
fn test_resolve_workday_stays() {
    let pipeline = TimelinePipeline::new(TimelineConfig::default()).unwrap();
    let mut timeline = pipeline.build_timeline("user-1", &workday()).unwrap();

    let favorites = FavoriteLocations::new(vec![FavoriteLocation {
        id: 10,
        name: "Home".to_string(),
        latitude: 45.0,
        longitude: 7.0,
        radius_meters: 75.0,
    }]);
    let resolved = resolve_stay_locations(&mut timeline, &favorites);

    assert_eq!(resolved, 1);
    assert_eq!(timeline.stays[0].location_name.as_deref(), Some("Home"));
    assert_eq!(timeline.stays[0].favorite_id, Some(10));
    for stay in &timeline.stays[1..] {
        assert_eq!(stay.location_name.as_deref(), Some(UNKNOWN_LOCATION_NAME));
    }
}

#[test]
fn test_config_from_json_requires_every_field() {
    let json = serde_json::to_string(&TimelineConfig::default()).unwrap();
    assert_eq!(TimelineConfig::from_json(&json).unwrap(), TimelineConfig::default());

    let mut value: serde_json::Value = serde_json::from_str(&json).unwrap();
    value
        .as_object_mut()
        .unwrap()
        .remove("staypoint_radius_meters");
    assert!(TimelineConfig::from_json(&value.to_string()).is_err());

    value["staypoint_radius_meters"] = serde_json::json!(-5.0);
    assert!(TimelineConfig::from_json(&value.to_string()).is_err());
}
