//! # sensor
//!
//! Stateful per-station cut detector. Consumes one frame at a time and emits
//! at most one `CUT` event per physical bar passage through the configured
//! region of interest.
//!
//! The time source is injected (`Clock`) rather than read from the system
//! clock directly — production wires the monotonic system clock wrapped to
//! UTC, tests wire a deterministic counter. See `CutSensor::with_clock`.

use std::sync::Arc;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use tracing::{debug, info};
use vision_types::{Event, VisionError};

use crate::image::{self, Frame};

/// Caller-supplied time source, returning the current UTC instant.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Axis-aligned rectangle in frame coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegionOfInterest {
    pub x: usize,
    pub y: usize,
    pub width: usize,
    pub height: usize,
}

impl RegionOfInterest {
    /// Crop this ROI out of `frame`, failing if it runs past the frame edge.
    fn crop(&self, frame: &Frame) -> Result<Frame, VisionError> {
        let frame_height = frame.len();
        let frame_width = frame.first().map(|row| row.len()).unwrap_or(0);
        if self.y + self.height > frame_height || self.x + self.width > frame_width {
            return Err(VisionError::RoiOutOfBounds(format!(
                "roi ({}, {}, {}, {}) exceeds frame {}x{}",
                self.x, self.y, self.width, self.height, frame_width, frame_height
            )));
        }
        Ok(frame[self.y..self.y + self.height]
            .iter()
            .map(|row| row[self.x..self.x + self.width].to_vec())
            .collect())
    }
}

/// Only downward sweeps are supported; the direction gate rejects any other
/// sign of centroid motion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Down,
}

/// Immutable sensor configuration, injected by the host and never mutated
/// after construction.
#[derive(Debug, Clone, Copy)]
pub struct CutSensorConfig {
    pub roi: RegionOfInterest,
    pub persistence_ms: i64,
    pub min_area_px: f64,
    pub stabilization_ms: i64,
    pub direction: Direction,
}

/// Read-only snapshot of the sensor's state machine, for introspection and
/// tests rather than as redundantly-tracked state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorPhase {
    Idle,
    Charging,
    Cooldown,
}

const MOTION_THRESHOLD: u8 = 25;
const MOTION_MAXVAL: u8 = 255;
const DILATE_ITERATIONS: u32 = 2;
const BACKGROUND_BLEND_ALPHA: f64 = 0.05;

/// Stateful per-station CUT detector. One instance owns its background model
/// and charging/cooldown state for the life of a station session.
pub struct CutSensor {
    config: CutSensorConfig,
    station_id: String,
    clock: Clock,
    background: Option<Vec<Vec<f64>>>,
    motion_start: Option<DateTime<Utc>>,
    last_centroid_y: Option<f64>,
    last_event_time: Option<DateTime<Utc>>,
}

impl CutSensor {
    /// Construct a sensor with an injected clock (used by tests and by any
    /// host wiring something other than the system clock).
    pub fn with_clock(config: CutSensorConfig, station_id: impl Into<String>, clock: Clock) -> Self {
        Self {
            config,
            station_id: station_id.into(),
            clock,
            background: None,
            motion_start: None,
            last_centroid_y: None,
            last_event_time: None,
        }
    }

    /// Construct a sensor wired to the system clock.
    pub fn new(config: CutSensorConfig, station_id: impl Into<String>) -> Self {
        Self::with_clock(config, station_id, Arc::new(Utc::now))
    }

    pub fn station_id(&self) -> &str {
        &self.station_id
    }

    /// Current state-machine phase, derived from internal fields.
    pub fn phase(&self) -> SensorPhase {
        if let Some(last_event_time) = self.last_event_time {
            if (self.clock)() - last_event_time < ChronoDuration::milliseconds(self.config.stabilization_ms) {
                return SensorPhase::Cooldown;
            }
        }
        if self.motion_start.is_some() {
            SensorPhase::Charging
        } else {
            SensorPhase::Idle
        }
    }

    /// Consume one frame. Returns `Ok(Some(event))` exactly when a physical
    /// bar passage has just completed.
    pub fn process_frame(&mut self, frame: &Frame) -> Result<Option<Event>, VisionError> {
        let now = (self.clock)();
        let roi = self.config.roi.crop(frame)?;

        // First-ever call: seed the background, never emit.
        let Some(background) = self.background.as_mut() else {
            self.background = Some(to_float_grid(&roi));
            return Ok(None);
        };

        let (max_area, centroid_y) = detect_motion(background, &roi);
        let motion_detected = max_area > 0.0;

        // Dead-time gate. State is frozen during cooldown.
        if let Some(last_event_time) = self.last_event_time {
            if now - last_event_time < ChronoDuration::milliseconds(self.config.stabilization_ms) {
                return Ok(None);
            }
        }

        if !motion_detected || max_area < self.config.min_area_px {
            self.motion_start = None;
            self.last_centroid_y = None;
            return Ok(None);
        }

        let Some(motion_start) = self.motion_start else {
            self.motion_start = Some(now);
            self.last_centroid_y = Some(centroid_y);
            debug!(station_id = %self.station_id, %centroid_y, "motion started, charging");
            return Ok(None);
        };

        let last_centroid_y = self.last_centroid_y.unwrap_or(centroid_y);
        if self.config.direction == Direction::Down && centroid_y < last_centroid_y {
            self.motion_start = None;
            self.last_centroid_y = Some(centroid_y);
            debug!(station_id = %self.station_id, "centroid moved upward, resetting charge");
            return Ok(None);
        }
        self.last_centroid_y = Some(centroid_y);

        if now - motion_start >= ChronoDuration::milliseconds(self.config.persistence_ms) {
            let confidence = (max_area / self.config.min_area_px.max(1.0)).min(1.0);
            let event = Event::new_cut(self.station_id.clone(), confidence, now)?;
            self.motion_start = None;
            self.last_centroid_y = None;
            self.last_event_time = Some(now);
            info!(station_id = %self.station_id, %confidence, "cut emitted");
            return Ok(Some(event));
        }

        Ok(None)
    }
}

fn to_float_grid(frame: &Frame) -> Vec<Vec<f64>> {
    frame.iter().map(|row| row.iter().map(|&v| v as f64).collect()).collect()
}

/// Computes the motion mask, selects the maximal contour and its centroid,
/// and blends the ROI into the background whenever any contour was found —
/// independent of whether that contour clears the area threshold, so the
/// background keeps drifting even through cooldown or sub-threshold noise.
fn detect_motion(background: &mut Vec<Vec<f64>>, roi: &Frame) -> (f64, f64) {
    let background_u8 = image::convert_scale_abs(background);
    let delta = image::absdiff(&background_u8, roi);
    let (_, thresh) = image::threshold(&delta, MOTION_THRESHOLD, MOTION_MAXVAL);
    let mask = image::dilate(&thresh, DILATE_ITERATIONS);
    let contours = image::find_contours(&mask);

    let mut max_area = 0.0;
    let mut centroid_y = 0.0;
    for contour in &contours {
        let area = image::contour_area(contour);
        if area > max_area {
            max_area = area;
            let m = image::moments(contour);
            centroid_y = if m.m00 > 0.0 { m.m01 / m.m00 } else { 0.0 };
        }
    }

    if max_area > 0.0 {
        image::accumulate_weighted(roi, background, BACKGROUND_BLEND_ALPHA);
    }

    (max_area, centroid_y)
}
