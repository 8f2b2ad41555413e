//! # vision-types
//!
//! Shared wire-format types for the edge vision pipeline.
//!
//! These types are used by:
//! - `edge-pipeline`: sensing, gating, storing and validating events on-station
//! - the OCR job-sheet service and the cutting-stock optimizer (out of scope here):
//!   both consume persisted `Event` records downstream
//! - the `vision-verify` CLI: reads and validates persisted event logs
//!
//! ## Invariants
//! - `Event::confidence` ∈ `[0, 1]`
//! - `Event::station_id` non-empty
//! - `Event::event_type` ∈ `{CUT, BEND}`
//! - `Lease::duration_hours` ∈ `[1, 100]` (enforced by the signer, not this crate)
//!
//! Construction and deserialization share the same validation path — there is no
//! way to obtain an `Event` with an out-of-range `confidence` or an empty
//! `station_id`, whether it comes from `Event::new` or from a JSON line on disk.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ── Errors ─────────────────────────────────────────────────────────────────────

/// Error kinds surfaced by construction, signing, and storage across the pipeline.
#[derive(Debug, thiserror::Error)]
pub enum VisionError {
    #[error("invalid event: {0}")]
    InvalidEvent(String),

    #[error("invalid lease: {0}")]
    InvalidLease(String),

    #[error("corrupt log: {0}")]
    CorruptLog(String),

    #[error("roi out of bounds: {0}")]
    RoiOutOfBounds(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

// ── Event kind ─────────────────────────────────────────────────────────────────

/// Kind of physical action an event describes.
///
/// `Bend` is a reserved kind: the cut sensor in this crate only ever emits
/// `Cut`, but downstream consumers and the event store must accept both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    Cut,
    Bend,
}

// ── Event ──────────────────────────────────────────────────────────────────────

/// Immutable, validated event record. The only way to produce one is through
/// [`Event::new_cut`] / [`Event::new_bend`] or via `Deserialize`, both of which run
/// the same invariant checks.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Event {
    event_id: String,
    timestamp: DateTime<Utc>,
    station_id: String,
    event_type: EventType,
    confidence: f64,
}

impl Event {
    /// Construct a `CUT` event with a freshly generated identifier.
    pub fn new_cut(
        station_id: impl Into<String>,
        confidence: f64,
        timestamp: DateTime<Utc>,
    ) -> Result<Self, VisionError> {
        Self::with_id(Uuid::new_v4().to_string(), timestamp, station_id, EventType::Cut, confidence)
    }

    /// Construct a `BEND` event. Reserved for future use; no sensor in this
    /// crate emits it today.
    pub fn new_bend(
        station_id: impl Into<String>,
        confidence: f64,
        timestamp: DateTime<Utc>,
    ) -> Result<Self, VisionError> {
        Self::with_id(Uuid::new_v4().to_string(), timestamp, station_id, EventType::Bend, confidence)
    }

    /// Construct an event with an explicit identifier (used by `Deserialize`
    /// and by callers reconstructing a known event).
    pub fn with_id(
        event_id: impl Into<String>,
        timestamp: DateTime<Utc>,
        station_id: impl Into<String>,
        event_type: EventType,
        confidence: f64,
    ) -> Result<Self, VisionError> {
        let station_id = station_id.into();
        if station_id.is_empty() {
            return Err(VisionError::InvalidEvent("station_id is required".into()));
        }
        if !(0.0..=1.0).contains(&confidence) {
            return Err(VisionError::InvalidEvent(
                "confidence must be between 0 and 1 inclusive".into(),
            ));
        }
        Ok(Self {
            event_id: event_id.into(),
            timestamp,
            station_id,
            event_type,
            confidence,
        })
    }

    pub fn event_id(&self) -> &str {
        &self.event_id
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn station_id(&self) -> &str {
        &self.station_id
    }

    pub fn event_type(&self) -> EventType {
        self.event_type
    }

    pub fn confidence(&self) -> f64 {
        self.confidence
    }
}

/// Mirrors the on-wire shape of `Event` so `Deserialize` can run full
/// construction validation instead of trusting the bytes on disk.
#[derive(Deserialize)]
struct RawEvent {
    event_id: String,
    timestamp: DateTime<Utc>,
    station_id: String,
    event_type: EventType,
    confidence: f64,
}

impl<'de> Deserialize<'de> for Event {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = RawEvent::deserialize(deserializer)?;
        Event::with_id(raw.event_id, raw.timestamp, raw.station_id, raw.event_type, raw.confidence)
            .map_err(serde::de::Error::custom)
    }
}

// ── Lease ──────────────────────────────────────────────────────────────────────

/// Signed offline-operation token. `vision-types` holds only the record shape;
/// signing and verification live in `edge-pipeline::lease` where the HMAC
/// secret is available.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lease {
    pub lease_id: String,
    pub issued_at: DateTime<Utc>,
    pub duration_hours: u32,
    pub token: String,
}

impl Lease {
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.issued_at + ChronoDuration::hours(self.duration_hours as i64)
    }

    pub fn is_valid_at(&self, ts: DateTime<Utc>) -> bool {
        ts <= self.expires_at()
    }
}
