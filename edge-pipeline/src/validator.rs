//! # validator
//!
//! Per-event sanity checks independent of the append-only scan: monotonic
//! timestamps within a station's own history, and bounded wall-clock skew
//! against the validator's notion of "now". Returns human-readable problem
//! strings rather than failing hard — a host decides whether a flagged
//! event still gets stored.

use std::collections::HashMap;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use vision_types::Event;

const DEFAULT_MAX_CLOCK_SKEW_SECONDS: i64 = 5;

/// Stateful validator tracking the last-seen timestamp per station.
pub struct EventValidator {
    max_clock_skew_seconds: i64,
    last_timestamp_by_station: HashMap<String, DateTime<Utc>>,
}

impl Default for EventValidator {
    fn default() -> Self {
        Self {
            max_clock_skew_seconds: DEFAULT_MAX_CLOCK_SKEW_SECONDS,
            last_timestamp_by_station: HashMap::new(),
        }
    }
}

impl EventValidator {
    pub fn with_max_clock_skew_seconds(max_clock_skew_seconds: i64) -> Self {
        Self { max_clock_skew_seconds, last_timestamp_by_station: HashMap::new() }
    }

    /// Validate `event` against `now`, recording its timestamp for the next
    /// call on the same station. Returns a list of problems found, empty
    /// when the event is clean.
    pub fn validate(&mut self, event: &Event, now: DateTime<Utc>) -> Vec<String> {
        let mut problems = Vec::new();

        let skew = (event.timestamp() - now).abs();
        if skew > ChronoDuration::seconds(self.max_clock_skew_seconds) {
            problems.push(format!(
                "event timestamp {} is skewed from now {} by more than {}s",
                event.timestamp(),
                now,
                self.max_clock_skew_seconds
            ));
        }

        if let Some(&last_timestamp) = self.last_timestamp_by_station.get(event.station_id()) {
            if event.timestamp() <= last_timestamp {
                problems.push(format!(
                    "event timestamp {} is non-increasing relative to station {}'s last seen timestamp {}",
                    event.timestamp(),
                    event.station_id(),
                    last_timestamp
                ));
            }
        }

        self.last_timestamp_by_station
            .insert(event.station_id().to_string(), event.timestamp());

        problems
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_time() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2024-01-01T00:00:00Z").unwrap().with_timezone(&Utc)
    }

    #[test]
    fn clean_event_within_skew_has_no_problems() {
        let mut validator = EventValidator::default();
        let event = Event::new_cut("station-1", 0.9, base_time()).unwrap();
        assert!(validator.validate(&event, base_time()).is_empty());
    }

    #[test]
    fn event_outside_skew_window_is_flagged() {
        let mut validator = EventValidator::default();
        let event = Event::new_cut("station-1", 0.9, base_time()).unwrap();
        let now = base_time() + ChronoDuration::seconds(10);
        let problems = validator.validate(&event, now);
        assert_eq!(problems.len(), 1);
        assert!(problems[0].contains("skewed"));
    }

    #[test]
    fn event_at_exact_skew_boundary_is_clean() {
        let mut validator = EventValidator::with_max_clock_skew_seconds(5);
        let event = Event::new_cut("station-1", 0.9, base_time()).unwrap();
        let now = base_time() + ChronoDuration::seconds(5);
        assert!(validator.validate(&event, now).is_empty());
    }

    #[test]
    fn non_monotonic_timestamp_for_same_station_is_flagged() {
        let mut validator = EventValidator::default();
        let first = Event::new_cut("station-1", 0.9, base_time()).unwrap();
        let second = Event::new_cut("station-1", 0.9, base_time() - ChronoDuration::seconds(1)).unwrap();
        assert!(validator.validate(&first, base_time()).is_empty());
        let problems = validator.validate(&second, base_time());
        assert_eq!(problems.len(), 1);
        assert!(problems[0].contains("non-increasing"));
    }

    #[test]
    fn equal_timestamp_for_same_station_is_flagged() {
        let mut validator = EventValidator::default();
        let first = Event::new_cut("station-1", 0.9, base_time()).unwrap();
        let second = Event::new_cut("station-1", 0.8, base_time()).unwrap();
        assert!(validator.validate(&first, base_time()).is_empty());
        let problems = validator.validate(&second, base_time());
        assert_eq!(problems.len(), 1);
        assert!(problems[0].contains("non-increasing"));
    }

    #[test]
    fn different_stations_do_not_interfere() {
        let mut validator = EventValidator::default();
        let a = Event::new_cut("station-1", 0.9, base_time()).unwrap();
        let b = Event::new_cut("station-2", 0.9, base_time() - ChronoDuration::seconds(30)).unwrap();
        assert!(validator.validate(&a, base_time()).is_empty());
        // station-2 hasn't been seen before, so an earlier timestamp doesn't trip monotonicity,
        // but it does trip clock skew relative to `now`.
        let problems = validator.validate(&b, base_time());
        assert_eq!(problems.len(), 1);
        assert!(problems[0].contains("skewed"));
    }
}
