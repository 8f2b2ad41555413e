//! # store
//!
//! Append-only on-disk event log. The API surface only ever grows a file —
//! there is no update or delete — and [`scan_for_violations`] is the
//! separate, explicit tool for detecting tampering or misuse after the fact,
//! rather than trying to prevent it at write time.

use std::collections::HashSet;
use std::fs::OpenOptions;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tracing::warn;
use vision_types::{Event, VisionError};

/// JSON-lines event log backed by a single append-only file.
pub struct EventStore {
    path: PathBuf,
}

impl EventStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Append one event as a single JSON line. Never truncates or rewrites
    /// existing content.
    pub fn append(&self, event: &Event) -> Result<(), VisionError> {
        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        let line = serde_json::to_string(event).map_err(|e| VisionError::CorruptLog(e.to_string()))?;
        writeln!(file, "{line}")?;
        Ok(())
    }

    /// Read every event currently on disk, in append order. A line that
    /// fails to parse is a corrupt log, not a skippable record.
    pub fn read_all(&self) -> Result<Vec<Event>, VisionError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let file = std::fs::File::open(&self.path)?;
        let reader = BufReader::new(file);
        let mut events = Vec::new();
        for (line_no, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let event: Event = serde_json::from_str(&line).map_err(|e| {
                VisionError::CorruptLog(format!("line {}: {e}", line_no + 1))
            })?;
            events.push(event);
        }
        Ok(events)
    }

    /// Run the append-only violation scan against this store's own file.
    pub fn verify_append_only(&self) -> Result<Vec<String>, VisionError> {
        scan_for_violations(&self.path)
    }
}

/// Independently re-reads a log file and reports anomalies that an
/// append-only API shouldn't be able to produce on its own: duplicate
/// `event_id`s, non-monotonic per-station timestamps, and corrupt lines.
///
/// This is a detector, not a preventer — it runs after the fact, typically
/// from the `vision-verify` CLI, to catch direct file tampering or a bug
/// that bypassed [`EventStore::append`].
pub fn scan_for_violations(path: impl AsRef<Path>) -> Result<Vec<String>, VisionError> {
    let path = path.as_ref();
    if !path.exists() {
        return Ok(Vec::new());
    }
    let file = std::fs::File::open(path)?;
    let reader = BufReader::new(file);

    let mut violations = Vec::new();
    let mut seen_ids: HashSet<String> = HashSet::new();
    let mut last_timestamp_by_station: std::collections::HashMap<String, DateTime<Utc>> =
        std::collections::HashMap::new();

    for (line_no, line) in reader.lines().enumerate() {
        let record_no = line_no + 1;
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                violations.push(format!("line {record_no}: unreadable: {e}"));
                continue;
            }
        };
        if line.trim().is_empty() {
            continue;
        }
        let event: Event = match serde_json::from_str(&line) {
            Ok(event) => event,
            Err(e) => {
                warn!(record_no, "corrupt event record");
                violations.push(format!("line {record_no}: corrupt record: {e}"));
                continue;
            }
        };

        if !seen_ids.insert(event.event_id().to_string()) {
            violations.push(format!(
                "line {record_no}: duplicate event_id {}",
                event.event_id()
            ));
        }

        if let Some(&last_timestamp) = last_timestamp_by_station.get(event.station_id()) {
            if event.timestamp() <= last_timestamp {
                violations.push(format!(
                    "line {record_no}: station {} timestamp {} is non-increasing relative to previous {}",
                    event.station_id(),
                    event.timestamp(),
                    last_timestamp
                ));
            }
        }
        last_timestamp_by_station.insert(event.station_id().to_string(), event.timestamp());
    }

    Ok(violations)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;
    use std::io::Write as _;

    fn base_time() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2024-01-01T00:00:00Z").unwrap().with_timezone(&Utc)
    }

    #[test]
    fn append_then_read_all_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = EventStore::new(dir.path().join("events.jsonl"));
        let event = Event::new_cut("station-1", 0.9, base_time()).unwrap();
        store.append(&event).unwrap();
        let events = store.read_all().unwrap();
        assert_eq!(events, vec![event]);
    }

    #[test]
    fn read_all_on_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = EventStore::new(dir.path().join("missing.jsonl"));
        assert_eq!(store.read_all().unwrap(), Vec::new());
    }

    #[test]
    fn append_never_truncates_prior_records() {
        let dir = tempfile::tempdir().unwrap();
        let store = EventStore::new(dir.path().join("events.jsonl"));
        let first = Event::new_cut("station-1", 0.9, base_time()).unwrap();
        let second = Event::new_cut("station-1", 0.8, base_time() + ChronoDuration::seconds(1)).unwrap();
        store.append(&first).unwrap();
        store.append(&second).unwrap();
        assert_eq!(store.read_all().unwrap(), vec![first, second]);
    }

    #[test]
    fn scan_reports_no_violations_on_a_clean_log() {
        let dir = tempfile::tempdir().unwrap();
        let store = EventStore::new(dir.path().join("events.jsonl"));
        store.append(&Event::new_cut("station-1", 0.9, base_time()).unwrap()).unwrap();
        store
            .append(&Event::new_cut("station-1", 0.8, base_time() + ChronoDuration::seconds(1)).unwrap())
            .unwrap();
        assert!(store.verify_append_only().unwrap().is_empty());
    }

    #[test]
    fn scan_detects_duplicate_event_ids() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.jsonl");
        let event = Event::with_id(
            "dup-id",
            base_time(),
            "station-1",
            vision_types::EventType::Cut,
            0.9,
        )
        .unwrap();
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "{}", serde_json::to_string(&event).unwrap()).unwrap();
        writeln!(file, "{}", serde_json::to_string(&event).unwrap()).unwrap();
        drop(file);

        let violations = scan_for_violations(&path).unwrap();
        assert_eq!(violations.len(), 1);
        assert!(violations[0].contains("duplicate event_id"));
    }

    #[test]
    fn scan_detects_non_monotonic_station_timestamps() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.jsonl");
        let mut file = std::fs::File::create(&path).unwrap();
        let later = Event::new_cut("station-1", 0.9, base_time() + ChronoDuration::seconds(10)).unwrap();
        let earlier = Event::new_cut("station-1", 0.9, base_time()).unwrap();
        writeln!(file, "{}", serde_json::to_string(&later).unwrap()).unwrap();
        writeln!(file, "{}", serde_json::to_string(&earlier).unwrap()).unwrap();
        drop(file);

        let violations = scan_for_violations(&path).unwrap();
        assert_eq!(violations.len(), 1);
        assert!(violations[0].contains("non-increasing relative to previous"));
    }

    #[test]
    fn scan_detects_equal_timestamps_within_a_station() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.jsonl");
        let mut file = std::fs::File::create(&path).unwrap();
        let first = Event::new_cut("station-1", 0.9, base_time()).unwrap();
        let second = Event::new_cut("station-1", 0.8, base_time()).unwrap();
        writeln!(file, "{}", serde_json::to_string(&first).unwrap()).unwrap();
        writeln!(file, "{}", serde_json::to_string(&second).unwrap()).unwrap();
        drop(file);

        let violations = scan_for_violations(&path).unwrap();
        assert_eq!(violations.len(), 1);
        assert!(violations[0].contains("non-increasing relative to previous"));
    }

    #[test]
    fn scan_on_missing_file_is_clean() {
        let dir = tempfile::tempdir().unwrap();
        let violations = scan_for_violations(dir.path().join("missing.jsonl")).unwrap();
        assert!(violations.is_empty());
    }
}
