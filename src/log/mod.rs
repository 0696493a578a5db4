//! Occupancy log: append-only frame records and the CSV log file.
//!
//! Columns: `time` (`YYYY-MM-DD HH:MM:SS`), `count`, `zones` (JSON object).
//! The file is rewritten from scratch on every save.

use anyhow::{anyhow, Context, Result};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::occupancy::{FrameRecord, ZoneCounts};

pub const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
pub const DEFAULT_LOG_PATH: &str = "live_tracking_zone_log.csv";

/// Append-only, chronologically ordered sequence of frame records.
#[derive(Clone, Debug, Default)]
pub struct OccupancyLog {
    records: Vec<FrameRecord>,
}

impl OccupancyLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, record: FrameRecord) {
        self.records.push(record);
    }

    pub fn records(&self) -> &[FrameRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn last(&self) -> Option<&FrameRecord> {
        self.records.last()
    }

    /// Write every record to `path`, replacing any previous file.
    pub fn save_csv(&self, path: &Path) -> Result<()> {
        write_csv(path, &self.records)
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct CsvRow {
    time: String,
    count: u32,
    zones: String,
}

pub fn write_csv(path: &Path, records: &[FrameRecord]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("failed to create log file {}", path.display()))?;
    if records.is_empty() {
        writer.write_record(["time", "count", "zones"])?;
    }
    for record in records {
        let zones = serde_json::to_string(&record.zone_counts)?;
        writer.serialize(CsvRow {
            time: record.timestamp.format(TIME_FORMAT).to_string(),
            count: record.total_count,
            zones,
        })?;
    }
    writer
        .flush()
        .with_context(|| format!("failed to write log file {}", path.display()))?;
    Ok(())
}

/// Load a log written by `write_csv`, parsing `time` back into a datetime.
pub fn read_csv(path: &Path) -> Result<Vec<FrameRecord>> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("failed to open log file {}", path.display()))?;
    let mut records = Vec::new();
    for (line, row) in reader.deserialize::<CsvRow>().enumerate() {
        let row = row.with_context(|| format!("invalid log row {} in {}", line + 1, path.display()))?;
        let timestamp = NaiveDateTime::parse_from_str(&row.time, TIME_FORMAT)
            .map_err(|e| anyhow!("invalid time '{}' in log row {}: {}", row.time, line + 1, e))?;
        let zone_counts: ZoneCounts = serde_json::from_str(&row.zones)
            .map_err(|e| anyhow!("invalid zones in log row {}: {}", line + 1, e))?;
        records.push(FrameRecord {
            timestamp,
            total_count: row.count,
            zone_counts,
        });
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::Detection;
    use crate::occupancy::aggregate_frame;
    use crate::zone::ZoneMap;
    use chrono::NaiveDate;

    fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 14)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    #[test]
    fn log_keeps_append_order() {
        let zones = ZoneMap::default();
        let mut log = OccupancyLog::new();
        for (i, n) in [3usize, 1, 4].iter().enumerate() {
            let detections = vec![Detection::new(10.0, 10.0, 20.0, 20.0, 0.9); *n];
            log.append(FrameRecord::new(
                at(9, 0, i as u32),
                aggregate_frame(&zones, &detections),
            ));
        }
        let counts: Vec<u32> = log.records().iter().map(|r| r.total_count).collect();
        assert_eq!(counts, vec![3, 1, 4]);
        assert_eq!(log.last().unwrap().timestamp, at(9, 0, 2));
    }

    #[test]
    fn csv_has_expected_header_and_zone_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.csv");
        let zones = ZoneMap::default();
        let detections = vec![Detection::new(400.0, 10.0, 420.0, 50.0, 0.9)];
        let mut log = OccupancyLog::new();
        log.append(FrameRecord::new(at(13, 5, 9), aggregate_frame(&zones, &detections)));
        log.save_csv(&path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("time,count,zones"));
        assert_eq!(
            lines.next(),
            Some(r#"2024-03-14 13:05:09,1,"{""entry"":0,""help_desk"":1,""unknown"":0}""#)
        );
    }

    #[test]
    fn csv_reads_back_counts_and_timestamps() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.csv");
        let zones = ZoneMap::default();
        let mut log = OccupancyLog::new();
        log.append(FrameRecord::new(at(8, 0, 0), aggregate_frame(&zones, &[])));
        log.append(FrameRecord::new(
            at(8, 0, 1),
            aggregate_frame(&zones, &[Detection::new(1.0, 1.0, 5.0, 5.0, 0.5)]),
        ));
        log.save_csv(&path).unwrap();

        let records = read_csv(&path).unwrap();
        assert_eq!(records, log.records());
    }

    #[test]
    fn empty_log_still_writes_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.csv");
        OccupancyLog::new().save_csv(&path).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap().trim(), "time,count,zones");
        assert!(read_csv(&path).unwrap().is_empty());
    }
}
