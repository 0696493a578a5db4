//! The monitoring loop.
//!
//! One iteration per frame, strictly sequential:
//! acquire frame -> detect people -> assign zones -> alert check ->
//! snapshot (when due) -> append log record.
//!
//! All state carried between iterations lives in `Monitor`: the frame
//! counter and the occupancy log. A frame acquisition error ends the run
//! normally; every other error is returned to the caller.

use anyhow::{anyhow, Context, Result};
use chrono::{Local, NaiveDateTime, Timelike};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::annotate::annotate;
use crate::config::MonitorConfig;
use crate::detect::PersonDetector;
use crate::frame::Frame;
use crate::ingest::VideoSource;
use crate::log::OccupancyLog;
use crate::occupancy::{aggregate_frame, CapacityAlert, FrameRecord};
use crate::snapshot::{SnapshotPolicy, SnapshotWriter};
use crate::zone::ZoneMap;

const HEALTH_LOG_INTERVAL: Duration = Duration::from_secs(5);

/// Cooperative stop flag checked once per loop iteration.
#[derive(Clone, Debug, Default)]
pub struct StopSignal {
    stopped: Arc<AtomicBool>,
}

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stop signal wired to Ctrl-C.
    pub fn ctrlc() -> Result<Self> {
        let signal = Self::new();
        let handle = signal.clone();
        ctrlc::set_handler(move || handle.trigger())
            .map_err(|e| anyhow!("error setting Ctrl-C handler: {}", e))?;
        Ok(signal)
    }

    pub fn trigger(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

/// What happened to one frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FrameOutcome {
    pub frame_index: u64,
    pub total_count: u32,
    pub over_capacity: bool,
    pub snapshots: Vec<PathBuf>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunEnd {
    /// The stop signal was raised.
    Stopped,
    /// The configured frame limit was reached.
    FrameLimit,
    /// The source could not deliver another frame.
    SourceEnded,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunReport {
    pub frames: u64,
    pub alert_frames: u64,
    pub snapshots: u64,
    pub end: RunEnd,
}

pub struct Monitor<D: PersonDetector> {
    detector: D,
    zones: ZoneMap,
    alert: CapacityAlert,
    policy: SnapshotPolicy,
    snapshots: SnapshotWriter,
    max_frames: Option<u64>,
    frame_counter: u64,
    alert_frames: u64,
    log: OccupancyLog,
}

impl<D: PersonDetector> Monitor<D> {
    /// Build a monitor. Creates the snapshot directory if needed.
    pub fn new(config: &MonitorConfig, detector: D) -> Result<Self> {
        Ok(Self {
            detector,
            zones: config.zones.clone(),
            alert: CapacityAlert::new(config.threshold),
            policy: config.snapshots,
            snapshots: SnapshotWriter::new(&config.snapshot_dir)?,
            max_frames: config.max_frames,
            frame_counter: 0,
            alert_frames: 0,
            log: OccupancyLog::new(),
        })
    }

    pub fn frame_counter(&self) -> u64 {
        self.frame_counter
    }

    pub fn log(&self) -> &OccupancyLog {
        &self.log
    }

    /// Hand the accumulated log to the caller for post-run output.
    pub fn into_log(self) -> OccupancyLog {
        self.log
    }

    /// Process one frame captured at `timestamp`.
    pub fn process_frame(&mut self, frame: &Frame, timestamp: NaiveDateTime) -> Result<FrameOutcome> {
        let frame_index = self.frame_counter;
        let detections = self
            .detector
            .detect(frame)
            .with_context(|| format!("detector '{}' failed on frame {}", self.detector.name(), frame_index))?;

        let counts = aggregate_frame(&self.zones, &detections);
        let total_count = counts.total_count;
        let over_capacity = self.alert.over_capacity(total_count);
        if over_capacity {
            self.alert_frames += 1;
            log::warn!(
                "ALERT: over capacity on frame {}: {} people (threshold {})",
                frame_index,
                total_count,
                self.alert.threshold
            );
        }
        log::debug!(
            "frame {}: {} people, zones={}",
            frame_index,
            total_count,
            serde_json::to_string(&counts.zone_counts)?
        );

        let due = self.policy.due(frame_index, over_capacity);
        let mut snapshots = Vec::with_capacity(due.len());
        if !due.is_empty() {
            let image = annotate(frame, &self.zones, &detections, over_capacity)?;
            for kind in due {
                snapshots.push(self.snapshots.write(kind, frame_index, &image)?);
            }
        }

        self.log.append(FrameRecord::new(timestamp, counts));
        self.frame_counter += 1;

        Ok(FrameOutcome {
            frame_index,
            total_count,
            over_capacity,
            snapshots,
        })
    }

    /// Run until the stop signal, the frame limit, or the end of the source.
    pub fn run(&mut self, source: &mut VideoSource, stop: &StopSignal) -> Result<RunReport> {
        self.detector.warm_up()?;
        let mut last_health_log = Instant::now();

        let end = loop {
            if stop.is_stopped() {
                log::info!("stop requested, ending monitoring");
                break RunEnd::Stopped;
            }
            if self.max_frames.is_some_and(|max| self.frame_counter >= max) {
                log::info!("frame limit reached ({} frames)", self.frame_counter);
                break RunEnd::FrameLimit;
            }

            let frame = match source.next_frame() {
                Ok(frame) => frame,
                Err(e) => {
                    log::warn!("frame acquisition failed, ending monitoring: {:#}", e);
                    break RunEnd::SourceEnded;
                }
            };

            self.process_frame(&frame, now_to_second())?;

            if last_health_log.elapsed() >= HEALTH_LOG_INTERVAL {
                let stats = source.stats();
                log::info!(
                    "source health={} frames={} url={} logged={}",
                    source.is_healthy(),
                    stats.frames_captured,
                    stats.url,
                    self.log.len()
                );
                last_health_log = Instant::now();
            }
        };

        Ok(RunReport {
            frames: self.frame_counter,
            alert_frames: self.alert_frames,
            snapshots: self.snapshots.written(),
            end,
        })
    }
}

/// Local wall-clock time truncated to whole seconds, the log's resolution.
fn now_to_second() -> NaiveDateTime {
    let now = Local::now().naive_local();
    now.with_nanosecond(0).unwrap_or(now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::StubBackend;
    use chrono::NaiveDate;

    fn config(dir: &std::path::Path) -> MonitorConfig {
        MonitorConfig {
            snapshot_dir: dir.to_path_buf(),
            ..MonitorConfig::default()
        }
    }

    fn ts(second: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, 1)
            .unwrap()
            .and_hms_opt(12, 0, second)
            .unwrap()
    }

    #[test]
    fn process_frame_counts_and_alerts() {
        let dir = tempfile::tempdir().unwrap();
        let detector = StubBackend::with_counts(&[3, 7], 640, 480);
        let mut monitor = Monitor::new(&config(dir.path()), detector).unwrap();

        let first = monitor.process_frame(&Frame::blank(0, 640, 480), ts(0)).unwrap();
        assert_eq!(first.frame_index, 0);
        assert_eq!(first.total_count, 3);
        assert!(!first.over_capacity);
        // frame 0 is always a periodic snapshot
        assert_eq!(first.snapshots, vec![dir.path().join("frame_0.png")]);

        let second = monitor.process_frame(&Frame::blank(1, 640, 480), ts(1)).unwrap();
        assert!(second.over_capacity);
        assert!(second.snapshots.is_empty());

        assert_eq!(monitor.frame_counter(), 2);
        assert_eq!(monitor.log().len(), 2);
        assert_eq!(monitor.log().records()[1].timestamp, ts(1));
    }

    #[test]
    fn stop_signal_ends_run_before_first_frame() {
        let dir = tempfile::tempdir().unwrap();
        let mut monitor = Monitor::new(&config(dir.path()), StubBackend::default()).unwrap();
        let mut source = VideoSource::new(crate::ingest::SourceConfig {
            url: "stub://test".to_string(),
            width: 64,
            height: 48,
            ..Default::default()
        })
        .unwrap();
        let stop = StopSignal::new();
        stop.trigger();
        let report = monitor.run(&mut source, &stop).unwrap();
        assert_eq!(report.end, RunEnd::Stopped);
        assert_eq!(report.frames, 0);
        assert!(monitor.log().is_empty());
    }

    #[test]
    fn detector_errors_propagate() {
        struct Broken;
        impl PersonDetector for Broken {
            fn name(&self) -> &'static str {
                "broken"
            }
            fn detect(&mut self, _frame: &Frame) -> Result<Vec<crate::detect::Detection>> {
                Err(anyhow!("model crashed"))
            }
        }

        let dir = tempfile::tempdir().unwrap();
        let mut monitor = Monitor::new(&config(dir.path()), Broken).unwrap();
        let err = monitor
            .process_frame(&Frame::blank(0, 8, 8), ts(0))
            .unwrap_err();
        assert!(format!("{:#}", err).contains("model crashed"));
        assert!(monitor.log().is_empty());
    }
}
