use chrono::{NaiveDate, NaiveDateTime};
use std::path::Path;

use roomsense::{
    read_csv, Frame, Monitor, MonitorConfig, RunEnd, SourceConfig, StopSignal, StubBackend,
    VideoSource, UNKNOWN_ZONE,
};

const WIDTH: u32 = 640;
const HEIGHT: u32 = 480;

fn config_in(dir: &Path) -> MonitorConfig {
    MonitorConfig {
        snapshot_dir: dir.join("snapshots"),
        log_path: dir.join("log.csv"),
        chart_path: dir.join("chart.png"),
        ..MonitorConfig::default()
    }
}

fn stub_source(frames: u64) -> VideoSource {
    let mut source = VideoSource::new(SourceConfig {
        url: format!("stub://pipeline?frames={}", frames),
        width: WIDTH,
        height: HEIGHT,
        ..SourceConfig::default()
    })
    .expect("stub source");
    source.connect().expect("connect");
    source
}

fn at(second: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 9, 30)
        .unwrap()
        .and_hms_opt(17, 45, second)
        .unwrap()
}

fn count_files(dir: &Path, prefix: &str) -> usize {
    std::fs::read_dir(dir)
        .expect("snapshot dir")
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_name().to_string_lossy().starts_with(prefix))
        .count()
}

#[test]
fn three_frames_alert_only_above_threshold() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config_in(dir.path());
    let detector = StubBackend::with_counts(&[2, 6, 5], WIDTH, HEIGHT);
    let mut monitor = Monitor::new(&cfg, detector).unwrap();

    let flags: Vec<bool> = (0..3)
        .map(|i| {
            monitor
                .process_frame(&Frame::blank(i, WIDTH, HEIGHT), at(i as u32))
                .unwrap()
                .over_capacity
        })
        .collect();
    assert_eq!(flags, vec![false, true, false]);

    let log = monitor.into_log();
    let counts: Vec<u32> = log.records().iter().map(|r| r.total_count).collect();
    assert_eq!(counts, vec![2, 6, 5]);
    let times: Vec<NaiveDateTime> = log.records().iter().map(|r| r.timestamp).collect();
    assert_eq!(times, vec![at(0), at(1), at(2)]);
    for record in log.records() {
        assert_eq!(record.zone_counts.total(), record.total_count);
        assert!(record.zone_counts.get(UNKNOWN_ZONE).is_some());
    }
}

#[test]
fn snapshot_cadences_over_120_frames() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config_in(dir.path());
    let counts: Vec<usize> = (0..120).map(|i| if i >= 60 { 6 } else { 2 }).collect();
    let detector = StubBackend::with_counts(&counts, WIDTH, HEIGHT);
    let mut monitor = Monitor::new(&cfg, detector).unwrap();
    let mut source = stub_source(120);

    let report = monitor.run(&mut source, &StopSignal::new()).unwrap();

    assert_eq!(report.end, RunEnd::SourceEnded);
    assert_eq!(report.frames, 120);
    assert_eq!(report.alert_frames, 60);
    // periodic: 0, 50, 100; alert: 60, 70, 80, 90, 100, 110
    assert_eq!(count_files(&cfg.snapshot_dir, "frame_"), 3);
    assert_eq!(count_files(&cfg.snapshot_dir, "alert_frame_"), 6);
    assert_eq!(report.snapshots, 9);
    assert!(cfg.snapshot_dir.join("alert_frame_100.png").exists());
    assert!(cfg.snapshot_dir.join("frame_100.png").exists());
    assert!(!cfg.snapshot_dir.join("alert_frame_50.png").exists());
}

#[test]
fn run_stops_at_frame_limit_and_log_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = MonitorConfig {
        max_frames: Some(4),
        ..config_in(dir.path())
    };
    let detector = StubBackend::with_counts(&[1, 3, 7, 0, 9], WIDTH, HEIGHT);
    let mut monitor = Monitor::new(&cfg, detector).unwrap();
    let mut source = stub_source(100);

    let report = monitor.run(&mut source, &StopSignal::new()).unwrap();
    assert_eq!(report.end, RunEnd::FrameLimit);
    assert_eq!(report.frames, 4);
    assert_eq!(report.alert_frames, 1);

    let log = monitor.into_log();
    log.save_csv(&cfg.log_path).unwrap();
    let records = read_csv(&cfg.log_path).unwrap();
    assert_eq!(records, log.records());
    let counts: Vec<u32> = records.iter().map(|r| r.total_count).collect();
    assert_eq!(counts, vec![1, 3, 7, 0]);
}

#[test]
fn source_failure_keeps_accumulated_records() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config_in(dir.path());
    let detector = StubBackend::with_counts(&[4, 4], WIDTH, HEIGHT);
    let mut monitor = Monitor::new(&cfg, detector).unwrap();
    let mut source = stub_source(2);

    let report = monitor.run(&mut source, &StopSignal::new()).unwrap();
    assert_eq!(report.end, RunEnd::SourceEnded);
    assert_eq!(monitor.log().len(), 2);
}
