//! roomsense - live zone occupancy monitor
//!
//! This binary:
//! 1. Loads the monitor configuration (file, env, command line)
//! 2. Opens the video source and the person detector
//! 3. Counts people per zone on every frame until Ctrl-C or end of stream
//! 4. Writes the occupancy log CSV
//! 5. Reads the log back, renders the occupancy chart, prints statistics

use anyhow::{anyhow, Result};
use clap::Parser;
use std::path::PathBuf;

use roomsense::ui::{Ui, UiMode};
use roomsense::{
    read_csv, render_chart, CountStats, Monitor, MonitorConfig, OccupancyLog, PersonDetector,
    StopSignal, StubBackend, VideoSource,
};

/// Peak crowd size for the stub detector, chosen to cross the default threshold.
const STUB_CROWD_PEAK: usize = 8;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Config file (JSON, or TOML with a .toml extension).
    #[arg(long, env = "ROOMSENSE_CONFIG")]
    config: Option<PathBuf>,
    /// Video source: stub://<name>[?frames=N], a camera (0, /dev/video0,
    /// v4l2://...), a file path, or an ffmpeg URL.
    #[arg(long)]
    source: Option<String>,
    /// Detector backend (stub or tract).
    #[arg(long, env = "ROOMSENSE_DETECTOR")]
    detector: Option<String>,
    /// ONNX model for the tract backend.
    #[arg(long, env = "ROOMSENSE_MODEL")]
    model: Option<PathBuf>,
    /// Alert when more than this many people are in frame.
    #[arg(long)]
    threshold: Option<u32>,
    /// Stop after this many frames.
    #[arg(long)]
    max_frames: Option<u64>,
    /// Occupancy log CSV path.
    #[arg(long)]
    log: Option<PathBuf>,
    /// Occupancy chart PNG path.
    #[arg(long)]
    chart: Option<PathBuf>,
    /// Snapshot directory.
    #[arg(long)]
    snapshots: Option<PathBuf>,
    /// Progress output style.
    #[arg(long, env = "ROOMSENSE_UI", value_enum, default_value_t = UiMode::Auto)]
    ui: UiMode,
    /// Skip the chart and statistics after saving the log.
    #[arg(long)]
    no_summary: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let cfg = resolve_config(&args)?;
    let ui = Ui::for_stderr(args.ui);

    log::info!(
        "roomsense {} starting: source={} detector={} threshold={} zones={}",
        env!("CARGO_PKG_VERSION"),
        cfg.source.url,
        cfg.detector.backend,
        cfg.threshold,
        cfg.zones.names().collect::<Vec<_>>().join(",")
    );
    log::info!("press Ctrl-C to stop monitoring");

    let stop = StopSignal::ctrlc()?;
    let occupancy = match cfg.detector.backend.as_str() {
        "stub" => {
            let detector =
                StubBackend::crowd_wave(STUB_CROWD_PEAK, cfg.source.width, cfg.source.height);
            monitor(&cfg, detector, &stop)?
        }
        #[cfg(feature = "backend-tract")]
        "tract" => {
            let model_path = cfg
                .detector
                .model_path
                .as_ref()
                .ok_or_else(|| anyhow!("tract backend requires --model"))?;
            let detector = roomsense::TractBackend::new(
                model_path,
                cfg.detector.input_size,
                cfg.detector.input_size,
            )?;
            monitor(&cfg, detector, &stop)?
        }
        other => {
            return Err(anyhow!(
                "detector backend '{}' is not available in this build",
                other
            ))
        }
    };

    {
        let _stage = ui.stage("save occupancy log");
        occupancy.save_csv(&cfg.log_path)?;
    }
    log::info!(
        "log saved as {} ({} records)",
        cfg.log_path.display(),
        occupancy.len()
    );

    if args.no_summary {
        return Ok(());
    }

    let records = {
        let _stage = ui.stage("load occupancy log");
        read_csv(&cfg.log_path)?
    };
    {
        let _stage = ui.stage("render occupancy chart");
        render_chart(&cfg.chart_path, &records, Some(cfg.threshold))?;
    }
    log::info!("chart saved as {}", cfg.chart_path.display());

    println!("\nSummary statistics:");
    println!("{}", CountStats::from_records(&records));
    Ok(())
}

fn resolve_config(args: &Args) -> Result<MonitorConfig> {
    let mut cfg = match &args.config {
        Some(path) => MonitorConfig::load_from(path)?,
        None => MonitorConfig::load()?,
    };
    if let Some(source) = &args.source {
        cfg.source.url = source.clone();
    }
    if let Some(detector) = &args.detector {
        cfg.detector.backend = detector.clone();
    }
    if let Some(model) = &args.model {
        cfg.detector.model_path = Some(model.clone());
    }
    if let Some(threshold) = args.threshold {
        cfg.threshold = threshold;
    }
    if let Some(max_frames) = args.max_frames {
        cfg.max_frames = Some(max_frames);
    }
    if let Some(log) = &args.log {
        cfg.log_path = log.clone();
    }
    if let Some(chart) = &args.chart {
        cfg.chart_path = chart.clone();
    }
    if let Some(dir) = &args.snapshots {
        cfg.snapshot_dir = dir.clone();
    }
    cfg.validate()?;
    Ok(cfg)
}

/// Run the monitoring loop to completion and return the accumulated log.
fn monitor<D: PersonDetector>(
    cfg: &MonitorConfig,
    detector: D,
    stop: &StopSignal,
) -> Result<OccupancyLog> {
    let mut source = VideoSource::new(cfg.source.clone())?;
    source.connect()?;

    let mut monitor = Monitor::new(cfg, detector)?;
    let report = monitor.run(&mut source, stop)?;
    drop(source);

    log::info!(
        "monitoring ended ({:?}): {} frames, {} over capacity, {} snapshots in {}",
        report.end,
        report.frames,
        report.alert_frames,
        report.snapshots,
        cfg.snapshot_dir.display()
    );
    Ok(monitor.into_log())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Args::command().debug_assert();
    }

    #[test]
    fn config_path_and_backend_can_come_from_env() {
        let command = Args::command();
        let env_of = |id: &str| {
            command
                .get_arguments()
                .find(|arg| arg.get_id() == id)
                .and_then(|arg| arg.get_env())
                .map(|env| env.to_string_lossy().into_owned())
        };
        assert_eq!(env_of("config").as_deref(), Some("ROOMSENSE_CONFIG"));
        assert_eq!(env_of("detector").as_deref(), Some("ROOMSENSE_DETECTOR"));
        assert_eq!(env_of("model").as_deref(), Some("ROOMSENSE_MODEL"));
        assert_eq!(env_of("ui").as_deref(), Some("ROOMSENSE_UI"));
    }

    #[test]
    fn command_line_values_override_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("roomsense.json");
        std::fs::write(&path, r#"{"threshold": 3, "source": {"url": "stub://lobby"}}"#).unwrap();

        let args = Args::try_parse_from([
            "roomsense",
            "--config",
            path.to_str().unwrap(),
            "--threshold",
            "9",
            "--max-frames",
            "20",
        ])
        .unwrap();
        let cfg = resolve_config(&args).unwrap();
        assert_eq!(cfg.threshold, 9);
        assert_eq!(cfg.max_frames, Some(20));
        assert_eq!(cfg.source.url, "stub://lobby");
    }
}
