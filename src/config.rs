use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::ingest::SourceConfig;
use crate::log::DEFAULT_LOG_PATH;
use crate::occupancy::DEFAULT_THRESHOLD;
use crate::snapshot::{SnapshotPolicy, DEFAULT_ALERT_INTERVAL, DEFAULT_PERIODIC_INTERVAL, DEFAULT_SNAPSHOT_DIR};
use crate::summary::DEFAULT_CHART_PATH;
use crate::zone::{Rect, Zone, ZoneMap};

const DEFAULT_SOURCE_URL: &str = "stub://camera0";
const DEFAULT_SOURCE_FPS: u32 = 10;
const DEFAULT_SOURCE_WIDTH: u32 = 640;
const DEFAULT_SOURCE_HEIGHT: u32 = 480;
const DEFAULT_DETECTOR: &str = "stub";
const DEFAULT_MODEL_INPUT: u32 = 640;

pub const KNOWN_DETECTORS: &[&str] = &["stub", "tract"];

#[derive(Debug, Deserialize, Default)]
struct MonitorConfigFile {
    threshold: Option<u32>,
    zones: Option<Vec<ZoneConfigFile>>,
    source: Option<SourceConfigFile>,
    detector: Option<DetectorConfigFile>,
    snapshots: Option<SnapshotConfigFile>,
    output: Option<OutputConfigFile>,
    max_frames: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct ZoneConfigFile {
    name: String,
    /// `[x1, y1, x2, y2]`
    rect: [f32; 4],
}

#[derive(Debug, Deserialize, Default)]
struct SourceConfigFile {
    url: Option<String>,
    target_fps: Option<u32>,
    width: Option<u32>,
    height: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct DetectorConfigFile {
    backend: Option<String>,
    model_path: Option<PathBuf>,
    input_size: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct SnapshotConfigFile {
    dir: Option<PathBuf>,
    periodic_interval: Option<u64>,
    alert_interval: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
struct OutputConfigFile {
    log_path: Option<PathBuf>,
    chart_path: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub threshold: u32,
    pub zones: ZoneMap,
    pub source: SourceConfig,
    pub detector: DetectorSettings,
    pub snapshots: SnapshotPolicy,
    pub snapshot_dir: PathBuf,
    pub log_path: PathBuf,
    pub chart_path: PathBuf,
    pub max_frames: Option<u64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DetectorSettings {
    pub backend: String,
    pub model_path: Option<PathBuf>,
    pub input_size: u32,
}

impl Default for DetectorSettings {
    fn default() -> Self {
        Self {
            backend: DEFAULT_DETECTOR.to_string(),
            model_path: None,
            input_size: DEFAULT_MODEL_INPUT,
        }
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            zones: ZoneMap::default(),
            source: SourceConfig {
                url: DEFAULT_SOURCE_URL.to_string(),
                target_fps: DEFAULT_SOURCE_FPS,
                width: DEFAULT_SOURCE_WIDTH,
                height: DEFAULT_SOURCE_HEIGHT,
            },
            detector: DetectorSettings::default(),
            snapshots: SnapshotPolicy::default(),
            snapshot_dir: PathBuf::from(DEFAULT_SNAPSHOT_DIR),
            log_path: PathBuf::from(DEFAULT_LOG_PATH),
            chart_path: PathBuf::from(DEFAULT_CHART_PATH),
            max_frames: None,
        }
    }
}

impl MonitorConfig {
    /// Defaults, then the file named by `ROOMSENSE_CONFIG`, then env overrides.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("ROOMSENSE_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) if !path.trim().is_empty() => Some(read_config_file(Path::new(path))?),
            _ => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default())?;
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load a specific file, ignoring `ROOMSENSE_CONFIG` but honoring env overrides.
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut cfg = Self::from_file(read_config_file(path)?)?;
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: MonitorConfigFile) -> Result<Self> {
        let defaults = Self::default();

        let zones = match file.zones {
            Some(zones) => ZoneMap::new(
                zones
                    .into_iter()
                    .map(|zone| {
                        let [x1, y1, x2, y2] = zone.rect;
                        Zone::new(&zone.name, Rect::new(x1, y1, x2, y2))
                    })
                    .collect(),
            )?,
            None => defaults.zones,
        };

        let source_file = file.source.unwrap_or_default();
        let source = SourceConfig {
            url: source_file.url.unwrap_or(defaults.source.url),
            target_fps: source_file.target_fps.unwrap_or(defaults.source.target_fps),
            width: source_file.width.unwrap_or(defaults.source.width),
            height: source_file.height.unwrap_or(defaults.source.height),
        };

        let detector_file = file.detector.unwrap_or_default();
        let detector = DetectorSettings {
            backend: detector_file
                .backend
                .unwrap_or(defaults.detector.backend),
            model_path: detector_file.model_path,
            input_size: detector_file
                .input_size
                .unwrap_or(defaults.detector.input_size),
        };

        let snapshot_file = file.snapshots.unwrap_or_default();
        let snapshots = SnapshotPolicy::new(
            snapshot_file
                .periodic_interval
                .unwrap_or(DEFAULT_PERIODIC_INTERVAL),
            snapshot_file
                .alert_interval
                .unwrap_or(DEFAULT_ALERT_INTERVAL),
        )?;

        let output = file.output.unwrap_or_default();

        Ok(Self {
            threshold: file.threshold.unwrap_or(defaults.threshold),
            zones,
            source,
            detector,
            snapshots,
            snapshot_dir: snapshot_file.dir.unwrap_or(defaults.snapshot_dir),
            log_path: output.log_path.unwrap_or(defaults.log_path),
            chart_path: output.chart_path.unwrap_or(defaults.chart_path),
            max_frames: file.max_frames,
        })
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(url) = std::env::var("ROOMSENSE_SOURCE") {
            if !url.trim().is_empty() {
                self.source.url = url;
            }
        }
        if let Ok(threshold) = std::env::var("ROOMSENSE_THRESHOLD") {
            self.threshold = threshold
                .trim()
                .parse()
                .map_err(|_| anyhow!("ROOMSENSE_THRESHOLD must be a non-negative integer"))?;
        }
        if let Ok(dir) = std::env::var("ROOMSENSE_SNAPSHOT_DIR") {
            if !dir.trim().is_empty() {
                self.snapshot_dir = PathBuf::from(dir);
            }
        }
        if let Ok(path) = std::env::var("ROOMSENSE_LOG_PATH") {
            if !path.trim().is_empty() {
                self.log_path = PathBuf::from(path);
            }
        }
        if let Ok(path) = std::env::var("ROOMSENSE_CHART_PATH") {
            if !path.trim().is_empty() {
                self.chart_path = PathBuf::from(path);
            }
        }
        if let Ok(frames) = std::env::var("ROOMSENSE_MAX_FRAMES") {
            let frames: u64 = frames
                .trim()
                .parse()
                .map_err(|_| anyhow!("ROOMSENSE_MAX_FRAMES must be an integer number of frames"))?;
            self.max_frames = Some(frames);
        }
        Ok(())
    }

    /// Check cross-field constraints. Called after every override layer.
    pub fn validate(&self) -> Result<()> {
        if !KNOWN_DETECTORS.contains(&self.detector.backend.as_str()) {
            return Err(anyhow!(
                "unknown detector backend '{}' (expected one of {:?})",
                self.detector.backend,
                KNOWN_DETECTORS
            ));
        }
        if self.detector.backend == "tract" && self.detector.model_path.is_none() {
            return Err(anyhow!("detector backend 'tract' requires a model_path"));
        }
        if self.detector.input_size == 0 {
            return Err(anyhow!("detector input_size must be greater than zero"));
        }
        if self.max_frames == Some(0) {
            return Err(anyhow!("max_frames must be greater than zero when set"));
        }
        Ok(())
    }
}

fn read_config_file(path: &Path) -> Result<MonitorConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let is_toml = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
    let cfg = if is_toml {
        toml::from_str(&raw).map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    } else {
        serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    };
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_yields_defaults() {
        let cfg = MonitorConfig::from_file(MonitorConfigFile::default()).unwrap();
        assert_eq!(cfg.threshold, 5);
        assert_eq!(cfg.zones, ZoneMap::default());
        assert_eq!(cfg.snapshots, SnapshotPolicy::new(50, 10).unwrap());
        assert_eq!(cfg.snapshot_dir, PathBuf::from("snapshots"));
        assert_eq!(cfg.log_path, PathBuf::from("live_tracking_zone_log.csv"));
        assert_eq!(cfg.source.url, "stub://camera0");
        assert_eq!(cfg.detector.backend, "stub");
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn zones_keep_file_order() {
        let file: MonitorConfigFile = serde_json::from_str(
            r#"{"zones": [
                {"name": "queue", "rect": [0, 0, 100, 100]},
                {"name": "counter", "rect": [50, 50, 200, 200]}
            ]}"#,
        )
        .unwrap();
        let cfg = MonitorConfig::from_file(file).unwrap();
        let names: Vec<&str> = cfg.zones.names().collect();
        assert_eq!(names, vec!["queue", "counter"]);
    }

    #[test]
    fn rejects_bad_values() {
        let file: MonitorConfigFile =
            serde_json::from_str(r#"{"snapshots": {"alert_interval": 0}}"#).unwrap();
        assert!(MonitorConfig::from_file(file).is_err());

        let file: MonitorConfigFile =
            serde_json::from_str(r#"{"zones": [{"name": "unknown", "rect": [0, 0, 1, 1]}]}"#)
                .unwrap();
        assert!(MonitorConfig::from_file(file).is_err());

        let file: MonitorConfigFile =
            serde_json::from_str(r#"{"detector": {"backend": "tract"}}"#).unwrap();
        let cfg = MonitorConfig::from_file(file).unwrap();
        assert!(cfg.validate().is_err());

        let file: MonitorConfigFile =
            serde_json::from_str(r#"{"detector": {"backend": "yolo9000"}}"#).unwrap();
        let cfg = MonitorConfig::from_file(file).unwrap();
        assert!(cfg.validate().is_err());
    }
}
