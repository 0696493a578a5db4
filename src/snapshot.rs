//! Snapshot cadence and PNG writing.
//!
//! Two independent cadences run on the 0-based frame counter:
//! - periodic: every `periodic_interval` frames, `frame_<n>.png`
//! - alert: every `alert_interval` frames while over capacity, `alert_frame_<n>.png`
//!
//! Both may fire on the same frame.

use anyhow::{anyhow, Context, Result};
use image::RgbImage;
use std::path::{Path, PathBuf};

pub const DEFAULT_PERIODIC_INTERVAL: u64 = 50;
pub const DEFAULT_ALERT_INTERVAL: u64 = 10;
pub const DEFAULT_SNAPSHOT_DIR: &str = "snapshots";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SnapshotKind {
    Periodic,
    Alert,
}

impl SnapshotKind {
    pub fn file_name(&self, frame_index: u64) -> String {
        match self {
            SnapshotKind::Periodic => format!("frame_{}.png", frame_index),
            SnapshotKind::Alert => format!("alert_frame_{}.png", frame_index),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SnapshotPolicy {
    pub periodic_interval: u64,
    pub alert_interval: u64,
}

impl SnapshotPolicy {
    pub fn new(periodic_interval: u64, alert_interval: u64) -> Result<Self> {
        if periodic_interval == 0 || alert_interval == 0 {
            return Err(anyhow!("snapshot intervals must be greater than zero"));
        }
        Ok(Self {
            periodic_interval,
            alert_interval,
        })
    }

    /// Snapshots due for this frame, alert first.
    pub fn due(&self, frame_index: u64, over_capacity: bool) -> Vec<SnapshotKind> {
        let mut due = Vec::with_capacity(2);
        if over_capacity && frame_index % self.alert_interval == 0 {
            due.push(SnapshotKind::Alert);
        }
        if frame_index % self.periodic_interval == 0 {
            due.push(SnapshotKind::Periodic);
        }
        due
    }
}

impl Default for SnapshotPolicy {
    fn default() -> Self {
        Self {
            periodic_interval: DEFAULT_PERIODIC_INTERVAL,
            alert_interval: DEFAULT_ALERT_INTERVAL,
        }
    }
}

/// Writes annotated frames into a snapshot directory.
pub struct SnapshotWriter {
    dir: PathBuf,
    written: u64,
}

impl SnapshotWriter {
    /// Create the writer, creating `dir` if it does not exist.
    pub fn new<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create snapshot dir {}", dir.display()))?;
        Ok(Self { dir, written: 0 })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn written(&self) -> u64 {
        self.written
    }

    pub fn write(&mut self, kind: SnapshotKind, frame_index: u64, image: &RgbImage) -> Result<PathBuf> {
        let path = self.dir.join(kind.file_name(frame_index));
        image
            .save(&path)
            .with_context(|| format!("failed to write snapshot {}", path.display()))?;
        self.written += 1;
        log::debug!("snapshot written: {}", path.display());
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn periodic_fires_on_multiples_including_zero() {
        let policy = SnapshotPolicy::new(50, 10).unwrap();
        let frames: Vec<u64> = (0..120)
            .filter(|&i| policy.due(i, false).contains(&SnapshotKind::Periodic))
            .collect();
        assert_eq!(frames, vec![0, 50, 100]);
    }

    #[test]
    fn alert_requires_over_capacity() {
        let policy = SnapshotPolicy::default();
        assert!(policy.due(10, false).is_empty());
        assert_eq!(policy.due(10, true), vec![SnapshotKind::Alert]);
        assert!(policy.due(11, true).is_empty());
        assert_eq!(
            policy.due(50, true),
            vec![SnapshotKind::Alert, SnapshotKind::Periodic]
        );
    }

    #[test]
    fn zero_interval_is_rejected() {
        assert!(SnapshotPolicy::new(0, 10).is_err());
        assert!(SnapshotPolicy::new(50, 0).is_err());
    }

    #[test]
    fn writer_creates_dir_and_names_files_by_frame() {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("nested").join("snaps");
        let mut writer = SnapshotWriter::new(&dir).unwrap();
        let image = RgbImage::new(4, 4);
        let path = writer.write(SnapshotKind::Alert, 70, &image).unwrap();
        assert_eq!(path, dir.join("alert_frame_70.png"));
        assert!(path.exists());
        writer.write(SnapshotKind::Periodic, 0, &image).unwrap();
        assert!(dir.join("frame_0.png").exists());
        assert_eq!(writer.written(), 2);
    }
}
