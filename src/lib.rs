//! RoomSense zone occupancy monitor.
//!
//! Counts people in a video feed with a pluggable person detector, buckets
//! each detection into the first named zone containing its centroid, flags
//! frames whose head count exceeds a threshold, and keeps a per-frame
//! occupancy log that is written to CSV and summarised when the run ends.
//!
//! # Module Structure
//!
//! - `zone`: rectangles, zone maps and centroid assignment
//! - `occupancy`: per-frame aggregation, capacity alert, frame records
//! - `monitor`: the acquire/detect/assign/snapshot/log loop
//! - `detect`, `ingest`, `frame`: detector backends and frame sources
//! - `log`, `snapshot`, `annotate`, `summary`: output sinks
//! - `text`: bitmap text used by annotation and the chart

pub mod annotate;
pub mod config;
pub mod detect;
pub mod frame;
pub mod ingest;
pub mod log;
pub mod monitor;
pub mod occupancy;
pub mod snapshot;
pub mod summary;
pub mod text;
pub mod ui;
pub mod zone;

pub use config::{DetectorSettings, MonitorConfig};
pub use detect::{Detection, PersonDetector, StubBackend};
#[cfg(feature = "backend-tract")]
pub use detect::TractBackend;
pub use frame::Frame;
pub use ingest::{SourceConfig, VideoSource};
pub use log::{read_csv, write_csv, OccupancyLog};
pub use monitor::{FrameOutcome, Monitor, RunEnd, RunReport, StopSignal};
pub use occupancy::{aggregate_frame, CapacityAlert, FrameCounts, FrameRecord, ZoneCounts};
pub use snapshot::{SnapshotKind, SnapshotPolicy, SnapshotWriter};
pub use summary::{render_chart, CountStats};
pub use zone::{Rect, Zone, ZoneMap, UNKNOWN_ZONE};
