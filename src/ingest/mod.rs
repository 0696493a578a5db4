//! Frame ingestion sources.
//!
//! - Synthetic source (`stub://` URLs) for tests and demo runs
//! - Local cameras via V4L2 (feature: ingest-v4l2; `v4l2://stub` without it)
//! - Video files, RTSP URLs and capture devices via FFmpeg (feature: ingest-ffmpeg)
//!
//! All sources produce `Frame` instances numbered from 0. A source that
//! cannot deliver another frame returns an error; the monitor treats that
//! as the end of the stream.

#[cfg(feature = "ingest-ffmpeg")]
pub(crate) mod ffmpeg;
pub mod source;
pub(crate) mod v4l2;

pub use source::{SourceConfig, SourceStats, VideoSource};
