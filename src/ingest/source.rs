//! Video frame source.
//!
//! `VideoSource` hides which backend produces frames. It is responsible for:
//! - Opening the configured input
//! - Decoding frames to packed RGB24
//! - Numbering frames in capture order
//!
//! `stub://<name>` URLs select a synthetic backend that renders a moving
//! gradient. `stub://<name>?frames=N` ends the synthetic stream after N frames.
//! Camera indices, `/dev/videoN` and `v4l2://` URLs go to the V4L2 backend;
//! everything else is handed to FFmpeg.

use anyhow::{anyhow, Result};
use std::time::Duration;

#[cfg(feature = "ingest-ffmpeg")]
use super::ffmpeg::FfmpegSource;
use super::v4l2::{self, V4l2Source};
use crate::frame::Frame;

/// Longest a single capture or decode call may take before the source
/// reports itself unhealthy: six frame periods, never less than two seconds.
///
/// Only time spent inside the source counts. Time the caller spends between
/// frames (detection, snapshots) is not a stall.
pub(crate) fn stall_grace(target_fps: u32) -> Duration {
    let base_ms = if target_fps == 0 {
        2_000
    } else {
        (1000 / target_fps).saturating_mul(6)
    };
    Duration::from_millis(base_ms.max(2_000) as u64)
}

/// Configuration for a video source.
#[derive(Clone, Debug)]
pub struct SourceConfig {
    /// Input URL: "stub://camera0", a camera ("0", "/dev/video0", "v4l2://..."),
    /// a local file path, or an FFmpeg-readable URL.
    pub url: String,
    /// Nominal frame rate, requested from cameras and used for stall detection.
    pub target_fps: u32,
    /// Frame width (synthetic frames and camera requests).
    pub width: u32,
    /// Frame height (synthetic frames and camera requests).
    pub height: u32,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            url: "stub://camera0".to_string(),
            target_fps: 10,
            width: 640,
            height: 480,
        }
    }
}

pub struct VideoSource {
    backend: SourceBackend,
}

enum SourceBackend {
    Synthetic(SyntheticSource),
    V4l2(V4l2Source),
    #[cfg(feature = "ingest-ffmpeg")]
    Ffmpeg(FfmpegSource),
}

impl VideoSource {
    pub fn new(config: SourceConfig) -> Result<Self> {
        if config.url.trim().is_empty() {
            return Err(anyhow!("video source url must not be empty"));
        }
        if config.url.starts_with("stub://") {
            Ok(Self {
                backend: SourceBackend::Synthetic(SyntheticSource::new(config)?),
            })
        } else if v4l2::camera_device(&config.url).is_some() {
            Ok(Self {
                backend: SourceBackend::V4l2(V4l2Source::new(config)?),
            })
        } else {
            #[cfg(feature = "ingest-ffmpeg")]
            {
                Ok(Self {
                    backend: SourceBackend::Ffmpeg(FfmpegSource::new(config)?),
                })
            }
            #[cfg(not(feature = "ingest-ffmpeg"))]
            {
                Err(anyhow!(
                    "source '{}' requires the ingest-ffmpeg feature",
                    config.url
                ))
            }
        }
    }

    /// Open the underlying input.
    pub fn connect(&mut self) -> Result<()> {
        match &mut self.backend {
            SourceBackend::Synthetic(source) => source.connect(),
            SourceBackend::V4l2(source) => source.connect(),
            #[cfg(feature = "ingest-ffmpeg")]
            SourceBackend::Ffmpeg(source) => source.connect(),
        }
    }

    /// Capture the next frame. An error means no further frames can be read.
    pub fn next_frame(&mut self) -> Result<Frame> {
        match &mut self.backend {
            SourceBackend::Synthetic(source) => source.next_frame(),
            SourceBackend::V4l2(source) => source.next_frame(),
            #[cfg(feature = "ingest-ffmpeg")]
            SourceBackend::Ffmpeg(source) => source.next_frame(),
        }
    }

    pub fn is_healthy(&self) -> bool {
        match &self.backend {
            SourceBackend::Synthetic(source) => source.is_healthy(),
            SourceBackend::V4l2(source) => source.is_healthy(),
            #[cfg(feature = "ingest-ffmpeg")]
            SourceBackend::Ffmpeg(source) => source.is_healthy(),
        }
    }

    pub fn stats(&self) -> SourceStats {
        match &self.backend {
            SourceBackend::Synthetic(source) => source.stats(),
            SourceBackend::V4l2(source) => source.stats(),
            #[cfg(feature = "ingest-ffmpeg")]
            SourceBackend::Ffmpeg(source) => source.stats(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct SourceStats {
    pub frames_captured: u64,
    pub url: String,
}

// ----------------------------------------------------------------------------
// Synthetic source (stub://)
// ----------------------------------------------------------------------------

pub(crate) struct SyntheticSource {
    config: SourceConfig,
    frame_limit: Option<u64>,
    frame_count: u64,
}

impl SyntheticSource {
    pub(crate) fn new(config: SourceConfig) -> Result<Self> {
        if config.width == 0 || config.height == 0 {
            return Err(anyhow!("synthetic source needs a non-zero frame size"));
        }
        let frame_limit = parse_frame_limit(&config.url)?;
        Ok(Self {
            config,
            frame_limit,
            frame_count: 0,
        })
    }

    pub(crate) fn connect(&mut self) -> Result<()> {
        log::info!("VideoSource: connected to {} (synthetic)", self.config.url);
        Ok(())
    }

    pub(crate) fn next_frame(&mut self) -> Result<Frame> {
        if self.frame_limit.is_some_and(|limit| self.frame_count >= limit) {
            return Err(anyhow!(
                "synthetic stream {} ended after {} frames",
                self.config.url,
                self.frame_count
            ));
        }
        let index = self.frame_count;
        self.frame_count += 1;
        Frame::new(
            index,
            self.generate_pixels(index),
            self.config.width,
            self.config.height,
        )
    }

    fn pixel_count(&self) -> usize {
        self.config.width as usize * self.config.height as usize * 3
    }

    fn generate_pixels(&self, index: u64) -> Vec<u8> {
        let width = self.config.width as u64;
        let mut pixels = vec![0u8; self.pixel_count()];
        for (i, pixel) in pixels.iter_mut().enumerate() {
            let x = (i as u64 / 3) % width;
            *pixel = ((x + index * 4 + (i as u64 % 3) * 40) % 256) as u8;
        }
        pixels
    }

    pub(crate) fn is_healthy(&self) -> bool {
        true
    }

    pub(crate) fn stats(&self) -> SourceStats {
        SourceStats {
            frames_captured: self.frame_count,
            url: self.config.url.clone(),
        }
    }
}

fn parse_frame_limit(url: &str) -> Result<Option<u64>> {
    let Some((_, query)) = url.split_once('?') else {
        return Ok(None);
    };
    for pair in query.split('&') {
        if let Some(value) = pair.strip_prefix("frames=") {
            let limit = value
                .parse()
                .map_err(|_| anyhow!("invalid frames= value in source url {}", url))?;
            return Ok(Some(limit));
        }
    }
    Ok(None)
}
