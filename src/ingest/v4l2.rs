//! V4L2 camera source.
//!
//! Local capture devices are addressed as `/dev/videoN`, a bare camera
//! index (`0` opens `/dev/video0`), or `v4l2://<device>`. `v4l2://stub`
//! selects a synthetic camera so the capture path can run without hardware;
//! it accepts the same `?frames=N` limit as `stub://` sources.
//!
//! Real devices need the `ingest-v4l2` feature and are asked for packed RGB24
//! (`RGB3`) at the configured size and rate.

use anyhow::{anyhow, Result};

use super::source::{SourceConfig, SourceStats, SyntheticSource};
use crate::frame::Frame;

pub(crate) const SCHEME: &str = "v4l2://";
const STUB_DEVICE: &str = "stub";

/// Map a source URL to a V4L2 device path, or `None` when it names something else.
pub(crate) fn camera_device(url: &str) -> Option<String> {
    let url = url.trim();
    if let Some(rest) = url.strip_prefix(SCHEME) {
        if let Some(index) = parse_index(rest) {
            return Some(format!("/dev/video{index}"));
        }
        return Some(rest.to_string());
    }
    if let Some(index) = parse_index(url) {
        return Some(format!("/dev/video{index}"));
    }
    if url
        .strip_prefix("/dev/video")
        .and_then(parse_index)
        .is_some()
    {
        return Some(url.to_string());
    }
    None
}

fn parse_index(text: &str) -> Option<u32> {
    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    text.parse().ok()
}

pub(crate) struct V4l2Source {
    backend: V4l2Backend,
}

enum V4l2Backend {
    Synthetic(SyntheticSource),
    #[cfg(feature = "ingest-v4l2")]
    Device(device::DeviceV4l2Source),
}

impl V4l2Source {
    pub(crate) fn new(config: SourceConfig) -> Result<Self> {
        let device = camera_device(&config.url)
            .ok_or_else(|| anyhow!("'{}' is not a V4L2 device", config.url))?;
        if device == STUB_DEVICE || device.starts_with("stub?") {
            return Ok(Self {
                backend: V4l2Backend::Synthetic(SyntheticSource::new(config)?),
            });
        }
        #[cfg(feature = "ingest-v4l2")]
        {
            Ok(Self {
                backend: V4l2Backend::Device(device::DeviceV4l2Source::new(config, device)),
            })
        }
        #[cfg(not(feature = "ingest-v4l2"))]
        {
            Err(anyhow!(
                "camera '{}' requires the ingest-v4l2 feature",
                device
            ))
        }
    }

    pub(crate) fn connect(&mut self) -> Result<()> {
        match &mut self.backend {
            V4l2Backend::Synthetic(source) => source.connect(),
            #[cfg(feature = "ingest-v4l2")]
            V4l2Backend::Device(source) => source.connect(),
        }
    }

    pub(crate) fn next_frame(&mut self) -> Result<Frame> {
        match &mut self.backend {
            V4l2Backend::Synthetic(source) => source.next_frame(),
            #[cfg(feature = "ingest-v4l2")]
            V4l2Backend::Device(source) => source.next_frame(),
        }
    }

    pub(crate) fn is_healthy(&self) -> bool {
        match &self.backend {
            V4l2Backend::Synthetic(source) => source.is_healthy(),
            #[cfg(feature = "ingest-v4l2")]
            V4l2Backend::Device(source) => source.is_healthy(),
        }
    }

    pub(crate) fn stats(&self) -> SourceStats {
        match &self.backend {
            V4l2Backend::Synthetic(source) => source.stats(),
            #[cfg(feature = "ingest-v4l2")]
            V4l2Backend::Device(source) => source.stats(),
        }
    }
}

// ----------------------------------------------------------------------------
// Capture devices via libv4l
// ----------------------------------------------------------------------------

#[cfg(feature = "ingest-v4l2")]
mod device {
    use anyhow::{anyhow, Context, Result};
    use ouroboros::self_referencing;
    use std::time::{Duration, Instant};

    use crate::frame::Frame;
    use crate::ingest::source::{stall_grace, SourceConfig, SourceStats};

    pub(super) struct DeviceV4l2Source {
        config: SourceConfig,
        device: String,
        state: Option<DeviceV4l2State>,
        frame_count: u64,
        last_capture: Option<Duration>,
        last_error: Option<String>,
        active_width: u32,
        active_height: u32,
    }

    #[self_referencing]
    struct DeviceV4l2State {
        device: v4l::Device,
        #[borrows(mut device)]
        #[covariant]
        stream: v4l::prelude::MmapStream<'this, v4l::Device>,
    }

    impl DeviceV4l2Source {
        pub(super) fn new(config: SourceConfig, device: String) -> Self {
            Self {
                active_width: config.width,
                active_height: config.height,
                config,
                device,
                state: None,
                frame_count: 0,
                last_capture: None,
                last_error: None,
            }
        }

        pub(super) fn connect(&mut self) -> Result<()> {
            use v4l::buffer::Type;
            use v4l::video::Capture;

            let mut device = v4l::Device::with_path(&self.device)
                .with_context(|| format!("open v4l2 device {}", self.device))?;
            let mut format = device.format().context("read v4l2 format")?;
            format.width = self.config.width;
            format.height = self.config.height;
            format.fourcc = v4l::FourCC::new(b"RGB3");

            let format = match device.set_format(&format) {
                Ok(format) => format,
                Err(err) => {
                    log::warn!(
                        "VideoSource: failed to set format on {}: {}",
                        self.device,
                        err
                    );
                    device
                        .format()
                        .context("read v4l2 format after set failure")?
                }
            };
            if format.fourcc != v4l::FourCC::new(b"RGB3") {
                return Err(anyhow!(
                    "v4l2 device {} cannot deliver RGB24 frames (offers {})",
                    self.device,
                    format.fourcc
                ));
            }

            if self.config.target_fps > 0 {
                let params = v4l::video::capture::Parameters::with_fps(self.config.target_fps);
                if let Err(err) = device.set_params(&params) {
                    log::warn!("VideoSource: failed to set fps on {}: {}", self.device, err);
                }
            }

            self.active_width = format.width;
            self.active_height = format.height;
            self.last_error = None;

            let state = DeviceV4l2StateBuilder {
                device,
                stream_builder: |device| {
                    v4l::prelude::MmapStream::with_buffers(device, Type::VideoCapture, 4)
                        .map_err(|err| anyhow::Error::new(err).context("create v4l2 buffer stream"))
                },
            }
            .try_build()
            .map_err(|err| {
                self.last_error = Some(err.to_string());
                err
            })?;
            self.state = Some(state);

            log::info!(
                "VideoSource: connected to {} ({}x{}, v4l2)",
                self.device,
                self.active_width,
                self.active_height
            );
            Ok(())
        }

        pub(super) fn next_frame(&mut self) -> Result<Frame> {
            use v4l::io::traits::CaptureStream;

            let expected = self.active_width as usize * self.active_height as usize * 3;
            let started = Instant::now();
            let state = self.state.as_mut().context("v4l2 device not connected")?;
            let pixels = state
                .with_mut(|fields| {
                    fields
                        .stream
                        .next()
                        .map(|(buf, _meta)| buf.get(..expected).map(<[u8]>::to_vec))
                })
                .map_err(|err| {
                    self.last_error = Some(err.to_string());
                    anyhow::Error::new(err).context("capture v4l2 frame")
                })?
                .with_context(|| format!("v4l2 buffer from {} is shorter than a frame", self.device))?;
            self.last_capture = Some(started.elapsed());

            let index = self.frame_count;
            self.frame_count += 1;
            Frame::new(index, pixels, self.active_width, self.active_height)
        }

        pub(super) fn is_healthy(&self) -> bool {
            if self.last_error.is_some() || self.state.is_none() {
                return false;
            }
            self.last_capture
                .map_or(true, |took| took <= stall_grace(self.config.target_fps))
        }

        pub(super) fn stats(&self) -> SourceStats {
            SourceStats {
                frames_captured: self.frame_count,
                url: self.device.clone(),
            }
        }
    }
}
