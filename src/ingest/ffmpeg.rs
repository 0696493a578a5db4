//! FFmpeg-backed frame source for video files, RTSP URLs and capture devices.
//!
//! Frames are decoded in-memory and converted to packed RGB24 at the
//! stream's native resolution.

use anyhow::{Context, Result};
use ffmpeg_next as ffmpeg;
use std::time::{Duration, Instant};

use super::source::{stall_grace, SourceConfig, SourceStats};
use crate::frame::Frame;

pub(crate) struct FfmpegSource {
    config: SourceConfig,
    input: ffmpeg::format::context::Input,
    stream_index: usize,
    decoder: ffmpeg::codec::decoder::Video,
    scaler: ffmpeg::software::scaling::Context,
    frame_count: u64,
    /// Wall time spent inside the most recent `next_frame` call.
    last_decode: Option<Duration>,
    connected_at: Option<Instant>,
    last_error: Option<String>,
}

impl FfmpegSource {
    pub(crate) fn new(config: SourceConfig) -> Result<Self> {
        ffmpeg::init().context("initialize ffmpeg")?;
        ffmpeg::device::register_all();
        let input = ffmpeg::format::input(&config.url)
            .with_context(|| format!("failed to open video input '{}' with ffmpeg", config.url))?;
        let input_stream = input
            .streams()
            .best(ffmpeg::media::Type::Video)
            .ok_or_else(|| anyhow::anyhow!("input '{}' has no video track", config.url))?;
        let stream_index = input_stream.index();
        let context = ffmpeg::codec::context::Context::from_parameters(input_stream.parameters())
            .context("load video decoder parameters")?;
        let decoder = context
            .decoder()
            .video()
            .context("open ffmpeg video decoder")?;

        let scaler = ffmpeg::software::scaling::context::Context::get(
            decoder.format(),
            decoder.width(),
            decoder.height(),
            ffmpeg::util::format::pixel::Pixel::RGB24,
            decoder.width(),
            decoder.height(),
            ffmpeg::software::scaling::flag::Flags::BILINEAR,
        )
        .context("create ffmpeg scaler")?;

        Ok(Self {
            config,
            input,
            stream_index,
            decoder,
            scaler,
            frame_count: 0,
            last_decode: None,
            connected_at: None,
            last_error: None,
        })
    }

    pub(crate) fn connect(&mut self) -> Result<()> {
        self.connected_at = Some(Instant::now());
        log::info!("VideoSource: connected to {} (ffmpeg)", self.config.url);
        Ok(())
    }

    pub(crate) fn next_frame(&mut self) -> Result<Frame> {
        let started = Instant::now();
        let frame = self.decode_next();
        self.last_decode = Some(started.elapsed());
        frame
    }

    fn decode_next(&mut self) -> Result<Frame> {
        let mut decoded = ffmpeg::frame::Video::empty();
        let mut rgb_frame = ffmpeg::frame::Video::empty();

        // Drain frames the decoder already holds before feeding more packets.
        if self.decoder.receive_frame(&mut decoded).is_ok() {
            return self.convert(&decoded, &mut rgb_frame);
        }

        for (stream, packet) in self.input.packets() {
            if stream.index() != self.stream_index {
                continue;
            }

            self.decoder
                .send_packet(&packet)
                .context("send packet to ffmpeg decoder")?;

            if self.decoder.receive_frame(&mut decoded).is_ok() {
                return self.convert(&decoded, &mut rgb_frame);
            }
        }

        self.last_error = Some("end of stream".to_string());
        anyhow::bail!("video input '{}' reached end of stream", self.config.url)
    }

    fn convert(
        &mut self,
        decoded: &ffmpeg::frame::Video,
        rgb_frame: &mut ffmpeg::frame::Video,
    ) -> Result<Frame> {
        self.scaler
            .run(decoded, rgb_frame)
            .context("scale frame to RGB")?;
        let (pixels, width, height) = frame_to_pixels(rgb_frame)?;

        let index = self.frame_count;
        self.frame_count += 1;

        Frame::new(index, pixels, width, height)
    }

    pub(crate) fn is_healthy(&self) -> bool {
        if self.last_error.is_some() {
            return false;
        }
        let Some(connected_at) = self.connected_at else {
            return false;
        };
        match self.last_decode {
            Some(took) => took <= stall_grace(self.config.target_fps),
            None => connected_at.elapsed() <= Duration::from_secs(5),
        }
    }

    pub(crate) fn stats(&self) -> SourceStats {
        SourceStats {
            frames_captured: self.frame_count,
            url: self.config.url.clone(),
        }
    }
}

fn frame_to_pixels(frame: &ffmpeg::frame::Video) -> Result<(Vec<u8>, u32, u32)> {
    let width = frame.width();
    let height = frame.height();
    let row_bytes = (width as usize) * 3;
    let stride = frame.stride(0);
    let data = frame.data(0);

    if stride == row_bytes {
        let pixels = data
            .get(..row_bytes * height as usize)
            .context("ffmpeg frame is shorter than its dimensions")?;
        return Ok((pixels.to_vec(), width, height));
    }

    let mut pixels = Vec::with_capacity(row_bytes * height as usize);
    for row in 0..height as usize {
        let start = row * stride;
        let end = start + row_bytes;
        pixels.extend_from_slice(
            data.get(start..end)
                .context("ffmpeg frame row is out of bounds")?,
        );
    }

    Ok((pixels, width, height))
}
