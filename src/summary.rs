//! Post-run analysis: descriptive statistics and the occupancy chart.

use anyhow::{Context, Result};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_line_segment_mut};
use std::fmt;
use std::path::Path;

use crate::occupancy::FrameRecord;
use crate::text::{draw_text, text_width, GLYPH_HEIGHT};

pub const DEFAULT_CHART_PATH: &str = "occupancy_chart.png";
pub const CHART_WIDTH: u32 = 1200;
pub const CHART_HEIGHT: u32 = 500;

const MARGIN: u32 = 50;
const GRID_LINES: u32 = 10;
const BACKGROUND: Rgb<u8> = Rgb([255, 255, 255]);
const GRID_COLOR: Rgb<u8> = Rgb([220, 220, 220]);
const AXIS_COLOR: Rgb<u8> = Rgb([0, 0, 0]);
const LINE_COLOR: Rgb<u8> = Rgb([31, 119, 180]);
const THRESHOLD_COLOR: Rgb<u8> = Rgb([214, 39, 40]);
const MARKER_RADIUS: i32 = 3;

pub const CHART_TITLE: &str = "Room Occupancy Over Time with Zone Monitoring";
pub const X_LABEL: &str = "Time";
pub const Y_LABEL: &str = "Number of People";
const TICK_TIME_FORMAT: &str = "%H:%M:%S";

/// Descriptive statistics over per-frame people counts.
///
/// `std` is the sample standard deviation (n - 1); quartiles use linear
/// interpolation between closest ranks. Undefined values are NaN.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CountStats {
    pub count: usize,
    pub mean: f64,
    pub std: f64,
    pub min: f64,
    pub q25: f64,
    pub median: f64,
    pub q75: f64,
    pub max: f64,
}

impl CountStats {
    pub fn describe(values: &[u32]) -> Self {
        let count = values.len();
        if count == 0 {
            return Self {
                count,
                mean: f64::NAN,
                std: f64::NAN,
                min: f64::NAN,
                q25: f64::NAN,
                median: f64::NAN,
                q75: f64::NAN,
                max: f64::NAN,
            };
        }

        let mut sorted: Vec<f64> = values.iter().map(|&v| v as f64).collect();
        sorted.sort_by(f64::total_cmp);

        let mean = sorted.iter().sum::<f64>() / count as f64;
        let std = if count > 1 {
            let var = sorted.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (count - 1) as f64;
            var.sqrt()
        } else {
            f64::NAN
        };

        Self {
            count,
            mean,
            std,
            min: sorted[0],
            q25: quantile(&sorted, 0.25),
            median: quantile(&sorted, 0.5),
            q75: quantile(&sorted, 0.75),
            max: sorted[count - 1],
        }
    }

    pub fn from_records(records: &[FrameRecord]) -> Self {
        let counts: Vec<u32> = records.iter().map(|r| r.total_count).collect();
        Self::describe(&counts)
    }
}

fn quantile(sorted: &[f64], q: f64) -> f64 {
    let pos = q * (sorted.len() - 1) as f64;
    let lower = pos.floor() as usize;
    let upper = pos.ceil() as usize;
    let frac = pos - lower as f64;
    sorted[lower] + (sorted[upper] - sorted[lower]) * frac
}

impl fmt::Display for CountStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rows = [
            ("count", self.count as f64),
            ("mean", self.mean),
            ("std", self.std),
            ("min", self.min),
            ("25%", self.q25),
            ("50%", self.median),
            ("75%", self.q75),
            ("max", self.max),
        ];
        for (label, value) in rows {
            writeln!(f, "{:<6}{:>12.6}", label, value)?;
        }
        write!(f, "Name: count, dtype: float64")
    }
}

/// Render a line chart of people count over time to a PNG file.
///
/// The x axis is wall-clock time since the first record (frame order when
/// all records share one second). An optional threshold is drawn as a
/// horizontal line. The chart carries a title, axis labels, the count range
/// on the y axis and the first/last timestamps on the x axis.
pub fn render_chart(path: &Path, records: &[FrameRecord], threshold: Option<u32>) -> Result<()> {
    let image = draw_chart(records, threshold, CHART_WIDTH, CHART_HEIGHT);
    image
        .save(path)
        .with_context(|| format!("failed to write chart {}", path.display()))?;
    Ok(())
}

fn draw_chart(records: &[FrameRecord], threshold: Option<u32>, width: u32, height: u32) -> RgbImage {
    let mut image = RgbImage::from_pixel(width, height, BACKGROUND);
    let left = MARGIN as f64;
    let right = (width - MARGIN) as f64;
    let top = MARGIN as f64;
    let bottom = (height - MARGIN) as f64;

    for i in 0..=GRID_LINES {
        let t = i as f64 / GRID_LINES as f64;
        let x = left + (right - left) * t;
        let y = top + (bottom - top) * t;
        segment(&mut image, (x, top), (x, bottom), GRID_COLOR);
        segment(&mut image, (left, y), (right, y), GRID_COLOR);
    }
    segment(&mut image, (left, bottom), (right, bottom), AXIS_COLOR);
    segment(&mut image, (left, top), (left, bottom), AXIS_COLOR);

    let max_count = records
        .iter()
        .map(|r| r.total_count)
        .chain(threshold)
        .max()
        .unwrap_or(0)
        .max(1);
    let y_of = |count: f64| bottom - (bottom - top) * (count / max_count as f64);

    draw_labels(&mut image, records, max_count);

    if let Some(threshold) = threshold {
        let y = y_of(threshold as f64);
        segment(&mut image, (left, y), (right, y), THRESHOLD_COLOR);
    }

    let Some(first) = records.first() else {
        return image;
    };
    let span = records
        .last()
        .map(|last| (last.timestamp - first.timestamp).num_seconds())
        .unwrap_or(0);
    let points: Vec<(f64, f64)> = records
        .iter()
        .enumerate()
        .map(|(i, record)| {
            let t = if span > 0 {
                (record.timestamp - first.timestamp).num_seconds() as f64 / span as f64
            } else if records.len() > 1 {
                i as f64 / (records.len() - 1) as f64
            } else {
                0.5
            };
            (left + (right - left) * t, y_of(record.total_count as f64))
        })
        .collect();

    for pair in points.windows(2) {
        segment(&mut image, pair[0], pair[1], LINE_COLOR);
    }
    for &(x, y) in &points {
        let center = (x.round() as i32, y.round() as i32);
        draw_filled_circle_mut(&mut image, center, MARKER_RADIUS, LINE_COLOR);
    }
    image
}

/// Title, axis labels and tick labels around the plot area.
fn draw_labels(image: &mut RgbImage, records: &[FrameRecord], max_count: u32) {
    let (width, height) = image.dimensions();
    let glyph_height = GLYPH_HEIGHT as i32;
    let left = MARGIN as i32;
    let right = (width - MARGIN) as i32;
    let bottom = (height - MARGIN) as i32;
    let centered = |text: &str, scale: u32| (width as i32 - text_width(text, scale) as i32) / 2;

    draw_text(image, CHART_TITLE, centered(CHART_TITLE, 2), 10, 2, AXIS_COLOR);
    draw_text(image, Y_LABEL, 5, left - glyph_height - 6, 1, AXIS_COLOR);
    draw_text(
        image,
        X_LABEL,
        centered(X_LABEL, 1),
        height as i32 - glyph_height - 8,
        1,
        AXIS_COLOR,
    );

    for (count, y) in [(max_count, MARGIN as i32), (0, bottom)] {
        let label = count.to_string();
        let x = left - 6 - text_width(&label, 1) as i32;
        draw_text(image, &label, x, y - glyph_height / 2, 1, AXIS_COLOR);
    }

    if let (Some(first), Some(last)) = (records.first(), records.last()) {
        let start = first.timestamp.format(TICK_TIME_FORMAT).to_string();
        let end = last.timestamp.format(TICK_TIME_FORMAT).to_string();
        draw_text(image, &start, left, bottom + 6, 1, AXIS_COLOR);
        if records.len() > 1 {
            let x = right - text_width(&end, 1) as i32;
            draw_text(image, &end, x, bottom + 6, 1, AXIS_COLOR);
        }
    }
}

/// Straight line between pixel-rounded endpoints, clipped to the image.
fn segment(image: &mut RgbImage, from: (f64, f64), to: (f64, f64), color: Rgb<u8>) {
    let round = |(x, y): (f64, f64)| (x.round() as f32, y.round() as f32);
    draw_line_segment_mut(image, round(from), round(to), color);
}
