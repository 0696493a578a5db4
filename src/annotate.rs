//! Frame annotation: zone outlines and labels, person boxes, over-capacity alert.

use anyhow::Result;
use image::{Rgb, RgbImage};
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect as PixelRect;

use crate::detect::Detection;
use crate::frame::Frame;
use crate::text::{draw_text, GLYPH_HEIGHT};
use crate::zone::{Rect, ZoneMap};

pub const ZONE_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
pub const PERSON_COLOR: Rgb<u8> = Rgb([255, 200, 0]);
pub const ALERT_COLOR: Rgb<u8> = Rgb([255, 0, 0]);

pub const ALERT_TEXT: &str = "ALERT: Over Capacity!";

const ZONE_THICKNESS: u32 = 2;
const PERSON_THICKNESS: u32 = 1;
const ZONE_LABEL_SCALE: u32 = 2;
const ALERT_SCALE: u32 = 3;
/// Text baselines, relative to the zone corner and the frame corner.
const ZONE_LABEL_OFFSET: (i32, i32) = (5, 20);
const ALERT_BASELINE: (i32, i32) = (50, 50);

/// Render zones and detections onto a copy of the frame.
pub fn annotate(
    frame: &Frame,
    zones: &ZoneMap,
    detections: &[Detection],
    over_capacity: bool,
) -> Result<RgbImage> {
    let mut image = frame.to_rgb_image()?;
    for zone in zones.zones() {
        draw_rect(&mut image, &zone.rect, ZONE_COLOR, ZONE_THICKNESS);
        let x = zone.rect.x1.round() as i32 + ZONE_LABEL_OFFSET.0;
        let y = zone.rect.y1.round() as i32 + ZONE_LABEL_OFFSET.1;
        draw_label(&mut image, &zone.name, x, y, ZONE_LABEL_SCALE, ZONE_COLOR);
    }
    for det in detections {
        let rect = Rect::new(det.x1, det.y1, det.x2, det.y2);
        draw_rect(&mut image, &rect, PERSON_COLOR, PERSON_THICKNESS);
    }
    if over_capacity {
        let (x, y) = ALERT_BASELINE;
        draw_label(&mut image, ALERT_TEXT, x, y, ALERT_SCALE, ALERT_COLOR);
    }
    Ok(image)
}

/// Text whose baseline (bottom of the glyphs) sits at `y`.
fn draw_label(image: &mut RgbImage, text: &str, x: i32, y: i32, scale: u32, color: Rgb<u8>) {
    let top = y - (GLYPH_HEIGHT * scale) as i32;
    draw_text(image, text, x, top, scale, color);
}

/// Outline `rect` (inclusive corners) with `thickness` pixels drawn inward.
/// Parts outside the image are clipped.
pub fn draw_rect(image: &mut RgbImage, rect: &Rect, color: Rgb<u8>, thickness: u32) {
    let left = rect.x1.round() as i64;
    let top = rect.y1.round() as i64;
    let width = rect.x2.round() as i64 - left + 1;
    let height = rect.y2.round() as i64 - top + 1;

    for t in 0..thickness as i64 {
        let (w, h) = (width - 2 * t, height - 2 * t);
        if w <= 0 || h <= 0 {
            break;
        }
        let (Ok(x), Ok(y), Ok(w), Ok(h)) = (
            i32::try_from(left + t),
            i32::try_from(top + t),
            u32::try_from(w),
            u32::try_from(h),
        ) else {
            break;
        };
        draw_hollow_rect_mut(image, PixelRect::at(x, y).of_size(w, h), color);
    }
}
