//! Named rectangular zones and centroid assignment.
//!
//! Zones are static for a run. Assignment walks the zones in declaration
//! order and returns the first one whose rectangle contains the detection
//! centroid, so overlapping zones resolve to the earlier declaration.

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

use crate::detect::Detection;

/// Bucket name for detections whose centroid falls outside every zone.
pub const UNKNOWN_ZONE: &str = "unknown";

/// Axis-aligned rectangle in frame pixel coordinates. Bounds are inclusive.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl Rect {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    pub fn contains(&self, x: f32, y: f32) -> bool {
        self.x1 <= x && x <= self.x2 && self.y1 <= y && y <= self.y2
    }

    fn validate(&self) -> Result<()> {
        let coords = [self.x1, self.y1, self.x2, self.y2];
        if coords.iter().any(|c| !c.is_finite()) {
            return Err(anyhow!("zone rectangle coordinates must be finite"));
        }
        if self.x1 > self.x2 || self.y1 > self.y2 {
            return Err(anyhow!(
                "zone rectangle ({}, {})-({}, {}) must have x1 <= x2 and y1 <= y2",
                self.x1,
                self.y1,
                self.x2,
                self.y2
            ));
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Zone {
    pub name: String,
    pub rect: Rect,
}

impl Zone {
    pub fn new(name: &str, rect: Rect) -> Self {
        Self {
            name: name.to_string(),
            rect,
        }
    }
}

/// A zone name MUST be a short local label usable as a CSV/JSON key.
///
/// Allowed: "entry", "help_desk", "lot-a1"
/// Disallowed: whitespace, punctuation outside [_-], and the reserved "unknown".
pub fn validate_zone_name(name: &str) -> Result<()> {
    static ZONE_NAME_RE: OnceLock<regex::Regex> = OnceLock::new();
    let re = ZONE_NAME_RE.get_or_init(|| {
        regex::Regex::new(r"^[A-Za-z0-9_-]{1,64}$").expect("zone name pattern is valid")
    });

    if !re.is_match(name) {
        return Err(anyhow!(
            "zone name '{}' must match ^[A-Za-z0-9_-]{{1,64}}$",
            name
        ));
    }
    if name == UNKNOWN_ZONE {
        return Err(anyhow!("zone name '{}' is reserved", UNKNOWN_ZONE));
    }
    Ok(())
}

/// Ordered, validated set of zones.
#[derive(Clone, Debug, PartialEq)]
pub struct ZoneMap {
    zones: Vec<Zone>,
}

impl ZoneMap {
    pub fn new(zones: Vec<Zone>) -> Result<Self> {
        if zones.is_empty() {
            return Err(anyhow!("at least one zone must be configured"));
        }
        for (i, zone) in zones.iter().enumerate() {
            validate_zone_name(&zone.name)?;
            zone.rect
                .validate()
                .map_err(|e| anyhow!("zone '{}': {}", zone.name, e))?;
            if zones[..i].iter().any(|prev| prev.name == zone.name) {
                return Err(anyhow!("zone '{}' is declared more than once", zone.name));
            }
        }
        Ok(Self { zones })
    }

    pub fn zones(&self) -> &[Zone] {
        &self.zones
    }

    pub fn len(&self) -> usize {
        self.zones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.zones.is_empty()
    }

    /// Zone names in declaration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.zones.iter().map(|zone| zone.name.as_str())
    }

    /// Name of the first zone containing the detection centroid, or `UNKNOWN_ZONE`.
    pub fn get_zone(&self, detection: &Detection) -> &str {
        let (cx, cy) = detection.centroid();
        self.zones
            .iter()
            .find(|zone| zone.rect.contains(cx, cy))
            .map(|zone| zone.name.as_str())
            .unwrap_or(UNKNOWN_ZONE)
    }
}

impl Default for ZoneMap {
    /// Entry on the left, help desk on the right of a 640x480 frame.
    fn default() -> Self {
        Self {
            zones: vec![
                Zone::new("entry", Rect::new(0.0, 0.0, 300.0, 480.0)),
                Zone::new("help_desk", Rect::new(300.0, 0.0, 640.0, 480.0)),
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn person(x1: f32, y1: f32, x2: f32, y2: f32) -> Detection {
        Detection::new(x1, y1, x2, y2, 0.9)
    }

    #[test]
    fn detection_inside_single_zone_gets_that_zone() {
        let zones = ZoneMap::default();
        assert_eq!(zones.get_zone(&person(10.0, 10.0, 50.0, 100.0)), "entry");
        assert_eq!(
            zones.get_zone(&person(400.0, 100.0, 500.0, 300.0)),
            "help_desk"
        );
    }

    #[test]
    fn detection_outside_all_zones_is_unknown() {
        let zones = ZoneMap::default();
        assert_eq!(
            zones.get_zone(&person(700.0, 10.0, 760.0, 90.0)),
            UNKNOWN_ZONE
        );
        assert_eq!(
            zones.get_zone(&person(10.0, 500.0, 50.0, 600.0)),
            UNKNOWN_ZONE
        );
    }

    #[test]
    fn overlap_resolves_to_first_declared_zone() {
        let zones = ZoneMap::new(vec![
            Zone::new("a", Rect::new(0.0, 0.0, 100.0, 100.0)),
            Zone::new("b", Rect::new(50.0, 50.0, 150.0, 150.0)),
        ])
        .unwrap();
        assert_eq!(zones.get_zone(&person(60.0, 60.0, 80.0, 80.0)), "a");

        let reversed = ZoneMap::new(vec![
            Zone::new("b", Rect::new(50.0, 50.0, 150.0, 150.0)),
            Zone::new("a", Rect::new(0.0, 0.0, 100.0, 100.0)),
        ])
        .unwrap();
        assert_eq!(reversed.get_zone(&person(60.0, 60.0, 80.0, 80.0)), "b");
    }

    #[test]
    fn centroid_on_boundary_is_inside() {
        let zones = ZoneMap::new(vec![Zone::new("desk", Rect::new(100.0, 100.0, 200.0, 200.0))])
            .unwrap();
        // centroid (100, 150): left edge
        assert_eq!(zones.get_zone(&person(90.0, 140.0, 110.0, 160.0)), "desk");
        // centroid (200, 200): bottom-right corner
        assert_eq!(zones.get_zone(&person(190.0, 190.0, 210.0, 210.0)), "desk");
    }

    fn overlapping_zones() -> ZoneMap {
        ZoneMap::new(vec![
            Zone::new("a", Rect::new(0.0, 0.0, 200.0, 200.0)),
            Zone::new("b", Rect::new(150.0, 150.0, 400.0, 350.0)),
            Zone::new("c", Rect::new(380.0, 300.0, 640.0, 480.0)),
            Zone::new("d", Rect::new(100.0, 400.0, 120.0, 420.0)),
        ])
        .unwrap()
    }

    /// First zone in `zones` whose bounds hold the point, checked coordinate by coordinate.
    fn expected_zone<'a>(zones: &'a [(&'a str, [f32; 4])], cx: f32, cy: f32) -> &'a str {
        for (name, [x1, y1, x2, y2]) in zones {
            if *x1 <= cx && cx <= *x2 && *y1 <= cy && cy <= *y2 {
                return *name;
            }
        }
        UNKNOWN_ZONE
    }

    #[test]
    fn centroid_sweep_matches_first_containing_zone() {
        let table: &[(&str, [f32; 4])] = &[
            ("a", [0.0, 0.0, 200.0, 200.0]),
            ("b", [150.0, 150.0, 400.0, 350.0]),
            ("c", [380.0, 300.0, 640.0, 480.0]),
            ("d", [100.0, 400.0, 120.0, 420.0]),
        ];
        let zones = overlapping_zones();
        let mut seen = std::collections::HashSet::new();
        // 2.5px steps land on every zone edge and on both sides of it
        for i in 0..=300 {
            for j in 0..=232 {
                let cx = -50.0 + i as f32 * 2.5;
                let cy = -50.0 + j as f32 * 2.5;
                let det = person(cx - 8.0, cy - 16.0, cx + 8.0, cy + 16.0);
                assert_eq!(det.centroid(), (cx, cy));
                let want = expected_zone(table, cx, cy);
                assert_eq!(zones.get_zone(&det), want, "centroid ({cx}, {cy})");
                seen.insert(want);
            }
        }
        for name in ["a", "b", "c", "d", UNKNOWN_ZONE] {
            assert!(seen.contains(name), "sweep never reached {name}");
        }
    }

    #[test]
    fn default_zone_sweep_splits_frame_at_shared_edge() {
        let zones = ZoneMap::default();
        for x in -50..=700 {
            for y in (-50..=530).step_by(10) {
                let (cx, cy) = (x as f32, y as f32);
                let det = person(cx - 5.0, cy - 5.0, cx + 5.0, cy + 5.0);
                let want = if !(0..=480).contains(&y) || !(0..=640).contains(&x) {
                    UNKNOWN_ZONE
                } else if x <= 300 {
                    "entry"
                } else {
                    "help_desk"
                };
                assert_eq!(zones.get_zone(&det), want, "centroid ({x}, {y})");
            }
        }
    }

    #[test]
    fn shared_edge_goes_to_first_zone() {
        let zones = ZoneMap::default();
        // centroid x == 300 lies on both entry and help_desk
        assert_eq!(zones.get_zone(&person(280.0, 10.0, 320.0, 50.0)), "entry");
    }

    #[test]
    fn rejects_invalid_zone_sets() {
        assert!(ZoneMap::new(vec![]).is_err());
        assert!(ZoneMap::new(vec![Zone::new("unknown", Rect::new(0.0, 0.0, 1.0, 1.0))]).is_err());
        assert!(ZoneMap::new(vec![Zone::new("front door", Rect::new(0.0, 0.0, 1.0, 1.0))]).is_err());
        assert!(ZoneMap::new(vec![Zone::new("inverted", Rect::new(10.0, 0.0, 1.0, 1.0))]).is_err());
        assert!(ZoneMap::new(vec![
            Zone::new("dup", Rect::new(0.0, 0.0, 1.0, 1.0)),
            Zone::new("dup", Rect::new(2.0, 2.0, 3.0, 3.0)),
        ])
        .is_err());
    }
}
