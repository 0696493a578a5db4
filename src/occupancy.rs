//! Per-frame occupancy: zone histogram, total count, capacity alert.
//!
//! Every declared zone and the `unknown` bucket are always present in a
//! frame's `ZoneCounts`, so the bucket sum always equals the total count.

use chrono::NaiveDateTime;
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

use crate::detect::Detection;
use crate::zone::{ZoneMap, UNKNOWN_ZONE};

pub const DEFAULT_THRESHOLD: u32 = 5;

/// Ordered zone name → people count. Serializes as a map in insertion order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ZoneCounts {
    entries: Vec<(String, u32)>,
}

impl ZoneCounts {
    /// All zones of `zones` plus `unknown`, each at zero.
    pub fn empty_for(zones: &ZoneMap) -> Self {
        let entries = zones
            .names()
            .chain(std::iter::once(UNKNOWN_ZONE))
            .map(|name| (name.to_string(), 0))
            .collect();
        Self { entries }
    }

    pub fn increment(&mut self, name: &str) {
        match self.entries.iter_mut().find(|(zone, _)| zone == name) {
            Some((_, count)) => *count += 1,
            None => self.entries.push((name.to_string(), 1)),
        }
    }

    pub fn get(&self, name: &str) -> Option<u32> {
        self.entries
            .iter()
            .find(|(zone, _)| zone == name)
            .map(|(_, count)| *count)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u32)> {
        self.entries
            .iter()
            .map(|(zone, count)| (zone.as_str(), *count))
    }

    pub fn total(&self) -> u32 {
        self.entries.iter().map(|(_, count)| count).sum()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Serialize for ZoneCounts {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (zone, count) in &self.entries {
            map.serialize_entry(zone, count)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for ZoneCounts {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct ZoneCountsVisitor;

        impl<'de> Visitor<'de> for ZoneCountsVisitor {
            type Value = ZoneCounts;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of zone name to count")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<ZoneCounts, A::Error> {
                let mut entries = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((zone, count)) = access.next_entry::<String, u32>()? {
                    entries.push((zone, count));
                }
                Ok(ZoneCounts { entries })
            }
        }

        deserializer.deserialize_map(ZoneCountsVisitor)
    }
}

/// Aggregate for one frame's detections.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FrameCounts {
    pub total_count: u32,
    pub zone_counts: ZoneCounts,
}

/// Count people per zone for one frame. Pure function of the detections.
pub fn aggregate_frame(zones: &ZoneMap, detections: &[Detection]) -> FrameCounts {
    let mut zone_counts = ZoneCounts::empty_for(zones);
    for detection in detections {
        zone_counts.increment(zones.get_zone(detection));
    }
    FrameCounts {
        total_count: detections.len() as u32,
        zone_counts,
    }
}

/// Static over-capacity check. No hysteresis: each frame is judged alone.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CapacityAlert {
    pub threshold: u32,
}

impl CapacityAlert {
    pub fn new(threshold: u32) -> Self {
        Self { threshold }
    }

    pub fn over_capacity(&self, total_count: u32) -> bool {
        total_count > self.threshold
    }
}

impl Default for CapacityAlert {
    fn default() -> Self {
        Self::new(DEFAULT_THRESHOLD)
    }
}

/// One logged frame. Immutable once appended to the occupancy log.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FrameRecord {
    pub timestamp: NaiveDateTime,
    pub total_count: u32,
    pub zone_counts: ZoneCounts,
}

impl FrameRecord {
    pub fn new(timestamp: NaiveDateTime, counts: FrameCounts) -> Self {
        Self {
            timestamp,
            total_count: counts.total_count,
            zone_counts: counts.zone_counts,
        }
    }
}
