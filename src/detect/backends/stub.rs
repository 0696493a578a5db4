use anyhow::Result;

use crate::detect::backend::PersonDetector;
use crate::detect::result::Detection;
use crate::frame::Frame;

/// Stub backend for testing and demo runs.
///
/// Replays a script of per-frame detections in order. Once the script is
/// exhausted it returns no detections, unless cycling is enabled.
pub struct StubBackend {
    script: Vec<Vec<Detection>>,
    cursor: usize,
    cycle: bool,
}

impl StubBackend {
    pub fn new(script: Vec<Vec<Detection>>) -> Self {
        Self {
            script,
            cursor: 0,
            cycle: false,
        }
    }

    /// Script where frame `i` contains `counts[i]` people spread across the frame.
    pub fn with_counts(counts: &[usize], width: u32, height: u32) -> Self {
        let script = counts
            .iter()
            .map(|&n| spread_people(n, width, height))
            .collect();
        Self::new(script)
    }

    /// A crowd that swells from empty to `peak` people and back, forever.
    pub fn crowd_wave(peak: usize, width: u32, height: u32) -> Self {
        let counts: Vec<usize> = (0..=peak).chain((1..peak).rev()).collect();
        Self::with_counts(&counts, width, height).cycling(true)
    }

    pub fn cycling(mut self, enabled: bool) -> Self {
        self.cycle = enabled;
        self
    }
}

impl Default for StubBackend {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl PersonDetector for StubBackend {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn detect(&mut self, _frame: &Frame) -> Result<Vec<Detection>> {
        if self.script.is_empty() {
            return Ok(Vec::new());
        }
        let idx = if self.cycle {
            self.cursor % self.script.len()
        } else {
            self.cursor
        };
        self.cursor += 1;
        Ok(self.script.get(idx).cloned().unwrap_or_default())
    }
}

/// Lay `n` person-sized boxes out left to right across the frame.
fn spread_people(n: usize, width: u32, height: u32) -> Vec<Detection> {
    if n == 0 {
        return Vec::new();
    }
    let slot = width as f32 / n as f32;
    let box_w = (slot * 0.6).max(1.0);
    let box_h = height as f32 * 0.5;
    let top = height as f32 * 0.25;
    (0..n)
        .map(|i| {
            let x1 = slot * i as f32 + (slot - box_w) / 2.0;
            Detection::new(x1, top, x1 + box_w, top + box_h, 0.9)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blank() -> Frame {
        Frame::blank(0, 64, 48)
    }

    #[test]
    fn stub_backend_replays_script_then_goes_quiet() {
        let mut backend = StubBackend::with_counts(&[2, 0, 3], 640, 480);
        assert_eq!(backend.detect(&blank()).unwrap().len(), 2);
        assert_eq!(backend.detect(&blank()).unwrap().len(), 0);
        assert_eq!(backend.detect(&blank()).unwrap().len(), 3);
        assert!(backend.detect(&blank()).unwrap().is_empty());
    }

    #[test]
    fn crowd_wave_cycles() {
        let mut backend = StubBackend::crowd_wave(2, 640, 480);
        let counts: Vec<usize> = (0..6)
            .map(|_| backend.detect(&blank()).unwrap().len())
            .collect();
        assert_eq!(counts, vec![0, 1, 2, 1, 0, 1]);
    }

    #[test]
    fn spread_people_stay_inside_frame() {
        for det in spread_people(7, 640, 480) {
            assert!(det.x1 >= 0.0 && det.x2 <= 640.0);
            assert!(det.y1 >= 0.0 && det.y2 <= 480.0);
        }
    }
}
