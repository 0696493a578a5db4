#![cfg(feature = "backend-tract")]

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use image::imageops::FilterType;
use image::{Rgb, RgbImage};
use tract_onnx::prelude::*;

use crate::detect::backend::PersonDetector;
use crate::detect::result::Detection;
use crate::frame::Frame;

/// COCO class index for "person".
const PERSON_CLASS: usize = 0;
const DEFAULT_CONFIDENCE: f32 = 0.25;
const DEFAULT_NMS_IOU: f32 = 0.45;
/// YOLOv5 padding gray.
const LETTERBOX_FILL: Rgb<u8> = Rgb([114, 114, 114]);

/// Aspect-preserving fit of a frame into the model input, centered with padding.
#[derive(Clone, Copy, Debug, PartialEq)]
struct Letterbox {
    scale: f32,
    pad_x: u32,
    pad_y: u32,
    scaled_width: u32,
    scaled_height: u32,
    input_width: u32,
    input_height: u32,
}

impl Letterbox {
    fn fit(frame_width: u32, frame_height: u32, input_width: u32, input_height: u32) -> Self {
        let scale = (input_width as f32 / frame_width as f32)
            .min(input_height as f32 / frame_height as f32);
        let scaled_width = ((frame_width as f32 * scale).round() as u32).clamp(1, input_width);
        let scaled_height = ((frame_height as f32 * scale).round() as u32).clamp(1, input_height);
        Self {
            scale,
            pad_x: (input_width - scaled_width) / 2,
            pad_y: (input_height - scaled_height) / 2,
            scaled_width,
            scaled_height,
            input_width,
            input_height,
        }
    }

    fn apply(&self, image: &RgbImage) -> RgbImage {
        let resized = image::imageops::resize(
            image,
            self.scaled_width,
            self.scaled_height,
            FilterType::Triangle,
        );
        let mut canvas = RgbImage::from_pixel(self.input_width, self.input_height, LETTERBOX_FILL);
        image::imageops::overlay(&mut canvas, &resized, self.pad_x as i64, self.pad_y as i64);
        canvas
    }

    /// Map a point in model input pixels back to frame pixels.
    fn to_frame(&self, x: f32, y: f32) -> (f32, f32) {
        (
            (x - self.pad_x as f32) / self.scale,
            (y - self.pad_y as f32) / self.scale,
        )
    }
}

/// Tract-based backend for YOLOv5-format ONNX models.
///
/// Expects a single output of shape `[1, N, 5 + classes]` with rows
/// `cx, cy, w, h, objectness, class scores...` in model input pixels.
/// Only rows whose best class is "person" are kept.
pub struct TractBackend {
    model: SimplePlan<TypedFact, Box<dyn TypedOp>>,
    input_width: u32,
    input_height: u32,
    confidence_threshold: f32,
    nms_iou: f32,
}

impl TractBackend {
    /// Load an ONNX model from disk and prepare it for inference.
    pub fn new<P: AsRef<Path>>(model_path: P, input_width: u32, input_height: u32) -> Result<Self> {
        let model_path = model_path.as_ref();
        let model = tract_onnx::onnx()
            .model_for_path(model_path)
            .with_context(|| format!("failed to load ONNX model from {}", model_path.display()))?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(
                    f32::datum_type(),
                    tvec!(1, 3, input_height as usize, input_width as usize),
                ),
            )
            .context("failed to set input fact")?
            .into_optimized()
            .context("failed to optimize ONNX model")?
            .into_runnable()
            .context("failed to build runnable ONNX model")?;

        Ok(Self {
            model,
            input_width,
            input_height,
            confidence_threshold: DEFAULT_CONFIDENCE,
            nms_iou: DEFAULT_NMS_IOU,
        })
    }

    /// Override the default confidence threshold.
    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.confidence_threshold = threshold;
        self
    }

    fn letterbox(&self, frame: &Frame) -> Letterbox {
        Letterbox::fit(frame.width, frame.height, self.input_width, self.input_height)
    }

    fn build_input(&self, frame: &Frame) -> Result<Tensor> {
        let image = frame.to_rgb_image()?;
        let resized = self.letterbox(frame).apply(&image);

        let input = tract_ndarray::Array4::from_shape_fn(
            (1, 3, self.input_height as usize, self.input_width as usize),
            |(_, channel, y, x)| resized.get_pixel(x as u32, y as u32)[channel] as f32 / 255.0,
        );

        Ok(input.into_tensor())
    }

    fn extract_people(&self, outputs: TVec<TValue>, frame: &Frame) -> Result<Vec<Detection>> {
        let output = outputs
            .first()
            .ok_or_else(|| anyhow!("model produced no outputs"))?;
        let view = output
            .to_array_view::<f32>()
            .context("model output tensor was not f32")?;
        let shape = view.shape().to_vec();
        if shape.len() != 3 || shape[2] < 6 {
            return Err(anyhow!(
                "expected YOLO output [1, N, 5 + classes], got {:?}",
                shape
            ));
        }
        let rows = view
            .into_shape((shape[1], shape[2]))
            .context("reshape model output")?;

        let letterbox = self.letterbox(frame);

        let mut candidates = Vec::new();
        for row in rows.outer_iter() {
            let objectness = row[4];
            if objectness < self.confidence_threshold {
                continue;
            }
            let (best_class, best_score) = row
                .iter()
                .skip(5)
                .enumerate()
                .fold((0usize, f32::NEG_INFINITY), |best, (i, &s)| {
                    if s > best.1 {
                        (i, s)
                    } else {
                        best
                    }
                });
            if best_class != PERSON_CLASS {
                continue;
            }
            let confidence = objectness * best_score;
            if confidence < self.confidence_threshold {
                continue;
            }
            let (cx, cy, w, h) = (row[0], row[1], row[2], row[3]);
            let (x1, y1) = letterbox.to_frame(cx - w / 2.0, cy - h / 2.0);
            let (x2, y2) = letterbox.to_frame(cx + w / 2.0, cy + h / 2.0);
            candidates.push(Detection::new(
                x1.max(0.0),
                y1.max(0.0),
                x2.min(frame.width as f32),
                y2.min(frame.height as f32),
                confidence,
            ));
        }

        Ok(non_max_suppression(candidates, self.nms_iou))
    }
}

fn non_max_suppression(mut detections: Vec<Detection>, iou_threshold: f32) -> Vec<Detection> {
    detections.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
    let mut keep: Vec<Detection> = Vec::with_capacity(detections.len());
    for det in detections {
        if keep.iter().all(|kept| kept.iou(&det) <= iou_threshold) {
            keep.push(det);
        }
    }
    keep
}

impl PersonDetector for TractBackend {
    fn name(&self) -> &'static str {
        "tract"
    }

    fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>> {
        let input = self.build_input(frame)?;
        let outputs = self
            .model
            .run(tvec!(input.into()))
            .context("ONNX inference failed")?;
        self.extract_people(outputs, frame)
    }
}
