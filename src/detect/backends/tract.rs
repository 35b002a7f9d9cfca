#![cfg(feature = "backend-tract")]

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use image::imageops::FilterType;
use tract_onnx::prelude::*;

use crate::detect::backend::DetectorBackend;
use crate::detect::result::{clean_label, BoundingBox, Detection};
use crate::frame::Frame;

/// Inference settings for `TractBackend`.
#[derive(Clone, Debug)]
pub struct TractSettings {
    /// Square model input edge in pixels.
    pub input_size: u32,
    pub confidence_threshold: f32,
    pub nms_threshold: f32,
    /// Class names indexed by model class id. Names are cleaned on load.
    pub class_names: Vec<String>,
}

/// Tract-based backend for YOLOv8-style ONNX detectors.
///
/// This backend loads a local model file and performs inference on RGB frames.
/// Output is expected as `[1, 4 + num_classes, num_anchors]` with centre-format
/// boxes in model input pixels.
pub struct TractBackend {
    model: SimplePlan<TypedFact, Box<dyn TypedOp>>,
    settings: TractSettings,
}

impl TractBackend {
    /// Load an ONNX model from disk and prepare it for inference.
    pub fn new<P: AsRef<Path>>(model_path: P, mut settings: TractSettings) -> Result<Self> {
        let model_path = model_path.as_ref();
        if settings.class_names.is_empty() {
            return Err(anyhow!("tract backend requires at least one class name"));
        }
        settings.class_names = settings
            .class_names
            .iter()
            .map(|name| clean_label(name))
            .collect();
        let size = settings.input_size as usize;
        let model = tract_onnx::onnx()
            .model_for_path(model_path)
            .with_context(|| format!("failed to load ONNX model from {}", model_path.display()))?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(f32::datum_type(), tvec!(1, 3, size, size)),
            )
            .context("failed to set input fact")?
            .into_optimized()
            .context("failed to optimize ONNX model")?
            .into_runnable()
            .context("failed to build runnable ONNX model")?;

        Ok(Self { model, settings })
    }

    fn build_input(&self, frame: &Frame) -> Result<Tensor> {
        let size = self.settings.input_size;
        let resized = image::imageops::resize(&frame.to_image()?, size, size, FilterType::Triangle);
        let edge = size as usize;
        let input = tract_ndarray::Array4::from_shape_fn((1, 3, edge, edge), |(_, c, y, x)| {
            resized.get_pixel(x as u32, y as u32)[c] as f32 / 255.0
        });
        Ok(input.into_tensor())
    }
}

impl DetectorBackend for TractBackend {
    fn name(&self) -> &'static str {
        "tract"
    }

    fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>> {
        let input = self.build_input(frame)?;
        let outputs = self
            .model
            .run(tvec!(input.into()))
            .context("ONNX inference failed")?;
        let output = outputs
            .first()
            .ok_or_else(|| anyhow!("model produced no outputs"))?;
        let view = output
            .to_array_view::<f32>()
            .context("model output tensor was not f32")?;
        let shape = view.shape().to_vec();
        if shape.len() != 3 || shape[0] != 1 || shape[1] < 5 {
            return Err(anyhow!("unexpected model output shape {:?}", shape));
        }
        let values: Vec<f32> = view.iter().copied().collect();
        decode_yolo_output(
            &values,
            shape[1],
            shape[2],
            &self.settings,
            (frame.width, frame.height),
        )
    }
}

struct Candidate {
    class_id: usize,
    confidence: f32,
    bbox: BoundingBox,
}

/// Decode a flat `[channels, anchors]` YOLO head into pixel-space detections.
fn decode_yolo_output(
    values: &[f32],
    channels: usize,
    anchors: usize,
    settings: &TractSettings,
    frame_size: (u32, u32),
) -> Result<Vec<Detection>> {
    if values.len() != channels * anchors {
        return Err(anyhow!(
            "model output length {} does not match {}x{}",
            values.len(),
            channels,
            anchors
        ));
    }
    let num_classes = channels - 4;
    if num_classes > settings.class_names.len() {
        return Err(anyhow!(
            "model reports {} classes but only {} class names are configured",
            num_classes,
            settings.class_names.len()
        ));
    }
    let at = |c: usize, i: usize| values[c * anchors + i];
    let scale_x = frame_size.0 as f32 / settings.input_size as f32;
    let scale_y = frame_size.1 as f32 / settings.input_size as f32;

    let mut candidates = Vec::new();
    for i in 0..anchors {
        let mut best = (0usize, 0.0f32);
        for c in 0..num_classes {
            let score = at(4 + c, i);
            if score > best.1 {
                best = (c, score);
            }
        }
        if best.1 < settings.confidence_threshold {
            continue;
        }
        let (cx, cy, w, h) = (at(0, i), at(1, i), at(2, i), at(3, i));
        let clamp_x = |v: f32| (v * scale_x).round().clamp(0.0, frame_size.0 as f32) as i32;
        let clamp_y = |v: f32| (v * scale_y).round().clamp(0.0, frame_size.1 as f32) as i32;
        candidates.push(Candidate {
            class_id: best.0,
            confidence: best.1,
            bbox: BoundingBox::new(
                clamp_x(cx - w / 2.0),
                clamp_y(cy - h / 2.0),
                clamp_x(cx + w / 2.0),
                clamp_y(cy + h / 2.0),
            ),
        });
    }

    candidates.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
    let mut kept: Vec<Candidate> = Vec::new();
    for cand in candidates {
        let suppressed = kept.iter().any(|k| {
            k.class_id == cand.class_id && k.bbox.iou(&cand.bbox) >= settings.nms_threshold
        });
        if !suppressed {
            kept.push(cand);
        }
    }

    Ok(kept
        .into_iter()
        .map(|c| Detection {
            label: settings.class_names[c.class_id].clone(),
            bbox: c.bbox,
        })
        .collect())
}
