//! Object Detection Module
//!
//! Runs a COCO-trained Faster R-CNN (torchvision ONNX export) through ONNX Runtime.
//! The export takes a single `[3, H, W]` float image in `[0, 1]` and yields
//! three outputs in order: `boxes [N, 4]`, `labels [N]` and `scores [N]`.
//!
//! No filtering happens here; every proposal the model emits is returned.

use image::RgbImage;
use ndarray::Array3;
use ort::session::Session;
use ort::value::Tensor;
use std::path::Path;
use std::sync::Mutex;

use super::Detector;
use crate::errors::{AppError, AppResult};

/// Region of a detection, in source image pixels.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BoundingBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

/// One proposal as emitted by the model.
#[derive(Debug, Clone, PartialEq)]
pub struct RawDetection {
    pub class_index: i64,
    pub confidence: f32,
    pub region: BoundingBox,
}

/// Class ids as the export emits them. torchvision writes int64, some
/// converted graphs narrow them to int32.
#[derive(Debug, Clone, Copy)]
pub enum Labels<'a> {
    I64(&'a [i64]),
    I32(&'a [i32]),
}

impl Labels<'_> {
    fn len(&self) -> usize {
        match self {
            Labels::I64(v) => v.len(),
            Labels::I32(v) => v.len(),
        }
    }

    fn get(&self, i: usize) -> i64 {
        match self {
            Labels::I64(v) => v[i],
            Labels::I32(v) => v[i] as i64,
        }
    }
}

/// Turn the three raw output tensors into detections in source pixel space.
///
/// `boxes` is the flat `[N, 4]` buffer described by `boxes_shape`.
pub fn decode_outputs(
    boxes_shape: &[i64],
    boxes: &[f32],
    labels: Labels<'_>,
    scores: &[f32],
    scale_x: f32,
    scale_y: f32,
) -> AppResult<Vec<RawDetection>> {
    let rows = match boxes_shape {
        [n, 4] if *n >= 0 && (*n as usize) * 4 == boxes.len() => *n as usize,
        // An empty result may come back with the second axis collapsed
        [0, _] | [0] if boxes.is_empty() => 0,
        _ => {
            return Err(AppError::Inference(format!(
                "unexpected boxes shape {:?}",
                boxes_shape
            )))
        }
    };

    if labels.len() != rows || scores.len() != rows {
        return Err(AppError::Inference(format!(
            "mismatched output shapes: boxes {:?}, labels {}, scores {}",
            boxes_shape,
            labels.len(),
            scores.len()
        )));
    }

    let detections = boxes
        .chunks_exact(4)
        .zip(scores)
        .enumerate()
        .map(|(i, (b, &confidence))| RawDetection {
            class_index: labels.get(i),
            confidence,
            region: BoundingBox {
                x1: b[0] * scale_x,
                y1: b[1] * scale_y,
                x2: b[2] * scale_x,
                y2: b[3] * scale_y,
            },
        })
        .collect();
    Ok(detections)
}

pub struct FasterRcnnDetector {
    session: Mutex<Session>,
    input_size: u32,
}

impl FasterRcnnDetector {
    /// Build an ONNX Runtime session for the model at `model_path`.
    pub fn load(model_path: &Path, input_size: u32) -> AppResult<Self> {
        log::info!(
            "Loading Faster R-CNN model from {:?} ({}x{} input)",
            model_path,
            input_size,
            input_size
        );

        if !model_path.exists() {
            return Err(AppError::ModelUnavailable(format!(
                "model file {:?} does not exist",
                model_path
            )));
        }

        let session = Session::builder()
            .map_err(|e| AppError::ModelUnavailable(format!("Failed to create session: {}", e)))?
            .commit_from_file(model_path)
            .map_err(|e| AppError::ModelUnavailable(format!("Failed to load model: {}", e)))?;

        if session.outputs().len() < 3 {
            return Err(AppError::ModelUnavailable(format!(
                "expected boxes, labels and scores outputs, model has {}",
                session.outputs().len()
            )));
        }

        log::info!("Faster R-CNN model loaded successfully");
        Ok(Self {
            session: Mutex::new(session),
            input_size,
        })
    }

    fn to_tensor(&self, image: &RgbImage) -> Array3<f32> {
        let side = self.input_size;
        let resized =
            image::imageops::resize(image, side, side, image::imageops::FilterType::Triangle);

        // ToTensor semantics: CHW, scaled to [0, 1], no mean/std normalization
        Array3::from_shape_fn((3, side as usize, side as usize), |(c, y, x)| {
            resized.get_pixel(x as u32, y as u32)[c] as f32 / 255.0
        })
    }
}

impl Detector for FasterRcnnDetector {
    fn detect(&self, image: &RgbImage) -> AppResult<Vec<RawDetection>> {
        let (width, height) = image.dimensions();
        let input = Tensor::from_array(self.to_tensor(image))?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| AppError::Inference("Session lock poisoned".to_string()))?;
        let outputs = session.run(ort::inputs![input])?;
        if outputs.len() < 3 {
            return Err(AppError::Inference(format!(
                "expected boxes, labels and scores outputs, got {} output(s)",
                outputs.len()
            )));
        }

        let (boxes_shape, boxes) = outputs[0].try_extract_tensor::<f32>()?;
        let (_, scores) = outputs[2].try_extract_tensor::<f32>()?;
        let scale_x = width as f32 / self.input_size as f32;
        let scale_y = height as f32 / self.input_size as f32;

        let detections = match outputs[1].try_extract_tensor::<i64>() {
            Ok((_, labels)) => decode_outputs(
                boxes_shape,
                boxes,
                Labels::I64(labels),
                scores,
                scale_x,
                scale_y,
            )?,
            Err(_) => {
                let (_, labels) = outputs[1].try_extract_tensor::<i32>()?;
                decode_outputs(
                    boxes_shape,
                    boxes,
                    Labels::I32(labels),
                    scores,
                    scale_x,
                    scale_y,
                )?
            }
        };

        log::debug!("Detector produced {} raw proposal(s)", detections.len());
        Ok(detections)
    }
}
