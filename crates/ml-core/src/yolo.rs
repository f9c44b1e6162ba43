//! Decoding for the YOLOv8 detection head.
//!
//! An exported YOLOv8 model emits a single `[1, 4 + classes, predictions]`
//! tensor. Each column is one candidate: center-x, center-y, width, height in
//! detector input pixels followed by one score per class. There is no separate
//! objectness channel.

use anyhow::{Result, bail};

use crate::{Detection, non_max_suppression};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct YoloParams {
    pub conf_threshold: f32,
    pub iou_threshold: f32,
    pub max_detections: usize,
}

impl Default for YoloParams {
    fn default() -> Self {
        Self {
            conf_threshold: 0.25,
            iou_threshold: 0.7,
            max_detections: 300,
        }
    }
}

/// Decode a row-major `[channels, predictions]` head output.
///
/// `scale` maps detector input pixels back to frame pixels (x, y).
pub fn decode_yolov8(
    output: &[f32],
    channels: usize,
    predictions: usize,
    params: &YoloParams,
    scale: (f32, f32),
) -> Result<Vec<Detection>> {
    if channels < 5 {
        bail!("detector output requires at least 5 channels (box + 1 class), got {channels}");
    }
    if output.len() != channels * predictions {
        bail!(
            "detector output has {} values, expected {channels}x{predictions}",
            output.len()
        );
    }

    let at = |channel: usize, pred: usize| output[channel * predictions + pred];
    let (sx, sy) = scale;

    let mut candidates = Vec::new();
    for pred in 0..predictions {
        let mut best_class = 0usize;
        let mut best_score = f32::MIN;
        for class in 0..channels - 4 {
            let score = at(4 + class, pred);
            if score > best_score {
                best_score = score;
                best_class = class;
            }
        }
        if best_score < params.conf_threshold {
            continue;
        }

        let cx = at(0, pred);
        let cy = at(1, pred);
        let half_w = at(2, pred) / 2.0;
        let half_h = at(3, pred) / 2.0;
        candidates.push(Detection {
            bbox: [
                (cx - half_w) * sx,
                (cy - half_h) * sy,
                (cx + half_w) * sx,
                (cy + half_h) * sy,
            ],
            score: best_score,
            class_id: best_class as i64,
        });
    }

    let mut kept = non_max_suppression(candidates, params.iou_threshold);
    kept.truncate(params.max_detections);
    Ok(kept)
}
