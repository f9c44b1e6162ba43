use std::cmp::Ordering;

/// Single detection in frame pixel coordinates.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Detection {
    /// Corner box `[x1, y1, x2, y2]`.
    pub bbox: [f32; 4],
    pub score: f32,
    pub class_id: i64,
}

impl Detection {
    pub fn area(&self) -> f32 {
        box_area(&self.bbox)
    }
}

fn box_area(b: &[f32; 4]) -> f32 {
    (b[2] - b[0]).max(0.0) * (b[3] - b[1]).max(0.0)
}

/// Intersection over union of two corner boxes.
pub fn iou(a: &[f32; 4], b: &[f32; 4]) -> f32 {
    let x1 = a[0].max(b[0]);
    let y1 = a[1].max(b[1]);
    let x2 = a[2].min(b[2]);
    let y2 = a[3].min(b[3]);

    let inter = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
    let union = box_area(a) + box_area(b) - inter;
    if union <= 0.0 { 0.0 } else { inter / union }
}

/// Greedy class-aware NMS. Output is sorted by score, highest first.
pub fn non_max_suppression(mut detections: Vec<Detection>, iou_threshold: f32) -> Vec<Detection> {
    detections.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));

    let mut keep: Vec<Detection> = Vec::with_capacity(detections.len());
    for det in detections {
        if keep
            .iter()
            .filter(|kept| kept.class_id == det.class_id)
            .all(|kept| iou(&kept.bbox, &det.bbox) <= iou_threshold)
        {
            keep.push(det);
        }
    }
    keep
}

#[cfg(test)]
mod tests {
    use super::*;

    fn det(bbox: [f32; 4], score: f32, class_id: i64) -> Detection {
        Detection {
            bbox,
            score,
            class_id,
        }
    }

    #[test]
    fn iou_of_identical_boxes_is_one() {
        let b = [10.0, 10.0, 20.0, 20.0];
        assert!((iou(&b, &b) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn iou_of_disjoint_boxes_is_zero() {
        assert_eq!(iou(&[0.0, 0.0, 5.0, 5.0], &[6.0, 6.0, 9.0, 9.0]), 0.0);
    }

    #[test]
    fn iou_half_overlap() {
        // Two 10x10 boxes overlapping in a 5x10 strip: 50 / 150.
        let v = iou(&[0.0, 0.0, 10.0, 10.0], &[5.0, 0.0, 15.0, 10.0]);
        assert!((v - 1.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn nms_drops_overlapping_lower_scores() {
        let kept = non_max_suppression(
            vec![
                det([0.0, 0.0, 10.0, 10.0], 0.6, 2),
                det([1.0, 1.0, 10.0, 10.0], 0.9, 2),
                det([50.0, 50.0, 60.0, 60.0], 0.4, 2),
            ],
            0.5,
        );
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].score, 0.9);
        assert_eq!(kept[1].score, 0.4);
    }

    #[test]
    fn nms_keeps_overlaps_of_different_classes() {
        let kept = non_max_suppression(
            vec![
                det([0.0, 0.0, 10.0, 10.0], 0.8, 2),
                det([0.0, 0.0, 10.0, 10.0], 0.7, 7),
            ],
            0.5,
        );
        assert_eq!(kept.len(), 2);
    }
}
