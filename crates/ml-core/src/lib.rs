//! Object detection building blocks for the traffic monitor.
//!
//! The pure parts (box math, YOLOv8 head decoding, vehicle filtering and
//! preprocessing) build without libtorch. Enable the `with-tch` feature to pull
//! in the TorchScript-backed [`detector::Detector`].

pub mod detection;
pub mod preprocess;
pub mod vehicles;
pub mod yolo;

#[cfg(feature = "with-tch")]
pub mod detector;

pub use detection::{Detection, iou, non_max_suppression};
pub use vehicles::{VehicleClass, VehicleDetection, filter_vehicles};
pub use yolo::{YoloParams, decode_yolov8};

#[cfg(feature = "with-tch")]
pub use tch;

/// Anything that turns a BGR8 frame into detections in frame pixel space.
pub trait ObjectDetector {
    fn detect(&mut self, bgr: &[u8], width: i32, height: i32) -> anyhow::Result<Vec<Detection>>;
}
