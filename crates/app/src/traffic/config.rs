//! Command line parsing and validation.
//!
//! `TrafficCliArgs` is the raw clap surface; `TrafficConfig` is the validated
//! form every stage reads.

use std::{net::SocketAddr, path::PathBuf};

use anyhow::{Result, bail};
use clap::{Parser, ValueEnum};
use ml_core::YoloParams;
use traffic_signal::SignalTiming;
use video_ingest::SourceKind;

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
/// Decoder used to pull frames from the source.
pub enum CaptureBackend {
    /// Spawn `ffmpeg` and read raw BGR frames from its stdout.
    Ffmpeg,
    /// OpenCV `VideoCapture` (requires the `opencv` feature).
    Opencv,
}

/// Count vehicles on a camera feed and drive a traffic signal from the count.
#[derive(Debug, Parser)]
#[command(name = "traffic-vision", version)]
pub struct TrafficCliArgs {
    /// Camera index, /dev/videoN, http(s)/rtsp URL or video file.
    #[arg(long = "source", value_name = "URI", default_value = "0")]
    pub source: String,
    /// TorchScript export of a YOLOv8 detector.
    #[arg(long = "model", value_name = "PATH", default_value = "models/yolov8n.torchscript")]
    pub model: PathBuf,
    /// Capture width in pixels.
    #[arg(long = "width", value_name = "PX", default_value_t = 640)]
    pub width: i32,
    /// Capture height in pixels.
    #[arg(long = "height", value_name = "PX", default_value_t = 480)]
    pub height: i32,
    /// Square detector input size; must be a multiple of 32.
    #[arg(long = "detector-size", value_name = "PX", default_value_t = 640)]
    pub detector_size: i32,
    /// Minimum class score for a detection.
    #[arg(long = "confidence", default_value_t = 0.25)]
    pub confidence: f32,
    /// IoU above which overlapping boxes of one class are merged.
    #[arg(long = "iou", default_value_t = 0.7)]
    pub iou: f32,
    /// JPEG quality of the streamed frames (1-100).
    #[arg(long = "jpeg-quality", value_name = "QUALITY", default_value_t = 80)]
    pub jpeg_quality: i32,
    /// Process every N-th captured frame.
    #[arg(long = "frame-skip", value_name = "N", default_value_t = 1)]
    pub frame_skip: u64,
    /// Address the HTTP server listens on.
    #[arg(long = "bind", value_name = "ADDR", default_value = "0.0.0.0:5000")]
    pub bind: SocketAddr,
    /// Force CPU inference even when CUDA is available.
    #[arg(long = "cpu", action = clap::ArgAction::SetTrue)]
    pub use_cpu: bool,
    #[arg(long = "backend", value_enum, default_value_t = CaptureBackend::Ffmpeg)]
    pub backend: CaptureBackend,
    /// Vehicle count that turns red into green.
    #[arg(long = "green-threshold", value_name = "N", default_value_t = 10)]
    pub green_threshold: usize,
    /// Vehicle count that turns red into yellow.
    #[arg(long = "yellow-threshold", value_name = "N", default_value_t = 5)]
    pub yellow_threshold: usize,
    /// Debug-level logging, including per-frame detections.
    #[arg(long = "verbose", action = clap::ArgAction::SetTrue)]
    pub verbose: bool,
}

#[derive(Clone, Debug)]
pub struct TrafficConfig {
    pub source_uri: String,
    pub source_kind: SourceKind,
    pub model_path: PathBuf,
    pub width: i32,
    pub height: i32,
    pub detector_size: i32,
    pub yolo: YoloParams,
    pub jpeg_quality: u8,
    pub frame_skip: u64,
    pub bind: SocketAddr,
    pub use_cpu: bool,
    pub backend: CaptureBackend,
    pub timing: SignalTiming,
    pub verbose: bool,
}

impl TryFrom<TrafficCliArgs> for TrafficConfig {
    type Error = anyhow::Error;

    fn try_from(args: TrafficCliArgs) -> Result<Self> {
        if args.width <= 0 || args.height <= 0 {
            bail!("Capture width and height must be positive integers");
        }
        if args.detector_size <= 0 || args.detector_size % 32 != 0 {
            bail!("--detector-size must be a positive multiple of 32");
        }
        if !(args.confidence > 0.0 && args.confidence <= 1.0) {
            bail!("--confidence must be in (0, 1]");
        }
        if !(args.iou > 0.0 && args.iou <= 1.0) {
            bail!("--iou must be in (0, 1]");
        }
        if !(1..=100).contains(&args.jpeg_quality) {
            bail!("--jpeg-quality must be an integer between 1 and 100");
        }
        if args.frame_skip == 0 {
            bail!("--frame-skip must be at least 1");
        }
        if args.backend == CaptureBackend::Opencv && !cfg!(feature = "opencv") {
            bail!("--backend opencv requires building with `--features opencv`");
        }

        let timing = SignalTiming {
            green_threshold: args.green_threshold,
            yellow_threshold: args.yellow_threshold,
            ..SignalTiming::default()
        };
        timing.validate()?;

        Ok(Self {
            source_kind: SourceKind::from_uri(&args.source),
            source_uri: args.source,
            model_path: args.model,
            width: args.width,
            height: args.height,
            detector_size: args.detector_size,
            yolo: YoloParams {
                conf_threshold: args.confidence,
                iou_threshold: args.iou,
                ..YoloParams::default()
            },
            jpeg_quality: args.jpeg_quality as u8,
            frame_skip: args.frame_skip,
            bind: args.bind,
            use_cpu: args.use_cpu,
            backend: args.backend,
            timing,
            verbose: args.verbose,
        })
    }
}
