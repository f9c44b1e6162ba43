//! Pipeline supervisor tying together capture, the processing worker and the
//! status server.
//!
//! A failed or exhausted video source stops the pipeline for good; the status
//! server keeps answering with the last snapshot until Ctrl+C.

use std::{
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, Ordering},
    },
    thread,
    time::{Duration, Instant},
};

use anyhow::{Context, Result, anyhow, bail};
use crossbeam_channel::{RecvTimeoutError, TrySendError};
use ml_core::ObjectDetector;
use tracing::{debug, error, info, warn};
use traffic_signal::SignalState;
use video_ingest::{CaptureError, FrameReceiver};

use crate::traffic::{
    config::{CaptureBackend, TrafficConfig},
    data::{SharedFrame, SharedSignal},
    processing::{DetectorFactory, FrameTask, spawn_processing_worker},
    server::{ServerState, spawn_status_server},
    telemetry,
};

const CAPTURE_POLL: Duration = Duration::from_millis(200);
const WORK_QUEUE_DEPTH: usize = 2;

enum StopReason {
    Shutdown,
    SourceEnded,
    CaptureFailed(CaptureError),
    ProcessingStopped,
}

/// Run the monitor until the source stops and Ctrl+C is pressed.
pub fn run(config: TrafficConfig) -> Result<()> {
    let shutdown = Arc::new(AtomicBool::new(false));
    install_shutdown_handler(shutdown.clone())?;

    let metrics_handle = match telemetry::init_metrics_recorder() {
        Ok(handle) => Some(handle.clone()),
        Err(err) => {
            warn!("Prometheus metrics disabled: {err:#}");
            None
        }
    };

    let pipeline_span = tracing::info_span!(
        "traffic.pipeline",
        source = %config.source_uri,
        width = config.width,
        height = config.height,
        detector = config.detector_size,
        frame_skip = config.frame_skip,
    );
    let _pipeline_guard = pipeline_span.enter();

    let signal: SharedSignal = Arc::new(Mutex::new(SignalState::new(
        config.timing,
        Instant::now(),
    )));
    let shared: SharedFrame = Arc::new(Mutex::new(None));
    let running = Arc::new(AtomicBool::new(true));

    let (work_tx, work_rx) = crossbeam_channel::bounded::<FrameTask>(WORK_QUEUE_DEPTH);
    let (init_tx, init_rx) = crossbeam_channel::bounded(1);
    let worker = spawn_processing_worker(
        detector_factory(&config),
        signal.clone(),
        config.jpeg_quality,
        work_rx,
        shared.clone(),
        init_tx,
        running.clone(),
    )
    .context("Failed to spawn processing worker")?;

    match init_rx.recv() {
        Ok(Ok(())) => {}
        Ok(Err(err)) => {
            let _ = worker.join();
            bail!(err);
        }
        Err(err) => {
            let _ = worker.join();
            bail!("Processing thread failed to initialise detector: {err}");
        }
    }

    let receiver = start_capture(&config)?;
    debug!(
        "Capture source: {} ({:?}, {:?} backend)",
        config.source_uri, config.source_kind, config.backend
    );

    let server = spawn_status_server(
        config.bind,
        ServerState {
            latest: shared.clone(),
            signal: signal.clone(),
            running: running.clone(),
            metrics: metrics_handle,
        },
    )
    .context("Failed to start status server")?;
    info!(
        "Dashboard at http://{}/ (stream /video_feed, status /traffic_status)",
        config.bind
    );

    let reason = capture_loop(&config, &receiver, &work_tx, &running, &shutdown);

    running.store(false, Ordering::SeqCst);
    drop(work_tx);
    drop(receiver);
    if worker.join().is_err() {
        error!("Processing worker panicked");
    }

    match &reason {
        StopReason::Shutdown => {}
        StopReason::SourceEnded => info!("Video source ended; press Ctrl+C to exit"),
        StopReason::CaptureFailed(err) => {
            error!("Capture error: {err}; press Ctrl+C to exit")
        }
        StopReason::ProcessingStopped => {
            error!("Processing stopped; press Ctrl+C to exit")
        }
    }
    while !shutdown.load(Ordering::Relaxed) {
        thread::sleep(CAPTURE_POLL);
    }

    info!("Stopping traffic monitor");
    server.stop();

    match reason {
        StopReason::CaptureFailed(err) => Err(anyhow!(err).context("Video capture failed")),
        StopReason::ProcessingStopped => bail!("Frame processing stopped unexpectedly"),
        StopReason::Shutdown | StopReason::SourceEnded => Ok(()),
    }
}

/// Route Ctrl+C to `shutdown`. Without a handler the pipeline could never be
/// stopped once the source ends, so failure here is fatal.
fn install_shutdown_handler(shutdown: Arc<AtomicBool>) -> Result<()> {
    ctrlc::set_handler(move || shutdown.store(true, Ordering::SeqCst))
        .context("Failed to install Ctrl+C handler")
}

/// Receive frames and dispatch every `frame_skip`-th one to the worker.
fn capture_loop(
    config: &TrafficConfig,
    receiver: &FrameReceiver,
    work_tx: &crossbeam_channel::Sender<FrameTask>,
    running: &AtomicBool,
    shutdown: &AtomicBool,
) -> StopReason {
    let mut frame_number: u64 = 0;
    let mut smoothed_fps: f32 = 0.0;
    let mut last_instant = Instant::now();
    let mut dropped_frames: u64 = 0;

    loop {
        if shutdown.load(Ordering::Relaxed) {
            return StopReason::Shutdown;
        }
        if !running.load(Ordering::Relaxed) {
            return StopReason::ProcessingStopped;
        }

        let frame = match receiver.recv_timeout(CAPTURE_POLL) {
            Ok(Ok(frame)) => frame,
            Ok(Err(CaptureError::Ended)) => return StopReason::SourceEnded,
            Ok(Err(err)) => return StopReason::CaptureFailed(err),
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => return StopReason::SourceEnded,
        };

        frame_number = frame_number.wrapping_add(1);
        let now = Instant::now();
        let elapsed = now.duration_since(last_instant).as_secs_f32();
        last_instant = now;
        if elapsed > 0.0 {
            smoothed_fps = smooth_fps(smoothed_fps, 1.0 / elapsed);
        }
        metrics::gauge!("traffic_capture_fps").set(smoothed_fps as f64);

        if frame_number % 100 == 0 {
            debug!(
                "Capture heartbeat: frame #{}, {:.1} fps, dropped {}",
                frame_number, smoothed_fps, dropped_frames
            );
        }

        if !should_process(frame_number, config.frame_skip) {
            continue;
        }

        let task = FrameTask {
            frame,
            frame_number,
            fps: smoothed_fps,
            enqueued_at: Instant::now(),
        };
        match work_tx.try_send(task) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                dropped_frames = dropped_frames.wrapping_add(1);
                metrics::counter!("traffic_dropped_frames_total").increment(1);
                debug!("Dropping frame #{frame_number} (processing backlog)");
            }
            Err(TrySendError::Disconnected(_)) => {
                error!("Processing thread terminated unexpectedly");
                return StopReason::ProcessingStopped;
            }
        }
    }
}

/// Exponential moving average, seeded by the first sample.
fn smooth_fps(previous: f32, instant: f32) -> f32 {
    if previous == 0.0 {
        instant
    } else {
        0.9 * previous + 0.1 * instant
    }
}

fn should_process(frame_number: u64, frame_skip: u64) -> bool {
    frame_skip <= 1 || frame_number % frame_skip == 0
}

fn start_capture(config: &TrafficConfig) -> Result<FrameReceiver> {
    let size = (config.width, config.height);
    match config.backend {
        CaptureBackend::Ffmpeg => video_ingest::spawn_ffmpeg_reader(&config.source_uri, size)
            .with_context(|| format!("Failed to start ffmpeg capture of {}", config.source_uri)),
        CaptureBackend::Opencv => start_opencv_capture(&config.source_uri, size),
    }
}

#[cfg(feature = "opencv")]
fn start_opencv_capture(uri: &str, size: (i32, i32)) -> Result<FrameReceiver> {
    video_ingest::spawn_camera_reader(uri, size)
        .with_context(|| format!("Failed to start OpenCV capture of {uri}"))
}

#[cfg(not(feature = "opencv"))]
fn start_opencv_capture(_uri: &str, _size: (i32, i32)) -> Result<FrameReceiver> {
    bail!("OpenCV capture requires building with `--features opencv`")
}

#[cfg(feature = "with-tch")]
fn detector_factory(config: &TrafficConfig) -> DetectorFactory {
    use ml_core::{
        detector::Detector,
        tch::{Cuda, Device},
    };

    let model_path = config.model_path.clone();
    let size = config.detector_size as i64;
    let params = config.yolo;
    let use_cpu = config.use_cpu;
    Box::new(move || -> Result<Box<dyn ObjectDetector>> {
        let device = if use_cpu {
            Device::Cpu
        } else {
            Device::cuda_if_available()
        };
        debug!(
            "CUDA available: {} (devices: {})",
            Cuda::is_available(),
            Cuda::device_count()
        );
        let detector = Detector::new(&model_path, device, (size, size))?.with_params(params);
        info!(
            "Detector loaded from {} on {:?} ({}x{} input)",
            model_path.display(),
            detector.device(),
            size,
            size
        );
        Ok(Box::new(detector))
    })
}

#[cfg(not(feature = "with-tch"))]
fn detector_factory(_config: &TrafficConfig) -> DetectorFactory {
    Box::new(|| -> Result<Box<dyn ObjectDetector>> {
        bail!(
            "traffic-vision was built without the `with-tch` feature; \
             rebuild with `--features with-tch` to run TorchScript models"
        )
    })
}
