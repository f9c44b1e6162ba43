//! Processing worker: detection, vehicle counting, signal updates and
//! annotation for each dispatched frame.

use std::{
    io,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread,
    time::Instant,
};

use anyhow::{Context, Result, anyhow};
use crossbeam_channel::{Receiver, Sender};
use ml_core::{ObjectDetector, filter_vehicles};
use tracing::{debug, error, info};
use video_ingest::Frame;

use crate::traffic::{
    annotation::annotate_frame,
    data::{FramePacket, SharedFrame, SharedSignal, TrafficStatus},
};

/// Unit of work handed from the pipeline loop to the worker.
pub(crate) struct FrameTask {
    pub(crate) frame: Frame,
    pub(crate) frame_number: u64,
    pub(crate) fps: f32,
    pub(crate) enqueued_at: Instant,
}

pub(crate) type DetectorFactory = Box<dyn FnOnce() -> Result<Box<dyn ObjectDetector>> + Send>;

pub(crate) struct FrameProcessor {
    detector: Box<dyn ObjectDetector>,
    signal: SharedSignal,
    jpeg_quality: u8,
}

impl FrameProcessor {
    pub(crate) fn new(
        detector: Box<dyn ObjectDetector>,
        signal: SharedSignal,
        jpeg_quality: u8,
    ) -> Self {
        Self {
            detector,
            signal,
            jpeg_quality,
        }
    }

    pub(crate) fn process(&mut self, task: FrameTask) -> Result<FramePacket> {
        let frame = &task.frame;
        let _span = tracing::debug_span!("frame.process", frame = task.frame_number).entered();

        let detections = self
            .detector
            .detect(&frame.data, frame.width, frame.height)
            .context("Detector inference failed")?;
        let vehicles = filter_vehicles(&detections);
        let vehicle_count = vehicles.len();

        if tracing::enabled!(tracing::Level::DEBUG) {
            debug!(
                frame = task.frame_number,
                detections = detections.len(),
                vehicles = vehicle_count,
                "detections decoded"
            );
            for (idx, vehicle) in vehicles.iter().enumerate() {
                debug!(
                    "  #{idx}: {} conf={:.3} bbox={:?}",
                    vehicle.class.label(),
                    vehicle.score,
                    vehicle.bbox
                );
            }
        }

        let traffic_light = {
            let mut signal = self
                .signal
                .lock()
                .map_err(|_| anyhow!("signal state poisoned"))?;
            if let Some(step) = signal.advance(Instant::now(), vehicle_count) {
                info!(
                    from = %step.from,
                    to = %step.to,
                    hold_secs = step.hold.as_secs(),
                    vehicle_count,
                    "signal changed"
                );
                metrics::counter!("traffic_signal_transitions_total", "to" => step.to.as_str())
                    .increment(1);
            }
            signal.color()
        };

        let status = TrafficStatus {
            traffic_light,
            vehicle_count,
        };
        let jpeg = annotate_frame(frame, &vehicles, &status, self.jpeg_quality)?;

        metrics::gauge!("traffic_vehicle_count").set(vehicle_count as f64);
        metrics::gauge!("traffic_signal_color").set(traffic_light.code() as f64);
        metrics::counter!("traffic_frames_processed_total").increment(1);
        metrics::histogram!("traffic_processing_seconds")
            .record(task.enqueued_at.elapsed().as_secs_f64());

        Ok(FramePacket {
            jpeg: jpeg.into(),
            vehicles,
            status,
            timestamp_ms: frame.timestamp_ms,
            frame_number: task.frame_number,
            fps: task.fps,
        })
    }
}

/// Spawn the worker thread. The detector is built on the worker itself and
/// the outcome reported through `init_tx` before any frame is taken.
pub(crate) fn spawn_processing_worker(
    make_detector: DetectorFactory,
    signal: SharedSignal,
    jpeg_quality: u8,
    work_rx: Receiver<FrameTask>,
    shared: SharedFrame,
    init_tx: Sender<std::result::Result<(), String>>,
    running: Arc<AtomicBool>,
) -> io::Result<thread::JoinHandle<()>> {
    thread::Builder::new()
        .name("traffic-processing".into())
        .spawn(move || {
            let detector = match make_detector() {
                Ok(detector) => detector,
                Err(err) => {
                    let _ = init_tx.send(Err(format!("failed to load detector: {err:#}")));
                    return;
                }
            };
            if init_tx.send(Ok(())).is_err() {
                return;
            }
            drop(init_tx);

            let mut processor = FrameProcessor::new(detector, signal, jpeg_quality);
            for task in work_rx {
                if !running.load(Ordering::Relaxed) {
                    break;
                }
                match processor.process(task) {
                    Ok(packet) => match shared.lock() {
                        Ok(mut guard) => *guard = Some(Arc::new(packet)),
                        Err(_) => {
                            error!("Latest frame slot poisoned, stopping processing worker");
                            running.store(false, Ordering::SeqCst);
                            break;
                        }
                    },
                    Err(err) => {
                        error!("Frame processing error: {err:?}");
                        running.store(false, Ordering::SeqCst);
                        break;
                    }
                }
            }
        })
}

#[cfg(test)]
mod tests {
    use std::{
        sync::Mutex,
        time::{Duration, Instant},
    };

    use ml_core::Detection;
    use traffic_signal::{SignalColor, SignalState, SignalTiming};
    use video_ingest::FrameFormat;

    use super::*;

    struct FixedDetector(Vec<Detection>);

    impl ObjectDetector for FixedDetector {
        fn detect(&mut self, _bgr: &[u8], _w: i32, _h: i32) -> Result<Vec<Detection>> {
            Ok(self.0.clone())
        }
    }

    fn cars(n: usize, class_id: i64) -> Vec<Detection> {
        (0..n)
            .map(|i| Detection {
                bbox: [i as f32 * 10.0, 40.0, i as f32 * 10.0 + 8.0, 60.0],
                score: 0.8,
                class_id,
            })
            .collect()
    }

    fn task(frame_number: u64) -> FrameTask {
        FrameTask {
            frame: Frame {
                data: vec![0; 160 * 120 * 3],
                width: 160,
                height: 120,
                timestamp_ms: 1_700_000_000_000,
                format: FrameFormat::Bgr8,
            },
            frame_number,
            fps: 25.0,
            enqueued_at: Instant::now(),
        }
    }

    fn signal_started(ago: Duration) -> SharedSignal {
        let start = Instant::now().checked_sub(ago).expect("monotonic clock too young");
        Arc::new(Mutex::new(SignalState::new(SignalTiming::default(), start)))
    }

    #[test]
    fn counts_only_vehicles() {
        let mut detections = cars(3, 2);
        detections.extend(cars(4, 0));
        let signal = signal_started(Duration::ZERO);
        let mut processor = FrameProcessor::new(Box::new(FixedDetector(detections)), signal, 80);

        let packet = processor.process(task(7)).unwrap();
        assert_eq!(packet.status.vehicle_count, 3);
        assert_eq!(packet.status.traffic_light, SignalColor::Red);
        assert_eq!(packet.frame_number, 7);
        assert_eq!(packet.vehicles.len(), 3);
        assert_eq!(&packet.jpeg[..2], &[0xFF, 0xD8]);
    }

    #[test]
    fn expired_red_turns_green_with_heavy_traffic() {
        let signal = signal_started(Duration::from_secs(20));
        let mut processor =
            FrameProcessor::new(Box::new(FixedDetector(cars(10, 7))), signal.clone(), 80);

        let packet = processor.process(task(1)).unwrap();
        assert_eq!(packet.status.traffic_light, SignalColor::Green);
        assert_eq!(signal.lock().unwrap().hold(), Duration::from_secs(15));
    }

    #[test]
    fn worker_reports_detector_failure() {
        let (_work_tx, work_rx) = crossbeam_channel::bounded::<FrameTask>(1);
        let (init_tx, init_rx) = crossbeam_channel::bounded(1);
        let handle = spawn_processing_worker(
            Box::new(|| -> Result<Box<dyn ObjectDetector>> { Err(anyhow!("model missing")) }),
            signal_started(Duration::ZERO),
            80,
            work_rx,
            Arc::new(Mutex::new(None)),
            init_tx,
            Arc::new(AtomicBool::new(true)),
        )
        .unwrap();

        let outcome = init_rx.recv().unwrap();
        assert!(outcome.unwrap_err().contains("model missing"));
        handle.join().unwrap();
    }

    #[test]
    fn worker_publishes_latest_frame() {
        let (work_tx, work_rx) = crossbeam_channel::bounded::<FrameTask>(2);
        let (init_tx, init_rx) = crossbeam_channel::bounded(1);
        let shared: SharedFrame = Arc::new(Mutex::new(None));
        let handle = spawn_processing_worker(
            Box::new(|| -> Result<Box<dyn ObjectDetector>> {
                Ok(Box::new(FixedDetector(cars(2, 3))))
            }),
            signal_started(Duration::ZERO),
            80,
            work_rx,
            shared.clone(),
            init_tx,
            Arc::new(AtomicBool::new(true)),
        )
        .unwrap();

        assert!(init_rx.recv().unwrap().is_ok());
        work_tx.send(task(42)).unwrap();
        drop(work_tx);
        handle.join().unwrap();

        let latest = shared.lock().unwrap().clone().expect("frame published");
        assert_eq!(latest.frame_number, 42);
        assert_eq!(latest.status.vehicle_count, 2);
    }
}
