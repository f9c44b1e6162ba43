//! OpenCV-backed camera capture.

use std::thread;

use anyhow::anyhow;
use chrono::Utc;
use crossbeam_channel::{Sender, TrySendError, bounded};
use opencv::{
    core::{self, MatTraitConstManual},
    prelude::*,
    videoio::{self, VideoCapture},
};
use tracing::warn;

use crate::{
    FrameReceiver,
    source::parse_device_index,
    types::{CaptureError, Frame, FrameFormat},
};

/// Spawn a background thread that reads frames from `uri` until the first failed read.
///
/// Frames are resized to `target_size` (width, height) before being forwarded.
pub fn spawn_camera_reader(
    uri: &str,
    target_size: (i32, i32),
) -> Result<FrameReceiver, CaptureError> {
    let (tx, rx) = bounded(1);
    let uri = uri.to_string();

    thread::Builder::new()
        .name("opencv-reader".into())
        .spawn(move || {
            if let Err(err) = capture_loop(&uri, target_size, tx.clone()) {
                let _ = tx.send(Err(err));
            }
        })
        .map_err(|err| CaptureError::Other(err.into()))?;

    Ok(rx)
}

fn cv_err(err: opencv::Error) -> CaptureError {
    CaptureError::Other(anyhow!("opencv: {err}"))
}

fn capture_loop(
    uri: &str,
    target_size: (i32, i32),
    tx: Sender<Result<Frame, CaptureError>>,
) -> Result<(), CaptureError> {
    let mut cap = open_video_capture(uri)?;
    configure_camera(&mut cap, target_size);

    let mut frame = Mat::default();
    let mut scratch = Mat::default();
    let (target_w, target_h) = target_size;

    loop {
        // Drop whatever the driver buffered so the frame we read is current.
        let _ = cap.grab();
        if !cap.read(&mut frame).map_err(cv_err)? {
            return Err(CaptureError::Ended);
        }
        let size = frame.size().map_err(cv_err)?;
        if size.width <= 0 || size.height <= 0 {
            return Err(CaptureError::Ended);
        }

        let working = if size.width != target_w || size.height != target_h {
            opencv::imgproc::resize(
                &frame,
                &mut scratch,
                core::Size {
                    width: target_w,
                    height: target_h,
                },
                0.0,
                0.0,
                opencv::imgproc::INTER_LINEAR,
            )
            .map_err(cv_err)?;
            &scratch
        } else {
            &frame
        };

        let data = working.data_bytes().map_err(cv_err)?.to_vec();
        let sent = tx.try_send(Ok(Frame {
            data,
            width: target_w,
            height: target_h,
            timestamp_ms: Utc::now().timestamp_millis(),
            format: FrameFormat::Bgr8,
        }));
        if let Err(TrySendError::Disconnected(_)) = sent {
            return Ok(());
        }
    }
}

/// Open a camera either by device index or by URI/path.
fn open_video_capture(uri: &str) -> Result<VideoCapture, CaptureError> {
    if let Some(index) = parse_device_index(uri) {
        match VideoCapture::new(index, videoio::CAP_ANY) {
            Ok(cap) if cap.is_opened().map_err(cv_err)? => return Ok(cap),
            Ok(_) => warn!("camera #{index} did not open"),
            Err(err) => warn!("failed to open camera #{index}: {err}"),
        }
    }

    match VideoCapture::from_file(uri, videoio::CAP_ANY) {
        Ok(cap) if cap.is_opened().map_err(cv_err)? => Ok(cap),
        Ok(_) => Err(CaptureError::Open {
            uri: uri.to_string(),
        }),
        Err(err) => {
            warn!("failed to open {uri}: {err}");
            Err(CaptureError::Open {
                uri: uri.to_string(),
            })
        }
    }
}

fn configure_camera(cap: &mut VideoCapture, target_size: (i32, i32)) {
    let _ = cap.set(videoio::CAP_PROP_BUFFERSIZE, 1.0);
    let _ = cap.set(videoio::CAP_PROP_FRAME_WIDTH, target_size.0 as f64);
    let _ = cap.set(videoio::CAP_PROP_FRAME_HEIGHT, target_size.1 as f64);
}
