//! `ffmpeg` subprocess reader decoding any supported source to raw BGR8.

use std::{
    io::{ErrorKind, Read},
    process::{Child, Command, Stdio},
    thread,
};

use anyhow::anyhow;
use chrono::Utc;
use crossbeam_channel::{Sender, TrySendError, bounded};
use tracing::{debug, warn};

use crate::{
    FrameReceiver,
    source::{SourceKind, parse_device_index},
    types::{CaptureError, Frame, FrameFormat},
};

/// Build the ffmpeg argument list for `uri`, scaled to `target_size`.
pub fn ffmpeg_args(uri: &str, target_size: (i32, i32)) -> Vec<String> {
    let mut args: Vec<String> = ["-hide_banner", "-loglevel", "error"]
        .into_iter()
        .map(String::from)
        .collect();

    match SourceKind::from_uri(uri) {
        SourceKind::Device => {
            let device = match parse_device_index(uri) {
                Some(index) => format!("/dev/video{index}"),
                None => uri.to_string(),
            };
            args.extend(["-f", "video4linux2", "-i"].map(String::from));
            args.push(device);
        }
        SourceKind::Http => {
            args.extend(["-fflags", "nobuffer", "-flags", "low_delay", "-i"].map(String::from));
            args.push(uri.to_string());
        }
        SourceKind::Rtsp => {
            args.extend(
                [
                    "-rtsp_transport",
                    "tcp",
                    "-fflags",
                    "nobuffer",
                    "-flags",
                    "low_delay",
                    "-max_delay",
                    "0",
                    "-i",
                ]
                .map(String::from),
            );
            args.push(uri.to_string());
        }
        SourceKind::File => {
            // Pace files at their native frame rate.
            args.extend(["-re", "-i"].map(String::from));
            args.push(uri.to_string());
        }
    }

    args.extend(["-an", "-vf"].map(String::from));
    args.push(format!("scale={}:{}", target_size.0, target_size.1));
    args.extend(["-pix_fmt", "bgr24", "-f", "rawvideo", "-"].map(String::from));
    args
}

/// Spawn `ffmpeg` for `uri` and stream its decoded frames from a background thread.
pub fn spawn_ffmpeg_reader(
    uri: &str,
    target_size: (i32, i32),
) -> Result<FrameReceiver, CaptureError> {
    if target_size.0 <= 0 || target_size.1 <= 0 {
        return Err(CaptureError::Other(anyhow!(
            "invalid capture size {}x{}",
            target_size.0,
            target_size.1
        )));
    }

    let mut cmd = Command::new("ffmpeg");
    cmd.args(ffmpeg_args(uri, target_size));
    spawn_process_reader(cmd, uri, target_size)
}

/// Run `cmd` and forward raw BGR8 frames of `target_size` from its stdout.
fn spawn_process_reader(
    mut cmd: Command,
    uri: &str,
    target_size: (i32, i32),
) -> Result<FrameReceiver, CaptureError> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit());

    let mut child = cmd.spawn().map_err(|err| {
        CaptureError::Other(anyhow!("failed to spawn ffmpeg for {uri:?}: {err}"))
    })?;
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| CaptureError::Other(anyhow!("failed to capture ffmpeg stdout")))?;

    let (tx, rx) = bounded(1);
    let uri = uri.to_string();
    thread::Builder::new()
        .name("ffmpeg-reader".into())
        .spawn(move || {
            if let Err(err) = ffmpeg_loop(stdout, child, &uri, target_size, &tx) {
                let _ = tx.send(Err(err));
            }
        })
        .map_err(|err| CaptureError::Other(err.into()))?;

    Ok(rx)
}

/// How the frame reader stopped.
#[derive(Debug)]
enum ReadOutcome {
    /// Stdout closed after `frames` complete frames.
    Eof { frames: u64 },
    ConsumerGone,
}

fn ffmpeg_loop(
    stdout: impl Read,
    mut child: Child,
    uri: &str,
    target_size: (i32, i32),
    tx: &Sender<Result<Frame, CaptureError>>,
) -> Result<(), CaptureError> {
    let outcome = read_frames(stdout, target_size, tx);

    match outcome {
        Ok(ReadOutcome::Eof { frames }) => {
            let exited_cleanly = match child.wait() {
                Ok(status) => {
                    if !status.success() {
                        warn!("ffmpeg exited with {status}");
                    }
                    status.success()
                }
                Err(err) => {
                    warn!("failed to wait for ffmpeg: {err}");
                    false
                }
            };
            Err(eof_error(uri, frames, exited_cleanly))
        }
        other => {
            if let Err(err) = child.kill() {
                warn!("failed to stop ffmpeg: {err}");
            }
            let _ = child.wait();
            other.map(|_| ())
        }
    }
}

/// Forward complete frames from `stdout` until it closes or the consumer leaves.
///
/// A frame arriving while the previous one is still unread is dropped.
fn read_frames(
    mut stdout: impl Read,
    target_size: (i32, i32),
    tx: &Sender<Result<Frame, CaptureError>>,
) -> Result<ReadOutcome, CaptureError> {
    let frame_bytes = (target_size.0 as usize) * (target_size.1 as usize) * 3;
    let mut buffer = vec![0u8; frame_bytes];
    let mut frames: u64 = 0;
    let mut skipped: u64 = 0;

    loop {
        match stdout.read_exact(&mut buffer) {
            Ok(()) => {
                frames += 1;
                let frame = Frame {
                    data: buffer.clone(),
                    width: target_size.0,
                    height: target_size.1,
                    timestamp_ms: Utc::now().timestamp_millis(),
                    format: FrameFormat::Bgr8,
                };
                match tx.try_send(Ok(frame)) {
                    Ok(()) => {}
                    Err(TrySendError::Full(_)) => {
                        skipped = skipped.wrapping_add(1);
                        if skipped % 100 == 0 {
                            debug!(skipped, "ffmpeg reader skipped frames while consumer was busy");
                        }
                    }
                    Err(TrySendError::Disconnected(_)) => return Ok(ReadOutcome::ConsumerGone),
                }
            }
            Err(err) if err.kind() == ErrorKind::UnexpectedEof => {
                return Ok(ReadOutcome::Eof { frames });
            }
            Err(err) => return Err(CaptureError::Other(err.into())),
        }
    }
}

/// Classify the end of ffmpeg's output.
///
/// No frame at all means the source never opened; a failing exit status after
/// some frames is a decode error; only a clean exit is the end of the source.
fn eof_error(uri: &str, frames: u64, exited_cleanly: bool) -> CaptureError {
    if frames == 0 {
        CaptureError::Open {
            uri: uri.to_string(),
        }
    } else if !exited_cleanly {
        CaptureError::Other(anyhow!("ffmpeg failed after {frames} frames from {uri:?}"))
    } else {
        CaptureError::Ended
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    #[test]
    fn device_index_maps_to_v4l_node() {
        let args = ffmpeg_args("0", (480, 360));
        let joined = args.join(" ");
        assert!(joined.contains("-f video4linux2 -i /dev/video0"));
        assert!(joined.ends_with("-an -vf scale=480:360 -pix_fmt bgr24 -f rawvideo -"));
    }

    #[test]
    fn network_sources_disable_buffering() {
        let http = ffmpeg_args("http://10.0.0.5:8080/video", (640, 480)).join(" ");
        assert!(http.contains("-fflags nobuffer"));
        assert!(http.contains("-i http://10.0.0.5:8080/video"));

        let rtsp = ffmpeg_args("rtsp://cam/live", (640, 480)).join(" ");
        assert!(rtsp.contains("-rtsp_transport tcp"));
    }

    #[test]
    fn files_are_paced() {
        let args = ffmpeg_args("clips/junction.mp4", (640, 480));
        let pos = args.iter().position(|a| a == "-re").expect("-re present");
        assert_eq!(args[pos + 1], "-i");
        assert_eq!(args[pos + 2], "clips/junction.mp4");
    }

    #[test]
    fn rejects_empty_capture_size() {
        assert!(spawn_ffmpeg_reader("0", (0, 480)).is_err());
    }

    const SIZE: (i32, i32) = (4, 2);
    const FRAME_BYTES: usize = 4 * 2 * 3;

    #[test]
    fn partial_trailing_frame_ends_the_stream() {
        let (tx, rx) = bounded(1);
        let bytes = Cursor::new(vec![7u8; FRAME_BYTES + FRAME_BYTES / 2]);

        let outcome = read_frames(bytes, SIZE, &tx).unwrap();

        assert!(matches!(outcome, ReadOutcome::Eof { frames: 1 }));
        let frame = rx.try_recv().unwrap().unwrap();
        assert_eq!(frame.data.len(), FRAME_BYTES);
        assert_eq!((frame.width, frame.height), SIZE);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn busy_consumer_keeps_the_unread_frame() {
        let (tx, rx) = bounded(1);
        let mut bytes = vec![1u8; FRAME_BYTES];
        bytes.extend(vec![2u8; FRAME_BYTES]);

        let outcome = read_frames(Cursor::new(bytes), SIZE, &tx).unwrap();

        assert!(matches!(outcome, ReadOutcome::Eof { frames: 2 }));
        let frame = rx.try_recv().unwrap().unwrap();
        assert!(frame.data.iter().all(|b| *b == 1));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn dropped_receiver_stops_reading() {
        let (tx, rx) = bounded(1);
        drop(rx);
        let outcome = read_frames(Cursor::new(vec![0u8; FRAME_BYTES * 3]), SIZE, &tx).unwrap();
        assert!(matches!(outcome, ReadOutcome::ConsumerGone));
    }

    #[test]
    fn eof_classification() {
        assert!(matches!(
            eof_error("/dev/video7", 0, false),
            CaptureError::Open { uri } if uri == "/dev/video7"
        ));
        assert!(matches!(eof_error("0", 0, true), CaptureError::Open { .. }));
        assert!(matches!(eof_error("0", 12, false), CaptureError::Other(_)));
        assert!(matches!(eof_error("0", 12, true), CaptureError::Ended));
    }

    #[cfg(unix)]
    fn shell(script: &str) -> Command {
        let mut cmd = Command::new("sh");
        cmd.args(["-c", script]);
        cmd
    }

    #[cfg(unix)]
    #[test]
    fn unopenable_source_reports_open_error() {
        let rx = spawn_process_reader(
            shell("echo 'No such file or directory' >&2; exit 1"),
            "/dev/video7",
            SIZE,
        )
        .unwrap();

        let err = rx.recv().unwrap().err().unwrap();
        assert!(matches!(err, CaptureError::Open { ref uri } if uri == "/dev/video7"));
        assert!(rx.recv().is_err());
    }

    #[cfg(unix)]
    #[test]
    fn clean_exit_after_frames_is_end_of_source() {
        let rx = spawn_process_reader(shell("head -c 24 /dev/zero"), "clip.mp4", SIZE).unwrap();

        assert!(rx.recv().unwrap().is_ok());
        assert!(matches!(rx.recv().unwrap(), Err(CaptureError::Ended)));
    }

    #[cfg(unix)]
    #[test]
    fn failing_exit_after_frames_is_an_error() {
        let rx = spawn_process_reader(shell("head -c 24 /dev/zero; exit 3"), "clip.mp4", SIZE)
            .unwrap();

        assert!(rx.recv().unwrap().is_ok());
        assert!(matches!(rx.recv().unwrap(), Err(CaptureError::Other(_))));
    }
}
