//! Frame capture for the traffic monitor.
//!
//! Every reader runs on its own thread and forwards BGR8 frames over a bounded
//! channel of depth one. A frame that arrives while the previous one is still
//! unread is dropped, so no backlog builds up behind a slow consumer. A reader
//! ends after sending a single error: `Open` when the source never produced a
//! frame, `Ended` when it ran out cleanly, `Other` for any other failure.

mod ffmpeg;
mod source;
mod types;

#[cfg(feature = "opencv")]
mod camera;

pub use ffmpeg::{ffmpeg_args, spawn_ffmpeg_reader};
pub use source::{SourceKind, parse_device_index};
pub use types::{CaptureError, Frame, FrameFormat};

#[cfg(feature = "opencv")]
pub use camera::spawn_camera_reader;

/// Receiving side handed out by every reader.
pub type FrameReceiver = crossbeam_channel::Receiver<Result<Frame, CaptureError>>;
