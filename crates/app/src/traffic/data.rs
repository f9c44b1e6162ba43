use std::sync::{Arc, Mutex};

use actix_web::web::Bytes;
use ml_core::VehicleDetection;
use serde::Serialize;
use traffic_signal::{SignalColor, SignalState};

/// Body of `/traffic_status`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub(crate) struct TrafficStatus {
    pub(crate) traffic_light: SignalColor,
    pub(crate) vehicle_count: usize,
}

/// Latest processed frame as served over HTTP.
pub(crate) struct FramePacket {
    pub(crate) jpeg: Bytes,
    pub(crate) vehicles: Vec<VehicleDetection>,
    pub(crate) status: TrafficStatus,
    pub(crate) timestamp_ms: i64,
    pub(crate) frame_number: u64,
    pub(crate) fps: f32,
}

/// Body of `/detections`.
#[derive(Serialize)]
pub(crate) struct DetectionsResponse<'a> {
    pub(crate) timestamp_ms: i64,
    pub(crate) frame_number: u64,
    pub(crate) fps: f32,
    pub(crate) vehicle_count: usize,
    pub(crate) vehicles: &'a [VehicleDetection],
}

pub(crate) type SharedFrame = Arc<Mutex<Option<Arc<FramePacket>>>>;
pub(crate) type SharedSignal = Arc<Mutex<SignalState>>;
