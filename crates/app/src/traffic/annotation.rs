use anyhow::{Result, anyhow, bail};
use image::{Rgb, RgbImage, codecs::jpeg::JpegEncoder};
use ml_core::VehicleDetection;
use traffic_signal::SignalColor;
use video_ingest::{Frame, FrameFormat};

use crate::traffic::{
    data::TrafficStatus,
    draw::{draw_rect, draw_text, fill_rect, text_height, text_width},
};

const BOX_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
const LABEL_BACKGROUND: Rgb<u8> = Rgb([0, 0, 0]);
const SIGNAL_TEXT: Rgb<u8> = Rgb([255, 0, 0]);
const COUNT_TEXT: Rgb<u8> = Rgb([255, 255, 0]);
const HUD_SCALE: i32 = 2;
const HUD_LEFT: i32 = 20;
const HUD_SIGNAL_BASELINE: i32 = 50;
const HUD_COUNT_BASELINE: i32 = 90;

/// Draw vehicle boxes and the signal HUD onto `frame`, returning JPEG bytes.
pub(crate) fn annotate_frame(
    frame: &Frame,
    vehicles: &[VehicleDetection],
    status: &TrafficStatus,
    jpeg_quality: u8,
) -> Result<Vec<u8>> {
    let mut image = frame_to_rgb(frame)?;

    for vehicle in vehicles {
        draw_vehicle(&mut image, vehicle);
    }
    draw_hud(&mut image, status);

    let mut buffer = Vec::new();
    JpegEncoder::new_with_quality(&mut buffer, jpeg_quality.clamp(1, 100))
        .encode_image(&image)
        .map_err(|err| anyhow!("JPEG encode failed: {err}"))?;
    Ok(buffer)
}

fn frame_to_rgb(frame: &Frame) -> Result<RgbImage> {
    if frame.format != FrameFormat::Bgr8 {
        bail!("unsupported frame format {:?}", frame.format);
    }
    if frame.width <= 0 || frame.height <= 0 {
        bail!("invalid frame size {}x{}", frame.width, frame.height);
    }
    let mut rgb = Vec::with_capacity(frame.data.len());
    for px in frame.data.chunks_exact(3) {
        rgb.extend_from_slice(&[px[2], px[1], px[0]]);
    }
    RgbImage::from_raw(frame.width as u32, frame.height as u32, rgb)
        .ok_or_else(|| anyhow!("frame buffer does not match {}x{}", frame.width, frame.height))
}

fn draw_vehicle(image: &mut RgbImage, vehicle: &VehicleDetection) {
    let [x1, y1, x2, y2] = vehicle.bbox.map(|v| v.round() as i32);
    draw_rect(image, [x1, y1, x2, y2], BOX_COLOR, 2);

    let label = format!("{} {:.2}", vehicle.class.label(), vehicle.score);
    let label_h = text_height(1);
    let label_y = (y1 - 10 - label_h).max(0);
    fill_rect(
        image,
        x1 - 1,
        label_y - 1,
        x1 + text_width(&label, 1),
        label_y + label_h,
        LABEL_BACKGROUND,
    );
    draw_text(image, x1, label_y, &label, BOX_COLOR, 1);
}

pub(crate) fn signal_label(color: SignalColor) -> String {
    format!("Signal: {color}")
}

fn draw_hud(image: &mut RgbImage, status: &TrafficStatus) {
    let glyph_h = text_height(HUD_SCALE);
    draw_text(
        image,
        HUD_LEFT,
        HUD_SIGNAL_BASELINE - glyph_h,
        &signal_label(status.traffic_light),
        SIGNAL_TEXT,
        HUD_SCALE,
    );
    draw_text(
        image,
        HUD_LEFT,
        HUD_COUNT_BASELINE - glyph_h,
        &format!("Vehicle Count: {}", status.vehicle_count),
        COUNT_TEXT,
        HUD_SCALE,
    );
}
