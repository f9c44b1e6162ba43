use anyhow::{Result, anyhow, bail};
use image::{RgbImage, imageops::FilterType};

/// Convert a packed BGR8 frame into a normalised CHW RGB buffer at `input_size`.
pub fn preprocess_bgr(
    bgr: &[u8],
    width: i32,
    height: i32,
    input_size: (u32, u32),
) -> Result<Vec<f32>> {
    if width <= 0 || height <= 0 {
        bail!("invalid frame size {width}x{height}");
    }
    let expected = (width as usize) * (height as usize) * 3;
    if bgr.len() != expected {
        bail!(
            "unexpected frame buffer size: got {} bytes, expected {}",
            bgr.len(),
            expected
        );
    }

    let mut rgb = Vec::with_capacity(bgr.len());
    for px in bgr.chunks_exact(3) {
        rgb.extend_from_slice(&[px[2], px[1], px[0]]);
    }
    let image = RgbImage::from_raw(width as u32, height as u32, rgb)
        .ok_or_else(|| anyhow!("failed to wrap frame in an image buffer"))?;

    let (in_w, in_h) = input_size;
    let resized = if image.dimensions() == (in_w, in_h) {
        image
    } else {
        image::imageops::resize(&image, in_w, in_h, FilterType::Triangle)
    };

    let plane = (in_w * in_h) as usize;
    let mut chw = vec![0.0f32; plane * 3];
    for (idx, px) in resized.pixels().enumerate() {
        chw[idx] = px[0] as f32 / 255.0;
        chw[plane + idx] = px[1] as f32 / 255.0;
        chw[2 * plane + idx] = px[2] as f32 / 255.0;
    }
    Ok(chw)
}
