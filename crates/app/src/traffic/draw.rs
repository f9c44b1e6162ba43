//! Clipped drawing primitives and a 5x7 bitmap font for frame overlays.

use image::{Rgb, RgbImage};

pub(crate) const GLYPH_WIDTH: i32 = 5;
pub(crate) const GLYPH_HEIGHT: i32 = 7;
const GLYPH_ADVANCE: i32 = GLYPH_WIDTH + 1;

fn put_clipped(image: &mut RgbImage, x: i32, y: i32, color: Rgb<u8>) {
    if x >= 0 && y >= 0 && (x as u32) < image.width() && (y as u32) < image.height() {
        image.put_pixel(x as u32, y as u32, color);
    }
}

/// Fill the inclusive rectangle `[left, right] x [top, bottom]`.
pub(crate) fn fill_rect(
    image: &mut RgbImage,
    left: i32,
    top: i32,
    right: i32,
    bottom: i32,
    color: Rgb<u8>,
) {
    let max_x = image.width() as i32 - 1;
    let max_y = image.height() as i32 - 1;
    for y in top.max(0)..=bottom.min(max_y) {
        for x in left.max(0)..=right.min(max_x) {
            image.put_pixel(x as u32, y as u32, color);
        }
    }
}

/// Draw a rectangle outline growing inwards by `thickness` pixels.
pub(crate) fn draw_rect(image: &mut RgbImage, bbox: [i32; 4], color: Rgb<u8>, thickness: i32) {
    let [left, top, right, bottom] = bbox;
    for t in 0..thickness.max(1) {
        let (l, tp, r, b) = (left + t, top + t, right - t, bottom - t);
        if l > r || tp > b {
            break;
        }
        for x in l..=r {
            put_clipped(image, x, tp, color);
            put_clipped(image, x, b, color);
        }
        for y in tp..=b {
            put_clipped(image, l, y, color);
            put_clipped(image, r, y, color);
        }
    }
}

pub(crate) fn text_width(text: &str, scale: i32) -> i32 {
    text.chars().count() as i32 * GLYPH_ADVANCE * scale
}

pub(crate) fn text_height(scale: i32) -> i32 {
    GLYPH_HEIGHT * scale
}

/// Draw `text` with its top-left corner at (`x`, `y`). Lowercase is drawn as
/// uppercase; characters without a glyph leave a blank cell.
pub(crate) fn draw_text(
    image: &mut RgbImage,
    x: i32,
    y: i32,
    text: &str,
    color: Rgb<u8>,
    scale: i32,
) {
    let scale = scale.max(1);
    let mut cursor = x;
    for ch in text.chars().flat_map(char::to_uppercase) {
        if let Some(glyph) = glyph_bits(ch) {
            for (row, pattern) in glyph.iter().enumerate() {
                for col in 0..GLYPH_WIDTH {
                    if (pattern >> (GLYPH_WIDTH - 1 - col)) & 1 == 0 {
                        continue;
                    }
                    let px = cursor + col * scale;
                    let py = y + row as i32 * scale;
                    for dy in 0..scale {
                        for dx in 0..scale {
                            put_clipped(image, px + dx, py + dy, color);
                        }
                    }
                }
            }
        }
        cursor += GLYPH_ADVANCE * scale;
    }
}

fn glyph_bits(ch: char) -> Option<[u8; 7]> {
    let bits = match ch {
        'A' => [0b01110, 0b10001, 0b10001, 0b11111, 0b10001, 0b10001, 0b10001],
        'B' => [0b11110, 0b10001, 0b10001, 0b11110, 0b10001, 0b10001, 0b11110],
        'C' => [0b01110, 0b10001, 0b10000, 0b10000, 0b10000, 0b10001, 0b01110],
        'D' => [0b11100, 0b10010, 0b10001, 0b10001, 0b10001, 0b10010, 0b11100],
        'E' => [0b11111, 0b10000, 0b10000, 0b11110, 0b10000, 0b10000, 0b11111],
        'F' => [0b11111, 0b10000, 0b10000, 0b11110, 0b10000, 0b10000, 0b10000],
        'G' => [0b01110, 0b10001, 0b10000, 0b10111, 0b10001, 0b10001, 0b01111],
        'H' => [0b10001, 0b10001, 0b10001, 0b11111, 0b10001, 0b10001, 0b10001],
        'I' => [0b01110, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0b01110],
        'J' => [0b00111, 0b00010, 0b00010, 0b00010, 0b00010, 0b10010, 0b01100],
        'K' => [0b10001, 0b10010, 0b10100, 0b11000, 0b10100, 0b10010, 0b10001],
        'L' => [0b10000, 0b10000, 0b10000, 0b10000, 0b10000, 0b10000, 0b11111],
        'M' => [0b10001, 0b11011, 0b10101, 0b10101, 0b10001, 0b10001, 0b10001],
        'N' => [0b10001, 0b10001, 0b11001, 0b10101, 0b10011, 0b10001, 0b10001],
        'O' => [0b01110, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01110],
        'P' => [0b11110, 0b10001, 0b10001, 0b11110, 0b10000, 0b10000, 0b10000],
        'Q' => [0b01110, 0b10001, 0b10001, 0b10001, 0b10101, 0b10010, 0b01101],
        'R' => [0b11110, 0b10001, 0b10001, 0b11110, 0b10100, 0b10010, 0b10001],
        'S' => [0b01111, 0b10000, 0b10000, 0b01110, 0b00001, 0b00001, 0b11110],
        'T' => [0b11111, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100],
        'U' => [0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01110],
        'V' => [0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01010, 0b00100],
        'W' => [0b10001, 0b10001, 0b10001, 0b10101, 0b10101, 0b10101, 0b01010],
        'X' => [0b10001, 0b10001, 0b01010, 0b00100, 0b01010, 0b10001, 0b10001],
        'Y' => [0b10001, 0b10001, 0b10001, 0b01010, 0b00100, 0b00100, 0b00100],
        'Z' => [0b11111, 0b00001, 0b00010, 0b00100, 0b01000, 0b10000, 0b11111],
        '0' => [0b01110, 0b10001, 0b10011, 0b10101, 0b11001, 0b10001, 0b01110],
        '1' => [0b00100, 0b01100, 0b00100, 0b00100, 0b00100, 0b00100, 0b01110],
        '2' => [0b01110, 0b10001, 0b00001, 0b00010, 0b00100, 0b01000, 0b11111],
        '3' => [0b11110, 0b00001, 0b00001, 0b01110, 0b00001, 0b00001, 0b11110],
        '4' => [0b00010, 0b00110, 0b01010, 0b10010, 0b11111, 0b00010, 0b00010],
        '5' => [0b11111, 0b10000, 0b11110, 0b00001, 0b00001, 0b10001, 0b01110],
        '6' => [0b00110, 0b01000, 0b10000, 0b11110, 0b10001, 0b10001, 0b01110],
        '7' => [0b11111, 0b00001, 0b00010, 0b00100, 0b01000, 0b01000, 0b01000],
        '8' => [0b01110, 0b10001, 0b10001, 0b01110, 0b10001, 0b10001, 0b01110],
        '9' => [0b01110, 0b10001, 0b10001, 0b01111, 0b00001, 0b00010, 0b01100],
        ':' => [0, 0b01100, 0b01100, 0, 0b01100, 0b01100, 0],
        '.' => [0, 0, 0, 0, 0, 0b00110, 0b00110],
        '-' => [0, 0, 0, 0b11111, 0, 0, 0],
        '/' => [0b00001, 0b00010, 0b00010, 0b00100, 0b01000, 0b01000, 0b10000],
        '%' => [0b10001, 0b10010, 0b00100, 0b01000, 0b10010, 0b10001, 0],
        ' ' => [0; 7],
        _ => return None,
    };
    Some(bits)
}

#[cfg(test)]
mod tests {
    use super::*;

    const WHITE: Rgb<u8> = Rgb([255, 255, 255]);
    const BLACK: Rgb<u8> = Rgb([0, 0, 0]);

    #[test]
    fn rect_outline_leaves_interior() {
        let mut image = RgbImage::new(20, 20);
        draw_rect(&mut image, [2, 2, 12, 12], WHITE, 2);
        assert_eq!(*image.get_pixel(2, 2), WHITE);
        assert_eq!(*image.get_pixel(3, 7), WHITE);
        assert_eq!(*image.get_pixel(12, 12), WHITE);
        assert_eq!(*image.get_pixel(7, 7), BLACK);
        assert_eq!(*image.get_pixel(13, 13), BLACK);
    }

    #[test]
    fn drawing_off_canvas_is_clipped() {
        let mut image = RgbImage::new(8, 8);
        draw_rect(&mut image, [-5, -5, 20, 20], WHITE, 1);
        fill_rect(&mut image, 6, 6, 40, 40, WHITE);
        draw_text(&mut image, 5, 5, "TRUCK", WHITE, 3);
        assert_eq!(*image.get_pixel(7, 7), WHITE);
    }

    #[test]
    fn text_lights_glyph_pixels() {
        let mut image = RgbImage::new(16, 10);
        draw_text(&mut image, 0, 0, "l", WHITE, 1);
        // 'L' is a left bar plus a bottom row.
        assert_eq!(*image.get_pixel(0, 0), WHITE);
        assert_eq!(*image.get_pixel(4, 6), WHITE);
        assert_eq!(*image.get_pixel(4, 0), BLACK);
    }

    #[test]
    fn font_covers_overlay_text() {
        for ch in "SIGNAL: RED YELLOW GREEN VEHICLE COUNT 0123456789 CAR BUS TRUCK MOTORCYCLE 0.87"
            .chars()
        {
            assert!(glyph_bits(ch).is_some(), "missing glyph for {ch:?}");
        }
        assert_eq!(text_width("ABC", 2), 36);
        assert_eq!(text_height(2), 14);
    }
}
