//! Text-to-PNG rendering for the summary image

use crate::error::{Error, Result};
use font8x8::{UnicodeFonts, BASIC_FONTS, LATIN_FONTS};
use image::{ImageFormat, Rgb, RgbImage};
use std::io::Cursor;

pub const IMAGE_WIDTH: u32 = 600;
pub const IMAGE_HEIGHT: u32 = 300;

const MARGIN_X: u32 = 20;
const MARGIN_Y: u32 = 20;
const LINE_HEIGHT: u32 = 22;
const GLYPH_SIZE: u32 = 8;
const SCALE: u32 = 2;

const BACKGROUND: Rgb<u8> = Rgb([255, 255, 255]);
const INK: Rgb<u8> = Rgb([0x33, 0x33, 0x33]);

/// Render `lines` left-aligned, top to bottom, onto a white canvas and
/// encode it as PNG. Text past the right or bottom edge is clipped.
pub fn render_lines(lines: &[String]) -> Result<Vec<u8>> {
    let mut canvas = RgbImage::from_pixel(IMAGE_WIDTH, IMAGE_HEIGHT, BACKGROUND);

    for (row, line) in lines.iter().enumerate() {
        let top = MARGIN_Y + row as u32 * LINE_HEIGHT;
        if top >= IMAGE_HEIGHT {
            break;
        }
        for (col, ch) in line.chars().enumerate() {
            let left = MARGIN_X + col as u32 * GLYPH_SIZE * SCALE;
            if left >= IMAGE_WIDTH {
                break;
            }
            draw_glyph(&mut canvas, glyph_for(ch), left, top);
        }
    }

    let mut png = Vec::new();
    canvas
        .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
        .map_err(|e| Error::Render(format!("PNG encoding failed: {}", e)))?;
    Ok(png)
}

fn glyph_for(ch: char) -> [u8; 8] {
    BASIC_FONTS
        .get(ch)
        .or_else(|| LATIN_FONTS.get(ch))
        .or_else(|| BASIC_FONTS.get('?'))
        .unwrap_or([0; 8])
}

fn draw_glyph(canvas: &mut RgbImage, glyph: [u8; 8], left: u32, top: u32) {
    for (gy, bits) in glyph.iter().enumerate() {
        for gx in 0..GLYPH_SIZE {
            // Bit 0 is the leftmost pixel
            if bits & (1 << gx) == 0 {
                continue;
            }
            for dy in 0..SCALE {
                for dx in 0..SCALE {
                    let x = left + gx * SCALE + dx;
                    let y = top + gy as u32 * SCALE + dy;
                    if x < IMAGE_WIDTH && y < IMAGE_HEIGHT {
                        canvas.put_pixel(x, y, INK);
                    }
                }
            }
        }
    }
}
