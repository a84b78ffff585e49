use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_circle_mut};
use imageproc::rect::Rect;

use crate::models::{Candidate, ContourRole};

const GLYPH_WIDTH: u32 = 3;
const GLYPH_HEIGHT: u32 = 5;

/// Marker style for one contour role
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarkerStyle {
    pub radius: i32,
    pub thickness: i32,
    pub color: Rgb<u8>,
}

#[derive(Debug, Clone)]
pub struct Annotator {
    pub outer: MarkerStyle,
    pub nested: MarkerStyle,
    pub label_color: Rgb<u8>,
    /// Pixels per glyph cell
    pub label_scale: u32,
}

impl Default for Annotator {
    fn default() -> Self {
        Self {
            outer: MarkerStyle {
                radius: 10,
                thickness: 4,
                color: Rgb([0, 255, 0]),
            },
            nested: MarkerStyle {
                radius: 5,
                thickness: 2,
                color: Rgb([255, 0, 0]),
            },
            label_color: Rgb([0, 0, 255]),
            label_scale: 2,
        }
    }
}

impl Annotator {
    /// Copy the frame and burn in markers for accepted candidates.
    /// Rejected candidates are ignored.
    pub fn annotate(&self, frame: &RgbImage, candidates: &[Candidate]) -> RgbImage {
        let mut canvas = frame.clone();
        for candidate in candidates {
            let Some(marker) = candidate.marker() else {
                continue;
            };
            let center = (marker.center.0 as i32, marker.center.1 as i32);
            match candidate.role {
                ContourRole::Outer => {
                    if let Some(label) = marker.label() {
                        let bbox = &candidate.contour.bbox;
                        let text_height = GLYPH_HEIGHT * self.label_scale;
                        let top = bbox.y.saturating_sub(text_height + 1);
                        let max_left = canvas.width().saturating_sub(label_width(&label, self.label_scale));
                        let left = bbox.x.min(max_left);
                        draw_label(&mut canvas, left, top, &label, self.label_color, self.label_scale);
                    }
                    draw_ring(&mut canvas, center, &self.outer);
                }
                ContourRole::Nested => draw_ring(&mut canvas, center, &self.nested),
            }
        }
        canvas
    }
}

/// Circle stroked `thickness` pixels wide, centred on `radius`
fn draw_ring(canvas: &mut RgbImage, center: (i32, i32), style: &MarkerStyle) {
    let inner = style.radius - style.thickness / 2;
    for r in inner..inner + style.thickness.max(1) {
        if r > 0 {
            draw_hollow_circle_mut(canvas, center, r, style.color);
        }
    }
}

/// Draw digits (and a few separators) with a 3x5 bitmap font
pub fn draw_label(canvas: &mut RgbImage, x: u32, y: u32, text: &str, color: Rgb<u8>, scale: u32) {
    let scale = scale.max(1);
    let mut cx = x;
    for c in text.chars() {
        let rows = glyph(c);
        for (row, bits) in rows.iter().enumerate() {
            for col in 0..GLYPH_WIDTH {
                if bits & (1 << (GLYPH_WIDTH - 1 - col)) == 0 {
                    continue;
                }
                let px = (cx + col * scale) as i32;
                let py = (y + row as u32 * scale) as i32;
                draw_filled_rect_mut(canvas, Rect::at(px, py).of_size(scale, scale), color);
            }
        }
        cx += (GLYPH_WIDTH + 1) * scale;
    }
}

/// Pixel width of `text` as drawn by [`draw_label`]
fn label_width(text: &str, scale: u32) -> u32 {
    text.chars().count() as u32 * (GLYPH_WIDTH + 1) * scale.max(1)
}

fn glyph(c: char) -> [u8; 5] {
    match c {
        '0' => [0x7, 0x5, 0x5, 0x5, 0x7],
        '1' => [0x2, 0x6, 0x2, 0x2, 0x7],
        '2' => [0x7, 0x1, 0x7, 0x4, 0x7],
        '3' => [0x7, 0x1, 0x7, 0x1, 0x7],
        '4' => [0x5, 0x5, 0x7, 0x1, 0x1],
        '5' => [0x7, 0x4, 0x7, 0x1, 0x7],
        '6' => [0x7, 0x4, 0x7, 0x5, 0x7],
        '7' => [0x7, 0x1, 0x2, 0x4, 0x4],
        '8' => [0x7, 0x5, 0x7, 0x5, 0x7],
        '9' => [0x7, 0x5, 0x7, 0x1, 0x7],
        '-' => [0x0, 0x0, 0x7, 0x0, 0x0],
        '.' => [0x0, 0x0, 0x0, 0x0, 0x2],
        ' ' => [0x0; 5],
        _ => [0x7; 5],
    }
}
