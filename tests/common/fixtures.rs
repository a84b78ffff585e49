#![allow(dead_code)]

use image::{GrayImage, Luma, Rgb, RgbImage};

/// Feature color. Channels sum to 375, so any crop averages to 125.
pub const FEATURE: Rgb<u8> = Rgb([0, 255, 120]);
/// Darker-luma background with the same channel sum as [`FEATURE`]
pub const BACKDROP: Rgb<u8> = Rgb([255, 0, 120]);

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn flat_frame(width: u32, height: u32, color: Rgb<u8>) -> RgbImage {
    RgbImage::from_pixel(width, height, color)
}

/// Frame filled with `background` and one filled square per `(x, y, side)`
pub fn frame_with_squares(
    width: u32,
    height: u32,
    squares: &[(u32, u32, u32)],
    feature: Rgb<u8>,
    background: Rgb<u8>,
) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        let inside = squares
            .iter()
            .any(|&(sx, sy, side)| x >= sx && x < sx + side && y >= sy && y < sy + side);
        if inside { feature } else { background }
    })
}

/// Binary mask with the given `(x, y, width, height)` rectangles set
pub fn mask_with_rects(width: u32, height: u32, rects: &[(u32, u32, u32, u32)]) -> GrayImage {
    let mut mask = GrayImage::new(width, height);
    for &(rx, ry, rw, rh) in rects {
        for y in ry..ry + rh {
            for x in rx..rx + rw {
                mask.put_pixel(x, y, Luma([255]));
            }
        }
    }
    mask
}

/// Clear a rectangle in an existing mask
pub fn clear_rect(mask: &mut GrayImage, (rx, ry, rw, rh): (u32, u32, u32, u32)) {
    for y in ry..ry + rh {
        for x in rx..rx + rw {
            mask.put_pixel(x, y, Luma([0]));
        }
    }
}

/// 40x40 mask: a 30x30 ring (20x20 hole) around a free-standing 9x9 square
pub fn ring_with_island() -> GrayImage {
    let mut mask = mask_with_rects(40, 40, &[(5, 5, 30, 30)]);
    clear_rect(&mut mask, (10, 10, 20, 20));
    for y in 15..24 {
        for x in 15..24 {
            mask.put_pixel(x, y, Luma([255]));
        }
    }
    mask
}
