use image::{GrayImage, Luma, RgbImage};
use imageproc::filter::{box_filter, separable_filter_equal};
use imageproc::morphology::{Mask, grayscale_dilate, grayscale_open};

use crate::config::PreprocessConfig;
use crate::models::BinaryMask;

const FOREGROUND: u8 = 255;
const BACKGROUND: u8 = 0;

/// Convert image to single-channel luma
pub fn to_grayscale(img: &RgbImage) -> GrayImage {
    image::imageops::grayscale(img)
}

/// Normalized 1-D Gaussian weights for an odd kernel size
pub fn gaussian_kernel(size: u32, sigma: f32) -> Vec<f32> {
    let half = (size / 2) as i32;
    let denom = 2.0 * sigma * sigma;
    let weights: Vec<f32> = (-half..=half)
        .map(|i| (-((i * i) as f32) / denom).exp())
        .collect();
    let sum: f32 = weights.iter().sum();
    weights.into_iter().map(|w| w / sum).collect()
}

/// Smooth with a square Gaussian kernel of fixed size
pub fn apply_blur(img: &GrayImage, kernel_size: u32, sigma: f32) -> GrayImage {
    let kernel = gaussian_kernel(kernel_size, sigma);
    separable_filter_equal(img, &kernel)
}

/// Mark pixels brighter than their `block_size` neighborhood mean by more
/// than `offset` as foreground
pub fn adaptive_threshold(img: &GrayImage, block_size: u32, offset: i32) -> BinaryMask {
    let radius = block_size / 2;
    let means = box_filter(img, radius, radius);
    GrayImage::from_fn(img.width(), img.height(), |x, y| {
        let value = img.get_pixel(x, y)[0] as i32;
        let mean = means.get_pixel(x, y)[0] as i32;
        if value > mean + offset {
            Luma([FOREGROUND])
        } else {
            Luma([BACKGROUND])
        }
    })
}

/// Elliptical structuring element inscribed in a (2r+1) square, rows
/// sized the way OpenCV's `MORPH_ELLIPSE` sizes them
pub fn ellipse_element(radius: u8) -> Mask {
    let r = radius as i32;
    let side = (2 * r + 1) as u32;
    let mut footprint = GrayImage::new(side, side);
    if r == 0 {
        footprint.put_pixel(0, 0, Luma([FOREGROUND]));
        return Mask::from_image(&footprint, 0, 0);
    }

    let r2 = (r * r) as f64;
    for dy in -r..=r {
        let half_width = (r as f64 * ((r2 - (dy * dy) as f64) / r2).sqrt()).round() as i32;
        let row = (dy + r) as u32;
        for dx in -half_width..=half_width {
            footprint.put_pixel((dx + r) as u32, row, Luma([FOREGROUND]));
        }
    }
    Mask::from_image(&footprint, radius, radius)
}

/// Erosion followed by dilation, removing specks smaller than the element
pub fn open(mask: &BinaryMask, radius: u8) -> BinaryMask {
    grayscale_open(mask, &ellipse_element(radius))
}

pub fn dilate(mask: &BinaryMask, radius: u8) -> BinaryMask {
    grayscale_dilate(mask, &ellipse_element(radius))
}

/// Color frame to binary mask: luma, blur, adaptive threshold, opening
#[derive(Debug, Clone)]
pub struct Preprocessor {
    pub config: PreprocessConfig,
}

impl Preprocessor {
    pub fn new(config: PreprocessConfig) -> Self {
        Self { config }
    }

    pub fn binarize(&self, frame: &RgbImage) -> BinaryMask {
        let c = &self.config;
        let gray = to_grayscale(frame);
        let blurred = apply_blur(&gray, c.blur_kernel_size, c.blur_sigma);
        let thresholded = adaptive_threshold(&blurred, c.threshold_block_size, c.threshold_offset);
        open(&thresholded, c.open_radius)
    }
}
