use image::RgbImage;

use crate::config::ColorConfig;
use crate::models::{BoundingBox, Rejection};

/// Per-channel means of the frame inside `bbox`. `None` when the box
/// falls outside the frame.
pub fn channel_means(frame: &RgbImage, bbox: &BoundingBox) -> Option<[f64; 3]> {
    let region = bbox.clamp_to(frame.width(), frame.height())?;

    let mut sums = [0u64; 3];
    for y in region.y..region.y + region.height {
        for x in region.x..region.x + region.width {
            let px = frame.get_pixel(x, y);
            for (sum, value) in sums.iter_mut().zip(px.0) {
                *sum += value as u64;
            }
        }
    }

    let count = region.area() as f64;
    Some(sums.map(|s| s as f64 / count))
}

/// Mean of the three channel means, truncated to a whole intensity level
pub fn average_intensity(frame: &RgbImage, bbox: &BoundingBox) -> Option<f64> {
    let region = bbox.clamp_to(frame.width(), frame.height())?;
    let total: u64 = (region.y..region.y + region.height)
        .flat_map(|y| (region.x..region.x + region.width).map(move |x| (x, y)))
        .map(|(x, y)| frame.get_pixel(x, y).0.iter().map(|&v| v as u64).sum::<u64>())
        .sum();
    Some((total / (3 * region.area() as u64)) as f64)
}

/// Accepts outer features whose average color falls in a mid-range band
#[derive(Debug, Clone)]
pub struct ColorClassifier {
    pub min_average: f64,
    pub max_average: f64,
}

impl ColorClassifier {
    pub fn new(config: &ColorConfig) -> Self {
        Self {
            min_average: config.min_average,
            max_average: config.max_average,
        }
    }

    pub fn in_band(&self, average: f64) -> bool {
        average >= self.min_average && average <= self.max_average
    }

    /// Measured average on acceptance
    pub fn check(&self, frame: &RgbImage, bbox: &BoundingBox) -> Result<f64, Rejection> {
        let average = average_intensity(frame, bbox).ok_or(Rejection::Degenerate)?;
        if self.in_band(average) {
            Ok(average)
        } else {
            Err(Rejection::ColorOutOfBand { average })
        }
    }
}

impl Default for ColorClassifier {
    fn default() -> Self {
        Self::new(&ColorConfig::default())
    }
}
