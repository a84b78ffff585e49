use image::imageops;

use crate::detection::contours::count_boundaries;
use crate::detection::preprocessing::dilate;
use crate::models::{BinaryMask, BoundingBox, Rejection};

/// Re-traces a dilated crop of the mask and accepts only a single shape
#[derive(Debug, Clone)]
pub struct IsolationValidator {
    pub dilate_radius: u8,
}

impl IsolationValidator {
    pub fn new(dilate_radius: u8) -> Self {
        Self { dilate_radius }
    }

    /// Number of boundaries left in the dilated crop. `None` when the box
    /// falls outside the mask.
    pub fn boundaries_in(&self, mask: &BinaryMask, bbox: &BoundingBox) -> Option<usize> {
        let region = bbox.clamp_to(mask.width(), mask.height())?;
        let crop = imageops::crop_imm(mask, region.x, region.y, region.width, region.height).to_image();
        let grown = dilate(&crop, self.dilate_radius);
        Some(count_boundaries(&grown))
    }

    pub fn check(&self, mask: &BinaryMask, bbox: &BoundingBox) -> Result<(), Rejection> {
        match self.boundaries_in(mask, bbox) {
            None => Err(Rejection::Degenerate),
            Some(1) => Ok(()),
            Some(found) => Err(Rejection::NotIsolated { found }),
        }
    }
}
