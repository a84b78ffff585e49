use crate::config::GeometryConfig;
use crate::models::{Contour, Rejection};

/// Drops elongated shapes and shapes outside the area band
#[derive(Debug, Clone)]
pub struct GeometryFilter {
    pub max_aspect_ratio: f32,
    pub min_area: f64,
    pub max_area: f64,
}

impl GeometryFilter {
    pub fn new(config: &GeometryConfig) -> Self {
        Self {
            max_aspect_ratio: config.max_aspect_ratio,
            min_area: config.min_area,
            max_area: config.max_area,
        }
    }

    /// Check a bounding box size and polygon area. Elongation is tested first.
    pub fn check_shape(&self, width: u32, height: u32, area: f64) -> Result<(), Rejection> {
        if width == 0 || height == 0 {
            return Err(Rejection::Degenerate);
        }

        let ratio = width.max(height) as f32 / width.min(height) as f32;
        if ratio > self.max_aspect_ratio {
            return Err(Rejection::Elongated { ratio });
        }

        if area < self.min_area || area > self.max_area {
            return Err(Rejection::AreaOutOfBand { area });
        }
        Ok(())
    }

    pub fn check(&self, contour: &Contour) -> Result<(), Rejection> {
        self.check_shape(contour.width(), contour.height(), contour.area)
    }

    pub fn accepts(&self, contour: &Contour) -> bool {
        self.check(contour).is_ok()
    }
}

impl Default for GeometryFilter {
    fn default() -> Self {
        Self::new(&GeometryConfig::default())
    }
}
