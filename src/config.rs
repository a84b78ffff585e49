use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Tunables for every detection stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct DetectorConfig {
    pub preprocess: PreprocessConfig,
    pub contours: ContourConfig,
    pub geometry: GeometryConfig,
    pub isolation: IsolationConfig,
    pub color: ColorConfig,
    pub stream: StreamConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessConfig {
    /// Side of the square smoothing kernel, odd
    pub blur_kernel_size: u32,
    pub blur_sigma: f32,
    /// Side of the adaptive threshold neighborhood, odd
    pub threshold_block_size: u32,
    /// A pixel is foreground when it exceeds its neighborhood mean by more than this
    pub threshold_offset: i32,
    /// Radius of the elliptical element used for opening
    pub open_radius: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContourConfig {
    /// Douglas-Peucker tolerance in pixels
    pub simplify_tolerance: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeometryConfig {
    pub max_aspect_ratio: f32,
    /// Inclusive area band. Tuned for one camera distance, recalibrate per setup.
    pub min_area: f64,
    pub max_area: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IsolationConfig {
    /// Radius of the elliptical element used to dilate the crop
    pub dilate_radius: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColorConfig {
    /// Inclusive band for the averaged channel means
    pub min_average: f64,
    pub max_average: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Minimum spacing between processed frames, 0 disables throttling
    pub min_frame_interval_ms: u64,
    /// Display surface size used for the scale transform
    pub display_width: Option<u32>,
    pub display_height: Option<u32>,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            blur_kernel_size: 5,
            blur_sigma: 2.0,
            threshold_block_size: 27,
            threshold_offset: 15,
            open_radius: 2,
        }
    }
}

impl Default for ContourConfig {
    fn default() -> Self {
        Self {
            simplify_tolerance: 3.0,
        }
    }
}

impl Default for GeometryConfig {
    fn default() -> Self {
        Self {
            max_aspect_ratio: 2.0,
            min_area: 50.0,
            max_area: 80.0,
        }
    }
}

impl Default for IsolationConfig {
    fn default() -> Self {
        Self { dilate_radius: 2 }
    }
}

impl Default for ColorConfig {
    fn default() -> Self {
        Self {
            min_average: 100.0,
            max_average: 150.0,
        }
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            min_frame_interval_ms: 0,
            display_width: None,
            display_height: None,
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{name} must be a positive odd number, got {value}")]
    NotOddPositive { name: &'static str, value: u32 },
    #[error("{name} must be positive, got {value}")]
    NotPositive { name: &'static str, value: f64 },
    #[error("{name} band is inverted: [{min}, {max}]")]
    InvertedBand {
        name: &'static str,
        min: f64,
        max: f64,
    },
    #[error("structuring element radius must be between 1 and 127, got {0}")]
    BadRadius(u8),
}

fn odd_positive(name: &'static str, value: u32) -> Result<(), ConfigError> {
    if value == 0 || value % 2 == 0 {
        return Err(ConfigError::NotOddPositive { name, value });
    }
    Ok(())
}

fn positive(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if !(value > 0.0) {
        return Err(ConfigError::NotPositive { name, value });
    }
    Ok(())
}

fn band(name: &'static str, min: f64, max: f64) -> Result<(), ConfigError> {
    if min > max {
        return Err(ConfigError::InvertedBand { name, min, max });
    }
    Ok(())
}

fn radius(value: u8) -> Result<(), ConfigError> {
    // element side 2r+1 has to fit the morphology mask limits
    if value == 0 || value > 127 {
        return Err(ConfigError::BadRadius(value));
    }
    Ok(())
}

impl DetectorConfig {
    /// Load from a JSON file. Missing fields take their defaults.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read config {}: {}", path.display(), e))?;
        let config: DetectorConfig = serde_json::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Failed to parse config {}: {}", path.display(), e))?;
        config.validate()?;
        log::info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let p = &self.preprocess;
        odd_positive("blur_kernel_size", p.blur_kernel_size)?;
        positive("blur_sigma", p.blur_sigma as f64)?;
        odd_positive("threshold_block_size", p.threshold_block_size)?;
        radius(p.open_radius)?;

        positive("simplify_tolerance", self.contours.simplify_tolerance)?;

        let g = &self.geometry;
        positive("max_aspect_ratio", g.max_aspect_ratio as f64)?;
        band("area", g.min_area, g.max_area)?;

        radius(self.isolation.dilate_radius)?;

        band("color", self.color.min_average, self.color.max_average)?;
        Ok(())
    }
}
