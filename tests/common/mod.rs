mod fixtures;
pub use fixtures::*;

// Re-export commonly used types from defectscan for tests
pub use defectscan::{
    BoundingBox, Candidate, ContourRole, DefectDetector, DetectorConfig, Rejection, Verdict,
};
