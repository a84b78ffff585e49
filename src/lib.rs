pub mod config;
pub mod detection;
pub mod frame;
pub mod models;
pub mod pipeline;

pub use config::{ConfigError, DetectorConfig};
pub use detection::DefectDetector;
pub use frame::{Frame, FrameError, PixelFormat, RawFrame};
pub use models::{
    AnnotatedFrame, BinaryMask, BoundingBox, Candidate, Contour, ContourRole, Detection, Marker,
    Rejection, Verdict,
};
pub use pipeline::{
    DebugConfig, DisplayHandle, DisplayScale, FrameGate, FrameOutcome, FrameProcessor, FrameStats,
    FrameWorker, NullSink, ResultKind, ResultSink,
};
