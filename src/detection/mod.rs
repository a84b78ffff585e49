pub mod preprocessing;
pub mod contours;
pub mod geometry;
pub mod isolation;
pub mod color;
pub mod annotate;

use image::RgbImage;
use log::{debug, trace, warn};

use crate::config::DetectorConfig;
use crate::models::{
    AnnotatedFrame, BinaryMask, Candidate, Contour, ContourRole, Detection, Marker, Rejection,
    Verdict,
};
use annotate::Annotator;
use color::ColorClassifier;
use contours::{ContourExtractor, ContourTree};
use geometry::GeometryFilter;
use isolation::IsolationValidator;
use preprocessing::Preprocessor;

/// Per-frame defect detection: binarize, trace, screen, classify, annotate.
///
/// Holds configuration only; every call is a pure function of its inputs.
#[derive(Debug, Clone)]
pub struct DefectDetector {
    pub preprocessor: Preprocessor,
    pub extractor: ContourExtractor,
    pub geometry: GeometryFilter,
    pub isolation: IsolationValidator,
    pub color: ColorClassifier,
    pub annotator: Annotator,
}

impl DefectDetector {
    pub fn new(config: &DetectorConfig) -> Self {
        Self {
            preprocessor: Preprocessor::new(config.preprocess.clone()),
            extractor: ContourExtractor::new(config.contours.simplify_tolerance),
            geometry: GeometryFilter::new(&config.geometry),
            isolation: IsolationValidator::new(config.isolation.dilate_radius),
            color: ColorClassifier::new(&config.color),
            annotator: Annotator::default(),
        }
    }

    pub fn binarize(&self, frame: &RgbImage) -> BinaryMask {
        self.preprocessor.binarize(frame)
    }

    pub fn extract_contours(&self, mask: &BinaryMask) -> ContourTree {
        self.extractor.extract(mask)
    }

    /// Screen one contour. Geometry and isolation apply to every contour;
    /// the color band applies to outer contours only.
    pub fn classify_contour(
        &self,
        frame: &RgbImage,
        mask: &BinaryMask,
        index: usize,
        contour: Contour,
    ) -> Candidate {
        let role = contour.role();
        let verdict = match self.screen(frame, mask, &contour, role) {
            Ok(marker) => Verdict::Accepted(marker),
            Err(Rejection::Degenerate) => {
                warn!("contour {} ({:?}): bounding box {:?} is degenerate", index, role, contour.bbox);
                Verdict::Rejected(Rejection::Degenerate)
            }
            Err(rejection) => {
                trace!("contour {} ({:?}) rejected: {:?}", index, role, rejection);
                Verdict::Rejected(rejection)
            }
        };
        Candidate {
            index,
            contour,
            role,
            verdict,
        }
    }

    fn screen(
        &self,
        frame: &RgbImage,
        mask: &BinaryMask,
        contour: &Contour,
        role: ContourRole,
    ) -> Result<Marker, Rejection> {
        self.geometry.check(contour)?;
        self.isolation.check(mask, &contour.bbox)?;

        let center = contour.bbox.center();
        match role {
            ContourRole::Outer => {
                let average = self.color.check(frame, &contour.bbox)?;
                Ok(Marker {
                    center,
                    average: Some(average),
                })
            }
            ContourRole::Nested => Ok(Marker {
                center,
                average: None,
            }),
        }
    }

    pub fn classify(&self, frame: &RgbImage, mask: &BinaryMask, tree: ContourTree) -> Vec<Candidate> {
        tree.into_vec()
            .into_iter()
            .enumerate()
            .map(|(index, contour)| self.classify_contour(frame, mask, index, contour))
            .collect()
    }

    /// Run every stage on one frame
    pub fn detect(&self, frame: &RgbImage) -> Detection {
        if frame.width() == 0 || frame.height() == 0 {
            return Detection {
                mask: BinaryMask::new(frame.width(), frame.height()),
                annotated: AnnotatedFrame {
                    image: frame.clone(),
                    sequence: 0,
                },
                candidates: Vec::new(),
            };
        }

        let mask = self.binarize(frame);
        let tree = self.extract_contours(&mask);
        let total = tree.len();
        let candidates = self.classify(frame, &mask, tree);
        let image = self.annotator.annotate(frame, &candidates);

        let detection = Detection {
            mask,
            annotated: AnnotatedFrame { image, sequence: 0 },
            candidates,
        };
        debug!(
            "frame {}x{}: {} contours, {} outer and {} nested accepted",
            frame.width(),
            frame.height(),
            total,
            detection.accepted_outer().count(),
            detection.accepted_nested().count()
        );
        detection
    }
}

impl Default for DefectDetector {
    fn default() -> Self {
        Self::new(&DetectorConfig::default())
    }
}
