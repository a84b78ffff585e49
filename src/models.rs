use image::{GrayImage, RgbImage};
use imageproc::point::Point;

/// Single-channel mask, 255 for foreground and 0 for background
pub type BinaryMask = GrayImage;

/// Axis-aligned bounding rectangle in frame coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BoundingBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl BoundingBox {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    /// Smallest rectangle containing every point. Width and height count
    /// pixels, so a single point yields a 1x1 box.
    pub fn enclosing(points: &[Point<i32>]) -> Self {
        let Some(first) = points.first() else {
            return Self::default();
        };

        let (mut min_x, mut min_y, mut max_x, mut max_y) = (first.x, first.y, first.x, first.y);
        for p in &points[1..] {
            min_x = min_x.min(p.x);
            min_y = min_y.min(p.y);
            max_x = max_x.max(p.x);
            max_y = max_y.max(p.y);
        }

        let min_x = min_x.max(0);
        let min_y = min_y.max(0);
        Self {
            x: min_x as u32,
            y: min_y as u32,
            width: (max_x - min_x + 1).max(0) as u32,
            height: (max_y - min_y + 1).max(0) as u32,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn area(&self) -> u32 {
        self.width * self.height
    }

    /// Midpoint of the rectangle, rounded down
    pub fn center(&self) -> (u32, u32) {
        ((self.x * 2 + self.width) / 2, (self.y * 2 + self.height) / 2)
    }

    /// Long side over short side. Infinite for an empty box.
    pub fn aspect_ratio(&self) -> f32 {
        let long = self.width.max(self.height) as f32;
        let short = self.width.min(self.height) as f32;
        if short == 0.0 {
            return f32::INFINITY;
        }
        long / short
    }

    pub fn contains_point(&self, p: Point<i32>) -> bool {
        p.x >= self.x as i32
            && p.y >= self.y as i32
            && p.x < (self.x + self.width) as i32
            && p.y < (self.y + self.height) as i32
    }

    pub fn contains(&self, other: &BoundingBox) -> bool {
        other.x >= self.x
            && other.y >= self.y
            && other.x + other.width <= self.x + self.width
            && other.y + other.height <= self.y + self.height
    }

    /// Clip to an image of the given size. `None` when nothing is left.
    pub fn clamp_to(&self, width: u32, height: u32) -> Option<BoundingBox> {
        if self.x >= width || self.y >= height {
            return None;
        }
        let clipped = BoundingBox {
            x: self.x,
            y: self.y,
            width: self.width.min(width - self.x),
            height: self.height.min(height - self.y),
        };
        (!clipped.is_empty()).then_some(clipped)
    }
}

/// Whether a contour sits at the top of the nesting tree
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContourRole {
    Outer,
    Nested,
}

/// One simplified boundary from a binary mask
#[derive(Debug, Clone)]
pub struct Contour {
    /// Closed polygon after simplification
    pub points: Vec<Point<i32>>,
    pub bbox: BoundingBox,
    /// Enclosed polygon area from the shoelace formula
    pub area: f64,
    /// Index of the immediately enclosing contour
    pub parent: Option<usize>,
}

impl Contour {
    pub fn new(points: Vec<Point<i32>>, parent: Option<usize>) -> Self {
        let bbox = BoundingBox::enclosing(&points);
        let area = polygon_area(&points);
        Self {
            points,
            bbox,
            area,
            parent,
        }
    }

    pub fn role(&self) -> ContourRole {
        match self.parent {
            None => ContourRole::Outer,
            Some(_) => ContourRole::Nested,
        }
    }

    pub fn width(&self) -> u32 {
        self.bbox.width
    }

    pub fn height(&self) -> u32 {
        self.bbox.height
    }

    pub fn aspect_ratio(&self) -> f32 {
        self.bbox.aspect_ratio()
    }
}

/// Absolute area of a closed polygon (Green's theorem). The closing edge
/// from the last point back to the first is implied.
pub fn polygon_area(points: &[Point<i32>]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }
    let twice: i64 = points
        .iter()
        .zip(points.iter().cycle().skip(1))
        .map(|(a, b)| a.x as i64 * b.y as i64 - b.x as i64 * a.y as i64)
        .sum();
    twice.abs() as f64 / 2.0
}

/// Why a contour was dropped
#[derive(Debug, Clone, PartialEq)]
pub enum Rejection {
    /// Bounding box too elongated (screw threads, scratches)
    Elongated { ratio: f32 },
    /// Polygon area outside the accepted band
    AreaOutOfBand { area: f64 },
    /// Dilated crop held zero or several shapes
    NotIsolated { found: usize },
    /// Mean color outside the accepted band
    ColorOutOfBand { average: f64 },
    /// Empty or out-of-frame bounding box
    Degenerate,
}

/// Where and how to draw an accepted feature
#[derive(Debug, Clone, PartialEq)]
pub struct Marker {
    pub center: (u32, u32),
    /// Mean intensity, present for outer features only
    pub average: Option<f64>,
}

impl Marker {
    /// Text drawn next to the feature
    pub fn label(&self) -> Option<String> {
        self.average.map(|avg| format!("{}", avg.trunc() as i64))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    Accepted(Marker),
    Rejected(Rejection),
}

/// A contour together with its classification outcome
#[derive(Debug, Clone)]
pub struct Candidate {
    /// Position in the extractor's output, stable within a frame
    pub index: usize,
    pub contour: Contour,
    pub role: ContourRole,
    pub verdict: Verdict,
}

impl Candidate {
    pub fn is_accepted(&self) -> bool {
        matches!(self.verdict, Verdict::Accepted(_))
    }

    pub fn marker(&self) -> Option<&Marker> {
        match &self.verdict {
            Verdict::Accepted(marker) => Some(marker),
            Verdict::Rejected(_) => None,
        }
    }
}

/// Color frame with markers burned in
#[derive(Debug, Clone)]
pub struct AnnotatedFrame {
    pub image: RgbImage,
    /// Sequence number of the source frame, zero outside the stream driver
    pub sequence: u64,
}

/// Everything one pass of the detector produced
#[derive(Debug, Clone)]
pub struct Detection {
    pub mask: BinaryMask,
    pub annotated: AnnotatedFrame,
    pub candidates: Vec<Candidate>,
}

impl Detection {
    pub fn accepted(&self) -> impl Iterator<Item = &Candidate> {
        self.candidates.iter().filter(|c| c.is_accepted())
    }

    pub fn accepted_outer(&self) -> impl Iterator<Item = &Candidate> {
        self.accepted().filter(|c| c.role == ContourRole::Outer)
    }

    pub fn accepted_nested(&self) -> impl Iterator<Item = &Candidate> {
        self.accepted().filter(|c| c.role == ContourRole::Nested)
    }
}
