use image::imageops;
use imageproc::contours::find_contours;
use imageproc::geometry::approximate_polygon_dp;
use imageproc::point::Point;

use crate::models::{BinaryMask, Contour};

/// Number of boundaries (outer and hole) traced in a mask. Pixels outside
/// the mask count as background, so a shape filling the whole mask still
/// has one boundary.
pub fn count_boundaries(mask: &BinaryMask) -> usize {
    find_contours::<i32>(&pad(mask)).len()
}

/// Copy of `mask` inside a one pixel background frame
fn pad(mask: &BinaryMask) -> BinaryMask {
    let mut padded = BinaryMask::new(mask.width() + 2, mask.height() + 2);
    imageops::replace(&mut padded, mask, 1, 1);
    padded
}

/// Douglas-Peucker simplification of a closed boundary. The closing
/// point is not repeated in the output.
pub fn simplify(points: &[Point<i32>], tolerance: f64) -> Vec<Point<i32>> {
    if points.len() < 3 {
        return points.to_vec();
    }
    let mut polygon = approximate_polygon_dp(points, tolerance, true);
    if polygon.len() > 1 && polygon.first() == polygon.last() {
        polygon.pop();
    }
    polygon
}

/// Contours in tracing order, each carrying the index of its enclosing contour
#[derive(Debug, Clone, Default)]
pub struct ContourTree {
    nodes: Vec<Contour>,
}

impl ContourTree {
    pub fn new(nodes: Vec<Contour>) -> Self {
        Self { nodes }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Contour> {
        self.nodes.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Contour> {
        self.nodes.iter()
    }

    /// Indices of top-level contours
    pub fn roots(&self) -> Vec<usize> {
        (0..self.nodes.len())
            .filter(|&i| self.nodes[i].parent.is_none())
            .collect()
    }

    /// Indices of contours whose immediate parent is `index`
    pub fn children(&self, index: usize) -> Vec<usize> {
        (0..self.nodes.len())
            .filter(|&i| self.nodes[i].parent == Some(index))
            .collect()
    }

    /// Parent indices in the same order as the contours
    pub fn parents(&self) -> Vec<Option<usize>> {
        self.nodes.iter().map(|c| c.parent).collect()
    }

    pub fn into_vec(self) -> Vec<Contour> {
        self.nodes
    }
}

/// Traces every boundary with full nesting and simplifies it
#[derive(Debug, Clone)]
pub struct ContourExtractor {
    pub simplify_tolerance: f64,
}

impl ContourExtractor {
    pub fn new(simplify_tolerance: f64) -> Self {
        Self { simplify_tolerance }
    }

    pub fn extract(&self, mask: &BinaryMask) -> ContourTree {
        let nodes = find_contours::<i32>(mask)
            .into_iter()
            .map(|raw| {
                let points = simplify(&raw.points, self.simplify_tolerance);
                Contour::new(points, raw.parent)
            })
            .collect();
        ContourTree::new(nodes)
    }
}
