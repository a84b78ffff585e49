//! Stage-level tests: preprocessing, contour extraction, geometry screening.

mod common;

use defectscan::detection::contours::ContourExtractor;
use defectscan::detection::geometry::GeometryFilter;
use defectscan::detection::preprocessing::Preprocessor;
use defectscan::config::PreprocessConfig;

use common::*;

fn extractor() -> ContourExtractor {
    ContourExtractor::new(3.0)
}

#[test]
fn test_flat_frame_yields_empty_mask_and_no_contours() {
    init_logging();
    let frame = flat_frame(64, 48, image::Rgb([90, 90, 90]));
    let mask = Preprocessor::new(PreprocessConfig::default()).binarize(&frame);

    assert_eq!(mask.dimensions(), (64, 48));
    assert!(mask.pixels().all(|p| p[0] == 0), "flat frame must be all background");
    assert!(extractor().extract(&mask).is_empty());
}

#[test]
fn test_bright_square_becomes_foreground() {
    let frame = frame_with_squares(48, 48, &[(20, 20, 8)], FEATURE, BACKDROP);
    let mask = Preprocessor::new(PreprocessConfig::default()).binarize(&frame);

    // Center of the square is foreground, far background is not
    assert_eq!(mask.get_pixel(23, 23)[0], 255);
    assert_eq!(mask.get_pixel(5, 5)[0], 0);
    assert_eq!(mask.get_pixel(40, 40)[0], 0);
}

#[test]
fn test_square_mask_gives_one_outer_contour() {
    let mask = mask_with_rects(24, 24, &[(5, 5, 9, 9)]);
    let tree = extractor().extract(&mask);

    assert_eq!(tree.len(), 1);
    let contour = tree.get(0).unwrap();
    assert_eq!(contour.parent, None);
    assert_eq!(contour.role(), ContourRole::Outer);
    assert_eq!(contour.bbox, BoundingBox::new(5, 5, 9, 9));
    assert!(
        contour.area >= 50.0 && contour.area <= 64.0,
        "polygon area should follow the traced boundary, got {}",
        contour.area
    );
    assert!(contour.points.iter().all(|p| contour.bbox.contains_point(*p)));
}

#[test]
fn test_nesting_tree_links_island_to_hole() {
    let mask = ring_with_island();
    let tree = extractor().extract(&mask);
    assert_eq!(tree.len(), 3);

    let roots = tree.roots();
    assert_eq!(roots.len(), 1, "only the ring's outer border is top-level");
    let outer = roots[0];
    assert_eq!(tree.get(outer).unwrap().bbox, BoundingBox::new(5, 5, 30, 30));

    let holes = tree.children(outer);
    assert_eq!(holes.len(), 1);
    let hole = holes[0];

    let islands = tree.children(hole);
    assert_eq!(islands.len(), 1);
    let island = tree.get(islands[0]).unwrap();
    assert_eq!(island.bbox, BoundingBox::new(15, 15, 9, 9));
    assert_eq!(island.role(), ContourRole::Nested);

    // Children sit inside their parents
    assert!(tree.get(outer).unwrap().bbox.contains(&tree.get(hole).unwrap().bbox));
    assert!(tree.get(hole).unwrap().bbox.contains(&island.bbox));
    assert_eq!(tree.parents().iter().filter(|p| p.is_none()).count(), 1);
}

#[test]
fn test_geometry_rejects_elongated_box_regardless_of_area() {
    let filter = GeometryFilter::default();
    for area in [50.0, 60.0, 80.0] {
        assert!(matches!(
            filter.check_shape(10, 3, area),
            Err(Rejection::Elongated { .. })
        ));
        assert!(matches!(
            filter.check_shape(3, 10, area),
            Err(Rejection::Elongated { .. })
        ));
    }
}

#[test]
fn test_geometry_ratio_of_exactly_two_passes() {
    let filter = GeometryFilter::default();
    assert_eq!(filter.check_shape(12, 6, 60.0), Ok(()));
}

#[test]
fn test_geometry_area_band_is_inclusive() {
    let filter = GeometryFilter::default();
    assert_eq!(filter.check_shape(9, 9, 50.0), Ok(()));
    assert_eq!(filter.check_shape(9, 9, 80.0), Ok(()));
    assert_eq!(
        filter.check_shape(9, 9, 49.0),
        Err(Rejection::AreaOutOfBand { area: 49.0 })
    );
    assert_eq!(
        filter.check_shape(9, 9, 81.0),
        Err(Rejection::AreaOutOfBand { area: 81.0 })
    );
}

#[test]
fn test_geometry_band_follows_configuration() {
    let mut config = DetectorConfig::default();
    config.geometry.min_area = 120.0;
    config.geometry.max_area = 200.0;
    let filter = GeometryFilter::new(&config.geometry);

    assert_eq!(filter.check_shape(14, 14, 150.0), Ok(()));
    assert!(filter.check_shape(9, 9, 64.0).is_err());
}

#[test]
fn test_geometry_empty_box_is_degenerate() {
    let filter = GeometryFilter::default();
    assert_eq!(filter.check_shape(0, 9, 60.0), Err(Rejection::Degenerate));
}
