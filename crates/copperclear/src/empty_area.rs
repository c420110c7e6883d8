//! Resolution of the clearable region: the margined boundary minus feature
//! coverage.
//!
//! The direct boolean difference can blow up on self-intersecting or
//! otherwise ill-formed multi-geometry; when it does, the coverage is
//! subtracted piece by piece with progress reporting and a cancellation
//! check per piece. Both paths validate their result before trusting it.

use crate::error::{ClearError, ClearResult};
use crate::geometry;
use crate::job::JobContext;
use crate::types::SourceShape;
use geo::{BooleanOps, MultiPolygon, Polygon};
use std::panic::{catch_unwind, AssertUnwindSafe};
use tracing::{debug, warn};

/// Expand the coverage shapes into plain polygons, applying the standoff
/// buffer where configured. Zero-width paths only matter once a standoff
/// gives them area.
fn coverage_polygons(coverage: &[SourceShape], standoff: f64) -> ClearResult<Vec<Polygon<f64>>> {
    let mut polygons = Vec::new();
    for shape in coverage {
        match shape {
            SourceShape::Solid(polygon) => {
                if standoff > 0.0 {
                    polygons.extend(geometry::buffer_polygons(
                        std::slice::from_ref(polygon),
                        standoff,
                        geometry::JoinStyle::Round,
                    ));
                } else {
                    polygons.push(polygon.clone());
                }
            }
            SourceShape::Path(line) => {
                if standoff > 0.0 {
                    polygons.extend(geometry::buffer_path(line, standoff)?.0);
                }
            }
        }
    }
    Ok(polygons)
}

/// Compute the area left to clear inside `boundary` once `coverage` is
/// removed.
pub fn resolve_empty_area(
    boundary: &MultiPolygon<f64>,
    coverage: &[SourceShape],
    standoff: f64,
    ctx: &JobContext,
) -> ClearResult<MultiPolygon<f64>> {
    if geometry::is_area_empty(boundary) {
        return Err(ClearError::EmptyArea);
    }

    let cover = coverage_polygons(coverage, standoff)?;
    if cover.is_empty() {
        return Ok(boundary.clone());
    }

    let cover_region = MultiPolygon(cover.clone());
    let direct = catch_unwind(AssertUnwindSafe(|| boundary.difference(&cover_region)));

    let empty = match direct {
        Ok(region) => region,
        Err(_) => {
            warn!("direct area difference failed; subtracting features one at a time");
            subtract_incrementally(boundary, &cover, ctx)?
        }
    };

    if geometry::is_area_empty(&empty) {
        return Err(ClearError::EmptyArea);
    }
    Ok(empty)
}

/// Fallback path: subtract each coverage polygon on its own, reporting
/// progress after every piece. This is the dominant cost on large feature
/// sets and stays cancellable per piece.
fn subtract_incrementally(
    boundary: &MultiPolygon<f64>,
    cover: &[Polygon<f64>],
    ctx: &JobContext,
) -> ClearResult<MultiPolygon<f64>> {
    let total = cover.len();
    let mut empty = boundary.clone();
    for (index, piece) in cover.iter().enumerate() {
        ctx.checkpoint()?;
        let piece_region = MultiPolygon(vec![piece.clone()]);
        empty = catch_unwind(AssertUnwindSafe(|| empty.difference(&piece_region))).map_err(
            |_| {
                let at = geometry::representative_point(piece);
                warn!(x = at.x, y = at.y, "feature subtraction failed");
                ClearError::EmptyArea
            },
        )?;
        debug!(piece = index + 1, total, "subtracted feature");
        ctx.progress(((index + 1) as f64 / total as f64) * 100.0);
    }
    Ok(empty)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::rect_polygon;
    use geo::Area;

    #[test]
    fn test_difference_leaves_ring() {
        let boundary = MultiPolygon(vec![rect_polygon((-1.0, -1.0), (11.0, 11.0))]);
        let pad = SourceShape::Solid(rect_polygon((0.0, 0.0), (10.0, 10.0)));
        let ctx = JobContext::new();

        let empty = resolve_empty_area(&boundary, &[pad], 0.0, &ctx).expect("empty area");
        assert!((empty.unsigned_area() - 44.0).abs() < 1e-6);
    }

    #[test]
    fn test_standoff_buffers_coverage() {
        let boundary = MultiPolygon(vec![rect_polygon((-2.0, -2.0), (12.0, 12.0))]);
        let pad = SourceShape::Solid(rect_polygon((0.0, 0.0), (10.0, 10.0)));
        let ctx = JobContext::new();

        let without = resolve_empty_area(&boundary, &[pad.clone()], 0.0, &ctx).expect("empty");
        let with = resolve_empty_area(&boundary, &[pad], 0.5, &ctx).expect("empty");
        assert!(with.unsigned_area() < without.unsigned_area());
    }

    #[test]
    fn test_covered_boundary_fails() {
        let boundary = MultiPolygon(vec![rect_polygon((2.0, 2.0), (8.0, 8.0))]);
        let pad = SourceShape::Solid(rect_polygon((0.0, 0.0), (10.0, 10.0)));
        let ctx = JobContext::new();

        let err = resolve_empty_area(&boundary, &[pad], 0.0, &ctx).unwrap_err();
        assert!(matches!(err, ClearError::EmptyArea));
    }

    #[test]
    fn test_bare_path_removes_no_area() {
        let boundary = MultiPolygon(vec![rect_polygon((0.0, 0.0), (10.0, 10.0))]);
        let trace = SourceShape::Path(geo::LineString(vec![
            geo::Coord { x: 1.0, y: 5.0 },
            geo::Coord { x: 9.0, y: 5.0 },
        ]));
        let ctx = JobContext::new();

        let empty = resolve_empty_area(&boundary, &[trace], 0.0, &ctx).expect("empty");
        assert!((empty.unsigned_area() - 100.0).abs() < 1e-6);
    }

    #[test]
    fn test_incremental_fallback_matches_direct() {
        let boundary = MultiPolygon(vec![rect_polygon((0.0, 0.0), (20.0, 20.0))]);
        let pads = vec![
            rect_polygon((2.0, 2.0), (6.0, 6.0)),
            rect_polygon((10.0, 10.0), (14.0, 14.0)),
        ];
        let ctx = JobContext::new();

        let incremental = subtract_incrementally(&boundary, &pads, &ctx).expect("fallback");
        assert!((incremental.unsigned_area() - (400.0 - 32.0)).abs() < 1e-6);
    }
}
