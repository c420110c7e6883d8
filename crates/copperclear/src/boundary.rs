//! Derivation of the area to be processed: one of three selection modes,
//! then a signed margin with mitre joins.

use crate::error::{ClearError, ClearResult};
use crate::geometry::{self, JoinStyle};
use crate::types::{ReferenceMode, SelectionShape, SourceGeometry, SourceKind, SourceShape};
use geo::{BooleanOps, ConvexHull, MultiPoint, MultiPolygon, Point, Polygon};
use std::panic::{catch_unwind, AssertUnwindSafe};

/// Convex hull over every coordinate of the source, or `None` when the
/// source is too thin to span an area.
fn convex_hull_of(source: &SourceGeometry) -> Option<Polygon<f64>> {
    let mut points: Vec<Point<f64>> = Vec::new();
    for shape in source.solid_geometry() {
        match shape {
            SourceShape::Solid(polygon) => {
                points.extend(polygon.exterior().0.iter().map(|c| Point::new(c.x, c.y)));
                for interior in polygon.interiors() {
                    points.extend(interior.0.iter().map(|c| Point::new(c.x, c.y)));
                }
            }
            SourceShape::Path(line) => {
                points.extend(line.0.iter().map(|c| Point::new(c.x, c.y)));
            }
        }
    }
    if points.len() < 3 {
        return None;
    }
    let hull = MultiPoint(points).convex_hull();
    if hull.exterior().0.len() < 4 {
        return None;
    }
    Some(hull)
}

/// Derive the raw (unmargined) reference area for one run.
pub fn build_reference_area(
    source: &SourceGeometry,
    mode: &ReferenceMode,
) -> ClearResult<MultiPolygon<f64>> {
    match mode {
        ReferenceMode::Itself => {
            if source.is_empty() {
                return Err(ClearError::NoReferenceArea(
                    "source object has no solid geometry".to_string(),
                ));
            }
            // A single-polygon source is used directly; the hull is only a
            // conservative bound for scattered geometry.
            let polygons: Vec<&Polygon<f64>> = source.polygons().collect();
            if polygons.len() == 1 && source.paths().next().is_none() {
                return Ok(MultiPolygon(vec![polygons[0].clone()]));
            }
            let hull = convex_hull_of(source).ok_or_else(|| {
                ClearError::NoReferenceArea("source geometry collapses to nothing".to_string())
            })?;
            Ok(MultiPolygon(vec![hull]))
        }
        ReferenceMode::Selection(shapes) => {
            let mut polygons = Vec::new();
            for shape in shapes {
                match shape {
                    SelectionShape::Square { corner_a, corner_b } => {
                        polygons.push(geometry::rect_polygon(*corner_a, *corner_b));
                    }
                    SelectionShape::Freeform(points) => {
                        if let Some(polygon) = geometry::polygon_from_points(points) {
                            polygons.push(polygon);
                        }
                    }
                }
            }
            if polygons.is_empty() {
                return Err(ClearError::NoReferenceArea(
                    "no usable selection shapes".to_string(),
                ));
            }
            let unioned = geometry::union_all(&polygons)?;
            if geometry::is_area_empty(&unioned) {
                return Err(ClearError::NoReferenceArea(
                    "selection shapes collapse to nothing".to_string(),
                ));
            }
            Ok(unioned)
        }
        ReferenceMode::Object(reference) => {
            if reference.is_empty() {
                return Err(ClearError::NoReferenceArea(
                    "reference object has no solid geometry".to_string(),
                ));
            }
            match reference.kind() {
                SourceKind::Geometry => {
                    let polygons: Vec<Polygon<f64>> = reference.polygons().cloned().collect();
                    if polygons.is_empty() {
                        return Err(ClearError::NoReferenceArea(
                            "reference object carries no filled regions".to_string(),
                        ));
                    }
                    Ok(MultiPolygon(polygons))
                }
                SourceKind::Features => {
                    // Keep the area that is both inside the reference's
                    // footprint and relevant to the source.
                    let reference_hull = convex_hull_of(reference).ok_or_else(|| {
                        ClearError::NoReferenceArea(
                            "reference footprint collapses to nothing".to_string(),
                        )
                    })?;
                    let source_hull = convex_hull_of(source).ok_or_else(|| {
                        ClearError::NoReferenceArea(
                            "source geometry collapses to nothing".to_string(),
                        )
                    })?;
                    let common = catch_unwind(AssertUnwindSafe(|| {
                        reference_hull.intersection(&source_hull)
                    }))
                    .map_err(|_| {
                        ClearError::Geometry("hull intersection failed".to_string())
                    })?;
                    if geometry::is_area_empty(&common) {
                        return Err(ClearError::NoReferenceArea(
                            "reference and source footprints do not overlap".to_string(),
                        ));
                    }
                    Ok(common)
                }
            }
        }
    }
}

/// Whether this mode's boundary is buffered polygon-by-polygon. Buffering a
/// disconnected multi-polygon as one shape produces self-intersection
/// artifacts, so selections and geometry-kind references go piecewise.
fn buffers_individually(mode: &ReferenceMode) -> bool {
    match mode {
        ReferenceMode::Itself => false,
        ReferenceMode::Selection(_) => true,
        ReferenceMode::Object(reference) => reference.kind() == SourceKind::Geometry,
    }
}

/// Apply the signed margin to the reference area with mitre joins.
pub fn expand_margin(
    area: &MultiPolygon<f64>,
    mode: &ReferenceMode,
    margin: f64,
) -> ClearResult<MultiPolygon<f64>> {
    if geometry::is_area_empty(area) {
        return Err(ClearError::DegenerateBoundary);
    }

    let buffered = if buffers_individually(mode) {
        let mut pieces = Vec::new();
        for polygon in &area.0 {
            pieces.extend(geometry::buffer_polygons(
                std::slice::from_ref(polygon),
                margin,
                JoinStyle::Mitre,
            ));
        }
        geometry::union_all(&pieces)?
    } else {
        MultiPolygon(geometry::buffer_polygons(&area.0, margin, JoinStyle::Mitre))
    };

    if geometry::is_area_empty(&buffered) {
        return Err(ClearError::DegenerateBoundary);
    }
    Ok(buffered)
}
