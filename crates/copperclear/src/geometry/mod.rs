//! Shared geometry helpers over the `geo` vocabulary.

use crate::error::{ClearError, ClearResult};
use geo::{Area, BooleanOps, Centroid, Coord, LineString, MultiPolygon, Polygon};
use std::panic::{catch_unwind, AssertUnwindSafe};

pub mod offset;

pub use offset::{
    buffer_path, buffer_polygons, repair_polygons, shrink_polygons, sweep_paths, JoinStyle,
    ARC_SEGMENT_LENGTH, REPAIR_BUFFER,
};

const AREA_EPS: f64 = 1e-12;
const COINCIDENT_EPS: f64 = 1e-9;

/// True when a region carries no usable area.
pub fn is_area_empty(region: &MultiPolygon<f64>) -> bool {
    region.0.is_empty() || region.unsigned_area() < AREA_EPS
}

/// Split a region into its disjoint simple polygons (holes stay attached).
pub fn flatten(region: &MultiPolygon<f64>) -> Vec<Polygon<f64>> {
    region.0.clone()
}

/// Heal boolean artifacts with the tiny repair buffer, then re-flatten.
pub fn repair_flatten(region: &MultiPolygon<f64>) -> Vec<Polygon<f64>> {
    repair_polygons(&region.0)
}

/// Shoelace area; positive for counter-clockwise rings. Works on open and
/// closed rings alike.
pub fn signed_ring_area(ring: &LineString<f64>) -> f64 {
    let coords = &ring.0;
    if coords.len() < 3 {
        return 0.0;
    }
    let mut sum = 0.0;
    for window in coords.windows(2) {
        sum += (window[0].x * window[1].y) - (window[1].x * window[0].y);
    }
    let first = coords[0];
    let last = coords[coords.len() - 1];
    if (first.x - last.x).abs() > COINCIDENT_EPS || (first.y - last.y).abs() > COINCIDENT_EPS {
        sum += (last.x * first.y) - (first.x * last.y);
    }
    sum / 2.0
}

/// Ensure the ring's last coordinate repeats its first.
pub fn close_ring(mut ring: LineString<f64>) -> LineString<f64> {
    if let (Some(first), Some(last)) = (ring.0.first().copied(), ring.0.last().copied()) {
        if (first.x - last.x).abs() > COINCIDENT_EPS || (first.y - last.y).abs() > COINCIDENT_EPS {
            ring.0.push(first);
        }
    }
    ring
}

/// Exterior and interior rings of a polygon, closed.
pub fn rings_of(polygon: &Polygon<f64>) -> Vec<LineString<f64>> {
    let mut rings = vec![close_ring(polygon.exterior().clone())];
    for interior in polygon.interiors() {
        rings.push(close_ring(interior.clone()));
    }
    rings
}

/// Exterior and interior rings over a set of polygons.
pub fn rings_of_all(polygons: &[Polygon<f64>]) -> Vec<LineString<f64>> {
    polygons.iter().flat_map(rings_of).collect()
}

/// Fold a polygon list into one region. Boolean failures on degenerate
/// input are converted rather than unwound.
pub fn union_all(polygons: &[Polygon<f64>]) -> ClearResult<MultiPolygon<f64>> {
    let mut acc = MultiPolygon(Vec::new());
    for polygon in polygons {
        let piece = MultiPolygon(vec![polygon.clone()]);
        acc = catch_unwind(AssertUnwindSafe(|| acc.union(&piece)))
            .map_err(|_| ClearError::Geometry("union of degenerate polygons".to_string()))?;
    }
    Ok(acc)
}

/// Re-node a region after differencing, dropping slivers the boolean op
/// leaves behind. Falls back to the input when the region is too degenerate
/// to re-process.
pub fn revalidate(region: MultiPolygon<f64>) -> MultiPolygon<f64> {
    let repaired = catch_unwind(AssertUnwindSafe(|| {
        region.union(&MultiPolygon(Vec::new()))
    }));
    match repaired {
        Ok(clean) => clean,
        Err(_) => region,
    }
}

/// A point that identifies the polygon in diagnostics.
pub fn representative_point(polygon: &Polygon<f64>) -> Coord<f64> {
    match polygon.centroid() {
        Some(point) => Coord {
            x: point.x(),
            y: point.y(),
        },
        None => polygon
            .exterior()
            .0
            .first()
            .copied()
            .unwrap_or(Coord { x: 0.0, y: 0.0 }),
    }
}

/// Axis-aligned rectangle from two opposite corners.
pub fn rect_polygon(corner_a: (f64, f64), corner_b: (f64, f64)) -> Polygon<f64> {
    let (x0, x1) = (corner_a.0.min(corner_b.0), corner_a.0.max(corner_b.0));
    let (y0, y1) = (corner_a.1.min(corner_b.1), corner_a.1.max(corner_b.1));
    Polygon::new(
        LineString(vec![
            Coord { x: x0, y: y0 },
            Coord { x: x1, y: y0 },
            Coord { x: x1, y: y1 },
            Coord { x: x0, y: y1 },
            Coord { x: x0, y: y0 },
        ]),
        vec![],
    )
}

/// Closed polygon from a click sequence; `None` below three distinct points.
pub fn polygon_from_points(points: &[(f64, f64)]) -> Option<Polygon<f64>> {
    if points.len() < 3 {
        return None;
    }
    let coords: Vec<Coord<f64>> = points.iter().map(|(x, y)| Coord { x: *x, y: *y }).collect();
    Some(Polygon::new(close_ring(LineString(coords)), vec![]))
}

/// Closed circle approximation with segments no longer than `max_segment`.
pub fn circle_ring(center: Coord<f64>, radius: f64, max_segment: f64) -> LineString<f64> {
    let circumference = 2.0 * std::f64::consts::PI * radius;
    let segments = ((circumference / max_segment).ceil() as usize).clamp(16, 256);
    let mut coords = Vec::with_capacity(segments + 1);
    for step in 0..segments {
        let angle = 2.0 * std::f64::consts::PI * (step as f64) / (segments as f64);
        coords.push(Coord {
            x: center.x + radius * angle.cos(),
            y: center.y + radius * angle.sin(),
        });
    }
    coords.push(coords[0]);
    LineString(coords)
}
