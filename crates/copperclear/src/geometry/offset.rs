//! Polygon buffering and centerline sweeps.
//!
//! Closed regions are buffered with the straight-skeleton engine (sharp
//! joints for mitred margins, arc joints for tool-reach offsets); open
//! centerline paths are swept with round caps through `geo_offset`, since
//! the physical tool is round and the skeleton engine does not offset
//! line strings.

use crate::error::{ClearError, ClearResult};
use geo::{Area, LineString, MultiPolygon, Polygon};
use geo_buffer::{buffer_multi_polygon, buffer_multi_polygon_rounded};
use geo_offset::{ArcResolution, Offset};
use std::panic::{catch_unwind, AssertUnwindSafe};

/// Segment length used when tessellating swept arcs.
pub const ARC_SEGMENT_LENGTH: f64 = 0.05;
/// Tiny positive buffer that heals boolean-op artifacts before clearing.
pub const REPAIR_BUFFER: f64 = 1e-7;

const AREA_EPS: f64 = 1e-12;

/// Corner treatment for closed-region buffering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinStyle {
    Mitre,
    Round,
}

/// Buffer closed regions by a signed distance. A collapsed region comes back
/// empty rather than failing.
pub fn buffer_polygons(polygons: &[Polygon<f64>], delta: f64, join: JoinStyle) -> Vec<Polygon<f64>> {
    if polygons.is_empty() {
        return Vec::new();
    }
    let region = MultiPolygon(polygons.to_vec());
    let buffered = catch_unwind(AssertUnwindSafe(|| match join {
        JoinStyle::Mitre => buffer_multi_polygon(&region, delta),
        JoinStyle::Round => buffer_multi_polygon_rounded(&region, delta),
    }));
    match buffered {
        Ok(result) => result
            .0
            .into_iter()
            .filter(|polygon| polygon.unsigned_area() > AREA_EPS)
            .collect(),
        // The skeleton engine rejects fully-collapsed input; an empty result
        // carries the same meaning.
        Err(_) => Vec::new(),
    }
}

/// Offset regions inward by `distance`; empty output means the region cannot
/// hold a disc of that radius anywhere.
pub fn shrink_polygons(polygons: &[Polygon<f64>], distance: f64) -> Vec<Polygon<f64>> {
    buffer_polygons(polygons, -distance, JoinStyle::Round)
}

/// Heal boolean-op artifacts with a tiny positive buffer.
pub fn repair_polygons(polygons: &[Polygon<f64>]) -> Vec<Polygon<f64>> {
    buffer_polygons(polygons, REPAIR_BUFFER, JoinStyle::Mitre)
}

/// Round-buffer one centerline path into the region the tool physically
/// removes when tracing it.
pub fn buffer_path(path: &LineString<f64>, radius: f64) -> ClearResult<MultiPolygon<f64>> {
    path.offset_with_arc_resolution(radius, ArcResolution::SegmentLength(ARC_SEGMENT_LENGTH))
        .map_err(|err| ClearError::Geometry(format!("path buffer failed: {err:?}")))
}

/// Union of the tool-width sweeps of a set of centerline paths.
///
/// Centerline paths have zero area; the swept region is what must be
/// subtracted from the remaining area between rest-machining iterations.
pub fn sweep_paths(paths: &[LineString<f64>], radius: f64) -> ClearResult<MultiPolygon<f64>> {
    use geo::BooleanOps;

    let mut covered = MultiPolygon(Vec::new());
    for path in paths {
        if path.0.len() < 2 {
            continue;
        }
        let swept = buffer_path(path, radius)?;
        covered = covered.union(&swept);
    }
    Ok(covered)
}
