//! Per-polygon clearing strategies.
//!
//! Each primitive takes one simple polygon and one tool, and returns
//! centerline paths whose tool-width sweep covers the polygon interior down
//! to the configured overlap. All primitives work on the polygon shrunk
//! inward by the tool radius, so no returned path exits the polygon.
//!
//! `Combo` is a fixed fallback chain (lines, then seed, then standard);
//! per-strategy failures are logged, never surfaced as errors.

use crate::geometry::{self, JoinStyle};
use crate::types::{ClearMethod, Tool};
use geo::{
    BooleanOps, BoundingRect, EuclideanLength, LineString, MultiLineString, MultiPolygon, Polygon,
    Simplify,
};
use tracing::{debug, warn};

/// Douglas-Peucker tolerance applied to finished paths; bounds downstream
/// export size.
const SIMPLIFY_TOLERANCE: f64 = 1e-3;

/// Hard cap on shrink iterations; the stepover always makes progress, this
/// only guards pathological numeric input.
const MAX_SHRINK_PASSES: usize = 10_000;

const LENGTH_EPS: f64 = 1e-9;

/// Clear one simple polygon with one tool. `None` is a recoverable
/// per-polygon failure, reported with the polygon's representative point.
pub fn clear_polygon(polygon: &Polygon<f64>, tool: &Tool) -> Option<Vec<LineString<f64>>> {
    let paths = match tool.method {
        ClearMethod::Standard => clear_standard(polygon, tool),
        ClearMethod::Seed => clear_seed(polygon, tool),
        ClearMethod::Lines => clear_lines(polygon, tool),
        ClearMethod::Combo => {
            let mut attempt = clear_lines(polygon, tool);
            if attempt.is_none() {
                debug!("lines strategy produced nothing, falling back to seed");
                attempt = clear_seed(polygon, tool);
            }
            if attempt.is_none() {
                debug!("seed strategy produced nothing, falling back to standard");
                attempt = clear_standard(polygon, tool);
            }
            attempt
        }
    };

    match paths.map(postprocess) {
        Some(paths) if !paths.is_empty() => Some(paths),
        _ => {
            let at = geometry::representative_point(polygon);
            warn!(
                "polygon near ({:.3}, {:.3}) could not be cleared with diameter {}",
                at.x, at.y, tool.diameter
            );
            None
        }
    }
}

/// Simplify paths and drop degenerate leftovers.
fn postprocess(paths: Vec<LineString<f64>>) -> Vec<LineString<f64>> {
    paths
        .into_iter()
        .filter_map(|path| {
            let simplified = path.simplify(&SIMPLIFY_TOLERANCE);
            let keep = simplified.0.len() >= 2
                && simplified.euclidean_length() > LENGTH_EPS;
            if keep {
                Some(simplified)
            } else {
                None
            }
        })
        .collect()
}

/// Fraction of the radius conceded when a region is exactly as wide as the
/// tool; the resulting sweep overshoot stays well under half a diameter.
const MARGINAL_FIT_RATIO: f64 = 0.01;

/// The interior reachable by the tool center: the polygon shrunk by the tool
/// radius. A region exactly as wide as the tool erodes to nothing, so a
/// marginal fit is retried a hair inside the exact radius.
fn reachable_interior(polygon: &Polygon<f64>, tool: &Tool) -> Vec<Polygon<f64>> {
    let radius = tool.radius();
    let reach = geometry::shrink_polygons(std::slice::from_ref(polygon), radius);
    if !reach.is_empty() {
        return reach;
    }
    geometry::shrink_polygons(
        std::slice::from_ref(polygon),
        radius * (1.0 - MARGINAL_FIT_RATIO),
    )
}

/// Standard (shrink) strategy: concentric inward offsets from the reachable
/// perimeter until the region collapses.
fn clear_standard(polygon: &Polygon<f64>, tool: &Tool) -> Option<Vec<LineString<f64>>> {
    let mut current = reachable_interior(polygon, tool);
    if current.is_empty() {
        return None;
    }

    let step = tool.stepover();
    let mut paths = geometry::rings_of_all(&current);
    for _ in 0..MAX_SHRINK_PASSES {
        current = geometry::buffer_polygons(&current, -step, JoinStyle::Round);
        if current.is_empty() {
            break;
        }
        paths.extend(geometry::rings_of_all(&current));
    }
    Some(paths)
}

/// Seed strategy: concentric circles grown from an interior seed point,
/// clipped to the reachable interior.
fn clear_seed(polygon: &Polygon<f64>, tool: &Tool) -> Option<Vec<LineString<f64>>> {
    let reach = reachable_interior(polygon, tool);
    if reach.is_empty() {
        return None;
    }
    let reach = MultiPolygon(reach);

    let seed = geometry::representative_point(polygon);
    let bounds = polygon.bounding_rect()?;
    let corners = [
        (bounds.min().x, bounds.min().y),
        (bounds.max().x, bounds.min().y),
        (bounds.min().x, bounds.max().y),
        (bounds.max().x, bounds.max().y),
    ];
    let max_radius = corners
        .iter()
        .map(|(x, y)| ((x - seed.x).powi(2) + (y - seed.y).powi(2)).sqrt())
        .fold(0.0, f64::max);

    let step = tool.stepover();
    let mut paths = Vec::new();
    let mut radius = step;
    while radius <= max_radius + step {
        let circle = geometry::circle_ring(seed, radius, geometry::ARC_SEGMENT_LENGTH * 4.0);
        let clipped = reach.clip(&MultiLineString(vec![circle]), false);
        paths.extend(
            clipped
                .0
                .into_iter()
                .filter(|piece| piece.0.len() >= 2 && piece.euclidean_length() > LENGTH_EPS),
        );
        radius += step;
    }

    if tool.contour {
        paths.extend(geometry::rings_of_all(&reach.0));
    }
    if paths.is_empty() {
        None
    } else {
        Some(paths)
    }
}

/// Lines strategy: parallel horizontal passes clipped to the reachable
/// interior, optionally serpentine-connected.
fn clear_lines(polygon: &Polygon<f64>, tool: &Tool) -> Option<Vec<LineString<f64>>> {
    let reach = reachable_interior(polygon, tool);
    if reach.is_empty() {
        return None;
    }
    let reach = MultiPolygon(reach);
    let bounds = reach.bounding_rect()?;

    // Rows start half a step inside the reachable interior; a row exactly on
    // the boundary clips ambiguously.
    let step = tool.stepover();
    let mut hatches = Vec::new();
    let mut y = bounds.min().y + step / 2.0;
    if bounds.max().y - bounds.min().y < step {
        y = (bounds.min().y + bounds.max().y) / 2.0;
    }
    while y < bounds.max().y {
        hatches.push(LineString(vec![
            geo::Coord {
                x: bounds.min().x - 1.0,
                y,
            },
            geo::Coord {
                x: bounds.max().x + 1.0,
                y,
            },
        ]));
        y += step;
    }
    if hatches.is_empty() {
        let mid = (bounds.min().y + bounds.max().y) / 2.0;
        hatches.push(LineString(vec![
            geo::Coord {
                x: bounds.min().x - 1.0,
                y: mid,
            },
            geo::Coord {
                x: bounds.max().x + 1.0,
                y: mid,
            },
        ]));
    }

    let clipped = reach.clip(&MultiLineString(hatches), false);
    let mut passes: Vec<LineString<f64>> = clipped
        .0
        .into_iter()
        .filter(|piece| piece.0.len() >= 2 && piece.euclidean_length() > LENGTH_EPS)
        .collect();

    // Stable ordering keeps runs deterministic regardless of how the clip
    // returns its pieces.
    passes.sort_by(|a, b| {
        let ka = (a.0[0].y, a.0[0].x.min(a.0[a.0.len() - 1].x));
        let kb = (b.0[0].y, b.0[0].x.min(b.0[b.0.len() - 1].x));
        ka.partial_cmp(&kb).unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut paths = if tool.connect {
        // Junctions run along the reach boundary; test them against a
        // hair-inflated copy so exact-on-edge clipping cannot reject them.
        let junction_region = MultiPolygon(geometry::buffer_polygons(
            &reach.0,
            1e-6,
            JoinStyle::Mitre,
        ));
        connect_passes(passes, &junction_region, step)
    } else {
        passes
    };

    if tool.contour {
        paths.extend(geometry::rings_of_all(&reach.0));
    }
    if paths.is_empty() {
        None
    } else {
        Some(paths)
    }
}

/// Join consecutive passes into serpentine chains where the junction stays
/// inside the reachable interior and spans no more than one stepover row.
fn connect_passes(
    passes: Vec<LineString<f64>>,
    reach: &MultiPolygon<f64>,
    step: f64,
) -> Vec<LineString<f64>> {
    let mut chains: Vec<LineString<f64>> = Vec::new();
    let mut current: Option<Vec<geo::Coord<f64>>> = None;

    for mut pass in passes {
        match current.take() {
            None => current = Some(pass.0),
            Some(mut chain) => {
                let end = chain[chain.len() - 1];
                let start = pass.0[0];
                let reversed_start = pass.0[pass.0.len() - 1];
                // Enter the next pass from whichever end is closer.
                let direct = ((end.x - start.x).powi(2) + (end.y - start.y).powi(2)).sqrt();
                let reversed = ((end.x - reversed_start.x).powi(2)
                    + (end.y - reversed_start.y).powi(2))
                .sqrt();
                if reversed < direct {
                    pass.0.reverse();
                }
                let entry = pass.0[0];
                let jump = ((end.x - entry.x).powi(2) + (end.y - entry.y).powi(2)).sqrt();

                if jump <= step * 1.5 && junction_inside(reach, end, entry) {
                    chain.extend(pass.0);
                    current = Some(chain);
                } else {
                    chains.push(LineString(chain));
                    current = Some(pass.0);
                }
            }
        }
    }
    if let Some(chain) = current {
        chains.push(LineString(chain));
    }
    chains
}

/// True when the straight junction between two pass endpoints lies entirely
/// inside the reachable interior.
fn junction_inside(reach: &MultiPolygon<f64>, from: geo::Coord<f64>, to: geo::Coord<f64>) -> bool {
    let junction = LineString(vec![from, to]);
    let length = junction.euclidean_length();
    if length < LENGTH_EPS {
        return true;
    }
    let kept = reach.clip(&MultiLineString(vec![junction]), false);
    let kept_length: f64 = kept.0.iter().map(|piece| piece.euclidean_length()).sum();
    (kept_length - length).abs() < 1e-6
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ClearMethod, ToolOperation};
    use geo::Area;

    fn tool(diameter: f64, method: ClearMethod) -> Tool {
        Tool {
            uid: 1,
            diameter,
            operation: ToolOperation::Clear,
            method,
            overlap: 0.4,
            connect: false,
            contour: true,
            offset_enabled: false,
            offset_value: 0.0,
        }
    }

    fn square(size: f64) -> Polygon<f64> {
        geometry::rect_polygon((0.0, 0.0), (size, size))
    }

    #[test]
    fn test_standard_produces_concentric_rings() {
        let paths = clear_polygon(&square(10.0), &tool(1.0, ClearMethod::Standard))
            .expect("paths");
        assert!(paths.len() > 3, "expected several rings, got {}", paths.len());
        for path in &paths {
            for coord in &path.0 {
                assert!(coord.x > 0.4 && coord.x < 9.6, "x escaped: {}", coord.x);
                assert!(coord.y > 0.4 && coord.y < 9.6, "y escaped: {}", coord.y);
            }
        }
    }

    #[test]
    fn test_standard_sweep_covers_interior() {
        let t = tool(1.0, ClearMethod::Standard);
        let paths = clear_polygon(&square(10.0), &t).expect("paths");
        let covered = geometry::sweep_paths(&paths, t.radius()).expect("sweep");
        let ratio = covered.unsigned_area() / 100.0;
        assert!(ratio > 0.95, "covered only {:.1}% of the pocket", ratio * 100.0);
    }

    #[test]
    fn test_lines_stay_inside() {
        let paths = clear_polygon(&square(10.0), &tool(1.0, ClearMethod::Lines)).expect("paths");
        assert!(!paths.is_empty());
        for path in &paths {
            for coord in &path.0 {
                assert!(coord.x > 0.4 && coord.x < 9.6);
                assert!(coord.y > 0.4 && coord.y < 9.6);
            }
        }
    }

    #[test]
    fn test_connected_lines_form_fewer_paths() {
        let mut disconnected = tool(1.0, ClearMethod::Lines);
        disconnected.contour = false;
        let mut connected = disconnected.clone();
        connected.connect = true;

        let plain = clear_polygon(&square(10.0), &disconnected).expect("paths");
        let joined = clear_polygon(&square(10.0), &connected).expect("paths");
        assert!(joined.len() < plain.len());
    }

    #[test]
    fn test_seed_produces_paths() {
        let paths = clear_polygon(&square(10.0), &tool(1.0, ClearMethod::Seed)).expect("paths");
        assert!(!paths.is_empty());
        for path in &paths {
            for coord in &path.0 {
                assert!(coord.x > 0.4 && coord.x < 9.6);
                assert!(coord.y > 0.4 && coord.y < 9.6);
            }
        }
    }

    #[test]
    fn test_oversized_tool_fails_recoverably() {
        let paths = clear_polygon(&square(1.0), &tool(3.0, ClearMethod::Standard));
        assert!(paths.is_none());
        let paths = clear_polygon(&square(1.0), &tool(3.0, ClearMethod::Combo));
        assert!(paths.is_none());
    }

    #[test]
    fn test_combo_falls_back() {
        let paths = clear_polygon(&square(10.0), &tool(1.0, ClearMethod::Combo));
        assert!(paths.is_some());
    }
}
