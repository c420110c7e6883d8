//! Isolation envelopes: offset rings traced around feature boundaries.
//!
//! For each isolation tool the feature set is offset outward by half the
//! tool diameter with directed polyline offsets. The resulting boundary
//! rings (wound to match the milling direction) are clipped to the working
//! boundary and stored as that tool's geometry; the filled envelope regions
//! become the feature coverage used when resolving the empty area.

use crate::error::ClearResult;
use crate::geometry;
use crate::job::JobContext;
use crate::toolset::ToolSet;
use crate::types::{MillingDirection, SourceGeometry, SourceShape, ToolOperation, ToolOrder};
use cavalier_contours::polyline::{PlineSource, PlineSourceMut, PlineVertex, Polyline};
use geo::{BooleanOps, Contains, Coord, LineString, MultiLineString, MultiPolygon, Point, Polygon};
use tracing::{debug, warn};

const COINCIDENT_EPS: f64 = 1e-9;
/// Endpoint tolerance when deciding whether a clipped ring closed.
const RING_CLOSE_EPS: f64 = 1e-6;

/// Result of the isolation stage.
#[derive(Debug)]
pub struct IsolationOutcome {
    /// Union of every tool's envelope regions; replaces the raw source as
    /// feature coverage downstream.
    pub coverage: MultiPolygon<f64>,
    /// Number of tools whose isolation ring broke (or was designed broken by
    /// `margin < diameter`).
    pub broken_tools: u32,
}

/// Generate isolation geometry for every isolation tool in the set.
pub fn generate_isolation(
    source: &SourceGeometry,
    tools: &mut ToolSet,
    boundary: &MultiPolygon<f64>,
    margin: f64,
    direction: MillingDirection,
    ctx: &JobContext,
) -> ClearResult<IsolationOutcome> {
    let uids = tools.uids_for(ToolOperation::Isolation, ToolOrder::Default);
    let total = uids.len();
    let mut broken_tools = 0u32;
    let mut envelope_regions: Vec<Polygon<f64>> = Vec::new();

    for (index, uid) in uids.into_iter().enumerate() {
        ctx.checkpoint()?;
        let Some(tool) = tools.tool(uid).cloned() else {
            continue;
        };
        ctx.message(format!(
            "generating isolation for tool d={:.4} mm",
            tool.diameter
        ));

        // A tool wider than the margin cannot close its ring inside the
        // working area; the geometry is designed incomplete.
        let mut broken = if margin < tool.diameter {
            warn!(
                "margin {:.4} is smaller than isolation tool diameter {:.4}; ring will not close",
                margin, tool.diameter
            );
            true
        } else {
            false
        };

        let envelope = feature_envelope(source, tool.radius())?;
        let rings = directed_rings(&envelope, direction);

        let mut kept: Vec<LineString<f64>> = Vec::new();
        for ring in rings {
            // Rings entirely inside the boundary need no clipping and stay
            // whole by construction.
            if ring
                .0
                .iter()
                .all(|c| boundary.contains(&Point::new(c.x, c.y)))
            {
                kept.push(ring);
                continue;
            }
            let clipped = boundary.clip(&MultiLineString(vec![ring]), false);
            let pieces: Vec<LineString<f64>> = clipped
                .0
                .into_iter()
                .filter(|piece| piece.0.len() >= 2)
                .collect();
            // A ring that survives clipping intact comes back as one closed
            // piece; anything else means the sweep could not close.
            if pieces.len() != 1 || !ring_is_closed(&pieces[0]) {
                broken = true;
            }
            kept.extend(pieces);
        }

        if broken {
            broken_tools += 1;
            debug!("isolation ring broken for tool d={:.4}", tool.diameter);
        }

        tools.append_geometry(uid, kept);
        envelope_regions.extend(envelope);
        ctx.progress(((index + 1) as f64 / total as f64) * 100.0);
    }

    let coverage = geometry::union_all(&envelope_regions)?;
    Ok(IsolationOutcome {
        coverage,
        broken_tools,
    })
}

fn ring_is_closed(ring: &LineString<f64>) -> bool {
    match (ring.0.first(), ring.0.last()) {
        (Some(first), Some(last)) => {
            (first.x - last.x).abs() < RING_CLOSE_EPS && (first.y - last.y).abs() < RING_CLOSE_EPS
        }
        _ => false,
    }
}

/// The feature set offset outward by `radius`: polygons through directed
/// polyline offsets, open paths through a round sweep.
fn feature_envelope(source: &SourceGeometry, radius: f64) -> ClearResult<Vec<Polygon<f64>>> {
    let mut offset_plines: Vec<Polyline> = Vec::new();
    let mut swept: Vec<Polygon<f64>> = Vec::new();

    for shape in source.solid_geometry() {
        match shape {
            SourceShape::Solid(polygon) => {
                // Outer CCW, holes CW: a negative parallel offset then moves
                // every boundary away from the filled interior.
                let mut plines = Vec::new();
                let mut outer = ring_to_polyline(polygon.exterior());
                if outer.area() < 0.0 {
                    outer.invert_direction_mut();
                }
                plines.push(outer);
                for hole in polygon.interiors() {
                    let mut pline = ring_to_polyline(hole);
                    if pline.area() > 0.0 {
                        pline.invert_direction_mut();
                    }
                    plines.push(pline);
                }
                for pline in plines {
                    offset_plines.extend(pline.parallel_offset(-radius));
                }
            }
            SourceShape::Path(line) => {
                swept.extend(geometry::buffer_path(line, radius)?.0);
            }
        }
    }

    let mut polygons = rebuild_polygons(&offset_plines);
    polygons.extend(swept);
    Ok(polygons)
}

/// Reconstruct polygons from offset polylines: positive area becomes an
/// outer ring, negative a hole, holes re-attached by containment.
fn rebuild_polygons(plines: &[Polyline]) -> Vec<Polygon<f64>> {
    let mut outers: Vec<LineString<f64>> = Vec::new();
    let mut holes: Vec<LineString<f64>> = Vec::new();

    for pline in plines {
        let ring = polyline_ring(pline);
        if ring.0.len() < 4 {
            continue;
        }
        if geometry::signed_ring_area(&ring) >= 0.0 {
            outers.push(ring);
        } else {
            holes.push(ring);
        }
    }

    let mut assigned: Vec<Vec<LineString<f64>>> = vec![Vec::new(); outers.len()];
    'holes: for hole in holes {
        let probe = Point::new(hole.0[0].x, hole.0[0].y);
        for (index, outer) in outers.iter().enumerate() {
            let shell = Polygon::new(outer.clone(), vec![]);
            if shell.contains(&probe) {
                assigned[index].push(hole);
                continue 'holes;
            }
        }
    }

    outers
        .into_iter()
        .zip(assigned)
        .map(|(outer, interior)| Polygon::new(outer, interior))
        .collect()
}

/// Envelope boundary rings wound for the milling direction: climb runs
/// exteriors counter-clockwise, conventional clockwise; holes run opposite.
fn directed_rings(envelope: &[Polygon<f64>], direction: MillingDirection) -> Vec<LineString<f64>> {
    let mut rings = Vec::new();
    for polygon in envelope {
        rings.push(wind_ring(
            polygon.exterior().clone(),
            direction == MillingDirection::Climb,
        ));
        for hole in polygon.interiors() {
            rings.push(wind_ring(
                hole.clone(),
                direction != MillingDirection::Climb,
            ));
        }
    }
    rings
}

fn wind_ring(ring: LineString<f64>, counter_clockwise: bool) -> LineString<f64> {
    let ring = geometry::close_ring(ring);
    let is_ccw = geometry::signed_ring_area(&ring) > 0.0;
    if is_ccw == counter_clockwise {
        ring
    } else {
        LineString(ring.0.into_iter().rev().collect())
    }
}

fn ring_to_polyline(ring: &LineString<f64>) -> Polyline {
    let mut pline = Polyline::new();
    let mut coords: Vec<Coord<f64>> = ring.0.clone();
    // Closed polylines carry no duplicate end vertex.
    if coords.len() > 1 {
        let first = coords[0];
        let last = coords[coords.len() - 1];
        if (first.x - last.x).abs() < COINCIDENT_EPS && (first.y - last.y).abs() < COINCIDENT_EPS {
            coords.pop();
        }
    }
    let mut previous: Option<Coord<f64>> = None;
    for coord in coords {
        if let Some(prev) = previous {
            if (prev.x - coord.x).abs() < COINCIDENT_EPS
                && (prev.y - coord.y).abs() < COINCIDENT_EPS
            {
                continue;
            }
        }
        pline.add_vertex(PlineVertex::new(coord.x, coord.y, 0.0));
        previous = Some(coord);
    }
    pline.set_is_closed(true);
    pline
}

/// Closed ring from an offset polyline, flattening arc segments through
/// their midpoint.
fn polyline_ring(pline: &Polyline) -> LineString<f64> {
    let count = pline.vertex_count();
    let mut coords = Vec::with_capacity(count + 1);
    for index in 0..count {
        let vertex = pline.at(index);
        coords.push(Coord {
            x: vertex.x,
            y: vertex.y,
        });
        if vertex.bulge.abs() > 1e-6 {
            let next = pline.at((index + 1) % count);
            if let Some(mid) = arc_midpoint(vertex.x, vertex.y, next.x, next.y, vertex.bulge) {
                coords.push(mid);
            }
        }
    }
    geometry::close_ring(LineString(coords))
}

fn arc_midpoint(x1: f64, y1: f64, x2: f64, y2: f64, bulge: f64) -> Option<Coord<f64>> {
    let dx = x2 - x1;
    let dy = y2 - y1;
    let chord = (dx * dx + dy * dy).sqrt();
    if chord < 1e-6 {
        return None;
    }
    let sagitta = bulge * (chord / 2.0);
    let nx = -dy / chord;
    let ny = dx / chord;
    Some(Coord {
        x: (x1 + x2) / 2.0 + nx * sagitta,
        y: (y1 + y2) / 2.0 + ny * sagitta,
    })
}
