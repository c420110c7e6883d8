//! Job orchestration: normal multi-tool clearing and rest machining.
//!
//! Normal mode resolves the empty area once and lets every selected tool
//! clear the same region independently. Rest machining forces descending
//! diameters and subtracts each tool's physical sweep from the area before
//! handing the remainder to the next tool, so smaller tools only process
//! what larger tools could not reach.

use crate::boundary;
use crate::empty_area;
use crate::error::{ClearError, ClearResult};
use crate::geometry;
use crate::isolation;
use crate::job::JobContext;
use crate::strategies;
use crate::toolset::ToolSet;
use crate::types::{ClearParams, SourceGeometry, SourceShape, ToolOperation, ToolOrder};
use geo::{BooleanOps, LineString, MultiPolygon};
use std::panic::{catch_unwind, AssertUnwindSafe};
use tracing::{info, warn};

/// The finished result of one clearing job: one independent geometry set per
/// retained tool plus the aggregate of all of them.
#[derive(Debug)]
pub struct ClearedObject {
    /// Always true: every tool carries its own geometry.
    pub multigeo: bool,
    /// Retained tools, each with its `solid_geometry`.
    pub tools: ToolSet,
    /// Union of every retained tool's output.
    pub solid_geometry: Vec<LineString<f64>>,
    /// Tools whose isolation ring broke; non-fatal.
    pub broken_isolation_warnings: u32,
    /// Polygons no strategy could clear; non-fatal.
    pub polys_not_cleared: usize,
}

/// Run one clearing job to completion on the current thread.
pub fn run_clearing_job(
    source: &SourceGeometry,
    mut tools: ToolSet,
    params: &ClearParams,
    ctx: &JobContext,
) -> ClearResult<ClearedObject> {
    if tools.is_empty() {
        return Err(ClearError::NoToolSelected);
    }

    ctx.message("deriving reference area");
    let reference = boundary::build_reference_area(source, &params.reference)?;
    let bound = boundary::expand_margin(&reference, &params.reference, params.margin)?;

    let mut warnings = 0u32;
    let coverage: Vec<SourceShape> = if tools.has_isolation_tools() {
        let outcome = isolation::generate_isolation(
            source,
            &mut tools,
            &bound,
            params.margin,
            params.milling_direction,
            ctx,
        )?;
        warnings += outcome.broken_tools;
        outcome
            .coverage
            .0
            .into_iter()
            .map(SourceShape::Solid)
            .collect()
    } else {
        source.solid_geometry().to_vec()
    };

    ctx.message("computing the area to be cleared");
    let standoff = tools.max_clear_standoff();
    let empty = empty_area::resolve_empty_area(&bound, &coverage, standoff, ctx)?;

    let polys_not_cleared = if params.rest_machining {
        clear_rest_machining(&mut tools, empty, ctx)?
    } else {
        clear_each_tool(&mut tools, &empty, params.order, ctx)?
    };

    for dropped in tools.drop_empty() {
        let note = format!(
            "tool d={:.4} mm produced no geometry and was dropped",
            dropped.diameter
        );
        warn!("{note}");
        ctx.message(note);
    }
    if tools.is_empty() {
        return Err(ClearError::NoGeometryProduced);
    }

    if warnings > 0 {
        ctx.message(format!(
            "isolation geometry is broken for {warnings} tool(s); check margin and tool diameters"
        ));
    }
    if polys_not_cleared > 0 {
        ctx.message(format!(
            "{polys_not_cleared} polygon(s) could not be cleared"
        ));
    }
    ctx.progress(100.0);

    let solid_geometry = tools
        .iter()
        .flat_map(|entry| entry.solid_geometry.iter().cloned())
        .collect();
    Ok(ClearedObject {
        multigeo: true,
        tools,
        solid_geometry,
        broken_isolation_warnings: warnings,
        polys_not_cleared,
    })
}

/// Normal mode: every tool independently clears the same empty area.
fn clear_each_tool(
    tools: &mut ToolSet,
    empty: &MultiPolygon<f64>,
    order: ToolOrder,
    ctx: &JobContext,
) -> ClearResult<usize> {
    let uids = tools.uids_for(ToolOperation::Clear, order);
    let total_tools = uids.len().max(1);
    let mut not_cleared = 0usize;

    for (tool_index, uid) in uids.into_iter().enumerate() {
        let Some(tool) = tools.tool(uid).cloned() else {
            continue;
        };
        ctx.message(format!("clearing with tool d={:.4} mm", tool.diameter));

        // The tiny repair buffer heals boolean-op artifacts that would
        // otherwise trip the strategies.
        let candidates = geometry::repair_flatten(empty);
        let total = candidates.len().max(1);
        let mut produced = Vec::new();
        for (index, candidate) in candidates.iter().enumerate() {
            ctx.checkpoint()?;
            match strategies::clear_polygon(candidate, &tool) {
                Some(paths) => produced.extend(paths),
                None => not_cleared += 1,
            }
            let within_tool = (index + 1) as f64 / total as f64;
            ctx.progress((tool_index as f64 + within_tool) / total_tools as f64 * 100.0);
        }
        tools.append_geometry(uid, produced);
    }
    Ok(not_cleared)
}

/// Rest machining: descending diameters, each tool's physical sweep removed
/// from the area before the next tool runs.
fn clear_rest_machining(
    tools: &mut ToolSet,
    mut area: MultiPolygon<f64>,
    ctx: &JobContext,
) -> ClearResult<usize> {
    let uids = tools.uids_for(ToolOperation::Clear, ToolOrder::Reverse);
    let total_tools = uids.len().max(1);
    let mut not_cleared = 0usize;

    for (tool_index, uid) in uids.into_iter().enumerate() {
        if geometry::is_area_empty(&area) {
            break;
        }
        let Some(tool) = tools.tool(uid).cloned() else {
            continue;
        };
        ctx.message(format!(
            "rest machining with tool d={:.4} mm",
            tool.diameter
        ));

        let radius = tool.radius();
        let candidates = geometry::flatten(&area);
        let total = candidates.len().max(1);
        let mut produced: Vec<LineString<f64>> = Vec::new();
        for (index, candidate) in candidates.iter().enumerate() {
            ctx.checkpoint()?;
            // A polygon that cannot hold the tool anywhere is left for the
            // next, smaller tool.
            if geometry::shrink_polygons(std::slice::from_ref(candidate), radius).is_empty() {
                continue;
            }
            match strategies::clear_polygon(candidate, &tool) {
                Some(paths) => produced.extend(paths),
                None => not_cleared += 1,
            }
            let within_tool = (index + 1) as f64 / total as f64;
            ctx.progress((tool_index as f64 + within_tool) / total_tools as f64 * 100.0);
        }

        if produced.is_empty() {
            info!(
                "tool d={:.4} mm produced no geometry; stopping rest machining",
                tool.diameter
            );
            break;
        }

        // The strategies return centerlines, but the physical tool removes
        // the full tool-width sweep; the next iteration must not be offered
        // area that is already cut.
        let covered = geometry::sweep_paths(&produced, radius)?;
        let remaining = catch_unwind(AssertUnwindSafe(|| area.difference(&covered)))
            .map_err(|_| ClearError::Geometry("rest-machining area subtraction failed".to_string()))?;
        area = geometry::revalidate(remaining);
        tools.append_geometry(uid, produced);
    }
    Ok(not_cleared)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::rect_polygon;
    use crate::types::{ClearMethod, MillingDirection, ReferenceMode, SourceKind, Tool};

    fn clear_tool(uid: u32, diameter: f64) -> Tool {
        Tool {
            uid,
            diameter,
            operation: ToolOperation::Clear,
            method: ClearMethod::Standard,
            overlap: 0.4,
            connect: false,
            contour: true,
            offset_enabled: false,
            offset_value: 0.0,
        }
    }

    fn pad_source() -> SourceGeometry {
        SourceGeometry::from_polygons(
            SourceKind::Features,
            vec![rect_polygon((0.0, 0.0), (10.0, 10.0))],
        )
    }

    fn params(margin: f64) -> ClearParams {
        ClearParams {
            reference: ReferenceMode::Itself,
            margin,
            order: ToolOrder::Default,
            rest_machining: false,
            milling_direction: MillingDirection::Climb,
        }
    }

    #[test]
    fn test_no_tool_selected() {
        let err = run_clearing_job(&pad_source(), ToolSet::new(), &params(1.0), &JobContext::new())
            .unwrap_err();
        assert!(matches!(err, ClearError::NoToolSelected));
    }

    #[test]
    fn test_single_tool_clears_margin_ring() {
        let mut tools = ToolSet::new();
        tools.insert(clear_tool(1, 1.0)).unwrap();

        let cleared =
            run_clearing_job(&pad_source(), tools, &params(1.0), &JobContext::new())
                .expect("job");
        assert!(cleared.multigeo);
        assert_eq!(cleared.tools.len(), 1);
        assert!(!cleared.solid_geometry.is_empty());
        assert_eq!(cleared.polys_not_cleared, 0);
    }

    #[test]
    fn test_oversized_tool_fails_job() {
        let mut tools = ToolSet::new();
        tools.insert(clear_tool(1, 8.0)).unwrap();

        let err = run_clearing_job(&pad_source(), tools, &params(1.0), &JobContext::new())
            .unwrap_err();
        assert!(matches!(err, ClearError::NoGeometryProduced));
    }

    #[test]
    fn test_cancelled_job_unwinds() {
        let mut tools = ToolSet::new();
        tools.insert(clear_tool(1, 1.0)).unwrap();

        let ctx = JobContext::new();
        ctx.cancel_handle().cancel();
        let err = run_clearing_job(&pad_source(), tools, &params(1.0), &ctx).unwrap_err();
        assert!(err.is_cancellation());
    }
}
