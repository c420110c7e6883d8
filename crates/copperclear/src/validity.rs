//! Feature-spacing diagnostic.
//!
//! Computes the minimum pairwise nearest-point distance over the source's
//! primitive polygons: the widest tool guaranteed to finish a complete
//! clear or isolation pass. Advisory only; an under-sized selection warns
//! and never fails the job.

use crate::error::ClearResult;
use crate::job::JobContext;
use crate::toolset::ToolSet;
use crate::types::SourceGeometry;
use geo::{EuclideanDistance, Polygon};
use std::thread::{self, JoinHandle};
use tracing::{info, warn};

/// Outcome of the tool-fit check.
#[derive(Debug, Clone)]
pub struct SpacingReport {
    /// Minimum pairwise distance, or `None` with fewer than two primitives.
    pub min_distance: Option<f64>,
    /// Uids of selected tools narrow enough to pass everywhere.
    pub fitting_tools: Vec<u32>,
}

/// Minimum distance between the nearest points of any two primitive
/// polygons. O(n^2) over the feature set; cancellable per pair.
pub fn minimum_feature_spacing(
    source: &SourceGeometry,
    ctx: &JobContext,
) -> ClearResult<Option<f64>> {
    let polygons: Vec<&Polygon<f64>> = source.polygons().collect();
    if polygons.len() < 2 {
        return Ok(None);
    }

    let total_pairs = polygons.len() * (polygons.len() - 1) / 2;
    let mut seen = 0usize;
    let mut minimum = f64::INFINITY;
    for i in 0..polygons.len() {
        for j in (i + 1)..polygons.len() {
            ctx.checkpoint()?;
            let distance = polygons[i].euclidean_distance(polygons[j]);
            if distance < minimum {
                minimum = distance;
            }
            seen += 1;
        }
        ctx.progress((seen as f64 / total_pairs as f64) * 100.0);
    }
    Ok(Some(minimum))
}

/// Compare the selected tool diameters against the feature spacing.
pub fn check_tool_fit(
    source: &SourceGeometry,
    tools: &ToolSet,
    ctx: &JobContext,
) -> ClearResult<SpacingReport> {
    let min_distance = minimum_feature_spacing(source, ctx)?;

    let fitting_tools: Vec<u32> = match min_distance {
        // No spacing constraint: everything fits.
        None => tools.iter().map(|entry| entry.tool.uid).collect(),
        Some(min) => tools
            .iter()
            .filter(|entry| entry.tool.diameter <= min)
            .map(|entry| entry.tool.uid)
            .collect(),
    };

    match min_distance {
        Some(min) if fitting_tools.is_empty() => {
            let note = format!(
                "every selected tool is wider than the minimum feature spacing {min:.4} mm; clearing or isolation will be incomplete"
            );
            warn!("{note}");
            ctx.message(note);
        }
        Some(min) => {
            info!(
                "minimum feature spacing {:.4} mm; {} tool(s) fit",
                min,
                fitting_tools.len()
            );
        }
        None => {}
    }

    Ok(SpacingReport {
        min_distance,
        fitting_tools,
    })
}

/// Run the spacing scan off-thread; the scan is a pure function of its
/// input, so it shares nothing with a running job.
pub fn spawn_spacing_check(
    source: SourceGeometry,
    ctx: JobContext,
) -> JoinHandle<ClearResult<Option<f64>>> {
    thread::Builder::new()
        .name("copperclear-spacing".to_string())
        .spawn(move || minimum_feature_spacing(&source, &ctx))
        .expect("spawn spacing worker")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::rect_polygon;
    use crate::types::{ClearMethod, SourceKind, Tool, ToolOperation};

    fn source_with_gap(gap: f64) -> SourceGeometry {
        SourceGeometry::from_polygons(
            SourceKind::Features,
            vec![
                rect_polygon((0.0, 0.0), (2.0, 2.0)),
                rect_polygon((2.0 + gap, 0.0), (4.0 + gap, 2.0)),
            ],
        )
    }

    fn tool(uid: u32, diameter: f64) -> Tool {
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

    #[test]
    fn test_minimum_spacing_between_pads() {
        let ctx = JobContext::new();
        let min = minimum_feature_spacing(&source_with_gap(3.0), &ctx)
            .expect("scan")
            .expect("distance");
        assert!((min - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_single_primitive_has_no_spacing() {
        let source = SourceGeometry::from_polygons(
            SourceKind::Features,
            vec![rect_polygon((0.0, 0.0), (2.0, 2.0))],
        );
        let ctx = JobContext::new();
        assert!(minimum_feature_spacing(&source, &ctx).expect("scan").is_none());
    }

    #[test]
    fn test_fit_report_flags_oversized_selection() {
        let mut tools = ToolSet::new();
        tools.insert(tool(1, 2.0)).unwrap();
        tools.insert(tool(2, 5.0)).unwrap();

        let ctx = JobContext::new();
        let report = check_tool_fit(&source_with_gap(1.0), &tools, &ctx).expect("report");
        assert!(report.fitting_tools.is_empty());

        let report = check_tool_fit(&source_with_gap(3.0), &tools, &ctx).expect("report");
        assert_eq!(report.fitting_tools, vec![1]);
    }

    #[test]
    fn test_spawned_scan_matches_inline() {
        let handle = spawn_spacing_check(source_with_gap(2.5), JobContext::new());
        let min = handle.join().expect("join").expect("scan").expect("distance");
        assert!((min - 2.5).abs() < 1e-9);
    }
}
