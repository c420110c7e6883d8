use copperclear::*;
use geo::{Area, BooleanOps, MultiPolygon};

fn pad() -> geo::Polygon<f64> {
    rect_polygon((0.0, 0.0), (10.0, 10.0))
}

fn pad_source() -> SourceGeometry {
    SourceGeometry::from_polygons(SourceKind::Features, vec![pad()])
}

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

fn rest_params(margin: f64) -> ClearParams {
    let mut params = ClearParams::new(ReferenceMode::Itself, margin);
    params.rest_machining = true;
    // Rest machining must force descending diameters no matter what the
    // caller configures.
    params.order = ToolOrder::Forward;
    params
}

#[test]
fn test_two_tools_split_the_work() {
    let mut tools = ToolSet::new();
    tools.insert(clear_tool(1, 2.0)).expect("roughing tool");
    tools.insert(clear_tool(2, 0.3)).expect("cleanup tool");

    let cleared = run_clearing_job(&pad_source(), tools, &rest_params(3.0), &JobContext::new())
        .expect("rest job");

    assert_eq!(cleared.tools.len(), 2, "both tools must retain geometry");
    let rough = cleared.tools.get(1).expect("large tool");
    let fine = cleared.tools.get(2).expect("small tool");
    assert!(!rough.solid_geometry.is_empty());
    assert!(!fine.solid_geometry.is_empty());

    let rough_swept = sweep_paths(&rough.solid_geometry, 1.0).expect("sweep");
    let fine_swept = sweep_paths(&fine.solid_geometry, 0.15).expect("sweep");

    // Descending order: the large tool removes the bulk, the small one only
    // the corners it could not reach.
    assert!(
        rough_swept.unsigned_area() > fine_swept.unsigned_area() * 5.0,
        "large tool cleared {:.2} mm^2, small tool {:.2} mm^2",
        rough_swept.unsigned_area(),
        fine_swept.unsigned_area()
    );

    // Per-tool regions stay disjoint: each tool only processes what earlier
    // tools left behind.
    let overlap = rough_swept.intersection(&fine_swept).unsigned_area();
    assert!(overlap < 0.2, "tool sweeps overlap by {overlap:.3} mm^2");

    // Together the sweeps approximate the whole clearable region.
    let boundary = rect_polygon((-3.0, -3.0), (13.0, 13.0));
    let expected = boundary.difference(&pad());
    let combined = rough_swept.union(&fine_swept);
    let missed = expected.difference(&combined).unsigned_area();
    assert!(
        missed < 1.5,
        "rest machining left {missed:.3} mm^2 of {:.1} mm^2 uncleared",
        expected.unsigned_area()
    );
}

#[test]
fn test_loop_stops_when_largest_tool_is_useless() {
    // The margin band is far too narrow for both tools, and the loop must
    // stop after the first tool produces nothing rather than iterate on.
    let mut tools = ToolSet::new();
    tools.insert(clear_tool(1, 9.0)).expect("tool");
    tools.insert(clear_tool(2, 8.0)).expect("tool");

    let err = run_clearing_job(&pad_source(), tools, &rest_params(1.0), &JobContext::new())
        .unwrap_err();
    assert!(matches!(err, ClearError::NoGeometryProduced));
}

#[test]
fn test_single_tool_rest_matches_normal_coverage() {
    let run = |rest: bool| {
        let mut tools = ToolSet::new();
        tools.insert(clear_tool(1, 1.0)).expect("tool");
        let mut params = ClearParams::new(ReferenceMode::Itself, 2.0);
        params.rest_machining = rest;
        let cleared = run_clearing_job(&pad_source(), tools, &params, &JobContext::new())
            .expect("job");
        let entry = cleared.tools.get(1).expect("tool");
        sweep_paths(&entry.solid_geometry, 0.5).expect("sweep")
    };

    let normal: MultiPolygon<f64> = run(false);
    let rest: MultiPolygon<f64> = run(true);
    let delta = normal.difference(&rest).unsigned_area() + rest.difference(&normal).unsigned_area();
    assert!(
        delta < 0.5,
        "single-tool rest machining diverges from normal mode by {delta:.3} mm^2"
    );
}
