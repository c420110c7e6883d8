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

/// The region a correct run must clear: the mitre-margined boundary minus
/// the pad.
fn expected_empty_area(margin: f64) -> MultiPolygon<f64> {
    let boundary = rect_polygon((-margin, -margin), (10.0 + margin, 10.0 + margin));
    boundary.difference(&pad())
}

#[test]
fn test_single_tool_clears_pad_surround() {
    let mut tools = ToolSet::new();
    tools.insert(clear_tool(1, 1.0)).expect("insert tool");

    let params = ClearParams::new(ReferenceMode::Itself, 1.0);
    let cleared = run_clearing_job(&pad_source(), tools, &params, &JobContext::new())
        .expect("clearing job");

    assert!(cleared.multigeo);
    assert_eq!(cleared.tools.len(), 1, "exactly one tool entry");
    let entry = cleared.tools.get(1).expect("tool 1 retained");
    assert!(!entry.solid_geometry.is_empty());
    assert_eq!(cleared.polys_not_cleared, 0);

    // The tool-width sweep of the returned centerlines approximates the
    // 12x12 boundary minus the pad.
    let expected = expected_empty_area(1.0);
    let swept = sweep_paths(&entry.solid_geometry, 0.5).expect("sweep");

    let missed = expected.difference(&swept).unsigned_area();
    assert!(
        missed < 0.5,
        "sweep left {missed:.3} mm^2 of {:.1} mm^2 uncleared",
        expected.unsigned_area()
    );

    // A marginal fit may run a hair inside the exact radius, so the sweep is
    // allowed to lap the region boundary slightly.
    let overshoot = swept.difference(&expected).unsigned_area();
    assert!(
        overshoot < 1.0,
        "sweep exits the clearable region by {overshoot:.3} mm^2"
    );
}

#[test]
fn test_paths_never_exit_margin_or_enter_pad() {
    let mut tools = ToolSet::new();
    tools.insert(clear_tool(1, 1.0)).expect("insert tool");

    let params = ClearParams::new(ReferenceMode::Itself, 1.0);
    let cleared = run_clearing_job(&pad_source(), tools, &params, &JobContext::new())
        .expect("clearing job");

    for path in &cleared.solid_geometry {
        for coord in &path.0 {
            assert!(
                coord.x > -0.6 && coord.x < 10.6 && coord.y > -0.6 && coord.y < 10.6,
                "centerline escaped the margined boundary at ({}, {})",
                coord.x,
                coord.y
            );
            let inside_pad = coord.x > 0.45 && coord.x < 9.55 && coord.y > 0.45 && coord.y < 9.55;
            assert!(
                !inside_pad,
                "centerline entered the kept pad at ({}, {})",
                coord.x, coord.y
            );
        }
    }
}

#[test]
fn test_identical_runs_are_identical() {
    let run = || {
        let mut tools = ToolSet::new();
        tools.insert(clear_tool(1, 1.0)).expect("insert tool");
        let params = ClearParams::new(ReferenceMode::Itself, 1.0);
        run_clearing_job(&pad_source(), tools, &params, &JobContext::new()).expect("job")
    };

    let first = run();
    let second = run();
    assert_eq!(first.solid_geometry.len(), second.solid_geometry.len());
    for (a, b) in first.solid_geometry.iter().zip(second.solid_geometry.iter()) {
        assert_eq!(a.0.len(), b.0.len());
        for (ca, cb) in a.0.iter().zip(b.0.iter()) {
            assert_eq!(ca, cb, "geometry differs between identical runs");
        }
    }
}

#[test]
fn test_background_job_reports_and_completes() {
    use std::sync::{Arc, Mutex};

    let mut tools = ToolSet::new();
    tools.insert(clear_tool(1, 1.0)).expect("insert tool");
    let params = ClearParams::new(ReferenceMode::Itself, 1.0);

    let progress = Arc::new(Mutex::new(Vec::<u8>::new()));
    let sink_progress = Arc::clone(&progress);
    let sink: EventSink = Arc::new(move |event| {
        if let JobEvent::Progress(p) = event {
            sink_progress.lock().unwrap().push(p);
        }
    });

    let handle = submit_clearing_job(pad_source(), tools, params, Some(sink));
    match handle.join() {
        JobOutcome::Completed(cleared) => assert_eq!(cleared.tools.len(), 1),
        other => panic!("expected completion, got {other:?}"),
    }

    let seen = progress.lock().unwrap();
    assert!(!seen.is_empty(), "job reported no progress");
    assert!(seen.iter().all(|p| *p <= 100));
}
