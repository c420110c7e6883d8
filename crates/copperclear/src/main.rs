use anyhow::{Context, Result};
use copperclear::*;
use std::sync::Arc;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args: Vec<String> = std::env::args().collect();
    let operation = args.get(1).map(|s| s.as_str()).unwrap_or("clear");

    match operation {
        "clear" => demo_clear(),
        "rest" => demo_rest(),
        "isolation" => demo_isolation(),
        "spacing" => demo_spacing(),
        "tools" => demo_tools(),
        _ => {
            println!("Usage: copperclear [clear|rest|isolation|spacing|tools]");
            println!("  clear      - Clear around a pad with one tool (default)");
            println!("  rest       - Rest machining with a large and a small tool");
            println!("  isolation  - Isolation rings plus clearing");
            println!("  spacing    - Feature-spacing diagnostic");
            println!("  tools      - Save and reload a tool pool");
            Ok(())
        }
    }
}

fn pad(x: f64, y: f64, size: f64) -> geo::Polygon<f64> {
    rect_polygon((x, y), (x + size, y + size))
}

fn demo_source() -> SourceGeometry {
    SourceGeometry::from_polygons(SourceKind::Features, vec![pad(0.0, 0.0, 10.0)])
}

fn clear_tool(uid: u32, diameter: f64, method: ClearMethod) -> Tool {
    Tool {
        uid,
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

fn print_events() -> EventSink {
    Arc::new(|event| match event {
        JobEvent::Progress(percent) => println!("  ... {percent}%"),
        JobEvent::Message(text) => println!("  {text}"),
    })
}

fn report(outcome: JobOutcome) {
    match outcome {
        JobOutcome::Completed(cleared) => {
            println!("Job completed with {} tool(s):", cleared.tools.len());
            for entry in cleared.tools.iter() {
                println!(
                    "  d={:.3} mm -> {} path(s)",
                    entry.tool.diameter,
                    entry.solid_geometry.len()
                );
            }
            if cleared.broken_isolation_warnings > 0 {
                println!(
                    "  warning: broken isolation for {} tool(s)",
                    cleared.broken_isolation_warnings
                );
            }
        }
        JobOutcome::Cancelled => println!("Job cancelled"),
        JobOutcome::Failed(err) => println!("Job failed: {err}"),
    }
}

fn demo_clear() -> Result<()> {
    println!("copperclear - single tool clearing\n");

    let mut tools = ToolSet::new();
    tools
        .insert(clear_tool(1, 1.0, ClearMethod::Standard))
        .context("insert clearing tool")?;

    let params = ClearParams::new(ReferenceMode::Itself, 1.0);
    let handle = submit_clearing_job(demo_source(), tools, params, Some(print_events()));
    report(handle.join());
    Ok(())
}

fn demo_rest() -> Result<()> {
    println!("copperclear - rest machining\n");

    let mut tools = ToolSet::new();
    tools
        .insert(clear_tool(1, 2.0, ClearMethod::Standard))
        .context("insert roughing tool")?;
    tools
        .insert(clear_tool(2, 0.3, ClearMethod::Standard))
        .context("insert cleanup tool")?;

    let mut params = ClearParams::new(ReferenceMode::Itself, 3.0);
    params.rest_machining = true;
    let handle = submit_clearing_job(demo_source(), tools, params, Some(print_events()));
    report(handle.join());
    Ok(())
}

fn demo_isolation() -> Result<()> {
    println!("copperclear - isolation plus clearing\n");

    let mut tools = ToolSet::new();
    tools
        .insert(Tool {
            uid: 1,
            diameter: 0.3,
            operation: ToolOperation::Isolation,
            method: ClearMethod::Standard,
            overlap: 0.4,
            connect: false,
            contour: false,
            offset_enabled: false,
            offset_value: 0.0,
        })
        .context("insert isolation tool")?;
    tools
        .insert(clear_tool(2, 1.0, ClearMethod::Combo))
        .context("insert clearing tool")?;

    let params = ClearParams::new(ReferenceMode::Itself, 2.0);
    let handle = submit_clearing_job(demo_source(), tools, params, Some(print_events()));
    report(handle.join());
    Ok(())
}

fn demo_spacing() -> Result<()> {
    println!("copperclear - feature spacing diagnostic\n");

    let source = SourceGeometry::from_polygons(
        SourceKind::Features,
        vec![pad(0.0, 0.0, 4.0), pad(5.0, 0.0, 4.0), pad(0.0, 7.0, 4.0)],
    );
    let mut tools = ToolSet::new();
    tools
        .insert(clear_tool(1, 0.8, ClearMethod::Standard))
        .context("insert tool")?;
    tools
        .insert(clear_tool(2, 2.5, ClearMethod::Standard))
        .context("insert tool")?;

    let report = check_tool_fit(&source, &tools, &JobContext::new())?;
    match report.min_distance {
        Some(min) => println!("Minimum feature spacing: {min:.3} mm"),
        None => println!("Fewer than two primitives; no spacing constraint"),
    }
    println!("Tools that fit everywhere: {:?}", report.fitting_tools);
    Ok(())
}

fn demo_tools() -> Result<()> {
    println!("copperclear - tool pool persistence\n");

    let mut tools = ToolSet::new();
    tools
        .insert(clear_tool(1, 1.0, ClearMethod::Standard))
        .context("insert tool")?;
    tools
        .insert(clear_tool(2, 0.5, ClearMethod::Lines))
        .context("insert tool")?;

    let path = ToolSet::default_path().context("resolve tool pool path")?;
    tools
        .save_to_path(&path)
        .with_context(|| format!("save tool pool to {}", path.display()))?;
    let loaded =
        ToolSet::load_from_path(&path).with_context(|| format!("reload {}", path.display()))?;
    println!("Saved and reloaded {} tool(s) at {}", loaded.len(), path.display());
    Ok(())
}
