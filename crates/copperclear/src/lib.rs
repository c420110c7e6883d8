//! Non-copper area clearing for PCB milling: reference-area derivation,
//! isolation envelopes, empty-area resolution, per-polygon clearing
//! strategies, and single- or multi-tool (rest machining) orchestration.

mod boundary;
mod clearing;
mod empty_area;
mod error;
mod geometry;
mod isolation;
mod job;
mod strategies;
mod toolset;
mod types;
mod validity;

pub use boundary::{build_reference_area, expand_margin};
pub use clearing::{run_clearing_job, ClearedObject};
pub use empty_area::resolve_empty_area;
pub use error::{ClearError, ClearResult};
pub use geometry::*;
pub use isolation::{generate_isolation, IsolationOutcome};
pub use job::{
    outcome_of, submit_clearing_job, CancelHandle, EventSink, JobContext, JobEvent, JobHandle,
    JobOutcome,
};
pub use strategies::clear_polygon;
pub use toolset::{ToolEntry, ToolSet};
pub use types::*;
pub use validity::{check_tool_fit, minimum_feature_spacing, spawn_spacing_check, SpacingReport};
