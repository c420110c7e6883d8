//! Error types for clearing and isolation jobs.

use std::io;
use thiserror::Error;

/// Errors that can abort a clearing job or reject a tool edit.
///
/// `Cancelled` is control flow rather than a failure: the job wrapper maps it
/// to a distinct outcome and never surfaces it as an error message.
#[derive(Error, Debug)]
pub enum ClearError {
    /// No reference area could be derived from the source or reference object.
    #[error("no reference area: {0}")]
    NoReferenceArea(String),

    /// The margined boundary is missing, empty, or collapsed.
    #[error("the area boundary is empty or degenerate")]
    DegenerateBoundary,

    /// The boundary-minus-features difference failed or came back empty.
    #[error("could not get the extent of the area to be cleared")]
    EmptyArea,

    /// The job was started with no tools selected.
    #[error("no tool selected for the operation")]
    NoToolSelected,

    /// Every selected tool ended the job with empty geometry.
    #[error("no clearing geometry was produced; the tool diameters are likely too large for this geometry")]
    NoGeometryProduced,

    /// A tool with the same diameter (after rounding) already exists.
    #[error("a tool with diameter {0} already exists in the tool set")]
    DuplicateToolDiameter(f64),

    /// A tool with the same uid already exists.
    #[error("a tool with uid {0} already exists in the tool set")]
    DuplicateToolUid(u32),

    /// A tool failed validation at insertion.
    #[error("invalid tool: {0}")]
    InvalidTool(String),

    /// A geometry-library operation failed; converted at the smallest scope.
    #[error("geometry operation failed: {0}")]
    Geometry(String),

    /// I/O error while loading or saving the tool set.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization error while loading or saving the tool set.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Cooperative cancellation was requested.
    #[error("cancelled")]
    Cancelled,
}

impl ClearError {
    /// True for the cancellation variant, which is control flow rather than
    /// a user-facing failure.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, ClearError::Cancelled)
    }
}

/// Result type alias for clearing operations.
pub type ClearResult<T> = Result<T, ClearError>;
