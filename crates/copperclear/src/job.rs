//! Background execution of clearing jobs.
//!
//! One job is one worker thread that owns the tool set and all intermediate
//! geometry; the caller only sees progress events and a terminal outcome.
//! Cancellation is cooperative: loops check a shared flag at each candidate
//! and unwind through [`ClearError::Cancelled`], which the wrapper maps to
//! [`JobOutcome::Cancelled`] with no partial result.

use crate::clearing;
use crate::error::{ClearError, ClearResult};
use crate::types::{ClearParams, SourceGeometry};
use crate::{ClearedObject, ToolSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::info;

/// An observational notification from a running job.
#[derive(Debug, Clone)]
pub enum JobEvent {
    /// Completion estimate, 0–100.
    Progress(u8),
    /// User-facing status text.
    Message(String),
}

pub type EventSink = Arc<dyn Fn(JobEvent) + Send + Sync>;

/// Handle used to request cooperative cancellation.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Progress and cancellation context threaded through every long loop.
#[derive(Clone, Default)]
pub struct JobContext {
    cancel: CancelHandle,
    sink: Option<EventSink>,
}

impl JobContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sink(sink: EventSink) -> Self {
        Self {
            cancel: CancelHandle::default(),
            sink: Some(sink),
        }
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Checked at loop heads; errors with the cancellation variant when the
    /// flag is set.
    pub fn checkpoint(&self) -> ClearResult<()> {
        if self.is_cancelled() {
            Err(ClearError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Emit a completion estimate. Purely observational.
    pub fn progress(&self, percent: f64) {
        if let Some(sink) = &self.sink {
            let clamped = percent.clamp(0.0, 100.0).round() as u8;
            sink(JobEvent::Progress(clamped));
        }
    }

    pub fn message(&self, text: impl Into<String>) {
        if let Some(sink) = &self.sink {
            sink(JobEvent::Message(text.into()));
        }
    }
}

impl std::fmt::Debug for JobContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobContext")
            .field("cancelled", &self.is_cancelled())
            .field("has_sink", &self.sink.is_some())
            .finish()
    }
}

/// Terminal state of a submitted job.
#[derive(Debug)]
pub enum JobOutcome {
    Completed(ClearedObject),
    Failed(ClearError),
    Cancelled,
}

/// A running clearing job.
pub struct JobHandle {
    worker: JoinHandle<JobOutcome>,
    cancel: CancelHandle,
}

impl JobHandle {
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Block until the worker finishes.
    pub fn join(self) -> JobOutcome {
        match self.worker.join() {
            Ok(outcome) => outcome,
            Err(_) => JobOutcome::Failed(ClearError::Geometry(
                "job worker panicked".to_string(),
            )),
        }
    }
}

/// Map a run result to its terminal outcome, folding cancellation out of the
/// error path.
pub fn outcome_of(result: ClearResult<ClearedObject>) -> JobOutcome {
    match result {
        Ok(cleared) => JobOutcome::Completed(cleared),
        Err(err) if err.is_cancellation() => JobOutcome::Cancelled,
        Err(err) => JobOutcome::Failed(err),
    }
}

/// Submit one clearing run to a background worker thread.
pub fn submit_clearing_job(
    source: SourceGeometry,
    tools: ToolSet,
    params: ClearParams,
    sink: Option<EventSink>,
) -> JobHandle {
    let ctx = match sink {
        Some(sink) => JobContext::with_sink(sink),
        None => JobContext::new(),
    };
    let cancel = ctx.cancel_handle();

    let worker = thread::Builder::new()
        .name("copperclear-job".to_string())
        .spawn(move || {
            info!(tools = tools.len(), rest = params.rest_machining, "clearing job started");
            let outcome = outcome_of(clearing::run_clearing_job(&source, tools, &params, &ctx));
            match &outcome {
                JobOutcome::Completed(_) => info!("clearing job completed"),
                JobOutcome::Cancelled => info!("clearing job cancelled"),
                JobOutcome::Failed(err) => info!(error = %err, "clearing job failed"),
            }
            outcome
        })
        .expect("spawn clearing job worker");

    JobHandle { worker, cancel }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_checkpoint_reports_cancellation() {
        let ctx = JobContext::new();
        assert!(ctx.checkpoint().is_ok());

        ctx.cancel_handle().cancel();
        let err = ctx.checkpoint().unwrap_err();
        assert!(err.is_cancellation());
    }

    #[test]
    fn test_progress_is_clamped() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink_seen = Arc::clone(&seen);
        let ctx = JobContext::with_sink(Arc::new(move |event| {
            if let JobEvent::Progress(p) = event {
                sink_seen.lock().unwrap().push(p);
            }
        }));

        ctx.progress(-5.0);
        ctx.progress(42.4);
        ctx.progress(180.0);
        assert_eq!(*seen.lock().unwrap(), vec![0, 42, 100]);
    }

    #[test]
    fn test_outcome_folds_cancellation() {
        assert!(matches!(
            outcome_of(Err(ClearError::Cancelled)),
            JobOutcome::Cancelled
        ));
        assert!(matches!(
            outcome_of(Err(ClearError::EmptyArea)),
            JobOutcome::Failed(_)
        ));
    }
}
