use thiserror::Error;

/// Driver-fatal failures. Adapter and adequacy problems never surface here;
/// stage handlers fold them into partial updates. Only persistence failures
/// and contract violations abort a run.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// State snapshot could not be written or read.
    #[error("checkpoint persistence failed: {0}")]
    Checkpoint(#[source] anyhow::Error),
    /// Report artifact could not be persisted.
    #[error("artifact persistence failed: {0}")]
    Artifact(#[from] ethica_report::RenderError),
    /// A stage produced a partial update violating the merge schema.
    #[error("invalid stage update: {0}")]
    InvalidUpdate(#[from] crate::state::MergeViolation),
    /// The driver looped past its iteration ceiling without terminating.
    #[error("driver exceeded {0} iterations without reaching a terminal state")]
    Stalled(usize),
}
