//! Driver loop: route, run the stage, merge its update, checkpoint.
//!
//! The driver is the only place that advances lifecycle status and the
//! only place that persists state. Stage handlers stay pure; everything a
//! handler cannot absorb surfaces here as a [`PipelineError`] and marks
//! the run failed before the final snapshot.

use serde_json::json;
use shared_logging::LogLevel;

use crate::{
    checkpoint::CheckpointStore,
    error::PipelineError,
    router::{route, Route},
    state::{AssessmentState, WorkflowStatus},
    stages::StageRuntime,
    telemetry::AssessmentTelemetry,
};

const DEFAULT_MAX_ITERATIONS: usize = 16;

/// Runs one workflow from any resumable state to a terminal status.
pub struct AssessmentDriver {
    runtime: StageRuntime,
    checkpoints: CheckpointStore,
    telemetry: Option<AssessmentTelemetry>,
    max_iterations: usize,
}

impl AssessmentDriver {
    /// Creates a driver over the stage runtime and checkpoint store.
    #[must_use]
    pub const fn new(runtime: StageRuntime, checkpoints: CheckpointStore) -> Self {
        Self {
            runtime,
            checkpoints,
            telemetry: None,
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }

    /// Attaches a telemetry handle.
    #[must_use]
    pub fn with_telemetry(mut self, telemetry: AssessmentTelemetry) -> Self {
        self.telemetry = Some(telemetry);
        self
    }

    /// Overrides the iteration ceiling.
    #[must_use]
    pub const fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Drives the state until the router reports the end. The returned
    /// state is terminal; a snapshot of every intermediate state is on
    /// disk, including the failed one when an error is returned.
    pub async fn run(
        &self,
        mut state: AssessmentState,
    ) -> Result<AssessmentState, PipelineError> {
        state.advance_status(WorkflowStatus::Running);
        self.checkpoint(&state)?;
        self.log(&state, "driver.run.start", json!({ "service": state.service_name }));

        let mut iterations = 0usize;
        loop {
            match route(&state) {
                Route::End => {
                    if state.status != WorkflowStatus::Failed {
                        state.advance_status(WorkflowStatus::Completed);
                    }
                    self.checkpoint(&state)?;
                    self.log(
                        &state,
                        "driver.run.complete",
                        json!({ "iterations": iterations }),
                    );
                    return Ok(state);
                }
                Route::Stage(stage) => {
                    iterations += 1;
                    if iterations > self.max_iterations {
                        return Err(self.fail(&mut state, PipelineError::Stalled(self.max_iterations)));
                    }
                    let update = match self.runtime.handle(stage, &state).await {
                        Ok(update) => update,
                        Err(err) => return Err(self.fail(&mut state, err)),
                    };
                    if let Err(violation) = state.merge(update) {
                        return Err(self.fail(&mut state, PipelineError::InvalidUpdate(violation)));
                    }
                    self.checkpoint(&state)?;
                }
            }
        }
    }

    /// Marks the run failed and snapshots best-effort; the original error
    /// always wins over a snapshot failure here.
    fn fail(&self, state: &mut AssessmentState, err: PipelineError) -> PipelineError {
        state.advance_status(WorkflowStatus::Failed);
        if let Err(snapshot_err) = self.checkpoints.save(state) {
            self.log(
                state,
                "driver.checkpoint.failed",
                json!({ "error": snapshot_err.to_string() }),
            );
        }
        self.log(state, "driver.run.failed", json!({ "error": err.to_string() }));
        err
    }

    fn checkpoint(&self, state: &AssessmentState) -> Result<(), PipelineError> {
        let path = self
            .checkpoints
            .save(state)
            .map_err(PipelineError::Checkpoint)?;
        self.log(state, "driver.checkpoint.saved", json!({ "path": path }));
        Ok(())
    }

    fn log(&self, state: &AssessmentState, message: &str, metadata: serde_json::Value) {
        if let Some(telemetry) = &self.telemetry {
            let _ = telemetry.log_workflow(state.workflow_id, LogLevel::Info, message, metadata);
        }
    }
}
