#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    missing_docs,
    rust_2018_idioms
)]

//! Ethica assessment core: the four-stage workflow over a shared state
//! record, with a completeness router, a bounded query-refinement loop,
//! and a checkpointing driver.

/// Pipeline state record, partial updates, and merge.
#[path = "../state.rs"]
pub mod state;

/// Completeness-driven stage router.
#[path = "../router.rs"]
pub mod router;

/// Driver-fatal error taxonomy.
#[path = "../error.rs"]
pub mod error;

/// Prompt builders for every generation call.
#[path = "../prompts.rs"]
pub mod prompts;

/// Stage handlers and their shared runtime.
#[path = "../stages/main.rs"]
pub mod stages;

/// Durable state snapshots.
#[path = "../checkpoint.rs"]
pub mod checkpoint;

/// Driver loop.
#[path = "../driver.rs"]
pub mod driver;

/// Telemetry sink for logs and events.
#[path = "../telemetry.rs"]
pub mod telemetry;

/// TOML-backed runtime configuration.
#[path = "../config.rs"]
pub mod config;

pub use checkpoint::CheckpointStore;
pub use config::AssessmentConfig;
pub use driver::AssessmentDriver;
pub use error::PipelineError;
pub use ethica_evidence::store::Framework;
pub use router::{route, Route, StageName};
pub use stages::StageRuntime;
pub use state::{
    AssessmentState, MergeViolation, StageText, StageUpdate, TextOrigin, WorkflowStatus,
};
pub use telemetry::{AssessmentTelemetry, AssessmentTelemetryBuilder};
