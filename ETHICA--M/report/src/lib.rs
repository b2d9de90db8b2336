#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    missing_docs,
    rust_2018_idioms
)]

//! Report rendering: persists the assessment report as a markdown primary
//! artifact plus a best-effort HTML secondary artifact.

/// Renderer and artifact paths.
#[path = "../renderer.rs"]
pub mod renderer;

/// Minimal markdown-to-HTML conversion for the secondary artifact.
#[path = "../html.rs"]
pub mod html;

pub use renderer::{RenderError, ReportArtifacts, ReportRenderer};
