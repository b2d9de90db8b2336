use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::html::markdown_to_html_page;

/// Errors emitted while persisting report artifacts.
#[derive(Debug, Error)]
pub enum RenderError {
    /// Primary artifact could not be written.
    #[error("report persistence failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Paths of the rendered artifacts. The secondary artifact is best-effort;
/// its absence is not a failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportArtifacts {
    /// Markdown report path.
    pub primary_path: PathBuf,
    /// HTML rendition path, when the conversion succeeded.
    pub secondary_path: Option<PathBuf>,
}

/// Renders assessment reports into an output directory.
#[derive(Debug, Clone)]
pub struct ReportRenderer {
    output_dir: PathBuf,
}

impl ReportRenderer {
    /// Creates a renderer writing under the given directory.
    #[must_use]
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    /// Output directory used by this renderer.
    #[must_use]
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Persists the markdown report and attempts the HTML rendition.
    /// Only the primary write may fail the call.
    pub fn render(
        &self,
        content: &str,
        service_name: &str,
        framework_label: &str,
    ) -> Result<ReportArtifacts, RenderError> {
        std::fs::create_dir_all(&self.output_dir)?;
        let timestamp = Utc::now().format("%Y%m%d_%H%M%S");
        let base = format!(
            "{}_{}_{timestamp}",
            sanitize(service_name),
            sanitize(framework_label)
        );

        let primary_path = self.output_dir.join(format!("{base}.md"));
        std::fs::write(&primary_path, content)?;

        let title = format!("{service_name} - {framework_label} assessment");
        let secondary_path = {
            let page = markdown_to_html_page(&title, content);
            let path = self.output_dir.join(format!("{base}.html"));
            std::fs::write(&path, page).ok().map(|()| path)
        };

        Ok(ReportArtifacts {
            primary_path,
            secondary_path,
        })
    }
}

fn sanitize(name: &str) -> String {
    name.chars()
        .map(|ch| {
            if ch.is_alphanumeric() || ch == '-' || ch == '_' {
                ch
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn writes_primary_and_secondary() {
        let dir = tempdir().unwrap();
        let renderer = ReportRenderer::new(dir.path());
        let artifacts = renderer
            .render("# AI Ethics Risk Assessment Report\n\nBody.", "Chatbot X", "EU AI Act")
            .unwrap();
        assert!(artifacts.primary_path.exists());
        let secondary = artifacts.secondary_path.expect("html rendition");
        assert!(secondary.exists());
        let html = std::fs::read_to_string(secondary).unwrap();
        assert!(html.contains("<h1>"));
    }

    #[test]
    fn file_names_are_sanitized() {
        let dir = tempdir().unwrap();
        let renderer = ReportRenderer::new(dir.path());
        let artifacts = renderer.render("body", "Chat/bot: X", "EU AI Act").unwrap();
        let name = artifacts.primary_path.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("Chat_bot__X_EU_AI_Act_"));
    }

    #[test]
    fn unwritable_directory_fails() {
        let renderer = ReportRenderer::new("/proc/ethica-denied");
        assert!(renderer.render("body", "svc", "EU AI Act").is_err());
    }
}
