//! Stage handlers and the shared runtime they borrow adapters from.
//!
//! Handlers are pure with respect to state: each reads the current record
//! and returns a partial update, never mutating in place. Adapter failures
//! degrade into fallback content inside the handler; only artifact
//! persistence failures escape as errors.

/// Stage 1: service characterization and keyword extraction.
pub mod service_input;
/// Stage 2: criteria resolution with the bounded query-refinement loop.
pub mod criteria_search;
/// Stage 3: risk evaluation with the verification pass.
pub mod ethics_evaluation;
/// Stage 4: report synthesis and rendering.
pub mod report_generation;

pub use criteria_search::MAX_QUERY_ATTEMPTS;

use std::{sync::Arc, time::Duration};

use ethica_evidence::{
    adequacy::EvidenceOutcome,
    retriever::{FrameworkRetriever, SearchError},
    web::WebSearchClient,
};
use ethica_generation::{GenerationClient, GenerationError};
use ethica_report::ReportRenderer;
use serde_json::json;
use shared_logging::LogLevel;

use crate::{
    error::PipelineError,
    router::StageName,
    state::{AssessmentState, StageUpdate},
    telemetry::AssessmentTelemetry,
};

const DEFAULT_ADAPTER_TIMEOUT: Duration = Duration::from_secs(60);

/// Shared adapter bundle the driver hands to every stage invocation.
pub struct StageRuntime {
    generation: Arc<dyn GenerationClient>,
    retriever: FrameworkRetriever,
    web: Arc<dyn WebSearchClient>,
    renderer: ReportRenderer,
    telemetry: Option<AssessmentTelemetry>,
    adapter_timeout: Duration,
}

impl StageRuntime {
    /// Creates a runtime over the four adapters.
    #[must_use]
    pub fn new(
        generation: Arc<dyn GenerationClient>,
        retriever: FrameworkRetriever,
        web: Arc<dyn WebSearchClient>,
        renderer: ReportRenderer,
    ) -> Self {
        Self {
            generation,
            retriever,
            web,
            renderer,
            telemetry: None,
            adapter_timeout: DEFAULT_ADAPTER_TIMEOUT,
        }
    }

    /// Attaches a telemetry handle.
    #[must_use]
    pub fn with_telemetry(mut self, telemetry: AssessmentTelemetry) -> Self {
        self.telemetry = Some(telemetry);
        self
    }

    /// Overrides the per-adapter-call timeout.
    #[must_use]
    pub const fn with_adapter_timeout(mut self, timeout: Duration) -> Self {
        self.adapter_timeout = timeout;
        self
    }

    /// Runs the named stage against the current state and returns its
    /// partial update.
    pub async fn handle(
        &self,
        stage: StageName,
        state: &AssessmentState,
    ) -> Result<StageUpdate, PipelineError> {
        self.log(state, LogLevel::Info, "stage.start", json!({ "stage": stage.key() }));
        let update = match stage {
            StageName::ServiceInput => service_input::run(self, state).await,
            StageName::CriteriaSearch => criteria_search::run(self, state).await,
            StageName::EthicsEvaluation => ethics_evaluation::run(self, state).await,
            StageName::ReportGeneration => report_generation::run(self, state).await,
        }?;
        self.log(
            state,
            LogLevel::Info,
            "stage.complete",
            json!({ "stage": stage.key() }),
        );
        Ok(update)
    }

    pub(crate) async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        match tokio::time::timeout(self.adapter_timeout, self.generation.generate(prompt)).await {
            Ok(result) => result,
            Err(_) => Err(GenerationError::Provider("generation call timed out".into())),
        }
    }

    pub(crate) async fn web_search(&self, query: &str) -> Result<EvidenceOutcome, SearchError> {
        match tokio::time::timeout(self.adapter_timeout, self.web.search(query)).await {
            Ok(result) => result,
            Err(_) => Err(SearchError::Provider("web search timed out".into())),
        }
    }

    pub(crate) const fn retriever(&self) -> &FrameworkRetriever {
        &self.retriever
    }

    pub(crate) const fn renderer(&self) -> &ReportRenderer {
        &self.renderer
    }

    pub(crate) fn log(
        &self,
        state: &AssessmentState,
        level: LogLevel,
        message: &str,
        metadata: serde_json::Value,
    ) {
        if let Some(telemetry) = &self.telemetry {
            let _ = telemetry.log_workflow(state.workflow_id, level, message, metadata);
        }
    }

    pub(crate) fn event(&self, event_type: &str, payload: serde_json::Value) {
        if let Some(telemetry) = &self.telemetry {
            let _ = telemetry.event(event_type, payload);
        }
    }
}

#[cfg(test)]
pub(crate) mod testkit {
    use super::*;
    use ethica_evidence::store::{CorpusRecord, Framework, FrameworkStore};
    use ethica_generation::ScriptedGenerationClient;
    use ethica_evidence::web::ScriptedWebClient;
    use tempfile::TempDir;

    pub(crate) struct Harness {
        pub generation: Arc<ScriptedGenerationClient>,
        pub web: Arc<ScriptedWebClient>,
        pub runtime: StageRuntime,
        pub _output: TempDir,
    }

    pub(crate) fn corpus_store() -> FrameworkStore {
        let store = FrameworkStore::default();
        store.insert(CorpusRecord::new(
            Framework::EuAiAct,
            "eu_ai_act.txt",
            0,
            "Providers of high-risk AI systems shall establish a risk management \
             system covering bias, transparency, and human oversight obligations \
             across the full lifecycle of the system.",
        ));
        store
    }

    pub(crate) fn harness_with_store(store: FrameworkStore) -> Harness {
        let generation = Arc::new(ScriptedGenerationClient::default());
        let web = Arc::new(ScriptedWebClient::default());
        let output = TempDir::new().expect("tempdir");
        let runtime = StageRuntime::new(
            Arc::clone(&generation) as Arc<dyn GenerationClient>,
            FrameworkRetriever::new(store),
            Arc::clone(&web) as Arc<dyn WebSearchClient>,
            ReportRenderer::new(output.path()),
        );
        Harness {
            generation,
            web,
            runtime,
            _output: output,
        }
    }

    pub(crate) fn harness() -> Harness {
        harness_with_store(corpus_store())
    }

    pub(crate) fn long_text(label: &str) -> String {
        format!("{label}: {}", "analysis ".repeat(30))
    }
}
