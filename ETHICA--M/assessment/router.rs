use serde::{Deserialize, Serialize};

use crate::state::{AssessmentState, WorkflowStatus};

/// The four stage handlers, in pipeline order.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StageName {
    /// Service characterization.
    ServiceInput,
    /// Criteria resolution with the query-refinement loop.
    CriteriaSearch,
    /// Risk evaluation with the verification pass.
    EthicsEvaluation,
    /// Report synthesis and rendering.
    ReportGeneration,
}

impl StageName {
    /// Stable key used in logs and events.
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::ServiceInput => "service_input",
            Self::CriteriaSearch => "criteria_search",
            Self::EthicsEvaluation => "ethics_evaluation",
            Self::ReportGeneration => "report_generation",
        }
    }
}

/// Routing outcome: the next stage, or workflow end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Run this stage next.
    Stage(StageName),
    /// Terminal: nothing left to do.
    End,
}

/// Pure completeness router. Reads only field presence and status, never
/// the retry counter; first match wins. Total over all reachable states.
#[must_use]
pub const fn route(state: &AssessmentState) -> Route {
    if matches!(state.status, WorkflowStatus::Completed) {
        return Route::End;
    }
    // service_profile and risk_keywords form one completeness unit.
    if state.service_profile.is_none() || state.risk_keywords.is_none() {
        return Route::Stage(StageName::ServiceInput);
    }
    if state.criteria_brief.is_none() {
        return Route::Stage(StageName::CriteriaSearch);
    }
    if state.risk_assessment.is_none() {
        return Route::Stage(StageName::EthicsEvaluation);
    }
    if state.report_path.is_none() {
        return Route::Stage(StageName::ReportGeneration);
    }
    Route::End
}
