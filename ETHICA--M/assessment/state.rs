use std::path::PathBuf;

use chrono::{DateTime, Utc};
use ethica_evidence::store::Framework;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Merge schema violations a stage update can carry.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum MergeViolation {
    /// The stage-1 pair arrived half-set.
    #[error("service_profile and risk_keywords must be set together or not at all")]
    SplitStageOnePair,
}

/// Workflow lifecycle status. Transitions only move forward:
/// `Initialized -> Running -> {Completed, Failed}`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    /// Created, not yet driven.
    Initialized,
    /// Being driven through stages.
    Running,
    /// Terminal: all stages done.
    Completed,
    /// Terminal: aborted by a driver-fatal error.
    Failed,
}

impl WorkflowStatus {
    /// Whether moving to `next` respects the forward-only contract.
    #[must_use]
    pub const fn allows(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Initialized, Self::Running)
                | (Self::Running, Self::Completed | Self::Failed)
                | (Self::Initialized, Self::Failed)
        )
    }

    /// True for `Completed` and `Failed`.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// Origin of a message-bearing state field; preserved in snapshots.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TextOrigin {
    /// Produced by the generation adapter.
    Generated,
    /// Raw evidence carried through without synthesis.
    Retrieved,
    /// Fixed sentinel emitted on a degraded path.
    Fallback,
}

/// Text plus the discriminator recording where it came from.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StageText {
    /// Origin kind.
    pub origin: TextOrigin,
    /// Text content.
    pub content: String,
}

impl StageText {
    /// Wraps generated text.
    #[must_use]
    pub fn generated(content: impl Into<String>) -> Self {
        Self {
            origin: TextOrigin::Generated,
            content: content.into(),
        }
    }

    /// Wraps raw retrieved evidence.
    #[must_use]
    pub fn retrieved(content: impl Into<String>) -> Self {
        Self {
            origin: TextOrigin::Retrieved,
            content: content.into(),
        }
    }

    /// Wraps a degraded-path sentinel.
    #[must_use]
    pub fn fallback(content: impl Into<String>) -> Self {
        Self {
            origin: TextOrigin::Fallback,
            content: content.into(),
        }
    }
}

/// The single state record threaded through all four stages. Fields are
/// populated strictly in stage order; the router decides the next stage
/// from field presence alone.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AssessmentState {
    /// User-supplied service identifier. Immutable after creation.
    pub service_name: String,
    /// Selected framework. Immutable after creation.
    pub framework: Framework,
    /// Stage-1 output: natural-language service profile.
    pub service_profile: Option<StageText>,
    /// Stage-1 output: ordered, de-duplicated risk keywords. Set together
    /// with `service_profile` or not at all.
    pub risk_keywords: Option<Vec<String>>,
    /// Stage-2 output: applicable-criteria brief.
    pub criteria_brief: Option<StageText>,
    /// Stage-2 retry counter; meaningful only while `criteria_brief` is
    /// unset. Bounded at [`crate::stages::MAX_QUERY_ATTEMPTS`].
    pub query_attempt: u8,
    /// Most recent search query, carried across retries for rewriting.
    pub last_query: Option<String>,
    /// Stage-3 output: verified risk assessment.
    pub risk_assessment: Option<StageText>,
    /// Stage-4 output: primary report artifact path.
    pub report_path: Option<PathBuf>,
    /// Lifecycle status.
    pub status: WorkflowStatus,
    /// Run identity.
    pub workflow_id: Uuid,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last merge timestamp.
    pub updated_at: DateTime<Utc>,
}

impl AssessmentState {
    /// Creates a fresh state for one workflow run.
    #[must_use]
    pub fn new(service_name: impl Into<String>, framework: Framework) -> Self {
        let now = Utc::now();
        Self {
            service_name: service_name.into(),
            framework,
            service_profile: None,
            risk_keywords: None,
            criteria_brief: None,
            query_attempt: 0,
            last_query: None,
            risk_assessment: None,
            report_path: None,
            status: WorkflowStatus::Initialized,
            workflow_id: Uuid::new_v4(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Advances the status, ignoring transitions the forward-only
    /// contract forbids.
    pub fn advance_status(&mut self, next: WorkflowStatus) {
        if self.status.allows(next) {
            self.status = next;
            self.updated_at = Utc::now();
        }
    }

    /// Merges a validated partial update, shallow last-write-wins per
    /// present field. Never unsets a field.
    pub fn merge(&mut self, update: StageUpdate) -> Result<(), MergeViolation> {
        update.validate()?;
        let StageUpdate {
            service_profile,
            risk_keywords,
            criteria_brief,
            query_attempt,
            last_query,
            risk_assessment,
            report_path,
            status,
        } = update;
        if let Some(profile) = service_profile {
            self.service_profile = Some(profile);
        }
        if let Some(keywords) = risk_keywords {
            self.risk_keywords = Some(dedupe_keywords(keywords));
        }
        if let Some(brief) = criteria_brief {
            self.criteria_brief = Some(brief);
        }
        if let Some(attempt) = query_attempt {
            self.query_attempt = attempt;
        }
        if let Some(query) = last_query {
            self.last_query = Some(query);
        }
        if let Some(assessment) = risk_assessment {
            self.risk_assessment = Some(assessment);
        }
        if let Some(path) = report_path {
            self.report_path = Some(path);
        }
        if let Some(next) = status {
            self.advance_status(next);
        }
        self.updated_at = Utc::now();
        Ok(())
    }
}

/// Immutable partial update returned by a stage handler. Absent fields are
/// left untouched by the merge.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StageUpdate {
    /// New service profile.
    pub service_profile: Option<StageText>,
    /// New keyword list.
    pub risk_keywords: Option<Vec<String>>,
    /// New criteria brief. Retry updates from stage 2 deliberately leave
    /// this absent.
    pub criteria_brief: Option<StageText>,
    /// New retry counter value.
    pub query_attempt: Option<u8>,
    /// New last-issued query.
    pub last_query: Option<String>,
    /// New risk assessment.
    pub risk_assessment: Option<StageText>,
    /// New report artifact path.
    pub report_path: Option<PathBuf>,
    /// Status advance request.
    pub status: Option<WorkflowStatus>,
}

impl StageUpdate {
    /// Checks the merge schema: the stage-1 pair must arrive atomically.
    pub const fn validate(&self) -> Result<(), MergeViolation> {
        if self.service_profile.is_some() != self.risk_keywords.is_some() {
            return Err(MergeViolation::SplitStageOnePair);
        }
        Ok(())
    }
}

fn dedupe_keywords(keywords: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    keywords
        .into_iter()
        .map(|keyword| keyword.trim().to_string())
        .filter(|keyword| keyword.chars().count() > 1)
        .filter(|keyword| seen.insert(keyword.to_lowercase()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_moves_forward_only() {
        let mut state = AssessmentState::new("Chatbot X", Framework::EuAiAct);
        state.advance_status(WorkflowStatus::Running);
        state.advance_status(WorkflowStatus::Completed);
        state.advance_status(WorkflowStatus::Running);
        assert_eq!(state.status, WorkflowStatus::Completed);
    }

    #[test]
    fn merge_rejects_half_of_stage_one_pair() {
        let mut state = AssessmentState::new("Chatbot X", Framework::EuAiAct);
        let update = StageUpdate {
            service_profile: Some(StageText::generated("profile")),
            ..StageUpdate::default()
        };
        assert_eq!(state.merge(update), Err(MergeViolation::SplitStageOnePair));
        assert!(state.service_profile.is_none());
    }

    #[test]
    fn merge_never_unsets_fields() {
        let mut state = AssessmentState::new("Chatbot X", Framework::EuAiAct);
        state
            .merge(StageUpdate {
                criteria_brief: Some(StageText::retrieved("brief")),
                ..StageUpdate::default()
            })
            .unwrap();
        state
            .merge(StageUpdate {
                query_attempt: Some(1),
                ..StageUpdate::default()
            })
            .unwrap();
        assert!(state.criteria_brief.is_some());
        assert_eq!(state.query_attempt, 1);
    }

    #[test]
    fn keywords_are_deduped_in_order() {
        let mut state = AssessmentState::new("Chatbot X", Framework::EuAiAct);
        state
            .merge(StageUpdate {
                service_profile: Some(StageText::generated("profile")),
                risk_keywords: Some(vec![
                    "bias".into(),
                    "Bias".into(),
                    "privacy".into(),
                    "x".into(),
                ]),
                ..StageUpdate::default()
            })
            .unwrap();
        assert_eq!(
            state.risk_keywords,
            Some(vec!["bias".to_string(), "privacy".to_string()])
        );
    }

    #[test]
    fn snapshot_round_trips() {
        let state = AssessmentState::new("Chatbot X", Framework::UnescoAiEthics);
        let json = serde_json::to_string(&state).unwrap();
        let parsed: AssessmentState = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, state);
    }
}
