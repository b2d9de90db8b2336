//! Stage 3: evaluate the service against the resolved criteria, then run a
//! verification pass over the draft.

use serde_json::json;
use shared_logging::LogLevel;

use crate::{
    error::PipelineError,
    prompts,
    state::{AssessmentState, StageText, StageUpdate},
};

use super::StageRuntime;

/// Assessment recorded when the evaluation could not be produced at all.
pub const FALLBACK_ASSESSMENT: &str =
    "The risk assessment could not be generated. The report will carry this \
     placeholder; re-run the workflow to obtain a substantive evaluation.";

pub(crate) async fn run(
    runtime: &StageRuntime,
    state: &AssessmentState,
) -> Result<StageUpdate, PipelineError> {
    let (Some(profile), Some(brief)) = (&state.service_profile, &state.criteria_brief) else {
        runtime.log(
            state,
            LogLevel::Warn,
            "ethics_evaluation.inputs_missing",
            json!({}),
        );
        return Ok(fallback_update());
    };
    let keywords = state.risk_keywords.clone().unwrap_or_default();

    let draft = match runtime
        .generate(&prompts::evaluation(
            &state.service_name,
            state.framework.label(),
            &profile.content,
            &keywords,
            &brief.content,
        ))
        .await
    {
        Ok(text) => text,
        Err(err) => {
            runtime.log(
                state,
                LogLevel::Warn,
                "ethics_evaluation.generation_failed",
                json!({ "error": err.to_string() }),
            );
            return Ok(fallback_update());
        }
    };

    // The verified text replaces the draft wholesale; a failed verification
    // keeps the draft rather than losing the stage's work.
    let assessment = match runtime
        .generate(&prompts::verification(&draft, &keywords))
        .await
    {
        Ok(text) => text,
        Err(err) => {
            runtime.log(
                state,
                LogLevel::Warn,
                "ethics_evaluation.verification_failed",
                json!({ "error": err.to_string() }),
            );
            draft
        }
    };

    Ok(StageUpdate {
        risk_assessment: Some(StageText::generated(assessment)),
        ..StageUpdate::default()
    })
}

fn fallback_update() -> StageUpdate {
    StageUpdate {
        risk_assessment: Some(StageText::fallback(FALLBACK_ASSESSMENT)),
        ..StageUpdate::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stages::testkit::{harness, long_text};
    use crate::state::TextOrigin;
    use ethica_evidence::store::Framework;

    fn ready_state() -> AssessmentState {
        let mut state = AssessmentState::new("Chatbot X", Framework::EuAiAct);
        state
            .merge(StageUpdate {
                service_profile: Some(StageText::generated(long_text("profile"))),
                risk_keywords: Some(vec!["bias".into()]),
                criteria_brief: Some(StageText::generated(long_text("brief"))),
                ..StageUpdate::default()
            })
            .unwrap();
        state
    }

    #[tokio::test]
    async fn verified_text_replaces_the_draft() {
        let kit = harness();
        kit.generation.push_response(long_text("draft assessment"));
        kit.generation.push_response(long_text("verified assessment"));
        let update = run(&kit.runtime, &ready_state()).await.unwrap();
        let assessment = update.risk_assessment.unwrap();
        assert!(assessment.content.contains("verified assessment"));
        assert_eq!(kit.generation.seen_prompts().len(), 2);
    }

    #[tokio::test]
    async fn failed_verification_keeps_the_draft() {
        let kit = harness();
        kit.generation.push_response(long_text("draft assessment"));
        kit.generation.push_failure("rate limited");
        let update = run(&kit.runtime, &ready_state()).await.unwrap();
        assert!(update.risk_assessment.unwrap().content.contains("draft assessment"));
    }

    #[tokio::test]
    async fn failed_generation_yields_fallback() {
        let kit = harness();
        kit.generation.push_failure("down");
        let update = run(&kit.runtime, &ready_state()).await.unwrap();
        let assessment = update.risk_assessment.unwrap();
        assert_eq!(assessment.origin, TextOrigin::Fallback);
        assert_eq!(assessment.content, FALLBACK_ASSESSMENT);
    }

    #[tokio::test]
    async fn missing_inputs_yield_fallback_without_calls() {
        let kit = harness();
        let state = AssessmentState::new("Chatbot X", Framework::EuAiAct);
        let update = run(&kit.runtime, &state).await.unwrap();
        assert_eq!(update.risk_assessment.unwrap().origin, TextOrigin::Fallback);
        assert!(kit.generation.seen_prompts().is_empty());
    }
}
