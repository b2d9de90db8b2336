//! Stage 4: synthesize the final report and persist it.
//!
//! Drafts are validated against the mandatory top-level heading, with one
//! corrective regeneration before the heading is prepended outright. The
//! only failure that escapes this stage is the primary artifact write.

use chrono::Utc;
use serde_json::json;
use shared_logging::LogLevel;

use crate::{
    error::PipelineError,
    prompts,
    state::{AssessmentState, StageUpdate},
};

use super::StageRuntime;

pub(crate) async fn run(
    runtime: &StageRuntime,
    state: &AssessmentState,
) -> Result<StageUpdate, PipelineError> {
    let (Some(profile), Some(brief), Some(assessment)) = (
        &state.service_profile,
        &state.criteria_brief,
        &state.risk_assessment,
    ) else {
        runtime.log(
            state,
            LogLevel::Warn,
            "report_generation.inputs_missing",
            json!({}),
        );
        return Ok(StageUpdate::default());
    };
    let keywords = state.risk_keywords.clone().unwrap_or_default();
    let generated_at = Utc::now().format("%Y-%m-%d %H:%M UTC").to_string();

    let draft = match runtime
        .generate(&prompts::report(
            &state.service_name,
            state.framework.label(),
            &profile.content,
            &keywords,
            &brief.content,
            &assessment.content,
            &generated_at,
        ))
        .await
    {
        Ok(text) => text,
        Err(err) => {
            runtime.log(
                state,
                LogLevel::Warn,
                "report_generation.generation_failed",
                json!({ "error": err.to_string() }),
            );
            manual_report(state, &generated_at)
        }
    };

    let draft = ensure_heading(runtime, state, draft).await;
    let content = review(runtime, state, &draft, &keywords).await;

    let artifacts = runtime.renderer().render(
        &content,
        &state.service_name,
        state.framework.label(),
    )?;
    runtime.event(
        "assessment.report.rendered",
        json!({
            "workflow_id": state.workflow_id,
            "primary": artifacts.primary_path,
            "secondary": artifacts.secondary_path,
        }),
    );

    Ok(StageUpdate {
        report_path: Some(artifacts.primary_path),
        ..StageUpdate::default()
    })
}

fn has_heading(text: &str) -> bool {
    text.trim_start().starts_with(prompts::REPORT_HEADING)
}

/// Enforces the mandatory heading: one corrective regeneration, then a
/// plain prepend so rendering always proceeds.
async fn ensure_heading(runtime: &StageRuntime, state: &AssessmentState, draft: String) -> String {
    if has_heading(&draft) {
        return draft;
    }
    runtime.log(
        state,
        LogLevel::Warn,
        "report_generation.heading_missing",
        json!({}),
    );
    if let Ok(retried) = runtime.generate(&prompts::report_retry(&draft)).await {
        if has_heading(&retried) {
            return retried;
        }
    }
    format!("{}\n\n{draft}", prompts::REPORT_HEADING)
}

/// Review pass. A reviewed draft that loses the heading is discarded in
/// favor of the validated input.
async fn review(
    runtime: &StageRuntime,
    state: &AssessmentState,
    draft: &str,
    keywords: &[String],
) -> String {
    match runtime.generate(&prompts::report_review(draft, keywords)).await {
        Ok(reviewed) if has_heading(&reviewed) => reviewed,
        Ok(_) => {
            runtime.log(
                state,
                LogLevel::Warn,
                "report_generation.review_dropped_heading",
                json!({}),
            );
            draft.to_string()
        }
        Err(err) => {
            runtime.log(
                state,
                LogLevel::Warn,
                "report_generation.review_failed",
                json!({ "error": err.to_string() }),
            );
            draft.to_string()
        }
    }
}

/// Deterministic report assembled from state when generation is down.
fn manual_report(state: &AssessmentState, generated_at: &str) -> String {
    let section = |text: &Option<crate::state::StageText>| {
        text.as_ref()
            .map_or_else(|| "Not available.".to_string(), |t| t.content.clone())
    };
    format!(
        "{heading}\n\n\
         - Service: {service}\n\
         - Framework: {framework}\n\
         - Generated: {generated_at}\n\n\
         ## Service Overview\n\n{profile}\n\n\
         ## Applicable Criteria\n\n{brief}\n\n\
         ## Risk Assessment\n\n{assessment}\n\n\
         ## Recommendations\n\n\
         Review the findings above with the service owner and re-run the \
         assessment after addressing the identified gaps.\n",
        heading = prompts::REPORT_HEADING,
        service = state.service_name,
        framework = state.framework.label(),
        profile = section(&state.service_profile),
        brief = section(&state.criteria_brief),
        assessment = section(&state.risk_assessment),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stages::testkit::{harness, long_text};
    use crate::state::{StageText, StageUpdate};
    use ethica_evidence::store::Framework;

    fn ready_state() -> AssessmentState {
        let mut state = AssessmentState::new("Chatbot X", Framework::EuAiAct);
        state
            .merge(StageUpdate {
                service_profile: Some(StageText::generated(long_text("profile"))),
                risk_keywords: Some(vec!["bias".into()]),
                criteria_brief: Some(StageText::generated(long_text("brief"))),
                risk_assessment: Some(StageText::generated(long_text("assessment"))),
                ..StageUpdate::default()
            })
            .unwrap();
        state
    }

    fn headed(body: &str) -> String {
        format!("{}\n\n{body}", prompts::REPORT_HEADING)
    }

    #[tokio::test]
    async fn reviewed_report_is_rendered() {
        let kit = harness();
        kit.generation.push_response(headed("draft body"));
        kit.generation.push_response(headed("reviewed body"));
        let update = run(&kit.runtime, &ready_state()).await.unwrap();
        let path = update.report_path.unwrap();
        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains("reviewed body"));
    }

    #[tokio::test]
    async fn missing_heading_triggers_one_retry() {
        let kit = harness();
        kit.generation.push_response("no heading here".to_string());
        kit.generation.push_response(headed("corrected body"));
        kit.generation.push_response(headed("reviewed body"));
        let update = run(&kit.runtime, &ready_state()).await.unwrap();
        assert!(update.report_path.is_some());
        assert_eq!(kit.generation.seen_prompts().len(), 3);
    }

    #[tokio::test]
    async fn stubborn_draft_gets_heading_prepended() {
        let kit = harness();
        kit.generation.push_response("no heading".to_string());
        kit.generation.push_response("still no heading".to_string());
        kit.generation.push_failure("review down");
        let update = run(&kit.runtime, &ready_state()).await.unwrap();
        let written = std::fs::read_to_string(update.report_path.unwrap()).unwrap();
        assert!(written.starts_with(prompts::REPORT_HEADING));
        assert!(written.contains("no heading"));
    }

    #[tokio::test]
    async fn review_dropping_heading_is_discarded() {
        let kit = harness();
        kit.generation.push_response(headed("draft body"));
        kit.generation.push_response("heading lost".to_string());
        let update = run(&kit.runtime, &ready_state()).await.unwrap();
        let written = std::fs::read_to_string(update.report_path.unwrap()).unwrap();
        assert!(written.contains("draft body"));
        assert!(!written.contains("heading lost"));
    }

    #[tokio::test]
    async fn generation_failure_renders_manual_report() {
        let kit = harness();
        kit.generation.push_failure("down");
        kit.generation.push_failure("down");
        let update = run(&kit.runtime, &ready_state()).await.unwrap();
        let written = std::fs::read_to_string(update.report_path.unwrap()).unwrap();
        assert!(written.starts_with(prompts::REPORT_HEADING));
        assert!(written.contains("## Risk Assessment"));
    }

    #[tokio::test]
    async fn missing_inputs_produce_empty_update() {
        let kit = harness();
        let state = AssessmentState::new("Chatbot X", Framework::EuAiAct);
        let update = run(&kit.runtime, &state).await.unwrap();
        assert!(update.report_path.is_none());
        assert!(kit.generation.seen_prompts().is_empty());
    }
}
