//! Stage 1: characterize the service and extract risk keywords.
//!
//! Always produces the profile/keyword pair, falling back to placeholder
//! content on every degraded path so the router can move forward.

use ethica_evidence::adequacy::EvidenceOutcome;
use serde_json::json;
use shared_logging::LogLevel;

use crate::{
    error::PipelineError,
    prompts,
    state::{AssessmentState, StageText, StageUpdate},
};

use super::StageRuntime;

/// Marker phrase the profile prompt instructs the model to emit when the
/// service name alone is not enough to describe the service.
pub const UNCHARACTERIZABLE_MARKER: &str = "cannot be characterized";

/// Profile used when neither the model nor the web could characterize the
/// service.
pub const LOW_CONFIDENCE_PROFILE: &str =
    "The service could not be characterized from the available information. \
     This assessment proceeds on a low-confidence basis and should be \
     re-run once more service detail is available.";

/// Keywords paired with [`LOW_CONFIDENCE_PROFILE`].
pub const FALLBACK_KEYWORDS: [&str; 3] = ["unknown", "insufficient_data", "analysis_failure"];

/// Keywords used when the generation adapter itself failed.
pub const ERROR_KEYWORDS: [&str; 2] = ["error", "processing_failure"];

const ERROR_PROFILE: &str =
    "Profile generation failed; the service is recorded without characterization. \
     Downstream stages operate on placeholder content.";

pub(crate) async fn run(
    runtime: &StageRuntime,
    state: &AssessmentState,
) -> Result<StageUpdate, PipelineError> {
    let profile = match runtime
        .generate(&prompts::service_profile(&state.service_name))
        .await
    {
        Ok(text) => text,
        Err(err) => {
            runtime.log(
                state,
                LogLevel::Warn,
                "service_input.generation_failed",
                json!({ "error": err.to_string() }),
            );
            return Ok(error_update());
        }
    };

    let profile = if profile.to_lowercase().contains(UNCHARACTERIZABLE_MARKER) {
        match enrich_from_web(runtime, state).await {
            Some(enriched) => enriched,
            None => {
                return Ok(StageUpdate {
                    service_profile: Some(StageText::fallback(LOW_CONFIDENCE_PROFILE)),
                    risk_keywords: Some(owned(&FALLBACK_KEYWORDS)),
                    ..StageUpdate::default()
                })
            }
        }
    } else {
        profile
    };

    let (body, keywords) = split_keyword_section(&profile);
    let keywords = if keywords.is_empty() {
        extract_keywords(runtime, state, &body).await
    } else {
        keywords
    };
    let keywords = if keywords.is_empty() {
        runtime.log(
            state,
            LogLevel::Warn,
            "service_input.keywords_missing",
            json!({}),
        );
        owned(&ERROR_KEYWORDS)
    } else {
        keywords
    };

    Ok(StageUpdate {
        service_profile: Some(StageText::generated(body)),
        risk_keywords: Some(keywords),
        ..StageUpdate::default()
    })
}

/// Looks the service up on the web and regenerates the profile with that
/// material. `None` means the evidence was missing or too thin to use.
async fn enrich_from_web(runtime: &StageRuntime, state: &AssessmentState) -> Option<String> {
    let outcome = match runtime.web_search(&state.service_name).await {
        Ok(outcome) => outcome,
        Err(err) => {
            runtime.log(
                state,
                LogLevel::Warn,
                "service_input.web_failed",
                json!({ "error": err.to_string() }),
            );
            EvidenceOutcome::empty()
        }
    };
    if !outcome.adequacy().is_adequate() {
        return None;
    }
    match runtime
        .generate(&prompts::combined_profile(&state.service_name, &outcome.text))
        .await
    {
        Ok(text) => Some(text),
        Err(err) => {
            runtime.log(
                state,
                LogLevel::Warn,
                "service_input.combined_generation_failed",
                json!({ "error": err.to_string() }),
            );
            None
        }
    }
}

/// Second-chance extraction when the profile carried no keyword section.
async fn extract_keywords(
    runtime: &StageRuntime,
    state: &AssessmentState,
    profile: &str,
) -> Vec<String> {
    match runtime.generate(&prompts::keyword_extraction(profile)).await {
        Ok(text) => parse_keyword_list(&text),
        Err(err) => {
            runtime.log(
                state,
                LogLevel::Warn,
                "service_input.extraction_failed",
                json!({ "error": err.to_string() }),
            );
            Vec::new()
        }
    }
}

fn error_update() -> StageUpdate {
    StageUpdate {
        service_profile: Some(StageText::fallback(ERROR_PROFILE)),
        risk_keywords: Some(owned(&ERROR_KEYWORDS)),
        ..StageUpdate::default()
    }
}

/// Splits the profile body from the trailing keyword section, when present.
fn split_keyword_section(profile: &str) -> (String, Vec<String>) {
    profile.find(prompts::KEYWORD_SECTION_HEADER).map_or_else(
        || (profile.trim().to_string(), Vec::new()),
        |idx| {
            let body = profile[..idx].trim().to_string();
            let section = &profile[idx + prompts::KEYWORD_SECTION_HEADER.len()..];
            (body, parse_keyword_list(section))
        },
    )
}

/// Parses a comma- or newline-separated keyword list, tolerating bullets.
fn parse_keyword_list(raw: &str) -> Vec<String> {
    raw.split(|ch| ch == ',' || ch == '\n')
        .map(|item| {
            item.trim()
                .trim_start_matches(['-', '*', '•'])
                .trim()
                .trim_end_matches('.')
                .to_string()
        })
        .filter(|item| !item.is_empty())
        .collect()
}

fn owned(keywords: &[&str]) -> Vec<String> {
    keywords.iter().map(ToString::to_string).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stages::testkit::{harness, long_text};
    use crate::state::TextOrigin;
    use ethica_evidence::store::Framework;

    fn state() -> AssessmentState {
        AssessmentState::new("Chatbot X", Framework::EuAiAct)
    }

    #[tokio::test]
    async fn inline_keyword_section_is_parsed() {
        let kit = harness();
        kit.generation.push_response(format!(
            "{}\n\n{}\nbias, privacy, transparency",
            long_text("profile"),
            prompts::KEYWORD_SECTION_HEADER
        ));
        let update = run(&kit.runtime, &state()).await.unwrap();
        let profile = update.service_profile.unwrap();
        assert_eq!(profile.origin, TextOrigin::Generated);
        assert!(!profile.content.contains(prompts::KEYWORD_SECTION_HEADER));
        assert_eq!(
            update.risk_keywords.unwrap(),
            vec!["bias", "privacy", "transparency"]
        );
    }

    #[tokio::test]
    async fn missing_section_triggers_extraction_call() {
        let kit = harness();
        kit.generation.push_response(long_text("profile"));
        kit.generation.push_response("- bias\n- accountability");
        let update = run(&kit.runtime, &state()).await.unwrap();
        assert_eq!(update.risk_keywords.unwrap(), vec!["bias", "accountability"]);
        assert_eq!(kit.generation.seen_prompts().len(), 2);
    }

    #[tokio::test]
    async fn generation_failure_yields_error_pair() {
        let kit = harness();
        kit.generation.push_failure("rate limited");
        let update = run(&kit.runtime, &state()).await.unwrap();
        assert_eq!(update.service_profile.unwrap().origin, TextOrigin::Fallback);
        assert_eq!(
            update.risk_keywords.unwrap(),
            vec!["error", "processing_failure"]
        );
    }

    #[tokio::test]
    async fn marker_with_thin_web_evidence_falls_back() {
        let kit = harness();
        kit.generation
            .push_response(format!("The service {UNCHARACTERIZABLE_MARKER}."));
        // Scripted web client replies empty by default.
        let update = run(&kit.runtime, &state()).await.unwrap();
        let profile = update.service_profile.unwrap();
        assert_eq!(profile.origin, TextOrigin::Fallback);
        assert_eq!(profile.content, LOW_CONFIDENCE_PROFILE);
        assert_eq!(
            update.risk_keywords.unwrap(),
            vec!["unknown", "insufficient_data", "analysis_failure"]
        );
    }

    #[tokio::test]
    async fn marker_with_good_web_evidence_regenerates() {
        use ethica_evidence::adequacy::EvidenceOutcome;
        let kit = harness();
        kit.generation
            .push_response(format!("The service {UNCHARACTERIZABLE_MARKER}."));
        kit.web.push(Ok(EvidenceOutcome::found(long_text("news"))));
        kit.generation.push_response(format!(
            "{}\n{}\nfairness, surveillance",
            long_text("grounded profile"),
            prompts::KEYWORD_SECTION_HEADER
        ));
        let update = run(&kit.runtime, &state()).await.unwrap();
        let profile = update.service_profile.unwrap();
        assert_eq!(profile.origin, TextOrigin::Generated);
        assert!(profile.content.contains("grounded profile"));
        assert_eq!(update.risk_keywords.unwrap(), vec!["fairness", "surveillance"]);
        assert_eq!(kit.web.seen_queries(), vec!["Chatbot X"]);
    }
}
