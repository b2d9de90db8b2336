//! Stage 2: resolve applicable criteria through tiered evidence search.
//!
//! Tier 1 is the loaded framework corpus, widened by per-keyword lookups
//! and alternate query templates before giving up. Tier 2 is web search.
//! When both tiers come up short the stage requests a retry by bumping the
//! attempt counter without setting the brief; once the retry budget is
//! spent it emits a fixed insufficient-evidence brief so the pipeline
//! always moves forward.

use ethica_evidence::adequacy::EvidenceOutcome;
use serde_json::json;
use shared_logging::LogLevel;

use crate::{
    error::PipelineError,
    prompts,
    state::{AssessmentState, StageText, StageUpdate},
};

use super::StageRuntime;

/// Retry budget for the query-refinement loop. Attempts beyond this bound
/// terminate with the insufficient-evidence brief.
pub const MAX_QUERY_ATTEMPTS: u8 = 2;

/// Brief emitted when every evidence tier failed across all attempts.
pub const INSUFFICIENT_EVIDENCE_BRIEF: &str =
    "No sufficient framework material could be retrieved for this service. \
     The assessment proceeds against general provisions only and should be \
     revisited once the framework corpus covers the relevant topics.";

/// Minimum characters for a single per-keyword lookup to contribute.
pub const KEYWORD_RESULT_MIN_CHARS: usize = 50;

const KEYWORD_LOOKUP_LIMIT: usize = 5;
const CONDENSE_KEYWORD_LIMIT: usize = 10;

pub(crate) async fn run(
    runtime: &StageRuntime,
    state: &AssessmentState,
) -> Result<StageUpdate, PipelineError> {
    let mut query = build_query(runtime, state).await;

    let mut evidence = corpus_search(runtime, state, &query);
    if !evidence.adequacy().is_adequate() {
        evidence = widen_corpus_search(runtime, state, &mut query, evidence);
    }

    if evidence.adequacy().is_adequate() {
        let brief = synthesize(runtime, state, &evidence).await;
        return Ok(resolved(brief, query));
    }

    let web_evidence = web_search(runtime, state).await;
    if web_evidence.adequacy().is_adequate() {
        let brief = synthesize(runtime, state, &web_evidence).await;
        return Ok(resolved(brief, query));
    }

    if state.query_attempt < MAX_QUERY_ATTEMPTS {
        runtime.log(
            state,
            LogLevel::Warn,
            "criteria_search.retry",
            json!({ "attempt": state.query_attempt + 1, "query": query }),
        );
        return Ok(StageUpdate {
            query_attempt: Some(state.query_attempt + 1),
            last_query: Some(query),
            ..StageUpdate::default()
        });
    }

    runtime.log(
        state,
        LogLevel::Warn,
        "criteria_search.exhausted",
        json!({ "attempts": state.query_attempt }),
    );
    Ok(StageUpdate {
        criteria_brief: Some(StageText::fallback(INSUFFICIENT_EVIDENCE_BRIEF)),
        last_query: Some(query),
        ..StageUpdate::default()
    })
}

/// Builds the search query for this attempt. First attempts condense the
/// stage-1 keywords; retries rewrite the previous query. Every path has a
/// deterministic fallback so a generation failure never blocks the search.
async fn build_query(runtime: &StageRuntime, state: &AssessmentState) -> String {
    let keywords = state.risk_keywords.clone().unwrap_or_default();
    let framework = state.framework.label();

    let prompt = if state.query_attempt == 0 {
        if keywords.is_empty() {
            let profile = state
                .service_profile
                .as_ref()
                .map_or("", |text| text.content.as_str());
            prompts::query_from_profile(profile, &state.service_name, framework)
        } else {
            let head = &keywords[..keywords.len().min(CONDENSE_KEYWORD_LIMIT)];
            prompts::query_condense(head, &state.service_name, framework)
        }
    } else {
        let last = state.last_query.clone().unwrap_or_default();
        prompts::query_rewrite(&last, &state.service_name, framework, &keywords)
    };

    match runtime.generate(&prompt).await {
        Ok(text) => {
            let query = first_line(&text);
            if query.is_empty() {
                manual_query(state, &keywords)
            } else {
                query
            }
        }
        Err(err) => {
            runtime.log(
                state,
                LogLevel::Warn,
                "criteria_search.query_generation_failed",
                json!({ "error": err.to_string() }),
            );
            manual_query(state, &keywords)
        }
    }
}

fn manual_query(state: &AssessmentState, keywords: &[String]) -> String {
    let head = keywords
        .iter()
        .take(KEYWORD_LOOKUP_LIMIT)
        .cloned()
        .collect::<Vec<_>>()
        .join(" ");
    if head.is_empty() {
        format!("{} {}", state.service_name, state.framework.label())
    } else {
        format!("{head} {}", state.framework.label())
    }
}

/// Corpus search with errors degraded to an empty outcome. An unloaded
/// corpus routes straight to the web tier instead of failing the run.
fn corpus_search(runtime: &StageRuntime, state: &AssessmentState, query: &str) -> EvidenceOutcome {
    match runtime.retriever().search(query, state.framework) {
        Ok(outcome) => outcome,
        Err(err) => {
            runtime.log(
                state,
                LogLevel::Warn,
                "criteria_search.corpus_failed",
                json!({ "error": err.to_string() }),
            );
            EvidenceOutcome::empty()
        }
    }
}

/// Widens an inadequate tier-1 result: per-keyword lookups first, then a
/// handful of alternate query templates. The first adequate alternate also
/// becomes the recorded query.
fn widen_corpus_search(
    runtime: &StageRuntime,
    state: &AssessmentState,
    query: &mut String,
    initial: EvidenceOutcome,
) -> EvidenceOutcome {
    let keywords = state.risk_keywords.clone().unwrap_or_default();

    let mut pieces: Vec<String> = Vec::new();
    if initial.relevant && !initial.text.is_empty() {
        pieces.push(initial.text);
    }
    for keyword in keywords.iter().take(KEYWORD_LOOKUP_LIMIT) {
        let outcome = corpus_search(runtime, state, keyword);
        if outcome.adequacy().meets(KEYWORD_RESULT_MIN_CHARS) {
            pieces.push(outcome.text);
        }
    }
    if !pieces.is_empty() {
        let combined = EvidenceOutcome::found(pieces.join("\n\n"));
        if combined.adequacy().is_adequate() {
            return combined;
        }
        pieces.clear();
    }

    for alternate in alternate_queries(state, &keywords) {
        let outcome = corpus_search(runtime, state, &alternate);
        if outcome.adequacy().is_adequate() {
            *query = alternate;
            return outcome;
        }
    }
    EvidenceOutcome::empty()
}

fn alternate_queries(state: &AssessmentState, keywords: &[String]) -> Vec<String> {
    let framework = state.framework.label();
    let service = &state.service_name;
    let first = keywords.first().map_or("risk", String::as_str);
    let second = keywords.get(1).map_or("compliance", String::as_str);
    vec![
        format!("{framework} requirements for {service}"),
        format!("{framework} obligations {first} {second}"),
        format!("{framework} provisions on {first}"),
        format!("{service} compliance {framework}"),
    ]
}

/// Tier-2 web search. The query itself is generated, with a manual
/// fallback; any provider error degrades to an empty outcome.
async fn web_search(runtime: &StageRuntime, state: &AssessmentState) -> EvidenceOutcome {
    let keywords = state.risk_keywords.clone().unwrap_or_default();
    let query = match runtime
        .generate(&prompts::web_query(
            &state.service_name,
            state.framework.label(),
            &keywords,
        ))
        .await
    {
        Ok(text) => {
            let line = first_line(&text);
            if line.is_empty() {
                manual_query(state, &keywords)
            } else {
                line
            }
        }
        Err(_) => manual_query(state, &keywords),
    };
    match runtime.web_search(&query).await {
        Ok(outcome) => outcome,
        Err(err) => {
            runtime.log(
                state,
                LogLevel::Warn,
                "criteria_search.web_failed",
                json!({ "error": err.to_string() }),
            );
            EvidenceOutcome::empty()
        }
    }
}

/// Synthesizes the brief from adequate evidence. A generation failure
/// degrades to carrying the raw evidence as the brief.
async fn synthesize(
    runtime: &StageRuntime,
    state: &AssessmentState,
    evidence: &EvidenceOutcome,
) -> StageText {
    match runtime
        .generate(&prompts::brief_synthesis(
            &state.service_name,
            state.framework.label(),
            &evidence.text,
        ))
        .await
    {
        Ok(text) => StageText::generated(text),
        Err(err) => {
            runtime.log(
                state,
                LogLevel::Warn,
                "criteria_search.synthesis_failed",
                json!({ "error": err.to_string() }),
            );
            StageText::retrieved(evidence.text.clone())
        }
    }
}

fn resolved(brief: StageText, query: String) -> StageUpdate {
    StageUpdate {
        criteria_brief: Some(brief),
        query_attempt: Some(0),
        last_query: Some(query),
        ..StageUpdate::default()
    }
}

fn first_line(text: &str) -> String {
    text.lines()
        .next()
        .unwrap_or("")
        .trim()
        .trim_matches('"')
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stages::testkit::{harness, harness_with_store, long_text};
    use crate::state::TextOrigin;
    use ethica_evidence::store::{Framework, FrameworkStore};

    fn primed_state() -> AssessmentState {
        let mut state = AssessmentState::new("Chatbot X", Framework::EuAiAct);
        state
            .merge(StageUpdate {
                service_profile: Some(StageText::generated(long_text("profile"))),
                risk_keywords: Some(vec!["oversight".into(), "transparency".into()]),
                ..StageUpdate::default()
            })
            .unwrap();
        state
    }

    #[tokio::test]
    async fn adequate_corpus_hit_resolves_on_first_attempt() {
        let kit = harness();
        kit.generation.push_response("risk management human oversight");
        kit.generation.push_response(long_text("criteria brief"));
        let update = run(&kit.runtime, &primed_state()).await.unwrap();
        let brief = update.criteria_brief.unwrap();
        assert_eq!(brief.origin, TextOrigin::Generated);
        assert_eq!(update.query_attempt, Some(0));
        assert_eq!(update.last_query.unwrap(), "risk management human oversight");
    }

    #[tokio::test]
    async fn synthesis_failure_carries_raw_evidence() {
        let kit = harness();
        kit.generation.push_response("risk management human oversight");
        kit.generation.push_failure("rate limited");
        let update = run(&kit.runtime, &primed_state()).await.unwrap();
        let brief = update.criteria_brief.unwrap();
        assert_eq!(brief.origin, TextOrigin::Retrieved);
        assert!(brief.content.contains("### Result 1"));
    }

    #[tokio::test]
    async fn empty_corpus_falls_through_to_web() {
        use ethica_evidence::adequacy::EvidenceOutcome;
        let kit = harness_with_store(FrameworkStore::default());
        kit.generation.push_response("oversight query");
        kit.generation.push_response("chatbot eu ai act guidance");
        kit.web.push(Ok(EvidenceOutcome::found(long_text("web evidence"))));
        kit.generation.push_response(long_text("brief from web"));
        let update = run(&kit.runtime, &primed_state()).await.unwrap();
        assert!(update.criteria_brief.unwrap().content.contains("brief from web"));
        assert_eq!(kit.web.seen_queries(), vec!["chatbot eu ai act guidance"]);
    }

    #[tokio::test]
    async fn exhausted_tiers_request_retry_below_budget() {
        let kit = harness_with_store(FrameworkStore::default());
        kit.generation.push_response("oversight query");
        kit.generation.push_response("web query");
        // Web client replies empty by default.
        let update = run(&kit.runtime, &primed_state()).await.unwrap();
        assert!(update.criteria_brief.is_none());
        assert_eq!(update.query_attempt, Some(1));
        assert_eq!(update.last_query.unwrap(), "oversight query");
    }

    #[tokio::test]
    async fn spent_budget_emits_insufficient_evidence_brief() {
        let kit = harness_with_store(FrameworkStore::default());
        let mut state = primed_state();
        state
            .merge(StageUpdate {
                query_attempt: Some(MAX_QUERY_ATTEMPTS),
                last_query: Some("previous query".into()),
                ..StageUpdate::default()
            })
            .unwrap();
        kit.generation.push_response("rewritten query");
        kit.generation.push_response("web query");
        let update = run(&kit.runtime, &state).await.unwrap();
        let brief = update.criteria_brief.unwrap();
        assert_eq!(brief.origin, TextOrigin::Fallback);
        assert_eq!(brief.content, INSUFFICIENT_EVIDENCE_BRIEF);
        assert!(update.query_attempt.is_none());
    }

    #[tokio::test]
    async fn retry_attempt_rewrites_previous_query() {
        let kit = harness_with_store(FrameworkStore::default());
        let mut state = primed_state();
        state
            .merge(StageUpdate {
                query_attempt: Some(1),
                last_query: Some("first query".into()),
                ..StageUpdate::default()
            })
            .unwrap();
        kit.generation.push_response("broader second query");
        kit.generation.push_response("web query");
        let update = run(&kit.runtime, &state).await.unwrap();
        assert_eq!(update.query_attempt, Some(2));
        let rewrite_prompt = &kit.generation.seen_prompts()[0];
        assert!(rewrite_prompt.contains("first query"));
    }

    #[tokio::test]
    async fn query_generation_failure_uses_manual_query() {
        let kit = harness();
        kit.generation.push_failure("down");
        kit.generation.push_response(long_text("criteria brief"));
        let update = run(&kit.runtime, &primed_state()).await.unwrap();
        // Manual query joins keywords with the framework label; the seeded
        // chunk matches "oversight" and "transparency".
        assert!(update.criteria_brief.is_some());
        assert_eq!(
            update.last_query.unwrap(),
            "oversight transparency EU AI Act"
        );
    }
}
