//! Prompt builders for every generation call the stages make. Each builder
//! returns the full prompt text; stages own retry and fallback behavior.

/// Section header the profile prompt asks the model to emit its keyword
/// list under. Stage 1 parses this section before falling back to a
/// dedicated extraction call.
pub const KEYWORD_SECTION_HEADER: &str = "### Ethical Risk Keywords";

/// Top-level heading every acceptable report draft must start with.
pub const REPORT_HEADING: &str = "# AI Ethics Risk Assessment Report";

/// Asks for a service profile from the name alone.
#[must_use]
pub fn service_profile(service_name: &str) -> String {
    format!(
        "You are an AI service analyst. Describe the AI service \"{service_name}\": its \
         purpose, the user groups it serves, the data it processes, and the decisions \
         it automates or influences. Write 2-4 paragraphs of plain prose. If the name \
         alone is not enough to describe the service, state plainly that the service \
         cannot be characterized from the given information.\n\n\
         Finish with a section titled \"{KEYWORD_SECTION_HEADER}\" listing 10 to 15 \
         comma-separated ethical risk keywords relevant to this service."
    )
}

/// Asks for a profile again, this time grounded in web evidence.
#[must_use]
pub fn combined_profile(service_name: &str, web_evidence: &str) -> String {
    format!(
        "You are an AI service analyst. Using the background material below, describe \
         the AI service \"{service_name}\": purpose, user groups, data processed, and \
         decisions automated or influenced. Write 2-4 paragraphs of plain prose.\n\n\
         Background material:\n{web_evidence}\n\n\
         Finish with a section titled \"{KEYWORD_SECTION_HEADER}\" listing 10 to 15 \
         comma-separated ethical risk keywords relevant to this service."
    )
}

/// Dedicated keyword extraction when the profile carried no keyword section.
#[must_use]
pub fn keyword_extraction(profile: &str) -> String {
    format!(
        "Extract 10 to 15 ethical risk keywords from the service profile below. \
         Reply with the keywords only, comma-separated, no commentary.\n\n\
         Profile:\n{profile}"
    )
}

/// Condenses stage-1 keywords into one corpus search query.
#[must_use]
pub fn query_condense(keywords: &[String], service_name: &str, framework_label: &str) -> String {
    format!(
        "Condense the risk keywords below into a single short search query (under 15 \
         words) for finding applicable articles of the {framework_label} for the \
         service \"{service_name}\". Reply with the query only.\n\n\
         Keywords: {}",
        keywords.join(", ")
    )
}

/// Builds a corpus query from the profile when no keywords are usable.
#[must_use]
pub fn query_from_profile(profile: &str, service_name: &str, framework_label: &str) -> String {
    format!(
        "Write a single short search query (under 15 words) for finding applicable \
         articles of the {framework_label} for the service \"{service_name}\", based \
         on the profile below. Reply with the query only.\n\n\
         Profile:\n{profile}"
    )
}

/// Rewrites a failed query for the retry pass.
#[must_use]
pub fn query_rewrite(
    last_query: &str,
    service_name: &str,
    framework_label: &str,
    keywords: &[String],
) -> String {
    format!(
        "The search query \"{last_query}\" returned no usable {framework_label} \
         material for the service \"{service_name}\". Rewrite it as a different short \
         query (under 15 words) using broader or alternative terms. Reply with the \
         query only.\n\n\
         Risk keywords for context: {}",
        keywords.join(", ")
    )
}

/// Builds a web search query for the secondary evidence tier.
#[must_use]
pub fn web_query(service_name: &str, framework_label: &str, keywords: &[String]) -> String {
    format!(
        "Write one web search query (under 12 words) to find {framework_label} \
         guidance relevant to the service \"{service_name}\" and these risks: {}. \
         Reply with the query only.",
        keywords.join(", ")
    )
}

/// Synthesizes retrieved evidence into an applicable-criteria brief.
#[must_use]
pub fn brief_synthesis(service_name: &str, framework_label: &str, evidence: &str) -> String {
    format!(
        "You are a regulatory analyst. From the {framework_label} material below, \
         write a brief of the criteria applicable to the service \"{service_name}\". \
         Cite the specific articles or principles you rely on, and omit material that \
         does not apply.\n\n\
         Material:\n{evidence}"
    )
}

/// Produces the stage-3 risk assessment draft.
#[must_use]
pub fn evaluation(
    service_name: &str,
    framework_label: &str,
    profile: &str,
    keywords: &[String],
    brief: &str,
) -> String {
    format!(
        "You are an AI ethics assessor evaluating the service \"{service_name}\" \
         against the {framework_label}.\n\n\
         Service profile:\n{profile}\n\n\
         Risk keywords: {}\n\n\
         Applicable criteria:\n{brief}\n\n\
         Assess each material risk: describe it, rate its severity (low, medium, \
         high), tie it to the applicable criteria, and recommend mitigations. Write \
         structured prose with one section per risk.",
        keywords.join(", ")
    )
}

/// Verification pass over the stage-3 draft.
#[must_use]
pub fn verification(draft: &str, keywords: &[String]) -> String {
    format!(
        "Review the risk assessment below for completeness and internal consistency. \
         Confirm every one of these keywords is addressed: {}. Fix any gap, \
         contradiction, or unsupported rating, and reply with the full corrected \
         assessment.\n\n\
         Assessment:\n{draft}",
        keywords.join(", ")
    )
}

/// Produces the final report draft.
#[must_use]
pub fn report(
    service_name: &str,
    framework_label: &str,
    profile: &str,
    keywords: &[String],
    brief: &str,
    assessment: &str,
    generated_at: &str,
) -> String {
    format!(
        "Write a markdown report for the ethics assessment of \"{service_name}\" \
         under the {framework_label}, generated {generated_at}. The document must \
         start with the exact heading \"{REPORT_HEADING}\" and contain sections for \
         the service overview, the applicable criteria, the risk assessment, and \
         recommendations.\n\n\
         Service profile:\n{profile}\n\n\
         Risk keywords: {}\n\n\
         Applicable criteria:\n{brief}\n\n\
         Risk assessment:\n{assessment}",
        keywords.join(", ")
    )
}

/// Retry prompt when a report draft misses the mandatory heading.
#[must_use]
pub fn report_retry(draft: &str) -> String {
    format!(
        "The report below does not start with the mandatory heading \
         \"{REPORT_HEADING}\". Reply with the same report corrected to start with \
         that exact heading, changing nothing else.\n\n\
         Report:\n{draft}"
    )
}

/// Review pass over an accepted report draft.
#[must_use]
pub fn report_review(draft: &str, keywords: &[String]) -> String {
    format!(
        "Review the report below for clarity and completeness. Keep the heading \
         \"{REPORT_HEADING}\" unchanged, make sure these keywords are covered: {}, \
         and reply with the full improved report.\n\n\
         Report:\n{draft}",
        keywords.join(", ")
    )
}
