use std::collections::VecDeque;
use std::fmt::Write as _;

use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::Client;
use serde::Deserialize;

use crate::{adequacy::EvidenceOutcome, retriever::SearchError};

const SERPER_ENDPOINT: &str = "https://google.serper.dev/search";

/// Tier-2 evidence source: general web search without a framework filter.
#[async_trait]
pub trait WebSearchClient: Send + Sync {
    /// Executes the search returning an adequacy-scorable text blob.
    async fn search(&self, query: &str) -> Result<EvidenceOutcome, SearchError>;
}

/// Offline client for local runs and demos. Synthesizes a deterministic
/// summary long enough to pass adequacy checks.
#[derive(Debug, Default)]
pub struct LoopbackWebClient;

#[async_trait]
impl WebSearchClient for LoopbackWebClient {
    async fn search(&self, query: &str) -> Result<EvidenceOutcome, SearchError> {
        Ok(EvidenceOutcome::found(format!(
            "[offline web result] Query: {query}. Aggregated public coverage \
             describing the service, its capabilities, deployment context, \
             and the regulatory discussion surrounding comparable systems."
        )))
    }
}

/// Test client replaying scripted outcomes in order.
#[derive(Debug, Default)]
pub struct ScriptedWebClient {
    outcomes: Mutex<VecDeque<Result<EvidenceOutcome, SearchError>>>,
    queries: Mutex<Vec<String>>,
}

impl ScriptedWebClient {
    /// Queues an outcome as the next reply.
    pub fn push(&self, outcome: Result<EvidenceOutcome, SearchError>) {
        self.outcomes.lock().push_back(outcome);
    }

    /// Queries observed so far, in call order.
    #[must_use]
    pub fn seen_queries(&self) -> Vec<String> {
        self.queries.lock().clone()
    }
}

#[async_trait]
impl WebSearchClient for ScriptedWebClient {
    async fn search(&self, query: &str) -> Result<EvidenceOutcome, SearchError> {
        self.queries.lock().push(query.to_string());
        self.outcomes
            .lock()
            .pop_front()
            .unwrap_or_else(|| Ok(EvidenceOutcome::empty()))
    }
}

/// Serper-backed web search client.
#[derive(Debug, Clone)]
pub struct SerperWebClient {
    client: Client,
    api_key: String,
    endpoint: String,
}

#[derive(Debug, Deserialize)]
struct SerperResponse {
    #[serde(default)]
    organic: Vec<SerperHit>,
}

#[derive(Debug, Deserialize)]
struct SerperHit {
    #[serde(default)]
    title: String,
    #[serde(default)]
    snippet: String,
    #[serde(default)]
    link: String,
}

impl SerperWebClient {
    /// Creates a client with the given API key.
    #[must_use]
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            endpoint: SERPER_ENDPOINT.into(),
        }
    }

    /// Builds a client from the `SERPER_API_KEY` environment variable.
    pub fn from_env() -> Result<Self, SearchError> {
        let api_key = std::env::var("SERPER_API_KEY")
            .map_err(|_| SearchError::Provider("SERPER_API_KEY is not set".into()))?;
        Ok(Self::new(api_key))
    }

    /// Overrides the search endpoint.
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

#[async_trait]
impl WebSearchClient for SerperWebClient {
    async fn search(&self, query: &str) -> Result<EvidenceOutcome, SearchError> {
        let response = self
            .client
            .post(&self.endpoint)
            .header("X-API-KEY", &self.api_key)
            .json(&serde_json::json!({ "q": query }))
            .send()
            .await
            .map_err(|err| SearchError::Provider(err.to_string()))?;
        if !response.status().is_success() {
            return Err(SearchError::Provider(format!(
                "unexpected status {}",
                response.status()
            )));
        }
        let body: SerperResponse = response
            .json()
            .await
            .map_err(|err| SearchError::Provider(err.to_string()))?;
        if body.organic.is_empty() {
            return Ok(EvidenceOutcome::empty());
        }
        let mut text = String::new();
        for hit in &body.organic {
            let _ = writeln!(text, "{}\n{}\nSource: {}\n", hit.title, hit.snippet, hit.link);
        }
        Ok(EvidenceOutcome::found(text.trim_end()))
    }
}
