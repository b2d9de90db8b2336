use std::fmt::Write as _;

use thiserror::Error;

use crate::{
    adequacy::EvidenceOutcome,
    store::{Framework, FrameworkStore},
};

/// Errors emitted by evidence sources.
#[derive(Debug, Error)]
pub enum SearchError {
    /// Provider-side failure (network, malformed response).
    #[error("provider error: {0}")]
    Provider(String),
    /// Local store is not loaded.
    #[error("framework corpus is empty; run the corpus loader first")]
    EmptyCorpus,
}

const DEFAULT_TOP_K: usize = 5;

/// Tier-1 evidence source: retrieval over the loaded framework corpus.
#[derive(Debug, Clone)]
pub struct FrameworkRetriever {
    store: FrameworkStore,
    top_k: usize,
}

impl FrameworkRetriever {
    /// Creates a retriever over the given store.
    #[must_use]
    pub const fn new(store: FrameworkStore) -> Self {
        Self {
            store,
            top_k: DEFAULT_TOP_K,
        }
    }

    /// Overrides how many chunks one query may return.
    #[must_use]
    pub const fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    /// Searches the corpus for the query within one framework. An empty hit
    /// list yields a non-relevant outcome, not an error.
    pub fn search(&self, query: &str, framework: Framework) -> Result<EvidenceOutcome, SearchError> {
        if self.store.is_empty() {
            return Err(SearchError::EmptyCorpus);
        }
        let hits = self.store.find_relevant(query, framework, self.top_k);
        if hits.is_empty() {
            return Ok(EvidenceOutcome::empty());
        }
        let mut text = String::new();
        for (idx, record) in hits.iter().enumerate() {
            let _ = writeln!(
                text,
                "### Result {} ({} - section {})\n{}\n",
                idx + 1,
                record.source,
                record.section,
                record.body
            );
        }
        Ok(EvidenceOutcome::found(text.trim_end()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::CorpusRecord;

    fn retriever_with_chunk(body: &str) -> FrameworkRetriever {
        let store = FrameworkStore::default();
        store.insert(CorpusRecord::new(
            Framework::EuAiAct,
            "eu_ai_act.txt",
            0,
            body,
        ));
        FrameworkRetriever::new(store)
    }

    #[test]
    fn empty_corpus_is_an_error() {
        let retriever = FrameworkRetriever::new(FrameworkStore::default());
        assert!(matches!(
            retriever.search("oversight", Framework::EuAiAct),
            Err(SearchError::EmptyCorpus)
        ));
    }

    #[test]
    fn miss_yields_non_relevant_outcome() {
        let retriever = retriever_with_chunk("Transparency obligations for providers.");
        let outcome = retriever
            .search("quantum entanglement", Framework::EuAiAct)
            .unwrap();
        assert!(!outcome.relevant);
        assert!(outcome.text.is_empty());
    }

    #[test]
    fn hit_formats_sections() {
        let retriever =
            retriever_with_chunk("High-risk systems require conformity assessment procedures.");
        let outcome = retriever
            .search("conformity assessment", Framework::EuAiAct)
            .unwrap();
        assert!(outcome.relevant);
        assert!(outcome.text.contains("### Result 1"));
        assert!(outcome.text.contains("eu_ai_act.txt"));
    }
}
