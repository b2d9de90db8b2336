use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Regulatory/ethics framework a corpus chunk belongs to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Framework {
    /// EU Artificial Intelligence Act.
    EuAiAct,
    /// UNESCO Recommendation on the Ethics of AI.
    UnescoAiEthics,
    /// OECD AI Principles.
    OecdAiPrinciples,
}

impl Framework {
    /// Human-readable label used in prompts and reports.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::EuAiAct => "EU AI Act",
            Self::UnescoAiEthics => "UNESCO AI Ethics",
            Self::OecdAiPrinciples => "OECD AI Principles",
        }
    }

    /// Stable key used in metadata and file names.
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::EuAiAct => "EU_AI_Act",
            Self::UnescoAiEthics => "UNESCO_AI_Ethics",
            Self::OecdAiPrinciples => "OECD_AI_Principles",
        }
    }
}

/// One chunk of framework text held by the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorpusRecord {
    /// Unique identifier.
    pub id: Uuid,
    /// Owning framework.
    pub framework: Framework,
    /// Source document (file name or URL).
    pub source: String,
    /// Chunk index within the source document.
    pub section: usize,
    /// Chunk text.
    pub body: String,
    /// Ingestion timestamp.
    pub created_at: DateTime<Utc>,
}

impl CorpusRecord {
    /// Creates a new record.
    #[must_use]
    pub fn new(
        framework: Framework,
        source: impl Into<String>,
        section: usize,
        body: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            framework,
            source: source.into(),
            section,
            body: body.into(),
            created_at: Utc::now(),
        }
    }
}

/// Thread-safe in-memory framework knowledge base. Read-only during a run;
/// filled once at startup by the corpus loader.
#[derive(Debug, Default, Clone)]
pub struct FrameworkStore {
    records: Arc<RwLock<Vec<CorpusRecord>>>,
}

impl FrameworkStore {
    /// Inserts a record into the store.
    pub fn insert(&self, record: CorpusRecord) {
        self.records.write().push(record);
    }

    /// Number of stored chunks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    /// True when no chunks are loaded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    /// Returns the best-matching chunks for a query within one framework,
    /// ranked by query-term overlap. Chunks without any overlap are dropped.
    #[must_use]
    pub fn find_relevant(&self, query: &str, framework: Framework, k: usize) -> Vec<CorpusRecord> {
        let terms: Vec<String> = query
            .to_lowercase()
            .split_whitespace()
            .filter(|term| term.chars().count() > 2)
            .map(ToString::to_string)
            .collect();
        if terms.is_empty() {
            return Vec::new();
        }
        let mut scored: Vec<(usize, CorpusRecord)> = self
            .records
            .read()
            .iter()
            .filter(|record| record.framework == framework)
            .filter_map(|record| {
                let body = record.body.to_lowercase();
                let score = terms.iter().filter(|term| body.contains(*term)).count();
                (score > 0).then(|| (score, record.clone()))
            })
            .collect();
        scored.sort_by(|a, b| b.0.cmp(&a.0));
        scored.truncate(k);
        scored.into_iter().map(|(_, record)| record).collect()
    }
}
