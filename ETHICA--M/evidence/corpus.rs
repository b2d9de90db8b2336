use std::path::Path;

use anyhow::{Context, Result};

use crate::store::{CorpusRecord, Framework, FrameworkStore};

const DEFAULT_CHUNK_CHARS: usize = 500;
const DEFAULT_OVERLAP_CHARS: usize = 50;

/// Splits framework documents into overlapping chunks and fills the store.
/// Runs once at startup, before any assessment begins.
#[derive(Debug, Clone)]
pub struct CorpusLoader {
    chunk_chars: usize,
    overlap_chars: usize,
}

impl Default for CorpusLoader {
    fn default() -> Self {
        Self {
            chunk_chars: DEFAULT_CHUNK_CHARS,
            overlap_chars: DEFAULT_OVERLAP_CHARS,
        }
    }
}

impl CorpusLoader {
    /// Creates a loader with custom chunking parameters.
    #[must_use]
    pub const fn new(chunk_chars: usize, overlap_chars: usize) -> Self {
        Self {
            chunk_chars,
            overlap_chars,
        }
    }

    /// Loads every recognized framework document (`.txt`/`.md`) under the
    /// directory into the store. Files whose names do not identify a
    /// framework are skipped. Returns the number of chunks ingested.
    pub fn load_directory(&self, store: &FrameworkStore, directory: impl AsRef<Path>) -> Result<usize> {
        let directory = directory.as_ref();
        let mut ingested = 0;
        let entries = std::fs::read_dir(directory)
            .with_context(|| format!("reading corpus directory {}", directory.display()))?;
        for entry in entries {
            let path = entry?.path();
            let is_text = path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| matches!(ext, "txt" | "md"));
            if !is_text {
                continue;
            }
            let Some(framework) = framework_for_file(&path) else {
                continue;
            };
            let body = std::fs::read_to_string(&path)
                .with_context(|| format!("reading corpus file {}", path.display()))?;
            ingested += self.ingest_document(store, framework, &path, &body);
        }
        Ok(ingested)
    }

    /// Chunks one document body into the store. Returns the chunk count.
    pub fn ingest_document(
        &self,
        store: &FrameworkStore,
        framework: Framework,
        path: &Path,
        body: &str,
    ) -> usize {
        let source = path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("corpus")
            .to_string();
        let chunks = chunk_text(body, self.chunk_chars, self.overlap_chars);
        let count = chunks.len();
        for (section, chunk) in chunks.into_iter().enumerate() {
            store.insert(CorpusRecord::new(framework, source.clone(), section, chunk));
        }
        count
    }
}

/// Maps a corpus file name onto its framework by stable key prefix.
fn framework_for_file(path: &Path) -> Option<Framework> {
    let stem = path.file_stem()?.to_str()?.to_lowercase();
    [
        Framework::EuAiAct,
        Framework::UnescoAiEthics,
        Framework::OecdAiPrinciples,
    ]
    .into_iter()
    .find(|framework| stem.starts_with(&framework.key().to_lowercase()))
}

fn chunk_text(body: &str, chunk_chars: usize, overlap_chars: usize) -> Vec<String> {
    let chars: Vec<char> = body.chars().collect();
    if chars.is_empty() || chunk_chars == 0 {
        return Vec::new();
    }
    let stride = chunk_chars.saturating_sub(overlap_chars).max(1);
    let mut chunks = Vec::new();
    let mut start = 0;
    while start < chars.len() {
        let end = (start + chunk_chars).min(chars.len());
        let chunk: String = chars[start..end].iter().collect();
        let trimmed = chunk.trim();
        if !trimmed.is_empty() {
            chunks.push(trimmed.to_string());
        }
        if end == chars.len() {
            break;
        }
        start += stride;
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn chunks_overlap() {
        let chunks = chunk_text(&"abcdefghij".repeat(20), 100, 20);
        assert!(chunks.len() > 1);
        let first_tail: String = chunks[0].chars().skip(80).collect();
        let second_head: String = chunks[1].chars().take(20).collect();
        assert_eq!(first_tail, second_head);
    }

    #[test]
    fn loads_recognized_files_only() {
        let dir = tempdir().unwrap();
        std::fs::write(
            dir.path().join("eu_ai_act.txt"),
            "Article 6: classification rules for high-risk AI systems.",
        )
        .unwrap();
        std::fs::write(dir.path().join("notes.txt"), "scratch pad").unwrap();
        std::fs::write(dir.path().join("image.bin"), [0_u8, 1]).unwrap();

        let store = FrameworkStore::default();
        let loader = CorpusLoader::default();
        let ingested = loader.load_directory(&store, dir.path()).unwrap();
        assert_eq!(ingested, 1);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn missing_directory_is_an_error() {
        let store = FrameworkStore::default();
        let loader = CorpusLoader::default();
        assert!(loader
            .load_directory(&store, "/nonexistent/corpus")
            .is_err());
    }
}
