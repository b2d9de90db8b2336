use serde::{Deserialize, Serialize};

/// Minimum character count for a retrieved blob to count as adequate.
pub const MIN_ADEQUATE_CHARS: usize = 100;

/// Typed adequacy judgement for a retrieved text blob. Replaces substring
/// sniffing on "not found" phrases with an explicit relevance flag.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Adequacy {
    /// Character count of the retrieved text.
    pub chars: usize,
    /// Whether the source considered the result relevant at all.
    pub relevant: bool,
}

impl Adequacy {
    /// True when the result is relevant and long enough at the default
    /// threshold.
    #[must_use]
    pub const fn is_adequate(self) -> bool {
        self.meets(MIN_ADEQUATE_CHARS)
    }

    /// True when the result is relevant and at least `min_chars` long.
    #[must_use]
    pub const fn meets(self, min_chars: usize) -> bool {
        self.relevant && self.chars >= min_chars
    }
}

/// Retrieval result carried between evidence tiers and the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvidenceOutcome {
    /// Concatenated evidence text (empty when nothing was found).
    pub text: String,
    /// Source-level relevance: false means "no relevant result".
    pub relevant: bool,
}

impl EvidenceOutcome {
    /// Wraps found evidence text.
    #[must_use]
    pub fn found(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            relevant: true,
        }
    }

    /// Marks an empty "nothing relevant" outcome.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            text: String::new(),
            relevant: false,
        }
    }

    /// Adequacy judgement for this outcome.
    #[must_use]
    pub fn adequacy(&self) -> Adequacy {
        Adequacy {
            chars: self.text.chars().count(),
            relevant: self.relevant,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_relevant_text_is_inadequate() {
        let outcome = EvidenceOutcome::found("short");
        assert!(!outcome.adequacy().is_adequate());
        assert!(outcome.adequacy().meets(3));
    }

    #[test]
    fn empty_outcome_never_adequate() {
        let outcome = EvidenceOutcome::empty();
        assert!(!outcome.adequacy().meets(0));
    }

    #[test]
    fn long_relevant_text_is_adequate() {
        let outcome = EvidenceOutcome::found("x".repeat(MIN_ADEQUATE_CHARS));
        assert!(outcome.adequacy().is_adequate());
    }
}
