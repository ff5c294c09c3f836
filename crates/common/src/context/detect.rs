//! Context-dependence detection
//!
//! Decides whether a raw query only makes sense given the conversation so
//! far (pronouns, follow-up fragments, very short queries). Only
//! context-dependent queries go through the rewrite step; standalone
//! queries are used verbatim.

/// Trait for context-dependence classification
pub trait ContextDependence: Send + Sync {
    fn is_context_dependent(&self, query: &str, history_len: usize) -> bool;
}

/// Anaphora markers that usually refer back into the conversation
const PRONOUNS: &[&str] = &[
    "它", "他", "她", "这个", "那个", "这些", "那些", "其中", "该", "上述", "刚才", "前面",
];

/// English anaphora, matched as whole words
const EN_PRONOUNS: &[&str] = &["it", "they", "them", "this", "that", "these", "those"];

/// Fragment openers typical of follow-up questions
const FOLLOW_UPS: &[&str] = &[
    "为什么", "怎么", "还有", "继续", "再", "然后", "呢", "举个例子", "详细", "展开",
];

/// Rule-based detector over anaphora and fragment patterns
#[derive(Default)]
pub struct HeuristicDetector;

impl HeuristicDetector {
    pub fn new() -> Self {
        Self
    }
}

impl ContextDependence for HeuristicDetector {
    fn is_context_dependent(&self, query: &str, history_len: usize) -> bool {
        // Nothing to refer back to
        if history_len == 0 {
            return false;
        }

        let query = query.trim();

        if PRONOUNS.iter().any(|p| query.contains(p)) {
            return true;
        }

        let lowered = query.to_lowercase();
        if lowered
            .split(|c: char| !c.is_alphanumeric())
            .any(|word| EN_PRONOUNS.contains(&word))
        {
            return true;
        }

        if FOLLOW_UPS.iter().any(|f| query.contains(f)) {
            return true;
        }

        // Very short queries are almost always fragments
        query.chars().count() <= 6
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standalone_query_not_dependent() {
        let detector = HeuristicDetector::new();
        assert!(!detector.is_context_dependent("介绍一下新质生产力的核心内涵和主要特征", 4));
    }

    #[test]
    fn test_pronoun_is_dependent() {
        let detector = HeuristicDetector::new();
        assert!(detector.is_context_dependent("它现在发展得怎么样？", 2));
    }

    #[test]
    fn test_short_fragment_is_dependent() {
        let detector = HeuristicDetector::new();
        assert!(detector.is_context_dependent("具体呢", 2));
    }

    #[test]
    fn test_english_pronoun_is_dependent() {
        let detector = HeuristicDetector::new();
        assert!(detector.is_context_dependent("How did it develop afterwards in practice", 2));
        assert!(!detector.is_context_dependent("Explain the historical background of reform", 2));
    }

    #[test]
    fn test_empty_history_never_dependent() {
        let detector = HeuristicDetector::new();
        assert!(!detector.is_context_dependent("它是什么？", 0));
    }
}
