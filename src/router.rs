//! Query router: intent classification and retrieval strategy
//!
//! Decides, without calling a model, whether a query should touch the
//! document indices, the memory stores, both, or neither. This gate sits
//! on the latency-critical path of every turn, so classification is a
//! pure keyword/phrase count over the lowercased query.

use serde::{Deserialize, Serialize};

use crate::constants::{
    ROUTER_CONFIDENCE_CAP, ROUTER_FALLBACK_CONFIDENCE, ROUTER_STRONG_BONUS, ROUTER_WEAK_BONUS,
    STRATEGY_HYBRID_MAX_RESULTS, STRATEGY_PERSONAL_MAX_RESULTS,
};

/// Closed set of query intents.
///
/// Declaration order is the tie-break order when two intents match with
/// equal counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryIntent {
    /// Query about the user's own corpus (mail, notes, calendar…).
    Personal,
    /// Query about the user's stated preferences and habits.
    Memory,
    /// General-knowledge question; the private corpus will not help.
    General,
    /// Compositional request that benefits from documents and memory.
    Hybrid,
}

/// Retrieval depth derived from the intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetrievalDepth {
    /// No document retrieval at all.
    None,
    /// Hybrid retrieval without graph expansion.
    Light,
    /// Hybrid retrieval plus knowledge-graph expansion.
    Full,
}

/// The strategy contract the rest of the pipeline depends on.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetrievalStrategy {
    pub intent: QueryIntent,
    pub confidence: f32,
    pub use_rag: bool,
    pub use_memory: bool,
    pub depth: RetrievalDepth,
    pub max_results: usize,
}

impl RetrievalStrategy {
    /// Strategy table keyed by intent. Callers may override
    /// `max_results` downward; `use_rag == false` implies
    /// `max_results == 0` and `depth == None`.
    pub fn for_intent(intent: QueryIntent, confidence: f32) -> Self {
        match intent {
            QueryIntent::Personal => Self {
                intent,
                confidence,
                use_rag: true,
                use_memory: true,
                depth: RetrievalDepth::Full,
                max_results: STRATEGY_PERSONAL_MAX_RESULTS,
            },
            QueryIntent::Memory => Self {
                intent,
                confidence,
                use_rag: false,
                use_memory: true,
                depth: RetrievalDepth::None,
                max_results: 0,
            },
            QueryIntent::General => Self {
                intent,
                confidence,
                use_rag: false,
                use_memory: false,
                depth: RetrievalDepth::None,
                max_results: 0,
            },
            QueryIntent::Hybrid => Self {
                intent,
                confidence,
                use_rag: true,
                use_memory: true,
                depth: RetrievalDepth::Light,
                max_results: STRATEGY_HYBRID_MAX_RESULTS,
            },
        }
    }
}

// Contractual keyword and phrase lists, one pair per intent.

const PERSONAL_TOKENS: &[&str] = &[
    "my", "i", "me", "mine", "our", "we", "email", "emails", "meeting", "meetings", "notes",
    "note", "calendar", "document", "documents", "file", "files", "yesterday", "wrote",
    "scheduled", "appointment", "project", "task", "todo", "reminder",
];
const PERSONAL_PHRASES: &[&str] = &["told me", "sent me", "last week", "last month"];

const MEMORY_TOKENS: &[&str] = &[
    "favorite", "favourite", "prefer", "preference", "like", "dislike", "usually", "always",
    "never", "habit", "routine",
];
const MEMORY_PHRASES: &[&str] = &["remember when", "last time i"];

const GENERAL_TOKENS: &[&str] = &[
    "explain", "define", "typically", "science", "math", "calculate", "code", "programming",
    "algorithm", "function",
];
const GENERAL_PHRASES: &[&str] = &["what is", "who is", "how does", "in general"];

const HYBRID_TOKENS: &[&str] = &["draft", "compose", "prepare", "suggest", "recommend", "advice"];
const HYBRID_PHRASES: &[&str] = &["help me write", "should i", "what should i"];

/// Deterministic intent classifier and strategy source.
#[derive(Debug, Default, Clone, Copy)]
pub struct QueryRouter;

impl QueryRouter {
    pub fn new() -> Self {
        Self
    }

    /// Classify a query into an intent with a confidence in [0, 0.95].
    ///
    /// Referentially transparent: equal inputs yield equal outputs.
    pub fn classify(&self, query: &str) -> (QueryIntent, f32) {
        let lowered = query.to_lowercase();
        let tokens: std::collections::HashSet<&str> = lowered
            .split(|c: char| !c.is_ascii_alphanumeric())
            .filter(|t| !t.is_empty())
            .collect();

        let count_for = |keywords: &[&str], phrases: &[&str]| -> usize {
            let token_hits = keywords.iter().filter(|k| tokens.contains(**k)).count();
            let phrase_hits = phrases.iter().filter(|p| lowered.contains(**p)).count();
            token_hits + phrase_hits
        };

        let counts = [
            (QueryIntent::Personal, count_for(PERSONAL_TOKENS, PERSONAL_PHRASES)),
            (QueryIntent::Memory, count_for(MEMORY_TOKENS, MEMORY_PHRASES)),
            (QueryIntent::General, count_for(GENERAL_TOKENS, GENERAL_PHRASES)),
            (QueryIntent::Hybrid, count_for(HYBRID_TOKENS, HYBRID_PHRASES)),
        ];

        // max_by_key keeps the last max; iterate reversed so declaration
        // order wins ties.
        let &(best, best_count) = counts
            .iter()
            .rev()
            .max_by_key(|(_, count)| *count)
            .expect("counts is non-empty");

        let total = counts.iter().map(|(_, c)| c).sum::<usize>().max(1) as f32;

        if best_count == 0 {
            return (QueryIntent::Hybrid, ROUTER_FALLBACK_CONFIDENCE);
        }

        let bonus = if best_count >= 2 {
            ROUTER_STRONG_BONUS
        } else {
            ROUTER_WEAK_BONUS
        };
        let confidence = (best_count as f32 / total + bonus).min(ROUTER_CONFIDENCE_CAP);

        (best, confidence)
    }

    /// Classify and map to the retrieval strategy table.
    pub fn route(&self, query: &str) -> RetrievalStrategy {
        let (intent, confidence) = self.classify(query);
        RetrievalStrategy::for_intent(intent, confidence)
    }
}
