//! Fact extraction from user turns
//!
//! A fixed table of first-person patterns maps to fact categories. When a
//! pattern appears in the query, the first sentence containing it is
//! rewritten into third person by dropping a leading "I " and prepending
//! "The user ". The raw concatenation is kept as-is, subject–verb
//! agreement included ("The user prefer tea…").

use crate::constants::{FACT_MAX_CHARS, FACT_MIN_CHARS};
use crate::memory::types::FactCategory;

/// Pattern → category table. Patterns are matched against the lowercased
/// query.
const EXTRACTION_PATTERNS: &[(&str, FactCategory)] = &[
    ("i prefer", FactCategory::Preference),
    ("i like", FactCategory::Preference),
    ("i don't like", FactCategory::Preference),
    ("my favorite", FactCategory::Preference),
    ("i work at", FactCategory::PersonalInfo),
    ("i am a", FactCategory::PersonalInfo),
    ("i live in", FactCategory::PersonalInfo),
    ("i think", FactCategory::Opinion),
    ("i believe", FactCategory::Opinion),
    ("i usually", FactCategory::Behavior),
    ("i always", FactCategory::Behavior),
];

/// Extract candidate facts from a user turn.
///
/// Returns `(fact, category)` pairs, already length-filtered to
/// [`FACT_MIN_CHARS`], [`FACT_MAX_CHARS`] and deduplicated (lowercased)
/// within the run. The caller still checks against existing stored facts.
pub fn extract_facts(user_query: &str) -> Vec<(String, FactCategory)> {
    let lowered = user_query.to_lowercase();
    let mut out: Vec<(String, FactCategory)> = Vec::new();

    for (pattern, category) in EXTRACTION_PATTERNS {
        if !lowered.contains(pattern) {
            continue;
        }

        let Some(sentence) = first_sentence_containing(user_query, pattern) else {
            continue;
        };

        let fact = rewrite_to_third_person(sentence);
        if fact.len() < FACT_MIN_CHARS || fact.len() > FACT_MAX_CHARS {
            continue;
        }

        let fact_lower = fact.to_lowercase();
        if out.iter().any(|(f, _)| f.to_lowercase() == fact_lower) {
            continue;
        }
        out.push((fact, *category));
    }

    out
}

/// Find the first sentence (split on `.!?`) whose lowercased form
/// contains the pattern.
fn first_sentence_containing<'a>(query: &'a str, pattern: &str) -> Option<&'a str> {
    query
        .split(['.', '!', '?'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .find(|s| s.to_lowercase().contains(pattern))
}

/// Drop a leading "I " (case-insensitive) and prepend "The user ".
fn rewrite_to_third_person(sentence: &str) -> String {
    let body = match sentence.get(..2) {
        Some(prefix) if prefix.eq_ignore_ascii_case("i ") => &sentence[2..],
        _ => sentence,
    };
    format!("The user {body}")
}
