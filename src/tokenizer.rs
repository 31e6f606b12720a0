//! Keyword tokenizer shared by indexing and query paths
//!
//! Lowercases, splits on anything outside `[a-z0-9]`, then drops empty
//! strings, tokens of length ≤ 2, and a fixed closed stopword set.
//! Deterministic and pure; changing any of these rules requires a full
//! index rebuild because postings are keyed by the produced tokens.

/// Fixed closed stopword set: English function words (articles,
/// auxiliaries, prepositions, common pronouns). Sorted for binary search.
const STOPWORDS: &[&str] = &[
    "about", "above", "after", "again", "all", "and", "any", "are", "because",
    "been", "before", "being", "below", "between", "both", "but", "can",
    "cannot", "could", "did", "does", "doing", "down", "during", "each",
    "few", "for", "from", "further", "had", "has", "have", "having", "her",
    "here", "hers", "him", "his", "how", "into", "its", "itself", "just",
    "more", "most", "not", "now", "off", "once", "only", "other", "our",
    "ours", "out", "over", "own", "same", "she", "should", "some", "such",
    "than", "that", "the", "their", "theirs", "them", "then", "there",
    "these", "they", "this", "those", "through", "too", "under", "until",
    "very", "was", "were", "what", "when", "where", "which", "while", "who",
    "whom", "why", "will", "with", "would", "you", "your", "yours",
];

/// Check membership in the fixed stopword set.
pub fn is_stopword(token: &str) -> bool {
    STOPWORDS.binary_search(&token).is_ok()
}

/// Tokenize text for BM25 indexing and querying.
///
/// Returns tokens in input order. The same function runs at indexing and
/// query time; postings are only comparable across identical tokenization.
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|t| t.len() > 2 && !is_stopword(t))
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stopword_table_is_sorted() {
        let mut sorted = STOPWORDS.to_vec();
        sorted.sort_unstable();
        assert_eq!(sorted, STOPWORDS, "stopword table must stay sorted for binary search");
    }

    #[test]
    fn test_lowercase_and_split() {
        assert_eq!(
            tokenize("Meeting with John about Q4-budget"),
            vec!["meeting", "john", "budget"]
        );
    }

    #[test]
    fn test_short_tokens_dropped() {
        // "q4" survives the split but is length 2
        assert_eq!(tokenize("Q4 we go up"), Vec::<String>::new());
    }

    #[test]
    fn test_invoice_identifier_splits_on_hyphens() {
        assert_eq!(tokenize("INV-2024-0847"), vec!["inv", "2024", "0847"]);
    }

    #[test]
    fn test_stopwords_dropped() {
        assert_eq!(
            tokenize("the budget from their meeting"),
            vec!["budget", "meeting"]
        );
    }

    #[test]
    fn test_empty_and_punctuation_only() {
        assert!(tokenize("").is_empty());
        assert!(tokenize("... !!! ---").is_empty());
    }

    #[test]
    fn test_deterministic() {
        let a = tokenize("Notes from team standup: discussed sprint priorities");
        let b = tokenize("Notes from team standup: discussed sprint priorities");
        assert_eq!(a, b);
    }
}
