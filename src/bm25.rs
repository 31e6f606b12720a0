//! Okapi BM25 keyword index with durable snapshot
//!
//! An inverted index over chunk text, scored with Okapi BM25. The
//! serialized form stores only the documents table; postings, length
//! table, and the running average are rebuilt by replaying the documents
//! through [`Bm25Index::add_document`] on load, which keeps the snapshot
//! stable across changes to the in-memory layout.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::constants::{BM25_B, BM25_K1};
use crate::errors::Result;
use crate::persistence::{load_json, save_json_atomic};
use crate::tokenizer::tokenize;

/// The serialized subset of an indexed chunk. `(source, chunk_index)` is
/// unique; `id` is the fingerprint used as primary key by all indices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkRecord {
    pub id: Uuid,
    pub text: String,
    pub source: String,
    pub chunk_index: u32,
}

/// On-disk snapshot: the documents table only.
#[derive(Debug, Default, Serialize, Deserialize)]
struct Bm25Snapshot {
    documents: Vec<ChunkRecord>,
}

/// One entry in a token's posting list: `(document ordinal, term
/// frequency)`. Postings are append-only in insertion order.
#[derive(Debug, Clone, Copy)]
struct Posting {
    ordinal: u32,
    tf: u32,
}

/// In-memory BM25 index.
#[derive(Debug, Default)]
pub struct Bm25Index {
    /// Documents in ordinal order; the ordinal is the position here.
    documents: Vec<ChunkRecord>,

    /// Token → posting list.
    postings: HashMap<String, Vec<Posting>>,

    /// Token count per document, indexed by ordinal.
    doc_lengths: Vec<u32>,

    /// Running sum of all document lengths, for the average.
    total_tokens: u64,

    /// Fingerprint → ordinal.
    ordinal_by_id: HashMap<Uuid, u32>,
}

impl Bm25Index {
    /// Create an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a document to the index.
    ///
    /// Assigns the next dense ordinal, records the token count, and
    /// appends `(ordinal, tf)` to each token's posting list.
    pub fn add_document(&mut self, id: Uuid, text: &str, source: &str, chunk_index: u32) {
        let tokens = tokenize(text);
        let ordinal = self.documents.len() as u32;

        let mut frequencies: HashMap<&str, u32> = HashMap::new();
        for token in &tokens {
            *frequencies.entry(token.as_str()).or_insert(0) += 1;
        }

        for (token, tf) in frequencies {
            self.postings
                .entry(token.to_string())
                .or_default()
                .push(Posting { ordinal, tf });
        }

        self.doc_lengths.push(tokens.len() as u32);
        self.total_tokens += tokens.len() as u64;
        self.ordinal_by_id.insert(id, ordinal);
        self.documents.push(ChunkRecord {
            id,
            text: text.to_string(),
            source: source.to_string(),
            chunk_index,
        });
    }

    /// Search the index, returning up to `top_k` `(document, score)`
    /// pairs in descending score order.
    ///
    /// An empty query (after tokenization) or an empty index returns an
    /// empty result rather than an error. Ties are broken by ascending
    /// insertion ordinal, so identical input produces identical output
    /// across runs.
    pub fn search(&self, query: &str, top_k: usize) -> Vec<(&ChunkRecord, f64)> {
        let tokens = tokenize(query);
        if tokens.is_empty() || self.documents.is_empty() {
            return Vec::new();
        }

        let n = self.documents.len() as f64;
        let avgdl = self.average_doc_length();

        let mut scores: HashMap<u32, f64> = HashMap::new();
        for token in &tokens {
            let Some(postings) = self.postings.get(token.as_str()) else {
                continue;
            };

            let df = postings.len() as f64;
            let idf = ((n - df + 0.5) / (df + 0.5) + 1.0).ln();

            for posting in postings {
                let tf = posting.tf as f64;
                let len = self.doc_lengths[posting.ordinal as usize] as f64;
                let denom = tf + BM25_K1 * (1.0 - BM25_B + BM25_B * len / avgdl);
                let term = idf * tf * (BM25_K1 + 1.0) / denom;
                *scores.entry(posting.ordinal).or_insert(0.0) += term;
            }
        }

        let mut ranked: Vec<(u32, f64)> = scores.into_iter().collect();
        ranked.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.0.cmp(&b.0))
        });
        ranked.truncate(top_k);

        debug!(
            query_tokens = tokens.len(),
            hits = ranked.len(),
            "bm25 search"
        );

        ranked
            .into_iter()
            .map(|(ordinal, score)| (&self.documents[ordinal as usize], score))
            .collect()
    }

    /// Look up a document by fingerprint.
    pub fn get(&self, id: &Uuid) -> Option<&ChunkRecord> {
        self.ordinal_by_id
            .get(id)
            .map(|&ordinal| &self.documents[ordinal as usize])
    }

    /// Drop all documents and postings.
    pub fn clear(&mut self) {
        self.documents.clear();
        self.postings.clear();
        self.doc_lengths.clear();
        self.total_tokens = 0;
        self.ordinal_by_id.clear();
    }

    /// Number of indexed documents.
    pub fn document_count(&self) -> usize {
        self.documents.len()
    }

    /// Number of unique tokens in the inverted index.
    pub fn unique_term_count(&self) -> usize {
        self.postings.len()
    }

    /// Whether the index holds no documents.
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Iterate the documents table in ordinal order.
    pub fn documents(&self) -> impl Iterator<Item = &ChunkRecord> {
        self.documents.iter()
    }

    /// Average document length in tokens, clamped to 1 when the index is
    /// empty so the length normalization never divides by zero.
    fn average_doc_length(&self) -> f64 {
        if self.documents.is_empty() {
            return 1.0;
        }
        (self.total_tokens as f64 / self.documents.len() as f64).max(1.0)
    }

    /// Persist the documents table to `path` atomically.
    pub fn save(&self, path: &Path) -> Result<()> {
        let snapshot = Bm25Snapshot {
            documents: self.documents.clone(),
        };
        save_json_atomic(path, &snapshot)?;
        debug!(documents = self.documents.len(), path = %path.display(), "bm25 snapshot saved");
        Ok(())
    }

    /// Load an index from a snapshot at `path`, rebuilding postings and
    /// length statistics by replay. A missing file yields an empty index.
    pub fn load(path: &Path) -> Result<Self> {
        let snapshot: Bm25Snapshot = load_json(path)?.unwrap_or_default();

        let mut index = Self::new();
        for doc in snapshot.documents {
            index.add_document(doc.id, &doc.text, &doc.source, doc.chunk_index);
        }

        info!(
            documents = index.documents.len(),
            terms = index.postings.len(),
            "bm25 index loaded"
        );
        Ok(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tester_corpus() -> Bm25Index {
        let mut index = Bm25Index::new();
        index.add_document(
            Uuid::new_v4(),
            "Meeting with John about the Q4 budget review scheduled for Monday",
            "calendar",
            0,
        );
        index.add_document(
            Uuid::new_v4(),
            "Email from Sarah regarding the marketing campaign results",
            "email",
            0,
        );
        index.add_document(
            Uuid::new_v4(),
            "Invoice #INV-2024-0847 from ACME Corp for $5,000",
            "documents",
            0,
        );
        index.add_document(
            Uuid::new_v4(),
            "Notes from team standup: discussed sprint priorities and blockers",
            "notes",
            0,
        );
        index.add_document(
            Uuid::new_v4(),
            "John mentioned we need to finalize the budget proposal by Friday",
            "email",
            0,
        );
        index
    }

    #[test]
    fn test_exact_identifier_match() {
        let index = tester_corpus();
        let results = index.search("INV-2024-0847", 10);

        // Only the invoice document contains any of {inv, 2024, 0847}
        assert_eq!(results.len(), 1, "non-matching documents must not be returned");
        assert_eq!(results[0].0.source, "documents");
        assert!(results[0].1 > 0.0);
    }

    #[test]
    fn test_results_sorted_descending_and_bounded() {
        let index = tester_corpus();
        let results = index.search("John budget meeting", 2);

        assert!(results.len() <= 2);
        for pair in results.windows(2) {
            assert!(pair[0].1 >= pair[1].1, "scores must be sorted descending");
        }
        for (_, score) in &results {
            assert!(*score > 0.0);
        }
    }

    #[test]
    fn test_every_indexed_token_is_findable() {
        let index = tester_corpus();
        for doc in index.documents() {
            for token in tokenize(&doc.text) {
                let results = index.search(&token, index.document_count());
                assert!(
                    results.iter().any(|(d, s)| d.id == doc.id && *s > 0.0),
                    "token '{token}' must retrieve its document"
                );
            }
        }
    }

    #[test]
    fn test_empty_query_and_empty_index() {
        let index = tester_corpus();
        assert!(index.search("", 5).is_empty());
        assert!(index.search("the of a", 5).is_empty());

        let empty = Bm25Index::new();
        assert!(empty.search("budget", 5).is_empty());
    }

    #[test]
    fn test_tie_break_is_insertion_order() {
        let mut index = Bm25Index::new();
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();
        // Identical text → identical scores; first-inserted wins.
        index.add_document(first, "quarterly budget review", "a", 0);
        index.add_document(second, "quarterly budget review", "b", 0);

        let results = index.search("budget", 2);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].0.id, first);
        assert_eq!(results[1].0.id, second);
    }

    #[test]
    fn test_save_load_round_trip_preserves_scores() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bm25_index.json");

        let index = tester_corpus();
        index.save(&path).unwrap();
        let reloaded = Bm25Index::load(&path).unwrap();

        assert_eq!(reloaded.document_count(), index.document_count());
        assert_eq!(reloaded.unique_term_count(), index.unique_term_count());

        for query in ["John budget", "INV-2024-0847", "marketing campaign"] {
            let before = index.search(query, 10);
            let after = reloaded.search(query, 10);
            assert_eq!(before.len(), after.len());
            for ((doc_a, score_a), (doc_b, score_b)) in before.iter().zip(after.iter()) {
                assert_eq!(doc_a.id, doc_b.id, "ranking must survive reload");
                assert_eq!(score_a, score_b, "scores must be byte-identical after reload");
            }
        }
    }

    #[test]
    fn test_missing_snapshot_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let index = Bm25Index::load(&dir.path().join("absent.json")).unwrap();
        assert!(index.is_empty());
    }

    #[test]
    fn test_clear() {
        let mut index = tester_corpus();
        index.clear();
        assert!(index.is_empty());
        assert_eq!(index.unique_term_count(), 0);
        assert!(index.search("budget", 5).is_empty());
    }

    #[test]
    fn test_snapshot_uses_camel_case_chunk_index() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bm25_index.json");
        tester_corpus().save(&path).unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\"chunkIndex\""));
        assert!(raw.contains("\"documents\""));
    }
}
