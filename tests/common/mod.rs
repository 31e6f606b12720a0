//! Shared test doubles for the external capabilities
#![allow(dead_code)] // not every test file uses every double

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;

use smriti_brain::{Embedder, VectorHit, VectorIndex, WebResult, WebSearch};

/// Embedder stub: every text maps to the same unit vector, so cosine
/// similarity between any pair is 1.0. Good enough for recall-path tests
/// that do not need discrimination.
pub struct ConstantEmbedder;

#[async_trait]
impl Embedder for ConstantEmbedder {
    async fn encode(&self, _text: &str) -> anyhow::Result<Vec<f32>> {
        Ok(vec![1.0, 0.0, 0.0])
    }

    fn dimension(&self) -> usize {
        3
    }
}

/// In-memory vector index scoring by lowercase word overlap between the
/// query and stored text. Deterministic and dependency-free, behaves
/// enough like a semantic index for pipeline tests.
#[derive(Default)]
pub struct KeywordVectorIndex {
    docs: RwLock<Vec<VectorHit>>,
}

#[async_trait]
impl VectorIndex for KeywordVectorIndex {
    async fn add(
        &self,
        id: String,
        text: String,
        metadata: HashMap<String, String>,
    ) -> anyhow::Result<()> {
        let source = metadata.get("source").cloned().unwrap_or_default();
        let item_index = metadata
            .get("itemIndex")
            .and_then(|s| s.parse().ok())
            .unwrap_or(0);
        self.docs.write().push(VectorHit {
            id,
            text,
            score: 0.0,
            source,
            item_index,
            metadata,
        });
        Ok(())
    }

    async fn search(
        &self,
        query: &str,
        max_results: usize,
        threshold: f32,
    ) -> anyhow::Result<Vec<VectorHit>> {
        let query_words: Vec<String> = query
            .to_lowercase()
            .split_whitespace()
            .map(str::to_string)
            .collect();
        let mut hits: Vec<VectorHit> = self
            .docs
            .read()
            .iter()
            .map(|doc| {
                let text = doc.text.to_lowercase();
                let overlap = query_words
                    .iter()
                    .filter(|w| text.contains(w.as_str()))
                    .count();
                let mut hit = doc.clone();
                hit.score = overlap as f32 / query_words.len().max(1) as f32;
                hit
            })
            .filter(|hit| hit.score >= threshold)
            .collect();
        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap());
        hits.truncate(max_results);
        Ok(hits)
    }
}

/// Web search stub returning canned results.
pub struct CannedWebSearch {
    pub results: Vec<WebResult>,
}

#[async_trait]
impl WebSearch for CannedWebSearch {
    async fn search(&self, _query: &str, count: usize) -> anyhow::Result<Vec<WebResult>> {
        Ok(self.results.iter().take(count).cloned().collect())
    }
}

pub fn constant_embedder() -> Arc<dyn Embedder> {
    Arc::new(ConstantEmbedder)
}

pub fn keyword_vector_index() -> Arc<dyn VectorIndex> {
    Arc::new(KeywordVectorIndex::default())
}
