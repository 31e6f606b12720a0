//! Vector-index capability consumed by hybrid retrieval
//!
//! The underlying similarity-search library (an HNSW/Vamana-class index in
//! the reference deployment) is opaque to the brain: it may manage its own
//! threads and storage. The brain supplies the chunk fingerprint as `id`
//! and `{"source", "category", "itemIndex"}` as metadata.

use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;

/// A single hit from the vector index.
///
/// `score` is cosine similarity normalized to [0, 1] where 1 is identical.
#[derive(Debug, Clone)]
pub struct VectorHit {
    pub id: String,
    pub text: String,
    pub score: f32,
    pub source: String,
    pub item_index: u32,
    pub metadata: HashMap<String, String>,
}

/// Trait for the external vector similarity index.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Add a document to the index.
    async fn add(
        &self,
        id: String,
        text: String,
        metadata: HashMap<String, String>,
    ) -> Result<()>;

    /// Search for documents similar to the query.
    ///
    /// Returns hits ordered by descending score; hits below `threshold`
    /// are excluded.
    async fn search(
        &self,
        query: &str,
        max_results: usize,
        threshold: f32,
    ) -> Result<Vec<VectorHit>>;
}
