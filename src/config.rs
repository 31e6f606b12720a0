//! Configuration for the retrieval brain
//!
//! Sensible defaults, every recognized option runtime-toggleable by the
//! composition root. Declared lifecycle constants (episodic capacity,
//! consolidation cutoffs) live in [`crate::constants`] and are
//! deliberately not configuration.

use std::path::PathBuf;

use crate::constants::DEFAULT_CHUNK_SIZE;

/// The recognized runtime options.
#[derive(Debug, Clone)]
pub struct BrainConfig {
    /// Directory for the BM25 snapshot and chunk metadata.
    pub brain_dir: PathBuf,

    /// Directory for the three memory stores.
    pub memory_dir: PathBuf,

    /// Gate for the whole system; when false the integration layer
    /// passes queries through untouched.
    pub use_unified_brain: bool,

    /// When false, every query is treated as `personal`.
    pub use_query_routing: bool,

    /// When false, only vector search is used for document retrieval.
    pub use_hybrid_search: bool,

    /// `None` selects Reciprocal Rank Fusion; `Some(w)` selects
    /// max-normalized weighted fusion with vector weight `w` in [0, 1].
    pub hybrid_vector_weight: Option<f32>,

    /// Gate for the memory subsystem.
    pub use_memory: bool,

    /// Chunk target size in characters.
    pub chunk_size: usize,

    /// Gate for knowledge-graph expansion at full retrieval depth.
    pub graph_rag_enabled: bool,
}

impl Default for BrainConfig {
    fn default() -> Self {
        Self {
            brain_dir: PathBuf::from("./smriti_data/brain"),
            memory_dir: PathBuf::from("./smriti_data/memory"),
            use_unified_brain: true,
            use_query_routing: true,
            use_hybrid_search: true,
            hybrid_vector_weight: None,
            use_memory: true,
            chunk_size: DEFAULT_CHUNK_SIZE,
            graph_rag_enabled: true,
        }
    }
}

impl BrainConfig {
    /// Config rooted at a single data directory (brain and memory as
    /// subdirectories). The usual constructor for tests and embedders.
    pub fn rooted_at(data_dir: impl Into<PathBuf>) -> Self {
        let data_dir = data_dir.into();
        Self {
            brain_dir: data_dir.join("brain"),
            memory_dir: data_dir.join("memory"),
            ..Self::default()
        }
    }
}
