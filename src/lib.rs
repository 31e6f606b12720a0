//! Smriti-Brain Library
//!
//! Local-first personal-knowledge retrieval engine. Given a user query,
//! the brain decides whether to consult the private corpus, runs hybrid
//! BM25 + vector retrieval, optionally expands through a knowledge
//! graph, recalls long-term memories, and assembles a token-budgeted
//! context block for a downstream language model. Everything runs on the
//! user's machine; there is no remote indexing service.
//!
//! # Key pieces
//! - Deterministic query router (no model call on the hot path)
//! - Okapi BM25 inverted index with replay-based JSON snapshots
//! - Reciprocal Rank Fusion over keyword and semantic ranked lists
//! - Read-only knowledge-graph expansion (entities, communities, 1 hop)
//! - Three-tier memory (semantic facts, episodes, procedural rules)
//! - Token-accounting context packer with priority-ordered eviction
//!
//! The embedding model, vector search library, web fetcher, and text
//! extraction are injected capabilities; the brain never depends on
//! their concrete types.

pub mod assembler;
pub mod bm25;
pub mod brain;
pub mod chunking;
pub mod config;
pub mod constants;
pub mod embedder;
pub mod errors;
pub mod graph;
pub mod hybrid;
pub mod integration;
pub mod memory;
pub mod persistence;
pub mod router;
pub mod similarity;
pub mod tokenizer;
pub mod tracing_setup;
pub mod vector_index;

pub use assembler::{
    AssembledContext, ContextAssembler, ContextBudget, ConversationTurn, TurnRole,
};
pub use brain::{ChunkMetadata, KnowledgeBrain, RetrievalResult, SourceCategory};
pub use config::BrainConfig;
pub use embedder::Embedder;
pub use errors::{BrainError, Result};
pub use graph::{
    GraphCommunity, GraphEntity, GraphExpander, GraphRelationship, KnowledgeGraph,
};
pub use hybrid::{FusedDocument, HybridRetriever, MatchKind};
pub use integration::{BrainIntegration, TemporarySource, WebResult, WebSearch};
pub use memory::types::{
    EpisodicMemory, FactCategory, MemoryContext, ProceduralMemory, SemanticMemory,
};
pub use memory::UnifiedMemory;
pub use router::{QueryIntent, QueryRouter, RetrievalDepth, RetrievalStrategy};
pub use vector_index::{VectorHit, VectorIndex};

// Re-export dependencies so downstream tests use the same versions.
pub use chrono;
pub use uuid;
