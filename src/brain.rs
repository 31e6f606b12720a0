//! Unified ingestion and retrieval facade
//!
//! [`KnowledgeBrain`] owns the BM25 index, the chunk metadata table, and
//! a handle to the external vector index; the knowledge graph is attached
//! read-only. Ingestion chunks, fingerprints, indexes, and persists;
//! retrieval consults the router, fuses keyword and semantic hits, and
//! optionally expands through the graph. Boot never fails on corrupt
//! state: affected stores start empty with a warning.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::bm25::Bm25Index;
use crate::chunking::chunk_text;
use crate::config::BrainConfig;
use crate::constants::VECTOR_SCORE_THRESHOLD;
use crate::embedder::Embedder;
use crate::errors::Result;
use crate::graph::{GraphExpander, KnowledgeGraph};
use crate::hybrid::{FusedDocument, HybridRetriever, MatchKind};
use crate::persistence::{load_json_or_default, save_json_atomic};
use crate::router::{QueryIntent, QueryRouter, RetrievalDepth, RetrievalStrategy};
use crate::vector_index::VectorIndex;

const BM25_FILE: &str = "bm25_index.json";
const METADATA_FILE: &str = "metadata.json";

/// Closed set of source categories a chunk can be tagged with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceCategory {
    Email,
    Notes,
    Documents,
    Calendar,
    Messages,
    Web,
    Other,
}

impl SourceCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Email => "email",
            Self::Notes => "notes",
            Self::Documents => "documents",
            Self::Calendar => "calendar",
            Self::Messages => "messages",
            Self::Web => "web",
            Self::Other => "other",
        }
    }

    /// Parse a category tag; anything unrecognized maps to `Other`.
    pub fn parse(tag: &str) -> Self {
        match tag {
            "email" => Self::Email,
            "notes" => Self::Notes,
            "documents" => Self::Documents,
            "calendar" => Self::Calendar,
            "messages" => Self::Messages,
            "web" => Self::Web,
            _ => Self::Other,
        }
    }
}

/// Metadata row for one indexed chunk, keyed by fingerprint in the
/// metadata table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkMetadata {
    pub id: Uuid,
    pub source: String,
    pub category: SourceCategory,
    pub chunk_index: u32,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub custom_metadata: HashMap<String, String>,
}

/// One retrieval hit, projected for the assembler and the caller.
#[derive(Debug, Clone)]
pub struct RetrievalResult {
    pub id: Uuid,
    pub text: String,
    pub source: String,
    pub category: Option<SourceCategory>,
    pub score: f64,
    pub match_kind: MatchKind,
    /// Names of graph entities mentioned in this chunk; empty when the
    /// graph is absent or silent.
    pub entity_context: Vec<String>,
    pub community_summary: Option<String>,
}

/// Ingestion progress callback: `(fraction in [0, 1], stage)`.
pub type ProgressFn<'a> = &'a (dyn Fn(f32, &str) + Send + Sync);

/// The retrieval facade.
pub struct KnowledgeBrain {
    config: BrainConfig,
    bm25: Bm25Index,
    metadata: HashMap<Uuid, ChunkMetadata>,
    vector: Arc<dyn VectorIndex>,
    embedder: Option<Arc<dyn Embedder>>,
    graph: Option<Arc<KnowledgeGraph>>,
    router: QueryRouter,
    retriever: HybridRetriever,
    expander: GraphExpander,
    brain_dir: PathBuf,
}

impl KnowledgeBrain {
    /// Open the brain under `config.brain_dir`, loading persisted
    /// indices. Corrupt or unreadable snapshots log a warning and start
    /// empty; opening never fails.
    pub fn open(
        config: BrainConfig,
        vector: Arc<dyn VectorIndex>,
        embedder: Option<Arc<dyn Embedder>>,
    ) -> Self {
        let brain_dir = config.brain_dir.clone();

        let bm25 = match Bm25Index::load(&brain_dir.join(BM25_FILE)) {
            Ok(index) => index,
            Err(e) => {
                warn!(error = %e, "bm25 snapshot unusable, starting empty");
                Bm25Index::new()
            }
        };
        let metadata: HashMap<Uuid, ChunkMetadata> =
            load_json_or_default(&brain_dir.join(METADATA_FILE));

        info!(
            documents = bm25.document_count(),
            chunks = metadata.len(),
            "knowledge brain opened"
        );

        Self {
            config,
            bm25,
            metadata,
            vector,
            embedder,
            graph: None,
            router: QueryRouter::new(),
            retriever: HybridRetriever::new(),
            expander: GraphExpander::new(),
            brain_dir,
        }
    }

    /// Attach a knowledge graph, replacing any previous one wholesale.
    pub fn attach_graph(&mut self, graph: Arc<KnowledgeGraph>) {
        self.graph = Some(graph);
    }

    pub fn detach_graph(&mut self) {
        self.graph = None;
    }

    /// Ingest raw content: chunk, fingerprint, index into BM25 and the
    /// vector index, record metadata, and persist.
    ///
    /// Vector-index failures degrade (the chunk stays keyword-searchable)
    /// but persistence failures are surfaced: the caller expects
    /// durability from a returned ingest.
    pub async fn ingest(
        &mut self,
        content: &str,
        source: &str,
        category: SourceCategory,
        custom_metadata: HashMap<String, String>,
        progress: Option<ProgressFn<'_>>,
    ) -> Result<Vec<Uuid>> {
        let report = |fraction: f32, stage: &str| {
            if let Some(callback) = progress {
                callback(fraction, stage);
            }
        };

        report(0.0, "Chunking content…");
        let chunks = chunk_text(content, self.config.chunk_size);
        let total = chunks.len();
        let mut fingerprints = Vec::with_capacity(total);

        for (i, chunk) in chunks.iter().enumerate() {
            let fingerprint = Uuid::new_v4();
            let chunk_index = i as u32;

            self.bm25
                .add_document(fingerprint, chunk, source, chunk_index);

            let mut vector_metadata = HashMap::new();
            vector_metadata.insert("source".to_string(), source.to_string());
            vector_metadata.insert("category".to_string(), category.as_str().to_string());
            vector_metadata.insert("itemIndex".to_string(), chunk_index.to_string());
            if let Err(e) = self
                .vector
                .add(fingerprint.to_string(), chunk.clone(), vector_metadata)
                .await
            {
                warn!(error = %e, source, chunk_index, "vector add failed, chunk is keyword-only");
            }

            self.metadata.insert(
                fingerprint,
                ChunkMetadata {
                    id: fingerprint,
                    source: source.to_string(),
                    category,
                    chunk_index,
                    timestamp: Utc::now(),
                    custom_metadata: custom_metadata.clone(),
                },
            );
            fingerprints.push(fingerprint);

            report(
                0.9 * (i + 1) as f32 / total.max(1) as f32,
                &format!("Indexing chunk {} of {}", i + 1, total),
            );
        }

        report(0.95, "Saving indices…");
        self.save()?;
        report(1.0, "Complete");

        info!(chunks = total, source, "ingested content");
        Ok(fingerprints)
    }

    /// Retrieve context for a query according to the routed strategy.
    ///
    /// Returns empty when the strategy disables document RAG. Light
    /// depth caps results at 3 and skips graph expansion; full depth
    /// honors `max_results` and expands when a graph is attached.
    pub async fn retrieve(
        &self,
        query: &str,
        max_results: usize,
        category_filter: Option<&[SourceCategory]>,
    ) -> Vec<RetrievalResult> {
        let strategy = if self.config.use_query_routing {
            self.router.route(query)
        } else {
            RetrievalStrategy::for_intent(QueryIntent::Personal, 1.0)
        };

        if !strategy.use_rag {
            debug!(intent = ?strategy.intent, "strategy skips document retrieval");
            return Vec::new();
        }

        let count = match strategy.depth {
            RetrievalDepth::Light => max_results.min(3),
            _ => max_results,
        };

        let (mut results, vector_scores) =
            self.fused_search_with_scores(query, count, category_filter).await;

        if strategy.depth == RetrievalDepth::Full && self.config.graph_rag_enabled {
            if let Some(graph) = self.graph.as_deref() {
                results = self
                    .expand_through_graph(query, results, graph, count, &vector_scores)
                    .await;
            }
        }

        results
    }

    /// Hybrid search without the router gate. Used by callers that have
    /// already decided to consult the corpus, and by tests.
    pub async fn search_direct(
        &self,
        query: &str,
        max_results: usize,
        category_filter: Option<&[SourceCategory]>,
    ) -> Vec<RetrievalResult> {
        self.fused_search_with_scores(query, max_results, category_filter)
            .await
            .0
    }

    /// Run the configured fusion for `2·count` candidates, project,
    /// filter by category, and truncate to `count`. Also returns the raw
    /// vector score per fingerprint, which graph expansion uses to score
    /// pulled-in chunks.
    async fn fused_search_with_scores(
        &self,
        query: &str,
        count: usize,
        category_filter: Option<&[SourceCategory]>,
    ) -> (Vec<RetrievalResult>, HashMap<Uuid, f64>) {
        if count == 0 {
            return (Vec::new(), HashMap::new());
        }
        let candidates = count * 2;

        let fused: Vec<FusedDocument> = if !self.config.use_hybrid_search {
            match self
                .vector
                .search(query, candidates, VECTOR_SCORE_THRESHOLD)
                .await
            {
                Ok(hits) => hits
                    .into_iter()
                    .enumerate()
                    .map(|(rank, hit)| FusedDocument {
                        id: Uuid::parse_str(&hit.id).unwrap_or(Uuid::nil()),
                        text: hit.text,
                        source: hit.source,
                        chunk_index: hit.item_index,
                        category: hit.metadata.get("category").cloned(),
                        bm25_rank: None,
                        vector_rank: Some(rank + 1),
                        bm25_score: None,
                        vector_score: Some(f64::from(hit.score)),
                        fused_score: f64::from(hit.score),
                    })
                    .collect(),
                Err(e) => {
                    warn!(error = %e, "vector-only search failed");
                    Vec::new()
                }
            }
        } else if let Some(weight) = self.config.hybrid_vector_weight {
            self.retriever
                .search_weighted(query, self.vector.as_ref(), &self.bm25, candidates, weight)
                .await
        } else {
            self.retriever
                .search(query, self.vector.as_ref(), &self.bm25, candidates)
                .await
        };

        let mut vector_scores = HashMap::new();
        for doc in &fused {
            if let Some(score) = doc.vector_score {
                vector_scores.insert(doc.id, score);
            }
        }

        let mut results: Vec<RetrievalResult> = fused
            .into_iter()
            .map(|doc| self.project(doc))
            .collect();

        if let Some(allowed) = category_filter {
            results.retain(|r| r.category.map(|c| allowed.contains(&c)).unwrap_or(false));
        }
        results.truncate(count);
        (results, vector_scores)
    }

    /// Project a fused document into a retrieval result, resolving the
    /// category from the metadata table.
    fn project(&self, doc: FusedDocument) -> RetrievalResult {
        let match_kind = doc.match_kind();
        let category = self
            .metadata
            .get(&doc.id)
            .map(|m| m.category)
            .or_else(|| doc.category.as_deref().map(SourceCategory::parse));

        RetrievalResult {
            id: doc.id,
            text: doc.text,
            source: doc.source,
            category,
            score: doc.fused_score,
            match_kind,
            entity_context: Vec::new(),
            community_summary: None,
        }
    }

    /// Annotate results with graph context and pull 1-hop neighbor
    /// chunks when the list is short.
    async fn expand_through_graph(
        &self,
        query: &str,
        results: Vec<RetrievalResult>,
        graph: &KnowledgeGraph,
        max_results: usize,
        vector_scores: &HashMap<Uuid, f64>,
    ) -> Vec<RetrievalResult> {
        let query_embedding = match self.embedder.as_deref() {
            Some(embedder) => match embedder.encode(query).await {
                Ok(embedding) => Some(embedding),
                Err(e) => {
                    warn!(error = %e, "query embedding failed, community choice falls back to overlap");
                    None
                }
            },
            None => None,
        };

        self.expander.expand(
            query_embedding.as_deref(),
            results,
            graph,
            max_results,
            |chunk_id| {
                let record = self.bm25.get(chunk_id)?;
                let category = self.metadata.get(chunk_id).map(|m| m.category);
                Some(RetrievalResult {
                    id: record.id,
                    text: record.text.clone(),
                    source: record.source.clone(),
                    category,
                    score: vector_scores.get(chunk_id).copied().unwrap_or(0.0),
                    match_kind: MatchKind::GraphExpanded,
                    entity_context: Vec::new(),
                    community_summary: None,
                })
            },
        )
    }

    /// Persist the BM25 snapshot and metadata table atomically.
    pub fn save(&self) -> Result<()> {
        self.bm25.save(&self.brain_dir.join(BM25_FILE))?;
        save_json_atomic(&self.brain_dir.join(METADATA_FILE), &self.metadata)?;
        Ok(())
    }

    /// Number of indexed chunks.
    pub fn document_count(&self) -> usize {
        self.bm25.document_count()
    }

    /// Metadata for a chunk fingerprint.
    pub fn chunk_metadata(&self, id: &Uuid) -> Option<&ChunkMetadata> {
        self.metadata.get(id)
    }

    /// Route a query without retrieving (the integration layer needs the
    /// strategy before deciding which subsystems to touch).
    pub fn route(&self, query: &str) -> RetrievalStrategy {
        if self.config.use_query_routing {
            self.router.route(query)
        } else {
            RetrievalStrategy::for_intent(QueryIntent::Personal, 1.0)
        }
    }

    pub fn config(&self) -> &BrainConfig {
        &self.config
    }
}
