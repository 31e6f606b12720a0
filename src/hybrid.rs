//! Hybrid retrieval: BM25 + vector search fused by rank
//!
//! Runs both sub-searches concurrently and combines the ranked lists,
//! either with Reciprocal Rank Fusion (the default) or with max-normalized
//! weighted blending. Documents are keyed by `(source, chunk_index)`, so
//! identical content from two sources stays two documents.
//!
//! ```text
//! Query → [BM25]   ──┐
//!                    ├─→ [RRF / weighted fusion] → ranked candidates
//! Query → [Vector] ──┘
//! ```

use std::collections::HashMap;

use tracing::{debug, warn};
use uuid::Uuid;

use crate::bm25::Bm25Index;
use crate::constants::{CANDIDATE_FACTOR, RRF_K, VECTOR_SCORE_THRESHOLD};
use crate::vector_index::VectorIndex;

/// How a fused document was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchKind {
    /// Vector hit only.
    Semantic,
    /// BM25 hit only.
    Keyword,
    /// Present in both ranked lists.
    Hybrid,
    /// Pulled in by knowledge-graph neighborhood expansion.
    GraphExpanded,
}

/// A document after fusion, carrying both component ranks and raw scores
/// so callers can derive the match kind and debug orderings.
#[derive(Debug, Clone)]
pub struct FusedDocument {
    pub id: Uuid,
    pub text: String,
    pub source: String,
    pub chunk_index: u32,
    pub category: Option<String>,

    /// 1-based rank in the BM25 list, when present.
    pub bm25_rank: Option<usize>,
    /// 1-based rank in the vector list, when present.
    pub vector_rank: Option<usize>,
    pub bm25_score: Option<f64>,
    pub vector_score: Option<f64>,
    pub fused_score: f64,
}

impl FusedDocument {
    /// Derive the match kind from which lists the document appeared in.
    pub fn match_kind(&self) -> MatchKind {
        match (self.vector_rank, self.bm25_rank) {
            (Some(_), Some(_)) => MatchKind::Hybrid,
            (None, Some(_)) => MatchKind::Keyword,
            _ => MatchKind::Semantic,
        }
    }
}

/// Fusion engine over a BM25 index and a vector-index capability.
#[derive(Debug, Clone, Copy)]
pub struct HybridRetriever {
    rrf_k: f64,
}

impl Default for HybridRetriever {
    fn default() -> Self {
        Self::new()
    }
}

impl HybridRetriever {
    pub fn new() -> Self {
        Self { rrf_k: RRF_K }
    }

    /// Fan out both searches for `CANDIDATE_FACTOR * top_k` candidates
    /// and fuse with Reciprocal Rank Fusion:
    /// `fused(d) = Σ 1/(K + rank_i(d))` over the lists containing `d`.
    pub async fn search(
        &self,
        query: &str,
        vector: &dyn VectorIndex,
        bm25: &Bm25Index,
        top_k: usize,
    ) -> Vec<FusedDocument> {
        let (vector_hits, bm25_hits) = self.gather(query, vector, bm25, top_k).await;

        let mut fused = merge_lists(&vector_hits, &bm25_hits);
        for doc in fused.values_mut() {
            let mut score = 0.0;
            if let Some(rank) = doc.vector_rank {
                score += 1.0 / (self.rrf_k + rank as f64);
            }
            if let Some(rank) = doc.bm25_rank {
                score += 1.0 / (self.rrf_k + rank as f64);
            }
            doc.fused_score = score;
        }

        finalize(fused, top_k)
    }

    /// Weighted alternative to RRF: normalize each list's scores by the
    /// list maximum, then blend `vector_weight·v̂ + (1−vector_weight)·b̂`.
    pub async fn search_weighted(
        &self,
        query: &str,
        vector: &dyn VectorIndex,
        bm25: &Bm25Index,
        top_k: usize,
        vector_weight: f32,
    ) -> Vec<FusedDocument> {
        let vector_weight = f64::from(vector_weight.clamp(0.0, 1.0));
        let (vector_hits, bm25_hits) = self.gather(query, vector, bm25, top_k).await;

        let max_vector = vector_hits
            .iter()
            .map(|h| h.1)
            .fold(0.0_f64, f64::max)
            .max(f64::MIN_POSITIVE);
        let max_bm25 = bm25_hits
            .iter()
            .map(|h| h.1)
            .fold(0.0_f64, f64::max)
            .max(f64::MIN_POSITIVE);

        let mut fused = merge_lists(&vector_hits, &bm25_hits);
        for doc in fused.values_mut() {
            let v_norm = doc.vector_score.map(|s| s / max_vector).unwrap_or(0.0);
            let b_norm = doc.bm25_score.map(|s| s / max_bm25).unwrap_or(0.0);
            doc.fused_score = vector_weight * v_norm + (1.0 - vector_weight) * b_norm;
        }

        finalize(fused, top_k)
    }

    /// Issue both sub-searches concurrently. A vector-index failure is
    /// logged and degrades to an empty semantic list; BM25 is local and
    /// synchronous CPU work.
    async fn gather(
        &self,
        query: &str,
        vector: &dyn VectorIndex,
        bm25: &Bm25Index,
        top_k: usize,
    ) -> (Vec<ListedHit>, Vec<ListedHit>) {
        let candidates = CANDIDATE_FACTOR * top_k;

        let (vector_result, bm25_result) = tokio::join!(
            vector.search(query, candidates, VECTOR_SCORE_THRESHOLD),
            async { bm25.search(query, candidates) },
        );

        let vector_hits: Vec<ListedHit> = match vector_result {
            Ok(hits) => hits
                .into_iter()
                .map(|hit| {
                    let id = Uuid::parse_str(&hit.id).unwrap_or(Uuid::nil());
                    let category = hit.metadata.get("category").cloned();
                    (
                        FusedKey {
                            source: hit.source.clone(),
                            chunk_index: hit.item_index,
                        },
                        f64::from(hit.score),
                        HitBody {
                            id,
                            text: hit.text,
                            source: hit.source,
                            chunk_index: hit.item_index,
                            category,
                        },
                    )
                })
                .collect(),
            Err(e) => {
                warn!(error = %e, "vector search failed, degrading to keyword-only");
                Vec::new()
            }
        };

        let bm25_hits: Vec<ListedHit> = bm25_result
            .into_iter()
            .map(|(doc, score)| {
                (
                    FusedKey {
                        source: doc.source.clone(),
                        chunk_index: doc.chunk_index,
                    },
                    score,
                    HitBody {
                        id: doc.id,
                        text: doc.text.clone(),
                        source: doc.source.clone(),
                        chunk_index: doc.chunk_index,
                        category: None,
                    },
                )
            })
            .collect();

        debug!(
            vector = vector_hits.len(),
            keyword = bm25_hits.len(),
            "hybrid sub-search results"
        );

        (vector_hits, bm25_hits)
    }
}

/// Identity of a document across the two ranked lists.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct FusedKey {
    source: String,
    chunk_index: u32,
}

#[derive(Debug, Clone)]
struct HitBody {
    id: Uuid,
    text: String,
    source: String,
    chunk_index: u32,
    category: Option<String>,
}

type ListedHit = (FusedKey, f64, HitBody);

/// Build the keyed document table with per-list ranks and raw scores.
fn merge_lists(
    vector_hits: &[ListedHit],
    bm25_hits: &[ListedHit],
) -> HashMap<FusedKey, FusedDocument> {
    let mut fused: HashMap<FusedKey, FusedDocument> = HashMap::new();

    for (rank, (key, score, body)) in vector_hits.iter().enumerate() {
        let doc = fused.entry(key.clone()).or_insert_with(|| blank(body));
        doc.vector_rank = Some(rank + 1);
        doc.vector_score = Some(*score);
    }

    for (rank, (key, score, body)) in bm25_hits.iter().enumerate() {
        let doc = fused.entry(key.clone()).or_insert_with(|| blank(body));
        doc.bm25_rank = Some(rank + 1);
        doc.bm25_score = Some(*score);
    }

    fused
}

fn blank(body: &HitBody) -> FusedDocument {
    FusedDocument {
        id: body.id,
        text: body.text.clone(),
        source: body.source.clone(),
        chunk_index: body.chunk_index,
        category: body.category.clone(),
        bm25_rank: None,
        vector_rank: None,
        bm25_score: None,
        vector_score: None,
        fused_score: 0.0,
    }
}

/// Sort descending by fused score (ties by key, deterministic) and cut to
/// `top_k`.
fn finalize(fused: HashMap<FusedKey, FusedDocument>, top_k: usize) -> Vec<FusedDocument> {
    let mut out: Vec<FusedDocument> = fused.into_values().collect();
    out.sort_by(|a, b| {
        b.fused_score
            .partial_cmp(&a.fused_score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| (&a.source, a.chunk_index).cmp(&(&b.source, b.chunk_index)))
    });
    out.truncate(top_k);
    out
}
