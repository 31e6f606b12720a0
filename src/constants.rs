//! Documented constants for the retrieval brain
//!
//! All tunable parameters in one place. Centralizing constants prevents
//! magic numbers at use sites and keeps the scoring contracts auditable.

// =============================================================================
// BM25 SCORING
// =============================================================================

/// Okapi BM25 term-frequency saturation parameter.
///
/// Controls how quickly repeated occurrences of a term stop adding score.
/// 1.5 sits in the classic 1.2–2.0 range used by Lucene-family engines.
pub const BM25_K1: f64 = 1.5;

/// Okapi BM25 length-normalization parameter.
///
/// 0.0 disables length normalization, 1.0 applies it fully. 0.75 is the
/// standard default: long chunks are penalized without being drowned.
pub const BM25_B: f64 = 0.75;

// =============================================================================
// HYBRID FUSION
// =============================================================================

/// Reciprocal Rank Fusion constant K.
///
/// Fused score is `Σ 1/(K + rank)` over the lists a document appears in,
/// rank 1-based. 60 is the value from the original RRF paper; higher K
/// flattens the difference between adjacent ranks.
pub const RRF_K: f64 = 60.0;

/// Candidate multiplier for each sub-search in hybrid retrieval.
///
/// Both BM25 and vector search are issued for `CANDIDATE_FACTOR * top_k`
/// candidates so fusion has enough overlap to reorder.
pub const CANDIDATE_FACTOR: usize = 2;

// =============================================================================
// SIMILARITY THRESHOLDS
// Scores are cosine similarities normalized to [0, 1].
// =============================================================================

/// Default minimum similarity for vector-index search.
pub const VECTOR_SCORE_THRESHOLD: f32 = 0.4;

/// Minimum combined score for a semantic fact to be recalled.
pub const SEMANTIC_RECALL_THRESHOLD: f32 = 0.5;

/// Minimum combined score for an episodic memory to be recalled.
pub const EPISODIC_RECALL_THRESHOLD: f32 = 0.6;

// =============================================================================
// MEMORY SCORING & LIFECYCLE
// =============================================================================

/// Floor component of the recency multiplier for semantic facts.
///
/// Recall weight is `RECENCY_FLOOR + RECENCY_SCALE * e^(-days/τ)`: a fact
/// untouched for months still keeps 70% of its similarity-driven score.
pub const RECENCY_FLOOR: f32 = 0.7;

/// Scaled component of the recency multiplier for semantic facts.
pub const RECENCY_SCALE: f32 = 0.3;

/// Time constant τ (days) of the recency exponential.
///
/// A fact last accessed 30 days ago contributes `e^-1 ≈ 0.37` of the
/// scaled component.
pub const RECENCY_TAU_DAYS: f64 = 30.0;

/// Score multiplier for episodes the user confirmed were helpful.
pub const HELPFUL_EPISODE_BOOST: f32 = 1.2;

/// Confidence assigned to facts extracted from user turns.
///
/// Pattern-matched extraction is below explicit-statement confidence;
/// consolidation can still remove these if they go unused.
pub const EXTRACTED_FACT_CONFIDENCE: f32 = 0.7;

/// Minimum length (chars) for an extracted fact to be stored.
pub const FACT_MIN_CHARS: usize = 15;

/// Maximum length (chars) for an extracted fact to be stored.
pub const FACT_MAX_CHARS: usize = 300;

/// Maximum episodic memories retained; oldest are evicted beyond this.
pub const EPISODIC_CAPACITY: usize = 500;

/// Response summary stored with each episode is clipped to this length.
pub const EPISODE_SUMMARY_CHARS: usize = 200;

/// Characters of the past query quoted when formatting episodes for the
/// prompt.
pub const EPISODE_QUOTE_CHARS: usize = 80;

/// Semantic facts idle longer than this (by last access) are candidates
/// for consolidation removal.
pub const CONSOLIDATION_MAX_IDLE_DAYS: i64 = 90;

/// Facts at or above this confidence survive consolidation regardless of
/// idle time.
pub const CONSOLIDATION_CONFIDENCE_KEEP: f32 = 0.9;

/// Facts accessed more than this many times survive consolidation
/// regardless of idle time.
pub const CONSOLIDATION_ACCESS_KEEP: u32 = 5;

/// Default number of facts returned by recall.
pub const DEFAULT_MAX_FACTS: usize = 5;

/// Default number of episodes returned by recall.
pub const DEFAULT_MAX_EPISODES: usize = 3;

/// Query-embedding cache capacity (entries).
///
/// 384-dim f32 embeddings are ~1.5KB each, so 10k entries bounds the
/// cache to roughly 15MB.
pub const QUERY_CACHE_CAPACITY: u64 = 10_000;

// =============================================================================
// CHUNKING
// =============================================================================

/// Default chunk target size in characters, sentence-aligned.
pub const DEFAULT_CHUNK_SIZE: usize = 400;

// =============================================================================
// CONTEXT BUDGET
// Token estimation is `len / CHARS_PER_TOKEN`; per-section budgets are
// soft and the optimize pass enforces the `total - response_reserve`
// ceiling.
// =============================================================================

/// Approximate characters per language-model token.
pub const CHARS_PER_TOKEN: usize = 4;

/// Standard total context size in tokens.
pub const BUDGET_STANDARD_TOKENS: usize = 8192;

/// Large total context size in tokens.
pub const BUDGET_LARGE_TOKENS: usize = 32_768;

/// Per-turn token overhead for role framing in conversation history.
pub const TURN_ROLE_OVERHEAD_TOKENS: usize = 10;

/// Conversation turns the eviction pass must always keep.
pub const MIN_CONVERSATION_TURNS: usize = 2;

/// RAG block is only halved during eviction while larger than this.
pub const RAG_EVICTION_FLOOR_TOKENS: usize = 500;

/// Memory block is only halved during eviction while larger than this.
pub const MEMORY_EVICTION_FLOOR_TOKENS: usize = 200;

// =============================================================================
// ROUTER
// =============================================================================

/// Confidence reported when no intent keyword matches at all.
pub const ROUTER_FALLBACK_CONFIDENCE: f32 = 0.5;

/// Confidence bonus for two or more keyword matches.
pub const ROUTER_STRONG_BONUS: f32 = 0.3;

/// Confidence bonus for a single keyword match.
pub const ROUTER_WEAK_BONUS: f32 = 0.2;

/// Upper bound on router confidence.
pub const ROUTER_CONFIDENCE_CAP: f32 = 0.95;

/// Max results for a full-depth (personal) retrieval strategy.
pub const STRATEGY_PERSONAL_MAX_RESULTS: usize = 10;

/// Max results for a light-depth (hybrid) retrieval strategy.
pub const STRATEGY_HYBRID_MAX_RESULTS: usize = 3;

// =============================================================================
// GRAPH EXPANSION
// =============================================================================

/// Community summaries are attached to at most this many top chunks.
pub const COMMUNITY_SUMMARY_TOP_CHUNKS: usize = 3;

// =============================================================================
// WEB SEARCH
// =============================================================================

/// Web results requested for a hybrid-intent query.
pub const WEB_RESULTS_HYBRID: usize = 3;

/// Web results requested for a personal-intent query.
pub const WEB_RESULTS_PERSONAL: usize = 2;
