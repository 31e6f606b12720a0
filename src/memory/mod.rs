//! Three-tier memory: semantic facts, episodic interactions, procedural
//! patterns
//!
//! [`UnifiedMemory`] is the sole mutator of its three stores. Recall
//! combines embedding similarity with recency and confidence weighting;
//! extraction turns first-person statements into stored facts;
//! consolidation removes stale low-confidence facts and deduplicates.
//! Each store is one JSON file written atomically on every mutation, and
//! a corrupt file degrades to an empty store at load time.

pub mod extraction;
pub mod types;

use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::constants::{
    CONSOLIDATION_ACCESS_KEEP, CONSOLIDATION_CONFIDENCE_KEEP, CONSOLIDATION_MAX_IDLE_DAYS,
    DEFAULT_MAX_EPISODES, DEFAULT_MAX_FACTS, EPISODE_SUMMARY_CHARS, EPISODIC_CAPACITY,
    EPISODIC_RECALL_THRESHOLD, EXTRACTED_FACT_CONFIDENCE, HELPFUL_EPISODE_BOOST,
    QUERY_CACHE_CAPACITY, RECENCY_FLOOR, RECENCY_SCALE, RECENCY_TAU_DAYS,
    SEMANTIC_RECALL_THRESHOLD,
};
use crate::embedder::Embedder;
use crate::errors::Result;
use crate::memory::extraction::extract_facts;
use crate::memory::types::{
    EpisodicMemory, MemoryContext, ProceduralMemory, SemanticMemory,
};
use crate::persistence::{load_json_or_default, save_json_atomic};
use crate::similarity::cosine_similarity;

const SEMANTIC_FILE: &str = "semantic.json";
const EPISODIC_FILE: &str = "episodic.json";
const PROCEDURAL_FILE: &str = "procedural.json";

/// The unified three-tier memory store.
pub struct UnifiedMemory {
    semantic: Vec<SemanticMemory>,
    /// Oldest first; eviction pops from the front.
    episodic: Vec<EpisodicMemory>,
    procedural: Vec<ProceduralMemory>,

    embedder: Arc<dyn Embedder>,
    memory_dir: PathBuf,

    /// Query-embedding cache keyed by `Sha256(query)`. Stable across
    /// restarts, LRU bounded.
    query_cache: moka::sync::Cache<[u8; 32], Vec<f32>>,
}

impl UnifiedMemory {
    /// Open the memory stores under `memory_dir`, degrading any corrupt
    /// or missing file to an empty store.
    pub fn open(memory_dir: impl Into<PathBuf>, embedder: Arc<dyn Embedder>) -> Self {
        let memory_dir = memory_dir.into();

        let semantic: Vec<SemanticMemory> =
            load_json_or_default(&memory_dir.join(SEMANTIC_FILE));
        let episodic: Vec<EpisodicMemory> =
            load_json_or_default(&memory_dir.join(EPISODIC_FILE));
        let procedural: Vec<ProceduralMemory> =
            load_json_or_default(&memory_dir.join(PROCEDURAL_FILE));

        debug!(
            facts = semantic.len(),
            episodes = episodic.len(),
            rules = procedural.len(),
            "memory stores opened"
        );

        Self {
            semantic,
            episodic,
            procedural,
            embedder,
            memory_dir,
            query_cache: moka::sync::Cache::new(QUERY_CACHE_CAPACITY),
        }
    }

    /// Recall memories relevant to a query.
    ///
    /// Semantic facts are scored
    /// `cos · (0.7 + 0.3·e^(−days_since_access/30)) · confidence` and kept
    /// above 0.5; episodes are scored `cos · 1.2-if-helpful` and kept
    /// above 0.6; procedural rules match by trigger substring and sort by
    /// success rate. Returned facts get their access count bumped and
    /// last-access refreshed.
    pub async fn recall(
        &mut self,
        query: &str,
        max_facts: usize,
        max_episodes: usize,
    ) -> MemoryContext {
        let query_embedding = self.embed_query(query).await;
        let now = Utc::now();

        let mut facts: Vec<(f32, usize)> = Vec::new();
        if let Some(ref q) = query_embedding {
            for (idx, memory) in self.semantic.iter().enumerate() {
                let Some(ref embedding) = memory.embedding else {
                    continue;
                };
                let days = (now - memory.last_accessed).num_seconds() as f64 / 86_400.0;
                let recency =
                    RECENCY_FLOOR + RECENCY_SCALE * (-days / RECENCY_TAU_DAYS).exp() as f32;
                let score = cosine_similarity(q, embedding) * recency * memory.confidence;
                if score > SEMANTIC_RECALL_THRESHOLD {
                    facts.push((score, idx));
                }
            }
        }
        facts.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        facts.truncate(max_facts);

        let mut recalled_facts = Vec::with_capacity(facts.len());
        for (_, idx) in &facts {
            let memory = &mut self.semantic[*idx];
            memory.access_count += 1;
            memory.last_accessed = now;
            recalled_facts.push(memory.clone());
        }
        if !facts.is_empty() {
            if let Err(e) = self.save_semantic() {
                warn!(error = %e, "failed to persist access bumps");
            }
        }

        let mut episodes: Vec<(f32, &EpisodicMemory)> = Vec::new();
        if let Some(ref q) = query_embedding {
            for memory in &self.episodic {
                let Some(ref embedding) = memory.embedding else {
                    continue;
                };
                let boost = if memory.was_helpful == Some(true) {
                    HELPFUL_EPISODE_BOOST
                } else {
                    1.0
                };
                let score = cosine_similarity(q, embedding) * boost;
                if score > EPISODIC_RECALL_THRESHOLD {
                    episodes.push((score, memory));
                }
            }
        }
        episodes.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        let recalled_episodes: Vec<EpisodicMemory> = episodes
            .into_iter()
            .take(max_episodes)
            .map(|(_, m)| m.clone())
            .collect();

        let query_lower = query.to_lowercase();
        let mut behaviors: Vec<ProceduralMemory> = self
            .procedural
            .iter()
            .filter(|rule| trigger_matches(&rule.trigger, &query_lower))
            .cloned()
            .collect();
        behaviors.sort_by(|a, b| {
            b.success_rate
                .partial_cmp(&a.success_rate)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        debug!(
            facts = recalled_facts.len(),
            episodes = recalled_episodes.len(),
            behaviors = behaviors.len(),
            "memory recall"
        );

        MemoryContext {
            facts: recalled_facts,
            episodes: recalled_episodes,
            behaviors,
        }
    }

    /// Recall with the default fact/episode limits.
    pub async fn recall_default(&mut self, query: &str) -> MemoryContext {
        self.recall(query, DEFAULT_MAX_FACTS, DEFAULT_MAX_EPISODES).await
    }

    /// Learn from a completed turn: extract semantic facts from the user
    /// query and append an episodic record of the interaction.
    pub async fn process_interaction(
        &mut self,
        user_query: &str,
        assistant_response: &str,
        was_helpful: Option<bool>,
    ) -> Result<()> {
        let now = Utc::now();
        let mut semantic_dirty = false;

        for (fact, category) in extract_facts(user_query) {
            let fact_lower = fact.to_lowercase();
            if self
                .semantic
                .iter()
                .any(|m| m.fact.to_lowercase() == fact_lower)
            {
                continue;
            }

            let embedding = match self.embedder.encode(&fact).await {
                Ok(v) => Some(v),
                Err(e) => {
                    warn!(error = %e, "fact embedding failed, storing without");
                    None
                }
            };

            debug!(category = ?category, "extracted semantic fact");
            self.semantic.push(SemanticMemory {
                id: Uuid::new_v4(),
                fact,
                category,
                confidence: EXTRACTED_FACT_CONFIDENCE,
                created_at: now,
                last_accessed: now,
                access_count: 0,
                embedding,
            });
            semantic_dirty = true;
        }

        let summary: String = assistant_response
            .chars()
            .take(EPISODE_SUMMARY_CHARS)
            .collect();
        let embedding = self.embed_query(user_query).await;

        self.episodic.push(EpisodicMemory {
            id: Uuid::new_v4(),
            query: user_query.to_string(),
            response_summary: summary,
            was_helpful,
            context_tag: "conversation".to_string(),
            timestamp: now,
            embedding,
        });
        if self.episodic.len() > EPISODIC_CAPACITY {
            let overflow = self.episodic.len() - EPISODIC_CAPACITY;
            self.episodic.drain(..overflow);
        }

        if semantic_dirty {
            self.save_semantic()?;
        }
        self.save_episodic()?;
        Ok(())
    }

    /// Drop stale low-confidence facts and deduplicate by fact text.
    ///
    /// Returns the number of facts removed.
    pub fn consolidate(&mut self) -> Result<usize> {
        let now = Utc::now();
        let before = self.semantic.len();

        self.semantic.retain(|memory| {
            let idle_days = (now - memory.last_accessed).num_days();
            !(idle_days > CONSOLIDATION_MAX_IDLE_DAYS
                && memory.confidence < CONSOLIDATION_CONFIDENCE_KEEP
                && memory.access_count <= CONSOLIDATION_ACCESS_KEEP)
        });

        let mut seen = std::collections::HashSet::new();
        self.semantic
            .retain(|memory| seen.insert(memory.fact.trim().to_lowercase()));

        let removed = before - self.semantic.len();
        if removed > 0 {
            debug!(removed, remaining = self.semantic.len(), "consolidated semantic memory");
            self.save_semantic()?;
        }
        Ok(removed)
    }

    /// Install a procedural rule.
    pub fn add_procedural(&mut self, rule: ProceduralMemory) -> Result<()> {
        self.procedural.push(rule);
        self.save_procedural()
    }

    pub fn semantic_count(&self) -> usize {
        self.semantic.len()
    }

    pub fn episodic_count(&self) -> usize {
        self.episodic.len()
    }

    pub fn procedural_count(&self) -> usize {
        self.procedural.len()
    }

    /// Direct read access to the semantic store (tests and inspection).
    pub fn semantic_memories(&self) -> &[SemanticMemory] {
        &self.semantic
    }

    /// Embed a query through the bounded cache.
    async fn embed_query(&self, query: &str) -> Option<Vec<f32>> {
        let key: [u8; 32] = Sha256::digest(query.as_bytes()).into();
        if let Some(cached) = self.query_cache.get(&key) {
            return Some(cached);
        }
        match self.embedder.encode(query).await {
            Ok(embedding) => {
                self.query_cache.insert(key, embedding.clone());
                Some(embedding)
            }
            Err(e) => {
                warn!(error = %e, "query embedding failed, skipping similarity recall");
                None
            }
        }
    }

    fn save_semantic(&self) -> Result<()> {
        save_json_atomic(&self.memory_dir.join(SEMANTIC_FILE), &self.semantic)
    }

    fn save_episodic(&self) -> Result<()> {
        save_json_atomic(&self.memory_dir.join(EPISODIC_FILE), &self.episodic)
    }

    fn save_procedural(&self) -> Result<()> {
        save_json_atomic(&self.memory_dir.join(PROCEDURAL_FILE), &self.procedural)
    }
}

/// Trigger matches when the whole lowercased trigger is a substring of
/// the query, or any whitespace-split trigger token is.
fn trigger_matches(trigger: &str, query_lower: &str) -> bool {
    let trigger_lower = trigger.to_lowercase();
    if query_lower.contains(&trigger_lower) {
        return true;
    }
    trigger_lower
        .split_whitespace()
        .any(|token| query_lower.contains(token))
}
