//! Knowledge graph model and retrieval-time expansion
//!
//! The graph is produced by an external builder and consumed read-only
//! here. Entities and relationships are flat tables keyed by stable string
//! identifiers; relationship endpoints are id pairs, never embedded
//! references. The derived chunk→entities index and the adjacency map are
//! built once when the graph is attached.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::brain::RetrievalResult;
use crate::constants::COMMUNITY_SUMMARY_TOP_CHUNKS;
use crate::similarity::cosine_similarity;

/// Entity node: a person, place, project, or concept mentioned in chunks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphEntity {
    pub id: String,
    pub name: String,
    pub entity_type: String,
    pub description: String,
    /// Fingerprints of the chunks where this entity is mentioned.
    pub chunk_ids: Vec<Uuid>,
}

/// Undirected relationship between two entities. Both endpoints must
/// exist in the entity table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphRelationship {
    pub from_entity: String,
    pub to_entity: String,
    /// Strength in [0, 1].
    pub strength: f32,
}

/// A detected community of related entities with a prepared summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphCommunity {
    pub id: String,
    pub level: u32,
    pub member_entities: Vec<String>,
    pub title: String,
    pub summary: String,
    pub embedding: Option<Vec<f32>>,
}

/// Read-only knowledge graph handle with derived lookup tables.
#[derive(Debug, Default)]
pub struct KnowledgeGraph {
    entities: HashMap<String, GraphEntity>,
    communities: Vec<GraphCommunity>,
    relationship_count: usize,

    /// chunk fingerprint → entity ids mentioned in that chunk.
    chunk_entities: HashMap<Uuid, Vec<String>>,

    /// entity id → 1-hop neighbor entity ids, in relationship order.
    adjacency: HashMap<String, Vec<String>>,
}

impl KnowledgeGraph {
    /// Build the derived indices from the flat tables.
    pub fn new(
        entities: Vec<GraphEntity>,
        relationships: Vec<GraphRelationship>,
        communities: Vec<GraphCommunity>,
    ) -> Self {
        let mut chunk_entities: HashMap<Uuid, Vec<String>> = HashMap::new();
        for entity in &entities {
            for chunk_id in &entity.chunk_ids {
                chunk_entities
                    .entry(*chunk_id)
                    .or_default()
                    .push(entity.id.clone());
            }
        }

        let mut adjacency: HashMap<String, Vec<String>> = HashMap::new();
        for rel in &relationships {
            adjacency
                .entry(rel.from_entity.clone())
                .or_default()
                .push(rel.to_entity.clone());
            adjacency
                .entry(rel.to_entity.clone())
                .or_default()
                .push(rel.from_entity.clone());
        }

        let entities: HashMap<String, GraphEntity> =
            entities.into_iter().map(|e| (e.id.clone(), e)).collect();

        debug!(
            entities = entities.len(),
            relationships = relationships.len(),
            communities = communities.len(),
            "knowledge graph attached"
        );

        Self {
            entities,
            communities,
            relationship_count: relationships.len(),
            chunk_entities,
            adjacency,
        }
    }

    pub fn entity(&self, id: &str) -> Option<&GraphEntity> {
        self.entities.get(id)
    }

    /// Entity ids mentioned in the given chunk.
    pub fn entities_in_chunk(&self, chunk_id: &Uuid) -> &[String] {
        self.chunk_entities
            .get(chunk_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// 1-hop neighbors of an entity.
    pub fn neighbors(&self, entity_id: &str) -> &[String] {
        self.adjacency
            .get(entity_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn communities(&self) -> &[GraphCommunity] {
        &self.communities
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    pub fn relationship_count(&self) -> usize {
        self.relationship_count
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

/// Retrieval-time expansion over an attached graph.
///
/// Annotates results with entity names and a community summary, and when
/// the result list is short, pulls in chunks reachable through the 1-hop
/// neighborhood of the touched entities. Traversal depth is fixed at one
/// hop.
#[derive(Debug, Default, Clone, Copy)]
pub struct GraphExpander;

impl GraphExpander {
    pub fn new() -> Self {
        Self
    }

    /// Expand `results` in place and return them.
    ///
    /// `make_result` projects a chunk fingerprint into a graph-expanded
    /// retrieval result (the caller owns chunk text, category, and the
    /// best-known vector score for the chunk).
    pub fn expand<F>(
        &self,
        query_embedding: Option<&[f32]>,
        mut results: Vec<RetrievalResult>,
        graph: &KnowledgeGraph,
        max_results: usize,
        make_result: F,
    ) -> Vec<RetrievalResult>
    where
        F: Fn(&Uuid) -> Option<RetrievalResult>,
    {
        if graph.is_empty() || results.is_empty() {
            return results;
        }

        // 1–2. Attach entity names per chunk.
        let mut touched: Vec<String> = Vec::new();
        let mut touched_set: HashSet<&str> = HashSet::new();
        for result in &mut results {
            let entity_ids = graph.entities_in_chunk(&result.id);
            for entity_id in entity_ids {
                if let Some(entity) = graph.entity(entity_id) {
                    result.entity_context.push(entity.name.clone());
                }
            }
            for entity_id in entity_ids {
                if !touched.contains(entity_id) {
                    touched.push(entity_id.clone());
                }
            }
        }
        for id in &touched {
            touched_set.insert(id.as_str());
        }

        if touched.is_empty() {
            return results;
        }

        // 3. Pick the most relevant community among those intersecting
        // the touched entities: by query-embedding similarity when both
        // embeddings exist, by overlap size otherwise.
        let best_community = graph
            .communities()
            .iter()
            .filter_map(|community| {
                let overlap = community
                    .member_entities
                    .iter()
                    .filter(|m| touched_set.contains(m.as_str()))
                    .count();
                if overlap == 0 {
                    return None;
                }
                let similarity = match (query_embedding, community.embedding.as_deref()) {
                    (Some(q), Some(e)) => cosine_similarity(q, e),
                    _ => 0.0,
                };
                Some((community, similarity, overlap))
            })
            .max_by(|a, b| {
                a.1.partial_cmp(&b.1)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then(a.2.cmp(&b.2))
            });

        if let Some((community, _, _)) = best_community {
            let members: HashSet<&str> =
                community.member_entities.iter().map(String::as_str).collect();
            let mut attached = 0;
            for result in results.iter_mut() {
                if attached == COMMUNITY_SUMMARY_TOP_CHUNKS {
                    break;
                }
                let in_community = graph
                    .entities_in_chunk(&result.id)
                    .iter()
                    .any(|e| members.contains(e.as_str()));
                if in_community {
                    result.community_summary = Some(community.summary.clone());
                    attached += 1;
                }
            }
        }

        // 4. 1-hop neighborhood pull when the list is short.
        if results.len() < max_results {
            let mut seen: HashSet<Uuid> = results.iter().map(|r| r.id).collect();

            'outer: for entity_id in &touched {
                for neighbor_id in graph.neighbors(entity_id) {
                    let Some(neighbor) = graph.entity(neighbor_id) else {
                        continue;
                    };
                    for chunk_id in &neighbor.chunk_ids {
                        if !seen.insert(*chunk_id) {
                            continue;
                        }
                        if let Some(result) = make_result(chunk_id) {
                            results.push(result);
                            if results.len() >= max_results {
                                break 'outer;
                            }
                        }
                    }
                }
            }
        }

        results
    }
}
