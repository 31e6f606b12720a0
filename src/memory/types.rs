//! Type definitions for the three-tier memory store

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::constants::EPISODE_QUOTE_CHARS;

/// Category of a semantic fact about the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FactCategory {
    Preference,
    PersonalInfo,
    Relationship,
    Opinion,
    Behavior,
}

/// A durable fact about the user, embedding-indexed and
/// confidence-weighted.
///
/// Lifecycle: created by extraction from user turns, decayed on
/// consolidation, removed when confidence < 0.9 AND access_count ≤ 5 AND
/// last access older than 90 days.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SemanticMemory {
    pub id: Uuid,
    pub fact: String,
    pub category: FactCategory,
    /// Confidence in [0, 1].
    pub confidence: f32,
    pub created_at: DateTime<Utc>,
    pub last_accessed: DateTime<Utc>,
    pub access_count: u32,
    /// Absent embeddings are skipped during embedding-based recall.
    pub embedding: Option<Vec<f32>>,
}

/// A record of one past user turn and a summary of the response.
/// The store is capacity-bounded; oldest records are evicted first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpisodicMemory {
    pub id: Uuid,
    pub query: String,
    /// At most 200 characters of the assistant response.
    pub response_summary: String,
    pub was_helpful: Option<bool>,
    pub context_tag: String,
    pub timestamp: DateTime<Utc>,
    pub embedding: Option<Vec<f32>>,
}

/// A trigger → behavior rule, matched by lowercase substring on the
/// trigger or any of its whitespace-split tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProceduralMemory {
    pub id: Uuid,
    pub trigger: String,
    pub behavior: String,
    pub example_queries: Vec<String>,
    /// Success rate in [0, 1].
    pub success_rate: f32,
    pub created_at: DateTime<Utc>,
}

/// What recall produced for a query: facts, similar episodes, and
/// applicable behavior rules.
#[derive(Debug, Clone, Default)]
pub struct MemoryContext {
    pub facts: Vec<SemanticMemory>,
    pub episodes: Vec<EpisodicMemory>,
    pub behaviors: Vec<ProceduralMemory>,
}

impl MemoryContext {
    pub fn is_empty(&self) -> bool {
        self.facts.is_empty() && self.episodes.is_empty() && self.behaviors.is_empty()
    }

    /// Render the recalled memory as a prompt block.
    ///
    /// Returns `None` when all three lists are empty.
    pub fn format_for_prompt(&self) -> Option<String> {
        if self.is_empty() {
            return None;
        }

        let mut sections: Vec<String> = Vec::new();

        if !self.facts.is_empty() {
            let mut block = String::from("## Known facts about the user:\n");
            for fact in &self.facts {
                block.push_str("- ");
                block.push_str(&fact.fact);
                block.push('\n');
            }
            sections.push(block);
        }

        if !self.episodes.is_empty() {
            let mut block = String::from("## Similar past interactions:\n");
            for episode in self.episodes.iter().take(3) {
                let quoted: String = episode.query.chars().take(EPISODE_QUOTE_CHARS).collect();
                block.push_str("- \"");
                block.push_str(&quoted);
                block.push('"');
                if episode.was_helpful == Some(true) {
                    block.push_str(" (worked well)");
                }
                block.push('\n');
            }
            sections.push(block);
        }

        if !self.behaviors.is_empty() {
            let mut block = String::from("## User preferences for this type of request:\n");
            for rule in &self.behaviors {
                block.push_str("- ");
                block.push_str(&rule.behavior);
                block.push('\n');
            }
            sections.push(block);
        }

        Some(sections.join("\n"))
    }
}
