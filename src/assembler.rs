//! Token-budgeted context assembly
//!
//! Packs system prompt, recalled memory, RAG results, and conversation
//! history into a bounded context. Token counts are estimated at
//! `len / 4` characters per token, so the per-section budgets are soft;
//! the `optimize` pass enforces the hard ceiling
//! `total − response_reserve` by evicting in priority order: oldest
//! conversation turns first (always keeping two), then halving the RAG
//! block, then halving the memory block.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::brain::RetrievalResult;
use crate::constants::{
    BUDGET_LARGE_TOKENS, BUDGET_STANDARD_TOKENS, CHARS_PER_TOKEN, MEMORY_EVICTION_FLOOR_TOKENS,
    MIN_CONVERSATION_TURNS, RAG_EVICTION_FLOOR_TOKENS, TURN_ROLE_OVERHEAD_TOKENS,
};
use crate::memory::types::MemoryContext;
use crate::router::QueryIntent;

/// Role of a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    User,
    Assistant,
}

/// One turn of conversation history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: TurnRole,
    pub content: String,
}

impl ConversationTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: TurnRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: TurnRole::Assistant,
            content: content.into(),
        }
    }

    /// Token cost of this turn including role-framing overhead.
    pub fn token_cost(&self) -> usize {
        estimate_tokens(&self.content) + TURN_ROLE_OVERHEAD_TOKENS
    }
}

/// Per-section token budget for a total context size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextBudget {
    pub total: usize,
    pub system_prompt: usize,
    pub memory: usize,
    pub rag: usize,
    pub conversation: usize,
    pub response_reserve: usize,
}

impl ContextBudget {
    /// Derive the section budgets for a total context size `total`.
    pub fn for_total(total: usize) -> Self {
        Self {
            total,
            system_prompt: 1000.min(total / 8),
            memory: 500.min(total / 16),
            rag: 4000.min(total / 4),
            conversation: 2000.min(total / 4),
            response_reserve: 2000.min(total / 4),
        }
    }

    /// The default 8k budget.
    pub fn standard() -> Self {
        Self::for_total(BUDGET_STANDARD_TOKENS)
    }

    /// The 32k budget.
    pub fn large() -> Self {
        Self::for_total(BUDGET_LARGE_TOKENS)
    }

    /// Hard ceiling the optimize pass enforces.
    pub fn delivery_ceiling(&self) -> usize {
        self.total.saturating_sub(self.response_reserve)
    }
}

/// Coarse token estimate: `max(1, len/4)`.
pub fn estimate_tokens(text: &str) -> usize {
    (text.len() / CHARS_PER_TOKEN).max(1)
}

/// Clip `text` to `max_tokens`, preferring to end at the last sentence
/// boundary inside the clipped prefix.
pub fn truncate_to_tokens(text: &str, max_tokens: usize) -> String {
    let max_chars = max_tokens * CHARS_PER_TOKEN;
    if text.len() <= max_chars {
        return text.to_string();
    }

    let mut cut = max_chars.min(text.len());
    while cut > 0 && !text.is_char_boundary(cut) {
        cut -= 1;
    }
    let clipped = &text[..cut];

    match clipped.rfind('.') {
        Some(period) => format!("{}\n[truncated]", &clipped[..=period]),
        None => format!("{clipped}… [truncated]"),
    }
}

/// The packed context handed to the prompt builder.
#[derive(Debug, Clone, Default)]
pub struct AssembledContext {
    pub system_prompt: String,
    pub memory_block: Option<String>,
    pub rag_block: Option<String>,
    /// Oldest → newest at delivery time.
    pub conversation: Vec<ConversationTurn>,
    pub estimated_tokens: usize,
}

impl AssembledContext {
    /// Recompute `estimated_tokens` from the current parts.
    pub fn recompute_tokens(&mut self) {
        let mut total = estimate_tokens(&self.system_prompt);
        if let Some(ref block) = self.memory_block {
            total += estimate_tokens(block);
        }
        if let Some(ref block) = self.rag_block {
            total += estimate_tokens(block);
        }
        total += self
            .conversation
            .iter()
            .map(ConversationTurn::token_cost)
            .sum::<usize>();
        self.estimated_tokens = total;
    }
}

/// Stateless packer with stable section priorities.
#[derive(Debug, Default, Clone, Copy)]
pub struct ContextAssembler;

impl ContextAssembler {
    pub fn new() -> Self {
        Self
    }

    /// Assemble a context within the per-section budgets.
    pub fn assemble(
        &self,
        intent: QueryIntent,
        system_prompt: &str,
        memory: Option<&MemoryContext>,
        rag_results: &[RetrievalResult],
        conversation: &[ConversationTurn],
        budget: &ContextBudget,
    ) -> AssembledContext {
        let memory_block = memory.and_then(MemoryContext::format_for_prompt).map(|block| {
            if estimate_tokens(&block) <= budget.memory {
                block
            } else {
                truncate_to_tokens(&block, budget.memory)
            }
        });

        let rag_budget = match intent {
            QueryIntent::Personal => budget.rag,
            QueryIntent::Hybrid => budget.rag / 2,
            _ => 0,
        };
        let rag_block = build_rag_block(rag_results, rag_budget);

        // Walk history newest → oldest, stop at the budget, deliver
        // oldest → newest.
        let mut included: Vec<ConversationTurn> = Vec::new();
        let mut spent = 0usize;
        for turn in conversation.iter().rev() {
            let cost = turn.token_cost();
            if spent + cost > budget.conversation {
                break;
            }
            spent += cost;
            included.push(turn.clone());
        }
        included.reverse();

        let mut context = AssembledContext {
            system_prompt: system_prompt.to_string(),
            memory_block,
            rag_block,
            conversation: included,
            estimated_tokens: 0,
        };
        context.recompute_tokens();

        debug!(
            estimated = context.estimated_tokens,
            turns = context.conversation.len(),
            "context assembled"
        );
        context
    }

    /// Evict until the context fits `total − response_reserve`.
    ///
    /// Preference order: drop the oldest conversation turn (keeping at
    /// least two), halve the RAG block while it exceeds 500 tokens, halve
    /// the memory block while it exceeds 200 tokens. Recomputes after
    /// each cut; stops when within budget or nothing further can go.
    pub fn optimize(&self, context: &mut AssembledContext, budget: &ContextBudget) {
        let ceiling = budget.delivery_ceiling();

        while context.estimated_tokens > ceiling {
            if context.conversation.len() > MIN_CONVERSATION_TURNS {
                context.conversation.remove(0);
                context.recompute_tokens();
                continue;
            }

            let rag_tokens = context
                .rag_block
                .as_deref()
                .map(estimate_tokens)
                .unwrap_or(0);
            if rag_tokens > RAG_EVICTION_FLOOR_TOKENS {
                if let Some(block) = context.rag_block.take() {
                    context.rag_block = Some(truncate_to_tokens(&block, rag_tokens / 2));
                }
                context.recompute_tokens();
                continue;
            }

            let memory_tokens = context
                .memory_block
                .as_deref()
                .map(estimate_tokens)
                .unwrap_or(0);
            if memory_tokens > MEMORY_EVICTION_FLOOR_TOKENS {
                if let Some(block) = context.memory_block.take() {
                    context.memory_block = Some(truncate_to_tokens(&block, memory_tokens / 2));
                }
                context.recompute_tokens();
                continue;
            }

            debug!(
                estimated = context.estimated_tokens,
                ceiling, "nothing further to evict"
            );
            break;
        }
    }
}

/// Build the RAG section: a header, one numbered entry per result, and a
/// truncation tail when the budget cuts the list short.
fn build_rag_block(results: &[RetrievalResult], budget_tokens: usize) -> Option<String> {
    if results.is_empty() || budget_tokens == 0 {
        return None;
    }

    let mut block = String::from("## Relevant information from your documents:\n\n");
    let mut included = 0usize;

    for (i, result) in results.iter().enumerate() {
        let mut entry = format!("[{}] Source: {}\n", i + 1, result.source);
        if !result.entity_context.is_empty() {
            entry.push_str("Related entities: ");
            entry.push_str(&result.entity_context.join(", "));
            entry.push('\n');
        }
        entry.push_str(&result.text);
        entry.push_str("\n\n");

        if estimate_tokens(&block) + estimate_tokens(&entry) > budget_tokens {
            break;
        }
        block.push_str(&entry);
        included += 1;
    }

    if included == 0 {
        return None;
    }

    let remainder = results.len() - included;
    if remainder > 0 {
        block.push_str(&format!(
            "\n[... {remainder} more results truncated for brevity]"
        ));
    }

    Some(block)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hybrid::MatchKind;
    use uuid::Uuid;

    fn rag_result(text: &str, source: &str) -> RetrievalResult {
        RetrievalResult {
            id: Uuid::new_v4(),
            text: text.to_string(),
            source: source.to_string(),
            category: None,
            score: 0.5,
            match_kind: MatchKind::Hybrid,
            entity_context: Vec::new(),
            community_summary: None,
        }
    }

    fn turn_of_tokens(tokens: usize) -> ConversationTurn {
        ConversationTurn::user("w".repeat(tokens * CHARS_PER_TOKEN))
    }

    #[test]
    fn test_token_estimate() {
        assert_eq!(estimate_tokens(""), 1);
        assert_eq!(estimate_tokens("abcd"), 1);
        assert_eq!(estimate_tokens(&"x".repeat(400)), 100);
    }

    #[test]
    fn test_budget_tables() {
        let standard = ContextBudget::standard();
        assert_eq!(standard.total, 8192);
        assert_eq!(standard.system_prompt, 1000);
        assert_eq!(standard.memory, 500);
        assert_eq!(standard.rag, 2048);
        assert_eq!(standard.conversation, 2000);
        assert_eq!(standard.response_reserve, 2000);

        let large = ContextBudget::large();
        assert_eq!(large.rag, 4000);
        assert_eq!(large.memory, 500);
    }

    #[test]
    fn test_truncate_prefers_sentence_boundary() {
        let text = "First sentence. Second sentence. And then a very long tail without end";
        let truncated = truncate_to_tokens(text, 10);
        assert!(truncated.ends_with("\n[truncated]"));
        assert!(truncated.starts_with("First sentence."));

        let no_periods = "word ".repeat(50);
        let truncated = truncate_to_tokens(&no_periods, 5);
        assert!(truncated.ends_with("… [truncated]"));
        assert!(truncated.len() < no_periods.len());
    }

    #[test]
    fn test_truncate_noop_when_fits() {
        assert_eq!(truncate_to_tokens("short", 100), "short");
    }

    #[test]
    fn test_rag_block_formatting() {
        let mut with_entities = rag_result("Meeting with John about the budget", "calendar");
        with_entities.entity_context = vec!["John".to_string(), "Q4 Budget".to_string()];
        let results = vec![with_entities, rag_result("Notes from standup", "notes")];

        let block = build_rag_block(&results, 1000).unwrap();
        assert!(block.starts_with("## Relevant information from your documents:\n\n"));
        assert!(block.contains("[1] Source: calendar"));
        assert!(block.contains("Related entities: John, Q4 Budget"));
        assert!(block.contains("[2] Source: notes"));
        assert!(!block.contains("truncated for brevity"));
    }

    #[test]
    fn test_rag_block_truncation_tail() {
        let results: Vec<RetrievalResult> = (0..10)
            .map(|i| rag_result(&"long text ".repeat(40), &format!("doc{i}")))
            .collect();
        let block = build_rag_block(&results, 250).unwrap();
        assert!(block.contains("more results truncated for brevity"), "{block}");
    }

    #[test]
    fn test_conversation_packing_keeps_newest() {
        let turns: Vec<ConversationTurn> = (0..10)
            .map(|i| ConversationTurn::user(format!("turn {i} {}", "pad ".repeat(200))))
            .collect();

        let assembler = ContextAssembler::new();
        let context = assembler.assemble(
            QueryIntent::General,
            "system",
            None,
            &[],
            &turns,
            &ContextBudget::standard(),
        );

        // Newest turns survive; delivery order is oldest → newest.
        assert!(!context.conversation.is_empty());
        assert!(context.conversation.len() < 10);
        let last = context.conversation.last().unwrap();
        assert!(last.content.starts_with("turn 9"));
        let first = context.conversation.first().unwrap();
        let first_idx: usize = first.content.split_whitespace().nth(1).unwrap().parse().unwrap();
        for (offset, turn) in context.conversation.iter().enumerate() {
            let idx: usize = turn.content.split_whitespace().nth(1).unwrap().parse().unwrap();
            assert_eq!(idx, first_idx + offset, "order must be contiguous oldest→newest");
        }
    }

    #[test]
    fn test_rag_budget_by_intent() {
        let results = vec![rag_result("budget notes", "docs")];
        let assembler = ContextAssembler::new();
        let budget = ContextBudget::standard();

        let personal =
            assembler.assemble(QueryIntent::Personal, "s", None, &results, &[], &budget);
        assert!(personal.rag_block.is_some());

        let general = assembler.assemble(QueryIntent::General, "s", None, &results, &[], &budget);
        assert!(general.rag_block.is_none());

        let memory = assembler.assemble(QueryIntent::Memory, "s", None, &results, &[], &budget);
        assert!(memory.rag_block.is_none());
    }

    #[test]
    fn test_optimize_drops_oldest_turns_first() {
        // E5: system 600 + memory 300 + rag 3800 + 10 turns × 310 = 7800
        // against a 6192 ceiling. Oldest turns go until it fits.
        let budget = ContextBudget::standard();
        let mut context = AssembledContext {
            system_prompt: "s".repeat(600 * CHARS_PER_TOKEN),
            memory_block: Some("m".repeat(300 * CHARS_PER_TOKEN)),
            rag_block: Some("r".repeat(3800 * CHARS_PER_TOKEN)),
            conversation: (0..10).map(|_| turn_of_tokens(300)).collect(),
            estimated_tokens: 0,
        };
        context.recompute_tokens();
        assert_eq!(context.estimated_tokens, 7800);

        ContextAssembler::new().optimize(&mut context, &budget);

        assert!(context.estimated_tokens <= budget.delivery_ceiling());
        assert_eq!(context.conversation.len(), 4, "six oldest turns dropped");
        // RAG untouched: turn-dropping alone was enough.
        assert_eq!(
            context.rag_block.as_ref().map(String::len),
            Some(3800 * CHARS_PER_TOKEN)
        );
    }

    #[test]
    fn test_optimize_halves_rag_when_turns_exhausted() {
        let budget = ContextBudget::for_total(4096);
        let mut context = AssembledContext {
            system_prompt: "s".repeat(500 * CHARS_PER_TOKEN),
            memory_block: None,
            rag_block: Some("r".repeat(3000 * CHARS_PER_TOKEN)),
            conversation: vec![turn_of_tokens(50), turn_of_tokens(50)],
            estimated_tokens: 0,
        };
        context.recompute_tokens();

        ContextAssembler::new().optimize(&mut context, &budget);

        assert!(context.estimated_tokens <= budget.delivery_ceiling());
        assert_eq!(context.conversation.len(), 2, "the last two turns are kept");
        let rag_tokens = estimate_tokens(context.rag_block.as_deref().unwrap());
        assert!(rag_tokens < 3000);
    }

    #[test]
    fn test_optimize_stops_when_nothing_left_to_cut() {
        let budget = ContextBudget::for_total(64);
        let mut context = AssembledContext {
            system_prompt: "s".repeat(400),
            memory_block: None,
            rag_block: None,
            conversation: vec![turn_of_tokens(10), turn_of_tokens(10)],
            estimated_tokens: 0,
        };
        context.recompute_tokens();

        // Must terminate even though the context can never fit.
        ContextAssembler::new().optimize(&mut context, &budget);
        assert_eq!(context.conversation.len(), 2);
    }

    #[test]
    fn test_memory_block_truncated_to_budget() {
        use crate::memory::types::{FactCategory, SemanticMemory};
        use chrono::Utc;

        let memory = MemoryContext {
            facts: (0..200)
                .map(|i| SemanticMemory {
                    id: Uuid::new_v4(),
                    fact: format!("The user fact number {i} with a long body of text"),
                    category: FactCategory::Preference,
                    confidence: 0.7,
                    created_at: Utc::now(),
                    last_accessed: Utc::now(),
                    access_count: 0,
                    embedding: None,
                })
                .collect(),
            ..Default::default()
        };

        let budget = ContextBudget::standard();
        let context = ContextAssembler::new().assemble(
            QueryIntent::Personal,
            "s",
            Some(&memory),
            &[],
            &[],
            &budget,
        );

        let block = context.memory_block.unwrap();
        assert!(estimate_tokens(&block) <= budget.memory + 4, "block must be near budget");
        assert!(block.contains("[truncated]"));
    }
}
