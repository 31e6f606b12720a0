//! Top-level integration: one call from user query to prompt-ready text
//!
//! Composes the router, knowledge brain, unified memory, and context
//! assembler into [`BrainIntegration::process_message`]. The emitted text
//! follows the citation wire format the downstream model is instructed
//! by: a fixed preamble, then the present sections separated by `---`.
//! Optional stages (web search, graph expansion, embeddings) degrade
//! silently; a partial context always beats a failure.

use std::sync::Arc;

use anyhow::Result as AnyResult;
use async_trait::async_trait;
use tracing::{debug, warn};

use crate::assembler::{AssembledContext, ContextAssembler, ContextBudget, ConversationTurn};
use crate::brain::{KnowledgeBrain, RetrievalResult};
use crate::constants::{WEB_RESULTS_HYBRID, WEB_RESULTS_PERSONAL};
use crate::memory::UnifiedMemory;
use crate::router::QueryIntent;

/// The citation preamble sent ahead of any context sections. Wording is
/// load-bearing: the downstream model emits citation markers based on it.
const CONTEXT_PREAMBLE: &str = "Below is information that may or may not be relevant to my request.\n\
\n\
When multiple sources provide correct, but conflicting information, ALWAYS use sources from files, not websites.\n\
\n\
If your response uses information from provided sources, your response MUST be directly followed with a single exhaustive LIST OF FILEPATHS AND URLS of ALL referenced sources, in the format [{\"url\": \"/path/to/file.pdf\"}, {\"url\": \"https://website.com\"}]\n\
\n\
If no sources were provided or used, DO NOT mention sources in your response.";

/// One web search hit from the external fetcher.
#[derive(Debug, Clone)]
pub struct WebResult {
    pub text: String,
    pub source: String,
}

/// External web search capability.
#[async_trait]
pub trait WebSearch: Send + Sync {
    async fn search(&self, query: &str, count: usize) -> AnyResult<Vec<WebResult>>;
}

/// A file the user attached to this turn, already extracted to text.
#[derive(Debug, Clone)]
pub struct TemporarySource {
    pub path: String,
    pub content: String,
}

/// The composed engine.
pub struct BrainIntegration {
    brain: KnowledgeBrain,
    memory: UnifiedMemory,
    assembler: ContextAssembler,
    web_search: Option<Arc<dyn WebSearch>>,
    system_prompt: String,
    budget: ContextBudget,
    conversation: Vec<ConversationTurn>,
}

impl BrainIntegration {
    pub fn new(
        brain: KnowledgeBrain,
        memory: UnifiedMemory,
        web_search: Option<Arc<dyn WebSearch>>,
        system_prompt: impl Into<String>,
        budget: ContextBudget,
    ) -> Self {
        Self {
            brain,
            memory,
            assembler: ContextAssembler::new(),
            web_search,
            system_prompt: system_prompt.into(),
            budget,
            conversation: Vec::new(),
        }
    }

    /// Process one user turn into `(augmented_text, source_count)`.
    ///
    /// `source_count == 0` means no context was added, which the
    /// downstream model cannot distinguish from "nothing relevant".
    pub async fn process_message(
        &mut self,
        query: &str,
        use_web_search: bool,
        temporary_sources: &[TemporarySource],
    ) -> (String, usize) {
        if !self.brain.config().use_unified_brain {
            return (query.to_string(), 0);
        }

        let strategy = self.brain.route(query);
        debug!(intent = ?strategy.intent, confidence = strategy.confidence, "routed query");

        let memory_context = if self.brain.config().use_memory && strategy.use_memory {
            Some(self.memory.recall_default(query).await)
        } else {
            None
        };

        let rag_results: Vec<RetrievalResult> = if strategy.use_rag {
            self.brain
                .retrieve(query, strategy.max_results, None)
                .await
        } else {
            Vec::new()
        };

        let web_results = if use_web_search {
            self.fetch_web_results(query, strategy.intent).await
        } else {
            Vec::new()
        };

        let mut context = self.assembler.assemble(
            strategy.intent,
            &self.system_prompt,
            memory_context.as_ref(),
            &rag_results,
            &self.conversation,
            &self.budget,
        );
        self.assembler.optimize(&mut context, &self.budget);

        let source_count = rag_results.len() + web_results.len() + temporary_sources.len();
        let augmented = render_prompt(query, &context, &web_results, temporary_sources);

        (augmented, source_count)
    }

    /// Feed the completed turn back into memory and history. Memory
    /// failures are logged and never affect the prompt already returned.
    pub async fn record_reply(&mut self, query: &str, reply: &str) {
        if self.brain.config().use_memory {
            if let Err(e) = self.memory.process_interaction(query, reply, None).await {
                warn!(error = %e, "failed to record interaction in memory");
            }
        }
        self.conversation.push(ConversationTurn::user(query));
        self.conversation.push(ConversationTurn::assistant(reply));
    }

    /// Web search for personal/hybrid intents only; failures degrade to
    /// no web section.
    async fn fetch_web_results(&self, query: &str, intent: QueryIntent) -> Vec<WebResult> {
        let count = match intent {
            QueryIntent::Personal => WEB_RESULTS_PERSONAL,
            QueryIntent::Hybrid => WEB_RESULTS_HYBRID,
            _ => return Vec::new(),
        };
        let Some(web) = self.web_search.as_deref() else {
            return Vec::new();
        };
        match web.search(query, count).await {
            Ok(results) => results,
            Err(e) => {
                warn!(error = %e, "web search failed, continuing without");
                Vec::new()
            }
        }
    }

    /// Mutable access to the owned brain (ingestion, graph attach).
    pub fn brain_mut(&mut self) -> &mut KnowledgeBrain {
        &mut self.brain
    }

    pub fn brain(&self) -> &KnowledgeBrain {
        &self.brain
    }

    /// Mutable access to the owned memory (consolidation, rules).
    pub fn memory_mut(&mut self) -> &mut UnifiedMemory {
        &mut self.memory
    }
}

/// Render the final wire format: query, preamble, then the present
/// sections separated by `---`. With no sections, the output is the
/// query followed by exactly one blank line.
fn render_prompt(
    query: &str,
    context: &AssembledContext,
    web_results: &[WebResult],
    temporary_sources: &[TemporarySource],
) -> String {
    let mut sections: Vec<String> = Vec::new();

    if let Some(ref block) = context.memory_block {
        sections.push(block.trim_end().to_string());
    }
    if let Some(ref block) = context.rag_block {
        sections.push(block.trim_end().to_string());
    }
    if !web_results.is_empty() {
        let mut block = String::from("## Web search results:\n");
        for (i, result) in web_results.iter().enumerate() {
            block.push_str(&format!("\n[{}] Source: {}\n{}\n", i + 1, result.source, result.text));
        }
        sections.push(block.trim_end().to_string());
    }
    if !temporary_sources.is_empty() {
        let mut block = String::from("## Content from provided files:\n");
        for source in temporary_sources {
            block.push_str(&format!("\n[{}]\n{}\n", source.path, source.content));
        }
        sections.push(block.trim_end().to_string());
    }

    if sections.is_empty() {
        return format!("{query}\n\n");
    }

    let body = sections.join("\n\n---\n\n");
    format!("{query}\n\n{CONTEXT_PREAMBLE}\n\n{body}\n")
}
