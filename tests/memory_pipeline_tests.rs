//! Memory extraction and recall scenarios across turns

mod common;

use smriti_brain::{
    BrainConfig, BrainIntegration, ContextBudget, FactCategory, KnowledgeBrain, UnifiedMemory,
};

use common::{constant_embedder, keyword_vector_index};

fn integration(dir: &std::path::Path) -> BrainIntegration {
    let config = BrainConfig::rooted_at(dir);
    let brain = KnowledgeBrain::open(
        config.clone(),
        keyword_vector_index(),
        Some(constant_embedder()),
    );
    let memory = UnifiedMemory::open(&config.memory_dir, constant_embedder());
    BrainIntegration::new(brain, memory, None, "system", ContextBudget::standard())
}

#[tokio::test]
async fn preference_extracted_then_recalled_next_day() {
    let dir = tempfile::tempdir().unwrap();
    let mut engine = integration(dir.path());

    // Turn 1: the user states a preference; the reply is recorded.
    let (_, _) = engine
        .process_message("I prefer tea over coffee in the morning.", false, &[])
        .await;
    engine
        .record_reply(
            "I prefer tea over coffee in the morning.",
            "Noted, tea in the morning it is.",
        )
        .await;

    let stored = engine.memory_mut().semantic_memories().to_vec();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].fact, "The user prefer tea over coffee in the morning");
    assert_eq!(stored[0].category, FactCategory::Preference);
    assert!((stored[0].confidence - 0.7).abs() < f32::EPSILON);

    // Turn 2: a related question pulls the fact into the memory block.
    let (augmented, _) = engine
        .process_message("What do I like to drink?", false, &[])
        .await;

    assert!(augmented.contains("## Known facts about the user:"));
    assert!(augmented.contains("- The user prefer tea over coffee in the morning"));
}

#[tokio::test]
async fn memory_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    {
        let mut engine = integration(dir.path());
        engine
            .record_reply("I work at a small design studio.", "Good to know!")
            .await;
    }

    let mut engine = integration(dir.path());
    let stored = engine.memory_mut().semantic_memories();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].category, FactCategory::PersonalInfo);
}

#[tokio::test]
async fn memory_disabled_skips_recall_and_extraction() {
    let dir = tempfile::tempdir().unwrap();
    let config = {
        let mut c = BrainConfig::rooted_at(dir.path());
        c.use_memory = false;
        c
    };
    let brain = KnowledgeBrain::open(
        config.clone(),
        keyword_vector_index(),
        Some(constant_embedder()),
    );
    let memory = UnifiedMemory::open(&config.memory_dir, constant_embedder());
    let mut engine =
        BrainIntegration::new(brain, memory, None, "system", ContextBudget::standard());

    engine
        .record_reply("I prefer tea over coffee in the morning.", "Ok.")
        .await;
    assert_eq!(engine.memory_mut().semantic_count(), 0);

    let (augmented, _) = engine
        .process_message("What do I like to drink?", false, &[])
        .await;
    assert!(!augmented.contains("## Known facts about the user:"));
}

#[tokio::test]
async fn episodes_accumulate_and_render_when_helpful() {
    let dir = tempfile::tempdir().unwrap();
    let mut engine = integration(dir.path());

    engine
        .record_reply("draft the weekly summary for the team", "Here is a draft…")
        .await;

    // The stored episode surfaces for a similar request.
    let (augmented, _) = engine
        .process_message("What should I send for the weekly summary?", false, &[])
        .await;
    assert!(augmented.contains("## Similar past interactions:"));
    assert!(augmented.contains("draft the weekly summary for the team"));
}
