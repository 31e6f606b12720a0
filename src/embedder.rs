//! Embedding capability consumed by recall and graph expansion
//!
//! The concrete encoder (a local MiniLM-class model in the reference
//! deployment) lives outside this crate; the brain only needs `encode`
//! plus the cosine helper in [`crate::similarity`]. Encoding is one of the
//! three genuine suspension points in the engine, so the trait is async.

use anyhow::Result;
use async_trait::async_trait;

/// Trait for embedding generation.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Generate an embedding for the given text.
    async fn encode(&self, text: &str) -> Result<Vec<f32>>;

    /// Embedding dimension produced by this encoder.
    fn dimension(&self) -> usize;

    /// Batch encode multiple texts.
    async fn encode_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.encode(text).await?);
        }
        Ok(out)
    }
}
