//! Vector store abstraction for study materials.
//!
//! Passages are grouped into collections, one per exam.

mod memory;
mod sqlite;

pub use memory::MemoryVectorStore;
pub use sqlite::SqliteVectorStore;

use crate::config::Settings;
use crate::error::{Result, VidyaError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// A page-level passage of study material.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Passage {
    /// Unique passage ID.
    pub id: Uuid,
    /// Collection (exam) this passage belongs to.
    pub collection: String,
    /// Source document file name.
    pub document_name: String,
    /// Page number within the source document.
    pub page_number: u32,
    /// Text content of the page.
    pub text: String,
    /// Embedding vector.
    pub embedding: Vec<f32>,
    /// When this passage was indexed.
    pub indexed_at: DateTime<Utc>,
}

impl Passage {
    /// Create a new passage.
    pub fn new(
        collection: &str,
        document_name: &str,
        page_number: u32,
        text: String,
        embedding: Vec<f32>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            collection: collection.to_string(),
            document_name: document_name.to_string(),
            page_number,
            text,
            embedding,
            indexed_at: Utc::now(),
        }
    }
}

/// A search hit with its similarity score.
#[derive(Debug, Clone)]
pub struct SearchResult {
    pub passage: Passage,
    /// Cosine similarity (higher is better).
    pub score: f32,
}

/// Summary of one indexed collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionSummary {
    pub collection: String,
    pub passage_count: u32,
    pub document_count: u32,
    /// Most recent indexing time.
    pub indexed_at: DateTime<Utc>,
}

/// Trait for vector store implementations.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Insert or replace passages. Returns the number written.
    async fn upsert_batch(&self, passages: &[Passage]) -> Result<usize>;

    /// Nearest passages within a collection, best first.
    async fn search(
        &self,
        collection: &str,
        query_embedding: &[f32],
        limit: usize,
    ) -> Result<Vec<SearchResult>>;

    /// Remove every passage in a collection.
    async fn delete_collection(&self, collection: &str) -> Result<usize>;

    /// List indexed collections.
    async fn list_collections(&self) -> Result<Vec<CollectionSummary>>;

    /// Total passage count.
    async fn passage_count(&self) -> Result<usize>;
}

/// Open the vector store selected in settings.
pub fn open(settings: &Settings) -> Result<Arc<dyn VectorStore>> {
    match settings.vector_store.provider.as_str() {
        "sqlite" => Ok(Arc::new(SqliteVectorStore::new(&settings.sqlite_path())?)),
        "memory" => Ok(Arc::new(MemoryVectorStore::new())),
        other => Err(VidyaError::Config(format!(
            "Unknown vector store provider: {}",
            other
        ))),
    }
}

/// Compute cosine similarity between two vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

/// Order hits best first and keep the top `limit`.
pub(crate) fn rank(mut results: Vec<SearchResult>, limit: usize) -> Vec<SearchResult> {
    results.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    results.truncate(limit);
    results
}
