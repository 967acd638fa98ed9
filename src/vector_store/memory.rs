//! In-memory vector store implementation.
//!
//! Useful for testing and small datasets.

use super::{cosine_similarity, rank, CollectionSummary, Passage, SearchResult, VectorStore};
use crate::error::{Result, VidyaError};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use uuid::Uuid;

/// In-memory vector store.
#[derive(Default)]
pub struct MemoryVectorStore {
    passages: RwLock<HashMap<Uuid, Passage>>,
}

impl MemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, HashMap<Uuid, Passage>>> {
        self.passages
            .read()
            .map_err(|e| VidyaError::VectorStore(format!("Failed to acquire lock: {}", e)))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, HashMap<Uuid, Passage>>> {
        self.passages
            .write()
            .map_err(|e| VidyaError::VectorStore(format!("Failed to acquire lock: {}", e)))
    }
}

#[async_trait]
impl VectorStore for MemoryVectorStore {
    async fn upsert_batch(&self, passages: &[Passage]) -> Result<usize> {
        let mut store = self.write()?;
        for passage in passages {
            store.insert(passage.id, passage.clone());
        }
        Ok(passages.len())
    }

    async fn search(
        &self,
        collection: &str,
        query_embedding: &[f32],
        limit: usize,
    ) -> Result<Vec<SearchResult>> {
        let store = self.read()?;

        let results = store
            .values()
            .filter(|p| p.collection == collection)
            .map(|p| SearchResult {
                score: cosine_similarity(query_embedding, &p.embedding),
                passage: p.clone(),
            })
            .collect();

        Ok(rank(results, limit))
    }

    async fn delete_collection(&self, collection: &str) -> Result<usize> {
        let mut store = self.write()?;
        let before = store.len();
        store.retain(|_, p| p.collection != collection);
        Ok(before - store.len())
    }

    async fn list_collections(&self) -> Result<Vec<CollectionSummary>> {
        let store = self.read()?;

        let mut summaries: BTreeMap<String, (CollectionSummary, HashSet<String>)> = BTreeMap::new();
        for p in store.values() {
            let (summary, documents) = summaries.entry(p.collection.clone()).or_insert_with(|| {
                (
                    CollectionSummary {
                        collection: p.collection.clone(),
                        passage_count: 0,
                        document_count: 0,
                        indexed_at: p.indexed_at,
                    },
                    HashSet::new(),
                )
            });
            summary.passage_count += 1;
            documents.insert(p.document_name.clone());
            summary.document_count = documents.len() as u32;
            if p.indexed_at > summary.indexed_at {
                summary.indexed_at = p.indexed_at;
            }
        }

        Ok(summaries.into_values().map(|(s, _)| s).collect())
    }

    async fn passage_count(&self) -> Result<usize> {
        Ok(self.read()?.len())
    }
}
