//! SQLite-based vector store implementation.
//!
//! Embeddings are stored as little-endian f32 blobs and scored in Rust.

use super::{cosine_similarity, rank, CollectionSummary, Passage, SearchResult, VectorStore};
use crate::error::{Result, VidyaError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info, instrument};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS passages (
    id TEXT PRIMARY KEY,
    collection TEXT NOT NULL,
    document_name TEXT NOT NULL,
    page_number INTEGER NOT NULL,
    text TEXT NOT NULL,
    embedding BLOB NOT NULL,
    indexed_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_passages_collection ON passages(collection);
"#;

/// SQLite-based vector store.
pub struct SqliteVectorStore {
    conn: Mutex<Connection>,
}

impl SqliteVectorStore {
    /// Open (or create) a store at the given path.
    #[instrument(skip_all)]
    pub fn new(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch(SCHEMA)?;

        info!("Initialized SQLite vector store at {:?}", path);

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory SQLite store (useful for testing).
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| VidyaError::VectorStore(format!("Failed to acquire lock: {}", e)))
    }

    fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
        embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
    }

    fn bytes_to_embedding(bytes: &[u8]) -> Vec<f32> {
        bytes
            .chunks_exact(4)
            .map(|chunk| {
                let arr: [u8; 4] = chunk.try_into().unwrap_or_default();
                f32::from_le_bytes(arr)
            })
            .collect()
    }

    fn parse_timestamp(value: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(value)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now())
    }
}

#[async_trait]
impl VectorStore for SqliteVectorStore {
    #[instrument(skip(self, passages), fields(count = passages.len()))]
    async fn upsert_batch(&self, passages: &[Passage]) -> Result<usize> {
        let conn = self.lock()?;
        let tx = conn.unchecked_transaction()?;

        for p in passages {
            tx.execute(
                r#"
                INSERT OR REPLACE INTO passages
                (id, collection, document_name, page_number, text, embedding, indexed_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                "#,
                params![
                    p.id.to_string(),
                    p.collection,
                    p.document_name,
                    p.page_number,
                    p.text,
                    Self::embedding_to_bytes(&p.embedding),
                    p.indexed_at.to_rfc3339(),
                ],
            )?;
        }

        tx.commit()?;
        info!("Batch upserted {} passages", passages.len());
        Ok(passages.len())
    }

    #[instrument(skip(self, query_embedding))]
    async fn search(
        &self,
        collection: &str,
        query_embedding: &[f32],
        limit: usize,
    ) -> Result<Vec<SearchResult>> {
        let conn = self.lock()?;

        let mut stmt = conn.prepare(
            r#"
            SELECT id, collection, document_name, page_number, text, embedding, indexed_at
            FROM passages
            WHERE collection = ?1
            "#,
        )?;

        let rows = stmt.query_map(params![collection], |row| {
            let id: String = row.get(0)?;
            let embedding: Vec<u8> = row.get(5)?;
            let indexed_at: String = row.get(6)?;

            Ok(Passage {
                id: uuid::Uuid::parse_str(&id).unwrap_or_default(),
                collection: row.get(1)?,
                document_name: row.get(2)?,
                page_number: row.get(3)?,
                text: row.get(4)?,
                embedding: Self::bytes_to_embedding(&embedding),
                indexed_at: Self::parse_timestamp(&indexed_at),
            })
        })?;

        let results = rows
            .filter_map(|r| r.ok())
            .map(|passage| SearchResult {
                score: cosine_similarity(query_embedding, &passage.embedding),
                passage,
            })
            .collect();

        let results = rank(results, limit);
        debug!("Found {} matching passages", results.len());
        Ok(results)
    }

    #[instrument(skip(self))]
    async fn delete_collection(&self, collection: &str) -> Result<usize> {
        let conn = self.lock()?;
        let deleted = conn.execute(
            "DELETE FROM passages WHERE collection = ?1",
            params![collection],
        )?;

        info!("Deleted {} passages from {}", deleted, collection);
        Ok(deleted)
    }

    async fn list_collections(&self) -> Result<Vec<CollectionSummary>> {
        let conn = self.lock()?;

        let mut stmt = conn.prepare(
            r#"
            SELECT collection, COUNT(*), COUNT(DISTINCT document_name), MAX(indexed_at)
            FROM passages
            GROUP BY collection
            ORDER BY collection
            "#,
        )?;

        let rows = stmt.query_map([], |row| {
            let indexed_at: String = row.get(3)?;
            Ok(CollectionSummary {
                collection: row.get(0)?,
                passage_count: row.get(1)?,
                document_count: row.get(2)?,
                indexed_at: Self::parse_timestamp(&indexed_at),
            })
        })?;

        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    async fn passage_count(&self) -> Result<usize> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM passages", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}
