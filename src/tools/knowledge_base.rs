//! Semantic search over indexed study materials.

use super::{parse_args, Source, Tool, ToolOutput};
use crate::context::TurnContext;
use crate::embedding::Embedder;
use crate::error::Result;
use crate::llm::ToolSpec;
use crate::vector_store::VectorStore;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, instrument};

const EXCERPT_CHARS: usize = 200;

/// Searches the exam's collection in the vector store.
pub struct KnowledgeBaseTool {
    embedder: Arc<dyn Embedder>,
    vector_store: Arc<dyn VectorStore>,
    limit: usize,
    default_collection: String,
}

#[derive(Deserialize)]
struct SearchArgs {
    query: String,
}

#[derive(Serialize)]
struct Hit<'a> {
    page_content: &'a str,
    document_name: &'a str,
    page_number: u32,
}

impl KnowledgeBaseTool {
    pub fn new(embedder: Arc<dyn Embedder>, vector_store: Arc<dyn VectorStore>, limit: usize) -> Self {
        Self {
            embedder,
            vector_store,
            limit,
            default_collection: "invest_advisor".to_string(),
        }
    }

    /// Collection searched when the turn does not name one.
    pub fn with_default_collection(mut self, collection: impl Into<String>) -> Self {
        self.default_collection = collection.into();
        self
    }
}

#[async_trait]
impl Tool for KnowledgeBaseTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "search_knowledge_base".to_string(),
            description: "Semantic search in the vector database of study materials for the \
                SEBI certification exams. Returns matching passages with their source document \
                name and page number. Use precise terms and avoid unnecessary stop words."
                .to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "Search query for the study materials"
                    }
                },
                "required": ["query"]
            }),
        }
    }

    fn usage_notice(&self) -> String {
        "Searching study materials".to_string()
    }

    #[instrument(skip(self, arguments, ctx), fields(collection = %ctx.collection))]
    async fn call(&self, arguments: &Value, ctx: &TurnContext) -> Result<ToolOutput> {
        let args: SearchArgs = parse_args("search_knowledge_base", arguments)?;

        let collection = if ctx.collection.is_empty() {
            self.default_collection.as_str()
        } else {
            ctx.collection.as_str()
        };

        let embedding = self.embedder.embed(&args.query).await?;
        let results = self
            .vector_store
            .search(collection, &embedding, self.limit)
            .await?;
        debug!("Knowledge base returned {} passages", results.len());

        let hits: Vec<Hit<'_>> = results
            .iter()
            .map(|r| Hit {
                page_content: &r.passage.text,
                document_name: &r.passage.document_name,
                page_number: r.passage.page_number,
            })
            .collect();

        let sources = results
            .iter()
            .map(|r| Source {
                document_name: r.passage.document_name.clone(),
                page_number: r.passage.page_number,
                excerpt: r.passage.text.chars().take(EXCERPT_CHARS).collect(),
            })
            .collect();

        Ok(ToolOutput {
            content: serde_json::to_string(&hits)?,
            sources,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::vector_store::{MemoryVectorStore, Passage};

    struct FixedEmbedder;

    #[async_trait]
    impl Embedder for FixedEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Ok(vec![1.0, 0.0])
        }

        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|_| vec![1.0, 0.0]).collect())
        }

        fn dimensions(&self) -> usize {
            2
        }
    }

    #[tokio::test]
    async fn test_search_returns_hits_and_sources() {
        let store = Arc::new(MemoryVectorStore::new());
        store
            .upsert_batch(&[
                Passage::new("investor_awareness", "IA.pdf", 12, "KYC is mandatory.".into(), vec![1.0, 0.0]),
                Passage::new("investor_awareness", "IA.pdf", 30, "Grievance redressal".into(), vec![0.0, 1.0]),
                Passage::new("mf_foundation", "MF.pdf", 2, "NAV".into(), vec![1.0, 0.0]),
            ])
            .await
            .unwrap();

        let tool = KnowledgeBaseTool::new(Arc::new(FixedEmbedder), store, 1);
        let ctx = TurnContext::resolve(&Settings::default(), None, None).unwrap();
        let output = tool.call(&json!({"query": "KYC"}), &ctx).await.unwrap();

        let hits: Vec<Value> = serde_json::from_str(&output.content).unwrap();
        assert_eq!(
            hits,
            vec![json!({"page_content": "KYC is mandatory.", "document_name": "IA.pdf", "page_number": 12})]
        );
        assert_eq!(output.sources.len(), 1);
        assert_eq!(output.sources[0].page_number, 12);
    }

    #[tokio::test]
    async fn test_empty_collection_uses_default() {
        let store = Arc::new(MemoryVectorStore::new());
        store
            .upsert_batch(&[Passage::new("invest_advisor", "IA2.pdf", 4, "Fee caps".into(), vec![1.0, 0.0])])
            .await
            .unwrap();

        let tool = KnowledgeBaseTool::new(Arc::new(FixedEmbedder), store, 10);
        let mut ctx = TurnContext::resolve(&Settings::default(), None, None).unwrap();
        ctx.collection.clear();

        let output = tool.call(&json!({"query": "fees"}), &ctx).await.unwrap();
        assert_eq!(output.sources[0].document_name, "IA2.pdf");
    }
}
