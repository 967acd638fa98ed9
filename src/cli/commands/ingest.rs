//! Ingest command implementation.
//!
//! Reads page-level passages from a JSONL file, embeds them, and writes them
//! into the exam's collection.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::context::TurnContext;
use crate::embedding::{Embedder, OpenAIEmbedder};
use crate::vector_store::{self, Passage};
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use tracing::{debug, info};

/// Passages embedded per request.
const EMBED_BATCH: usize = 50;

/// One line of the input file.
#[derive(Debug, Deserialize, PartialEq)]
struct PageRecord {
    text: String,
    document_name: String,
    #[serde(default)]
    page_number: u32,
}

/// Run the ingest command.
pub async fn run_ingest(path: &str, exam: &str, replace: bool, settings: Settings) -> Result<()> {
    if let Err(e) = preflight::check(Operation::Ingest) {
        Output::error(&format!("{}", e));
        return Err(e.into());
    }

    let ctx = TurnContext::resolve(&settings, Some(exam), None)?;
    let path = Settings::expand_path(path);
    let records = read_records(&path)?;

    if records.is_empty() {
        Output::warning(&format!("No passages found in {}", path.display()));
        return Ok(());
    }

    let store = vector_store::open(&settings)?;
    if replace {
        let removed = store.delete_collection(&ctx.collection).await?;
        Output::info(&format!("Removed {} passages from {}", removed, ctx.collection));
    }

    let embedder = OpenAIEmbedder::from_settings(&settings.llm, &settings.embedding)?;

    Output::info(&format!(
        "Indexing {} passages into {} ({})",
        records.len(),
        ctx.collection,
        ctx.exam_name
    ));

    let pb = Output::progress_bar(records.len() as u64, "Embedding");
    let mut written = 0;

    for batch in records.chunks(EMBED_BATCH) {
        let texts: Vec<String> = batch.iter().map(|r| r.text.clone()).collect();
        let embeddings = embedder.embed_batch(&texts).await?;
        debug!("Embedded batch of {}", embeddings.len());

        let passages: Vec<Passage> = batch
            .iter()
            .zip(embeddings)
            .map(|(record, embedding)| {
                Passage::new(
                    &ctx.collection,
                    &record.document_name,
                    record.page_number,
                    record.text.clone(),
                    embedding,
                )
            })
            .collect();

        written += store.upsert_batch(&passages).await?;
        pb.inc(batch.len() as u64);
    }

    pb.finish_and_clear();
    info!("Indexed {} passages into {}", written, ctx.collection);
    Output::success(&format!("Indexed {} passages into {}", written, ctx.collection));

    Ok(())
}

fn read_records(path: &Path) -> Result<Vec<PageRecord>> {
    let content =
        std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    parse_records(&content)
}

/// Parse JSONL records, skipping blank lines and pages without text.
fn parse_records(content: &str) -> Result<Vec<PageRecord>> {
    let mut records = Vec::new();
    for (i, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let record: PageRecord =
            serde_json::from_str(line).with_context(|| format!("Invalid passage on line {}", i + 1))?;
        if record.text.trim().is_empty() {
            debug!("Skipping empty page {} of {}", record.page_number, record.document_name);
            continue;
        }
        records.push(record);
    }
    Ok(records)
}
