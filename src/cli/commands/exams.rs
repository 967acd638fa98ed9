//! Exams command implementation.

use crate::cli::Output;
use crate::config::Settings;
use crate::context::TurnContext;
use crate::vector_store;
use anyhow::Result;

/// Run the exams command.
pub async fn run_exams(settings: Settings) -> Result<()> {
    let store = vector_store::open(&settings)?;
    let collections = store.list_collections().await?;

    Output::header("Exams");
    for (id, exam) in &settings.exams {
        let ctx = TurnContext::from_exam(id, exam, "English");
        let summary = collections.iter().find(|c| c.collection == ctx.collection);

        let marker = if *id == settings.orchestrator.default_exam {
            " (default)"
        } else {
            ""
        };
        println!();
        Output::list_item(&format!("{}{}", id, marker));
        Output::kv("Name", &exam.name);
        Output::kv("Collection", &ctx.collection);
        match summary {
            Some(s) => Output::kv(
                "Indexed",
                &format!(
                    "{} passages from {} documents ({})",
                    s.passage_count,
                    s.document_count,
                    s.indexed_at.format("%Y-%m-%d %H:%M")
                ),
            ),
            None => Output::kv("Indexed", "nothing yet"),
        }
        if exam.questions_path.is_none() {
            Output::kv("Mock exam", "no question bank configured");
        }
    }

    Output::header("Languages");
    for (code, name) in &settings.languages {
        Output::kv(code, name);
    }

    let orphans: Vec<_> = collections
        .iter()
        .filter(|c| {
            !settings
                .exams
                .iter()
                .any(|(id, exam)| TurnContext::from_exam(id, exam, "").collection == c.collection)
        })
        .collect();
    if !orphans.is_empty() {
        Output::header("Other collections");
        for c in orphans {
            Output::list_item(&format!("{} ({} passages)", c.collection, c.passage_count));
        }
    }

    Ok(())
}
