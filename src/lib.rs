//! Vidya - AI tutor for certification exam preparation
//!
//! Answers learners' questions about an exam syllabus by letting a chat model
//! call tools (study-material search, web search, a calculator, a date utility,
//! and a nested tutor agent) and streaming the answer back as server-sent events.
//!
//! # Architecture
//!
//! - `config` - Settings, exam catalog, and prompt templates
//! - `context` - Per-turn exam and language context
//! - `llm` - Chat model abstraction and streaming accumulator
//! - `tools` - Tool trait, registry, and the standard tools
//! - `agent` - Role-based agents that run their own tool loop
//! - `orchestrator` - The streaming tool-augmented chat loop
//! - `exam` - Mock exam question generation
//! - `embedding` / `vector_store` - Study material indexing and retrieval
//!
//! # Example
//!
//! ```rust,no_run
//! use futures::StreamExt;
//! use std::sync::Arc;
//! use vidya::config::{Prompts, Settings};
//! use vidya::context::TurnContext;
//! use vidya::llm::ChatMessage;
//! use vidya::orchestrator::Orchestrator;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = Settings::load()?;
//!     let ctx = TurnContext::resolve(&settings, Some("mf_foundation"), Some("hi-IN"))?;
//!     let orchestrator = Arc::new(Orchestrator::from_settings(&settings, Prompts::default())?);
//!
//!     let mut events = orchestrator.stream(vec![ChatMessage::user("What is NAV?")], ctx);
//!     while let Some(event) = events.next().await {
//!         print!("{}", event.to_sse());
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod agent;
pub mod cli;
pub mod config;
pub mod context;
pub mod embedding;
pub mod error;
pub mod exam;
pub mod llm;
pub mod openai;
pub mod orchestrator;
pub mod tools;
pub mod vector_store;

pub use error::{Result, VidyaError};
