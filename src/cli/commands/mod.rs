//! CLI command implementations.

mod ask;
mod config;
mod exams;
mod ingest;
mod serve;

pub use ask::run_ask;
pub use config::run_config;
pub use exams::run_exams;
pub use ingest::run_ingest;
pub use serve::run_serve;
