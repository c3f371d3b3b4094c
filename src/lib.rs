pub mod cli;
pub mod config;
pub mod error;
pub mod i18n;
pub mod llm;
pub mod outlet;
pub mod research;
pub mod scrape;
pub mod search;
pub mod utils;
pub mod workflow;

// Re-export commonly used types
pub use config::Config;
pub use error::ResearchError;
pub use research::{ResearchOrchestrator, ResearchResult};
pub use workflow::launch;
