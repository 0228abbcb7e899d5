//! Trait seams between the pipeline and its collaborators.

mod llm;
mod store;
mod text;

pub use llm::LanguageModel;
pub use store::{DocumentStore, HarvestStore, LogStore, SettingsStore, SiteStore};
pub use text::TextExtractor;
