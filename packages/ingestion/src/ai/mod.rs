//! Language model implementations.
//!
//! Reference implementations of the [`LanguageModel`](crate::traits::LanguageModel)
//! trait. Users can use these directly or implement their own.

#[cfg(feature = "openai")]
mod openai;

#[cfg(feature = "openai")]
pub use openai::OpenAI;
