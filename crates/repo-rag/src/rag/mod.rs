//! Retrieval-augmented answer generation

mod pipeline;
mod prompt;

pub use pipeline::{RagAnswer, RagPipeline};
pub use prompt::{PromptBuilder, SYSTEM_PROMPT};
