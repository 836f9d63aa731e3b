//! # Atlas Skills
//!
//! The two model-backed stages of the pipeline.
//!
//! ## Architecture
//!
//! ```text
//! concept
//!   └── DiversifierSkill  -> Vec<Candidate>
//!         └── RecipesSkill -> Vec<EnrichedDish>
//! ```
//!
//! Both stages talk to the chat-completion backend through [`ChatClient`]
//! and never fail outward: backend errors and unparseable answers become
//! empty results.

pub mod llm_helpers;
pub mod prompts;

pub mod diversifier_skill;
pub mod recipes_skill;

// Re-exports for convenience
pub use diversifier_skill::{Candidate, DiversifierSkill};
pub use llm_helpers::{ChatClient, HttpChatClient};
pub use recipes_skill::{plan_batches, BatchPlan, EnrichedDish, Ingredient, Materials, Recipe, RecipesSkill};
