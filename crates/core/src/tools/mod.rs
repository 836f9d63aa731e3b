//! # Tools
//!
//! Deterministic clients that sit beside the model-backed stages.
//!
//! ## Modules
//!
//! - `recipe_search` - TheMealDB-style recipe lookup
//! - `key_rotation` - Rotating API key pool with a persisted cursor

pub mod key_rotation;
pub mod recipe_search;

pub use key_rotation::KeyRotation;
pub use recipe_search::{clear_of_junk, RecipeSearchClient, SearchOutcome};
