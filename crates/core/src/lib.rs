//! # Atlas Core
//!
//! Turns a dish concept into culturally diverse variants with recipes.
//!
//! ## Architecture
//!
//! - `skills/` - Diversifier and recipe enrichment stages, chat backend client
//! - `models` - Typed settings and credentials
//! - `state/` - File-backed result store
//! - `orchestrator/` - Pipeline sequencing and progress events
//! - `tools/` - Recipe-search client with key rotation
//!
//! ## Usage
//!
//! ```rust,ignore
//! use atlas_core::models::{Credentials, Settings};
//! use atlas_core::orchestrator::Coordinator;
//! use atlas_core::state::ResultStore;
//!
//! let settings = Settings::load(&Settings::default_path())?;
//! settings.load_env_file();
//! let credentials = Credentials::from_env(&settings.env.available_keys);
//! let mut coordinator = Coordinator::from_settings(&settings, &credentials, ResultStore::open_default())?;
//! let run = coordinator.run("Rice").await;
//! ```

pub mod error;
pub mod models;
pub mod orchestrator;
pub mod skills;
pub mod state;
pub mod tools;

pub use error::{ServiceError, ServiceResult};
