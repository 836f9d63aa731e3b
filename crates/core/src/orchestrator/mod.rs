//! # Pipeline Orchestration
//!
//! Sequences the two stages for one concept.
//!
//! ## Pipeline Flow
//!
//! ```text
//! concept → Diversifier → Recipes → persist → done
//! ```

pub mod coordinator;
pub mod events;
pub mod pipeline;

pub use coordinator::{Coordinator, PipelineRun};
pub use events::{ProgressEvent, ProgressStage, ProgressStatus};
pub use pipeline::{Pipeline, PipelineStage};
