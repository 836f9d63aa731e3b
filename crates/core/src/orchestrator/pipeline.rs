//! # Pipeline Stages
//!
//! Where a run currently is.

use super::events::ProgressStage;
use serde::{Deserialize, Serialize};

/// Stage of the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    /// Run accepted, nothing sent upstream yet
    Initialization,
    /// Waiting on the diversifier
    Diversification,
    /// Waiting on recipe enrichment
    Recipes,
    /// Every stage result emitted
    Done,
}

impl PipelineStage {
    /// Stage name used in progress events
    pub fn progress_stage(self) -> Option<ProgressStage> {
        match self {
            PipelineStage::Initialization => Some(ProgressStage::Initialization),
            PipelineStage::Diversification => Some(ProgressStage::Diversification),
            PipelineStage::Recipes => Some(ProgressStage::Recipes),
            PipelineStage::Done => None,
        }
    }
}

/// The pipeline state machine
#[derive(Debug, Clone)]
pub struct Pipeline {
    pub stage: PipelineStage,
}

impl Default for Pipeline {
    fn default() -> Self {
        Self {
            stage: PipelineStage::Initialization,
        }
    }
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance to the next stage
    pub fn advance(&mut self) {
        self.stage = match self.stage {
            PipelineStage::Initialization => PipelineStage::Diversification,
            PipelineStage::Diversification => PipelineStage::Recipes,
            PipelineStage::Recipes => PipelineStage::Done,
            PipelineStage::Done => PipelineStage::Done,
        };
    }
}
