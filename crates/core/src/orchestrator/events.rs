//! # Progress Events
//!
//! Incremental progress of one pipeline run, streamed to callers as
//! newline-delimited JSON:
//!
//! ```text
//! {"status":"start","stage":"initialization","timestamp":"..."}
//! {"status":"complete","stage":"diversification","result":[...],"timestamp":"..."}
//! {"status":"complete","stage":"recipes","result":[...],"timestamp":"..."}
//! {"status":"done","timestamp":"..."}
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ProgressStatus {
    Start,
    Complete,
    Done,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ProgressStage {
    Initialization,
    Diversification,
    Recipes,
}

/// One line of the progress stream
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub status: ProgressStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage: Option<ProgressStage>,
    /// Stage output, only on `complete`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    pub timestamp: DateTime<Utc>,
}

impl ProgressEvent {
    fn new(status: ProgressStatus, stage: Option<ProgressStage>) -> Self {
        Self {
            status,
            stage,
            result: None,
            timestamp: Utc::now(),
        }
    }

    pub fn start() -> Self {
        Self::new(ProgressStatus::Start, Some(ProgressStage::Initialization))
    }

    /// Stage finished; `result` is its output
    pub fn complete<T: Serialize>(stage: ProgressStage, result: &T) -> Self {
        let result = serde_json::to_value(result).unwrap_or_else(|e| {
            tracing::warn!(stage = ?stage, error = %e, "Failed to encode stage result");
            Value::Null
        });
        Self {
            result: Some(result),
            ..Self::new(ProgressStatus::Complete, Some(stage))
        }
    }

    pub fn done() -> Self {
        Self::new(ProgressStatus::Done, None)
    }

    /// Encode as one NDJSON line, trailing newline included
    pub fn to_ndjson(&self) -> serde_json::Result<String> {
        let mut line = serde_json::to_string(self)?;
        line.push('\n');
        Ok(line)
    }
}
