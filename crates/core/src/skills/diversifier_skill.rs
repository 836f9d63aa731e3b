//! # Diversifier Skill
//!
//! Turns one dish concept into a list of culturally situated variants, each
//! scored for similarity to the concept. The list keeps the order the backend
//! returned; ranking is the enrichment stage's job.

use crate::error::{ServiceError, ServiceResult};
use crate::skills::llm_helpers::{into_items, lenient, request_json, ChatClient};
use crate::skills::prompts;
use crate::state::ResultStore;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// One dish variant returned by diversification
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    #[serde(default, deserialize_with = "lenient::string_value")]
    pub dish_name: String,
    #[serde(default, deserialize_with = "lenient::string_value")]
    pub local_name: String,
    #[serde(default, deserialize_with = "lenient::string_value")]
    pub region: String,
    #[serde(default, deserialize_with = "lenient::string_value")]
    pub culture_or_ethnicity: String,
    /// Similarity to the input concept, 0.0 to 1.0
    #[serde(default, deserialize_with = "lenient::f64_value")]
    pub similarity_score: f64,
    /// Lookup key for the enrichment stage
    #[serde(default, deserialize_with = "lenient::string_value")]
    pub recipe_search_prompt: String,
}

impl Candidate {
    /// Force the score into [0, 1]
    fn clamp_score(&mut self) {
        if !(0.0..=1.0).contains(&self.similarity_score) {
            let clamped = if self.similarity_score.is_nan() {
                0.0
            } else {
                self.similarity_score.clamp(0.0, 1.0)
            };
            tracing::warn!(
                dish = %self.dish_name,
                score = self.similarity_score,
                clamped,
                "Similarity score out of range"
            );
            self.similarity_score = clamped;
        }
    }
}

/// Diversification stage
pub struct DiversifierSkill {
    client: Arc<dyn ChatClient>,
    store: Option<ResultStore>,
}

impl DiversifierSkill {
    pub fn new(client: Arc<dyn ChatClient>) -> Self {
        Self {
            client,
            store: None,
        }
    }

    /// Keep malformed backend output as debug artifacts in `store`
    pub fn with_store(mut self, store: ResultStore) -> Self {
        self.store = Some(store);
        self
    }

    /// Find variants of `concept`.
    ///
    /// Any failure is logged and yields an empty list, which callers cannot
    /// tell apart from a concept with no variants.
    pub async fn run(&self, concept: &str) -> Vec<Candidate> {
        match self.try_run(concept).await {
            Ok(candidates) => {
                tracing::info!(concept = %concept, count = candidates.len(), "Diversification complete");
                candidates
            }
            Err(e) => {
                tracing::warn!(concept = %concept, error = %e, "Diversification failed; returning no variants");
                if let (Some(store), Some(raw)) = (&self.store, e.raw_payload()) {
                    match store.write_debug_artifact("diversifier", raw).await {
                        Ok(path) => tracing::warn!(path = ?path, "Saved malformed diversifier output"),
                        Err(err) => tracing::warn!(error = %err, "Failed to save diversifier debug artifact"),
                    }
                }
                Vec::new()
            }
        }
    }

    /// Same as [`run`](Self::run) but surfaces the failure
    pub async fn try_run(&self, concept: &str) -> ServiceResult<Vec<Candidate>> {
        let user = prompts::render(prompts::DIVERSIFIER_USER, concept);
        let (raw, value) =
            request_json(self.client.as_ref(), prompts::DIVERSIFIER_SYSTEM, &user).await?;

        into_items(value, &raw, &["dish_name"])?
            .into_iter()
            .map(|item| {
                let mut candidate: Candidate =
                    serde_json::from_value(item).map_err(|e| ServiceError::MalformedResponse {
                        reason: format!("candidate does not match schema: {}", e),
                        raw: raw.clone(),
                    })?;
                candidate.clamp_score();
                Ok(candidate)
            })
            .collect()
    }
}
