//! # Recipes Skill
//!
//! Attaches a structured recipe to each candidate.
//!
//! Candidates are ranked by similarity (stable, best first) and sent to the
//! backend in batches of `batch_size`. The first batch is always the top
//! `batch_size` items; after it, only items below index `max_candidates` are
//! considered, chunked the same way. Anything at or past `max_candidates` is
//! dropped. A batch whose answer cannot be used contributes nothing, and the
//! remaining batches still run.
//!
//! ```text
//! 12 candidates, batch 5, cap 10:
//! [0..5) -> batch 1   [5..10) -> batch 2   [10..12) -> dropped
//! ```

use crate::error::{ServiceError, ServiceResult};
use crate::models::PipelineSettings;
use crate::skills::diversifier_skill::Candidate;
use crate::skills::llm_helpers::{into_items, lenient, request_json, ChatClient};
use crate::skills::prompts;
use crate::state::ResultStore;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

/// One ingredient line
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Ingredient {
    #[serde(default, deserialize_with = "lenient::string_value")]
    pub name: String,
    /// "2", "1/2", "to taste"
    #[serde(default, deserialize_with = "lenient::string_value")]
    pub quantity: String,
    #[serde(default, deserialize_with = "lenient::string_value")]
    pub unit: String,
    #[serde(default, deserialize_with = "lenient::string_value")]
    pub notes: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Materials {
    #[serde(default)]
    pub ingredients: Vec<Ingredient>,
    #[serde(default)]
    pub equipment: Vec<String>,
}

/// Top-level fields of a recipe answer; an item needs at least one of them
const RECIPE_KEYS: &[&str] = &[
    "matched_recipe_title",
    "summary",
    "servings",
    "total_time_minutes",
    "materials",
    "steps",
    "image_url",
    "source_url",
    "source",
];

/// Structured cooking record for one candidate
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Recipe {
    #[serde(default, deserialize_with = "lenient::string_value")]
    pub matched_recipe_title: String,
    #[serde(default, deserialize_with = "lenient::string_value")]
    pub summary: String,
    #[serde(default, deserialize_with = "lenient::u32_value")]
    pub servings: u32,
    #[serde(default, deserialize_with = "lenient::u32_value")]
    pub total_time_minutes: u32,
    #[serde(default)]
    pub materials: Materials,
    #[serde(default)]
    pub steps: Vec<String>,
    #[serde(default, deserialize_with = "lenient::string_value")]
    pub image_url: String,
    #[serde(default, deserialize_with = "lenient::string_value")]
    pub source_url: String,
    #[serde(default, deserialize_with = "lenient::string_value")]
    pub source: String,
}

/// A candidate merged with its recipe. Serializes as one flat object holding
/// every candidate field and every recipe field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnrichedDish {
    #[serde(flatten)]
    pub candidate: Candidate,
    #[serde(flatten)]
    pub recipe: Recipe,
}

impl EnrichedDish {
    /// Overlay the candidate's fields onto the recipe
    pub fn merge(candidate: Candidate, recipe: Recipe) -> Self {
        Self { candidate, recipe }
    }
}

/// What the backend is told about each dish
#[derive(Debug, Clone, Serialize)]
struct RecipeLookup<'a> {
    dish_name: &'a str,
    local_name: &'a str,
    recipe_search_prompt: &'a str,
}

impl<'a> From<&'a Candidate> for RecipeLookup<'a> {
    fn from(candidate: &'a Candidate) -> Self {
        Self {
            dish_name: &candidate.dish_name,
            local_name: &candidate.local_name,
            recipe_search_prompt: &candidate.recipe_search_prompt,
        }
    }
}

/// How a candidate list is split into backend calls
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchPlan {
    /// Batches in call order; each is sorted best first
    pub batches: Vec<Vec<Candidate>>,
    /// Candidates past the look-ahead cap
    pub dropped: Vec<Candidate>,
}

/// Rank candidates and split them into batches.
pub fn plan_batches(mut candidates: Vec<Candidate>, batch_size: usize, max_candidates: usize) -> BatchPlan {
    let batch_size = batch_size.max(1);
    candidates.sort_by(|a, b| b.similarity_score.total_cmp(&a.similarity_score));

    let len = candidates.len();
    if len == 0 {
        return BatchPlan::default();
    }

    let first_len = batch_size.min(len);
    let window_end = max_candidates.min(len).max(first_len);

    let dropped = candidates.split_off(window_end);
    let mut rest = candidates.split_off(first_len);
    let mut batches = vec![candidates];

    while !rest.is_empty() {
        let tail = rest.split_off(batch_size.min(rest.len()));
        batches.push(rest);
        rest = tail;
    }

    BatchPlan { batches, dropped }
}

/// Enrichment stage
pub struct RecipesSkill {
    client: Arc<dyn ChatClient>,
    store: Option<ResultStore>,
    limits: PipelineSettings,
}

impl RecipesSkill {
    pub fn new(client: Arc<dyn ChatClient>) -> Self {
        Self {
            client,
            store: None,
            limits: PipelineSettings::default(),
        }
    }

    /// Override batch size and look-ahead cap
    pub fn with_limits(mut self, limits: PipelineSettings) -> Self {
        self.limits = limits;
        self
    }

    /// Keep malformed backend output as debug artifacts in `store`
    pub fn with_store(mut self, store: ResultStore) -> Self {
        self.store = Some(store);
        self
    }

    /// Enrich candidates batch by batch.
    ///
    /// Output is batch-major and positional within each batch, so it is only
    /// sorted by similarity inside a batch.
    pub async fn run(&self, candidates: Vec<Candidate>) -> Vec<EnrichedDish> {
        let started = Instant::now();
        let total = candidates.len();
        let plan = plan_batches(candidates, self.limits.batch_size, self.limits.max_candidates);

        if !plan.dropped.is_empty() {
            tracing::info!(
                dropped = plan.dropped.len(),
                cap = self.limits.max_candidates,
                "Candidates past the cap were not enriched"
            );
        }

        let mut results = Vec::new();
        for (index, batch) in plan.batches.iter().enumerate() {
            match self.enrich_batch(batch).await {
                Ok(mut enriched) => {
                    tracing::debug!(batch = index, size = batch.len(), recipes = enriched.len(), "Batch enriched");
                    results.append(&mut enriched);
                }
                Err(e) => {
                    tracing::warn!(batch = index, size = batch.len(), error = %e, "Batch enrichment failed; skipping batch");
                    self.keep_debug_output(&e).await;
                }
            }
        }

        tracing::info!(
            candidates = total,
            batches = plan.batches.len(),
            recipes = results.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Recipe enrichment complete"
        );
        results
    }

    /// One backend call for one batch
    pub async fn enrich_batch(&self, batch: &[Candidate]) -> ServiceResult<Vec<EnrichedDish>> {
        let lookups: Vec<RecipeLookup<'_>> = batch.iter().map(RecipeLookup::from).collect();
        let input = serde_json::to_string(&lookups).map_err(|e| ServiceError::MalformedResponse {
            reason: format!("cannot encode batch: {}", e),
            raw: String::new(),
        })?;
        tracing::debug!(input_len = input.len(), "Requesting recipes");

        let user = prompts::render(prompts::RECIPES_USER, &input);
        let (raw, value) = request_json(self.client.as_ref(), prompts::RECIPES_SYSTEM, &user).await?;

        let recipes = into_items(value, &raw, RECIPE_KEYS)?
            .into_iter()
            .map(|item| {
                serde_json::from_value::<Recipe>(item).map_err(|e| ServiceError::MalformedResponse {
                    reason: format!("recipe does not match schema: {}", e),
                    raw: raw.clone(),
                })
            })
            .collect::<ServiceResult<Vec<Recipe>>>()?;

        if recipes.len() > batch.len() {
            return Err(ServiceError::MalformedResponse {
                reason: format!(
                    "{} recipes for a batch of {}; cannot tell which belong to which dish",
                    recipes.len(),
                    batch.len()
                ),
                raw,
            });
        }
        if recipes.len() < batch.len() {
            tracing::warn!(
                expected = batch.len(),
                received = recipes.len(),
                "Fewer recipes than dishes; merging by position"
            );
        }

        Ok(batch
            .iter()
            .cloned()
            .zip(recipes)
            .map(|(candidate, recipe)| EnrichedDish::merge(candidate, recipe))
            .collect())
    }

    async fn keep_debug_output(&self, error: &ServiceError) {
        let (Some(store), Some(raw)) = (&self.store, error.raw_payload()) else {
            return;
        };
        match store.write_debug_artifact("recipes", raw).await {
            Ok(path) => tracing::warn!(path = ?path, "Saved malformed recipes output"),
            Err(e) => tracing::warn!(error = %e, "Failed to save recipes debug artifact"),
        }
    }
}
