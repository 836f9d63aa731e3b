//! # Pipeline Coordinator
//!
//! Runs one concept through diversification and recipe enrichment, streams
//! progress, and persists whatever came out.
//!
//! The four progress events are always emitted, in order, even when a stage
//! produced nothing. Persistence happens after enrichment and is best effort:
//! every write is attempted, failures are logged, and the run still completes.

use serde::Serialize;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::error::ServiceResult;
use crate::models::{Credentials, PipelineSettings, Settings, DIVERSIFIER_AGENT, RECIPES_AGENT};
use crate::skills::{Candidate, ChatClient, DiversifierSkill, EnrichedDish, HttpChatClient, RecipesSkill};
use crate::state::ResultStore;

use super::events::ProgressEvent;
use super::pipeline::{Pipeline, PipelineStage};

/// Output of one run
#[derive(Debug, Clone)]
pub struct PipelineRun {
    pub query: String,
    /// Candidates in diversifier order
    pub dishes: Vec<Candidate>,
    /// Merged records, batch-major
    pub recipes: Vec<EnrichedDish>,
    /// Events that were emitted
    pub events: Vec<ProgressEvent>,
    /// False when the results could not be written to the store
    pub persisted: bool,
}

/// The pipeline coordinator
pub struct Coordinator {
    diversifier: DiversifierSkill,
    recipes: RecipesSkill,
    store: ResultStore,
    pipeline: Pipeline,
    events: Vec<ProgressEvent>,
    event_tx: Option<mpsc::Sender<ProgressEvent>>,
}

impl Coordinator {
    /// Create a coordinator over explicit chat clients
    pub fn new(
        diversifier_client: Arc<dyn ChatClient>,
        recipes_client: Arc<dyn ChatClient>,
        limits: PipelineSettings,
        store: ResultStore,
    ) -> Self {
        Self {
            diversifier: DiversifierSkill::new(diversifier_client).with_store(store.clone()),
            recipes: RecipesSkill::new(recipes_client)
                .with_limits(limits)
                .with_store(store.clone()),
            store,
            pipeline: Pipeline::new(),
            events: Vec::new(),
            event_tx: None,
        }
    }

    /// Create a coordinator with HTTP clients for the `diversifier` and
    /// `recipes` agent profiles
    pub fn from_settings(
        settings: &Settings,
        credentials: &Credentials,
        store: ResultStore,
    ) -> ServiceResult<Self> {
        let diversifier = HttpChatClient::from_settings(settings, DIVERSIFIER_AGENT, credentials)?;
        let recipes = HttpChatClient::from_settings(settings, RECIPES_AGENT, credentials)?;
        Ok(Self::new(
            Arc::new(diversifier),
            Arc::new(recipes),
            settings.pipeline,
            store,
        ))
    }

    /// Set event channel for streaming events
    pub fn with_event_channel(mut self, tx: mpsc::Sender<ProgressEvent>) -> Self {
        self.event_tx = Some(tx);
        self
    }

    pub fn stage(&self) -> PipelineStage {
        self.pipeline.stage
    }

    /// Emit an event. A closed channel is ignored; the run carries on.
    async fn emit(&mut self, event: ProgressEvent) {
        self.events.push(event.clone());
        if let Some(tx) = &self.event_tx {
            if tx.send(event).await.is_err() {
                tracing::debug!("Progress receiver dropped; continuing without streaming");
            }
        }
    }

    /// Emit the completion event for the current stage and move to the next
    async fn finish_stage<T: Serialize>(&mut self, result: &T) {
        if let Some(stage) = self.pipeline.stage.progress_stage() {
            self.emit(ProgressEvent::complete(stage, result)).await;
        }
        self.pipeline.advance();
    }

    /// Run the full pipeline for `query`
    #[tracing::instrument(skip(self))]
    pub async fn run(&mut self, query: &str) -> PipelineRun {
        self.pipeline = Pipeline::new();
        self.events.clear();

        tracing::info!("Pipeline started");
        self.emit(ProgressEvent::start()).await;
        self.pipeline.advance();

        let dishes = self.diversifier.run(query).await;
        self.finish_stage(&dishes).await;

        let recipes = self.recipes.run(dishes.clone()).await;
        self.finish_stage(&recipes).await;

        let persisted = self.persist(query, &dishes, &recipes).await;
        self.emit(ProgressEvent::done()).await;
        tracing::info!(
            dishes = dishes.len(),
            recipes = recipes.len(),
            persisted,
            "Pipeline complete"
        );

        PipelineRun {
            query: query.to_string(),
            dishes,
            recipes,
            events: self.events.clone(),
            persisted,
        }
    }

    /// Write the query record and every dish record. Returns false when any
    /// write failed; one failure does not stop the others.
    async fn persist(&self, query: &str, dishes: &[Candidate], recipes: &[EnrichedDish]) -> bool {
        let mut failed = 0;

        if let Err(e) = self.store.save_query(query, dishes, recipes).await {
            tracing::warn!(error = %e, "Failed to persist query record");
            failed += 1;
        }
        for dish in recipes {
            if let Err(e) = self.store.save_dish_recipe(query, dish).await {
                tracing::warn!(dish = %dish.candidate.dish_name, error = %e, "Failed to persist dish record");
                failed += 1;
            }
        }

        if failed > 0 {
            tracing::warn!(failed, dishes = recipes.len(), "Results were only partly saved");
        }
        failed == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::events::{ProgressStage, ProgressStatus};
    use crate::skills::diversifier_skill::tests::{upstream_500, ScriptedClient};
    use serde_json::{json, Value};

    fn statuses(events: &[ProgressEvent]) -> Vec<(ProgressStatus, Option<ProgressStage>)> {
        events.iter().map(|e| (e.status, e.stage)).collect()
    }

    fn expected_sequence() -> Vec<(ProgressStatus, Option<ProgressStage>)> {
        vec![
            (ProgressStatus::Start, Some(ProgressStage::Initialization)),
            (ProgressStatus::Complete, Some(ProgressStage::Diversification)),
            (ProgressStatus::Complete, Some(ProgressStage::Recipes)),
            (ProgressStatus::Done, None),
        ]
    }

    fn rice_variants(count: usize) -> String {
        let items: Vec<Value> = (0..count)
            .map(|i| {
                json!({
                    "dish_name": format!("Rice Dish {}", i),
                    "local_name": format!("Local {}", i),
                    "region": "Region",
                    "culture_or_ethnicity": "Culture",
                    "similarity_score": (i as f64) / 20.0,
                    "recipe_search_prompt": format!("rice dish {}", i)
                })
            })
            .collect();
        Value::Array(items).to_string()
    }

    fn recipes(count: usize) -> String {
        let items: Vec<Value> = (0..count)
            .map(|i| json!({ "matched_recipe_title": format!("Recipe {}", i), "servings": 2 }))
            .collect();
        format!("```json\n{}\n```", Value::Array(items))
    }

    #[tokio::test]
    async fn test_upstream_failure_still_emits_four_events() {
        let dir = tempfile::tempdir().unwrap();
        let store = ResultStore::new(dir.path());
        let diversifier = Arc::new(ScriptedClient::new(vec![upstream_500()]));
        let enricher = Arc::new(ScriptedClient::new(vec![]));
        let (tx, mut rx) = mpsc::channel(8);

        let mut coordinator = Coordinator::new(
            diversifier,
            enricher.clone(),
            PipelineSettings::default(),
            store.clone(),
        )
        .with_event_channel(tx);
        let run = coordinator.run("Rice").await;

        assert!(run.dishes.is_empty());
        assert!(run.recipes.is_empty());
        assert_eq!(enricher.calls(), 0);
        assert_eq!(statuses(&run.events), expected_sequence());
        assert_eq!(run.events[1].result, Some(json!([])));
        assert_eq!(coordinator.stage(), PipelineStage::Done);

        let mut streamed = Vec::new();
        while let Ok(event) = rx.try_recv() {
            streamed.push(event);
        }
        assert_eq!(statuses(&streamed), expected_sequence());

        let record = store.load_query("rice").await.unwrap().unwrap();
        assert!(record.dishes.is_empty());
        assert!(run.persisted);
    }

    #[tokio::test]
    async fn test_rice_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let store = ResultStore::new(dir.path());
        let diversifier = Arc::new(ScriptedClient::new(vec![Ok(rice_variants(12))]));
        let enricher = Arc::new(ScriptedClient::new(vec![Ok(recipes(5)), Ok(recipes(5))]));

        let mut coordinator = Coordinator::new(
            diversifier,
            enricher.clone(),
            PipelineSettings {
                batch_size: 5,
                max_candidates: 10,
            },
            store.clone(),
        );
        let run = coordinator.run("Rice").await;

        // Diversifier order is kept in `dishes`; enrichment re-sorts.
        assert_eq!(run.dishes.len(), 12);
        assert_eq!(run.dishes[0].dish_name, "Rice Dish 0");
        assert!(run
            .dishes
            .iter()
            .all(|d| (0.0..=1.0).contains(&d.similarity_score)));

        assert_eq!(enricher.calls(), 2);
        assert_eq!(run.recipes.len(), 10);
        assert_eq!(run.recipes[0].candidate.dish_name, "Rice Dish 11");
        assert_eq!(run.recipes[9].candidate.dish_name, "Rice Dish 2");
        for batch in run.recipes.chunks(5) {
            assert!(batch
                .windows(2)
                .all(|w| w[0].candidate.similarity_score >= w[1].candidate.similarity_score));
        }

        let record = store.load_query("rice").await.unwrap().unwrap();
        assert_eq!(record.dishes.len(), 12);
        assert_eq!(record.recipes, run.recipes);

        let lookup = store
            .load_dish_recipe("rice-dish-11", Some("Rice"))
            .await
            .unwrap()
            .unwrap();
        assert!(!lookup.fallback);
        assert_eq!(lookup.record.recipe.matched_recipe_title, "Recipe 0");
        assert!(store
            .load_dish_recipe("rice dish 0", Some("Rice"))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_persistence_failure_does_not_stop_run() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not_a_dir");
        std::fs::write(&blocker, "file").unwrap();
        let diversifier = Arc::new(ScriptedClient::new(vec![Ok(rice_variants(2))]));
        let enricher = Arc::new(ScriptedClient::new(vec![Ok(recipes(2))]));

        let mut coordinator = Coordinator::new(
            diversifier,
            enricher,
            PipelineSettings::default(),
            ResultStore::new(&blocker),
        );
        let run = coordinator.run("Rice").await;

        assert!(!run.persisted);
        assert_eq!(run.recipes.len(), 2);
        assert_eq!(statuses(&run.events), expected_sequence());
    }

    #[tokio::test]
    async fn test_blocked_dish_write_does_not_skip_later_dishes() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("recipes")).unwrap();
        std::fs::write(dir.path().join("recipes").join("alpha"), "in the way").unwrap();
        let store = ResultStore::new(dir.path());

        let variants = json!([
            { "dish_name": "Alpha", "similarity_score": 0.9 },
            { "dish_name": "Beta", "similarity_score": 0.5 }
        ]);
        let mut coordinator = Coordinator::new(
            Arc::new(ScriptedClient::new(vec![Ok(variants.to_string())])),
            Arc::new(ScriptedClient::new(vec![Ok(recipes(2))])),
            PipelineSettings::default(),
            store.clone(),
        );
        let run = coordinator.run("Rice").await;

        assert!(!run.persisted);
        assert_eq!(run.recipes.len(), 2);
        assert_eq!(run.recipes[0].candidate.dish_name, "Alpha");

        let beta = store.load_dish_recipe("beta", Some("Rice")).await.unwrap().unwrap();
        assert_eq!(beta.record.recipe.matched_recipe_title, "Recipe 1");
        assert!(store.load_query("rice").await.unwrap().is_some());
        assert!(store.load_dish_recipe("alpha", None).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_dropped_receiver_does_not_stop_run() {
        let dir = tempfile::tempdir().unwrap();
        let (tx, rx) = mpsc::channel(1);
        drop(rx);

        let mut coordinator = Coordinator::new(
            Arc::new(ScriptedClient::new(vec![Ok(rice_variants(1))])),
            Arc::new(ScriptedClient::new(vec![Ok(recipes(1))])),
            PipelineSettings::default(),
            ResultStore::new(dir.path()),
        )
        .with_event_channel(tx);
        let run = coordinator.run("Rice").await;

        assert_eq!(run.events.len(), 4);
        assert_eq!(run.recipes.len(), 1);
    }
}
