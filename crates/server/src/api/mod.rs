//! # HTTP API
//!
//! ```text
//! GET      /status
//! GET|POST /api/query?food=<concept>        NDJSON progress stream
//! GET      /api/v1/results                  stored query keys
//! GET      /api/v1/results/:query           stored run
//! GET      /api/v1/dishes/:dish?from=<q>    one dish record and the queries it was found from
//! GET      /api/v1/search?q=<term>          recipe search
//! GET      /api/v1/openapi.json
//! ```

pub mod error;
pub mod query;
pub mod results;

use anyhow::Result;
use atlas_core::models::{Credentials, PipelineSettings, Settings, DIVERSIFIER_AGENT, RECIPES_AGENT};
use atlas_core::orchestrator::Coordinator;
use atlas_core::skills::{ChatClient, HttpChatClient};
use atlas_core::state::ResultStore;
use atlas_core::tools::RecipeSearchClient;
use axum::{
    http::header,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use utoipa::{OpenApi, ToSchema};

use self::error::ApiError;

/// Application state
pub struct AppState {
    pub store: ResultStore,
    pub diversifier: Arc<dyn ChatClient>,
    pub recipes: Arc<dyn ChatClient>,
    pub limits: PipelineSettings,
    pub search: Option<RecipeSearchClient>,
}

pub type SharedState = Arc<AppState>;

impl AppState {
    /// Build every client from settings; an unusable agent profile is fatal
    pub async fn from_settings(settings: &Settings, store: ResultStore) -> Result<Self> {
        let credentials = Credentials::from_env(&settings.env.available_keys);
        let diversifier = HttpChatClient::from_settings(settings, DIVERSIFIER_AGENT, &credentials)?;
        let recipes = HttpChatClient::from_settings(settings, RECIPES_AGENT, &credentials)?;

        let search_credentials = Credentials::from_env(&settings.recipe_search.key_names);
        let search =
            RecipeSearchClient::from_settings(&settings.recipe_search, &search_credentials, &store)
                .await?;

        Ok(Self {
            store,
            diversifier: Arc::new(diversifier),
            recipes: Arc::new(recipes),
            limits: settings.pipeline,
            search: Some(search),
        })
    }

    /// Fresh coordinator for one run
    pub fn coordinator(&self) -> Coordinator {
        Coordinator::new(
            self.diversifier.clone(),
            self.recipes.clone(),
            self.limits,
            self.store.clone(),
        )
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct StatusResponse {
    pub status: String,
}

// === OpenAPI Definition ===

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Atlas API",
        version = "1.0.0",
        description = "Dish diversification and recipe enrichment"
    ),
    paths(
        get_status,
        query::run_query,
        results::list_results,
        results::get_result,
        results::get_dish,
        results::search
    ),
    components(
        schemas(
            StatusResponse,
            results::QueryListResponse,
            results::DishResponse
        )
    ),
    tags(
        (name = "pipeline", description = "Run the pipeline"),
        (name = "results", description = "Stored runs and dish records"),
        (name = "search", description = "Recipe database search")
    )
)]
pub struct ApiDoc;

/// Liveness check
#[utoipa::path(
    get,
    path = "/status",
    tag = "pipeline",
    responses(
        (status = 200, description = "Server is up", body = StatusResponse)
    )
)]
async fn get_status() -> Json<StatusResponse> {
    Json(StatusResponse {
        status: "ok".to_string(),
    })
}

async fn serve_openapi() -> Response {
    match ApiDoc::openapi().to_json() {
        Ok(spec) => ([(header::CONTENT_TYPE, "application/json")], spec).into_response(),
        Err(e) => ApiError::Other(e.into()).into_response(),
    }
}

pub fn router(state: SharedState) -> Router {
    let v1_routes = Router::new()
        .route("/results", get(results::list_results))
        .route("/results/:query", get(results::get_result))
        .route("/dishes/:dish", get(results::get_dish))
        .route("/search", get(results::search))
        .route("/openapi.json", get(serve_openapi));

    Router::new()
        .route("/status", get(get_status))
        .route("/api/query", get(query::run_query).post(query::run_query))
        .nest("/api/v1", v1_routes)
        .with_state(state)
}
