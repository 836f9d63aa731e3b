//! # Results API
//!
//! Read access to persisted runs, plus the recipe-search passthrough.

use atlas_core::skills::EnrichedDish;
use atlas_core::state::QueryRecord;
use atlas_core::tools::SearchOutcome;
use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::{IntoParams, ToSchema};

use super::error::{ApiError, ApiResult};
use super::SharedState;

#[derive(Debug, Serialize, ToSchema)]
pub struct QueryListResponse {
    /// Normalized query keys, sorted
    pub queries: Vec<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DishResponse {
    pub dish_key: String,
    /// Query the record was stored under
    pub query_key: String,
    /// True when no record existed for the requested query
    pub fallback: bool,
    /// Every query this dish has a stored record for
    pub sources: Vec<String>,
    #[schema(value_type = Object)]
    pub record: EnrichedDish,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct DishParams {
    /// Query the dish was found from
    pub from: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SearchParams {
    /// Search term; prompt phrasing like "how to cook" is stripped
    #[serde(default)]
    pub q: String,
}

/// List stored queries
#[utoipa::path(
    get,
    path = "/api/v1/results",
    tag = "results",
    responses(
        (status = 200, description = "Stored query keys", body = QueryListResponse)
    )
)]
pub async fn list_results(State(state): State<SharedState>) -> ApiResult<Json<QueryListResponse>> {
    let queries = state.store.list_queries().await?;
    Ok(Json(QueryListResponse { queries }))
}

/// Get the stored result of a query
#[utoipa::path(
    get,
    path = "/api/v1/results/{query}",
    tag = "results",
    params(("query" = String, Path, description = "Query as typed; normalized before lookup")),
    responses(
        (status = 200, description = "Stored dishes and recipes", content_type = "application/json"),
        (status = 404, description = "No result stored for this query")
    )
)]
pub async fn get_result(
    State(state): State<SharedState>,
    Path(query): Path<String>,
) -> ApiResult<Json<QueryRecord>> {
    state
        .store
        .load_query(&query)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("no result for query '{}'", query)))
}

/// Get one dish's recipe as found from a query
#[utoipa::path(
    get,
    path = "/api/v1/dishes/{dish}",
    tag = "results",
    params(
        ("dish" = String, Path, description = "Dish name, e.g. jollof-rice"),
        DishParams
    ),
    responses(
        (status = 200, description = "Merged dish record", body = DishResponse),
        (status = 404, description = "Dish never stored")
    )
)]
pub async fn get_dish(
    State(state): State<SharedState>,
    Path(dish): Path<String>,
    Query(params): Query<DishParams>,
) -> ApiResult<Json<DishResponse>> {
    let lookup = state
        .store
        .load_dish_recipe(&dish, params.from.as_deref())
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("no recipe stored for dish '{}'", dish)))?;
    let sources = state.store.list_dish_sources(&dish).await?;

    Ok(Json(DishResponse {
        dish_key: lookup.dish_key,
        query_key: lookup.query_key,
        fallback: lookup.fallback,
        sources,
        record: lookup.record,
    }))
}

/// Search the recipe database
#[utoipa::path(
    get,
    path = "/api/v1/search",
    tag = "search",
    params(SearchParams),
    responses(
        (status = 200, description = "Raw search response", content_type = "application/json"),
        (status = 429, description = "Every search key is rate limited"),
        (status = 503, description = "Recipe search not configured")
    )
)]
pub async fn search(
    State(state): State<SharedState>,
    Query(params): Query<SearchParams>,
) -> ApiResult<Json<Value>> {
    let client = state
        .search
        .as_ref()
        .ok_or_else(|| ApiError::Unavailable("recipe search is not configured".to_string()))?;

    match client.search(&params.q).await? {
        SearchOutcome::Found(value) => Ok(Json(value)),
        SearchOutcome::RateLimited { status } => Err(ApiError::RateLimited(status)),
    }
}
