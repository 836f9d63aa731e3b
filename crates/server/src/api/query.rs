//! # Query API
//!
//! Runs the pipeline for one concept and streams progress as NDJSON.

use axum::{
    body::Body,
    extract::{Query, State},
    http::header,
    response::{IntoResponse, Response},
};
use futures::StreamExt;
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use utoipa::IntoParams;

use super::SharedState;

pub const NDJSON: &str = "application/x-ndjson";

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct FoodQuery {
    /// Dish concept to diversify, e.g. "Rice"
    #[serde(default)]
    pub food: String,
}

/// Run the pipeline and stream its four progress events
///
/// The run happens in its own task, so a client that disconnects does not
/// stop it; results are persisted either way.
#[utoipa::path(
    method(get, post),
    path = "/api/query",
    tag = "pipeline",
    params(FoodQuery),
    responses(
        (status = 200, description = "Newline-delimited progress events", content_type = "application/x-ndjson")
    )
)]
pub async fn run_query(State(state): State<SharedState>, Query(params): Query<FoodQuery>) -> Response {
    let (tx, rx) = mpsc::channel(16);
    let mut coordinator = state.coordinator().with_event_channel(tx);
    let food = params.food;

    tracing::info!(food = %food, "Starting pipeline run");
    tokio::spawn(async move {
        coordinator.run(&food).await;
    });

    let lines = ReceiverStream::new(rx).map(|event| event.to_ndjson());
    ([(header::CONTENT_TYPE, NDJSON)], Body::from_stream(lines)).into_response()
}
