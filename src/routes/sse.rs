use std::convert::Infallible;

use axum::{
    Router,
    extract::{Path, Query, State},
    response::sse::{Event, Sse},
    routing::get,
};
use futures::Stream;
use tracing::info;
use uuid::Uuid;

use crate::{
    dto::game::ViewerQuery, error::AppError, services::sse_service, state::SharedState,
};

#[utoipa::path(
    get,
    path = "/games/{id}/events",
    tag = "sse",
    params(("id" = Uuid, Path, description = "Identifier of the game"), ViewerQuery),
    responses(
        (status = 200, description = "`game.state` events carrying a GameView, then `game.deleted`", content_type = "text/event-stream", body = String),
        (status = 404, description = "Unknown game")
    )
)]
/// Stream the game state: once on connect, then after every committed change.
pub async fn game_stream(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Query(query): Query<ViewerQuery>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    let (receiver, game) = sse_service::subscribe_game(&state, id).await?;
    info!(game_id = %id, viewer = query.viewer.as_deref(), "new game SSE connection");
    Ok(sse_service::to_sse_stream(receiver, game, query.viewer))
}

/// Configure the SSE endpoints.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new().route("/games/{id}/events", get(game_stream))
}
