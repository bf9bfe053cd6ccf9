use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for Killer Rounds Back.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::games::list_games,
        crate::routes::games::create_game,
        crate::routes::games::get_game,
        crate::routes::games::delete_game,
        crate::routes::round::join_roster,
        crate::routes::round::leave_roster,
        crate::routes::round::assign_roles,
        crate::routes::round::submit_guess,
        crate::routes::round::start_new_round,
        crate::routes::round::start_new_game,
        crate::routes::sse::game_stream,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::health::HealthStatus,
            crate::dto::game::CreateGameRequest,
            crate::dto::game::JoinRequest,
            crate::dto::game::GuessRequest,
            crate::dto::game::GameListItem,
            crate::dto::game::GameView,
            crate::dto::game::PlayerView,
            crate::dto::game::RoleDto,
            crate::dto::game::VisibleGameStatus,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "games", description = "Room directory"),
        (name = "round", description = "Roster and round intents"),
        (name = "sse", description = "Server-sent events streams"),
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_every_route() {
        let doc = ApiDoc::openapi();
        for path in [
            "/healthcheck",
            "/games",
            "/games/{id}",
            "/games/{id}/players",
            "/games/{id}/players/{player_id}",
            "/games/{id}/round/assign",
            "/games/{id}/guesses",
            "/games/{id}/round/next",
            "/games/{id}/round/new-game",
            "/games/{id}/events",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
    }
}
