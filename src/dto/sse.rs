use serde::Serialize;

/// Event name carrying a full [`GameView`](crate::dto::game::GameView).
pub const GAME_STATE_EVENT: &str = "game.state";
/// Event name sent once when the watched game is deleted.
pub const GAME_DELETED_EVENT: &str = "game.deleted";

#[derive(Clone, Debug)]
/// Dispatched payload carried across SSE channels.
pub struct ServerEvent {
    pub event: Option<String>,
    pub data: String,
}

impl ServerEvent {
    /// Convenience wrapper that serialises `payload` into the SSE data field.
    pub fn json<E, T>(event: E, payload: &T) -> serde_json::Result<Self>
    where
        E: Into<Option<String>>,
        T: Serialize,
    {
        Ok(Self {
            event: event.into(),
            data: serde_json::to_string(payload)?,
        })
    }
}
