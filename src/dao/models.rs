use std::time::SystemTime;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use uuid::Uuid;

/// Roster entry stored with the game.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlayerEntity {
    /// Identifier supplied by the identity provider.
    pub id: String,
    /// Name displayed to the other participants.
    pub display_name: String,
}

/// Persisted role of a participant.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RoleEntity {
    Killer,
    Player,
}

/// Persisted status of a game.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GameStatusEntity {
    Lobby,
    InRound,
    RoundOver,
}

/// Role, guess, and score of one participant as stored.
#[skip_serializing_none]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RoleAssignmentEntity {
    pub role: RoleEntity,
    #[serde(default)]
    pub guess: Option<String>,
    #[serde(default)]
    pub points: u32,
}

/// Aggregate game entity persisted by the storage layer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GameEntity {
    /// Primary key of the game.
    pub id: Uuid,
    /// Room name shown in the lobby list.
    pub name: String,
    /// Display name of the participant who opened the room.
    pub created_by: String,
    /// Creation timestamp for auditing/debugging.
    pub created_at: SystemTime,
    /// Last time the game entity was updated.
    pub updated_at: SystemTime,
    /// Roster in join order.
    pub players: Vec<PlayerEntity>,
    /// Roles keyed by player identifier.
    #[serde(default)]
    pub roles: IndexMap<String, RoleAssignmentEntity>,
    /// Current status.
    pub status: GameStatusEntity,
    /// Number of deals since the game (re)started.
    #[serde(default)]
    pub round: u32,
}

/// Aggregate game list item entity (subset of GameEntity) persisted by the storage layer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GameListItemEntity {
    /// Primary key of the game.
    pub id: Uuid,
    /// Room name shown in the lobby list.
    pub name: String,
    /// Display name of the participant who opened the room.
    pub created_by: String,
    /// Creation timestamp.
    pub created_at: SystemTime,
    /// Number of players currently on the roster.
    pub player_count: usize,
    /// Current status.
    pub status: GameStatusEntity,
}

impl From<GameEntity> for GameListItemEntity {
    fn from(entity: GameEntity) -> Self {
        Self {
            id: entity.id,
            name: entity.name,
            created_by: entity.created_by,
            created_at: entity.created_at,
            player_count: entity.players.len(),
            status: entity.status,
        }
    }
}
