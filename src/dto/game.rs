use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dao::models::{GameListItemEntity, GameStatusEntity},
    dto::{format_system_time, validation::validate_identifier},
    state::{
        game::{Game, Role},
        state_machine::GameStatus,
    },
};

/// Payload used to open a new room.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct CreateGameRequest {
    /// Room name; a timestamped default is used when omitted or blank.
    #[serde(default)]
    #[validate(length(max = 100))]
    pub name: Option<String>,
    /// Display name of the participant opening the room.
    #[validate(length(min = 1, max = 64))]
    pub created_by: String,
}

/// Payload used to add a participant to the roster.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct JoinRequest {
    #[validate(custom(function = "validate_identifier"))]
    pub player_id: String,
    #[validate(length(min = 1, max = 64))]
    pub display_name: String,
}

/// Payload used to lock in a guess.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct GuessRequest {
    /// Participant submitting the guess.
    #[validate(custom(function = "validate_identifier"))]
    pub player_id: String,
    /// Participant accused of being the killer.
    #[validate(custom(function = "validate_identifier"))]
    pub target_id: String,
}

/// Identifies who is looking at a game, which decides what is revealed.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ViewerQuery {
    /// Player identifier of the viewer; anonymous viewers see no roles mid-round.
    pub viewer: Option<String>,
}

/// Status exposed to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum VisibleGameStatus {
    Lobby,
    InRound,
    RoundOver,
}

impl From<GameStatus> for VisibleGameStatus {
    fn from(value: GameStatus) -> Self {
        match value {
            GameStatus::Lobby => VisibleGameStatus::Lobby,
            GameStatus::InRound => VisibleGameStatus::InRound,
            GameStatus::RoundOver => VisibleGameStatus::RoundOver,
        }
    }
}

impl From<GameStatusEntity> for VisibleGameStatus {
    fn from(value: GameStatusEntity) -> Self {
        GameStatus::from(value).into()
    }
}

/// Role exposed to clients once visible to them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum RoleDto {
    Killer,
    Player,
}

impl From<Role> for RoleDto {
    fn from(value: Role) -> Self {
        match value {
            Role::Killer => RoleDto::Killer,
            Role::Player => RoleDto::Player,
        }
    }
}

/// Entry of the room directory.
#[derive(Debug, Serialize, ToSchema)]
pub struct GameListItem {
    pub id: Uuid,
    pub name: String,
    pub created_by: String,
    pub created_at: String,
    pub player_count: usize,
    pub status: VisibleGameStatus,
}

impl From<GameListItemEntity> for GameListItem {
    fn from(value: GameListItemEntity) -> Self {
        Self {
            id: value.id,
            name: value.name,
            created_by: value.created_by,
            created_at: format_system_time(value.created_at),
            player_count: value.player_count,
            status: value.status.into(),
        }
    }
}

/// One roster entry as seen by a given viewer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct PlayerView {
    pub id: String,
    pub display_name: String,
    /// Hidden mid-round unless this entry is the viewer.
    pub role: Option<RoleDto>,
    /// Whether a guess was locked in this round.
    pub has_guessed: bool,
    /// Accused player; hidden mid-round unless this entry is the viewer.
    pub guess: Option<String>,
    pub points: u32,
}

/// Game state as seen by a given viewer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct GameView {
    pub id: Uuid,
    pub name: String,
    pub created_by: String,
    pub created_at: String,
    pub updated_at: String,
    pub status: VisibleGameStatus,
    pub round: u32,
    pub players: Vec<PlayerView>,
    /// Revealed once the round is over.
    pub killer_id: Option<String>,
}

impl GameView {
    /// Project `game` for `viewer`, masking what they are not allowed to see yet.
    pub fn for_viewer(game: &Game, viewer: Option<&str>) -> Self {
        let revealed = game.status == GameStatus::RoundOver;

        let players = game
            .players
            .iter()
            .map(|player| {
                let assignment = game.roles.get(&player.id);
                let visible = revealed || viewer == Some(player.id.as_str());
                PlayerView {
                    id: player.id.clone(),
                    display_name: player.display_name.clone(),
                    role: assignment
                        .filter(|_| visible)
                        .map(|assignment| assignment.role.into()),
                    has_guessed: assignment.is_some_and(|a| a.guess.is_some()),
                    guess: assignment
                        .filter(|_| visible)
                        .and_then(|assignment| assignment.guess.clone()),
                    points: game.points_of(&player.id),
                }
            })
            .collect();

        Self {
            id: game.id,
            name: game.name.clone(),
            created_by: game.created_by.clone(),
            created_at: format_system_time(game.created_at),
            updated_at: format_system_time(game.updated_at),
            status: game.status.into(),
            round: game.round,
            players,
            killer_id: if revealed {
                game.killer_id().cloned()
            } else {
                None
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::game::{Player, RoleAssignment};

    fn round_in_progress() -> Game {
        let mut game = Game::new("room".into(), "host".into());
        for id in ["a", "b", "c"] {
            game.players.push(Player {
                id: id.into(),
                display_name: id.to_uppercase(),
            });
        }
        game.roles
            .insert("a".into(), RoleAssignment::new(Role::Killer, 2));
        let mut b = RoleAssignment::new(Role::Player, 1);
        b.guess = Some("a".into());
        game.roles.insert("b".into(), b);
        game.roles
            .insert("c".into(), RoleAssignment::new(Role::Player, 0));
        game.status = GameStatus::InRound;
        game.round = 1;
        game
    }

    #[test]
    fn mid_round_view_only_shows_the_viewer_role() {
        let game = round_in_progress();
        let view = GameView::for_viewer(&game, Some("b"));

        assert_eq!(view.killer_id, None);
        assert_eq!(view.players[0].role, None);
        assert_eq!(view.players[1].role, Some(RoleDto::Player));
        assert_eq!(view.players[1].guess.as_deref(), Some("a"));
        assert!(view.players[1].has_guessed);
        assert!(!view.players[2].has_guessed);
        assert_eq!(view.players[0].points, 2);
    }

    #[test]
    fn anonymous_viewer_sees_no_roles_mid_round() {
        let game = round_in_progress();
        let view = GameView::for_viewer(&game, None);
        assert!(view.players.iter().all(|player| player.role.is_none()));
        assert!(view.players.iter().all(|player| player.guess.is_none()));
    }

    #[test]
    fn finished_round_reveals_everything() {
        let mut game = round_in_progress();
        game.status = GameStatus::RoundOver;
        let view = GameView::for_viewer(&game, None);

        assert_eq!(view.killer_id.as_deref(), Some("a"));
        assert_eq!(view.players[0].role, Some(RoleDto::Killer));
        assert_eq!(view.players[1].guess.as_deref(), Some("a"));
        assert_eq!(view.status, VisibleGameStatus::RoundOver);
    }

    #[test]
    fn late_joiner_has_no_role_yet() {
        let mut game = round_in_progress();
        game.players.push(Player {
            id: "d".into(),
            display_name: "D".into(),
        });
        let view = GameView::for_viewer(&game, Some("d"));
        let late = &view.players[3];
        assert_eq!(late.role, None);
        assert!(!late.has_guessed);
        assert_eq!(late.points, 0);
    }

    #[test]
    fn requests_validate_identifiers_and_names() {
        let guess = GuessRequest {
            player_id: "a b".into(),
            target_id: "c".into(),
        };
        assert!(guess.validate().is_err());

        let join = JoinRequest {
            player_id: "a".into(),
            display_name: String::new(),
        };
        assert!(join.validate().is_err());

        let create = CreateGameRequest {
            name: Some("x".repeat(101)),
            created_by: "host".into(),
        };
        assert!(create.validate().is_err());

        let create = CreateGameRequest {
            name: None,
            created_by: "host".into(),
        };
        assert!(create.validate().is_ok());
    }
}
