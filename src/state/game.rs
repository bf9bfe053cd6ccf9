use std::time::SystemTime;

use indexmap::IndexMap;
use uuid::Uuid;

use crate::{
    dao::models::{
        GameEntity, GameStatusEntity, PlayerEntity, RoleAssignmentEntity, RoleEntity,
    },
    state::state_machine::GameStatus,
};

/// Stable identifier handed out by the identity provider.
pub type PlayerId = String;

/// Secret role dealt to a participant for one round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// The one participant everybody else tries to identify.
    Killer,
    /// Regular participant.
    Player,
}

/// Denormalised copy of a connected participant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Player {
    /// Identifier supplied by the identity provider.
    pub id: PlayerId,
    /// Name displayed to the other participants.
    pub display_name: String,
}

/// Role, guess, and score of one participant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleAssignment {
    /// Role dealt for the current round.
    pub role: Role,
    /// Player this participant accused; final once set.
    pub guess: Option<PlayerId>,
    /// Cumulative score across the rounds of the current game.
    pub points: u32,
}

impl RoleAssignment {
    /// Fresh assignment without a guess.
    pub fn new(role: Role, points: u32) -> Self {
        Self {
            role,
            guess: None,
            points,
        }
    }

    /// Whether this assignment holds the killer role.
    pub fn is_killer(&self) -> bool {
        self.role == Role::Killer
    }
}

/// Authoritative record describing one room and its current round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Game {
    /// Primary key of the game.
    pub id: Uuid,
    /// Room name shown in the lobby list.
    pub name: String,
    /// Display name of the participant who opened the room.
    pub created_by: String,
    /// Creation timestamp.
    pub created_at: SystemTime,
    /// Last committed change.
    pub updated_at: SystemTime,
    /// Roster in join order.
    pub players: Vec<Player>,
    /// Roles keyed by player identifier, in the roster order of the last deal.
    pub roles: IndexMap<PlayerId, RoleAssignment>,
    /// Current status.
    pub status: GameStatus,
    /// Number of deals performed since the game (re)started.
    pub round: u32,
}

impl Game {
    /// Open an empty lobby.
    pub fn new(name: String, created_by: String) -> Self {
        let now = SystemTime::now();
        Self {
            id: Uuid::new_v4(),
            name,
            created_by,
            created_at: now,
            updated_at: now,
            players: Vec::new(),
            roles: IndexMap::new(),
            status: GameStatus::Lobby,
            round: 0,
        }
    }

    /// Look up a roster member.
    pub fn player(&self, id: &str) -> Option<&Player> {
        self.players.iter().find(|player| player.id == id)
    }

    /// Whether `id` is currently on the roster.
    pub fn is_on_roster(&self, id: &str) -> bool {
        self.player(id).is_some()
    }

    /// Identifier of the killer when exactly one is dealt.
    pub fn killer_id(&self) -> Option<&PlayerId> {
        let mut killers = self
            .roles
            .iter()
            .filter(|(_, assignment)| assignment.is_killer());
        match (killers.next(), killers.next()) {
            (Some((id, _)), None) => Some(id),
            _ => None,
        }
    }

    /// Score of a participant, zero when no role is dealt to them.
    pub fn points_of(&self, id: &str) -> u32 {
        self.roles.get(id).map(|r| r.points).unwrap_or_default()
    }
}

impl From<RoleEntity> for Role {
    fn from(value: RoleEntity) -> Self {
        match value {
            RoleEntity::Killer => Role::Killer,
            RoleEntity::Player => Role::Player,
        }
    }
}

impl From<Role> for RoleEntity {
    fn from(value: Role) -> Self {
        match value {
            Role::Killer => RoleEntity::Killer,
            Role::Player => RoleEntity::Player,
        }
    }
}

impl From<GameStatusEntity> for GameStatus {
    fn from(value: GameStatusEntity) -> Self {
        match value {
            GameStatusEntity::Lobby => GameStatus::Lobby,
            GameStatusEntity::InRound => GameStatus::InRound,
            GameStatusEntity::RoundOver => GameStatus::RoundOver,
        }
    }
}

impl From<GameStatus> for GameStatusEntity {
    fn from(value: GameStatus) -> Self {
        match value {
            GameStatus::Lobby => GameStatusEntity::Lobby,
            GameStatus::InRound => GameStatusEntity::InRound,
            GameStatus::RoundOver => GameStatusEntity::RoundOver,
        }
    }
}

impl From<PlayerEntity> for Player {
    fn from(value: PlayerEntity) -> Self {
        Self {
            id: value.id,
            display_name: value.display_name,
        }
    }
}

impl From<Player> for PlayerEntity {
    fn from(value: Player) -> Self {
        Self {
            id: value.id,
            display_name: value.display_name,
        }
    }
}

impl From<RoleAssignmentEntity> for RoleAssignment {
    fn from(value: RoleAssignmentEntity) -> Self {
        Self {
            role: value.role.into(),
            guess: value.guess,
            points: value.points,
        }
    }
}

impl From<RoleAssignment> for RoleAssignmentEntity {
    fn from(value: RoleAssignment) -> Self {
        Self {
            role: value.role.into(),
            guess: value.guess,
            points: value.points,
        }
    }
}

impl From<GameEntity> for Game {
    fn from(value: GameEntity) -> Self {
        Self {
            id: value.id,
            name: value.name,
            created_by: value.created_by,
            created_at: value.created_at,
            updated_at: value.updated_at,
            players: value.players.into_iter().map(Into::into).collect(),
            roles: value
                .roles
                .into_iter()
                .map(|(id, assignment)| (id, assignment.into()))
                .collect(),
            status: value.status.into(),
            round: value.round,
        }
    }
}

impl From<Game> for GameEntity {
    fn from(value: Game) -> Self {
        Self {
            id: value.id,
            name: value.name,
            created_by: value.created_by,
            created_at: value.created_at,
            updated_at: value.updated_at,
            players: value.players.into_iter().map(Into::into).collect(),
            roles: value
                .roles
                .into_iter()
                .map(|(id, assignment)| (id, assignment.into()))
                .collect(),
            status: value.status.into(),
            round: value.round,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn game_with_roles(roles: &[(&str, Role)]) -> Game {
        let mut game = Game::new("room".into(), "alice".into());
        game.status = GameStatus::InRound;
        for (id, role) in roles {
            game.players.push(Player {
                id: id.to_string(),
                display_name: id.to_uppercase(),
            });
            game.roles
                .insert(id.to_string(), RoleAssignment::new(*role, 0));
        }
        game
    }

    #[test]
    fn new_game_opens_an_empty_lobby() {
        let game = Game::new("Friday".into(), "alice".into());
        assert_eq!(game.status, GameStatus::Lobby);
        assert!(game.players.is_empty());
        assert!(game.roles.is_empty());
        assert_eq!(game.round, 0);
    }

    #[test]
    fn killer_id_requires_exactly_one_killer() {
        let game = game_with_roles(&[("a", Role::Player), ("b", Role::Killer)]);
        assert_eq!(game.killer_id().map(String::as_str), Some("b"));

        let none = game_with_roles(&[("a", Role::Player)]);
        assert_eq!(none.killer_id(), None);

        let two = game_with_roles(&[("a", Role::Killer), ("b", Role::Killer)]);
        assert_eq!(two.killer_id(), None);
    }

    #[test]
    fn entity_conversion_keeps_role_order_and_guesses() {
        let mut game = game_with_roles(&[("c", Role::Player), ("a", Role::Killer)]);
        game.roles["c"].guess = Some("a".into());
        game.roles["c"].points = 3;

        let entity: GameEntity = game.clone().into();
        assert_eq!(
            entity.roles.keys().collect::<Vec<_>>(),
            vec!["c", "a"]
        );

        let back: Game = entity.into();
        assert_eq!(back, game);
    }
}
