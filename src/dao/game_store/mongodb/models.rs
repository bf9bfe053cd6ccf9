use mongodb::bson::{DateTime, Document, doc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::{MongoDaoError, MongoResult};
use crate::dao::models::{
    GameEntity, GameStatusEntity, PlayerEntity, RoleAssignmentEntity, RoleEntity,
};

/// Game record as stored in the `games` collection.
///
/// Roles are kept as an ordered array since player identifiers are not
/// guaranteed to be valid field names.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoGameDocument {
    #[serde(rename = "_id")]
    pub id: String,
    pub revision: i64,
    pub name: String,
    pub created_by: String,
    pub created_at: DateTime,
    pub updated_at: DateTime,
    pub players: Vec<PlayerEntity>,
    #[serde(default)]
    pub roles: Vec<MongoRoleDocument>,
    pub status: GameStatusEntity,
    #[serde(default)]
    pub round: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoRoleDocument {
    pub player_id: String,
    pub role: RoleEntity,
    #[serde(default)]
    pub guess: Option<String>,
    #[serde(default)]
    pub points: u32,
}

impl MongoGameDocument {
    pub fn from_entity(game: GameEntity, revision: i64) -> Self {
        Self {
            id: game.id.to_string(),
            revision,
            name: game.name,
            created_by: game.created_by,
            created_at: DateTime::from_system_time(game.created_at),
            updated_at: DateTime::from_system_time(game.updated_at),
            players: game.players,
            roles: game
                .roles
                .into_iter()
                .map(|(player_id, assignment)| MongoRoleDocument {
                    player_id,
                    role: assignment.role,
                    guess: assignment.guess,
                    points: assignment.points,
                })
                .collect(),
            status: game.status,
            round: game.round,
        }
    }

    pub fn try_into_entity(self) -> MongoResult<GameEntity> {
        let id = Uuid::parse_str(&self.id).map_err(|source| MongoDaoError::InvalidId {
            id: self.id.clone(),
            source,
        })?;

        Ok(GameEntity {
            id,
            name: self.name,
            created_by: self.created_by,
            created_at: self.created_at.to_system_time(),
            updated_at: self.updated_at.to_system_time(),
            players: self.players,
            roles: self
                .roles
                .into_iter()
                .map(|role| {
                    (
                        role.player_id,
                        RoleAssignmentEntity {
                            role: role.role,
                            guess: role.guess,
                            points: role.points,
                        },
                    )
                })
                .collect(),
            status: self.status,
            round: self.round,
        })
    }
}

pub fn doc_id(id: Uuid) -> Document {
    doc! {"_id": id.to_string()}
}

pub fn doc_id_at_revision(id: Uuid, revision: i64) -> Document {
    doc! {"_id": id.to_string(), "revision": revision}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{
        game::{Game, Player, Role, RoleAssignment},
        state_machine::GameStatus,
    };

    #[test]
    fn roles_survive_the_array_layout_in_order() {
        let mut game = Game::new("room".into(), "host".into());
        game.status = GameStatus::InRound;
        game.round = 2;
        for id in ["z.dot", "a$b"] {
            game.players.push(Player {
                id: id.into(),
                display_name: id.into(),
            });
        }
        game.roles
            .insert("z.dot".into(), RoleAssignment::new(Role::Killer, 4));
        let mut guesser = RoleAssignment::new(Role::Player, 1);
        guesser.guess = Some("z.dot".into());
        game.roles.insert("a$b".into(), guesser);

        let entity: GameEntity = game.into();
        let document = MongoGameDocument::from_entity(entity.clone(), 3);
        assert_eq!(document.roles[0].player_id, "z.dot");

        let back = document.try_into_entity().unwrap();
        assert_eq!(back.roles, entity.roles);
        assert_eq!(back.id, entity.id);
        assert_eq!(back.round, 2);
    }

    #[test]
    fn malformed_identifier_is_reported() {
        let entity: GameEntity = Game::new("room".into(), "host".into()).into();
        let mut document = MongoGameDocument::from_entity(entity, 1);
        document.id = "not-a-uuid".into();
        assert!(matches!(
            document.try_into_entity(),
            Err(MongoDaoError::InvalidId { .. })
        ));
    }
}
