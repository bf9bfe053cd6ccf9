use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::error::CouchDaoError;
use crate::dao::models::GameEntity;

pub const GAME_PREFIX: &str = "game::";
pub const END_SUFFIX: &str = "\u{ffff}";

#[derive(Debug, Deserialize)]
pub struct AllDocsResponse {
    pub rows: Vec<AllDocsRow>,
}

#[derive(Debug, Deserialize)]
pub struct AllDocsRow {
    #[serde(default)]
    pub doc: Option<Value>,
}

/// Body returned by CouchDB for successful writes.
#[derive(Debug, Deserialize)]
pub struct WriteResponse {
    pub rev: String,
}

/// Game document: the entity flattened next to CouchDB's `_id`/`_rev`.
///
/// The entity's own `id` field is kept so that the document deserializes
/// straight back into a [`GameEntity`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CouchGameDocument {
    #[serde(rename = "_id")]
    pub doc_id: String,
    #[serde(rename = "_rev", skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,
    #[serde(flatten)]
    pub game: GameEntity,
}

impl CouchGameDocument {
    pub fn new(game: GameEntity, rev: Option<String>) -> Self {
        Self {
            doc_id: game_doc_id(game.id),
            rev,
            game,
        }
    }

    /// Check that `_id` and the embedded id agree before trusting the document.
    pub fn into_entity(self) -> Result<(Option<String>, GameEntity), CouchDaoError> {
        let id = extract_uuid(&self.doc_id)?;
        if id != self.game.id {
            return Err(CouchDaoError::InvalidDocId {
                doc_id: self.doc_id,
                kind: "does not match the embedded game id",
            });
        }
        Ok((self.rev, self.game))
    }
}

pub fn game_doc_id(id: Uuid) -> String {
    format!("{}{}", GAME_PREFIX, id)
}

pub fn extract_uuid(doc_id: &str) -> Result<Uuid, CouchDaoError> {
    let (_, id) = doc_id
        .split_once("::")
        .ok_or_else(|| CouchDaoError::InvalidDocId {
            doc_id: doc_id.to_string(),
            kind: "missing separator",
        })?;

    Uuid::parse_str(id).map_err(|_| CouchDaoError::InvalidDocId {
        doc_id: doc_id.to_string(),
        kind: "invalid UUID",
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::game::Game;

    #[test]
    fn document_flattens_the_entity_next_to_couch_keys() {
        let entity: GameEntity = Game::new("room".into(), "host".into()).into();
        let document = CouchGameDocument::new(entity.clone(), Some("3-abc".into()));

        let json = serde_json::to_value(&document).unwrap();
        assert_eq!(json["_id"], format!("game::{}", entity.id));
        assert_eq!(json["_rev"], "3-abc");
        assert_eq!(json["status"], "lobby");

        let parsed: CouchGameDocument = serde_json::from_value(json).unwrap();
        let (rev, back) = parsed.into_entity().unwrap();
        assert_eq!(rev.as_deref(), Some("3-abc"));
        assert_eq!(back, entity);
    }

    #[test]
    fn new_documents_omit_the_revision() {
        let entity: GameEntity = Game::new("room".into(), "host".into()).into();
        let json = serde_json::to_value(CouchGameDocument::new(entity, None)).unwrap();
        assert!(json.get("_rev").is_none());
    }

    #[test]
    fn mismatched_ids_are_rejected() {
        let entity: GameEntity = Game::new("room".into(), "host".into()).into();
        let mut document = CouchGameDocument::new(entity, None);
        document.doc_id = game_doc_id(Uuid::new_v4());
        assert!(matches!(
            document.into_entity(),
            Err(CouchDaoError::InvalidDocId { .. })
        ));
    }

    #[test]
    fn extract_uuid_requires_a_prefix() {
        assert!(extract_uuid("nope").is_err());
        let id = Uuid::new_v4();
        assert_eq!(extract_uuid(&game_doc_id(id)).unwrap(), id);
    }
}
