//! Process-local game store, used when no database is configured and in tests.

use std::sync::Arc;

use dashmap::{DashMap, mapref::entry::Entry};
use futures::future::BoxFuture;
use uuid::Uuid;

use crate::dao::{
    game_store::GameStore,
    models::{GameEntity, GameListItemEntity},
    storage::{Revision, StorageError, StorageResult, Versioned},
};

#[derive(Clone, Default)]
pub struct MemoryGameStore {
    games: Arc<DashMap<Uuid, StoredGame>>,
}

struct StoredGame {
    revision: u64,
    game: GameEntity,
}

impl MemoryGameStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn create(&self, game: GameEntity) -> StorageResult<Revision> {
        match self.games.entry(game.id) {
            Entry::Occupied(_) => Err(StorageError::Conflict { id: game.id }),
            Entry::Vacant(slot) => {
                slot.insert(StoredGame { revision: 1, game });
                Ok(Revision::new("1"))
            }
        }
    }

    fn find(&self, id: Uuid) -> Option<Versioned<GameEntity>> {
        self.games.get(&id).map(|stored| Versioned {
            revision: Revision::new(stored.revision.to_string()),
            value: stored.game.clone(),
        })
    }

    fn swap(&self, expected: &Revision, game: GameEntity) -> StorageResult<Revision> {
        let id = game.id;
        // The shard write lock is held for the whole check-and-replace.
        let mut stored = self
            .games
            .get_mut(&id)
            .ok_or(StorageError::NotFound { id })?;

        match expected.as_str().parse::<u64>() {
            Ok(revision) if revision == stored.revision => {
                stored.revision += 1;
                stored.game = game;
                Ok(Revision::new(stored.revision.to_string()))
            }
            _ => Err(StorageError::Conflict { id }),
        }
    }

    fn list(&self) -> Vec<GameListItemEntity> {
        let mut games = self
            .games
            .iter()
            .map(|entry| GameListItemEntity::from(entry.game.clone()))
            .collect::<Vec<_>>();
        games.sort_by_key(|game| game.created_at);
        games
    }
}

impl GameStore for MemoryGameStore {
    fn create_game(&self, game: GameEntity) -> BoxFuture<'static, StorageResult<Revision>> {
        let result = self.create(game);
        Box::pin(async move { result })
    }

    fn find_game(
        &self,
        id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<Versioned<GameEntity>>>> {
        let found = self.find(id);
        Box::pin(async move { Ok(found) })
    }

    fn compare_and_swap(
        &self,
        expected: Revision,
        game: GameEntity,
    ) -> BoxFuture<'static, StorageResult<Revision>> {
        let result = self.swap(&expected, game);
        Box::pin(async move { result })
    }

    fn list_games(&self) -> BoxFuture<'static, StorageResult<Vec<GameListItemEntity>>> {
        let games = self.list();
        Box::pin(async move { Ok(games) })
    }

    fn delete_game(&self, id: Uuid) -> BoxFuture<'static, StorageResult<bool>> {
        let deleted = self.games.remove(&id).is_some();
        Box::pin(async move { Ok(deleted) })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::game::Game;

    fn entity() -> GameEntity {
        Game::new("room".into(), "host".into()).into()
    }

    #[tokio::test]
    async fn swap_with_current_revision_bumps_it() {
        let store = MemoryGameStore::new();
        let game = entity();
        let first = store.create_game(game.clone()).await.unwrap();

        let mut renamed = game.clone();
        renamed.name = "renamed".into();
        let second = store.compare_and_swap(first.clone(), renamed).await.unwrap();
        assert_ne!(first, second);

        let stored = store.find_game(game.id).await.unwrap().unwrap();
        assert_eq!(stored.revision, second);
        assert_eq!(stored.value.name, "renamed");
    }

    #[tokio::test]
    async fn swap_with_stale_revision_conflicts() {
        let store = MemoryGameStore::new();
        let game = entity();
        let stale = store.create_game(game.clone()).await.unwrap();
        store
            .compare_and_swap(stale.clone(), game.clone())
            .await
            .unwrap();

        let err = store.compare_and_swap(stale, game.clone()).await.unwrap_err();
        assert!(matches!(err, StorageError::Conflict { id } if id == game.id));
    }

    #[tokio::test]
    async fn swap_on_deleted_record_is_not_found() {
        let store = MemoryGameStore::new();
        let game = entity();
        let revision = store.create_game(game.clone()).await.unwrap();
        assert!(store.delete_game(game.id).await.unwrap());
        assert!(!store.delete_game(game.id).await.unwrap());

        let err = store.compare_and_swap(revision, game).await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound { .. }));
    }

    #[tokio::test]
    async fn creating_an_existing_id_conflicts() {
        let store = MemoryGameStore::new();
        let game = entity();
        store.create_game(game.clone()).await.unwrap();
        assert!(matches!(
            store.create_game(game).await,
            Err(StorageError::Conflict { .. })
        ));
    }
}
