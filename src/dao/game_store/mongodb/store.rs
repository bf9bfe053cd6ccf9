use std::sync::Arc;

use futures::{TryStreamExt, future::BoxFuture};
use mongodb::{Collection, Database, IndexModel, bson::doc, options::IndexOptions};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    config::MongoConfig,
    connection::establish_connection,
    error::{MongoDaoError, MongoResult, is_duplicate_key},
    models::{MongoGameDocument, doc_id, doc_id_at_revision},
};
use crate::dao::{
    game_store::GameStore,
    models::{GameEntity, GameListItemEntity},
    storage::{Revision, StorageError, StorageResult, Versioned},
};

const GAME_COLLECTION_NAME: &str = "games";

/// MongoDB-backed store keeping a monotonically increasing `revision` field
/// on every game document.
#[derive(Clone)]
pub struct MongoGameStore {
    inner: Arc<MongoInner>,
}

struct MongoInner {
    database: RwLock<Database>,
    config: MongoConfig,
}

impl MongoInner {
    async fn ping(&self) -> MongoResult<()> {
        let database = self.database.read().await.clone();

        database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|source| MongoDaoError::HealthPing { source })?;
        Ok(())
    }

    async fn reconnect(&self) -> MongoResult<()> {
        let database =
            establish_connection(&self.config.options, &self.config.database_name).await?;
        *self.database.write().await = database;
        Ok(())
    }
}

impl MongoGameStore {
    /// Establish a connection to MongoDB and ensure indexes are present.
    pub async fn connect(config: MongoConfig) -> MongoResult<Self> {
        let database = establish_connection(&config.options, &config.database_name).await?;

        let inner = Arc::new(MongoInner {
            database: RwLock::new(database),
            config,
        });

        let store = Self { inner };
        store.ensure_indexes().await?;
        Ok(store)
    }

    async fn ensure_indexes(&self) -> MongoResult<()> {
        let index = IndexModel::builder()
            .keys(doc! {"created_at": 1})
            .options(
                IndexOptions::builder()
                    .name(Some("game_created_at_idx".to_owned()))
                    .build(),
            )
            .build();

        self.collection()
            .await
            .create_index(index)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: GAME_COLLECTION_NAME,
                index: "created_at",
                source,
            })?;

        Ok(())
    }

    async fn collection(&self) -> Collection<MongoGameDocument> {
        self.inner
            .database
            .read()
            .await
            .collection::<MongoGameDocument>(GAME_COLLECTION_NAME)
    }

    async fn create_game(&self, game: GameEntity) -> StorageResult<Revision> {
        const FIRST_REVISION: i64 = 1;

        let id = game.id;
        let document = MongoGameDocument::from_entity(game, FIRST_REVISION);
        match self.collection().await.insert_one(&document).await {
            Ok(_) => Ok(Revision::new(FIRST_REVISION.to_string())),
            Err(source) if is_duplicate_key(&source) => Err(StorageError::Conflict { id }),
            Err(source) => Err(MongoDaoError::CreateGame { id, source }.into()),
        }
    }

    async fn find_game(&self, id: Uuid) -> StorageResult<Option<Versioned<GameEntity>>> {
        let document = self
            .collection()
            .await
            .find_one(doc_id(id))
            .await
            .map_err(|source| MongoDaoError::LoadGame { id, source })?;

        let Some(document) = document else {
            return Ok(None);
        };

        let revision = Revision::new(document.revision.to_string());
        let value = document.try_into_entity()?;
        Ok(Some(Versioned { revision, value }))
    }

    async fn compare_and_swap(
        &self,
        expected: Revision,
        game: GameEntity,
    ) -> StorageResult<Revision> {
        let id = game.id;
        let Ok(expected) = expected.as_str().parse::<i64>() else {
            return Err(StorageError::Conflict { id });
        };

        let next = expected + 1;
        let collection = self.collection().await;
        let document = MongoGameDocument::from_entity(game, next);
        let result = collection
            .replace_one(doc_id_at_revision(id, expected), &document)
            .await
            .map_err(|source| MongoDaoError::UpdateGame { id, source })?;

        if result.matched_count > 0 {
            return Ok(Revision::new(next.to_string()));
        }

        // Nothing matched: either someone committed first or the game is gone.
        let still_exists = collection
            .count_documents(doc_id(id))
            .await
            .map_err(|source| MongoDaoError::LoadGame { id, source })?
            > 0;

        if still_exists {
            Err(StorageError::Conflict { id })
        } else {
            Err(StorageError::NotFound { id })
        }
    }

    async fn list_games(&self) -> StorageResult<Vec<GameListItemEntity>> {
        let documents: Vec<MongoGameDocument> = self
            .collection()
            .await
            .find(doc! {})
            .sort(doc! {"created_at": 1})
            .await
            .map_err(|source| MongoDaoError::ListGames { source })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::ListGames { source })?;

        let games = documents
            .into_iter()
            .map(|document| document.try_into_entity().map(GameListItemEntity::from))
            .collect::<MongoResult<Vec<_>>>()?;
        Ok(games)
    }

    async fn delete_game(&self, id: Uuid) -> StorageResult<bool> {
        let result = self
            .collection()
            .await
            .delete_one(doc_id(id))
            .await
            .map_err(|source| MongoDaoError::DeleteGame { id, source })?;
        Ok(result.deleted_count > 0)
    }
}

impl GameStore for MongoGameStore {
    fn create_game(&self, game: GameEntity) -> BoxFuture<'static, StorageResult<Revision>> {
        let store = self.clone();
        Box::pin(async move { store.create_game(game).await })
    }

    fn find_game(
        &self,
        id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<Versioned<GameEntity>>>> {
        let store = self.clone();
        Box::pin(async move { store.find_game(id).await })
    }

    fn compare_and_swap(
        &self,
        expected: Revision,
        game: GameEntity,
    ) -> BoxFuture<'static, StorageResult<Revision>> {
        let store = self.clone();
        Box::pin(async move { store.compare_and_swap(expected, game).await })
    }

    fn list_games(&self) -> BoxFuture<'static, StorageResult<Vec<GameListItemEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.list_games().await })
    }

    fn delete_game(&self, id: Uuid) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move { store.delete_game(id).await })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.ping().await.map_err(Into::into) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.reconnect().await.map_err(Into::into) })
    }
}
