#[cfg(feature = "couch-store")]
pub mod couchdb;
pub mod memory;
#[cfg(feature = "mongo-store")]
pub mod mongodb;

use crate::dao::models::{GameEntity, GameListItemEntity};
use crate::dao::storage::{Revision, StorageResult, Versioned};
use futures::future::BoxFuture;
use uuid::Uuid;

/// Abstraction over the persistence layer for game records.
///
/// Writes after creation go through [`GameStore::compare_and_swap`] so that
/// concurrent read-modify-write cycles never silently overwrite each other.
pub trait GameStore: Send + Sync {
    /// Insert a brand-new record, failing with `Conflict` if the id exists.
    fn create_game(&self, game: GameEntity) -> BoxFuture<'static, StorageResult<Revision>>;
    /// Read a record with the revision it is stored at.
    fn find_game(&self, id: Uuid)
    -> BoxFuture<'static, StorageResult<Option<Versioned<GameEntity>>>>;
    /// Replace the record only if it is still at `expected`.
    ///
    /// Fails with `Conflict` when another writer committed in between and with
    /// `NotFound` when the record was deleted.
    fn compare_and_swap(
        &self,
        expected: Revision,
        game: GameEntity,
    ) -> BoxFuture<'static, StorageResult<Revision>>;
    /// Directory listing, oldest game first.
    fn list_games(&self) -> BoxFuture<'static, StorageResult<Vec<GameListItemEntity>>>;
    /// Remove a record; `false` when it did not exist.
    fn delete_game(&self, id: Uuid) -> BoxFuture<'static, StorageResult<bool>>;
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>>;
}
