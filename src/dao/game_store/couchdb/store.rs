use std::sync::Arc;

use futures::future::BoxFuture;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde_json::from_value;
use uuid::Uuid;

use crate::dao::{
    game_store::GameStore,
    models::{GameEntity, GameListItemEntity},
    storage::{Revision, StorageError, StorageResult, Versioned},
};

use super::{
    config::CouchConfig,
    error::{CouchDaoError, CouchResult},
    models::{AllDocsResponse, CouchGameDocument, END_SUFFIX, GAME_PREFIX, WriteResponse, game_doc_id},
};

const MAX_DELETE_ATTEMPTS: usize = 3;

/// CouchDB-backed store; compare-and-swap relies on CouchDB's own `_rev`.
#[derive(Clone)]
pub struct CouchGameStore {
    client: Client,
    base_url: Arc<str>,
    database: Arc<str>,
    auth: Option<(Arc<str>, Arc<str>)>,
}

/// Outcome of a conditional write once transport errors are ruled out.
enum WriteOutcome {
    Written(Revision),
    Conflict,
}

impl CouchGameStore {
    /// Establish a connection to CouchDB and ensure the database exists.
    pub async fn connect(config: CouchConfig) -> CouchResult<Self> {
        let client = Client::builder()
            .build()
            .map_err(|source| CouchDaoError::ClientBuilder { source })?;

        let store = Self {
            client,
            base_url: Arc::from(config.base_url.trim_end_matches('/')),
            database: Arc::from(config.database),
            auth: config
                .credentials
                .map(|(user, pass)| (Arc::from(user), Arc::from(pass))),
        };

        store.ensure_database().await?;
        Ok(store)
    }

    fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
        match self.auth {
            Some((ref user, ref pass)) => builder.basic_auth(user.as_ref(), Some(pass.as_ref())),
            None => builder,
        }
    }

    fn database_url(&self) -> String {
        format!("{}/{}", self.base_url, self.database)
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}/{}", self.database_url(), path);
        self.authorize(self.client.request(method, url))
    }

    async fn send(&self, builder: RequestBuilder, path: &str) -> CouchResult<Response> {
        builder
            .send()
            .await
            .map_err(|source| CouchDaoError::RequestSend {
                path: path.to_string(),
                source,
            })
    }

    async fn ensure_database(&self) -> CouchResult<()> {
        let database = self.database.to_string();
        let url = self.database_url();

        let response = self
            .authorize(self.client.get(&url))
            .send()
            .await
            .map_err(|source| CouchDaoError::DatabaseQuery {
                database: database.clone(),
                source,
            })?;

        match response.status() {
            StatusCode::OK => Ok(()),
            StatusCode::NOT_FOUND => {
                let create = self
                    .authorize(self.client.put(&url))
                    .send()
                    .await
                    .map_err(|source| CouchDaoError::DatabaseCreate {
                        database: database.clone(),
                        source,
                    })?;
                // 412 means a concurrent instance created it first.
                if create.status().is_success() || create.status() == StatusCode::PRECONDITION_FAILED
                {
                    Ok(())
                } else {
                    Err(CouchDaoError::DatabaseStatus {
                        database,
                        status: create.status(),
                    })
                }
            }
            other => Err(CouchDaoError::DatabaseStatus {
                database,
                status: other,
            }),
        }
    }

    async fn get_game_document(&self, doc_id: &str) -> CouchResult<Option<CouchGameDocument>> {
        let response = self.send(self.request(Method::GET, doc_id), doc_id).await?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => response
                .json::<CouchGameDocument>()
                .await
                .map(Some)
                .map_err(|source| CouchDaoError::DecodeResponse {
                    path: doc_id.to_string(),
                    source,
                }),
            other => Err(CouchDaoError::RequestStatus {
                path: doc_id.to_string(),
                status: other,
            }),
        }
    }

    /// PUT a document; CouchDB answers 409 when `_rev` is not the current one.
    async fn put_game_document(&self, document: &CouchGameDocument) -> CouchResult<WriteOutcome> {
        let doc_id = document.doc_id.as_str();
        let response = self
            .send(self.request(Method::PUT, doc_id).json(document), doc_id)
            .await?;

        match response.status() {
            StatusCode::CONFLICT => Ok(WriteOutcome::Conflict),
            status if status.is_success() => {
                let written = response.json::<WriteResponse>().await.map_err(|source| {
                    CouchDaoError::DecodeResponse {
                        path: doc_id.to_string(),
                        source,
                    }
                })?;
                Ok(WriteOutcome::Written(Revision::new(written.rev)))
            }
            other => Err(CouchDaoError::RequestStatus {
                path: doc_id.to_string(),
                status: other,
            }),
        }
    }

    async fn create_game(&self, game: GameEntity) -> StorageResult<Revision> {
        let id = game.id;
        let document = CouchGameDocument::new(game, None);
        match self.put_game_document(&document).await? {
            WriteOutcome::Written(revision) => Ok(revision),
            WriteOutcome::Conflict => Err(StorageError::Conflict { id }),
        }
    }

    async fn find_game(&self, id: Uuid) -> StorageResult<Option<Versioned<GameEntity>>> {
        let doc_id = game_doc_id(id);
        let Some(document) = self.get_game_document(&doc_id).await? else {
            return Ok(None);
        };

        let (rev, value) = document.into_entity()?;
        let revision = rev
            .map(Revision::new)
            .ok_or(CouchDaoError::MissingRevision { doc_id })?;
        Ok(Some(Versioned { revision, value }))
    }

    async fn compare_and_swap(
        &self,
        expected: Revision,
        game: GameEntity,
    ) -> StorageResult<Revision> {
        let id = game.id;
        let document = CouchGameDocument::new(game, Some(expected.as_str().to_owned()));
        match self.put_game_document(&document).await? {
            WriteOutcome::Written(revision) => Ok(revision),
            WriteOutcome::Conflict => {
                // A deleted document also rejects stale revisions with 409.
                if self.get_game_document(&document.doc_id).await?.is_some() {
                    Err(StorageError::Conflict { id })
                } else {
                    Err(StorageError::NotFound { id })
                }
            }
        }
    }

    async fn list_games(&self) -> CouchResult<Vec<GameListItemEntity>> {
        const ALL_DOCS: &str = "_all_docs";
        let query = [
            ("include_docs", "true".to_string()),
            ("startkey", format!("\"{}\"", GAME_PREFIX)),
            ("endkey", format!("\"{}{}\"", GAME_PREFIX, END_SUFFIX)),
        ];

        let response = self
            .send(self.request(Method::GET, ALL_DOCS).query(&query), ALL_DOCS)
            .await?;

        if !response.status().is_success() {
            return Err(CouchDaoError::RequestStatus {
                path: ALL_DOCS.to_string(),
                status: response.status(),
            });
        }

        let payload = response.json::<AllDocsResponse>().await.map_err(|source| {
            CouchDaoError::DecodeResponse {
                path: ALL_DOCS.to_string(),
                source,
            }
        })?;

        let mut games = Vec::with_capacity(payload.rows.len());
        for doc in payload.rows.into_iter().filter_map(|row| row.doc) {
            let document: CouchGameDocument =
                from_value(doc).map_err(|source| CouchDaoError::DeserializeValue {
                    path: ALL_DOCS.to_string(),
                    source,
                })?;
            let (_, entity) = document.into_entity()?;
            games.push(GameListItemEntity::from(entity));
        }
        games.sort_by_key(|game| game.created_at);

        Ok(games)
    }

    async fn delete_game(&self, id: Uuid) -> StorageResult<bool> {
        let doc_id = game_doc_id(id);

        for _ in 0..MAX_DELETE_ATTEMPTS {
            let Some(rev) = self
                .get_game_document(&doc_id)
                .await?
                .and_then(|document| document.rev)
            else {
                return Ok(false);
            };

            let response = self
                .send(
                    self.request(Method::DELETE, &doc_id)
                        .query(&[("rev", rev.as_str())]),
                    &doc_id,
                )
                .await?;

            match response.status() {
                status if status.is_success() => return Ok(true),
                StatusCode::NOT_FOUND => return Ok(false),
                StatusCode::CONFLICT => continue,
                other => {
                    return Err(CouchDaoError::RequestStatus {
                        path: doc_id,
                        status: other,
                    }
                    .into());
                }
            }
        }

        Err(StorageError::Conflict { id })
    }

    async fn health_check(&self) -> CouchResult<()> {
        let url = self.database_url();
        let response = self.send(self.authorize(self.client.get(&url)), &url).await?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(CouchDaoError::RequestStatus {
                path: url,
                status: response.status(),
            })
        }
    }
}

impl GameStore for CouchGameStore {
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
        Box::pin(async move { store.list_games().await.map_err(Into::into) })
    }

    fn delete_game(&self, id: Uuid) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move { store.delete_game(id).await })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.health_check().await.map_err(Into::into) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.ensure_database().await.map_err(Into::into) })
    }
}
