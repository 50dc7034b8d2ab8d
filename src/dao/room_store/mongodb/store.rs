use std::{sync::Arc, time::Duration};

use futures::{TryStreamExt, future::BoxFuture};
use mongodb::{
    Collection, Database,
    bson::{DateTime, doc},
    error::{ErrorKind, WriteFailure},
    options::IndexOptions,
};
use tokio::sync::RwLock;

use super::{
    config::MongoConfig,
    connection::establish_connection,
    error::{MongoDaoError, MongoResult},
    models::{MongoRoomDocument, live_room, live_room_at},
};
use crate::dao::{
    models::RoomEntity,
    room_store::RoomStore,
    storage::{StorageError, StorageResult},
};

const ROOM_COLLECTION_NAME: &str = "rooms";
const DUPLICATE_KEY_CODE: i32 = 11000;

#[derive(Clone)]
pub struct MongoRoomStore {
    inner: Arc<MongoInner>,
}

struct MongoInner {
    state: RwLock<MongoState>,
    config: MongoConfig,
}

struct MongoState {
    database: Database,
}

impl MongoInner {
    async fn ping(&self) -> MongoResult<()> {
        let database = {
            let guard = self.state.read().await;
            guard.database.clone()
        };

        database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|source| MongoDaoError::HealthPing { source })?;
        Ok(())
    }

    async fn reconnect(&self) -> MongoResult<()> {
        let database =
            establish_connection(&self.config.options, &self.config.database_name).await?;
        self.state.write().await.database = database;
        Ok(())
    }
}

impl MongoRoomStore {
    /// Establish a connection to MongoDB and ensure indexes are present.
    pub async fn connect(config: MongoConfig) -> MongoResult<Self> {
        let database = establish_connection(&config.options, &config.database_name).await?;

        let inner = Arc::new(MongoInner {
            state: RwLock::new(MongoState { database }),
            config,
        });

        let store = Self { inner };
        store.ensure_indexes().await?;
        Ok(store)
    }

    async fn ensure_indexes(&self) -> MongoResult<()> {
        let collection = self.collection().await;

        let set_index = mongodb::IndexModel::builder()
            .keys(doc! {"set_id": 1, "created_at": 1})
            .options(
                IndexOptions::builder()
                    .name(Some("room_set_idx".to_owned()))
                    .build(),
            )
            .build();

        collection
            .create_index(set_index)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: ROOM_COLLECTION_NAME,
                index: "set_id",
                source,
            })?;

        // The server drops documents once `expires_at` is in the past.
        let ttl_index = mongodb::IndexModel::builder()
            .keys(doc! {"expires_at": 1})
            .options(
                IndexOptions::builder()
                    .name(Some("room_expiry_ttl".to_owned()))
                    .expire_after(Some(Duration::ZERO))
                    .build(),
            )
            .build();

        collection
            .create_index(ttl_index)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: ROOM_COLLECTION_NAME,
                index: "expires_at",
                source,
            })?;

        Ok(())
    }

    async fn collection(&self) -> Collection<MongoRoomDocument> {
        let guard = self.inner.state.read().await;
        guard
            .database
            .collection::<MongoRoomDocument>(ROOM_COLLECTION_NAME)
    }

    async fn insert_room(&self, room: RoomEntity) -> StorageResult<()> {
        let code = room.code.clone();
        let document: MongoRoomDocument = room.into();
        let collection = self.collection().await;

        match collection.insert_one(&document).await {
            Ok(_) => Ok(()),
            Err(err) if is_duplicate_key(&err) => {
                // Records outlive their expiry until the TTL monitor runs.
                let result = collection
                    .replace_one(
                        doc! { "_id": &code, "expires_at": { "$lte": DateTime::now() } },
                        &document,
                    )
                    .await
                    .map_err(|source| MongoDaoError::SaveRoom {
                        code: code.clone(),
                        source,
                    })?;

                if result.matched_count == 0 {
                    Err(StorageError::AlreadyExists { key: code })
                } else {
                    Ok(())
                }
            }
            Err(source) => Err(MongoDaoError::SaveRoom { code, source }.into()),
        }
    }

    async fn find_room(&self, code: String) -> MongoResult<Option<RoomEntity>> {
        let collection = self.collection().await;

        collection
            .find_one(live_room(&code))
            .await
            .map(|maybe_doc| maybe_doc.map(Into::into))
            .map_err(|source| MongoDaoError::LoadRoom { code, source })
    }

    async fn exists(&self, code: &str) -> MongoResult<bool> {
        let collection = self.collection().await;
        let count = collection
            .count_documents(live_room(code))
            .await
            .map_err(|source| MongoDaoError::LoadRoom {
                code: code.to_owned(),
                source,
            })?;
        Ok(count > 0)
    }

    async fn replace_room(&self, room: RoomEntity, expected_version: u64) -> StorageResult<()> {
        let code = room.code.clone();
        let document: MongoRoomDocument = room.into();
        let collection = self.collection().await;

        let result = collection
            .replace_one(live_room_at(&code, expected_version), &document)
            .await
            .map_err(|source| MongoDaoError::SaveRoom {
                code: code.clone(),
                source,
            })?;

        if result.matched_count > 0 {
            return Ok(());
        }

        if self.exists(&code).await? {
            Err(StorageError::VersionConflict {
                key: code,
                expected: expected_version,
            })
        } else {
            Err(StorageError::Missing { key: code })
        }
    }

    async fn delete_room(&self, code: String, expected_version: u64) -> StorageResult<bool> {
        let collection = self.collection().await;

        let result = collection
            .delete_one(doc! { "_id": &code, "version": expected_version as i64 })
            .await
            .map_err(|source| MongoDaoError::DeleteRoom {
                code: code.clone(),
                source,
            })?;

        if result.deleted_count > 0 {
            return Ok(true);
        }

        if self.exists(&code).await? {
            Err(StorageError::VersionConflict {
                key: code,
                expected: expected_version,
            })
        } else {
            Ok(false)
        }
    }

    async fn find_rooms_by_set(&self, set_id: String) -> MongoResult<Vec<RoomEntity>> {
        let collection = self.collection().await;

        let documents: Vec<MongoRoomDocument> = collection
            .find(doc! { "set_id": &set_id, "expires_at": { "$gt": DateTime::now() } })
            .sort(doc! { "created_at": 1 })
            .await
            .map_err(|source| MongoDaoError::ListRooms {
                set_id: set_id.clone(),
                source,
            })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::ListRooms {
                set_id: set_id.clone(),
                source,
            })?;

        Ok(documents.into_iter().map(Into::into).collect())
    }

    async fn evict_expired(&self) -> MongoResult<usize> {
        let collection = self.collection().await;
        let result = collection
            .delete_many(doc! { "expires_at": { "$lte": DateTime::now() } })
            .await
            .map_err(|source| MongoDaoError::EvictRooms { source })?;
        Ok(result.deleted_count as usize)
    }
}

fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    matches!(
        err.kind.as_ref(),
        ErrorKind::Write(WriteFailure::WriteError(write_error))
            if write_error.code == DUPLICATE_KEY_CODE
    )
}

impl RoomStore for MongoRoomStore {
    fn insert_room(&self, room: RoomEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.insert_room(room).await })
    }

    fn find_room(&self, code: &str) -> BoxFuture<'static, StorageResult<Option<RoomEntity>>> {
        let store = self.clone();
        let code = code.to_owned();
        Box::pin(async move { store.find_room(code).await.map_err(Into::into) })
    }

    fn replace_room(
        &self,
        room: RoomEntity,
        expected_version: u64,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.replace_room(room, expected_version).await })
    }

    fn delete_room(
        &self,
        code: &str,
        expected_version: u64,
    ) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        let code = code.to_owned();
        Box::pin(async move { store.delete_room(code, expected_version).await })
    }

    fn find_rooms_by_set(&self, set_id: &str) -> BoxFuture<'static, StorageResult<Vec<RoomEntity>>> {
        let store = self.clone();
        let set_id = set_id.to_owned();
        Box::pin(async move { store.find_rooms_by_set(set_id).await.map_err(Into::into) })
    }

    fn evict_expired(&self) -> BoxFuture<'static, StorageResult<usize>> {
        let store = self.clone();
        Box::pin(async move { store.evict_expired().await.map_err(Into::into) })
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
