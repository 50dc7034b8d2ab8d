use std::{sync::Arc, time::SystemTime};

use futures::future::BoxFuture;
use reqwest::{Client, Method, StatusCode};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::from_value;
use tracing::debug;

use crate::dao::{
    models::RoomEntity,
    room_store::RoomStore,
    storage::{StorageError, StorageResult},
};

use super::{
    config::CouchConfig,
    error::{CouchDaoError, CouchResult},
    models::{AllDocsResponse, CouchRoomDocument, END_SUFFIX, ROOM_PREFIX, room_doc_id},
};

#[derive(Clone)]
pub struct CouchRoomStore {
    client: Client,
    base_url: Arc<str>,
    database: Arc<str>,
    auth: Option<(Arc<str>, Arc<str>)>,
}

impl CouchRoomStore {
    /// Establish a connection to CouchDB and ensure the database exists.
    pub async fn connect(config: CouchConfig) -> CouchResult<Self> {
        let client = Client::builder()
            .build()
            .map_err(|source| CouchDaoError::ClientBuilder { source })?;

        let base_url = Arc::<str>::from(config.base_url.trim_end_matches('/'));
        let database = Arc::<str>::from(config.database);
        let auth = config
            .credentials
            .map(|(u, p)| (Arc::<str>::from(u), Arc::<str>::from(p)));

        let store = Self {
            client,
            base_url,
            database,
            auth,
        };

        store.ensure_database().await?;
        Ok(store)
    }

    fn authorize(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.auth {
            Some((ref user, ref pass)) => builder.basic_auth(user.as_ref(), Some(pass.as_ref())),
            None => builder,
        }
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}/{}/{}", self.base_url, self.database, path);
        self.authorize(self.client.request(method, url))
    }

    fn database_url(&self) -> String {
        format!("{}/{}", self.base_url, self.database)
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
                // 412: another instance created it first.
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

    async fn get_document<T>(&self, doc_id: &str) -> CouchResult<Option<T>>
    where
        T: DeserializeOwned,
    {
        let response = self
            .request(Method::GET, doc_id)
            .send()
            .await
            .map_err(|source| CouchDaoError::RequestSend {
                path: doc_id.to_string(),
                source,
            })?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                response.json::<T>().await.map(Some).map_err(|source| {
                    CouchDaoError::DecodeResponse {
                        path: doc_id.to_string(),
                        source,
                    }
                })
            }
            other => Err(CouchDaoError::RequestStatus {
                path: doc_id.to_string(),
                status: other,
            }),
        }
    }

    async fn put_document<T>(&self, doc_id: &str, document: &T) -> CouchResult<()>
    where
        T: ?Sized + Serialize,
    {
        let response = self
            .request(Method::PUT, doc_id)
            .json(document)
            .send()
            .await
            .map_err(|source| CouchDaoError::RequestSend {
                path: doc_id.to_string(),
                source,
            })?;

        match response.status() {
            status if status.is_success() => Ok(()),
            StatusCode::CONFLICT => Err(CouchDaoError::RevisionConflict {
                path: doc_id.to_string(),
            }),
            other => Err(CouchDaoError::RequestStatus {
                path: doc_id.to_string(),
                status: other,
            }),
        }
    }

    async fn delete_document(&self, doc_id: &str, rev: &str) -> CouchResult<bool> {
        let response = self
            .request(Method::DELETE, doc_id)
            .query(&[("rev", rev)])
            .send()
            .await
            .map_err(|source| CouchDaoError::RequestSend {
                path: doc_id.to_string(),
                source,
            })?;

        match response.status() {
            status if status.is_success() => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            StatusCode::CONFLICT => Err(CouchDaoError::RevisionConflict {
                path: doc_id.to_string(),
            }),
            other => Err(CouchDaoError::RequestStatus {
                path: doc_id.to_string(),
                status: other,
            }),
        }
    }

    async fn list_documents<T>(&self, prefix: &str) -> CouchResult<Vec<T>>
    where
        T: DeserializeOwned,
    {
        const ALL_DOCS: &str = "_all_docs";
        let query = [
            ("include_docs", "true".to_string()),
            ("startkey", format!("\"{}\"", prefix)),
            ("endkey", format!("\"{}{}\"", prefix, END_SUFFIX)),
        ];

        let response = self
            .request(Method::GET, ALL_DOCS)
            .query(&query)
            .send()
            .await
            .map_err(|source| CouchDaoError::RequestSend {
                path: ALL_DOCS.to_string(),
                source,
            })?;

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

        payload
            .rows
            .into_iter()
            .filter_map(|row| row.doc)
            .map(|doc| {
                from_value(doc).map_err(|source| CouchDaoError::DeserializeValue {
                    path: ALL_DOCS.to_string(),
                    source,
                })
            })
            .collect()
    }

    async fn insert_room(&self, room: RoomEntity) -> StorageResult<()> {
        let doc_id = room_doc_id(&room.code);
        let code = room.code.clone();

        // A stale document under the same code is taken over via its revision.
        let rev = match self.get_document::<CouchRoomDocument>(&doc_id).await? {
            Some(existing) if !existing.is_expired_at(SystemTime::now()) => {
                return Err(StorageError::AlreadyExists { key: code });
            }
            Some(existing) => existing.rev,
            None => None,
        };

        let doc = CouchRoomDocument::from_entity(room, rev);
        match self.put_document(&doc_id, &doc).await {
            Ok(()) => Ok(()),
            Err(CouchDaoError::RevisionConflict { .. }) => {
                Err(StorageError::AlreadyExists { key: code })
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn find_room(&self, code: String) -> CouchResult<Option<RoomEntity>> {
        let doc_id = room_doc_id(&code);
        let maybe_doc = self.get_document::<CouchRoomDocument>(&doc_id).await?;
        Ok(maybe_doc
            .filter(|doc| !doc.is_expired_at(SystemTime::now()))
            .map(CouchRoomDocument::into_entity))
    }

    async fn replace_room(&self, room: RoomEntity, expected_version: u64) -> StorageResult<()> {
        let doc_id = room_doc_id(&room.code);
        let code = room.code.clone();

        let Some(existing) = self.get_document::<CouchRoomDocument>(&doc_id).await? else {
            return Err(StorageError::Missing { key: code });
        };

        if existing.is_expired_at(SystemTime::now()) {
            return Err(StorageError::Missing { key: code });
        }

        if existing.room.version != expected_version {
            return Err(StorageError::VersionConflict {
                key: code,
                expected: expected_version,
            });
        }

        let doc = CouchRoomDocument::from_entity(room, existing.rev);
        match self.put_document(&doc_id, &doc).await {
            Ok(()) => Ok(()),
            Err(CouchDaoError::RevisionConflict { .. }) => Err(StorageError::VersionConflict {
                key: code,
                expected: expected_version,
            }),
            Err(err) => Err(err.into()),
        }
    }

    async fn delete_room(&self, code: String, expected_version: u64) -> StorageResult<bool> {
        let doc_id = room_doc_id(&code);

        let Some(existing) = self.get_document::<CouchRoomDocument>(&doc_id).await? else {
            return Ok(false);
        };

        if existing.room.version != expected_version {
            return Err(StorageError::VersionConflict {
                key: code,
                expected: expected_version,
            });
        }

        let Some(rev) = existing.rev else {
            return Ok(false);
        };

        match self.delete_document(&doc_id, &rev).await {
            Ok(deleted) => Ok(deleted),
            Err(CouchDaoError::RevisionConflict { .. }) => Err(StorageError::VersionConflict {
                key: code,
                expected: expected_version,
            }),
            Err(err) => Err(err.into()),
        }
    }

    async fn find_rooms_by_set(&self, set_id: String) -> CouchResult<Vec<RoomEntity>> {
        let now = SystemTime::now();
        let mut rooms: Vec<RoomEntity> = self
            .list_documents::<CouchRoomDocument>(ROOM_PREFIX)
            .await?
            .into_iter()
            .filter(|doc| doc.room.set_id == set_id && !doc.is_expired_at(now))
            .map(CouchRoomDocument::into_entity)
            .collect();
        rooms.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(rooms)
    }

    async fn evict_expired(&self) -> CouchResult<usize> {
        let now = SystemTime::now();
        let expired = self
            .list_documents::<CouchRoomDocument>(ROOM_PREFIX)
            .await?
            .into_iter()
            .filter(|doc| doc.is_expired_at(now));

        let mut evicted = 0;
        for doc in expired {
            let Some(rev) = doc.rev.as_deref() else {
                continue;
            };
            match self.delete_document(&doc.id, rev).await {
                Ok(true) => evicted += 1,
                Ok(false) => {}
                // Rewritten since we listed it; the next sweep decides again.
                Err(CouchDaoError::RevisionConflict { path }) => {
                    debug!(%path, "skipping eviction of concurrently updated room");
                }
                Err(err) => return Err(err),
            }
        }
        Ok(evicted)
    }
}

impl RoomStore for CouchRoomStore {
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
        Box::pin(async move {
            let url = store.database_url();
            let response = store
                .authorize(store.client.get(&url))
                .send()
                .await
                .map_err(|source| CouchDaoError::RequestSend {
                    path: url.clone(),
                    source,
                })?;

            if response.status().is_success() {
                Ok(())
            } else {
                Err(CouchDaoError::RequestStatus {
                    path: url,
                    status: response.status(),
                }
                .into())
            }
        })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.ensure_database().await.map_err(Into::into) })
    }
}
