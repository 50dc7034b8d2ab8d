//! In-process room store backed by a concurrent map.

use std::{sync::Arc, time::SystemTime};

use dashmap::{DashMap, mapref::entry::Entry};
use futures::future::BoxFuture;

use crate::dao::{
    models::RoomEntity,
    room_store::RoomStore,
    storage::{StorageError, StorageResult},
};

/// Room store keeping every record in memory. Conditional writes are checked
/// and applied while holding the map shard lock for the key.
#[derive(Clone, Default)]
pub struct MemoryRoomStore {
    rooms: Arc<DashMap<String, RoomEntity>>,
}

impl MemoryRoomStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn insert(&self, room: RoomEntity) -> StorageResult<()> {
        let now = SystemTime::now();
        match self.rooms.entry(room.code.clone()) {
            Entry::Occupied(mut occupied) => {
                if !occupied.get().is_expired_at(now) {
                    return Err(StorageError::AlreadyExists { key: room.code });
                }
                occupied.insert(room);
            }
            Entry::Vacant(vacant) => {
                vacant.insert(room);
            }
        }
        Ok(())
    }

    fn find(&self, code: &str) -> Option<RoomEntity> {
        let now = SystemTime::now();
        let room = self.rooms.get(code)?.clone();
        if room.is_expired_at(now) {
            self.rooms
                .remove_if(code, |_, stored| stored.is_expired_at(now));
            return None;
        }
        Some(room)
    }

    fn replace(&self, room: RoomEntity, expected_version: u64) -> StorageResult<()> {
        let Some(mut stored) = self.rooms.get_mut(&room.code) else {
            return Err(StorageError::Missing { key: room.code });
        };

        if stored.is_expired_at(SystemTime::now()) {
            return Err(StorageError::Missing { key: room.code });
        }

        if stored.version != expected_version {
            return Err(StorageError::VersionConflict {
                key: room.code,
                expected: expected_version,
            });
        }

        *stored = room;
        Ok(())
    }

    fn delete(&self, code: &str, expected_version: u64) -> StorageResult<bool> {
        match self.rooms.entry(code.to_owned()) {
            Entry::Vacant(_) => Ok(false),
            Entry::Occupied(occupied) => {
                if occupied.get().version != expected_version {
                    return Err(StorageError::VersionConflict {
                        key: code.to_owned(),
                        expected: expected_version,
                    });
                }
                occupied.remove();
                Ok(true)
            }
        }
    }

    fn by_set(&self, set_id: &str) -> Vec<RoomEntity> {
        let now = SystemTime::now();
        let mut rooms: Vec<RoomEntity> = self
            .rooms
            .iter()
            .filter(|entry| entry.set_id == set_id && !entry.is_expired_at(now))
            .map(|entry| entry.value().clone())
            .collect();
        rooms.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        rooms
    }

    fn evict(&self) -> usize {
        let now = SystemTime::now();
        let before = self.rooms.len();
        self.rooms.retain(|_, room| !room.is_expired_at(now));
        before.saturating_sub(self.rooms.len())
    }
}

impl RoomStore for MemoryRoomStore {
    fn insert_room(&self, room: RoomEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.insert(room) })
    }

    fn find_room(&self, code: &str) -> BoxFuture<'static, StorageResult<Option<RoomEntity>>> {
        let store = self.clone();
        let code = code.to_owned();
        Box::pin(async move { Ok(store.find(&code)) })
    }

    fn replace_room(
        &self,
        room: RoomEntity,
        expected_version: u64,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.replace(room, expected_version) })
    }

    fn delete_room(
        &self,
        code: &str,
        expected_version: u64,
    ) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        let code = code.to_owned();
        Box::pin(async move { store.delete(&code, expected_version) })
    }

    fn find_rooms_by_set(&self, set_id: &str) -> BoxFuture<'static, StorageResult<Vec<RoomEntity>>> {
        let store = self.clone();
        let set_id = set_id.to_owned();
        Box::pin(async move { Ok(store.by_set(&set_id)) })
    }

    fn evict_expired(&self) -> BoxFuture<'static, StorageResult<usize>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.evict()) })
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
    use std::time::Duration;

    use super::*;
    use crate::dao::models::{PlayerEntity, RoomStatusEntity};
    use uuid::Uuid;

    fn room(code: &str, set_id: &str, ttl: Duration) -> RoomEntity {
        let now = SystemTime::now();
        RoomEntity {
            code: code.into(),
            set_id: set_id.into(),
            host: "Alice".into(),
            players: vec![PlayerEntity {
                id: Uuid::new_v4(),
                name: "Alice".into(),
                score: 0,
            }],
            status: RoomStatusEntity::Waiting,
            current_question_index: 0,
            questions: Vec::new(),
            answered_players: Vec::new(),
            show_leaderboard: false,
            created_at: now,
            expires_at: now + ttl,
            version: 0,
        }
    }

    const DAY: Duration = Duration::from_secs(86_400);

    #[tokio::test]
    async fn insert_rejects_live_duplicate_code() {
        let store = MemoryRoomStore::new();
        store.insert_room(room("ABCDEF", "set", DAY)).await.unwrap();

        let err = store
            .insert_room(room("ABCDEF", "other", DAY))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::AlreadyExists { key } if key == "ABCDEF"));
    }

    #[tokio::test]
    async fn replace_with_stale_version_is_rejected() {
        let store = MemoryRoomStore::new();
        store.insert_room(room("ABCDEF", "set", DAY)).await.unwrap();

        let mut first = store.find_room("ABCDEF").await.unwrap().unwrap();
        let mut second = first.clone();

        first.version = 1;
        first.show_leaderboard = true;
        store.replace_room(first, 0).await.unwrap();

        second.version = 1;
        let err = store.replace_room(second, 0).await.unwrap_err();
        assert!(matches!(
            err,
            StorageError::VersionConflict { expected: 0, .. }
        ));

        let stored = store.find_room("ABCDEF").await.unwrap().unwrap();
        assert!(stored.show_leaderboard);
        assert_eq!(stored.version, 1);
    }

    #[tokio::test]
    async fn replace_missing_record_reports_missing() {
        let store = MemoryRoomStore::new();
        let err = store
            .replace_room(room("GONE42", "set", DAY), 0)
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Missing { .. }));
    }

    #[tokio::test]
    async fn expired_records_read_as_absent_and_can_be_reused() {
        let store = MemoryRoomStore::new();
        let mut expired = room("OLD111", "set", DAY);
        expired.expires_at = SystemTime::now() - Duration::from_secs(1);
        store.rooms.insert(expired.code.clone(), expired);

        assert!(store.find_room("OLD111").await.unwrap().is_none());
        store.insert_room(room("OLD111", "set", DAY)).await.unwrap();
        assert!(store.find_room("OLD111").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn evict_expired_removes_only_expired_rooms() {
        let store = MemoryRoomStore::new();
        let mut expired = room("OLD222", "set", DAY);
        expired.expires_at = SystemTime::now() - Duration::from_secs(1);
        store.rooms.insert(expired.code.clone(), expired);
        store.insert_room(room("NEW333", "set", DAY)).await.unwrap();

        assert_eq!(store.evict_expired().await.unwrap(), 1);
        assert!(store.rooms.contains_key("NEW333"));
        assert!(!store.rooms.contains_key("OLD222"));
    }

    #[tokio::test]
    async fn delete_checks_version() {
        let store = MemoryRoomStore::new();
        store.insert_room(room("DEL444", "set", DAY)).await.unwrap();

        assert!(store.delete_room("DEL444", 3).await.is_err());
        assert!(store.delete_room("DEL444", 0).await.unwrap());
        assert!(!store.delete_room("DEL444", 0).await.unwrap());
    }

    #[tokio::test]
    async fn rooms_are_found_by_set() {
        let store = MemoryRoomStore::new();
        store.insert_room(room("SET001", "bio", DAY)).await.unwrap();
        store.insert_room(room("SET002", "chem", DAY)).await.unwrap();
        store.insert_room(room("SET003", "bio", DAY)).await.unwrap();

        let codes: Vec<String> = store
            .find_rooms_by_set("bio")
            .await
            .unwrap()
            .into_iter()
            .map(|room| room.code)
            .collect();
        assert_eq!(codes.len(), 2);
        assert!(codes.contains(&"SET001".to_string()));
        assert!(codes.contains(&"SET003".to_string()));
    }
}
