#[cfg(feature = "couch-store")]
pub mod couchdb;
pub mod memory;
#[cfg(feature = "mongo-store")]
pub mod mongodb;

use crate::dao::models::RoomEntity;
use crate::dao::storage::StorageResult;
use futures::future::BoxFuture;

pub use memory::MemoryRoomStore;

/// Abstraction over the persistence layer for room records.
///
/// Records are addressed by room code. Writes replace the whole record and are
/// conditional on the version the caller loaded, so two writers racing on the
/// same room can never silently overwrite each other.
pub trait RoomStore: Send + Sync {
    /// Persist a new record, failing with `AlreadyExists` if a live record owns the code.
    fn insert_room(&self, room: RoomEntity) -> BoxFuture<'static, StorageResult<()>>;
    /// Load a record by code. Expired records read as absent.
    fn find_room(&self, code: &str) -> BoxFuture<'static, StorageResult<Option<RoomEntity>>>;
    /// Overwrite a record if its stored version still equals `expected_version`.
    fn replace_room(
        &self,
        room: RoomEntity,
        expected_version: u64,
    ) -> BoxFuture<'static, StorageResult<()>>;
    /// Delete a record if its stored version still equals `expected_version`.
    /// Returns `false` when nothing was stored under the code.
    fn delete_room(
        &self,
        code: &str,
        expected_version: u64,
    ) -> BoxFuture<'static, StorageResult<bool>>;
    /// Secondary lookup: live rooms created from the given study set.
    fn find_rooms_by_set(&self, set_id: &str) -> BoxFuture<'static, StorageResult<Vec<RoomEntity>>>;
    /// Remove expired records, returning how many were evicted.
    fn evict_expired(&self) -> BoxFuture<'static, StorageResult<usize>>;
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>>;
}
