mod memory;

pub use memory::InMemoryScheduleStore;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use thiserror::Error;

use crate::schedule::{NewSchedule, OwnerId, Schedule, ScheduleId};

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage backend failure")]
    Backend(#[source] anyhow::Error),
}

/// Repository over schedule records. Implementations must make each
/// operation individually atomic (single-row read-modify-write); no
/// invariant spans multiple rows, so cross-row transactions are not needed.
#[async_trait]
pub trait ScheduleStore: Send + Sync + 'static {
    /// Inserts a new schedule with both lifecycle flags cleared and returns
    /// the stored row.
    async fn create(&self, new: NewSchedule) -> Result<Schedule, StorageError>;

    /// Side-effect-free single-row read.
    async fn find(&self, id: ScheduleId) -> Result<Option<Schedule>, StorageError>;

    /// Returns every schedule with `due_at >= now`, ascending by due time.
    ///
    /// Side effect: permanently deletes rows that are fully settled and in
    /// the past (`due_at < now && notified && confirmed && !repeating`).
    /// This lazy cleanup is intentional and this method is its only entry
    /// point; no other operation may delete settled rows.
    async fn list_upcoming(&self, now: NaiveDateTime) -> Result<Vec<Schedule>, StorageError>;

    /// Idempotent; a no-op when already set or when `id` is absent.
    async fn mark_notified(&self, id: ScheduleId) -> Result<(), StorageError>;

    /// Idempotent; a no-op when already set or when `id` is absent.
    async fn mark_confirmed(&self, id: ScheduleId) -> Result<(), StorageError>;

    /// Deletes the row only when both `id` and `owner_id` match; returns
    /// whether a row was deleted. The owner match here is the only
    /// authorization check in the system.
    async fn remove_by_owner(&self, id: ScheduleId, owner_id: OwnerId)
    -> Result<bool, StorageError>;
}
