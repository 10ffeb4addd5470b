use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use tokio::sync::RwLock;

use crate::schedule::{DueTime, NewSchedule, OwnerId, Schedule, ScheduleId};

use super::{ScheduleStore, StorageError};

struct Rows {
    next_id: ScheduleId,
    by_id: BTreeMap<ScheduleId, Schedule>,
}

/// In-process [`ScheduleStore`]. Rows live in a map behind a single lock,
/// which makes every operation atomic; insertion order of ids is the
/// tiebreaker for equal due times.
pub struct InMemoryScheduleStore {
    rows: RwLock<Rows>,
}

impl InMemoryScheduleStore {
    pub fn new() -> Self {
        Self {
            rows: RwLock::new(Rows {
                next_id: 1,
                by_id: BTreeMap::new(),
            }),
        }
    }
}

impl Default for InMemoryScheduleStore {
    fn default() -> Self {
        Self::new()
    }
}

fn reclaimable(schedule: &Schedule, now: DueTime) -> bool {
    schedule.due_at < now && schedule.notified && schedule.confirmed && !schedule.repeating
}

#[async_trait]
impl ScheduleStore for InMemoryScheduleStore {
    async fn create(&self, new: NewSchedule) -> Result<Schedule, StorageError> {
        let mut rows = self.rows.write().await;
        let id = rows.next_id;
        rows.next_id += 1;

        let schedule = Schedule {
            id,
            owner_id: new.owner_id,
            task: new.task,
            due_at: new.due_at,
            lead_minutes: new.lead_minutes,
            notified: false,
            confirmed: false,
            repeating: new.repeating,
        };
        rows.by_id.insert(id, schedule.clone());
        Ok(schedule)
    }

    async fn find(&self, id: ScheduleId) -> Result<Option<Schedule>, StorageError> {
        let rows = self.rows.read().await;
        Ok(rows.by_id.get(&id).cloned())
    }

    async fn list_upcoming(&self, now: NaiveDateTime) -> Result<Vec<Schedule>, StorageError> {
        let now = DueTime::new(now);
        let mut rows = self.rows.write().await;

        rows.by_id.retain(|_, s| !reclaimable(s, now));

        let mut upcoming: Vec<Schedule> = rows
            .by_id
            .values()
            .filter(|s| s.due_at >= now)
            .cloned()
            .collect();
        upcoming.sort_by(|a, b| a.due_at.cmp(&b.due_at).then(a.id.cmp(&b.id)));
        Ok(upcoming)
    }

    async fn mark_notified(&self, id: ScheduleId) -> Result<(), StorageError> {
        let mut rows = self.rows.write().await;
        if let Some(s) = rows.by_id.get_mut(&id) {
            s.notified = true;
        }
        Ok(())
    }

    async fn mark_confirmed(&self, id: ScheduleId) -> Result<(), StorageError> {
        let mut rows = self.rows.write().await;
        if let Some(s) = rows.by_id.get_mut(&id) {
            s.confirmed = true;
        }
        Ok(())
    }

    async fn remove_by_owner(
        &self,
        id: ScheduleId,
        owner_id: OwnerId,
    ) -> Result<bool, StorageError> {
        let mut rows = self.rows.write().await;
        match rows.by_id.get(&id) {
            Some(s) if s.owner_id == owner_id => {
                rows.by_id.remove(&id);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}
