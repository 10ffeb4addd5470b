//! User-facing operations, kept free of any chat-platform types so a
//! command front end only has to translate its arguments and render the
//! results.

use std::sync::Arc;

use chrono::NaiveDateTime;
use thiserror::Error;

use crate::parse::{self, Unparseable};
use crate::schedule::{DueTime, NewSchedule, OwnerId, Schedule};
use crate::storage::{ScheduleStore, StorageError};

pub const MAX_AUTOCOMPLETE_SUGGESTIONS: usize = 25;

#[derive(Debug, Error)]
pub enum CommandError {
    #[error(transparent)]
    Unparseable(#[from] Unparseable),

    #[error("no matching schedule")]
    NotFound,

    #[error(transparent)]
    Storage(#[from] StorageError),
}

pub struct Commands<S> {
    store: Arc<S>,
    default_lead_minutes: u32,
}

impl<S: ScheduleStore> Commands<S> {
    pub fn new(store: Arc<S>, default_lead_minutes: u32) -> Self {
        Self {
            store,
            default_lead_minutes,
        }
    }

    /// Registers a schedule from free-form date/time text. `now` is the
    /// reference instant the text is resolved against.
    pub async fn add(
        &self,
        owner_id: OwnerId,
        datetime_text: &str,
        task: &str,
        lead_minutes: Option<u32>,
        repeating: bool,
        now: NaiveDateTime,
    ) -> Result<Schedule, CommandError> {
        let due = parse::parse(datetime_text, now)?;
        let schedule = self
            .store
            .create(NewSchedule {
                owner_id,
                task: task.to_string(),
                due_at: DueTime::new(due),
                lead_minutes: lead_minutes.unwrap_or(self.default_lead_minutes),
                repeating,
            })
            .await?;
        Ok(schedule)
    }

    /// The owner's upcoming schedules, ascending by due time.
    pub async fn list(
        &self,
        owner_id: OwnerId,
        now: NaiveDateTime,
    ) -> Result<Vec<Schedule>, CommandError> {
        let upcoming = self.store.list_upcoming(now).await?;
        Ok(upcoming
            .into_iter()
            .filter(|s| s.owner_id == owner_id)
            .collect())
    }

    /// Removes the owner's schedule with exactly this task name and
    /// returns the removed row.
    pub async fn remove(
        &self,
        owner_id: OwnerId,
        task_name: &str,
        now: NaiveDateTime,
    ) -> Result<Schedule, CommandError> {
        let target = self
            .list(owner_id, now)
            .await?
            .into_iter()
            .find(|s| s.task == task_name)
            .ok_or(CommandError::NotFound)?;

        if self.store.remove_by_owner(target.id, owner_id).await? {
            Ok(target)
        } else {
            Err(CommandError::NotFound)
        }
    }

    /// Task-name suggestions for the remove command: case-insensitive
    /// substring match over the owner's upcoming schedules, capped at
    /// [`MAX_AUTOCOMPLETE_SUGGESTIONS`].
    pub async fn autocomplete(
        &self,
        owner_id: OwnerId,
        current: &str,
        now: NaiveDateTime,
    ) -> Result<Vec<String>, CommandError> {
        let needle = current.to_lowercase();
        Ok(self
            .list(owner_id, now)
            .await?
            .into_iter()
            .filter(|s| s.task.to_lowercase().contains(&needle))
            .map(|s| s.task)
            .take(MAX_AUTOCOMPLETE_SUGGESTIONS)
            .collect())
    }

    pub fn help() -> &'static str {
        "📌 予定管理Bot 操作説明 📌\n\n\
         1️⃣ /add - 予定を追加\n\
         \u{3000}例: `/add 明日 18:00 ミーティング 10 true`\n\
         2️⃣ /list - 登録済みの予定一覧を表示\n\
         3️⃣ /remove - 登録済みの予定を削除\n\
         💬 DMで『OK』と返信すると通知確認済みにできます。\n\
         ⏰ 繰り返し予定は毎週自動で追加されます。"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryScheduleStore;
    use chrono::NaiveDate;

    fn commands() -> Commands<InMemoryScheduleStore> {
        Commands::new(Arc::new(InMemoryScheduleStore::new()), 5)
    }

    fn noon() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 1, 1)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    #[tokio::test]
    async fn add_resolves_text_and_applies_default_lead() {
        let commands = commands();
        let s = commands
            .add(1, "明日 18:00", "meeting", None, false, noon())
            .await
            .unwrap();
        assert_eq!(s.due_at.canonical(), "2025-01-02-18:00");
        assert_eq!(s.lead_minutes, 5);
        assert!(!s.repeating);
    }

    #[tokio::test]
    async fn add_rejects_unreadable_text() {
        let err = commands()
            .add(1, "いつか", "meeting", None, false, noon())
            .await
            .unwrap_err();
        assert!(matches!(err, CommandError::Unparseable(_)));
    }

    #[tokio::test]
    async fn list_only_shows_the_callers_schedules() {
        let commands = commands();
        commands.add(1, "明日 9:00", "mine", None, false, noon()).await.unwrap();
        commands.add(2, "明日 9:00", "theirs", None, false, noon()).await.unwrap();

        let mine = commands.list(1, noon()).await.unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].task, "mine");
    }

    #[tokio::test]
    async fn remove_requires_ownership_and_exact_name() {
        let commands = commands();
        commands.add(1, "明日 9:00", "meeting", None, false, noon()).await.unwrap();

        assert!(matches!(
            commands.remove(2, "meeting", noon()).await,
            Err(CommandError::NotFound)
        ));
        assert!(matches!(
            commands.remove(1, "Meeting", noon()).await,
            Err(CommandError::NotFound)
        ));

        let removed = commands.remove(1, "meeting", noon()).await.unwrap();
        assert_eq!(removed.task, "meeting");
        assert!(commands.list(1, noon()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn autocomplete_matches_substrings_case_insensitively() {
        let commands = commands();
        commands.add(1, "明日 9:00", "Team Meeting", None, false, noon()).await.unwrap();
        commands.add(1, "明日 10:00", "lunch", None, false, noon()).await.unwrap();

        let suggestions = commands.autocomplete(1, "meet", noon()).await.unwrap();
        assert_eq!(suggestions, ["Team Meeting"]);
    }

    #[tokio::test]
    async fn autocomplete_caps_suggestions_at_twenty_five() {
        let commands = commands();
        for i in 0..30 {
            commands
                .add(1, "明日 9:00", &format!("task {i}"), None, false, noon())
                .await
                .unwrap();
        }

        let suggestions = commands.autocomplete(1, "task", noon()).await.unwrap();
        assert_eq!(suggestions.len(), MAX_AUTOCOMPLETE_SUGGESTIONS);
    }
}
