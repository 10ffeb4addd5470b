use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
    time::Duration,
};

use chrono::{Local, NaiveDateTime};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::delivery::{DeliveryError, Notifier, ReminderMessage, render};
use crate::schedule::{NewSchedule, OwnerId, Schedule, ScheduleId};
use crate::storage::{ScheduleStore, StorageError};

#[derive(Debug, Clone, Copy)]
pub struct SchedulerConfig {
    /// Cadence of the main tick.
    pub poll_interval: Duration,
    /// Delay between the first notification and the follow-up check.
    pub grace_period: Duration,
    /// When set, a schedule still unconfirmed after the grace period is
    /// marked confirmed along with the follow-up message. "Confirmed" then
    /// means "we stopped waiting", not that the user acknowledged — the
    /// original behaves this way, so it is the default.
    pub auto_confirm_after_grace: bool,
    /// Upper bound on a single delivery attempt.
    pub delivery_timeout: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(60),
            grace_period: Duration::from_secs(10 * 60),
            auto_confirm_after_grace: true,
            delivery_timeout: Duration::from_secs(30),
        }
    }
}

type FollowupRegistry = Arc<Mutex<HashMap<ScheduleId, CancellationToken>>>;

/// Polling reminder loop.
///
/// Each tick loads the upcoming schedules (which also runs the store's lazy
/// cleanup), notifies every schedule whose lead-time threshold has been
/// crossed, expands weekly repeats, and arms a deferred follow-up check per
/// notified schedule. Ticks run strictly one after another, so they cannot
/// overlap even when delivery is slow; follow-up checks and incoming
/// acknowledgements run concurrently with the tick and rely on the store's
/// per-row atomicity plus the idempotence of the mark operations.
pub struct ReminderScheduler<S, N> {
    store: Arc<S>,
    notifier: Arc<N>,
    config: SchedulerConfig,
    followups: FollowupRegistry,
}

impl<S: ScheduleStore, N: Notifier> ReminderScheduler<S, N> {
    pub fn new(store: Arc<S>, notifier: Arc<N>, config: SchedulerConfig) -> Self {
        Self {
            store,
            notifier,
            config,
            followups: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Runs the polling loop until `shutdown` is cancelled. Outstanding
    /// follow-up timers are cancelled on the way out.
    pub async fn run(&self, shutdown: CancellationToken) {
        let mut interval = tokio::time::interval(self.config.poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = interval.tick() => {
                    let now = Local::now().naive_local();
                    if let Err(error) = self.tick(now).await {
                        log::error!("reminder tick failed: {error:#}");
                    }
                }
            }
        }

        self.cancel_pending_followups();
    }

    /// One pass of the reminder check, evaluated against `now`.
    pub async fn tick(&self, now: NaiveDateTime) -> Result<(), StorageError> {
        let upcoming = self.store.list_upcoming(now).await?;

        for schedule in upcoming.iter().filter(|s| s.needs_notification(now)) {
            let text = render(ReminderMessage::Lead(schedule));
            if let Err(error) = self.deliver(schedule.owner_id, &text).await {
                // Best effort: log and keep going, no retry within this
                // tick and no rollback of the steps below.
                log::warn!(
                    "could not deliver reminder {} to user {}: {error}",
                    schedule.id,
                    schedule.owner_id
                );
            }

            self.store.mark_notified(schedule.id).await?;

            if schedule.repeating {
                self.expand_repeat(schedule).await?;
            }

            self.arm_followup(schedule.id);
        }

        Ok(())
    }

    /// Creates next week's row for a repeating schedule. The original row
    /// is never touched.
    async fn expand_repeat(&self, schedule: &Schedule) -> Result<(), StorageError> {
        let Some(next_due) = schedule.due_at.plus_days(7) else {
            log::warn!("due time of schedule {} cannot advance a week", schedule.id);
            return Ok(());
        };
        self.store
            .create(NewSchedule {
                owner_id: schedule.owner_id,
                task: schedule.task.clone(),
                due_at: next_due,
                lead_minutes: schedule.lead_minutes,
                repeating: true,
            })
            .await?;
        Ok(())
    }

    /// Arms the deferred re-notification check for a just-notified
    /// schedule. The timer is keyed by schedule id and individually
    /// cancellable; in normal operation it always runs to completion, only
    /// loop shutdown cancels it.
    fn arm_followup(&self, id: ScheduleId) {
        let token = CancellationToken::new();
        self.registry_lock().insert(id, token.clone());

        let store = Arc::clone(&self.store);
        let notifier = Arc::clone(&self.notifier);
        let followups = Arc::clone(&self.followups);
        let config = self.config;

        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = tokio::time::sleep(config.grace_period) => {
                    if let Err(error) = followup_check(&*store, &*notifier, id, &config).await {
                        log::error!("follow-up check for schedule {id} failed: {error:#}");
                    }
                }
            }
            followups
                .lock()
                .expect("follow-up registry lock poisoned")
                .remove(&id);
        });
    }

    /// Handles an incoming direct message from `owner_id`. A trimmed,
    /// case-insensitive "ok" confirms that user's first not-yet-settled
    /// upcoming schedule — exactly one per message — and replies with an
    /// acknowledgement. Returns whether a schedule was confirmed.
    pub async fn handle_incoming_direct(
        &self,
        owner_id: OwnerId,
        text: &str,
        now: NaiveDateTime,
    ) -> Result<bool, StorageError> {
        if !text.trim().eq_ignore_ascii_case("ok") {
            return Ok(false);
        }

        let upcoming = self.store.list_upcoming(now).await?;
        let Some(open) = upcoming
            .iter()
            .find(|s| s.owner_id == owner_id && !s.confirmed)
        else {
            return Ok(false);
        };

        self.store.mark_confirmed(open.id).await?;

        let reply = render(ReminderMessage::Acknowledged);
        if let Err(error) = self.deliver(owner_id, &reply).await {
            log::warn!("could not deliver acknowledgement to user {owner_id}: {error}");
        }
        Ok(true)
    }

    async fn deliver(&self, owner_id: OwnerId, text: &str) -> Result<(), DeliveryError> {
        deliver_with_timeout(&*self.notifier, owner_id, text, self.config.delivery_timeout).await
    }

    fn cancel_pending_followups(&self) {
        for (_, token) in self.registry_lock().drain() {
            token.cancel();
        }
    }

    fn registry_lock(&self) -> std::sync::MutexGuard<'_, HashMap<ScheduleId, CancellationToken>> {
        self.followups
            .lock()
            .expect("follow-up registry lock poisoned")
    }
}

/// Grace period elapsed: re-read the schedule and, if still unconfirmed,
/// send the follow-up and (optionally) auto-confirm it.
async fn followup_check<S: ScheduleStore, N: Notifier>(
    store: &S,
    notifier: &N,
    id: ScheduleId,
    config: &SchedulerConfig,
) -> Result<(), StorageError> {
    let Some(current) = store.find(id).await? else {
        return Ok(());
    };
    if current.confirmed {
        return Ok(());
    }

    let text = render(ReminderMessage::FollowUp(&current));
    if let Err(error) = deliver_with_timeout(notifier, current.owner_id, &text, config.delivery_timeout).await
    {
        log::warn!(
            "could not deliver follow-up for schedule {id} to user {}: {error}",
            current.owner_id
        );
    }

    if config.auto_confirm_after_grace {
        store.mark_confirmed(id).await?;
    }
    Ok(())
}

async fn deliver_with_timeout<N: Notifier>(
    notifier: &N,
    owner_id: OwnerId,
    text: &str,
    timeout: Duration,
) -> Result<(), DeliveryError> {
    match tokio::time::timeout(timeout, notifier.send_direct(owner_id, text)).await {
        Ok(result) => result,
        Err(_) => Err(DeliveryError::Timeout),
    }
}
