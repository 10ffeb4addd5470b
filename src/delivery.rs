use async_trait::async_trait;
use thiserror::Error;

use crate::schedule::{OwnerId, Schedule};

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("user {0} is not reachable")]
    Unreachable(OwnerId),

    #[error("delivery timed out")]
    Timeout,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Outbound direct-message channel to the chat platform. The concrete
/// client (command registration, DM plumbing) lives outside this crate;
/// anything that can push a text message to a user id satisfies this.
#[async_trait]
pub trait Notifier: Send + Sync + 'static {
    async fn send_direct(&self, owner_id: OwnerId, text: &str) -> Result<(), DeliveryError>;
}

/// What the scheduler wants to tell a user.
#[derive(Debug, Clone, Copy)]
pub enum ReminderMessage<'a> {
    /// First notification, fired `lead_minutes` before the due time.
    Lead(&'a Schedule),
    /// Grace-period follow-up for a still-unconfirmed schedule.
    FollowUp(&'a Schedule),
    /// Reply to a recognized "ok" acknowledgement.
    Acknowledged,
}

pub fn render(message: ReminderMessage<'_>) -> String {
    match message {
        ReminderMessage::Lead(s) => format!(
            "⏰ {}分前リマインダー！\n📝 {} ({})\n返信で 'OK' と送ると確認済みにできます。",
            s.lead_minutes,
            s.task,
            s.due_at.canonical()
        ),
        ReminderMessage::FollowUp(s) => format!(
            "🔁 再通知：まだ確認がありません。\n📝 {} ({})",
            s.task,
            s.due_at.canonical()
        ),
        ReminderMessage::Acknowledged => "✅ 通知を確認しました！".to_string(),
    }
}

/// Writes notifications to the log instead of a chat platform. Handy for
/// running the binary without any client wired up.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send_direct(&self, owner_id: OwnerId, text: &str) -> Result<(), DeliveryError> {
        log::info!("DM to {owner_id}: {text}");
        Ok(())
    }
}
