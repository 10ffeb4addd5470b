use std::sync::Arc;

use anyhow::Context;
use tokio_util::sync::CancellationToken;

use omoidase::appsettings::AppSettings;
use omoidase::delivery::LogNotifier;
use omoidase::scheduling::ReminderScheduler;
use omoidase::storage::InMemoryScheduleStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    pretty_env_logger::init();

    let settings = AppSettings::load().context("could not load settings")?;
    log::info!("starting reminder scheduler: {settings:?}");

    let store = Arc::new(InMemoryScheduleStore::new());
    // Stand-in notifier; a chat-platform adapter implements `Notifier`
    // and calls `handle_incoming_direct` for DM replies.
    let notifier = Arc::new(LogNotifier);
    let scheduler = Arc::new(ReminderScheduler::new(
        store,
        notifier,
        settings.scheduler.to_config(),
    ));

    let shutdown = CancellationToken::new();
    let loop_handle = {
        let scheduler = Arc::clone(&scheduler);
        let shutdown = shutdown.clone();
        tokio::spawn(async move { scheduler.run(shutdown).await })
    };

    tokio::signal::ctrl_c()
        .await
        .context("could not listen for shutdown signal")?;
    log::info!("shutting down");
    shutdown.cancel();
    loop_handle.await?;
    Ok(())
}
