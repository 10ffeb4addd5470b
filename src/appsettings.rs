use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

use crate::scheduling::SchedulerConfig;

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct SchedulerSettings {
    pub poll_interval_secs: u64,
    pub grace_period_minutes: u64,
    pub auto_confirm_after_grace: bool,
    pub delivery_timeout_secs: u64,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            poll_interval_secs: 60,
            grace_period_minutes: 10,
            auto_confirm_after_grace: true,
            delivery_timeout_secs: 30,
        }
    }
}

impl SchedulerSettings {
    pub fn to_config(&self) -> SchedulerConfig {
        SchedulerConfig {
            poll_interval: Duration::from_secs(self.poll_interval_secs),
            grace_period: Duration::from_secs(self.grace_period_minutes * 60),
            auto_confirm_after_grace: self.auto_confirm_after_grace,
            delivery_timeout: Duration::from_secs(self.delivery_timeout_secs),
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct CommandSettings {
    pub default_lead_minutes: u32,
}

impl Default for CommandSettings {
    fn default() -> Self {
        Self {
            default_lead_minutes: 5,
        }
    }
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct AppSettings {
    pub scheduler: SchedulerSettings,
    pub commands: CommandSettings,
}

impl AppSettings {
    /// Layered load: `appsettings` file, then `appsettings.local`, then
    /// `APP_*` environment variables. Every field has a default, so a
    /// missing file is fine.
    pub fn load() -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::with_name("appsettings").required(false))
            .add_source(File::with_name("appsettings.local").required(false))
            .add_source(Environment::with_prefix("APP").separator("__"))
            .build()?;

        settings.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_documented_cadence() {
        let settings = AppSettings::default();
        let config = settings.scheduler.to_config();
        assert_eq!(config.poll_interval, Duration::from_secs(60));
        assert_eq!(config.grace_period, Duration::from_secs(600));
        assert!(config.auto_confirm_after_grace);
        assert_eq!(settings.commands.default_lead_minutes, 5);
    }
}
