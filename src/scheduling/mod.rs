mod scheduler;

pub use scheduler::{ReminderScheduler, SchedulerConfig};
