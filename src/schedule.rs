use chrono::{NaiveDateTime, TimeDelta, Timelike};

pub type ScheduleId = i64;
pub type OwnerId = u64;

/// Due instant of a schedule, implicitly in the local zone.
///
/// The persisted textual form is `YYYY-MM-DD-HH:MM` and every due-time
/// comparison in the system happens at that minute granularity, so ordering
/// and equality are defined on the minute-truncated value. Sub-minute
/// precision is still carried: some parser rules deliberately preserve the
/// reference instant's seconds.
#[derive(Debug, Clone, Copy)]
pub struct DueTime(NaiveDateTime);

impl DueTime {
    pub fn new(inner: NaiveDateTime) -> Self {
        Self(inner)
    }

    pub fn datetime(&self) -> NaiveDateTime {
        self.0
    }

    /// Fixed-width serialized form, e.g. `2025-11-10-12:00`. Lexicographic
    /// order on this string agrees with `Ord` on `DueTime`.
    pub fn canonical(&self) -> String {
        self.0.format("%Y-%m-%d-%H:%M").to_string()
    }

    fn minute_key(&self) -> NaiveDateTime {
        self.0
            .with_second(0)
            .and_then(|t| t.with_nanosecond(0))
            .expect("zeroing seconds never fails")
    }

    /// Instant at which the lead-time notification becomes due.
    pub fn notify_at(&self, lead_minutes: u32) -> NaiveDateTime {
        self.minute_key()
            .checked_sub_signed(TimeDelta::minutes(i64::from(lead_minutes)))
            .unwrap_or(NaiveDateTime::MIN)
    }

    pub fn plus_days(&self, days: i64) -> Option<DueTime> {
        self.0.checked_add_signed(TimeDelta::days(days)).map(Self)
    }

    /// `true` iff this due time has not passed yet, at minute granularity.
    pub fn is_upcoming(&self, now: NaiveDateTime) -> bool {
        *self >= DueTime::new(now)
    }
}

impl PartialEq for DueTime {
    fn eq(&self, other: &Self) -> bool {
        self.minute_key() == other.minute_key()
    }
}

impl Eq for DueTime {}

impl PartialOrd for DueTime {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for DueTime {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.minute_key().cmp(&other.minute_key())
    }
}

#[derive(Debug, Clone)]
pub struct Schedule {
    pub id: ScheduleId,
    pub owner_id: OwnerId,
    pub task: String,
    pub due_at: DueTime,
    pub lead_minutes: u32,
    pub notified: bool,
    pub confirmed: bool,
    pub repeating: bool,
}

impl Schedule {
    /// A schedule wants its first notification once `now` crosses
    /// `due_at - lead_minutes`, and only while it is still unnotified.
    pub fn needs_notification(&self, now: NaiveDateTime) -> bool {
        !self.notified && now >= self.due_at.notify_at(self.lead_minutes)
    }
}

/// Creation payload; the store assigns the id and zeroes both flags.
#[derive(Debug, Clone)]
pub struct NewSchedule {
    pub owner_id: OwnerId,
    pub task: String,
    pub due_at: DueTime,
    pub lead_minutes: u32,
    pub repeating: bool,
}
