pub mod appsettings;
pub mod commands;
pub mod delivery;
pub mod parse;
pub mod schedule;
pub mod scheduling;
pub mod storage;
