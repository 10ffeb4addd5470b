//! Free-form date/time text resolution.
//!
//! Accepts Japanese clock expressions (`11時30分`, `午後3時`), day-relative
//! forms (`明日 18:00`), next-week weekdays (`来週の月曜 10:00`), slash dates
//! with and without a year, and bare `HH:MM`. Resolution is deterministic
//! against an explicit reference instant and the rules run in a fixed
//! priority order; the first rule that matches wins.

use std::sync::LazyLock;

use chrono::{Datelike, NaiveDate, NaiveDateTime, TimeDelta, Timelike};
use regex::{Captures, Regex};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("date/time text did not match any supported format")]
pub struct Unparseable;

static KANJI_HOUR_MINUTE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d{1,2})時(\d{1,2})分?").expect("valid pattern"));
static KANJI_HOUR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d{1,2})時").expect("valid pattern"));
static CLOCK_ANYWHERE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d{1,2}):(\d{1,2})").expect("valid pattern"));
static NEXT_WEEK_WEEKDAY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"来週の([月火水木金土日])曜?").expect("valid pattern"));
static MONTH_DAY_TIME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{1,2})/(\d{1,2}) (\d{1,2}):(\d{1,2})").expect("valid pattern"));
static YEAR_MONTH_DAY_TIME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{4})/(\d{1,2})/(\d{1,2}) (\d{1,2}):(\d{1,2})").expect("valid pattern")
});
static CLOCK_ONLY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{1,2}):(\d{1,2})$").expect("valid pattern"));

const WEEKDAY_KANJI: [&str; 7] = ["月", "火", "水", "木", "金", "土", "日"];

const DAY_RELATIVE: [(&str, i64); 3] = [("今日", 0), ("明日", 1), ("あさって", 2)];

/// Resolves `text` against the reference instant `now`.
///
/// Numeric fields are not range-validated here; an out-of-range hour or
/// minute fails at instant construction and surfaces as [`Unparseable`],
/// the same bucket as text that matches no rule at all.
pub fn parse(text: &str, now: NaiveDateTime) -> Result<NaiveDateTime, Unparseable> {
    let text = normalize(text);
    let text = text.trim();
    let (text, pm) = strip_meridiem_markers(text);

    // 11時30分 / 11時30, with an optional AM/PM marker anywhere in the
    // original text. Checked before the day-relative rules on purpose:
    // 明日午後3時 resolves here, to *today* at 15:00.
    if let Some(c) = KANJI_HOUR_MINUTE.captures(&text) {
        let h = meridiem_hour(cap_u32(&c, 1)?, pm);
        return today_at(now, h, cap_u32(&c, 2)?);
    }

    // 11時
    if let Some(c) = KANJI_HOUR.captures(&text) {
        let h = meridiem_hour(cap_u32(&c, 1)?, pm);
        return today_at(now, h, 0);
    }

    // 今日 / 明日 / あさって + HH:MM anywhere. Keeps the reference
    // instant's seconds, unlike the 時-rules above.
    for (keyword, offset) in DAY_RELATIVE {
        if text.starts_with(keyword)
            && let Some(c) = CLOCK_ANYWHERE.captures(&text)
        {
            return day_offset_at(now, offset, cap_u32(&c, 1)?, cap_u32(&c, 2)?);
        }
    }

    // 来週の〇曜 + HH:MM anywhere. Always lands in the following week,
    // even when the target weekday equals today's.
    if let Some(c) = NEXT_WEEK_WEEKDAY.captures(&text) {
        let target = weekday_index(&c[1])?;
        let today = i64::from(now.weekday().num_days_from_monday());
        let days_ahead = (7 + target - today) % 7 + 7;
        if let Some(t) = CLOCK_ANYWHERE.captures(&text) {
            return day_offset_at(now, days_ahead, cap_u32(&t, 1)?, cap_u32(&t, 2)?);
        }
    }

    // MM/DD HH:MM, year taken from the reference instant. A four-digit
    // leading number cannot match the two-digit month here, so this rule
    // coming first does not shadow the explicit-year form below.
    if let Some(c) = MONTH_DAY_TIME.captures(&text) {
        return date_at(
            now.year(),
            cap_u32(&c, 1)?,
            cap_u32(&c, 2)?,
            cap_u32(&c, 3)?,
            cap_u32(&c, 4)?,
        );
    }

    // YYYY/MM/DD HH:MM
    if let Some(c) = YEAR_MONTH_DAY_TIME.captures(&text) {
        let year = c[1].parse::<i32>().map_err(|_| Unparseable)?;
        return date_at(
            year,
            cap_u32(&c, 2)?,
            cap_u32(&c, 3)?,
            cap_u32(&c, 4)?,
            cap_u32(&c, 5)?,
        );
    }

    // Bare HH:MM, treated as today. Seconds preserved.
    if let Some(c) = CLOCK_ONLY.captures(&text) {
        return day_offset_at(now, 0, cap_u32(&c, 1)?, cap_u32(&c, 2)?);
    }

    Err(Unparseable)
}

/// Folds full-width ASCII (U+FF01..=U+FF5E) and the ideographic space down
/// to their half-width forms, so `２３：５９` matches the same rules as
/// `23:59`. Runs before any pattern matching.
fn normalize(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            '\u{ff01}'..='\u{ff5e}' => {
                char::from_u32(c as u32 - 0xfee0).expect("offset lands in ASCII")
            }
            '\u{3000}' => ' ',
            other => other,
        })
        .collect()
}

/// Detects 午後/PM and 午前/AM anywhere in the text (case-insensitively for
/// the ASCII forms), removes the markers, and reports whether a PM marker
/// was present.
fn strip_meridiem_markers(text: &str) -> (String, bool) {
    let mut text = text.to_string();
    let upper = text.to_uppercase();
    let pm = text.contains("午後") || upper.contains("PM");
    if pm {
        text = text.replace("午後", "").replace("PM", "").replace("pm", "");
    }
    if text.contains("午前") || upper.contains("AM") {
        text = text.replace("午前", "").replace("AM", "").replace("am", "");
    }
    (text, pm)
}

fn meridiem_hour(h: u32, pm: bool) -> u32 {
    if pm && h < 12 { h + 12 } else { h }
}

fn cap_u32(c: &Captures<'_>, group: usize) -> Result<u32, Unparseable> {
    c[group].parse().map_err(|_| Unparseable)
}

fn weekday_index(kanji: &str) -> Result<i64, Unparseable> {
    WEEKDAY_KANJI
        .iter()
        .position(|w| *w == kanji)
        .map(|i| i as i64)
        .ok_or(Unparseable)
}

/// Today at `h:m`, seconds and sub-seconds zeroed.
fn today_at(now: NaiveDateTime, h: u32, m: u32) -> Result<NaiveDateTime, Unparseable> {
    now.with_hour(h)
        .and_then(|t| t.with_minute(m))
        .and_then(|t| t.with_second(0))
        .and_then(|t| t.with_nanosecond(0))
        .ok_or(Unparseable)
}

/// `now + days` at `h:m`, seconds and sub-seconds carried over from `now`.
fn day_offset_at(
    now: NaiveDateTime,
    days: i64,
    h: u32,
    m: u32,
) -> Result<NaiveDateTime, Unparseable> {
    now.checked_add_signed(TimeDelta::days(days))
        .and_then(|t| t.with_hour(h))
        .and_then(|t| t.with_minute(m))
        .ok_or(Unparseable)
}

fn date_at(year: i32, month: u32, day: u32, h: u32, m: u32) -> Result<NaiveDateTime, Unparseable> {
    NaiveDate::from_ymd_opt(year, month, day)
        .and_then(|d| d.and_hms_opt(h, m, 0))
        .ok_or(Unparseable)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Weekday};
    use proptest::prelude::*;
    use proptest_arbitrary_interop::arb;

    fn reference() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, mo, d)
            .unwrap()
            .and_hms_opt(h, mi, s)
            .unwrap()
    }

    #[test]
    fn kanji_hour_and_minute_is_today_with_seconds_zeroed() {
        let now = at(2025, 1, 1, 9, 15, 42);
        assert_eq!(parse("11時30分", now), Ok(at(2025, 1, 1, 11, 30, 0)));
        // 分 suffix optional
        assert_eq!(parse("11時30", now), Ok(at(2025, 1, 1, 11, 30, 0)));
    }

    #[test]
    fn bare_kanji_hour_defaults_minute_to_zero() {
        assert_eq!(parse("11時", reference()), Ok(at(2025, 1, 1, 11, 0, 0)));
    }

    #[test]
    fn pm_marker_shifts_hours_below_twelve() {
        assert_eq!(parse("午後3時", reference()), Ok(at(2025, 1, 1, 15, 0, 0)));
        assert_eq!(parse("PM3時", reference()), Ok(at(2025, 1, 1, 15, 0, 0)));
        // Already in the afternoon range, no shift.
        assert_eq!(parse("午後11時", reference()), Ok(at(2025, 1, 1, 23, 0, 0)));
    }

    #[test]
    fn am_marker_is_stripped_without_shifting() {
        assert_eq!(parse("午前9時", reference()), Ok(at(2025, 1, 1, 9, 0, 0)));
        assert_eq!(parse("am9時", reference()), Ok(at(2025, 1, 1, 9, 0, 0)));
    }

    #[test]
    fn meridiem_rule_outranks_day_relative_keyword() {
        // 明日 is present, but the 時-rule is checked first and resolves to
        // *today* at 15:00. Surprising and intentional.
        assert_eq!(
            parse("明日午後3時", reference()),
            Ok(at(2025, 1, 1, 15, 0, 0))
        );
    }

    #[test]
    fn tomorrow_with_clock_time() {
        assert_eq!(
            parse("明日 18:00", reference()),
            Ok(at(2025, 1, 2, 18, 0, 0))
        );
    }

    #[test]
    fn day_relative_rules_preserve_reference_seconds() {
        let now = at(2025, 1, 1, 9, 15, 42);
        assert_eq!(parse("今日 12:30", now), Ok(at(2025, 1, 1, 12, 30, 42)));
        assert_eq!(parse("あさって 8:05", now), Ok(at(2025, 1, 3, 8, 5, 42)));
    }

    #[test]
    fn day_relative_keyword_without_clock_time_is_unparseable() {
        assert_eq!(parse("明日", reference()), Err(Unparseable));
    }

    #[test]
    fn next_week_weekday_lands_in_the_following_week() {
        // 2025-01-01 is a Wednesday; 来週の水曜 must be +7, not today.
        let got = parse("来週の水曜 10:00", reference()).unwrap();
        assert_eq!(got, at(2025, 1, 8, 10, 0, 0));
        // 曜 suffix optional. A target weekday earlier in the week than
        // today's lands up to 13 days out.
        let got = parse("来週の月 9:30", reference()).unwrap();
        assert_eq!(got, at(2025, 1, 13, 9, 30, 0));
    }

    #[test]
    fn month_day_defaults_to_reference_year() {
        assert_eq!(
            parse("11/20 15:00", reference()),
            Ok(at(2025, 11, 20, 15, 0, 0))
        );
    }

    #[test]
    fn explicit_year_date() {
        assert_eq!(
            parse("2026/11/20 15:00", reference()),
            Ok(at(2026, 11, 20, 15, 0, 0))
        );
    }

    #[test]
    fn bare_clock_time_is_today() {
        let now = at(2025, 1, 1, 9, 15, 42);
        assert_eq!(parse("23:59", now), Ok(at(2025, 1, 1, 23, 59, 42)));
    }

    #[test]
    fn full_width_digits_are_normalized_before_matching() {
        let now = at(2025, 1, 1, 9, 15, 42);
        assert_eq!(parse("２３：５９", now), Ok(at(2025, 1, 1, 23, 59, 42)));
        assert_eq!(parse("　１１時３０分　", now), Ok(at(2025, 1, 1, 11, 30, 0)));
    }

    #[test]
    fn out_of_range_components_are_unparseable() {
        assert_eq!(parse("25:99", reference()), Err(Unparseable));
        assert_eq!(parse("2/30 12:00", reference()), Err(Unparseable));
        assert_eq!(parse("99時", reference()), Err(Unparseable));
    }

    #[test]
    fn unrecognized_text_is_unparseable() {
        assert_eq!(parse("そのうち", reference()), Err(Unparseable));
        assert_eq!(parse("", reference()), Err(Unparseable));
    }

    proptest! {
        #[test]
        fn next_week_is_always_at_least_seven_days_out(now in arb::<NaiveDateTime>()) {
            let Ok(got) = parse("来週の月曜 10:00", now) else {
                // Only reachable for reference instants at the edge of the
                // representable range.
                return Ok(());
            };
            let ahead = (got.date() - now.date()).num_days();
            prop_assert!((7..=13).contains(&ahead), "ahead = {ahead}");
            prop_assert_eq!(got.weekday(), Weekday::Mon);
            prop_assert_eq!((got.hour(), got.minute()), (10, 0));
        }
    }
}
