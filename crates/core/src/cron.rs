//! Five-field cron expressions.
//!
//! Supports the standard `minute hour day-of-month month day-of-week`
//! syntax: `*`, single values, `a-b` ranges, `/step` suffixes, comma lists,
//! three-letter month and weekday names, and the `@hourly`, `@daily`
//! (`@midnight`), `@weekly`, `@monthly` and `@yearly` (`@annually`)
//! descriptors.
//!
//! Day-of-week accepts `7` as well as `0` for Sunday, as Vixie cron does.
//! Parsers that only allow `0-6` reject such expressions; nothing saved
//! by them is affected.
//!
//! When both day fields are restricted a day matches if *either* field
//! matches; when one of them is `*` both must match.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, TimeZone, Timelike};

/// How far ahead [`CronSchedule::next_after`] searches before giving up
/// (e.g. for `0 0 30 2 *`, which never fires).
const MAX_SEARCH_YEARS: i32 = 5;

const MONTH_NAMES: [&str; 12] = [
    "JAN", "FEB", "MAR", "APR", "MAY", "JUN", "JUL", "AUG", "SEP", "OCT", "NOV", "DEC",
];

const WEEKDAY_NAMES: [&str; 7] = ["SUN", "MON", "TUE", "WED", "THU", "FRI", "SAT"];

/// Errors produced while parsing a cron expression.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CronParseError {
    #[error("Cron expression is empty")]
    Empty,

    #[error("Expected 5 fields, found {0}")]
    FieldCount(usize),

    #[error("Unknown descriptor: {0}")]
    UnknownDescriptor(String),

    #[error("Invalid {field} value '{value}'")]
    InvalidValue { field: &'static str, value: String },

    #[error("{field} value {value} out of range {min}-{max}")]
    OutOfRange {
        field: &'static str,
        value: u32,
        min: u32,
        max: u32,
    },

    #[error("Invalid step in {field}: '{value}'")]
    InvalidStep { field: &'static str, value: String },
}

// ---------------------------------------------------------------------------
// Field specs
// ---------------------------------------------------------------------------

#[derive(Clone, Copy)]
struct FieldSpec {
    name: &'static str,
    min: u32,
    max: u32,
    names: &'static [&'static str],
    /// Offset added to a name's index to get its numeric value.
    name_base: u32,
}

const MINUTE: FieldSpec = FieldSpec {
    name: "minute",
    min: 0,
    max: 59,
    names: &[],
    name_base: 0,
};
const HOUR: FieldSpec = FieldSpec {
    name: "hour",
    min: 0,
    max: 23,
    names: &[],
    name_base: 0,
};
const DAY_OF_MONTH: FieldSpec = FieldSpec {
    name: "day-of-month",
    min: 1,
    max: 31,
    names: &[],
    name_base: 0,
};
const MONTH: FieldSpec = FieldSpec {
    name: "month",
    min: 1,
    max: 12,
    names: &MONTH_NAMES,
    name_base: 1,
};
// 7 is accepted as an alias for Sunday and folded onto 0 after parsing.
const DAY_OF_WEEK: FieldSpec = FieldSpec {
    name: "day-of-week",
    min: 0,
    max: 7,
    names: &WEEKDAY_NAMES,
    name_base: 0,
};

/// Bit set of the values a single field matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FieldSet(u64);

impl FieldSet {
    fn contains(self, value: u32) -> bool {
        self.0 & (1u64 << value) != 0
    }
}

/// A parsed field plus whether it was written as a bare `*`.
struct ParsedField {
    set: FieldSet,
    star: bool,
}

// ---------------------------------------------------------------------------
// CronSchedule
// ---------------------------------------------------------------------------

/// A parsed five-field cron schedule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CronSchedule {
    expression: String,
    minutes: FieldSet,
    hours: FieldSet,
    days_of_month: FieldSet,
    months: FieldSet,
    days_of_week: FieldSet,
    dom_star: bool,
    dow_star: bool,
}

impl CronSchedule {
    /// Parse a cron expression or descriptor.
    pub fn parse(expression: &str) -> Result<Self, CronParseError> {
        let trimmed = expression.trim();
        if trimmed.is_empty() {
            return Err(CronParseError::Empty);
        }

        let expanded = if trimmed.starts_with('@') {
            expand_descriptor(trimmed)?
        } else {
            trimmed
        };

        let fields: Vec<&str> = expanded.split_whitespace().collect();
        if fields.len() != 5 {
            return Err(CronParseError::FieldCount(fields.len()));
        }

        let minutes = parse_field(fields[0], MINUTE)?;
        let hours = parse_field(fields[1], HOUR)?;
        let days_of_month = parse_field(fields[2], DAY_OF_MONTH)?;
        let months = parse_field(fields[3], MONTH)?;
        let mut days_of_week = parse_field(fields[4], DAY_OF_WEEK)?;

        if days_of_week.set.contains(7) {
            days_of_week.set = FieldSet((days_of_week.set.0 & !(1u64 << 7)) | 1);
        }

        Ok(Self {
            expression: trimmed.to_string(),
            minutes: minutes.set,
            hours: hours.set,
            days_of_month: days_of_month.set,
            months: months.set,
            days_of_week: days_of_week.set,
            dom_star: days_of_month.star,
            dow_star: days_of_week.star,
        })
    }

    /// The expression as it was supplied (trimmed).
    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// Whether the schedule fires at the given minute.
    pub fn matches(&self, at: NaiveDateTime) -> bool {
        self.months.contains(at.month())
            && self.day_matches(at.date())
            && self.hours.contains(at.hour())
            && self.minutes.contains(at.minute())
    }

    /// The first firing time strictly after `after`, in wall-clock time.
    ///
    /// Returns `None` if the schedule does not fire within the next
    /// [`MAX_SEARCH_YEARS`] years.
    pub fn next_after(&self, after: NaiveDateTime) -> Option<NaiveDateTime> {
        let mut t = after.with_second(0)?.with_nanosecond(0)? + chrono::Duration::minutes(1);
        let limit_year = t.year() + MAX_SEARCH_YEARS;

        while t.year() <= limit_year {
            if !self.months.contains(t.month()) {
                let (year, month) = if t.month() == 12 {
                    (t.year() + 1, 1)
                } else {
                    (t.year(), t.month() + 1)
                };
                t = NaiveDate::from_ymd_opt(year, month, 1)?.and_hms_opt(0, 0, 0)?;
                continue;
            }
            if !self.day_matches(t.date()) {
                t = t.date().succ_opt()?.and_hms_opt(0, 0, 0)?;
                continue;
            }
            if !self.hours.contains(t.hour()) {
                t = t.date().and_hms_opt(t.hour(), 0, 0)? + chrono::Duration::hours(1);
                continue;
            }
            if !self.minutes.contains(t.minute()) {
                t += chrono::Duration::minutes(1);
                continue;
            }
            return Some(t);
        }
        None
    }

    /// The first firing time strictly after `after` in `after`'s timezone.
    ///
    /// Each wall-clock match fires at most once. Times skipped by a DST gap
    /// never fire; times repeated by a fall-back fire on their first
    /// occurrence only, so a search starting inside the repeated hour moves
    /// past the matches it already saw.
    pub fn next_after_in<Tz: TimeZone>(&self, after: &DateTime<Tz>) -> Option<DateTime<Tz>> {
        let tz = after.timezone();
        let mut cursor = after.naive_local();
        loop {
            let next = self.next_after(cursor)?;
            if let Some(resolved) = tz.from_local_datetime(&next).earliest() {
                if resolved > *after {
                    return Some(resolved);
                }
            }
            cursor = next;
        }
    }

    fn day_matches(&self, date: NaiveDate) -> bool {
        let dom = self.days_of_month.contains(date.day());
        let dow = self
            .days_of_week
            .contains(date.weekday().num_days_from_sunday());
        if self.dom_star || self.dow_star {
            dom && dow
        } else {
            dom || dow
        }
    }
}

impl FromStr for CronSchedule {
    type Err = CronParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for CronSchedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.expression)
    }
}

// ---------------------------------------------------------------------------
// Parsing helpers
// ---------------------------------------------------------------------------

fn expand_descriptor(descriptor: &str) -> Result<&'static str, CronParseError> {
    match descriptor.to_ascii_lowercase().as_str() {
        "@yearly" | "@annually" => Ok("0 0 1 1 *"),
        "@monthly" => Ok("0 0 1 * *"),
        "@weekly" => Ok("0 0 * * 0"),
        "@daily" | "@midnight" => Ok("0 0 * * *"),
        "@hourly" => Ok("0 * * * *"),
        _ => Err(CronParseError::UnknownDescriptor(descriptor.to_string())),
    }
}

fn parse_field(field: &str, spec: FieldSpec) -> Result<ParsedField, CronParseError> {
    let mut bits = 0u64;
    for item in field.split(',') {
        bits |= parse_item(item, spec)?;
    }
    Ok(ParsedField {
        set: FieldSet(bits),
        star: field == "*" || field == "?",
    })
}

fn parse_item(item: &str, spec: FieldSpec) -> Result<u64, CronParseError> {
    let (range, step) = match item.split_once('/') {
        Some((range, step)) => {
            let step: u32 = step.parse().map_err(|_| CronParseError::InvalidStep {
                field: spec.name,
                value: item.to_string(),
            })?;
            if step == 0 {
                return Err(CronParseError::InvalidStep {
                    field: spec.name,
                    value: item.to_string(),
                });
            }
            (range, Some(step))
        }
        None => (item, None),
    };

    let (start, end) = if range == "*" || range == "?" {
        (spec.min, spec.max)
    } else if let Some((lo, hi)) = range.split_once('-') {
        (parse_value(lo, spec)?, parse_value(hi, spec)?)
    } else {
        let start = parse_value(range, spec)?;
        // `a/n` means "from a to the end of the range every n".
        let end = if step.is_some() { spec.max } else { start };
        (start, end)
    };

    if start > end {
        return Err(CronParseError::InvalidValue {
            field: spec.name,
            value: item.to_string(),
        });
    }

    let step = step.unwrap_or(1) as usize;
    Ok((start..=end)
        .step_by(step)
        .fold(0u64, |bits, v| bits | (1u64 << v)))
}

fn parse_value(raw: &str, spec: FieldSpec) -> Result<u32, CronParseError> {
    if let Some(idx) = spec
        .names
        .iter()
        .position(|name| name.eq_ignore_ascii_case(raw))
    {
        return Ok(idx as u32 + spec.name_base);
    }

    let value: u32 = raw.parse().map_err(|_| CronParseError::InvalidValue {
        field: spec.name,
        value: raw.to_string(),
    })?;
    if value < spec.min || value > spec.max {
        return Err(CronParseError::OutOfRange {
            field: spec.name,
            value,
            min: spec.min,
            max: spec.max,
        });
    }
    Ok(value)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use chrono::{FixedOffset, LocalResult, Utc};

    use super::*;

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, mo, d)
            .unwrap()
            .and_hms_opt(h, mi, 0)
            .unwrap()
    }

    #[test]
    fn daily_at_midnight() {
        let s = CronSchedule::parse("0 0 * * *").unwrap();
        assert_eq!(s.next_after(at(2026, 3, 14, 9, 30)), Some(at(2026, 3, 15, 0, 0)));
    }

    #[test]
    fn next_is_strictly_after() {
        let s = CronSchedule::parse("0 0 * * *").unwrap();
        assert_eq!(s.next_after(at(2026, 3, 15, 0, 0)), Some(at(2026, 3, 16, 0, 0)));
    }

    #[test]
    fn seconds_are_truncated() {
        let s = CronSchedule::parse("* * * * *").unwrap();
        let start = at(2026, 1, 1, 10, 0).with_second(42).unwrap();
        assert_eq!(s.next_after(start), Some(at(2026, 1, 1, 10, 1)));
    }

    #[test]
    fn every_fifteen_minutes() {
        let s = CronSchedule::parse("*/15 * * * *").unwrap();
        assert_eq!(s.next_after(at(2026, 1, 1, 10, 7)), Some(at(2026, 1, 1, 10, 15)));
        assert_eq!(s.next_after(at(2026, 1, 1, 10, 45)), Some(at(2026, 1, 1, 11, 0)));
    }

    #[test]
    fn lists_and_ranges() {
        let s = CronSchedule::parse("5,35 9-17 * * *").unwrap();
        assert_eq!(s.next_after(at(2026, 1, 1, 8, 0)), Some(at(2026, 1, 1, 9, 5)));
        assert_eq!(s.next_after(at(2026, 1, 1, 17, 35)), Some(at(2026, 1, 2, 9, 5)));
    }

    #[test]
    fn start_with_step_runs_to_end_of_range() {
        let s = CronSchedule::parse("0 20/2 * * *").unwrap();
        assert_eq!(s.next_after(at(2026, 1, 1, 20, 0)), Some(at(2026, 1, 1, 22, 0)));
        assert_eq!(s.next_after(at(2026, 1, 1, 22, 0)), Some(at(2026, 1, 2, 20, 0)));
    }

    #[test]
    fn month_and_weekday_names() {
        // 2026-03-02 is a Monday.
        let s = CronSchedule::parse("30 6 * mar mon-fri").unwrap();
        assert_eq!(s.next_after(at(2026, 2, 10, 0, 0)), Some(at(2026, 3, 2, 6, 30)));
    }

    #[test]
    fn sunday_as_seven() {
        // 2026-03-08 is a Sunday.
        let s = CronSchedule::parse("0 12 * * 7").unwrap();
        assert_eq!(s.next_after(at(2026, 3, 3, 0, 0)), Some(at(2026, 3, 8, 12, 0)));
    }

    #[test]
    fn restricted_day_fields_are_ored() {
        // The 13th, or any Friday. 2026-03-06 is a Friday.
        let s = CronSchedule::parse("0 0 13 * 5").unwrap();
        assert_eq!(s.next_after(at(2026, 3, 1, 0, 0)), Some(at(2026, 3, 6, 0, 0)));
        assert_eq!(s.next_after(at(2026, 3, 12, 0, 0)), Some(at(2026, 3, 13, 0, 0)));
    }

    #[test]
    fn star_day_of_month_requires_weekday() {
        let s = CronSchedule::parse("0 0 * * 5").unwrap();
        assert_eq!(s.next_after(at(2026, 3, 7, 0, 0)), Some(at(2026, 3, 13, 0, 0)));
    }

    #[test]
    fn descriptors_expand() {
        let daily = CronSchedule::parse("@daily").unwrap();
        assert_eq!(daily.next_after(at(2026, 5, 1, 1, 0)), Some(at(2026, 5, 2, 0, 0)));
        let hourly = CronSchedule::parse("@HOURLY").unwrap();
        assert_eq!(hourly.next_after(at(2026, 5, 1, 1, 10)), Some(at(2026, 5, 1, 2, 0)));
        assert_eq!(daily.expression(), "@daily");
    }

    #[test]
    fn impossible_date_never_fires() {
        let s = CronSchedule::parse("0 0 30 2 *").unwrap();
        assert_eq!(s.next_after(at(2026, 1, 1, 0, 0)), None);
    }

    #[test]
    fn leap_day_is_found() {
        let s = CronSchedule::parse("0 0 29 2 *").unwrap();
        assert_eq!(s.next_after(at(2026, 1, 1, 0, 0)), Some(at(2028, 2, 29, 0, 0)));
    }

    #[test]
    fn rejects_wrong_field_count() {
        assert_matches!(
            CronSchedule::parse("0 0 * *"),
            Err(CronParseError::FieldCount(4))
        );
        assert_matches!(
            CronSchedule::parse("0 0 0 * * *"),
            Err(CronParseError::FieldCount(6))
        );
    }

    #[test]
    fn rejects_out_of_range_values() {
        assert_matches!(
            CronSchedule::parse("60 0 * * *"),
            Err(CronParseError::OutOfRange { field: "minute", value: 60, .. })
        );
        assert_matches!(
            CronSchedule::parse("0 0 0 * *"),
            Err(CronParseError::OutOfRange { field: "day-of-month", .. })
        );
    }

    #[test]
    fn rejects_garbage() {
        assert_matches!(CronSchedule::parse(""), Err(CronParseError::Empty));
        assert_matches!(
            CronSchedule::parse("every day"),
            Err(CronParseError::FieldCount(2))
        );
        assert_matches!(
            CronSchedule::parse("x 0 * * *"),
            Err(CronParseError::InvalidValue { field: "minute", .. })
        );
        assert_matches!(
            CronSchedule::parse("*/0 * * * *"),
            Err(CronParseError::InvalidStep { .. })
        );
        assert_matches!(
            CronSchedule::parse("0 10-5 * * *"),
            Err(CronParseError::InvalidValue { field: "hour", .. })
        );
        assert_matches!(
            CronSchedule::parse("@fortnightly"),
            Err(CronParseError::UnknownDescriptor(_))
        );
    }

    #[test]
    fn from_str_and_display_round_trip_the_expression() {
        let s: CronSchedule = " 0 0 * * * ".parse().unwrap();
        assert_eq!(s.to_string(), "0 0 * * *");
    }

    #[test]
    fn next_after_in_utc() {
        let s = CronSchedule::parse("0 0 * * *").unwrap();
        let now = Utc.with_ymd_and_hms(2026, 3, 14, 9, 30, 0).unwrap();
        let next = s.next_after_in(&now).unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2026, 3, 15, 0, 0, 0).unwrap());
    }

    /// US Eastern time for 2026 only: EDT from 2026-03-08 07:00 UTC until
    /// 2026-11-01 06:00 UTC, EST otherwise.
    #[derive(Debug, Clone, Copy)]
    struct Eastern2026;

    impl Eastern2026 {
        const EDT: i32 = -4 * 3600;
        const EST: i32 = -5 * 3600;

        fn offset_at_utc(utc: &NaiveDateTime) -> FixedOffset {
            let spring = at(2026, 3, 8, 7, 0);
            let fall = at(2026, 11, 1, 6, 0);
            let secs = if *utc >= spring && *utc < fall {
                Self::EDT
            } else {
                Self::EST
            };
            FixedOffset::east_opt(secs).unwrap()
        }
    }

    impl TimeZone for Eastern2026 {
        type Offset = FixedOffset;

        fn from_offset(_: &FixedOffset) -> Self {
            Eastern2026
        }

        fn offset_from_local_date(&self, local: &NaiveDate) -> LocalResult<FixedOffset> {
            self.offset_from_local_datetime(&local.and_hms_opt(0, 0, 0).unwrap())
        }

        fn offset_from_local_datetime(&self, local: &NaiveDateTime) -> LocalResult<FixedOffset> {
            // Earlier instant (EDT) first, as chrono orders ambiguous results.
            let valid: Vec<FixedOffset> = [Self::EDT, Self::EST]
                .into_iter()
                .map(|secs| FixedOffset::east_opt(secs).unwrap())
                .filter(|offset| {
                    let utc = *local - chrono::Duration::seconds(offset.local_minus_utc() as i64);
                    Self::offset_at_utc(&utc) == *offset
                })
                .collect();
            match valid.as_slice() {
                [] => LocalResult::None,
                [one] => LocalResult::Single(*one),
                [first, second, ..] => LocalResult::Ambiguous(*first, *second),
            }
        }

        fn offset_from_utc_date(&self, utc: &NaiveDate) -> FixedOffset {
            Self::offset_at_utc(&utc.and_hms_opt(0, 0, 0).unwrap())
        }

        fn offset_from_utc_datetime(&self, utc: &NaiveDateTime) -> FixedOffset {
            Self::offset_at_utc(utc)
        }
    }

    fn eastern_from_utc(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Eastern2026> {
        Eastern2026.from_utc_datetime(&at(y, mo, d, h, mi))
    }

    #[test]
    fn repeated_hour_never_goes_backwards() {
        let s = CronSchedule::parse("*/5 * * * *").unwrap();
        // 01:06 EST, the second pass through 01:xx on fall-back day.
        let after = eastern_from_utc(2026, 11, 1, 6, 6);
        let next = s.next_after_in(&after).unwrap();
        assert!(next > after);
        // 01:10 already happened as EDT; the next unseen match is 02:00 EST.
        assert_eq!(next, eastern_from_utc(2026, 11, 1, 7, 0));
    }

    #[test]
    fn first_pass_of_repeated_hour_fires_normally() {
        let s = CronSchedule::parse("*/5 * * * *").unwrap();
        // 01:06 EDT.
        let after = eastern_from_utc(2026, 11, 1, 5, 6);
        assert_eq!(
            s.next_after_in(&after).unwrap(),
            eastern_from_utc(2026, 11, 1, 5, 10)
        );
    }

    #[test]
    fn repeated_daily_time_fires_once() {
        let s = CronSchedule::parse("30 1 * * *").unwrap();
        let first = s.next_after_in(&eastern_from_utc(2026, 11, 1, 4, 0)).unwrap();
        assert_eq!(first, eastern_from_utc(2026, 11, 1, 5, 30));
        let second = s.next_after_in(&first).unwrap();
        // Next day's 01:30 EST, not the repeated 01:30 an hour later.
        assert_eq!(second, eastern_from_utc(2026, 11, 2, 6, 30));
    }

    #[test]
    fn spring_gap_is_skipped() {
        let s = CronSchedule::parse("30 2 * * *").unwrap();
        // 2026-03-08 02:30 local does not exist.
        let after = eastern_from_utc(2026, 3, 8, 6, 0);
        assert_eq!(
            s.next_after_in(&after).unwrap(),
            eastern_from_utc(2026, 3, 9, 6, 30)
        );
    }

    #[test]
    fn matches_checks_every_field() {
        let s = CronSchedule::parse("15 3 * * *").unwrap();
        assert!(s.matches(at(2026, 7, 4, 3, 15)));
        assert!(!s.matches(at(2026, 7, 4, 3, 16)));
    }
}
