//! Temporal construction and adjustment: the `date()`/`time()`/
//! `datetime()` constructor family, component maps and overrides,
//! `*.truncate`, and shifting a temporal string by a duration. Also the
//! small clock/calendar helpers the comparison and arithmetic layers use.
//!
//! Constructors format back to strings; the engine's temporal values are
//! strings in the accepted ISO profiles, not a dedicated value variant.

use super::duration_value::{Span, duration_from_value, negate_duration};
use super::temporal_text::{
    TemporalValue, extract_timezone_name, format_datetime_literal, format_offset,
    format_time_literal, format_wide_datetime, format_zoned_datetime, offset_split_index,
    parse_fixed_offset, parse_temporal_string, parse_time_literal, parse_wide_datetime, utc,
    weekday_from_ordinal, zone_standard_offset,
};
use super::Value;
use chrono::{
    Datelike, Duration, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Timelike,
};
use std::cmp::Ordering;
use std::collections::BTreeMap;

const DAY_NANOS: i64 = 86_400_000_000_000;

// ---- function dispatch ----

pub(super) fn evaluate_temporal_function(name: &str, args: &[Value]) -> Option<Value> {
    match name {
        "timestamp" => Some(Value::Int(chrono::Utc::now().timestamp_millis())),
        "date" | "date.transaction" | "date.statement" | "date.realtime" => {
            Some(construct_date(args.first()))
        }
        "localtime" | "localtime.transaction" | "localtime.statement" | "localtime.realtime" => {
            Some(construct_local_time(args.first()))
        }
        "time" | "time.transaction" | "time.statement" | "time.realtime" => {
            Some(construct_time(args.first()))
        }
        "localdatetime"
        | "localdatetime.transaction"
        | "localdatetime.statement"
        | "localdatetime.realtime" => Some(construct_local_datetime(args.first())),
        "datetime" | "datetime.transaction" | "datetime.statement" | "datetime.realtime" => {
            Some(construct_datetime(args.first()))
        }
        "datetime.fromepoch" => Some(from_epoch(args, 1_000_000_000)),
        "datetime.fromepochmillis" => Some(from_epoch(args, 1_000_000)),
        "duration" => Some(super::duration_value::construct_duration(args.first())),
        "date.truncate"
        | "localtime.truncate"
        | "time.truncate"
        | "localdatetime.truncate"
        | "datetime.truncate" => Some(evaluate_truncate(name, args)),
        "duration.between" | "duration.inmonths" | "duration.indays" | "duration.inseconds" => {
            Some(super::duration_value::evaluate_duration_between(name, args))
        }
        _ => None,
    }
}

/// Seconds- or millis-based epoch constructor; the second argument adds
/// nanoseconds.
fn from_epoch(args: &[Value], unit_nanos: i64) -> Value {
    let number = |v: Option<&Value>| match v {
        Some(Value::Int(i)) => Some(*i),
        Some(Value::Float(f)) if f.fract() == 0.0 => Some(*f as i64),
        _ => None,
    };
    let Some(count) = number(args.first()) else {
        return Value::Null;
    };
    let extra = number(args.get(1)).unwrap_or(0);

    let total_nanos = (count as i128) * (unit_nanos as i128) + extra as i128;
    let seconds = total_nanos.div_euclid(1_000_000_000);
    let nanos = total_nanos.rem_euclid(1_000_000_000) as u32;
    let Ok(seconds) = i64::try_from(seconds) else {
        return Value::Null;
    };
    match utc().timestamp_opt(seconds, nanos).single() {
        Some(dt) => Value::String(format_zoned_datetime(dt, true)),
        None => Value::Null,
    }
}

// ---- small calendar/clock helpers ----

pub(super) fn time_of_day_nanos(time: NaiveTime) -> i128 {
    time.num_seconds_from_midnight() as i128 * 1_000_000_000 + time.nanosecond() as i128
}

pub(super) fn compare_time_of_day(left: NaiveTime, right: NaiveTime) -> Ordering {
    time_of_day_nanos(left).cmp(&time_of_day_nanos(right))
}

pub(super) fn compare_time_with_offset(
    lt: NaiveTime,
    lo: FixedOffset,
    rt: NaiveTime,
    ro: FixedOffset,
) -> Ordering {
    let normalize = |t: NaiveTime, o: FixedOffset| {
        time_of_day_nanos(t) - o.local_minus_utc() as i128 * 1_000_000_000
    };
    normalize(lt, lo).cmp(&normalize(rt, ro))
}

/// Shifts a clock time, wrapping around midnight.
pub(super) fn shift_time_of_day(time: NaiveTime, delta_nanos: i64) -> Option<NaiveTime> {
    let wrapped = (time_of_day_nanos(time) + delta_nanos as i128).rem_euclid(DAY_NANOS as i128);
    NaiveTime::from_num_seconds_from_midnight_opt(
        (wrapped / 1_000_000_000) as u32,
        (wrapped % 1_000_000_000) as u32,
    )
}

/// Civil month addition: the day clamps downward when the target month is
/// shorter (Jan 31 + 1 month = Feb 28/29).
pub(super) fn add_months(date: NaiveDate, delta: i32) -> Option<NaiveDate> {
    if delta == 0 {
        return Some(date);
    }
    let total = date.year() * 12 + date.month0() as i32 + delta;
    let year = total.div_euclid(12);
    let month = (total.rem_euclid(12) + 1) as u32;
    let mut day = date.day();
    loop {
        if let Some(candidate) = NaiveDate::from_ymd_opt(year, month, day) {
            return Some(candidate);
        }
        if day == 1 {
            return None;
        }
        day -= 1;
    }
}

// ---- shifting a temporal string by a duration ----

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum ShiftDirection {
    Forward,
    Backward,
}

/// Adds (or subtracts) a duration to a temporal string: months move on the
/// civil calendar, days and nanoseconds move linearly, and the result
/// formats back in the same shape the input had.
pub(super) fn shift_temporal_string(
    base: &str,
    duration: &Value,
    direction: ShiftDirection,
) -> Option<String> {
    let span = duration_from_value(duration)?;
    let span = match direction {
        ShiftDirection::Forward => span,
        ShiftDirection::Backward => negate_duration(&span),
    };
    let months = i32::try_from(span.months).ok()?;

    match parse_temporal_string(base)? {
        TemporalValue::Date(date) => {
            let carry_days = span.nanos / DAY_NANOS;
            let shifted = add_months(date, months)?
                .checked_add_signed(Duration::days(span.days.saturating_add(carry_days)))?;
            Some(shifted.format("%Y-%m-%d").to_string())
        }
        TemporalValue::LocalTime(time) => {
            let nanos = span.days.saturating_mul(DAY_NANOS).saturating_add(span.nanos);
            Some(format_time_literal(shift_time_of_day(time, nanos)?, true))
        }
        TemporalValue::Time { time, offset } => {
            let nanos = span.days.saturating_mul(DAY_NANOS).saturating_add(span.nanos);
            Some(format!(
                "{}{}",
                format_time_literal(shift_time_of_day(time, nanos)?, true),
                format_offset(offset)
            ))
        }
        TemporalValue::LocalDateTime(dt) => {
            let shifted = add_months(dt.date(), months)?
                .and_time(dt.time())
                .checked_add_signed(Duration::days(span.days))?
                .checked_add_signed(Duration::nanoseconds(span.nanos))?;
            Some(format_datetime_literal(shifted, true))
        }
        TemporalValue::DateTime(dt) => {
            let local = dt.naive_local();
            let shifted_local = add_months(local.date(), months)?
                .and_time(local.time())
                .checked_add_signed(Duration::days(span.days))?
                .checked_add_signed(Duration::nanoseconds(span.nanos))?;
            let shifted = dt.offset().from_local_datetime(&shifted_local).single()?;
            Some(format_zoned_datetime(shifted, true))
        }
    }
}

// ---- component maps ----

pub(super) fn map_int(map: &BTreeMap<String, Value>, key: &str) -> Option<i64> {
    match map.get(key) {
        Some(Value::Int(v)) => Some(*v),
        Some(Value::Float(v)) => Some(*v as i64),
        _ => None,
    }
}

fn map_year(map: &BTreeMap<String, Value>, key: &str) -> Option<i32> {
    map_int(map, key).map(|v| v as i32)
}

fn map_field(map: &BTreeMap<String, Value>, key: &str) -> Option<u32> {
    map_int(map, key).and_then(|v| u32::try_from(v).ok())
}

pub(super) fn map_text(map: &BTreeMap<String, Value>, key: &str) -> Option<String> {
    match map.get(key) {
        Some(Value::String(s)) => Some(s.clone()),
        _ => None,
    }
}

/// `{year, month, day}` plus the week (`week`/`dayOfWeek`), quarter
/// (`quarter`/`dayOfQuarter`), and ordinal (`ordinalDay`) forms. A `date`
/// or `datetime` string seeds defaults for omitted fields.
pub(super) fn date_from_map(map: &BTreeMap<String, Value>) -> Option<NaiveDate> {
    let seed = map
        .get("date")
        .or_else(|| map.get("datetime"))
        .and_then(|v| match v {
            Value::String(s) => parse_temporal_string(s),
            _ => None,
        })
        .and_then(|parsed| match parsed {
            TemporalValue::Date(d) => Some(d),
            TemporalValue::LocalDateTime(dt) => Some(dt.date()),
            TemporalValue::DateTime(dt) => Some(dt.naive_local().date()),
            _ => None,
        });

    if let Some(week) = map_field(map, "week") {
        let year = map_year(map, "year").or_else(|| seed.map(|d| d.iso_week().year()))?;
        let day = map_field(map, "dayOfWeek")
            .or_else(|| seed.map(|d| d.weekday().number_from_monday()))
            .unwrap_or(1);
        return NaiveDate::from_isoywd_opt(year, week, weekday_from_ordinal(day)?);
    }

    let year = map_year(map, "year").or_else(|| seed.map(|d| d.year()))?;

    if let Some(ordinal) = map_field(map, "ordinalDay") {
        return NaiveDate::from_yo_opt(year, ordinal);
    }

    if let Some(quarter) = map_field(map, "quarter") {
        if !(1..=4).contains(&quarter) {
            return None;
        }
        let start_month = (quarter - 1) * 3 + 1;
        let start = NaiveDate::from_ymd_opt(year, start_month, 1)?;
        if let Some(day_of_quarter) = map_field(map, "dayOfQuarter") {
            return start.checked_add_signed(Duration::days(i64::from(day_of_quarter) - 1));
        }
        let month_in_quarter = seed.map(|d| d.month0() % 3).unwrap_or(0);
        let month = map_field(map, "month").unwrap_or(start_month + month_in_quarter);
        let day = map_field(map, "day")
            .or_else(|| seed.map(|d| d.day()))
            .unwrap_or(1);
        return NaiveDate::from_ymd_opt(year, month, day);
    }

    let month = map_field(map, "month")
        .or_else(|| seed.map(|d| d.month()))
        .unwrap_or(1);
    let day = map_field(map, "day")
        .or_else(|| seed.map(|d| d.day()))
        .unwrap_or(1);
    NaiveDate::from_ymd_opt(year, month, day)
}

/// Clock fields from a map, seeded by a `time` string when present. The
/// boolean reports whether the result should print seconds.
pub(super) fn time_from_map(map: &BTreeMap<String, Value>) -> Option<(NaiveTime, bool)> {
    let seed = map.get("time").and_then(|v| match v {
        Value::String(s) => match parse_temporal_string(s) {
            Some(TemporalValue::LocalTime(t)) => Some(t),
            Some(TemporalValue::Time { time, .. }) => Some(time),
            Some(TemporalValue::LocalDateTime(dt)) => Some(dt.time()),
            Some(TemporalValue::DateTime(dt)) => Some(dt.naive_local().time()),
            _ => None,
        },
        _ => None,
    });

    let hour = map_field(map, "hour").or_else(|| seed.map(|t| t.hour())).unwrap_or(0);
    let minute = map_field(map, "minute")
        .or_else(|| seed.map(|t| t.minute()))
        .unwrap_or(0);
    let second = map_field(map, "second")
        .or_else(|| seed.map(|t| t.second()))
        .unwrap_or(0);

    let has_subsecond = ["millisecond", "microsecond", "nanosecond"]
        .iter()
        .any(|k| map.contains_key(*k));
    let nanos = if has_subsecond {
        map_field(map, "millisecond").unwrap_or(0) * 1_000_000
            + map_field(map, "microsecond").unwrap_or(0) * 1_000
            + map_field(map, "nanosecond").unwrap_or(0)
    } else {
        seed.map(|t| t.nanosecond()).unwrap_or(0)
    };

    let include_seconds = map.contains_key("second")
        || has_subsecond
        || second != 0
        || nanos != 0;
    NaiveTime::from_hms_nano_opt(hour, minute, second, nanos).map(|t| (t, include_seconds))
}

// ---- overrides (truncate's third argument, datetime-from-string maps) ----

pub(super) fn override_date(
    date: NaiveDate,
    overrides: Option<&BTreeMap<String, Value>>,
) -> Option<NaiveDate> {
    let Some(map) = overrides else {
        return Some(date);
    };
    let mut current = date;

    if let Some(week) = map_field(map, "week") {
        let year = map_year(map, "year").unwrap_or_else(|| current.iso_week().year());
        let day = map_field(map, "dayOfWeek").unwrap_or(1);
        current = NaiveDate::from_isoywd_opt(year, week, weekday_from_ordinal(day)?)?;
    } else if let Some(day) = map_field(map, "dayOfWeek") {
        let monday = current.checked_sub_signed(Duration::days(i64::from(
            current.weekday().num_days_from_monday(),
        )))?;
        current = monday.checked_add_signed(Duration::days(i64::from(
            weekday_from_ordinal(day)?.num_days_from_monday(),
        )))?;
    }

    let year = map_year(map, "year").unwrap_or_else(|| current.year());

    if let Some(ordinal) = map_field(map, "ordinalDay") {
        return NaiveDate::from_yo_opt(year, ordinal);
    }
    if let Some(quarter) = map_field(map, "quarter") {
        if !(1..=4).contains(&quarter) {
            return None;
        }
        let start_month = (quarter - 1) * 3 + 1;
        let start = NaiveDate::from_ymd_opt(year, start_month, 1)?;
        if let Some(day_of_quarter) = map_field(map, "dayOfQuarter") {
            return start.checked_add_signed(Duration::days(i64::from(day_of_quarter) - 1));
        }
        let month = map_field(map, "month").unwrap_or(start_month + current.month0() % 3);
        let day = map_field(map, "day").unwrap_or_else(|| current.day());
        return NaiveDate::from_ymd_opt(year, month, day);
    }

    let month = map_field(map, "month").unwrap_or_else(|| current.month());
    let day = map_field(map, "day").unwrap_or_else(|| current.day());
    NaiveDate::from_ymd_opt(year, month, day)
}

pub(super) fn override_time(
    time: NaiveTime,
    overrides: Option<&BTreeMap<String, Value>>,
) -> Option<(NaiveTime, bool)> {
    let mut hour = time.hour();
    let mut minute = time.minute();
    let mut second = time.second();
    let mut nanos = time.nanosecond();
    let mut include_seconds = second != 0 || nanos != 0;

    if let Some(map) = overrides {
        if let Some(v) = map_field(map, "hour") {
            hour = v;
        }
        if let Some(v) = map_field(map, "minute") {
            minute = v;
        }
        if let Some(v) = map_field(map, "second") {
            second = v;
            include_seconds = true;
        }
        if let Some(v) = map_field(map, "millisecond") {
            if v >= 1_000 {
                return None;
            }
            nanos = v * 1_000_000 + nanos % 1_000_000;
            include_seconds = true;
        }
        if let Some(v) = map_field(map, "microsecond") {
            if v >= 1_000_000 {
                return None;
            }
            nanos = v * 1_000 + nanos % 1_000;
            include_seconds = true;
        }
        if let Some(v) = map_field(map, "nanosecond") {
            if v >= 1_000_000_000 {
                return None;
            }
            nanos = if v < 1_000 { (nanos / 1_000) * 1_000 + v } else { v };
            include_seconds = true;
        }
    }

    NaiveTime::from_hms_nano_opt(hour, minute, second, nanos).map(|t| (t, include_seconds))
}

// ---- truncation ----

fn truncate_date(unit: &str, date: NaiveDate) -> Option<NaiveDate> {
    match unit {
        "day" => Some(date),
        "week" => date.checked_sub_signed(Duration::days(i64::from(
            date.weekday().num_days_from_monday(),
        ))),
        "weekyear" => NaiveDate::from_isoywd_opt(date.iso_week().year(), 1, chrono::Weekday::Mon),
        "month" => NaiveDate::from_ymd_opt(date.year(), date.month(), 1),
        "quarter" => NaiveDate::from_ymd_opt(date.year(), (date.month0() / 3) * 3 + 1, 1),
        "year" => NaiveDate::from_ymd_opt(date.year(), 1, 1),
        "decade" => NaiveDate::from_ymd_opt(date.year().div_euclid(10) * 10, 1, 1),
        "century" => NaiveDate::from_ymd_opt(date.year().div_euclid(100) * 100, 1, 1),
        "millennium" => NaiveDate::from_ymd_opt(date.year().div_euclid(1000) * 1000, 1, 1),
        _ => None,
    }
}

fn truncate_time(unit: &str, time: NaiveTime) -> Option<NaiveTime> {
    let (h, m, s, n) = (time.hour(), time.minute(), time.second(), time.nanosecond());
    match unit {
        "day" => NaiveTime::from_hms_nano_opt(0, 0, 0, 0),
        "hour" => NaiveTime::from_hms_nano_opt(h, 0, 0, 0),
        "minute" => NaiveTime::from_hms_nano_opt(h, m, 0, 0),
        "second" => NaiveTime::from_hms_nano_opt(h, m, s, 0),
        "millisecond" => NaiveTime::from_hms_nano_opt(h, m, s, (n / 1_000_000) * 1_000_000),
        "microsecond" => NaiveTime::from_hms_nano_opt(h, m, s, (n / 1_000) * 1_000),
        _ => None,
    }
}

fn truncate_datetime(unit: &str, dt: NaiveDateTime) -> Option<NaiveDateTime> {
    const DATE_UNITS: [&str; 9] = [
        "millennium",
        "century",
        "decade",
        "year",
        "weekyear",
        "quarter",
        "month",
        "week",
        "day",
    ];
    if DATE_UNITS.contains(&unit) {
        return truncate_date(unit, dt.date())?.and_hms_nano_opt(0, 0, 0, 0);
    }
    Some(dt.date().and_time(truncate_time(unit, dt.time())?))
}

/// Picks the output offset for time/datetime truncation: an override
/// timezone wins (named zones keep their `[zone]` suffix), else the
/// source's own offset, else UTC.
fn pick_offset(
    overrides: Option<&BTreeMap<String, Value>>,
    base: Option<FixedOffset>,
) -> (FixedOffset, Option<String>) {
    if let Some(map) = overrides
        && let Some(tz) = map_text(map, "timezone")
    {
        if let Some(parsed) = parse_fixed_offset(&tz) {
            return (parsed, None);
        }
        if let Some(named) = zone_standard_offset(&tz) {
            return (named, Some(tz));
        }
        return (base.unwrap_or_else(utc), Some(tz));
    }
    (base.unwrap_or_else(utc), None)
}

fn midnight_of(date: NaiveDate) -> NaiveDateTime {
    date.and_hms_opt(0, 0, 0)
        .expect("midnight exists for every date")
}

fn evaluate_truncate(function_name: &str, args: &[Value]) -> Value {
    let (Some(Value::String(unit_raw)), Some(Value::String(source))) = (args.first(), args.get(1))
    else {
        return Value::Null;
    };
    let unit = unit_raw.to_lowercase();
    let Some(temporal) = parse_temporal_string(source) else {
        return Value::Null;
    };
    let overrides = args.get(2).and_then(|v| match v {
        Value::Map(map) => Some(map),
        _ => None,
    });

    match function_name {
        "date.truncate" => {
            let base = match temporal {
                TemporalValue::Date(d) => d,
                TemporalValue::LocalDateTime(dt) => dt.date(),
                TemporalValue::DateTime(dt) => dt.naive_local().date(),
                _ => return Value::Null,
            };
            truncate_date(&unit, base)
                .and_then(|d| override_date(d, overrides))
                .map(|d| Value::String(d.format("%Y-%m-%d").to_string()))
                .unwrap_or(Value::Null)
        }
        "localtime.truncate" => {
            let base = match temporal {
                TemporalValue::LocalTime(t) | TemporalValue::Time { time: t, .. } => t,
                TemporalValue::LocalDateTime(dt) => dt.time(),
                TemporalValue::DateTime(dt) => dt.naive_local().time(),
                _ => return Value::Null,
            };
            truncate_time(&unit, base)
                .and_then(|t| override_time(t, overrides))
                .map(|(t, secs)| Value::String(format_time_literal(t, secs)))
                .unwrap_or(Value::Null)
        }
        "time.truncate" => {
            let (base, base_offset) = match temporal {
                TemporalValue::Time { time, offset } => (time, Some(offset)),
                TemporalValue::LocalTime(t) => (t, None),
                TemporalValue::LocalDateTime(dt) => (dt.time(), None),
                TemporalValue::DateTime(dt) => (dt.naive_local().time(), Some(*dt.offset())),
                _ => return Value::Null,
            };
            let Some((time, secs)) =
                truncate_time(&unit, base).and_then(|t| override_time(t, overrides))
            else {
                return Value::Null;
            };
            let (offset, zone) = pick_offset(overrides, base_offset);
            let mut out = format!("{}{}", format_time_literal(time, secs), format_offset(offset));
            if let Some(zone) = zone {
                out.push_str(&format!("[{zone}]"));
            }
            Value::String(out)
        }
        "localdatetime.truncate" => {
            let base = match temporal {
                TemporalValue::LocalDateTime(dt) => dt,
                TemporalValue::Date(d) => midnight_of(d),
                TemporalValue::DateTime(dt) => dt.naive_local(),
                _ => return Value::Null,
            };
            let Some(truncated) = truncate_datetime(&unit, base) else {
                return Value::Null;
            };
            let Some(date) = override_date(truncated.date(), overrides) else {
                return Value::Null;
            };
            let Some((time, secs)) = override_time(truncated.time(), overrides) else {
                return Value::Null;
            };
            Value::String(format_datetime_literal(date.and_time(time), secs))
        }
        "datetime.truncate" => {
            let (base, base_offset) = match temporal {
                TemporalValue::DateTime(dt) => (dt.naive_local(), Some(*dt.offset())),
                TemporalValue::LocalDateTime(dt) => (dt, None),
                TemporalValue::Date(d) => (midnight_of(d), None),
                _ => return Value::Null,
            };
            let Some(truncated) = truncate_datetime(&unit, base) else {
                return Value::Null;
            };
            let Some(date) = override_date(truncated.date(), overrides) else {
                return Value::Null;
            };
            let Some((time, secs)) = override_time(truncated.time(), overrides) else {
                return Value::Null;
            };
            let (offset, zone) = pick_offset(overrides, base_offset);
            let Some(dt) = offset.from_local_datetime(&date.and_time(time)).single() else {
                return Value::Null;
            };
            let mut out = format_zoned_datetime(dt, secs);
            if let Some(zone) = zone {
                out.push_str(&format!("[{zone}]"));
            }
            Value::String(out)
        }
        _ => Value::Null,
    }
}

// ---- constructors ----

fn clock_display(time: NaiveTime) -> bool {
    time.second() != 0 || time.nanosecond() != 0
}

pub(super) fn construct_date(arg: Option<&Value>) -> Value {
    match arg {
        None => Value::String("1970-01-01".to_string()),
        Some(Value::Map(map)) => date_from_map(map)
            .map(|d| Value::String(d.format("%Y-%m-%d").to_string()))
            .unwrap_or(Value::Null),
        Some(Value::String(s)) => {
            let date = match parse_temporal_string(s) {
                Some(TemporalValue::Date(d)) => Some(d),
                Some(TemporalValue::LocalDateTime(dt)) => Some(dt.date()),
                Some(TemporalValue::DateTime(dt)) => Some(dt.naive_local().date()),
                _ => None,
            };
            date.map(|d| Value::String(d.format("%Y-%m-%d").to_string()))
                .or_else(|| {
                    super::temporal_text::parse_wide_date(s)
                        .map(|d| Value::String(super::temporal_text::format_wide_date(d)))
                })
                .unwrap_or(Value::Null)
        }
        _ => Value::Null,
    }
}

/// Times prefer the clock reading of a string: `2140` is 21:40, not the
/// year 2140 the date-first parse ladder would see.
fn clock_first_parse(raw: &str) -> Option<(NaiveTime, Option<FixedOffset>)> {
    let s = raw.trim();
    let bare = s.split('[').next().unwrap_or(s).trim();
    if bare.is_empty() {
        return None;
    }
    if let Some(stripped) = bare.strip_suffix('Z') {
        return Some((parse_time_literal(stripped)?, Some(utc())));
    }
    if let Some(split) = offset_split_index(bare) {
        let (time_text, offset_text) = bare.split_at(split);
        return Some((
            parse_time_literal(time_text)?,
            Some(parse_fixed_offset(offset_text)?),
        ));
    }
    Some((parse_time_literal(bare)?, None))
}

pub(super) fn construct_local_time(arg: Option<&Value>) -> Value {
    match arg {
        None => Value::String("00:00".to_string()),
        Some(Value::Map(map)) => time_from_map(map)
            .map(|(t, secs)| Value::String(format_time_literal(t, secs)))
            .unwrap_or(Value::Null),
        Some(Value::String(s)) => {
            if let Some((time, _)) = clock_first_parse(s) {
                return Value::String(format_time_literal(time, clock_display(time)));
            }
            let time = match parse_temporal_string(s) {
                Some(TemporalValue::LocalTime(t)) | Some(TemporalValue::Time { time: t, .. }) => {
                    Some(t)
                }
                Some(TemporalValue::LocalDateTime(dt)) => Some(dt.time()),
                Some(TemporalValue::DateTime(dt)) => Some(dt.naive_local().time()),
                _ => None,
            };
            time.map(|t| Value::String(format_time_literal(t, clock_display(t))))
                .unwrap_or(Value::Null)
        }
        _ => Value::Null,
    }
}

pub(super) fn construct_time(arg: Option<&Value>) -> Value {
    match arg {
        None => Value::String("00:00Z".to_string()),
        Some(Value::Map(map)) => {
            let Some((mut time, secs)) = time_from_map(map) else {
                return Value::Null;
            };
            // The seed string's own offset, if it carried one.
            let base_offset = map
                .get("time")
                .and_then(|v| match v {
                    Value::String(raw) => parse_temporal_string(raw),
                    _ => None,
                })
                .and_then(|parsed| match parsed {
                    TemporalValue::Time { offset, .. } => Some(offset),
                    TemporalValue::DateTime(dt) => Some(*dt.offset()),
                    _ => None,
                });

            let mut zone_suffix = None;
            let offset = match map_text(map, "timezone") {
                None => base_offset.unwrap_or_else(utc),
                Some(tz) => {
                    let target = if let Some(parsed) = parse_fixed_offset(&tz) {
                        parsed
                    } else if let Some(named) = zone_standard_offset(&tz) {
                        zone_suffix = Some(tz);
                        named
                    } else {
                        return Value::Null;
                    };
                    // Re-anchoring to a different zone moves the clock.
                    if let Some(base) = base_offset {
                        let delta = target.local_minus_utc() - base.local_minus_utc();
                        if let Some(shifted) =
                            shift_time_of_day(time, i64::from(delta) * 1_000_000_000)
                        {
                            time = shifted;
                        }
                    }
                    target
                }
            };

            let mut out = format!("{}{}", format_time_literal(time, secs), format_offset(offset));
            if let Some(zone) = zone_suffix {
                out.push_str(&format!("[{zone}]"));
            }
            Value::String(out)
        }
        Some(Value::String(s)) => {
            if let Some((time, offset)) = clock_first_parse(s) {
                return Value::String(format!(
                    "{}{}",
                    format_time_literal(time, clock_display(time)),
                    format_offset(offset.unwrap_or_else(utc))
                ));
            }
            match parse_temporal_string(s) {
                Some(TemporalValue::Time { time, offset }) => Value::String(format!(
                    "{}{}",
                    format_time_literal(time, clock_display(time)),
                    format_offset(offset)
                )),
                Some(TemporalValue::LocalTime(time)) => Value::String(format!(
                    "{}Z",
                    format_time_literal(time, clock_display(time))
                )),
                Some(TemporalValue::LocalDateTime(dt)) => {
                    let time = dt.time();
                    Value::String(format!("{}Z", format_time_literal(time, clock_display(time))))
                }
                Some(TemporalValue::DateTime(dt)) => {
                    let time = dt.naive_local().time();
                    Value::String(format!(
                        "{}{}",
                        format_time_literal(time, clock_display(time)),
                        format_offset(*dt.offset())
                    ))
                }
                _ => Value::Null,
            }
        }
        _ => Value::Null,
    }
}

pub(super) fn construct_local_datetime(arg: Option<&Value>) -> Value {
    match arg {
        None => Value::String("1970-01-01T00:00".to_string()),
        Some(Value::Map(map)) => {
            // A `datetime` seed takes the override path so week/quarter
            // adjustments land on the parsed base.
            if let Some(Value::String(raw)) = map.get("datetime")
                && let Some(parsed) = parse_temporal_string(raw)
            {
                let (base_date, base_time) = match parsed {
                    TemporalValue::DateTime(dt) => (dt.naive_local().date(), dt.naive_local().time()),
                    TemporalValue::LocalDateTime(dt) => (dt.date(), dt.time()),
                    TemporalValue::Date(d) => (d, midnight_of(d).time()),
                    _ => return Value::Null,
                };
                let Some(date) = override_date(base_date, Some(map)) else {
                    return Value::Null;
                };
                let Some((time, secs)) = override_time(base_time, Some(map)) else {
                    return Value::Null;
                };
                return Value::String(format_datetime_literal(date.and_time(time), secs));
            }

            let (Some(date), Some((time, secs))) = (date_from_map(map), time_from_map(map)) else {
                return Value::Null;
            };
            Value::String(format_datetime_literal(date.and_time(time), secs))
        }
        Some(Value::String(s)) => match parse_temporal_string(s) {
            Some(TemporalValue::LocalDateTime(dt)) => {
                Value::String(format_datetime_literal(dt, clock_display(dt.time())))
            }
            Some(TemporalValue::DateTime(dt)) => {
                let local = dt.naive_local();
                Value::String(format_datetime_literal(local, clock_display(local.time())))
            }
            _ => parse_wide_datetime(s)
                .map(|dt| Value::String(format_wide_datetime(dt)))
                .unwrap_or(Value::Null),
        },
        _ => Value::Null,
    }
}

pub(super) fn construct_datetime(arg: Option<&Value>) -> Value {
    match arg {
        None => Value::String("1970-01-01T00:00Z".to_string()),
        Some(Value::Map(map)) => {
            let mut zone_name = None;
            // Seed from a `datetime` string or from component fields.
            let (base_date, base_time, base_secs, base_offset) =
                if let Some(Value::String(raw)) = map.get("datetime") {
                    zone_name = extract_timezone_name(raw);
                    match parse_temporal_string(raw) {
                        Some(TemporalValue::DateTime(dt)) => {
                            let local = dt.naive_local();
                            (
                                local.date(),
                                local.time(),
                                clock_display(local.time()),
                                Some(*dt.offset()),
                            )
                        }
                        Some(TemporalValue::LocalDateTime(dt)) => {
                            (dt.date(), dt.time(), clock_display(dt.time()), None)
                        }
                        Some(TemporalValue::Date(d)) => (d, midnight_of(d).time(), false, None),
                        _ => return Value::Null,
                    }
                } else {
                    let (Some(date), Some((time, secs))) = (date_from_map(map), time_from_map(map))
                    else {
                        return Value::Null;
                    };
                    (date, time, secs, None)
                };

            let Some(date) = override_date(base_date, Some(map)) else {
                return Value::Null;
            };
            let Some((time, secs)) = override_time(base_time, Some(map)) else {
                return Value::Null;
            };
            let secs = secs || base_secs;

            let mut zone_suffix = None;
            let offset = match map_text(map, "timezone") {
                None => {
                    if let Some(zone) = &zone_name {
                        zone_suffix = Some(zone.clone());
                        super::temporal_text::zone_offset_at(zone, date, time)
                            .or_else(|| zone_standard_offset(zone))
                            .or(base_offset)
                            .unwrap_or_else(utc)
                    } else {
                        base_offset.unwrap_or_else(utc)
                    }
                }
                Some(tz) => {
                    if let Some(parsed) = parse_fixed_offset(&tz) {
                        parsed
                    } else if let Some(named) =
                        super::temporal_text::zone_offset_at(&tz, date, time)
                            .or_else(|| zone_standard_offset(&tz))
                    {
                        zone_suffix = Some(tz);
                        named
                    } else {
                        return Value::Null;
                    }
                }
            };

            let Some(dt) = offset.from_local_datetime(&date.and_time(time)).single() else {
                return Value::Null;
            };
            let mut out = format_zoned_datetime(dt, secs);
            if let Some(zone) = zone_suffix {
                out.push_str(&format!("[{zone}]"));
            }
            Value::String(out)
        }
        Some(Value::String(s)) => {
            let zone_name = extract_timezone_name(s);
            match parse_temporal_string(s) {
                Some(TemporalValue::DateTime(dt)) => {
                    let mut out = format_zoned_datetime(dt, clock_display(dt.naive_local().time()));
                    if let Some(zone) = zone_name {
                        out.push_str(&format!("[{zone}]"));
                    }
                    Value::String(out)
                }
                Some(TemporalValue::LocalDateTime(dt)) => {
                    let offset = zone_name
                        .as_deref()
                        .and_then(|zone| {
                            super::temporal_text::zone_offset_at(zone, dt.date(), dt.time())
                        })
                        .unwrap_or_else(utc);
                    let Some(zoned) = offset.from_local_datetime(&dt).single() else {
                        return Value::Null;
                    };
                    let mut out = format_zoned_datetime(zoned, clock_display(dt.time()));
                    if let Some(zone) = zone_name {
                        out.push_str(&format!("[{zone}]"));
                    }
                    Value::String(out)
                }
                Some(TemporalValue::Date(d)) => {
                    let Some(zoned) = utc().from_local_datetime(&midnight_of(d)).single() else {
                        return Value::Null;
                    };
                    Value::String(format_zoned_datetime(zoned, false))
                }
                _ => Value::Null,
            }
        }
        _ => Value::Null,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructors_have_fixed_epoch_defaults() {
        assert_eq!(construct_date(None), Value::String("1970-01-01".into()));
        assert_eq!(construct_local_time(None), Value::String("00:00".into()));
        assert_eq!(
            construct_datetime(None),
            Value::String("1970-01-01T00:00Z".into())
        );
    }

    #[test]
    fn date_from_component_map() {
        let map = BTreeMap::from([
            ("year".to_string(), Value::Int(2024)),
            ("month".to_string(), Value::Int(2)),
            ("day".to_string(), Value::Int(29)),
        ]);
        assert_eq!(
            construct_date(Some(&Value::Map(map))),
            Value::String("2024-02-29".into())
        );
    }

    #[test]
    fn local_time_prefers_the_clock_reading() {
        assert_eq!(
            construct_local_time(Some(&Value::String("2140".into()))),
            Value::String("21:40".into())
        );
    }

    #[test]
    fn truncate_rounds_down_to_the_unit() {
        let out = evaluate_truncate(
            "date.truncate",
            &[
                Value::String("month".into()),
                Value::String("2024-07-19".into()),
            ],
        );
        assert_eq!(out, Value::String("2024-07-01".into()));
    }

    #[test]
    fn shifting_a_date_by_months_clamps_the_day() {
        let duration = super::super::duration_value::duration_value(Span {
            months: 1,
            days: 0,
            nanos: 0,
        });
        let out = shift_temporal_string("2024-01-31", &duration, ShiftDirection::Forward);
        assert_eq!(out.as_deref(), Some("2024-02-29"));
    }

    #[test]
    fn unparseable_strings_construct_null() {
        assert_eq!(
            construct_datetime(Some(&Value::String("not a datetime".into()))),
            Value::Null
        );
    }
}
