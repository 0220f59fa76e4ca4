//! Durations: the tagged-map runtime representation, ISO-8601 parsing and
//! rendering, component accessors, arithmetic, and the `duration.between`
//! family. A duration keeps months, days, and nanoseconds independent so
//! calendar-aware arithmetic stays exact; the approximate month length
//! only appears when a fractional component must spill downward.

use super::temporal_text::{
    TemporalValue, WideDateTime, extract_timezone_name, format_wide_date, parse_temporal_string,
    parse_wide_date, parse_wide_datetime, utc, wide_epoch_nanos, wide_months_days_between,
    zone_offset_at, zone_standard_offset,
};
use super::Value;
use chrono::{Datelike, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, TimeZone};
use std::collections::BTreeMap;

const DAY_NANOS: i64 = 86_400_000_000_000;
const DAY_NANOS_F64: f64 = 86_400_000_000_000.0;
/// Mean Gregorian month, used only when fractional months spill into days.
const AVG_MONTH_NANOS: f64 = 2_629_746_000_000_000.0;

/// The three independent components of a duration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(super) struct Span {
    pub months: i64,
    pub days: i64,
    pub nanos: i64,
}

/// Builds the tagged-map runtime value for a span. The map carries the raw
/// components plus the derived fields results commonly read.
pub(super) fn duration_value(span: Span) -> Value {
    let mut out = BTreeMap::new();
    out.insert("__kind".to_string(), Value::String("duration".to_string()));
    out.insert("months".to_string(), Value::Int(span.months));
    out.insert("days".to_string(), Value::Int(span.days));
    out.insert("nanos".to_string(), Value::Int(span.nanos));

    let seconds = span
        .days
        .saturating_mul(86_400)
        .saturating_add(span.nanos.div_euclid(1_000_000_000));
    out.insert("seconds".to_string(), Value::Int(seconds));
    out.insert(
        "nanosecondsOfSecond".to_string(),
        Value::Int(span.nanos.rem_euclid(1_000_000_000)),
    );
    out.insert(
        "__display".to_string(),
        Value::String(render_iso(span)),
    );
    Value::Map(out)
}

/// Recovers a span from a tagged duration map.
pub(super) fn duration_from_value(value: &Value) -> Option<Span> {
    let Value::Map(map) = value else {
        return None;
    };
    if !matches!(map.get("__kind"), Some(Value::String(kind)) if kind == "duration") {
        return None;
    }
    Some(Span {
        months: component(map, "months")?,
        days: component(map, "days")?,
        nanos: component(map, "nanos")?,
    })
}

fn component(map: &BTreeMap<String, Value>, key: &str) -> Option<i64> {
    match map.get(key) {
        Some(Value::Int(v)) => Some(*v),
        Some(Value::Float(v)) => Some(*v as i64),
        _ => None,
    }
}

/// `sign` is +1 for addition, -1 for subtraction.
pub(super) fn combine_durations(left: &Span, right: &Span, sign: i64) -> Span {
    Span {
        months: left.months.saturating_add(sign.saturating_mul(right.months)),
        days: left.days.saturating_add(sign.saturating_mul(right.days)),
        nanos: left.nanos.saturating_add(sign.saturating_mul(right.nanos)),
    }
}

pub(super) fn negate_duration(span: &Span) -> Span {
    Span {
        months: span.months.saturating_neg(),
        days: span.days.saturating_neg(),
        nanos: span.nanos.saturating_neg(),
    }
}

/// Multiplies each component; fractional months spill into days (mean
/// month) and fractional days into nanoseconds.
pub(super) fn scale_duration(span: Span, factor: f64) -> Option<Span> {
    if !factor.is_finite() {
        return None;
    }

    let scaled_months = span.months as f64 * factor;
    let whole_months = scaled_months.trunc();
    let spill_nanos = (scaled_months - whole_months) * AVG_MONTH_NANOS;
    let spill_days = (spill_nanos / DAY_NANOS_F64).trunc();
    let month_remainder = spill_nanos - spill_days * DAY_NANOS_F64;

    let scaled_days = span.days as f64 * factor;
    let whole_days = scaled_days.trunc();
    let day_remainder = (scaled_days - whole_days) * DAY_NANOS_F64;

    let nanos = (span.nanos as f64 * factor + day_remainder + month_remainder).trunc();
    Some(Span {
        months: whole_months as i64,
        days: (whole_days + spill_days) as i64,
        nanos: nanos as i64,
    })
}

// ---- construction (duration(...) function) ----

pub(super) fn construct_duration(arg: Option<&Value>) -> Value {
    match arg {
        Some(Value::Map(map)) => duration_value(span_from_map(map)),
        Some(Value::String(s)) => parse_iso_duration(s)
            .map(duration_value)
            .unwrap_or(Value::Null),
        _ => Value::Null,
    }
}

/// Builds a span from a `{years: .., hours: .., ...}` map. Fractions in
/// calendar components spill downward the same way scaling does.
pub(super) fn span_from_map(map: &BTreeMap<String, Value>) -> Span {
    let field = |names: [&str; 2]| -> f64 {
        names
            .iter()
            .find_map(|name| match map.get(*name) {
                Some(Value::Int(v)) => Some(*v as f64),
                Some(Value::Float(v)) => Some(*v),
                _ => None,
            })
            .unwrap_or(0.0)
    };

    let total_months = field(["years", "year"]) * 12.0 + field(["months", "month"]);
    let whole_months = total_months.trunc();
    let month_spill = (total_months - whole_months) * AVG_MONTH_NANOS;
    let month_spill_days = (month_spill / DAY_NANOS_F64).trunc();
    let month_spill_nanos = month_spill - month_spill_days * DAY_NANOS_F64;

    let total_days = field(["weeks", "week"]) * 7.0 + field(["days", "day"]);
    let whole_days = total_days.trunc();
    let day_spill = (total_days - whole_days) * DAY_NANOS_F64;

    let nanos = field(["hours", "hour"]) * 3_600_000_000_000.0
        + field(["minutes", "minute"]) * 60_000_000_000.0
        + field(["seconds", "second"]) * 1_000_000_000.0
        + field(["milliseconds", "millisecond"]) * 1_000_000.0
        + field(["microseconds", "microsecond"]) * 1_000.0
        + field(["nanoseconds", "nanosecond"])
        + day_spill
        + month_spill_nanos;

    Span {
        months: whole_months as i64,
        days: (whole_days + month_spill_days) as i64,
        nanos: nanos.trunc() as i64,
    }
}

/// `PnYnMnWnDTnHnMnS` (fractions allowed in any component) and the
/// component form `PYYYY-MM-DDThh:mm:ss[.f]`.
pub(super) fn parse_iso_duration(input: &str) -> Option<Span> {
    let s = input.trim();
    let body = s.strip_prefix('P')?;
    if body.is_empty() {
        return None;
    }

    // Component form has dashes and no unit letters.
    if body.contains('-') && !body.bytes().any(|b| matches!(b, b'Y' | b'M' | b'W' | b'D' | b'H' | b'S')) {
        return parse_component_duration(body);
    }

    let (date_half, time_half) = match body.split_once('T') {
        Some((d, t)) => (d, Some(t)),
        None => (body, None),
    };

    let mut fields = BTreeMap::new();
    let mut any = false;
    for (half, units) in [
        (Some(date_half), ["years", "months", "weeks", "days"]),
        (time_half, ["hours", "minutes", "seconds", ""]),
    ] {
        let Some(text) = half else { continue };
        let mut at = 0;
        while at < text.len() {
            let (end, number) = scan_signed_number(text, at)?;
            let unit = *text.as_bytes().get(end)?;
            let value: f64 = number.parse().ok()?;
            let key = match (unit, units[0]) {
                (b'Y', "years") => "years",
                (b'M', "years") => "months",
                (b'W', "years") => "weeks",
                (b'D', "years") => "days",
                (b'H', "hours") => "hours",
                (b'M', "hours") => "minutes",
                (b'S', "hours") => "seconds",
                _ => return None,
            };
            *fields.entry(key.to_string()).or_insert(0.0) += value;
            any = true;
            at = end + 1;
        }
    }
    if !any {
        return None;
    }

    let map: BTreeMap<String, Value> = fields
        .into_iter()
        .map(|(k, v)| (k, Value::Float(v)))
        .collect();
    Some(span_from_map(&map))
}

fn scan_signed_number(s: &str, start: usize) -> Option<(usize, &str)> {
    let bytes = s.as_bytes();
    let mut at = start;
    if matches!(bytes.get(at), Some(b'+') | Some(b'-')) {
        at += 1;
    }
    let digits_from = at;
    while bytes.get(at).is_some_and(u8::is_ascii_digit) {
        at += 1;
    }
    if at == digits_from {
        return None;
    }
    if bytes.get(at) == Some(&b'.') {
        at += 1;
        let frac_from = at;
        while bytes.get(at).is_some_and(u8::is_ascii_digit) {
            at += 1;
        }
        if at == frac_from {
            return None;
        }
    }
    Some((at, &s[start..at]))
}

/// `PYYYY-MM-DDThh:mm:ss[.f]`: every position is a count, not a date.
fn parse_component_duration(body: &str) -> Option<Span> {
    let (date_half, time_half) = body.split_once('T')?;

    let mut date_fields = date_half.split('-');
    let years: i64 = date_fields.next()?.parse().ok()?;
    let months: i64 = date_fields.next()?.parse().ok()?;
    let days: i64 = date_fields.next()?.parse().ok()?;
    if date_fields.next().is_some() {
        return None;
    }

    let mut time_fields = time_half.split(':');
    let hours: i128 = time_fields.next()?.parse().ok()?;
    let minutes: i128 = time_fields.next()?.parse().ok()?;
    let seconds_text = time_fields.next()?;
    if time_fields.next().is_some() {
        return None;
    }

    let seconds_nanos = parse_seconds_to_nanos(seconds_text)?;
    let nanos = hours
        .checked_mul(3_600_000_000_000)?
        .checked_add(minutes.checked_mul(60_000_000_000)?)?
        .checked_add(seconds_nanos)?;

    Some(Span {
        months: years.checked_mul(12)?.checked_add(months)?,
        days,
        nanos: i64::try_from(nanos).ok()?,
    })
}

fn parse_seconds_to_nanos(text: &str) -> Option<i128> {
    let (int_part, frac_part) = match text.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (text, None),
    };
    let whole: i128 = int_part.parse().ok()?;
    let sign = if whole < 0 || int_part.starts_with('-') {
        -1
    } else {
        1
    };
    let frac_nanos = match frac_part {
        None => 0,
        Some(frac) => {
            if frac.is_empty() || frac.len() > 9 || !frac.bytes().all(|b| b.is_ascii_digit()) {
                return None;
            }
            let scale = 10i128.pow((9 - frac.len()) as u32);
            frac.parse::<i128>().ok()? * scale
        }
    };
    whole
        .checked_mul(1_000_000_000)?
        .checked_add(sign * frac_nanos)
}

// ---- rendering ----

pub(super) fn render_iso(span: Span) -> String {
    let mut out = String::from("P");
    let years = span.months / 12;
    let months = span.months % 12;
    if years != 0 {
        out.push_str(&format!("{years}Y"));
    }
    if months != 0 {
        out.push_str(&format!("{months}M"));
    }
    if span.days != 0 {
        out.push_str(&format!("{}D", span.days));
    }
    let clock = render_clock(span.nanos as i128);
    if !clock.is_empty() {
        out.push('T');
        out.push_str(&clock);
    }
    if out == "P" { "PT0S".to_string() } else { out }
}

pub(super) fn render_iso_nanos(total_nanos: i128) -> String {
    if total_nanos == 0 {
        return "PT0S".to_string();
    }
    format!("PT{}", render_clock(total_nanos))
}

fn render_clock(nanos: i128) -> String {
    if nanos == 0 {
        return String::new();
    }
    let hours = nanos / 3_600_000_000_000;
    let mut rest = nanos - hours * 3_600_000_000_000;
    let minutes = rest / 60_000_000_000;
    rest -= minutes * 60_000_000_000;
    let seconds = rest / 1_000_000_000;
    let frac = rest - seconds * 1_000_000_000;

    let mut out = String::new();
    if hours != 0 {
        out.push_str(&format!("{hours}H"));
    }
    if minutes != 0 {
        out.push_str(&format!("{minutes}M"));
    }
    if seconds != 0 || frac != 0 {
        if frac == 0 {
            out.push_str(&format!("{seconds}S"));
        } else {
            let sign = if seconds < 0 || frac < 0 { "-" } else { "" };
            let mut digits = format!("{:09}", frac.abs());
            while digits.ends_with('0') {
                digits.pop();
            }
            out.push_str(&format!("{sign}{}.{digits}S", seconds.abs()));
        }
    }
    out
}

// ---- component accessors (duration.years etc.) ----

pub(super) fn duration_component(
    map: &BTreeMap<String, Value>,
    property: &str,
) -> Option<Value> {
    let (Some(months), Some(days), Some(nanos)) = (
        component(map, "months"),
        component(map, "days"),
        component(map, "nanos"),
    ) else {
        return Some(Value::Null);
    };

    let value = match property {
        "years" => months.div_euclid(12),
        "quarters" => months.div_euclid(3),
        "months" => months,
        "monthsOfYear" => months.rem_euclid(12),
        "quartersOfYear" => months.rem_euclid(12).div_euclid(3),
        "monthsOfQuarter" => months.rem_euclid(12).rem_euclid(3),
        "weeks" => days.div_euclid(7),
        "days" => days,
        "daysOfWeek" => days.rem_euclid(7),
        "hours" => nanos.div_euclid(3_600_000_000_000),
        "minutes" => nanos.div_euclid(60_000_000_000),
        "minutesOfHour" => nanos.div_euclid(60_000_000_000).rem_euclid(60),
        // Total seconds including whole days; kept for embedders that read
        // the derived map field of the same name.
        "seconds" => days
            .saturating_mul(86_400)
            .saturating_add(nanos.div_euclid(1_000_000_000)),
        "secondsOfMinute" => nanos.div_euclid(1_000_000_000).rem_euclid(60),
        "milliseconds" => nanos.div_euclid(1_000_000),
        "millisecondsOfSecond" => nanos.rem_euclid(1_000_000_000).div_euclid(1_000_000),
        "microseconds" => nanos.div_euclid(1_000),
        "microsecondsOfSecond" => nanos.rem_euclid(1_000_000_000).div_euclid(1_000),
        "nanoseconds" => nanos,
        "nanosecondsOfSecond" => nanos.rem_euclid(1_000_000_000),
        _ => return None,
    };
    Some(Value::Int(value))
}

// ---- duration.between / inMonths / inDays / inSeconds ----

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BetweenMode {
    Full,
    Months,
    Days,
    Seconds,
}

pub(super) fn evaluate_duration_between(function_name: &str, args: &[Value]) -> Value {
    let mode = match function_name {
        "duration.between" => BetweenMode::Full,
        "duration.inmonths" => BetweenMode::Months,
        "duration.indays" => BetweenMode::Days,
        "duration.inseconds" => BetweenMode::Seconds,
        _ => return Value::Null,
    };
    let (Some(from), Some(to)) = (args.first(), args.get(1)) else {
        return Value::Null;
    };

    // Wide years bypass chrono entirely.
    if let (Some(l), Some(r)) = (wide_operand(from), wide_operand(to)) {
        return wide_between(mode, l, r).unwrap_or(Value::Null);
    }

    let (Some(l), Some(r)) = (anchored(from), anchored(to)) else {
        return Value::Null;
    };
    span_between(mode, &l, &r)
        .map(duration_value)
        .unwrap_or(Value::Null)
}

enum WideOperand {
    Date(super::temporal_text::WideDate),
    DateTime(WideDateTime),
}

fn wide_operand(value: &Value) -> Option<WideOperand> {
    let Value::String(raw) = value else {
        return None;
    };
    if raw.contains('T') {
        return parse_wide_datetime(raw).map(WideOperand::DateTime);
    }
    parse_wide_date(raw).map(WideOperand::Date)
}

fn wide_between(mode: BetweenMode, from: WideOperand, to: WideOperand) -> Option<Value> {
    match (mode, from, to) {
        (BetweenMode::Full, WideOperand::Date(l), WideOperand::Date(r)) => {
            let (months, days) = wide_months_days_between(l, r)?;
            Some(duration_value(Span {
                months,
                days,
                nanos: 0,
            }))
        }
        (BetweenMode::Seconds, WideOperand::DateTime(l), WideOperand::DateTime(r)) => {
            let diff = wide_epoch_nanos(r)? - wide_epoch_nanos(l)?;
            Some(Value::String(render_iso_nanos(diff)))
        }
        _ => None,
    }
}

/// A temporal operand pinned to a concrete date, time, and offset so two of
/// them can be subtracted. Date-less operands share the other side's date;
/// offset-less operands share the other side's zone.
struct Anchored {
    has_date: bool,
    date: NaiveDate,
    time: NaiveTime,
    offset: Option<FixedOffset>,
    zone: Option<String>,
}

fn anchored(value: &Value) -> Option<Anchored> {
    let Value::String(raw) = value else {
        return None;
    };
    let zone = extract_timezone_name(raw);
    let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).expect("epoch date is valid");
    let midnight = NaiveTime::from_hms_opt(0, 0, 0).expect("midnight is valid");

    Some(match parse_temporal_string(raw)? {
        TemporalValue::Date(date) => Anchored {
            has_date: true,
            date,
            time: midnight,
            offset: None,
            zone,
        },
        TemporalValue::LocalTime(time) => Anchored {
            has_date: false,
            date: epoch,
            time,
            offset: None,
            zone,
        },
        TemporalValue::Time { time, offset } => Anchored {
            has_date: false,
            date: epoch,
            time,
            offset: Some(offset),
            zone,
        },
        TemporalValue::LocalDateTime(dt) => Anchored {
            has_date: true,
            date: dt.date(),
            time: dt.time(),
            offset: None,
            zone,
        },
        TemporalValue::DateTime(dt) => Anchored {
            has_date: true,
            date: dt.naive_local().date(),
            time: dt.naive_local().time(),
            offset: Some(*dt.offset()),
            zone,
        },
    })
}

fn resolve_offset(
    operand: &Anchored,
    date: NaiveDate,
    shared_zone: Option<&str>,
    fallback: FixedOffset,
) -> FixedOffset {
    if let Some(offset) = operand.offset {
        if let Some(zone) = operand.zone.as_deref() {
            return zone_offset_at(zone, date, operand.time)
                .or_else(|| zone_standard_offset(zone))
                .unwrap_or(offset);
        }
        return offset;
    }
    if let Some(zone) = shared_zone {
        return zone_offset_at(zone, date, operand.time)
            .or_else(|| zone_standard_offset(zone))
            .unwrap_or(fallback);
    }
    fallback
}

fn span_between(mode: BetweenMode, from: &Anchored, to: &Anchored) -> Option<Span> {
    let shared_date = if from.has_date {
        from.date
    } else if to.has_date {
        to.date
    } else {
        NaiveDate::from_ymd_opt(1970, 1, 1).expect("epoch date is valid")
    };
    let from_date = if from.has_date { from.date } else { shared_date };
    let to_date = if to.has_date { to.date } else { shared_date };

    let fallback = from.offset.or(to.offset).unwrap_or_else(utc);
    let shared_zone = from.zone.clone().or_else(|| to.zone.clone());
    let from_offset = resolve_offset(from, from_date, shared_zone.as_deref(), fallback);
    let to_offset = resolve_offset(to, to_date, shared_zone.as_deref(), fallback);

    let from_local = from_date.and_time(from.time);
    let to_local = to_date.and_time(to.time);
    let from_dt = from_offset.from_local_datetime(&from_local).single()?;
    let to_dt = to_offset.from_local_datetime(&to_local).single()?;
    let diff_nanos = to_dt.signed_duration_since(from_dt).num_nanoseconds()?;

    let calendar = from.has_date && to.has_date;
    match mode {
        BetweenMode::Seconds => Some(Span {
            months: 0,
            days: 0,
            nanos: diff_nanos,
        }),
        BetweenMode::Days => Some(Span {
            months: 0,
            days: diff_nanos / DAY_NANOS,
            nanos: 0,
        }),
        BetweenMode::Months => {
            if !calendar {
                return Some(Span::default());
            }
            let (months, _, _) = month_walk(from_local, to_local, from_offset, to_offset)?;
            Some(Span {
                months,
                days: 0,
                nanos: 0,
            })
        }
        BetweenMode::Full => {
            if calendar {
                let (months, days, nanos) =
                    month_walk(from_local, to_local, from_offset, to_offset)?;
                Some(Span {
                    months,
                    days,
                    nanos,
                })
            } else {
                let days = diff_nanos / DAY_NANOS;
                Some(Span {
                    months: 0,
                    days,
                    nanos: diff_nanos - days * DAY_NANOS,
                })
            }
        }
    }
}

/// Walks whole calendar months from `from` toward `to` without
/// overshooting, then splits the remainder into days and nanoseconds.
fn month_walk(
    from: NaiveDateTime,
    to: NaiveDateTime,
    from_offset: FixedOffset,
    to_offset: FixedOffset,
) -> Option<(i64, i64, i64)> {
    let from_dt = from_offset.from_local_datetime(&from).single()?;
    let to_dt = to_offset.from_local_datetime(&to).single()?;

    let step = |months: i64| -> Option<chrono::DateTime<FixedOffset>> {
        let date = super::temporal_build::add_months(from.date(), i32::try_from(months).ok()?)?;
        from_offset
            .from_local_datetime(&date.and_time(from.time()))
            .single()
    };

    let mut months =
        i64::from(to.year() - from.year()) * 12 + i64::from(to.month() as i32 - from.month() as i32);
    let mut pivot = step(months)?;

    if to_dt >= from_dt {
        while pivot > to_dt {
            months -= 1;
            pivot = step(months)?;
        }
        while let Some(next) = step(months + 1) {
            if next <= to_dt {
                months += 1;
                pivot = next;
            } else {
                break;
            }
        }
    } else {
        while pivot < to_dt {
            months += 1;
            pivot = step(months)?;
        }
        while let Some(next) = step(months - 1) {
            if next >= to_dt {
                months -= 1;
                pivot = next;
            } else {
                break;
            }
        }
    }

    let remainder = to_dt.signed_duration_since(pivot).num_nanoseconds()?;
    let days = remainder / DAY_NANOS;
    Some((months, days, remainder - days * DAY_NANOS))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn iso_duration_round_trips() {
        for text in ["P1Y2M3D", "PT4H5M6S", "P1DT12H", "PT0S", "PT1.5S"] {
            let span = parse_iso_duration(text).unwrap();
            assert_eq!(render_iso(span), text, "{text}");
        }
    }

    #[test]
    fn component_form_parses_as_counts() {
        let span = parse_iso_duration("P2012-02-02T14:37:21.545").unwrap();
        assert_eq!(span.months, 2012 * 12 + 2);
        assert_eq!(span.days, 2);
    }

    #[test]
    fn duration_map_round_trips_through_value() {
        let span = Span {
            months: 14,
            days: 3,
            nanos: 90_000_000_000,
        };
        let value = duration_value(span);
        assert_eq!(duration_from_value(&value), Some(span));
    }

    #[test]
    fn between_full_splits_months_days_and_clock() {
        let out = evaluate_duration_between(
            "duration.between",
            &[
                Value::String("1984-10-11".into()),
                Value::String("1985-11-25T02:00".into()),
            ],
        );
        let span = duration_from_value(&out).unwrap();
        assert_eq!(span.months, 13);
        assert_eq!(span.days, 14);
        assert_eq!(span.nanos, 2 * 3_600_000_000_000);
    }

    #[test]
    fn in_days_ignores_the_clock_remainder() {
        let out = evaluate_duration_between(
            "duration.indays",
            &[
                Value::String("2024-01-01".into()),
                Value::String("2024-01-31T12:00".into()),
            ],
        );
        let span = duration_from_value(&out).unwrap();
        assert_eq!((span.months, span.days, span.nanos), (0, 30, 0));
    }

    #[test]
    fn scaling_spills_fractions_downward() {
        let half_month = scale_duration(
            Span {
                months: 1,
                days: 0,
                nanos: 0,
            },
            0.5,
        )
        .unwrap();
        assert_eq!(half_month.months, 0);
        assert!(half_month.days >= 15);
    }
}
