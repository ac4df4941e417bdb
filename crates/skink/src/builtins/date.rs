use chrono::{DateTime, Datelike, NaiveDate, Timelike, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    builtins::{NativeCtx, NativeFunc},
    error::{ErrorKind, RunError, RunResult},
    heap::{InternalData, JsClass, JsObject, ObjectId},
    value::Value,
};

/// The largest representable time value (ES 15.9.1.1).
const MAX_TIME: f64 = 8.64e15;

/// Date components addressed by the get/set method families.
///
/// The sandbox runs on a fixed UTC clock, so the "local" methods and their
/// UTC twins agree and `getTimezoneOffset` is always zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) enum DateField {
    FullYear,
    Month,
    Date,
    Day,
    Hours,
    Minutes,
    Seconds,
    Milliseconds,
}

impl DateField {
    pub(crate) const ALL: [Self; 8] = [
        Self::FullYear,
        Self::Month,
        Self::Date,
        Self::Day,
        Self::Hours,
        Self::Minutes,
        Self::Seconds,
        Self::Milliseconds,
    ];

    pub(crate) fn getter_name(self, utc: bool) -> &'static str {
        match (self, utc) {
            (Self::FullYear, false) => "getFullYear",
            (Self::FullYear, true) => "getUTCFullYear",
            (Self::Month, false) => "getMonth",
            (Self::Month, true) => "getUTCMonth",
            (Self::Date, false) => "getDate",
            (Self::Date, true) => "getUTCDate",
            (Self::Day, false) => "getDay",
            (Self::Day, true) => "getUTCDay",
            (Self::Hours, false) => "getHours",
            (Self::Hours, true) => "getUTCHours",
            (Self::Minutes, false) => "getMinutes",
            (Self::Minutes, true) => "getUTCMinutes",
            (Self::Seconds, false) => "getSeconds",
            (Self::Seconds, true) => "getUTCSeconds",
            (Self::Milliseconds, false) => "getMilliseconds",
            (Self::Milliseconds, true) => "getUTCMilliseconds",
        }
    }

    pub(crate) fn setter_name(self, utc: bool) -> &'static str {
        match (self, utc) {
            (Self::FullYear, false) => "setFullYear",
            (Self::FullYear, true) => "setUTCFullYear",
            (Self::Month, false) => "setMonth",
            (Self::Month, true) => "setUTCMonth",
            (Self::Date, false) => "setDate",
            (Self::Date, true) => "setUTCDate",
            (Self::Hours, false) => "setHours",
            (Self::Hours, true) => "setUTCHours",
            (Self::Minutes, false) => "setMinutes",
            (Self::Minutes, true) => "setUTCMinutes",
            (Self::Seconds, false) => "setSeconds",
            (Self::Seconds, true) => "setUTCSeconds",
            (Self::Milliseconds, false) => "setMilliseconds",
            (Self::Milliseconds, true) => "setUTCMilliseconds",
            (Self::Day, _) => unreachable!("day has no setter"),
        }
    }

    /// How many trailing components the setter accepts.
    pub(crate) fn setter_length(self) -> u32 {
        match self {
            Self::FullYear => 3,
            Self::Month => 2,
            Self::Date | Self::Milliseconds => 1,
            Self::Hours => 4,
            Self::Minutes => 3,
            Self::Seconds => 2,
            Self::Day => 0,
        }
    }

    /// Index into the (year, month, day, hours, minutes, seconds, ms)
    /// component tuple.
    fn component_index(self) -> usize {
        match self {
            Self::FullYear => 0,
            Self::Month => 1,
            Self::Date => 2,
            Self::Hours => 3,
            Self::Minutes => 4,
            Self::Seconds => 5,
            Self::Milliseconds => 6,
            Self::Day => unreachable!("day is derived, not stored"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) enum DateStringKind {
    Default,
    DateOnly,
    TimeOnly,
    Iso,
    Utc,
    LocaleDefault,
    LocaleDate,
    LocaleTime,
    Json,
}

impl DateStringKind {
    pub(crate) const ALL: [Self; 9] = [
        Self::Default,
        Self::DateOnly,
        Self::TimeOnly,
        Self::Iso,
        Self::Utc,
        Self::LocaleDefault,
        Self::LocaleDate,
        Self::LocaleTime,
        Self::Json,
    ];

    pub(crate) fn name(self) -> &'static str {
        match self {
            Self::Default => "toString",
            Self::DateOnly => "toDateString",
            Self::TimeOnly => "toTimeString",
            Self::Iso => "toISOString",
            Self::Utc => "toUTCString",
            Self::LocaleDefault => "toLocaleString",
            Self::LocaleDate => "toLocaleDateString",
            Self::LocaleTime => "toLocaleTimeString",
            Self::Json => "toJSON",
        }
    }
}

fn time_clip(ms: f64) -> f64 {
    if !ms.is_finite() || ms.abs() > MAX_TIME {
        f64::NAN
    } else {
        ms.trunc()
    }
}

fn datetime(ms: f64) -> Option<DateTime<Utc>> {
    if ms.is_nan() {
        return None;
    }
    DateTime::<Utc>::from_timestamp_millis(ms as i64)
}

/// Days since the epoch for a civil date, month already normalized to
/// 1..=12; `day` may be any offset and is folded in as raw days.
fn days_from_civil(mut year: i64, month: u32, day: i64) -> i64 {
    year -= i64::from(month <= 2);
    let era = if year >= 0 { year } else { year - 399 } / 400;
    let yoe = year - era * 400;
    let mp = if month > 2 { month - 3 } else { month + 9 };
    let doy = i64::from((153 * mp + 2) / 5);
    let doe = yoe * 365 + yoe / 4 - yoe / 100 + doy;
    era * 146_097 + doe - 719_468 + (day - 1)
}

/// MakeDate out of possibly-overflowing components, ES-style normalized.
fn ms_from_components(c: [f64; 7]) -> f64 {
    if c.iter().any(|n| !n.is_finite()) {
        return f64::NAN;
    }
    let [year, month, day, hours, minutes, seconds, millis] = c.map(f64::trunc);
    let year = year as i64 + (month as i64).div_euclid(12);
    let month = (month as i64).rem_euclid(12) as u32 + 1;
    if year.abs() > 300_000 {
        return f64::NAN;
    }
    let days = days_from_civil(year, month, day as i64);
    let ms = days as f64 * 86_400_000.0
        + hours * 3_600_000.0
        + minutes * 60_000.0
        + seconds * 1000.0
        + millis;
    time_clip(ms)
}

fn components(ms: f64) -> Option<[f64; 7]> {
    let dt = datetime(ms)?;
    Some([
        f64::from(dt.year()),
        f64::from(dt.month0()),
        f64::from(dt.day()),
        f64::from(dt.hour()),
        f64::from(dt.minute()),
        f64::from(dt.second()),
        f64::from(dt.timestamp_subsec_millis()),
    ])
}

/// "Fri Aug 01 2025 12:30:00 GMT+0000 (Coordinated Universal Time)".
pub(crate) fn to_date_string(ms: f64) -> String {
    match datetime(ms) {
        Some(dt) => dt
            .format("%a %b %d %Y %H:%M:%S GMT+0000 (Coordinated Universal Time)")
            .to_string(),
        None => "Invalid Date".to_string(),
    }
}

pub(crate) fn to_iso_string(ms: f64) -> String {
    match datetime(ms) {
        Some(dt) => dt.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string(),
        None => "Invalid Date".to_string(),
    }
}

fn parse_date(text: &str) -> f64 {
    let t = text.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(t) {
        return dt.timestamp_millis() as f64;
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(t) {
        return dt.timestamp_millis() as f64;
    }
    if let Ok(date) = NaiveDate::parse_from_str(t, "%Y-%m-%d") {
        let days = i64::from(date.num_days_from_ce()) - 719_163;
        return days as f64 * 86_400_000.0;
    }
    for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%b %d, %Y", "%B %d, %Y"] {
        if let Ok(dt) = chrono::NaiveDateTime::parse_from_str(t, format) {
            return dt.and_utc().timestamp_millis() as f64;
        }
        if let Ok(date) = NaiveDate::parse_from_str(t, format) {
            let days = i64::from(date.num_days_from_ce()) - 719_163;
            return days as f64 * 86_400_000.0;
        }
    }
    f64::NAN
}

fn this_date(ctx: &NativeCtx<'_>, this: &Value, who: &str) -> RunResult<(ObjectId, f64)> {
    if let Value::Ref(id) = this
        && let Some(InternalData::Date(ms)) = ctx.heap.get(*id).data
    {
        return Ok((*id, ms));
    }
    Err(RunError::throw(
        ErrorKind::TypeError,
        format!("{who} requires that 'this' be a Date"),
    ))
}

/// Builds component args for a constructor-style call: year is
/// 1900-adjusted when 0..=99, missing day defaults to 1, the rest to 0.
fn components_from_args(ctx: &NativeCtx<'_>, args: &[Value]) -> [f64; 7] {
    let mut c = [0.0; 7];
    c[2] = 1.0;
    for (index, slot) in c.iter_mut().enumerate() {
        if let Some(arg) = args.get(index) {
            *slot = ctx.heap.to_number(arg);
        }
    }
    if (0.0..=99.0).contains(&c[0]) && c[0].trunc() == c[0] {
        c[0] += 1900.0;
    }
    c
}

pub(crate) fn call(
    ctx: &mut NativeCtx<'_>,
    func: NativeFunc,
    this: &Value,
    args: &[Value],
    construct: bool,
) -> RunResult<Value> {
    Ok(match func {
        NativeFunc::DateCtor => {
            if !construct {
                // Called as a function, Date ignores its arguments.
                return Ok(Value::str(to_date_string(Utc::now().timestamp_millis() as f64)));
            }
            let ms = match args.len() {
                0 => Utc::now().timestamp_millis() as f64,
                1 => {
                    let primitive = ctx.heap.to_primitive(ctx.arg(args, 0), false);
                    match primitive {
                        Value::Str(s) => parse_date(&s),
                        other => time_clip(other.to_number_primitive()),
                    }
                }
                _ => ms_from_components(components_from_args(ctx, args)),
            };
            let id = ctx.heap.alloc(JsObject::new(Some(ctx.realm.date_proto), JsClass::Date));
            ctx.heap.get_mut(id).data = Some(InternalData::Date(ms));
            Value::Ref(id)
        }
        NativeFunc::DateNow => Value::Number(Utc::now().timestamp_millis() as f64),
        NativeFunc::DateParse => Value::Number(parse_date(&ctx.arg_string(args, 0))),
        NativeFunc::DateUtc => Value::Number(ms_from_components(components_from_args(ctx, args))),
        NativeFunc::DateValueOf => Value::Number(this_date(ctx, this, "Date.prototype.valueOf")?.1),
        NativeFunc::DateGetTimezoneOffset => {
            this_date(ctx, this, "Date.prototype.getTimezoneOffset")?;
            Value::Number(0.0)
        }
        NativeFunc::DateSetTime => {
            let (id, _) = this_date(ctx, this, "Date.prototype.setTime")?;
            let ms = time_clip(ctx.arg_number(args, 0));
            ctx.heap.get_mut(id).data = Some(InternalData::Date(ms));
            Value::Number(ms)
        }
        NativeFunc::DateGet { field, .. } => {
            let (_, ms) = this_date(ctx, this, "Date.prototype.getFullYear")?;
            match components(ms) {
                None => Value::Number(f64::NAN),
                Some(c) => {
                    if field == DateField::Day {
                        let weekday = datetime(ms).expect("components implies valid").weekday();
                        Value::Number(f64::from(weekday.num_days_from_sunday()))
                    } else {
                        Value::Number(c[field.component_index()])
                    }
                }
            }
        }
        NativeFunc::DateSet { field, .. } => {
            let (id, ms) = this_date(ctx, this, "Date.prototype.setFullYear")?;
            // setFullYear starts from the epoch when the date is invalid;
            // the other setters keep NaN sticky.
            let base = if ms.is_nan() && field == DateField::FullYear {
                0.0
            } else {
                ms
            };
            let new_ms = match components(base) {
                None => f64::NAN,
                Some(mut c) => {
                    let first = field.component_index();
                    for (offset, arg) in args.iter().enumerate().take(field.setter_length() as usize) {
                        c[first + offset] = ctx.heap.to_number(arg);
                    }
                    ms_from_components(c)
                }
            };
            ctx.heap.get_mut(id).data = Some(InternalData::Date(new_ms));
            Value::Number(new_ms)
        }
        NativeFunc::DateToString(kind) => {
            let (_, ms) = this_date(ctx, this, "Date.prototype.toString")?;
            match kind {
                DateStringKind::Default | DateStringKind::LocaleDefault => Value::str(to_date_string(ms)),
                DateStringKind::DateOnly | DateStringKind::LocaleDate => match datetime(ms) {
                    Some(dt) => Value::str(dt.format("%a %b %d %Y").to_string()),
                    None => Value::str("Invalid Date"),
                },
                DateStringKind::TimeOnly | DateStringKind::LocaleTime => match datetime(ms) {
                    Some(dt) => Value::str(
                        dt.format("%H:%M:%S GMT+0000 (Coordinated Universal Time)").to_string(),
                    ),
                    None => Value::str("Invalid Date"),
                },
                DateStringKind::Iso => {
                    if ms.is_nan() {
                        return Err(RunError::throw(ErrorKind::RangeError, "Invalid time value"));
                    }
                    Value::str(to_iso_string(ms))
                }
                DateStringKind::Utc => match datetime(ms) {
                    Some(dt) => Value::str(dt.format("%a, %d %b %Y %H:%M:%S GMT").to_string()),
                    None => Value::str("Invalid Date"),
                },
                DateStringKind::Json => {
                    if ms.is_nan() {
                        Value::Null
                    } else {
                        Value::str(to_iso_string(ms))
                    }
                }
            }
        }
        other => unreachable!("not a Date builtin: {other:?}"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn civil_day_math_matches_known_epochs() {
        assert_eq!(days_from_civil(1970, 1, 1), 0);
        assert_eq!(days_from_civil(1970, 1, 2), 1);
        assert_eq!(days_from_civil(1969, 12, 31), -1);
        assert_eq!(days_from_civil(2000, 3, 1), 11017);
    }

    #[test]
    fn component_construction_normalizes_overflow() {
        // Month 12 of 2020 rolls into January 2021.
        let ms = ms_from_components([2020.0, 12.0, 1.0, 0.0, 0.0, 0.0, 0.0]);
        let c = components(ms).unwrap();
        assert_eq!(c[0], 2021.0);
        assert_eq!(c[1], 0.0);
    }

    #[test]
    fn iso_formatting() {
        // 2021-01-01T00:00:00Z
        let ms = ms_from_components([2021.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0]);
        assert_eq!(to_iso_string(ms), "2021-01-01T00:00:00.000Z");
        assert_eq!(parse_date("2021-01-01T00:00:00.000Z"), ms);
        assert_eq!(parse_date("2021-01-01"), ms);
    }

    #[test]
    fn nan_handling() {
        assert!(time_clip(f64::INFINITY).is_nan());
        assert!(ms_from_components([f64::NAN, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0]).is_nan());
        assert_eq!(to_date_string(f64::NAN), "Invalid Date");
        assert!(parse_date("garbage").is_nan());
    }
}
