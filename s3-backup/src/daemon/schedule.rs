//! Cron-style schedule expressions.
//!
//! Supported forms:
//! - five fields: `minute hour day-of-month month day-of-week`, each a
//!   comma list of `*`, `?`, `N`, `A-B`, with an optional `/STEP`;
//!   month (`JAN`-`DEC`) and weekday (`SUN`-`SAT`) names are accepted;
//! - `@yearly`, `@annually`, `@monthly`, `@weekly`, `@daily`, `@midnight`,
//!   `@hourly`;
//! - `@every <duration>`, e.g. `@every 1h30m` or `@every 1.5h`.
//!
//! Occurrences are computed on the wall clock of the caller's time zone;
//! the scheduler uses the host's local time.

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, TimeZone, Timelike};

/// How far ahead to search before declaring that a schedule never fires.
const SEARCH_YEARS: i32 = 5;

const MONTH_NAMES: &[&str] = &[
    "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
];
const WEEKDAY_NAMES: &[&str] = &["sun", "mon", "tue", "wed", "thu", "fri", "sat"];

struct FieldBounds {
    name: &'static str,
    min: u32,
    max: u32,
    names: &'static [&'static str],
}

const MINUTES: FieldBounds = FieldBounds { name: "minute", min: 0, max: 59, names: &[] };
const HOURS: FieldBounds = FieldBounds { name: "hour", min: 0, max: 23, names: &[] };
const DAYS_OF_MONTH: FieldBounds = FieldBounds { name: "day-of-month", min: 1, max: 31, names: &[] };
const MONTHS: FieldBounds = FieldBounds { name: "month", min: 1, max: 12, names: MONTH_NAMES };
// 7 is accepted as a second spelling of Sunday.
const DAYS_OF_WEEK: FieldBounds = FieldBounds { name: "day-of-week", min: 0, max: 7, names: WEEKDAY_NAMES };

/// A parsed schedule expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Schedule {
    Cron(CronFields),
    Every(Duration),
}

/// Bit sets of the allowed values of each cron field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CronFields {
    minutes: u64,
    hours: u64,
    days_of_month: u64,
    months: u64,
    days_of_week: u64,
    any_day_of_month: bool,
    any_day_of_week: bool,
}

impl Schedule {
    /// Parse `expression`. The error is a human-readable reason.
    pub fn parse(expression: &str) -> Result<Self, String> {
        let expression = expression.trim();
        if expression.is_empty() {
            return Err("empty expression".to_string());
        }

        if let Some(descriptor) = expression.strip_prefix('@') {
            return Self::parse_descriptor(descriptor);
        }

        let fields: Vec<&str> = expression.split_whitespace().collect();
        if fields.len() != 5 {
            return Err(format!("expected 5 fields, found {}", fields.len()));
        }

        let (minutes, _) = parse_field(fields[0], &MINUTES)?;
        let (hours, _) = parse_field(fields[1], &HOURS)?;
        let (days_of_month, any_day_of_month) = parse_field(fields[2], &DAYS_OF_MONTH)?;
        let (months, _) = parse_field(fields[3], &MONTHS)?;
        let (mut days_of_week, any_day_of_week) = parse_field(fields[4], &DAYS_OF_WEEK)?;

        if days_of_week & (1 << 7) != 0 {
            days_of_week = (days_of_week & !(1 << 7)) | 1;
        }

        Ok(Schedule::Cron(CronFields {
            minutes,
            hours,
            days_of_month,
            months,
            days_of_week,
            any_day_of_month,
            any_day_of_week,
        }))
    }

    fn parse_descriptor(descriptor: &str) -> Result<Self, String> {
        let lower = descriptor.to_ascii_lowercase();
        if let Some(interval) = lower.strip_prefix("every") {
            if interval.starts_with(char::is_whitespace) {
                return parse_interval(interval.trim()).map(Schedule::Every);
            }
        }

        let equivalent = match lower.as_str() {
            "yearly" | "annually" => "0 0 1 1 *",
            "monthly" => "0 0 1 * *",
            "weekly" => "0 0 * * 0",
            "daily" | "midnight" => "0 0 * * *",
            "hourly" => "0 * * * *",
            _ => return Err(format!("unrecognized descriptor @{descriptor}")),
        };
        Self::parse(equivalent)
    }

    /// The first occurrence strictly after `after`, evaluated on the wall
    /// clock of `after`'s time zone, or `None` if the schedule has no
    /// occurrence in the next few years.
    pub fn next_after<Tz: TimeZone>(&self, after: &DateTime<Tz>) -> Option<DateTime<Tz>> {
        match self {
            Schedule::Every(interval) => {
                let whole_second = after.with_nanosecond(0)?;
                Some(whole_second + *interval)
            }
            Schedule::Cron(fields) => fields.next_after(after),
        }
    }
}

impl CronFields {
    /// Wall-clock times skipped by a DST change never fire; a repeated wall
    /// clock time fires once, at its earlier instant.
    fn next_after<Tz: TimeZone>(&self, after: &DateTime<Tz>) -> Option<DateTime<Tz>> {
        let tz = after.timezone();
        let local = after.naive_local();
        let mut t = local.with_second(0)?.with_nanosecond(0)? + Duration::minutes(1);
        let last_year = local.year() + SEARCH_YEARS;

        while t.year() <= last_year {
            if !has(self.months, t.month()) {
                let (year, month) = if t.month() == 12 {
                    (t.year() + 1, 1)
                } else {
                    (t.year(), t.month() + 1)
                };
                t = NaiveDate::from_ymd_opt(year, month, 1)?.and_hms_opt(0, 0, 0)?;
                continue;
            }

            if !self.day_matches(&t) {
                t = t.date().succ_opt()?.and_hms_opt(0, 0, 0)?;
                continue;
            }

            if !has(self.hours, t.hour()) {
                t = t.with_minute(0)? + Duration::hours(1);
                continue;
            }

            if !has(self.minutes, t.minute()) {
                t += Duration::minutes(1);
                continue;
            }

            match tz.from_local_datetime(&t).earliest() {
                Some(candidate) if candidate > *after => return Some(candidate),
                _ => t += Duration::minutes(1),
            }
        }

        None
    }

    /// When both day fields are restricted, either may match; when one of
    /// them is a wildcard, both must.
    fn day_matches(&self, t: &NaiveDateTime) -> bool {
        let dom = has(self.days_of_month, t.day());
        let dow = has(self.days_of_week, t.weekday().num_days_from_sunday());

        if self.any_day_of_month || self.any_day_of_week {
            dom && dow
        } else {
            dom || dow
        }
    }
}

fn has(set: u64, value: u32) -> bool {
    set & (1u64 << value) != 0
}

/// Parse one field into a bit set, plus whether it was an unrestricted `*`/`?`.
fn parse_field(text: &str, bounds: &FieldBounds) -> Result<(u64, bool), String> {
    let mut bits = 0u64;
    let mut wildcard = false;

    for part in text.split(',') {
        let (range, step) = match part.split_once('/') {
            Some((range, step)) => {
                let step: u32 = step
                    .parse()
                    .map_err(|_| format!("invalid step {step:?} in {} field", bounds.name))?;
                if step == 0 {
                    return Err(format!("step must be positive in {} field", bounds.name));
                }
                (range, Some(step))
            }
            None => (part, None),
        };

        let (start, end) = if range == "*" || range == "?" {
            // `*/1` is still unrestricted.
            if step.map_or(true, |step| step == 1) {
                wildcard = true;
            }
            (bounds.min, bounds.max)
        } else if let Some((low, high)) = range.split_once('-') {
            (parse_value(low, bounds)?, parse_value(high, bounds)?)
        } else {
            let value = parse_value(range, bounds)?;
            // `N/STEP` runs from N to the end of the field.
            (value, if step.is_some() { bounds.max } else { value })
        };

        if start > end {
            return Err(format!(
                "range {start}-{end} is backwards in {} field",
                bounds.name
            ));
        }

        let step = step.unwrap_or(1) as usize;
        for value in (start..=end).step_by(step) {
            bits |= 1 << value;
        }
    }

    Ok((bits, wildcard))
}

fn parse_value(text: &str, bounds: &FieldBounds) -> Result<u32, String> {
    let lower = text.to_ascii_lowercase();
    let value = match bounds.names.iter().position(|name| *name == lower) {
        Some(index) => index as u32 + bounds.min,
        None => text
            .parse()
            .map_err(|_| format!("invalid value {text:?} in {} field", bounds.name))?,
    };

    if value < bounds.min || value > bounds.max {
        return Err(format!(
            "value {value} out of range {}-{} in {} field",
            bounds.min, bounds.max, bounds.name
        ));
    }
    Ok(value)
}

const NANOS_PER_SECOND: u128 = 1_000_000_000;

/// Parse a duration such as `1h30m`, `1.5h` or `250ms` (units `h`, `m`, `s`,
/// `ms`, `us`/`µs`, `ns`). Rounded down to whole seconds, never less than one
/// second.
fn parse_interval(text: &str) -> Result<Duration, String> {
    if text.is_empty() {
        return Err("missing interval after @every".to_string());
    }

    let invalid = || format!("invalid interval {text:?}");
    let too_large = || format!("interval {text:?} is too large");

    let mut rest = text.strip_prefix('+').unwrap_or(text);
    let mut total_ns: u128 = 0;
    if rest == "0" {
        rest = "";
    } else if rest.is_empty() {
        return Err(invalid());
    }

    while !rest.is_empty() {
        let int_len = rest.find(|c: char| !c.is_ascii_digit()).unwrap_or(rest.len());
        let (whole, after_whole) = rest.split_at(int_len);
        let (fraction, after_number) = match after_whole.strip_prefix('.') {
            Some(tail) => {
                let len = tail.find(|c: char| !c.is_ascii_digit()).unwrap_or(tail.len());
                tail.split_at(len)
            }
            None => ("", after_whole),
        };
        if whole.is_empty() && fraction.is_empty() {
            return Err(invalid());
        }

        let unit_len = after_number
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(after_number.len());
        let (unit, tail) = after_number.split_at(unit_len);
        let unit_ns: u128 = match unit {
            "h" => 3_600 * NANOS_PER_SECOND,
            "m" => 60 * NANOS_PER_SECOND,
            "s" => NANOS_PER_SECOND,
            "ms" => 1_000_000,
            "us" | "\u{b5}s" | "\u{3bc}s" => 1_000,
            "ns" => 1,
            "" => return Err(format!("missing unit in interval {text:?}")),
            unit => return Err(format!("unknown unit {unit:?} in interval {text:?}")),
        };

        let whole: u128 = if whole.is_empty() {
            0
        } else {
            whole.parse().map_err(|_| too_large())?
        };
        let mut value = whole.checked_mul(unit_ns).ok_or_else(too_large)?;

        if !fraction.is_empty() {
            // Digits past the 18th are below a nanosecond even for hours.
            let digits = &fraction[..fraction.len().min(18)];
            let scale = 10u128.pow(digits.len() as u32);
            let fraction: u128 = digits.parse().map_err(|_| invalid())?;
            value += fraction * unit_ns / scale;
        }

        total_ns = total_ns.checked_add(value).ok_or_else(too_large)?;
        rest = tail;
    }

    let seconds = i64::try_from(total_ns / NANOS_PER_SECOND)
        .map_err(|_| too_large())?
        .max(1);
    Duration::try_seconds(seconds).ok_or_else(too_large)
}
