//! Turns whatever date/time text a user or model hands us into an RFC
//! 3339 timestamp with an explicit offset. ISO 8601 variants are tried
//! first, then a small set of natural phrases like "tomorrow 3pm",
//! "next friday at noon" or "jan 5th 2026 9:30am utc".
//!
//! Text without a zone gets the configured default offset. Anything
//! that can't be parsed is `None`, never a panic.

use std::sync::LazyLock;

use anyhow::{Result, anyhow};
use chrono::{
    DateTime, Datelike, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, SecondsFormat, TimeDelta,
    TimeZone, Timelike, Utc, Weekday,
};
use regex::Regex;

static ISO_WITH_ZONE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{4}-\d{2}-\d{2}[T ]\d{2}:\d{2}(?::\d{2}(?:\.\d+)?)?)\s*(Z|z|[+-]\d{2}(?::?\d{2})?)$")
        .expect("Invalid regex")
});

static ZONE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:utc|gmt)?([+-])(\d{1,2})(?::?(\d{2}))?$").expect("Invalid regex")
});

static TIME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{1,2})(?::(\d{2}))?(?::(\d{2}))?(am|pm|a\.m\.|p\.m\.)?$").expect("Invalid regex")
});

static YMD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{4})[-/](\d{1,2})[-/](\d{1,2})$").expect("Invalid regex"));

static MDY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{1,2})/(\d{1,2})/(\d{4})$").expect("Invalid regex"));

static YEAR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d{4}$").expect("Invalid regex"));

const NAIVE_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d %H:%M",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d"];

/// Normalize `text` relative to the current time.
pub fn normalize(text: &str, default_offset: FixedOffset) -> Option<String> {
    let now = Utc::now().with_timezone(&default_offset);
    normalize_at(text, default_offset, now)
}

/// Normalize `text`, resolving relative phrases like "tomorrow"
/// against `now`.
pub fn normalize_at(
    text: &str,
    default_offset: FixedOffset,
    now: DateTime<FixedOffset>,
) -> Option<String> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    let parsed = parse_iso(text, default_offset).or_else(|| parse_phrase(text, default_offset, now));
    match parsed {
        Some(dt) => Some(dt.to_rfc3339_opts(SecondsFormat::AutoSi, false)),
        None => {
            tracing::warn!("Unable to parse date/time '{}'", text);
            None
        }
    }
}

/// Parse a UTC offset such as `-05:00`, `+0530`, `utc-3` or `Z`.
pub fn parse_offset(text: &str) -> Result<FixedOffset> {
    zone_offset(&text.trim().to_lowercase())
        .ok_or_else(|| anyhow!("Unrecognized UTC offset: {}", text))
}

fn zone_offset(token: &str) -> Option<FixedOffset> {
    if matches!(token, "z" | "utc" | "gmt") {
        return FixedOffset::east_opt(0);
    }
    let caps = ZONE.captures(token)?;
    let hours: i32 = caps[2].parse().ok()?;
    let minutes: i32 = match caps.get(3) {
        Some(m) => m.as_str().parse().ok()?,
        None => 0,
    };
    if hours > 23 || minutes > 59 {
        return None;
    }
    let secs = hours * 3600 + minutes * 60;
    if &caps[1] == "-" {
        FixedOffset::west_opt(secs)
    } else {
        FixedOffset::east_opt(secs)
    }
}

fn parse_iso(text: &str, default_offset: FixedOffset) -> Option<DateTime<FixedOffset>> {
    if let Some(caps) = ISO_WITH_ZONE.captures(text) {
        let naive = parse_naive_datetime(&caps[1])?;
        let offset = zone_offset(&caps[2].to_lowercase())?;
        return offset.from_local_datetime(&naive).single();
    }

    let naive = parse_naive_datetime(text).or_else(|| {
        DATE_FORMATS
            .iter()
            .find_map(|fmt| NaiveDate::parse_from_str(text, fmt).ok())
            .map(|date| date.and_time(NaiveTime::MIN))
    })?;
    default_offset.from_local_datetime(&naive).single()
}

fn parse_naive_datetime(text: &str) -> Option<NaiveDateTime> {
    NAIVE_DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
}

// Each slot may only be filled once, "tomorrow today" is nonsense
fn fill<T>(slot: &mut Option<T>, value: T) -> Option<()> {
    if slot.is_some() {
        return None;
    }
    *slot = Some(value);
    Some(())
}

fn parse_phrase(
    text: &str,
    default_offset: FixedOffset,
    now: DateTime<FixedOffset>,
) -> Option<DateTime<FixedOffset>> {
    let lowered = text.to_lowercase().replace(',', " ");
    let tokens: Vec<&str> = lowered.split_whitespace().collect();
    let today = now.date_naive();

    let mut date: Option<NaiveDate> = None;
    let mut time: Option<NaiveTime> = None;
    let mut offset: Option<FixedOffset> = None;

    let mut i = 0;
    while i < tokens.len() {
        let token = tokens[i];
        let rest = &tokens[i + 1..];

        let consumed = match token {
            "at" | "on" | "the" => 1,
            "now" => {
                fill(&mut date, today)?;
                fill(&mut time, now.time().with_nanosecond(0)?)?;
                1
            }
            "today" => {
                fill(&mut date, today)?;
                1
            }
            "tomorrow" => {
                fill(&mut date, today.succ_opt()?)?;
                1
            }
            "yesterday" => {
                fill(&mut date, today.pred_opt()?)?;
                1
            }
            "noon" => {
                fill(&mut time, NaiveTime::from_hms_opt(12, 0, 0)?)?;
                1
            }
            "midnight" => {
                fill(&mut time, NaiveTime::MIN)?;
                1
            }
            "next" => {
                let target = weekday(rest.first()?)?;
                fill(&mut date, upcoming(today, target, true)?)?;
                2
            }
            "in" => {
                let amount: i64 = rest.first()?.parse().ok()?;
                let delta = match *rest.get(1)? {
                    "minute" | "minutes" | "min" | "mins" => TimeDelta::try_minutes(amount)?,
                    "hour" | "hours" | "hr" | "hrs" => TimeDelta::try_hours(amount)?,
                    "day" | "days" => TimeDelta::try_days(amount)?,
                    "week" | "weeks" => TimeDelta::try_weeks(amount)?,
                    _ => return None,
                };
                let target = now.checked_add_signed(delta)?;
                fill(&mut date, target.date_naive())?;
                // Day and week offsets keep the time open for "in 2 days at 9am"
                if delta.num_days() == 0 {
                    fill(&mut time, target.time().with_nanosecond(0)?)?;
                }
                3
            }
            _ => {
                if let Some(target) = weekday(token) {
                    fill(&mut date, upcoming(today, target, false)?)?;
                    1
                } else if let Some(month) = month(token) {
                    let day = day_of_month(rest.first()?)?;
                    let (year, used) = year_at(rest.get(1), today);
                    fill(&mut date, NaiveDate::from_ymd_opt(year, month, day)?)?;
                    2 + used
                } else if let Some((day, month)) =
                    day_of_month(token).zip(rest.first().and_then(|m| month(m)))
                {
                    let (year, used) = year_at(rest.get(1), today);
                    fill(&mut date, NaiveDate::from_ymd_opt(year, month, day)?)?;
                    2 + used
                } else if let Some(caps) = YMD.captures(token) {
                    let value = NaiveDate::from_ymd_opt(
                        caps[1].parse().ok()?,
                        caps[2].parse().ok()?,
                        caps[3].parse().ok()?,
                    )?;
                    fill(&mut date, value)?;
                    1
                } else if let Some(caps) = MDY.captures(token) {
                    let value = NaiveDate::from_ymd_opt(
                        caps[3].parse().ok()?,
                        caps[1].parse().ok()?,
                        caps[2].parse().ok()?,
                    )?;
                    fill(&mut date, value)?;
                    1
                } else if let Some(caps) = TIME.captures(token) {
                    let trailing = rest.first().copied().filter(|t| meridiem(t).is_some());
                    let is_pm = match caps.get(4) {
                        Some(m) => meridiem(m.as_str()),
                        None => trailing.and_then(meridiem),
                    };
                    // A bare number like "5" is not a time
                    if is_pm.is_none() && caps.get(2).is_none() {
                        return None;
                    }
                    let hour: u32 = caps[1].parse().ok()?;
                    let minute: u32 = caps.get(2).map_or(Some(0), |m| m.as_str().parse().ok())?;
                    let second: u32 = caps.get(3).map_or(Some(0), |m| m.as_str().parse().ok())?;
                    let hour = match is_pm {
                        Some(pm) => twelve_hour(hour, pm)?,
                        None => hour,
                    };
                    fill(&mut time, NaiveTime::from_hms_opt(hour, minute, second)?)?;
                    if caps.get(4).is_none() && trailing.is_some() { 2 } else { 1 }
                } else if let Some(zone) = zone_offset(token) {
                    fill(&mut offset, zone)?;
                    1
                } else {
                    return None;
                }
            }
        };
        i += consumed;
    }

    if date.is_none() && time.is_none() {
        return None;
    }
    let naive = date
        .unwrap_or(today)
        .and_time(time.unwrap_or(NaiveTime::MIN));
    offset
        .unwrap_or(default_offset)
        .from_local_datetime(&naive)
        .single()
}

fn upcoming(today: NaiveDate, target: Weekday, strictly_after: bool) -> Option<NaiveDate> {
    let mut days = (7 + i64::from(target.num_days_from_monday())
        - i64::from(today.weekday().num_days_from_monday()))
        % 7;
    if days == 0 && strictly_after {
        days = 7;
    }
    today.checked_add_signed(TimeDelta::try_days(days)?)
}

fn year_at(token: Option<&&str>, today: NaiveDate) -> (i32, usize) {
    match token {
        Some(t) if YEAR.is_match(t) => match t.parse() {
            Ok(year) => (year, 1),
            Err(_) => (today.year(), 0),
        },
        _ => (today.year(), 0),
    }
}

fn twelve_hour(hour: u32, pm: bool) -> Option<u32> {
    match (hour, pm) {
        (1..=11, false) => Some(hour),
        (12, false) => Some(0),
        (1..=11, true) => Some(hour + 12),
        (12, true) => Some(12),
        _ => None,
    }
}

fn meridiem(token: &str) -> Option<bool> {
    match token {
        "am" | "a.m." => Some(false),
        "pm" | "p.m." => Some(true),
        _ => None,
    }
}

fn weekday(token: &str) -> Option<Weekday> {
    match token {
        "monday" | "mon" => Some(Weekday::Mon),
        "tuesday" | "tue" | "tues" => Some(Weekday::Tue),
        "wednesday" | "wed" => Some(Weekday::Wed),
        "thursday" | "thu" | "thurs" => Some(Weekday::Thu),
        "friday" | "fri" => Some(Weekday::Fri),
        "saturday" | "sat" => Some(Weekday::Sat),
        "sunday" | "sun" => Some(Weekday::Sun),
        _ => None,
    }
}

fn month(token: &str) -> Option<u32> {
    match token {
        "january" | "jan" => Some(1),
        "february" | "feb" => Some(2),
        "march" | "mar" => Some(3),
        "april" | "apr" => Some(4),
        "may" => Some(5),
        "june" | "jun" => Some(6),
        "july" | "jul" => Some(7),
        "august" | "aug" => Some(8),
        "september" | "sep" | "sept" => Some(9),
        "october" | "oct" => Some(10),
        "november" | "nov" => Some(11),
        "december" | "dec" => Some(12),
        _ => None,
    }
}

fn day_of_month(token: &str) -> Option<u32> {
    let digits = ["st", "nd", "rd", "th"]
        .iter()
        .find_map(|suffix| token.strip_suffix(suffix))
        .unwrap_or(token);
    let day: u32 = digits.parse().ok()?;
    (1..=31).contains(&day).then_some(day)
}
