use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, TimeZone, Timelike, Utc};
use crate::error::{Result, Error};

/// How far ahead `next_after` searches before giving up (covers Feb 29).
const SEARCH_DAYS: i64 = 366 * 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Field {
    bits: u64,
    restricted: bool,
}

impl Field {
    fn contains(&self, value: u32) -> bool {
        self.bits & (1u64 << value) != 0
    }

    fn values(&self) -> impl Iterator<Item = u32> + '_ {
        (0..64u32).filter(move |v| self.contains(*v))
    }
}

/// Five-field cron expression evaluated in UTC.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CronSchedule {
    source: String,
    minutes: Field,
    hours: Field,
    days_of_month: Field,
    months: Field,
    days_of_week: Field,
}

impl CronSchedule {
    pub fn parse(expression: &str) -> Result<Self> {
        let trimmed = expression.trim();
        let expanded = match trimmed {
            "@yearly" | "@annually" => "0 0 1 1 *",
            "@monthly" => "0 0 1 * *",
            "@weekly" => "0 0 * * 0",
            "@daily" | "@midnight" => "0 0 * * *",
            "@hourly" => "0 * * * *",
            other if other.starts_with('@') => {
                return Err(Error::ScheduleError(format!("unknown preset '{}'", other)));
            }
            other => other,
        };

        let parts: Vec<&str> = expanded.split_whitespace().collect();
        if parts.len() != 5 {
            return Err(Error::ScheduleError(format!(
                "expected 5 fields in '{}', found {}",
                expression,
                parts.len()
            )));
        }

        let mut days_of_week = parse_field(parts[4], 0, 7, "day-of-week")?;
        // 7 is an alias for Sunday
        if days_of_week.contains(7) {
            days_of_week.bits = (days_of_week.bits & !(1 << 7)) | 1;
        }

        Ok(Self {
            source: trimmed.to_string(),
            minutes: parse_field(parts[0], 0, 59, "minute")?,
            hours: parse_field(parts[1], 0, 23, "hour")?,
            days_of_month: parse_field(parts[2], 1, 31, "day-of-month")?,
            months: parse_field(parts[3], 1, 12, "month")?,
            days_of_week,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    fn matches_day(&self, date: NaiveDate) -> bool {
        if !self.months.contains(date.month()) {
            return false;
        }
        let dom = self.days_of_month.contains(date.day());
        let dow = self.days_of_week.contains(date.weekday().num_days_from_sunday());
        if self.days_of_month.restricted && self.days_of_week.restricted {
            dom || dow
        } else {
            dom && dow
        }
    }

    /// First matching minute strictly after `after`.
    pub fn next_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let start = truncate_to_minute(after) + Duration::minutes(1);
        let first_day = start.date_naive();

        for offset in 0..SEARCH_DAYS {
            let day = first_day + Duration::days(offset);
            if !self.matches_day(day) {
                continue;
            }
            let floor = if offset == 0 { Some(start.time()) } else { None };
            for hour in self.hours.values() {
                for minute in self.minutes.values() {
                    let time = NaiveTime::from_hms_opt(hour, minute, 0)?;
                    if floor.map_or(true, |f| time >= f) {
                        return Some(Utc.from_utc_datetime(&day.and_time(time)));
                    }
                }
            }
        }
        None
    }
}

impl std::fmt::Display for CronSchedule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.source)
    }
}

fn truncate_to_minute(ts: DateTime<Utc>) -> DateTime<Utc> {
    ts.with_second(0)
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(ts)
}

fn parse_field(text: &str, min: u32, max: u32, name: &str) -> Result<Field> {
    let invalid = |detail: &str| Error::ScheduleError(format!("invalid {} field '{}': {}", name, text, detail));
    let mut bits = 0u64;

    for item in text.split(',') {
        let (range, step) = match item.split_once('/') {
            Some((range, step)) => {
                let step: u32 = step.parse().map_err(|_| invalid("step is not a number"))?;
                if step == 0 {
                    return Err(invalid("step must be positive"));
                }
                (range, step)
            }
            None => (item, 1),
        };

        let (low, high) = if range == "*" {
            (min, max)
        } else if let Some((low, high)) = range.split_once('-') {
            let low: u32 = low.parse().map_err(|_| invalid("range start is not a number"))?;
            let high: u32 = high.parse().map_err(|_| invalid("range end is not a number"))?;
            (low, high)
        } else {
            let value: u32 = range.parse().map_err(|_| invalid("not a number"))?;
            // "5/15" means from 5 to the end in steps of 15
            if step > 1 { (value, max) } else { (value, value) }
        };

        if low < min || high > max {
            return Err(invalid(&format!("values must be within {}-{}", min, max)));
        }
        if low > high {
            return Err(invalid("range start is after range end"));
        }

        let mut value = low;
        while value <= high {
            bits |= 1u64 << value;
            value += step;
        }
    }

    // A day field starting with '*' (including "*/n") is ANDed with the other
    // day field; only two restricted day fields are ORed.
    Ok(Field {
        bits,
        restricted: !text.starts_with('*'),
    })
}
