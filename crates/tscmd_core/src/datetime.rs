//! Date/time with an explicit precision.
//!
//! Tables and time series carry date/times that are only meaningful to a
//! given precision (a monthly value has no day). The precision controls both
//! formatting and interval arithmetic.

use std::cmp::Ordering;
use std::fmt;

use chrono::{Datelike, Months, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta, Timelike};

use crate::error::ParseError;

/// Precision of a [`DateTime`], from coarsest to finest
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DateTimePrecision {
    Year,
    Month,
    Day,
    Hour,
    Minute,
    Second,
}

/// Date/time value with precision. Equality and ordering use the timestamp only.
#[derive(Debug, Clone, Copy)]
pub struct DateTime {
    value: NaiveDateTime,
    precision: DateTimePrecision,
}

impl DateTime {
    pub fn new(value: NaiveDateTime, precision: DateTimePrecision) -> Self {
        Self { value, precision }.truncated()
    }

    /// Build from calendar parts; `None` if the parts are not a valid date/time.
    pub fn from_parts(
        year: i32,
        month: u32,
        day: u32,
        hour: u32,
        minute: u32,
        second: u32,
        precision: DateTimePrecision,
    ) -> Option<Self> {
        let date = NaiveDate::from_ymd_opt(year, month, day)?;
        let time = NaiveTime::from_hms_opt(hour, minute, second)?;
        Some(Self::new(NaiveDateTime::new(date, time), precision))
    }

    /// Year-only date/time, used for integer year columns
    pub fn from_year(year: i32) -> Option<Self> {
        Self::from_parts(year, 1, 1, 0, 0, 0, DateTimePrecision::Year)
    }

    /// Parse `YYYY[-MM[-DD[ hh[:mm[:ss]]]]]`. A `T` separator, fractional
    /// seconds and a trailing zone designator are accepted and dropped.
    pub fn parse(text: &str) -> Result<Self, ParseError> {
        let err = || ParseError::DateTime(text.to_string());
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(err());
        }
        let trimmed = trimmed.strip_suffix('Z').unwrap_or(trimmed);

        let (date_part, time_part) = match trimmed.find(|c: char| c == 'T' || c == ' ') {
            Some(idx) => (&trimmed[..idx], Some(trimmed[idx + 1..].trim())),
            None => (trimmed, None),
        };

        let date_fields: Vec<&str> = date_part.split('-').collect();
        let parse_num = |s: &str| -> Result<u32, ParseError> {
            if s.is_empty() || !s.chars().all(|c| c.is_ascii_digit()) {
                return Err(err());
            }
            s.parse::<u32>().map_err(|_| err())
        };

        let year = parse_num(date_fields[0])? as i32;
        if date_fields[0].len() != 4 {
            return Err(err());
        }
        let (month, day, mut precision) = match date_fields.len() {
            1 => (1, 1, DateTimePrecision::Year),
            2 => (parse_num(date_fields[1])?, 1, DateTimePrecision::Month),
            3 => (
                parse_num(date_fields[1])?,
                parse_num(date_fields[2])?,
                DateTimePrecision::Day,
            ),
            _ => return Err(err()),
        };

        let (mut hour, mut minute, mut second) = (0, 0, 0);
        if let Some(time) = time_part.filter(|t| !t.is_empty()) {
            if precision != DateTimePrecision::Day {
                return Err(err());
            }
            // Drop zone offsets and fractional seconds.
            let time = time.split(['+', '-']).next().unwrap_or(time);
            let time = time.split('.').next().unwrap_or(time);
            let fields: Vec<&str> = time.split(':').collect();
            hour = parse_num(fields[0])?;
            precision = DateTimePrecision::Hour;
            if let Some(m) = fields.get(1) {
                minute = parse_num(m)?;
                precision = DateTimePrecision::Minute;
            }
            if let Some(s) = fields.get(2) {
                second = parse_num(s)?;
                precision = DateTimePrecision::Second;
            }
            if fields.len() > 3 {
                return Err(err());
            }
        }

        Self::from_parts(year, month, day, hour, minute, second, precision).ok_or_else(err)
    }

    pub fn value(&self) -> NaiveDateTime {
        self.value
    }

    pub fn precision(&self) -> DateTimePrecision {
        self.precision
    }

    pub fn year(&self) -> i32 {
        self.value.year()
    }

    /// Copy with a different precision; finer fields are zeroed when coarsening.
    pub fn with_precision(&self, precision: DateTimePrecision) -> Self {
        Self::new(self.value, precision)
    }

    /// Step forward (or back for negative `amount`) in units of `precision`.
    pub fn add(&self, unit: DateTimePrecision, amount: i64) -> Option<Self> {
        let value = match unit {
            DateTimePrecision::Second => self.value.checked_add_signed(TimeDelta::try_seconds(amount)?)?,
            DateTimePrecision::Minute => self.value.checked_add_signed(TimeDelta::try_minutes(amount)?)?,
            DateTimePrecision::Hour => self.value.checked_add_signed(TimeDelta::try_hours(amount)?)?,
            DateTimePrecision::Day => self.value.checked_add_signed(TimeDelta::try_days(amount)?)?,
            DateTimePrecision::Month => add_months(self.value, amount)?,
            DateTimePrecision::Year => add_months(self.value, amount.checked_mul(12)?)?,
        };
        Some(Self {
            value,
            precision: self.precision,
        })
    }

    fn truncated(mut self) -> Self {
        let v = self.value;
        let (month, day, hour, minute, second) = match self.precision {
            DateTimePrecision::Year => (1, 1, 0, 0, 0),
            DateTimePrecision::Month => (v.month(), 1, 0, 0, 0),
            DateTimePrecision::Day => (v.month(), v.day(), 0, 0, 0),
            DateTimePrecision::Hour => (v.month(), v.day(), v.hour(), 0, 0),
            DateTimePrecision::Minute => (v.month(), v.day(), v.hour(), v.minute(), 0),
            DateTimePrecision::Second => (v.month(), v.day(), v.hour(), v.minute(), v.second()),
        };
        if let (Some(date), Some(time)) = (
            NaiveDate::from_ymd_opt(v.year(), month, day),
            NaiveTime::from_hms_opt(hour, minute, second),
        ) {
            self.value = NaiveDateTime::new(date, time);
        }
        self
    }
}

fn add_months(value: NaiveDateTime, amount: i64) -> Option<NaiveDateTime> {
    let months = Months::new(u32::try_from(amount.unsigned_abs()).ok()?);
    if amount >= 0 {
        value.checked_add_months(months)
    } else {
        value.checked_sub_months(months)
    }
}

impl PartialEq for DateTime {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl Eq for DateTime {}

impl PartialOrd for DateTime {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for DateTime {
    fn cmp(&self, other: &Self) -> Ordering {
        self.value.cmp(&other.value)
    }
}

impl fmt::Display for DateTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let format = match self.precision {
            DateTimePrecision::Year => "%Y",
            DateTimePrecision::Month => "%Y-%m",
            DateTimePrecision::Day => "%Y-%m-%d",
            DateTimePrecision::Hour => "%Y-%m-%d %H",
            DateTimePrecision::Minute => "%Y-%m-%d %H:%M",
            DateTimePrecision::Second => "%Y-%m-%d %H:%M:%S",
        };
        write!(f, "{}", self.value.format(format))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_each_precision() {
        let cases = [
            ("2021", DateTimePrecision::Year, "2021"),
            ("2021-03", DateTimePrecision::Month, "2021-03"),
            ("2021-03-04", DateTimePrecision::Day, "2021-03-04"),
            ("2021-03-04 05", DateTimePrecision::Hour, "2021-03-04 05"),
            ("2021-03-04T05:06", DateTimePrecision::Minute, "2021-03-04 05:06"),
            ("2021-03-04T05:06:07Z", DateTimePrecision::Second, "2021-03-04 05:06:07"),
            ("2021-03-04 05:06:07.250+02:00", DateTimePrecision::Second, "2021-03-04 05:06:07"),
        ];
        for (text, precision, shown) in cases {
            let dt = DateTime::parse(text).unwrap();
            assert_eq!(dt.precision(), precision, "{text}");
            assert_eq!(dt.to_string(), shown);
        }
    }

    #[test]
    fn rejects_garbage() {
        for text in ["", "21", "2021-13-01", "2021-02-30", "abcd", "2021-01-01 25", "2021-01 10:00"] {
            assert!(DateTime::parse(text).is_err(), "{text} should fail");
        }
    }

    #[test]
    fn coarsening_truncates() {
        let dt = DateTime::parse("2021-03-04 05:06:07").unwrap();
        assert_eq!(dt.with_precision(DateTimePrecision::Month).to_string(), "2021-03");
        assert_eq!(
            dt.with_precision(DateTimePrecision::Month),
            DateTime::parse("2021-03-01").unwrap()
        );
    }

    #[test]
    fn month_arithmetic_clamps_day() {
        let dt = DateTime::parse("2021-01-31").unwrap();
        let next = dt.add(DateTimePrecision::Month, 1).unwrap();
        assert_eq!(next.to_string(), "2021-02-28");
        let back = DateTime::parse("2021-03").unwrap().add(DateTimePrecision::Year, -1).unwrap();
        assert_eq!(back.to_string(), "2020-03");
    }
}
