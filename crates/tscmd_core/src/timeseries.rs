//! Time series model: interval, identifier and the data container.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::NaiveDateTime;
use glob::{MatchOptions, Pattern};

use crate::datetime::{DateTime, DateTimePrecision};
use crate::error::ParseError;

/// Base unit of a time interval
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntervalBase {
    Minute,
    Hour,
    Day,
    Month,
    Year,
    Irregular,
}

/// Data interval such as `Day`, `6Hour` or `Irregular`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimeInterval {
    base: IntervalBase,
    multiplier: u32,
}

impl TimeInterval {
    pub fn new(base: IntervalBase, multiplier: u32) -> Self {
        let multiplier = if base == IntervalBase::Irregular { 1 } else { multiplier.max(1) };
        Self { base, multiplier }
    }

    pub fn irregular() -> Self {
        Self::new(IntervalBase::Irregular, 1)
    }

    pub fn base(&self) -> IntervalBase {
        self.base
    }

    pub fn multiplier(&self) -> u32 {
        self.multiplier
    }

    pub fn is_regular(&self) -> bool {
        self.base != IntervalBase::Irregular
    }

    /// Date/time precision matching the base; `None` for irregular data
    pub fn precision(&self) -> Option<DateTimePrecision> {
        match self.base {
            IntervalBase::Minute => Some(DateTimePrecision::Minute),
            IntervalBase::Hour => Some(DateTimePrecision::Hour),
            IntervalBase::Day => Some(DateTimePrecision::Day),
            IntervalBase::Month => Some(DateTimePrecision::Month),
            IntervalBase::Year => Some(DateTimePrecision::Year),
            IntervalBase::Irregular => None,
        }
    }

    /// Move `steps` intervals from `dt`; `None` for irregular or overflow.
    pub fn advance(&self, dt: &DateTime, steps: i64) -> Option<DateTime> {
        let unit = self.precision()?;
        dt.add(unit, steps.checked_mul(i64::from(self.multiplier))?)
    }
}

impl FromStr for TimeInterval {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseError::Interval(s.to_string());
        let text = s.trim().to_ascii_lowercase();
        let digits: String = text.chars().take_while(|c| c.is_ascii_digit()).collect();
        let multiplier = if digits.is_empty() {
            1
        } else {
            digits.parse::<u32>().map_err(|_| err())?
        };
        if multiplier == 0 {
            return Err(err());
        }
        let base = match &text[digits.len()..] {
            "min" | "minute" => IntervalBase::Minute,
            "hour" => IntervalBase::Hour,
            "day" => IntervalBase::Day,
            "month" => IntervalBase::Month,
            "year" => IntervalBase::Year,
            "irreg" | "irregular" if digits.is_empty() => IntervalBase::Irregular,
            _ => return Err(err()),
        };
        Ok(Self::new(base, multiplier))
    }
}

impl fmt::Display for TimeInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self.base {
            IntervalBase::Minute => "Minute",
            IntervalBase::Hour => "Hour",
            IntervalBase::Day => "Day",
            IntervalBase::Month => "Month",
            IntervalBase::Year => "Year",
            IntervalBase::Irregular => return f.write_str("Irregular"),
        };
        if self.multiplier == 1 {
            f.write_str(name)
        } else {
            write!(f, "{}{}", self.multiplier, name)
        }
    }
}

/// Time series identifier `Location.DataSource.DataType.Interval[.Scenario]`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TsIdent {
    pub location: String,
    pub data_source: String,
    pub data_type: String,
    pub interval: TimeInterval,
    pub scenario: String,
}

impl TsIdent {
    pub fn new(
        location: impl Into<String>,
        data_source: impl Into<String>,
        data_type: impl Into<String>,
        interval: TimeInterval,
    ) -> Self {
        Self {
            location: location.into(),
            data_source: data_source.into(),
            data_type: data_type.into(),
            interval,
            scenario: String::new(),
        }
    }

    /// Case-insensitive glob match of the full identifier (`*` wildcards)
    pub fn matches(&self, pattern: &str) -> bool {
        let options = MatchOptions {
            case_sensitive: false,
            require_literal_separator: false,
            require_literal_leading_dot: false,
        };
        Pattern::new(pattern.trim())
            .map(|p| p.matches_with(&self.to_string(), options))
            .unwrap_or(false)
    }
}

impl FromStr for TsIdent {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.trim().split('.').collect();
        if !(4..=5).contains(&parts.len()) || parts[0].is_empty() {
            return Err(ParseError::TsIdent(s.to_string()));
        }
        let mut ident = TsIdent::new(parts[0], parts[1], parts[2], parts[3].parse()?);
        if let Some(scenario) = parts.get(4) {
            ident.scenario = scenario.to_string();
        }
        Ok(ident)
    }
}

impl fmt::Display for TsIdent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}.{}.{}",
            self.location, self.data_source, self.data_type, self.interval
        )?;
        if !self.scenario.is_empty() {
            write!(f, ".{}", self.scenario)?;
        }
        Ok(())
    }
}

/// One data point
#[derive(Debug, Clone, PartialEq)]
pub struct TsValue {
    pub value: f64,
    pub flag: Option<String>,
}

/// Time series keyed by date/time truncated to the interval precision.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeSeries {
    pub ident: TsIdent,
    pub alias: String,
    pub description: String,
    pub units: String,
    /// Value treated as missing in addition to NaN
    pub missing: f64,
    start: Option<DateTime>,
    end: Option<DateTime>,
    data: BTreeMap<NaiveDateTime, TsValue>,
}

impl TimeSeries {
    pub fn new(ident: TsIdent) -> Self {
        Self {
            ident,
            alias: String::new(),
            description: String::new(),
            units: String::new(),
            missing: f64::NAN,
            start: None,
            end: None,
            data: BTreeMap::new(),
        }
    }

    /// Alias if set, else the identifier
    pub fn name(&self) -> String {
        if self.alias.is_empty() {
            self.ident.to_string()
        } else {
            self.alias.clone()
        }
    }

    pub fn interval(&self) -> TimeInterval {
        self.ident.interval
    }

    /// Precision used for keys; seconds for irregular series
    pub fn precision(&self) -> DateTimePrecision {
        self.ident
            .interval
            .precision()
            .unwrap_or(DateTimePrecision::Second)
    }

    pub fn is_missing(&self, value: f64) -> bool {
        value.is_nan() || value == self.missing
    }

    pub fn set_value(&mut self, dt: &DateTime, value: f64) {
        self.set_value_with_flag(dt, value, None);
    }

    pub fn set_value_with_flag(&mut self, dt: &DateTime, value: f64, flag: Option<String>) {
        let key = dt.with_precision(self.precision()).value();
        self.data.insert(key, TsValue { value, flag });
    }

    /// Stored point at `dt`, if any (may hold a missing value)
    pub fn value_at(&self, dt: &DateTime) -> Option<&TsValue> {
        self.data.get(&dt.with_precision(self.precision()).value())
    }

    /// Non-missing value at `dt`
    pub fn get(&self, dt: &DateTime) -> Option<f64> {
        self.value_at(dt)
            .map(|v| v.value)
            .filter(|v| !self.is_missing(*v))
    }

    pub fn non_missing_count(&self) -> usize {
        self.data.values().filter(|v| !self.is_missing(v.value)).count()
    }

    pub fn data_len(&self) -> usize {
        self.data.len()
    }

    pub fn set_period(&mut self, start: Option<DateTime>, end: Option<DateTime>) {
        let precision = self.precision();
        self.start = start.map(|d| d.with_precision(precision));
        self.end = end.map(|d| d.with_precision(precision));
    }

    /// Explicit period, else first and last data dates
    pub fn period(&self) -> Option<(DateTime, DateTime)> {
        let precision = self.precision();
        let first = self.data.keys().next().map(|k| DateTime::new(*k, precision));
        let last = self.data.keys().next_back().map(|k| DateTime::new(*k, precision));
        Some((self.start.or(first)?, self.end.or(last)?))
    }

    /// Every interval step in the period for regular series; data dates within
    /// the period for irregular series.
    pub fn dates(&self) -> Vec<DateTime> {
        let Some((start, end)) = self.period() else {
            return Vec::new();
        };
        if !self.interval().is_regular() {
            let precision = self.precision();
            return self
                .data
                .range(start.value()..=end.value())
                .map(|(k, _)| DateTime::new(*k, precision))
                .collect();
        }
        let mut dates = Vec::new();
        let mut current = start;
        while current <= end {
            dates.push(current);
            match self.interval().advance(&current, 1) {
                Some(next) => current = next,
                None => break,
            }
        }
        dates
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_intervals() {
        assert_eq!("Day".parse::<TimeInterval>().unwrap().to_string(), "Day");
        let six = "6hour".parse::<TimeInterval>().unwrap();
        assert_eq!(six.multiplier(), 6);
        assert_eq!(six.to_string(), "6Hour");
        assert!(!"IRREGULAR".parse::<TimeInterval>().unwrap().is_regular());
        assert!("0Day".parse::<TimeInterval>().is_err());
        assert!("Fortnight".parse::<TimeInterval>().is_err());
    }

    #[test]
    fn ident_round_trip_and_match() {
        let id: TsIdent = "ABC.USGS.Streamflow.Day".parse().unwrap();
        assert_eq!(id.location, "ABC");
        assert_eq!(id.to_string(), "ABC.USGS.Streamflow.Day");
        assert!(id.matches("abc.*"));
        assert!(id.matches("*.Streamflow.*"));
        assert!(!id.matches("XYZ.*"));
        assert!("ABC.USGS".parse::<TsIdent>().is_err());
    }

    #[test]
    fn regular_dates_cover_period() {
        let ident = TsIdent::new("A", "S", "T", "Month".parse().unwrap());
        let mut ts = TimeSeries::new(ident);
        ts.set_value(&DateTime::parse("2020-01-15").unwrap(), 1.0);
        ts.set_value(&DateTime::parse("2020-04").unwrap(), 4.0);
        let dates: Vec<String> = ts.dates().iter().map(|d| d.to_string()).collect();
        assert_eq!(dates, vec!["2020-01", "2020-02", "2020-03", "2020-04"]);
        assert_eq!(ts.get(&DateTime::parse("2020-01").unwrap()), Some(1.0));
        assert_eq!(ts.get(&DateTime::parse("2020-02").unwrap()), None);
        assert_eq!(ts.non_missing_count(), 2);
    }

    #[test]
    fn missing_values() {
        let ident = TsIdent::new("A", "S", "T", "Day".parse().unwrap());
        let mut ts = TimeSeries::new(ident);
        ts.missing = -999.0;
        let d = DateTime::parse("2020-01-01").unwrap();
        ts.set_value(&d, -999.0);
        assert!(ts.value_at(&d).is_some());
        assert_eq!(ts.get(&d), None);
        assert_eq!(ts.non_missing_count(), 0);
    }
}
