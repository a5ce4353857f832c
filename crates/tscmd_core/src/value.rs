//! Typed table cell values.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::datetime::DateTime;
use crate::error::ParseError;

/// Column type of a table field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldType {
    Boolean,
    Integer,
    Double,
    Text,
    DateTime,
}

impl FieldType {
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Boolean => "boolean",
            Self::Integer => "integer",
            Self::Double => "double",
            Self::Text => "text",
            Self::DateTime => "datetime",
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Self::Integer | Self::Double)
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name())
    }
}

/// A single table cell
#[derive(Debug, Clone, PartialEq, Default)]
pub enum FieldValue {
    #[default]
    Null,
    Boolean(bool),
    Integer(i64),
    Double(f64),
    Text(String),
    DateTime(DateTime),
}

impl FieldValue {
    /// Type of the value; `None` for null
    pub fn field_type(&self) -> Option<FieldType> {
        match self {
            Self::Null => None,
            Self::Boolean(_) => Some(FieldType::Boolean),
            Self::Integer(_) => Some(FieldType::Integer),
            Self::Double(_) => Some(FieldType::Double),
            Self::Text(_) => Some(FieldType::Text),
            Self::DateTime(_) => Some(FieldType::DateTime),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Self::Integer(_) | Self::Double(_))
    }

    /// Numeric view of the value, parsing text if needed
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Integer(i) => Some(*i as f64),
            Self::Double(d) => Some(*d),
            Self::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(i) => Some(*i),
            Self::Double(d) if d.fract() == 0.0 && d.abs() < i64::MAX as f64 => Some(*d as i64),
            Self::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_datetime(&self) -> Option<&DateTime> {
        match self {
            Self::DateTime(dt) => Some(dt),
            _ => None,
        }
    }

    /// Convert to `target`, parsing text where needed. Null stays null.
    pub fn convert_to(&self, target: FieldType) -> Result<FieldValue, ParseError> {
        if self.is_null() || self.field_type() == Some(target) {
            return Ok(self.clone());
        }
        let fail = || ParseError::Conversion {
            value: self.to_string(),
            target: target.type_name(),
        };
        let converted = match (target, self) {
            (FieldType::Text, other) => FieldValue::Text(other.to_string()),
            (FieldType::Double, Self::Integer(i)) => FieldValue::Double(*i as f64),
            (FieldType::Double, Self::Text(s)) => {
                FieldValue::Double(s.trim().parse().map_err(|_| fail())?)
            }
            (FieldType::Integer, Self::Double(_) | Self::Text(_)) => {
                FieldValue::Integer(self.as_i64().ok_or_else(fail)?)
            }
            (FieldType::Boolean, Self::Text(s)) => match s.trim().to_ascii_lowercase().as_str() {
                "true" => FieldValue::Boolean(true),
                "false" => FieldValue::Boolean(false),
                _ => return Err(fail()),
            },
            (FieldType::DateTime, Self::Text(s)) => FieldValue::DateTime(DateTime::parse(s)?),
            (FieldType::DateTime, Self::Integer(year)) => {
                let year = i32::try_from(*year).map_err(|_| fail())?;
                FieldValue::DateTime(DateTime::from_year(year).ok_or_else(fail)?)
            }
            _ => return Err(fail()),
        };
        Ok(converted)
    }

    /// Text form; doubles use `precision` digits when given, null is empty.
    pub fn format(&self, precision: Option<usize>) -> String {
        match (self, precision) {
            (Self::Double(d), Some(p)) if d.is_finite() => format!("{d:.p$}"),
            _ => self.to_string(),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => Ok(()),
            Self::Boolean(b) => write!(f, "{b}"),
            Self::Integer(i) => write!(f, "{i}"),
            Self::Double(d) => write!(f, "{d}"),
            Self::Text(s) => f.write_str(s),
            Self::DateTime(dt) => write!(f, "{dt}"),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        Self::Double(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<DateTime> for FieldValue {
    fn from(value: DateTime) -> Self {
        Self::DateTime(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_types() {
        let int_val = FieldValue::Integer(42);
        assert_eq!(int_val.field_type(), Some(FieldType::Integer));
        assert_eq!(int_val.as_f64(), Some(42.0));

        let text = FieldValue::from("hello");
        assert_eq!(text.as_text(), Some("hello"));
        assert_eq!(FieldValue::Null.field_type(), None);
        assert_eq!(FieldValue::Null.to_string(), "");
    }

    #[test]
    fn conversions() {
        assert_eq!(
            FieldValue::from(" 12 ").convert_to(FieldType::Integer).unwrap(),
            FieldValue::Integer(12)
        );
        assert_eq!(
            FieldValue::Integer(3).convert_to(FieldType::Double).unwrap(),
            FieldValue::Double(3.0)
        );
        assert_eq!(
            FieldValue::Double(4.0).convert_to(FieldType::Integer).unwrap(),
            FieldValue::Integer(4)
        );
        assert!(FieldValue::Double(4.5).convert_to(FieldType::Integer).is_err());
        assert_eq!(
            FieldValue::from("TRUE").convert_to(FieldType::Boolean).unwrap(),
            FieldValue::Boolean(true)
        );
        assert_eq!(
            FieldValue::Integer(1999).convert_to(FieldType::DateTime).unwrap().to_string(),
            "1999"
        );
        assert!(FieldValue::from("abc").convert_to(FieldType::Double).is_err());
        assert_eq!(FieldValue::Null.convert_to(FieldType::Double).unwrap(), FieldValue::Null);
    }

    #[test]
    fn precision_formatting() {
        assert_eq!(FieldValue::Double(1.23456).format(Some(2)), "1.23");
        assert_eq!(FieldValue::Double(2.0).format(None), "2");
        assert_eq!(FieldValue::Integer(7).format(Some(2)), "7");
    }
}
