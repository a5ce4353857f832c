//! Command parameter lists and processor property values.

use std::collections::HashMap;
use std::fmt;

use crate::datetime::DateTime;

/// Ordered, string-keyed parameter list. Keys are case-sensitive.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PropList {
    entries: Vec<(String, String)>,
}

impl PropList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set or replace a value, keeping the original position on replace
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    /// Builder-style [`PropList::set`]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }

    /// Value for `key`; blank values count as not set.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.get_raw(key).filter(|v| !v.trim().is_empty())
    }

    /// Value for `key` exactly as given, including blanks
    pub fn get_raw(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Comma-separated list, items trimmed, empty items dropped
    pub fn get_list(&self, key: &str) -> Vec<String> {
        self.get(key).map(split_list).unwrap_or_default()
    }

    /// `None` when unset; `Some(Err(raw))` when the value does not parse
    pub fn get_bool(&self, key: &str) -> Option<Result<bool, &str>> {
        let value = self.get(key)?;
        Some(parse_bool(value).ok_or(value))
    }

    pub fn get_i64(&self, key: &str) -> Option<Result<i64, &str>> {
        let value = self.get(key)?;
        Some(value.trim().parse().map_err(|_| value))
    }

    pub fn get_f64(&self, key: &str) -> Option<Result<f64, &str>> {
        let value = self.get(key)?;
        Some(
            value
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|n| n.is_finite())
                .ok_or(value),
        )
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for PropList {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut props = PropList::new();
        for (k, v) in iter {
            props.set(k, v);
        }
        props
    }
}

/// Split `a, b,,c` into `["a", "b", "c"]`
pub fn split_list(text: &str) -> Vec<String> {
    text.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// `True`/`False` in any case
pub fn parse_bool(text: &str) -> Option<bool> {
    match text.trim().to_ascii_lowercase().as_str() {
        "true" => Some(true),
        "false" => Some(false),
        _ => None,
    }
}

/// Processor property value
#[derive(Debug, Clone, PartialEq)]
pub enum PropValue {
    Text(String),
    Integer(i64),
    Double(f64),
    Boolean(bool),
    DateTime(DateTime),
}

impl PropValue {
    pub fn as_datetime(&self) -> Option<&DateTime> {
        match self {
            Self::DateTime(dt) => Some(dt),
            _ => None,
        }
    }
}

impl fmt::Display for PropValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) => f.write_str(s),
            Self::Integer(i) => write!(f, "{i}"),
            Self::Double(d) => write!(f, "{d}"),
            Self::Boolean(b) => write!(f, "{b}"),
            Self::DateTime(dt) => write!(f, "{dt}"),
        }
    }
}

/// Replace `${Name}` with property values. Unknown names are left verbatim.
pub fn expand_properties(text: &str, properties: &HashMap<String, PropValue>) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find('}') {
            Some(end) => {
                let name = &after[..end];
                match properties.get(name) {
                    Some(value) => out.push_str(&value.to_string()),
                    None => {
                        out.push_str("${");
                        out.push_str(name);
                        out.push('}');
                    }
                }
                rest = &after[end + 1..];
            }
            None => {
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}
