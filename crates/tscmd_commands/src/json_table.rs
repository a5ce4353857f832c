//! JSON array to table flattening.
//!
//! Each object of the located array becomes one or more rows. Nested objects
//! are flattened into `parent.child` columns. The first embedded array of an
//! object is expanded into rows: its first element shares the object's row
//! and each further element adds a row. The object's scalar values are copied
//! into every row it produced. Other arrays are kept as JSON text.

use std::collections::HashSet;

use glob::Pattern;
use serde_json::{Map, Value};
use tscmd_core::status::DEFAULT_PROBLEM_LIMIT;
use tscmd_core::{DataTable, FieldType, FieldValue, TableField};

use crate::common::matches_any;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum JsonTableError {
    #[error("the top-level JSON value is not an array or an object with a single array member")]
    NoTopLevelArray,
    #[error("no array named \"{0}\" was found")]
    ArrayNotFound(String),
}

/// How to locate and flatten the array
#[derive(Debug, Clone)]
pub struct JsonTableOptions {
    /// Member name of the array to read; the top level is used when unset
    pub array_name: Option<String>,
    /// Read every array named `array_name` instead of only the first
    pub append_arrays: bool,
    pub exclude_names: Vec<Pattern>,
    /// Arrays stored as JSON text rather than expanded
    pub array_columns: Vec<String>,
    /// Forced column types, by column name (case-insensitive)
    pub column_types: Vec<(String, FieldType)>,
    pub object_separator: String,
    /// Maximum number of array elements to read
    pub top: Option<usize>,
}

impl Default for JsonTableOptions {
    fn default() -> Self {
        Self {
            array_name: None,
            append_arrays: false,
            exclude_names: Vec::new(),
            array_columns: Vec::new(),
            column_types: Vec::new(),
            object_separator: ".".to_string(),
            top: None,
        }
    }
}

/// Flattened table plus the data problems met while reading
#[derive(Debug, Clone)]
pub struct JsonTable {
    pub table: DataTable,
    /// The first problems met, at most [`DEFAULT_PROBLEM_LIMIT`]
    pub problems: Vec<String>,
    /// Total number of problems, including ones not kept
    pub problem_count: usize,
}

/// Cells of one output row, in member order
type Row = Vec<(String, Value)>;

/// Read the array selected by `options` from `root` into a table.
pub fn read_json_table(
    root: &Value,
    table_id: &str,
    options: &JsonTableOptions,
) -> Result<JsonTable, JsonTableError> {
    let arrays = locate_arrays(root, options)?;
    let mut builder = TableBuilder::new(table_id, options);
    let elements = arrays.into_iter().flatten();
    let limit = options.top.unwrap_or(usize::MAX);
    for (index, element) in elements.take(limit).enumerate() {
        match element {
            Value::Object(map) => builder.add_object(map),
            other => builder.problem(format!(
                "Array element {} is a {} rather than an object; skipped",
                index + 1,
                token_name(other)
            )),
        }
    }
    tracing::debug!(
        table = table_id,
        rows = builder.table.row_count(),
        columns = builder.table.field_count(),
        "flattened JSON array"
    );
    Ok(JsonTable {
        table: builder.table,
        problems: builder.problems,
        problem_count: builder.problem_count,
    })
}

fn locate_arrays<'v>(root: &'v Value, options: &JsonTableOptions) -> Result<Vec<&'v Vec<Value>>, JsonTableError> {
    let Some(name) = options.array_name.as_deref() else {
        return match root {
            Value::Array(items) => Ok(vec![items]),
            Value::Object(map) => {
                let mut arrays = map.values().filter_map(Value::as_array);
                match (arrays.next(), arrays.next()) {
                    (Some(items), None) => Ok(vec![items]),
                    _ => Err(JsonTableError::NoTopLevelArray),
                }
            }
            _ => Err(JsonTableError::NoTopLevelArray),
        };
    };
    let mut found = Vec::new();
    find_named_arrays(root, name, &mut found);
    if found.is_empty() {
        return Err(JsonTableError::ArrayNotFound(name.to_string()));
    }
    if !options.append_arrays {
        found.truncate(1);
    }
    Ok(found)
}

/// Depth-first, document order
fn find_named_arrays<'v>(value: &'v Value, name: &str, found: &mut Vec<&'v Vec<Value>>) {
    match value {
        Value::Object(map) => {
            for (key, member) in map {
                match member {
                    Value::Array(items) if key == name => found.push(items),
                    _ => find_named_arrays(member, name, found),
                }
            }
        }
        Value::Array(items) => {
            for item in items {
                find_named_arrays(item, name, found);
            }
        }
        _ => {}
    }
}

fn token_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Column type implied by a JSON token; `None` for null
fn inferred_type(value: &Value) -> Option<FieldType> {
    match value {
        Value::Null => None,
        Value::Bool(_) => Some(FieldType::Boolean),
        Value::Number(n) if n.is_i64() => Some(FieldType::Integer),
        Value::Number(_) => Some(FieldType::Double),
        _ => Some(FieldType::Text),
    }
}

fn natural_value(value: &Value) -> FieldValue {
    match value {
        Value::Null => FieldValue::Null,
        Value::Bool(b) => FieldValue::Boolean(*b),
        Value::Number(n) => match n.as_i64() {
            Some(i) => FieldValue::Integer(i),
            None => n.as_f64().map(FieldValue::Double).unwrap_or(FieldValue::Null),
        },
        Value::String(s) => FieldValue::Text(s.clone()),
        other => FieldValue::Text(other.to_string()),
    }
}

struct TableBuilder<'o> {
    options: &'o JsonTableOptions,
    table: DataTable,
    frozen: bool,
    /// Columns created from null values whose type is still open
    untyped: HashSet<usize>,
    problems: Vec<String>,
    problem_count: usize,
}

impl<'o> TableBuilder<'o> {
    fn new(table_id: &str, options: &'o JsonTableOptions) -> Self {
        Self {
            options,
            table: DataTable::new(table_id),
            frozen: false,
            untyped: HashSet::new(),
            problems: Vec::new(),
            problem_count: 0,
        }
    }

    fn problem(&mut self, message: String) {
        self.problem_count += 1;
        if self.problems.len() < DEFAULT_PROBLEM_LIMIT {
            self.problems.push(message);
        }
    }

    fn add_object(&mut self, object: &Map<String, Value>) {
        let mut parent = Row::new();
        let mut expanded: Option<(String, &Vec<Value>)> = None;
        self.collect_members(object, "", &mut parent, &mut expanded);

        let mut rows = Vec::new();
        match expanded {
            Some((name, items)) if !items.is_empty() => {
                for item in items {
                    let mut row = parent.clone();
                    self.collect_element(&name, item, &mut row);
                    rows.push(row);
                }
            }
            _ => rows.push(parent),
        }

        let columns_before = self.table.field_count();
        for row in rows {
            self.add_row(row);
        }
        if self.table.field_count() > columns_before {
            self.frozen = true;
        }
    }

    fn column_name(&self, prefix: &str, key: &str) -> String {
        if prefix.is_empty() {
            key.to_string()
        } else {
            format!("{prefix}{}{key}", self.options.object_separator)
        }
    }

    fn is_excluded(&self, key: &str, name: &str) -> bool {
        matches_any(&self.options.exclude_names, name) || matches_any(&self.options.exclude_names, key)
    }

    fn is_array_column(&self, name: &str) -> bool {
        self.options
            .array_columns
            .iter()
            .any(|c| c.eq_ignore_ascii_case(name))
    }

    /// Collect scalar members of `object`; the first expandable array is
    /// handed back through `expanded`.
    fn collect_members<'v>(
        &self,
        object: &'v Map<String, Value>,
        prefix: &str,
        row: &mut Row,
        expanded: &mut Option<(String, &'v Vec<Value>)>,
    ) {
        for (key, value) in object {
            let name = self.column_name(prefix, key);
            if self.is_excluded(key, &name) {
                continue;
            }
            match value {
                Value::Object(inner) => self.collect_members(inner, &name, row, expanded),
                Value::Array(items) => {
                    if expanded.is_none() && !self.is_array_column(&name) {
                        *expanded = Some((name, items));
                    } else {
                        row.push((name, Value::String(value.to_string())));
                    }
                }
                scalar => row.push((name, scalar.clone())),
            }
        }
    }

    /// Cells contributed by one element of the expanded array
    fn collect_element(&self, array_name: &str, item: &Value, row: &mut Row) {
        match item {
            Value::Object(inner) => {
                let mut nested = None;
                self.collect_members(inner, "", row, &mut nested);
                if let Some((name, items)) = nested {
                    row.push((name, Value::String(Value::Array(items.clone()).to_string())));
                }
            }
            Value::Array(_) => row.push((array_name.to_string(), Value::String(item.to_string()))),
            scalar => row.push((array_name.to_string(), scalar.clone())),
        }
    }

    fn add_row(&mut self, row: Row) {
        let index = self.table.push_empty_record();
        for (name, value) in row {
            let Some(column) = self.column_for(&name, &value) else {
                continue;
            };
            let cell = self.convert(column, &name, &value);
            // row and column both exist at this point
            let _ = self.table.set_value(index, column, cell);
        }
    }

    fn forced_type(&self, name: &str) -> Option<FieldType> {
        self.options
            .column_types
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, t)| *t)
    }

    /// Existing column for `name`, creating it while the column set is open
    fn column_for(&mut self, name: &str, value: &Value) -> Option<usize> {
        if let Some(column) = self.table.field_index(name) {
            if self.untyped.contains(&column) {
                if let Some(field_type) = inferred_type(value) {
                    self.untyped.remove(&column);
                    let _ = self.table.change_field_type(column, field_type);
                }
            }
            return Some(column);
        }
        if self.frozen {
            self.problem(format!(
                "Column \"{name}\" was not in the first object; value ignored"
            ));
            return None;
        }
        let forced = self.forced_type(name);
        let field_type = forced.or_else(|| inferred_type(value)).unwrap_or(FieldType::Text);
        let column = self.table.add_field(TableField::new(name, field_type)).ok()?;
        if forced.is_none() && value.is_null() {
            self.untyped.insert(column);
        }
        Some(column)
    }

    fn convert(&mut self, column: usize, name: &str, value: &Value) -> FieldValue {
        let natural = natural_value(value);
        let Some(field_type) = self.table.field(column).map(|f| f.field_type) else {
            return FieldValue::Null;
        };
        if field_type == FieldType::Integer
            && matches!(natural, FieldValue::Double(_))
            && self.forced_type(name).is_none()
        {
            tracing::debug!(column = name, "widening integer column to double");
            let _ = self.table.change_field_type(column, FieldType::Double);
            return natural;
        }
        match natural.convert_to(field_type) {
            Ok(v) => v,
            Err(e) => {
                self.problem(format!(
                    "Row {} column \"{name}\": {e}; value set to null",
                    self.table.row_count()
                ));
                FieldValue::Null
            }
        }
    }
}
