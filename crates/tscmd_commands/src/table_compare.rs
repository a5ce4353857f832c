//! Cell-by-cell table comparison.
//!
//! Columns are paired by name lists, rows by position or by key columns.
//! The result is a text table in which differing cells read `v1 != v2`,
//! an optional numeric difference table, and an HTML rendering.

use std::collections::{HashMap, VecDeque};
use std::fmt::Write as _;

use tscmd_core::{DataTable, FieldType, FieldValue, TableError, TableField};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CompareError {
    #[error("{left} columns were selected in the first table but {right} in the second")]
    ColumnCountMismatch { left: usize, right: usize },
    #[error("no columns were selected for comparison")]
    NoColumns,
    #[error("column \"{0}\" is selected more than once")]
    DuplicateColumn(String),
    #[error("table \"{table}\": {source}")]
    Column {
        table: String,
        #[source]
        source: TableError,
    },
    #[error("unable to build comparison table: {0}")]
    Output(#[source] TableError),
}

#[derive(Debug, Clone, Default)]
pub struct CompareOptions {
    /// Digits numeric values are rounded to before comparing
    pub precision: Option<usize>,
    /// Largest absolute numeric difference treated as equal
    pub tolerance: f64,
    pub case_insensitive: bool,
    /// Key columns used to pair rows; positional pairing when empty
    pub match_columns: Vec<String>,
}

/// Row indices of a compared row pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowPair {
    pub row1: Option<usize>,
    pub row2: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct TableComparison {
    /// Text table of compared values
    pub table: DataTable,
    /// Numeric differences (`value2 - value1`) where both columns are numeric
    pub diff_table: DataTable,
    /// `true` for each differing cell of `table`
    pub diff_flags: Vec<Vec<bool>>,
    pub difference_count: usize,
    pub rows: Vec<RowPair>,
    pub table1_id: String,
    pub table2_id: String,
}

impl TableComparison {
    pub fn is_different(&self, row: usize, column: usize) -> bool {
        self.diff_flags
            .get(row)
            .and_then(|r| r.get(column))
            .copied()
            .unwrap_or(false)
    }

    /// HTML page with differing cells marked by the `diff` class
    pub fn to_html(&self) -> String {
        let mut html = String::new();
        let title = format!(
            "Comparison of tables \"{}\" and \"{}\"",
            self.table1_id, self.table2_id
        );
        let _ = writeln!(html, "<!DOCTYPE html>");
        let _ = writeln!(html, "<html>\n<head>\n<meta charset=\"utf-8\">");
        let _ = writeln!(html, "<title>{}</title>", escape_html(&title));
        let _ = writeln!(
            html,
            "<style>\ntable {{ border-collapse: collapse; }}\n\
             th, td {{ border: 1px solid #999999; padding: 2px 6px; }}\n\
             td.diff {{ background-color: #ffcccc; }}\n</style>"
        );
        let _ = writeln!(html, "</head>\n<body>");
        let _ = writeln!(html, "<h1>{}</h1>", escape_html(&title));
        let _ = writeln!(html, "<p>Number of differences: {}</p>", self.difference_count);
        let _ = writeln!(html, "<table>");
        html.push_str("<tr>");
        for name in self.table.field_names() {
            let _ = write!(html, "<th>{}</th>", escape_html(name));
        }
        html.push_str("</tr>\n");
        for (row, record) in self.table.records().iter().enumerate() {
            html.push_str("<tr>");
            for (column, value) in record.iter().enumerate() {
                let class = if self.is_different(row, column) { " class=\"diff\"" } else { "" };
                let _ = write!(html, "<td{class}>{}</td>", escape_html(&value.to_string()));
            }
            html.push_str("</tr>\n");
        }
        let _ = writeln!(html, "</table>\n</body>\n</html>");
        html
    }
}

pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

/// Compares selected columns of two tables
pub struct TableComparer<'t> {
    table1: &'t DataTable,
    table2: &'t DataTable,
    columns1: Vec<usize>,
    columns2: Vec<usize>,
    options: CompareOptions,
}

impl<'t> TableComparer<'t> {
    /// Pair `columns1` with `columns2` by position. An empty `columns2`
    /// means the same names as `columns1`.
    pub fn new(
        table1: &'t DataTable,
        table2: &'t DataTable,
        columns1: &[String],
        columns2: &[String],
        options: CompareOptions,
    ) -> Result<Self, CompareError> {
        let names2: &[String] = if columns2.is_empty() { columns1 } else { columns2 };
        if columns1.len() != names2.len() {
            return Err(CompareError::ColumnCountMismatch {
                left: columns1.len(),
                right: names2.len(),
            });
        }
        if columns1.is_empty() {
            return Err(CompareError::NoColumns);
        }
        let columns1 = resolve_columns(table1, columns1)?;
        if let Some((_, &c)) = columns1
            .iter()
            .enumerate()
            .find(|(i, c)| columns1[..*i].contains(c))
        {
            return Err(CompareError::DuplicateColumn(table1.fields()[c].name.clone()));
        }
        let columns2 = resolve_columns(table2, names2)?;
        resolve_columns(table1, &options.match_columns)?;
        resolve_columns(table2, &options.match_columns)?;
        Ok(Self {
            table1,
            table2,
            columns1,
            columns2,
            options,
        })
    }

    pub fn compare(&self, new_table_id: &str, diff_table_id: &str) -> Result<TableComparison, CompareError> {
        let rows = self.pair_rows();
        let mut table = DataTable::new(new_table_id);
        let mut diff_table = DataTable::new(diff_table_id);
        for (&c1, &c2) in self.columns1.iter().zip(&self.columns2) {
            let name = self.column_label(c1, c2);
            let numeric = self.is_numeric_pair(c1, c2);
            table
                .add_field(TableField::new(&name, FieldType::Text))
                .map_err(CompareError::Output)?;
            let diff_type = if numeric { FieldType::Double } else { FieldType::Text };
            diff_table
                .add_field(TableField::new(&name, diff_type))
                .map_err(CompareError::Output)?;
        }

        let mut diff_flags = Vec::with_capacity(rows.len());
        let mut difference_count = 0;
        for pair in &rows {
            let mut texts = Vec::with_capacity(self.columns1.len());
            let mut diffs = Vec::with_capacity(self.columns1.len());
            let mut flags = Vec::with_capacity(self.columns1.len());
            for (&c1, &c2) in self.columns1.iter().zip(&self.columns2) {
                let v1 = cell(self.table1, pair.row1, c1);
                let v2 = cell(self.table2, pair.row2, c2);
                let t1 = self.format(self.table1, v1, c1);
                let t2 = self.format(self.table2, v2, c2);
                let equal = self.values_equal(v1, v2, &t1, &t2);
                if !equal {
                    difference_count += 1;
                }
                let text = if equal { t1 } else { format!("{t1} != {t2}") };
                let diff = if self.is_numeric_pair(c1, c2) {
                    match (v1.as_f64(), v2.as_f64()) {
                        (Some(a), Some(b)) => FieldValue::Double(b - a),
                        _ => FieldValue::Null,
                    }
                } else {
                    FieldValue::Text(text.clone())
                };
                texts.push(FieldValue::Text(text));
                diffs.push(diff);
                flags.push(!equal);
            }
            table.add_record(texts).map_err(CompareError::Output)?;
            diff_table.add_record(diffs).map_err(CompareError::Output)?;
            diff_flags.push(flags);
        }

        tracing::debug!(
            table1 = self.table1.id(),
            table2 = self.table2.id(),
            rows = rows.len(),
            differences = difference_count,
            "compared tables"
        );
        Ok(TableComparison {
            table,
            diff_table,
            diff_flags,
            difference_count,
            rows,
            table1_id: self.table1.id().to_string(),
            table2_id: self.table2.id().to_string(),
        })
    }

    fn column_label(&self, c1: usize, c2: usize) -> String {
        let n1 = self.table1.fields()[c1].name.as_str();
        let n2 = self.table2.fields()[c2].name.as_str();
        if n1 == n2 {
            n1.to_string()
        } else {
            format!("{n1} / {n2}")
        }
    }

    fn is_numeric_pair(&self, c1: usize, c2: usize) -> bool {
        self.table1.fields()[c1].field_type.is_numeric()
            && self.table2.fields()[c2].field_type.is_numeric()
    }

    fn format(&self, table: &DataTable, value: &FieldValue, column: usize) -> String {
        let precision = match value {
            FieldValue::Double(_) => self.options.precision.or(table.fields()[column].precision),
            _ => None,
        };
        value.format(precision)
    }

    fn values_equal(&self, v1: &FieldValue, v2: &FieldValue, t1: &str, t2: &str) -> bool {
        match (v1, v2) {
            (FieldValue::Null, FieldValue::Null) => true,
            (FieldValue::Null, _) | (_, FieldValue::Null) => false,
            (a, b) if a.is_numeric() && b.is_numeric() => {
                let (Some(x), Some(y)) = (a.as_f64(), b.as_f64()) else {
                    return false;
                };
                let (x, y) = match self.options.precision {
                    Some(p) => (round_to(x, p), round_to(y, p)),
                    None => (x, y),
                };
                if x.is_nan() || y.is_nan() {
                    return x.is_nan() && y.is_nan();
                }
                // relative slack for binary rounding only
                let slack = f64::EPSILON * x.abs().max(y.abs());
                (x - y).abs() <= self.options.tolerance + slack
            }
            (FieldValue::DateTime(a), FieldValue::DateTime(b)) => a == b,
            _ if self.options.case_insensitive => t1.to_lowercase() == t2.to_lowercase(),
            _ => t1 == t2,
        }
    }

    fn row_key(&self, table: &DataTable, row: usize) -> String {
        let key = self
            .options
            .match_columns
            .iter()
            .filter_map(|name| table.require_field(name).ok())
            .map(|c| table.format_value(row, c).unwrap_or_default())
            .collect::<Vec<_>>()
            .join("\u{1f}");
        if self.options.case_insensitive {
            key.to_lowercase()
        } else {
            key
        }
    }

    fn pair_rows(&self) -> Vec<RowPair> {
        let (n1, n2) = (self.table1.row_count(), self.table2.row_count());
        if self.options.match_columns.is_empty() {
            return (0..n1.max(n2))
                .map(|i| RowPair {
                    row1: (i < n1).then_some(i),
                    row2: (i < n2).then_some(i),
                })
                .collect();
        }
        let mut rows_by_key: HashMap<String, VecDeque<usize>> = HashMap::new();
        for r in 0..n2 {
            rows_by_key.entry(self.row_key(self.table2, r)).or_default().push_back(r);
        }
        let mut used = vec![false; n2];
        let mut pairs = Vec::with_capacity(n1.max(n2));
        for row1 in 0..n1 {
            let key = self.row_key(self.table1, row1);
            let row2 = rows_by_key.get_mut(&key).and_then(VecDeque::pop_front);
            if let Some(r) = row2 {
                used[r] = true;
            }
            pairs.push(RowPair { row1: Some(row1), row2 });
        }
        pairs.extend(
            (0..n2)
                .filter(|&r| !used[r])
                .map(|r| RowPair { row1: None, row2: Some(r) }),
        );
        pairs
    }
}

fn resolve_columns(table: &DataTable, names: &[String]) -> Result<Vec<usize>, CompareError> {
    names
        .iter()
        .map(|name| {
            table.require_field(name).map_err(|source| CompareError::Column {
                table: table.id().to_string(),
                source,
            })
        })
        .collect()
}

static NULL: FieldValue = FieldValue::Null;

/// Value at `row`, or null when the row is absent
fn cell(table: &DataTable, row: Option<usize>, column: usize) -> &FieldValue {
    row.and_then(|r| table.value(r, column).ok()).unwrap_or(&NULL)
}

fn round_to(value: f64, digits: usize) -> f64 {
    let factor = 10f64.powi(i32::try_from(digits).unwrap_or(i32::MAX));
    if !factor.is_finite() {
        return value;
    }
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(id: &str, names: &[(&str, FieldType)], rows: Vec<Vec<FieldValue>>) -> DataTable {
        let mut t = DataTable::new(id);
        for (name, ty) in names {
            t.add_field(TableField::new(*name, *ty)).unwrap();
        }
        for row in rows {
            t.add_record(row).unwrap();
        }
        t
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn stations(id: &str, flows: &[f64]) -> DataTable {
        table(
            id,
            &[("id", FieldType::Text), ("flow", FieldType::Double)],
            flows
                .iter()
                .enumerate()
                .map(|(i, f)| vec![format!("S{i}").into(), (*f).into()])
                .collect(),
        )
    }

    #[test]
    fn positional_comparison_marks_differences() {
        let t1 = stations("A", &[1.0, 2.0, 3.0]);
        let t2 = stations("B", &[1.0, 2.5]);
        let cols = names(&["id", "flow"]);
        let cmp = TableComparer::new(&t1, &t2, &cols, &[], CompareOptions::default())
            .unwrap()
            .compare("cmp", "diff")
            .unwrap();
        assert_eq!(cmp.table.row_count(), 3);
        assert_eq!(cmp.table.value(1, 1).unwrap(), &FieldValue::Text("2 != 2.5".into()));
        assert_eq!(cmp.table.value(2, 0).unwrap(), &FieldValue::Text("S2 != ".into()));
        // row 1 flow, row 2 id and flow
        assert_eq!(cmp.difference_count, 3);
        assert!(cmp.is_different(1, 1));
        assert!(!cmp.is_different(0, 0));
        assert_eq!(cmp.diff_table.value(1, 1).unwrap(), &FieldValue::Double(0.5));
        assert_eq!(cmp.diff_table.value(2, 1).unwrap(), &FieldValue::Null);
    }

    #[test]
    fn precision_and_tolerance() {
        let t1 = stations("A", &[1.004, 10.0]);
        let t2 = stations("B", &[1.0, 10.1]);
        let cols = names(&["flow"]);
        let rounded = CompareOptions {
            precision: Some(2),
            ..Default::default()
        };
        let cmp = TableComparer::new(&t1, &t2, &cols, &[], rounded.clone()).unwrap().compare("c", "d").unwrap();
        assert_eq!(cmp.difference_count, 1);
        let tolerant = CompareOptions {
            tolerance: 0.1,
            ..rounded
        };
        let cmp = TableComparer::new(&t1, &t2, &cols, &[], tolerant).unwrap().compare("c", "d").unwrap();
        assert_eq!(cmp.difference_count, 0);
    }

    #[test]
    fn match_columns_pair_rows_by_key() {
        let t1 = table(
            "A",
            &[("id", FieldType::Text), ("v", FieldType::Integer)],
            vec![vec!["x".into(), 1i64.into()], vec!["y".into(), 2i64.into()]],
        );
        let t2 = table(
            "B",
            &[("ID", FieldType::Text), ("value", FieldType::Integer)],
            vec![
                vec!["Z".into(), 9i64.into()],
                vec!["Y".into(), 2i64.into()],
                vec!["X".into(), 1i64.into()],
            ],
        );
        let options = CompareOptions {
            case_insensitive: true,
            match_columns: names(&["id"]),
            ..Default::default()
        };
        let cmp = TableComparer::new(&t1, &t2, &names(&["id", "v"]), &names(&["ID", "value"]), options)
            .unwrap()
            .compare("c", "d")
            .unwrap();
        assert_eq!(cmp.table.field_names(), vec!["id / ID", "v / value"]);
        assert_eq!(cmp.rows[0], RowPair { row1: Some(0), row2: Some(2) });
        assert_eq!(cmp.rows[2], RowPair { row1: None, row2: Some(0) });
        // only the unmatched Z row differs
        assert_eq!(cmp.difference_count, 2);
    }

    #[test]
    fn column_errors() {
        let t1 = stations("A", &[1.0]);
        let t2 = stations("B", &[1.0]);
        assert!(matches!(
            TableComparer::new(&t1, &t2, &names(&["id", "flow"]), &names(&["id"]), CompareOptions::default()),
            Err(CompareError::ColumnCountMismatch { left: 2, right: 1 })
        ));
        assert!(matches!(
            TableComparer::new(&t1, &t2, &names(&["nope"]), &[], CompareOptions::default()),
            Err(CompareError::Column { .. })
        ));
    }

    #[test]
    fn html_highlights_differences() {
        let t1 = stations("A&1", &[1.0]);
        let t2 = stations("B", &[2.0]);
        let cmp = TableComparer::new(&t1, &t2, &names(&["id", "flow"]), &[], CompareOptions::default())
            .unwrap()
            .compare("c", "d")
            .unwrap();
        let html = cmp.to_html();
        assert!(html.contains("A&amp;1"));
        assert!(html.contains("<td class=\"diff\">1 != 2</td>"));
        assert!(html.contains("<td>S0</td>"));
        assert!(html.contains("Number of differences: 1"));
    }

    #[test]
    fn tiny_values_differ_without_tolerance() {
        let t1 = stations("A", &[1e-13]);
        let t2 = stations("B", &[5e-13]);
        let cols = names(&["flow"]);
        let cmp = TableComparer::new(&t1, &t2, &cols, &[], CompareOptions::default())
            .unwrap()
            .compare("c", "d")
            .unwrap();
        assert_eq!(cmp.difference_count, 1);
        assert!(cmp.is_different(0, 0));

        let same = stations("C", &[0.1 + 0.2]);
        let other = stations("D", &[0.3]);
        let cmp = TableComparer::new(&same, &other, &cols, &[], CompareOptions::default())
            .unwrap()
            .compare("c", "d")
            .unwrap();
        assert_eq!(cmp.difference_count, 0);
    }

    #[test]
    fn colliding_column_labels_are_an_error() {
        let t1 = table(
            "A",
            &[("a / b", FieldType::Text), ("a", FieldType::Text)],
            vec![vec!["x".into(), "y".into()]],
        );
        let t2 = table(
            "B",
            &[("a / b", FieldType::Text), ("b", FieldType::Text)],
            vec![vec!["x".into(), "y".into()]],
        );
        let comparer = TableComparer::new(
            &t1,
            &t2,
            &names(&["a / b", "a"]),
            &names(&["a / b", "b"]),
            CompareOptions::default(),
        )
        .unwrap();
        assert!(matches!(
            comparer.compare("c", "d"),
            Err(CompareError::Output(TableError::DuplicateField(_)))
        ));
    }

    #[test]
    fn repeated_keys_pair_in_order() {
        let rows = |values: &[(&str, i64)]| {
            values
                .iter()
                .map(|(k, v)| vec![FieldValue::from(*k), (*v).into()])
                .collect::<Vec<_>>()
        };
        let fields = [("id", FieldType::Text), ("v", FieldType::Integer)];
        let t1 = table("A", &fields, rows(&[("k", 1), ("k", 2), ("m", 3)]));
        let t2 = table("B", &fields, rows(&[("m", 3), ("k", 1), ("k", 2), ("k", 4)]));
        let options = CompareOptions {
            match_columns: names(&["id"]),
            ..Default::default()
        };
        let cmp = TableComparer::new(&t1, &t2, &names(&["id", "v"]), &[], options)
            .unwrap()
            .compare("c", "d")
            .unwrap();
        let pairs: Vec<(Option<usize>, Option<usize>)> = cmp.rows.iter().map(|p| (p.row1, p.row2)).collect();
        assert_eq!(
            pairs,
            vec![(Some(0), Some(1)), (Some(1), Some(2)), (Some(2), Some(0)), (None, Some(3))]
        );
        assert_eq!(cmp.difference_count, 2);
    }
}
