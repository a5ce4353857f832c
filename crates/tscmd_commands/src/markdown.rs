//! Markdown table rendering

use tscmd_core::DataTable;

#[derive(Debug, Clone)]
pub struct MarkdownOptions {
    /// Columns to write, in order
    pub columns: Vec<usize>,
    /// Columns whose values are URLs rendered as links
    pub link_columns: Vec<usize>,
    /// Link text; the URL itself when unset
    pub link_text: Option<String>,
    /// Replaces newlines inside cells
    pub newline_replacement: String,
}

impl MarkdownOptions {
    /// All columns of `table`, no links
    pub fn all_columns(table: &DataTable) -> Self {
        Self {
            columns: (0..table.field_count()).collect(),
            link_columns: Vec::new(),
            link_text: None,
            newline_replacement: "<br>".to_string(),
        }
    }
}

/// Escape a cell so it cannot break the table row
pub fn escape_cell(text: &str, newline_replacement: &str) -> String {
    text.replace("\r\n", "\n")
        .replace('|', "\\|")
        .replace('\n', newline_replacement)
}

/// Render the selected columns of `table` as a Markdown table, one line per
/// row including the header and alignment rows.
pub fn table_to_markdown(table: &DataTable, options: &MarkdownOptions) -> String {
    let mut lines = Vec::with_capacity(table.row_count() + 2);
    let fields = table.fields();

    let header: Vec<String> = options
        .columns
        .iter()
        .map(|&c| escape_cell(&fields[c].name, &options.newline_replacement))
        .collect();
    lines.push(format!("| {} |", header.join(" | ")));

    let align: Vec<&str> = options
        .columns
        .iter()
        .map(|&c| if fields[c].field_type.is_numeric() { "---:" } else { "---" })
        .collect();
    lines.push(format!("| {} |", align.join(" | ")));

    for row in 0..table.row_count() {
        let cells: Vec<String> = options
            .columns
            .iter()
            .map(|&c| {
                let text = table.format_value(row, c).unwrap_or_default();
                if options.link_columns.contains(&c) && !text.trim().is_empty() {
                    let label = options.link_text.as_deref().unwrap_or(&text);
                    format!(
                        "[{}]({})",
                        escape_cell(label, &options.newline_replacement),
                        escape_cell(text.trim(), &options.newline_replacement)
                    )
                } else {
                    escape_cell(&text, &options.newline_replacement)
                }
            })
            .collect();
        lines.push(format!("| {} |", cells.join(" | ")));
    }
    let mut out = lines.join("\n");
    out.push('\n');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use tscmd_core::{FieldType, FieldValue, TableField};

    fn sample() -> DataTable {
        let mut t = DataTable::new("Sites");
        t.add_field(TableField::new("name", FieldType::Text)).unwrap();
        t.add_field(TableField::new("flow", FieldType::Double).with_precision(2))
            .unwrap();
        t.add_field(TableField::new("url", FieldType::Text)).unwrap();
        t.add_record(vec!["North | Fork".into(), 1.5.into(), "https://x.org/a".into()])
            .unwrap();
        t.add_record(vec!["two\nlines".into(), FieldValue::Null, FieldValue::Null])
            .unwrap();
        t
    }

    #[test]
    fn renders_header_alignment_and_rows() {
        let t = sample();
        let md = table_to_markdown(&t, &MarkdownOptions::all_columns(&t));
        let expected = "\
| name | flow | url |
| --- | ---: | --- |
| North \\| Fork | 1.50 | https://x.org/a |
| two<br>lines |  |  |
";
        assert_eq!(md, expected);
    }

    #[test]
    fn link_columns() {
        let t = sample();
        let options = MarkdownOptions {
            columns: vec![0, 2],
            link_columns: vec![2],
            link_text: Some("site".to_string()),
            newline_replacement: " ".to_string(),
        };
        let md = table_to_markdown(&t, &options);
        let lines: Vec<&str> = md.lines().collect();
        assert_eq!(lines[2], "| North \\| Fork | [site](https://x.org/a) |");
        assert_eq!(lines[3], "| two lines |  |");
    }

    #[test]
    fn link_urls_are_escaped() {
        let mut t = DataTable::new("Links");
        t.add_field(TableField::new("url", FieldType::Text)).unwrap();
        t.add_record(vec!["https://x.org/q?a|b".into()]).unwrap();
        let options = MarkdownOptions {
            link_columns: vec![0],
            link_text: Some("site".to_string()),
            ..MarkdownOptions::all_columns(&t)
        };
        let md = table_to_markdown(&t, &options);
        assert_eq!(md.lines().nth(2), Some("| [site](https://x.org/q?a\\|b) |"));
    }
}
