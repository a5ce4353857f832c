//! Helpers shared by the command implementations

use std::path::Path;

use glob::{MatchOptions, Pattern};
use tscmd_core::{
    CommandError, CommandPhase, CommandStatus, DataTable, ParameterCheck, PropList, Severity,
};

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: false,
    require_literal_separator: false,
    require_literal_leading_dot: false,
};

/// Log a failure in `phase` and build the error returned to the host.
pub(crate) fn fail(
    status: &mut CommandStatus,
    command: &str,
    phase: CommandPhase,
    message: impl Into<String>,
    recommendation: impl Into<String>,
) -> CommandError {
    let message = message.into();
    status.log(phase, Severity::Failure, message.clone(), recommendation);
    CommandError::failure(command, message)
}

/// Compile a comma-separated list of glob patterns, reporting bad patterns.
pub(crate) fn glob_list(check: &mut ParameterCheck<'_>, props: &PropList, key: &str) -> Vec<Pattern> {
    let mut patterns = Vec::new();
    for text in props.get_list(key) {
        match Pattern::new(&text) {
            Ok(p) => patterns.push(p),
            Err(e) => check.problem(
                format!("The {key} pattern \"{text}\" is invalid: {e}"),
                format!("Correct the {key} parameter."),
            ),
        }
    }
    patterns
}

/// Case-insensitive glob match against any of `patterns`
pub fn matches_any(patterns: &[Pattern], name: &str) -> bool {
    patterns.iter().any(|p| p.matches_with(name, MATCH_OPTIONS))
}

/// Column indices kept by include/exclude patterns. An empty include list
/// keeps every column.
pub fn select_columns(table: &DataTable, include: &[Pattern], exclude: &[Pattern]) -> Vec<usize> {
    table
        .fields()
        .iter()
        .enumerate()
        .filter(|(_, f)| include.is_empty() || matches_any(include, &f.name))
        .filter(|(_, f)| !matches_any(exclude, &f.name))
        .map(|(i, _)| i)
        .collect()
}

/// Replace literal `\n` sequences typed in a parameter with newlines
pub(crate) fn unescape_newlines(text: &str) -> String {
    text.replace("\\n", "\n")
}

/// True when the parent directory of `path` exists (or there is none)
pub(crate) fn parent_exists(path: &Path) -> bool {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.is_dir(),
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tscmd_core::{FieldType, TableField};

    #[test]
    fn column_selection_uses_globs() {
        let mut table = DataTable::new("T");
        for name in ["StationId", "Flow_Day", "Flow_Month", "Notes"] {
            table.add_field(TableField::new(name, FieldType::Text)).unwrap();
        }
        let include = vec![Pattern::new("flow*").unwrap(), Pattern::new("StationId").unwrap()];
        let exclude = vec![Pattern::new("*month").unwrap()];
        assert_eq!(select_columns(&table, &include, &exclude), vec![0, 1]);
        assert_eq!(select_columns(&table, &[], &exclude), vec![0, 1, 3]);
    }

    #[test]
    fn bad_patterns_become_problems() {
        let props = PropList::new().with("ExcludeNames", "ok*, [broken");
        let mut check = ParameterCheck::new(&props);
        let patterns = glob_list(&mut check, &props, "ExcludeNames");
        assert_eq!(patterns.len(), 1);
        assert!(check.has_problems());
    }

    #[test]
    fn newline_sequences() {
        assert_eq!(unescape_newlines("# Title\\n\\nText"), "# Title\n\nText");
        assert!(parent_exists(Path::new("file.md")));
        assert!(!parent_exists(Path::new("/definitely/not/here/file.md")));
    }
}
