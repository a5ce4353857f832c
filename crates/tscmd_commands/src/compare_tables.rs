//! CompareTables: compare two tables and report differing cells.

use std::fs;
use std::path::Path;

use glob::Pattern;
use tscmd_core::{
    finish_phase, Command, CommandError, CommandPhase, CommandProcessor, CommandResult,
    CommandStatus, DataTable, DiscoveryObject, ParameterCheck, PropList, PropValue, Severity,
};

use crate::common::{fail, glob_list, matches_any, parent_exists};
use crate::table_compare::{CompareOptions, TableComparer};

const NAME: &str = "CompareTables";

const PARAMETERS: &[&str] = &[
    "Table1ID",
    "Table2ID",
    "CompareColumns1",
    "ExcludeColumns1",
    "CompareColumns2",
    "MatchColumns",
    "Precision",
    "Tolerance",
    "AllowedDiff",
    "NewTableID",
    "DiffTableID",
    "OutputFile",
    "DiffCountProperty",
    "IfDifferent",
    "IfSame",
    "CaseSensitive",
];

const ACTIONS: &[&str] = &["Ignore", "Warn", "Fail"];

/// What to do when the comparison outcome is met
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum Action {
    #[default]
    Ignore,
    Warn,
    Fail,
}

impl Action {
    fn from_choice(choice: Option<&str>) -> Self {
        match choice {
            Some("Warn") => Self::Warn,
            Some("Fail") => Self::Fail,
            _ => Self::Ignore,
        }
    }

    fn severity(self) -> Option<Severity> {
        match self {
            Self::Ignore => None,
            Self::Warn => Some(Severity::Warning),
            Self::Fail => Some(Severity::Failure),
        }
    }
}

#[derive(Debug, Clone)]
struct Params {
    table1_id: String,
    table2_id: String,
    compare_columns1: Vec<String>,
    exclude_columns1: Vec<Pattern>,
    compare_columns2: Vec<String>,
    options: CompareOptions,
    allowed_diff: usize,
    new_table_id: String,
    diff_table_id: Option<String>,
    output_file: Option<String>,
    diff_count_property: Option<String>,
    if_different: Action,
    if_same: Action,
}

impl Params {
    /// Column name pairs after applying the exclusions
    fn column_pairs(&self, table1: &DataTable) -> (Vec<String>, Vec<String>) {
        let names1: Vec<String> = if self.compare_columns1.is_empty() {
            table1.field_names().into_iter().map(str::to_string).collect()
        } else {
            self.compare_columns1.clone()
        };
        let mut columns1 = Vec::new();
        let mut columns2 = Vec::new();
        for (i, name) in names1.into_iter().enumerate() {
            if matches_any(&self.exclude_columns1, &name) {
                continue;
            }
            if let Some(name2) = self.compare_columns2.get(i) {
                columns2.push(name2.clone());
            }
            columns1.push(name);
        }
        (columns1, columns2)
    }
}

pub struct CompareTables {
    props: PropList,
    status: CommandStatus,
    params: Option<Params>,
    discovered: Vec<DiscoveryObject>,
}

impl CompareTables {
    pub fn new(props: PropList) -> Self {
        Self {
            props,
            status: CommandStatus::new(NAME),
            params: None,
            discovered: Vec::new(),
        }
    }

    fn params(&mut self) -> CommandResult<Params> {
        if self.params.is_none() {
            self.check_parameters()?;
        }
        self.params
            .clone()
            .ok_or_else(|| CommandError::failure(NAME, "parameters have not been checked"))
    }

    fn get_table(
        &mut self,
        processor: &mut dyn CommandProcessor,
        table_id: &str,
        phase: CommandPhase,
    ) -> CommandResult<DataTable> {
        processor.get_table(table_id).map_err(|e| {
            fail(
                &mut self.status,
                NAME,
                phase,
                format!("Unable to get table \"{table_id}\": {e}"),
                "Verify that a table exists with the requested ID.",
            )
        })
    }
}

impl Command for CompareTables {
    fn name(&self) -> &'static str {
        NAME
    }

    fn parameters(&self) -> &PropList {
        &self.props
    }

    fn status(&self) -> &CommandStatus {
        &self.status
    }

    fn check_parameters(&mut self) -> CommandResult<()> {
        self.params = None;
        let props = &self.props;
        let mut check = ParameterCheck::new(props);
        check.allowed(PARAMETERS);
        let table1_id = check.require("Table1ID");
        let table2_id = check.require("Table2ID");
        let precision = check.integer("Precision", 0);
        let tolerance = check.number("Tolerance", 0.0);
        let allowed_diff = check.integer("AllowedDiff", 0);
        let if_different = Action::from_choice(check.choice("IfDifferent", ACTIONS));
        let if_same = Action::from_choice(check.choice("IfSame", ACTIONS));
        let case_sensitive = check.boolean("CaseSensitive").unwrap_or(true);
        let exclude_columns1 = glob_list(&mut check, props, "ExcludeColumns1");

        let compare_columns1 = props.get_list("CompareColumns1");
        let compare_columns2 = props.get_list("CompareColumns2");
        if !compare_columns2.is_empty() {
            if compare_columns1.is_empty() {
                check.problem(
                    "CompareColumns2 is specified without CompareColumns1",
                    "Specify CompareColumns1 when CompareColumns2 is used.",
                );
            } else if compare_columns1.len() != compare_columns2.len() {
                check.problem(
                    format!(
                        "CompareColumns1 has {} columns but CompareColumns2 has {}",
                        compare_columns1.len(),
                        compare_columns2.len()
                    ),
                    "Specify the same number of columns for both tables.",
                );
            }
        }
        if props.get("OutputFile").is_some_and(|f| !f.to_ascii_lowercase().ends_with(".html")) {
            check.problem(
                "The OutputFile must have an .html extension",
                "Specify an HTML output file.",
            );
        }

        let params = match (table1_id, table2_id) {
            (Some(t1), Some(t2)) => Some(Params {
                table1_id: t1.to_string(),
                table2_id: t2.to_string(),
                compare_columns1,
                exclude_columns1,
                compare_columns2,
                options: CompareOptions {
                    precision: precision.and_then(|p| usize::try_from(p).ok()),
                    tolerance: tolerance.unwrap_or(0.0),
                    case_insensitive: !case_sensitive,
                    match_columns: props.get_list("MatchColumns"),
                },
                allowed_diff: allowed_diff.and_then(|n| usize::try_from(n).ok()).unwrap_or(0),
                new_table_id: props
                    .get("NewTableID")
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("{t1}-{t2}-comparison")),
                diff_table_id: props.get("DiffTableID").map(str::to_string),
                output_file: props.get("OutputFile").map(str::to_string),
                diff_count_property: props.get("DiffCountProperty").map(str::to_string),
                if_different,
                if_same,
            }),
            _ => None,
        };
        check.finish(NAME, &mut self.status)?;
        self.params = params;
        Ok(())
    }

    fn run_command(
        &mut self,
        processor: &mut dyn CommandProcessor,
        phase: CommandPhase,
    ) -> CommandResult<()> {
        self.status.clear(phase);
        let params = self.params()?;

        if phase == CommandPhase::Discovery {
            let mut objects = vec![DiscoveryObject::Table(DataTable::new(&params.new_table_id))];
            if let Some(id) = &params.diff_table_id {
                objects.push(DiscoveryObject::Table(DataTable::new(id)));
            }
            self.discovered = objects;
            return Ok(());
        }

        let table1 = self.get_table(processor, &params.table1_id, phase)?;
        let table2 = self.get_table(processor, &params.table2_id, phase)?;
        let (columns1, columns2) = params.column_pairs(&table1);
        let diff_table_id = params.diff_table_id.clone().unwrap_or_default();
        let comparison = TableComparer::new(&table1, &table2, &columns1, &columns2, params.options.clone())
            .and_then(|comparer| comparer.compare(&params.new_table_id, &diff_table_id))
            .map_err(|e| {
                fail(
                    &mut self.status,
                    NAME,
                    phase,
                    format!("Unable to compare tables: {e}"),
                    "Check the column parameters against the table columns.",
                )
            })?;
        let differences = comparison.difference_count;
        tracing::info!(
            command = NAME,
            table1 = %params.table1_id,
            table2 = %params.table2_id,
            differences,
            "compared tables"
        );

        if let Some(output) = &params.output_file {
            let path = processor.expand_properties(output)?;
            let written = if parent_exists(Path::new(&path)) {
                fs::write(&path, comparison.to_html()).map_err(|e| e.to_string())
            } else {
                Err("the parent directory does not exist".to_string())
            };
            if let Err(e) = written {
                return Err(fail(
                    &mut self.status,
                    NAME,
                    phase,
                    format!("Unable to write comparison file \"{path}\": {e}"),
                    "Verify that the output folder exists and is writable.",
                ));
            }
        }

        processor.set_table(comparison.table)?;
        if params.diff_table_id.is_some() {
            processor.set_table(comparison.diff_table)?;
        }
        if let Some(property) = &params.diff_count_property {
            let count = i64::try_from(differences).unwrap_or(i64::MAX);
            processor.set_property(property, PropValue::Integer(count))?;
        }

        if differences > params.allowed_diff {
            if let Some(severity) = params.if_different.severity() {
                self.status.log(
                    phase,
                    severity,
                    format!(
                        "{differences} differences found comparing \"{}\" and \"{}\" ({} allowed)",
                        params.table1_id, params.table2_id, params.allowed_diff
                    ),
                    "Review the comparison table.",
                );
            }
        }
        if differences == 0 {
            if let Some(severity) = params.if_same.severity() {
                self.status.log(
                    phase,
                    severity,
                    format!(
                        "Tables \"{}\" and \"{}\" are the same",
                        params.table1_id, params.table2_id
                    ),
                    "Verify that the tables were expected to be the same.",
                );
            }
        }
        finish_phase(NAME, &self.status, phase)
    }

    fn discovery_objects(&self) -> Vec<DiscoveryObject> {
        self.discovered.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tscmd_core::{FieldType, FieldValue, MemoryProcessor, TableField};

    fn flows(id: &str, values: &[i64]) -> DataTable {
        let mut t = DataTable::new(id);
        t.add_field(TableField::new("id", FieldType::Text)).unwrap();
        t.add_field(TableField::new("flow", FieldType::Integer)).unwrap();
        t.add_field(TableField::new("comment", FieldType::Text)).unwrap();
        for (i, v) in values.iter().enumerate() {
            t.add_record(vec![format!("S{i}").into(), (*v).into(), "ok".into()])
                .unwrap();
        }
        t
    }

    fn processor() -> MemoryProcessor {
        let mut p = MemoryProcessor::new();
        p.set_table(flows("A", &[1, 2, 3])).unwrap();
        p.set_table(flows("B", &[1, 5, 3])).unwrap();
        p
    }

    fn run(props: PropList, processor: &mut MemoryProcessor) -> (CompareTables, CommandResult<()>) {
        let mut cmd = CompareTables::new(props);
        cmd.check_parameters().unwrap();
        let result = cmd.run_command(processor, CommandPhase::Run);
        (cmd, result)
    }

    #[test]
    fn defaults_create_comparison_table() {
        let mut p = processor();
        let props = PropList::new()
            .with("Table1ID", "A")
            .with("Table2ID", "B")
            .with("ExcludeColumns1", "comm*")
            .with("DiffTableID", "Diff")
            .with("DiffCountProperty", "Differences");
        let (_, result) = run(props, &mut p);
        result.unwrap();
        let cmp = p.table("A-B-comparison").unwrap();
        assert_eq!(cmp.field_names(), vec!["id", "flow"]);
        assert_eq!(cmp.value(1, 1).unwrap(), &FieldValue::Text("2 != 5".into()));
        assert_eq!(p.table("Diff").unwrap().value(1, 1).unwrap(), &FieldValue::Double(3.0));
        assert_eq!(p.property("Differences"), Some(&PropValue::Integer(1)));
    }

    #[test]
    fn if_different_controls_severity() {
        let base = PropList::new().with("Table1ID", "A").with("Table2ID", "B");

        let mut p = processor();
        let (_, result) = run(base.clone().with("IfDifferent", "Warn"), &mut p);
        assert!(result.unwrap_err().is_warning());

        let (cmd, result) = run(base.clone().with("IfDifferent", "Fail"), &mut p);
        assert!(matches!(result, Err(CommandError::Failure { .. })));
        assert_eq!(cmd.status().max_severity(CommandPhase::Run), Some(Severity::Failure));

        let (_, result) = run(
            base.with("IfDifferent", "Fail").with("AllowedDiff", "1"),
            &mut p,
        );
        assert!(result.is_ok());
    }

    #[test]
    fn if_same_on_identical_tables() {
        let mut p = processor();
        let props = PropList::new()
            .with("Table1ID", "A")
            .with("Table2ID", "A")
            .with("IfSame", "warn");
        let (_, result) = run(props, &mut p);
        assert!(result.unwrap_err().is_warning());
    }

    #[test]
    fn writes_html() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cmp.html");
        let mut p = processor();
        let props = PropList::new()
            .with("Table1ID", "A")
            .with("Table2ID", "B")
            .with("OutputFile", path.to_string_lossy());
        let (_, result) = run(props, &mut p);
        result.unwrap();
        let html = fs::read_to_string(&path).unwrap();
        assert!(html.contains("class=\"diff\""));
    }

    #[test]
    fn invalid_parameters() {
        let mut cmd = CompareTables::new(
            PropList::new()
                .with("Table1ID", "A")
                .with("CompareColumns1", "a,b")
                .with("CompareColumns2", "a")
                .with("IfSame", "Explode")
                .with("OutputFile", "out.txt"),
        );
        assert!(cmd.check_parameters().is_err());
        // Table2ID, IfSame, column counts and extension
        assert_eq!(cmd.status().messages(CommandPhase::Initialization).len(), 4);
    }

    #[test]
    fn missing_table_fails() {
        let mut p = MemoryProcessor::new();
        let (cmd, result) = run(
            PropList::new().with("Table1ID", "A").with("Table2ID", "B"),
            &mut p,
        );
        assert!(matches!(result, Err(CommandError::Failure { .. })));
        assert!(cmd.status().messages(CommandPhase::Run)[0].message.contains("\"A\""));
    }

    #[test]
    fn discovery_lists_output_tables() {
        let mut cmd = CompareTables::new(
            PropList::new()
                .with("Table1ID", "A")
                .with("Table2ID", "B")
                .with("NewTableID", "Cmp")
                .with("DiffTableID", "Diff"),
        );
        cmd.run_command(&mut MemoryProcessor::new(), CommandPhase::Discovery)
            .unwrap();
        let labels: Vec<String> = cmd.discovery_objects().iter().map(|o| o.label()).collect();
        assert_eq!(labels, vec!["table Cmp", "table Diff"]);
    }
}
