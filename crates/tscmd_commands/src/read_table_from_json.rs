//! ReadTableFromJSON: read a JSON array of objects into a table.

use std::fs;

use serde_json::Value;
use tscmd_core::{
    finish_phase, Command, CommandError, CommandPhase, CommandProcessor, CommandResult,
    CommandStatus, DataTable, DiscoveryObject, FieldType, ParameterCheck, ProblemCounter,
    PropList, PropValue, Severity,
};

use crate::common::{fail, glob_list};
use crate::json_table::{read_json_table, JsonTableOptions};

const NAME: &str = "ReadTableFromJSON";

const PARAMETERS: &[&str] = &[
    "InputFile",
    "TableID",
    "ArrayName",
    "AppendArrays",
    "ExcludeNames",
    "ArrayColumns",
    "BooleanColumns",
    "DateTimeColumns",
    "DoubleColumns",
    "IntegerColumns",
    "TextColumns",
    "ObjectSeparator",
    "Top",
    "RowCountProperty",
];

/// Parameters naming columns with a forced type
const TYPE_PARAMETERS: [(&str, FieldType); 5] = [
    ("BooleanColumns", FieldType::Boolean),
    ("DateTimeColumns", FieldType::DateTime),
    ("DoubleColumns", FieldType::Double),
    ("IntegerColumns", FieldType::Integer),
    ("TextColumns", FieldType::Text),
];

#[derive(Debug, Clone)]
struct Params {
    input_file: String,
    table_id: String,
    options: JsonTableOptions,
    row_count_property: Option<String>,
}

pub struct ReadTableFromJson {
    props: PropList,
    status: CommandStatus,
    params: Option<Params>,
    discovered: Vec<DiscoveryObject>,
}

impl ReadTableFromJson {
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
}

impl Command for ReadTableFromJson {
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
        let input_file = check.require("InputFile");
        let table_id = check.require("TableID");
        let append_arrays = check.boolean("AppendArrays").unwrap_or(false);
        let top = check.integer("Top", 1);
        let exclude_names = glob_list(&mut check, props, "ExcludeNames");

        let mut column_types: Vec<(String, FieldType)> = Vec::new();
        for (key, field_type) in TYPE_PARAMETERS {
            for column in props.get_list(key) {
                match column_types.iter().find(|(c, _)| c.eq_ignore_ascii_case(&column)) {
                    Some((_, other)) => check.problem(
                        format!("Column \"{column}\" is listed as both {other} and {field_type}"),
                        "List each column in only one of the column type parameters.",
                    ),
                    None => column_types.push((column, field_type)),
                }
            }
        }

        let params = match (input_file, table_id) {
            (Some(input_file), Some(table_id)) => Some(Params {
                input_file: input_file.to_string(),
                table_id: table_id.to_string(),
                options: JsonTableOptions {
                    array_name: props.get("ArrayName").map(str::to_string),
                    append_arrays,
                    exclude_names,
                    array_columns: props.get_list("ArrayColumns"),
                    column_types,
                    object_separator: props.get_raw("ObjectSeparator").unwrap_or(".").to_string(),
                    top: top.and_then(|n| usize::try_from(n).ok()),
                },
                row_count_property: props.get("RowCountProperty").map(str::to_string),
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
            self.discovered = vec![DiscoveryObject::Table(DataTable::new(&params.table_id))];
            return Ok(());
        }

        let path = processor.expand_properties(&params.input_file)?;
        let text = fs::read_to_string(&path).map_err(|e| {
            fail(
                &mut self.status,
                NAME,
                phase,
                format!("Unable to read JSON file \"{path}\": {e}"),
                "Verify that the input file exists and is readable.",
            )
        })?;
        let root: Value = serde_json::from_str(&text).map_err(|e| {
            fail(
                &mut self.status,
                NAME,
                phase,
                format!("File \"{path}\" is not valid JSON: {e}"),
                "Check the file contents.",
            )
        })?;
        let result = read_json_table(&root, &params.table_id, &params.options).map_err(|e| {
            fail(
                &mut self.status,
                NAME,
                phase,
                format!("Unable to locate the array in \"{path}\": {e}"),
                "Check the ArrayName parameter and the file structure.",
            )
        })?;

        let mut problems = ProblemCounter::default();
        for problem in &result.problems {
            problems.record(
                &mut self.status,
                phase,
                Severity::Warning,
                problem.clone(),
                "Check the JSON data and the column type parameters.",
            );
        }
        problems.skip(result.problem_count.saturating_sub(result.problems.len()));
        problems.finish(&mut self.status, phase);

        let rows = result.table.row_count();
        tracing::info!(
            command = NAME,
            table = %params.table_id,
            rows,
            columns = result.table.field_count(),
            "read table from JSON"
        );
        processor.set_table(result.table)?;
        if let Some(property) = &params.row_count_property {
            let count = i64::try_from(rows).unwrap_or(i64::MAX);
            processor.set_property(property, PropValue::Integer(count))?;
        }
        finish_phase(NAME, &self.status, phase)
    }

    fn discovery_objects(&self) -> Vec<DiscoveryObject> {
        self.discovered.clone()
    }
}
