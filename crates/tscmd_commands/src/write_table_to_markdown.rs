//! WriteTableToMarkdown: write a table to a Markdown file.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

use glob::Pattern;
use tscmd_core::{
    finish_phase, Command, CommandError, CommandPhase, CommandProcessor, CommandResult,
    CommandStatus, ParameterCheck, PropList,
};

use crate::common::{fail, glob_list, matches_any, parent_exists, select_columns, unescape_newlines};
use crate::markdown::{table_to_markdown, MarkdownOptions};

const NAME: &str = "WriteTableToMarkdown";

const PARAMETERS: &[&str] = &[
    "TableID",
    "OutputFile",
    "Append",
    "IncludeColumns",
    "ExcludeColumns",
    "LinkColumns",
    "LinkText",
    "PrependText",
    "AppendText",
    "NewlineReplacement",
];

#[derive(Debug, Clone)]
struct Params {
    table_id: String,
    output_file: String,
    append: bool,
    include_columns: Vec<Pattern>,
    exclude_columns: Vec<Pattern>,
    link_columns: Vec<Pattern>,
    link_text: Option<String>,
    prepend_text: Option<String>,
    append_text: Option<String>,
    newline_replacement: String,
}

pub struct WriteTableToMarkdown {
    props: PropList,
    status: CommandStatus,
    params: Option<Params>,
}

impl WriteTableToMarkdown {
    pub fn new(props: PropList) -> Self {
        Self {
            props,
            status: CommandStatus::new(NAME),
            params: None,
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

impl Command for WriteTableToMarkdown {
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
        let table_id = check.require("TableID");
        let output_file = check.require("OutputFile");
        let append = check.boolean("Append").unwrap_or(false);
        let include_columns = glob_list(&mut check, props, "IncludeColumns");
        let exclude_columns = glob_list(&mut check, props, "ExcludeColumns");
        let link_columns = glob_list(&mut check, props, "LinkColumns");

        let params = match (table_id, output_file) {
            (Some(table_id), Some(output_file)) => Some(Params {
                table_id: table_id.to_string(),
                output_file: output_file.to_string(),
                append,
                include_columns,
                exclude_columns,
                link_columns,
                link_text: props.get("LinkText").map(str::to_string),
                prepend_text: props.get("PrependText").map(unescape_newlines),
                append_text: props.get("AppendText").map(unescape_newlines),
                newline_replacement: props
                    .get_raw("NewlineReplacement")
                    .unwrap_or("<br>")
                    .to_string(),
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
            return Ok(());
        }

        let table = processor.get_table(&params.table_id).map_err(|e| {
            fail(
                &mut self.status,
                NAME,
                phase,
                format!("Unable to get table \"{}\": {e}", params.table_id),
                "Verify that a table exists with the requested ID.",
            )
        })?;
        let path = processor.expand_properties(&params.output_file)?;
        if !parent_exists(Path::new(&path)) {
            return Err(fail(
                &mut self.status,
                NAME,
                phase,
                format!("The folder for output file \"{path}\" does not exist"),
                "Create the output folder before writing.",
            ));
        }

        let columns = select_columns(&table, &params.include_columns, &params.exclude_columns);
        let link_columns = columns
            .iter()
            .copied()
            .filter(|&c| matches_any(&params.link_columns, &table.fields()[c].name))
            .collect();
        let options = MarkdownOptions {
            columns,
            link_columns,
            link_text: params.link_text.clone(),
            newline_replacement: params.newline_replacement.clone(),
        };

        let mut text = String::new();
        if let Some(prepend) = &params.prepend_text {
            text.push_str(prepend);
            text.push('\n');
        }
        text.push_str(&table_to_markdown(&table, &options));
        if let Some(append) = &params.append_text {
            text.push_str(append);
            text.push('\n');
        }

        let written = OpenOptions::new()
            .create(true)
            .write(true)
            .append(params.append)
            .truncate(!params.append)
            .open(&path)
            .and_then(|mut file| file.write_all(text.as_bytes()));
        if let Err(e) = written {
            return Err(fail(
                &mut self.status,
                NAME,
                phase,
                format!("Unable to write Markdown file \"{path}\": {e}"),
                "Verify that the output file is writable.",
            ));
        }
        tracing::info!(
            command = NAME,
            table = %params.table_id,
            file = %path,
            rows = table.row_count(),
            "wrote Markdown table"
        );
        finish_phase(NAME, &self.status, phase)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tscmd_core::{DataTable, FieldType, MemoryProcessor, PropValue, TableField};

    fn processor() -> MemoryProcessor {
        let mut t = DataTable::new("Sites");
        t.add_field(TableField::new("Name", FieldType::Text)).unwrap();
        t.add_field(TableField::new("Count", FieldType::Integer)).unwrap();
        t.add_field(TableField::new("Link", FieldType::Text)).unwrap();
        t.add_record(vec!["A".into(), 3i64.into(), "https://a.org".into()])
            .unwrap();
        let mut p = MemoryProcessor::new();
        p.set_table(t).unwrap();
        p
    }

    #[test]
    fn writes_selected_columns_with_text() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sites.md");
        let mut p = processor().with_property("Dir", PropValue::Text(dir.path().to_string_lossy().into()));
        let mut cmd = WriteTableToMarkdown::new(
            PropList::new()
                .with("TableID", "Sites")
                .with("OutputFile", "${Dir}/sites.md")
                .with("ExcludeColumns", "count")
                .with("LinkColumns", "Link")
                .with("LinkText", "web")
                .with("PrependText", "# Sites\\n")
                .with("AppendText", "End"),
        );
        cmd.check_parameters().unwrap();
        cmd.run_command(&mut p, CommandPhase::Run).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(
            text,
            "# Sites\n\n| Name | Link |\n| --- | --- |\n| A | [web](https://a.org) |\nEnd\n"
        );
    }

    #[test]
    fn append_keeps_existing_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.md");
        fs::write(&path, "intro\n").unwrap();
        let mut p = processor();
        let mut cmd = WriteTableToMarkdown::new(
            PropList::new()
                .with("TableID", "Sites")
                .with("OutputFile", path.to_string_lossy())
                .with("IncludeColumns", "Count")
                .with("Append", "True"),
        );
        cmd.run_command(&mut p, CommandPhase::Run).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(text, "intro\n| Count |\n| ---: |\n| 3 |\n");
    }

    #[test]
    fn missing_folder_fails() {
        let mut p = processor();
        let mut cmd = WriteTableToMarkdown::new(
            PropList::new()
                .with("TableID", "Sites")
                .with("OutputFile", "/no/such/folder/out.md"),
        );
        let err = cmd.run_command(&mut p, CommandPhase::Run).unwrap_err();
        assert!(matches!(err, CommandError::Failure { .. }));
    }
}
