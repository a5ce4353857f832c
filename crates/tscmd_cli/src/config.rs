//! Workflow files.
//!
//! ```toml
//! [settings]
//! stop_on_failure = true
//!
//! [properties]
//! OutputStart = "2020-01-01"
//!
//! [[command]]
//! name = "ReadTableFromJSON"
//! [command.parameters]
//! InputFile = "stations.json"
//! TableID = "Stations"
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use toml::Value;
use tscmd_commands::CommandRegistry;
use tscmd_core::{Command, DateTime, MemoryProcessor, PropList, PropValue, RunOptions};

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub stop_on_failure: bool,
    pub discovery: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            stop_on_failure: true,
            discovery: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CommandConfig {
    pub name: String,
    #[serde(default)]
    pub parameters: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WorkflowConfig {
    #[serde(default)]
    pub settings: Settings,
    #[serde(default)]
    pub properties: BTreeMap<String, Value>,
    #[serde(default, rename = "command")]
    pub commands: Vec<CommandConfig>,
}

impl WorkflowConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read workflow {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("Invalid workflow {}", path.display()))
    }

    pub fn parse(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    pub fn run_options(&self, discovery_only: bool) -> RunOptions {
        RunOptions {
            discovery: self.settings.discovery,
            discovery_only,
            stop_on_failure: self.settings.stop_on_failure,
        }
    }

    /// Processor seeded with the workflow properties
    pub fn processor(&self) -> MemoryProcessor {
        self.properties
            .iter()
            .fold(MemoryProcessor::new(), |p, (name, value)| {
                p.with_property(name, property_value(value))
            })
    }

    pub fn build_commands(&self, registry: &CommandRegistry) -> Result<Vec<Box<dyn Command>>> {
        self.commands
            .iter()
            .enumerate()
            .map(|(i, c)| {
                let parameters = c
                    .parameters
                    .iter()
                    .map(|(k, v)| Ok((k.clone(), parameter_text(v)?)))
                    .collect::<Result<PropList>>()
                    .with_context(|| format!("Command {} ({})", i + 1, c.name))?;
                registry
                    .create(&c.name, parameters)
                    .with_context(|| format!("Command {}", i + 1))
            })
            .collect()
    }
}

/// Parameter values are strings; scalars are stringified and arrays become
/// comma-separated lists.
fn parameter_text(value: &Value) -> Result<String> {
    Ok(match value {
        Value::String(s) => s.clone(),
        Value::Integer(i) => i.to_string(),
        Value::Float(f) => f.to_string(),
        Value::Boolean(b) => if *b { "True" } else { "False" }.to_string(),
        Value::Datetime(dt) => dt.to_string(),
        Value::Array(items) => items
            .iter()
            .map(parameter_text)
            .collect::<Result<Vec<_>>>()?
            .join(","),
        Value::Table(_) => bail!("parameter values cannot be tables"),
    })
}

fn property_value(value: &Value) -> PropValue {
    match value {
        Value::Integer(i) => PropValue::Integer(*i),
        Value::Float(f) => PropValue::Double(*f),
        Value::Boolean(b) => PropValue::Boolean(*b),
        Value::Datetime(dt) => DateTime::parse(&dt.to_string())
            .map(PropValue::DateTime)
            .unwrap_or_else(|_| PropValue::Text(dt.to_string())),
        Value::String(s) => PropValue::Text(s.clone()),
        other => PropValue::Text(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WORKFLOW: &str = r#"
[settings]
stop_on_failure = false

[properties]
OutputStart = 2020-01-01
Label = "run"
Count = 3

[[command]]
name = "ReadTableFromJSON"
[command.parameters]
InputFile = "stations.json"
TableID = "Stations"
Top = 10
IntegerColumns = ["a", "b"]

[[command]]
name = "writetabletomarkdown"
[command.parameters]
TableID = "Stations"
OutputFile = "out.md"
Append = true
"#;

    #[test]
    fn parses_settings_properties_and_commands() {
        let config = WorkflowConfig::parse(WORKFLOW).unwrap();
        assert!(!config.settings.stop_on_failure);
        assert!(config.settings.discovery);
        assert_eq!(config.commands.len(), 2);

        let processor = config.processor();
        assert!(matches!(processor.property("OutputStart"), Some(PropValue::DateTime(_))));
        assert_eq!(processor.property("Count"), Some(&PropValue::Integer(3)));

        let commands = config.build_commands(&CommandRegistry::new()).unwrap();
        assert_eq!(commands[1].name(), "WriteTableToMarkdown");
        let params = commands[0].parameters();
        assert_eq!(params.get("Top"), Some("10"));
        assert_eq!(params.get("IntegerColumns"), Some("a,b"));
        assert_eq!(commands[1].parameters().get("Append"), Some("True"));
    }

    #[test]
    fn rejects_unknown_commands_and_sections() {
        let config = WorkflowConfig::parse("[[command]]\nname = \"Nope\"\n").unwrap();
        assert!(config.build_commands(&CommandRegistry::new()).is_err());
        assert!(WorkflowConfig::parse("[unknown]\nx = 1\n").is_err());
    }
}
