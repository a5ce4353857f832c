//! Command registry for lookup by workflow name

use std::collections::BTreeMap;
use std::sync::LazyLock;

use tscmd_core::{Command, PropList};

use crate::compare_tables::CompareTables;
use crate::read_table_from_json::ReadTableFromJson;
use crate::table_to_time_series::TableToTimeSeries;
use crate::time_series_to_table::TimeSeriesToTable;
use crate::write_table_to_markdown::WriteTableToMarkdown;

/// Builds a command from its parameters
pub type Constructor = fn(PropList) -> Box<dyn Command>;

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("Unknown command \"{0}\"")]
    UnknownCommand(String),
}

#[derive(Clone, Copy)]
struct Entry {
    name: &'static str,
    description: &'static str,
    constructor: Constructor,
}

/// Registry of all commands, keyed by lowercase name
#[derive(Clone)]
pub struct CommandRegistry {
    commands: BTreeMap<String, Entry>,
}

impl Default for CommandRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandRegistry {
    /// Create a registry with all standard commands
    pub fn new() -> Self {
        let mut registry = Self {
            commands: BTreeMap::new(),
        };
        registry.register_standard_commands();
        registry
    }

    pub fn register(&mut self, name: &'static str, description: &'static str, constructor: Constructor) {
        self.commands.insert(
            name.to_ascii_lowercase(),
            Entry {
                name,
                description,
                constructor,
            },
        );
    }

    /// Case-insensitive lookup
    pub fn is_registered(&self, name: &str) -> bool {
        self.commands.contains_key(&name.to_ascii_lowercase())
    }

    /// Description of a command
    pub fn description(&self, name: &str) -> Option<&'static str> {
        self.commands
            .get(&name.to_ascii_lowercase())
            .map(|e| e.description)
    }

    /// Build a command from its name and parameters
    pub fn create(&self, name: &str, parameters: PropList) -> Result<Box<dyn Command>, RegistryError> {
        let entry = self
            .commands
            .get(&name.trim().to_ascii_lowercase())
            .ok_or_else(|| RegistryError::UnknownCommand(name.to_string()))?;
        tscmd_core::tscmd_log_debug!(command = entry.name, parameters = parameters.len(), "creating command");
        Ok((entry.constructor)(parameters))
    }

    /// Registered command names, sorted
    pub fn list_commands(&self) -> Vec<&'static str> {
        self.commands.values().map(|e| e.name).collect()
    }

    /// Iterator over (name, description)
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &'static str)> + '_ {
        self.commands.values().map(|e| (e.name, e.description))
    }

    fn register_standard_commands(&mut self) {
        self.register(
            "CompareTables",
            "Compare two tables cell by cell and report differences",
            |p| Box::new(CompareTables::new(p)),
        );
        self.register(
            "ReadTableFromJSON",
            "Read a table from a JSON array, flattening nested objects and arrays",
            |p| Box::new(ReadTableFromJson::new(p)),
        );
        self.register(
            "TableToTimeSeries",
            "Create time series from table date/time and value columns",
            |p| Box::new(TableToTimeSeries::new(p)),
        );
        self.register(
            "TimeSeriesToTable",
            "Copy time series into a table with one column per series",
            |p| Box::new(TimeSeriesToTable::new(p)),
        );
        self.register(
            "WriteTableToMarkdown",
            "Write a table to a Markdown file",
            |p| Box::new(WriteTableToMarkdown::new(p)),
        );
    }
}

/// Shared registry of the standard commands
pub static REGISTRY: LazyLock<CommandRegistry> = LazyLock::new(CommandRegistry::new);
