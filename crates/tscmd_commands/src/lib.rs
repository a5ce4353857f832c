//! tscmd commands
//!
//! Table and time series commands run by a [`tscmd_core::CommandProcessor`].
//! Commands are created by name through the [`CommandRegistry`].

pub mod common;
pub mod compare_tables;
pub mod json_table;
pub mod markdown;
pub mod read_table_from_json;
pub mod registry;
pub mod table_compare;
pub mod table_to_time_series;
pub mod time_series_to_table;
pub mod write_table_to_markdown;

// Re-export commonly used types
pub use compare_tables::CompareTables;
pub use json_table::{read_json_table, JsonTable, JsonTableError, JsonTableOptions};
pub use markdown::{escape_cell, table_to_markdown, MarkdownOptions};
pub use read_table_from_json::ReadTableFromJson;
pub use registry::{CommandRegistry, RegistryError, REGISTRY};
pub use table_compare::{CompareError, CompareOptions, TableComparer, TableComparison};
pub use table_to_time_series::TableToTimeSeries;
pub use time_series_to_table::TimeSeriesToTable;
pub use write_table_to_markdown::WriteTableToMarkdown;
